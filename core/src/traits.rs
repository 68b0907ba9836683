use crate::engine::{Clock, DataLoggingRequest, Event, ScheduleCmd};
use crate::error::KernelError;
use crate::time::Time;
use std::any::Any;

pub type NodeId = u32;

pub trait Component: Any {
    fn on_event(&mut self, event: Event, clock: &Clock) -> Vec<ScheduleCmd>;

    /// Called once per slice with the slice origin and the step offsets
    /// `[from, to)` to advance through.
    fn update(&mut self, origin: Time, from: i64, to: i64, clock: &Clock) -> Vec<ScheduleCmd>;

    fn name(&self) -> &str;
    fn kind(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    // Prototype -> instance
    fn instantiate(&self) -> Box<dyn Component>;
    fn is_prototype(&self) -> bool;

    // Lifecycle
    fn init_state(&mut self, prior: &dyn Component);
    fn init_buffers(&mut self, clock: &Clock);
    fn calibrate(&mut self, clock: &Clock);
    fn finalize(&mut self) {}

    // Status exchange
    fn get_status(&self, clock: &Clock) -> Result<serde_json::Value, KernelError>;
    fn set_status(&mut self, d: &serde_json::Value, clock: &Clock) -> Result<(), KernelError>;

    // Connectivity
    /// Request a recording node sends to a candidate target while connecting.
    fn data_request(&self) -> Option<DataLoggingRequest> {
        None
    }
    /// Accepts or refuses `requester` as a recipient of replies.
    fn handles_data_request(
        &mut self,
        requester: NodeId,
        own_id: NodeId,
        _request: &DataLoggingRequest,
        _clock: &Clock,
    ) -> Result<(), KernelError> {
        Err(KernelError::illegal(requester, own_id, "target does not answer data requests"))
    }
    fn add_target(&mut self, _target: NodeId) {}
    fn get_targets(&self) -> Vec<NodeId> {
        vec![]
    }
}
