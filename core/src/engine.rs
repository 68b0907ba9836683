use crate::components::create_component;
use crate::error::KernelError;
use crate::time::{Resolution, Time};
use crate::traits::{Component, NodeId};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};

/// Asks a producer for the quantities in `record_from`, sampled every `interval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLoggingRequest {
    pub interval: Time,
    pub record_from: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: Time,
    pub data: Vec<f64>,
}

impl DataPoint {
    /// Unused slot; its non-finite stamp terminates a reply batch.
    pub fn sentinel(width: usize) -> Self {
        Self {
            timestamp: Time::NEG_INF,
            data: vec![0.0; width],
        }
    }
}

/// One batch of sampled points, ordered by stamp.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataLoggingReply {
    pub info: Vec<DataPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventType {
    DataLoggingRequest(DataLoggingRequest),
    DataLoggingReply(DataLoggingReply),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub time: Time,
    pub node_id: NodeId,
    pub sender: NodeId,
    pub event_type: EventType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Every node the emitter is connected to.
    Targets,
    /// The node whose event is being handled.
    Sender,
}

pub struct ScheduleCmd {
    pub route: Route,
    pub event_type: EventType,
}

/// Read-only time context handed to nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    resolution: Resolution,
    slice_steps: i64,
    now: Time,
}

impl Clock {
    pub fn new(resolution: Resolution, slice_steps: i64) -> Self {
        Self {
            resolution,
            slice_steps: slice_steps.max(1),
            now: Time::ZERO,
        }
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn slice_steps(&self) -> i64 {
        self.slice_steps
    }

    pub fn now(&self) -> Time {
        self.now
    }

    pub fn slice_index(&self) -> i64 {
        self.now.steps() / self.slice_steps
    }

    /// Buffer parity written during the current slice.
    pub fn write_toggle(&self) -> usize {
        (self.slice_index() % 2) as usize
    }

    /// Buffer parity holding the previous slice's data.
    pub fn read_toggle(&self) -> usize {
        1 - self.write_toggle()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Resolution::default(), crate::DEFAULT_SLICE_STEPS)
    }
}

pub struct Simulation {
    pub clock: Clock,
    pub components: BTreeMap<NodeId, Box<dyn Component>>,
    pub events: VecDeque<Event>,
    pub requests_sent: u64,
    pub replies_delivered: u64,
    next_id: NodeId,
    prepared: bool,
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            clock: Clock::default(),
            components: BTreeMap::new(),
            events: VecDeque::new(),
            requests_sent: 0,
            replies_delivered: 0,
            next_id: 1,
            prepared: false,
        }
    }

    pub fn with_resolution(resolution_ms: f64, slice_steps: i64) -> Result<Self, KernelError> {
        let mut sim = Self::new();
        sim.clock = Clock::new(Resolution::new(resolution_ms)?, slice_steps);
        Ok(sim)
    }

    /// Intervals are stored in steps, so the resolution is frozen once nodes exist.
    pub fn set_resolution(&mut self, resolution_ms: f64) -> Result<(), KernelError> {
        if !self.components.is_empty() {
            return Err(KernelError::ResolutionLocked);
        }
        self.clock.resolution = Resolution::new(resolution_ms)?;
        Ok(())
    }

    pub fn add_component(&mut self, id: NodeId, component: Box<dyn Component>) {
        self.components.insert(id, component);
        self.next_id = self.next_id.max(id.saturating_add(1));
        self.prepared = false;
    }

    /// Builds a prototype of `kind` configured by `data` and adds an instance of it.
    pub fn create(&mut self, kind: &str, data: &Value) -> Result<NodeId, KernelError> {
        let prototype = create_component(kind, data, &self.clock)?;
        let id = self.next_id;
        self.add_component(id, prototype.instantiate());
        debug!("created {} node {}", kind, id);
        Ok(id)
    }

    pub fn node<T: Component>(&self, id: NodeId) -> Option<&T> {
        self.components.get(&id)?.as_any().downcast_ref::<T>()
    }

    pub fn get_status(&self, id: NodeId) -> Result<Value, KernelError> {
        let comp = self.components.get(&id).ok_or(KernelError::UnknownNode(id))?;
        comp.get_status(&self.clock)
    }

    pub fn set_status(&mut self, id: NodeId, d: &Value) -> Result<(), KernelError> {
        let comp = self.components.get_mut(&id).ok_or(KernelError::UnknownNode(id))?;
        comp.set_status(d, &self.clock)
    }

    /// Connects a recording node to a producer. The producer validates the
    /// recorder's request before the recorder learns about the target.
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> Result<(), KernelError> {
        if source == target {
            return Err(KernelError::illegal(source, target, "node cannot record itself"));
        }
        let recorder = self.components.get(&source).ok_or(KernelError::UnknownNode(source))?;
        let request = recorder
            .data_request()
            .ok_or_else(|| KernelError::illegal(source, target, "source does not send data requests"))?;
        if recorder.get_targets().contains(&target) {
            return Err(KernelError::AlreadyConnected {
                source_node: source,
                target,
            });
        }

        let producer = self.components.get_mut(&target).ok_or(KernelError::UnknownNode(target))?;
        producer.handles_data_request(source, target, &request, &self.clock)?;

        if let Some(recorder) = self.components.get_mut(&source) {
            recorder.add_target(target);
        }
        debug!("connected {} -> {} recording {:?}", source, target, request.record_from);
        Ok(())
    }

    pub fn simulate(&mut self, duration_ms: f64) -> Result<(), KernelError> {
        let slice = self.clock.slice_steps;
        let duration = self.clock.resolution.time_from_ms(duration_ms);
        if !duration.is_finite() || duration.steps() <= 0 || duration.steps() % slice != 0 {
            return Err(KernelError::InvalidDuration {
                duration: duration_ms,
                slice: self.clock.resolution.to_ms(Time::step(slice)),
            });
        }

        if !self.prepared {
            for comp in self.components.values_mut() {
                comp.init_buffers(&self.clock);
            }
            self.prepared = true;
        }
        for comp in self.components.values_mut() {
            comp.calibrate(&self.clock);
        }

        for _ in 0..duration.steps() / slice {
            self.run_slice();
        }
        Ok(())
    }

    pub fn step(&mut self) -> bool {
        if !self.prepared {
            return false;
        }
        self.run_slice();
        true
    }

    fn run_slice(&mut self) {
        let origin = self.clock.now;
        let slice = self.clock.slice_steps;
        trace!("slice {} at {}", self.clock.slice_index(), origin);

        let ids: Vec<NodeId> = self.components.keys().copied().collect();
        for id in ids {
            let cmds = match self.components.get_mut(&id) {
                Some(comp) => comp.update(origin, 0, slice, &self.clock),
                None => continue,
            };
            self.dispatch(id, None, cmds);
            self.deliver();
        }
        self.clock.now = origin + Time::step(slice);
    }

    fn dispatch(&mut self, from: NodeId, reply_to: Option<NodeId>, cmds: Vec<ScheduleCmd>) {
        for cmd in cmds {
            match cmd.route {
                Route::Targets => {
                    if let EventType::DataLoggingRequest(_) = cmd.event_type {
                        self.requests_sent += 1;
                    }
                    let targets = self
                        .components
                        .get(&from)
                        .map(|c| c.get_targets())
                        .unwrap_or_default();
                    for target in targets {
                        self.events.push_back(Event {
                            time: self.clock.now,
                            node_id: target,
                            sender: from,
                            event_type: cmd.event_type.clone(),
                        });
                    }
                }
                Route::Sender => match reply_to {
                    Some(to) => self.events.push_back(Event {
                        time: self.clock.now,
                        node_id: to,
                        sender: from,
                        event_type: cmd.event_type,
                    }),
                    None => trace!("node {} answered outside of a delivery, dropped", from),
                },
            }
        }
    }

    fn deliver(&mut self) {
        while let Some(event) = self.events.pop_front() {
            let receiver = event.node_id;
            let sender = event.sender;
            if let EventType::DataLoggingReply(_) = event.event_type {
                self.replies_delivered += 1;
            }
            let cmds = match self.components.get_mut(&receiver) {
                Some(comp) => comp.on_event(event, &self.clock),
                None => continue,
            };
            self.dispatch(receiver, Some(sender), cmds);
        }
    }

    pub fn finalize(&mut self) {
        for comp in self.components.values_mut() {
            comp.finalize();
        }
    }

    /// Reinitializes every node from a fresh prototype of its model and
    /// rewinds the clock. Connections and configuration survive.
    pub fn reset_state(&mut self) -> Result<(), KernelError> {
        for comp in self.components.values_mut() {
            let prototype = create_component(comp.kind(), &Value::Null, &self.clock)?;
            comp.init_state(prototype.as_ref());
        }
        self.clock.now = Time::ZERO;
        self.events.clear();
        self.requests_sent = 0;
        self.replies_delivered = 0;
        self.prepared = false;
        Ok(())
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
