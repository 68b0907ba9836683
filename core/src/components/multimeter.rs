use crate::engine::{
    Clock, DataLoggingReply, DataLoggingRequest, Event, EventType, Route, ScheduleCmd,
};
use crate::error::{ConfigError, ExportError, KernelError};
use crate::recorder::{Recorder, ReplyContext};
use crate::time::{Resolution, Time};
use crate::traits::{Component, NodeId};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;

/// Sampling interval and the ordered list of quantities to record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    interval: Time,
    record_from: Vec<String>,
}

impl Parameters {
    pub fn new(resolution: &Resolution) -> Self {
        let interval = resolution.time_from_ms(crate::DEFAULT_INTERVAL_MS);
        Self {
            interval: interval.max(Time::step(1)),
            record_from: Vec::new(),
        }
    }

    pub fn interval(&self) -> Time {
        self.interval
    }

    pub fn record_from(&self) -> &[String] {
        &self.record_from
    }

    pub fn get(&self, resolution: &Resolution, d: &mut Map<String, Value>) {
        d.insert("interval".to_string(), Value::from(resolution.to_ms(self.interval)));
        d.insert(
            "record_from".to_string(),
            Value::from(self.record_from.clone()),
        );
    }

    /// Applies `interval` and `record_from` from `d`. Both keys are validated
    /// before either is written.
    pub fn set(
        &mut self,
        d: &Map<String, Value>,
        locked: bool,
        resolution: &Resolution,
    ) -> Result<(), ConfigError> {
        let interval = d.get("interval");
        let record_from = d.get("record_from");
        if locked && (interval.is_some() || record_from.is_some()) {
            return Err(ConfigError::ConfigurationLocked);
        }

        let interval = match interval {
            Some(v) => {
                let ms = v.as_f64().ok_or_else(|| ConfigError::TypeMismatch {
                    key: "interval".to_string(),
                    expected: "a number of milliseconds",
                })?;
                Some(interval_steps(ms, resolution)?)
            }
            None => None,
        };

        let record_from = match record_from {
            Some(Value::Array(names)) => Some(
                names
                    .iter()
                    .map(|n| n.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| ConfigError::TypeMismatch {
                        key: "record_from".to_string(),
                        expected: "a list of strings",
                    })?,
            ),
            Some(_) => {
                return Err(ConfigError::TypeMismatch {
                    key: "record_from".to_string(),
                    expected: "a list of strings",
                })
            }
            None => None,
        };

        if let Some(interval) = interval {
            self.interval = interval;
        }
        if let Some(record_from) = record_from {
            self.record_from = record_from;
        }
        Ok(())
    }
}

/// Rounds `ms` to whole resolution steps, rejecting intervals shorter than a
/// step or off the step grid by more than 10 ulp.
pub fn interval_steps(ms: f64, resolution: &Resolution) -> Result<Time, ConfigError> {
    if ms < resolution.ms() {
        return Err(ConfigError::ResolutionTooCoarse {
            interval: ms,
            resolution: resolution.ms(),
        });
    }
    let steps = resolution.time_from_ms(ms);
    let rounded = resolution.to_ms(steps);
    // negated so NaN and infinite intervals fail as well
    if !((1.0 - rounded / ms).abs() <= 10.0 * f64::EPSILON) {
        return Err(ConfigError::NonMultipleInterval {
            interval: ms,
            resolution: resolution.ms(),
        });
    }
    Ok(steps)
}

pub type Snapshot = Vec<f64>;

/// Accepted samples, one row per point, in acceptance order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    rows: Vec<Snapshot>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: Snapshot) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Snapshot] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

impl From<Vec<Snapshot>> for Store {
    fn from(rows: Vec<Snapshot>) -> Self {
        Self { rows }
    }
}

/// Transposes `store` into one column per entry of `record_from`:
/// `columns[v][t] == store[t][v]`.
pub fn export(store: &Store, record_from: &[String]) -> Result<Vec<Vec<f64>>, ExportError> {
    (0..record_from.len())
        .map(|v| {
            store
                .rows()
                .iter()
                .enumerate()
                .map(|(t, row)| {
                    row.get(v).copied().ok_or(ExportError::InternalInconsistency {
                        row: t,
                        column: v,
                        width: row.len(),
                    })
                })
                .collect()
        })
        .collect()
}

/// Per-calibration scheduler state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceFlags {
    /// Whether the last request can yield data. Computed every slice, never consulted.
    pub expecting_data: bool,
    /// Store length when the current slice's request went out.
    pub slice_data_start: usize,
}

/// Samples named quantities from connected producers once per slice.
pub struct Multimeter {
    pub name: String,
    params: Parameters,
    device: Recorder,
    store: Store,
    targets: Vec<NodeId>,
    has_targets: bool,
    flags: SliceFlags,
    prototype: bool,
}

/// Outcome of one reply batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplySummary {
    pub recorded: usize,
    pub skipped: usize,
}

impl Multimeter {
    pub fn new(name: &str, resolution: &Resolution) -> Self {
        Self {
            name: name.to_string(),
            params: Parameters::new(resolution),
            device: Recorder::new(),
            store: Store::new(),
            targets: Vec::new(),
            has_targets: false,
            flags: SliceFlags::default(),
            prototype: false,
        }
    }

    pub fn prototype(clock: &Clock) -> Self {
        let mut mm = Self::new("Multimeter", clock.resolution());
        mm.prototype = true;
        mm
    }

    /// Copies configuration; store, connections, lock and slice flags start fresh.
    pub fn instance(&self) -> Self {
        Self {
            name: self.name.clone(),
            params: self.params.clone(),
            device: Recorder::from_prototype(&self.device),
            store: Store::new(),
            targets: Vec::new(),
            has_targets: false,
            flags: SliceFlags::default(),
            prototype: false,
        }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn device(&self) -> &Recorder {
        &self.device
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn flags(&self) -> SliceFlags {
        self.flags
    }

    pub fn is_locked(&self) -> bool {
        self.has_targets
    }

    /// Registers `target` as a producer. Locks the configuration unless this
    /// is a model prototype.
    pub fn connect_target(&mut self, target: NodeId) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
        if !self.prototype {
            self.has_targets = true;
        }
    }

    pub fn request(&self) -> DataLoggingRequest {
        DataLoggingRequest {
            interval: self.params.interval,
            record_from: self.params.record_from.clone(),
        }
    }

    pub fn set_parameters(&mut self, d: &Value, resolution: &Resolution) -> Result<(), ConfigError> {
        let d = d.as_object().ok_or_else(|| ConfigError::TypeMismatch {
            key: "status".to_string(),
            expected: "a dictionary",
        })?;
        let mut ptmp = self.params.clone();
        ptmp.set(d, self.has_targets, resolution)?;
        self.device.set_status(d)?;
        self.params = ptmp;
        Ok(())
    }

    /// Decides whether this slice sends a request. Nothing is requested
    /// during the first slice or when called mid-slice; otherwise exactly one.
    pub fn request_for_slice(&mut self, origin: Time, from: i64) -> Option<DataLoggingRequest> {
        if origin.steps() == 0 || from != 0 {
            return None;
        }
        self.flags.expecting_data = self.has_targets && !self.params.record_from.is_empty();
        self.flags.slice_data_start = self.store.len();
        trace!(
            "{} requests {:?} at {} (expecting data: {})",
            self.name,
            self.params.record_from,
            origin,
            self.flags.expecting_data
        );
        Some(self.request())
    }

    /// Records every in-window point of `reply` up to the first non-finite stamp.
    pub fn handle_reply(&mut self, sender: NodeId, reply: &DataLoggingReply) -> ReplySummary {
        let mut summary = ReplySummary::default();
        let window = self.device.window();
        for point in &reply.info {
            if !point.timestamp.is_finite() {
                break;
            }
            if !window.is_active(point.timestamp) {
                summary.skipped += 1;
                continue;
            }
            let ctx = ReplyContext {
                sender,
                stamp: point.timestamp,
            };
            self.device.write(&ctx, &point.data);
            self.store.push(point.data.clone());
            summary.recorded += 1;
        }
        if summary.skipped > 0 {
            trace!("{} skipped {} inactive points from {}", self.name, summary.skipped, sender);
        }
        summary
    }

    /// One column of samples per recorded quantity, in record-list order.
    pub fn data(&self) -> Result<Vec<(String, Vec<f64>)>, ExportError> {
        let columns = export(&self.store, &self.params.record_from)?;
        Ok(self.params.record_from.iter().cloned().zip(columns).collect())
    }

    pub fn status(&self, resolution: &Resolution) -> Result<Value, ExportError> {
        let mut d = Map::new();
        self.params.get(resolution, &mut d);
        self.device.get_status(&mut d);

        let recorded = self.device.events();
        let mut events = Map::new();
        events.insert("senders".to_string(), Value::from(recorded.senders.clone()));
        events.insert(
            "times".to_string(),
            Value::from(
                recorded
                    .times
                    .iter()
                    .map(|t| resolution.to_ms(*t))
                    .collect::<Vec<_>>(),
            ),
        );
        // columns stay positional with record_from; names could shadow senders/times
        let columns = export(&self.store, &self.params.record_from)?;
        events.insert("data".to_string(), Value::from(columns));
        d.insert("events".to_string(), Value::Object(events));
        d.insert("model".to_string(), Value::from("Multimeter"));
        d.insert("locked".to_string(), Value::from(self.has_targets));
        Ok(Value::Object(d))
    }
}

impl Component for Multimeter {
    fn on_event(&mut self, event: Event, _clock: &Clock) -> Vec<ScheduleCmd> {
        match event.event_type {
            EventType::DataLoggingReply(reply) => {
                self.handle_reply(event.sender, &reply);
                vec![]
            }
            EventType::DataLoggingRequest(_) => vec![],
        }
    }

    fn update(&mut self, origin: Time, from: i64, _to: i64, _clock: &Clock) -> Vec<ScheduleCmd> {
        match self.request_for_slice(origin, from) {
            Some(req) => vec![ScheduleCmd {
                route: Route::Targets,
                event_type: EventType::DataLoggingRequest(req),
            }],
            None => vec![],
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "Multimeter"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn instantiate(&self) -> Box<dyn Component> {
        Box::new(self.instance())
    }
    fn is_prototype(&self) -> bool {
        self.prototype
    }

    fn init_state(&mut self, prior: &dyn Component) {
        if let Some(prior) = prior.as_any().downcast_ref::<Multimeter>() {
            self.device.init_state(&prior.device);
        }
        self.store.clear();
    }
    fn init_buffers(&mut self, _clock: &Clock) {
        self.device.init_buffers();
    }
    fn calibrate(&mut self, clock: &Clock) {
        self.device.calibrate(clock.resolution());
        self.flags = SliceFlags::default();
    }
    fn finalize(&mut self) {
        self.device.finalize();
        debug!("{} finalized with {} samples", self.name, self.store.len());
    }

    fn get_status(&self, clock: &Clock) -> Result<Value, KernelError> {
        Ok(self.status(clock.resolution())?)
    }
    fn set_status(&mut self, d: &Value, clock: &Clock) -> Result<(), KernelError> {
        Ok(self.set_parameters(d, clock.resolution())?)
    }

    fn data_request(&self) -> Option<DataLoggingRequest> {
        Some(self.request())
    }
    fn add_target(&mut self, target: NodeId) {
        self.connect_target(target);
    }
    fn get_targets(&self) -> Vec<NodeId> {
        self.targets.clone()
    }
}
