use crate::engine::{
    Clock, DataLoggingReply, DataLoggingRequest, DataPoint, Event, EventType, Route, ScheduleCmd,
};
use crate::error::{ConfigError, KernelError};
use crate::time::Time;
use crate::traits::{Component, NodeId};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::f64::consts::TAU;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Waveform {
    Constant { value: f64 },
    Ramp { slope: f64, offset: f64 },
    Sine { amplitude: f64, frequency_hz: f64 },
    Noise { mean: f64, amplitude: f64 },
}

impl Waveform {
    fn sample(&self, t_ms: f64, rng: &mut StdRng) -> f64 {
        match *self {
            Waveform::Constant { value } => value,
            Waveform::Ramp { slope, offset } => offset + slope * t_ms,
            Waveform::Sine {
                amplitude,
                frequency_hz,
            } => amplitude * (TAU * frequency_hz * t_ms / 1000.0).sin(),
            Waveform::Noise { mean, amplitude } => mean + amplitude * rng.gen_range(-1.0..=1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub signals: BTreeMap<String, Waveform>,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let mut signals = BTreeMap::new();
        signals.insert("ramp".to_string(), Waveform::Ramp { slope: 1.0, offset: 0.0 });
        signals.insert(
            "sine".to_string(),
            Waveform::Sine {
                amplitude: 1.0,
                frequency_hz: 10.0,
            },
        );
        Self { signals, seed: 42 }
    }
}

/// Per-requester sample buffers, one per slice parity. Slots never written
/// in a slice keep a non-finite stamp.
#[derive(Debug, Clone)]
struct DataLogger {
    interval: i64,
    record_from: Vec<String>,
    data: [Vec<DataPoint>; 2],
    next_rec: [usize; 2],
}

impl DataLogger {
    fn new(request: &DataLoggingRequest, slice_steps: i64) -> Self {
        let mut logger = Self {
            interval: request.interval.steps().max(1),
            record_from: request.record_from.clone(),
            data: [Vec::new(), Vec::new()],
            next_rec: [0, 0],
        };
        logger.init_buffers(slice_steps);
        logger
    }

    fn init_buffers(&mut self, slice_steps: i64) {
        let capacity = ((slice_steps + self.interval - 1) / self.interval) as usize;
        let width = self.record_from.len();
        self.data = [
            vec![DataPoint::sentinel(width); capacity],
            vec![DataPoint::sentinel(width); capacity],
        ];
        self.next_rec = [0, 0];
    }

    fn begin_slice(&mut self, toggle: usize) {
        for slot in &mut self.data[toggle] {
            slot.timestamp = Time::NEG_INF;
        }
        self.next_rec[toggle] = 0;
    }

    fn wants(&self, stamp: Time) -> bool {
        stamp.steps() % self.interval == 0
    }

    fn record(&mut self, toggle: usize, stamp: Time, values: &BTreeMap<String, f64>) {
        let idx = self.next_rec[toggle];
        let Some(slot) = self.data[toggle].get_mut(idx) else {
            return;
        };
        slot.timestamp = stamp;
        for (value, name) in slot.data.iter_mut().zip(&self.record_from) {
            *value = values.get(name).copied().unwrap_or(f64::NAN);
        }
        self.next_rec[toggle] = idx + 1;
    }

    fn reply(&self, toggle: usize) -> DataLoggingReply {
        DataLoggingReply {
            info: self.data[toggle].clone(),
        }
    }
}

/// Producer of named signals sampled on request.
pub struct Generator {
    pub name: String,
    pub config: GeneratorConfig,
    pub rng: StdRng,
    loggers: BTreeMap<NodeId, DataLogger>,
    prototype: bool,
}

impl Generator {
    pub fn new(name: &str, config: GeneratorConfig) -> Self {
        Self {
            name: name.to_string(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            loggers: BTreeMap::new(),
            prototype: false,
        }
    }

    pub fn with_signal(mut self, name: &str, waveform: Waveform) -> Self {
        self.config.signals.insert(name.to_string(), waveform);
        self
    }

    pub fn prototype(_clock: &Clock) -> Self {
        let mut g = Self::new("Generator", GeneratorConfig::default());
        g.prototype = true;
        g
    }

    pub fn recordables(&self) -> Vec<&str> {
        self.config.signals.keys().map(String::as_str).collect()
    }

    fn sample_all(&mut self, t_ms: f64) -> BTreeMap<String, f64> {
        let rng = &mut self.rng;
        self.config
            .signals
            .iter()
            .map(|(name, wave)| (name.clone(), wave.sample(t_ms, rng)))
            .collect()
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new("Generator", GeneratorConfig::default())
    }
}

impl Component for Generator {
    fn on_event(&mut self, event: Event, clock: &Clock) -> Vec<ScheduleCmd> {
        match event.event_type {
            EventType::DataLoggingRequest(_) => match self.loggers.get(&event.sender) {
                Some(logger) => vec![ScheduleCmd {
                    route: Route::Sender,
                    event_type: EventType::DataLoggingReply(logger.reply(clock.read_toggle())),
                }],
                None => vec![],
            },
            EventType::DataLoggingReply(_) => vec![],
        }
    }

    fn update(&mut self, origin: Time, from: i64, to: i64, clock: &Clock) -> Vec<ScheduleCmd> {
        let toggle = clock.write_toggle();
        if from == 0 {
            for logger in self.loggers.values_mut() {
                logger.begin_slice(toggle);
            }
        }
        for lag in from..to {
            // state at the end of the step
            let stamp = origin + Time::step(lag + 1);
            if !self.loggers.values().any(|l| l.wants(stamp)) {
                continue;
            }
            let values = self.sample_all(clock.resolution().to_ms(stamp));
            for logger in self.loggers.values_mut() {
                if logger.wants(stamp) {
                    logger.record(toggle, stamp, &values);
                }
            }
        }
        vec![]
    }

    fn name(&self) -> &str { &self.name }
    fn kind(&self) -> &str { "Generator" }
    fn as_any(&self) -> &dyn Any { self }

    fn instantiate(&self) -> Box<dyn Component> {
        Box::new(Generator::new(&self.name, self.config.clone()))
    }
    fn is_prototype(&self) -> bool { self.prototype }

    fn init_state(&mut self, _prior: &dyn Component) {
        self.rng = StdRng::seed_from_u64(self.config.seed);
    }
    fn init_buffers(&mut self, clock: &Clock) {
        for logger in self.loggers.values_mut() {
            logger.init_buffers(clock.slice_steps());
        }
    }
    fn calibrate(&mut self, _clock: &Clock) {}

    fn get_status(&self, _clock: &Clock) -> Result<Value, KernelError> {
        let mut d = serde_json::to_value(&self.config).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut d {
            map.insert("model".to_string(), Value::from("Generator"));
            map.insert("recordables".to_string(), Value::from(self.recordables()));
        }
        Ok(d)
    }
    fn set_status(&mut self, d: &Value, _clock: &Clock) -> Result<(), KernelError> {
        let mut merged = serde_json::to_value(&self.config).unwrap_or(Value::Null);
        if let (Value::Object(base), Value::Object(overlay)) = (&mut merged, d) {
            for key in ["signals", "seed"] {
                if let Some(v) = overlay.get(key) {
                    base.insert(key.to_string(), v.clone());
                }
            }
        }
        let config: GeneratorConfig = serde_json::from_value(merged).map_err(|_| {
            ConfigError::TypeMismatch {
                key: "signals".to_string(),
                expected: "a map of waveforms and an integer seed",
            }
        })?;
        self.rng = StdRng::seed_from_u64(config.seed);
        self.config = config;
        Ok(())
    }

    fn handles_data_request(
        &mut self,
        requester: NodeId,
        own_id: NodeId,
        request: &DataLoggingRequest,
        clock: &Clock,
    ) -> Result<(), KernelError> {
        if let Some(name) = request
            .record_from
            .iter()
            .find(|name| !self.config.signals.contains_key(*name))
        {
            return Err(KernelError::UnknownRecordable {
                node: own_id,
                name: name.clone(),
            });
        }
        self.loggers
            .insert(requester, DataLogger::new(request, clock.slice_steps()));
        Ok(())
    }
}
