//! Recording device shared by sampling nodes: owns the activation window and
//! the sender/time log of everything written through it.

use crate::error::ConfigError;
use crate::time::{Resolution, Time};
use crate::traits::NodeId;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub origin: f64,
    pub start: f64,
    /// `None` records until the end of the simulation.
    pub stop: Option<f64>,
    pub to_memory: bool,
    pub to_screen: bool,
    pub label: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            origin: 0.0,
            start: 0.0,
            stop: None,
            to_memory: true,
            to_screen: false,
            label: String::new(),
        }
    }
}

/// Stamps accepted by a recorder: `t_min < stamp <= t_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationWindow {
    pub t_min: Time,
    pub t_max: Time,
}

impl ActivationWindow {
    pub fn new(t_min: Time, t_max: Time) -> Self {
        Self { t_min, t_max }
    }

    pub fn is_active(&self, stamp: Time) -> bool {
        self.t_min < stamp && stamp <= self.t_max
    }
}

impl Default for ActivationWindow {
    fn default() -> Self {
        Self::new(Time::ZERO, Time::POS_INF)
    }
}

/// Sender and stamp of one written point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyContext {
    pub sender: NodeId,
    pub stamp: Time,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedEvents {
    pub senders: Vec<NodeId>,
    pub times: Vec<Time>,
}

impl RecordedEvents {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    config: RecorderConfig,
    window: ActivationWindow,
    events: RecordedEvents,
    written_this_run: u64,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies configuration only; recorded events start empty.
    pub fn from_prototype(prototype: &Recorder) -> Self {
        Self {
            config: prototype.config.clone(),
            ..Self::default()
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn t_min(&self) -> Time {
        self.window.t_min
    }

    pub fn t_max(&self) -> Time {
        self.window.t_max
    }

    pub fn window(&self) -> ActivationWindow {
        self.window
    }

    pub fn events(&self) -> &RecordedEvents {
        &self.events
    }

    /// Overlays recognised keys of `d` on the current configuration. Unknown
    /// keys are ignored; nothing changes unless every key validates.
    pub fn set_status(&mut self, d: &Map<String, Value>) -> Result<(), ConfigError> {
        let mut candidate = self.config.clone();
        if let Some(v) = d.get("origin") {
            candidate.origin = number(v, "origin")?;
        }
        if let Some(v) = d.get("start") {
            candidate.start = number(v, "start")?;
        }
        if let Some(v) = d.get("stop") {
            candidate.stop = match v {
                Value::Null => None,
                v => Some(number(v, "stop")?),
            };
        }
        if let Some(v) = d.get("to_memory") {
            candidate.to_memory = flag(v, "to_memory")?;
        }
        if let Some(v) = d.get("to_screen") {
            candidate.to_screen = flag(v, "to_screen")?;
        }
        if let Some(v) = d.get("label") {
            candidate.label = v
                .as_str()
                .ok_or_else(|| mismatch("label", "a string"))?
                .to_string();
        }

        let stop = candidate.stop.unwrap_or(f64::INFINITY);
        if stop < candidate.start {
            return Err(ConfigError::InvalidWindow {
                start: candidate.start,
                stop,
            });
        }
        self.config = candidate;
        Ok(())
    }

    pub fn get_status(&self, d: &mut Map<String, Value>) {
        if let Ok(Value::Object(map)) = serde_json::to_value(&self.config) {
            d.extend(map);
        }
        d.insert("n_events".to_string(), Value::from(self.events.len()));
    }

    /// Takes over the event log of `prior`; a fresh prototype yields an empty log.
    pub fn init_state(&mut self, prior: &Recorder) {
        self.events = prior.events.clone();
    }

    pub fn init_buffers(&mut self) {
        self.written_this_run = 0;
    }

    pub fn calibrate(&mut self, resolution: &Resolution) {
        let origin = resolution.time_from_ms(self.config.origin);
        let start = resolution.time_from_ms(self.config.start);
        let stop = self
            .config
            .stop
            .map_or(Time::POS_INF, |ms| resolution.time_from_ms(ms));
        self.window = ActivationWindow::new(origin + start, origin + stop);
        debug!(
            "recorder '{}' window ({}, {}]",
            self.config.label, self.window.t_min, self.window.t_max
        );
    }

    pub fn finalize(&mut self) {
        debug!(
            "recorder '{}' finalized: {} points this run, {} in memory",
            self.config.label,
            self.written_this_run,
            self.events.len()
        );
    }

    pub fn write(&mut self, ctx: &ReplyContext, values: &[f64]) {
        self.written_this_run += 1;
        if self.config.to_memory {
            self.events.senders.push(ctx.sender);
            self.events.times.push(ctx.stamp);
        }
        if self.config.to_screen {
            info!(
                "{}\t{}\t{}",
                ctx.sender,
                ctx.stamp.steps(),
                values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("\t")
            );
        }
    }
}

fn mismatch(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

fn number(v: &Value, key: &str) -> Result<f64, ConfigError> {
    v.as_f64().ok_or_else(|| mismatch(key, "a number of milliseconds"))
}

fn flag(v: &Value, key: &str) -> Result<bool, ConfigError> {
    v.as_bool().ok_or_else(|| mismatch(key, "a boolean"))
}
