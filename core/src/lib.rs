pub mod components;
pub mod engine;
pub mod error;
pub mod recorder;
pub mod time;
pub mod traits;

pub use components::generator::{Generator, GeneratorConfig, Waveform};
pub use components::multimeter::{export, Multimeter, Parameters, ReplySummary, SliceFlags, Store};
pub use components::{available_models, create_component};
pub use engine::{
    Clock, DataLoggingReply, DataLoggingRequest, DataPoint, Event, EventType, Route, ScheduleCmd,
    Simulation,
};
pub use error::{ConfigError, ExportError, KernelError};
pub use recorder::{ActivationWindow, Recorder, RecorderConfig, ReplyContext};
pub use time::{Resolution, Time};
pub use traits::{Component, NodeId};

/// Kernel defaults (milliseconds unless noted)
pub const DEFAULT_RESOLUTION_MS: f64 = 0.1;
pub const DEFAULT_SLICE_STEPS: i64 = 10; // steps per slice
pub const DEFAULT_INTERVAL_MS: f64 = 1.0;
