//! Error types for the simulation kernel and its recording nodes.

use crate::traits::NodeId;
use thiserror::Error;

/// Rejected configuration change. A failed `set` leaves the target untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Interval or record list touched after a producer was connected.
    #[error(
        "the recording interval and the list of properties to record cannot be changed after the multimeter has been connected to nodes"
    )]
    ConfigurationLocked,

    #[error("sampling interval {interval}ms must be at least as long as the simulation resolution {resolution}ms")]
    ResolutionTooCoarse { interval: f64, resolution: f64 },

    #[error("sampling interval {interval}ms must be a multiple of the simulation resolution {resolution}ms")]
    NonMultipleInterval { interval: f64, resolution: f64 },

    #[error("value for '{key}' must be {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("stop time {stop}ms must not precede start time {start}ms")]
    InvalidWindow { start: f64, stop: f64 },
}

/// Failure while reshaping stored snapshots into per-quantity columns.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    /// A stored row is narrower than the record list. Never expected while
    /// the record list is frozen by the connection lock.
    #[error("internal inconsistency: row {row} holds {width} values, column {column} requested")]
    InternalInconsistency { row: usize, column: usize, width: usize },
}

/// Errors surfaced by the kernel when building or driving a simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("node {node} cannot record '{name}'")]
    UnknownRecordable { node: NodeId, name: String },

    #[error("illegal connection {source_node} -> {target}: {reason}")]
    IllegalConnection {
        source_node: NodeId,
        target: NodeId,
        reason: &'static str,
    },

    #[error("node {source_node} is already connected to {target}")]
    AlreadyConnected { source_node: NodeId, target: NodeId },

    #[error("resolution cannot be changed once nodes exist")]
    ResolutionLocked,

    #[error("resolution must be positive and finite, got {0}ms")]
    InvalidResolution(f64),

    #[error("simulation time {duration}ms is not a positive multiple of the slice length {slice}ms")]
    InvalidDuration { duration: f64, slice: f64 },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl KernelError {
    pub fn illegal(source_node: NodeId, target: NodeId, reason: &'static str) -> Self {
        Self::IllegalConnection {
            source_node,
            target,
            reason,
        }
    }
}
