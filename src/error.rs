//! Error types for the compass heading library

use core::time::Duration;

use thiserror::Error;

use crate::sensor::SensorKind;

/// Failure reported by a [`SensorSource`](crate::SensorSource)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("no {0} sensor available")]
    Unavailable(SensorKind),
    #[error("{kind} subscription rejected: {reason}")]
    Rejected { kind: SensorKind, reason: String },
}

/// Failure of a heading request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeadingError {
    #[error("no heading delivered within {0:?}")]
    Timeout(Duration),
    #[error("request superseded by a later heading request")]
    Superseded,
    #[error("invalid resolver settings: {0}")]
    InvalidSettings(String),
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),
}
