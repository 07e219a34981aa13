//! Compass Heading - one-shot compass heading from accelerometer and magnetometer streams
//!
//! A caller requests a single heading. The resolver subscribes to the
//! accelerometer and magnetometer through a [`SensorSource`], smooths each
//! stream with a single-pole low-pass filter, fuses the smoothed vectors into
//! a rotation matrix as soon as both streams have produced a sample, and
//! delivers the heading to the caller exactly once.
//!
//! # Features
//!
//! - Exponential low-pass filtering per sensor stream (alpha 0.25 by default)
//! - Gravity/geomagnetic fusion into a rotation matrix, orientation angles and
//!   magnetic inclination
//! - Single pending request slot with last-caller-wins semantics
//! - Optional cancellation, request timeout and subscription release
//! - Structured logging through `tracing`
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::Vector3;
//! use compass_heading::calculate_heading;
//!
//! // Smoothed sensor readings
//! let accelerometer = Vector3::new(0.0, 0.0, 9.81); // m/s², device lying flat
//! let magnetometer = Vector3::new(0.0, 22.0, -41.0); // µT, north along device Y
//!
//! let heading = calculate_heading(accelerometer, magnetometer).unwrap();
//! assert!(heading.abs() < 1e-3);
//! ```
//!
//! See [`HeadingResolver`] for the request/response lifecycle.

pub mod error;
pub mod filter;
mod math;
pub mod orientation;
mod resolver;
pub mod sensor;
mod types;

// Re-export all public types and functions
pub use error::{HeadingError, SensorError};
pub use filter::{DEFAULT_ALPHA, LowPassFilter, low_pass};
pub use math::{RAD_TO_DEG, STANDARD_GRAVITY, Vector3Ext, normalize_degrees};
pub use orientation::{
    Orientation, calculate_heading, heading_from_orientation, inclination, inclination_matrix,
    rotation_matrix,
};
pub use resolver::{Continuation, HeadingResolver};
pub use sensor::{
    SampleRate, SensorAccuracy, SensorKind, SensorObserver, SensorSample, SensorSource,
    SubscriptionHandle,
};
pub use types::*;
