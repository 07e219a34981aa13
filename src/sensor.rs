//! Boundary contracts between the heading resolver and a platform sensor service
//!
//! The platform implements [`SensorSource`]; the resolver implements
//! [`SensorObserver`] and receives samples through it.

use core::fmt;
use core::time::Duration;
use std::sync::{Arc, Weak};

use nalgebra::Vector3;

use crate::error::SensorError;

/// Physical quantity measured by a sensor stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorKind {
    /// Acceleration including gravity, in m/s²
    Accelerometer,
    /// Ambient magnetic field, in µT
    Magnetic,
}

impl SensorKind {
    /// Both kinds, in subscription order
    pub const ALL: [SensorKind; 2] = [SensorKind::Accelerometer, SensorKind::Magnetic];
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Accelerometer => f.write_str("accelerometer"),
            SensorKind::Magnetic => f.write_str("magnetic"),
        }
    }
}

/// Desired delivery rate requested when subscribing
///
/// The named rates are hints; platforms may deliver faster or slower.
///
/// # Example
/// ```
/// use core::time::Duration;
/// use compass_heading::SampleRate;
///
/// assert_eq!(SampleRate::default(), SampleRate::Game);
/// assert_eq!(SampleRate::Game.sampling_period(), Duration::from_millis(20));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleRate {
    /// As fast as the hardware allows
    Fastest,
    /// Suitable for games, nominally 50 Hz
    #[default]
    Game,
    /// Suitable for user interface updates, nominally 15 Hz
    Ui,
    /// Suitable for screen orientation changes, nominally 5 Hz
    Normal,
    /// Explicit sampling period
    Custom(Duration),
}

impl SampleRate {
    /// Nominal period between samples
    pub fn sampling_period(&self) -> Duration {
        match self {
            SampleRate::Fastest => Duration::ZERO,
            SampleRate::Game => Duration::from_micros(20_000),
            SampleRate::Ui => Duration::from_micros(66_667),
            SampleRate::Normal => Duration::from_micros(200_000),
            SampleRate::Custom(period) => *period,
        }
    }
}

/// Accuracy status reported by a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorAccuracy {
    /// Readings cannot be trusted, calibration is needed
    Unreliable,
    Low,
    Medium,
    High,
    /// The sensor is not in contact with what it measures
    NoContact,
}

/// Opaque handle identifying one active subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    kind: SensorKind,
}

impl SubscriptionHandle {
    /// Create a handle; intended for [`SensorSource`] implementations
    pub fn new(id: u64, kind: SensorKind) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }
}

/// One timestamped sensor reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub kind: SensorKind,
    pub values: Vector3<f32>,
    /// Platform timestamp in nanoseconds
    pub timestamp_ns: u64,
}

impl SensorSample {
    pub fn new(kind: SensorKind, values: Vector3<f32>, timestamp_ns: u64) -> Self {
        Self {
            kind,
            values,
            timestamp_ns,
        }
    }
}

/// Receiver of sensor samples
///
/// Implementations must tolerate being called from the platform's delivery
/// thread.
pub trait SensorObserver: Send + Sync {
    /// Handle one raw sample
    fn on_sample(&self, kind: SensorKind, values: Vector3<f32>);

    /// Handle an accuracy change
    fn on_accuracy_changed(&self, kind: SensorKind, accuracy: SensorAccuracy);

    /// Handle a timestamped sample; the timestamp is ignored by default
    fn on_event(&self, sample: SensorSample) {
        self.on_sample(sample.kind, sample.values);
    }
}

/// Platform sensor subscription service
///
/// Sources hold the observer weakly and should stop delivering once it can
/// no longer be upgraded.
pub trait SensorSource: Send + Sync {
    /// Start delivering samples of `kind` to `observer`
    ///
    /// May be called repeatedly for the same kind and observer.
    fn subscribe(
        &self,
        kind: SensorKind,
        rate: SampleRate,
        observer: Weak<dyn SensorObserver>,
    ) -> Result<SubscriptionHandle, SensorError>;

    /// Stop the subscription identified by `handle`
    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let _ = handle;
    }
}

impl<T> SensorSource for Arc<T>
where
    T: SensorSource + ?Sized,
{
    fn subscribe(
        &self,
        kind: SensorKind,
        rate: SampleRate,
        observer: Weak<dyn SensorObserver>,
    ) -> Result<SubscriptionHandle, SensorError> {
        (**self).subscribe(kind, rate, observer)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        (**self).unsubscribe(handle);
    }
}
