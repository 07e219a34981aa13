//! Core types and settings for the compass heading library

use core::time::Duration;

use crate::error::HeadingError;
use crate::filter::DEFAULT_ALPHA;
use crate::sensor::SampleRate;

/// Heading resolver settings
///
/// The defaults reproduce the classic one-shot compass behaviour: smoothing
/// state survives between requests, subscriptions are never released and a
/// request waits for as long as it takes.
///
/// # Example
/// ```
/// use core::time::Duration;
/// use compass_heading::{ResolverSettings, SampleRate};
///
/// let settings = ResolverSettings {
///     alpha: 0.1,                                   // heavier smoothing
///     sample_rate: SampleRate::Ui,
///     request_timeout: Some(Duration::from_secs(2)),
///     ..Default::default()
/// };
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResolverSettings {
    /// Low-pass smoothing factor in [0, 1] (typically 0.25)
    ///
    /// Higher values follow raw samples more closely; lower values smooth
    /// more but respond slower.
    pub alpha: f32,
    /// Rate requested from the sensor source for both streams
    pub sample_rate: SampleRate,
    /// Age after which a pending request is dropped without delivery
    ///
    /// `None` lets a request wait indefinitely.
    pub request_timeout: Option<Duration>,
    /// Clear both smoothed vectors whenever a new request is made
    ///
    /// When `false` a request can be answered from smoothing state left
    /// over from an earlier request.
    pub reset_on_request: bool,
    /// Release all sensor subscriptions after a heading is delivered
    pub unsubscribe_on_delivery: bool,
}

impl ResolverSettings {
    /// Check settings for values the resolver cannot work with
    pub fn validate(&self) -> Result<(), HeadingError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(HeadingError::InvalidSettings(format!(
                "alpha must be within [0, 1], got {}",
                self.alpha
            )));
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(HeadingError::InvalidSettings(
                "request timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            sample_rate: SampleRate::default(),
            request_timeout: None,
            reset_on_request: false,
            unsubscribe_on_delivery: false,
        }
    }
}

/// Lifecycle state of the heading resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverState {
    /// No request pending
    #[default]
    Idle,
    /// A request is pending and waiting for a fused heading
    Awaiting,
}

/// Identifier of one heading request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl RequestId {
    pub fn value(&self) -> u64 {
        self.0
    }
}
