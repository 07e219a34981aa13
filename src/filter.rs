//! Single-pole low-pass filter for 3-axis sensor vectors

use nalgebra::Vector3;

/// Default smoothing factor shared by the accelerometer and magnetometer streams
///
/// Larger values follow the raw signal more closely. `1.0` passes samples
/// through unchanged and `0.0` freezes the output at its first value.
pub const DEFAULT_ALPHA: f32 = 0.25;

/// Apply one step of the exponential moving average
///
/// When `previous` is `None` the sample is returned unchanged, so the first
/// observation seeds the filter state. Otherwise each axis is updated
/// independently as `previous + alpha * (sample - previous)`.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use compass_heading::filter::{low_pass, DEFAULT_ALPHA};
///
/// let first = low_pass(Vector3::new(4.0, 0.0, 0.0), None, DEFAULT_ALPHA);
/// assert_eq!(first, Vector3::new(4.0, 0.0, 0.0));
///
/// let second = low_pass(Vector3::new(0.0, 0.0, 0.0), Some(first), DEFAULT_ALPHA);
/// assert_eq!(second, Vector3::new(3.0, 0.0, 0.0));
/// ```
pub fn low_pass(sample: Vector3<f32>, previous: Option<Vector3<f32>>, alpha: f32) -> Vector3<f32> {
    match previous {
        None => sample,
        Some(previous) => previous + (sample - previous) * alpha,
    }
}

/// Slice form of [`low_pass`] for raw platform sample buffers
///
/// # Panics
/// Panics if `sample` or `previous` does not hold exactly three components.
pub fn low_pass_slice(sample: &[f32], previous: Option<&[f32]>, alpha: f32) -> [f32; 3] {
    let sample = to_vector(sample);
    let previous = previous.map(to_vector);
    low_pass(sample, previous, alpha).into()
}

fn to_vector(values: &[f32]) -> Vector3<f32> {
    assert_eq!(
        values.len(),
        3,
        "low-pass filter expects 3 components, got {}",
        values.len()
    );
    Vector3::from_column_slice(values)
}

/// Low-pass filter owning the smoothed value of one sensor stream
///
/// The smoothed value stays unset until the first sample arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter {
    alpha: f32,
    value: Option<Vector3<f32>>,
}

impl LowPassFilter {
    /// Create an empty filter with the given smoothing factor
    pub fn new(alpha: f32) -> Self {
        Self { alpha, value: None }
    }

    /// Feed a raw sample and return the updated smoothed value
    pub fn update(&mut self, sample: Vector3<f32>) -> Vector3<f32> {
        let next = low_pass(sample, self.value, self.alpha);
        self.value = Some(next);
        next
    }

    /// Current smoothed value, if any sample has been observed
    pub fn value(&self) -> Option<Vector3<f32>> {
        self.value
    }

    /// Forget the smoothed value so the next sample seeds the filter again
    pub fn reset(&mut self) {
        self.value = None;
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}
