//! Mathematical utilities and nalgebra extensions for the compass heading library

use nalgebra::Vector3;

/// Radians to degrees
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Standard gravity in m/s²
pub const STANDARD_GRAVITY: f32 = 9.80665;

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Normalize the vector, returning the zero vector if its magnitude is zero
    fn safe_normalize(&self) -> Vector3<f32>;

    /// True when every component is finite
    fn all_finite(&self) -> bool;
}

impl Vector3Ext for Vector3<f32> {
    fn safe_normalize(&self) -> Vector3<f32> {
        let magnitude_squared = self.magnitude_squared();

        if magnitude_squared == 0.0 {
            return Vector3::zeros();
        }

        *self * (1.0 / magnitude_squared.sqrt())
    }

    fn all_finite(&self) -> bool {
        self.iter().all(|component| component.is_finite())
    }
}

/// Wrap an angle in degrees into the half-open range (-180°, 180°]
///
/// Negative zero is folded to positive zero.
///
/// # Example
/// ```
/// use compass_heading::normalize_degrees;
///
/// assert_eq!(normalize_degrees(-180.0), 180.0);
/// assert_eq!(normalize_degrees(270.0), -90.0);
/// assert_eq!(normalize_degrees(45.0), 45.0);
/// ```
pub fn normalize_degrees(degrees: f32) -> f32 {
    let mut wrapped = degrees % 360.0;
    if wrapped <= -180.0 {
        wrapped += 360.0;
    } else if wrapped > 180.0 {
        wrapped -= 360.0;
    }
    wrapped + 0.0
}
