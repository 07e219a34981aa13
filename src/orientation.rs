//! Accelerometer and magnetometer fusion into a rotation matrix and heading
//!
//! The rotation matrix maps device coordinates into a world frame whose
//! X axis points magnetic east, Y points magnetic north and Z points up
//! (away from the centre of the earth).

use nalgebra::{Matrix3, Vector3};

use crate::math::{RAD_TO_DEG, STANDARD_GRAVITY, Vector3Ext, normalize_degrees};

/// Squared gravity magnitude below which the device is treated as in free fall
const FREE_FALL_GRAVITY_SQUARED: f32 = 0.01 * STANDARD_GRAVITY * STANDARD_GRAVITY;

/// Minimum magnitude of `geomagnetic × gravity` for a usable east vector
const MIN_EAST_MAGNITUDE: f32 = 0.1;

/// Device orientation angles extracted from a rotation matrix, in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    /// Rotation about the vertical axis, 0 when the device Y axis points north
    pub azimuth: f32,
    /// Rotation about the device X axis
    pub pitch: f32,
    /// Rotation about the device Y axis
    pub roll: f32,
}

impl Orientation {
    /// Extract azimuth, pitch and roll from a device-to-world rotation matrix
    ///
    /// # Example
    /// ```
    /// use nalgebra::Matrix3;
    /// use compass_heading::Orientation;
    ///
    /// let orientation = Orientation::from_rotation_matrix(&Matrix3::identity());
    /// assert_eq!(orientation.azimuth, 0.0);
    /// ```
    pub fn from_rotation_matrix(rotation: &Matrix3<f32>) -> Self {
        Self {
            azimuth: rotation[(0, 1)].atan2(rotation[(1, 1)]),
            pitch: (-rotation[(2, 1)]).clamp(-1.0, 1.0).asin(),
            roll: (-rotation[(2, 0)]).atan2(rotation[(2, 2)]),
        }
    }

    /// Orientation angles converted to degrees as (azimuth, pitch, roll)
    pub fn to_degrees(&self) -> Vector3<f32> {
        Vector3::new(self.azimuth, self.pitch, self.roll) * RAD_TO_DEG
    }
}

/// Compute the device-to-world rotation matrix from gravity and geomagnetic vectors
///
/// Returns `None` when the geometry is degenerate: the gravity vector is
/// shorter than a tenth of standard gravity, or the two vectors are
/// (nearly) parallel so no horizontal east direction exists.
///
/// # Arguments
/// * `gravity` - Smoothed accelerometer reading in m/s²
/// * `geomagnetic` - Smoothed magnetometer reading in µT
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use compass_heading::rotation_matrix;
///
/// let level = Vector3::new(0.0, 0.0, 9.81);
/// assert!(rotation_matrix(level, Vector3::new(0.0, 30.0, -40.0)).is_some());
/// assert!(rotation_matrix(level, Vector3::new(0.0, 0.0, -40.0)).is_none());
/// ```
pub fn rotation_matrix(gravity: Vector3<f32>, geomagnetic: Vector3<f32>) -> Option<Matrix3<f32>> {
    let gravity_squared = gravity.magnitude_squared();
    if !(gravity_squared >= FREE_FALL_GRAVITY_SQUARED) {
        return None;
    }

    let east = geomagnetic.cross(&gravity);
    let east_magnitude = east.magnitude();
    if !(east_magnitude >= MIN_EAST_MAGNITUDE) {
        return None;
    }

    let east = east / east_magnitude;
    let up = gravity.safe_normalize();
    let north = up.cross(&east);

    Some(Matrix3::from_rows(&[
        east.transpose(),
        north.transpose(),
        up.transpose(),
    ]))
}

/// Compute the inclination matrix, which rotates the geomagnetic vector into
/// the world frame's north/up plane
///
/// Returns `None` for the same degenerate inputs as [`rotation_matrix`],
/// which include a zero geomagnetic vector.
pub fn inclination_matrix(
    gravity: Vector3<f32>,
    geomagnetic: Vector3<f32>,
) -> Option<Matrix3<f32>> {
    let rotation = rotation_matrix(gravity, geomagnetic)?;
    let field = geomagnetic.safe_normalize();

    let up = rotation.row(2).transpose();
    let north = rotation.row(1).transpose();
    let sin_dip = up.dot(&field);
    let cos_dip = north.dot(&field);

    Some(Matrix3::new(
        1.0, 0.0, 0.0, //
        0.0, cos_dip, sin_dip, //
        0.0, -sin_dip, cos_dip,
    ))
}

/// Magnetic dip angle in radians from an inclination matrix
///
/// Negative when the field points below the horizon, as it does in the
/// northern hemisphere.
pub fn inclination(inclination: &Matrix3<f32>) -> f32 {
    inclination[(1, 2)].atan2(inclination[(1, 1)])
}

/// Convert orientation angles into a heading in degrees
///
/// The heading is the negated azimuth, wrapped into (-180°, 180°].
pub fn heading_from_orientation(orientation: &Orientation) -> f32 {
    normalize_degrees(-(orientation.azimuth * RAD_TO_DEG))
}

/// Fuse gravity and geomagnetic vectors into a heading in degrees
///
/// Returns `None` when [`rotation_matrix`] reports degenerate geometry.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use compass_heading::calculate_heading;
///
/// let gravity = Vector3::new(0.0, 0.0, 9.81);
/// let heading = calculate_heading(gravity, Vector3::new(0.0, 25.0, -40.0)).unwrap();
/// assert!(heading.abs() < 1e-3);
/// ```
pub fn calculate_heading(gravity: Vector3<f32>, geomagnetic: Vector3<f32>) -> Option<f32> {
    let rotation = rotation_matrix(gravity, geomagnetic)?;
    let orientation = Orientation::from_rotation_matrix(&rotation);
    Some(heading_from_orientation(&orientation))
}
