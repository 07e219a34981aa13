use compass_heading::{
    HeadingResolver, SampleRate, SensorError, SensorKind, SensorObserver, SensorSource,
    SubscriptionHandle,
};
use nalgebra::Vector3;
use std::sync::Weak;

/// Stand-in for a platform sensor service; samples are pushed by hand below
struct ManualSource;

impl SensorSource for ManualSource {
    fn subscribe(
        &self,
        kind: SensorKind,
        rate: SampleRate,
        _observer: Weak<dyn SensorObserver>,
    ) -> Result<SubscriptionHandle, SensorError> {
        println!("Subscribed to {} at {:?}", kind, rate.sampling_period());
        Ok(SubscriptionHandle::new(0, kind))
    }
}

fn main() {
    let resolver = HeadingResolver::new(ManualSource).expect("default settings are valid");

    resolver.get_direction(|heading| println!("Heading: {:.1}°", heading));

    // replace these with actual accelerometer (m/s²) and magnetometer (µT) samples
    for step in 0..10 {
        let angle = (step as f32 * 9.0).to_radians();
        let accelerometer = Vector3::new(0.0, 0.0, 9.81);
        let magnetometer = Vector3::new(22.0 * angle.sin(), 22.0 * angle.cos(), -41.0);

        resolver.on_sample(SensorKind::Accelerometer, accelerometer);
        resolver.on_sample(SensorKind::Magnetic, magnetometer);

        println!(
            "Step {}: last fused heading {:.1}°",
            step,
            resolver.last_heading().unwrap_or(f32::NAN)
        );
    }
}
