//! Threaded heading demonstration
//!
//! A simulated sensor service streams noisy accelerometer and magnetometer
//! samples from background threads while the main thread asks for headings.
//!
//! Run with: `RUST_LOG=debug cargo run --example threaded`

use compass_heading::{
    HeadingError, HeadingResolver, ResolverSettings, SampleRate, SensorError, SensorKind,
    SensorObserver, SensorSource, SubscriptionHandle,
};
use nalgebra::Vector3;
use rand::prelude::*;
use rand_pcg::Pcg64;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Device slowly turning clockwise at this rate
const TURN_RATE_DEG_PER_SEC: f32 = 20.0;

struct SimulatedSensors {
    started: Instant,
    next_id: AtomicU64,
    /// Run flag of each live stream, keyed by subscription id
    streams: Mutex<HashMap<u64, Arc<AtomicBool>>>,
}

impl SimulatedSensors {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            next_id: AtomicU64::new(0),
            streams: Mutex::new(HashMap::new()),
        }
    }

    fn sample(kind: SensorKind, elapsed: f32, rng: &mut Pcg64) -> Vector3<f32> {
        let noise = |rng: &mut Pcg64, scale: f32| rng.random_range(-scale..scale);
        match kind {
            SensorKind::Accelerometer => Vector3::new(
                noise(rng, 0.2),
                noise(rng, 0.2),
                9.81 + noise(rng, 0.2),
            ),
            SensorKind::Magnetic => {
                let yaw = (elapsed * TURN_RATE_DEG_PER_SEC).to_radians();
                Vector3::new(
                    22.0 * yaw.sin() + noise(rng, 1.0),
                    22.0 * yaw.cos() + noise(rng, 1.0),
                    -41.0 + noise(rng, 1.0),
                )
            }
        }
    }
}

impl SensorSource for SimulatedSensors {
    fn subscribe(
        &self,
        kind: SensorKind,
        rate: SampleRate,
        observer: Weak<dyn SensorObserver>,
    ) -> Result<SubscriptionHandle, SensorError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let started = self.started;
        let running = Arc::new(AtomicBool::new(true));
        self.streams.lock().insert(id, running.clone());
        let period = rate.sampling_period();

        thread::spawn(move || {
            let mut rng = Pcg64::seed_from_u64(id);
            while running.load(Ordering::SeqCst) {
                let Some(observer) = observer.upgrade() else {
                    break;
                };
                let elapsed = started.elapsed().as_secs_f32();
                observer.on_sample(kind, Self::sample(kind, elapsed, &mut rng));
                drop(observer);
                thread::sleep(period);
            }
        });

        Ok(SubscriptionHandle::new(id, kind))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if let Some(running) = self.streams.lock().remove(&handle.id()) {
            tracing::info!(kind = %handle.kind(), id = handle.id(), "stopping simulated stream");
            running.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for SimulatedSensors {
    fn drop(&mut self) {
        for running in self.streams.get_mut().values() {
            running.store(false, Ordering::SeqCst);
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = ResolverSettings {
        sample_rate: SampleRate::Game,
        request_timeout: Some(Duration::from_secs(2)),
        ..Default::default()
    };
    let resolver = HeadingResolver::with_settings(SimulatedSensors::new(), settings)?;

    for _ in 0..5 {
        match resolver.wait_for_heading(Duration::from_secs(1)) {
            Ok(heading) => println!("Heading: {:7.2}°", heading),
            Err(HeadingError::Timeout(after)) => println!("No heading within {:?}", after),
            Err(error) => return Err(error.into()),
        }
        thread::sleep(Duration::from_millis(500));
    }

    resolver.release_subscriptions();
    Ok(())
}
