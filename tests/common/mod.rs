#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use compass_heading::{
    SampleRate, SensorError, SensorKind, SensorObserver, SensorSource, SubscriptionHandle,
};
use nalgebra::Vector3;

/// Sensor source that records calls and lets the test push samples by hand
#[derive(Default)]
pub struct MockSource {
    next_id: AtomicU64,
    missing: Vec<SensorKind>,
    pub subscribed: Mutex<Vec<(SensorKind, SampleRate)>>,
    pub unsubscribed: Mutex<Vec<SubscriptionHandle>>,
    observers: Mutex<Vec<Weak<dyn SensorObserver>>>,
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Source whose subscribe call fails for `kinds`
    pub fn without(kinds: &[SensorKind]) -> Arc<Self> {
        Arc::new(Self {
            missing: kinds.to_vec(),
            ..Default::default()
        })
    }

    pub fn subscribe_count(&self, kind: SensorKind) -> usize {
        self.subscribed
            .lock()
            .unwrap()
            .iter()
            .filter(|(subscribed, _)| *subscribed == kind)
            .count()
    }

    /// Deliver a sample to every live observer
    pub fn emit(&self, kind: SensorKind, values: Vector3<f32>) {
        let observers: Vec<_> = self.observers.lock().unwrap().clone();
        for observer in observers.iter().filter_map(Weak::upgrade) {
            observer.on_sample(kind, values);
        }
    }
}

impl SensorSource for MockSource {
    fn subscribe(
        &self,
        kind: SensorKind,
        rate: SampleRate,
        observer: Weak<dyn SensorObserver>,
    ) -> Result<SubscriptionHandle, SensorError> {
        self.subscribed.lock().unwrap().push((kind, rate));
        if self.missing.contains(&kind) {
            return Err(SensorError::Unavailable(kind));
        }

        let mut observers = self.observers.lock().unwrap();
        if !observers.iter().any(|known| Weak::ptr_eq(known, &observer)) {
            observers.push(observer);
        }
        drop(observers);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(SubscriptionHandle::new(id, kind))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.unsubscribed.lock().unwrap().push(handle);
    }
}

/// Collects every heading a continuation receives
#[derive(Clone, Default)]
pub struct Recorder {
    headings: Arc<Mutex<Vec<f32>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl FnOnce(f32) + Send + 'static {
        let headings = self.headings.clone();
        move |heading| headings.lock().unwrap().push(heading)
    }

    pub fn headings(&self) -> Vec<f32> {
        self.headings.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.headings.lock().unwrap().len()
    }
}

pub fn level() -> Vector3<f32> {
    Vector3::new(0.0, 0.0, 9.81)
}

/// Earth field with north along the device Y axis
pub fn north_field() -> Vector3<f32> {
    Vector3::new(0.0, 22.0, -41.0)
}

/// Earth field with north along the device X axis
pub fn field_along_x() -> Vector3<f32> {
    Vector3::new(22.0, 0.0, -41.0)
}
