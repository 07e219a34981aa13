mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use common::{MockSource, Recorder, field_along_x, level, north_field};
use compass_heading::{
    HeadingError, HeadingResolver, ResolverSettings, ResolverState, SampleRate, SensorError,
    SensorKind, SensorObserver, SensorSource, SubscriptionHandle,
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Source that answers every subscription by delivering one sample inline
struct ImmediateSource;

impl SensorSource for ImmediateSource {
    fn subscribe(
        &self,
        kind: SensorKind,
        _rate: SampleRate,
        observer: Weak<dyn SensorObserver>,
    ) -> Result<SubscriptionHandle, SensorError> {
        if let Some(observer) = observer.upgrade() {
            let values = match kind {
                SensorKind::Accelerometer => level(),
                SensorKind::Magnetic => field_along_x(),
            };
            observer.on_sample(kind, values);
        }
        Ok(SubscriptionHandle::new(0, kind))
    }
}

/// Source that streams samples from a background thread at the requested rate
struct ThreadedSource {
    spawned: AtomicUsize,
}

impl ThreadedSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            spawned: AtomicUsize::new(0),
        })
    }
}

impl SensorSource for ThreadedSource {
    fn subscribe(
        &self,
        kind: SensorKind,
        rate: SampleRate,
        observer: Weak<dyn SensorObserver>,
    ) -> Result<SubscriptionHandle, SensorError> {
        let id = self.spawned.fetch_add(1, Ordering::SeqCst) as u64;
        let period = rate.sampling_period();

        thread::spawn(move || {
            for _ in 0..200 {
                let Some(observer) = observer.upgrade() else {
                    return;
                };
                let values = match kind {
                    SensorKind::Accelerometer => level(),
                    SensorKind::Magnetic => north_field(),
                };
                observer.on_sample(kind, values);
                drop(observer);
                thread::sleep(period);
            }
        });

        Ok(SubscriptionHandle::new(id, kind))
    }
}

/// Layer that reports and then stalls the first debug event on its thread
///
/// The resolver logs the delivery at debug level after taking the request
/// and before running the continuation, so this holds a delivery halfway.
struct StallDelivery {
    taken: Sender<()>,
    stall: Duration,
}

impl<S: Subscriber> Layer<S> for StallDelivery {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::DEBUG {
            let _ = self.taken.send(());
            thread::sleep(self.stall);
        }
    }
}

/// Source whose worker thread takes the request but runs the continuation late
struct LateDeliverySource {
    stall: Duration,
}

impl SensorSource for LateDeliverySource {
    fn subscribe(
        &self,
        kind: SensorKind,
        _rate: SampleRate,
        observer: Weak<dyn SensorObserver>,
    ) -> Result<SubscriptionHandle, SensorError> {
        if kind == SensorKind::Magnetic {
            let (taken, on_taken) = mpsc::channel();
            let stall = self.stall;

            thread::spawn(move || {
                let Some(observer) = observer.upgrade() else {
                    return;
                };
                let subscriber = tracing_subscriber::registry().with(StallDelivery { taken, stall });
                tracing::subscriber::with_default(subscriber, || {
                    observer.on_sample(SensorKind::Accelerometer, level());
                    observer.on_sample(SensorKind::Magnetic, north_field());
                });
            });

            // Return only once the worker holds the request
            let _ = on_taken.recv();
        }
        Ok(SubscriptionHandle::new(0, kind))
    }
}

/// Test that a source delivering inside subscribe does not deadlock
#[test]
fn test_synchronous_delivery_during_subscribe() {
    let resolver = HeadingResolver::new(ImmediateSource).unwrap();
    let recorder = Recorder::new();

    resolver.request_heading(recorder.callback());

    assert_eq!(recorder.count(), 1);
    assert!((recorder.headings()[0] - 90.0).abs() < 1e-3);
    assert_eq!(resolver.state(), ResolverState::Idle);
}

/// Test that wait_for_heading returns a heading delivered from another thread
#[test]
fn test_wait_for_heading_from_threaded_source() {
    let settings = ResolverSettings {
        sample_rate: SampleRate::Custom(Duration::from_millis(2)),
        ..Default::default()
    };
    let resolver = HeadingResolver::with_settings(ThreadedSource::new(), settings).unwrap();

    let heading = resolver.wait_for_heading(Duration::from_secs(5)).unwrap();
    assert!(heading.abs() < 1e-3, "heading {}", heading);
}

/// Test that wait_for_heading times out and cancels when samples never arrive
#[test]
fn test_wait_for_heading_timeout() {
    let source = MockSource::new();
    let resolver = HeadingResolver::new(source.clone()).unwrap();

    let result = resolver.wait_for_heading(Duration::from_millis(20));

    assert_eq!(result, Err(HeadingError::Timeout(Duration::from_millis(20))));
    assert_eq!(resolver.state(), ResolverState::Idle);
}

/// Test that a heading already taken for delivery is returned after the wait times out
#[test]
fn test_wait_for_heading_timeout_during_delivery() {
    let source = LateDeliverySource {
        stall: Duration::from_millis(200),
    };
    let resolver = HeadingResolver::new(source).unwrap();

    let heading = resolver.wait_for_heading(Duration::from_millis(10)).unwrap();

    assert!(heading.abs() < 1e-3, "heading {}", heading);
    assert_eq!(resolver.state(), ResolverState::Idle);
}

/// Test that wait_for_heading reports a failed subscription instead of waiting
#[test]
fn test_wait_for_heading_reports_sensor_error() {
    let source = MockSource::without(&[SensorKind::Magnetic]);
    let resolver = HeadingResolver::new(source.clone()).unwrap();

    let result = resolver.wait_for_heading(Duration::from_secs(10));

    assert_eq!(
        result,
        Err(HeadingError::Sensor(SensorError::Unavailable(SensorKind::Magnetic)))
    );
    assert_eq!(resolver.state(), ResolverState::Idle);
}

/// Test that a waiting caller learns it was superseded
#[test]
fn test_wait_for_heading_superseded() {
    let source = MockSource::new();
    let resolver = HeadingResolver::new(source.clone()).unwrap();

    let waiter = {
        let resolver = resolver.clone();
        thread::spawn(move || resolver.wait_for_heading(Duration::from_secs(10)))
    };

    // Wait until the waiter's request is pending, then replace it
    while resolver.state() != ResolverState::Awaiting {
        thread::yield_now();
    }
    let recorder = Recorder::new();
    resolver.request_heading(recorder.callback());

    assert_eq!(waiter.join().unwrap(), Err(HeadingError::Superseded));

    source.emit(SensorKind::Accelerometer, level());
    source.emit(SensorKind::Magnetic, north_field());
    assert_eq!(recorder.count(), 1);
}

/// Test that an expired request is dropped on the next sample
#[test]
fn test_request_timeout_expires_on_sample() {
    let source = MockSource::new();
    let settings = ResolverSettings {
        request_timeout: Some(Duration::from_millis(10)),
        ..Default::default()
    };
    let resolver = HeadingResolver::with_settings(source.clone(), settings).unwrap();
    let recorder = Recorder::new();

    resolver.request_heading(recorder.callback());
    thread::sleep(Duration::from_millis(30));

    source.emit(SensorKind::Accelerometer, level());
    source.emit(SensorKind::Magnetic, north_field());

    assert_eq!(recorder.count(), 0);
    assert_eq!(resolver.state(), ResolverState::Idle);
    assert!(resolver.last_heading().is_some());
}

/// Test that a waiting caller whose request expires reports a timeout
#[test]
fn test_wait_for_heading_reports_request_timeout() {
    let source = MockSource::new();
    let settings = ResolverSettings {
        request_timeout: Some(Duration::from_millis(10)),
        ..Default::default()
    };
    let resolver = HeadingResolver::with_settings(source.clone(), settings).unwrap();

    let waiter = {
        let resolver = resolver.clone();
        thread::spawn(move || resolver.wait_for_heading(Duration::from_secs(10)))
    };
    while resolver.state() != ResolverState::Awaiting {
        thread::yield_now();
    }
    thread::sleep(Duration::from_millis(30));
    source.emit(SensorKind::Accelerometer, level());

    assert_eq!(
        waiter.join().unwrap(),
        Err(HeadingError::Timeout(Duration::from_millis(10)))
    );
}

/// Test that concurrent requests and samples never deliver more than once per request
#[test]
fn test_concurrent_requests_and_samples() {
    let source = MockSource::new();
    let resolver = HeadingResolver::new(source.clone()).unwrap();
    let delivered = Arc::new(AtomicUsize::new(0));
    let requests = 200;

    let requester = {
        let resolver = resolver.clone();
        let delivered = delivered.clone();
        thread::spawn(move || {
            let mut counters = Vec::with_capacity(requests);
            for _ in 0..requests {
                let delivered = delivered.clone();
                let calls = Arc::new(AtomicUsize::new(0));
                counters.push(calls.clone());
                resolver.request_heading(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    delivered.fetch_add(1, Ordering::SeqCst);
                });
                thread::yield_now();
            }
            counters
        })
    };

    let sampler = {
        let resolver = resolver.clone();
        thread::spawn(move || {
            for i in 0..2000 {
                let (kind, values) = if i % 2 == 0 {
                    (SensorKind::Accelerometer, level())
                } else {
                    (SensorKind::Magnetic, north_field())
                };
                resolver.on_sample(kind, values);
            }
        })
    };

    let per_request = requester.join().unwrap();
    sampler.join().unwrap();

    assert!(per_request.iter().all(|calls| calls.load(Ordering::SeqCst) <= 1));
    assert!(delivered.load(Ordering::SeqCst) <= requests);
}
