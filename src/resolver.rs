//! One-shot heading resolver
//!
//! [`HeadingResolver`] keeps a single pending request slot and one smoothed
//! vector per sensor kind. Each incoming sample updates its kind's smoothed
//! vector and then attempts fusion. The first successful fusion after a
//! request is delivered to that request's continuation and clears the slot.
//!
//! # Example
//! ```
//! use std::sync::{Arc, Mutex, Weak};
//! use nalgebra::Vector3;
//! use compass_heading::{
//!     HeadingResolver, SampleRate, SensorError, SensorKind, SensorObserver, SensorSource,
//!     SubscriptionHandle,
//! };
//!
//! struct ManualSource;
//!
//! impl SensorSource for ManualSource {
//!     fn subscribe(
//!         &self,
//!         kind: SensorKind,
//!         _rate: SampleRate,
//!         _observer: Weak<dyn SensorObserver>,
//!     ) -> Result<SubscriptionHandle, SensorError> {
//!         Ok(SubscriptionHandle::new(0, kind))
//!     }
//! }
//!
//! let resolver = HeadingResolver::new(ManualSource).unwrap();
//! let heading = Arc::new(Mutex::new(None));
//! let slot = heading.clone();
//! resolver.get_direction(move |degrees| *slot.lock().unwrap() = Some(degrees));
//!
//! resolver.on_sample(SensorKind::Accelerometer, Vector3::new(0.0, 0.0, 9.81));
//! resolver.on_sample(SensorKind::Magnetic, Vector3::new(30.0, 0.0, -40.0));
//!
//! let degrees = heading.lock().unwrap().unwrap();
//! assert!((degrees - 90.0).abs() < 1e-3);
//! ```

use core::time::Duration;
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::time::Instant;

use nalgebra::Vector3;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{HeadingError, SensorError};
use crate::filter::LowPassFilter;
use crate::math::Vector3Ext;
use crate::orientation::calculate_heading;
use crate::sensor::{
    SensorAccuracy, SensorKind, SensorObserver, SensorSource, SubscriptionHandle,
};
use crate::types::{RequestId, ResolverSettings, ResolverState};

/// Single-use callback receiving a heading in degrees
pub type Continuation = Box<dyn FnOnce(f32) + Send + 'static>;

struct PendingRequest {
    id: RequestId,
    continuation: Continuation,
    issued_at: Instant,
}

/// State shared between request callers and the sensor delivery thread
struct Inner {
    pending: Option<PendingRequest>,
    accelerometer: LowPassFilter,
    magnetic: LowPassFilter,
    subscriptions: HashMap<SensorKind, SubscriptionHandle>,
    last_heading: Option<f32>,
    last_expired: Option<RequestId>,
    next_request_id: u64,
}

impl Inner {
    fn new(alpha: f32) -> Self {
        Self {
            pending: None,
            accelerometer: LowPassFilter::new(alpha),
            magnetic: LowPassFilter::new(alpha),
            subscriptions: HashMap::new(),
            last_heading: None,
            last_expired: None,
            next_request_id: 0,
        }
    }

    fn filter(&self, kind: SensorKind) -> &LowPassFilter {
        match kind {
            SensorKind::Accelerometer => &self.accelerometer,
            SensorKind::Magnetic => &self.magnetic,
        }
    }

    fn filter_mut(&mut self, kind: SensorKind) -> &mut LowPassFilter {
        match kind {
            SensorKind::Accelerometer => &mut self.accelerometer,
            SensorKind::Magnetic => &mut self.magnetic,
        }
    }

    /// Fuse the smoothed vectors, if both kinds have been observed
    fn fuse(&self) -> Option<f32> {
        let gravity = self.accelerometer.value()?;
        let geomagnetic = self.magnetic.value()?;

        let heading = calculate_heading(gravity, geomagnetic);
        if heading.is_none() {
            trace!(?gravity, ?geomagnetic, "degenerate fusion geometry, waiting for next sample");
        }
        heading
    }

    fn take_expired(&mut self, timeout: Option<Duration>, now: Instant) -> Option<PendingRequest> {
        let timeout = timeout?;
        let age = now.saturating_duration_since(self.pending.as_ref()?.issued_at);
        if age < timeout {
            return None;
        }

        let expired = self.pending.take()?;
        self.last_expired = Some(expired.id);
        Some(expired)
    }
}

/// Resolves one compass heading per request from accelerometer and magnetometer streams
///
/// Created behind an [`Arc`] so it can hand a weak reference to itself to
/// the [`SensorSource`] as the sample observer.
pub struct HeadingResolver<S> {
    source: S,
    settings: ResolverSettings,
    inner: Mutex<Inner>,
    observer: Weak<Self>,
}

impl<S> HeadingResolver<S>
where
    S: SensorSource + 'static,
{
    /// Create a resolver with default settings
    pub fn new(source: S) -> Result<Arc<Self>, HeadingError> {
        Self::with_settings(source, ResolverSettings::default())
    }

    /// Create a resolver with the given settings
    ///
    /// # Errors
    /// Returns [`HeadingError::InvalidSettings`] when the settings fail
    /// [`ResolverSettings::validate`].
    pub fn with_settings(source: S, settings: ResolverSettings) -> Result<Arc<Self>, HeadingError> {
        settings.validate()?;

        Ok(Arc::new_cyclic(|observer| Self {
            source,
            settings,
            inner: Mutex::new(Inner::new(settings.alpha)),
            observer: observer.clone(),
        }))
    }

    /// Request one heading value
    ///
    /// Replaces any pending request; the replaced continuation is dropped
    /// without being called. Subscribes to both sensor streams every time;
    /// a handle the source replaces is released. Subscription failures are
    /// logged and the request stays pending.
    pub fn request_heading<F>(&self, continuation: F) -> RequestId
    where
        F: FnOnce(f32) + Send + 'static,
    {
        let (id, _) = self.submit(Box::new(continuation));
        id
    }

    /// Store `continuation` as the pending request and subscribe both streams
    ///
    /// Returns the first subscription failure alongside the request id.
    fn submit(&self, continuation: Continuation) -> (RequestId, Option<SensorError>) {
        let (id, superseded) = {
            let mut inner = self.inner.lock();
            inner.next_request_id += 1;
            let id = RequestId(inner.next_request_id);

            if self.settings.reset_on_request {
                inner.accelerometer.reset();
                inner.magnetic.reset();
            }

            let superseded = inner.pending.replace(PendingRequest {
                id,
                continuation,
                issued_at: Instant::now(),
            });
            (id, superseded)
        };

        if let Some(previous) = superseded {
            debug!(
                request_id = id.value(),
                superseded = previous.id.value(),
                "heading request superseded"
            );
        }

        (id, self.subscribe_all())
    }

    /// Host-facing entry point, equivalent to [`request_heading`](Self::request_heading)
    pub fn get_direction<F>(&self, continuation: F)
    where
        F: FnOnce(f32) + Send + 'static,
    {
        self.request_heading(continuation);
    }

    /// Request a heading and block until it arrives or `timeout` elapses
    ///
    /// Must not be called from the thread that delivers sensor samples.
    ///
    /// # Errors
    /// * [`HeadingError::Timeout`] when no heading arrived in time; the
    ///   request is cancelled.
    /// * [`HeadingError::Superseded`] when a later request replaced this one.
    /// * [`HeadingError::Sensor`] when a stream could not be subscribed and
    ///   no heading was already on its way; the request is cancelled.
    pub fn wait_for_heading(&self, timeout: Duration) -> Result<f32, HeadingError> {
        let (sender, receiver) = mpsc::sync_channel(1);
        let (id, failure) = self.submit(Box::new(move |heading| {
            let _ = sender.send(heading);
        }));

        // Stale smoothed state may still answer a request missing a stream
        if let Some(error) = failure {
            if self.cancel(id) {
                return Err(error.into());
            }
        }

        match receiver.recv_timeout(timeout) {
            Ok(heading) => Ok(heading),
            Err(RecvTimeoutError::Timeout) => {
                if self.cancel(id) {
                    return Err(HeadingError::Timeout(timeout));
                }
                // Already taken by a delivery or a replacement
                receiver.recv().map_err(|_| self.abandoned(id, timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(self.abandoned(id, timeout)),
        }
    }

    fn abandoned(&self, id: RequestId, timeout: Duration) -> HeadingError {
        if self.inner.lock().last_expired == Some(id) {
            HeadingError::Timeout(self.settings.request_timeout.unwrap_or(timeout))
        } else {
            HeadingError::Superseded
        }
    }

    /// Cancel the pending request if it is still `id`
    ///
    /// Returns `true` when a request was removed. The continuation is dropped
    /// without being called.
    pub fn cancel(&self, id: RequestId) -> bool {
        let cancelled = {
            let mut inner = self.inner.lock();
            let is_current = inner.pending.as_ref().is_some_and(|pending| pending.id == id);
            if is_current { inner.pending.take() } else { None }
        };

        match cancelled {
            Some(_) => {
                debug!(request_id = id.value(), "heading request cancelled");
                true
            }
            None => false,
        }
    }

    /// Drop the pending request if it is older than the configured timeout
    ///
    /// Returns `true` when a request was dropped. Does nothing when
    /// [`ResolverSettings::request_timeout`] is `None`.
    pub fn expire_stale(&self, now: Instant) -> bool {
        let expired = self
            .inner
            .lock()
            .take_expired(self.settings.request_timeout, now);

        match expired {
            Some(request) => {
                warn!(request_id = request.id.value(), "heading request expired without delivery");
                true
            }
            None => false,
        }
    }

    /// Handle one raw sample from the sensor source
    ///
    /// Non-finite samples are ignored so they cannot poison the smoothed state.
    pub fn on_sample(&self, kind: SensorKind, values: Vector3<f32>) {
        if !values.all_finite() {
            trace!(%kind, ?values, "ignoring non-finite sample");
            return;
        }

        let now = Instant::now();
        let (expired, delivery) = {
            let mut inner = self.inner.lock();
            let expired = inner.take_expired(self.settings.request_timeout, now);

            let smoothed = inner.filter_mut(kind).update(values);
            trace!(%kind, x = smoothed.x, y = smoothed.y, z = smoothed.z, "smoothed sample");

            let delivery = inner.fuse().and_then(|heading| {
                inner.last_heading = Some(heading);
                inner.pending.take().map(|request| (request, heading))
            });
            (expired, delivery)
        };

        if let Some(request) = expired {
            warn!(request_id = request.id.value(), "heading request expired without delivery");
        }

        let Some((request, heading)) = delivery else {
            return;
        };

        debug!(request_id = request.id.value(), heading, "delivering heading");
        (request.continuation)(heading);

        if self.settings.unsubscribe_on_delivery {
            self.release_subscriptions();
        }
    }

    /// Handle a raw platform sample buffer; only the first three values are used
    ///
    /// # Panics
    /// Panics if `values` holds fewer than three components.
    pub fn on_sample_slice(&self, kind: SensorKind, values: &[f32]) {
        let &[x, y, z, ..] = values else {
            panic!("{} sample needs 3 components, got {}", kind, values.len());
        };
        self.on_sample(kind, Vector3::new(x, y, z));
    }

    /// Release every subscription the resolver holds
    pub fn release_subscriptions(&self) {
        let mut held = core::mem::take(&mut self.inner.lock().subscriptions);
        for kind in SensorKind::ALL {
            if let Some(handle) = held.remove(&kind) {
                self.release(handle);
            }
        }
    }

    fn release(&self, handle: SubscriptionHandle) {
        debug!(kind = %handle.kind(), id = handle.id(), "releasing sensor subscription");
        self.source.unsubscribe(handle);
    }

    /// Subscribe both streams, keeping one handle per kind
    fn subscribe_all(&self) -> Option<SensorError> {
        let observer: Weak<dyn SensorObserver> = self.observer.clone();
        let mut failure = None;

        for kind in SensorKind::ALL {
            match self
                .source
                .subscribe(kind, self.settings.sample_rate, observer.clone())
            {
                Ok(handle) => {
                    let replaced = self.inner.lock().subscriptions.insert(kind, handle);
                    if let Some(previous) = replaced.filter(|previous| *previous != handle) {
                        self.release(previous);
                    }
                }
                Err(error) => {
                    warn!(%kind, %error, "sensor subscription failed");
                    failure.get_or_insert(error);
                }
            }
        }

        // A source may deliver synchronously while subscribing
        if self.settings.unsubscribe_on_delivery && self.state() == ResolverState::Idle {
            self.release_subscriptions();
        }
        failure
    }

    pub fn state(&self) -> ResolverState {
        if self.inner.lock().pending.is_some() {
            ResolverState::Awaiting
        } else {
            ResolverState::Idle
        }
    }

    /// Current smoothed vector for `kind`, if that kind has been observed
    pub fn smoothed(&self, kind: SensorKind) -> Option<Vector3<f32>> {
        self.inner.lock().filter(kind).value()
    }

    /// Most recent successfully fused heading, delivered or not
    pub fn last_heading(&self) -> Option<f32> {
        self.inner.lock().last_heading
    }

    /// Handles of the subscriptions currently held, at most one per kind
    pub fn subscriptions(&self) -> Vec<SubscriptionHandle> {
        let inner = self.inner.lock();
        SensorKind::ALL
            .iter()
            .filter_map(|kind| inner.subscriptions.get(kind).copied())
            .collect()
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S> SensorObserver for HeadingResolver<S>
where
    S: SensorSource + 'static,
{
    fn on_sample(&self, kind: SensorKind, values: Vector3<f32>) {
        HeadingResolver::on_sample(self, kind, values);
    }

    fn on_accuracy_changed(&self, kind: SensorKind, accuracy: SensorAccuracy) {
        debug!(%kind, ?accuracy, "sensor accuracy changed");
    }
}
