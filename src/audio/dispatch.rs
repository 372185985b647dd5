//! Hand-off of published spectra to the consumer side
//!
//! The audio thread never runs listener code. Each published spectrum is
//! wrapped in a job and queued on a [`Dispatcher`], which runs it on the
//! consumer's execution context in submission order.

use crate::error::{Result, TapError};
use parking_lot::RwLock;
use serde::Serialize;
use std::ops::Deref;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// One published spectrum: `band_count` values in `[0, 1]`, lowest band first.
///
/// Always an independent copy; the receiver may keep or mutate it freely.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrequencyBands(Vec<f32>);

impl FrequencyBands {
    pub(crate) fn from_slice(values: &[f32]) -> Self {
        Self(values.to_vec())
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl Deref for FrequencyBands {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl AsMut<[f32]> for FrequencyBands {
    fn as_mut(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

/// Receiver of published spectra.
pub trait SpectrumListener: Send + Sync {
    fn on_spectrum(&self, bands: FrequencyBands);
}

impl<F> SpectrumListener for F
where
    F: Fn(FrequencyBands) + Send + Sync,
{
    fn on_spectrum(&self, bands: FrequencyBands) {
        self(bands)
    }
}

/// Shared, guarded slot holding the optional listener.
///
/// Cloneable and `Send + Sync`: the consumer side keeps a clone to attach or
/// detach while the audio thread polls [`ListenerHandle::is_attached`].
#[derive(Clone, Default)]
pub struct ListenerHandle {
    slot: Arc<RwLock<Option<Arc<dyn SpectrumListener>>>>,
}

impl ListenerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `listener`, replacing any previous one.
    pub fn attach<L>(&self, listener: L)
    where
        L: SpectrumListener + 'static,
    {
        self.attach_arc(Arc::new(listener));
    }

    pub fn attach_arc(&self, listener: Arc<dyn SpectrumListener>) {
        *self.slot.write() = Some(listener);
    }

    pub fn detach(&self) {
        if self.slot.write().take().is_some() {
            log::debug!("Spectrum listener detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Deliver `bands` to whoever is attached right now, if anyone.
    pub fn notify(&self, bands: FrequencyBands) {
        // Clone the Arc out so listener code never runs under the lock
        let listener = self.slot.read().clone();
        if let Some(listener) = listener {
            listener.on_spectrum(bands);
        }
    }

    /// Queue delivery of `bands` on `dispatcher`. The listener is resolved
    /// when the job runs, so a detach in between suppresses delivery.
    pub(crate) fn deliver_via(&self, dispatcher: &dyn Dispatcher, bands: FrequencyBands) {
        let handle = self.clone();
        dispatcher.dispatch(Box::new(move || handle.notify(bands)));
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Unit of work queued onto the consumer context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Consumer-side execution context.
///
/// `dispatch` is called from the audio thread: it must not block and must
/// run jobs in the order they were submitted.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// Runs each job immediately on the calling thread.
///
/// For tests and hosts whose audio and consumer contexts are the same thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, job: Job) {
        job();
    }
}

/// Dedicated consumer thread fed by an unbounded channel.
pub struct ConsumerThread {
    job_tx: Option<mpsc::Sender<Job>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ConsumerThread {
    pub fn spawn() -> Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();

        let thread_handle = thread::Builder::new()
            .name("spectrum-dispatch".to_string())
            .spawn(move || {
                log::info!("Spectrum dispatch thread started");
                // Drains queued jobs before exiting once the sender is gone
                for job in job_rx {
                    job();
                }
                log::info!("Spectrum dispatch thread stopped");
            })
            .map_err(|e| TapError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            job_tx: Some(job_tx),
            thread_handle: Some(thread_handle),
        })
    }

    /// Close the queue, run whatever is still pending, and join the thread.
    pub fn stop(&mut self) {
        self.job_tx.take();
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            let _ = handle.join();
        }
    }
}

impl Dispatcher for ConsumerThread {
    fn dispatch(&self, job: Job) {
        if let Some(tx) = &self.job_tx {
            if tx.send(job).is_err() {
                log::debug!("Spectrum dispatch thread gone, dropping result");
            }
        }
    }
}

impl Drop for ConsumerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs jobs on a tokio runtime through a single task, preserving order.
#[derive(Clone)]
pub struct TokioDispatcher {
    job_tx: tokio::sync::mpsc::UnboundedSender<Job>,
}

impl TokioDispatcher {
    pub fn new(runtime: &tokio::runtime::Handle) -> Self {
        let (job_tx, mut job_rx) = tokio::sync::mpsc::unbounded_channel::<Job>();

        runtime.spawn(async move {
            while let Some(job) = job_rx.recv().await {
                job();
            }
            log::debug!("Tokio spectrum dispatcher closed");
        });

        Self { job_tx }
    }

    /// Bind to the runtime of the calling thread.
    pub fn current() -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TapError::NoRuntime(e.to_string()))?;
        Ok(Self::new(&runtime))
    }
}

impl Dispatcher for TokioDispatcher {
    fn dispatch(&self, job: Job) {
        if self.job_tx.send(job).is_err() {
            log::debug!("Tokio dispatcher closed, dropping result");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording_listener() -> (Arc<Mutex<Vec<FrequencyBands>>>, impl SpectrumListener) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |bands: FrequencyBands| sink.lock().push(bands))
    }

    fn bands(first: f32) -> FrequencyBands {
        FrequencyBands::from_slice(&[first, 0.5])
    }

    #[test]
    fn handle_starts_detached() {
        let handle = ListenerHandle::new();
        assert!(!handle.is_attached());
    }

    #[test]
    fn clones_share_the_same_slot() {
        let handle = ListenerHandle::new();
        let consumer_side = handle.clone();
        let (_seen, listener) = recording_listener();

        consumer_side.attach(listener);
        assert!(handle.is_attached());

        consumer_side.detach();
        assert!(!handle.is_attached());
    }

    #[test]
    fn inline_dispatch_delivers_immediately() {
        let handle = ListenerHandle::new();
        let (seen, listener) = recording_listener();
        handle.attach(listener);

        handle.deliver_via(&InlineDispatcher, bands(0.25));

        assert_eq!(seen.lock().as_slice(), &[bands(0.25)]);
    }

    #[test]
    fn delivery_without_listener_is_dropped() {
        let handle = ListenerHandle::new();
        handle.deliver_via(&InlineDispatcher, bands(0.25));
        assert!(!handle.is_attached());
    }

    #[test]
    fn receiver_owns_an_independent_copy() {
        let source = [0.1, 0.2];
        let mut copy = FrequencyBands::from_slice(&source);
        copy.as_mut()[0] = 0.9;

        assert_eq!(source, [0.1, 0.2]);
        assert_eq!(copy.into_vec(), vec![0.9, 0.2]);
    }

    #[test]
    fn bands_serialize_as_plain_array() {
        let json = serde_json::to_string(&FrequencyBands::from_slice(&[0.0, 1.0])).unwrap();
        assert_eq!(json, "[0.0,1.0]");
    }

    #[test]
    fn consumer_thread_delivers_in_fifo_order() {
        let handle = ListenerHandle::new();
        let (seen, listener) = recording_listener();
        handle.attach(listener);

        let mut consumer = ConsumerThread::spawn().unwrap();
        for i in 0..20 {
            handle.deliver_via(&consumer, bands(i as f32 / 20.0));
        }
        consumer.stop();

        let firsts: Vec<f32> = seen.lock().iter().map(|b| b[0]).collect();
        let expected: Vec<f32> = (0..20).map(|i| i as f32 / 20.0).collect();
        assert_eq!(firsts, expected);
    }

    #[test]
    fn detach_before_delivery_suppresses_queued_jobs() {
        let handle = ListenerHandle::new();
        let (seen, listener) = recording_listener();
        handle.attach(listener);

        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock();

        let mut consumer = ConsumerThread::spawn().unwrap();
        let blocker = gate.clone();
        consumer.dispatch(Box::new(move || drop(blocker.lock())));
        handle.deliver_via(&consumer, bands(0.5));

        handle.detach();
        drop(held);
        consumer.stop();

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn dispatch_after_stop_is_ignored() {
        let mut consumer = ConsumerThread::spawn().unwrap();
        consumer.stop();
        consumer.dispatch(Box::new(|| panic!("must not run")));
    }

    #[test]
    fn tokio_dispatcher_needs_a_runtime() {
        assert!(matches!(
            TokioDispatcher::current(),
            Err(TapError::NoRuntime(_))
        ));
    }

    #[tokio::test]
    async fn tokio_dispatcher_delivers_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<f32>();
        let handle = ListenerHandle::new();
        handle.attach(move |bands: FrequencyBands| {
            let _ = tx.send(bands[0]);
        });

        let dispatcher = TokioDispatcher::current().unwrap();
        for i in 0..5 {
            handle.deliver_via(&dispatcher, bands(i as f32));
        }

        let mut received = Vec::new();
        while received.len() < 5 {
            match rx.recv().await {
                Some(v) => received.push(v),
                None => break,
            }
        }
        assert_eq!(received, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
