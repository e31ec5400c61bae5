use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::sync::mpsc;

use crate::{error::NagareResult, span::RangeSpan, transport::RangeResponse};

/// Everything that can wake a [`BufferedStream`](crate::BufferedStream) up.
#[derive(Debug)]
pub enum StreamEvent {
    /// The sink is open and ready to be configured. Fires once.
    SourceOpen,
    /// The playback clock advanced.
    TimeUpdate,
    /// Playback ran out of data. Handled exactly like [`StreamEvent::TimeUpdate`].
    Stalled,
    /// The host wants continuous supply, regardless of the buffer threshold.
    StartStreaming,
    /// The host revoked [`StreamEvent::StartStreaming`].
    EndStreaming,
    /// A range fetch finished.
    FetchCompleted {
        span: RangeSpan,
        result: NagareResult<RangeResponse>,
    },
    /// The sink finished ingesting the last appended buffer.
    SinkUpdateEnd,
    /// The sink failed to ingest the last appended buffer.
    SinkError(String),
}

/// Handle used by collaborators to raise events on a stream.
///
/// Once the stream is destroyed every handle silently drops what it is given.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<StreamEvent>,
    closed: Arc<AtomicBool>,
}

impl EventSender {
    pub fn emit(&self, event: StreamEvent) {
        if self.is_closed() {
            return;
        }
        // the receiver is gone once the stream is dropped
        _ = self.tx.send(event);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub(crate) fn channel() -> (EventSender, mpsc::UnboundedReceiver<StreamEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = EventSender {
        tx,
        closed: Arc::new(AtomicBool::new(false)),
    };
    (sender, rx)
}

/// A listener registration. Releasing it detaches the listener.
///
/// Dropping a subscription releases it as well.
pub struct Subscription {
    on_release: Option<Box<dyn FnOnce() + Send + Sync + 'static>>,
}

impl Subscription {
    pub fn new<F>(on_release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            on_release: Some(Box::new(on_release)),
        }
    }

    /// A subscription with nothing to detach.
    pub fn noop() -> Self {
        Self { on_release: None }
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(on_release) = self.on_release.take() {
            on_release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_inner();
    }
}
