use bytes::Bytes;
use tokio::sync::mpsc;
use url::Url;

use crate::{
    bootstrap::{BootstrapStatus, ContainerBootstrap},
    clock::PlaybackClock,
    config::StreamConfig,
    error::{NagareError, NagareResult},
    estimator::BandwidthEstimator,
    event::{self, EventSender, StreamEvent, Subscription},
    parser::{ContainerParser, MetaInfo},
    scheduler::RangeScheduler,
    sink::{MediaSink, PlaybackMode},
    span::RangeSpan,
    transport::{RangeResponse, RangeTransport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing requested yet.
    Idle,
    /// Downloading the container header.
    FetchingBootstrap,
    /// Codec known and sink configured, waiting for a reason to fetch.
    Ready,
    /// A media range request is in flight.
    FetchingMedia,
    /// Data was handed to the sink, waiting for it to finish ingesting.
    AwaitingSinkDrain,
    /// The whole resource was delivered and the sink closed.
    Ended,
    Errored,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Errored)
    }
}

/// Streams one resource into one sink through sequential range requests.
///
/// All inputs arrive as [`StreamEvent`]s and are handled one at a time. At
/// most one fetch is in flight and at most one append is pending, so bytes
/// reach the sink in resource order.
pub struct BufferedStream<T, P, S, C>
where
    T: RangeTransport,
    P: ContainerParser,
    S: MediaSink,
    C: PlaybackClock,
{
    url: Url,
    transport: T,
    sink: S,
    clock: C,

    bootstrap: Option<ContainerBootstrap<P>>,
    scheduler: RangeScheduler,
    estimator: BandwidthEstimator,

    state: StreamState,
    mime_codec: Option<String>,
    is_loading: bool,
    is_streaming: bool,
    bytes_appended: u64,
    pending_append: Option<u64>,

    events: EventSender,
    receiver: Option<mpsc::UnboundedReceiver<StreamEvent>>,
    subscriptions: Vec<Subscription>,
    destroyed: bool,
}

impl<T, P, S, C> BufferedStream<T, P, S, C>
where
    T: RangeTransport,
    P: ContainerParser,
    S: MediaSink,
    C: PlaybackClock,
{
    pub fn new(
        url: Url,
        transport: T,
        parser: P,
        mut sink: S,
        mut clock: C,
        config: &StreamConfig,
    ) -> NagareResult<Self> {
        config.validate()?;

        let (events, receiver) = event::channel();
        let subscriptions = vec![sink.attach(events.clone()), clock.attach(events.clone())];
        let bootstrap = ContainerBootstrap::new(parser, url.as_str());

        Ok(Self {
            url,
            transport,
            sink,
            clock,

            bootstrap: Some(bootstrap),
            scheduler: RangeScheduler::new(),
            estimator: BandwidthEstimator::new(config.initial_fetch_size, config.buffer_seconds),

            state: StreamState::Idle,
            mime_codec: None,
            is_loading: false,
            is_streaming: false,
            bytes_appended: 0,
            pending_append: None,

            events,
            receiver: Some(receiver),
            subscriptions,
            destroyed: false,
        })
    }

    /// A handle for raising events on this stream.
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn fetch_size(&self) -> u64 {
        self.estimator.fetch_size()
    }

    pub fn total_length(&self) -> Option<u64> {
        self.scheduler.total_length()
    }

    pub fn mime_codec(&self) -> Option<&str> {
        self.mime_codec.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_managed_streaming(&self) -> bool {
        self.is_streaming
    }

    /// Bytes the sink has finished ingesting.
    pub fn bytes_appended(&self) -> u64 {
        self.bytes_appended
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Handles events until the stream ends, fails or is destroyed.
    pub async fn run(&mut self) -> NagareResult<()> {
        while self.step().await? {}
        Ok(())
    }

    /// Waits for the next event and handles it. Returns `false` once no more
    /// events will be handled.
    pub async fn step(&mut self) -> NagareResult<bool> {
        if self.destroyed || self.state.is_terminal() {
            return Ok(false);
        }
        let Some(receiver) = self.receiver.as_mut() else {
            return Ok(false);
        };
        let Some(event) = receiver.recv().await else {
            return Ok(false);
        };

        self.handle_event(event)?;
        Ok(!self.destroyed && !self.state.is_terminal())
    }

    pub fn handle_event(&mut self, event: StreamEvent) -> NagareResult<()> {
        if self.destroyed || self.state.is_terminal() {
            tracing::trace!("Stream is {:?}, event dropped", self.state);
            return Ok(());
        }

        let result = match event {
            StreamEvent::SourceOpen => self.on_source_open(),
            StreamEvent::TimeUpdate | StreamEvent::Stalled => self.on_time_update(),
            StreamEvent::StartStreaming => self.on_start_streaming(),
            StreamEvent::EndStreaming => {
                self.on_end_streaming();
                Ok(())
            }
            StreamEvent::FetchCompleted { span, result } => self.on_fetch_completed(span, result),
            StreamEvent::SinkUpdateEnd => self.on_sink_update_end(),
            StreamEvent::SinkError(message) => Err(self.sink_error(message)),
        };

        if let Err(e) = &result {
            tracing::error!("Streaming {} failed: {e}", self.url);
            self.is_loading = false;
            self.transition(StreamState::Errored);
            self.detach();
        }
        result
    }

    /// Detaches every listener and releases the sink buffer. Events raised
    /// afterwards, including completions of an in-flight fetch, are dropped.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.detach();

        if self.mime_codec.is_some() {
            if let Err(e) = self.sink.remove_source_buffer() {
                tracing::debug!("Ignoring teardown failure: {e}");
            }
        }
        self.bootstrap = None;
        self.receiver = None;
        self.is_loading = false;
    }

    fn detach(&mut self) {
        self.events.close();
        for subscription in self.subscriptions.drain(..) {
            subscription.release();
        }
    }

    fn transition(&mut self, state: StreamState) {
        if self.state != state {
            tracing::debug!("{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn on_source_open(&mut self) -> NagareResult<()> {
        if self.state != StreamState::Idle {
            tracing::debug!("Source reopened in {:?}, ignoring", self.state);
            return Ok(());
        }
        tracing::info!("Start streaming {}", self.url);
        self.transition(StreamState::FetchingBootstrap);
        self.load_data()
    }

    fn on_start_streaming(&mut self) -> NagareResult<()> {
        if self.sink.playback_mode() != PlaybackMode::Managed {
            tracing::warn!("Managed streaming requested outside of managed playback, ignoring");
            return Ok(());
        }
        self.is_streaming = true;
        self.on_time_update()
    }

    fn on_end_streaming(&mut self) {
        if self.sink.playback_mode() == PlaybackMode::Managed {
            self.is_streaming = false;
        }
    }

    /// Re-evaluates whether more data is wanted.
    fn on_time_update(&mut self) -> NagareResult<()> {
        match self.state {
            StreamState::Idle | StreamState::FetchingBootstrap | StreamState::AwaitingSinkDrain => {
                return Ok(())
            }
            _ => {}
        }
        if self.sink.is_updating() {
            return Ok(());
        }

        let buffered_end = self.sink.buffered_end();
        self.estimator
            .record_progress(self.bytes_appended, buffered_end);
        if !self.should_fetch_more(buffered_end) {
            return Ok(());
        }
        self.load_data()
    }

    fn should_fetch_more(&self, buffered_end: f64) -> bool {
        if self.is_streaming {
            return true;
        }

        let current_time = self.clock.current_time();
        let is_buffer_too_small = current_time + self.estimator.buffer_seconds() >= buffered_end;
        tracing::trace!(
            current_time,
            buffered_end,
            paused = self.clock.paused(),
            is_buffer_too_small,
            "fetch decision"
        );
        is_buffer_too_small
    }

    fn load_data(&mut self) -> NagareResult<()> {
        if self.is_loading {
            return Ok(());
        }
        if self.scheduler.is_exhausted() {
            return self.finish();
        }

        let span = self.scheduler.next(self.estimator.fetch_size())?;
        if span.is_empty() {
            return self.finish();
        }

        self.is_loading = true;
        if self.bootstrap.is_some() {
            self.transition(StreamState::FetchingBootstrap);
        } else {
            self.transition(StreamState::FetchingMedia);
        }

        tracing::debug!("Requesting {span}");
        let fetch = self.transport.fetch(&self.url, span);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = fetch.await;
            events.emit(StreamEvent::FetchCompleted { span, result });
        });

        Ok(())
    }

    fn on_fetch_completed(
        &mut self,
        span: RangeSpan,
        result: NagareResult<RangeResponse>,
    ) -> NagareResult<()> {
        if !self.is_loading {
            tracing::warn!("Dropping unexpected response for {span}");
            return Ok(());
        }
        self.is_loading = false;

        let Some((delivered, body)) = self.accept_response(span, result?)? else {
            return self.load_data();
        };

        let Some(bootstrap) = self.bootstrap.as_mut() else {
            return self.append(body);
        };
        match bootstrap.feed(delivered, body)? {
            BootstrapStatus::Pending => self.load_data(),
            BootstrapStatus::Ready { meta, init } => {
                self.bootstrap = None;
                self.on_meta_ready(meta, init)
            }
        }
    }

    /// Lines the response up with the request and records what was delivered.
    fn accept_response(
        &mut self,
        requested: RangeSpan,
        response: RangeResponse,
    ) -> NagareResult<Option<(RangeSpan, Bytes)>> {
        let total_length = response.total_length();
        let start = response.start(&requested);
        let mut body = response.body;

        if start > requested.start() {
            return Err(NagareError::UnexpectedContentRange {
                expected: requested.start(),
                actual: start,
            });
        }
        if start < requested.start() {
            let skip = requested.start() - start;
            if skip >= body.len() as u64 {
                return Err(NagareError::UnexpectedContentRange {
                    expected: requested.start(),
                    actual: start,
                });
            }
            tracing::warn!("Server ignored the requested range, skipping {skip} bytes");
            body = body.slice(skip as usize..);
        }

        if body.is_empty() {
            tracing::warn!("Empty response for {requested}, assuming end of resource");
            self.scheduler.set_total_length(requested.start());
            return Ok(None);
        }

        let delivered = RangeSpan::new(requested.start(), body.len() as u64)?;
        // a short read without a declared length can only be the tail
        let total_length = total_length.or_else(|| {
            (delivered.length() < requested.length()).then(|| delivered.next_start())
        });
        self.scheduler.record(delivered, total_length);

        Ok(Some((delivered, body)))
    }

    fn on_meta_ready(&mut self, meta: MetaInfo, init: Bytes) -> NagareResult<()> {
        if !self.sink.is_type_supported(&meta.mime) {
            return Err(NagareError::UnsupportedCodec {
                mime: meta.mime,
                url: self.url.to_string(),
            });
        }

        tracing::info!(
            "Container ready: {} ({} tracks, {:?}s, {} header bytes)",
            meta.mime,
            meta.tracks,
            meta.duration,
            init.len()
        );
        self.mime_codec = Some(meta.mime.clone());
        self.sink
            .add_source_buffer(&meta, self.scheduler.total_length())
            .map_err(|e| self.sink_error(e.to_string()))?;
        self.transition(StreamState::Ready);

        self.append(init)
    }

    fn append(&mut self, data: Bytes) -> NagareResult<()> {
        let length = data.len() as u64;
        tracing::debug!("Appending {length} bytes");
        self.sink
            .append_buffer(data)
            .map_err(|e| self.sink_error(e.to_string()))?;
        self.pending_append = Some(length);
        self.transition(StreamState::AwaitingSinkDrain);
        Ok(())
    }

    fn on_sink_update_end(&mut self) -> NagareResult<()> {
        if self.state != StreamState::AwaitingSinkDrain {
            tracing::debug!("Sink drained in {:?}, ignoring", self.state);
            return Ok(());
        }
        self.bytes_appended += self.pending_append.take().unwrap_or_default();
        self.transition(StreamState::Ready);

        if self.scheduler.is_exhausted() {
            return self.finish();
        }
        self.on_time_update()
    }

    fn finish(&mut self) -> NagareResult<()> {
        if self.bootstrap.is_some() {
            return Err(NagareError::ParseError {
                url: self.url.to_string(),
                message: "container header not found before the end of the resource".to_string(),
            });
        }

        self.sink
            .end_of_stream()
            .map_err(|e| self.sink_error(e.to_string()))?;
        tracing::info!("Finished streaming {} ({} bytes)", self.url, self.bytes_appended);
        self.transition(StreamState::Ended);
        Ok(())
    }

    fn sink_error(&self, message: String) -> NagareError {
        NagareError::SinkError {
            url: self.url.to_string(),
            mime: self.mime_codec.clone().unwrap_or_default(),
            message,
        }
    }
}

impl<T, P, S, C> Drop for BufferedStream<T, P, S, C>
where
    T: RangeTransport,
    P: ContainerParser,
    S: MediaSink,
    C: PlaybackClock,
{
    fn drop(&mut self) {
        self.destroy();
    }
}
