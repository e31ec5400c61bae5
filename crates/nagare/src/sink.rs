use bytes::Bytes;

use crate::{
    error::NagareResult,
    event::{EventSender, Subscription},
    parser::MetaInfo,
};

mod file;
pub use file::FileSink;

/// How the host decides when more data is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    /// Buffering follows the lookahead threshold only.
    #[default]
    Standard,
    /// The host may assert and revoke continuous supply with
    /// [`StreamEvent::StartStreaming`](crate::StreamEvent::StartStreaming) and
    /// [`StreamEvent::EndStreaming`](crate::StreamEvent::EndStreaming).
    Managed,
}

/// The playback side: ingests ordered byte ranges and makes them playable.
///
/// Appends are strictly sequential. After [`MediaSink::append_buffer`] the
/// sink reports [`StreamEvent::SinkUpdateEnd`](crate::StreamEvent::SinkUpdateEnd)
/// or [`StreamEvent::SinkError`](crate::StreamEvent::SinkError) through the
/// sender given to [`MediaSink::attach`].
pub trait MediaSink {
    /// Registers the stream's listeners. The sink must raise
    /// [`StreamEvent::SourceOpen`](crate::StreamEvent::SourceOpen) once it
    /// can be configured.
    fn attach(&mut self, events: EventSender) -> Subscription;

    fn playback_mode(&self) -> PlaybackMode {
        PlaybackMode::Standard
    }

    fn is_type_supported(&self, mime: &str) -> bool;

    /// Creates the buffer for the detected media.
    fn add_source_buffer(&mut self, meta: &MetaInfo, content_length: Option<u64>)
        -> NagareResult<()>;

    fn append_buffer(&mut self, data: Bytes) -> NagareResult<()>;

    fn is_updating(&self) -> bool;

    /// End of the buffered range in seconds, `0.0` when nothing is buffered.
    fn buffered_end(&self) -> f64;

    fn end_of_stream(&mut self) -> NagareResult<()>;

    fn remove_source_buffer(&mut self) -> NagareResult<()>;
}
