use bytes::Bytes;

use crate::error::NagareResult;

mod isobmff;
pub use isobmff::Mp4Parser;

/// What the container header says about the media.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaInfo {
    /// Mime type with codec profile, e.g. `video/mp4; codecs="avc1.64001f"`.
    pub mime: String,
    /// Media duration in seconds, when the header declares one.
    pub duration: Option<f64>,
    pub tracks: usize,
    pub is_fragmented: bool,
}

/// Learns the container and codec of a resource from its leading bytes.
///
/// Buffers are appended in resource order. Exactly one of the outcomes is
/// reported: `Ok(Some(_))` once the header is complete, or an error.
pub trait ContainerParser {
    fn append_buffer(&mut self, data: &Bytes) -> NagareResult<Option<MetaInfo>>;

    /// Releases whatever the parser kept to reach its answer.
    fn flush(&mut self);
}
