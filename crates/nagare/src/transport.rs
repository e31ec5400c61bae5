use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_RANGE};
use url::Url;

use crate::{error::NagareResult, span::RangeSpan};

mod http;
pub use http::HttpTransport;

/// Issues byte-range requests against a single resource.
///
/// The returned future must not borrow from the transport: it is driven on its
/// own task while the stream keeps handling events.
pub trait RangeTransport {
    fn fetch(
        &self,
        url: &Url,
        span: RangeSpan,
    ) -> impl std::future::Future<Output = NagareResult<RangeResponse>> + Send + 'static;
}

/// The range a response claims to carry, and the full resource length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRange {
    pub unit: String,
    pub start: u64,
    pub end: u64,
    /// `None` when the server answered with `*`.
    pub length: Option<u64>,
}

impl ContentRange {
    /// Parses a `content-range` value of the form `<unit> <start>-<end>/<length>`.
    pub fn parse(value: &str) -> Option<Self> {
        let (unit, rest) = value.trim().split_once(' ')?;
        let (range, length) = rest.trim().split_once('/')?;
        let (start, end) = range.split_once('-')?;

        let length = match length.trim() {
            "*" => None,
            length => Some(length.parse().ok()?),
        };

        Some(Self {
            unit: unit.to_string(),
            start: start.trim().parse().ok()?,
            end: end.trim().parse().ok()?,
            length,
        })
    }

    /// Prefers `content-range`. Without it the body is taken to be the whole
    /// resource and `content-length` gives its size.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let content_range = headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::parse);
        if content_range.is_some() {
            return content_range;
        }

        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())?;
        Some(Self::whole(content_length))
    }

    pub fn whole(content_length: u64) -> Self {
        Self {
            unit: "all".to_string(),
            start: 0,
            end: content_length.saturating_sub(1),
            length: Some(content_length),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RangeResponse {
    pub content_range: Option<ContentRange>,
    pub body: Bytes,
}

impl RangeResponse {
    pub fn new(content_range: Option<ContentRange>, body: Bytes) -> Self {
        Self {
            content_range,
            body,
        }
    }

    /// Builds the response a range-capable server sends for `span` of a
    /// resource that is `total_length` bytes long.
    pub fn partial(span: RangeSpan, total_length: u64, body: Bytes) -> Self {
        let content_range = ContentRange {
            unit: "bytes".to_string(),
            start: span.start(),
            end: span.end(),
            length: Some(total_length),
        };
        Self::new(Some(content_range), body)
    }

    pub fn total_length(&self) -> Option<u64> {
        self.content_range.as_ref().and_then(|r| r.length)
    }

    /// The offset the body starts at, falling back to what was requested.
    pub fn start(&self, requested: &RangeSpan) -> u64 {
        self.content_range
            .as_ref()
            .map(|r| r.start)
            .unwrap_or(requested.start())
    }
}
