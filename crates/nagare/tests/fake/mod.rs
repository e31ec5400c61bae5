use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use bytes::Bytes;
use nagare::{
    transport::{ContentRange, RangeResponse},
    ContainerParser, EventSender, MediaSink, MetaInfo, NagareError, NagareResult, PlaybackClock,
    PlaybackMode, RangeSpan, RangeTransport, StreamEvent, Subscription,
};

pub const MIME: &str = "video/mp4; codecs=\"avc1.64001f\"";

/// How the fake server answers range requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// `206` with a full `content-range`.
    Partial,
    /// `206` with `content-range: bytes a-b/*`.
    UnknownLength,
    /// `200` with the whole resource.
    IgnoreRange,
    /// Shifts every response after the first one by the given number of bytes.
    Shifted(i64),
    Status(u16),
}

/// An in-memory resource served in ranges.
#[derive(Clone)]
pub struct FakeTransport {
    data: Arc<Vec<u8>>,
    answer: Answer,
    requests: Arc<Mutex<Vec<RangeSpan>>>,
}

impl FakeTransport {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            answer: Answer::Partial,
            requests: Default::default(),
        }
    }

    pub fn answer(mut self, answer: Answer) -> Self {
        self.answer = answer;
        self
    }

    pub fn requests(&self) -> Vec<RangeSpan> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, span: RangeSpan) -> NagareResult<RangeResponse> {
        let total = self.data.len() as u64;
        let mut start = span.start();
        if let Answer::Shifted(offset) = self.answer {
            if start > 0 {
                start = (start as i64 + offset).max(0) as u64;
            }
        }
        let start = start.min(total);
        let end = (span.start() + span.length()).min(total);
        let body = Bytes::copy_from_slice(&self.data[start as usize..end.max(start) as usize]);

        Ok(match self.answer {
            Answer::Status(code) => {
                return Err(NagareError::HttpError(
                    reqwest::StatusCode::from_u16(code).unwrap(),
                ))
            }
            Answer::IgnoreRange => RangeResponse::new(
                Some(ContentRange::whole(total)),
                Bytes::copy_from_slice(&self.data),
            ),
            _ if body.is_empty() => RangeResponse::new(None, body),
            Answer::UnknownLength => {
                let range = ContentRange {
                    unit: "bytes".to_string(),
                    start,
                    end: start + body.len() as u64 - 1,
                    length: None,
                };
                RangeResponse::new(Some(range), body)
            }
            Answer::Partial | Answer::Shifted(_) => {
                let delivered = RangeSpan::new(start, body.len() as u64)?;
                RangeResponse::partial(delivered, total, body)
            }
        })
    }
}

impl RangeTransport for FakeTransport {
    fn fetch(
        &self,
        _url: &url::Url,
        span: RangeSpan,
    ) -> impl Future<Output = NagareResult<RangeResponse>> + Send + 'static {
        self.requests.lock().unwrap().push(span);
        let result = self.respond(span);
        async move { result }
    }
}

/// Reports the container as ready once `needed` bytes were seen.
pub struct FakeParser {
    needed: usize,
    seen: usize,
    fail: bool,
    pub flushed: Arc<AtomicBool>,
}

impl FakeParser {
    pub fn new(needed: usize) -> Self {
        Self {
            needed,
            seen: 0,
            fail: false,
            flushed: Default::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }
}

impl ContainerParser for FakeParser {
    fn append_buffer(&mut self, data: &Bytes) -> NagareResult<Option<MetaInfo>> {
        if self.fail {
            return Err(NagareError::Mp4Error(mp4::Error::InvalidData(
                "file does not start with ftyp",
            )));
        }
        self.seen += data.len();
        if self.seen < self.needed {
            return Ok(None);
        }
        Ok(Some(MetaInfo {
            mime: MIME.to_string(),
            duration: Some(8.0),
            tracks: 1,
            is_fragmented: false,
        }))
    }

    fn flush(&mut self) {
        self.flushed.store(true, Ordering::Release);
    }
}

/// A sink that ingests instantly at a fixed bitrate.
pub struct FakeSink {
    events: Option<EventSender>,
    mode: PlaybackMode,
    supported: bool,
    fail_append: bool,
    bytes_per_second: f64,

    pub attached: Arc<AtomicBool>,
    pub appends: Vec<Bytes>,
    pub source_buffer: Option<(String, Option<u64>)>,
    pub end_of_stream_calls: usize,
    pub removed: bool,
}

impl FakeSink {
    pub fn new(bytes_per_second: f64) -> Self {
        Self {
            events: None,
            mode: PlaybackMode::Standard,
            supported: true,
            fail_append: false,
            bytes_per_second,
            attached: Default::default(),
            appends: Vec::new(),
            source_buffer: None,
            end_of_stream_calls: 0,
            removed: false,
        }
    }

    pub fn managed(mut self) -> Self {
        self.mode = PlaybackMode::Managed;
        self
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_append = true;
        self
    }

    pub fn appended(&self) -> u64 {
        self.appends.iter().map(|b| b.len() as u64).sum()
    }

    pub fn data(&self) -> Vec<u8> {
        self.appends.concat()
    }
}

impl MediaSink for FakeSink {
    fn attach(&mut self, events: EventSender) -> Subscription {
        events.emit(StreamEvent::SourceOpen);
        self.events = Some(events);
        self.attached.store(true, Ordering::Release);

        let attached = self.attached.clone();
        Subscription::new(move || attached.store(false, Ordering::Release))
    }

    fn playback_mode(&self) -> PlaybackMode {
        self.mode
    }

    fn is_type_supported(&self, _mime: &str) -> bool {
        self.supported
    }

    fn add_source_buffer(
        &mut self,
        meta: &MetaInfo,
        content_length: Option<u64>,
    ) -> NagareResult<()> {
        self.source_buffer = Some((meta.mime.clone(), content_length));
        Ok(())
    }

    fn append_buffer(&mut self, data: Bytes) -> NagareResult<()> {
        let events = self.events.as_ref().unwrap();
        if self.fail_append {
            events.emit(StreamEvent::SinkError("quota exceeded".to_string()));
            return Ok(());
        }
        self.appends.push(data);
        events.emit(StreamEvent::SinkUpdateEnd);
        Ok(())
    }

    fn is_updating(&self) -> bool {
        false
    }

    fn buffered_end(&self) -> f64 {
        self.appended() as f64 / self.bytes_per_second
    }

    fn end_of_stream(&mut self) -> NagareResult<()> {
        self.end_of_stream_calls += 1;
        Ok(())
    }

    fn remove_source_buffer(&mut self) -> NagareResult<()> {
        self.removed = true;
        Ok(())
    }
}

/// A clock the test moves by hand.
#[derive(Clone, Default)]
pub struct FakeClock {
    time: Arc<Mutex<f64>>,
}

impl FakeClock {
    pub fn at(time: f64) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    pub fn set(&self, time: f64) {
        *self.time.lock().unwrap() = time;
    }
}

impl PlaybackClock for FakeClock {
    fn attach(&mut self, _events: EventSender) -> Subscription {
        Subscription::noop()
    }

    fn current_time(&self) -> f64 {
        *self.time.lock().unwrap()
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn paused(&self) -> bool {
        false
    }
}

/// `len` bytes where every byte differs from its neighbours.
pub fn resource(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
