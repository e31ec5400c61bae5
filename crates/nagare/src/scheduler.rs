use crate::{error::NagareResult, span::RangeSpan};

/// Computes the span to request after `previous`.
///
/// `total_length` is `None` while the resource length is still unknown, in
/// which case no clamping happens. An empty span means there is nothing left
/// to fetch.
pub fn next_span(
    previous: Option<&RangeSpan>,
    total_length: Option<u64>,
    fetch_size_hint: u64,
) -> NagareResult<RangeSpan> {
    let start = match previous {
        Some(previous) => previous.end() + 1,
        None => 0,
    };

    let Some(total_length) = total_length else {
        return RangeSpan::new(start, fetch_size_hint);
    };

    let start = start.min(total_length);
    let length = if start.saturating_add(fetch_size_hint) > total_length {
        total_length - start
    } else {
        fetch_size_hint
    };
    RangeSpan::new(start, length)
}

/// Tracks what has been delivered so far and hands out the following spans.
#[derive(Debug, Default)]
pub struct RangeScheduler {
    last: Option<RangeSpan>,
    total_length: Option<u64>,
}

impl RangeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, fetch_size_hint: u64) -> NagareResult<RangeSpan> {
        next_span(self.last.as_ref(), self.total_length, fetch_size_hint)
    }

    /// Records a delivered span and the resource length reported alongside it.
    pub fn record(&mut self, span: RangeSpan, total_length: Option<u64>) {
        if total_length.is_some() {
            self.total_length = total_length;
        }
        self.last = Some(span);
    }

    /// Declares the resource to end at `total_length`.
    pub fn set_total_length(&mut self, total_length: u64) {
        self.total_length = Some(total_length);
    }

    pub fn last(&self) -> Option<&RangeSpan> {
        self.last.as_ref()
    }

    pub fn total_length(&self) -> Option<u64> {
        self.total_length
    }

    /// Whether every byte of a known-length resource has been delivered.
    pub fn is_exhausted(&self) -> bool {
        match (self.last, self.total_length) {
            (Some(last), Some(total)) => last.next_start() >= total,
            (None, Some(0)) => true,
            _ => false,
        }
    }
}
