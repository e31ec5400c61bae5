use std::fmt;

use crate::error::{NagareError, NagareResult};

/// A closed byte interval of the source resource.
///
/// `length == end - start + 1` holds for every non-empty span. An empty span
/// (`length == 0`, `end == start - 1`) marks the end of the resource and can
/// only sit after byte zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpan {
    start: u64,
    end: u64,
    length: u64,
}

impl RangeSpan {
    /// Derives the missing value from any two of `start`, `end` and `length`.
    ///
    /// When all three are given they are taken as-is.
    pub fn derive(start: Option<u64>, end: Option<u64>, length: Option<u64>) -> NagareResult<Self> {
        let invalid = || NagareError::InvalidRange { start, end, length };

        match (start, end, length) {
            (Some(start), Some(end), Some(length)) => Ok(Self { start, end, length }),
            (Some(start), Some(end), None) => {
                let length = end
                    .checked_sub(start)
                    .and_then(|d| d.checked_add(1))
                    .ok_or_else(invalid)?;
                Ok(Self { start, end, length })
            }
            (None, Some(end), Some(length)) => {
                // end - (length - 1), written so that length == 0 does not underflow
                let start = end
                    .checked_add(1)
                    .and_then(|e| e.checked_sub(length))
                    .ok_or_else(invalid)?;
                Ok(Self { start, end, length })
            }
            (Some(start), None, Some(length)) => {
                let end = start
                    .checked_add(length)
                    .and_then(|e| e.checked_sub(1))
                    .ok_or_else(invalid)?;
                Ok(Self { start, end, length })
            }
            _ => Err(NagareError::InsufficientInputs),
        }
    }

    pub fn new(start: u64, length: u64) -> NagareResult<Self> {
        Self::derive(Some(start), None, Some(length))
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The offset of the first byte after this span.
    pub fn next_start(&self) -> u64 {
        self.start + self.length
    }

    pub fn to_http_range(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for RangeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} ({} bytes)", self.start, self.end, self.length)
    }
}
