use bytes::{Bytes, BytesMut};

use crate::{
    error::{NagareError, NagareResult},
    parser::{ContainerParser, MetaInfo},
    span::RangeSpan,
};

#[derive(Debug)]
pub enum BootstrapStatus {
    /// The parser needs more bytes.
    Pending,
    /// The container header is known. `init` holds every byte fed so far, in
    /// order, and has to reach the sink before any later payload.
    Ready { meta: MetaInfo, init: Bytes },
}

/// Collects the leading bytes of a resource until its container is known.
pub struct ContainerBootstrap<P> {
    url: String,
    parser: P,
    chunks: Vec<Bytes>,
    received: Option<RangeSpan>,
}

impl<P> ContainerBootstrap<P>
where
    P: ContainerParser,
{
    pub fn new(parser: P, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parser,
            chunks: Vec::new(),
            received: None,
        }
    }

    pub fn feed(&mut self, span: RangeSpan, data: Bytes) -> NagareResult<BootstrapStatus> {
        self.received = Some(match self.received {
            Some(received) => RangeSpan::derive(Some(received.start()), Some(span.end()), None)?,
            None => span,
        });
        self.chunks.push(data.clone());

        let meta = self
            .parser
            .append_buffer(&data)
            .map_err(|e| NagareError::ParseError {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let Some(meta) = meta else {
            tracing::debug!(
                "Container header still incomplete after {} bytes",
                self.retained_bytes()
            );
            return Ok(BootstrapStatus::Pending);
        };

        let init = self.take_retained();
        self.parser.flush();
        Ok(BootstrapStatus::Ready { meta, init })
    }

    /// The contiguous span fed so far.
    pub fn received(&self) -> Option<&RangeSpan> {
        self.received.as_ref()
    }

    pub fn retained_bytes(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    fn take_retained(&mut self) -> Bytes {
        let chunks = std::mem::take(&mut self.chunks);
        if chunks.len() == 1 {
            return chunks.into_iter().next().unwrap_or_default();
        }

        let mut init = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            init.extend_from_slice(&chunk);
        }
        init.freeze()
    }
}
