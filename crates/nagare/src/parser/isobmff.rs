use std::io::Cursor;

use bytes::{Bytes, BytesMut};
use mp4::{Mp4Reader, Mp4Track};

use super::{ContainerParser, MetaInfo};
use crate::error::{NagareError, NagareResult};

const FTYP: [u8; 4] = *b"ftyp";
const MOOV: [u8; 4] = *b"moov";

/// ISO base media (mp4) header parser.
///
/// Walks top-level boxes as bytes arrive and hands the prefix up to the end of
/// `moov` to [`mp4::Mp4Reader`] once it is complete. `moov` may come before or
/// after `mdat`, but in the latter case the whole payload has to be seen first.
#[derive(Debug, Default)]
pub struct Mp4Parser {
    buffer: BytesMut,
    // offset of the next top-level box header
    cursor: u64,
    seen_ftyp: bool,
    ready: bool,
}

struct BoxHeader {
    kind: [u8; 4],
    // None when the box extends to the end of the file
    size: Option<u64>,
    header_size: u64,
}

impl Mp4Parser {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_header(&self) -> NagareResult<Option<BoxHeader>> {
        let available = self.buffer.len() as u64;
        if self.cursor.saturating_add(8) > available {
            return Ok(None);
        }

        let at = self.cursor as usize;
        let head = &self.buffer[at..at + 8];
        let size = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as u64;
        let kind = [head[4], head[5], head[6], head[7]];

        let (size, header_size) = match size {
            0 => (None, 8),
            1 => {
                if self.cursor.saturating_add(16) > available {
                    return Ok(None);
                }
                let large = &self.buffer[at + 8..at + 16];
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(large);
                (Some(u64::from_be_bytes(bytes)), 16)
            }
            size => (Some(size), 8),
        };

        if matches!(size, Some(size) if size < header_size) {
            return Err(invalid("box is smaller than its header"));
        }

        Ok(Some(BoxHeader {
            kind,
            size,
            header_size,
        }))
    }

    fn parse_header(&self, end: u64) -> NagareResult<MetaInfo> {
        let data = &self.buffer[..end as usize];
        let reader = Mp4Reader::read_header(Cursor::new(data), end)?;

        let mut codecs = Vec::new();
        let mut has_video = false;
        let mut track_ids: Vec<_> = reader.tracks().keys().copied().collect();
        track_ids.sort_unstable();
        for id in &track_ids {
            let track = &reader.tracks()[id];
            if let Some((codec, is_video)) = codec_string(track) {
                has_video |= is_video;
                codecs.push(codec);
            }
        }

        if codecs.is_empty() {
            return Err(invalid("no playable track found"));
        }

        let container = if has_video { "video/mp4" } else { "audio/mp4" };
        let duration = reader.duration().as_secs_f64();

        Ok(MetaInfo {
            mime: format!("{container}; codecs=\"{}\"", codecs.join(",")),
            duration: (duration > 0.0).then_some(duration),
            tracks: track_ids.len(),
            is_fragmented: reader.moov.mvex.is_some(),
        })
    }
}

impl ContainerParser for Mp4Parser {
    fn append_buffer(&mut self, data: &Bytes) -> NagareResult<Option<MetaInfo>> {
        if self.ready {
            return Ok(None);
        }
        self.buffer.extend_from_slice(data);

        while let Some(header) = self.read_header()? {
            if !self.seen_ftyp {
                if header.kind != FTYP {
                    return Err(invalid("file does not start with ftyp"));
                }
                self.seen_ftyp = true;
            }

            let Some(size) = header.size else {
                // an open-ended box can only be the last one
                return Err(invalid("moov not found before an open-ended box"));
            };
            let end = self
                .cursor
                .checked_add(size)
                .ok_or_else(|| invalid("box size overflows"))?;

            if header.kind == MOOV {
                if end > self.buffer.len() as u64 {
                    return Ok(None);
                }
                let meta = self.parse_header(end)?;
                log::debug!(
                    "moov parsed ({} bytes header, {} bytes scanned): {}",
                    header.header_size,
                    end,
                    meta.mime
                );
                self.ready = true;
                return Ok(Some(meta));
            }

            self.cursor = end;
        }

        Ok(None)
    }

    fn flush(&mut self) {
        self.buffer = BytesMut::new();
    }
}

fn invalid(message: &'static str) -> NagareError {
    NagareError::Mp4Error(mp4::Error::InvalidData(message))
}

/// RFC 6381 codec string of a track, and whether it is a video track.
fn codec_string(track: &Mp4Track) -> Option<(String, bool)> {
    let stsd = &track.trak.mdia.minf.stbl.stsd;

    if let Some(avc1) = &stsd.avc1 {
        let avcc = &avc1.avcc;
        return Some((
            format!(
                "avc1.{:02x}{:02x}{:02x}",
                avcc.avc_profile_indication, avcc.profile_compatibility, avcc.avc_level_indication
            ),
            true,
        ));
    }
    if stsd.hev1.is_some() {
        return Some(("hev1".to_string(), true));
    }
    if let Some(vp09) = &stsd.vp09 {
        let vpcc = &vp09.vpcc;
        return Some((
            format!(
                "vp09.{:02}.{:02}.{:02}",
                vpcc.profile, vpcc.level, vpcc.bit_depth
            ),
            true,
        ));
    }
    if let Some(mp4a) = &stsd.mp4a {
        let codec = match &mp4a.esds {
            Some(esds) => {
                let config = &esds.es_desc.dec_config;
                format!(
                    "mp4a.{:x}.{}",
                    config.object_type_indication, config.dec_specific.profile
                )
            }
            None => "mp4a.40.2".to_string(),
        };
        return Some((codec, false));
    }

    None
}
