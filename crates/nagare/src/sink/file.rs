use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use bytes::Bytes;
use tokio::{fs::File, io::AsyncWriteExt};

use super::{MediaSink, PlaybackMode};
use crate::{
    error::NagareResult,
    event::{EventSender, StreamEvent, Subscription},
    parser::MetaInfo,
};

type SharedSender = Arc<Mutex<Option<EventSender>>>;
// created by the first append
type SharedFile = Arc<tokio::sync::Mutex<Option<File>>>;

/// Writes the stream to a file in the order it is appended.
///
/// Playback time is mapped onto bytes with the average bitrate of the
/// resource, so [`MediaSink::buffered_end`] is an estimate.
pub struct FileSink {
    path: PathBuf,
    file: Option<SharedFile>,
    events: SharedSender,

    updating: Arc<AtomicBool>,
    written: Arc<AtomicU64>,
    bytes_per_second: Option<f64>,
    mode: PlaybackMode,
    ended: bool,
}

impl FileSink {
    pub fn new<P>(path: P) -> NagareResult<Self>
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            file: None,
            events: Arc::new(Mutex::new(None)),
            updating: Arc::new(AtomicBool::new(false)),
            written: Arc::new(AtomicU64::new(0)),
            bytes_per_second: None,
            mode: PlaybackMode::Standard,
            ended: false,
        })
    }

    pub fn with_playback_mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes that finished writing.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

async fn write(file: &mut Option<File>, path: &Path, data: &[u8]) -> io::Result<()> {
    if file.is_none() {
        *file = Some(File::create(path).await?);
    }
    if let Some(file) = file {
        file.write_all(data).await?;
        file.flush().await?;
    }
    Ok(())
}

fn emit(events: &SharedSender, event: StreamEvent) {
    let sender = match events.lock() {
        Ok(sender) => sender.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    if let Some(sender) = sender {
        sender.emit(event);
    }
}

impl MediaSink for FileSink {
    fn attach(&mut self, events: EventSender) -> Subscription {
        if let Ok(mut sender) = self.events.lock() {
            *sender = Some(events);
        }
        // a file is ready to be configured right away
        emit(&self.events, StreamEvent::SourceOpen);

        let shared = self.events.clone();
        Subscription::new(move || {
            if let Ok(mut sender) = shared.lock() {
                sender.take();
            }
        })
    }

    fn playback_mode(&self) -> PlaybackMode {
        self.mode
    }

    fn is_type_supported(&self, mime: &str) -> bool {
        mime.starts_with("video/") || mime.starts_with("audio/")
    }

    fn add_source_buffer(
        &mut self,
        meta: &MetaInfo,
        content_length: Option<u64>,
    ) -> NagareResult<()> {
        self.file = Some(Arc::new(tokio::sync::Mutex::new(None)));

        self.bytes_per_second = match (content_length, meta.duration) {
            (Some(length), Some(duration)) if duration > 0.0 => Some(length as f64 / duration),
            _ => None,
        };
        log::info!(
            "Writing {} to {} ({:?} bytes/s)",
            meta.mime,
            self.path.display(),
            self.bytes_per_second
        );

        Ok(())
    }

    fn append_buffer(&mut self, data: Bytes) -> NagareResult<()> {
        let Some(file) = self.file.clone() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no source buffer").into());
        };
        if self.ended {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream already ended").into());
        }
        if self.updating.swap(true, Ordering::AcqRel) {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "previous append pending").into());
        }

        let path = self.path.clone();
        let updating = self.updating.clone();
        let written = self.written.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = {
                let mut file = file.lock().await;
                write(&mut file, &path, &data).await
            };

            match result {
                Ok(()) => {
                    written.fetch_add(data.len() as u64, Ordering::AcqRel);
                    updating.store(false, Ordering::Release);
                    emit(&events, StreamEvent::SinkUpdateEnd);
                }
                Err(e) => {
                    updating.store(false, Ordering::Release);
                    emit(&events, StreamEvent::SinkError(e.to_string()));
                }
            }
        });

        Ok(())
    }

    fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    fn buffered_end(&self) -> f64 {
        match self.bytes_per_second {
            Some(bytes_per_second) if bytes_per_second > 0.0 => {
                self.written() as f64 / bytes_per_second
            }
            _ => 0.0,
        }
    }

    fn end_of_stream(&mut self) -> NagareResult<()> {
        self.ended = true;
        log::info!(
            "{} finished, {} bytes written",
            self.path.display(),
            self.written()
        );
        Ok(())
    }

    fn remove_source_buffer(&mut self) -> NagareResult<()> {
        self.file = None;
        Ok(())
    }
}
