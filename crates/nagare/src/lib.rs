pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod estimator;
pub mod event;
pub mod parser;
pub mod scheduler;
pub mod sink;
pub mod span;
pub mod transport;
pub mod util;

pub use clock::{PlaybackClock, WallClock};
pub use config::StreamConfig;
pub use controller::{BufferedStream, StreamState};
pub use error::{NagareError, NagareResult};
pub use event::{EventSender, StreamEvent, Subscription};
pub use parser::{ContainerParser, MetaInfo, Mp4Parser};
pub use sink::{FileSink, MediaSink, PlaybackMode};
pub use span::RangeSpan;
pub use transport::{HttpTransport, RangeTransport};
pub use util::http::HttpClient;

/// ┌──────────────┐  RangeSpan   ┌──────────────────┐   FetchCompleted   ┌──────────────┐
/// │              ├──────────────►                  ◄────────────────────┤              │
/// │  Scheduler   │              │                  │                    │  Transport   │
/// │              │              │                  ├────────────────────►   (task)     │
/// └──────▲───────┘              │                  │       fetch        └──────────────┘
///        │ fetch size           │  BufferedStream  │
/// ┌──────┴───────┐              │                  │   header bytes     ┌──────────────┐
/// │  Estimator   │              │     [MPSC]       ├────────────────────►  Bootstrap   │
/// └──────────────┘              │                  ◄────────────────────┤  (parser)    │
///                               │                  │      MetaInfo      └──────────────┘
/// ┌──────────────┐  TimeUpdate  │                  │
/// │    Clock     ├──────────────►                  │   append_buffer    ┌──────────────┐
/// └──────────────┘              │                  ├────────────────────►              │
///                               │                  │                    │     Sink     │
///                               │                  ◄────────────────────┤              │
///                               └──────────────────┘   SinkUpdateEnd    └──────────────┘
///
/// Whatever crosses a task boundary arrives as a [`StreamEvent`]. The stream
/// handles them one by one, so none of its state is ever touched
/// concurrently.
pub type DefaultStream = BufferedStream<HttpTransport, Mp4Parser, FileSink, WallClock>;
