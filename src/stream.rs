//! Turning a source of captured frames into a stream of packets.
//!
//! Acquiring frames is left to a [`FrameSource`]. This can be a live
//! capture on a network interface or a replay of a capture file, typically
//! restricted by the capture filter from [`Config::capture_filter`]. The
//! crate itself ships with [`Replay`] which turns any iterator over frames
//! into a frame source.
//!
//! A [`PacketStream`] pulls frames from the source one at a time, strips
//! their framing, and decodes the dnsflow packet inside. Frames and packets
//! that fail to unwrap or decode are logged and skipped. The only errors
//! the stream hands to its user are those of the frame source itself.
//!
//! Processing can be stopped from elsewhere, such as another thread or a
//! signal handler, via a [`StopHandle`]. The stream checks it before
//! pulling the next frame.
//!
//! ```
//! use dnsflow::stream::{Config, PacketStream, Replay};
//! use dnsflow::track::SourceTracker;
//!
//! let frames: Vec<dnsflow::frame::Frame> = Vec::new();
//! let mut tracker = SourceTracker::new();
//! for packet in PacketStream::new(Replay::new(frames), Config::new()) {
//!     let packet = match packet {
//!         Ok(packet) => packet,
//!         Err(never) => match never {},
//!     };
//!     tracker.update(&packet);
//! }
//! assert!(tracker.is_empty());
//! ```

use crate::base::{Body, DecodeError, Record};
use crate::frame::{Frame, FrameError};
use crate::packet::{Packet, SourceKey};
use crate::utils::base16;
use crate::utils::config::DefMinMax;
use core::convert::Infallible;
use core::fmt;
use std::string::String;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::vec;
use time::OffsetDateTime;
use tracing::{debug, trace, warn};

//------------ Constants -----------------------------------------------------

/// The UDP port dnsflow collectors listen on.
pub const DEFAULT_PORT: u16 = 5300;

/// The capture filter selecting dnsflow traffic.
pub const DEFAULT_CAPTURE_FILTER: &str = "udp and dst port 5300";

/// How long a live frame source should wait for a frame.
const POLL_INTERVAL: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_millis(100),
    Duration::from_millis(1),
    Duration::from_secs(10),
);

/// The maximum number of octets of a dropped frame shown in the log.
const EXCERPT_LEN: usize = 64;

//------------ Config --------------------------------------------------------

/// Configuration of a packet stream.
#[derive(Clone, Debug)]
pub struct Config {
    /// Only decode the headers of data packets.
    header_only: bool,

    /// The capture filter for the frame source.
    capture_filter: String,

    /// The poll interval for a live frame source.
    poll_interval: Duration,
}

impl Config {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns whether only the headers of data packets are decoded.
    pub fn header_only(&self) -> bool {
        self.header_only
    }

    /// Sets whether only the headers of data packets are decoded.
    ///
    /// Packets decoded this way have no records which is sufficient for
    /// tracking the health of senders and a lot cheaper.
    pub fn set_header_only(&mut self, header_only: bool) {
        self.header_only = header_only
    }

    /// Returns the capture filter a frame source should apply.
    pub fn capture_filter(&self) -> &str {
        &self.capture_filter
    }

    /// Replaces the capture filter.
    ///
    /// An empty filter accepts every frame, which is needed when reading
    /// raw dumps without framing.
    pub fn set_capture_filter(&mut self, filter: impl Into<String>) {
        self.capture_filter = filter.into()
    }

    /// Restricts the default capture filter further.
    ///
    /// The resulting filter is the conjunction of the default filter and
    /// `extra`.
    pub fn set_extra_filter(&mut self, extra: &str) {
        self.capture_filter =
            format!("({}) and ({})", DEFAULT_CAPTURE_FILTER, extra);
    }

    /// Returns the poll interval for a live frame source.
    ///
    /// This is the maximum time a frame source should block waiting for a
    /// frame before reporting a timeout so that a stop request is noticed.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Sets the poll interval.
    ///
    /// The value is limited to between 1 ms and 10 s.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = POLL_INTERVAL.limit(interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            header_only: false,
            capture_filter: DEFAULT_CAPTURE_FILTER.into(),
            poll_interval: POLL_INTERVAL.default(),
        }
    }
}

//------------ FrameSource ---------------------------------------------------

/// A source of captured frames.
pub trait FrameSource {
    /// The error when pulling a frame fails.
    type Error;

    /// Pulls the next frame.
    ///
    /// A live source should not block for longer than the poll interval
    /// but return [`NextFrame::Timeout`] instead.
    fn next_frame(&mut self) -> Result<NextFrame, Self::Error>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    type Error = S::Error;

    fn next_frame(&mut self) -> Result<NextFrame, Self::Error> {
        (**self).next_frame()
    }
}

//------------ NextFrame -----------------------------------------------------

/// The outcome of pulling a frame from a frame source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NextFrame {
    /// A frame was captured.
    Frame(Frame),

    /// No frame arrived within the poll interval.
    Timeout,

    /// There will be no more frames.
    Eof,
}

//------------ Replay --------------------------------------------------------

/// A frame source replaying the frames of an iterator.
#[derive(Clone, Debug)]
pub struct Replay<I> {
    frames: I,
}

impl<I> Replay<I> {
    /// Creates a new replay of the given frames.
    pub fn new<T>(frames: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Replay {
            frames: frames.into_iter(),
        }
    }
}

impl<I: Iterator<Item = Frame>> FrameSource for Replay<I> {
    type Error = Infallible;

    fn next_frame(&mut self) -> Result<NextFrame, Self::Error> {
        Ok(self.frames.next().map_or(NextFrame::Eof, NextFrame::Frame))
    }
}

//------------ StopHandle ----------------------------------------------------

/// A handle for stopping a packet stream.
///
/// Clones of the handle share the same flag.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Creates a new handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests all streams using this handle to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed)
    }

    /// Returns whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

//------------ PacketStream --------------------------------------------------

/// An iterator over the packets decoded from a frame source.
///
/// The iterator ends when the frame source reports the end of its frames
/// or when a stop was requested. Errors from the frame source are passed
/// on. Iteration may continue after such an error if the source allows it.
#[derive(Debug)]
pub struct PacketStream<S> {
    source: S,
    config: Config,
    stop: StopHandle,
    done: bool,
}

impl<S> PacketStream<S> {
    /// Creates a new stream from a frame source and config.
    pub fn new(source: S, config: Config) -> Self {
        Self::with_stop(source, config, StopHandle::new())
    }

    /// Creates a new stream using the given stop handle.
    pub fn with_stop(source: S, config: Config, stop: StopHandle) -> Self {
        PacketStream {
            source,
            config,
            stop,
            done: false,
        }
    }

    /// Returns the config of the stream.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a handle that can stop the stream.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Converts the stream into an iterator over the individual records.
    pub fn flows(self) -> FlowIter<S> {
        FlowIter {
            packets: self,
            current: None,
        }
    }

    /// Converts the stream back into its frame source.
    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S: FrameSource> PacketStream<S> {
    /// Unwraps and decodes a frame.
    ///
    /// Failures are logged and result in `None`.
    fn process(&self, frame: &Frame) -> Option<Packet> {
        let datagram = match frame.unwrap() {
            Ok(datagram) => datagram,
            Err(err) => {
                let err = StreamError::from(err);
                warn!(
                    "Dropping frame captured at {}: {err} ({})",
                    frame.timestamp(),
                    base16::encode_excerpt(frame.data(), EXCERPT_LEN)
                );
                return None;
            }
        };
        match Packet::decode(&datagram, self.config.header_only) {
            Ok(packet) => {
                trace!(
                    "Packet from {}: seq {}, {} sets",
                    packet.source(),
                    packet.header().sequence_number(),
                    packet.header().sets_count()
                );
                Some(packet)
            }
            Err(err) => {
                let excerpt =
                    base16::encode_excerpt(datagram.payload, EXCERPT_LEN);
                let err = StreamError::Decode {
                    source: datagram.source,
                    error: err,
                };
                warn!("Dropping packet: {err} ({excerpt})");
                None
            }
        }
    }
}

impl<S: FrameSource> Iterator for PacketStream<S> {
    type Item = Result<Packet, S::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.stop.is_stopped() {
                debug!("Stop requested, ending packet stream");
                self.done = true;
                break;
            }
            let frame = match self.source.next_frame() {
                Ok(NextFrame::Frame(frame)) => frame,
                Ok(NextFrame::Timeout) => continue,
                Ok(NextFrame::Eof) => {
                    debug!("End of frames, ending packet stream");
                    self.done = true;
                    break;
                }
                Err(err) => return Some(Err(err)),
            };
            if let Some(packet) = self.process(&frame) {
                return Some(Ok(packet));
            }
        }
        None
    }
}

//------------ FlowIter ------------------------------------------------------

/// An iterator over the records of a packet stream.
///
/// Each item is a single record together with the capture time and sender
/// of its packet. Statistics packets are skipped.
#[derive(Debug)]
pub struct FlowIter<S> {
    packets: PacketStream<S>,
    current: Option<(OffsetDateTime, SourceKey, vec::IntoIter<Record>)>,
}

impl<S> FlowIter<S> {
    /// Returns a handle that can stop the underlying stream.
    pub fn stop_handle(&self) -> StopHandle {
        self.packets.stop_handle()
    }
}

impl<S: FrameSource> Iterator for FlowIter<S> {
    type Item = Result<Flow, S::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((timestamp, source, ref mut records)) = self.current {
                if let Some(record) = records.next() {
                    return Some(Ok(Flow {
                        timestamp,
                        source,
                        record,
                    }));
                }
                self.current = None;
            }
            let packet = match self.packets.next()? {
                Ok(packet) => packet,
                Err(err) => return Some(Err(err)),
            };
            let (timestamp, source) = (packet.timestamp(), packet.source());
            let (_, body) = packet.into_message().into_parts();
            if let Body::Records(records) = body {
                self.current = Some((timestamp, source, records.into_iter()));
            }
        }
    }
}

//------------ Flow ----------------------------------------------------------

/// A single record with the capture time and sender of its packet.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Flow {
    pub timestamp: OffsetDateTime,
    pub source: SourceKey,
    pub record: Record,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.timestamp, self.record)
    }
}

//============ Error Types ===================================================

//------------ StreamError ---------------------------------------------------

/// A frame or packet was dropped by the stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StreamError {
    /// The framing of a frame was broken.
    Frame(FrameError),

    /// The dnsflow packet of a frame was broken.
    Decode {
        /// The sender of the packet.
        source: SourceKey,

        /// The reason.
        error: DecodeError,
    },
}

impl From<FrameError> for StreamError {
    fn from(err: FrameError) -> Self {
        StreamError::Frame(err)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StreamError::Frame(ref err) => fmt::Display::fmt(err.kind(), f),
            StreamError::Decode { source, ref error } => {
                write!(f, "{} from {}", error, source)
            }
        }
    }
}

impl std::error::Error for StreamError {}

//============ Testing =======================================================
