//! Removing the network framing from captured frames.
//!
//! dnsflow packets are normally captured off the wire by a collector and
//! thus arrive wrapped in link-layer, IPv4, and UDP headers. Senders can
//! also dump their packets straight into a capture file. In that case, the
//! frames use the loopback link type with an unspecified address family
//! and the dnsflow packet directly follows the four octet loopback header.
//!
//! [`Frame::unwrap`] strips whatever framing is present and returns a
//! [`Datagram`] with the sender’s address and the dnsflow payload.

use crate::packet::SourceKey;
use crate::utils::base16;
use core::fmt;
use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use std::net::Ipv4Addr;
use std::string::{String, ToString};
use std::vec::Vec;
use time::OffsetDateTime;

/// The address family for frames without network framing.
const AF_UNSPEC: u32 = 0;

/// The address family for IPv4.
const AF_INET: u32 = 2;

/// The length of the loopback link-layer header.
const LOOPBACK_HDR_LEN: usize = 4;

//------------ LinkType ------------------------------------------------------

/// The link-layer type of captured frames.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LinkType {
    /// BSD loopback encapsulation with a four octet address family.
    Loopback,

    /// Ethernet II.
    Ethernet,
}

impl LinkType {
    /// Returns the link type for a pcap `DLT_` value, if it is supported.
    pub fn from_dlt(dlt: u32) -> Option<Self> {
        match dlt {
            0 => Some(LinkType::Loopback),
            1 => Some(LinkType::Ethernet),
            _ => None,
        }
    }

    /// Returns the pcap `DLT_` value for the link type.
    pub fn to_dlt(self) -> u32 {
        match self {
            LinkType::Loopback => 0,
            LinkType::Ethernet => 1,
        }
    }
}

//------------ Frame ---------------------------------------------------------

/// A captured frame as delivered by a frame source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    timestamp: OffsetDateTime,
    link_type: LinkType,
    data: Vec<u8>,
}

impl Frame {
    /// Creates a new frame.
    pub fn new(
        timestamp: OffsetDateTime,
        link_type: LinkType,
        data: Vec<u8>,
    ) -> Self {
        Frame {
            timestamp,
            link_type,
            data,
        }
    }

    /// Returns the capture time of the frame.
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Returns the link-layer type of the frame.
    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Returns the raw octets of the frame.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Strips the framing and returns the datagram inside.
    pub fn unwrap(&self) -> Result<Datagram<'_>, FrameError> {
        unwrap_frame(self.link_type, &self.data, self.timestamp)
    }
}

//------------ Datagram ------------------------------------------------------

/// The dnsflow payload of a frame and where it came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Datagram<'a> {
    /// The capture time of the frame.
    pub timestamp: OffsetDateTime,

    /// The sender of the datagram.
    pub source: SourceKey,

    /// The dnsflow packet.
    pub payload: &'a [u8],
}

//------------ unwrap_frame --------------------------------------------------

/// Strips the framing of a frame of the given link type.
///
/// Ethernet frames are expected to carry IPv4 and UDP. Loopback frames may
/// either carry IPv4 and UDP or, with an unspecified address family, the
/// dnsflow packet itself.
pub fn unwrap_frame(
    link_type: LinkType,
    data: &[u8],
    timestamp: OffsetDateTime,
) -> Result<Datagram<'_>, FrameError> {
    let (source, payload) = match link_type {
        LinkType::Loopback => unwrap_loopback(data)?,
        LinkType::Ethernet => {
            let sliced = SlicedPacket::from_ethernet(data)
                .map_err(|err| FrameError::malformed(err, data))?;
            unwrap_udp(sliced, data)?
        }
    };
    Ok(Datagram {
        timestamp,
        source,
        payload,
    })
}

fn unwrap_loopback(data: &[u8]) -> Result<(SourceKey, &[u8]), FrameError> {
    if data.len() < LOOPBACK_HDR_LEN {
        return Err(FrameError::new(FrameErrorKind::ShortLoopback, data));
    }
    let (hdr, rest) = data.split_at(LOOPBACK_HDR_LEN);
    let hdr = [hdr[0], hdr[1], hdr[2], hdr[3]];

    // The family is in the byte order of the capturing host. All known
    // families are small, so the smaller interpretation is the right one.
    let family = u32::from_le_bytes(hdr).min(u32::from_be_bytes(hdr));
    match family {
        AF_UNSPEC => Ok((SourceKey::UNSPECIFIED, rest)),
        AF_INET => {
            let sliced = SlicedPacket::from_ip(rest)
                .map_err(|err| FrameError::malformed(err, data))?;
            unwrap_udp(sliced, data)
        }
        family => Err(FrameError::new(
            FrameErrorKind::UnknownFamily(family),
            data,
        )),
    }
}

fn unwrap_udp<'a>(
    sliced: SlicedPacket<'a>,
    data: &[u8],
) -> Result<(SourceKey, &'a [u8]), FrameError> {
    let ip: Ipv4Addr = match sliced.net {
        Some(NetSlice::Ipv4(ref ipv4)) => ipv4.header().source_addr(),
        _ => return Err(FrameError::new(FrameErrorKind::NotIpv4, data)),
    };
    match sliced.transport {
        Some(TransportSlice::Udp(udp)) => {
            Ok((SourceKey::new(ip, udp.source_port()), udp.payload()))
        }
        _ => Err(FrameError::new(FrameErrorKind::NotUdp, data)),
    }
}

//============ Error Types ===================================================

//------------ FrameErrorKind ------------------------------------------------

/// The reason a frame could not be unwrapped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FrameErrorKind {
    /// The frame is shorter than the loopback header.
    ShortLoopback,

    /// The loopback header has an unsupported address family.
    UnknownFamily(u32),

    /// A link-layer, IP, or UDP header is broken or truncated.
    Malformed(String),

    /// The frame doesn’t carry IPv4.
    NotIpv4,

    /// The frame doesn’t carry UDP.
    NotUdp,
}

impl fmt::Display for FrameErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FrameErrorKind::ShortLoopback => {
                f.write_str("short loopback header")
            }
            FrameErrorKind::UnknownFamily(family) => {
                write!(f, "unknown address family {}", family)
            }
            FrameErrorKind::Malformed(ref msg) => {
                write!(f, "malformed frame: {}", msg)
            }
            FrameErrorKind::NotIpv4 => f.write_str("not an IPv4 packet"),
            FrameErrorKind::NotUdp => f.write_str("not a UDP datagram"),
        }
    }
}

//------------ FrameError ----------------------------------------------------

/// A frame could not be unwrapped.
///
/// The error keeps a copy of the frame for diagnostics.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FrameError {
    kind: FrameErrorKind,
    raw: Vec<u8>,
}

impl FrameError {
    fn new(kind: FrameErrorKind, raw: &[u8]) -> Self {
        FrameError {
            kind,
            raw: raw.into(),
        }
    }

    fn malformed(err: impl fmt::Display, raw: &[u8]) -> Self {
        Self::new(FrameErrorKind::Malformed(err.to_string()), raw)
    }

    /// Returns the reason for the error.
    pub fn kind(&self) -> &FrameErrorKind {
        &self.kind
    }

    /// Returns the octets of the offending frame.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}|", self.kind)?;
        base16::display(&self.raw, f)
    }
}

impl std::error::Error for FrameError {}

//============ Testing =======================================================
