//! Decoded packets and the senders they came from.

use crate::base::{Body, DecodeError, Header, Message, Record, StatsSnapshot};
use crate::frame::Datagram;
use core::fmt;
use std::net::Ipv4Addr;
use time::OffsetDateTime;

//------------ SourceKey -----------------------------------------------------

/// The address and port of a dnsflow sender.
///
/// Packets that were written directly into a capture file without any
/// network framing have the unspecified address and port zero.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SourceKey {
    ip: Ipv4Addr,
    port: u16,
}

impl SourceKey {
    /// The key used for packets that carry no network framing.
    pub const UNSPECIFIED: Self = SourceKey::new(Ipv4Addr::UNSPECIFIED, 0);

    /// Creates a new key from an address and port.
    pub const fn new(ip: Ipv4Addr, port: u16) -> Self {
        SourceKey { ip, port }
    }

    /// Returns the address of the sender.
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Returns the port of the sender.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

//------------ Packet --------------------------------------------------------

/// A decoded dnsflow packet together with where and when it was seen.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Packet {
    timestamp: OffsetDateTime,
    source: SourceKey,
    message: Message,
}

impl Packet {
    /// Creates a packet from its components.
    pub fn new(
        timestamp: OffsetDateTime,
        source: SourceKey,
        message: Message,
    ) -> Self {
        Packet {
            timestamp,
            source,
            message,
        }
    }

    /// Decodes the payload of a datagram.
    ///
    /// See [`Message::parse`] for the meaning of `header_only`.
    pub fn decode(
        datagram: &Datagram,
        header_only: bool,
    ) -> Result<Self, DecodeError> {
        Message::parse(datagram.payload, header_only).map(|message| {
            Packet::new(datagram.timestamp, datagram.source, message)
        })
    }

    /// Returns the capture time of the packet.
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Returns the sender of the packet.
    pub fn source(&self) -> SourceKey {
        self.source
    }

    /// Returns the decoded message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Converts the packet into its message.
    pub fn into_message(self) -> Message {
        self.message
    }

    /// Returns the header of the message.
    pub fn header(&self) -> &Header {
        self.message.header()
    }

    /// Returns the body of the message.
    pub fn body(&self) -> &Body {
        self.message.body()
    }

    /// Returns the statistics snapshot of a statistics packet.
    pub fn stats(&self) -> Option<&StatsSnapshot> {
        self.body().stats()
    }

    /// Returns the decoded records.
    ///
    /// This is empty for statistics packets and for packets decoded in
    /// header-only mode.
    pub fn records(&self) -> &[Record] {
        self.body().records().unwrap_or_default()
    }
}
