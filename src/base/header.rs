//! The header of a dnsflow packet.
//!
//! Each dnsflow packet starts with an eight octet long header that states
//! the protocol version, how many flow records follow, a set of flags, and
//! a sequence number the sender increments for every packet it emits. The
//! flags determine whether the rest of the packet is a statistics block or
//! a batch of flow records.

use super::wire::{Compose, DecodeError};
use core::fmt;
use octseq::builder::OctetsBuilder;
use octseq::parse::Parser;

//------------ Version -------------------------------------------------------

/// The version of the dnsflow protocol.
///
/// The version determines how the names of a flow record are encoded and
/// whether the statistics block carries the sample rate.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Version {
    /// Names are NUL-terminated strings.
    V0,

    /// Names are uncompressed domain names in wire format.
    V1,

    /// Like version 1 but statistics carry the sample rate.
    V2,
}

impl Version {
    /// The version current senders emit.
    pub const CURRENT: Self = Version::V2;

    /// Returns the version for the given version octet.
    pub fn from_int(value: u8) -> Option<Self> {
        match value {
            0 => Some(Version::V0),
            1 => Some(Version::V1),
            2 => Some(Version::V2),
            _ => None,
        }
    }

    /// Returns the version octet for this version.
    pub fn to_int(self) -> u8 {
        match self {
            Version::V0 => 0,
            Version::V1 => 1,
            Version::V2 => 2,
        }
    }

    /// Returns whether names are encoded as sequences of labels.
    pub fn has_label_names(self) -> bool {
        self != Version::V0
    }

    /// Returns whether the statistics block carries the sample rate.
    pub fn has_sample_rate(self) -> bool {
        self == Version::V2
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_int())
    }
}

//------------ Flags ---------------------------------------------------------

/// The flags field of a dnsflow header.
///
/// Only a single flag is currently defined: [`Flags::STATS`] marks a
/// packet as carrying a statistics snapshot rather than flow records. All
/// other bits are kept as received.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Flags(u16);

impl Flags {
    /// The packet carries a statistics snapshot.
    pub const STATS: Self = Flags(0x0001);

    /// Creates flags from their wire value.
    pub const fn from_int(value: u16) -> Self {
        Flags(value)
    }

    /// Returns the wire value of the flags.
    pub const fn to_int(self) -> u16 {
        self.0
    }

    /// Returns whether all bits set in `other` are set in `self`.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether the STATS bit is set.
    pub const fn stats(self) -> bool {
        self.contains(Flags::STATS)
    }

    /// Sets or clears the STATS bit.
    pub fn set_stats(&mut self, set: bool) {
        if set {
            self.0 |= Flags::STATS.0
        } else {
            self.0 &= !Flags::STATS.0
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

//------------ Header --------------------------------------------------------

/// The fixed header of a dnsflow packet.
///
/// The data is layed out like this, with all integers in network byte
/// order:
///
/// ```text
///   0        1        2        3
/// +--------+--------+--------+--------+
/// |version |  sets  |      flags      |
/// +--------+--------+--------+--------+
/// |          sequence number          |
/// +--------+--------+--------+--------+
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Header {
    version: Version,
    sets_count: u8,
    flags: Flags,
    sequence_number: u32,
}

/// # Creation and Conversion
///
impl Header {
    /// The length of the header in its wire format.
    pub const LEN: usize = 8;

    /// Creates a new header from its components.
    pub fn new(
        version: Version,
        sets_count: u8,
        flags: Flags,
        sequence_number: u32,
    ) -> Self {
        Header {
            version,
            sets_count,
            flags,
            sequence_number,
        }
    }

    /// Takes a header from the beginning of the parser.
    ///
    /// Fails if there are less than eight octets left, if the version is
    /// unknown, or if a packet without the STATS flag claims to contain no
    /// records.
    pub fn parse(parser: &mut Parser<[u8]>) -> Result<Self, DecodeError> {
        let available = parser.remaining();
        let short = |_| DecodeError::TruncatedHeader { available };
        if available < Self::LEN {
            return Err(DecodeError::TruncatedHeader { available });
        }
        let version = parser.parse_u8().map_err(short)?;
        let sets_count = parser.parse_u8().map_err(short)?;
        let flags = Flags::from_int(parser.parse_u16_be().map_err(short)?);
        let sequence_number = parser.parse_u32_be().map_err(short)?;

        let version = match Version::from_int(version) {
            Some(version) if flags.stats() || sets_count > 0 => version,
            _ => {
                return Err(DecodeError::InvalidHeader {
                    version,
                    sets_count,
                })
            }
        };
        Ok(Header::new(version, sets_count, flags, sequence_number))
    }

    /// Appends the header in wire format to the target.
    pub fn compose<Target: OctetsBuilder + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        self.version.to_int().compose(target)?;
        self.sets_count.compose(target)?;
        self.flags.to_int().compose(target)?;
        self.sequence_number.compose(target)
    }
}

/// # Field Access
///
impl Header {
    /// Returns the protocol version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the number of flow records the packet claims to contain.
    ///
    /// For statistics packets, this value carries no meaning.
    pub fn sets_count(&self) -> u8 {
        self.sets_count
    }

    /// Returns the flags.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Returns whether this is the header of a statistics packet.
    pub fn is_stats(&self) -> bool {
        self.flags.stats()
    }

    /// Returns the sequence number.
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn parse() {
        let data = b"\x02\x03\x00\x00\x00\x00\x01\x00rest";
        let mut parser = Parser::from_ref(data.as_ref());
        let header = Header::parse(&mut parser).unwrap();
        assert_eq!(header.version(), Version::V2);
        assert_eq!(header.sets_count(), 3);
        assert!(!header.is_stats());
        assert_eq!(header.sequence_number(), 256);
        assert_eq!(parser.remaining(), 4);
    }

    #[test]
    fn short_header() {
        let data = b"\x02\x03\x00\x00\x00\x00\x01";
        assert_eq!(
            Header::parse(&mut Parser::from_ref(data.as_ref())),
            Err(DecodeError::TruncatedHeader { available: 7 })
        );

        let mut parser = Parser::from_ref(data.as_ref());
        parser.advance(4).unwrap();
        assert_eq!(
            Header::parse(&mut parser),
            Err(DecodeError::TruncatedHeader { available: 3 })
        );
        assert_eq!(
            Header::parse(&mut Parser::from_ref(b"".as_ref())),
            Err(DecodeError::TruncatedHeader { available: 0 })
        );
    }

    #[test]
    fn bad_version() {
        let data = b"\x03\x01\x00\x00\x00\x00\x00\x01";
        assert_eq!(
            Header::parse(&mut Parser::from_ref(data.as_ref())),
            Err(DecodeError::InvalidHeader {
                version: 3,
                sets_count: 1
            })
        );
    }

    #[test]
    fn empty_sets() {
        let data = b"\x01\x00\x00\x00\x00\x00\x00\x01";
        assert_eq!(
            Header::parse(&mut Parser::from_ref(data.as_ref())),
            Err(DecodeError::InvalidHeader {
                version: 1,
                sets_count: 0
            })
        );

        // Statistics packets don’t need records.
        let data = b"\x01\x00\x00\x01\x00\x00\x00\x01";
        let header =
            Header::parse(&mut Parser::from_ref(data.as_ref())).unwrap();
        assert!(header.is_stats());
        assert_eq!(header.sets_count(), 0);
    }

    #[test]
    fn compose() {
        let header = Header::new(Version::V1, 7, Flags::STATS, 0xdead_beef);
        let mut buf = Vec::new();
        header.compose(&mut buf).unwrap();
        assert_eq!(buf, b"\x01\x07\x00\x01\xde\xad\xbe\xef");
    }

    #[test]
    fn flags() {
        let mut flags = Flags::from_int(0x8000);
        assert!(!flags.stats());
        flags.set_stats(true);
        assert_eq!(flags.to_int(), 0x8001);
        flags.set_stats(false);
        assert_eq!(flags, Flags::from_int(0x8000));
    }
}
