//! Creating and consuming data in wire format.

use core::fmt;
use std::net::Ipv4Addr;
use octseq::builder::{OctetsBuilder, ShortBuf, Truncate};

//------------ compose functions ---------------------------------------------

/// Composes some data prefixed by its length as a 16 bit integer.
///
/// If the data composed by `op` is longer than 0xFFFF octets, the target is
/// truncated back to where it was before the length and an error is
/// returned.
pub fn compose_len_prefixed<Target, F>(
    target: &mut Target,
    op: F,
) -> Result<(), ComposeError>
where
    Target: Composer + ?Sized,
    F: FnOnce(&mut Target) -> Result<(), ComposeError>,
{
    let start = target.as_ref().len();
    target.append_slice(&[0; 2])?;
    let pos = target.as_ref().len();
    let res = op(target).and_then(|_| {
        u16::try_from(target.as_ref().len() - pos)
            .map_err(|_| ComposeError::LongData)
    });
    match res {
        Ok(len) => {
            target.as_mut()[pos - 2..pos].copy_from_slice(&len.to_be_bytes());
            Ok(())
        }
        Err(err) => {
            target.truncate(start);
            Err(err)
        }
    }
}

/// Pads the target with zero octets until its length is a multiple of four.
///
/// Counting starts at `start`, which allows aligning relative to the
/// beginning of a packet that is embedded in a larger buffer.
pub fn compose_word_padding<Target>(
    target: &mut Target,
    start: usize,
) -> Result<(), ComposeError>
where
    Target: Composer + ?Sized,
{
    let len = target.as_ref().len().saturating_sub(start);
    let pad = (4 - len % 4) % 4;
    target.append_slice(&[0; 3][..pad])?;
    Ok(())
}

//------------ Composer ------------------------------------------------------

/// An octets builder that allows going back and fixing up earlier octets.
pub trait Composer:
    OctetsBuilder + AsRef<[u8]> + AsMut<[u8]> + Truncate
{
}

impl Composer for std::vec::Vec<u8> {}

//------------ Compose -------------------------------------------------------

/// A type that can be appended to an octets builder in wire format.
pub trait Compose {
    fn compose<Target: OctetsBuilder + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError>;
}

impl Compose for u8 {
    fn compose<Target: OctetsBuilder + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        target.append_slice(&[*self])
    }
}

macro_rules! compose_to_be_bytes {
    ( $type:ident ) => {
        impl Compose for $type {
            fn compose<Target: OctetsBuilder + ?Sized>(
                &self,
                target: &mut Target,
            ) -> Result<(), Target::AppendError> {
                target.append_slice(&self.to_be_bytes())
            }
        }
    };
}

compose_to_be_bytes!(u16);
compose_to_be_bytes!(u32);

impl Compose for Ipv4Addr {
    fn compose<Target: OctetsBuilder + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        target.append_slice(&self.octets())
    }
}

//============ Error Types ===================================================

//------------ ComposeError --------------------------------------------------

/// An error happened while composing data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ComposeError {
    /// A length or count doesn’t fit into its wire field.
    LongData,

    /// The target buffer ran out of space.
    ShortBuf,

    /// A name can’t be expressed in the encoding of the packet version.
    InvalidName,
}

impl<T: Into<ShortBuf>> From<T> for ComposeError {
    fn from(_: T) -> Self {
        ComposeError::ShortBuf
    }
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ComposeError::LongData => f.write_str("long data"),
            ComposeError::ShortBuf => f.write_str("short buffer"),
            ComposeError::InvalidName => f.write_str("invalid name"),
        }
    }
}

impl std::error::Error for ComposeError {}

//------------ DecodeError ---------------------------------------------------

/// Decoding a dnsflow packet failed.
///
/// All variants carry the position in the packet payload where decoding
/// gave up so that the offending octets can be reported. None of them is
/// fatal for a stream of packets: the packet should be dropped and
/// processing continue with the next one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// The payload is shorter than the fixed eight octet header.
    TruncatedHeader {
        /// The number of octets that were available.
        available: usize,
    },

    /// The header carries an unknown version or an empty record set.
    InvalidHeader {
        /// The version octet of the header.
        version: u8,

        /// The sets count octet of the header.
        sets_count: u8,
    },

    /// The statistics block ends before all its counters.
    TruncatedStats {
        /// The offset of the counter that could not be read.
        offset: usize,

        /// The name of that counter.
        field: &'static str,
    },

    /// A flow record ends before one of its fields.
    RecordTruncated {
        /// The zero-based index of the record in the packet.
        record: usize,

        /// The offset of the field that could not be read.
        offset: usize,

        /// The name of that field.
        field: &'static str,
    },

    /// The names buffer of a record ends in the middle of a name.
    NameDecodeTruncated {
        /// The zero-based index of the record in the packet.
        record: usize,

        /// The zero-based index of the name within the record.
        name: usize,

        /// The offset in the packet where the name data ran out.
        offset: usize,
    },
}

impl DecodeError {
    /// Returns the offset into the payload where decoding failed.
    pub fn offset(&self) -> usize {
        match *self {
            DecodeError::TruncatedHeader { .. } => 0,
            DecodeError::InvalidHeader { .. } => 0,
            DecodeError::TruncatedStats { offset, .. } => offset,
            DecodeError::RecordTruncated { offset, .. } => offset,
            DecodeError::NameDecodeTruncated { offset, .. } => offset,
        }
    }

    /// Returns the name of the field that could not be decoded.
    pub fn field(&self) -> &'static str {
        match *self {
            DecodeError::TruncatedHeader { .. } => "header",
            DecodeError::InvalidHeader { .. } => "header",
            DecodeError::TruncatedStats { field, .. } => field,
            DecodeError::RecordTruncated { field, .. } => field,
            DecodeError::NameDecodeTruncated { .. } => "names",
        }
    }
}

//--- Display and Error

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DecodeError::TruncatedHeader { available } => {
                write!(f, "short header: {} octets", available)
            }
            DecodeError::InvalidHeader {
                version,
                sets_count,
            } => {
                write!(
                    f,
                    "bad header: version {}, sets count {}",
                    version, sets_count
                )
            }
            DecodeError::TruncatedStats { offset, field } => {
                write!(f, "short stats at offset {}: {}", offset, field)
            }
            DecodeError::RecordTruncated {
                record,
                offset,
                field,
            } => {
                write!(
                    f,
                    "short record {} at offset {}: {}",
                    record, offset, field
                )
            }
            DecodeError::NameDecodeTruncated {
                record,
                name,
                offset,
            } => {
                write!(
                    f,
                    "short name {} in record {} at offset {}",
                    name, record, offset
                )
            }
        }
    }
}

impl std::error::Error for DecodeError {}

//============ Testing =======================================================
