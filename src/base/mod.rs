//! Basics.
//!
//! This module provides the types for dnsflow data in its wire format and
//! the means to extract them from and assemble them into that format.
//!
//! ## Parsing and Composing Messages
//!
//! We use the term *parsing* for extracting data from the wire-format
//! representation and *composing* for producing such a representation.
//!
//! Parsing happens on the payload of a single datagram via
//! [`octseq::parse::Parser`] which checks the remaining length before
//! handing out any octets. This matters since all lengths and counts in a
//! packet are controlled by its sender. Parsing failures are reported as
//! [`DecodeError`]s that state the offset and the field where decoding
//! stopped.
//!
//! Composing appends to any [`Composer`], most commonly a `Vec<u8>`.
//!
//! # Types for dnsflow Data
//!
//! * [header](header/index.html) for the fixed header of each packet,
//! * [stats](stats/index.html) for statistics snapshots,
//! * [record](record/index.html) for flow records,
//! * [name](name/index.html) for the two encodings of a record’s names,
//! * [message](message/index.html) for complete messages.

//--- Re-exports

pub use self::header::{Flags, Header, Version};
pub use self::message::{Body, Message};
pub use self::record::Record;
pub use self::stats::{StatsDelta, StatsSnapshot};
pub use self::wire::{Compose, ComposeError, Composer, DecodeError};

//--- Modules

pub mod header;
pub mod message;
pub mod name;
pub mod record;
pub mod stats;
pub mod wire;
