//! Decoding and source tracking for the dnsflow telemetry protocol.
//!
//! dnsflow senders watch DNS traffic and report each resolution they see
//! as a flow record: the client that asked, the names involved, and the
//! IPv4 addresses it ended up with. Records are sent in batches in UDP
//! datagrams to a collector. In between, senders report statistics about
//! their packet capture.
//!
//! This crate provides the building blocks of a collector. It decodes the
//! protocol and keeps track of the health of the senders it hears from.
//!
//! # Modules
//!
//! * [base] contains the types for the wire format, i.e., headers,
//!   statistics snapshots, and flow records as well as the means to parse
//!   and compose them,
//! * [frame] strips the link-layer, IPv4, and UDP framing from captured
//!   frames,
//! * [packet] combines a decoded message with its sender and capture
//!   time,
//! * [track] keeps per-sender counts, sequence number reconciliation,
//!   and statistics deltas,
//! * [stream] ties a source of captured frames to the decoder and
//!   produces a stream of packets or individual flow records, and
//! * [utils] contains a few helpers.
//!
//! Capturing frames off a network interface or reading capture files is
//! not part of this crate. Instead, a capture implementation provides
//! frames through the [`stream::FrameSource`] trait.
//!
//! # Reference of Feature Flags
//!
//! * `serde`: Enables serde serialization for decoded packets and the
//!   state of the source tracker.

#![no_std]
#![allow(renamed_and_removed_lints)]
#![allow(clippy::unknown_clippy_lints)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate std;

pub mod base;
pub mod frame;
pub mod packet;
pub mod stream;
pub mod track;
pub mod utils;
