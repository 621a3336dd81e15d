//! Statistics snapshots.
//!
//! Senders periodically report the counters of their capture process in a
//! packet with the STATS flag set. The block consists of four 32 bit
//! counters, followed by the sample rate for version 2 of the protocol.

use super::header::Version;
use super::wire::{Compose, DecodeError};
use core::ops;
use octseq::builder::OctetsBuilder;
use octseq::parse::Parser;

//------------ StatsSnapshot -------------------------------------------------

/// The capture counters of a sender at one point in time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatsSnapshot {
    /// Packets the sender has captured.
    pub pkts_captured: u32,

    /// Packets received by the capture filter.
    pub pkts_received: u32,

    /// Packets dropped by the kernel.
    pub pkts_dropped: u32,

    /// Packets dropped by the interface.
    ///
    /// Only some platforms support this counter.
    pub pkts_ifdropped: u32,

    /// The sample rate of the sender, only present in version 2.
    pub sample_rate: Option<u32>,
}

impl StatsSnapshot {
    /// The names of the counters in the order they appear on the wire.
    const FIELDS: [&'static str; 5] = [
        "pkts_captured",
        "pkts_received",
        "pkts_dropped",
        "pkts_ifdropped",
        "sample_rate",
    ];

    /// Returns the length of the statistics block for a version.
    pub fn wire_len(version: Version) -> usize {
        if version.has_sample_rate() {
            20
        } else {
            16
        }
    }

    /// Takes a statistics block from the parser.
    ///
    /// The number of counters read depends on `version`.
    pub fn parse(
        parser: &mut Parser<[u8]>,
        version: Version,
    ) -> Result<Self, DecodeError> {
        let count = if version.has_sample_rate() { 5 } else { 4 };
        let mut values = [0u32; 5];
        for (value, field) in values.iter_mut().zip(Self::FIELDS).take(count)
        {
            let offset = parser.pos();
            *value = parser.parse_u32_be().map_err(|_| {
                DecodeError::TruncatedStats { offset, field }
            })?;
        }
        Ok(StatsSnapshot {
            pkts_captured: values[0],
            pkts_received: values[1],
            pkts_dropped: values[2],
            pkts_ifdropped: values[3],
            sample_rate: version.has_sample_rate().then_some(values[4]),
        })
    }

    /// Appends the statistics block for `version` to the target.
    ///
    /// A missing sample rate is written as zero for version 2. A sample
    /// rate is never written for earlier versions.
    pub fn compose<Target: OctetsBuilder + ?Sized>(
        &self,
        version: Version,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        self.pkts_captured.compose(target)?;
        self.pkts_received.compose(target)?;
        self.pkts_dropped.compose(target)?;
        self.pkts_ifdropped.compose(target)?;
        if version.has_sample_rate() {
            self.sample_rate.unwrap_or(0).compose(target)?;
        }
        Ok(())
    }
}

//------------ StatsDelta ----------------------------------------------------

/// The difference between two statistics snapshots.
///
/// The sample rate is not a counter and therefore has no delta. Deltas are
/// signed: a sender that restarted reports counters smaller than before,
/// which shows up as a negative delta.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatsDelta {
    pub pkts_captured: i64,
    pub pkts_received: i64,
    pub pkts_dropped: i64,
    pub pkts_ifdropped: i64,
}

impl StatsDelta {
    /// Returns the change from `prev` to `cur`.
    pub fn between(prev: &StatsSnapshot, cur: &StatsSnapshot) -> Self {
        fn diff(prev: u32, cur: u32) -> i64 {
            i64::from(cur) - i64::from(prev)
        }

        StatsDelta {
            pkts_captured: diff(prev.pkts_captured, cur.pkts_captured),
            pkts_received: diff(prev.pkts_received, cur.pkts_received),
            pkts_dropped: diff(prev.pkts_dropped, cur.pkts_dropped),
            pkts_ifdropped: diff(prev.pkts_ifdropped, cur.pkts_ifdropped),
        }
    }
}

impl ops::AddAssign for StatsDelta {
    fn add_assign(&mut self, other: Self) {
        self.pkts_captured += other.pkts_captured;
        self.pkts_received += other.pkts_received;
        self.pkts_dropped += other.pkts_dropped;
        self.pkts_ifdropped += other.pkts_ifdropped;
    }
}

//============ Testing =======================================================
