//! Per-source delivery health.
//!
//! A [`SourceTracker`] keeps a [`SourceState`] for every sender it has seen
//! a packet from. The state counts the packets and records received,
//! reconciles sequence numbers into estimates of lost and reordered packets,
//! and turns the sender’s statistics snapshots into deltas.
//!
//! The tracker is fed one decoded [`Packet`] at a time through
//! [`SourceTracker::update`]. Packets that failed to decode never reach it,
//! so a broken packet leaves the state untouched. Since every update is a
//! single synchronous step, the accumulated state can be inspected or
//! summarized at any time.
//!
//! Sequence numbers are 32 bit values and are compared as such. A sender
//! wrapping around its sequence number looks like a single very late packet
//! and is not corrected for.

use crate::base::{Body, StatsDelta, StatsSnapshot};
use crate::packet::{Packet, SourceKey};
use std::cmp::Ordering;
use std::collections::hash_map::{self, HashMap};
use std::vec::Vec;
use time::{Duration, OffsetDateTime};

//------------ SourceTracker -------------------------------------------------

/// The aggregate state of all senders seen so far.
///
/// Entries are created on the first packet of a sender and are never
/// removed.
#[derive(Clone, Debug, Default)]
pub struct SourceTracker {
    sources: HashMap<SourceKey, SourceState>,
}

impl SourceTracker {
    /// Creates a new, empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for a decoded packet.
    ///
    /// Returns the key of the sender whose state was updated.
    pub fn update(&mut self, packet: &Packet) -> SourceKey {
        let key = packet.source();
        self.sources
            .entry(key)
            .or_insert_with(|| SourceState::new(packet.timestamp()))
            .update(packet);
        key
    }

    /// Returns the state of the given sender.
    pub fn get(&self, key: &SourceKey) -> Option<&SourceState> {
        self.sources.get(key)
    }

    /// Returns an iterator over all senders and their state.
    ///
    /// The order of the senders is unspecified.
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.sources.iter())
    }

    /// Returns the number of senders seen so far.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns whether no packet has been accounted for yet.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Returns a summary of the state of the given sender.
    pub fn summary(&self, key: &SourceKey) -> Option<SourceSummary> {
        self.get(key).map(|state| state.summary(*key))
    }

    /// Returns the summaries of all senders ordered by their key.
    pub fn summaries(&self) -> Vec<SourceSummary> {
        let mut res: Vec<_> = self
            .sources
            .iter()
            .map(|(key, state)| state.summary(*key))
            .collect();
        res.sort_by_key(|summary| summary.source);
        res
    }
}

impl<'a> IntoIterator for &'a SourceTracker {
    type Item = (&'a SourceKey, &'a SourceState);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

//------------ Iter ----------------------------------------------------------

/// An iterator over the senders of a tracker.
#[derive(Clone, Debug)]
pub struct Iter<'a>(hash_map::Iter<'a, SourceKey, SourceState>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a SourceKey, &'a SourceState);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}

//------------ SourceState ---------------------------------------------------

/// The accumulated state of a single sender.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SourceState {
    first_timestamp: OffsetDateTime,
    last_timestamp: OffsetDateTime,
    n_data_pkts: u64,
    n_stats_pkts: u64,
    n_records: u64,
    seq: SequenceState,
    stats: Option<StatsDeltaState>,
}

impl SourceState {
    fn new(timestamp: OffsetDateTime) -> Self {
        SourceState {
            first_timestamp: timestamp,
            last_timestamp: timestamp,
            n_data_pkts: 0,
            n_stats_pkts: 0,
            n_records: 0,
            seq: SequenceState::default(),
            stats: None,
        }
    }

    fn update(&mut self, packet: &Packet) {
        self.last_timestamp = packet.timestamp();
        match *packet.body() {
            Body::Stats(ref snapshot) => {
                self.n_stats_pkts += 1;
                match self.stats {
                    Some(ref mut stats) => stats.update(snapshot),
                    None => {
                        self.stats = Some(StatsDeltaState::new(*snapshot))
                    }
                }
            }
            Body::Records(_) => {
                self.n_data_pkts += 1;
                self.n_records += u64::from(packet.header().sets_count());
            }
        }
        self.seq.update(packet.header().sequence_number());
    }

    /// Returns the capture time of the first packet of the sender.
    pub fn first_timestamp(&self) -> OffsetDateTime {
        self.first_timestamp
    }

    /// Returns the capture time of the latest packet of the sender.
    pub fn last_timestamp(&self) -> OffsetDateTime {
        self.last_timestamp
    }

    /// Returns the number of data packets received.
    pub fn n_data_pkts(&self) -> u64 {
        self.n_data_pkts
    }

    /// Returns the number of statistics packets received.
    pub fn n_stats_pkts(&self) -> u64 {
        self.n_stats_pkts
    }

    /// Returns the number of records the data packets claimed to carry.
    ///
    /// This is the sum of the sets counts, so records are counted even if
    /// the packets were decoded in header-only mode.
    pub fn n_records(&self) -> u64 {
        self.n_records
    }

    /// Returns the sequence number state.
    pub fn seq(&self) -> &SequenceState {
        &self.seq
    }

    /// Returns the statistics state if a statistics packet was received.
    pub fn stats(&self) -> Option<&StatsDeltaState> {
        self.stats.as_ref()
    }

    /// Returns the time between the first and the latest packet.
    pub fn duration(&self) -> Duration {
        self.last_timestamp - self.first_timestamp
    }

    /// Returns a summary of the state.
    pub fn summary(&self, source: SourceKey) -> SourceSummary {
        let duration = self.duration();
        let rates = if duration.is_positive() {
            let secs = duration.as_seconds_f64();
            let rate = |value: u64| value as f64 / secs;
            Some(Rates {
                data_pkts: rate(self.n_data_pkts),
                records: rate(self.n_records),
                stats_pkts: rate(self.n_stats_pkts),
                stats: self.stats.as_ref().map(|stats| {
                    let total = stats.delta_total();
                    let rate = |value: i64| value as f64 / secs;
                    DeltaRates {
                        pkts_captured: rate(total.pkts_captured),
                        pkts_received: rate(total.pkts_received),
                        pkts_dropped: rate(total.pkts_dropped),
                        pkts_ifdropped: rate(total.pkts_ifdropped),
                    }
                }),
            })
        } else {
            None
        };
        SourceSummary {
            source,
            state: self.clone(),
            duration,
            rates,
        }
    }
}

//------------ SequenceState -------------------------------------------------

/// Reconciliation of the sequence numbers of a sender.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SequenceState {
    /// The highest sequence number seen in order.
    last: Option<u32>,

    /// The number of packets seen.
    total: u64,

    /// The estimated number of lost packets.
    ///
    /// This goes down again when a packet counted as lost arrives late.
    lost: i64,

    /// The number of packets that arrived late.
    ooo: u64,
}

impl SequenceState {
    /// Accounts for a packet with the given sequence number.
    pub fn update(&mut self, seq: u32) {
        self.total += 1;
        let last = match self.last {
            Some(last) => last,
            None => {
                self.last = Some(seq);
                return;
            }
        };
        let expected = i64::from(last) + 1;
        let seq_wide = i64::from(seq);
        match seq_wide.cmp(&expected) {
            Ordering::Equal => self.last = Some(seq),
            Ordering::Greater => {
                self.lost += seq_wide - expected;
                self.last = Some(seq);
            }
            Ordering::Less if seq < last => {
                self.lost -= 1;
                self.ooo += 1;
            }
            // A repeat of the last sequence number.
            Ordering::Less => {}
        }
    }

    /// Returns the last in-order sequence number.
    pub fn last(&self) -> Option<u32> {
        self.last
    }

    /// Returns the number of packets seen.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Returns the estimated number of lost packets.
    pub fn lost(&self) -> i64 {
        self.lost
    }

    /// Returns the number of packets that arrived out of order.
    pub fn ooo(&self) -> u64 {
        self.ooo
    }
}

//------------ StatsDeltaState -----------------------------------------------

/// The statistics snapshots of a sender turned into deltas.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatsDeltaState {
    last: StatsSnapshot,
    delta_last: StatsDelta,
    delta_total: StatsDelta,
}

impl StatsDeltaState {
    /// Creates the state from the first snapshot.
    pub fn new(first: StatsSnapshot) -> Self {
        StatsDeltaState {
            last: first,
            delta_last: StatsDelta::default(),
            delta_total: StatsDelta::default(),
        }
    }

    /// Accounts for the next snapshot.
    pub fn update(&mut self, current: &StatsSnapshot) {
        self.delta_last = StatsDelta::between(&self.last, current);
        self.delta_total += self.delta_last;
        self.last = *current;
    }

    /// Returns the latest snapshot.
    pub fn last(&self) -> &StatsSnapshot {
        &self.last
    }

    /// Returns the change between the two latest snapshots.
    pub fn delta_last(&self) -> &StatsDelta {
        &self.delta_last
    }

    /// Returns the change since the first snapshot.
    pub fn delta_total(&self) -> &StatsDelta {
        &self.delta_total
    }
}

//------------ SourceSummary -------------------------------------------------

/// A snapshot of a sender’s state for reporting.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SourceSummary {
    /// The sender.
    pub source: SourceKey,

    /// The state of the sender.
    pub state: SourceState,

    /// The time between the first and the latest packet.
    pub duration: Duration,

    /// Per-second rates.
    ///
    /// These are only available if the duration is longer than zero.
    pub rates: Option<Rates>,
}

/// Per-second rates of a sender.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Rates {
    pub data_pkts: f64,
    pub records: f64,
    pub stats_pkts: f64,

    /// Rates of the cumulative statistics deltas.
    pub stats: Option<DeltaRates>,
}

/// Per-second rates of the statistics counters.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeltaRates {
    pub pkts_captured: f64,
    pub pkts_received: f64,
    pub pkts_dropped: f64,
    pub pkts_ifdropped: f64,
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{DecodeError, Message, Record, Version};
    use std::net::Ipv4Addr;

    const SOURCE: SourceKey =
        SourceKey::new(Ipv4Addr::new(192, 0, 2, 7), 4000);

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn data(seq: u32, secs: i64, sets: usize) -> Packet {
        let records = (0..sets)
            .map(|_| {
                Record::new(
                    Ipv4Addr::new(10, 0, 0, 1),
                    vec!["example.com".into()],
                    vec![Ipv4Addr::new(192, 0, 2, 1)],
                )
            })
            .collect();
        Packet::new(
            at(secs),
            SOURCE,
            Message::records(Version::V2, seq, records).unwrap(),
        )
    }

    fn stats(seq: u32, secs: i64, counters: [u32; 4]) -> Packet {
        Packet::new(
            at(secs),
            SOURCE,
            Message::stats(
                Version::V2,
                seq,
                StatsSnapshot {
                    pkts_captured: counters[0],
                    pkts_received: counters[1],
                    pkts_dropped: counters[2],
                    pkts_ifdropped: counters[3],
                    sample_rate: Some(1),
                },
            ),
        )
    }

    #[test]
    fn sequence_reconciliation() {
        let mut seq = SequenceState::default();
        for n in [1, 2, 3, 7, 6, 8] {
            seq.update(n);
        }
        assert_eq!(seq.total(), 6);
        assert_eq!(seq.lost(), 2);
        assert_eq!(seq.ooo(), 1);
        assert_eq!(seq.last(), Some(8));
    }

    #[test]
    fn sequence_repeat_is_noop() {
        let mut seq = SequenceState::default();
        seq.update(5);
        seq.update(5);
        assert_eq!(seq.total(), 2);
        assert_eq!(seq.lost(), 0);
        assert_eq!(seq.ooo(), 0);
        assert_eq!(seq.last(), Some(5));
    }

    #[test]
    fn sequence_no_overflow() {
        let mut seq = SequenceState::default();
        seq.update(0);
        seq.update(u32::MAX);
        assert_eq!(seq.lost(), i64::from(u32::MAX) - 1);
        assert_eq!(seq.last(), Some(u32::MAX));
        seq.update(u32::MAX);
        assert_eq!(seq.last(), Some(u32::MAX));
        assert_eq!(seq.ooo(), 0);
    }

    #[test]
    fn stats_delta() {
        let mut tracker = SourceTracker::new();
        tracker.update(&stats(1, 0, [100, 100, 0, 0]));
        let state = tracker.get(&SOURCE).unwrap().stats().unwrap();
        assert_eq!(state.delta_last(), &StatsDelta::default());
        assert_eq!(state.delta_total(), &StatsDelta::default());

        tracker.update(&stats(2, 10, [250, 240, 5, 0]));
        let state = tracker.get(&SOURCE).unwrap().stats().unwrap();
        assert_eq!(state.delta_last().pkts_captured, 150);
        assert_eq!(state.delta_total().pkts_captured, 150);
        assert_eq!(state.delta_last().pkts_received, 140);
        assert_eq!(state.delta_last().pkts_dropped, 5);
        assert_eq!(state.last().pkts_captured, 250);

        // A restarted sender produces negative deltas.
        tracker.update(&stats(3, 20, [50, 50, 0, 0]));
        let state = tracker.get(&SOURCE).unwrap().stats().unwrap();
        assert_eq!(state.delta_last().pkts_captured, -200);
        assert_eq!(state.delta_total().pkts_captured, -50);
    }

    #[test]
    fn counts_and_timestamps() {
        let mut tracker = SourceTracker::new();
        assert!(tracker.is_empty());
        assert_eq!(tracker.update(&data(1, 5, 3)), SOURCE);
        tracker.update(&stats(2, 7, [1, 1, 0, 0]));
        tracker.update(&data(3, 9, 2));
        assert_eq!(tracker.len(), 1);

        let state = tracker.get(&SOURCE).unwrap();
        assert_eq!(state.first_timestamp(), at(5));
        assert_eq!(state.last_timestamp(), at(9));
        assert_eq!(state.n_data_pkts(), 2);
        assert_eq!(state.n_stats_pkts(), 1);
        assert_eq!(state.n_records(), 5);
        assert_eq!(state.seq().total(), 3);
        assert_eq!(state.seq().last(), Some(3));
    }

    #[test]
    fn header_only_counts_claimed_records() {
        let wire = data(1, 0, 4).message().to_vec().unwrap();
        let packet = Packet::new(
            at(0),
            SOURCE,
            Message::parse(&wire, true).unwrap(),
        );
        assert!(packet.records().is_empty());
        let mut tracker = SourceTracker::new();
        tracker.update(&packet);
        assert_eq!(tracker.get(&SOURCE).unwrap().n_records(), 4);
    }

    #[test]
    fn rejected_packet_leaves_state_unchanged() {
        let mut tracker = SourceTracker::new();
        tracker.update(&data(1, 0, 1));
        let before = tracker.get(&SOURCE).cloned();
        // A data packet with a sets count of zero.
        assert_eq!(
            Message::parse(b"\x02\x00\x00\x00\x00\x00\x00\x02", false),
            Err(DecodeError::InvalidHeader {
                version: 2,
                sets_count: 0
            })
        );
        assert_eq!(tracker.get(&SOURCE).cloned(), before);
    }

    #[test]
    fn separate_sources() {
        let mut tracker = SourceTracker::new();
        tracker.update(&data(1, 0, 1));
        let other = SourceKey::new(Ipv4Addr::new(192, 0, 2, 8), 4000);
        let message = data(100, 0, 1).message().clone();
        tracker.update(&Packet::new(at(0), other, message));
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.get(&other).unwrap().seq().last(), Some(100));
        assert_eq!(tracker.get(&SOURCE).unwrap().seq().last(), Some(1));
        assert_eq!(tracker.iter().count(), 2);

        let summaries = tracker.summaries();
        assert_eq!(summaries[0].source, SOURCE);
        assert_eq!(summaries[1].source, other);
    }

    #[test]
    fn summary_rates() {
        let mut tracker = SourceTracker::new();
        tracker.update(&data(1, 0, 4));
        assert_eq!(tracker.summary(&SOURCE).unwrap().rates, None);

        tracker.update(&stats(2, 5, [0, 0, 0, 0]));
        tracker.update(&stats(3, 10, [100, 80, 20, 0]));
        tracker.update(&data(4, 10, 6));
        let summary = tracker.summary(&SOURCE).unwrap();
        assert_eq!(summary.duration, Duration::seconds(10));
        let rates = summary.rates.unwrap();
        assert_eq!(rates.data_pkts, 0.2);
        assert_eq!(rates.records, 1.0);
        assert_eq!(rates.stats_pkts, 0.2);
        let stats = rates.stats.unwrap();
        assert_eq!(stats.pkts_captured, 10.0);
        assert_eq!(stats.pkts_dropped, 2.0);
        assert!(tracker.summary(&SourceKey::UNSPECIFIED).is_none());
    }
}
