//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::time::Duration as StdDuration;

use dnsflow::base::{Message, Record, StatsSnapshot, Version};
use dnsflow::frame::{Frame, LinkType};
use etherparse::PacketBuilder;
use time::{Duration, OffsetDateTime};
use tracing_subscriber::EnvFilter;

/// Sets up logging for a test.
///
/// The log level is taken from the `RUST_LOG` environment variable.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .without_time()
        .try_init()
        .ok();
}

/// The collector all test frames are addressed to.
pub const COLLECTOR: [u8; 4] = [192, 0, 2, 1];

/// Returns the capture time `millis` milliseconds after the epoch.
pub fn at(millis: i64) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + Duration::milliseconds(millis)
}

/// Returns an Ethernet frame carrying `payload` from the given sender.
pub fn ethernet_frame(
    timestamp: OffsetDateTime,
    sender: [u8; 4],
    port: u16,
    payload: &[u8],
) -> Frame {
    let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2; 6])
        .ipv4(sender, COLLECTOR, 64)
        .udp(port, dnsflow::stream::DEFAULT_PORT);
    let mut data = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut data, payload).unwrap();
    Frame::new(timestamp, LinkType::Ethernet, data)
}

/// Returns a loopback frame with an unspecified family around `payload`.
pub fn raw_frame(timestamp: OffsetDateTime, payload: &[u8]) -> Frame {
    let mut data = vec![0; 4];
    data.extend_from_slice(payload);
    Frame::new(timestamp, LinkType::Loopback, data)
}

/// Returns a record for the client with the given last octet.
pub fn record(client: u8, name: &str) -> Record {
    Record::new(
        Ipv4Addr::new(10, 0, 0, client),
        vec![name.into(), format!("cdn.{}", name)],
        vec![Ipv4Addr::new(198, 51, 100, client)],
    )
}

/// Returns the wire format of a data message.
pub fn data_payload(
    version: Version,
    seq: u32,
    records: Vec<Record>,
) -> Vec<u8> {
    Message::records(version, seq, records)
        .unwrap()
        .to_vec()
        .unwrap()
}

/// Returns the wire format of a statistics message.
pub fn stats_payload(
    version: Version,
    seq: u32,
    counters: [u32; 4],
) -> Vec<u8> {
    Message::stats(
        version,
        seq,
        StatsSnapshot {
            pkts_captured: counters[0],
            pkts_received: counters[1],
            pkts_dropped: counters[2],
            pkts_ifdropped: counters[3],
            sample_rate: version.has_sample_rate().then_some(1),
        },
    )
    .to_vec()
    .unwrap()
}

/// How long a simulated live source waits before reporting a timeout.
pub const POLL: StdDuration = StdDuration::from_millis(5);
