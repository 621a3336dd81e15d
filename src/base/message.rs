//! Complete dnsflow messages.
//!
//! A message is the payload of a single UDP datagram sent by a dnsflow
//! sender. It consists of the fixed [`Header`] followed either by a
//! [`StatsSnapshot`] if the header has the STATS flag set or by as many
//! [`Record`]s as the header’s sets count states.
//!
//! The two kinds of body are mutually exclusive and represented by the
//! [`Body`] enum.

use super::header::{Flags, Header, Version};
use super::record::Record;
use super::stats::StatsSnapshot;
use super::wire::{ComposeError, Composer, DecodeError};
use octseq::parse::Parser;
use std::vec::Vec;

//------------ Body ----------------------------------------------------------

/// The content of a message following the header.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Body {
    /// A statistics snapshot of the sender.
    Stats(StatsSnapshot),

    /// A batch of flow records.
    ///
    /// If the message was parsed in header-only mode, the vec is empty
    /// regardless of the sets count in the header.
    Records(Vec<Record>),
}

impl Body {
    /// Returns the statistics snapshot if this is a statistics body.
    pub fn stats(&self) -> Option<&StatsSnapshot> {
        match *self {
            Body::Stats(ref stats) => Some(stats),
            Body::Records(_) => None,
        }
    }

    /// Returns the records if this is a records body.
    pub fn records(&self) -> Option<&[Record]> {
        match *self {
            Body::Stats(_) => None,
            Body::Records(ref records) => Some(records),
        }
    }
}

//------------ Message -------------------------------------------------------

/// A dnsflow message.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Message {
    header: Header,
    body: Body,
}

/// # Creation
///
impl Message {
    /// The maximum number of records in a message.
    pub const MAX_SETS: usize = 255;

    /// The size senders aim to keep their messages under.
    ///
    /// A sender sends off its batch of records once adding another record
    /// would exceed this size.
    pub const TARGET_LEN: usize = 1200;

    /// Creates a statistics message.
    pub fn stats(
        version: Version,
        sequence_number: u32,
        stats: StatsSnapshot,
    ) -> Self {
        // Senders put a sets count of one into statistics messages.
        Message {
            header: Header::new(version, 1, Flags::STATS, sequence_number),
            body: Body::Stats(stats),
        }
    }

    /// Creates a message carrying flow records.
    ///
    /// Fails if there are no records or more than [`Self::MAX_SETS`].
    pub fn records(
        version: Version,
        sequence_number: u32,
        records: Vec<Record>,
    ) -> Result<Self, ComposeError> {
        if records.is_empty() || records.len() > Self::MAX_SETS {
            return Err(ComposeError::LongData);
        }
        let sets_count =
            u8::try_from(records.len()).map_err(|_| ComposeError::LongData)?;
        Ok(Message {
            header: Header::new(
                version,
                sets_count,
                Flags::default(),
                sequence_number,
            ),
            body: Body::Records(records),
        })
    }

    /// Decodes a message from the payload of a datagram.
    ///
    /// If `header_only` is `true`, the records of a data message are not
    /// decoded and the message will have an empty record body. Statistics
    /// messages are always decoded completely. Octets following the last
    /// record are ignored.
    pub fn parse(
        payload: &[u8],
        header_only: bool,
    ) -> Result<Self, DecodeError> {
        let mut parser = Parser::from_ref(payload);
        let header = Header::parse(&mut parser)?;
        let body = if header.is_stats() {
            Body::Stats(StatsSnapshot::parse(&mut parser, header.version())?)
        } else if header_only {
            Body::Records(Vec::new())
        } else {
            let count = usize::from(header.sets_count());
            let mut records = Vec::with_capacity(count);
            for index in 0..count {
                records.push(Record::parse(
                    &mut parser,
                    header.version(),
                    index,
                )?);
            }
            Body::Records(records)
        };
        Ok(Message { header, body })
    }

    /// Appends the message in wire format to the target.
    ///
    /// The header is written as is, the body in the encoding of the
    /// header’s version.
    pub fn compose<Target: Composer + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), ComposeError> {
        self.header.compose(target)?;
        match self.body {
            Body::Stats(ref stats) => {
                stats.compose(self.header.version(), target)?
            }
            Body::Records(ref records) => {
                for record in records {
                    record.compose(self.header.version(), target)?;
                }
            }
        }
        Ok(())
    }

    /// Returns the message in wire format as a new vec.
    pub fn to_vec(&self) -> Result<Vec<u8>, ComposeError> {
        let mut res = Vec::new();
        self.compose(&mut res)?;
        Ok(res)
    }
}

/// # Access
///
impl Message {
    /// Returns the header of the message.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the body of the message.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Converts the message into its header and body.
    pub fn into_parts(self) -> (Header, Body) {
        (self.header, self.body)
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;
    use std::net::Ipv4Addr;

    fn records() -> Vec<Record> {
        vec![
            Record::new(
                Ipv4Addr::new(10, 1, 2, 3),
                vec!["www.example.com".into()],
                vec![Ipv4Addr::new(192, 0, 2, 10)],
            ),
            Record::new(
                Ipv4Addr::new(10, 1, 2, 4),
                vec!["a.example.org".into(), "b.example.net".into()],
                vec![Ipv4Addr::new(198, 51, 100, 1); 3],
            ),
        ]
    }

    #[rstest]
    #[case(Version::V0)]
    #[case(Version::V1)]
    #[case(Version::V2)]
    fn records_round_trip(#[case] version: Version) {
        let msg = Message::records(version, 77, records()).unwrap();
        let parsed = Message::parse(&msg.to_vec().unwrap(), false).unwrap();
        assert_eq!(parsed.header().version(), version);
        assert_eq!(parsed.header().sets_count(), 2);
        assert_eq!(parsed.header().sequence_number(), 77);
        assert!(!parsed.header().is_stats());
        assert_eq!(parsed, msg);
    }

    #[rstest]
    #[case(Version::V0, None)]
    #[case(Version::V1, None)]
    #[case(Version::V2, Some(64))]
    fn stats_round_trip(
        #[case] version: Version,
        #[case] sample_rate: Option<u32>,
    ) {
        let stats = StatsSnapshot {
            pkts_captured: 1000,
            pkts_received: 990,
            pkts_dropped: 10,
            pkts_ifdropped: 2,
            sample_rate,
        };
        let msg = Message::stats(version, 0xffff_fffe, stats);
        let wire = msg.to_vec().unwrap();
        assert_eq!(
            wire.len(),
            Header::LEN + StatsSnapshot::wire_len(version)
        );
        let parsed = Message::parse(&wire, false).unwrap();
        assert!(parsed.header().is_stats());
        assert_eq!(parsed.body().stats(), Some(&stats));
        assert_eq!(parsed, msg);
    }

    #[test]
    fn header_only() {
        let msg = Message::records(Version::V2, 1, records()).unwrap();
        let mut wire = msg.to_vec().unwrap();
        // Mangle the records. Header-only parsing must not care.
        wire.truncate(Header::LEN + 3);
        let parsed = Message::parse(&wire, true).unwrap();
        assert_eq!(parsed.header().sets_count(), 2);
        assert_eq!(parsed.body().records(), Some(&[][..]));
        assert!(Message::parse(&wire, false).is_err());
    }

    #[test]
    fn header_only_stats() {
        let msg = Message::stats(Version::V1, 1, StatsSnapshot::default());
        let parsed = Message::parse(&msg.to_vec().unwrap(), true).unwrap();
        assert!(parsed.body().stats().is_some());
    }

    #[test]
    fn empty_sets_rejected() {
        assert_eq!(
            Message::parse(b"\x02\x00\x00\x00\x00\x00\x00\x05", false),
            Err(DecodeError::InvalidHeader {
                version: 2,
                sets_count: 0
            })
        );
        assert!(Message::records(Version::V2, 1, Vec::new()).is_err());
    }

    #[test]
    fn too_many_sets() {
        let record = Record::new(Ipv4Addr::UNSPECIFIED, vec![], vec![]);
        let msg = Message::records(Version::V2, 1, vec![record.clone(); 255])
            .unwrap();
        assert_eq!(msg.header().sets_count(), 255);
        assert_eq!(
            Message::records(
                Version::V2,
                1,
                vec![record; Message::MAX_SETS + 1]
            ),
            Err(ComposeError::LongData)
        );
    }

    #[test]
    fn short_stats() {
        assert_eq!(
            Message::parse(
                b"\x01\x01\x00\x01\x00\x00\x00\x05\0\0\0\x01",
                false
            ),
            Err(DecodeError::TruncatedStats {
                offset: 12,
                field: "pkts_received"
            })
        );
    }

    #[test]
    fn record_failure_aborts_packet() {
        let msg = Message::records(Version::V1, 1, records()).unwrap();
        let mut wire = msg.to_vec().unwrap();
        wire.truncate(wire.len() - 2);
        match Message::parse(&wire, false) {
            Err(DecodeError::RecordTruncated { record, field, .. }) => {
                assert_eq!(record, 1);
                assert_eq!(field, "ips");
            }
            res => panic!("unexpected result {:?}", res),
        }
    }

    #[test]
    fn trailing_data_ignored() {
        let msg = Message::records(Version::V2, 9, records()).unwrap();
        let mut wire = msg.to_vec().unwrap();
        wire.extend_from_slice(b"junk");
        assert_eq!(Message::parse(&wire, false).unwrap(), msg);
    }
}
