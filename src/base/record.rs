//! Flow records.
//!
//! A flow record describes one DNS resolution observed by the sender: the
//! client that asked, the names involved, and the IPv4 addresses the
//! resolution ended up with. On the wire, each record starts with an eight
//! octet header followed by the names buffer and then the addresses:
//!
//! ```text
//!   0        1        2        3
//! +--------+--------+--------+--------+
//! |             client ip             |
//! +--------+--------+--------+--------+
//! | names  |  ips   |    names len    |
//! +--------+--------+--------+--------+
//! /               names               /
//! +--------+--------+--------+--------+
//! /                ips                /
//! +--------+--------+--------+--------+
//! ```

use super::header::Version;
use super::name::{compose_names, parse_names};
use super::wire::{
    compose_len_prefixed, compose_word_padding, Compose, ComposeError,
    Composer, DecodeError,
};
use core::fmt;
use octseq::parse::Parser;
use std::net::Ipv4Addr;
use std::string::String;
use std::vec::Vec;

//------------ Record --------------------------------------------------------

/// A single flow record.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Record {
    client_ip: Ipv4Addr,
    names: Vec<String>,
    ips: Vec<Ipv4Addr>,
}

/// # Creation and Conversion
///
impl Record {
    /// The length of the record header.
    pub const HEADER_LEN: usize = 8;

    /// The maximum number of names in a record.
    pub const MAX_NAMES: usize = 255;

    /// The maximum number of addresses in a record.
    pub const MAX_IPS: usize = 255;

    /// Creates a new record from its components.
    pub fn new(
        client_ip: Ipv4Addr,
        names: Vec<String>,
        ips: Vec<Ipv4Addr>,
    ) -> Self {
        Record {
            client_ip,
            names,
            ips,
        }
    }

    /// Takes a record from the parser.
    ///
    /// The `version` determines the encoding of the names, `index` is the
    /// position of the record within its packet and is only used for
    /// error reporting.
    pub fn parse(
        parser: &mut Parser<[u8]>,
        version: Version,
        index: usize,
    ) -> Result<Self, DecodeError> {
        let short = |offset, field| DecodeError::RecordTruncated {
            record: index,
            offset,
            field,
        };

        let pos = parser.pos();
        let client_ip = Ipv4Addr::from(
            parser.parse_u32_be().map_err(|_| short(pos, "client_ip"))?,
        );
        let pos = parser.pos();
        let names_count =
            parser.parse_u8().map_err(|_| short(pos, "names_count"))?;
        let pos = parser.pos();
        let ips_count =
            parser.parse_u8().map_err(|_| short(pos, "ips_count"))?;
        let pos = parser.pos();
        let names_len = usize::from(
            parser.parse_u16_be().map_err(|_| short(pos, "names_len"))?,
        );

        let names_start = parser.pos();
        let names = {
            let buf = parser
                .peek(names_len)
                .map_err(|_| short(names_start, "names"))?;
            parse_names(buf, names_count, version).map_err(|err| {
                DecodeError::NameDecodeTruncated {
                    record: index,
                    name: err.name,
                    offset: names_start + err.offset,
                }
            })?
        };
        parser
            .advance(names_len)
            .map_err(|_| short(names_start, "names"))?;

        let mut ips = Vec::with_capacity(usize::from(ips_count));
        for _ in 0..ips_count {
            let pos = parser.pos();
            ips.push(Ipv4Addr::from(
                parser.parse_u32_be().map_err(|_| short(pos, "ips"))?,
            ));
        }

        Ok(Record::new(client_ip, names, ips))
    }

    /// Appends the record in the wire format of `version` to the target.
    ///
    /// The names buffer is padded to a multiple of four octets. Fails with
    /// [`ComposeError::LongData`] if there are more than 255 names or
    /// addresses or if the names don’t fit into 65535 octets.
    pub fn compose<Target: Composer + ?Sized>(
        &self,
        version: Version,
        target: &mut Target,
    ) -> Result<(), ComposeError> {
        let names_count = u8::try_from(self.names.len())
            .map_err(|_| ComposeError::LongData)?;
        let ips_count = u8::try_from(self.ips.len())
            .map_err(|_| ComposeError::LongData)?;
        self.client_ip.compose(target)?;
        names_count.compose(target)?;
        ips_count.compose(target)?;
        compose_len_prefixed(target, |target| {
            let start = target.as_ref().len();
            compose_names(&self.names, version, target)?;
            compose_word_padding(target, start)
        })?;
        for ip in &self.ips {
            ip.compose(target)?;
        }
        Ok(())
    }
}

/// # Field Access
///
impl Record {
    /// Returns the address of the client that sent the query.
    pub fn client_ip(&self) -> Ipv4Addr {
        self.client_ip
    }

    /// Returns the names of the record.
    ///
    /// The first name is the name that was queried for, any further names
    /// are the targets of CNAME records in the answer.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the addresses the resolution ended with.
    pub fn ips(&self) -> &[Ipv4Addr] {
        &self.ips
    }
}

//--- Display

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.client_ip, self.names.join(","))?;
        let mut ips = self.ips.iter();
        if let Some(ip) = ips.next() {
            write!(f, " {}", ip)?;
            for ip in ips {
                write!(f, ",{}", ip)?;
            }
        }
        Ok(())
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn record() -> Record {
        Record::new(
            Ipv4Addr::new(10, 0, 0, 1),
            vec!["www.example.com".into(), "cdn.example.net".into()],
            vec![Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)],
        )
    }

    #[test]
    fn parse_v2() {
        let data = b"\x0a\x00\x00\x01\x01\x02\x00\x0c\
                     \x03foo\x03com\0\0\0\0\
                     \xc0\x00\x02\x01\xc0\x00\x02\x02";
        let mut parser = Parser::from_ref(data.as_ref());
        let record = Record::parse(&mut parser, Version::V2, 0).unwrap();
        assert_eq!(record.client_ip(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(record.names(), ["foo.com"]);
        assert_eq!(
            record.ips(),
            [Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)]
        );
        assert_eq!(parser.remaining(), 0);
    }

    #[test]
    fn parse_v0() {
        let data = b"\x0a\x00\x00\x01\x02\x01\x00\x08\
                     foo\0bar\0\
                     \xc0\x00\x02\x01";
        let mut parser = Parser::from_ref(data.as_ref());
        let record = Record::parse(&mut parser, Version::V0, 0).unwrap();
        assert_eq!(record.names(), ["foo", "bar"]);
        assert_eq!(record.ips().len(), 1);
    }

    #[test]
    fn short_header() {
        let data = b"\x0a\x00\x00\x01\x01\x02\x00";
        assert_eq!(
            Record::parse(
                &mut Parser::from_ref(data.as_ref()),
                Version::V1,
                3
            ),
            Err(DecodeError::RecordTruncated {
                record: 3,
                offset: 6,
                field: "names_len"
            })
        );
    }

    #[test]
    fn short_names() {
        let data = b"\x0a\x00\x00\x01\x01\x00\x00\x10\x03foo\0";
        assert_eq!(
            Record::parse(
                &mut Parser::from_ref(data.as_ref()),
                Version::V1,
                0
            ),
            Err(DecodeError::RecordTruncated {
                record: 0,
                offset: 8,
                field: "names"
            })
        );
    }

    #[test]
    fn short_ips() {
        let data = b"\x0a\x00\x00\x01\x01\x02\x00\x04\
                     \x01a\0\0\xc0\x00\x02\x01";
        assert_eq!(
            Record::parse(
                &mut Parser::from_ref(data.as_ref()),
                Version::V2,
                1
            ),
            Err(DecodeError::RecordTruncated {
                record: 1,
                offset: 16,
                field: "ips"
            })
        );
    }

    #[test]
    fn bad_names() {
        // The label length in the names buffer points beyond it and into
        // the addresses.
        let data = b"\x0a\x00\x00\x01\x01\x01\x00\x04\
                     \x01a\x05b\xc0\x00\x02\x01";
        assert_eq!(
            Record::parse(
                &mut Parser::from_ref(data.as_ref()),
                Version::V1,
                2
            ),
            Err(DecodeError::NameDecodeTruncated {
                record: 2,
                name: 0,
                offset: 11
            })
        );
    }

    #[test]
    fn compose() {
        let mut buf = Vec::new();
        record().compose(Version::V2, &mut buf).unwrap();
        assert_eq!(&buf[..8], b"\x0a\x00\x00\x01\x02\x02\x00\x24");
        assert_eq!(buf.len(), 8 + 0x24 + 8);
        let mut parser = Parser::from_ref(buf.as_slice());
        assert_eq!(
            Record::parse(&mut parser, Version::V2, 0).unwrap(),
            record()
        );
    }

    #[test]
    fn compose_padding_v0() {
        let mut buf = Vec::new();
        record().compose(Version::V0, &mut buf).unwrap();
        // "www.example.com\0cdn.example.net\0" is 32 octets already.
        assert_eq!(&buf[6..8], b"\x00\x20");

        let record =
            Record::new(Ipv4Addr::UNSPECIFIED, vec!["ab".into()], vec![]);
        buf.clear();
        record.compose(Version::V0, &mut buf).unwrap();
        assert_eq!(buf, b"\0\0\0\0\x01\x00\x00\x04ab\0\0");
    }

    #[test]
    fn compose_too_many() {
        let record = Record::new(
            Ipv4Addr::UNSPECIFIED,
            vec![],
            vec![Ipv4Addr::UNSPECIFIED; Record::MAX_IPS + 1],
        );
        assert_eq!(
            record.compose(Version::V2, &mut Vec::new()),
            Err(ComposeError::LongData)
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            format!("{}", record()),
            "10.0.0.1 www.example.com,cdn.example.net 192.0.2.1,192.0.2.2"
        );
    }
}
