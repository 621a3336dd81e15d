//! The names of a flow record.
//!
//! Each flow record carries the names involved in a DNS resolution: the
//! queried name followed by the targets of any CNAME records encountered
//! on the way to the addresses. The names are kept in a buffer of their
//! own whose length is given in the record header. How the names are
//! encoded within that buffer depends on the protocol version:
//!
//! * Version 0 uses NUL-terminated strings.
//! * Versions 1 and 2 use uncompressed domain names in DNS wire format,
//!   i.e., a sequence of labels each prefixed by its length and terminated
//!   by the empty root label.
//!
//! In both cases the buffer is padded with NUL octets to a multiple of
//! four octets.
//!
//! The length octets of the labels are under the control of whoever sent
//! the packet. All access to the names buffer thus goes through a parser
//! confined to that buffer which checks the bounds before every slice.

use super::header::Version;
use super::wire::ComposeError;
use core::fmt;
use octseq::builder::OctetsBuilder;
use octseq::parse::Parser;
use std::string::String;
use std::vec::Vec;

/// The maximum length of a single label.
const MAX_LABEL_LEN: usize = 63;

//------------ parse_names ---------------------------------------------------

/// Decodes exactly `count` names from the names buffer of a record.
///
/// Name octets are converted into strings lossily: octets that aren’t
/// valid UTF-8 are replaced by U+FFFD.
pub fn parse_names(
    buf: &[u8],
    count: u8,
    version: Version,
) -> Result<Vec<String>, NameListError> {
    if version.has_label_names() {
        parse_label_names(buf, count)
    } else {
        parse_nul_names(buf, count)
    }
}

/// Decodes names in the NUL-terminated format of version 0.
///
/// The buffer is split at every NUL octet and the first `count` pieces
/// are taken, including empty pieces produced by the padding.
fn parse_nul_names(
    buf: &[u8],
    count: u8,
) -> Result<Vec<String>, NameListError> {
    let count = usize::from(count);
    let mut res = Vec::with_capacity(count);
    let mut offset = 0;
    for piece in buf.split(|&ch| ch == 0).take(count) {
        res.push(String::from_utf8_lossy(piece).into_owned());
        offset += piece.len() + 1;
    }
    if res.len() < count {
        return Err(NameListError {
            name: res.len(),
            offset: buf.len().min(offset),
        });
    }
    Ok(res)
}

/// Decodes names in the label format of versions 1 and 2.
fn parse_label_names(
    buf: &[u8],
    count: u8,
) -> Result<Vec<String>, NameListError> {
    let mut parser = Parser::from_ref(buf);
    let mut res = Vec::with_capacity(usize::from(count));
    for name in 0..usize::from(count) {
        res.push(parse_label_name(&mut parser).map_err(|offset| {
            NameListError { name, offset }
        })?);
    }
    Ok(res)
}

/// Takes a single name in label format from the parser.
///
/// On failure, returns the offset in the names buffer where the data ran
/// out.
fn parse_label_name(parser: &mut Parser<[u8]>) -> Result<String, usize> {
    let mut res = String::new();
    loop {
        let len = parser.parse_u8().map_err(|_| parser.pos())?;
        if len == 0 {
            return Ok(res);
        }
        let len = usize::from(len);
        let label = parser.peek(len).map_err(|_| parser.pos())?;
        if !res.is_empty() {
            res.push('.');
        }
        res.push_str(&String::from_utf8_lossy(label));
        parser.advance(len).map_err(|_| parser.pos())?;
    }
}

//------------ compose_names -------------------------------------------------

/// Appends the names in the encoding of `version` to the target.
///
/// No padding is added. For label encoding, a single trailing dot of a
/// name is ignored and the empty name is encoded as the root name.
pub fn compose_names<Target, Name>(
    names: &[Name],
    version: Version,
    target: &mut Target,
) -> Result<(), ComposeError>
where
    Target: OctetsBuilder + ?Sized,
    Name: AsRef<str>,
{
    for name in names {
        let name = name.as_ref();
        if version.has_label_names() {
            compose_label_name(name, target)?;
        } else {
            if name.as_bytes().contains(&0) {
                return Err(ComposeError::InvalidName);
            }
            target.append_slice(name.as_bytes())?;
            target.append_slice(b"\0")?;
        }
    }
    Ok(())
}

fn compose_label_name<Target: OctetsBuilder + ?Sized>(
    name: &str,
    target: &mut Target,
) -> Result<(), ComposeError> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if !name.is_empty() {
        for label in name.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(ComposeError::InvalidName);
            }
            // The check above guarantees that the length fits.
            target.append_slice(&[label.len() as u8])?;
            target.append_slice(label.as_bytes())?;
        }
    }
    target.append_slice(b"\0")?;
    Ok(())
}

//============ Error Types ===================================================

//------------ NameListError -------------------------------------------------

/// The names buffer of a record ended before all names were decoded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NameListError {
    /// The zero-based index of the name that couldn’t be decoded.
    pub name: usize,

    /// The offset within the names buffer where the data ran out.
    pub offset: usize,
}

impl fmt::Display for NameListError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "names buffer ends in name {} at offset {}",
            self.name, self.offset
        )
    }
}

impl std::error::Error for NameListError {}

//============ Testing =======================================================
