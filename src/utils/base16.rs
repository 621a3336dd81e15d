//! Encoding of Base 16 a.k.a. hex digits.
//!
//! The Base 16 encoding is defined in [RFC 4648]. It is used here for
//! showing the raw octets of frames and packets in diagnostics.
//!
//! [RFC 4648]: https://tools.ietf.org/html/rfc4648

use core::fmt;

//------------ Convenience Functions -----------------------------------------

/// Encodes binary data in Base 16 and writes it into a format stream.
///
/// This function is intended to be used in implementations of formatting
/// traits:
///
/// ```
/// use core::fmt;
/// use dnsflow::utils::base16;
///
/// struct Foo<'a>(&'a [u8]);
///
/// impl<'a> fmt::Display for Foo<'a> {
///     fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
///         base16::display(&self.0, f)
///     }
/// }
/// ```
pub fn display<Octets, Target>(octets: &Octets, f: &mut Target) -> fmt::Result
where
    Octets: AsRef<[u8]> + ?Sized,
    Target: fmt::Write,
{
    for &octet in octets.as_ref() {
        f.write_str(ENCODE_ALPHABET[usize::from(octet)])?;
    }
    Ok(())
}

/// Returns a placeholder that displays at most `max` leading octets.
///
/// If the data is longer, the encoded octets are followed by `...`.
pub fn encode_excerpt<Octets: AsRef<[u8]> + ?Sized>(
    octets: &Octets,
    max: usize,
) -> impl fmt::Display + '_ {
    struct Excerpt<'a>(&'a [u8], bool);

    impl<'a> fmt::Display for Excerpt<'a> {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            display(self.0, f)?;
            if self.1 {
                f.write_str("...")?;
            }
            Ok(())
        }
    }

    let octets = octets.as_ref();
    match octets.get(..max) {
        Some(head) if head.len() < octets.len() => Excerpt(head, true),
        _ => Excerpt(octets, false),
    }
}

//------------ Constants -----------------------------------------------------

/// The alphabet used for encoding.
///
/// We need to encode to lowercase letters to keep the output readable in
/// log lines.
const ENCODE_ALPHABET: [&str; 256] = [
    "00", "01", "02", "03", "04", "05", "06", "07", // 0x00 .. 0x07
    "08", "09", "0a", "0b", "0c", "0d", "0e", "0f", // 0x08 .. 0x0f
    "10", "11", "12", "13", "14", "15", "16", "17", // 0x10 .. 0x17
    "18", "19", "1a", "1b", "1c", "1d", "1e", "1f", // 0x18 .. 0x1f
    "20", "21", "22", "23", "24", "25", "26", "27", // 0x20 .. 0x27
    "28", "29", "2a", "2b", "2c", "2d", "2e", "2f", // 0x28 .. 0x2f
    "30", "31", "32", "33", "34", "35", "36", "37", // 0x30 .. 0x37
    "38", "39", "3a", "3b", "3c", "3d", "3e", "3f", // 0x38 .. 0x3f
    "40", "41", "42", "43", "44", "45", "46", "47", // 0x40 .. 0x47
    "48", "49", "4a", "4b", "4c", "4d", "4e", "4f", // 0x48 .. 0x4f
    "50", "51", "52", "53", "54", "55", "56", "57", // 0x50 .. 0x57
    "58", "59", "5a", "5b", "5c", "5d", "5e", "5f", // 0x58 .. 0x5f
    "60", "61", "62", "63", "64", "65", "66", "67", // 0x60 .. 0x67
    "68", "69", "6a", "6b", "6c", "6d", "6e", "6f", // 0x68 .. 0x6f
    "70", "71", "72", "73", "74", "75", "76", "77", // 0x70 .. 0x77
    "78", "79", "7a", "7b", "7c", "7d", "7e", "7f", // 0x78 .. 0x7f
    "80", "81", "82", "83", "84", "85", "86", "87", // 0x80 .. 0x87
    "88", "89", "8a", "8b", "8c", "8d", "8e", "8f", // 0x88 .. 0x8f
    "90", "91", "92", "93", "94", "95", "96", "97", // 0x90 .. 0x97
    "98", "99", "9a", "9b", "9c", "9d", "9e", "9f", // 0x98 .. 0x9f
    "a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", // 0xa0 .. 0xa7
    "a8", "a9", "aa", "ab", "ac", "ad", "ae", "af", // 0xa8 .. 0xaf
    "b0", "b1", "b2", "b3", "b4", "b5", "b6", "b7", // 0xb0 .. 0xb7
    "b8", "b9", "ba", "bb", "bc", "bd", "be", "bf", // 0xb8 .. 0xbf
    "c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7", // 0xc0 .. 0xc7
    "c8", "c9", "ca", "cb", "cc", "cd", "ce", "cf", // 0xc8 .. 0xcf
    "d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7", // 0xd0 .. 0xd7
    "d8", "d9", "da", "db", "dc", "dd", "de", "df", // 0xd8 .. 0xdf
    "e0", "e1", "e2", "e3", "e4", "e5", "e6", "e7", // 0xe0 .. 0xe7
    "e8", "e9", "ea", "eb", "ec", "ed", "ee", "ef", // 0xe8 .. 0xef
    "f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7", // 0xf0 .. 0xf7
    "f8", "f9", "fa", "fb", "fc", "fd", "fe", "ff", // 0xf8 .. 0xff
];

//============ Test ==========================================================
