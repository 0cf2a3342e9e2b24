//! Field descriptors
//!
//! A [`LayerSpec`] is the static shape of one layer as it sits in a byte buffer: the layer name
//! followed by its fields in wire order. Each [`FieldSpec`] gives a width in bytes and a
//! [`FieldFormat`], which knows how to turn the bytes of that field back into something a person
//! can read. Nothing here looks at a [`Layer`][`crate::Layer`] struct, so the visualizer can be fed
//! literal byte arrays.

use std::borrow::Cow;

use serde::Serialize;

use crate::types::hex::{upper_prefixed, upper_spaced};
use crate::types::{IPv4Address, MACAddress};

/// A decoder for a field whose meaning doesn't fit the generic formats.
pub type FieldDecodeFn = fn(&[u8]) -> String;

/// Bytes shown before a long [`FieldFormat::Bytes`] value gets cut short.
const MAX_SHOWN_BYTES: usize = 16;

/// Characters shown before a long [`FieldFormat::Text`] value gets cut short.
const MAX_SHOWN_TEXT: usize = 96;

#[derive(Debug, Clone, Copy)]
pub enum FieldFormat {
    /// Big-endian integer in decimal.
    Dec,
    /// Big-endian integer in decimal with its Hex form alongside.
    DecHex,
    /// Big-endian integer in Hex only.
    Hex,
    /// Decimal with a name from the table when there is one.
    DecNamed(&'static [(u64, &'static str)]),
    /// Hex with a name from the table when there is one.
    HexNamed(&'static [(u64, &'static str)]),
    Ipv4,
    Mac,
    /// The TCP flags octet, shown as `0x12 (SYN+ACK)`.
    TcpFlags,
    /// Printable text, control characters escaped.
    Text,
    /// Opaque bytes.
    Bytes,
    Custom(FieldDecodeFn),
}

impl FieldFormat {
    /// Render the bytes of one field.
    pub fn render(&self, bytes: &[u8]) -> String {
        if bytes.is_empty() {
            return "(empty)".to_string();
        }

        let numeric = bytes.len() <= 8;
        match *self {
            FieldFormat::Dec if numeric => format!("{}", be_uint(bytes)),
            FieldFormat::DecHex if numeric => {
                let v = be_uint(bytes);
                format!("{} ({})", v, upper_prefixed(v, bytes.len()))
            }
            FieldFormat::Hex if numeric => upper_prefixed(be_uint(bytes), bytes.len()),
            FieldFormat::DecNamed(table) if numeric => {
                let v = be_uint(bytes);
                match lookup(table, v) {
                    Some(name) => format!("{} ({})", v, name),
                    None => format!("{}", v),
                }
            }
            FieldFormat::HexNamed(table) if numeric => {
                let v = be_uint(bytes);
                match lookup(table, v) {
                    Some(name) => format!("{} ({})", upper_prefixed(v, bytes.len()), name),
                    None => upper_prefixed(v, bytes.len()),
                }
            }
            FieldFormat::Ipv4 if bytes.len() == 4 => {
                format!("{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
            }
            FieldFormat::Mac if bytes.len() == 6 => bytes
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":"),
            FieldFormat::TcpFlags if numeric => {
                let v = be_uint(bytes);
                format!("{} ({})", upper_prefixed(v, bytes.len()), tcp_flags_mnemonic(v as u16))
            }
            FieldFormat::Text => escape_text(bytes),
            FieldFormat::Custom(f) => f(bytes),
            _ => render_bytes(bytes),
        }
    }
}

fn lookup(table: &[(u64, &'static str)], value: u64) -> Option<&'static str> {
    table.iter().find(|(v, _)| *v == value).map(|(_, name)| *name)
}

/// Big-endian unsigned integer from up to 8 bytes.
pub fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0_u64, |acc, b| (acc << 8) | *b as u64)
}

fn render_bytes(bytes: &[u8]) -> String {
    if bytes.len() <= MAX_SHOWN_BYTES {
        upper_spaced(bytes)
    } else {
        format!(
            "{} ... ({} bytes)",
            upper_spaced(&bytes[..MAX_SHOWN_BYTES]),
            bytes.len()
        )
    }
}

/// Escape bytes the way a string literal would show them: `GET /\r\n` -> `"GET /\r\n"`.
pub fn escape_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    let mut shown = 0;
    out.push('"');
    for b in bytes {
        if shown >= MAX_SHOWN_TEXT {
            out.push_str("...");
            break;
        }
        match *b {
            b'\r' => out.push_str("\\r"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7e => out.push(*b as char),
            other => out.push_str(&format!("\\x{:02x}", other)),
        }
        shown += 1;
    }
    out.push('"');
    if bytes.len() > MAX_SHOWN_TEXT {
        out.push_str(&format!(" ({} bytes)", bytes.len()));
    }
    out
}

/// TCP flag bit names, in the order they are printed.
const TCP_FLAG_NAMES: [(u16, &str); 8] = [
    (0x02, "SYN"),
    (0x01, "FIN"),
    (0x04, "RST"),
    (0x08, "PSH"),
    (0x10, "ACK"),
    (0x20, "URG"),
    (0x40, "ECE"),
    (0x80, "CWR"),
];

/// `0x02` -> `SYN`, `0x12` -> `SYN+ACK`, `0x18` -> `PSH+ACK`.
pub fn tcp_flags_mnemonic(flags: u16) -> String {
    let names: Vec<&str> = TCP_FLAG_NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join("+")
    }
}

/// One field: name, width on the wire and how to read it.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: Cow<'static, str>,
    pub len: usize,
    pub format: FieldFormat,
}

impl FieldSpec {
    pub fn new(name: impl Into<Cow<'static, str>>, len: usize, format: FieldFormat) -> Self {
        Self {
            name: name.into(),
            len,
            format,
        }
    }
}

/// The ordered field layout of one layer.
#[derive(Debug, Clone)]
pub struct LayerSpec {
    pub name: Cow<'static, str>,
    pub fields: Vec<FieldSpec>,
}

impl LayerSpec {
    pub fn new(name: impl Into<Cow<'static, str>>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Trailing payload bytes that no layer claims.
    pub fn raw(len: usize) -> Self {
        Self::new("Raw", vec![FieldSpec::new("load", len, FieldFormat::Text)])
    }

    /// Sum of the field widths.
    pub fn declared_len(&self) -> usize {
        self.fields.iter().map(|f| f.len).sum()
    }
}

/// A decoded field value.
///
/// Integers up to 8 bytes decode to [`FieldValue::Uint`]; addresses keep their type; anything
/// else stays as bytes. [`FieldValue::to_bytes`] gives back exactly what was decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Uint(u64),
    IPv4(IPv4Address),
    MAC(MACAddress),
    Bytes(#[serde(serialize_with = "hex::serde::serialize")] Vec<u8>),
}

impl FieldValue {
    pub fn decode(format: &FieldFormat, bytes: &[u8]) -> Self {
        match format {
            FieldFormat::Ipv4 if bytes.len() == 4 => {
                FieldValue::IPv4([bytes[0], bytes[1], bytes[2], bytes[3]].into())
            }
            FieldFormat::Mac if bytes.len() == 6 => {
                let mut octets = [0_u8; 6];
                octets.copy_from_slice(bytes);
                FieldValue::MAC(octets.into())
            }
            FieldFormat::Text | FieldFormat::Bytes => FieldValue::Bytes(bytes.to_vec()),
            _ if !bytes.is_empty() && bytes.len() <= 8 => FieldValue::Uint(be_uint(bytes)),
            _ => FieldValue::Bytes(bytes.to_vec()),
        }
    }

    /// Encode the value back into `len` bytes in network order.
    pub fn to_bytes(&self, len: usize) -> Vec<u8> {
        match self {
            FieldValue::Uint(v) => {
                let all = v.to_be_bytes();
                let len = len.min(8);
                all[8 - len..].to_vec()
            }
            FieldValue::IPv4(ip) => ip.octets().to_vec(),
            FieldValue::MAC(mac) => mac.octets().to_vec(),
            FieldValue::Bytes(b) => b.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_round_trip() {
        let bytes = [0x00, 0x00, 0x03, 0xe8];
        let value = FieldValue::decode(&FieldFormat::DecHex, &bytes);
        assert_eq!(value, FieldValue::Uint(1000));
        assert_eq!(value.to_bytes(4), bytes.to_vec());
        assert_eq!(FieldFormat::DecHex.render(&bytes), "1000 (0x000003E8)");
    }

    #[test]
    fn every_format_round_trips() {
        let samples: &[(FieldFormat, &[u8])] = &[
            (FieldFormat::Dec, &[0x40]),
            (FieldFormat::Hex, &[0x7c, 0xcd]),
            (FieldFormat::TcpFlags, &[0x12]),
            (FieldFormat::Ipv4, &[192, 168, 1, 100]),
            (FieldFormat::Mac, &[0xaa, 0xbb, 0xcc, 0x11, 0x22, 0x33]),
            (FieldFormat::Text, b"GET / HTTP/1.1\r\n"),
            (FieldFormat::Bytes, &[0xde, 0xad, 0xbe, 0xef, 0x00]),
            (FieldFormat::DecHex, &[0, 0, 0, 0, 0, 0, 0, 0, 1]),
        ];
        for (format, bytes) in samples {
            let value = FieldValue::decode(format, bytes);
            assert_eq!(value.to_bytes(bytes.len()), bytes.to_vec(), "{:?}", format);
        }
    }

    #[test]
    fn addresses_render_in_their_usual_form() {
        assert_eq!(FieldFormat::Ipv4.render(&[127, 0, 0, 1]), "127.0.0.1");
        assert_eq!(
            FieldFormat::Mac.render(&[0xff, 0xee, 0xdd, 0x44, 0x55, 0x66]),
            "ff:ee:dd:44:55:66"
        );
    }

    #[test]
    fn tcp_flags_mnemonics() {
        assert_eq!(tcp_flags_mnemonic(0x02), "SYN");
        assert_eq!(tcp_flags_mnemonic(0x12), "SYN+ACK");
        assert_eq!(tcp_flags_mnemonic(0x18), "PSH+ACK");
        assert_eq!(tcp_flags_mnemonic(0x11), "FIN+ACK");
        assert_eq!(tcp_flags_mnemonic(0x00), "none");
        assert_eq!(FieldFormat::TcpFlags.render(&[0x02]), "0x02 (SYN)");
    }

    #[test]
    fn named_values() {
        static PROTOS: &[(u64, &str)] = &[(6, "TCP"), (17, "UDP")];
        assert_eq!(FieldFormat::DecNamed(PROTOS).render(&[6]), "6 (TCP)");
        assert_eq!(FieldFormat::DecNamed(PROTOS).render(&[99]), "99");
        assert_eq!(
            FieldFormat::HexNamed(crate::types::ETHERTYPE_NAMES).render(&[0x08, 0x00]),
            "0x0800 (IPv4)"
        );
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(
            FieldFormat::Text.render(b"Host: a\r\n\x89"),
            "\"Host: a\\r\\n\\x89\""
        );
    }

    #[test]
    fn long_bytes_are_shortened() {
        let bytes = [0xab_u8; 64];
        let shown = FieldFormat::Bytes.render(&bytes);
        assert!(shown.ends_with("(64 bytes)"), "{}", shown);
    }

    #[test]
    fn raw_spec_covers_payload() {
        let spec = LayerSpec::raw(41);
        assert_eq!(spec.name, "Raw");
        assert_eq!(spec.declared_len(), 41);
    }
}
