//! Hex helpers
//!
//! Serializer functions for fields that read better as Hex than as plain integers, and the
//! uppercase byte formatting shared by the field listing and the hex dump.

use core::fmt::Write as _;

macro_rules! generate_serialize_hex_fns {
    (($fn:ident, $format:literal, $trait:path)) => {
        pub fn $fn<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
            T: $trait,
        {
            serializer.serialize_str(format!($format, value).as_str())
        }
    };

    ($($tt:tt,)*) => {
        $(
            generate_serialize_hex_fns!($tt);
        )+
    };
}

// Generate functions that can be used to Serialize a value to Hex
generate_serialize_hex_fns! {
    (serialize_upper_hex_u8, "0x{:02X}", core::fmt::UpperHex),
    (serialize_upper_hex_u16, "0x{:04X}", core::fmt::UpperHex),
    (serialize_upper_hex_u32, "0x{:08X}", core::fmt::UpperHex),
}

/// Serialize optional (not yet computed) values as Hex, `null` when absent.
pub fn serialize_opt_upper_hex_u16<S>(value: &Option<u16>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(v) => serialize_upper_hex_u16(v, serializer),
        None => serializer.serialize_none(),
    }
}

/// Uppercase hex pairs separated by a single space: `[0xd4, 0x31]` -> `"D4 31"`.
pub fn upper_spaced(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", b);
    }
    out
}

/// Uppercase hex of `value` zero-padded to `width` bytes: `(80, 2)` -> `"0x0050"`.
pub fn upper_prefixed(value: u64, width: usize) -> String {
    format!("0x{:0w$X}", value, w = width * 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaced_pairs_are_uppercase() {
        assert_eq!(upper_spaced(&[0x00, 0x00, 0x03, 0xe8]), "00 00 03 E8");
        assert_eq!(upper_spaced(&[]), "");
    }

    #[test]
    fn prefixed_width_follows_field_size() {
        assert_eq!(upper_prefixed(54321, 2), "0xD431");
        assert_eq!(upper_prefixed(1000, 4), "0x000003E8");
        assert_eq!(upper_prefixed(6, 1), "0x06");
    }
}
