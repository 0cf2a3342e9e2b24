//! Hex dumps, plain and annotated.

use core::fmt::Write as _;

use super::PacketView;

pub const BYTES_PER_LINE: usize = 16;

// Width of the hex column: "XX " per byte without the trailing space.
const HEX_COLUMN_WIDTH: usize = BYTES_PER_LINE * 3 - 1;

/// `0000  45 00 00 28 ...  E..(....`
///
/// Offsets in hex, bytes in upper case hex, printable ASCII at the end of the line.
pub fn hexdump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (index, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        write_line(&mut out, index * BYTES_PER_LINE, chunk);
    }
    out
}

fn write_line(out: &mut String, offset: usize, chunk: &[u8]) {
    let hex = chunk
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ");
    let ascii: String = chunk
        .iter()
        .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
        .collect();
    let _ = writeln!(
        out,
        "{:04X}  {:<width$}  {}",
        offset,
        hex,
        ascii,
        width = HEX_COLUMN_WIDTH
    );
}

/// Each dump line is followed by one caption per field it holds.
///
/// A field spanning several lines is captioned in full on the line it starts on and marked
/// `(cont.)` on the following ones.
pub(super) fn annotated(view: &PacketView<'_>) -> String {
    let bytes = view.bytes();
    let mut out = String::new();

    for (index, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        let line_start = index * BYTES_PER_LINE;
        let line_end = line_start + chunk.len();
        write_line(&mut out, line_start, chunk);

        for a in view.annotations() {
            if a.range.is_empty() || a.range.end <= line_start || a.range.start >= line_end {
                continue;
            }
            if a.range.start >= line_start {
                let _ = writeln!(
                    out,
                    "      {:<9} {}.{} = {}",
                    a.range_label(),
                    a.layer,
                    a.label,
                    a.text
                );
            } else {
                let _ = writeln!(
                    out,
                    "      {:<9} {}.{} (cont.)",
                    a.range_label(),
                    a.layer,
                    a.label
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldFormat, FieldSpec, LayerSpec};
    use crate::view::annotate;

    #[test]
    fn plain_dump_layout() {
        let dump = hexdump(b"GET / HTTP/1.1\r\nHost");
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "0000  47 45 54 20 2F 20 48 54 54 50 2F 31 2E 31 0D 0A  GET / HTTP/1.1.."
        );
        assert!(lines[1].starts_with("0010  48 6F 73 74 "), "{}", lines[1]);
        assert!(lines[1].ends_with("  Host"), "{}", lines[1]);
    }

    #[test]
    fn empty_dump() {
        assert_eq!(hexdump(&[]), "");
    }

    #[test]
    fn captions_follow_their_line() {
        let specs = vec![LayerSpec::new(
            "Demo",
            vec![
                FieldSpec::new("head", 14, FieldFormat::Bytes),
                FieldSpec::new("word", 4, FieldFormat::DecHex),
                FieldSpec::new("tail", 2, FieldFormat::Dec),
            ],
        )];
        let mut bytes = vec![0_u8; 14];
        bytes.extend([0x00, 0x00, 0x03, 0xe8, 0x00, 0x07]);

        let view = annotate(&specs, &bytes).unwrap();
        let dump = view.render_hex();
        let lines: Vec<&str> = dump.lines().collect();

        assert!(lines[0].starts_with("0000  "));
        assert!(lines[1].contains("Demo.head = "), "{}", dump);
        assert!(lines[2].contains("14-17     Demo.word = 1000 (0x000003E8)"), "{}", dump);
        assert!(lines[3].starts_with("0010  "));
        assert!(lines[4].contains("Demo.word (cont.)"), "{}", dump);
        assert!(lines[5].contains("18-19     Demo.tail = 7"), "{}", dump);
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn rendering_is_repeatable() {
        let specs = vec![LayerSpec::raw(40)];
        let bytes: Vec<u8> = (0..40).collect();
        let view = annotate(&specs, &bytes).unwrap();
        assert_eq!(view.render_hex(), view.render_hex());
        assert_eq!(view.render_fields(), view.render_fields());
    }

    #[test]
    fn zero_length_fields_have_no_caption() {
        let specs = vec![LayerSpec::new(
            "Demo",
            vec![
                FieldSpec::new("options", 0, FieldFormat::Bytes),
                FieldSpec::new("value", 1, FieldFormat::Dec),
            ],
        )];
        let view = annotate(&specs, &[5]).unwrap();
        let dump = view.render_hex();
        assert!(!dump.contains("options"), "{}", dump);
        assert!(dump.contains("Demo.value = 5"), "{}", dump);
    }
}
