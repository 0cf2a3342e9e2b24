//! Packet Visualizer
//!
//! [`annotate`] walks a list of [`LayerSpec`]s over a byte buffer and produces a [`PacketView`]:
//! every field gets the byte range it occupies, its decoded [`FieldValue`] and a readable rendering.
//! From the view come the two outputs shown to a reader, the field listing
//! ([`PacketView::render_fields`]) and the hex dump with per line captions
//! ([`PacketView::render_hex`]).
//!
//! The layer specs and the buffer must agree on the length. A buffer shorter or longer than the
//! declared fields is an [`Error::LengthMismatch`], never a partial render.

use core::fmt::Write as _;
use core::ops::Range;

use serde::Serialize;

use crate::errors::Error;
use crate::field::{FieldValue, LayerSpec};

mod hexdump;
pub use hexdump::{hexdump, BYTES_PER_LINE};

/// A field located in the buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub layer: String,
    pub label: String,
    pub range: Range<usize>,
    pub value: FieldValue,
    pub text: String,
}

impl Annotation {
    /// `"12-15"`, or `"9"` for a single byte.
    pub fn range_label(&self) -> String {
        match self.range.len() {
            0 => format!("{}", self.range.start),
            1 => format!("{}", self.range.start),
            _ => format!("{}-{}", self.range.start, self.range.end - 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerView {
    pub name: String,
    pub range: Range<usize>,
    pub fields: Vec<Annotation>,
}

/// A byte buffer together with the annotations of all its layers.
#[derive(Debug, Clone, Serialize)]
pub struct PacketView<'a> {
    #[serde(serialize_with = "hex::serde::serialize")]
    bytes: &'a [u8],
    layers: Vec<LayerView>,
}

/// Lay `specs` over `bytes`, one field after the other.
pub fn annotate<'a>(specs: &[LayerSpec], bytes: &'a [u8]) -> Result<PacketView<'a>, Error> {
    let declared: usize = specs.iter().map(LayerSpec::declared_len).sum();
    if declared != bytes.len() {
        // Blame the first layer running off the end, or the last one if bytes are left over.
        let mut end = 0;
        let mut layer = specs
            .last()
            .map(|s| s.name.to_string())
            .unwrap_or_else(|| "(no layers)".to_string());
        for spec in specs {
            end += spec.declared_len();
            if end > bytes.len() {
                layer = spec.name.to_string();
                break;
            }
        }
        log_warn!(
            "layer {} declares {} bytes in total, buffer has {}",
            layer,
            declared,
            bytes.len()
        );
        return Err(Error::LengthMismatch {
            layer,
            declared,
            available: bytes.len(),
        });
    }

    let mut offset = 0;
    let mut layers = Vec::with_capacity(specs.len());
    for spec in specs {
        let start = offset;
        let mut fields = Vec::with_capacity(spec.fields.len());
        for field in &spec.fields {
            let range = offset..offset + field.len;
            let raw = &bytes[range.clone()];
            fields.push(Annotation {
                layer: spec.name.to_string(),
                label: field.name.to_string(),
                value: FieldValue::decode(&field.format, raw),
                text: field.format.render(raw),
                range,
            });
            offset += field.len;
        }
        layers.push(LayerView {
            name: spec.name.to_string(),
            range: start..offset,
            fields,
        });
    }

    Ok(PacketView { bytes, layers })
}

impl<'a> PacketView<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn layers(&self) -> &[LayerView] {
        &self.layers
    }

    /// All annotations in buffer order.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.layers.iter().flat_map(|l| l.fields.iter())
    }

    /// First field called `label` in the first layer called `layer`.
    pub fn field(&self, layer: &str, label: &str) -> Option<&Annotation> {
        self.layers
            .iter()
            .find(|l| l.name == layer)
            .and_then(|l| l.fields.iter().find(|f| f.label == label))
    }

    /// Layer by layer listing of field names and decoded values.
    pub fn render_fields(&self) -> String {
        let mut out = String::new();
        for layer in &self.layers {
            let _ = writeln!(
                out,
                "###[ {} ]### bytes {}",
                layer.name,
                range_text(&layer.range)
            );
            let width = layer
                .fields
                .iter()
                .map(|f| f.label.len())
                .max()
                .unwrap_or(0);
            for f in &layer.fields {
                let _ = writeln!(out, "  {:<width$} = {}", f.label, f.text, width = width);
            }
        }
        out
    }

    /// Hex dump, sixteen bytes a line, each line followed by the fields it holds.
    pub fn render_hex(&self) -> String {
        hexdump::annotated(self)
    }
}

fn range_text(range: &Range<usize>) -> String {
    if range.is_empty() {
        "(none)".to_string()
    } else if range.len() == 1 {
        format!("{}", range.start)
    } else {
        format!("{}-{}", range.start, range.end - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldFormat, FieldSpec};

    fn tcp_like_spec() -> Vec<LayerSpec> {
        vec![LayerSpec::new(
            "TCP",
            vec![
                FieldSpec::new("sport", 2, FieldFormat::DecHex),
                FieldSpec::new("dport", 2, FieldFormat::DecHex),
                FieldSpec::new("seq", 4, FieldFormat::DecHex),
            ],
        )]
    }

    #[test]
    fn annotations_are_contiguous() {
        let bytes = [0xd4, 0x31, 0x00, 0x50, 0x00, 0x00, 0x03, 0xe8];
        let view = annotate(&tcp_like_spec(), &bytes).unwrap();

        let mut expected_start = 0;
        for a in view.annotations() {
            assert_eq!(a.range.start, expected_start);
            expected_start = a.range.end;
        }
        assert_eq!(expected_start, bytes.len());

        let seq = view.field("TCP", "seq").unwrap();
        assert_eq!(seq.value, FieldValue::Uint(1000));
        assert_eq!(seq.text, "1000 (0x000003E8)");
        assert_eq!(seq.range_label(), "4-7");
    }

    #[test]
    fn short_buffer_is_reported() {
        let bytes = [0xd4, 0x31, 0x00, 0x50, 0x00];
        let err = annotate(&tcp_like_spec(), &bytes).unwrap_err();
        assert_eq!(
            err,
            Error::LengthMismatch {
                layer: "TCP".to_string(),
                declared: 8,
                available: 5,
            }
        );
    }

    #[test]
    fn long_buffer_is_reported() {
        let bytes = [0_u8; 9];
        let err = annotate(&tcp_like_spec(), &bytes).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { declared: 8, available: 9, .. }));
    }

    #[test]
    fn short_buffer_blames_the_layer_that_runs_off() {
        let mut specs = vec![LayerSpec::new(
            "IPv4",
            vec![FieldSpec::new("header", 20, FieldFormat::Bytes)],
        )];
        specs.extend(tcp_like_spec());
        let err = annotate(&specs, &[0_u8; 24]).unwrap_err();
        assert!(
            matches!(err, Error::LengthMismatch { ref layer, .. } if layer == "TCP"),
            "{:?}",
            err
        );
    }

    #[test]
    fn field_listing_shows_every_field() {
        let bytes = [0xd4, 0x31, 0x00, 0x50, 0x00, 0x00, 0x03, 0xe8];
        let view = annotate(&tcp_like_spec(), &bytes).unwrap();
        let listing = view.render_fields();

        assert!(listing.starts_with("###[ TCP ]### bytes 0-7\n"), "{}", listing);
        assert!(listing.contains("  sport = 54321 (0xD431)\n"), "{}", listing);
        assert!(listing.contains("  dport = 80 (0x0050)\n"), "{}", listing);
    }

    #[test]
    fn empty_input_is_an_empty_view() {
        let view = annotate(&[], &[]).unwrap();
        assert!(view.layers().is_empty());
        assert_eq!(view.render_hex(), "");
    }
}
