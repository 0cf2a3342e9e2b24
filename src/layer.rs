//! 'Layer' trait
//!
//! [`Layer`] trait is central to [`wirelens`][`crate`]. Every protocol header implements it, in
//! both directions: `decode_bytes` fills the struct from a byte slice, `stack_and_encode` writes the
//! header in front of the bytes of the layers above it. `fields` describes the header's wire layout
//! for the visualizer.

use core::fmt::Debug;

use erased_serde::serialize_trait_object;

use crate::checksum::PseudoHeader;
use crate::errors::Error;
use crate::field::FieldSpec;

/// What a layer learns about its surroundings when it is encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct EncodeInfo<'a> {
    /// Name of the layer directly above (`"raw"` for payload bytes, `None` when nothing follows).
    pub next: Option<&'a str>,
    /// Pseudo-header offered by the layer directly below, if it is IPv4.
    pub pseudo_header: Option<PseudoHeader>,
}

/// `Layer` Trait defines a 'Layer' in a Packet
///
/// Typically a Layer will correspond to Data Link Layer, Network Layer, Transport Layer or the
/// Application Layer. Each of the supported 'protocols' have implementation for this trait.
pub trait Layer: Send + Debug + erased_serde::Serialize {
    /// Main 'decoder' function.
    ///
    /// The return value is a Tuple `(Option<Box<dyn Layer + Send>>, usize)` on success. This
    /// indicates the layer that should decode the following bytes and the number of bytes consumed.
    /// `None` means we do not know how to decode further, which is not an error: the rest of the
    /// bytes stay as unprocessed payload.
    fn decode_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(Option<Box<dyn Layer + Send>>, usize), Error>;

    /// Encode this layer in front of `next_layer`.
    ///
    /// Fields left unset (lengths, protocol numbers, checksums) are computed here and recorded on
    /// `self`, so the struct shows what went on the wire. Fields set explicitly are kept as is.
    fn stack_and_encode(
        &mut self,
        next_layer: Option<&[u8]>,
        info: &EncodeInfo<'_>,
    ) -> Result<Vec<u8>, Error>;

    /// The header's fields in wire order. Widths must add up to the bytes this layer occupies.
    fn fields(&self) -> Vec<FieldSpec>;

    /// Name for the given layer.
    fn name(&self) -> &'static str;

    /// Short name for the given layer.
    fn short_name(&self) -> &'static str;

    /// One line description, e.g. `TCP 54321 > 80 [SYN]`.
    fn summary(&self) -> String {
        self.name().to_string()
    }

    /// Pseudo-header for the transport checksum of the layer above.
    fn pseudo_header(&self) -> Option<PseudoHeader> {
        None
    }
}

serialize_trait_object!(Layer);
