//! Packet Structure

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::builder::PacketBuilder;
use crate::errors::Error;
use crate::field::LayerSpec;
use crate::types::{EncapType, LayerCreatorFn};
use crate::view::{self, PacketView};
use crate::Layer;

fn get_encap_types_map() -> &'static RwLock<HashMap<EncapType, LayerCreatorFn>> {
    /// Encapsulation type -> creator of the first layer of a packet.
    static ENCAP_TYPES_MAP: OnceLock<RwLock<HashMap<EncapType, LayerCreatorFn>>> =
        OnceLock::new();
    ENCAP_TYPES_MAP.get_or_init(|| RwLock::new(HashMap::new()))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Timestamp {
    pub secs: i64,
    pub usecs: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct PacketMetadata {
    pub timestamp: Timestamp,
    /// Length of the packet on the wire.
    pub len: u32,
    /// Bytes actually held, at most `len`.
    pub caplen: u32,
}

/// A stack of layers together with the bytes they occupy.
///
/// Packets come either from a [`PacketBuilder`][`crate::builder::PacketBuilder`] or from
/// dissecting bytes with [`Packet::from_bytes`]. In both cases `as_bytes` is exactly what goes (or
/// went) on the wire, and `unprocessed` holds the trailing payload that no layer claims.
#[derive(Debug, Default)]
pub struct Packet {
    pub(crate) meta: PacketMetadata,
    pub(crate) layers: Vec<Box<dyn Layer + Send>>,
    pub(crate) unprocessed: Vec<u8>,
    pub(crate) data: Vec<u8>,
}

impl Packet {
    /// Register a new Layer 2 encoding
    ///
    /// Any 'crate' using the infrastucture, should call this function with their encoding type
    pub fn register_encap_type(encap: EncapType, creator: LayerCreatorFn) -> Result<(), Error> {
        let mut map = get_encap_types_map()
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&encap) {
            return Err(Error::RegisterError(format!("encap: {}", encap)));
        }
        map.insert(encap, creator);

        Ok(())
    }

    /// Create a Packet from a u8 buffer.
    ///
    /// This is the main dissection function. Layers are decoded one after the other until a layer
    /// does not know what follows it; those bytes are kept as `unprocessed`. Without a call to
    /// [`register_defaults`][`crate::register_defaults`] first, everything is `unprocessed`.
    pub fn from_bytes(bytes: &[u8], encap: EncapType) -> Result<Self, Error> {
        let mut p = Packet {
            data: bytes.to_vec(),
            meta: PacketMetadata {
                len: bytes.len() as u32,
                caplen: bytes.len() as u32,
                ..Default::default()
            },
            ..Default::default()
        };

        let creator = {
            let map = get_encap_types_map()
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            map.get(&encap).copied()
        };
        let Some(creator) = creator else {
            log_debug!("no dissector for encap type {}", encap);
            p.unprocessed = bytes.into();
            return Ok(p);
        };

        let mut layer = creator();
        let mut start = 0;
        loop {
            let (next, consumed) = layer.decode_bytes(&bytes[start..])?;
            if consumed == 0 && next.is_none() {
                // The layer didn't recognise the bytes, they stay unprocessed.
                break;
            }
            log_debug!("decoded {} ({} bytes) at offset {}", layer.name(), consumed, start);
            start += consumed;
            p.layers.push(layer);

            match next {
                Some(next_layer) if start < bytes.len() => layer = next_layer,
                _ => break,
            }
        }

        if start != bytes.len() {
            p.unprocessed = bytes[start..].into();
        }
        Ok(p)
    }

    pub fn layers(&self) -> &[Box<dyn Layer + Send>] {
        &self.layers
    }

    /// Trailing payload bytes not claimed by any layer.
    pub fn unprocessed(&self) -> &[u8] {
        &self.unprocessed
    }

    pub fn meta(&self) -> &PacketMetadata {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: PacketMetadata) {
        self.meta = meta;
    }

    /// The serialized packet.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Field layout of every layer, with a `Raw` layer for any trailing payload.
    pub fn layer_specs(&self) -> Vec<LayerSpec> {
        let mut specs: Vec<LayerSpec> = self
            .layers
            .iter()
            .map(|l| LayerSpec::new(l.name(), l.fields()))
            .collect();
        if !self.unprocessed.is_empty() {
            specs.push(LayerSpec::raw(self.unprocessed.len()));
        }
        specs
    }

    /// Hand the layers back to a builder, e.g. to change a field and encode again.
    pub fn into_builder(self) -> PacketBuilder {
        PacketBuilder::from(self)
    }

    /// Annotate this packet's bytes with its own layers.
    pub fn view(&self) -> Result<PacketView<'_>, Error> {
        view::annotate(&self.layer_specs(), &self.data)
    }

    /// `IPv4 127.0.0.1 > 127.0.0.1 / TCP 54321 > 80 [SYN]`
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = self.layers.iter().map(|l| l.summary()).collect();
        if !self.unprocessed.is_empty() {
            parts.push(format!("Raw ({} bytes)", self.unprocessed.len()));
        }
        if parts.is_empty() {
            "(empty)".to_string()
        } else {
            parts.join(" / ")
        }
    }
}

// A layer serialized under its short name: `{"tcp": {...}}`.
struct NamedLayer<'a>(&'a (dyn Layer + Send));

impl Serialize for NamedLayer<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0.short_name(), self.0)?;
        map.end()
    }
}

impl Serialize for Packet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let layers: Vec<NamedLayer<'_>> = self
            .layers
            .iter()
            .map(|l| NamedLayer(l.as_ref()))
            .collect();

        let mut state = serializer.serialize_struct("Packet", 4)?;
        state.serialize_field("meta", &self.meta)?;
        state.serialize_field("layers", &layers)?;
        state.serialize_field("unprocessed", &hex::encode(&self.unprocessed))?;
        state.serialize_field("data", &hex::encode(&self.data))?;
        state.end()
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::types::{ENCAP_TYPE_ETH, ENCAP_TYPE_IPV4};

    #[test]
    fn from_bytes_fail_too_short() {
        let _ = crate::register_defaults();

        let p = Packet::from_bytes("".as_bytes(), ENCAP_TYPE_ETH);

        assert!(p.is_err(), "{:?}", p.ok());
    }

    #[test]
    fn from_bytes_success_eth_hdr_size() {
        let _ = crate::register_defaults();

        let p = Packet::from_bytes(&[0; 14], ENCAP_TYPE_ETH);

        assert!(p.is_ok(), "{:?}", p.err());
    }

    #[test]
    fn unknown_encap_is_all_unprocessed() {
        let _ = crate::register_defaults();

        let p = Packet::from_bytes(&[1, 2, 3], 0xfff0).unwrap();
        assert!(p.layers().is_empty());
        assert_eq!(p.unprocessed(), &[1, 2, 3]);
        assert_eq!(p.layer_specs().len(), 1);
    }

    #[test]
    fn parse_valid_ipv4_http_packet() {
        use crate::layers::ethernet::ETH_HEADER_LENGTH;
        use crate::layers::ipv4::IPV4_BASE_HEADER_LENGTH;
        use crate::layers::tcp::TCP_BASE_HEADER_LENGTH;

        let _ = crate::register_defaults();

        let array = hex::decode("00e08100b02800096b88f5c90800450000c1d24940008006c85b0a000005cf2e865e0cc30050a80076877de014025018faf0ad62000048454144202f76342f69756964656e742e6361623f3033303730313132303820485454502f312e310d0a4163636570743a202a2f2a0d0a557365722d4167656e743a20496e6475737472792055706461746520436f6e74726f6c0d0a486f73743a2077696e646f77737570646174652e6d6963726f736f66742e636f6d0d0a436f6e6e656374696f6e3a204b6565702d416c6976650d0a0d0a").unwrap();
        let len = array.len();

        let p = Packet::from_bytes(&array, ENCAP_TYPE_ETH);
        assert!(p.is_ok(), "{:?}", p.err());

        let p = p.unwrap();
        assert!(p.layers.len() == 3, "{:?}", p);
        assert_eq!(
            p.unprocessed.len(),
            len - (ETH_HEADER_LENGTH + IPV4_BASE_HEADER_LENGTH + TCP_BASE_HEADER_LENGTH)
        );
        assert!(p.unprocessed.starts_with(b"HEAD /v4/iuident.cab"));
        assert!(p.summary().starts_with("Ethernet"), "{}", p.summary());
    }

    #[test]
    fn dissected_packet_view_covers_every_byte() {
        let _ = crate::register_defaults();

        let array = hex::decode(
            "450000280001000040067ccd7f0000017f000001d4310050000003e8000000005002ffff00000000",
        )
        .unwrap();
        let p = Packet::from_bytes(&array, ENCAP_TYPE_IPV4).unwrap();
        assert_eq!(p.layers().len(), 2, "{:?}", p);

        let view = p.view().unwrap();
        let covered: usize = view.layers().iter().map(|l| l.range.len()).sum();
        assert_eq!(covered, array.len());
    }

    #[test]
    fn packet_serializes_to_json() {
        let _ = crate::register_defaults();

        let array = hex::decode(
            "450000280001000040067ccd7f0000017f000001d4310050000003e8000000005002ffff00000000",
        )
        .unwrap();
        let p = Packet::from_bytes(&array, ENCAP_TYPE_IPV4).unwrap();
        let json = serde_json::to_value(&p).unwrap();

        assert_eq!(json["layers"][0]["ip"]["src_addr"], "127.0.0.1");
        assert_eq!(json["layers"][1]["tcp"]["dst_port"], 80);
    }
}
