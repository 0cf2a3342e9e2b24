//! Ethernet Layer

use core::convert::TryInto;

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use serde::Serialize;

use crate::errors::Error;
use crate::field::{FieldFormat, FieldSpec};
use crate::layer::EncodeInfo;
use crate::types::{EtherType, LayerCreatorFn, MACAddress, ETHERTYPE_NAMES};
use crate::{Layer, Packet, ENCAP_TYPE_ETH};

pub const ETH_HEADER_LENGTH: usize = 14_usize;

pub fn get_ethertypes_map() -> &'static RwLock<HashMap<EtherType, LayerCreatorFn>> {
    /// A Map maintaining EtherType -> Creator fns for Layer Creators of L3 Layers.
    ///
    /// The creator function simply creates a `default` L3 struct that implements the dissector
    /// for the Layer.
    pub(crate) static ETHERTYPES_MAP: OnceLock<RwLock<HashMap<EtherType, LayerCreatorFn>>> =
        OnceLock::new();
    ETHERTYPES_MAP.get_or_init(|| RwLock::new(HashMap::new()))
}

// Register our Encap Types with the Packet.
pub(crate) fn register_defaults() -> Result<(), Error> {
    get_ethertypes_map();

    Packet::register_encap_type(ENCAP_TYPE_ETH, Ethernet::creator)
}

/// Register for a given EtherType
///
/// A Layer that would handle subsequent decoding for a given Ethertype, should register itself
/// by calling this function. For example [`crate::layers::ipv4`] would call `register_ethertype`
/// with [`EtherType`] value of 0x0800, passing the creator function for that layer.
pub fn register_ethertype(eth_type: EtherType, layer: LayerCreatorFn) -> Result<(), Error> {
    let mut map = get_ethertypes_map()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if map.contains_key(&eth_type) {
        return Err(Error::RegisterError(format!("ether_type: {}", eth_type)));
    }
    map.insert(eth_type, layer);

    Ok(())
}

/// Structure representing the Ethernet Header of a Packet.
///
/// `ethertype` follows the layer stacked above (ARP or IPv4) unless set explicitly.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Ethernet {
    dst_mac: MACAddress,
    src_mac: MACAddress,
    #[serde(serialize_with = "crate::types::hex::serialize_opt_upper_hex_u16")]
    ethertype: Option<EtherType>,
}

impl Ethernet {
    pub fn new(src_mac: MACAddress, dst_mac: MACAddress) -> Self {
        Self {
            src_mac,
            dst_mac,
            ethertype: None,
        }
    }

    pub(crate) fn creator() -> Box<dyn Layer + Send> {
        Box::<Ethernet>::default()
    }

    pub fn ethertype(mut self, ethertype: EtherType) -> Self {
        self.ethertype = Some(ethertype);
        self
    }

    pub fn src_mac(&self) -> MACAddress {
        self.src_mac
    }

    pub fn dst_mac(&self) -> MACAddress {
        self.dst_mac
    }

    pub fn ether_type(&self) -> Option<EtherType> {
        self.ethertype
    }
}

impl Layer for Ethernet {
    fn decode_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(Option<Box<dyn Layer + Send>>, usize), Error> {
        if bytes.len() < ETH_HEADER_LENGTH {
            return Err(Error::TooShort {
                required: ETH_HEADER_LENGTH,
                available: bytes.len(),
                data: hex::encode(bytes),
            });
        }
        self.dst_mac = bytes[0..6].try_into()?;
        self.src_mac = bytes[6..12].try_into()?;
        let ethertype = (bytes[12] as u16) << 8 | bytes[13] as u16;
        self.ethertype = Some(ethertype);

        let map = get_ethertypes_map()
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let layer = map.get(&ethertype);
        match layer {
            None => Ok((None, ETH_HEADER_LENGTH)),
            Some(l3_creator) => Ok((Some(l3_creator()), ETH_HEADER_LENGTH)),
        }
    }

    fn stack_and_encode(
        &mut self,
        next_layer: Option<&[u8]>,
        info: &EncodeInfo<'_>,
    ) -> Result<Vec<u8>, Error> {
        let payload = next_layer.unwrap_or_default();
        let mut result = Vec::with_capacity(ETH_HEADER_LENGTH + payload.len());

        result.extend(self.dst_mac.as_slice());
        result.extend(self.src_mac.as_slice());

        let ethertype: u16 = match (self.ethertype, info.next) {
            (Some(ethertype), _) => ethertype,
            (None, Some("ARP")) => crate::types::ETHERTYPE_ARP,
            (None, Some("IPv4")) => crate::types::ETHERTYPE_IP,
            (None, next) => {
                return Err(Error::SculptingError(format!(
                    "no EtherType for {}, set it explicitly",
                    next.unwrap_or("an empty frame")
                )))
            }
        };
        self.ethertype = Some(ethertype);

        result.extend(ethertype.to_be_bytes());
        result.extend(payload);

        Ok(result)
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("dst", 6, FieldFormat::Mac),
            FieldSpec::new("src", 6, FieldFormat::Mac),
            FieldSpec::new("type", 2, FieldFormat::HexNamed(ETHERTYPE_NAMES)),
        ]
    }

    fn name(&self) -> &'static str {
        "Ethernet"
    }

    fn short_name(&self) -> &'static str {
        "eth"
    }

    fn summary(&self) -> String {
        format!("Ethernet {} > {}", self.src_mac, self.dst_mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ethertype_follows_upper_layer() {
        let mut eth = Ethernet::new(
            "aa:bb:cc:dd:ee:ff".parse().unwrap(),
            "11:22:33:44:55:66".parse().unwrap(),
        );
        let info = EncodeInfo {
            next: Some("IPv4"),
            pseudo_header: None,
        };
        let bytes = eth.stack_and_encode(Some(&[0x45_u8][..]), &info).unwrap();
        assert_eq!(
            bytes,
            hex::decode("112233445566aabbccddeeff080045").unwrap()
        );
        assert_eq!(eth.ether_type(), Some(0x0800));
    }

    #[test]
    fn raw_payload_needs_explicit_ethertype() {
        let info = EncodeInfo {
            next: Some("raw"),
            pseudo_header: None,
        };
        let mut eth = Ethernet::default();
        assert!(eth.stack_and_encode(Some(&b"hi"[..]), &info).is_err());

        let mut eth = Ethernet::default().ethertype(0x88b5);
        let bytes = eth.stack_and_encode(Some(&b"hi"[..]), &info).unwrap();
        assert_eq!(&bytes[12..], &[0x88, 0xb5, b'h', b'i']);
    }

    #[test]
    fn decode_header() {
        let _ = crate::register_defaults();
        let bytes = hex::decode("ffeedd445566aabbcc112233080045").unwrap();
        let mut eth = Ethernet::default();
        let (next, consumed) = eth.decode_bytes(&bytes).unwrap();
        assert_eq!(consumed, ETH_HEADER_LENGTH);
        assert_eq!(next.map(|l| l.name()), Some("IPv4"));
        assert_eq!(eth.summary(), "Ethernet aa:bb:cc:11:22:33 > ff:ee:dd:44:55:66");
    }
}
