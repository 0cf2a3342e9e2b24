//! Address Resolution Protocol (ARP) Handling

use core::convert::TryInto;

use serde::Serialize;

use crate::errors::Error;
use crate::field::{FieldFormat, FieldSpec};
use crate::layer::{EncodeInfo, Layer};
use crate::layers::ethernet;
use crate::types::{IPv4Address, MACAddress, ETHERTYPE_ARP, ETHERTYPE_IP, ETHERTYPE_NAMES};

/// Header Length of ARP for Ethernet and IPv4
pub const ARP_HDR_LENGTH: usize = 28_usize;

pub const ARP_HTYPE_ETHERNET: u16 = 1;

pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

static ARP_HTYPE_NAMES: &[(u64, &str)] = &[(ARP_HTYPE_ETHERNET as u64, "Ethernet")];

static ARP_OP_NAMES: &[(u64, &str)] = &[
    (ARP_OP_REQUEST as u64, "request"),
    (ARP_OP_REPLY as u64, "reply"),
];

// Register outselves with Ethernet layer
pub(crate) fn register_defaults() -> Result<(), Error> {
    ethernet::register_ethertype(ETHERTYPE_ARP, ARP::creator)
}

#[derive(Debug, Clone, Serialize)]
pub struct ARP {
    #[serde(serialize_with = "crate::types::hex::serialize_upper_hex_u16")]
    htype: u16,
    #[serde(serialize_with = "crate::types::hex::serialize_upper_hex_u16")]
    ptype: u16,
    hlen: u8,
    plen: u8,
    oper: u16,
    sender_ha: MACAddress,
    sender_pa: IPv4Address,
    target_ha: MACAddress,
    target_pa: IPv4Address,
}

impl Default for ARP {
    fn default() -> Self {
        Self {
            htype: ARP_HTYPE_ETHERNET,
            ptype: ETHERTYPE_IP,
            hlen: 6,
            plen: 4,
            oper: ARP_OP_REQUEST,
            sender_ha: MACAddress::default(),
            sender_pa: IPv4Address::default(),
            target_ha: MACAddress::default(),
            target_pa: IPv4Address::default(),
        }
    }
}

impl ARP {
    pub fn creator() -> Box<dyn Layer + Send> {
        Box::new(ARP::default())
    }

    /// "Who has `target_pa`? Tell `sender_pa`." The target hardware address is left zero.
    pub fn request(sender_ha: MACAddress, sender_pa: IPv4Address, target_pa: IPv4Address) -> Self {
        Self {
            sender_ha,
            sender_pa,
            target_pa,
            ..Default::default()
        }
    }

    /// "`sender_pa` is at `sender_ha`", addressed to the one who asked.
    pub fn reply(
        sender_ha: MACAddress,
        sender_pa: IPv4Address,
        target_ha: MACAddress,
        target_pa: IPv4Address,
    ) -> Self {
        Self {
            oper: ARP_OP_REPLY,
            sender_ha,
            sender_pa,
            target_ha,
            target_pa,
            ..Default::default()
        }
    }

    pub fn operation(&self) -> u16 {
        self.oper
    }

    pub fn sender_pa(&self) -> IPv4Address {
        self.sender_pa
    }

    pub fn target_pa(&self) -> IPv4Address {
        self.target_pa
    }
}

impl Layer for ARP {
    fn decode_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(Option<Box<dyn Layer + Send>>, usize), Error> {
        if bytes.len() < ARP_HDR_LENGTH {
            return Err(Error::TooShort {
                required: ARP_HDR_LENGTH,
                available: bytes.len(),
                data: hex::encode(bytes),
            });
        }

        self.htype = (bytes[0] as u16) << 8 | (bytes[1] as u16);
        self.ptype = (bytes[2] as u16) << 8 | (bytes[3] as u16);
        self.hlen = bytes[4];
        self.plen = bytes[5];
        if self.hlen != 6 || self.plen != 4 {
            return Err(Error::ParseError(format!(
                "ARP with hardware length {} and protocol length {}",
                self.hlen, self.plen
            )));
        }
        self.oper = (bytes[6] as u16) << 8 | (bytes[7] as u16);
        self.sender_ha = bytes[8..14].try_into()?;
        self.sender_pa = bytes[14..18].try_into()?;
        self.target_ha = bytes[18..24].try_into()?;
        self.target_pa = bytes[24..28].try_into()?;

        Ok((None, ARP_HDR_LENGTH))
    }

    fn stack_and_encode(
        &mut self,
        next_layer: Option<&[u8]>,
        _info: &EncodeInfo<'_>,
    ) -> Result<Vec<u8>, Error> {
        let mut result = Vec::with_capacity(ARP_HDR_LENGTH);

        result.extend(self.htype.to_be_bytes());
        result.extend(self.ptype.to_be_bytes());
        result.push(self.hlen);
        result.push(self.plen);
        result.extend(self.oper.to_be_bytes());
        result.extend(self.sender_ha.as_slice());
        result.extend(self.sender_pa.as_slice());
        result.extend(self.target_ha.as_slice());
        result.extend(self.target_pa.as_slice());
        result.extend(next_layer.unwrap_or_default());

        Ok(result)
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("hwtype", 2, FieldFormat::DecNamed(ARP_HTYPE_NAMES)),
            FieldSpec::new("ptype", 2, FieldFormat::HexNamed(ETHERTYPE_NAMES)),
            FieldSpec::new("hwlen", 1, FieldFormat::Dec),
            FieldSpec::new("plen", 1, FieldFormat::Dec),
            FieldSpec::new("op", 2, FieldFormat::DecNamed(ARP_OP_NAMES)),
            FieldSpec::new("hwsrc", 6, FieldFormat::Mac),
            FieldSpec::new("psrc", 4, FieldFormat::Ipv4),
            FieldSpec::new("hwdst", 6, FieldFormat::Mac),
            FieldSpec::new("pdst", 4, FieldFormat::Ipv4),
        ]
    }

    fn name(&self) -> &'static str {
        "ARP"
    }

    fn short_name(&self) -> &'static str {
        "arp"
    }

    fn summary(&self) -> String {
        match self.oper {
            ARP_OP_REQUEST => format!("ARP who has {}? tell {}", self.target_pa, self.sender_pa),
            ARP_OP_REPLY => format!("ARP {} is at {}", self.sender_pa, self.sender_ha),
            op => format!("ARP op {}", op),
        }
    }
}
