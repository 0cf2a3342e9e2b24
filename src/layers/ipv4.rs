//! IPv4 Layer

use core::convert::TryInto as _;

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use serde::Serialize;

use crate::checksum::{internet_checksum, PseudoHeader};
use crate::errors::Error;
use crate::field::{FieldFormat, FieldSpec};
use crate::layer::EncodeInfo;
use crate::types::{IPv4Address, LayerCreatorFn, ENCAP_TYPE_IPV4};
use crate::{Layer, Packet};

/// Basic Length of the IPv4 Header when no options are present
pub const IPV4_BASE_HEADER_LENGTH: usize = 20_usize;

pub const IPV4_OPTION_EOOL: u8 = 0;
pub const IPV4_OPTION_NOP: u8 = 1;
pub const IPV4_OPTION_RR: u8 = 7;
pub const IPV4_OPTION_MTUP: u8 = 11;
pub const IPV4_OPTION_MTUR: u8 = 12;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

/// Don't Fragment, in the 3 bit `flags`.
pub const IPV4_FLAG_DF: u8 = 0x2;
/// More Fragments, in the 3 bit `flags`.
pub const IPV4_FLAG_MF: u8 = 0x1;

/// Names of the protocol numbers a reader is likely to meet.
pub static IP_PROTO_NAMES: &[(u64, &str)] = &[
    (1, "ICMP"),
    (2, "IGMP"),
    (6, "TCP"),
    (17, "UDP"),
    (41, "IPv6"),
    (47, "GRE"),
    (50, "ESP"),
    (132, "SCTP"),
];

fn get_protocols_map() -> &'static RwLock<HashMap<u8, LayerCreatorFn>> {
    static PROTOCOLS_MAP: OnceLock<RwLock<HashMap<u8, LayerCreatorFn>>> = OnceLock::new();
    PROTOCOLS_MAP.get_or_init(|| RwLock::new(HashMap::new()))
}

// Register ourselves to well-known Layer 2, and as the first layer of bare IPv4 packets.
pub(crate) fn register_defaults() -> Result<(), Error> {
    use crate::layers::ethernet::register_ethertype;

    get_protocols_map();

    Packet::register_encap_type(ENCAP_TYPE_IPV4, IPv4::creator)?;
    register_ethertype(crate::types::ETHERTYPE_IP, IPv4::creator)?;

    Ok(())
}

/// Register a Transport Protocol for dissection.
///
/// Higher level protocols should call this function to register themselves for decoding with the
/// IPv4 Layer. For example, [TCP Protocol][`crate::layers::tcp`] would call this function with a
/// protocol number 6 and similarly [UDP Protocol][`crate::layers::udp`] would call this function
/// with a protocol number of 17.
pub fn register_protocol(proto: u8, creator: LayerCreatorFn) -> Result<(), Error> {
    let mut map = get_protocols_map()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if map.contains_key(&proto) {
        return Err(Error::RegisterError(format!("proto: {}", proto)));
    }
    map.insert(proto, creator);

    Ok(())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum IPOption {
    EOOL,
    NOP,
    RR {
        len: u8,
        ptr: u8,
        route: Vec<IPv4Address>,
    },
    MTUP {
        len: u8,
        value: u16,
    },
    MTUR {
        len: u8,
        value: u16,
    },
    Other {
        value: u8,
        len: u8,
        data: Vec<u8>,
    },
    /// Octets after End of Options, kept as they were on the wire.
    Padding {
        data: Vec<u8>,
    },
}

impl IPOption {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            IPOption::EOOL => vec![IPV4_OPTION_EOOL],
            IPOption::NOP => vec![IPV4_OPTION_NOP],
            IPOption::RR { len, ptr, route } => {
                let mut out = vec![IPV4_OPTION_RR, *len, *ptr];
                for addr in route {
                    out.extend(addr.as_slice());
                }
                out
            }
            IPOption::MTUP { len, value } => {
                let mut out = vec![IPV4_OPTION_MTUP, *len];
                out.extend(value.to_be_bytes());
                out
            }
            IPOption::MTUR { len, value } => {
                let mut out = vec![IPV4_OPTION_MTUR, *len];
                out.extend(value.to_be_bytes());
                out
            }
            IPOption::Other { value, len, data } => {
                let mut out = vec![*value, *len];
                out.extend(data);
                out
            }
            IPOption::Padding { data } => data.clone(),
        }
    }
}

/// Structure representing the IPv4 Header.
///
/// `hdr_len`, `len`, `proto` and `checksum` are `None` until the header is encoded or decoded;
/// set them to put a deliberately wrong value on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct IPv4 {
    version: u8,
    hdr_len: Option<u8>,
    #[serde(serialize_with = "crate::types::hex::serialize_upper_hex_u8")]
    tos: u8,
    len: Option<u16>,
    #[serde(serialize_with = "crate::types::hex::serialize_upper_hex_u16")]
    id: u16,
    #[serde(serialize_with = "crate::types::hex::serialize_upper_hex_u8")]
    flags: u8,
    frag_offset: u16,
    ttl: u8,
    proto: Option<u8>,
    #[serde(serialize_with = "crate::types::hex::serialize_opt_upper_hex_u16")]
    checksum: Option<u16>,
    src_addr: IPv4Address,
    dst_addr: IPv4Address,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<IPOption>,
}

impl Default for IPv4 {
    fn default() -> Self {
        Self {
            version: 4,
            hdr_len: None,
            tos: 0,
            len: None,
            id: 1,
            flags: 0,
            frag_offset: 0,
            ttl: 64,
            proto: None,
            checksum: None,
            src_addr: IPv4Address::default(),
            dst_addr: IPv4Address::default(),
            options: Vec::new(),
        }
    }
}

impl IPv4 {
    pub fn new(src_addr: IPv4Address, dst_addr: IPv4Address) -> Self {
        Self {
            src_addr,
            dst_addr,
            ..Default::default()
        }
    }

    pub fn creator() -> Box<dyn Layer + Send> {
        Box::<IPv4>::default()
    }

    pub fn id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn tos(mut self, tos: u8) -> Self {
        self.tos = tos;
        self
    }

    /// The 3 flag bits, e.g. [`IPV4_FLAG_DF`].
    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags & 0x7;
        self
    }

    pub fn proto(mut self, proto: u8) -> Self {
        self.proto = Some(proto);
        self
    }

    pub fn checksum(mut self, checksum: u16) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn options(mut self, options: Vec<IPOption>) -> Self {
        self.options = options;
        self
    }

    pub fn src_addr(&self) -> IPv4Address {
        self.src_addr
    }

    pub fn dst_addr(&self) -> IPv4Address {
        self.dst_addr
    }

    pub fn protocol(&self) -> Option<u8> {
        self.proto
    }

    pub fn total_len(&self) -> Option<u16> {
        self.len
    }

    pub fn header_checksum(&self) -> Option<u16> {
        self.checksum
    }

    pub fn ip_options(&self) -> &[IPOption] {
        &self.options
    }

    /// Options as they go on the wire, padded with zeros to a multiple of 4 octets.
    fn options_to_bytes(&self) -> Vec<u8> {
        let mut out: Vec<u8> = self.options.iter().flat_map(IPOption::to_bytes).collect();
        while out.len() % 4 != 0 {
            out.push(IPV4_OPTION_EOOL);
        }
        out
    }

    fn header_len(&self) -> usize {
        match self.hdr_len {
            Some(words) => words as usize * 4,
            None => IPV4_BASE_HEADER_LENGTH + self.options_to_bytes().len(),
        }
    }

    fn options_from_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut i = 0_usize;

        while i < bytes.len() {
            let (option, consumed) = Self::option_from_bytes(&bytes[i..])?;
            i += consumed;
            let done = option == IPOption::EOOL;
            self.options.push(option);
            // Whatever follows End of Options is padding.
            if done {
                if i < bytes.len() {
                    self.options.push(IPOption::Padding {
                        data: bytes[i..].to_vec(),
                    });
                }
                break;
            }
        }

        Ok(())
    }

    fn option_from_bytes(bytes: &[u8]) -> Result<(IPOption, usize), Error> {
        let value = bytes[0];

        // from: https://www.iana.org/assignments/ip-parameters/ip-parameters.xhtml
        let option = match value {
            IPV4_OPTION_EOOL => (IPOption::EOOL, 1),
            IPV4_OPTION_NOP => (IPOption::NOP, 1),
            IPV4_OPTION_RR => {
                let ((len, data), consumed) = Self::option_data_from_bytes(bytes)?;
                // A route that is not whole addresses stays opaque.
                if data.is_empty() || (data.len() - 1) % 4 != 0 {
                    return Ok((Self::other_option(value, len, data), consumed));
                }

                let ptr = data[0];
                let route = data[1..]
                    .chunks_exact(4)
                    .map(|addr| [addr[0], addr[1], addr[2], addr[3]].into())
                    .collect();

                (IPOption::RR { len, ptr, route }, consumed)
            }
            IPV4_OPTION_MTUP | IPV4_OPTION_MTUR => {
                let ((len, data), consumed) = Self::option_data_from_bytes(bytes)?;
                if len != 4 {
                    return Ok((Self::other_option(value, len, data), consumed));
                }

                let mtu = u16::from_be_bytes([data[0], data[1]]);

                let option = if value == IPV4_OPTION_MTUP {
                    IPOption::MTUP { len, value: mtu }
                } else {
                    IPOption::MTUR { len, value: mtu }
                };
                (option, consumed)
            }
            value => {
                let ((len, data), consumed) = Self::option_data_from_bytes(bytes)?;
                (Self::other_option(value, len, data), consumed)
            }
        };

        Ok(option)
    }

    fn other_option(value: u8, len: u8, data: &[u8]) -> IPOption {
        IPOption::Other {
            value,
            len,
            data: data.into(),
        }
    }

    // Type-Length-Value options: returns the length octet and the value.
    fn option_data_from_bytes(bytes: &[u8]) -> Result<((u8, &[u8]), usize), Error> {
        if bytes.len() < 2 {
            return Err(Error::TooShort {
                required: 2,
                available: bytes.len(),
                data: hex::encode(bytes),
            });
        }
        // len also includes the type and len octets
        let len = bytes[1] as usize;
        if len < 2 {
            return Err(Error::ParseError(format!(
                "IPv4 option length {} is below 2: {}",
                len,
                hex::encode(bytes)
            )));
        }
        if bytes.len() < len {
            return Err(Error::TooShort {
                required: len,
                available: bytes.len(),
                data: hex::encode(bytes),
            });
        }

        Ok(((len as u8, &bytes[2..len]), len))
    }
}

fn render_version_ihl(bytes: &[u8]) -> String {
    let v = bytes[0];
    format!(
        "0x{:02X} (version {}, IHL {} = {} bytes)",
        v,
        v >> 4,
        v & 0x0f,
        (v & 0x0f) as usize * 4
    )
}

fn render_flags_frag(bytes: &[u8]) -> String {
    if bytes.len() != 2 {
        return crate::types::hex::upper_spaced(bytes);
    }
    let v = u16::from_be_bytes([bytes[0], bytes[1]]);
    let flags = (v >> 13) as u8;
    let mut names = vec![];
    if flags & 0x4 != 0 {
        names.push("reserved");
    }
    if flags & IPV4_FLAG_DF != 0 {
        names.push("DF");
    }
    if flags & IPV4_FLAG_MF != 0 {
        names.push("MF");
    }
    let names = if names.is_empty() {
        "none".to_string()
    } else {
        names.join("+")
    };
    format!("0x{:04X} (flags {}, offset {})", v, names, v & 0x1fff)
}

fn proto_name(proto: u8) -> Option<&'static str> {
    IP_PROTO_NAMES
        .iter()
        .find(|(p, _)| *p == proto as u64)
        .map(|(_, name)| *name)
}

impl Layer for IPv4 {
    fn decode_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(Option<Box<dyn Layer + Send>>, usize), Error> {
        if bytes.len() < IPV4_BASE_HEADER_LENGTH {
            return Err(Error::TooShort {
                required: IPV4_BASE_HEADER_LENGTH,
                available: bytes.len(),
                data: hex::encode(bytes),
            });
        }

        self.version = bytes[0] >> 4;
        let hdr_len = bytes[0] & 0x0f;
        let header_bytes = hdr_len as usize * 4;
        if header_bytes < IPV4_BASE_HEADER_LENGTH {
            return Err(Error::ParseError(format!(
                "IPv4 header length {} is below the minimum of 5 words",
                hdr_len
            )));
        }
        // Length is in 4 octets
        if bytes.len() < header_bytes {
            return Err(Error::TooShort {
                required: header_bytes,
                available: bytes.len(),
                data: hex::encode(bytes),
            });
        }
        self.hdr_len = Some(hdr_len);
        self.tos = bytes[1];
        self.len = Some(u16::from_be_bytes(bytes[2..4].try_into().unwrap()));
        self.id = u16::from_be_bytes(bytes[4..6].try_into().unwrap());
        let flags_offset = u16::from_be_bytes(bytes[6..8].try_into().unwrap());
        self.flags = (flags_offset >> 13) as u8;
        self.frag_offset = flags_offset & 0x1fff;
        self.ttl = bytes[8];
        self.proto = Some(bytes[9]);
        self.checksum = Some(u16::from_be_bytes(bytes[10..12].try_into().unwrap()));
        self.src_addr = bytes[12..16].try_into()?;
        self.dst_addr = bytes[16..20].try_into()?;

        self.options_from_bytes(&bytes[IPV4_BASE_HEADER_LENGTH..header_bytes])?;

        // Only the first fragment carries the transport header.
        if self.frag_offset != 0 {
            return Ok((None, header_bytes));
        }

        let map = get_protocols_map()
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let layer = map.get(&bytes[9]);

        match layer {
            None => Ok((None, header_bytes)),
            Some(l4_creator) => Ok((Some(l4_creator()), header_bytes)),
        }
    }

    fn stack_and_encode(
        &mut self,
        next_layer: Option<&[u8]>,
        info: &EncodeInfo<'_>,
    ) -> Result<Vec<u8>, Error> {
        let options = self.options_to_bytes();
        let hdr_len = match self.hdr_len {
            Some(words) => words,
            None => ((IPV4_BASE_HEADER_LENGTH + options.len()) / 4) as u8,
        };
        if hdr_len > 0x0f {
            return Err(Error::SculptingError(format!(
                "IPv4 options of {} bytes do not fit in the header",
                options.len()
            )));
        }
        let payload = next_layer.unwrap_or_default();

        let len = match self.len {
            Some(len) => len,
            None => {
                let total = IPV4_BASE_HEADER_LENGTH + options.len() + payload.len();
                u16::try_from(total).map_err(|_| {
                    Error::SculptingError(format!("IPv4 packet of {} bytes is too long", total))
                })?
            }
        };

        let proto = match self.proto {
            Some(proto) => proto,
            None => match info.next {
                Some("ICMP") => IPPROTO_ICMP,
                Some("TCP") => IPPROTO_TCP,
                Some("UDP") => IPPROTO_UDP,
                _ => 0,
            },
        };

        let mut result = Vec::with_capacity(IPV4_BASE_HEADER_LENGTH + options.len() + payload.len());
        result.push((self.version << 4) | hdr_len);
        result.push(self.tos);
        result.extend(len.to_be_bytes());
        result.extend(self.id.to_be_bytes());
        let flags_offset = ((self.flags as u16) << 13) | (self.frag_offset & 0x1fff);
        result.extend(flags_offset.to_be_bytes());
        result.push(self.ttl);
        result.push(proto);
        result.extend([0, 0]);
        result.extend(self.src_addr.as_slice());
        result.extend(self.dst_addr.as_slice());
        result.extend(&options);

        let checksum = match self.checksum {
            Some(checksum) => checksum,
            None => internet_checksum(&result),
        };
        result[10..12].copy_from_slice(&checksum.to_be_bytes());

        self.hdr_len = Some(hdr_len);
        self.len = Some(len);
        self.proto = Some(proto);
        self.checksum = Some(checksum);

        result.extend(payload);

        Ok(result)
    }

    fn fields(&self) -> Vec<FieldSpec> {
        let mut fields = vec![
            FieldSpec::new("version_ihl", 1, FieldFormat::Custom(render_version_ihl)),
            FieldSpec::new("tos", 1, FieldFormat::Hex),
            FieldSpec::new("len", 2, FieldFormat::DecHex),
            FieldSpec::new("id", 2, FieldFormat::DecHex),
            FieldSpec::new("flags_frag", 2, FieldFormat::Custom(render_flags_frag)),
            FieldSpec::new("ttl", 1, FieldFormat::Dec),
            FieldSpec::new("proto", 1, FieldFormat::DecNamed(IP_PROTO_NAMES)),
            FieldSpec::new("chksum", 2, FieldFormat::Hex),
            FieldSpec::new("src", 4, FieldFormat::Ipv4),
            FieldSpec::new("dst", 4, FieldFormat::Ipv4),
        ];
        let options_len = self.header_len().saturating_sub(IPV4_BASE_HEADER_LENGTH);
        if options_len > 0 {
            fields.push(FieldSpec::new("options", options_len, FieldFormat::Bytes));
        }
        fields
    }

    fn name(&self) -> &'static str {
        "IPv4"
    }

    fn short_name(&self) -> &'static str {
        "ip"
    }

    fn summary(&self) -> String {
        match self.proto.and_then(proto_name) {
            Some(name) => format!("IPv4 {} > {} ({})", self.src_addr, self.dst_addr, name),
            None => format!("IPv4 {} > {}", self.src_addr, self.dst_addr),
        }
    }

    fn pseudo_header(&self) -> Option<PseudoHeader> {
        Some(PseudoHeader {
            src: self.src_addr,
            dst: self.dst_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::verify_checksum;
    use crate::layers;

    fn test_options(packet: &[u8], options: &[IPOption]) {
        let _ = layers::register_defaults();

        let mut ipv4 = Box::new(IPv4::default());
        let p = ipv4.decode_bytes(packet);
        assert!(p.is_ok(), "{:#?}", ipv4);

        assert_eq!(ipv4.options.as_slice(), options);
        let (_, consumed) = p.unwrap();
        assert_eq!(consumed, ipv4.header_len());
    }

    #[test]
    fn parse_ipv4_option_packet_1() {
        let ipv4_packet = hex::decode("08003715e6bc00123f4a33d208004600004caa1d0000801111caac1f1336ac1f1349010101003e3000a10034fa4e302a02010004067075626c6963a01d02012a02010002010030123010060c2b060102012b0e01010601050500").unwrap();
        let options = [IPOption::NOP, IPOption::NOP, IPOption::NOP, IPOption::EOOL];

        test_options(&ipv4_packet[14..], &options);
    }

    #[test]
    fn parse_ipv4_option_packet_2() {
        let ipv4_packet = hex::decode("08003715e6bc00123f4a33d208004600004caa1d0000801111caac1f1336ac1f13495f03ff003e3000a10034fa4e302a02010004067075626c6963a01d02012a02010002010030123010060c2b060102012b0e01010601050500").unwrap();
        let options = [
            IPOption::Other {
                value: 0x5f,
                len: 3,
                data: vec![0xff],
            },
            IPOption::EOOL,
        ];

        test_options(&ipv4_packet[14..], &options);
    }

    #[test]
    fn parse_ipv4_option_packet_3() {
        let ipv4_packet = hex::decode("08003715e6bc00123f4a33d2080047000050aa1d0000801111caac1f1336ac1f1349070707deadbeef003e3000a10034fa4e302a02010004067075626c6963a01d02012a02010002010030123010060c2b060102012b0e01010601050500").unwrap();
        let options = [
            IPOption::RR {
                len: 7,
                ptr: 7,
                route: vec![[0xde, 0xad, 0xbe, 0xef].into()],
            },
            IPOption::EOOL,
        ];

        test_options(&ipv4_packet[14..], &options);
    }

    #[test]
    fn parse_ipv4_option_packet_4() {
        let ipv4_packet = hex::decode("08003715e6bc00123f4a33d2080047000050aa1d0000801111caac1f1336ac1f13490b04dead0c04beef3e3000a10034fa4e302a02010004067075626c6963a01d02012a02010002010030123010060c2b060102012b0e01010601050500").unwrap();
        let options = [
            IPOption::MTUP {
                len: 4,
                value: 57005,
            },
            IPOption::MTUR {
                len: 4,
                value: 48879,
            },
        ];

        test_options(&ipv4_packet[14..], &options);
    }

    #[test]
    fn options_encode_back_to_the_same_header() {
        let packet = hex::decode("08003715e6bc00123f4a33d2080047000050aa1d0000801111caac1f1336ac1f1349070707deadbeef003e3000a10034fa4e302a02010004067075626c6963a01d02012a02010002010030123010060c2b060102012b0e01010601050500").unwrap();
        let header = &packet[14..14 + 28];

        let mut ipv4 = IPv4::default();
        ipv4.decode_bytes(&packet[14..]).unwrap();
        let encoded = ipv4
            .stack_and_encode(None, &EncodeInfo::default())
            .unwrap();
        assert_eq!(encoded, header);
    }

    #[test]
    fn unclean_options_rebuild_byte_for_byte() {
        let _ = layers::register_defaults();
        // IHL 12: NOP, a Record Route cut mid address, a 5 byte MTU Probe,
        // End of Options and 15 octets of non-zero padding.
        let header = hex::decode(concat!(
            "4c000030123400004011beef0a0000010a000002",
            "01",
            "070604aabbcc",
            "0b0505dcff",
            "00",
            "112233445566778899aabbccddeeff"
        ))
        .unwrap();

        let mut ipv4 = IPv4::default();
        let (_, consumed) = ipv4.decode_bytes(&header).unwrap();
        assert_eq!(consumed, 48);
        assert_eq!(
            ipv4.ip_options(),
            &[
                IPOption::NOP,
                IPOption::Other {
                    value: IPV4_OPTION_RR,
                    len: 6,
                    data: vec![0x04, 0xaa, 0xbb, 0xcc],
                },
                IPOption::Other {
                    value: IPV4_OPTION_MTUP,
                    len: 5,
                    data: vec![0x05, 0xdc, 0xff],
                },
                IPOption::EOOL,
                IPOption::Padding {
                    data: hex::decode("112233445566778899aabbccddeeff").unwrap(),
                },
            ]
        );
        let encoded = ipv4
            .stack_and_encode(None, &EncodeInfo::default())
            .unwrap();
        assert_eq!(encoded, header);

        let mut frame = hex::decode("ffeedd445566aabbcc1122330800").unwrap();
        frame.extend(&header);
        let dissected = crate::Packet::from_bytes(&frame, crate::ENCAP_TYPE_ETH).unwrap();
        assert_eq!(dissected.layers().len(), 2);
        let rebuilt = dissected.into_builder().build().unwrap();
        assert_eq!(rebuilt.as_bytes(), frame.as_slice());
    }

    #[test]
    fn overrunning_option_is_rejected() {
        let mut header = hex::decode("4600001812340000401100000a0000010a000002").unwrap();
        header.extend([0x07, 0x09, 0x04, 0x00]);

        let mut ipv4 = IPv4::default();
        assert!(matches!(
            ipv4.decode_bytes(&header),
            Err(Error::TooShort { required: 9, .. })
        ));
    }

    #[test]
    fn too_short() {
        let mut ipv4 = IPv4::default();
        let r = ipv4.decode_bytes(&[0x45, 0x00, 0x00]);
        assert!(matches!(r, Err(Error::TooShort { required: 20, .. })));

        let mut ipv4 = IPv4::default();
        let mut bytes = vec![0x46];
        bytes.extend([0_u8; 19]);
        let r = ipv4.decode_bytes(&bytes);
        assert!(matches!(r, Err(Error::TooShort { required: 24, .. })));
    }

    #[test]
    fn automatic_fields() {
        let mut ip = IPv4::new([192, 168, 1, 100].into(), [8, 8, 8, 8].into());
        let info = EncodeInfo {
            next: Some("UDP"),
            pseudo_header: None,
        };
        let bytes = ip.stack_and_encode(Some(&[0_u8; 8][..]), &info).unwrap();

        assert_eq!(bytes.len(), 28);
        assert_eq!(bytes[0], 0x45);
        assert_eq!(&bytes[2..4], &[0, 28]);
        assert_eq!(bytes[8], 64);
        assert_eq!(bytes[9], IPPROTO_UDP);
        assert!(verify_checksum(&bytes[..20]));

        assert_eq!(ip.protocol(), Some(IPPROTO_UDP));
        assert_eq!(ip.total_len(), Some(28));
    }

    #[test]
    fn explicit_fields_are_kept() {
        let mut ip = IPv4::new([10, 0, 0, 1].into(), [10, 0, 0, 2].into())
            .proto(99)
            .checksum(0xbeef)
            .flags(IPV4_FLAG_DF);
        let bytes = ip
            .stack_and_encode(None, &EncodeInfo::default())
            .unwrap();
        assert_eq!(bytes[9], 99);
        assert_eq!(&bytes[10..12], &[0xbe, 0xef]);
        assert_eq!(&bytes[6..8], &[0x40, 0x00]);
    }

    #[test]
    fn odd_options_are_padded() {
        let mut ip = IPv4::new([10, 0, 0, 1].into(), [10, 0, 0, 2].into())
            .options(vec![IPOption::NOP]);
        let bytes = ip
            .stack_and_encode(None, &EncodeInfo::default())
            .unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[0], 0x46);
        assert_eq!(&bytes[20..], &[1, 0, 0, 0]);
        let declared: usize = ip.fields().iter().map(|f| f.len).sum();
        assert_eq!(declared, 24);
    }

    #[test]
    fn flags_and_fragment_rendering() {
        assert_eq!(render_flags_frag(&[0x40, 0x00]), "0x4000 (flags DF, offset 0)");
        assert_eq!(render_flags_frag(&[0x20, 0x10]), "0x2010 (flags MF, offset 16)");
        assert_eq!(
            render_version_ihl(&[0x45]),
            "0x45 (version 4, IHL 5 = 20 bytes)"
        );
    }
}
