//! ICMP Datagram

use std::convert::TryInto;

use serde::Serialize;

use crate::checksum::internet_checksum;
use crate::errors::Error;
use crate::field::{FieldFormat, FieldSpec};
use crate::layer::EncodeInfo;
use crate::layers::ipv4;
use crate::types::IPv4Address;
use crate::Layer;

/// IANA Assigned protocol number for ICMP
pub const IPPROTO_ICMP: u8 = 1_u8;
/// ICMP header length
pub const ICMP_HEADER_LENGTH: usize = 8_usize;

/// ICMP types
pub const ICMP_ECHO_REPLY: u8 = 0_u8;
pub const ICMP_ECHO_REQUEST: u8 = 8_u8;
pub const ICMP_DESTINATION_UNREACHABLE: u8 = 3_u8;
pub const ICMP_SOURCE_QUENCH: u8 = 4_u8;
pub const ICMP_REDIRECT: u8 = 5_u8;
pub const ICMP_TIME_EXCEEDED: u8 = 11_u8;

static ICMP_TYPE_NAMES: &[(u64, &str)] = &[
    (ICMP_ECHO_REPLY as u64, "echo-reply"),
    (ICMP_DESTINATION_UNREACHABLE as u64, "dest-unreach"),
    (ICMP_SOURCE_QUENCH as u64, "source-quench"),
    (ICMP_REDIRECT as u64, "redirect"),
    (ICMP_ECHO_REQUEST as u64, "echo-request"),
    (ICMP_TIME_EXCEEDED as u64, "time-exceeded"),
];

// Register ICMP with Protocol Handler in IPv4
pub(crate) fn register_defaults() -> Result<(), Error> {
    ipv4::register_protocol(IPPROTO_ICMP, ICMP::creator)
}

/// The four octets after the checksum, whose meaning depends on the type.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IcmpType {
    Echo(IcmpEcho),
    Redirect(IcmpRedirect),
    Other(IcmpRestOfHeader),
}

impl Default for IcmpType {
    fn default() -> Self {
        IcmpType::Other(IcmpRestOfHeader::default())
    }
}

#[derive(Default, Debug, Clone, Copy, Serialize)]
pub struct IcmpEcho {
    identifier: u16,
    sequence_number: u16,
}

#[derive(Default, Debug, Clone, Copy, Serialize)]
pub struct IcmpRedirect {
    gateway_address: IPv4Address,
}

#[derive(Default, Debug, Clone, Copy, Serialize)]
pub struct IcmpRestOfHeader {
    #[serde(serialize_with = "hex::serde::serialize")]
    rest_of_header: [u8; 4],
}

/// Structure representing the ICMP Header
///
/// The message body (echo data, or the offending datagram of an error) is not part of this
/// layer.
#[derive(Default, Debug, Clone, Serialize)]
pub struct ICMP {
    #[serde(rename = "type")]
    icmp_type: u8,
    code: u8,
    #[serde(serialize_with = "crate::types::hex::serialize_opt_upper_hex_u16")]
    checksum: Option<u16>,
    #[serde(flatten)]
    rest_of_header: IcmpType,
}

impl ICMP {
    pub(crate) fn creator() -> Box<dyn Layer + Send> {
        Box::<ICMP>::default()
    }

    pub fn new(icmp_type: u8, code: u8) -> Self {
        Self {
            icmp_type,
            code,
            ..Default::default()
        }
    }

    pub fn echo_request(identifier: u16, sequence_number: u16) -> Self {
        Self {
            icmp_type: ICMP_ECHO_REQUEST,
            rest_of_header: IcmpType::Echo(IcmpEcho {
                identifier,
                sequence_number,
            }),
            ..Default::default()
        }
    }

    pub fn echo_reply(identifier: u16, sequence_number: u16) -> Self {
        Self {
            icmp_type: ICMP_ECHO_REPLY,
            ..Self::echo_request(identifier, sequence_number)
        }
    }

    pub fn checksum(mut self, checksum: u16) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn icmp_type(&self) -> u8 {
        self.icmp_type
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    /// `(identifier, sequence number)` of an echo request or reply.
    pub fn echo(&self) -> Option<(u16, u16)> {
        match self.rest_of_header {
            IcmpType::Echo(echo) => Some((echo.identifier, echo.sequence_number)),
            _ => None,
        }
    }

    fn rest_of_header_bytes(&self) -> [u8; 4] {
        match self.rest_of_header {
            IcmpType::Echo(echo) => {
                let id = echo.identifier.to_be_bytes();
                let seq = echo.sequence_number.to_be_bytes();
                [id[0], id[1], seq[0], seq[1]]
            }
            IcmpType::Redirect(redirect) => redirect.gateway_address.octets(),
            IcmpType::Other(other) => other.rest_of_header,
        }
    }
}

impl Layer for ICMP {
    fn decode_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(Option<Box<dyn Layer + Send>>, usize), Error> {
        if bytes.len() < ICMP_HEADER_LENGTH {
            return Err(Error::TooShort {
                required: ICMP_HEADER_LENGTH,
                available: bytes.len(),
                data: hex::encode(bytes),
            });
        }

        // decode type, code and checksum
        self.icmp_type = bytes[0];
        self.code = bytes[1];
        self.checksum = Some((bytes[2] as u16) << 8 | (bytes[3] as u16));

        // process the next 4 bytes depending on the type of ICMP packet
        self.rest_of_header = match self.icmp_type {
            ICMP_ECHO_REPLY | ICMP_ECHO_REQUEST => {
                let identifier = (bytes[4] as u16) << 8 | (bytes[5] as u16);
                let sequence_number = (bytes[6] as u16) << 8 | (bytes[7] as u16);
                IcmpType::Echo(IcmpEcho {
                    identifier,
                    sequence_number,
                })
            }
            ICMP_REDIRECT => IcmpType::Redirect(IcmpRedirect {
                gateway_address: bytes[4..8].try_into()?,
            }),
            _ => IcmpType::Other(IcmpRestOfHeader {
                rest_of_header: [bytes[4], bytes[5], bytes[6], bytes[7]],
            }),
        };

        Ok((None, ICMP_HEADER_LENGTH))
    }

    fn stack_and_encode(
        &mut self,
        next_layer: Option<&[u8]>,
        _info: &EncodeInfo<'_>,
    ) -> Result<Vec<u8>, Error> {
        let payload = next_layer.unwrap_or_default();
        let mut result = Vec::with_capacity(ICMP_HEADER_LENGTH + payload.len());

        result.push(self.icmp_type);
        result.push(self.code);
        result.extend([0, 0]);
        result.extend(self.rest_of_header_bytes());
        result.extend(payload);

        // Covers the whole ICMP message, body included.
        let checksum = match self.checksum {
            Some(checksum) => checksum,
            None => internet_checksum(&result),
        };
        result[2..4].copy_from_slice(&checksum.to_be_bytes());
        self.checksum = Some(checksum);

        Ok(result)
    }

    fn fields(&self) -> Vec<FieldSpec> {
        let mut fields = vec![
            FieldSpec::new("type", 1, FieldFormat::DecNamed(ICMP_TYPE_NAMES)),
            FieldSpec::new("code", 1, FieldFormat::Dec),
            FieldSpec::new("chksum", 2, FieldFormat::Hex),
        ];
        match self.rest_of_header {
            IcmpType::Echo(_) => {
                fields.push(FieldSpec::new("id", 2, FieldFormat::DecHex));
                fields.push(FieldSpec::new("seq", 2, FieldFormat::Dec));
            }
            IcmpType::Redirect(_) => {
                fields.push(FieldSpec::new("gw", 4, FieldFormat::Ipv4));
            }
            IcmpType::Other(_) => {
                fields.push(FieldSpec::new("unused", 4, FieldFormat::Bytes));
            }
        }
        fields
    }

    fn name(&self) -> &'static str {
        "ICMP"
    }

    fn short_name(&self) -> &'static str {
        "icmp"
    }

    fn summary(&self) -> String {
        let name = ICMP_TYPE_NAMES
            .iter()
            .find(|(t, _)| *t == self.icmp_type as u64)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| format!("type {}", self.icmp_type));
        match self.echo() {
            Some((id, seq)) => format!("ICMP {} id={} seq={}", name, id, seq),
            None => format!("ICMP {} code {}", name, self.code),
        }
    }
}
