//! UDP Layer

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use serde::Serialize;

use crate::errors::Error;
use crate::field::{FieldFormat, FieldSpec};
use crate::layer::EncodeInfo;
use crate::types::LayerCreatorFn;
use crate::Layer;

use crate::layers::ipv4;

fn get_udp_apps_map() -> &'static RwLock<HashMap<u16, LayerCreatorFn>> {
    static UDP_APPS_MAP: OnceLock<RwLock<HashMap<u16, LayerCreatorFn>>> = OnceLock::new();
    UDP_APPS_MAP.get_or_init(|| RwLock::new(HashMap::new()))
}

/// UDP header length
pub const UDP_HDR_LEN: usize = 8_usize;
/// IANA Assigned protocol number for UDP
pub const IPPROTO_UDP: u8 = 17_u8;

// Register UDP with Protocol Handler in IPv4
pub(crate) fn register_defaults() -> Result<(), Error> {
    get_udp_apps_map();

    ipv4::register_protocol(IPPROTO_UDP, UDP::creator)
}

/// API for an Application to register with us
///
/// This is a public API function for an App whose dissector should be called after UDP Layer's if
/// the Source or Destination port matches one of the ports.
pub fn register_app(port: u16, app: LayerCreatorFn) -> Result<(), Error> {
    let mut map = get_udp_apps_map()
        .write()
        .unwrap_or_else(PoisonError::into_inner);

    if map.contains_key(&port) {
        return Err(Error::RegisterError(format!("UDP Port: {}", port)));
    }
    map.insert(port, app);

    Ok(())
}

/// Structure representing the UDP Header.
#[derive(Debug, Default, Clone, Serialize)]
pub struct UDP {
    src_port: u16,
    dst_port: u16,
    length: Option<u16>,
    #[serde(serialize_with = "crate::types::hex::serialize_opt_upper_hex_u16")]
    checksum: Option<u16>,
}

impl UDP {
    pub fn creator() -> Box<dyn Layer + Send> {
        Box::<UDP>::default()
    }

    pub fn new(src_port: u16, dst_port: u16) -> Self {
        Self {
            src_port,
            dst_port,
            ..Default::default()
        }
    }

    pub fn length(mut self, length: u16) -> Self {
        self.length = Some(length);
        self
    }

    pub fn checksum(mut self, checksum: u16) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn src_port(&self) -> u16 {
        self.src_port
    }

    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }

    pub fn datagram_len(&self) -> Option<u16> {
        self.length
    }

    pub fn udp_checksum(&self) -> Option<u16> {
        self.checksum
    }
}

impl Layer for UDP {
    fn decode_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(Option<Box<dyn Layer + Send>>, usize), Error> {
        if bytes.len() < UDP_HDR_LEN {
            return Err(Error::TooShort {
                required: UDP_HDR_LEN,
                available: bytes.len(),
                data: hex::encode(bytes),
            });
        }

        self.src_port = (bytes[0] as u16) << 8 | (bytes[1] as u16);
        self.dst_port = (bytes[2] as u16) << 8 | (bytes[3] as u16);
        self.length = Some((bytes[4] as u16) << 8 | (bytes[5] as u16));
        self.checksum = Some((bytes[6] as u16) << 8 | (bytes[7] as u16));

        let map = get_udp_apps_map()
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let app = map.get(&self.dst_port).or_else(|| map.get(&self.src_port));
        match app {
            None => Ok((None, UDP_HDR_LEN)),
            Some(app_creator_fn) => Ok((Some(app_creator_fn()), UDP_HDR_LEN)),
        }
    }

    fn stack_and_encode(
        &mut self,
        next_layer: Option<&[u8]>,
        info: &EncodeInfo<'_>,
    ) -> Result<Vec<u8>, Error> {
        let payload = next_layer.unwrap_or_default();
        let length = match self.length {
            Some(length) => length,
            None => {
                let total = UDP_HDR_LEN + payload.len();
                u16::try_from(total).map_err(|_| {
                    Error::SculptingError(format!("UDP datagram of {} bytes is too long", total))
                })?
            }
        };

        let mut result = Vec::with_capacity(UDP_HDR_LEN + payload.len());
        result.extend(self.src_port.to_be_bytes());
        result.extend(self.dst_port.to_be_bytes());
        result.extend(length.to_be_bytes());
        result.extend([0, 0]);
        result.extend(payload);

        let checksum = match (self.checksum, info.pseudo_header) {
            (Some(checksum), _) => checksum,
            // A computed zero goes out as all ones, zero means "no checksum".
            (None, Some(pseudo_header)) => match pseudo_header.checksum(IPPROTO_UDP, &result) {
                0 => 0xFFFF,
                checksum => checksum,
            },
            (None, None) => 0,
        };
        result[6..8].copy_from_slice(&checksum.to_be_bytes());

        self.length = Some(length);
        self.checksum = Some(checksum);

        Ok(result)
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("sport", 2, FieldFormat::DecHex),
            FieldSpec::new("dport", 2, FieldFormat::DecHex),
            FieldSpec::new("len", 2, FieldFormat::Dec),
            FieldSpec::new("chksum", 2, FieldFormat::Hex),
        ]
    }

    fn name(&self) -> &'static str {
        "UDP"
    }

    fn short_name(&self) -> &'static str {
        "udp"
    }

    fn summary(&self) -> String {
        format!("UDP {} > {}", self.src_port, self.dst_port)
    }
}
