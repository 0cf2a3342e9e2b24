//! TCP Layer

use core::convert::TryInto;

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use serde::Serialize;

use crate::errors::Error;
use crate::field::{tcp_flags_mnemonic, FieldFormat, FieldSpec};
use crate::layer::{EncodeInfo, Layer};
use crate::types::LayerCreatorFn;

use crate::layers::ipv4;

fn get_tcp_apps_map() -> &'static RwLock<HashMap<u16, LayerCreatorFn>> {
    static TCP_APPS_MAP: OnceLock<RwLock<HashMap<u16, LayerCreatorFn>>> = OnceLock::new();
    TCP_APPS_MAP.get_or_init(|| RwLock::new(HashMap::new()))
}

/// TCP header length without options
pub const TCP_BASE_HEADER_LENGTH: usize = 20_usize;
/// IANA Assigned protocol number for TCP
pub const IPPROTO_TCP: u8 = 6_u8;

pub const TCP_FLAG_FIN: u16 = 0x01;
pub const TCP_FLAG_SYN: u16 = 0x02;
pub const TCP_FLAG_RST: u16 = 0x04;
pub const TCP_FLAG_PSH: u16 = 0x08;
pub const TCP_FLAG_ACK: u16 = 0x10;
pub const TCP_FLAG_URG: u16 = 0x20;
pub const TCP_FLAG_ECE: u16 = 0x40;
pub const TCP_FLAG_CWR: u16 = 0x80;

// Register ourselves With IPv4
pub(crate) fn register_defaults() -> Result<(), Error> {
    get_tcp_apps_map();

    ipv4::register_protocol(IPPROTO_TCP, TCP::creator)
}

/// Register An App for decoding after TCP Layer
///
/// This is a public API function for an App whose dissector should be called after TCP Layer's if
/// the Source or Destination port matches one of the ports.
pub fn register_app(port: u16, app: LayerCreatorFn) -> Result<(), Error> {
    let mut map = get_tcp_apps_map()
        .write()
        .unwrap_or_else(PoisonError::into_inner);

    if map.contains_key(&port) {
        return Err(Error::RegisterError(format!("tcp port: {}", port)));
    }
    map.insert(port, app);

    Ok(())
}

/// Structure representing the TCP Header
///
/// `data_offset` and `checksum` are computed on encoding unless set. The checksum needs an IPv4
/// layer below; a TCP segment encoded on its own carries a zero checksum.
#[derive(Debug, Clone, Serialize)]
pub struct TCP {
    src_port: u16,
    dst_port: u16,
    seq_no: u32,
    ack_no: u32,
    data_offset: Option<u8>,
    #[serde(serialize_with = "crate::types::hex::serialize_upper_hex_u16")]
    flags: u16,
    window_size: u16,
    #[serde(serialize_with = "crate::types::hex::serialize_opt_upper_hex_u16")]
    checksum: Option<u16>,
    urgent_ptr: u16,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "hex::serde::serialize"
    )]
    options: Vec<u8>,
}

impl Default for TCP {
    fn default() -> Self {
        Self {
            src_port: 20,
            dst_port: 80,
            seq_no: 0,
            ack_no: 0,
            data_offset: None,
            flags: TCP_FLAG_SYN,
            window_size: 8192,
            checksum: None,
            urgent_ptr: 0,
            options: Vec::new(),
        }
    }
}

impl TCP {
    pub fn creator() -> Box<dyn Layer + Send> {
        Box::new(TCP::default())
    }

    pub fn new(src_port: u16, dst_port: u16) -> Self {
        Self {
            src_port,
            dst_port,
            ..Default::default()
        }
    }

    pub fn seq_no(mut self, seq_no: u32) -> Self {
        self.seq_no = seq_no;
        self
    }

    pub fn ack_no(mut self, ack_no: u32) -> Self {
        self.ack_no = ack_no;
        self
    }

    /// Combination of `TCP_FLAG_*`.
    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn window(mut self, window_size: u16) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn urgent_ptr(mut self, urgent_ptr: u16) -> Self {
        self.urgent_ptr = urgent_ptr;
        self
    }

    pub fn checksum(mut self, checksum: u16) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Raw option bytes, already padded to a multiple of 4.
    pub fn options(mut self, options: Vec<u8>) -> Self {
        self.options = options;
        self
    }

    pub fn src_port(&self) -> u16 {
        self.src_port
    }

    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }

    pub fn sequence(&self) -> u32 {
        self.seq_no
    }

    pub fn acknowledgment(&self) -> u32 {
        self.ack_no
    }

    pub fn tcp_flags(&self) -> u16 {
        self.flags
    }

    pub fn tcp_checksum(&self) -> Option<u16> {
        self.checksum
    }

    fn header_len(&self) -> usize {
        match self.data_offset {
            Some(words) => words as usize * 4,
            None => TCP_BASE_HEADER_LENGTH + self.options.len(),
        }
    }
}

fn render_data_offset(bytes: &[u8]) -> String {
    let v = bytes[0];
    format!(
        "0x{:02X} ({} words = {} bytes)",
        v,
        v >> 4,
        (v >> 4) as usize * 4
    )
}

impl Layer for TCP {
    fn decode_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(Option<Box<dyn Layer + Send>>, usize), Error> {
        if bytes.len() < TCP_BASE_HEADER_LENGTH {
            return Err(Error::TooShort {
                required: TCP_BASE_HEADER_LENGTH,
                available: bytes.len(),
                data: hex::encode(bytes),
            });
        }

        self.src_port = (bytes[0] as u16) << 8 | (bytes[1] as u16);
        self.dst_port = (bytes[2] as u16) << 8 | (bytes[3] as u16);
        self.seq_no = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
        self.ack_no = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
        let data_offset = bytes[12] >> 4;
        let header_len = data_offset as usize * 4;
        if header_len < TCP_BASE_HEADER_LENGTH {
            return Err(Error::ParseError(format!(
                "TCP data offset {} is below the minimum of 5 words",
                data_offset
            )));
        }
        if bytes.len() < header_len {
            return Err(Error::TooShort {
                required: header_len,
                available: bytes.len(),
                data: hex::encode(bytes),
            });
        }
        self.data_offset = Some(data_offset);
        self.flags = ((bytes[12] & 0x0f) as u16) << 8 | (bytes[13] as u16);
        self.window_size = (bytes[14] as u16) << 8 | (bytes[15] as u16);
        self.checksum = Some((bytes[16] as u16) << 8 | (bytes[17] as u16));
        self.urgent_ptr = (bytes[18] as u16) << 8 | (bytes[19] as u16);
        self.options = bytes[TCP_BASE_HEADER_LENGTH..header_len].to_vec();

        let map = get_tcp_apps_map()
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let app = map.get(&self.dst_port).or_else(|| map.get(&self.src_port));
        match app {
            None => Ok((None, header_len)),
            Some(app_creator) => Ok((Some(app_creator()), header_len)),
        }
    }

    fn stack_and_encode(
        &mut self,
        next_layer: Option<&[u8]>,
        info: &EncodeInfo<'_>,
    ) -> Result<Vec<u8>, Error> {
        if self.options.len() % 4 != 0 || self.options.len() > 40 {
            return Err(Error::SculptingError(format!(
                "TCP options must be a multiple of 4 bytes up to 40, got {}",
                self.options.len()
            )));
        }
        let data_offset = match self.data_offset {
            Some(words) => words,
            None => ((TCP_BASE_HEADER_LENGTH + self.options.len()) / 4) as u8,
        };
        let payload = next_layer.unwrap_or_default();

        let mut result = Vec::with_capacity(self.header_len() + payload.len());
        result.extend(self.src_port.to_be_bytes());
        result.extend(self.dst_port.to_be_bytes());
        result.extend(self.seq_no.to_be_bytes());
        result.extend(self.ack_no.to_be_bytes());
        result.push(data_offset << 4 | ((self.flags >> 8) as u8 & 0x0f));
        result.push(self.flags as u8);
        result.extend(self.window_size.to_be_bytes());
        result.extend([0, 0]);
        result.extend(self.urgent_ptr.to_be_bytes());
        result.extend(&self.options);
        result.extend(payload);

        let checksum = match (self.checksum, info.pseudo_header) {
            (Some(checksum), _) => checksum,
            (None, Some(pseudo_header)) => pseudo_header.checksum(IPPROTO_TCP, &result),
            (None, None) => 0,
        };
        result[16..18].copy_from_slice(&checksum.to_be_bytes());

        self.data_offset = Some(data_offset);
        self.checksum = Some(checksum);

        Ok(result)
    }

    fn fields(&self) -> Vec<FieldSpec> {
        let mut fields = vec![
            FieldSpec::new("sport", 2, FieldFormat::DecHex),
            FieldSpec::new("dport", 2, FieldFormat::DecHex),
            FieldSpec::new("seq", 4, FieldFormat::DecHex),
            FieldSpec::new("ack", 4, FieldFormat::DecHex),
            FieldSpec::new("dataofs", 1, FieldFormat::Custom(render_data_offset)),
            FieldSpec::new("flags", 1, FieldFormat::TcpFlags),
            FieldSpec::new("window", 2, FieldFormat::DecHex),
            FieldSpec::new("chksum", 2, FieldFormat::Hex),
            FieldSpec::new("urgptr", 2, FieldFormat::Dec),
        ];
        let options_len = self.header_len().saturating_sub(TCP_BASE_HEADER_LENGTH);
        if options_len > 0 {
            fields.push(FieldSpec::new("options", options_len, FieldFormat::Bytes));
        }
        fields
    }

    fn name(&self) -> &'static str {
        "TCP"
    }

    fn short_name(&self) -> &'static str {
        "tcp"
    }

    fn summary(&self) -> String {
        let mut s = format!(
            "TCP {} > {} [{}] seq={}",
            self.src_port,
            self.dst_port,
            tcp_flags_mnemonic(self.flags),
            self.seq_no
        );
        if self.flags & TCP_FLAG_ACK != 0 {
            s.push_str(&format!(" ack={}", self.ack_no));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::PseudoHeader;

    fn loopback() -> EncodeInfo<'static> {
        EncodeInfo {
            next: None,
            pseudo_header: Some(PseudoHeader {
                src: [127, 0, 0, 1].into(),
                dst: [127, 0, 0, 1].into(),
            }),
        }
    }

    #[test]
    fn syn_header_layout() {
        let mut tcp = TCP::new(54321, 80)
            .seq_no(1000)
            .flags(TCP_FLAG_SYN)
            .window(65535);
        let bytes = tcp.stack_and_encode(None, &loopback()).unwrap();

        assert_eq!(bytes.len(), TCP_BASE_HEADER_LENGTH);
        assert_eq!(&bytes[0..2], &[0xd4, 0x31]);
        assert_eq!(&bytes[2..4], &[0x00, 0x50]);
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x03, 0xe8]);
        assert_eq!(bytes[12], 0x50);
        assert_eq!(bytes[13], 0x02);
        assert_eq!(&bytes[14..16], &[0xff, 0xff]);
        assert_eq!(tcp.summary(), "TCP 54321 > 80 [SYN] seq=1000");
    }

    #[test]
    fn checksum_verifies_with_pseudo_header() {
        let info = loopback();
        let mut tcp = TCP::new(54321, 80)
            .seq_no(1000)
            .ack_no(5000)
            .flags(TCP_FLAG_PSH | TCP_FLAG_ACK);
        let segment = tcp.stack_and_encode(Some(&b"GET / HTTP/1.1\r\n\r\n"[..]), &info).unwrap();

        let ph = info.pseudo_header.unwrap();
        assert_eq!(ph.checksum(IPPROTO_TCP, &segment), 0);
        assert_eq!(
            tcp.summary(),
            "TCP 54321 > 80 [PSH+ACK] seq=1000 ack=5000"
        );
    }

    #[test]
    fn no_pseudo_header_means_zero_checksum() {
        let mut tcp = TCP::new(1, 2);
        let bytes = tcp
            .stack_and_encode(None, &EncodeInfo::default())
            .unwrap();
        assert_eq!(&bytes[16..18], &[0, 0]);
    }

    #[test]
    fn options_round_trip() {
        // MSS 1460, NOP, NOP, SACK permitted... padded to 8 bytes.
        let options = hex::decode("020405b401010402").unwrap();
        let mut tcp = TCP::new(443, 50000).options(options.clone());
        let bytes = tcp.stack_and_encode(None, &loopback()).unwrap();
        assert_eq!(bytes[12] >> 4, 7);

        let mut decoded = TCP::default();
        let (_, consumed) = decoded.decode_bytes(&bytes).unwrap();
        assert_eq!(consumed, 28);
        assert_eq!(decoded.options, options);
        let declared: usize = decoded.fields().iter().map(|f| f.len).sum();
        assert_eq!(declared, 28);
    }

    #[test]
    fn unaligned_options_are_rejected() {
        let mut tcp = TCP::new(1, 2).options(vec![1, 1, 1]);
        assert!(tcp
            .stack_and_encode(None, &EncodeInfo::default())
            .is_err());
    }

    #[test]
    fn short_and_bad_offset() {
        let mut tcp = TCP::default();
        assert!(matches!(
            tcp.decode_bytes(&[0_u8; 10]),
            Err(Error::TooShort { required: 20, .. })
        ));

        let mut bytes = [0_u8; 20];
        bytes[12] = 0x40;
        assert!(matches!(tcp.decode_bytes(&bytes), Err(Error::ParseError(_))));
    }
}
