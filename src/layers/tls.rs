//! TLS record layer
//!
//! Only the framing is handled: a record header followed either by a ClientHello, which is
//! decoded field by field, or by opaque fragment bytes. Nothing is encrypted or decrypted.

use serde::Serialize;

use crate::errors::Error;
use crate::field::{FieldFormat, FieldSpec};
use crate::layer::{EncodeInfo, Layer};
use crate::layers::tcp;

/// TLS record header length
pub const TLS_RECORD_HEADER_LENGTH: usize = 5_usize;

pub const TLS_CONTENT_CHANGE_CIPHER_SPEC: u8 = 20_u8;
pub const TLS_CONTENT_ALERT: u8 = 21_u8;
pub const TLS_CONTENT_HANDSHAKE: u8 = 22_u8;
pub const TLS_CONTENT_APPLICATION_DATA: u8 = 23_u8;

pub const TLS_HANDSHAKE_CLIENT_HELLO: u8 = 1_u8;

pub const TLS_VERSION_1_0: u16 = 0x0301_u16;
pub const TLS_VERSION_1_2: u16 = 0x0303_u16;

pub const TLS_EXT_SERVER_NAME: u16 = 0_u16;

static TLS_CONTENT_TYPE_NAMES: &[(u64, &str)] = &[
    (20, "change_cipher_spec"),
    (21, "alert"),
    (22, "handshake"),
    (23, "application_data"),
];

static TLS_VERSION_NAMES: &[(u64, &str)] = &[
    (0x0300, "SSL 3.0"),
    (0x0301, "TLS 1.0"),
    (0x0302, "TLS 1.1"),
    (0x0303, "TLS 1.2"),
    (0x0304, "TLS 1.3"),
];

static TLS_HANDSHAKE_NAMES: &[(u64, &str)] = &[
    (1, "client_hello"),
    (2, "server_hello"),
    (11, "certificate"),
    (16, "client_key_exchange"),
    (20, "finished"),
];

static TLS_EXTENSION_NAMES: &[(u64, &str)] = &[
    (0, "server_name"),
    (10, "supported_groups"),
    (13, "signature_algorithms"),
    (16, "application_layer_protocol_negotiation"),
    (43, "supported_versions"),
    (51, "key_share"),
];

static TLS_CIPHER_SUITE_NAMES: &[(u16, &str)] = &[
    (0x002F, "TLS_RSA_WITH_AES_128_CBC_SHA"),
    (0x009E, "TLS_DHE_RSA_WITH_AES_128_GCM_SHA256"),
    (0x1301, "TLS_AES_128_GCM_SHA256"),
    (0x1302, "TLS_AES_256_GCM_SHA384"),
    (0x1303, "TLS_CHACHA20_POLY1305_SHA256"),
    (0xC02B, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256"),
    (0xC02F, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"),
    (0xC030, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384"),
];

// Register ourselves with parent
pub(crate) fn register_defaults() -> Result<(), Error> {
    tcp::register_app(443, TLS::creator)
}

/// IANA name of a cipher suite, for the ones the crate knows about.
pub fn cipher_suite_name(suite: u16) -> Option<&'static str> {
    TLS_CIPHER_SUITE_NAMES
        .iter()
        .find(|(s, _)| *s == suite)
        .map(|(_, name)| *name)
}

fn render_cipher_suites(bytes: &[u8]) -> String {
    let suites = bytes
        .chunks(2)
        .map(|c| crate::types::hex::upper_prefixed(crate::field::be_uint(c), c.len()))
        .collect::<Vec<_>>();
    format!("[{}]", suites.join(", "))
}

// `server_name` extension data: list length, then (type, length, name) entries.
fn render_server_name(bytes: &[u8]) -> String {
    let mut names = vec![];
    let mut i = 2;
    while i + 3 <= bytes.len() {
        let len = (bytes[i + 1] as usize) << 8 | bytes[i + 2] as usize;
        let end = i + 3 + len;
        if end > bytes.len() {
            break;
        }
        names.push(crate::field::escape_text(&bytes[i + 3..end]));
        i = end;
    }
    if names.is_empty() {
        crate::types::hex::upper_spaced(bytes)
    } else {
        names.join(", ")
    }
}

// First `host_name` (type 0) entry of `server_name` extension data.
fn first_host_name(bytes: &[u8]) -> Option<String> {
    let list_len = (*bytes.first()? as usize) << 8 | *bytes.get(1)? as usize;
    let list = bytes.get(2..2 + list_len)?;
    let mut i = 0;
    while i + 3 <= list.len() {
        let len = (list[i + 1] as usize) << 8 | list[i + 2] as usize;
        let name = list.get(i + 3..i + 3 + len)?;
        if list[i] == 0 {
            return Some(String::from_utf8_lossy(name).into_owned());
        }
        i += 3 + len;
    }
    None
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TLSExtension {
    #[serde(rename = "type")]
    ext_type: u16,
    #[serde(serialize_with = "hex::serde::serialize")]
    data: Vec<u8>,
}

impl TLSExtension {
    pub fn new(ext_type: u16, data: Vec<u8>) -> Self {
        Self { ext_type, data }
    }

    /// A `server_name` extension naming a single host.
    pub fn server_name(host: &str) -> Self {
        let name = host.as_bytes();
        let mut data = Vec::with_capacity(name.len() + 5);
        data.extend(((name.len() + 3) as u16).to_be_bytes());
        data.push(0);
        data.extend((name.len() as u16).to_be_bytes());
        data.extend(name);
        Self::new(TLS_EXT_SERVER_NAME, data)
    }

    pub fn ext_type(&self) -> u16 {
        self.ext_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A ClientHello handshake message.
///
/// `extensions` is `None` when the message carries no extensions block at all, which is valid for
/// TLS 1.2 and what a minimal hello looks like.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientHello {
    version: u16,
    #[serde(serialize_with = "hex::serde::serialize")]
    random: [u8; 32],
    #[serde(serialize_with = "hex::serde::serialize")]
    session_id: Vec<u8>,
    ciphers: Vec<u16>,
    compression_methods: Vec<u8>,
    extensions: Option<Vec<TLSExtension>>,
}

impl Default for ClientHello {
    fn default() -> Self {
        Self {
            version: TLS_VERSION_1_2,
            random: [0; 32],
            session_id: vec![],
            ciphers: vec![],
            compression_methods: vec![0],
            extensions: None,
        }
    }
}

impl ClientHello {
    pub fn new(ciphers: &[u16]) -> Self {
        Self {
            ciphers: ciphers.to_vec(),
            ..Default::default()
        }
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn random(mut self, random: [u8; 32]) -> Self {
        self.random = random;
        self
    }

    pub fn session_id(mut self, session_id: Vec<u8>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn extension(mut self, extension: TLSExtension) -> Self {
        self.extensions.get_or_insert_with(Vec::new).push(extension);
        self
    }

    pub fn server_name(self, host: &str) -> Self {
        self.extension(TLSExtension::server_name(host))
    }

    pub fn ciphers(&self) -> &[u16] {
        &self.ciphers
    }

    pub fn extensions(&self) -> &[TLSExtension] {
        self.extensions.as_deref().unwrap_or_default()
    }

    /// Host named in the `server_name` extension, if any.
    pub fn sni(&self) -> Option<String> {
        self.extensions()
            .iter()
            .find(|e| e.ext_type == TLS_EXT_SERVER_NAME)
            .and_then(|e| first_host_name(&e.data))
    }

    // The handshake body, without the message type and length.
    fn body_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend(self.version.to_be_bytes());
        out.extend(self.random);
        out.push(self.session_id.len() as u8);
        out.extend(&self.session_id);
        out.extend(((self.ciphers.len() * 2) as u16).to_be_bytes());
        for cipher in &self.ciphers {
            out.extend(cipher.to_be_bytes());
        }
        out.push(self.compression_methods.len() as u8);
        out.extend(&self.compression_methods);
        if let Some(extensions) = &self.extensions {
            let total: usize = extensions.iter().map(|e| 4 + e.data.len()).sum();
            out.extend((total as u16).to_be_bytes());
            for e in extensions {
                out.extend(e.ext_type.to_be_bytes());
                out.extend((e.data.len() as u16).to_be_bytes());
                out.extend(&e.data);
            }
        }
        out
    }

    fn validate(&self) -> Result<(), Error> {
        if self.session_id.len() > 32 {
            return Err(Error::SculptingError(format!(
                "TLS session id of {} bytes",
                self.session_id.len()
            )));
        }
        if self.ciphers.is_empty() || self.ciphers.len() > 0x7fff {
            return Err(Error::SculptingError(format!(
                "ClientHello with {} cipher suites",
                self.ciphers.len()
            )));
        }
        if self.compression_methods.is_empty() || self.compression_methods.len() > 255 {
            return Err(Error::SculptingError(format!(
                "ClientHello with {} compression methods",
                self.compression_methods.len()
            )));
        }
        if self.extensions().iter().any(|e| e.data.len() > 0xffff) {
            return Err(Error::SculptingError("TLS extension too long".to_string()));
        }
        Ok(())
    }

    /// Decode a complete ClientHello handshake message, header included.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(bytes);
        let msg_type = r.u8()?;
        if msg_type != TLS_HANDSHAKE_CLIENT_HELLO {
            return Err(Error::ParseError(format!("handshake type {}", msg_type)));
        }
        let length = r.u24()?;
        if length as usize != bytes.len() - 4 {
            return Err(Error::ParseError(format!(
                "ClientHello length {} in a {} byte fragment",
                length,
                bytes.len()
            )));
        }

        let version = r.u16()?;
        let random: [u8; 32] = r.take(32)?.try_into().unwrap();
        let sid_len = r.u8()? as usize;
        let session_id = r.take(sid_len)?.to_vec();
        let cs_len = r.u16()? as usize;
        if cs_len % 2 != 0 {
            return Err(Error::ParseError(format!("cipher suites length {}", cs_len)));
        }
        let ciphers = r
            .take(cs_len)?
            .chunks(2)
            .map(|c| (c[0] as u16) << 8 | c[1] as u16)
            .collect();
        let comp_len = r.u8()? as usize;
        let compression_methods = r.take(comp_len)?.to_vec();

        let extensions = if r.remaining() == 0 {
            None
        } else {
            let ext_len = r.u16()? as usize;
            if ext_len != r.remaining() {
                return Err(Error::ParseError(format!(
                    "extensions length {} with {} bytes left",
                    ext_len,
                    r.remaining()
                )));
            }
            let mut extensions = vec![];
            while r.remaining() > 0 {
                let ext_type = r.u16()?;
                let len = r.u16()? as usize;
                extensions.push(TLSExtension::new(ext_type, r.take(len)?.to_vec()));
            }
            Some(extensions)
        };

        Ok(Self {
            version,
            random,
            session_id,
            ciphers,
            compression_methods,
            extensions,
        })
    }

    fn fields(&self, fields: &mut Vec<FieldSpec>) {
        fields.extend([
            FieldSpec::new("msgtype", 1, FieldFormat::DecNamed(TLS_HANDSHAKE_NAMES)),
            FieldSpec::new("msglen", 3, FieldFormat::Dec),
            FieldSpec::new("hello.version", 2, FieldFormat::HexNamed(TLS_VERSION_NAMES)),
            FieldSpec::new("hello.random", 32, FieldFormat::Bytes),
            FieldSpec::new("hello.sidlen", 1, FieldFormat::Dec),
        ]);
        if !self.session_id.is_empty() {
            fields.push(FieldSpec::new(
                "hello.sid",
                self.session_id.len(),
                FieldFormat::Bytes,
            ));
        }
        fields.extend([
            FieldSpec::new("hello.cipherslen", 2, FieldFormat::Dec),
            FieldSpec::new(
                "hello.ciphers",
                self.ciphers.len() * 2,
                FieldFormat::Custom(render_cipher_suites),
            ),
            FieldSpec::new("hello.complen", 1, FieldFormat::Dec),
            FieldSpec::new(
                "hello.comp",
                self.compression_methods.len(),
                FieldFormat::Bytes,
            ),
        ]);
        if let Some(extensions) = &self.extensions {
            fields.push(FieldSpec::new("hello.extlen", 2, FieldFormat::Dec));
            for (n, e) in extensions.iter().enumerate() {
                let format = if e.ext_type == TLS_EXT_SERVER_NAME {
                    FieldFormat::Custom(render_server_name)
                } else {
                    FieldFormat::Bytes
                };
                fields.extend([
                    FieldSpec::new(
                        format!("ext[{}].type", n),
                        2,
                        FieldFormat::DecNamed(TLS_EXTENSION_NAMES),
                    ),
                    FieldSpec::new(format!("ext[{}].len", n), 2, FieldFormat::Dec),
                ]);
                if !e.data.is_empty() {
                    fields.push(FieldSpec::new(
                        format!("ext[{}].data", n),
                        e.data.len(),
                        format,
                    ));
                }
            }
        }
    }
}

// Bounds checked big-endian reads over a handshake message.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n {
            return Err(Error::TooShort {
                required: self.pos + n,
                available: self.bytes.len(),
                data: hex::encode(self.bytes),
            });
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, Error> {
        let b = self.take(2)?;
        Ok((b[0] as u16) << 8 | b[1] as u16)
    }

    fn u24(&mut self) -> Result<u32, Error> {
        let b = self.take(3)?;
        Ok((b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32)
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum TLSMessage {
    ClientHello(ClientHello),
    /// Anything else: application data, alerts, encrypted or unsupported handshakes.
    Opaque(#[serde(serialize_with = "hex::serde::serialize")] Vec<u8>),
}

impl Default for TLSMessage {
    fn default() -> Self {
        TLSMessage::Opaque(vec![])
    }
}

/// Structure representing one TLS record.
#[derive(Debug, Clone, Serialize)]
pub struct TLS {
    content_type: u8,
    #[serde(serialize_with = "crate::types::hex::serialize_upper_hex_u16")]
    version: u16,
    length: Option<u16>,
    message: TLSMessage,
}

impl Default for TLS {
    fn default() -> Self {
        Self {
            content_type: TLS_CONTENT_APPLICATION_DATA,
            version: TLS_VERSION_1_2,
            length: None,
            message: TLSMessage::default(),
        }
    }
}

/// Whether `bytes` start like a TLS record header.
fn looks_like_record(bytes: &[u8]) -> bool {
    bytes.len() >= TLS_RECORD_HEADER_LENGTH
        && (TLS_CONTENT_CHANGE_CIPHER_SPEC..=TLS_CONTENT_APPLICATION_DATA).contains(&bytes[0])
        && bytes[1] == 0x03
}

impl TLS {
    pub fn creator() -> Box<dyn Layer + Send> {
        Box::<TLS>::default()
    }

    /// A handshake record carrying `hello`.
    pub fn client_hello(hello: ClientHello) -> Self {
        Self {
            content_type: TLS_CONTENT_HANDSHAKE,
            message: TLSMessage::ClientHello(hello),
            ..Default::default()
        }
    }

    /// An application data record, the already encrypted bytes as fragment.
    pub fn application_data(fragment: &[u8]) -> Self {
        Self::record(TLS_CONTENT_APPLICATION_DATA, fragment)
    }

    pub fn record(content_type: u8, fragment: &[u8]) -> Self {
        Self {
            content_type,
            message: TLSMessage::Opaque(fragment.to_vec()),
            ..Default::default()
        }
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn length(mut self, length: u16) -> Self {
        self.length = Some(length);
        self
    }

    pub fn content_type(&self) -> u8 {
        self.content_type
    }

    pub fn record_version(&self) -> u16 {
        self.version
    }

    pub fn record_len(&self) -> Option<u16> {
        self.length
    }

    pub fn hello(&self) -> Option<&ClientHello> {
        match &self.message {
            TLSMessage::ClientHello(hello) => Some(hello),
            TLSMessage::Opaque(_) => None,
        }
    }

    fn fragment_bytes(&self) -> Result<Vec<u8>, Error> {
        match &self.message {
            TLSMessage::ClientHello(hello) => {
                hello.validate()?;
                let body = hello.body_bytes();
                let mut out = Vec::with_capacity(body.len() + 4);
                out.push(TLS_HANDSHAKE_CLIENT_HELLO);
                out.extend(&(body.len() as u32).to_be_bytes()[1..]);
                out.extend(body);
                Ok(out)
            }
            TLSMessage::Opaque(fragment) => Ok(fragment.clone()),
        }
    }
}

impl Layer for TLS {
    fn decode_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(Option<Box<dyn Layer + Send>>, usize), Error> {
        if !looks_like_record(bytes) {
            log_debug!("not a TLS record: {}", hex::encode(&bytes[..bytes.len().min(5)]));
            return Ok((None, 0));
        }

        self.content_type = bytes[0];
        self.version = (bytes[1] as u16) << 8 | bytes[2] as u16;
        let length = (bytes[3] as u16) << 8 | bytes[4] as u16;
        let end = TLS_RECORD_HEADER_LENGTH + length as usize;
        if end > bytes.len() {
            // Continues in a later segment, leave it undecoded.
            log_debug!("TLS record of {} bytes, {} available", length, bytes.len());
            return Ok((None, 0));
        }
        self.length = Some(length);

        let fragment = &bytes[TLS_RECORD_HEADER_LENGTH..end];
        self.message = if self.content_type == TLS_CONTENT_HANDSHAKE
            && fragment.first() == Some(&TLS_HANDSHAKE_CLIENT_HELLO)
        {
            match ClientHello::from_bytes(fragment) {
                Ok(hello) => TLSMessage::ClientHello(hello),
                Err(_e) => {
                    log_debug!("handshake kept opaque: {}", _e);
                    TLSMessage::Opaque(fragment.to_vec())
                }
            }
        } else {
            TLSMessage::Opaque(fragment.to_vec())
        };

        if looks_like_record(&bytes[end..]) {
            Ok((Some(TLS::creator()), end))
        } else {
            Ok((None, end))
        }
    }

    fn stack_and_encode(
        &mut self,
        next_layer: Option<&[u8]>,
        _info: &EncodeInfo<'_>,
    ) -> Result<Vec<u8>, Error> {
        let fragment = self.fragment_bytes()?;
        let length = match self.length {
            Some(length) => length,
            None => u16::try_from(fragment.len()).map_err(|_| {
                Error::SculptingError(format!("TLS fragment of {} bytes", fragment.len()))
            })?,
        };

        let payload = next_layer.unwrap_or_default();
        let mut result =
            Vec::with_capacity(TLS_RECORD_HEADER_LENGTH + fragment.len() + payload.len());
        result.push(self.content_type);
        result.extend(self.version.to_be_bytes());
        result.extend(length.to_be_bytes());
        result.extend(fragment);
        result.extend(payload);

        self.length = Some(length);

        Ok(result)
    }

    fn fields(&self) -> Vec<FieldSpec> {
        let mut fields = vec![
            FieldSpec::new("type", 1, FieldFormat::DecNamed(TLS_CONTENT_TYPE_NAMES)),
            FieldSpec::new("version", 2, FieldFormat::HexNamed(TLS_VERSION_NAMES)),
            FieldSpec::new("len", 2, FieldFormat::Dec),
        ];
        match &self.message {
            TLSMessage::ClientHello(hello) => hello.fields(&mut fields),
            TLSMessage::Opaque(fragment) if !fragment.is_empty() => {
                fields.push(FieldSpec::new("fragment", fragment.len(), FieldFormat::Bytes));
            }
            TLSMessage::Opaque(_) => {}
        }
        fields
    }

    fn name(&self) -> &'static str {
        "TLS"
    }

    fn short_name(&self) -> &'static str {
        "tls"
    }

    fn summary(&self) -> String {
        match &self.message {
            TLSMessage::ClientHello(hello) => match hello.sni() {
                Some(sni) => format!(
                    "TLS ClientHello {} cipher suites, SNI {}",
                    hello.ciphers.len(),
                    sni
                ),
                None => format!("TLS ClientHello {} cipher suites", hello.ciphers.len()),
            },
            TLSMessage::Opaque(fragment) => {
                let kind = TLS_CONTENT_TYPE_NAMES
                    .iter()
                    .find(|(t, _)| *t == self.content_type as u64)
                    .map(|(_, name)| name.to_string())
                    .unwrap_or_else(|| format!("type {}", self.content_type));
                format!("TLS {} {} bytes", kind, fragment.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCRYPTED: &str = "d47f3a91c8256f4eb211839d472c6a158f9a2d73116c849f3d4a715e88b32109\
                             6d4f827a931c5f68a40f972b441d8973f58c613e2994b76f11c5823a67941f28";

    #[test]
    fn application_data_record() {
        let fragment = hex::decode(ENCRYPTED).unwrap();
        let mut tls = TLS::application_data(&fragment);
        let bytes = tls
            .stack_and_encode(None, &EncodeInfo::default())
            .unwrap();
        assert_eq!(&bytes[..5], &[0x17, 0x03, 0x03, 0x00, 0x40]);
        assert_eq!(bytes.len(), 69);
        assert_eq!(tls.summary(), "TLS application_data 64 bytes");

        let declared: usize = tls.fields().iter().map(|f| f.len).sum();
        assert_eq!(declared, 69);
    }

    #[test]
    fn minimal_client_hello() {
        let hello = ClientHello::new(&[0xC02F, 0xC030, 0x009E]);
        let mut tls = TLS::client_hello(hello);
        let bytes = tls
            .stack_and_encode(None, &EncodeInfo::default())
            .unwrap();

        // 2 + 32 + 1 + (2 + 6) + (1 + 1) body bytes behind a 4 byte handshake header.
        assert_eq!(bytes.len(), 5 + 4 + 45);
        assert_eq!(&bytes[..5], &[0x16, 0x03, 0x03, 0x00, 49]);
        assert_eq!(&bytes[5..9], &[0x01, 0x00, 0x00, 45]);
        assert_eq!(&bytes[9..11], &[0x03, 0x03]);
        assert_eq!(&bytes[44..52], &[0x00, 0x06, 0xC0, 0x2F, 0xC0, 0x30, 0x00, 0x9E]);
        assert_eq!(&bytes[52..], &[0x01, 0x00]);

        let declared: usize = tls.fields().iter().map(|f| f.len).sum();
        assert_eq!(declared, bytes.len());
    }

    #[test]
    fn client_hello_with_sni_decodes() {
        let hello = ClientHello::new(&[0x1301, 0xC02F])
            .session_id(vec![0xAA; 32])
            .server_name("example.com");
        let mut tls = TLS::client_hello(hello.clone());
        let bytes = tls
            .stack_and_encode(None, &EncodeInfo::default())
            .unwrap();

        let mut decoded = TLS::default();
        let (next, consumed) = decoded.decode_bytes(&bytes).unwrap();
        assert!(next.is_none());
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.hello(), Some(&hello));
        assert_eq!(decoded.hello().and_then(|h| h.sni()).as_deref(), Some("example.com"));
        assert_eq!(
            decoded.summary(),
            "TLS ClientHello 2 cipher suites, SNI example.com"
        );
    }

    #[test]
    fn malformed_server_name_has_no_sni() {
        let hello = ClientHello::new(&[0xC02F])
            .extension(TLSExtension::new(TLS_EXT_SERVER_NAME, vec![0x00, 0x0e, 0x00, 0x00]));
        assert_eq!(hello.sni(), None);

        let hello = ClientHello::new(&[0xC02F]).server_name("a.example");
        assert_eq!(hello.sni().as_deref(), Some("a.example"));
        assert_eq!(
            render_server_name(&TLSExtension::server_name("a.example").data),
            "\"a.example\""
        );
    }

    #[test]
    fn consecutive_records_chain() {
        let mut bytes = hex::decode("140303000101").unwrap();
        bytes.extend(hex::decode("1703030002abcd").unwrap());

        let mut first = TLS::default();
        let (next, consumed) = first.decode_bytes(&bytes).unwrap();
        assert_eq!(consumed, 6);
        let mut second = next.unwrap();
        let (next, consumed) = second.decode_bytes(&bytes[6..]).unwrap();
        assert!(next.is_none());
        assert_eq!(consumed, 7);
        assert_eq!(second.summary(), "TLS application_data 2 bytes");
    }

    #[test]
    fn plaintext_is_not_tls() {
        let mut tls = TLS::default();
        let (next, consumed) = tls.decode_bytes(b"GET / HTTP/1.1\r\n").unwrap();
        assert!(next.is_none());
        assert_eq!(consumed, 0);
    }

    #[test]
    fn truncated_record_is_left_alone() {
        let mut tls = TLS::default();
        let (next, consumed) = tls.decode_bytes(&[0x17, 0x03, 0x03, 0x00, 0x40, 0xd4]).unwrap();
        assert!(next.is_none());
        assert_eq!(consumed, 0);
    }

    #[test]
    fn cipher_suite_names() {
        assert_eq!(
            cipher_suite_name(0xC02F),
            Some("TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256")
        );
        assert_eq!(cipher_suite_name(0xFFFF), None);
        assert_eq!(render_cipher_suites(&[0xC0, 0x2F, 0x00, 0x9E]), "[0xC02F, 0x009E]");
    }
}
