//! Handling of DNS layer

use core::fmt;
use core::str::FromStr;

use serde::{Serialize, Serializer};

use crate::errors::Error;
use crate::field::{FieldFormat, FieldSpec};
use crate::layer::{EncodeInfo, Layer};
use crate::layers::udp;
use crate::types::IPv4Address;

/// DNS header length
pub const DNS_HEADER_LENGTH: usize = 12_usize;

pub const DNS_TYPE_A: u16 = 1;
pub const DNS_TYPE_NS: u16 = 2;
pub const DNS_TYPE_CNAME: u16 = 5;
pub const DNS_TYPE_PTR: u16 = 12;
pub const DNS_TYPE_MX: u16 = 15;

pub const DNS_CLASS_IN: u16 = 1;

// Compression pointers followed for a single name before giving up on a loop.
const MAX_NAME_POINTERS: usize = 16;

static DNS_TYPE_NAMES: &[(u64, &str)] = &[
    (1, "A"),
    (2, "NS"),
    (5, "CNAME"),
    (6, "SOA"),
    (12, "PTR"),
    (15, "MX"),
    (16, "TXT"),
    (28, "AAAA"),
    (33, "SRV"),
    (41, "OPT"),
    (255, "ANY"),
];

static DNS_CLASS_NAMES: &[(u64, &str)] = &[(1, "IN"), (3, "CH"), (255, "ANY")];

static DNS_RCODE_NAMES: [&str; 6] = ["NOERROR", "FORMERR", "SERVFAIL", "NXDOMAIN", "NOTIMP", "REFUSED"];

// Register ourselves with parent
pub(crate) fn register_defaults() -> Result<(), Error> {
    udp::register_app(53, DNS::creator)
}

/// A domain name, kept as uncompressed length-prefixed labels ending with the root label.
#[derive(Clone, Default)]
pub struct DNSName {
    labels: Vec<u8>,
    // Bytes the name occupied where it was decoded, less than `labels` when compressed.
    wire_len: Option<usize>,
}

impl DNSName {
    /// Length when encoded without compression.
    pub fn encoded_len(&self) -> usize {
        self.labels.len()
    }

    fn wire_len(&self) -> usize {
        self.wire_len.unwrap_or(self.labels.len())
    }
}

// Equal names are equal however they were compressed on the wire.
impl PartialEq for DNSName {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}

impl Eq for DNSName {}

impl FromStr for DNSName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut labels = Vec::with_capacity(s.len() + 2);
        for label in s.trim_end_matches('.').split('.').filter(|l| !l.is_empty()) {
            if label.len() > 63 {
                return Err(Error::ParseError(format!("DNS label too long: {}", label)));
            }
            labels.push(label.len() as u8);
            labels.extend(label.as_bytes());
        }
        labels.push(0);
        if labels.len() > 255 {
            return Err(Error::ParseError(format!("DNS name too long: {}", s)));
        }
        Ok(Self {
            labels,
            wire_len: None,
        })
    }
}

impl fmt::Display for DNSName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.labels.len() <= 1 {
            return write!(f, ".");
        }
        let mut i = 0_usize;
        while i < self.labels.len() {
            let x = self.labels[i] as usize;
            if x == 0 {
                break;
            }
            let end = (i + 1 + x).min(self.labels.len());
            write!(f, "{}.", String::from_utf8_lossy(&self.labels[i + 1..end]))?;
            i = end;
        }
        Ok(())
    }
}

impl fmt::Debug for DNSName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for DNSName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(format!("{}", self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DNSRecordData {
    A(IPv4Address),
    /// NS, CNAME and PTR all carry a single name.
    Name(DNSName),
    MX {
        preference: u16,
        exchange: DNSName,
    },
    Other(#[serde(serialize_with = "hex::serde::serialize")] Vec<u8>),
}

impl DNSRecordData {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            DNSRecordData::A(addr) => addr.as_slice().to_vec(),
            DNSRecordData::Name(name) => name.labels.clone(),
            DNSRecordData::MX {
                preference,
                exchange,
            } => {
                let mut out = preference.to_be_bytes().to_vec();
                out.extend(&exchange.labels);
                out
            }
            DNSRecordData::Other(data) => data.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DNSQRecord {
    name: DNSName,
    #[serde(rename = "type")]
    type_: u16,
    class: u16,
}

impl DNSQRecord {
    pub fn new(name: &str, type_: u16) -> Result<Self, Error> {
        Ok(Self {
            name: name.parse()?,
            type_,
            class: DNS_CLASS_IN,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DNSResRecord {
    name: DNSName,
    #[serde(rename = "type")]
    type_: u16,
    class: u16,
    ttl: u32,
    rdlength: Option<u16>,
    rdata: DNSRecordData,
}

impl DNSResRecord {
    /// An `IN A` record.
    pub fn a(name: &str, ttl: u32, addr: IPv4Address) -> Result<Self, Error> {
        Ok(Self {
            name: name.parse()?,
            type_: DNS_TYPE_A,
            class: DNS_CLASS_IN,
            ttl,
            rdlength: None,
            rdata: DNSRecordData::A(addr),
        })
    }

    /// An `IN` record of a type carrying a single name (NS, CNAME, PTR).
    pub fn with_name(name: &str, type_: u16, ttl: u32, target: &str) -> Result<Self, Error> {
        Ok(Self {
            name: name.parse()?,
            type_,
            class: DNS_CLASS_IN,
            ttl,
            rdlength: None,
            rdata: DNSRecordData::Name(target.parse()?),
        })
    }

    pub fn rdata(&self) -> &DNSRecordData {
        &self.rdata
    }

    fn rdata_len(&self) -> usize {
        match self.rdlength {
            Some(len) => len as usize,
            None => self.rdata.to_bytes().len(),
        }
    }
}

/// Structure representing a DNS message.
///
/// Names are decoded through compression pointers but always encoded in full; the counts follow
/// the record lists unless set.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DNS {
    #[serde(serialize_with = "crate::types::hex::serialize_upper_hex_u16")]
    id: u16,
    qr: bool,
    opcode: u8,
    aa: bool,
    tc: bool,
    rd: bool,
    ra: bool,
    z: u8,
    rcode: u8,
    qdcount: Option<u16>,
    ancount: Option<u16>,
    nscount: Option<u16>,
    arcount: Option<u16>,
    questions: Vec<DNSQRecord>,
    answers: Vec<DNSResRecord>,
    nameservers: Vec<DNSResRecord>,
    additional: Vec<DNSResRecord>,
}

fn too_short(required: usize, bytes: &[u8]) -> Error {
    Error::TooShort {
        required,
        available: bytes.len(),
        data: hex::encode(bytes),
    }
}

fn be_u16(bytes: &[u8], at: usize) -> u16 {
    (bytes[at] as u16) << 8 | (bytes[at + 1] as u16)
}

impl DNS {
    pub fn creator() -> Box<dyn Layer + Send> {
        Box::new(DNS::default())
    }

    pub fn new(id: u16) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// A standard query for `name` with recursion desired.
    pub fn query(id: u16, name: &str, qtype: u16) -> Result<Self, Error> {
        Ok(Self::new(id)
            .recursion_desired(true)
            .question(DNSQRecord::new(name, qtype)?))
    }

    pub fn recursion_desired(mut self, rd: bool) -> Self {
        self.rd = rd;
        self
    }

    /// Mark the message as a response with recursion available.
    pub fn response(mut self, rcode: u8) -> Self {
        self.qr = true;
        self.ra = true;
        self.rcode = rcode & 0x0f;
        self
    }

    pub fn question(mut self, question: DNSQRecord) -> Self {
        self.questions.push(question);
        self
    }

    pub fn answer(mut self, answer: DNSResRecord) -> Self {
        self.answers.push(answer);
        self
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn is_response(&self) -> bool {
        self.qr
    }

    pub fn questions(&self) -> &[DNSQRecord] {
        &self.questions
    }

    pub fn answers(&self) -> &[DNSResRecord] {
        &self.answers
    }

    fn flags(&self) -> u16 {
        (self.qr as u16) << 15
            | ((self.opcode & 0x0f) as u16) << 11
            | (self.aa as u16) << 10
            | (self.tc as u16) << 9
            | (self.rd as u16) << 8
            | (self.ra as u16) << 7
            | ((self.z & 0x07) as u16) << 4
            | (self.rcode & 0x0f) as u16
    }

    // A Name needs to be dissected by looking at previous occurence of a name
    // See https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.4
    //
    // `msg` is the whole DNS message, pointers are offsets into it. Returns the name and the
    // bytes it takes at `start`.
    fn dns_name_from_bytes(msg: &[u8], start: usize) -> Result<(DNSName, usize), Error> {
        // Note: 24 seems to be the 'sweetest' spot in terms of reserved capacity.
        let mut labels = Vec::with_capacity(24);
        let mut consumed = None;
        let mut pointers = 0;
        let mut i = start;

        loop {
            let len = *msg.get(i).ok_or_else(|| too_short(i + 1, msg))?;
            match len & 0xC0 {
                0xC0 => {
                    let low = *msg.get(i + 1).ok_or_else(|| too_short(i + 2, msg))?;
                    if consumed.is_none() {
                        consumed = Some(i + 2 - start);
                    }
                    pointers += 1;
                    if pointers > MAX_NAME_POINTERS {
                        return Err(Error::ParseError(format!(
                            "DNS name at {} has a compression loop",
                            start
                        )));
                    }
                    i = ((len & 0x3f) as usize) << 8 | low as usize;
                }
                0x00 => {
                    if len == 0 {
                        labels.push(0);
                        if consumed.is_none() {
                            consumed = Some(i + 1 - start);
                        }
                        break;
                    }
                    let end = i + 1 + len as usize;
                    if end > msg.len() {
                        return Err(too_short(end, msg));
                    }
                    labels.extend_from_slice(&msg[i..end]);
                    if labels.len() > 255 {
                        return Err(Error::ParseError(format!(
                            "DNS name at {} is longer than 255 bytes",
                            start
                        )));
                    }
                    i = end;
                }
                _ => {
                    return Err(Error::ParseError(format!(
                        "DNS label type 0x{:02X} at {}",
                        len & 0xC0,
                        i
                    )));
                }
            }
        }

        let consumed = consumed.unwrap_or(labels.len());
        Ok((
            DNSName {
                labels,
                wire_len: Some(consumed),
            },
            consumed,
        ))
    }

    fn dns_resrecord_from_bytes(msg: &[u8], start: usize) -> Result<(DNSResRecord, usize), Error> {
        let (name, consumed) = Self::dns_name_from_bytes(msg, start)?;
        let offset = start + consumed;

        if msg.len() < offset + 10 {
            return Err(too_short(offset + 10, msg));
        }

        let type_ = be_u16(msg, offset);
        let class = be_u16(msg, offset + 2);
        let ttl = u32::from_be_bytes([
            msg[offset + 4],
            msg[offset + 5],
            msg[offset + 6],
            msg[offset + 7],
        ]);
        let rdlength = be_u16(msg, offset + 8);
        let rdata_start = offset + 10;
        let rdata_end = rdata_start + rdlength as usize;
        if msg.len() < rdata_end {
            return Err(too_short(rdata_end, msg));
        }
        let rdata_buffer = &msg[rdata_start..rdata_end];

        let rdata = match type_ {
            DNS_TYPE_A if rdata_buffer.len() == 4 => DNSRecordData::A(rdata_buffer.try_into()?),
            DNS_TYPE_NS | DNS_TYPE_CNAME | DNS_TYPE_PTR => {
                let (name, _) = Self::dns_name_from_bytes(msg, rdata_start)?;
                DNSRecordData::Name(name)
            }
            DNS_TYPE_MX if rdata_buffer.len() > 2 => {
                let (exchange, _) = Self::dns_name_from_bytes(msg, rdata_start + 2)?;
                DNSRecordData::MX {
                    preference: be_u16(msg, rdata_start),
                    exchange,
                }
            }
            _ => DNSRecordData::Other(rdata_buffer.into()),
        };

        Ok((
            DNSResRecord {
                name,
                type_,
                class,
                ttl,
                rdlength: Some(rdlength),
                rdata,
            },
            rdata_end - start,
        ))
    }

    fn records_from_bytes(
        msg: &[u8],
        mut offset: usize,
        count: u16,
        out: &mut Vec<DNSResRecord>,
    ) -> Result<usize, Error> {
        for _ in 0..count {
            let (record, consumed) = Self::dns_resrecord_from_bytes(msg, offset)?;
            offset += consumed;
            out.push(record);
        }
        Ok(offset)
    }

    fn record_fields(fields: &mut Vec<FieldSpec>, section: &str, records: &[DNSResRecord]) {
        for (n, rr) in records.iter().enumerate() {
            let prefix = format!("{}[{}]", section, n);
            let rdata_format = match rr.rdata {
                DNSRecordData::A(_) => FieldFormat::Ipv4,
                DNSRecordData::Name(_) => FieldFormat::Custom(render_dns_name),
                _ => FieldFormat::Bytes,
            };
            fields.extend([
                FieldSpec::new(
                    format!("{}.rrname", prefix),
                    rr.name.wire_len(),
                    FieldFormat::Custom(render_dns_name),
                ),
                FieldSpec::new(
                    format!("{}.type", prefix),
                    2,
                    FieldFormat::DecNamed(DNS_TYPE_NAMES),
                ),
                FieldSpec::new(
                    format!("{}.rclass", prefix),
                    2,
                    FieldFormat::DecNamed(DNS_CLASS_NAMES),
                ),
                FieldSpec::new(format!("{}.ttl", prefix), 4, FieldFormat::Dec),
                FieldSpec::new(format!("{}.rdlen", prefix), 2, FieldFormat::Dec),
                FieldSpec::new(format!("{}.rdata", prefix), rr.rdata_len(), rdata_format),
            ]);
        }
    }
}

/// Render a name as it sits in a field: labels up to the root, or up to a compression pointer.
fn render_dns_name(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        let len = bytes[i] as usize;
        if len & 0xC0 == 0xC0 {
            let target = match bytes.get(i + 1) {
                Some(low) => ((len & 0x3f) << 8) | *low as usize,
                None => len & 0x3f,
            };
            out.push_str(&format!("(name at offset {})", target));
            return out;
        }
        if len == 0 {
            break;
        }
        let end = (i + 1 + len).min(bytes.len());
        out.push_str(&String::from_utf8_lossy(&bytes[i + 1..end]));
        out.push('.');
        i = end;
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}

fn render_dns_flags(bytes: &[u8]) -> String {
    if bytes.len() != 2 {
        return crate::types::hex::upper_spaced(bytes);
    }
    let v = be_u16(bytes, 0);
    let mut parts = vec![if v & 0x8000 != 0 { "response" } else { "query" }.to_string()];
    let opcode = (v >> 11) & 0x0f;
    if opcode != 0 {
        parts.push(format!("opcode {}", opcode));
    }
    for (bit, name) in [(0x0400, "AA"), (0x0200, "TC"), (0x0100, "RD"), (0x0080, "RA")] {
        if v & bit != 0 {
            parts.push(name.to_string());
        }
    }
    let rcode = (v & 0x0f) as usize;
    if v & 0x8000 != 0 || rcode != 0 {
        match DNS_RCODE_NAMES.get(rcode) {
            Some(name) => parts.push(name.to_string()),
            None => parts.push(format!("rcode {}", rcode)),
        }
    }
    format!("0x{:04X} ({})", v, parts.join(", "))
}

impl Layer for DNS {
    fn decode_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(Option<Box<dyn Layer + Send>>, usize), Error> {
        if bytes.len() < DNS_HEADER_LENGTH {
            return Err(too_short(DNS_HEADER_LENGTH, bytes));
        }

        self.id = be_u16(bytes, 0);

        let first = bytes[2];
        self.qr = (first & 0x80) != 0x00;
        self.opcode = (first & 0x78) >> 3;
        self.aa = (first & 0x04) != 0x00;
        self.tc = (first & 0x02) != 0x00;
        self.rd = (first & 0x01) != 0x00;

        let second = bytes[3];
        self.ra = (second & 0x80) != 0x00;
        self.z = (second & 0x70) >> 4;
        self.rcode = second & 0x0f;

        let qdcount = be_u16(bytes, 4);
        let ancount = be_u16(bytes, 6);
        let nscount = be_u16(bytes, 8);
        let arcount = be_u16(bytes, 10);
        self.qdcount = Some(qdcount);
        self.ancount = Some(ancount);
        self.nscount = Some(nscount);
        self.arcount = Some(arcount);

        let mut offset = DNS_HEADER_LENGTH;
        for _ in 0..qdcount {
            let (name, consumed) = Self::dns_name_from_bytes(bytes, offset)?;
            offset += consumed;
            if bytes.len() < offset + 4 {
                return Err(too_short(offset + 4, bytes));
            }
            let type_ = be_u16(bytes, offset);
            let class = be_u16(bytes, offset + 2);
            offset += 4;
            self.questions.push(DNSQRecord { name, type_, class });
        }

        offset = Self::records_from_bytes(bytes, offset, ancount, &mut self.answers)?;
        offset = Self::records_from_bytes(bytes, offset, nscount, &mut self.nameservers)?;
        offset = Self::records_from_bytes(bytes, offset, arcount, &mut self.additional)?;

        log_debug!(
            "DNS 0x{:04X}: {} questions, {} answers",
            self.id,
            qdcount,
            ancount
        );

        Ok((None, offset))
    }

    fn stack_and_encode(
        &mut self,
        next_layer: Option<&[u8]>,
        _info: &EncodeInfo<'_>,
    ) -> Result<Vec<u8>, Error> {
        let count = |explicit: Option<u16>, len: usize| -> Result<u16, Error> {
            match explicit {
                Some(count) => Ok(count),
                None => u16::try_from(len)
                    .map_err(|_| Error::SculptingError(format!("{} DNS records", len))),
            }
        };
        let qdcount = count(self.qdcount, self.questions.len())?;
        let ancount = count(self.ancount, self.answers.len())?;
        let nscount = count(self.nscount, self.nameservers.len())?;
        let arcount = count(self.arcount, self.additional.len())?;

        let mut result = Vec::with_capacity(512);
        result.extend(self.id.to_be_bytes());
        result.extend(self.flags().to_be_bytes());
        result.extend(qdcount.to_be_bytes());
        result.extend(ancount.to_be_bytes());
        result.extend(nscount.to_be_bytes());
        result.extend(arcount.to_be_bytes());

        for q in self.questions.iter_mut() {
            result.extend(&q.name.labels);
            result.extend(q.type_.to_be_bytes());
            result.extend(q.class.to_be_bytes());
            q.name.wire_len = None;
        }

        for rr in self
            .answers
            .iter_mut()
            .chain(self.nameservers.iter_mut())
            .chain(self.additional.iter_mut())
        {
            let rdata = rr.rdata.to_bytes();
            let rdlength = u16::try_from(rdata.len()).map_err(|_| {
                Error::SculptingError(format!("DNS record data of {} bytes", rdata.len()))
            })?;
            result.extend(&rr.name.labels);
            result.extend(rr.type_.to_be_bytes());
            result.extend(rr.class.to_be_bytes());
            result.extend(rr.ttl.to_be_bytes());
            result.extend(rdlength.to_be_bytes());
            result.extend(rdata);
            rr.name.wire_len = None;
            rr.rdlength = Some(rdlength);
        }

        self.qdcount = Some(qdcount);
        self.ancount = Some(ancount);
        self.nscount = Some(nscount);
        self.arcount = Some(arcount);

        result.extend(next_layer.unwrap_or_default());
        Ok(result)
    }

    fn fields(&self) -> Vec<FieldSpec> {
        let mut fields = vec![
            FieldSpec::new("id", 2, FieldFormat::DecHex),
            FieldSpec::new("flags", 2, FieldFormat::Custom(render_dns_flags)),
            FieldSpec::new("qdcount", 2, FieldFormat::Dec),
            FieldSpec::new("ancount", 2, FieldFormat::Dec),
            FieldSpec::new("nscount", 2, FieldFormat::Dec),
            FieldSpec::new("arcount", 2, FieldFormat::Dec),
        ];
        for (n, q) in self.questions.iter().enumerate() {
            fields.extend([
                FieldSpec::new(
                    format!("qd[{}].qname", n),
                    q.name.wire_len(),
                    FieldFormat::Custom(render_dns_name),
                ),
                FieldSpec::new(
                    format!("qd[{}].qtype", n),
                    2,
                    FieldFormat::DecNamed(DNS_TYPE_NAMES),
                ),
                FieldSpec::new(
                    format!("qd[{}].qclass", n),
                    2,
                    FieldFormat::DecNamed(DNS_CLASS_NAMES),
                ),
            ]);
        }
        Self::record_fields(&mut fields, "an", &self.answers);
        Self::record_fields(&mut fields, "ns", &self.nameservers);
        Self::record_fields(&mut fields, "ar", &self.additional);
        fields
    }

    fn name(&self) -> &'static str {
        "DNS"
    }

    fn short_name(&self) -> &'static str {
        "dns"
    }

    fn summary(&self) -> String {
        let kind = if self.qr { "response" } else { "query" };
        match self.questions.first() {
            Some(q) => {
                let qtype = DNS_TYPE_NAMES
                    .iter()
                    .find(|(t, _)| *t == q.type_ as u64)
                    .map(|(_, name)| name.to_string())
                    .unwrap_or_else(|| format!("type {}", q.type_));
                format!("DNS {} 0x{:04X} {} {}", kind, self.id, qtype, q.name)
            }
            None => format!("DNS {} 0x{:04X}", kind, self.id),
        }
    }
}
