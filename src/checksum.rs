//! Internet checksum (RFC 1071) and the IPv4 pseudo-header used by TCP and UDP.

use serde::Serialize;

use crate::types::IPv4Address;

/// One's complement of the one's complement sum of 16 bit words. A trailing odd byte is padded
/// with zero.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u32) << 8;
    }

    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}

/// A buffer carrying its own checksum sums to zero.
pub fn verify_checksum(data: &[u8]) -> bool {
    internet_checksum(data) == 0
}

/// Addresses the transport checksum borrows from the IPv4 header below it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PseudoHeader {
    pub src: IPv4Address,
    pub dst: IPv4Address,
}

impl PseudoHeader {
    /// Checksum of `segment` (transport header + payload) prefixed by the pseudo-header.
    pub fn checksum(&self, protocol: u8, segment: &[u8]) -> u16 {
        let mut data = Vec::with_capacity(12 + segment.len());

        data.extend(self.src.as_slice());
        data.extend(self.dst.as_slice());
        data.push(0);
        data.push(protocol);
        data.extend((segment.len() as u16).to_be_bytes());
        data.extend(segment);

        internet_checksum(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_header_known_checksum() {
        let header =
            hex::decode("450000730000400040110000c0a80001c0a800c7").unwrap();
        assert_eq!(internet_checksum(&header), 0xb861);
    }

    #[test]
    fn checksum_verifies_to_zero() {
        let mut data = vec![0x45, 0x00, 0x00, 0x3c, 0x1c, 0x46];
        let c = internet_checksum(&data);
        data.extend(c.to_be_bytes());
        assert!(verify_checksum(&data));
    }

    #[test]
    fn odd_length_pads_with_zero() {
        assert_eq!(internet_checksum(&[0x01]), internet_checksum(&[0x01, 0x00]));
    }

    #[test]
    fn empty_is_all_ones() {
        assert_eq!(internet_checksum(&[]), 0xFFFF);
    }

    #[test]
    fn pseudo_header_includes_addresses() {
        let a = PseudoHeader {
            src: [127, 0, 0, 1].into(),
            dst: [127, 0, 0, 1].into(),
        };
        let b = PseudoHeader {
            src: [10, 0, 0, 1].into(),
            dst: [127, 0, 0, 1].into(),
        };
        let segment = [0xd4, 0x31, 0x00, 0x50];
        assert_ne!(a.checksum(6, &segment), b.checksum(6, &segment));
    }
}
