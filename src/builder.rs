//! Packet sculpting
//!
//! ```
//! use wirelens::builder::PacketBuilder;
//! use wirelens::layers::{ipv4::IPv4, tcp::{TCP, TCP_FLAG_SYN}};
//!
//! let ip = IPv4::new("127.0.0.1".parse().unwrap(), "127.0.0.1".parse().unwrap());
//! let tcp = TCP::new(54321, 80).seq_no(1000).flags(TCP_FLAG_SYN).window(65535);
//!
//! let packet = PacketBuilder::new()
//!     .stack(Box::new(ip)).unwrap()
//!     .stack(Box::new(tcp)).unwrap()
//!     .build().unwrap();
//! assert_eq!(packet.len(), 40);
//! ```

use crate::layer::EncodeInfo;
use crate::{errors::Error, Layer, Packet};

#[derive(Debug, Default)]
pub struct PacketBuilder {
    inner: Packet,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stacks a layer on top of the Packet. The return value on success is the
    /// `PacketBuilder` on success. Failure happens when a layer is attempted to
    /// be pushed after pushing bytes. In this case it returns a
    /// [SculptingError][`crate::errors::Error::SculptingError`].
    pub fn stack(mut self, layer: Box<dyn Layer + Send>) -> Result<Self, Error> {
        if self.inner.unprocessed.is_empty() {
            self.inner.layers.push(layer);
            Ok(self)
        } else {
            Err(Error::SculptingError(
                "Cannot push layer on top of raw byte layer".to_string(),
            ))
        }
    }

    /// Stacks bytes on top of the packet. If the layer already contains some bytes
    /// the new bytes are concatenated to the previous bytes in the packet.
    pub fn stack_bytes(mut self, bytes: &[u8]) -> Self {
        self.inner.unprocessed.extend(bytes);
        self
    }

    /// Serialize the stack, topmost layer first.
    ///
    /// Every layer is encoded in front of the bytes of everything above it, so lengths and
    /// checksums cover the real payload. Layers that compute a field record the value, the
    /// returned packet's layers show what is in `as_bytes`.
    pub fn build(mut self) -> Result<Packet, Error> {
        let len = self.inner.layers.len();
        if len < 1 && self.inner.unprocessed.is_empty() {
            return Err(Error::SculptingError(
                "Packet to build does not contain any layers".to_string(),
            ));
        }

        let mut bytes = self.inner.unprocessed.clone();
        for i in (0..len).rev() {
            let next = if i + 1 < len {
                Some(self.inner.layers[i + 1].name())
            } else if !self.inner.unprocessed.is_empty() {
                Some("raw")
            } else {
                None
            };
            let pseudo_header = if i > 0 {
                self.inner.layers[i - 1].pseudo_header()
            } else {
                None
            };
            let info = EncodeInfo {
                next,
                pseudo_header,
            };

            let next_layer = if next.is_some() {
                Some(bytes.as_slice())
            } else {
                None
            };
            bytes = self.inner.layers[i].stack_and_encode(next_layer, &info)?;
            log_debug!(
                "encoded {}: {} bytes so far",
                self.inner.layers[i].name(),
                bytes.len()
            );
        }

        self.inner.meta.len = bytes.len() as u32;
        self.inner.meta.caplen = bytes.len() as u32;
        self.inner.data = bytes;
        Ok(self.inner)
    }
}

impl From<Packet> for PacketBuilder {
    /// Layers and payload of `packet`, ready to be encoded again.
    fn from(packet: Packet) -> Self {
        Self { inner: packet }
    }
}
