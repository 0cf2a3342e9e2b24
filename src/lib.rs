//! Wirelens: build network packets and see every byte.
//!
//! A Basic unit in wirelens is a [`Packet`], an ordered stack of [`Layer`]s together with the
//! bytes they occupy on the wire. Packets are put together with a
//! [`PacketBuilder`][`crate::builder::PacketBuilder`], which fills in lengths, protocol numbers
//! and checksums, or dissected from captured bytes with [`Packet::from_bytes`].
//!
//! Every layer describes its own wire layout as a list of fields. The [`view`] module walks those
//! descriptions against the serialized bytes and renders them as a field listing and as a hex dump
//! with a caption under every line, so that what is printed is exactly what is on the wire.
//!
//! ```rust
//! use wirelens::builder::PacketBuilder;
//! use wirelens::layers::{ipv4::IPv4, tcp::{TCP, TCP_FLAG_SYN}};
//!
//! let _ = wirelens::register_defaults();
//!
//! let ip = IPv4::new([127, 0, 0, 1].into(), [127, 0, 0, 1].into());
//! let tcp = TCP::new(54321, 80).seq_no(1000).flags(TCP_FLAG_SYN);
//! let packet = PacketBuilder::new()
//!     .stack(Box::new(ip))?
//!     .stack(Box::new(tcp))?
//!     .build()?;
//!
//! let view = packet.view()?;
//! println!("{}", view.render_fields());
//! println!("{}", view.render_hex());
//! # Ok::<(), wirelens::errors::Error>(())
//! ```
//!
//! Protocols covered: Ethernet, ARP, IPv4, ICMP, TCP, UDP, DNS and TLS record framing. The
//! [`lesson`] module prints the narration around them, [`net`] sends packets through a raw
//! socket and, with the `capture` feature, `capture` wraps live capture through `pcap`.

#[macro_use]
mod cfg_macros;

pub mod builder;
pub mod checksum;
pub mod errors;
pub mod field;
pub mod layer;
pub mod layers;
pub mod lesson;
pub mod net;
pub mod packet;
pub mod types;
pub mod view;

cfg_capture! {
    pub mod capture;
}

#[doc(inline)]
pub use layers::register_defaults;

#[doc(inline)]
pub use layer::Layer;

#[doc(inline)]
pub use packet::Packet;

#[doc(inline)]
pub use errors::Error;

#[doc(inline)]
pub use types::{ENCAP_TYPE_ETH, ENCAP_TYPE_IPV4};
