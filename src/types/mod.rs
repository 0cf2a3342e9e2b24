//! All types that we are supporting

use crate::Layer;

mod macaddr;
pub use macaddr::*;

mod ethertype;
pub use ethertype::*;

mod ipaddr;
pub use ipaddr::*;

pub mod hex;

/// Creator function type
pub type LayerCreatorFn = fn() -> Box<dyn Layer + Send>;

/// Packet Encapsulation Type
///
/// This value is same as the link-layer header types used by [libpcap][libpcap]
///
/// [libpcap]: https://www.tcpdump.org/linktypes.html
pub type EncapType = u16;

/// Frames start with an Ethernet header.
pub const ENCAP_TYPE_ETH: EncapType = 1_u16;

/// Packets start directly with an IPv4 header.
pub const ENCAP_TYPE_IPV4: EncapType = 228_u16;
