//! EtherType definition of Well Known EtherTypes

pub type EtherType = u16;

pub const ETHERTYPE_IP: EtherType = 0x0800_u16;
pub const ETHERTYPE_ARP: EtherType = 0x0806_u16;
pub const ETHERTYPE_DOT1Q: EtherType = 0x8100_u16;
pub const ETHERTYPE_IP6: EtherType = 0x86dd_u16;
pub const ETHERTYPE_LOOPBACK: EtherType = 0x9000_u16;

/// Names for the EtherTypes a reader is likely to meet.
pub static ETHERTYPE_NAMES: &[(u64, &str)] = &[
    (ETHERTYPE_IP as u64, "IPv4"),
    (ETHERTYPE_ARP as u64, "ARP"),
    (ETHERTYPE_DOT1Q as u64, "802.1Q"),
    (ETHERTYPE_IP6 as u64, "IPv6"),
    (ETHERTYPE_LOOPBACK as u64, "Loopback"),
];
