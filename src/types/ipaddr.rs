//! Definition of IP Address Types
//!
//! IPv4 addresses are kept as the four octets as they appear on the wire.

use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;
use std::net::Ipv4Addr;

use serde::{Serialize, Serializer};

use crate::errors::Error as CrateError;

#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct IPv4Address([u8; 4]);

impl IPv4Address {
    pub const fn octets(&self) -> [u8; 4] {
        self.0
    }

    pub const fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 4]> for IPv4Address {
    fn from(value: [u8; 4]) -> Self {
        Self(value)
    }
}

impl From<Ipv4Addr> for IPv4Address {
    fn from(value: Ipv4Addr) -> Self {
        Self(value.octets())
    }
}

impl From<IPv4Address> for Ipv4Addr {
    fn from(value: IPv4Address) -> Self {
        Ipv4Addr::from(value.0)
    }
}

impl TryFrom<&'_ [u8]> for IPv4Address {
    type Error = CrateError;

    fn try_from(slice: &'_ [u8]) -> Result<Self, Self::Error> {
        if slice.len() != 4 {
            Err(CrateError::ParseError(format!(
                "IPv4Address: {}",
                hex::encode(slice)
            )))
        } else {
            let mut ip = IPv4Address::default();
            ip.0.copy_from_slice(slice);
            Ok(ip)
        }
    }
}

impl TryFrom<&'_ str> for IPv4Address {
    type Error = CrateError;

    fn try_from(s: &'_ str) -> Result<Self, Self::Error> {
        s.parse::<Ipv4Addr>()
            .map(Self::from)
            .map_err(|_| CrateError::ParseError(format!("IPv4Address: {}", s)))
    }
}

impl FromStr for IPv4Address {
    type Err = CrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl fmt::Display for IPv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl fmt::Debug for IPv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for IPv4Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(format!("{}", self).as_str())
    }
}

#[cfg(test)]
mod tests {
    use core::convert::TryInto;

    use super::*;

    #[test]
    fn ipv4_addr_tests() {
        let test_cases = ["127.0.0.1", "0.0.0.0", "192.168.1.100", "93.184.216.34", "255.255.255.255"];

        for input in test_cases {
            let ip: IPv4Address = input.parse().unwrap();
            assert_eq!(input, format!("{}", ip));
        }
    }

    #[test]
    fn ipv4_from_slice() {
        let ip: Result<IPv4Address, _> = [0x7f, 0, 0, 1][..].try_into();
        assert_eq!(ip.unwrap().octets(), [127, 0, 0, 1]);

        let ip: Result<IPv4Address, _> = [0x7f, 0, 0][..].try_into();
        assert!(ip.is_err());
    }

    #[test]
    fn ipv4_bad_string() {
        assert!("256.1.1.1".parse::<IPv4Address>().is_err());
        assert!("example.com".parse::<IPv4Address>().is_err());
    }
}
