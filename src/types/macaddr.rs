//! MAC Address Type
//!
//! A Type representing MAC Address as an array of `[u8; 6]`
//!

use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;

use serde::{Serialize, Serializer};

use crate::errors::Error as CrateError;

#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct MACAddress([u8; 6]);

impl MACAddress {
    pub const BROADCAST: MACAddress = MACAddress([0xff; 6]);

    /// Returns a slice containing the entire inner array.
    pub const fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl Serialize for MACAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(format!("{}", self).as_str())
    }
}

impl From<[u8; 6]> for MACAddress {
    fn from(value: [u8; 6]) -> Self {
        Self(value)
    }
}

impl TryFrom<&'_ [u8]> for MACAddress {
    type Error = CrateError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        if slice.len() != 6 {
            Err(CrateError::ParseError(format!(
                "MacAddress: {}",
                hex::encode(slice)
            )))
        } else {
            let mut m = MACAddress::default();
            m.0.copy_from_slice(slice);
            Ok(m)
        }
    }
}

impl TryFrom<&'_ str> for MACAddress {
    type Error = CrateError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let err = || CrateError::ParseError(format!("MacAddress: {}", s));

        let mut m = MACAddress::default();
        let mut parts = s.split(|c| c == ':' || c == '-');
        for octet in m.0.iter_mut() {
            let part = parts.next().ok_or_else(err)?;
            if part.len() != 2 {
                return Err(err());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(m)
    }
}

impl FromStr for MACAddress {
    type Err = CrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl fmt::Display for MACAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl fmt::Debug for MACAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error as CrateError;
    use core::convert::TryInto;

    #[test]
    fn byte_array_too_small_fail() {
        let mac_address: Result<MACAddress, _> = [00u8, 01u8, 02u8][..].try_into();
        assert!(mac_address.is_err());
        assert!(
            mac_address.err().unwrap() == CrateError::ParseError("MacAddress: 000102".to_string())
        );
    }

    #[test]
    fn byte_array_too_large_fail() {
        let mac_address: Result<MACAddress, _> = [00u8; 10].as_ref().try_into();
        assert!(mac_address.is_err());
    }

    #[test]
    fn parse_colon_separated() {
        let mac: MACAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(mac.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(format!("{}", mac), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn parse_rejects_bad_strings() {
        for input in ["", "aa:bb:cc", "aa:bb:cc:dd:ee:ff:00", "zz:bb:cc:dd:ee:ff", "a:b:c:d:e:f"] {
            let mac: Result<MACAddress, _> = input.parse();
            assert!(mac.is_err(), "{}", input);
        }
    }
}
