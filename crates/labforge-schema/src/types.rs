//! Identifier and address newtypes shared by every labforge crate.
//!
//! All newtypes serialize/deserialize as plain strings so lab records stay
//! hand-editable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::ops::Deref;
use std::str::FromStr;
use thiserror::Error;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<std::path::Path> for $name {
            fn as_ref(&self) -> &std::path::Path {
                std::path::Path::new(&self.0)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Lab identifier: `<3-char name prefix>-<8 hex chars>`. Doubles as the
    /// name of the lab's directory under the labs root.
    LabId
);

impl LabId {
    /// Compose project name used for every runtime call against this lab.
    pub fn project_name(&self) -> String {
        format!("labforge-{}", self.0)
    }

    /// Name of the per-lab bridge network in the generated manifest.
    pub fn network_name(&self) -> String {
        self.project_name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubnetParseError {
    #[error("invalid subnet '{0}': expected <a.b.c.d>/<prefix>")]
    Format(String),
    #[error("invalid subnet '{0}': prefix must be between 0 and 32")]
    Prefix(String),
    #[error("invalid subnet '{0}': host bits are set")]
    HostBits(String),
}

/// An IPv4 network block in CIDR notation.
///
/// Parsing is strict: the address must be the network address of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subnet {
    network: Ipv4Addr,
    prefix: u8,
}

impl Subnet {
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self, SubnetParseError> {
        if prefix > 32 {
            return Err(SubnetParseError::Prefix(format!("{network}/{prefix}")));
        }
        let subnet = Self { network, prefix };
        if u32::from(network) & !subnet.mask() != 0 {
            return Err(SubnetParseError::HostBits(format!("{network}/{prefix}")));
        }
        Ok(subnet)
    }

    /// The block of length `prefix` (clamped to 32) that contains `addr`.
    pub fn containing(addr: Ipv4Addr, prefix: u8) -> Self {
        let prefix = prefix.min(32);
        let probe = Self {
            network: addr,
            prefix,
        };
        Self {
            network: Ipv4Addr::from(u32::from(addr) & probe.mask()),
            prefix,
        }
    }

    /// Split into consecutive blocks of length `prefix`, ascending. Empty
    /// when `prefix` is shorter than this block's or longer than 32.
    pub fn subdivisions(&self, prefix: u8) -> Vec<Subnet> {
        if prefix < self.prefix || prefix > 32 {
            return Vec::new();
        }
        let step = 1u64 << (32 - u32::from(prefix));
        let count = 1u64 << u32::from(prefix - self.prefix);
        let base = u64::from(u32::from(self.network));
        (0..count)
            .filter_map(|i| u32::try_from(base + i * step).ok())
            .map(|addr| Subnet {
                network: Ipv4Addr::from(addr),
                prefix,
            })
            .collect()
    }

    #[inline]
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    #[inline]
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    fn mask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix))
        }
    }

    /// Number of addresses in the block, network and broadcast included.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !self.mask())
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.mask() == u32::from(self.network)
    }

    pub fn overlaps(&self, other: &Subnet) -> bool {
        self.contains(other.network) || other.contains(self.network)
    }

    /// Network address plus `offset`, or `None` when the result leaves the block.
    pub fn nth(&self, offset: u64) -> Option<Ipv4Addr> {
        if offset >= self.size() {
            return None;
        }
        let addr = u64::from(u32::from(self.network)) + offset;
        u32::try_from(addr).ok().map(Ipv4Addr::from)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Subnet {
    type Err = SubnetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| SubnetParseError::Format(s.to_owned()))?;
        let network: Ipv4Addr = addr
            .parse()
            .map_err(|_| SubnetParseError::Format(s.to_owned()))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| SubnetParseError::Prefix(s.to_owned()))?;
        Self::new(network, prefix)
    }
}

impl TryFrom<String> for Subnet {
    type Error = SubnetParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subnet> for String {
    fn from(subnet: Subnet) -> Self {
        subnet.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_id_display_and_project_name() {
        let id = LabId::new("mal-1a2b3c4d");
        assert_eq!(id.to_string(), "mal-1a2b3c4d");
        assert_eq!(id.project_name(), "labforge-mal-1a2b3c4d");
        assert_eq!(id.network_name(), "labforge-mal-1a2b3c4d");
    }

    #[test]
    fn lab_id_serializes_as_plain_string() {
        let id = LabId::new("web-deadbeef");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"web-deadbeef\"");
    }

    #[test]
    fn subnet_parses_and_displays() {
        let s: Subnet = "172.30.5.0/24".parse().unwrap();
        assert_eq!(s.network(), Ipv4Addr::new(172, 30, 5, 0));
        assert_eq!(s.prefix(), 24);
        assert_eq!(s.to_string(), "172.30.5.0/24");
        assert_eq!(s.size(), 256);
        assert_eq!(s.broadcast(), Ipv4Addr::new(172, 30, 5, 255));
    }

    #[test]
    fn subnet_rejects_garbage() {
        assert!("172.30.5.0".parse::<Subnet>().is_err());
        assert!("172.30.5/24".parse::<Subnet>().is_err());
        assert!("172.30.5.0/33".parse::<Subnet>().is_err());
        assert!(matches!(
            "172.30.5.7/24".parse::<Subnet>(),
            Err(SubnetParseError::HostBits(_))
        ));
    }

    #[test]
    fn subnet_contains_and_overlaps() {
        let pool: Subnet = "172.30.0.0/16".parse().unwrap();
        let block: Subnet = "172.30.9.0/24".parse().unwrap();
        let other: Subnet = "10.0.0.0/24".parse().unwrap();
        assert!(pool.contains(Ipv4Addr::new(172, 30, 200, 1)));
        assert!(!block.contains(Ipv4Addr::new(172, 30, 10, 1)));
        assert!(pool.overlaps(&block));
        assert!(block.overlaps(&pool));
        assert!(!block.overlaps(&other));
    }

    #[test]
    fn subnet_nth_stays_inside_block() {
        let block: Subnet = "172.30.1.0/24".parse().unwrap();
        assert_eq!(block.nth(10), Some(Ipv4Addr::new(172, 30, 1, 10)));
        assert_eq!(block.nth(255), Some(Ipv4Addr::new(172, 30, 1, 255)));
        assert_eq!(block.nth(256), None);
    }

    #[test]
    fn containing_masks_host_bits() {
        let s = Subnet::containing(Ipv4Addr::new(172, 30, 9, 77), 24);
        assert_eq!(s.to_string(), "172.30.9.0/24");
        assert_eq!(
            Subnet::containing(Ipv4Addr::new(10, 1, 2, 3), 40).to_string(),
            "10.1.2.3/32"
        );
    }

    #[test]
    fn subdivisions_cover_block_in_order() {
        let pool: Subnet = "172.30.0.0/16".parse().unwrap();
        let blocks = pool.subdivisions(24);
        assert_eq!(blocks.len(), 256);
        assert_eq!(blocks[0].to_string(), "172.30.0.0/24");
        assert_eq!(blocks[1].to_string(), "172.30.1.0/24");
        assert_eq!(blocks[255].to_string(), "172.30.255.0/24");
        assert!(pool.subdivisions(8).is_empty());
        assert!(pool.subdivisions(33).is_empty());
    }

    #[test]
    fn subnet_serde_uses_cidr_string() {
        let block: Subnet = "172.30.1.0/24".parse().unwrap();
        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(json, "\"172.30.1.0/24\"");
        let back: Subnet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
        assert!(serde_json::from_str::<Subnet>("\"nope\"").is_err());
    }
}
