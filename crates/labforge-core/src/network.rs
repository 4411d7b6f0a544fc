//! Per-lab subnet allocation inside a fixed private pool.
//!
//! Every lab owns one `/24` of `172.30.0.0/16`. The first block is never
//! handed out. All functions here are pure; the caller supplies the set of
//! subnets already in use.

use labforge_schema::{Subnet, AUTO_SUBNET};
use std::net::Ipv4Addr;
use thiserror::Error;

pub const POOL_NETWORK: Ipv4Addr = Ipv4Addr::new(172, 30, 0, 0);
pub const POOL_PREFIX: u8 = 16;
pub const BLOCK_PREFIX: u8 = 24;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no available subnets in pool {0}")]
    NoSubnetAvailable(Subnet),
    #[error("subnet {subnet} is unavailable: {reason}")]
    SubnetUnavailable { subnet: Subnet, reason: String },
    #[error("invalid subnet: {0}")]
    InvalidSubnet(String),
    #[error("ip_offset {offset} is outside subnet {subnet}")]
    OffsetOutOfRange { offset: u32, subnet: Subnet },
}

pub fn pool() -> Subnet {
    Subnet::containing(POOL_NETWORK, POOL_PREFIX)
}

/// The permanently reserved first block of the pool.
pub fn reserved_block() -> Subnet {
    Subnet::containing(POOL_NETWORK, BLOCK_PREFIX)
}

/// Lowest free `/24` in the pool. A used entry of any size occupies every
/// block it overlaps.
pub fn allocate(used: &[Subnet]) -> Result<Subnet, NetworkError> {
    let reserved = reserved_block();
    pool()
        .subdivisions(BLOCK_PREFIX)
        .into_iter()
        .filter(|block| *block != reserved)
        .find(|block| !used.iter().any(|u| u.overlaps(block)))
        .ok_or_else(|| NetworkError::NoSubnetAvailable(pool()))
}

/// Honor an explicit `/24` request from the template, or fall back to
/// [`allocate`] for `auto`.
pub fn allocate_with_hint(hint: &str, used: &[Subnet]) -> Result<Subnet, NetworkError> {
    let hint = hint.trim();
    if hint.is_empty() || hint.eq_ignore_ascii_case(AUTO_SUBNET) {
        return allocate(used);
    }

    let requested: Subnet = hint
        .parse()
        .map_err(|e: labforge_schema::SubnetParseError| NetworkError::InvalidSubnet(e.to_string()))?;

    let unavailable = |reason: String| NetworkError::SubnetUnavailable {
        subnet: requested,
        reason,
    };
    if requested.prefix() != BLOCK_PREFIX || !pool().contains(requested.network()) {
        return Err(unavailable(format!(
            "labs must use a /{BLOCK_PREFIX} inside {}",
            pool()
        )));
    }
    if requested == reserved_block() {
        return Err(unavailable("block is reserved".to_owned()));
    }
    if used.iter().any(|u| u.overlaps(&requested)) {
        return Err(unavailable("already in use by another lab".to_owned()));
    }
    Ok(requested)
}

/// Address of a service: the subnet's network address plus `offset`.
pub fn compute_address(subnet: Subnet, offset: u32) -> Result<Ipv4Addr, NetworkError> {
    subnet
        .nth(u64::from(offset))
        .ok_or(NetworkError::OffsetOutOfRange { offset, subnet })
}

/// Bridge gateway: network address plus one.
pub fn gateway_address(subnet: Subnet) -> Ipv4Addr {
    subnet.nth(1).unwrap_or_else(|| subnet.network())
}
