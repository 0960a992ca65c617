//! Email address domain rewriting.

use thiserror::Error;

/// An address that is not exactly `local@domain`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed address '{address}': {reason}")]
pub struct MalformedAddress {
    pub address: String,
    pub reason: &'static str,
}

impl MalformedAddress {
    fn new(address: &str, reason: &'static str) -> Self {
        Self {
            address: address.to_string(),
            reason,
        }
    }
}

/// Split an address into its local part and domain.
///
/// Exactly one `@` is accepted and neither side may be empty.
pub fn split_address(address: &str) -> Result<(&str, &str), MalformedAddress> {
    let (local, domain) = address
        .split_once('@')
        .ok_or_else(|| MalformedAddress::new(address, "missing '@' separator"))?;

    if domain.contains('@') {
        return Err(MalformedAddress::new(address, "more than one '@'"));
    }
    if local.is_empty() {
        return Err(MalformedAddress::new(address, "empty local part"));
    }
    if domain.is_empty() {
        return Err(MalformedAddress::new(address, "empty domain"));
    }
    Ok((local, domain))
}

/// Rewrite the domain segment, keeping the local part byte-identical.
pub fn replace_domain(address: &str, domain: &str) -> Result<String, MalformedAddress> {
    let (local, _) = split_address(address)?;
    Ok(format!("{}@{}", local, domain))
}
