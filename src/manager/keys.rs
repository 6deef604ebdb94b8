//! Logical ↔ physical key mapping

use super::ManagerError;

/// Prepended to every logical key before it reaches a backend
pub const NAMESPACE_PREFIX: &[u8] = b"data/";

/// Physical key for a logical key
pub fn wrap_key(key: &[u8]) -> Vec<u8> {
    let mut physical = Vec::with_capacity(NAMESPACE_PREFIX.len() + key.len());
    physical.extend_from_slice(NAMESPACE_PREFIX);
    physical.extend_from_slice(key);
    physical
}

/// Logical key of a physical key
///
/// A physical key must be strictly longer than the namespace and start with
/// it; anything else is malformed.
pub fn unwrap_key(physical: &[u8]) -> Result<&[u8], ManagerError> {
    if physical.len() <= NAMESPACE_PREFIX.len() {
        return Err(ManagerError::Decode(format!(
            "physical key of {} bytes is too short for the namespace",
            physical.len()
        )));
    }
    physical.strip_prefix(NAMESPACE_PREFIX).ok_or_else(|| {
        ManagerError::Decode(format!(
            "physical key {:?} is outside the namespace",
            String::from_utf8_lossy(physical)
        ))
    })
}

