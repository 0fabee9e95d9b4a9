//! Shared-memory segment naming, so a module process can attach to
//! rings a separate dispatcher process already created by name.

/// Name of the shared memory segment for endpoint `key`'s `write`,
/// `read`, or `meta` (endpoint id cell) segment under dispatcher
/// `instance_id`.
pub fn ring_os_id(instance_id: &str, key: &str, direction: &str) -> String {
    format!("bus_{instance_id}_{key}_{direction}")
}
