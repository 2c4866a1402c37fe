//! Local network interface lookups.

use phantom_core::{Error, MacAddress, Result};
use std::path::{Path, PathBuf};

const SYSFS_NET: &str = "/sys/class/net";

/// Hardware address of a local interface, e.g. `"enp1s0"`.
///
/// Reads `/sys/class/net/<interface>/address`.
///
/// # Errors
/// Returns `Error::Io` if the interface does not exist and
/// `Error::InvalidMacAddress` if its address cannot be parsed.
pub fn mac_address(interface: &str) -> Result<MacAddress> {
    read_address(&address_path(Path::new(SYSFS_NET), interface))
}

fn address_path(root: &Path, interface: &str) -> PathBuf {
    root.join(interface).join("address")
}

fn read_address(path: &Path) -> Result<MacAddress> {
    let text = std::fs::read_to_string(path)?;
    let address = text.trim();
    if address.is_empty() {
        return Err(Error::InvalidMacAddress(path.display().to_string()));
    }
    address.parse()
}
