//! Storage device enumeration via lsblk.
//!
//! Only whole disks are offered as installation targets: partitions, loop
//! devices, optical drives and compressed RAM disks are filtered out.

use super::DeviceProbe;
use crate::error::CollectionError;
use std::process::Command;

/// DeviceProbe backed by `lsblk -d -n -J -o NAME,TYPE`.
#[derive(Debug, Clone, Default)]
pub struct LsblkProbe;

impl LsblkProbe {
    pub fn new() -> Self {
        LsblkProbe
    }
}

impl DeviceProbe for LsblkProbe {
    fn list_disks(&self) -> Result<Vec<String>, CollectionError> {
        let output = Command::new("lsblk")
            .args(["-d", "-n", "-J", "-o", "NAME,TYPE"])
            .output()
            .map_err(|e| CollectionError::Probe(format!("failed to run lsblk: {}", e)))?;

        if !output.status.success() {
            return Err(CollectionError::Probe(format!(
                "lsblk exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let disks = parse_lsblk_disks(&String::from_utf8_lossy(&output.stdout))?;
        log::info!("lsblk reported {} disk(s)", disks.len());
        Ok(disks)
    }
}

/// Extract `/dev/<name>` paths of whole disks from lsblk JSON output.
pub fn parse_lsblk_disks(json_output: &str) -> Result<Vec<String>, CollectionError> {
    let json: serde_json::Value = serde_json::from_str(json_output)
        .map_err(|e| CollectionError::Probe(format!("unparseable lsblk output: {}", e)))?;

    let mut disks = Vec::new();

    if let Some(blockdevices) = json["blockdevices"].as_array() {
        for device in blockdevices {
            if device["type"].as_str().unwrap_or("") != "disk" {
                continue;
            }

            let name = match device["name"].as_str() {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };

            // zram swap devices also report type "disk"
            if name.starts_with("zram") {
                continue;
            }

            disks.push(format!("/dev/{}", name));
        }
    }

    Ok(disks)
}
