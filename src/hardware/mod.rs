//! Block device discovery for plan collection.
//!
//! The `DeviceProbe` trait is the seam between plan collection and the host.
//! `LsblkProbe` is the production implementation; `StaticProbe` returns a
//! fixed list and is used by tests and dry runs.

pub mod storage;

pub use storage::{parse_lsblk_disks, LsblkProbe};

use crate::error::CollectionError;

/// Enumerates candidate installation disks as device paths.
pub trait DeviceProbe {
    fn list_disks(&self) -> Result<Vec<String>, CollectionError>;
}

/// Probe with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    disks: Vec<String>,
}

impl StaticProbe {
    pub fn new(disks: Vec<String>) -> Self {
        StaticProbe { disks }
    }
}

impl DeviceProbe for StaticProbe {
    fn list_disks(&self) -> Result<Vec<String>, CollectionError> {
        Ok(self.disks.clone())
    }
}
