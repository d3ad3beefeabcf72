//! Block-device contract and the disk/partition handles the driver takes.
//!
//! The driver never talks to hardware directly; it consumes fixed
//! 512-byte-sector reads and writes through [`BlockDevice`]. A [`Disk`]
//! pairs a device with the UUID the mount cache is keyed on, and a
//! [`PartitionDescriptor`] names one partition on it.

use alloc::sync::Arc;
use core::result::Result;
use spin::Mutex;

use crate::FsError;

pub mod memory;

/// Size of a disk sector in bytes. The driver requires exactly this.
pub const SECTOR_SIZE: usize = 512;

/// Sector-granular storage.
pub trait BlockDevice: Send + Sync {
    /// Reads the 512-byte sector at `lba` into `buf`.
    fn read_sector(&self, lba: u64, buf: &mut [u8]) -> Result<(), FsError>;

    /// Writes `buf` to the 512-byte sector at `lba`.
    fn write_sector(&mut self, lba: u64, buf: &[u8]) -> Result<(), FsError>;

    /// Returns the number of sectors the device holds.
    fn total_sectors(&self) -> u64;
}

/// Handle to a disk: identity plus a shared device reference.
#[derive(Clone)]
pub struct Disk {
    uuid: u64,
    device: Arc<Mutex<dyn BlockDevice>>,
}

impl Disk {
    pub fn new(uuid: u64, device: Arc<Mutex<dyn BlockDevice>>) -> Self {
        Self { uuid, device }
    }

    /// Identity the mount cache compares against.
    pub fn uuid(&self) -> u64 {
        self.uuid
    }

    /// Direct access to the underlying device.
    pub fn device(&self) -> &Arc<Mutex<dyn BlockDevice>> {
        &self.device
    }

    /// Reads `count` consecutive sectors starting at `lba` into `buf`.
    ///
    /// `buf` must be exactly `count * 512` bytes.
    pub fn read_sectors(&self, lba: u64, count: usize, buf: &mut [u8]) -> Result<(), FsError> {
        if buf.len() != count * SECTOR_SIZE {
            return Err(FsError::IoError);
        }

        let device = self.device.lock();
        for (i, chunk) in buf.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            device.read_sector(lba + i as u64, chunk)?;
        }
        Ok(())
    }

    /// Writes `count` consecutive sectors starting at `lba` from `buf`.
    ///
    /// `buf` must be exactly `count * 512` bytes.
    pub fn write_sectors(&self, lba: u64, count: usize, buf: &[u8]) -> Result<(), FsError> {
        if buf.len() != count * SECTOR_SIZE {
            return Err(FsError::IoError);
        }

        let mut device = self.device.lock();
        for (i, chunk) in buf.chunks_exact(SECTOR_SIZE).enumerate() {
            device.write_sector(lba + i as u64, chunk)?;
        }
        Ok(())
    }
}

/// One partition on a disk, as produced by a partition-table parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionDescriptor {
    /// Identity the mount cache compares against.
    pub uuid: u64,
    /// Absolute LBA of the partition's first sector.
    pub start_lba: u64,
}

impl PartitionDescriptor {
    pub fn new(uuid: u64, start_lba: u64) -> Self {
        Self { uuid, start_lba }
    }
}
