//! In-memory block device.

use alloc::vec;
use alloc::vec::Vec;
use core::result::Result;

use super::{BlockDevice, SECTOR_SIZE};
use crate::FsError;

/// Block device backed by a vector of 512-byte sectors.
///
/// Serves as the synthetic device for the test suite and as a RAM disk
/// for hosts that want one.
pub struct MemoryBlockDevice {
    sectors: Vec<[u8; SECTOR_SIZE]>,
}

impl MemoryBlockDevice {
    /// Creates a zero-filled device with the given sector count.
    pub fn new(total_sectors: u64) -> Self {
        let sectors = (0..total_sectors).map(|_| [0; SECTOR_SIZE]).collect();
        Self { sectors }
    }

    fn validate_sector(&self, lba: u64) -> Result<(), FsError> {
        if lba as usize >= self.sectors.len() {
            return Err(FsError::IoError);
        }
        Ok(())
    }

    fn validate_buffer(&self, buf: &[u8]) -> Result<(), FsError> {
        if buf.len() != SECTOR_SIZE {
            return Err(FsError::IoError);
        }
        Ok(())
    }
}

impl BlockDevice for MemoryBlockDevice {
    fn read_sector(&self, lba: u64, buf: &mut [u8]) -> Result<(), FsError> {
        self.validate_sector(lba)?;
        self.validate_buffer(buf)?;
        buf.copy_from_slice(&self.sectors[lba as usize]);
        Ok(())
    }

    fn write_sector(&mut self, lba: u64, buf: &[u8]) -> Result<(), FsError> {
        self.validate_sector(lba)?;
        self.validate_buffer(buf)?;
        self.sectors[lba as usize].copy_from_slice(buf);
        Ok(())
    }

    fn total_sectors(&self) -> u64 {
        self.sectors.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_sector() {
        let mut device = MemoryBlockDevice::new(16);
        let pattern = [0xA5u8; SECTOR_SIZE];
        device.write_sector(3, &pattern).unwrap();

        let mut back = [0u8; SECTOR_SIZE];
        device.read_sector(3, &mut back).unwrap();
        assert_eq!(back, pattern);
    }

    #[test]
    fn rejects_out_of_range_and_short_buffers() {
        let mut device = MemoryBlockDevice::new(4);
        let mut buf = [0u8; SECTOR_SIZE];
        assert_eq!(device.read_sector(4, &mut buf), Err(FsError::IoError));
        assert_eq!(device.write_sector(0, &buf[..100]), Err(FsError::IoError));
    }
}
