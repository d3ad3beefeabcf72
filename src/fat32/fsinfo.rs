//! FAT32 FSInfo Sector Structure

use super::constants::SECTOR_SIZE;

/// Lead signature at offset 0.
pub const FSINFO_LEAD_SIGNATURE: u32 = 0x4161_5252;

/// Structure signature at offset 484.
pub const FSINFO_STRUCT_SIGNATURE: u32 = 0x6141_7272;

/// Trail signature at offset 508.
pub const FSINFO_TRAIL_SIGNATURE: u32 = 0xAA55_0000;

/// FSInfo sector: the allocator's free-count and last-allocated memo.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct FsInfoSector {
    /// Lead signature, [`FSINFO_LEAD_SIGNATURE`]
    pub lead_signature: u32,

    /// Reserved
    pub reserved1: [u8; 480],

    /// Structure signature, [`FSINFO_STRUCT_SIGNATURE`]
    pub struct_signature: u32,

    /// Number of free clusters on the volume
    pub free_clusters: u32,

    /// Cluster number most recently handed out by the allocator
    pub last_allocated: u32,

    /// Reserved
    pub reserved2: [u8; 12],

    /// Trail signature, [`FSINFO_TRAIL_SIGNATURE`]
    pub trail_signature: u32,
}

const _: () = assert!(core::mem::size_of::<FsInfoSector>() == SECTOR_SIZE);

impl FsInfoSector {
    /// Whether the three signatures match the FAT32 FSInfo magic.
    ///
    /// A mismatch is worth a warning but does not prevent mounting.
    pub fn signatures_valid(&self) -> bool {
        self.lead_signature == FSINFO_LEAD_SIGNATURE
            && self.struct_signature == FSINFO_STRUCT_SIGNATURE
            && self.trail_signature == FSINFO_TRAIL_SIGNATURE
    }
}
