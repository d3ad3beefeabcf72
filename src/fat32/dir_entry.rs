//! Directory entry structures: 8.3 short entries and VFAT long-name
//! entries, both 32-byte slots in a directory cluster.
//!
//! A long name is stored as a run of [`LongNameEntry`] slots immediately
//! before the short entry it describes, 13 UCS-2 code units per slot.

use alloc::string::String;
use bitflags::bitflags;

use super::constants::{
    ATTR_LONG_NAME, DELETED_ENTRY_MARKER, DIR_ENTRY_SIZE, END_OF_DIRECTORY_MARKER,
};

bitflags! {
    /// Attribute byte of a short directory entry: bit 0 hidden, bit 1
    /// system, bit 4 directory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAttributes: u8 {
        const HIDDEN = 0x01;
        const SYSTEM = 0x02;
        const DIRECTORY = 0x10;
    }
}

/// Short-form (8.3) directory entry.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct DirEntry {
    /// 11-byte space-padded name
    pub name: [u8; 11],
    /// Attribute bits, [`FileAttributes`]
    pub attributes: u8,
    /// Reserved for Windows NT
    pub reserved: u8,
    /// Creation time, tenths of a second
    pub creation_time_tenths: u8,
    /// Creation time
    pub creation_time: u16,
    /// Creation date
    pub creation_date: u16,
    /// Last access date
    pub access_date: u16,
    /// High 16 bits of the first cluster
    pub cluster_high: u16,
    /// Last modification time
    pub modification_time: u16,
    /// Last modification date
    pub modification_date: u16,
    /// Low 16 bits of the first cluster
    pub cluster_low: u16,
    /// File size in bytes
    pub file_size: u32,
}

const _: () = assert!(core::mem::size_of::<DirEntry>() == DIR_ENTRY_SIZE);

impl DirEntry {
    /// Builds a file entry: space-padded name, zero timestamps, zero size.
    ///
    /// Only the first 11 bytes of `name` fit the short form; the rest of
    /// the name lives in the long-name run written next to this entry.
    pub fn new_file(name: &str, first_cluster: u32) -> Self {
        let mut entry = Self {
            name: [b' '; 11],
            attributes: FileAttributes::empty().bits(),
            reserved: 0,
            creation_time_tenths: 0,
            creation_time: 0,
            creation_date: 0,
            access_date: 0,
            cluster_high: (first_cluster >> 16) as u16,
            modification_time: 0,
            modification_date: 0,
            cluster_low: first_cluster as u16,
            file_size: 0,
        };

        let bytes = name.as_bytes();
        let len = bytes.len().min(11);
        entry.name[..len].copy_from_slice(&bytes[..len]);

        entry
    }

    /// Builds a directory entry.
    pub fn new_directory(name: &str, first_cluster: u32) -> Self {
        let mut entry = Self::new_file(name, first_cluster);
        entry.attributes = FileAttributes::DIRECTORY.bits();
        entry
    }

    pub fn is_deleted(&self) -> bool {
        self.name[0] == DELETED_ENTRY_MARKER
    }

    pub fn is_end_of_directory(&self) -> bool {
        self.name[0] == END_OF_DIRECTORY_MARKER
    }

    pub fn is_long_name(&self) -> bool {
        self.attributes == ATTR_LONG_NAME
    }

    pub fn flags(&self) -> FileAttributes {
        FileAttributes::from_bits_truncate(self.attributes)
    }

    pub fn is_directory(&self) -> bool {
        self.flags().contains(FileAttributes::DIRECTORY)
    }

    /// First cluster assembled from its high and low halves.
    pub fn first_cluster(&self) -> u32 {
        (self.cluster_high as u32) << 16 | self.cluster_low as u32
    }

    /// The 8.3 name up to its first space.
    pub fn short_name(&self) -> String {
        let end = self.name.iter().position(|&b| b == b' ').unwrap_or(11);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// Long-name (VFAT) directory entry, occupying the same 32-byte slot form.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct LongNameEntry {
    /// Ordinal in the low 5 bits, 0x40 flagging the run's last ordinal
    pub sequence_number: u8,
    /// Code units 1-5
    pub name_first: [u16; 5],
    /// Always [`ATTR_LONG_NAME`]
    pub attributes: u8,
    /// Reserved
    pub reserved: u8,
    /// Checksum of the short entry's 11-byte name
    pub alias_checksum: u8,
    /// Code units 6-11
    pub name_second: [u16; 6],
    /// Always 0 for long-name entries
    pub first_cluster: u16,
    /// Code units 12-13
    pub name_third: [u16; 2],
}

const _: () = assert!(core::mem::size_of::<LongNameEntry>() == DIR_ENTRY_SIZE);

/// Flag OR-ed into the sequence number of the run's last ordinal.
pub const LAST_ORDINAL_FLAG: u8 = 0x40;

impl LongNameEntry {
    /// Builds the entry for `ordinal` (0-based) of the run describing
    /// `name`, taking its 13 code units from `name[ordinal * 13..]`. The
    /// first unit past the name is the 0x0000 terminator; the rest are
    /// 0xFFFF padding.
    pub fn new(ordinal: usize, last: bool, checksum: u8, name: &[u8]) -> Self {
        let unit = |j: usize| -> u16 {
            let index = ordinal * 13 + j;
            match name.get(index) {
                Some(&b) => b as u16,
                None if index == name.len() => 0x0000,
                None => 0xFFFF,
            }
        };

        let mut name_first = [0u16; 5];
        for (j, slot) in name_first.iter_mut().enumerate() {
            *slot = unit(j);
        }
        let mut name_second = [0u16; 6];
        for (j, slot) in name_second.iter_mut().enumerate() {
            *slot = unit(5 + j);
        }
        let mut name_third = [0u16; 2];
        for (j, slot) in name_third.iter_mut().enumerate() {
            *slot = unit(11 + j);
        }

        let mut sequence_number = (ordinal + 1) as u8;
        if last {
            sequence_number |= LAST_ORDINAL_FLAG;
        }

        Self {
            sequence_number,
            name_first,
            attributes: ATTR_LONG_NAME,
            reserved: 0,
            alias_checksum: checksum,
            name_second,
            first_cluster: 0,
            name_third,
        }
    }

    /// 1-based ordinal of this entry within its run.
    pub fn ordinal(&self) -> usize {
        (self.sequence_number & 0x3F) as usize
    }

    /// The 13 code units in name order.
    pub fn units(&self) -> [u16; 13] {
        let mut units = [0u16; 13];
        let first = self.name_first;
        let second = self.name_second;
        let third = self.name_third;
        units[..5].copy_from_slice(&first);
        units[5..11].copy_from_slice(&second);
        units[11..].copy_from_slice(&third);
        units
    }
}

/// VFAT checksum of an 11-byte short name, carried by every long-name
/// entry of the run describing it.
pub fn alias_checksum(short_name: &[u8; 11]) -> u8 {
    short_name
        .iter()
        .fold(0u8, |sum, &b| sum.rotate_right(1).wrapping_add(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_reference_formula() {
        // The spelled-out form: ((sum & 1) << 7) + (sum >> 1) + byte.
        let reference = |name: &[u8; 11]| -> u8 {
            name.iter().fold(0u8, |sum, &b| {
                (if sum & 1 != 0 { 0x80u8 } else { 0 })
                    .wrapping_add(sum >> 1)
                    .wrapping_add(b)
            })
        };

        for name in [*b"HELLO   TXT", *b"readme-long", *b"           "] {
            assert_eq!(alias_checksum(&name), reference(&name));
        }
    }

    #[test]
    fn long_entry_spreads_units_and_pads() {
        let name = b"abcdefghijklmnop"; // 16 bytes, two entries
        let first = LongNameEntry::new(0, false, 0x42, name);
        let last = LongNameEntry::new(1, true, 0x42, name);

        assert_eq!(first.sequence_number, 1);
        assert_eq!(last.sequence_number, 2 | LAST_ORDINAL_FLAG);
        assert_eq!(first.ordinal(), 1);
        assert_eq!(last.ordinal(), 2);

        let units = first.units();
        assert_eq!(units[0], u16::from(b'a'));
        assert_eq!(units[12], u16::from(b'm'));

        let units = last.units();
        assert_eq!(units[0], u16::from(b'n'));
        assert_eq!(units[2], u16::from(b'p'));
        // First unused unit terminates the name, the rest are padding
        assert_eq!(units[3], 0x0000);
        assert_eq!(units[4], 0xFFFF);
        assert_eq!(units[12], 0xFFFF);
    }

    #[test]
    fn short_entry_pads_and_splits_cluster() {
        let entry = DirEntry::new_directory("docs", 0x0012_3456);
        assert_eq!(&entry.name, b"docs       ");
        assert!(entry.is_directory());
        assert_eq!(entry.first_cluster(), 0x0012_3456);
        assert_eq!(entry.short_name(), "docs");
    }
}
