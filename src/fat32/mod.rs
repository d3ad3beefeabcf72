//! FAT32 filesystem driver
//!
//! The driver keeps a process-wide memo of the boot sector and FSInfo
//! sector belonging to the most recently touched (disk, partition) pair
//! and re-reads them when the pair changes. Every public operation locks
//! that memo for its whole body, which also serializes the driver.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::mem::size_of;
use core::result::Result;

use lazy_static::lazy_static;
use log::{debug, warn};
use spin::Mutex;

use crate::block::{BlockDevice, Disk, PartitionDescriptor, SECTOR_SIZE};
use crate::{FileRecord, FsError};

pub mod boot_sector;
pub mod constants;
pub mod dir_entry;
pub mod fat_entry;
pub mod fsinfo;

pub use boot_sector::BootSector;
use constants::*;
pub use dir_entry::{alias_checksum, DirEntry, FileAttributes, LongNameEntry};
pub use fat_entry::FatEntry;
pub use fsinfo::FsInfoSector;

/// Boot-sector and FSInfo memo for one (disk, partition) pair.
struct MountState {
    disk_uuid: u64,
    partition_uuid: u64,
    partition_start: u64,
    boot_sector: Option<BootSector>,
    fsinfo: Option<FsInfoSector>,
}

impl MountState {
    const fn empty() -> Self {
        Self {
            disk_uuid: u64::MAX,
            partition_uuid: u64::MAX,
            partition_start: 0,
            boot_sector: None,
            fsinfo: None,
        }
    }
}

lazy_static! {
    /// The most recently touched pair. One slot only: touching a second
    /// pair evicts the first.
    static ref MOUNT_CACHE: Mutex<MountState> = Mutex::new(MountState::empty());
}

/// Re-reads the boot sector and FSInfo sector when the incoming pair
/// differs from the cached one. A failed read leaves the slot empty but
/// still records the pair, so a broken volume is not re-probed on every
/// call.
fn cache_partition(state: &mut MountState, disk: &Disk, partition: &PartitionDescriptor) {
    if state.disk_uuid == disk.uuid() && state.partition_uuid == partition.uuid {
        return;
    }

    state.partition_start = partition.start_lba;
    state.boot_sector = read_boot_sector(disk, partition.start_lba);
    state.fsinfo = match state.boot_sector {
        Some(ref boot) => read_fsinfo(disk, partition.start_lba, boot),
        None => None,
    };
    state.disk_uuid = disk.uuid();
    state.partition_uuid = partition.uuid;

    match (&state.boot_sector, &state.fsinfo) {
        (Some(boot), Some(_)) => {
            let sectors_per_cluster = boot.sectors_per_cluster;
            let root = boot.root_dir_cluster;
            debug!(
                "fat32: mounted disk {:#x} partition {:#x}: {} sectors/cluster, root cluster {}",
                disk.uuid(),
                partition.uuid,
                sectors_per_cluster,
                root
            );
        }
        _ => {
            warn!(
                "fat32: mounting disk {:#x} partition {:#x} failed",
                disk.uuid(),
                partition.uuid
            );
        }
    }
}

/// Ensures the cache holds this pair and hands out its volume state, or
/// [`FsError::MountFailed`] when the pair could not be mounted.
fn mounted_volume<'s>(
    state: &'s mut MountState,
    disk: &Disk,
    partition: &PartitionDescriptor,
) -> Result<(BootSector, u64, &'s mut FsInfoSector), FsError> {
    cache_partition(state, disk, partition);
    match (&state.boot_sector, &mut state.fsinfo) {
        (Some(boot), Some(fsinfo)) => Ok((*boot, state.partition_start, fsinfo)),
        _ => Err(FsError::MountFailed),
    }
}

fn read_boot_sector(disk: &Disk, partition_start: u64) -> Option<BootSector> {
    let mut buf = [0u8; SECTOR_SIZE];
    if disk.read_sectors(partition_start, 1, &mut buf).is_err() {
        return None;
    }

    let boot = unsafe { core::ptr::read_unaligned(buf.as_ptr() as *const BootSector) };
    if !boot.is_valid() {
        warn!("fat32: boot sector signature or sector size invalid");
        return None;
    }
    Some(boot)
}

fn read_fsinfo(disk: &Disk, partition_start: u64, boot: &BootSector) -> Option<FsInfoSector> {
    let lba = partition_start + boot.fsinfo_sector as u64;
    let mut buf = [0u8; SECTOR_SIZE];
    if disk.read_sectors(lba, 1, &mut buf).is_err() {
        return None;
    }

    let fsinfo = unsafe { core::ptr::read_unaligned(buf.as_ptr() as *const FsInfoSector) };
    if !fsinfo.signatures_valid() {
        warn!("fat32: FSInfo signatures do not match");
    }
    Some(fsinfo)
}

/// Raw bytes of a packed on-disk structure.
fn struct_bytes<T>(value: &T) -> &[u8] {
    unsafe { core::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>()) }
}

fn entry_at(buf: &[u8], slot: usize) -> DirEntry {
    let offset = slot * DIR_ENTRY_SIZE;
    let bytes = &buf[offset..offset + DIR_ENTRY_SIZE];
    unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const DirEntry) }
}

fn long_entry_at(buf: &[u8], slot: usize) -> LongNameEntry {
    let offset = slot * DIR_ENTRY_SIZE;
    let bytes = &buf[offset..offset + DIR_ENTRY_SIZE];
    unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const LongNameEntry) }
}

fn put_entry(buf: &mut [u8], slot: usize, entry: &DirEntry) {
    let offset = slot * DIR_ENTRY_SIZE;
    buf[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(struct_bytes(entry));
}

fn put_long_entry(buf: &mut [u8], slot: usize, entry: &LongNameEntry) {
    let offset = slot * DIR_ENTRY_SIZE;
    buf[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(struct_bytes(entry));
}

/// Directory slots needed for `name`: one short entry plus the long-name
/// run in front of it. Every created entry gets a long-name run, which
/// preserves the name's case.
fn number_of_entries(name: &str) -> usize {
    (name.len() - 1) / 11 + 2
}

/// Assembles a long name from the entries of its run, placing each
/// entry's units at `(ordinal - 1) * 13`.
struct LongNameState {
    buffer: [u8; LONG_NAME_CAPACITY],
    length: usize,
    pending: bool,
}

impl LongNameState {
    fn new() -> Self {
        Self {
            buffer: [0; LONG_NAME_CAPACITY],
            length: 0,
            pending: false,
        }
    }

    fn absorb(&mut self, entry: &LongNameEntry) {
        // Ordinal 0 and ordinals past the buffer only occur on corrupt
        // volumes; their units have nowhere to go.
        let Some(ordinal) = entry.ordinal().checked_sub(1) else {
            return;
        };
        let base = ordinal * CHARS_PER_LONG_ENTRY;
        if base >= LONG_NAME_CAPACITY {
            return;
        }

        self.pending = true;

        let mut end = base;
        for unit in entry.units() {
            if unit == 0x0000 || unit == 0xFFFF || end >= LONG_NAME_CAPACITY {
                break;
            }
            self.buffer[end] = unit as u8;
            end += 1;
        }

        if end > base && end > self.length {
            self.length = end;
        }
    }

    fn take(&mut self) -> String {
        let name = String::from_utf8_lossy(&self.buffer[..self.length]).into_owned();
        self.length = 0;
        self.pending = false;
        name
    }
}

/// A mounted volume: the cached boot sector plus the disk it came from.
struct Volume<'d> {
    disk: &'d Disk,
    partition_start: u64,
    boot: BootSector,
}

impl Volume<'_> {
    fn cluster_lba(&self, cluster: u32) -> u64 {
        self.boot.cluster_lba(self.partition_start, cluster)
    }

    fn fat_begin(&self) -> u64 {
        self.boot.fat_begin(self.partition_start)
    }

    /// Reads all sectors of `cluster` into a fresh buffer.
    fn read_cluster(&self, cluster: u32) -> Result<Vec<u8>, FsError> {
        if cluster < 2 {
            return Err(FsError::IoError);
        }
        let mut buf = vec![0u8; self.boot.bytes_per_cluster()];
        self.disk.read_sectors(
            self.cluster_lba(cluster),
            self.boot.sectors_per_cluster as usize,
            &mut buf,
        )?;
        Ok(buf)
    }

    fn write_cluster(&self, cluster: u32, buf: &[u8]) -> Result<(), FsError> {
        if cluster < 2 {
            return Err(FsError::IoError);
        }
        self.disk.write_sectors(
            self.cluster_lba(cluster),
            self.boot.sectors_per_cluster as usize,
            buf,
        )
    }

    /// Reads the FAT entry of `cluster` from the first FAT copy.
    ///
    /// Returns the free value on I/O failure; chain walkers treat 0 as
    /// "no next cluster".
    fn read_fat_entry(&self, cluster: u32) -> FatEntry {
        let sector = self.fat_begin() + cluster as u64 / FAT_ENTRIES_PER_SECTOR as u64;
        let mut buf = [0u8; SECTOR_SIZE];
        if self.disk.read_sectors(sector, 1, &mut buf).is_err() {
            return FatEntry::from_raw(FAT_FREE);
        }

        let offset = (cluster as usize % FAT_ENTRIES_PER_SECTOR) * FAT_ENTRY_SIZE;
        let raw = u32::from_le_bytes([
            buf[offset],
            buf[offset + 1],
            buf[offset + 2],
            buf[offset + 3],
        ]);
        FatEntry::from_raw(raw)
    }

    /// Read-modify-writes the FAT entry of `cluster`, replacing only the
    /// low 28 bits; the top 4 are reserved and kept.
    fn write_fat_entry(&self, cluster: u32, value: u32) -> Result<(), FsError> {
        let sector = self.fat_begin() + cluster as u64 / FAT_ENTRIES_PER_SECTOR as u64;
        let mut buf = [0u8; SECTOR_SIZE];
        self.disk.read_sectors(sector, 1, &mut buf)?;

        let offset = (cluster as usize % FAT_ENTRIES_PER_SECTOR) * FAT_ENTRY_SIZE;
        let old = u32::from_le_bytes([
            buf[offset],
            buf[offset + 1],
            buf[offset + 2],
            buf[offset + 3],
        ]);
        let new = (old & !FAT_ENTRY_MASK) | (value & FAT_ENTRY_MASK);
        buf[offset..offset + FAT_ENTRY_SIZE].copy_from_slice(&new.to_le_bytes());

        self.disk.write_sectors(sector, 1, &buf)
    }

    /// Next cluster in the chain, or 0 at the end of it. Bad-cluster
    /// values pass through; callers recognize them.
    fn next_cluster(&self, cluster: u32) -> u32 {
        let entry = self.read_fat_entry(cluster);
        if entry.is_end_of_chain() {
            return 0;
        }
        entry.value
    }

    /// First free cluster on the volume, or 0 when the disk is full or a
    /// FAT sector cannot be read.
    fn find_free_cluster(&self) -> u32 {
        let fat_begin = self.fat_begin();
        let mut buf = [0u8; SECTOR_SIZE];

        for sector_index in 0..self.boot.fat_size() as u64 {
            if self
                .disk
                .read_sectors(fat_begin + sector_index, 1, &mut buf)
                .is_err()
            {
                return 0;
            }

            for entry_index in 0..FAT_ENTRIES_PER_SECTOR {
                // Clusters 0 and 1 are reserved
                if sector_index == 0 && entry_index < 2 {
                    continue;
                }

                let offset = entry_index * FAT_ENTRY_SIZE;
                let raw = u32::from_le_bytes([
                    buf[offset],
                    buf[offset + 1],
                    buf[offset + 2],
                    buf[offset + 3],
                ]);
                if raw & FAT_ENTRY_MASK == FAT_FREE {
                    return sector_index as u32 * FAT_ENTRIES_PER_SECTOR as u32
                        + entry_index as u32;
                }
            }
        }

        0
    }

    fn write_fsinfo(&self, fsinfo: &FsInfoSector) -> Result<(), FsError> {
        let lba = self.partition_start + self.boot.fsinfo_sector as u64;
        self.disk.write_sectors(lba, 1, struct_bytes(fsinfo))
    }

    /// Walks the directory starting at `start_cluster` and returns its
    /// records in physical order, long names coalesced into their short
    /// successor. Best-effort: an I/O failure mid-scan returns what was
    /// accumulated so far.
    fn list_directory(&self, start_cluster: u32) -> Vec<FileRecord> {
        let mut records = Vec::new();
        let mut long_name = LongNameState::new();
        let mut cluster = start_cluster;

        loop {
            let Ok(buf) = self.read_cluster(cluster) else {
                return records;
            };

            for slot in 0..self.boot.entries_per_cluster() {
                let entry = entry_at(&buf, slot);

                if entry.is_end_of_directory() {
                    return records;
                }
                if entry.is_deleted() {
                    continue;
                }
                if entry.is_long_name() {
                    long_name.absorb(&long_entry_at(&buf, slot));
                    continue;
                }

                let name = if long_name.pending {
                    long_name.take()
                } else {
                    entry.short_name()
                };

                let flags = entry.flags();
                let directory = flags.contains(FileAttributes::DIRECTORY);
                let file_size = entry.file_size;
                records.push(FileRecord {
                    name,
                    hidden: flags.contains(FileAttributes::HIDDEN),
                    system: flags.contains(FileAttributes::SYSTEM),
                    directory,
                    size: if directory {
                        self.boot.bytes_per_cluster() as u64
                    } else {
                        file_size as u64
                    },
                    location: entry.first_cluster(),
                });
            }

            cluster = self.next_cluster(cluster);
            if cluster == 0 || cluster == FAT_BAD {
                return records;
            }
        }
    }

    /// Resolves a path to the first cluster of its last component.
    ///
    /// The empty path is the root directory. Name comparison is exact;
    /// non-terminal components must be directories.
    fn find_cluster(&self, path: &[&str]) -> Option<u32> {
        let mut cluster = self.boot.root_dir_cluster;
        if path.is_empty() {
            return Some(cluster);
        }

        for (i, component) in path.iter().enumerate() {
            let terminal = i == path.len() - 1;
            let mut found = false;

            for record in self.list_directory(cluster) {
                if (terminal || record.directory) && record.name == *component {
                    cluster = record.location;
                    if terminal {
                        return Some(cluster);
                    }
                    found = true;
                    break;
                }
            }

            if !found {
                return None;
            }
        }

        None
    }

    /// Finds `needed` consecutive reusable slots in a directory cluster,
    /// relocating the end-of-directory sentinel when the chosen run
    /// overlaps or follows it. Fails when the run cannot be placed in
    /// this single cluster; growing a directory by chaining is not
    /// implemented.
    fn find_free_entry(&self, buf: &mut [u8], needed: usize) -> Result<usize, FsError> {
        let slots = self.boot.entries_per_cluster();

        let mut sentinel = None;
        for slot in 0..slots {
            if entry_at(buf, slot).is_end_of_directory() {
                sentinel = Some(slot);
                break;
            }
        }
        let Some(sentinel) = sentinel else {
            warn!("fat32: directory cluster has no end-of-directory marker");
            return Err(FsError::Unsupported);
        };

        let mut run_len = 0;
        let mut run_end = 0;
        for slot in 0..slots {
            let entry = entry_at(buf, slot);
            if entry.is_end_of_directory() || entry.is_deleted() {
                run_len += 1;
                if run_len == needed {
                    run_end = slot;
                    break;
                }
            } else {
                run_len = 0;
            }
        }
        if run_len != needed {
            warn!("fat32: no room for {} entries in directory cluster", needed);
            return Err(FsError::Unsupported);
        }
        let run_start = run_end + 1 - needed;

        // The sentinel sits inside or before the chosen run: move it to
        // the first slot of the unused tail behind the run.
        if sentinel <= run_end {
            let mut new_sentinel = None;
            for slot in (0..slots).rev() {
                if slot <= run_end {
                    break;
                }
                let entry = entry_at(buf, slot);
                if entry.is_end_of_directory() || entry.is_deleted() {
                    new_sentinel = Some(slot);
                } else {
                    break;
                }
            }
            let Some(new_sentinel) = new_sentinel else {
                warn!("fat32: directory cluster full, cannot move end marker");
                return Err(FsError::Unsupported);
            };

            buf[sentinel * DIR_ENTRY_SIZE] = DELETED_ENTRY_MARKER;
            buf[new_sentinel * DIR_ENTRY_SIZE] = END_OF_DIRECTORY_MARKER;
        }

        Ok(run_start)
    }

    /// Creates one entry under `path`: the long-name run, the short
    /// entry, the destination cluster's FAT end-of-chain mark and the
    /// FSInfo update, in that order. Directories additionally get their
    /// dot-entry cluster written last.
    fn create_entry(
        &self,
        fsinfo: &mut FsInfoSector,
        path: &[&str],
        name: &str,
        directory: bool,
    ) -> Result<(), FsError> {
        if name.is_empty() {
            return Err(FsError::InvalidName);
        }

        let parent = self.find_cluster(path).ok_or(FsError::NotFound)?;

        let cluster = self.find_free_cluster();
        if cluster == 0 {
            return Err(FsError::DiskFull);
        }

        let mut parent_buf = self.read_cluster(parent)?;
        let slot = self.find_free_entry(&mut parent_buf, number_of_entries(name))?;
        write_entry_run(&mut parent_buf, slot, name, cluster, directory);
        self.write_cluster(parent, &parent_buf)?;

        self.write_fat_entry(cluster, FAT_END_OF_CHAIN)?;

        fsinfo.free_clusters = fsinfo.free_clusters.saturating_sub(1);
        fsinfo.last_allocated = cluster;
        self.write_fsinfo(fsinfo)?;

        if directory {
            self.init_directory_cluster(cluster, parent)?;
        }

        Ok(())
    }

    /// First cluster of a fresh directory: dot entries up front, every
    /// other slot deleted, the last slot holding the end marker.
    fn init_directory_cluster(&self, cluster: u32, parent: u32) -> Result<(), FsError> {
        let mut buf = vec![0u8; self.boot.bytes_per_cluster()];

        put_entry(&mut buf, 0, &DirEntry::new_directory(".", cluster));
        put_entry(&mut buf, 1, &DirEntry::new_directory("..", parent));

        let slots = self.boot.entries_per_cluster();
        for slot in 2..slots - 1 {
            buf[slot * DIR_ENTRY_SIZE] = DELETED_ENTRY_MARKER;
        }
        buf[(slots - 1) * DIR_ENTRY_SIZE] = END_OF_DIRECTORY_MARKER;

        self.write_cluster(cluster, &buf)
    }

    /// Reads a file's contents, up to its recorded size, stopping early
    /// at the end of the chain or a bad cluster.
    fn read_file_content(&self, path: &[&str], file: &str) -> Vec<u8> {
        let Some(dir_cluster) = self.find_cluster(path) else {
            return Vec::new();
        };
        let Some(record) = self
            .list_directory(dir_cluster)
            .into_iter()
            .find(|record| record.name == file)
        else {
            return Vec::new();
        };
        if record.size == 0 {
            return Vec::new();
        }

        let file_size = record.size as usize;
        let mut content = vec![0u8; file_size];
        let mut read = 0;
        let mut cluster = record.location;

        while read < file_size {
            let Ok(data) = self.read_cluster(cluster) else {
                break;
            };
            let chunk = data.len().min(file_size - read);
            content[read..read + chunk].copy_from_slice(&data[..chunk]);
            read += chunk;

            if read < file_size {
                cluster = self.next_cluster(cluster);
                // Either the recorded size or the FAT entry is wrong
                if cluster == 0 || cluster == FAT_BAD {
                    break;
                }
            }
        }

        content.truncate(read);
        content
    }
}

/// Writes the long-name run and its short successor into a directory
/// cluster buffer starting at `slot`.
fn write_entry_run(buf: &mut [u8], slot: usize, name: &str, first_cluster: u32, directory: bool) {
    let bytes = name.as_bytes();
    let sequences = (bytes.len() - 1) / 11 + 1;

    let short = if directory {
        DirEntry::new_directory(name, first_cluster)
    } else {
        DirEntry::new_file(name, first_cluster)
    };
    let checksum = alias_checksum(&short.name);

    for ordinal in 0..sequences {
        let long = LongNameEntry::new(ordinal, ordinal == sequences - 1, checksum, bytes);
        put_long_entry(buf, slot + ordinal, &long);
    }
    put_entry(buf, slot + sequences, &short);
}

/// Free space on the volume in bytes, from the FSInfo free-cluster
/// count. Returns 0 when the pair cannot be mounted.
pub fn free_size(disk: &Disk, partition: &PartitionDescriptor) -> u64 {
    let mut cache = MOUNT_CACHE.lock();
    let Ok((boot, _, fsinfo)) = mounted_volume(&mut cache, disk, partition) else {
        return 0;
    };

    let free_clusters = fsinfo.free_clusters;
    free_clusters as u64 * boot.bytes_per_cluster() as u64
}

/// Lists the directory named by `path` (empty path: the root). Returns
/// an empty list when the pair cannot be mounted or the path does not
/// resolve.
pub fn ls(disk: &Disk, partition: &PartitionDescriptor, path: &[&str]) -> Vec<FileRecord> {
    let mut cache = MOUNT_CACHE.lock();
    let Ok((boot, partition_start, _)) = mounted_volume(&mut cache, disk, partition) else {
        return Vec::new();
    };
    let volume = Volume {
        disk,
        partition_start,
        boot,
    };

    let Some(cluster) = volume.find_cluster(path) else {
        return Vec::new();
    };
    volume.list_directory(cluster)
}

/// Reads the contents of `file` inside the directory named by `path`.
/// Returns the reachable prefix when the chain ends before the recorded
/// size, and an empty buffer on any resolution or mount failure.
pub fn read_file(
    disk: &Disk,
    partition: &PartitionDescriptor,
    path: &[&str],
    file: &str,
) -> Vec<u8> {
    let mut cache = MOUNT_CACHE.lock();
    let Ok((boot, partition_start, _)) = mounted_volume(&mut cache, disk, partition) else {
        return Vec::new();
    };
    let volume = Volume {
        disk,
        partition_start,
        boot,
    };

    volume.read_file_content(path, file)
}

/// Creates the directory `name` under `path`. Returns whether the
/// directory was created.
pub fn mkdir(disk: &Disk, partition: &PartitionDescriptor, path: &[&str], name: &str) -> bool {
    let mut cache = MOUNT_CACHE.lock();
    let Ok((boot, partition_start, fsinfo)) = mounted_volume(&mut cache, disk, partition) else {
        return false;
    };
    let volume = Volume {
        disk,
        partition_start,
        boot,
    };

    volume.create_entry(fsinfo, path, name, true).is_ok()
}

/// Creates the empty file `name` under `path`. Returns whether the file
/// was created. A data cluster is allocated up front even though the
/// size is zero.
pub fn touch(disk: &Disk, partition: &PartitionDescriptor, path: &[&str], name: &str) -> bool {
    let mut cache = MOUNT_CACHE.lock();
    let Ok((boot, partition_start, fsinfo)) = mounted_volume(&mut cache, disk, partition) else {
        return false;
    };
    let volume = Volume {
        disk,
        partition_start,
        boot,
    };

    volume.create_entry(fsinfo, path, name, false).is_ok()
}

/// Writes a fresh single-FAT FAT32 layout onto `device` starting at
/// `partition_start`: boot sector, FSInfo, a zeroed FAT with the root
/// cluster chain, and a zeroed root directory cluster.
pub fn format(
    device: &mut dyn BlockDevice,
    partition_start: u64,
    sectors_per_cluster: u8,
) -> Result<(), FsError> {
    if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
        return Err(FsError::Unsupported);
    }

    let total_sectors = device.total_sectors().saturating_sub(partition_start);
    let reserved_sectors: u16 = 32;
    let spc = sectors_per_cluster as u64;

    // One FAT entry per cluster the data area could hold, plus the two
    // reserved entries.
    let data_estimate = total_sectors.saturating_sub(reserved_sectors as u64);
    let cluster_estimate = data_estimate / spc + 2;
    let sectors_per_fat = (cluster_estimate as usize * FAT_ENTRY_SIZE).div_ceil(SECTOR_SIZE) as u32;

    let data_start = reserved_sectors as u64 + sectors_per_fat as u64;
    if total_sectors < data_start + spc {
        return Err(FsError::DiskFull);
    }
    let total_clusters = ((total_sectors - data_start) / spc) as u32;

    let boot = BootSector {
        jump_boot: [0xEB, 0x58, 0x90],
        oem_name: *b"FAT32FS ",
        bytes_per_sector: SECTOR_SIZE as u16,
        sectors_per_cluster,
        reserved_sectors,
        fat_count: 1,
        root_dir_entries: 0,
        total_sectors_16: 0,
        media_type: 0xF8,
        sectors_per_fat_16: 0,
        sectors_per_track: 63,
        head_count: 255,
        hidden_sectors: 0,
        total_sectors_32: total_sectors as u32,
        sectors_per_fat,
        ext_flags: 0,
        fs_version: 0,
        root_dir_cluster: 2,
        fsinfo_sector: 1,
        backup_boot_sector: 0,
        reserved: [0; 12],
        drive_number: 0x80,
        reserved1: 0,
        boot_signature: 0x29,
        volume_id: 0x1234_5678,
        volume_label: *b"NO NAME    ",
        fs_type: *b"FAT32   ",
        boot_code: [0; 420],
        signature: 0xAA55,
    };
    device.write_sector(partition_start, struct_bytes(&boot))?;

    let fsinfo = FsInfoSector {
        lead_signature: fsinfo::FSINFO_LEAD_SIGNATURE,
        reserved1: [0; 480],
        struct_signature: fsinfo::FSINFO_STRUCT_SIGNATURE,
        // The root directory occupies one cluster from the start
        free_clusters: total_clusters - 1,
        last_allocated: 2,
        reserved2: [0; 12],
        trail_signature: fsinfo::FSINFO_TRAIL_SIGNATURE,
    };
    device.write_sector(partition_start + 1, struct_bytes(&fsinfo))?;

    let fat_begin = partition_start + reserved_sectors as u64;
    let zero = [0u8; SECTOR_SIZE];
    for sector_index in 1..sectors_per_fat as u64 {
        device.write_sector(fat_begin + sector_index, &zero)?;
    }

    let mut fat_first = [0u8; SECTOR_SIZE];
    fat_first[0..4].copy_from_slice(&0x0FFF_FFF8u32.to_le_bytes());
    fat_first[4..8].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
    fat_first[8..12].copy_from_slice(&FAT_END_OF_CHAIN.to_le_bytes());
    device.write_sector(fat_begin, &fat_first)?;

    let root_lba = partition_start + data_start;
    for sector_index in 0..spc {
        device.write_sector(root_lba + sector_index, &zero)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_count_covers_name_lengths() {
        assert_eq!(number_of_entries("a"), 2);
        assert_eq!(number_of_entries("hello.txt"), 2);
        assert_eq!(number_of_entries(&"x".repeat(11)), 2);
        assert_eq!(number_of_entries(&"x".repeat(12)), 3);
        assert_eq!(number_of_entries(&"x".repeat(22)), 3);
        assert_eq!(number_of_entries(&"x".repeat(23)), 4);
    }

    #[test]
    fn long_name_state_tolerates_any_entry_order() {
        let name = b"a-name-that-spans-three-entries.txt"; // 35 bytes
        let checksum = 0x5A;
        let entries = [
            LongNameEntry::new(0, false, checksum, name),
            LongNameEntry::new(1, false, checksum, name),
            LongNameEntry::new(2, true, checksum, name),
        ];

        // Ascending, as written by the mutator
        let mut state = LongNameState::new();
        for entry in &entries {
            state.absorb(entry);
        }
        assert_eq!(state.take().as_bytes(), name);

        // Descending, as standard VFAT lays runs out physically
        let mut state = LongNameState::new();
        for entry in entries.iter().rev() {
            state.absorb(entry);
        }
        assert_eq!(state.take().as_bytes(), name);
    }

    #[test]
    fn long_name_state_ignores_padding_only_entries() {
        // A 12-byte name occupies two slots by the entry-count formula,
        // but its second long entry carries padding only; the assembled
        // name must not grow past the real bytes.
        let name = b"twelve-chars";
        assert_eq!(name.len(), 12);
        let first = LongNameEntry::new(0, false, 0, name);
        let second = LongNameEntry::new(1, true, 0, name);

        let mut state = LongNameState::new();
        state.absorb(&first);
        state.absorb(&second);
        assert_eq!(state.take().as_bytes(), name);
    }

    #[test]
    fn entry_run_layout_matches_scanner_expectations() {
        let mut buf = vec![0u8; 16 * DIR_ENTRY_SIZE];
        write_entry_run(&mut buf, 0, "notes.md", 7, false);

        let long = long_entry_at(&buf, 0);
        assert_eq!(long.ordinal(), 1);
        assert_eq!(long.sequence_number, 1 | dir_entry::LAST_ORDINAL_FLAG);
        let first_cluster = long.first_cluster;
        assert_eq!(first_cluster, 0);

        let short = entry_at(&buf, 1);
        assert!(!short.is_long_name());
        assert_eq!(short.first_cluster(), 7);
        assert_eq!(long.alias_checksum, alias_checksum(&short.name));
    }
}
