//! FAT32 filesystem driver.
//!
//! Sits above a 512-byte-sector block device and below a VFS or shell.
//! A volume is addressed by a ([`block::Disk`], [`block::PartitionDescriptor`])
//! pair; the driver caches the boot sector and FSInfo sector of the most
//! recently touched pair and exposes five operations: [`fat32::free_size`],
//! [`fat32::ls`], [`fat32::read_file`], [`fat32::mkdir`] and
//! [`fat32::touch`].
#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::string::String;

pub mod block;
pub mod fat32;

/// Errors surfaced by the driver internals.
///
/// The public operations fold these into their empty/false/zero returns;
/// the enum is exported for hosts that call the lower-level helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// The boot sector or FSInfo sector could not be read or is invalid.
    MountFailed,
    /// A path component or file name did not resolve.
    NotFound,
    /// A sector read or write failed mid-operation.
    IoError,
    /// No free cluster is left on the volume.
    DiskFull,
    /// The operation needs directory growth that is not implemented.
    Unsupported,
    /// An empty or otherwise unusable name was given.
    InvalidName,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// File name, long form when the entry carries one.
    pub name: String,
    /// Hidden attribute bit.
    pub hidden: bool,
    /// System attribute bit.
    pub system: bool,
    /// Directory attribute bit.
    pub directory: bool,
    /// Size in bytes; directories report one cluster.
    pub size: u64,
    /// First cluster of the entry's chain.
    pub location: u32,
}
