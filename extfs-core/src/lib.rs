//! On-disk format decoder and tree walker for ext2/ext3/ext4 filesystem
//! images.
//!
//! The entry point is [`Fs::open`], which decodes a superblock and its
//! block group descriptors from a borrowed byte slice. From there,
//! [`Fs::inode`] decodes individual inodes, [`Fs::walk`] drives a
//! depth-first directory traversal, and [`Fs::export_file`] streams a
//! regular file's (or symlink's) data blocks out through a caller-supplied
//! [`InodeWriter`].

mod block_group;
mod consts;
mod dirent;
mod error;
mod extent;
mod fs;
mod inode;
mod reader;
mod superblock;

#[cfg(test)]
mod test_support;

pub use consts::{FileType, ROOT_INODE};
pub use dirent::DirectoryEntry;
pub use error::{Error, ExportError, Result};
pub use fs::{Fs, InodeWriter, IterationDecision};
pub use inode::{Inode, Payload};
pub use reader::ByteReader;
pub use superblock::{DescriptorVariant, Superblock};
