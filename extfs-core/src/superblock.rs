//! The filesystem-wide metadata record at offset 0x400.

use crate::consts::{IncompatFeatures, SUPERBLOCK_MAGIC, SUPERBLOCK_OFFSET};
use crate::error::{Error, Result};
use crate::reader::ByteReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorVariant {
    Classic32,
    Ext4_64,
}

/// Filesystem-wide parameters, decoded once at open time.
///
/// Holds a reference to the whole image so it can vend block-addressed
/// sub-readers via [`Superblock::block`] without the caller threading a
/// separate byte source through every call.
#[derive(Debug, Clone, Copy)]
pub struct Superblock<'a> {
    bytes: &'a [u8],

    pub s_inodes_count: u32,
    pub s_blocks_count: u32,
    pub s_r_blocks_count: u32,
    pub s_free_blocks_count: u32,
    pub s_free_inodes_count: u32,
    pub s_first_data_block: u32,
    pub s_log_block_size: u32,
    pub s_log_frag_size: i32,
    pub s_blocks_per_group: u32,
    pub s_frags_per_group: u32,
    pub s_inodes_per_group: u32,
    pub s_mtime: u32,
    pub s_wtime: u32,
    pub s_mnt_count: u16,
    pub s_max_mnt_count: u16,
    pub s_magic: u16,
    pub s_state: u16,
    pub s_errors: u16,
    pub s_minor_rev_level: u16,
    pub s_lastcheck: u32,
    pub s_checkinterval: u32,
    pub s_creator_os: u32,
    pub s_rev_level: u32,
    pub s_def_resuid: u16,
    pub s_def_resgid: u16,
    pub s_first_ino: u32,
    pub s_inode_size: u16,
    pub s_block_group_nr: u16,
    pub s_feature_compat: u32,
    pub s_feature_incompat: u32,
    pub s_feature_ro_compat: u32,
    pub s_uuid: [u8; 16],
    pub s_volume_name: [u8; 16],
    pub s_last_mounted: [u8; 64],
    pub s_algo_bitmap: u32,
}

impl<'a> Superblock<'a> {
    /// Decode the superblock at `base_offset` (spec default: 0x400).
    pub fn parse(bytes: &'a [u8], base_offset: u64) -> Result<Self> {
        Self::decode(bytes, base_offset).map_err(|err| match err {
            // A source too small to hold a superblock at all isn't an ext
            // image; a mmap-backed source would simply read zeros here
            // rather than erroring, so collapse the distinction.
            Error::ShortRead { .. } => Error::NotExtFilesystem,
            other => other,
        })
    }

    fn decode(bytes: &'a [u8], base_offset: u64) -> Result<Self> {
        let mut r = ByteReader::at(bytes, base_offset);

        let s_inodes_count = r.read_u32_le()?;
        let s_blocks_count = r.read_u32_le()?;
        let s_r_blocks_count = r.read_u32_le()?;
        let s_free_blocks_count = r.read_u32_le()?;
        let s_free_inodes_count = r.read_u32_le()?;
        let s_first_data_block = r.read_u32_le()?;
        let s_log_block_size = r.read_u32_le()?;
        let s_log_frag_size = r.read_i32_le()?;
        let s_blocks_per_group = r.read_u32_le()?;
        let s_frags_per_group = r.read_u32_le()?;
        let s_inodes_per_group = r.read_u32_le()?;
        let s_mtime = r.read_u32_le()?;
        let s_wtime = r.read_u32_le()?;
        let s_mnt_count = r.read_u16_le()?;
        let s_max_mnt_count = r.read_u16_le()?;
        let s_magic = r.read_u16_le()?;
        let s_state = r.read_u16_le()?;
        let s_errors = r.read_u16_le()?;
        let s_minor_rev_level = r.read_u16_le()?;
        let s_lastcheck = r.read_u32_le()?;
        let s_checkinterval = r.read_u32_le()?;
        let s_creator_os = r.read_u32_le()?;
        let s_rev_level = r.read_u32_le()?;
        let s_def_resuid = r.read_u16_le()?;
        let s_def_resgid = r.read_u16_le()?;
        let s_first_ino = r.read_u32_le()?;
        let s_inode_size = r.read_u16_le()?;
        let s_block_group_nr = r.read_u16_le()?;
        let s_feature_compat = r.read_u32_le()?;
        let s_feature_incompat = r.read_u32_le()?;
        let s_feature_ro_compat = r.read_u32_le()?;
        let s_uuid = r.read_bytes(16)?.try_into().unwrap();
        let s_volume_name = r.read_bytes(16)?.try_into().unwrap();
        let s_last_mounted = r.read_bytes(64)?.try_into().unwrap();
        let s_algo_bitmap = r.read_u32_le()?;

        if s_magic != SUPERBLOCK_MAGIC {
            log::warn!("superblock magic {:#x} != {:#x}", s_magic, SUPERBLOCK_MAGIC);
            return Err(Error::NotExtFilesystem);
        }

        Ok(Superblock {
            bytes,
            s_inodes_count,
            s_blocks_count,
            s_r_blocks_count,
            s_free_blocks_count,
            s_free_inodes_count,
            s_first_data_block,
            s_log_block_size,
            s_log_frag_size,
            s_blocks_per_group,
            s_frags_per_group,
            s_inodes_per_group,
            s_mtime,
            s_wtime,
            s_mnt_count,
            s_max_mnt_count,
            s_magic,
            s_state,
            s_errors,
            s_minor_rev_level,
            s_lastcheck,
            s_checkinterval,
            s_creator_os,
            s_rev_level,
            s_def_resuid,
            s_def_resgid,
            s_first_ino,
            s_inode_size,
            s_block_group_nr,
            s_feature_compat,
            s_feature_incompat,
            s_feature_ro_compat,
            s_uuid,
            s_volume_name,
            s_last_mounted,
            s_algo_bitmap,
        })
    }

    pub fn blocksize(&self) -> u64 {
        1024u64 << self.s_log_block_size
    }

    /// Number of block groups, rounded up: `s_inodes_count` isn't
    /// guaranteed to be an exact multiple of `s_inodes_per_group`.
    pub fn group_count(&self) -> u32 {
        div_ceil(self.s_inodes_count, self.s_inodes_per_group)
    }

    pub fn bytes_per_group(&self) -> u64 {
        self.s_blocks_per_group as u64 * self.blocksize()
    }

    pub fn descriptor_table_offset(&self) -> u64 {
        if self.blocksize() == 1024 {
            2048
        } else {
            self.blocksize()
        }
    }

    pub fn descriptor_variant(&self) -> DescriptorVariant {
        let incompat = IncompatFeatures::from_bits_truncate(self.s_feature_incompat);
        let variant = if incompat.contains(IncompatFeatures::EXTENTS | IncompatFeatures::SIXTY_FOUR_BIT) {
            DescriptorVariant::Ext4_64
        } else {
            DescriptorVariant::Classic32
        };
        log::debug!(
            "feature_incompat {:#x} -> {:?} block group descriptors",
            self.s_feature_incompat,
            variant
        );
        variant
    }

    /// A fresh reader positioned at the start of block `n`.
    pub fn block(&self, n: u64) -> Result<ByteReader<'a>> {
        if n >= self.s_blocks_count as u64 {
            return Err(Error::BlockOutOfRange(n));
        }
        Ok(ByteReader::at(self.bytes, n * self.blocksize()))
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

fn div_ceil(x: u32, y: u32) -> u32 {
    if x == 0 {
        0
    } else {
        1 + (x - 1) / y
    }
}
