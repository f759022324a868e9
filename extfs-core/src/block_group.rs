//! Block group descriptors and the block groups built from them.

use crate::inode::Inode;
use crate::reader::ByteReader;
use crate::superblock::{DescriptorVariant, Superblock};
use crate::error::Result;

const CLASSIC32_SIZE: u64 = 32;
const EXT4_64_SIZE: u64 = 64;

/// A tagged union over the two on-disk descriptor layouts. The variant is
/// picked once at superblock parse time (by [`Superblock::descriptor_variant`]),
/// never re-derived per entry.
#[derive(Debug, Clone, Copy)]
pub enum BlockGroupDescriptor {
    Classic32 { inode_table_lo: u32 },
    Ext4_64 { inode_table_lo: u32, inode_table_hi: u32 },
}

impl BlockGroupDescriptor {
    pub fn inode_table_start_block(&self) -> u64 {
        match *self {
            BlockGroupDescriptor::Classic32 { inode_table_lo } => inode_table_lo as u64,
            BlockGroupDescriptor::Ext4_64 {
                inode_table_lo,
                inode_table_hi,
            } => ((inode_table_hi as u64) << 32) | inode_table_lo as u64,
        }
    }

    fn parse_one(r: &mut ByteReader, variant: DescriptorVariant) -> Result<Self> {
        match variant {
            DescriptorVariant::Classic32 => {
                let _bg_block_bitmap = r.read_u32_le()?;
                let _bg_inode_bitmap = r.read_u32_le()?;
                let inode_table_lo = r.read_u32_le()?;
                let _bg_free_blocks_count = r.read_u16_le()?;
                let _bg_free_inodes_count = r.read_u16_le()?;
                let _bg_used_dirs_count = r.read_u16_le()?;
                let _bg_pad = r.read_u16_le()?;
                Ok(BlockGroupDescriptor::Classic32 { inode_table_lo })
            }
            DescriptorVariant::Ext4_64 => {
                let _bg_block_bitmap_lo = r.read_u32_le()?;
                let _bg_inode_bitmap_lo = r.read_u32_le()?;
                let inode_table_lo = r.read_u32_le()?;
                let _bg_free_blocks_count_lo = r.read_u16_le()?;
                let _bg_free_inodes_count_lo = r.read_u16_le()?;
                let _bg_used_dirs_count_lo = r.read_u16_le()?;
                let _bg_flags = r.read_u16_le()?;
                let _bg_exclude_bitmap_lo = r.read_u32_le()?;
                let _bg_block_bitmap_csum_lo = r.read_u16_le()?;
                let _bg_inode_bitmap_csum_lo = r.read_u16_le()?;
                let _bg_itable_unused_lo = r.read_u16_le()?;
                let _bg_checksum = r.read_u16_le()?;
                let _bg_block_bitmap_hi = r.read_u32_le()?;
                let _bg_inode_bitmap_hi = r.read_u32_le()?;
                let inode_table_hi = r.read_u32_le()?;
                let _bg_free_blocks_count_hi = r.read_u16_le()?;
                let _bg_free_inodes_count_hi = r.read_u16_le()?;
                let _bg_used_dirs_count_hi = r.read_u16_le()?;
                let _bg_itable_unused_hi = r.read_u16_le()?;
                let _bg_exclude_bitmap_hi = r.read_u32_le()?;
                let _bg_block_bitmap_csum_hi = r.read_u16_le()?;
                let _bg_inode_bitmap_csum_hi = r.read_u16_le()?;
                let _bg_reserved = r.read_u32_le()?;
                Ok(BlockGroupDescriptor::Ext4_64 {
                    inode_table_lo,
                    inode_table_hi,
                })
            }
        }
    }

    fn size(variant: DescriptorVariant) -> u64 {
        match variant {
            DescriptorVariant::Classic32 => CLASSIC32_SIZE,
            DescriptorVariant::Ext4_64 => EXT4_64_SIZE,
        }
    }
}

/// Decodes `count` contiguous descriptors of `variant`'s fixed size,
/// starting at `offset`.
pub fn parse_all(
    bytes: &[u8],
    offset: u64,
    count: u32,
    variant: DescriptorVariant,
) -> Result<Vec<BlockGroupDescriptor>> {
    let size = BlockGroupDescriptor::size(variant);
    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count as u64 {
        let mut r = ByteReader::at(bytes, offset + i * size);
        out.push(BlockGroupDescriptor::parse_one(&mut r, variant)?);
    }
    Ok(out)
}

/// Binds one descriptor to the superblock: everything needed to look an
/// inode up by its index within the group.
#[derive(Debug, Clone, Copy)]
pub struct BlockGroup {
    pub inode_table_byte_offset: u64,
    pub inodes_per_group: u32,
    pub inode_size: u32,
}

impl BlockGroup {
    pub fn new(super_block: &Superblock, desc: &BlockGroupDescriptor) -> Self {
        BlockGroup {
            inode_table_byte_offset: desc.inode_table_start_block() * super_block.blocksize(),
            inodes_per_group: super_block.s_inodes_per_group,
            inode_size: super_block.s_inode_size as u32,
        }
    }

    pub fn inode_byte_offset(&self, local_index: u32) -> u64 {
        self.inode_table_byte_offset + local_index as u64 * self.inode_size as u64
    }

    pub fn get_inode<'a>(&self, bytes: &'a [u8], local_index: u32) -> Result<Inode> {
        let r = ByteReader::at(bytes, self.inode_byte_offset(local_index));
        Inode::parse(r)
    }
}
