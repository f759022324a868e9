//! Hand-built minimal ext2 images for unit and integration tests.
//!
//! Real `.img` fixtures aren't checked into this repository; these helpers
//! assemble just enough of the on-disk format, byte by byte, to exercise the
//! decoder without needing binary fixtures on disk.

pub const BLOCKSIZE: usize = 1024;

pub struct ImageBuilder {
    blocks: Vec<[u8; BLOCKSIZE]>,
    inodes_per_group: u32,
    inode_size: u32,
}

impl ImageBuilder {
    pub fn new(num_blocks: usize, inodes_per_group: u32, inode_size: u32) -> Self {
        ImageBuilder {
            blocks: vec![[0u8; BLOCKSIZE]; num_blocks],
            inodes_per_group,
            inode_size,
        }
    }

    pub fn block_mut(&mut self, n: usize) -> &mut [u8; BLOCKSIZE] {
        &mut self.blocks[n]
    }

    fn put_u16(block: &mut [u8], off: usize, v: u16) {
        block[off..off + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn put_u32(block: &mut [u8], off: usize, v: u32) {
        block[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// Writes a superblock into block 1 (offset 1024), with just the
    /// fields this decoder reads populated.
    pub fn write_superblock(&mut self, num_blocks: u32, num_inodes: u32, feature_incompat: u32) {
        let block = &mut self.blocks[1];
        Self::put_u32(block, 0, num_inodes); // s_inodes_count
        Self::put_u32(block, 4, num_blocks); // s_blocks_count
        Self::put_u32(block, 20, 1); // s_first_data_block
        Self::put_u32(block, 24, 0); // s_log_block_size -> 1024 << 0
        Self::put_u32(block, 32, 8192); // s_blocks_per_group
        Self::put_u32(block, 40, self.inodes_per_group); // s_inodes_per_group
        Self::put_u16(block, 56, 0xEF53); // s_magic
        Self::put_u16(block, 88, self.inode_size as u16); // s_inode_size
        Self::put_u32(block, 96, feature_incompat); // s_feature_incompat
    }

    /// 32-byte classic block group descriptor at block 2 (offset 2048),
    /// group 0 only.
    pub fn write_classic_group_descriptor(&mut self, inode_table_block: u32) {
        let block = &mut self.blocks[2];
        Self::put_u32(block, 8, inode_table_block); // bg_inode_table
    }

    /// Writes one 128-byte inode record into the inode table starting at
    /// `inode_table_block`, at local (0-based) index `local_index`.
    #[allow(clippy::too_many_arguments)]
    pub fn write_inode(
        &mut self,
        inode_table_block: usize,
        local_index: u32,
        mode: u16,
        size: u32,
        atime: u32,
        mtime: u32,
        flags: u32,
        direct_blocks: &[u32],
    ) {
        let inode_size = self.inode_size as usize;
        let byte_offset = local_index as usize * inode_size;
        let block_span = byte_offset / BLOCKSIZE;
        let in_block_offset = byte_offset % BLOCKSIZE;
        let block = &mut self.blocks[inode_table_block + block_span];

        Self::put_u16(block, in_block_offset, mode);
        Self::put_u32(block, in_block_offset + 4, size);
        Self::put_u32(block, in_block_offset + 8, atime);
        Self::put_u32(block, in_block_offset + 16, mtime);
        Self::put_u32(block, in_block_offset + 32, flags);
        for (i, &b) in direct_blocks.iter().enumerate().take(15) {
            Self::put_u32(block, in_block_offset + 40 + i * 4, b);
        }
    }

    /// Writes an inline-symlink inode: `target` goes straight into the
    /// 60-byte payload window in place of block pointers.
    pub fn write_inline_symlink_inode(
        &mut self,
        inode_table_block: usize,
        local_index: u32,
        mode: u16,
        target: &[u8],
    ) {
        let inode_size = self.inode_size as usize;
        let byte_offset = local_index as usize * inode_size;
        let block_span = byte_offset / BLOCKSIZE;
        let in_block_offset = byte_offset % BLOCKSIZE;
        let block = &mut self.blocks[inode_table_block + block_span];

        Self::put_u16(block, in_block_offset, mode);
        Self::put_u32(block, in_block_offset + 4, target.len() as u32);
        block[in_block_offset + 40..in_block_offset + 40 + target.len()].copy_from_slice(target);
    }

    /// Writes a singly-indirect pointer block at `block_num`, with `ptrs`
    /// (zero entries are holes) filling its first slots.
    pub fn write_indirect_block(&mut self, block_num: usize, ptrs: &[u32]) {
        for (i, &p) in ptrs.iter().enumerate() {
            Self::put_u32(&mut self.blocks[block_num], i * 4, p);
        }
    }

    /// Packs directory entries into `block_num`, padding the final entry's
    /// `rec_len` so the sum covers the whole block.
    pub fn write_directory_block(&mut self, block_num: usize, entries: &[(u32, u8, &str)]) {
        let block = &mut self.blocks[block_num];
        let mut off = 0usize;
        for (i, (inode, filetype, name)) in entries.iter().enumerate() {
            let header_len = 8 + name.len();
            let rec_len = if i == entries.len() - 1 {
                BLOCKSIZE - off
            } else {
                (header_len + 3) & !3
            };
            Self::put_u32(block, off, *inode);
            Self::put_u16(block, off + 4, rec_len as u16);
            block[off + 6] = name.len() as u8;
            block[off + 7] = *filetype;
            block[off + 8..off + 8 + name.len()].copy_from_slice(name.as_bytes());
            off += rec_len;
        }
    }

    pub fn write_bytes(&mut self, block_num: usize, data: &[u8]) {
        let block = &mut self.blocks[block_num];
        block[..data.len()].copy_from_slice(data);
    }

    pub fn finish(self) -> Vec<u8> {
        self.blocks.concat()
    }
}

/// A tiny, valid ext2 image: one block group, a root directory containing
/// `.`, `..`, a subdirectory `sub/`, and a regular file `hello.txt`.
///
/// Layout (1 KiB blocks): 0 boot, 1 superblock, 2 group descriptor,
/// 3 inode table (16 * 128B = 2 blocks: 3-4), 5 root dir data,
/// 6 sub dir data, 7 hello.txt data.
pub fn build_minimal_image() -> Vec<u8> {
    let mut b = ImageBuilder::new(10, 16, 128);
    b.write_superblock(10, 16, 0);
    b.write_classic_group_descriptor(3);

    // inode 2 (local index 1): root directory, one block.
    b.write_inode(3, 1, 0x4000 | 0o755, BLOCKSIZE as u32, 1_700_000_000, 1_700_000_001, 0, &[5]);
    // inode 11 (local index 10): subdirectory `sub`.
    b.write_inode(3, 10, 0x4000 | 0o755, BLOCKSIZE as u32, 1_700_000_000, 1_700_000_001, 0, &[6]);
    // inode 12 (local index 11): regular file `hello.txt`, 5 bytes.
    b.write_inode(3, 11, 0x8000 | 0o644, 5, 1_700_000_000, 1_700_000_001, 0, &[7]);

    b.write_directory_block(
        5,
        &[(2, 2, "."), (2, 2, ".."), (12, 1, "hello.txt"), (11, 2, "sub")],
    );
    b.write_directory_block(6, &[(11, 2, "."), (2, 2, "..")]);
    b.write_bytes(7, b"hello");

    b.finish()
}
