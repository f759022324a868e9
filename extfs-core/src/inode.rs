//! Per-file metadata record, its block map / extent tree, and block
//! enumeration.

use crate::consts::{
    EXT4_EXTENTS_FL, INODE_DIRECT_COUNT, INODE_FIXED_SIZE, INODE_PAYLOAD_SIZE, S_IFDIR, S_IFLNK,
};
use crate::error::Result;
use crate::extent::{self, ExtentHeader, ExtentNode};
use crate::fs::{Fs, IterationDecision};
use crate::reader::ByteReader;

/// The 60-byte inode payload window, classified once at parse time.
#[derive(Debug, Clone)]
pub enum Payload {
    /// `size < 60` symlink: the target string lives in the window itself.
    InlineSymlink(Vec<u8>),
    ExtentTree {
        header: ExtentHeader,
        nodes: Vec<ExtentNode>,
    },
    BlockMap([u32; 15]),
}

#[derive(Debug, Clone)]
pub struct Inode {
    pub mode: u16,
    pub uid: u16,
    pub size: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub gid: u16,
    pub links_count: u16,
    pub blocks: u32,
    pub flags: u32,
    pub osd1: u32,
    pub payload: Payload,
    pub generation: u32,
    pub file_acl: u32,
    pub dir_acl: u32,
    pub faddr: u32,
    pub osd2: [u8; 12],
    /// true iff the first 128 bytes of the record are all zero.
    pub empty: bool,
}

impl Inode {
    pub fn parse(mut r: ByteReader) -> Result<Self> {
        let snapshot_cursor = r.get_cursor();
        let mut snapshot = r;
        let raw = snapshot.read_bytes(INODE_FIXED_SIZE)?;
        let empty = raw.iter().all(|&b| b == 0);
        r.set_cursor(snapshot_cursor);

        let mode = r.read_u16_le()?;
        let uid = r.read_u16_le()?;
        let size = r.read_u32_le()?;
        let atime = r.read_u32_le()?;
        let ctime = r.read_u32_le()?;
        let mtime = r.read_u32_le()?;
        let dtime = r.read_u32_le()?;
        let gid = r.read_u16_le()?;
        let links_count = r.read_u16_le()?;
        let blocks = r.read_u32_le()?;
        let flags = r.read_u32_le()?;
        let osd1 = r.read_u32_le()?;

        let is_symlink = (mode & 0xF000) == S_IFLNK && size < 60;
        let payload_cursor = r.get_cursor();
        let payload = if is_symlink {
            Payload::InlineSymlink(r.read_bytes(size as usize)?.to_vec())
        } else if flags & EXT4_EXTENTS_FL != 0 {
            let (header, nodes) = extent::parse_tree(r)?;
            Payload::ExtentTree { header, nodes }
        } else {
            let mut blocks = [0u32; 15];
            for slot in blocks.iter_mut() {
                *slot = r.read_u32_le()?;
            }
            Payload::BlockMap(blocks)
        };
        r.set_cursor(payload_cursor + INODE_PAYLOAD_SIZE as u64);

        let generation = r.read_u32_le()?;
        let file_acl = r.read_u32_le()?;
        let dir_acl = r.read_u32_le()?;
        let faddr = r.read_u32_le()?;
        let osd2 = r.read_bytes(12)?.try_into().unwrap();

        Ok(Inode {
            mode,
            uid,
            size,
            atime,
            ctime,
            mtime,
            dtime,
            gid,
            links_count,
            blocks,
            flags,
            osd1,
            payload,
            generation,
            file_acl,
            dir_acl,
            faddr,
            osd2,
            empty,
        })
    }

    pub fn is_dir(&self) -> bool {
        (self.mode & 0xF000) == S_IFDIR
    }

    /// True for any symlink, inline or out-of-line. Broader than the
    /// on-disk format's inline-only `is_symlink` test (see
    /// [`Inode::is_inline_symlink`]); this is the one callers should use to
    /// decide "does this inode have a target to resolve."
    pub fn is_symlink(&self) -> bool {
        (self.mode & 0xF000) == S_IFLNK
    }

    /// The inline form only: `mode & 0xF000 == S_IFLNK && size < 60`, the
    /// target is embedded in the 60-byte payload window rather than a data
    /// block.
    pub fn is_inline_symlink(&self) -> bool {
        self.is_symlink() && matches!(self.payload, Payload::InlineSymlink(_))
    }

    pub fn is_regular_file(&self) -> bool {
        (self.mode & 0xF000) == 0x8000
    }

    pub fn data_size(&self) -> u64 {
        self.size as u64
    }

    /// The inline symlink target, if this inode is an inline symlink.
    /// Non-inline symlinks (target stored in a data block) return `None`
    /// here; use [`Inode::symlink_target`] to resolve either kind uniformly.
    pub fn inline_symlink_target(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::InlineSymlink(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Resolves this symlink's target regardless of whether it was stored
    /// inline in the inode payload or out-of-line in a data block. Returns
    /// `Ok(None)` if this inode isn't a symlink at all.
    pub fn symlink_target(&self, fs: &Fs) -> Result<Option<Vec<u8>>> {
        if !self.is_symlink() {
            return Ok(None);
        }
        if let Some(inline) = self.inline_symlink_target() {
            return Ok(Some(inline.to_vec()));
        }
        let mut target = None;
        self.enum_blocks(fs, |block| {
            target = Some(block.to_vec());
            IterationDecision::Break
        })?;
        Ok(target.map(|mut bytes| {
            bytes.truncate(self.size as usize);
            bytes
        }))
    }

    /// Enumerates this inode's data blocks in logical order, invoking
    /// `callback` with each block's raw payload. Stops early if `callback`
    /// returns [`IterationDecision::Break`] or once `data_size()` bytes have
    /// been emitted.
    pub fn enum_blocks(
        &self,
        fs: &Fs,
        mut callback: impl FnMut(&[u8]) -> IterationDecision,
    ) -> Result<()> {
        match &self.payload {
            Payload::InlineSymlink(_) => Ok(()),
            Payload::ExtentTree { nodes, .. } => {
                extent::enumerate(fs.super_block(), nodes, 0, &mut callback)?;
                Ok(())
            }
            Payload::BlockMap(blocks) => self.enum_block_map(fs, blocks, &mut callback),
        }
    }

    fn enum_block_map(
        &self,
        fs: &Fs,
        blocks: &[u32; 15],
        callback: &mut impl FnMut(&[u8]) -> IterationDecision,
    ) -> Result<()> {
        let blocksize = fs.super_block().blocksize();
        let mut emitted_bytes: u64 = 0;
        let budget = self.data_size();

        for &block in blocks.iter().take(INODE_DIRECT_COUNT) {
            if emitted_bytes >= budget {
                return Ok(());
            }
            if block != 0 {
                let reader = fs.super_block().block(block as u64)?;
                if !self.feed(fs, reader, callback)? {
                    return Ok(());
                }
                emitted_bytes += blocksize;
            }
        }

        for (depth, &indirect_block) in blocks[12..15].iter().enumerate() {
            if indirect_block == 0 || emitted_bytes >= budget {
                continue;
            }
            if !self.enum_indirect(fs, indirect_block, depth as u32 + 1, &mut emitted_bytes, budget, callback)? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Recursively walks a single/double/triple-indirect block. `depth` is
    /// 1 for a singly-indirect block, 2 for doubly-, 3 for triply-.
    /// Zero pointers (holes) are elided, never surfaced to `callback`.
    fn enum_indirect(
        &self,
        fs: &Fs,
        block_num: u32,
        depth: u32,
        emitted_bytes: &mut u64,
        budget: u64,
        callback: &mut impl FnMut(&[u8]) -> IterationDecision,
    ) -> Result<bool> {
        let blocksize = fs.super_block().blocksize();
        let ptrs_per_block = (blocksize / 4) as usize;
        let mut reader = fs.super_block().block(block_num as u64)?;

        for slot in 0..ptrs_per_block {
            if *emitted_bytes >= budget {
                return Ok(true);
            }
            let ptr = reader.read_u32_le()?;
            if ptr == 0 {
                log::debug!(
                    "elided hole at depth {} slot {} of indirect block {}",
                    depth,
                    slot,
                    block_num
                );
                continue;
            }
            if depth == 1 {
                let data_reader = fs.super_block().block(ptr as u64)?;
                if !self.feed(fs, data_reader, callback)? {
                    return Ok(false);
                }
                *emitted_bytes += blocksize;
            } else if !self.enum_indirect(fs, ptr, depth - 1, emitted_bytes, budget, callback)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn feed(
        &self,
        fs: &Fs,
        mut reader: ByteReader,
        callback: &mut impl FnMut(&[u8]) -> IterationDecision,
    ) -> Result<bool> {
        let blocksize = fs.super_block().blocksize() as usize;
        let data = reader.read_bytes(blocksize)?;
        Ok(callback(data) == IterationDecision::Continue)
    }
}
