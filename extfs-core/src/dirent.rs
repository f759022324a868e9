//! Variable-length directory entries packed into a directory data block.

use crate::consts::FileType;
use crate::error::{Error, Result};
use crate::reader::ByteReader;

#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub filetype: FileType,
    pub name: Vec<u8>,
}

impl DirectoryEntry {
    fn parse(r: &mut ByteReader) -> Result<Self> {
        let inode = r.read_u32_le()?;
        let rec_len = r.read_u16_le()?;
        let name_len = r.read_u8()?;
        let filetype = FileType::from_raw(r.read_u8()?);
        if rec_len != 0 && (rec_len as usize) < 8 + name_len as usize {
            log::warn!(
                "invalid directory record at offset {}: rec_len {} shorter than header (8) plus name ({})",
                r.get_cursor() - 8,
                rec_len,
                name_len
            );
            return Err(Error::InvalidDirectoryRecord(
                "rec_len shorter than header plus name",
            ));
        }
        let name = if rec_len == 0 {
            Vec::new()
        } else {
            r.read_bytes(name_len as usize)?.to_vec()
        };
        Ok(DirectoryEntry {
            inode,
            rec_len,
            name_len,
            filetype,
            name,
        })
    }

    pub fn name_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

/// Decodes every entry in one `blocksize`-byte directory data block,
/// invoking `callback` for each one that isn't `.`, `..`, or
/// `EXT4_FT_UNKNOWN`.
pub fn for_each_entry(
    block: &[u8],
    mut callback: impl FnMut(&DirectoryEntry),
) -> Result<()> {
    let mut r = ByteReader::new(block);
    let blocksize = block.len() as u64;

    while r.get_cursor() < blocksize {
        let entry_offset = r.get_cursor();
        let entry = DirectoryEntry::parse(&mut r)?;
        if entry.rec_len == 0 {
            if entry_offset + 8 < blocksize {
                log::debug!(
                    "truncated directory record: rec_len == 0 at offset {} of a {}-byte block",
                    entry_offset,
                    blocksize
                );
            }
            break;
        }
        r.set_cursor(r.get_cursor() - (8 + entry.name_len as u64) + entry.rec_len as u64);

        if entry.inode == 0 {
            continue;
        }
        if matches!(entry.filetype, FileType::Unknown) {
            continue;
        }
        if entry.name.as_slice() == b"." || entry.name.as_slice() == b".." {
            continue;
        }
        callback(&entry);
    }
    Ok(())
}
