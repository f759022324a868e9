//! `std::fs`-backed implementation of `extfs_core::InodeWriter`: the
//! destination side of extraction.

use std::fs::{File, FileTimes};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, SystemTime};

use extfs_core::InodeWriter;

pub struct FileWriter {
    file: File,
}

impl FileWriter {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(FileWriter { file })
    }
}

impl InodeWriter for FileWriter {
    type Error = std::io::Error;

    fn write_block(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.file.write_all(data)
    }

    fn finish(&mut self, size: u64, mode: u16, atime: u32, mtime: u32) -> std::io::Result<()> {
        self.file.set_len(size)?;
        self.file
            .set_permissions(std::fs::Permissions::from_mode((mode & 0o7777) as u32))?;
        let times = FileTimes::new()
            .set_accessed(epoch_seconds(atime))
            .set_modified(epoch_seconds(mtime));
        self.file.set_times(times)?;
        Ok(())
    }
}

fn epoch_seconds(secs: u32) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs as u64)
}

/// Creates a symlink at `path` pointing at `target`. Symlink creation isn't
/// part of `InodeWriter` (there's no block stream to write), so the walk
/// driver calls this directly for `EXT4_FT_SYMLINK` entries.
pub fn create_symlink(path: &Path, target: &[u8]) -> std::io::Result<()> {
    let target = String::from_utf8_lossy(target);
    std::os::unix::fs::symlink(target.as_ref(), path)
}
