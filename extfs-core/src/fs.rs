//! The open filesystem handle: superblock, descriptors, groups, and the
//! directory walker built on top of them.

use crate::block_group::{self, BlockGroup};
use crate::consts::ROOT_INODE;
use crate::dirent;
use crate::error::{Error, ExportError, Result};
use crate::inode::Inode;
use crate::superblock::Superblock;

/// Two-variant control flow for block and directory enumeration callbacks,
/// in place of a bare `bool` whose polarity isn't obvious at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationDecision {
    Continue,
    Break,
}

/// The write-side counterpart to [`Fs::export_file`]: an open destination
/// for one inode's materialized contents. `extfs-core` never touches a real
/// filesystem; this trait is the seam a caller (or a test) fills in.
pub trait InodeWriter {
    type Error: std::error::Error + Send + Sync + 'static;

    fn write_block(&mut self, data: &[u8]) -> std::result::Result<(), Self::Error>;

    fn finish(
        &mut self,
        size: u64,
        mode: u16,
        atime: u32,
        mtime: u32,
    ) -> std::result::Result<(), Self::Error>;
}

/// An opened, decoded image: superblock plus every block group's descriptor
/// and derived inode-table location.
pub struct Fs<'a> {
    super_block: Superblock<'a>,
    groups: Vec<BlockGroup>,
}

impl<'a> Fs<'a> {
    pub fn open(bytes: &'a [u8]) -> Result<Self> {
        let super_block = Superblock::parse(bytes, crate::consts::SUPERBLOCK_OFFSET)?;
        let descriptors = block_group::parse_all(
            bytes,
            super_block.descriptor_table_offset(),
            super_block.group_count(),
            super_block.descriptor_variant(),
        )?;
        let groups = descriptors
            .iter()
            .map(|desc| BlockGroup::new(&super_block, desc))
            .collect();
        Ok(Fs {
            super_block,
            groups,
        })
    }

    pub fn super_block(&self) -> &Superblock<'a> {
        &self.super_block
    }

    /// Decodes the inode numbered `n` (1-based, per the on-disk convention).
    pub fn inode(&self, n: u32) -> Result<Inode> {
        let index = n.saturating_sub(1);
        let group_index = index / self.super_block.s_inodes_per_group;
        let local_index = index % self.super_block.s_inodes_per_group;
        let group = self
            .groups
            .get(group_index as usize)
            .ok_or(Error::BlockOutOfRange(group_index as u64))?;
        group.get_inode(self.super_block.bytes(), local_index)
    }

    /// Walks the directory tree from `root` (spec default: the well-known
    /// root inode, 2), invoking `emit` with each non-`.`/`..`/`UNKNOWN`
    /// directory entry and the path of the *parent directory* it was found
    /// in (relative to the walk root; the root's own children get `""`).
    /// The caller joins `parent_path`/`entry.name` to get the entry's own
    /// path, the way `extfs-cli`'s writer does. Recurses into
    /// subdirectories depth-first. Stops the whole walk as soon as `emit`
    /// returns [`IterationDecision::Break`].
    pub fn walk(
        &self,
        root: u32,
        mut emit: impl FnMut(&dirent::DirectoryEntry, &str) -> IterationDecision,
    ) -> Result<()> {
        self.walk_dir(root, "", &mut emit)?;
        Ok(())
    }

    fn walk_dir(
        &self,
        dir_inode_number: u32,
        parent_path: &str,
        emit: &mut impl FnMut(&dirent::DirectoryEntry, &str) -> IterationDecision,
    ) -> Result<bool> {
        let dir_inode = self.inode(dir_inode_number)?;
        if !dir_inode.is_dir() {
            return Ok(true);
        }
        let mut keep_going = true;
        let mut subdirs: Vec<(u32, String)> = Vec::new();

        dir_inode.enum_blocks(self, |block| {
            if !keep_going {
                return IterationDecision::Break;
            }
            let mut stop = false;
            let _ = dirent::for_each_entry(block, |entry| {
                if stop {
                    return;
                }
                if entry.filetype == crate::consts::FileType::Directory {
                    let child_path = if parent_path.is_empty() {
                        entry.name_str().into_owned()
                    } else {
                        format!("{}/{}", parent_path, entry.name_str())
                    };
                    subdirs.push((entry.inode, child_path));
                }
                if emit(entry, parent_path) == IterationDecision::Break {
                    stop = true;
                }
            });
            if stop {
                keep_going = false;
                IterationDecision::Break
            } else {
                IterationDecision::Continue
            }
        })?;

        if !keep_going {
            return Ok(false);
        }

        for (inode_number, path) in subdirs {
            if !self.walk_dir(inode_number, &path, emit)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Streams `inode_number`'s data blocks into a writer obtained from
    /// `open_writer` (called once the inode's mode is known), then finalizes
    /// it with the inode's size/mode/timestamps. Structural decode failures
    /// and writer failures are kept apart in the returned
    /// [`ExportError`] (see its docs).
    pub fn export_file<W: InodeWriter>(
        &self,
        inode_number: u32,
        open_writer: impl FnOnce(u16) -> std::result::Result<W, W::Error>,
    ) -> std::result::Result<(), ExportError<W::Error>> {
        let inode = self.inode(inode_number)?;
        if inode.empty {
            return Ok(());
        }
        let mut writer = open_writer(inode.mode).map_err(ExportError::Writer)?;

        let mut emitted = 0u64;
        let budget = inode.data_size();
        let mut write_err = None;
        inode.enum_blocks(self, |block| {
            if emitted >= budget {
                return IterationDecision::Break;
            }
            match writer.write_block(block) {
                Ok(()) => {
                    emitted += block.len() as u64;
                    IterationDecision::Continue
                }
                Err(err) => {
                    write_err = Some(err);
                    IterationDecision::Break
                }
            }
        })?;
        if let Some(err) = write_err {
            return Err(ExportError::Writer(err));
        }

        writer
            .finish(inode.data_size(), inode.mode, inode.atime, inode.mtime)
            .map_err(ExportError::Writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::build_minimal_image;

    struct MemWriter {
        data: std::rc::Rc<std::cell::RefCell<Vec<u8>>>,
        finished: std::rc::Rc<std::cell::RefCell<Option<(u64, u16, u32, u32)>>>,
    }

    impl InodeWriter for MemWriter {
        type Error = std::convert::Infallible;

        fn write_block(&mut self, data: &[u8]) -> std::result::Result<(), Self::Error> {
            self.data.borrow_mut().extend_from_slice(data);
            Ok(())
        }

        fn finish(
            &mut self,
            size: u64,
            mode: u16,
            atime: u32,
            mtime: u32,
        ) -> std::result::Result<(), Self::Error> {
            self.data.borrow_mut().truncate(size as usize);
            *self.finished.borrow_mut() = Some((size, mode, atime, mtime));
            Ok(())
        }
    }

    #[test]
    fn opens_and_reads_root_inode() {
        let image = build_minimal_image();
        let fs = Fs::open(&image).unwrap();
        let root = fs.inode(ROOT_INODE).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn walk_emits_the_parent_path_not_the_entrys_own_path() {
        let image = build_minimal_image();
        let fs = Fs::open(&image).unwrap();
        let mut seen = Vec::new();
        fs.walk(ROOT_INODE, |entry, parent_path| {
            seen.push((parent_path.to_string(), entry.name_str().into_owned()));
            IterationDecision::Continue
        })
        .unwrap();
        seen.sort();
        // Both of the root's children are emitted with an empty parent
        // path; the caller is the one who joins `parent_path`/`name`.
        assert_eq!(
            seen,
            vec![
                ("".to_string(), "hello.txt".to_string()),
                ("".to_string(), "sub".to_string()),
            ]
        );
    }

    #[test]
    fn walk_returns_without_emitting_when_root_is_not_a_directory() {
        let image = build_minimal_image();
        let fs = Fs::open(&image).unwrap();
        let mut calls = 0;
        // inode 12 is `hello.txt`, a regular file, not a directory.
        fs.walk(12, |_entry, _path| {
            calls += 1;
            IterationDecision::Continue
        })
        .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn walk_stops_immediately_on_break() {
        let image = build_minimal_image();
        let fs = Fs::open(&image).unwrap();
        let mut calls = 0;
        fs.walk(ROOT_INODE, |_entry, _path| {
            calls += 1;
            IterationDecision::Break
        })
        .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn export_file_truncates_to_declared_size() {
        let image = build_minimal_image();
        let fs = Fs::open(&image).unwrap();
        let data = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let finished = std::rc::Rc::new(std::cell::RefCell::new(None));
        let mut exported_mode = 0;
        fs.export_file(12, |mode| {
            exported_mode = mode;
            Ok::<_, std::convert::Infallible>(MemWriter {
                data: data.clone(),
                finished: finished.clone(),
            })
        })
        .unwrap();
        assert_eq!(exported_mode & 0xF000, 0x8000);
        assert_eq!(data.borrow().as_slice(), b"hello");
        assert_eq!(finished.borrow().unwrap().0, 5);
    }

    #[test]
    fn export_file_is_a_no_op_for_an_empty_inode_record() {
        let image = build_minimal_image();
        let fs = Fs::open(&image).unwrap();
        let opened = std::rc::Rc::new(std::cell::RefCell::new(false));
        let opened_flag = opened.clone();
        // inode 5 was never written by `build_minimal_image`: all 128
        // bytes of its record are zero.
        fs.export_file(5, move |_mode| {
            *opened_flag.borrow_mut() = true;
            Ok::<_, std::convert::Infallible>(MemWriter {
                data: std::rc::Rc::new(std::cell::RefCell::new(Vec::new())),
                finished: std::rc::Rc::new(std::cell::RefCell::new(None)),
            })
        })
        .unwrap();
        assert!(!*opened.borrow(), "writer must not be opened for an empty inode");
    }

    #[derive(Debug)]
    struct DiskFull;

    impl std::fmt::Display for DiskFull {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "disk full")
        }
    }

    impl std::error::Error for DiskFull {}

    struct FailingWriter;

    impl InodeWriter for FailingWriter {
        type Error = DiskFull;

        fn write_block(&mut self, _data: &[u8]) -> std::result::Result<(), Self::Error> {
            Err(DiskFull)
        }

        fn finish(
            &mut self,
            _size: u64,
            _mode: u16,
            _atime: u32,
            _mtime: u32,
        ) -> std::result::Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn export_file_surfaces_a_writer_failure_as_export_error_writer() {
        let image = build_minimal_image();
        let fs = Fs::open(&image).unwrap();
        let result = fs.export_file(12, |_mode| Ok::<_, DiskFull>(FailingWriter));
        match result {
            Err(ExportError::Writer(DiskFull)) => {}
            other => panic!("expected ExportError::Writer(DiskFull), got {:?}", other),
        }
    }
}
