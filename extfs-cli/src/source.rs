//! Memory-maps the source image so `extfs-core` can borrow it as a plain
//! `&[u8]` for the lifetime of the extraction.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;

pub struct ImageSource {
    mmap: Mmap,
}

impl ImageSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening image {}", path.display()))?;
        // Safety is the caller's: mutating the backing file while it's
        // mapped is undefined behavior. We only ever read from `mmap`.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("mmapping image {}", path.display()))?;
        Ok(ImageSource { mmap })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}
