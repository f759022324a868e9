mod source;
mod writer;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use extfs_core::{DirectoryEntry, Fs, FileType, IterationDecision, ROOT_INODE};
use log::{info, warn};

use crate::source::ImageSource;
use crate::writer::FileWriter;

/// Extracts the full contents of an ext2/ext3/ext4 filesystem image into a
/// destination directory on the host filesystem.
#[derive(Parser, Debug)]
#[command(name = "extfs-extract", version)]
struct Args {
    /// Path to the ext2/ext3/ext4 image file.
    image: PathBuf,

    /// Destination directory to extract into. Created if missing.
    dest: PathBuf,

    /// Remove and recreate the destination directory if it already exists.
    #[arg(long)]
    overwrite: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if args.dest.exists() {
        if args.overwrite {
            std::fs::remove_dir_all(&args.dest)
                .with_context(|| format!("removing {}", args.dest.display()))?;
        } else {
            bail!(
                "destination {} already exists (pass --overwrite to replace it)",
                args.dest.display()
            );
        }
    }
    std::fs::create_dir_all(&args.dest)
        .with_context(|| format!("creating {}", args.dest.display()))?;

    let source = ImageSource::open(&args.image)?;
    let fs = Fs::open(source.bytes()).with_context(|| {
        format!("{} does not look like an ext2/3/4 image", args.image.display())
    })?;

    let mut extracted = 0u64;
    let mut failed = 0u64;
    let walk_result = fs.walk(ROOT_INODE, |entry: &DirectoryEntry, parent_path: &str| {
        let path = join_path(parent_path, &entry.name_str());
        match extract_entry(&fs, entry, &path, &args.dest) {
            Ok(()) => extracted += 1,
            Err(err) => {
                warn!("skipping {}: {:#}", path, err);
                failed += 1;
            }
        }
        IterationDecision::Continue
    });
    walk_result.context("walking filesystem image")?;

    info!("extracted {} entries ({} skipped)", extracted, failed);
    if failed > 0 {
        bail!("{} entries could not be extracted", failed);
    }
    Ok(())
}

/// Joins a directory walk's `parent_path`/`name`, the way SPEC_FULL's
/// walk driver is documented to: the root's own children get `parent_path
/// == ""`, so the join is plain concatenation rather than always
/// inserting a separator.
fn join_path(parent_path: &str, name: &str) -> String {
    if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent_path, name)
    }
}

fn extract_entry(
    fs: &Fs,
    entry: &DirectoryEntry,
    path: &str,
    dest_root: &Path,
) -> Result<()> {
    let dest_path = dest_root.join(path);
    match entry.filetype {
        FileType::Directory => {
            std::fs::create_dir_all(&dest_path)
                .with_context(|| format!("creating directory {}", dest_path.display()))?;
        }
        FileType::RegularFile => {
            fs.export_file(entry.inode, |_mode| FileWriter::create(&dest_path))
                .with_context(|| format!("exporting {}", dest_path.display()))?;
        }
        FileType::SymbolicLink => {
            let inode = fs.inode(entry.inode).context("reading symlink inode")?;
            let target = inode
                .symlink_target(fs)
                .context("resolving symlink target")?
                .unwrap_or_default();
            writer::create_symlink(&dest_path, &target)
                .with_context(|| format!("creating symlink {}", dest_path.display()))?;
        }
        other => {
            warn!("skipping {} ({:?}, not a regular file/dir/symlink)", path, other);
        }
    }
    Ok(())
}
