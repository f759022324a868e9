use thiserror::Error;

/// Everything that can go wrong while decoding an ext2/3/4 image.
///
/// Every variant is structural: the decoder read something that does not
/// match the on-disk format it was told to expect. There is no I/O error
/// variant here because the core never touches a file descriptor directly
/// (see [`crate::reader::ByteReader`]): a short read is just bytes that
/// aren't there, which is `ShortRead`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("not an ext2/3/4 filesystem (bad superblock magic)")]
    NotExtFilesystem,

    #[error("invalid extent header magic")]
    BadMagic,

    #[error("extent tree depth exceeds the ext4 maximum of 5")]
    BadExtentDepth,

    #[error("block {0} is out of range")]
    BlockOutOfRange(u64),

    #[error("short read: wanted {wanted} bytes at offset {offset}, source has {available}")]
    ShortRead {
        offset: u64,
        wanted: usize,
        available: usize,
    },

    #[error("invalid directory record: {0}")]
    InvalidDirectoryRecord(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in [`crate::Fs::export_file`]: either a
/// structural decode failure from the core itself, or a failure from the
/// caller-supplied [`crate::InodeWriter`].
///
/// Kept distinct from [`Error`] per the core's contract that writer
/// failures (permission denied, disk full, and the like) are the external
/// writer's concern, not a decoding error. Collapsing both into
/// `Error::InvalidDirectoryRecord` would mislabel an I/O failure as a
/// corrupt image and throw away the underlying error.
#[derive(Debug, Error)]
pub enum ExportError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Decode(#[from] Error),

    #[error("writer failed")]
    Writer(#[source] E),
}
