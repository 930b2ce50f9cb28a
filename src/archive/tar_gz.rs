use std::fs::File;
use std::io::{Read, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};
use tracing::trace;

use super::ArchiveRequest;
use crate::error::ArchiveError;

/// Write `request` as a gzip-compressed tar stream into `out`.
///
/// Each regular file becomes one GNU tar entry carrying its size, permission
/// bits and modification time. Returns the underlying writer once the gzip
/// trailer has been written.
pub fn write_tar_gz<W: Write>(out: W, request: &ArchiveRequest) -> Result<W, ArchiveError> {
    let mut builder = Builder::new(GzEncoder::new(out, Compression::default()));

    for entry in request.walk()? {
        let entry = entry?;
        let size = entry.metadata.len();

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);
        header.set_mode(entry.mode());
        header.set_mtime(entry.mtime());

        trace!(name = %entry.name, size, "tar entry");
        // A file that grows while being read must not overrun its header
        let file = File::open(&entry.path)?.take(size);
        builder.append_data(&mut header, &entry.name, file)?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}
