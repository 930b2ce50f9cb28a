use std::fs::File;
use std::io::Read;

use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use futures::io::AsyncWriteExt;
use tokio::io::AsyncWrite;
use tracing::trace;

use super::{ArchiveRequest, CHUNK_SIZE};
use crate::error::ArchiveError;

/// Write `request` as a zip stream into `out`.
///
/// Entries are stored uncompressed and written with trailing data
/// descriptors, so the output never needs to seek. File reads are
/// synchronous; call this from a blocking-capable context.
pub async fn write_zip<W>(out: W, request: &ArchiveRequest) -> Result<W, ArchiveError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = ZipFileWriter::with_tokio(out);
    let mut buf = vec![0u8; CHUNK_SIZE];

    for entry in request.walk()? {
        let entry = entry?;
        trace!(name = %entry.name, size = entry.metadata.len(), "zip entry");

        let builder = ZipEntryBuilder::new(entry.name.clone().into(), Compression::Stored)
            .unix_permissions(entry.mode() as u16);
        let mut file = File::open(&entry.path)?;
        let mut stream = writer.write_entry_stream(builder).await?;
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            stream.write_all(&buf[..n]).await?;
        }
        stream.close().await?;
    }

    Ok(writer.close().await?.into_inner())
}
