use anyhow::Context;
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};
#[cfg(not(unix))]
use std::io::{Seek, SeekFrom, Write};
use tracing::debug;

use super::FileManager;

/// Single output file, pre-sized to the torrent's payload length.
#[derive(Debug)]
pub struct DiskFileManager {
    file: File,
    path: PathBuf,
}

impl DiskFileManager {
    /// Opens (creating if needed, never truncating) the output file and sizes it to
    /// `total_size`.
    pub fn create(path: impl AsRef<Path>, total_size: u64) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open output file {}", path.display()))?;
        file.set_len(total_size)
            .context("Failed to allocate output file")?;

        debug!(path = %path.display(), total_size, "Output file ready");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileManager for DiskFileManager {
    #[cfg(unix)]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> anyhow::Result<()> {
        use std::os::unix::fs::FileExt;

        self.file
            .write_all_at(data, offset)
            .with_context(|| format!("Failed to write {} bytes at {}", data.len(), offset))
    }

    // No pwrite here; the caller holds `&mut self`, so seek and write cannot interleave
    #[cfg(not(unix))]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> anyhow::Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .context("Error seeking file")?;
        self.file
            .write_all(data)
            .with_context(|| format!("Failed to write {} bytes at {}", data.len(), offset))
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.file.sync_all().context("Failed to sync output file")
    }
}
