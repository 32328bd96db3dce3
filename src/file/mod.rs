mod disk;

pub use disk::DiskFileManager;

/// Destination for verified piece data.
///
/// Writes are positioned: callers pass the absolute byte offset in the torrent's
/// payload and implementations never read back what is already there.
pub trait FileManager: Send {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> anyhow::Result<()>;

    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
