use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};

/// Buffered append-only writer over one segment file.
///
/// `len` counts every byte handed to the writer, buffered or not, so it is the
/// logical end of the segment as seen by appenders.
#[derive(Debug)]
pub struct SegmentFileWriter {
    inner: BufWriter<File>,
    len: u64,
    buffered: usize,
}

impl SegmentFileWriter {
    /// Wraps `file`, positioning the cursor at its current end.
    pub fn at_end(mut file: File, capacity: usize) -> io::Result<Self> {
        let end = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            inner: BufWriter::with_capacity(capacity, file),
            len: end,
            buffered: 0,
        })
    }

    pub fn write_all(&mut self, payload: &[u8]) -> io::Result<()> {
        self.inner.write_all(payload)?;
        self.len = self.len.saturating_add(payload.len() as u64);
        self.buffered = self.buffered.saturating_add(payload.len());
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.buffered = 0;
        Ok(())
    }

    /// Flushes buffered bytes and forces file data to stable storage.
    pub fn force(&mut self) -> io::Result<()> {
        self.flush()?;
        self.inner.get_ref().sync_data()
    }

    /// Flushes and fully syncs the file, consuming the writer.
    pub fn close(mut self) -> io::Result<()> {
        self.flush()?;
        let file = self.inner.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }
}
