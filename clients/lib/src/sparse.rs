use std::io::SeekFrom;

use tokio::io::{self, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SparseStats {
    /// Logical length of what was written
    pub len: u64,
    /// Bytes actually written
    pub written: u64,
    /// Bytes skipped over as holes
    pub holes: u64,
}

/// Writes a file sequentially, turning zero runs of at least `threshold`
/// bytes into holes.
///
/// The length of the current zero run is carried from one chunk to the
/// next, so a run split over chunk boundaries is detected as a whole.
/// Zeros are only settled once the run ends, either by a non-zero byte or
/// by [`SparseWriter::finish`].
#[derive(Debug)]
pub struct SparseWriter<W> {
    inner: W,
    threshold: u64,
    pending_zeros: u64,
    buf: Vec<u8>,
    stats: SparseStats,
}

impl<W> SparseWriter<W>
where
    W: AsyncWrite + AsyncSeek + Unpin,
{
    /// `inner` must be positioned at the start of the file.
    pub fn new(inner: W, threshold: u64) -> Self {
        debug_assert!(threshold > 0);
        Self {
            inner,
            threshold,
            pending_zeros: 0,
            buf: Vec::new(),
            stats: SparseStats::default(),
        }
    }

    pub async fn write_chunk(&mut self, mut data: &[u8]) -> io::Result<()> {
        self.stats.len += data.len() as u64;
        while !data.is_empty() {
            let zeros = data.iter().position(|&b| b != 0).unwrap_or(data.len());
            self.pending_zeros += zeros as u64;
            data = &data[zeros..];
            if data.is_empty() {
                break;
            }
            self.settle_zeros().await?;
            let run = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            self.buf.extend_from_slice(&data[..run]);
            data = &data[run..];
        }
        self.flush_buf().await
    }

    /// Settle the trailing zeros and return the inner writer.
    ///
    /// A trailing hole still has to extend the file, so its last byte is
    /// written explicitly.
    pub async fn finish(mut self) -> io::Result<(W, SparseStats)> {
        if self.pending_zeros >= self.threshold {
            self.pending_zeros -= 1;
            self.settle_zeros().await?;
            self.buf.push(0);
        } else {
            self.settle_zeros().await?;
        }
        self.flush_buf().await?;
        self.inner.flush().await?;
        Ok((self.inner, self.stats))
    }

    async fn settle_zeros(&mut self) -> io::Result<()> {
        if self.pending_zeros == 0 {
            return Ok(());
        }
        if self.pending_zeros >= self.threshold {
            self.flush_buf().await?;
            let skip = i64::try_from(self.pending_zeros)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "hole too large"))?;
            self.inner.seek(SeekFrom::Current(skip)).await?;
            self.stats.holes += self.pending_zeros;
        } else {
            let len = self.buf.len() + self.pending_zeros as usize;
            self.buf.resize(len, 0);
        }
        self.pending_zeros = 0;
        Ok(())
    }

    async fn flush_buf(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf).await?;
            self.stats.written += self.buf.len() as u64;
            self.buf.clear();
        }
        Ok(())
    }
}
