use crate::codec::Coding;
use crate::encoder::Encoder;
use crate::error::Error;
use compression_core::Level;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::{Arc, LazyLock};

static SHARED: LazyLock<Arc<EncoderPool>> =
    LazyLock::new(|| Arc::new(EncoderPool::new(Level::Default)));

/// Idle gzip and deflate encoders, reused across responses.
///
/// Encoders are created on first demand and never destroyed; between
/// responses only their stream state is reset. The pool is safe to share
/// between threads, and a checked-out encoder belongs to exactly one
/// [`PooledEncoder`] until it is released.
pub struct EncoderPool {
    level: Level,
    gzip: Mutex<Vec<Encoder>>,
    deflate: Mutex<Vec<Encoder>>,
}

impl EncoderPool {
    /// Creates an empty pool whose encoders compress at `level`.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            gzip: Mutex::new(Vec::new()),
            deflate: Mutex::new(Vec::new()),
        }
    }

    /// Returns the process-wide pool, compressing at the default level.
    pub fn shared() -> Arc<EncoderPool> {
        Arc::clone(&SHARED)
    }

    /// Checks out an encoder for `coding`, bound to write into `sink`.
    ///
    /// An idle encoder is reused when there is one; otherwise a new one is
    /// built. Fails if `coding` is identity or the configured level is
    /// invalid, in which case the response should go out uncompressed.
    pub fn acquire<W: Write>(&self, coding: Coding, sink: W) -> Result<PooledEncoder<'_, W>, Error> {
        let encoder = self.checkout(coding)?;
        Ok(self.bind(encoder, sink))
    }

    /// Returns a finalized encoder to the idle set.
    ///
    /// An encoder that wasn't finalized may hold half a stream, so it is
    /// dropped rather than handed to the next response.
    pub(crate) fn release(&self, encoder: Encoder) {
        if !encoder.is_finished() {
            tracing::debug!(coding = %encoder.coding(), "discarding unfinished encoder");
            return;
        }
        self.put(encoder);
    }

    /// Returns the number of idle encoders for `coding`.
    pub fn idle(&self, coding: Coding) -> usize {
        self.idle_list(coding).map_or(0, |idle| idle.lock().len())
    }

    /// Takes an idle (or new) encoder for `coding`, reset for a new stream.
    pub(crate) fn checkout(&self, coding: Coding) -> Result<Encoder, Error> {
        let idle = self.idle_list(coding).ok_or(Error::NoEncoder(coding))?;

        // The lock guard is a temporary, released before any construction.
        let reused = idle.lock().pop();
        let mut encoder = match reused {
            Some(encoder) => encoder,
            None => {
                tracing::debug!(%coding, "creating encoder");
                Encoder::new(coding, self.level)?
            }
        };

        encoder.reset();
        Ok(encoder)
    }

    /// Binds a checked-out encoder to `sink` until it is finished or dropped.
    pub(crate) fn bind<W: Write>(&self, encoder: Encoder, sink: W) -> PooledEncoder<'_, W> {
        PooledEncoder {
            pool: self,
            encoder: Some(encoder),
            sink,
        }
    }

    fn put(&self, encoder: Encoder) {
        if let Some(idle) = self.idle_list(encoder.coding()) {
            idle.lock().push(encoder);
        }
    }

    fn idle_list(&self, coding: Coding) -> Option<&Mutex<Vec<Encoder>>> {
        match coding {
            Coding::Gzip => Some(&self.gzip),
            Coding::Deflate => Some(&self.deflate),
            Coding::Identity => None,
        }
    }
}

impl Default for EncoderPool {
    fn default() -> Self {
        Self::new(Level::Default)
    }
}

impl std::fmt::Debug for EncoderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderPool")
            .field("level", &self.level)
            .field("idle_gzip", &self.idle(Coding::Gzip))
            .field("idle_deflate", &self.idle(Coding::Deflate))
            .finish()
    }
}

/// An encoder checked out of an [`EncoderPool`] and bound to a sink.
///
/// Bytes written to this value are compressed into the sink. Call
/// [`finish`](Self::finish) to end the stream and return the encoder to its
/// pool; if the guard is dropped first (early return, error or panic), it
/// finishes the stream itself and still returns the encoder.
pub struct PooledEncoder<'p, W: Write> {
    pool: &'p EncoderPool,
    encoder: Option<Encoder>,
    sink: W,
}

impl<'p, W: Write> PooledEncoder<'p, W> {
    /// Returns the coding being produced.
    pub fn coding(&self) -> Option<Coding> {
        self.encoder.as_ref().map(Encoder::coding)
    }

    /// Returns a reference to the bound sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Returns a mutable reference to the bound sink.
    ///
    /// Writing to the sink directly bypasses compression and corrupts the
    /// stream; this is meant for headers and status.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Returns true once the stream has been abandoned by [`detach`](Self::detach).
    pub(crate) fn is_detached(&self) -> bool {
        self.encoder.is_none()
    }

    /// Abandons the stream without writing anything more to the sink.
    ///
    /// For a sink whose connection has been hijacked: the encoder is reset
    /// and returned to the pool, and finishing afterwards writes nothing.
    pub(crate) fn detach(&mut self) {
        if let Some(mut encoder) = self.encoder.take() {
            tracing::debug!(coding = %encoder.coding(), "abandoning compressed stream");
            encoder.reset();
            self.pool.put(encoder);
        }
    }

    /// Ends the compressed stream and returns the encoder to its pool.
    pub fn finish(mut self) -> io::Result<()> {
        self.close()
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(mut encoder) = self.encoder.take() else {
            return Ok(());
        };
        let result = encoder
            .finish_to(&mut self.sink)
            .and_then(|()| self.sink.flush());
        self.pool.release(encoder);
        result
    }
}

impl<W: Write> Write for PooledEncoder<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.write_to(buf, &mut self.sink),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "encoder already finished",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.flush_to(&mut self.sink)?;
        }
        self.sink.flush()
    }
}

impl<W: Write> Drop for PooledEncoder<'_, W> {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::warn!(%error, "failed to finish compressed response");
        }
    }
}

impl<W: Write> std::fmt::Debug for PooledEncoder<'_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledEncoder")
            .field("coding", &self.coding())
            .finish_non_exhaustive()
    }
}
