use crate::codec::Coding;
use crate::error::Error;
use compression_core::Level;
use flate2::{Compress, Compression, Crc, FlushCompress, Status};
use std::io::{self, Write};

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

/// Gzip member header: magic, CM=deflate, no flags, no mtime, XFL=0, OS=unknown.
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];

/// Lifecycle of an [`Encoder`] between checkouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncoderState {
    /// Freshly reset; nothing has been written for the current response.
    Ready,
    /// Has accepted input for the current response.
    Writing,
    /// The stream end (and gzip trailer) has been written.
    Finished,
}

/// A reusable streaming gzip or deflate compressor.
///
/// The encoder owns its compression state and scratch buffer but not its
/// output: every call takes the sink to write into, so binding an encoder to
/// a response is the caller's concern (see [`PooledEncoder`]).
///
/// [`PooledEncoder`]: crate::PooledEncoder
pub struct Encoder {
    coding: Coding,
    compress: Compress,
    crc: Crc,
    output_buffer: Vec<u8>,
    state: EncoderState,
}

impl Encoder {
    /// Creates a new encoder for `coding` at `level`.
    pub(crate) fn new(coding: Coding, level: Level) -> Result<Self, Error> {
        if coding == Coding::Identity {
            return Err(Error::NoEncoder(coding));
        }

        Ok(Self {
            coding,
            // Gzip wraps the raw deflate stream in its own framing.
            compress: Compress::new(compression(level)?, false),
            crc: Crc::new(),
            output_buffer: vec![0u8; OUTPUT_BUFFER_SIZE],
            state: EncoderState::Ready,
        })
    }

    /// Returns the coding this encoder produces.
    pub fn coding(&self) -> Coding {
        self.coding
    }

    /// Returns `true` once the stream has been finalized.
    pub fn is_finished(&self) -> bool {
        self.state == EncoderState::Finished
    }

    /// Discards all stream state so the encoder can start a new response.
    pub(crate) fn reset(&mut self) {
        self.compress.reset();
        self.crc.reset();
        self.state = EncoderState::Ready;
    }

    /// Compresses `input`, writing any completed blocks to `sink`.
    pub(crate) fn write_to<W: Write + ?Sized>(&mut self, input: &[u8], sink: &mut W) -> io::Result<()> {
        self.begin(sink)?;
        if self.coding == Coding::Gzip {
            self.crc.update(input);
        }
        self.run(input, FlushCompress::None, sink)
    }

    /// Sync-flushes the compressor so everything written so far reaches `sink`.
    pub(crate) fn flush_to<W: Write + ?Sized>(&mut self, sink: &mut W) -> io::Result<()> {
        if self.state == EncoderState::Finished {
            return Ok(());
        }
        self.begin(sink)?;
        self.run(&[], FlushCompress::Sync, sink)
    }

    /// Ends the stream, writing the final block and any trailer to `sink`.
    ///
    /// Finishing an already finished encoder writes nothing.
    pub(crate) fn finish_to<W: Write + ?Sized>(&mut self, sink: &mut W) -> io::Result<()> {
        if self.state == EncoderState::Finished {
            return Ok(());
        }
        self.begin(sink)?;
        self.run(&[], FlushCompress::Finish, sink)?;

        if self.coding == Coding::Gzip {
            let mut trailer = [0u8; 8];
            trailer[..4].copy_from_slice(&self.crc.sum().to_le_bytes());
            trailer[4..].copy_from_slice(&self.crc.amount().to_le_bytes());
            sink.write_all(&trailer)?;
        }

        self.state = EncoderState::Finished;
        Ok(())
    }

    /// Writes the gzip header before the first block of a response.
    fn begin<W: Write + ?Sized>(&mut self, sink: &mut W) -> io::Result<()> {
        if self.state != EncoderState::Ready {
            return Ok(());
        }
        if self.coding == Coding::Gzip {
            sink.write_all(&GZIP_HEADER)?;
        }
        self.state = EncoderState::Writing;
        Ok(())
    }

    /// Drives the compressor until `input` is consumed and `flush` is satisfied.
    fn run<W: Write + ?Sized>(
        &mut self,
        mut input: &[u8],
        flush: FlushCompress,
        sink: &mut W,
    ) -> io::Result<()> {
        loop {
            let before_in = self.compress.total_in();
            let before_out = self.compress.total_out();

            let status = self
                .compress
                .compress(input, &mut self.output_buffer, flush)
                .map_err(io::Error::other)?;

            let consumed = (self.compress.total_in() - before_in) as usize;
            let written = (self.compress.total_out() - before_out) as usize;
            input = &input[consumed..];

            if written > 0 {
                sink.write_all(&self.output_buffer[..written])?;
            }

            match (status, flush) {
                (Status::StreamEnd, _) => return Ok(()),
                // Without a flush, unconsumed output waits for a later call.
                (_, FlushCompress::None) if input.is_empty() => return Ok(()),
                // A flush is complete once the compressor stops filling the buffer.
                (_, FlushCompress::Sync) if input.is_empty() && written < self.output_buffer.len() => {
                    return Ok(());
                }
                (Status::BufError, _) if consumed == 0 && written == 0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "compressor made no progress",
                    ));
                }
                _ => {}
            }
        }
    }
}

/// Converts a configured level into a flate2 compression level.
fn compression(level: Level) -> Result<Compression, Error> {
    match level {
        Level::Fastest => Ok(Compression::fast()),
        Level::Best => Ok(Compression::best()),
        Level::Precise(quality) => match u32::try_from(quality) {
            Ok(q) if q <= 9 => Ok(Compression::new(q)),
            _ => Err(Error::InvalidLevel(quality)),
        },
        _ => Ok(Compression::default()),
    }
}
