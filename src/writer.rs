use crate::pool::PooledEncoder;
use crate::sink::{Hijack, Hijacked, ResponseSink};
use http::{HeaderMap, StatusCode};
use std::io::{self, Write};

/// A [`ResponseSink`] whose body passes through a pooled encoder.
///
/// Body writes go to the encoder, which writes compressed blocks into the
/// underlying sink. Headers, status and hijacking are delegated to the
/// underlying sink unchanged. The writer never sets `Content-Encoding` and
/// never finishes the encoder; both are up to whoever acquired it.
///
/// A successful hijack abandons the compressed stream, so finishing the
/// encoder afterwards writes nothing to the taken-over connection.
pub struct CompressingWriter<'e, 'p, S: ResponseSink> {
    encoder: &'e mut PooledEncoder<'p, S>,
}

impl<'e, 'p, S: ResponseSink> CompressingWriter<'e, 'p, S> {
    /// Wraps an encoder that is bound to a response sink.
    pub fn new(encoder: &'e mut PooledEncoder<'p, S>) -> Self {
        Self { encoder }
    }

    fn sink(&self) -> &S {
        self.encoder.get_ref()
    }

    fn sink_mut(&mut self) -> &mut S {
        self.encoder.get_mut()
    }
}

impl<S: ResponseSink> Write for CompressingWriter<'_, '_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.encoder.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl<S: ResponseSink> ResponseSink for CompressingWriter<'_, '_, S> {
    fn headers(&self) -> &HeaderMap {
        self.sink().headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.sink_mut().headers_mut()
    }

    fn status(&self) -> StatusCode {
        self.sink().status()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.sink_mut().set_status(status)
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijack> {
        if self.sink_mut().hijacker().is_none() {
            return None;
        }
        Some(self)
    }
}

impl<S: ResponseSink> Hijack for CompressingWriter<'_, '_, S> {
    fn hijack(&mut self) -> io::Result<Hijacked> {
        let hijacked = match self.sink_mut().hijacker() {
            Some(hijacker) => hijacker.hijack()?,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "response can't be hijacked",
                ));
            }
        };
        self.encoder.detach();
        Ok(hijacked)
    }
}

impl<S: ResponseSink> std::fmt::Debug for CompressingWriter<'_, '_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressingWriter")
            .field("encoder", &self.encoder)
            .finish()
    }
}
