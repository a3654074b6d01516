use crate::error::Error;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::Full;
use std::io::{self, Read, Write};

/// A raw, bidirectional transport such as a TCP stream.
pub trait Connection: Read + Write + Send {}

impl<T: Read + Write + Send> Connection for T {}

/// A connection taken over from a response sink.
pub struct Hijacked {
    /// The raw connection. The caller now owns all further I/O on it.
    pub connection: Box<dyn Connection>,
    /// Bytes already read from the connection but not yet consumed.
    pub read_buf: Bytes,
}

impl std::fmt::Debug for Hijacked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hijacked")
            .field("read_buf", &self.read_buf)
            .finish_non_exhaustive()
    }
}

/// The capability to take exclusive control of the underlying connection,
/// e.g. for a protocol upgrade.
pub trait Hijack {
    /// Detaches the connection from the HTTP response machinery.
    fn hijack(&mut self) -> io::Result<Hijacked>;
}

/// Where a handler writes its response.
///
/// The body is written through [`Write`]; headers and status are set through
/// the methods below. Hijacking is an optional capability: sinks that support
/// it return `Some` from [`hijacker`](Self::hijacker).
pub trait ResponseSink: Write {
    /// Returns the response headers.
    fn headers(&self) -> &HeaderMap;

    /// Returns the response headers for modification.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Returns the response status.
    fn status(&self) -> StatusCode;

    /// Sets the response status.
    fn set_status(&mut self, status: StatusCode);

    /// Returns the hijack capability, if this sink has one.
    fn hijacker(&mut self) -> Option<&mut dyn Hijack> {
        None
    }

    /// Takes over the underlying connection.
    ///
    /// Fails with [`Error::Unhijackable`] if the sink can't be hijacked.
    fn hijack(&mut self) -> Result<Hijacked, Error> {
        match self.hijacker() {
            Some(hijacker) => Ok(hijacker.hijack()?),
            None => Err(Error::Unhijackable),
        }
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn status(&self) -> StatusCode {
        (**self).status()
    }

    fn set_status(&mut self, status: StatusCode) {
        (**self).set_status(status)
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijack> {
        (**self).hijacker()
    }
}

/// An in-memory [`ResponseSink`] that records everything written to it.
///
/// Useful for tests and for buffering a whole response before handing it to
/// a server as an [`http::Response`].
#[derive(Default)]
pub struct ResponseRecorder {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    connection: Option<Slot>,
}

/// The hijack capability of a [`ResponseRecorder`].
struct Slot(Option<Box<dyn Connection>>);

impl ResponseRecorder {
    /// Creates an empty `200 OK` recorder that can't be hijacked.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recorder whose hijack capability hands out `connection`.
    pub fn with_connection<C: Connection + 'static>(connection: C) -> Self {
        Self {
            connection: Some(Slot(Some(Box::new(connection)))),
            ..Self::default()
        }
    }

    /// Returns the body bytes written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Converts the recording into a response.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl Write for ResponseRecorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseSink for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijack> {
        self.connection.as_mut().map(|slot| slot as &mut dyn Hijack)
    }
}

impl Hijack for Slot {
    fn hijack(&mut self) -> io::Result<Hijacked> {
        let connection = self.0.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "connection already hijacked")
        })?;
        Ok(Hijacked {
            connection,
            read_buf: Bytes::new(),
        })
    }
}

impl std::fmt::Debug for ResponseRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseRecorder")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("hijackable", &self.connection.is_some())
            .finish()
    }
}
