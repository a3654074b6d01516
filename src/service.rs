use crate::codec::{Coding, SelectionPolicy};
use crate::handler::Handler;
use crate::pool::EncoderPool;
use crate::sink::ResponseSink;
use crate::writer::CompressingWriter;
use bytes::Bytes;
use http::{Request, header};
use std::io;
use std::sync::Arc;

/// Wraps `handler` so its response bodies are compressed when the client
/// accepts gzip or deflate.
///
/// Uses the process-wide encoder pool and [`SelectionPolicy::PreferCompressed`];
/// see [`CompressionLayer`](crate::CompressionLayer) to configure either.
pub fn compress<H: Handler>(handler: H) -> Compression<H> {
    Compression::new(handler)
}

/// A handler that compresses the response bodies of the handler it wraps.
#[derive(Debug, Clone)]
pub struct Compression<H> {
    inner: H,
    pool: Arc<EncoderPool>,
    policy: SelectionPolicy,
}

impl<H> Compression<H> {
    /// Creates a new compression handler wrapping the given inner handler.
    pub fn new(inner: H) -> Self {
        Self::with_config(inner, EncoderPool::shared(), SelectionPolicy::default())
    }

    pub(crate) fn with_config(inner: H, pool: Arc<EncoderPool>, policy: SelectionPolicy) -> Self {
        Self {
            inner,
            pool,
            policy,
        }
    }

    /// Returns a reference to the inner handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Returns a mutable reference to the inner handler.
    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.inner
    }

    /// Consumes this handler, returning the inner handler.
    pub fn into_inner(self) -> H {
        self.inner
    }

    /// Returns the pool encoders are drawn from.
    pub fn pool(&self) -> &Arc<EncoderPool> {
        &self.pool
    }
}

impl<H: Handler> Handler for Compression<H> {
    fn call(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> io::Result<()> {
        add_vary_accept_encoding(res.headers_mut());

        let coding = Coding::from_headers(req.headers(), self.policy);
        tracing::debug!(%coding, "negotiated content-coding");
        if coding == Coding::Identity {
            return self.inner.call(req, res);
        }

        let encoder = match self.pool.checkout(coding) {
            Ok(encoder) => encoder,
            Err(error) => {
                tracing::warn!(%error, %coding, "encoder unavailable, sending identity");
                return self.inner.call(req, res);
            }
        };
        let mut encoder = self.pool.bind(encoder, &mut *res);

        encoder
            .get_mut()
            .headers_mut()
            .insert(header::CONTENT_ENCODING, coding.header_value());

        // If the handler unwinds, dropping `encoder` finishes and releases it.
        let result = self.inner.call(req, &mut CompressingWriter::new(&mut encoder));
        if encoder.is_detached() {
            // Hijacked: the connection carries no encoded body.
            encoder
                .get_mut()
                .headers_mut()
                .remove(header::CONTENT_ENCODING);
        }
        let finished = encoder.finish();
        result.and(finished)
    }
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut header::HeaderMap) {
    // Check all Vary headers to see if Accept-Encoding is already present
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let covered = vary_str.split(',').any(|v| {
                let v = v.trim();
                v.eq_ignore_ascii_case("*") || v.eq_ignore_ascii_case("accept-encoding")
            });
            if covered {
                return;
            }
        }
    }

    headers.append(
        header::VARY,
        header::HeaderValue::from_static("Accept-Encoding"),
    );
}
