use crate::codec::SelectionPolicy;
use crate::pool::EncoderPool;
use crate::service::Compression;
use compression_core::Level;
use std::sync::Arc;
use tower::Layer;

/// A Tower layer that compresses HTTP response bodies.
///
/// This layer wraps handlers and compresses their response bodies based on
/// the client's Accept-Encoding header.
#[derive(Debug, Clone)]
pub struct CompressionLayer {
    pool: Arc<EncoderPool>,
    policy: SelectionPolicy,
}

impl CompressionLayer {
    /// Creates a new compression layer with default settings.
    ///
    /// Encoders come from the process-wide pool at the default level, and
    /// gzip or deflate is preferred over identity.
    pub fn new() -> Self {
        Self {
            pool: EncoderPool::shared(),
            policy: SelectionPolicy::default(),
        }
    }

    /// Compresses at `level`, using a pool dedicated to this layer.
    ///
    /// An invalid level isn't reported here: every request falls back to an
    /// uncompressed response instead.
    pub fn level(mut self, level: Level) -> Self {
        self.pool = Arc::new(EncoderPool::new(level));
        self
    }

    /// Draws encoders from `pool`.
    pub fn pool(mut self, pool: Arc<EncoderPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Sets how the accepted codings are turned into a single choice.
    pub fn policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for CompressionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Layer<H> for CompressionLayer {
    type Service = Compression<H>;

    fn layer(&self, inner: H) -> Self::Service {
        Compression::with_config(inner, Arc::clone(&self.pool), self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Coding;
    use crate::handler::{Handler, handler_fn};
    use crate::sink::{ResponseRecorder, ResponseSink};
    use bytes::Bytes;
    use http::{Request, header};
    use std::io;
    use tower::ServiceBuilder;

    fn hello(_req: &Request<Bytes>, res: &mut dyn ResponseSink) -> io::Result<()> {
        res.write_all(b"hello")
    }

    #[test]
    fn test_default_uses_shared_pool() {
        let handler = CompressionLayer::new().layer(handler_fn(hello));
        assert!(Arc::ptr_eq(handler.pool(), &EncoderPool::shared()));
    }

    #[test]
    fn test_level_uses_dedicated_pool() {
        let handler = CompressionLayer::new()
            .level(Level::Best)
            .layer(handler_fn(hello));
        assert!(!Arc::ptr_eq(handler.pool(), &EncoderPool::shared()));
    }

    #[test]
    fn test_clones_share_pool() {
        let pool = Arc::new(EncoderPool::default());
        let layer = CompressionLayer::new().pool(Arc::clone(&pool));
        let first = layer.layer(handler_fn(hello));
        let second = layer.clone().layer(handler_fn(hello));

        let req = Request::get("/")
            .header(header::ACCEPT_ENCODING, "deflate")
            .body(Bytes::new())
            .unwrap();
        first.call(&req, &mut ResponseRecorder::new()).unwrap();
        second.call(&req, &mut ResponseRecorder::new()).unwrap();

        assert_eq!(pool.idle(Coding::Deflate), 1);
    }

    #[test]
    fn test_service_builder() {
        let handler = ServiceBuilder::new()
            .layer(CompressionLayer::new())
            .service(handler_fn(hello));

        let req = Request::get("/")
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Bytes::new())
            .unwrap();
        let mut res = ResponseRecorder::new();
        handler.call(&req, &mut res).unwrap();

        assert_eq!(res.headers()[header::CONTENT_ENCODING], "gzip");
    }
}
