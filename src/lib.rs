//! HTTP response compression middleware for synchronous handlers.
//!
//! This crate wraps a [`Handler`] so that response bodies are compressed with
//! gzip or deflate, negotiated from the client's `Accept-Encoding` header
//! (RFC 2616 section 14.3). Encoders are pooled and reused across requests.
//!
//! # Example
//!
//! ```ignore
//! use accept_encoding_handler::{CompressionLayer, handler_fn};
//! use tower::ServiceBuilder;
//!
//! let handler = ServiceBuilder::new()
//!     .layer(CompressionLayer::new())
//!     .service(handler_fn(|_req, res| res.write_all(b"hello")));
//! ```
//!
//! # Negotiation
//!
//! Codings other than `gzip`, `deflate` and `identity` (including `*`) are
//! ignored. With the default [`SelectionPolicy::PreferCompressed`], gzip is
//! chosen if its qvalue is above zero, then deflate, otherwise the body is
//! sent as-is. Malformed tokens are skipped rather than failing the request.
//!
//! # Response Modifications
//!
//! - `Vary` header always includes `Accept-Encoding`; it isn't appended again
//!   when an existing `Vary` value already names it or is `*`
//! - `Content-Encoding` header is set to the coding used, if any
//!
//! The body is compressed unconditionally once a coding is chosen; content
//! type and length aren't consulted. If no encoder can be built, the response
//! goes out uncompressed.
//!
//! # Hijacking
//!
//! A [`ResponseSink`] may expose a [`Hijack`] capability. The compressing
//! writer forwards it unchanged, and reports [`Error::Unhijackable`] when the
//! underlying sink has none. Once a response is hijacked its compressed
//! stream is abandoned: nothing more is written to the sink and
//! `Content-Encoding` is removed again.

#![deny(missing_docs)]

mod codec;
mod encoder;
mod error;
mod handler;
mod layer;
mod pool;
mod service;
mod sink;
mod writer;

pub use codec::{
    AcceptEncoding, Coding, DEFAULT_QVALUE, QualityList, SelectionPolicy, parse_accept_encoding,
    parse_quality_list,
};
pub use compression_core::Level;
pub use encoder::Encoder;
pub use error::{Error, ParseError};
pub use handler::{Handler, HandlerFn, handler_fn};
pub use layer::CompressionLayer;
pub use pool::{EncoderPool, PooledEncoder};
pub use service::{Compression, compress};
pub use sink::{Connection, Hijack, Hijacked, ResponseRecorder, ResponseSink};
pub use writer::CompressingWriter;
