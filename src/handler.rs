use crate::sink::ResponseSink;
use bytes::Bytes;
use http::Request;
use std::io;
use std::sync::Arc;

/// Something that answers a request by writing to a [`ResponseSink`].
pub trait Handler {
    /// Handles `req`, writing the response to `res`.
    fn call(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> io::Result<()>;
}

impl<H: Handler + ?Sized> Handler for &H {
    fn call(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> io::Result<()> {
        (**self).call(req, res)
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn call(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> io::Result<()> {
        (**self).call(req, res)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn call(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> io::Result<()> {
        (**self).call(req, res)
    }
}

/// Returns a [`Handler`] that calls `f`.
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&Request<Bytes>, &mut dyn ResponseSink) -> io::Result<()>,
{
    HandlerFn { f }
}

/// A [`Handler`] implemented by a closure; see [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Request<Bytes>, &mut dyn ResponseSink) -> io::Result<()>,
{
    fn call(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> io::Result<()> {
        (self.f)(req, res)
    }
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}
