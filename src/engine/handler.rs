//! Handler role and the closure adapter.

use std::sync::Arc;

use super::request::Request;
use super::response::Response;

/// Unit of application logic, invoked once per request.
///
/// Engines call handlers concurrently for distinct requests, and on a
/// blocking thread, so a handler may use blocking I/O on the body.
pub trait Handler: Send + Sync {
    /// Serve one request by writing to `res`.
    fn serve_http(&self, req: &mut dyn Request, res: &mut dyn Response);
}

/// Adapter that lets a plain function act as a [`Handler`].
#[derive(Clone, Copy)]
pub struct HandlerFunc<F>(F);

impl<F> HandlerFunc<F>
where
    F: Fn(&mut dyn Request, &mut dyn Response) + Send + Sync,
{
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Handler for HandlerFunc<F>
where
    F: Fn(&mut dyn Request, &mut dyn Response) + Send + Sync,
{
    fn serve_http(&self, req: &mut dyn Request, res: &mut dyn Response) {
        (self.0)(req, res)
    }
}

/// Shorthand for [`HandlerFunc::new`].
pub fn handler_fn<F>(f: F) -> HandlerFunc<F>
where
    F: Fn(&mut dyn Request, &mut dyn Response) + Send + Sync,
{
    HandlerFunc::new(f)
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve_http(&self, req: &mut dyn Request, res: &mut dyn Response) {
        (**self).serve_http(req, res)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn serve_http(&self, req: &mut dyn Request, res: &mut dyn Response) {
        (**self).serve_http(req, res)
    }
}
