//! tower middleware that computes a content hash of every outgoing response
//! and attaches it as the `ETag` validator.
//!
//! The wrapped service responds with a [`ResponseSource`] body whose variant is the
//! response's [`Variety`]:
//! - plain (string or JSON value), buffer and view bodies are hashed in one shot and
//!   get an `ETag` header
//! - stream bodies are hashed as they are sent and end with an `etag` trailer,
//!   announced up front by a `Trailer: etag` header
//!
//! Trailers need chunked transfer encoding, and hyper only sends them on HTTP/1.1 when
//! the request carries `TE: trailers`. Other clients get the streamed body without the
//! etag trailer.
//!
//! Views are rendered by a renderer service before hashing. See
//! [`MinijinjaRenderer`] (feature `minijinja-renderer`).

use std::task::Poll;
use tower_service::Service;

mod digest;
mod err;
mod future;
mod hasher;
mod hashing_body;
mod layer;
mod marshal;
mod options;
mod render;
mod response;
mod source;

#[cfg(feature = "minijinja-renderer")]
mod minijinja_renderer;

pub use digest::*;
pub use err::*;
pub use future::*;
pub use hasher::*;
pub use hashing_body::*;
pub use layer::*;
pub use marshal::*;
pub use options::*;
pub use render::*;
pub use response::*;
pub use source::*;

#[cfg(feature = "minijinja-renderer")]
pub use minijinja_renderer::*;

#[derive(Clone, Debug)]
pub struct EtagHash<R, S> {
    hasher: ResponseHasher,
    renderer: R,
    inner: S,
}

impl<R, S> EtagHash<R, S> {
    pub fn new(hasher: ResponseHasher, renderer: R, inner: S) -> Self {
        Self {
            hasher,
            renderer,
            inner,
        }
    }

    pub fn hasher(&self) -> &ResponseHasher {
        &self.hasher
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<ReqBody, B, R, S> Service<http::Request<ReqBody>> for EtagHash<R, S>
where
    R: Service<ViewSource, Response = String> + Clone,
    S: Service<http::Request<ReqBody>, Response = http::Response<ResponseSource<B>>>,
{
    type Response = http::Response<EtagHashResBody<B>>;

    type Error = EtagHashServiceError<S::Error, R::Error>;

    type Future = EtagHashServiceFuture<S::Future, R>;

    /// The renderer is only poll_ready()d by `EtagHashServiceFuture`
    /// for responses that turn out to be views
    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(EtagHashServiceError::Inner)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        EtagHashServiceFuture::new(
            self.hasher.clone(),
            self.renderer.clone(),
            self.inner.call(req),
        )
    }
}
