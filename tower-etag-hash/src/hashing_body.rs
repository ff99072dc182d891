use std::{
    pin::Pin,
    task::{ready, Context, Poll},
};

use bytes::Bytes;
use http::{header::ETAG, HeaderMap, HeaderValue};
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;

use crate::{Algorithm, DigestEncoding, HashContext};

/// Passes the frames of a stream body through unchanged while feeding its data into a
/// [`HashContext`], then ends the body with an `etag` trailer holding the encoded digest.
///
/// If the wrapped body already ends with trailers, the etag is appended to them.
/// If it errors, or is dropped before its end, no trailer is ever produced.
#[pin_project]
#[derive(Debug)]
pub struct HashingBody<B> {
    #[pin]
    inner: B,
    /// None once the trailer has been emitted or the inner body errored
    ctx: Option<HashContextCell>,
}

// HashContext holds large hasher states, keep them off the Debug output
struct HashContextCell {
    ctx: HashContext,
    encoding: DigestEncoding,
}

impl std::fmt::Debug for HashContextCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashContextCell")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

impl<B> HashingBody<B> {
    pub fn new(inner: B, algorithm: Algorithm, encoding: DigestEncoding) -> Self {
        Self {
            inner,
            ctx: Some(HashContextCell {
                ctx: HashContext::new(algorithm),
                encoding,
            }),
        }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl HashContextCell {
    fn into_trailer_value(self) -> Option<HeaderValue> {
        let digest = self.ctx.finalize_encoded(self.encoding);
        // hex and base64 alphabets are always valid header chars
        match HeaderValue::from_str(&digest) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(%digest, error = %e, "digest is not a valid trailer value");
                None
            }
        }
    }
}

impl<B: Body<Data = Bytes>> Body for HashingBody<B> {
    type Data = Bytes;

    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();
        if this.ctx.is_none() {
            return Poll::Ready(None);
        }

        let frame = match ready!(this.inner.as_mut().poll_frame(cx)) {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                tracing::debug!("stream body errored before completion, etag trailer dropped");
                *this.ctx = None;
                return Poll::Ready(Some(Err(e)));
            }
            None => {
                let trailers = this
                    .ctx
                    .take()
                    .and_then(HashContextCell::into_trailer_value)
                    .map(|etag| {
                        tracing::debug!(?etag, "emitting etag trailer");
                        let mut trailers = HeaderMap::new();
                        trailers.insert(ETAG, etag);
                        Frame::trailers(trailers)
                    });
                return Poll::Ready(trailers.map(Ok));
            }
        };

        let frame = match frame.into_data() {
            Ok(data) => {
                if let Some(cell) = this.ctx.as_mut() {
                    cell.ctx.update(&data);
                }
                return Poll::Ready(Some(Ok(Frame::data(data))));
            }
            Err(frame) => frame,
        };

        match frame.into_trailers() {
            Ok(mut trailers) => {
                if let Some(etag) = this.ctx.take().and_then(HashContextCell::into_trailer_value) {
                    tracing::debug!(?etag, "appending etag to stream trailers");
                    trailers.insert(ETAG, etag);
                }
                Poll::Ready(Some(Ok(Frame::trailers(trailers))))
            }
            Err(frame) => Poll::Ready(Some(Ok(frame))),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.ctx.is_none()
    }

    /// Never exact, so that the transport falls back to chunked encoding,
    /// which is what carries trailers
    fn size_hint(&self) -> SizeHint {
        let mut hint = SizeHint::new();
        hint.set_lower(self.inner.size_hint().lower());
        hint
    }
}
