//! Implementation of `http_body::Body` for `EtagHashResBody`
//! for stream bodies that yield `bytes::Bytes` data.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

use crate::{EtagHashResBody, EtagHashResBodyProj};

impl<B: Body<Data = Bytes>> Body for EtagHashResBody<B> {
    /// Data has to be Bytes due to axum's blanket IntoResponse impl
    /// for Response<B: Body<Data = Bytes>>
    type Data = Bytes;

    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            EtagHashResBodyProj::Full(b) => Poll::Ready(b.take().map(|b| Ok(Frame::data(b)))),
            EtagHashResBodyProj::Passthrough(b) => b.poll_frame(cx),
            EtagHashResBodyProj::Hashing(b) => b.poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Full(b) => b.is_none(),
            Self::Passthrough(b) => b.is_end_stream(),
            Self::Hashing(b) => b.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Self::Full(b) => SizeHint::with_exact(b.as_ref().map_or(0, |b| b.len() as u64)),
            Self::Passthrough(b) => b.size_hint(),
            Self::Hashing(b) => b.size_hint(),
        }
    }
}
