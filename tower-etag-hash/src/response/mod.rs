use bytes::Bytes;
use pin_project::pin_project;

use crate::HashingBody;

mod http_body_impl;

/// `http::Response` body type of [`EtagHash`](crate::EtagHash)
#[pin_project(project = EtagHashResBodyProj)]
#[derive(Debug)]
pub enum EtagHashResBody<B> {
    /// Contents materialized in memory: plain, buffer and view varieties
    Full(Option<Bytes>),

    /// Stream variety that is not hashed
    Passthrough(#[pin] B),

    /// Stream variety ending with an `etag` trailer
    Hashing(#[pin] HashingBody<B>),
}

impl<B> EtagHashResBody<B> {
    pub fn full(contents: impl Into<Bytes>) -> Self {
        let contents = contents.into();
        if contents.is_empty() {
            Self::Full(None)
        } else {
            Self::Full(Some(contents))
        }
    }

    pub fn passthrough(body: B) -> Self {
        Self::Passthrough(body)
    }

    pub fn hashing(body: HashingBody<B>) -> Self {
        Self::Hashing(body)
    }
}
