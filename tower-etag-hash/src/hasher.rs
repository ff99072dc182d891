use std::sync::Arc;

use bytes::Bytes;
use http::{
    header::{CONTENT_TYPE, ETAG},
    HeaderMap, HeaderValue,
};
use serde_json::Value;

use crate::{
    encoded_digest, EtagHashResBody, HashOptions, MarshalError, MarshalResult, Marshalled,
    ResponseSource, ViewSource,
};

const TEXT_HTML: &str = "text/html; charset=utf-8";
const APPLICATION_JSON: &str = "application/json; charset=utf-8";
const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

/// Generates content validators for outgoing responses.
///
/// Cheap to clone, the options are shared.
#[derive(Clone, Debug)]
pub struct ResponseHasher {
    options: Arc<HashOptions>,
}

/// What [`ResponseHasher::on_before_send`] decided for a response
#[derive(Debug)]
pub enum Outcome<B> {
    Ready(http::Response<EtagHashResBody<B>>),

    /// The view must go through the renderer, then [`ResponseHasher::on_rendered`]
    Render(PendingView, ViewSource),
}

/// Head of a view response waiting on its rendered body
#[derive(Debug)]
pub struct PendingView {
    parts: http::response::Parts,
    validate: bool,
}

impl ResponseHasher {
    pub fn new(options: HashOptions) -> Self {
        Self::from_shared(Arc::new(options))
    }

    pub fn from_shared(options: Arc<HashOptions>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &HashOptions {
        &self.options
    }

    /// One-shot digest of `contents` with the configured algorithm and encoding
    pub fn digest(&self, contents: &[u8]) -> String {
        encoded_digest(self.options.algorithm(), self.options.encoding(), contents)
    }

    /// Sets the `ETag` header to the formatted digest of `contents`
    pub fn set_validator(
        &self,
        headers: &mut HeaderMap,
        contents: &[u8],
    ) -> Result<(), MarshalError> {
        let digest = self.digest(contents);
        let etag = HeaderValue::try_from(self.options.etag_options().format(&digest))?;
        tracing::trace!(?etag, "setting etag");
        headers.insert(ETAG, etag);
        Ok(())
    }

    /// Pre-response hook, called once per response before it is sent.
    ///
    /// Varieties that are not enabled are converted to a sendable body without
    /// ever being marshalled. Errors are contract violations by the inner service
    /// and must fail the response.
    pub fn on_before_send<B>(
        &self,
        response: http::Response<ResponseSource<B>>,
    ) -> Result<Outcome<B>, MarshalError> {
        let (mut parts, source) = response.into_parts();
        set_default_content_type(&mut parts.headers, &source);

        let variety = source.variety();
        if !self.options.varieties().contains(variety) {
            tracing::trace!(%variety, "variety not enabled, sending without validator");
            return Self::unvalidated(parts, source);
        }

        let body = match self.marshal(&mut parts.headers, source)? {
            Marshalled::Render(view) => {
                return Ok(Outcome::Render(
                    PendingView {
                        parts,
                        validate: true,
                    },
                    view,
                ))
            }
            Marshalled::Done(MarshalResult::Skip(body)) => EtagHashResBody::hashing(body),
            Marshalled::Done(MarshalResult::Contents(contents)) => {
                self.set_validator(&mut parts.headers, &contents)?;
                EtagHashResBody::full(contents)
            }
        };
        Ok(Outcome::Ready(http::Response::from_parts(parts, body)))
    }

    /// Completes a view response with the renderer's output
    pub fn on_rendered<B>(
        &self,
        pending: PendingView,
        rendered: String,
    ) -> Result<http::Response<EtagHashResBody<B>>, MarshalError> {
        let PendingView {
            mut parts,
            validate,
        } = pending;
        let contents = Bytes::from(rendered);
        if validate {
            self.set_validator(&mut parts.headers, &contents)?;
        }
        Ok(http::Response::from_parts(
            parts,
            EtagHashResBody::full(contents),
        ))
    }

    fn unvalidated<B>(
        parts: http::response::Parts,
        source: ResponseSource<B>,
    ) -> Result<Outcome<B>, MarshalError> {
        let body = match source {
            ResponseSource::Plain(Value::String(s)) => EtagHashResBody::full(s),
            ResponseSource::Plain(v) => EtagHashResBody::full(serde_json::to_vec(&v)?),
            ResponseSource::Buffer(bytes) => EtagHashResBody::full(bytes),
            ResponseSource::View(view) => {
                return Ok(Outcome::Render(
                    PendingView {
                        parts,
                        validate: false,
                    },
                    view,
                ))
            }
            ResponseSource::Stream(body) => EtagHashResBody::passthrough(body),
        };
        Ok(Outcome::Ready(http::Response::from_parts(parts, body)))
    }
}

fn set_default_content_type<B>(headers: &mut HeaderMap, source: &ResponseSource<B>) {
    let content_type = match source {
        ResponseSource::Plain(Value::String(_)) | ResponseSource::View(_) => TEXT_HTML,
        ResponseSource::Plain(_) => APPLICATION_JSON,
        ResponseSource::Buffer(_) => APPLICATION_OCTET_STREAM,
        ResponseSource::Stream(_) => return,
    };
    headers
        .entry(CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(content_type));
}
