use bytes::Bytes;
use http::{
    header::{CONTENT_LENGTH, TRAILER},
    HeaderMap, HeaderValue,
};
use serde_json::Value;

use crate::{HashingBody, MarshalError, ResponseHasher, ResponseSource, ViewSource};

/// Either
/// - contents ready to be hashed in one shot
/// - the stream body, already wired to hash itself and emit the etag trailer.
///   The caller must not set a validator header for it.
#[derive(Debug)]
pub enum MarshalResult<B> {
    Contents(Bytes),
    Skip(HashingBody<B>),
}

#[derive(Debug)]
pub enum Marshalled<B> {
    Done(MarshalResult<B>),

    /// The contents are the output of the renderer for this view
    Render(ViewSource),
}

/// Strings pass through unchanged, structures are serialized to JSON text
/// with object keys in sorted order.
///
/// `null` counts as a structure and serializes to `null`.
pub fn marshal_plain(value: Value) -> Result<Bytes, MarshalError> {
    match value {
        Value::String(s) => Ok(s.into()),
        v @ (Value::Object(_) | Value::Array(_) | Value::Null) => {
            Ok(serde_json::to_vec(&v)?.into())
        }
        Value::Number(_) => Err(MarshalError::PlainSource("number")),
        Value::Bool(_) => Err(MarshalError::PlainSource("boolean")),
    }
}

/// `Trailer` is a comma separated list of case-insensitive field names
fn announces_etag_trailer(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRAILER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|name| name.trim().eq_ignore_ascii_case("etag"))
}

impl ResponseHasher {
    /// Normalizes `source` into hashable contents.
    ///
    /// Stream bodies get `Trailer: etag` announced in `headers` and lose any
    /// `Content-Length`, since trailers require chunked transfer encoding.
    pub fn marshal<B>(
        &self,
        headers: &mut HeaderMap,
        source: ResponseSource<B>,
    ) -> Result<Marshalled<B>, MarshalError> {
        let result = match source {
            ResponseSource::Plain(value) => MarshalResult::Contents(marshal_plain(value)?),
            ResponseSource::Buffer(bytes) => MarshalResult::Contents(bytes),
            ResponseSource::View(view) => return Ok(Marshalled::Render(view)),
            ResponseSource::Stream(body) => {
                if !announces_etag_trailer(headers) {
                    headers.append(TRAILER, HeaderValue::from_static("etag"));
                }
                headers.remove(CONTENT_LENGTH);
                let opts = self.options();
                MarshalResult::Skip(HashingBody::new(body, opts.algorithm(), opts.encoding()))
            }
        };
        Ok(Marshalled::Done(result))
    }
}
