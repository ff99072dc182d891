use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::Variety;

/// A template reference plus the context to render it with
#[derive(Clone, Debug, PartialEq)]
pub struct ViewSource {
    pub template: String,
    pub context: Value,
}

impl ViewSource {
    pub fn new(template: impl Into<String>, context: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            template: template.into(),
            context: serde_json::to_value(context)?,
        })
    }
}

/// Body type that the service wrapped by [`EtagHash`](crate::EtagHash) must respond with.
///
/// The variant is the response's [`Variety`], so that dispatching on it is exhaustive.
#[derive(Debug)]
pub enum ResponseSource<B> {
    /// A string or a JSON-serializable structure
    Plain(Value),
    Buffer(Bytes),
    View(ViewSource),
    /// A body of unknown length, hashed as it is streamed out
    Stream(B),
}

impl<B> ResponseSource<B> {
    pub fn variety(&self) -> Variety {
        match self {
            Self::Plain(_) => Variety::Plain,
            Self::Buffer(_) => Variety::Buffer,
            Self::View(_) => Variety::View,
            Self::Stream(_) => Variety::Stream,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Plain(Value::String(text.into()))
    }

    pub fn json(value: impl Serialize) -> serde_json::Result<Self> {
        serde_json::to_value(value).map(Self::Plain)
    }

    pub fn buffer(bytes: impl Into<Bytes>) -> Self {
        Self::Buffer(bytes.into())
    }

    pub fn view(template: impl Into<String>, context: impl Serialize) -> serde_json::Result<Self> {
        ViewSource::new(template, context).map(Self::View)
    }

    pub fn stream(body: B) -> Self {
        Self::Stream(body)
    }

    /// Wraps `self` in a `200 OK` response
    pub fn into_response(self) -> http::Response<Self> {
        http::Response::new(self)
    }
}
