use std::{fmt::Display, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Textual encoding of a digest
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum DigestEncoding {
    Hex,
    #[default]
    Base64,
}

impl DigestEncoding {
    /// Lowercase hex or padded standard base64
    pub fn encode(&self, digest: &[u8]) -> String {
        match self {
            Self::Hex => data_encoding::HEXLOWER.encode(digest),
            Self::Base64 => data_encoding::BASE64.encode(digest),
        }
    }
}

impl FromStr for DigestEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            _ => Err(ConfigError::Encoding(s.to_owned())),
        }
    }
}

/// The digest algorithms a [`HashContext`](crate::HashContext) can be created for
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Blake3,
}

impl Algorithm {
    pub const ALL: [Self; 6] = [
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Blake3,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Blake3 => "blake3",
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::Algorithm(s.to_owned()))
    }
}

/// The representation tag of a response body
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variety {
    /// in-memory string or JSON value
    Plain,
    /// raw bytes
    Buffer,
    /// template + context, rendered before sending
    View,
    /// byte stream of unknown length
    Stream,
}

impl Variety {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Buffer => "buffer",
            Self::View => "view",
            Self::Stream => "stream",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Plain => 1,
            Self::Buffer => 1 << 1,
            Self::View => 1 << 2,
            Self::Stream => 1 << 3,
        }
    }
}

impl Display for Variety {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variety {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "buffer" => Ok(Self::Buffer),
            "view" => Ok(Self::View),
            "stream" => Ok(Self::Stream),
            _ => Err(ConfigError::Variety(s.to_owned())),
        }
    }
}

/// Set of varieties that get a validator
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Varieties(u8);

impl Varieties {
    pub const NONE: Self = Self(0);

    pub const ALL: Self = Self(0b1111);

    pub const fn with(self, variety: Variety) -> Self {
        Self(self.0 | variety.bit())
    }

    pub const fn contains(&self, variety: Variety) -> bool {
        self.0 & variety.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// plain and buffer
impl Default for Varieties {
    fn default() -> Self {
        Self::NONE.with(Variety::Plain).with(Variety::Buffer)
    }
}

impl FromIterator<Variety> for Varieties {
    fn from_iter<T: IntoIterator<Item = Variety>>(iter: T) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

/// Formatting of the `ETag` header value
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(default)]
pub struct EtagOptions {
    /// Mark the validator as weak: `W/"<digest>"` instead of `"<digest>"`
    pub weak: bool,
}

impl EtagOptions {
    pub fn format(&self, digest: &str) -> String {
        if self.weak {
            format!("W/\"{digest}\"")
        } else {
            format!("\"{digest}\"")
        }
    }
}

/// Partial configuration merged over the defaults by [`HashOptions::try_from_overlay`].
///
/// Every field is optional. Values are kept as strings until validation so that
/// invalid ones surface as [`ConfigError`] rather than as a deserialization failure.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HashOptionsOverlay {
    pub encoding: Option<String>,
    #[serde(alias = "algo")]
    pub algorithm: Option<String>,
    pub varieties: Option<Vec<String>>,
    #[serde(alias = "etagOptions")]
    pub etag_options: Option<EtagOptions>,
}

/// Validated, immutable hashing configuration.
///
/// Construct once at startup; [`crate::ResponseHasher`] shares it across all
/// responses behind an [`Arc`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HashOptions {
    encoding: DigestEncoding,
    algorithm: Algorithm,
    varieties: Varieties,
    etag_options: EtagOptions,
}

impl HashOptions {
    /// Merges `overlay` over the defaults
    /// (`base64`, `sha1`, `[plain, buffer]`, no etag options) and validates the result
    pub fn try_from_overlay(overlay: HashOptionsOverlay) -> Result<Self, ConfigError> {
        let mut res = Self::default();
        if let Some(encoding) = overlay.encoding {
            res.encoding = encoding.parse()?;
        }
        if let Some(algorithm) = overlay.algorithm {
            res.algorithm = algorithm.parse()?;
        }
        if let Some(varieties) = overlay.varieties {
            res.varieties = varieties
                .iter()
                .map(|v| v.parse::<Variety>())
                .collect::<Result<_, _>>()?;
        }
        if let Some(etag_options) = overlay.etag_options {
            res.etag_options = etag_options;
        }
        Ok(res)
    }

    /// Parses a JSON overlay, e.g. `{"encoding": "hex", "algo": "sha256"}`
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let overlay: HashOptionsOverlay = serde_json::from_str(json)?;
        Self::try_from_overlay(overlay)
    }

    pub fn with_encoding(mut self, encoding: DigestEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_varieties(mut self, varieties: impl IntoIterator<Item = Variety>) -> Self {
        self.varieties = varieties.into_iter().collect();
        self
    }

    pub fn with_etag_options(mut self, etag_options: EtagOptions) -> Self {
        self.etag_options = etag_options;
        self
    }

    pub fn encoding(&self) -> DigestEncoding {
        self.encoding
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn varieties(&self) -> Varieties {
        self.varieties
    }

    pub fn etag_options(&self) -> EtagOptions {
        self.etag_options
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl TryFrom<HashOptionsOverlay> for HashOptions {
    type Error = ConfigError;

    fn try_from(value: HashOptionsOverlay) -> Result<Self, Self::Error> {
        Self::try_from_overlay(value)
    }
}
