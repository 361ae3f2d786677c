//! Watermarking data types: configuration, endpoints, identifiers, formats and
//! request parameters.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::WatermarkError;

/// DNS name whose TXT record lists the service replicas.
pub const DEFAULT_DISCOVERY_RECORD: &str = "transactional-servers.elibri.com.pl";

/// Domain the discovered subdomain labels belong to.
pub const DEFAULT_BASE_DOMAIN: &str = "elibri.com.pl";

static RE_FORMATS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(epub|mobi|pdf|mp3_in_zip|mp3_in_lpf|,)+$").unwrap());

/// Ordered request parameters, serialized in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Create an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over the parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw pairs, e.g. for form or query serialization.
    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

/// A book identifier: an ISBN-13 or a publisher record reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Exactly 13 decimal digits, no separators.
    Isbn(String),
    /// Anything else.
    RecordReference(String),
}

impl Identifier {
    /// Classify an identifier string.
    pub fn classify(ident: &str) -> Self {
        if ident.len() == 13 && ident.bytes().all(|b| b.is_ascii_digit()) {
            Self::Isbn(ident.to_string())
        } else {
            Self::RecordReference(ident.to_string())
        }
    }

    /// Parameter key the identifier is sent under.
    pub fn param_key(&self) -> &'static str {
        match self {
            Self::Isbn(_) => "isbn",
            Self::RecordReference(_) => "record_reference",
        }
    }

    /// The identifier value.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Isbn(s) | Self::RecordReference(s) => s,
        }
    }

    pub(crate) fn push_to(&self, params: &mut Params) {
        params.push(self.param_key(), self.as_str());
    }
}

/// File formats the service can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// EPUB e-book.
    Epub,
    /// Kindle MOBI e-book.
    Mobi,
    /// PDF document.
    Pdf,
    /// Audiobook, MP3 files in a zip archive.
    Mp3InZip,
    /// Audiobook, MP3 files in an LPF package.
    Mp3InLpf,
}

impl Format {
    /// Token used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Mobi => "mobi",
            Self::Pdf => "pdf",
            Self::Mp3InZip => "mp3_in_zip",
            Self::Mp3InLpf => "mp3_in_lpf",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "epub" => Some(Self::Epub),
            "mobi" => Some(Self::Mobi),
            "pdf" => Some(Self::Pdf),
            "mp3_in_zip" => Some(Self::Mp3InZip),
            "mp3_in_lpf" => Some(Self::Mp3InLpf),
            _ => None,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, comma-joined format list such as `epub,mobi`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formats(String);

impl Formats {
    /// Validate a format string against the allow-list.
    ///
    /// # Errors
    /// Returns [`WatermarkError::InvalidFormat`] for empty strings, unknown
    /// tokens, whitespace or separators other than `,`.
    pub fn parse(formats: &str) -> Result<Self, WatermarkError> {
        if RE_FORMATS.is_match(formats) {
            Ok(Self(formats.to_string()))
        } else {
            Err(WatermarkError::InvalidFormat(formats.to_string()))
        }
    }

    /// The string as sent to the service.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The individual formats, in order.
    pub fn formats(&self) -> Vec<Format> {
        self.0
            .split(',')
            .filter_map(Format::from_token)
            .collect()
    }
}

impl FromIterator<Format> for Formats {
    fn from_iter<I: IntoIterator<Item = Format>>(iter: I) -> Self {
        let joined = iter
            .into_iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(",");
        Self(joined)
    }
}

/// Parameters of a `watermark` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkRequest {
    /// ISBN-13 or record reference of the book.
    pub identifier: String,
    /// Comma-joined format list, validated before sending.
    pub formats: String,
    /// Text appended at the end of every chapter.
    pub visible_watermark: String,
    /// Suffix appended to the book title.
    pub title_postfix: Option<String>,
    /// IP address of the end customer.
    pub customer_ip: Option<String>,
    /// Promotion identifier.
    pub client_symbol: Option<String>,
}

impl WatermarkRequest {
    /// Create a request with the mandatory fields.
    pub fn new(
        identifier: impl Into<String>,
        formats: impl Into<String>,
        visible_watermark: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            formats: formats.into(),
            visible_watermark: visible_watermark.into(),
            title_postfix: None,
            customer_ip: None,
            client_symbol: None,
        }
    }

    /// Set the title postfix.
    pub fn title_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.title_postfix = Some(postfix.into());
        self
    }

    /// Set the customer IP address.
    pub fn customer_ip(mut self, ip: impl Into<String>) -> Self {
        self.customer_ip = Some(ip.into());
        self
    }

    /// Set the promotion symbol.
    pub fn client_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.client_symbol = Some(symbol.into());
        self
    }

    /// Validate and marshal into request parameters.
    ///
    /// # Errors
    /// Returns [`WatermarkError::InvalidFormat`] if `formats` is not allowed.
    pub fn to_params(&self) -> Result<Params, WatermarkError> {
        let formats = Formats::parse(&self.formats)?;

        let mut params = Params::new();
        Identifier::classify(&self.identifier).push_to(&mut params);
        params.push("formats", formats.as_str());
        params.push("visible_watermark", self.visible_watermark.as_str());

        let optional = [
            ("title_postfix", &self.title_postfix),
            ("customer_ip", &self.customer_ip),
            ("client_symbol", &self.client_symbol),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                params.push(key, value);
            }
        }

        Ok(params)
    }
}

/// Where requests are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoints {
    /// Explicit base URLs (e.g. `https://www.elibri.com.pl`), tried in order.
    Hosts {
        /// Base URLs including scheme.
        urls: Vec<String>,
    },
    /// Subdomain labels of `base_domain`, tried in order.
    Subdomains {
        /// Labels such as `sf1`.
        labels: Vec<String>,
        /// Domain the labels are prefixed to.
        base_domain: String,
    },
    /// Subdomain labels listed in a DNS TXT record, tried in random order.
    Discover {
        /// DNS name holding the comma-separated labels.
        record: String,
        /// Domain the labels are prefixed to.
        base_domain: String,
    },
}

impl Endpoints {
    /// A single host; one attempt, no failover.
    pub fn single(url: impl Into<String>) -> Self {
        Self::Hosts {
            urls: vec![url.into()],
        }
    }

    /// Several explicit hosts tried in the given order.
    pub fn hosts<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Hosts {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    /// Subdomains of the default base domain tried in the given order.
    pub fn subdomains<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Subdomains {
            labels: labels.into_iter().map(Into::into).collect(),
            base_domain: DEFAULT_BASE_DOMAIN.to_string(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::Discover {
            record: DEFAULT_DISCOVERY_RECORD.to_string(),
            base_domain: DEFAULT_BASE_DOMAIN.to_string(),
        }
    }
}

/// Configuration for a [`WatermarkingClient`](crate::WatermarkingClient).
#[derive(Debug, Clone)]
pub struct WatermarkingConfig {
    /// Public API token.
    pub token: String,
    /// Private API secret used for signing.
    pub secret: String,
    /// Candidate host source.
    pub endpoints: Endpoints,
    /// Timeout of a single attempt against one host.
    pub attempt_timeout: Duration,
    /// Optional bound on a whole call, across all attempts.
    pub deadline: Option<Duration>,
    /// Skip TLS certificate verification. Only for test environments with
    /// self-signed certificates; never enable against the production service.
    pub danger_accept_invalid_certs: bool,
}

impl WatermarkingConfig {
    /// Configuration with the given credentials and defaults elsewhere.
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
            ..Default::default()
        }
    }
}

impl Default for WatermarkingConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            secret: String::new(),
            endpoints: Endpoints::default(),
            attempt_timeout: Duration::from_secs(30),
            deadline: None,
            danger_accept_invalid_certs: false,
        }
    }
}
