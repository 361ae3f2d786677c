//! Candidate host resolution.
//!
//! Explicit host and subdomain lists are used verbatim. Discovery reads a DNS
//! TXT record holding comma-separated subdomain labels and shuffles them, so
//! load spreads evenly over the replicas.

use std::future::Future;

use hickory_resolver::TokioAsyncResolver;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::WatermarkError;
use crate::types::Endpoints;

/// Source of candidate base URLs for one dispatch.
pub trait HostResolver: Send + Sync {
    /// Resolve the candidates, in the order they should be tried.
    fn resolve(&self) -> impl Future<Output = Result<Vec<String>, WatermarkError>> + Send;
}

impl HostResolver for Endpoints {
    async fn resolve(&self) -> Result<Vec<String>, WatermarkError> {
        let hosts: Vec<String> = match self {
            Self::Hosts { urls } => urls
                .iter()
                .map(|url| url.trim_end_matches('/').to_string())
                .collect(),
            Self::Subdomains { labels, base_domain } => labels
                .iter()
                .map(|label| subdomain_url(label, base_domain))
                .collect(),
            Self::Discover { record, base_domain } => {
                return TxtDiscovery::new(SystemTxt, record.as_str(), base_domain.as_str())
                    .resolve()
                    .await;
            }
        };

        non_empty(hosts)
    }
}

/// Source of DNS TXT record values.
pub trait TxtSource: Send + Sync {
    /// Values of every TXT record under `record`, one string per record.
    fn lookup(&self, record: &str)
        -> impl Future<Output = Result<Vec<String>, WatermarkError>> + Send;
}

/// [`TxtSource`] backed by the system resolver configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTxt;

impl TxtSource for SystemTxt {
    async fn lookup(&self, record: &str) -> Result<Vec<String>, WatermarkError> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| WatermarkError::Discovery(format!("resolver setup: {e}")))?;

        let lookup = resolver
            .txt_lookup(record)
            .await
            .map_err(|e| WatermarkError::Discovery(format!("TXT lookup of {record}: {e}")))?;

        Ok(lookup
            .iter()
            .map(|txt| join_character_strings(txt.txt_data()))
            .collect())
    }
}

/// Hosts listed in a TXT record, tried in random order.
#[derive(Debug, Clone)]
pub struct TxtDiscovery<S = SystemTxt> {
    source: S,
    record: String,
    base_domain: String,
}

impl<S: TxtSource> TxtDiscovery<S> {
    /// Discover subdomains of `base_domain` listed under `record`.
    pub fn new(source: S, record: impl Into<String>, base_domain: impl Into<String>) -> Self {
        Self {
            source,
            record: record.into(),
            base_domain: base_domain.into(),
        }
    }
}

impl<S: TxtSource> HostResolver for TxtDiscovery<S> {
    async fn resolve(&self) -> Result<Vec<String>, WatermarkError> {
        let records = self.source.lookup(&self.record).await?;
        tracing::debug!(
            record = %self.record,
            value = %records.join(","),
            "discovered candidate hosts"
        );

        let hosts = discover_hosts(&records, &self.base_domain, &mut rand::thread_rng());
        non_empty(hosts)
    }
}

/// Base URLs listed in TXT record values, shuffled with `rng`.
///
/// Records are joined with commas before the labels are split out.
pub fn discover_hosts<G: Rng + ?Sized>(
    records: &[String],
    base_domain: &str,
    rng: &mut G,
) -> Vec<String> {
    let mut hosts = parse_host_labels(&records.join(","), base_domain);
    hosts.shuffle(rng);
    hosts
}

/// Concatenate the character-strings of one TXT record.
pub fn join_character_strings<B: AsRef<[u8]>>(parts: &[B]) -> String {
    parts
        .iter()
        .map(|part| String::from_utf8_lossy(part.as_ref()))
        .collect()
}

/// Full base URL for a subdomain label.
pub fn subdomain_url(label: &str, base_domain: &str) -> String {
    format!("https://{}.{}", label, base_domain)
}

/// Split a comma-separated label list into base URLs, dropping blanks.
pub fn parse_host_labels(raw: &str, base_domain: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(|label| subdomain_url(label, base_domain))
        .collect()
}

fn non_empty(hosts: Vec<String>) -> Result<Vec<String>, WatermarkError> {
    if hosts.is_empty() {
        return Err(WatermarkError::Discovery("no candidate hosts".to_string()));
    }
    Ok(hosts)
}
