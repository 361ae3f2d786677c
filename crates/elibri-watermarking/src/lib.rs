#![deny(missing_docs)]

//! # elibri-watermarking
//!
//! Client for the eLibri e-book watermarking API.
//!
//! Every request is signed with an HMAC-SHA1 of the current Unix time keyed
//! with the private secret, and is sent to one of several interchangeable
//! service hosts. Hosts answering with a server error, an unknown status or no
//! response at all are skipped; any other answer is final.
//!
//! # Example
//!
//! ```no_run
//! use elibri_watermarking::{WatermarkRequest, WatermarkingClient, WatermarkingConfig};
//!
//! # async fn example() -> Result<(), elibri_watermarking::WatermarkError> {
//! let client = WatermarkingClient::new(WatermarkingConfig::new("public-token", "secret"))?;
//!
//! let request = WatermarkRequest::new("9788324631766", "epub,mobi", "Book for Jan Kowalski")
//!     .customer_ip("178.42.78.98");
//! let trans_id = client.watermark(&request).await?;
//!
//! // after the payment is registered
//! client.deliver(&trans_id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Host selection
//!
//! By default the candidate hosts are read from the DNS TXT record
//! [`DEFAULT_DISCOVERY_RECORD`](types::DEFAULT_DISCOVERY_RECORD) and tried in
//! random order. [`Endpoints`] also accepts an explicit host list or
//! subdomain list, tried in the given order.

pub mod client;
pub mod dispatch;
pub mod error;
pub mod resolver;
pub mod signer;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::WatermarkingClient;
pub use dispatch::Dispatcher;
pub use error::WatermarkError;
pub use resolver::{HostResolver, SystemTxt, TxtDiscovery, TxtSource};
pub use signer::Credentials;
pub use transport::{HttpMethod, HttpTransport, RawResponse, SignedRequest, Transport};
pub use types::{
    Endpoints, Format, Formats, Identifier, Params, WatermarkRequest, WatermarkingConfig,
};
