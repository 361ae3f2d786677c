//! Watermarking API client: watermark, deliver, retry, supplier lookups and
//! catalog listings.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::error::WatermarkError;
use crate::resolver::HostResolver;
use crate::signer::Credentials;
use crate::transport::{HttpMethod, HttpTransport, Transport};
use crate::types::{Endpoints, Identifier, Params, WatermarkRequest, WatermarkingConfig};

/// Client for the watermarking API.
///
/// Watermarking is split in two steps. [`watermark`](Self::watermark) starts
/// the job as early as possible (for example when the customer leaves the
/// basket) and returns a transaction id. [`deliver`](Self::deliver), called
/// once payment is registered, records the transaction and has the service
/// copy the file into the shop's object-storage bucket.
#[derive(Debug, Clone)]
pub struct WatermarkingClient<T = HttpTransport, R = Endpoints> {
    dispatcher: Dispatcher<T, R>,
}

impl WatermarkingClient {
    /// Create a client over HTTPS from configuration.
    ///
    /// # Errors
    /// Returns [`WatermarkError::Client`] if the HTTP client cannot be built.
    pub fn new(config: WatermarkingConfig) -> Result<Self, WatermarkError> {
        let transport = HttpTransport::new(&config)?;
        let credentials = Credentials::new(config.token, config.secret);
        Ok(Self::with_parts(credentials, transport, config.endpoints)
            .with_deadline(config.deadline))
    }
}

impl<T: Transport, R: HostResolver> WatermarkingClient<T, R> {
    /// Create a client from an explicit transport and host resolver.
    pub fn with_parts(credentials: Credentials, transport: T, resolver: R) -> Self {
        Self {
            dispatcher: Dispatcher::new(credentials, transport, resolver),
        }
    }

    /// Bound every call, across all of its attempts.
    pub fn with_deadline(self, deadline: Option<Duration>) -> Self {
        Self {
            dispatcher: self.dispatcher.with_deadline(deadline),
        }
    }

    /// Abort calls when `token` is cancelled.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            dispatcher: self.dispatcher.with_cancellation(token),
        }
    }

    /// Token that aborts calls made through this client.
    pub fn cancellation_token(&self) -> &CancellationToken {
        self.dispatcher.cancellation_token()
    }

    /// The request dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher<T, R> {
        &self.dispatcher
    }

    /// Start watermarking a book.
    ///
    /// The service begins producing the files but neither exposes them nor
    /// registers the transaction until [`deliver`](Self::deliver) is called.
    ///
    /// # Returns
    /// The alphanumeric transaction id. The caller owns it and must keep it
    /// for [`deliver`](Self::deliver).
    ///
    /// # Errors
    /// [`WatermarkError::InvalidFormat`] is returned before any network call
    /// if `request.formats` is not allowed.
    pub async fn watermark(&self, request: &WatermarkRequest) -> Result<String, WatermarkError> {
        let params = request.to_params()?;
        let body = self
            .dispatcher
            .dispatch("watermark", HttpMethod::Post, params)
            .await?;
        Ok(transaction_id(&body))
    }

    /// Register the transaction and deliver the file(s) to the shop's bucket.
    ///
    /// Delivery is asynchronous: the service calls the shop's callback URL
    /// once the files are in place. The shop must delete each file after
    /// downloading it.
    pub async fn deliver(&self, trans_id: &str) -> Result<String, WatermarkError> {
        self.dispatcher
            .dispatch("deliver", HttpMethod::Post, trans_id_params(trans_id))
            .await
    }

    /// Watermark again for an expired transaction.
    ///
    /// # Returns
    /// A new transaction id, usable with [`deliver`](Self::deliver).
    pub async fn retry(&self, trans_id: &str) -> Result<String, WatermarkError> {
        let body = self
            .dispatcher
            .dispatch("retry", HttpMethod::Post, trans_id_params(trans_id))
            .await?;
        Ok(transaction_id(&body))
    }

    /// Ids of the suppliers offering a book.
    pub async fn check_suppliers(&self, ident: &str) -> Result<Vec<String>, WatermarkError> {
        let mut params = Params::new();
        Identifier::classify(ident).push_to(&mut params);

        let body = self
            .dispatcher
            .dispatch("check_suppliers", HttpMethod::Get, params)
            .await?;

        Ok(body
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect())
    }

    /// Name of a supplier.
    pub async fn get_supplier(&self, supplier_id: &str) -> Result<String, WatermarkError> {
        let mut params = Params::new();
        params.push("id", supplier_id);

        let body = self
            .dispatcher
            .dispatch("get_supplier", HttpMethod::Get, params)
            .await?;
        Ok(body.trim().to_string())
    }

    /// Books that are or will shortly be available.
    pub async fn available_files(&self) -> Result<serde_json::Value, WatermarkError> {
        self.catalog("available_files.json").await
    }

    /// Books not yet available whose release is near.
    pub async fn soon_available_files(&self) -> Result<serde_json::Value, WatermarkError> {
        self.catalog("soon_available_files.json").await
    }

    /// Books that will shortly stop being available.
    pub async fn soon_unavailable_files(&self) -> Result<serde_json::Value, WatermarkError> {
        self.catalog("soon_unavailable_files.json").await
    }

    async fn catalog<D: DeserializeOwned>(&self, path: &str) -> Result<D, WatermarkError> {
        let body = self
            .dispatcher
            .dispatch(path, HttpMethod::Get, Params::new())
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn trans_id_params(trans_id: &str) -> Params {
    let mut params = Params::new();
    params.push("trans_id", trans_id);
    params
}

/// Transaction ids are returned as the bare response body.
fn transaction_id(body: &str) -> String {
    body.trim().to_string()
}
