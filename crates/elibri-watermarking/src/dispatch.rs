//! Signed request dispatch with host failover.
//!
//! A logical call resolves its candidate hosts once, signs its parameters
//! once, and then walks the candidates in order. Server errors, unknown status
//! codes and transport failures disqualify only the current host; any other
//! classified response ends the call. When every host fails transiently the
//! call fails with [`WatermarkError::NoServerResponding`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::WatermarkError;
use crate::resolver::HostResolver;
use crate::signer::Credentials;
use crate::transport::{HttpMethod, RawResponse, SignedRequest, Transport};
use crate::types::Params;

/// Signs requests and delivers them to the first host that answers.
#[derive(Debug, Clone)]
pub struct Dispatcher<T, R> {
    credentials: Credentials,
    transport: T,
    resolver: R,
    deadline: Option<Duration>,
    cancel: CancellationToken,
}

impl<T: Transport, R: HostResolver> Dispatcher<T, R> {
    /// Create a dispatcher with no call deadline and a fresh cancellation token.
    pub fn new(credentials: Credentials, transport: T, resolver: R) -> Self {
        Self {
            credentials,
            transport,
            resolver,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Bound every call, across all of its attempts.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Abort calls when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts calls made through this dispatcher.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sign `params` and send them to `/watermarking/{path}`.
    ///
    /// # Returns
    /// The body of the first response classified as success.
    ///
    /// # Errors
    /// The first terminal classification, [`WatermarkError::NoServerResponding`]
    /// when every host failed transiently, [`WatermarkError::Cancelled`] or
    /// [`WatermarkError::Timeout`].
    pub async fn dispatch(
        &self,
        path: &str,
        method: HttpMethod,
        params: Params,
    ) -> Result<String, WatermarkError> {
        if self.cancel.is_cancelled() {
            return Err(WatermarkError::Cancelled);
        }

        match self.deadline {
            Some(limit) => tokio::time::timeout(limit, self.run(path, method, params))
                .await
                .map_err(|_| WatermarkError::Timeout)?,
            None => self.run(path, method, params).await,
        }
    }

    async fn run(
        &self,
        path: &str,
        method: HttpMethod,
        params: Params,
    ) -> Result<String, WatermarkError> {
        let hosts = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(WatermarkError::Cancelled),
            resolved = self.resolver.resolve() => resolved?,
        };

        // One stamp per logical call, shared by every attempt.
        let stamp = chrono::Utc::now().timestamp();
        let request = SignedRequest {
            path: path.to_string(),
            method,
            params: self.credentials.envelope(params, stamp),
        };

        let mut attempts = 0;
        for host in &hosts {
            if self.cancel.is_cancelled() {
                return Err(WatermarkError::Cancelled);
            }
            attempts += 1;
            tracing::debug!(
                host = %host,
                path,
                %method,
                attempt = attempts,
                "sending signed request"
            );

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(WatermarkError::Cancelled),
                outcome = self.transport.send(host, &request) => outcome,
            };

            match outcome.and_then(classify) {
                Ok(body) => {
                    tracing::debug!(host = %host, path, "request accepted");
                    return Ok(body);
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(host = %host, path, error = %err, "host failed, trying next");
                }
                Err(err) => {
                    tracing::debug!(host = %host, path, error = %err, "request rejected");
                    return Err(err);
                }
            }
        }

        Err(WatermarkError::NoServerResponding { attempts })
    }
}

/// Map an HTTP response onto its outcome.
///
/// 200, 202 and 412 are successes and yield the body unchanged.
pub fn classify(response: RawResponse) -> Result<String, WatermarkError> {
    match response.status {
        200 | 202 | 412 => Ok(response.body),
        400 => Err(WatermarkError::InvalidParameters(response.body)),
        401 => Err(WatermarkError::Unauthorized),
        403 => Err(WatermarkError::Forbidden(response.body)),
        404 => Err(WatermarkError::NotFound),
        408 => Err(WatermarkError::RequestExpired),
        500 => Err(WatermarkError::ServerError),
        status => Err(WatermarkError::Unknown { status }),
    }
}
