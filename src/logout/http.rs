use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

/// Delivery of back-channel logout notices. The transport is external to
/// the engine; only the success/failure outcome matters here.
#[async_trait]
pub trait LogoutHttpClient: Send + Sync {
    /// POST the logout message to the service. True iff the service
    /// answered with a 2xx status.
    async fn send_logout(&self, url: &str, message: &str) -> bool;
}

/// reqwest-backed client with a bounded per-request timeout, so one
/// non-responsive relying party cannot stall a logout indefinitely.
pub struct ReqwestLogoutClient {
    client: reqwest::Client,
}

impl ReqwestLogoutClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LogoutHttpClient for ReqwestLogoutClient {
    async fn send_logout(&self, url: &str, message: &str) -> bool {
        let result = self
            .client
            .post(url)
            .form(&[("logoutRequest", message)])
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(url = %url, status = %response.status(), "Logout endpoint returned non-success");
                false
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Logout dispatch failed");
                false
            }
        }
    }
}
