use crate::config::ApiKey;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;

/// An [`HttpClient`] wrapper that appends an API key as a URL query parameter.
///
/// The Census API expects the key as `key=<value>`. When no key is configured
/// requests pass through untouched; the API still answers low-volume
/// keyless traffic.
pub struct UrlParam<C> {
    pub inner: C,
    pub param_name: String,
    pub key: Option<ApiKey>,
}

impl<C> UrlParam<C> {
    pub fn census(inner: C, key: Option<ApiKey>) -> Self {
        Self {
            inner,
            param_name: "key".to_string(),
            key,
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        if let Some(key) = &self.key {
            req.url_mut()
                .query_pairs_mut()
                .append_pair(&self.param_name, key.expose());
        }
        self.inner.execute(req).await
    }
}
