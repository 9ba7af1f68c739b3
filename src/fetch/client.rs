use async_trait::async_trait;
use reqwest::{Request, Response};

/// The single network seam of the pipeline. Wrappers such as
/// [`UrlParam`](super::auth::UrlParam) decorate a request before handing it on.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
