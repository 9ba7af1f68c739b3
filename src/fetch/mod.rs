mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use reqwest::{Method, Request, Url};
use tracing::debug;

use crate::error::{PipelineError, Result};

pub(crate) fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| PipelineError::Url(format!("{url}: {e}")))
}

/// Builds a GET request for `url` with `params` appended as query pairs.
pub fn get_request(url: &str, params: &[(&str, &str)]) -> Result<Request> {
    let mut parsed = parse_url(url)?;
    if !params.is_empty() {
        parsed.query_pairs_mut().extend_pairs(params);
    }
    Ok(Request::new(Method::GET, parsed))
}

/// Transport errors print the request URL, which may hold a credential added
/// by a client wrapper.
pub(crate) fn redact(e: reqwest::Error) -> PipelineError {
    PipelineError::Http(e.without_url())
}

/// Fetches `url` and returns the body, failing with
/// [`PipelineError::Download`] on any non-2xx status. No retries.
pub async fn fetch_checked<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let resp = client
        .execute(get_request(url, &[])?)
        .await
        .map_err(redact)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(PipelineError::Download {
            url: url.to_string(),
            status,
        });
    }
    let bytes = resp.bytes().await.map_err(redact)?;
    debug!(url, bytes = bytes.len(), "Download complete");
    Ok(bytes.to_vec())
}

/// Loads a reference file from a local path or fetches it over HTTP.
pub async fn read_source<C: HttpClient>(client: &C, source: &str) -> Result<Vec<u8>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_checked(client, source).await
    } else {
        Ok(std::fs::read(source)?)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockClient;
    use super::*;

    #[test]
    fn get_request_encodes_query_pairs() {
        let req = get_request(
            "https://api.example.test/data",
            &[("get", "NAME,B19013_001E"), ("for", "zip code tabulation area:90001")],
        )
        .unwrap();
        let query: Vec<(String, String)> = req
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(query[0], ("get".into(), "NAME,B19013_001E".into()));
        assert_eq!(query[1], ("for".into(), "zip code tabulation area:90001".into()));
    }

    #[test]
    fn get_request_rejects_garbage_url() {
        assert!(matches!(
            get_request("not a url", &[]),
            Err(PipelineError::Url(_))
        ));
    }

    #[tokio::test]
    async fn fetch_checked_returns_body_on_success() {
        let client = MockClient::ok("hello");
        let body = fetch_checked(&client, "https://example.test/a.txt").await.unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn fetch_checked_fails_on_non_success() {
        let client = MockClient::status(503);
        let err = fetch_checked(&client, "https://example.test/a.txt")
            .await
            .unwrap_err();
        match err {
            PipelineError::Download { url, status } => {
                assert_eq!(url, "https://example.test/a.txt");
                assert_eq!(status.as_u16(), 503);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.requested_urls().len(), 1);
    }

    #[tokio::test]
    async fn transport_error_does_not_expose_query_credentials() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = auth::UrlParam::census(
            BasicClient::new(),
            Some(crate::config::ApiKey::new("SECRET123")),
        );

        let err = fetch_checked(&client, &format!("http://127.0.0.1:{port}/data"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Http(_)));
        assert!(!err.to_string().contains("SECRET123"));
        assert!(!format!("{err:?}").contains("SECRET123"));
    }

    #[tokio::test]
    async fn read_source_reads_local_files_without_http() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rel.txt");
        std::fs::write(&path, "ZCTA5,STATE,COUNTY\n").unwrap();

        let client = MockClient::status(500);
        let body = read_source(&client, path.to_str().unwrap()).await.unwrap();
        assert_eq!(body, b"ZCTA5,STATE,COUNTY\n");
        assert!(client.requested_urls().is_empty());
    }
}
