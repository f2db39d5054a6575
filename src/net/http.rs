//! Script downloader over HTTP(S)

use reqwest::{redirect, Client, ClientBuilder};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Redirect hops followed before giving up
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("failed to save {path}: {source}")]
    Save { path: PathBuf, source: io::Error },
}

/// Status of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub status: u16,
    pub reason: String,
    /// Bytes written to the destination (0 unless the status was 2xx)
    pub bytes: usize,
}

impl FetchReport {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Downloads a URL into a file
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<FetchReport, FetchError>;
}

/// GET with rustls and redirect following
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::from_builder(Client::builder())
    }

    fn from_builder(builder: ClientBuilder) -> Result<Self, FetchError> {
        let client = builder
            .user_agent(concat!("pi-buttons/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<FetchReport, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(request_error)?;
        let status = response.status();
        if response.url().as_str() != url {
            log::debug!("{} redirected to {}", url, response.url());
        }

        let body = response.bytes().await.map_err(request_error)?;
        log::info!("GET {} -> {} ({} bytes)", url, status, body.len());

        let mut report = FetchReport {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            bytes: 0,
        };

        if status.is_success() {
            tokio::fs::write(destination, &body)
                .await
                .map_err(|source| FetchError::Save {
                    path: destination.to_path_buf(),
                    source,
                })?;
            report.bytes = body.len();
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local_fetcher() -> HttpFetcher {
        HttpFetcher::from_builder(Client::builder().no_proxy()).unwrap()
    }

    fn response(status: &str, headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            headers,
            body.len(),
            body
        )
    }

    /// Answer one connection per canned response, returning the requests seen
    async fn serve(
        listener: TcpListener,
        responses: Vec<String>,
    ) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut requests = Vec::new();
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 512];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
                requests.push(String::from_utf8(request).unwrap());
            }
            requests
        })
    }

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_fetch_saves_body() {
        let (listener, addr) = listen().await;
        let server = serve(
            listener,
            vec![response(
                "200 OK",
                "Content-Type: text/plain\r\n",
                "#!/usr/bin/env bash\necho padd\n",
            )],
        )
        .await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("padd.sh");

        let report = local_fetcher()
            .fetch(&format!("http://{}/jpmck/padd.sh", addr), &dest)
            .await
            .unwrap();

        assert_eq!(report.status, 200);
        assert_eq!(report.reason, "OK");
        assert!(report.is_success());
        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "#!/usr/bin/env bash\necho padd\n"
        );
        assert_eq!(report.bytes, 30);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /jpmck/padd.sh HTTP/1.1\r\n"));
        assert!(requests[0].contains("user-agent: pi-buttons/"));
    }

    #[tokio::test]
    async fn test_follows_redirect() {
        let (listener, addr) = listen().await;
        let server = serve(
            listener,
            vec![
                response(
                    "301 Moved Permanently",
                    &format!("Location: http://{}/real/padd.sh\r\n", addr),
                    "",
                ),
                response("200 OK", "", "echo moved\n"),
            ],
        )
        .await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("padd.sh");

        let report = local_fetcher()
            .fetch(&format!("http://{}/old/padd.sh", addr), &dest)
            .await
            .unwrap();

        assert_eq!(report.status, 200);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "echo moved\n");

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /old/padd.sh "));
        assert!(requests[1].starts_with("GET /real/padd.sh "));
    }

    #[tokio::test]
    async fn test_error_status_not_saved() {
        let (listener, addr) = listen().await;
        let _server = serve(listener, vec![response("404 Not Found", "", "404: Not Found")]).await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("padd.sh");
        std::fs::write(&dest, "old script").unwrap();

        let report = local_fetcher()
            .fetch(&format!("http://{}/missing.sh", addr), &dest)
            .await
            .unwrap();

        assert_eq!(report.status, 404);
        assert_eq!(report.reason, "Not Found");
        assert!(!report.is_success());
        assert_eq!(report.bytes, 0);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "old script");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let (listener, addr) = listen().await;
        drop(listener);

        let dir = tempdir().unwrap();
        let result = local_fetcher()
            .fetch(&format!("http://{}/padd.sh", addr), &dir.path().join("padd.sh"))
            .await;

        assert!(matches!(result, Err(FetchError::Request { .. })));
    }

    #[tokio::test]
    async fn test_bad_url_is_request_error() {
        let dir = tempdir().unwrap();
        let result = local_fetcher()
            .fetch("not a url", &dir.path().join("padd.sh"))
            .await;

        assert!(matches!(result, Err(FetchError::Request { .. })));
    }
}
