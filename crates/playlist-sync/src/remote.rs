//! Where fresh copies of the component files come from.

use futures_util::StreamExt;
use playlist_proto::version::VersionDescriptor;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Component files are small scripts; anything far larger is not one.
pub const MAX_FILE_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
    #[error("malformed version descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}

/// "Fetch bytes by name" plus "fetch the version descriptor".
pub trait RemoteSource: Send + Sync {
    fn fetch_version(&self) -> impl Future<Output = Result<VersionDescriptor, FetchError>> + Send;

    fn fetch_file(&self, name: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Plain HTTP(S) GET of `<base_url><name>`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    version_file: String,
}

impl HttpSource {
    /// `timeout` bounds each whole request; a timeout is an ordinary fetch
    /// failure.
    pub fn new(
        base_url: impl Into<String>,
        version_file: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(concat!("playlistupd/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            version_file: version_file.into(),
        })
    }

    pub fn url_for(&self, name: &str) -> String {
        if self.base_url.ends_with('/') {
            format!("{}{}", self.base_url, name)
        } else {
            format!("{}/{}", self.base_url, name)
        }
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(name);
        debug!("remote: GET {}", url);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let mut body = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > MAX_FILE_BYTES {
                return Err(FetchError::TooLarge {
                    url,
                    limit: MAX_FILE_BYTES,
                });
            }
            body.extend_from_slice(&chunk);
        }
        debug!("remote: {} -> {} bytes", url, body.len());
        Ok(body)
    }
}

impl RemoteSource for HttpSource {
    async fn fetch_version(&self) -> Result<VersionDescriptor, FetchError> {
        let bytes = self.get(&self.version_file).await?;
        Ok(VersionDescriptor::from_slice(&bytes)?)
    }

    async fn fetch_file(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        self.get(name).await
    }
}
