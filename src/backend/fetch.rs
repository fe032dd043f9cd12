use image::DynamicImage;
use std::future::Future;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::cache::Bitmap;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("decode task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Acquires the bitmap behind a locator.
///
/// Implementations must resolve to `Err(FetchError::Cancelled)` once `cancel`
/// fires, and must resolve exactly once.
pub trait FetchImage: Send + Sync + 'static {
    fn fetch(
        &self,
        locator: &str,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Bitmap, FetchError>> + Send;
}

pub fn build_client(
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
}

/// Fetches `http(s)://` locators over the network and anything else from disk.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn download(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        if is_remote(locator) {
            let response = self.client.get(locator).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status,
                    url: locator.to_string(),
                });
            }
            Ok(response.bytes().await?.to_vec())
        } else {
            Ok(tokio::fs::read(local_path(locator)).await?)
        }
    }
}

impl FetchImage for HttpFetcher {
    async fn fetch(&self, locator: &str, cancel: CancellationToken) -> Result<Bitmap, FetchError> {
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            bytes = self.download(locator) => bytes?,
        };

        let decode = tokio::task::spawn_blocking(move || decode_bitmap(&bytes));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            image = decode => Ok(Arc::new(image??)),
        }
    }
}

pub fn decode_bitmap(bytes: &[u8]) -> Result<DynamicImage, FetchError> {
    let image = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(image)
}

pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

fn local_path(locator: &str) -> PathBuf {
    PathBuf::from(locator.strip_prefix("file://").unwrap_or(locator))
}
