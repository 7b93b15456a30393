use reqwest::{Client, Method};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

use super::ByteStream;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("unsupported upload method: {0}")]
    Method(String),
}

/// Streams request bodies to pre-signed upload links.
#[derive(Clone, Default)]
pub struct TransferClient {
    http: Client,
}

impl TransferClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upload_stream(
        &self,
        href: &str,
        method: &str,
        body: ByteStream,
        size: u64,
    ) -> Result<(), TransferError> {
        let url = Url::parse(href)?;
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| TransferError::Method(method.to_string()))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(body));
        self.http
            .request(method, url)
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
