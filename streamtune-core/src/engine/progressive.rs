use std::sync::Arc;

use futures::future::BoxFuture;

use super::{
    backend::{OpenedStream, StreamBackend},
    decode::{MediaHint, decode_bytes},
};
use crate::{
    config::BackendKind,
    error::StreamError,
    source::{PreparedStream, StreamBuffer},
};

/// Plays a single audio resource per track: download, decode, play.
pub struct ProgressiveBackend {
    client: reqwest::Client,
}

impl ProgressiveBackend {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<OpenedStream, StreamError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let hint = MediaHint::from_response(content_type.as_deref(), response.url().path());
        let bytes = response.bytes().await?;
        log::debug!("Fetched {} bytes from {}", bytes.len(), url);

        let audio = tokio::task::spawn_blocking(move || decode_bytes(bytes.to_vec(), &hint))
            .await
            .map_err(|e| StreamError::Decode(format!("decoder task aborted: {e}")))??;

        let duration = audio.duration_seconds();
        let buffer = StreamBuffer::complete(audio.samples, audio.sample_rate, audio.channels);
        Ok(OpenedStream::complete(PreparedStream::new(
            Arc::new(buffer),
            duration,
        )))
    }
}

impl StreamBackend for ProgressiveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Progressive
    }

    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<OpenedStream, StreamError>> {
        Box::pin(self.fetch(url))
    }
}
