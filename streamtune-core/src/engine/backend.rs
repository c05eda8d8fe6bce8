use std::sync::Arc;

use crossbeam_channel::Sender;
use futures::future::BoxFuture;
use tokio::{runtime::Handle, task::AbortHandle};

use crate::{config::BackendKind, error::StreamError, source::PreparedStream};

/// Result of opening a stream URL.
///
/// `prepared` is playable as soon as it is returned. `fill`, when present,
/// keeps appending to the same buffer and resolves once the stream is complete.
pub struct OpenedStream {
    pub prepared: PreparedStream,
    pub fill: Option<BoxFuture<'static, Result<(), StreamError>>>,
}

impl OpenedStream {
    pub fn complete(prepared: PreparedStream) -> Self {
        Self {
            prepared,
            fill: None,
        }
    }
}

/// Resolves a stream URL into decodable audio
pub trait StreamBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<OpenedStream, StreamError>>;
}

/// Message posted by a load task back to the player thread
#[derive(Debug)]
pub enum LoaderMessage {
    /// Manifest parsed and first audio decoded
    Ready {
        generation: u64,
        stream: PreparedStream,
    },
    /// Every remaining segment has been appended
    Buffered { generation: u64 },
    Failed {
        generation: u64,
        error: StreamError,
    },
}

impl LoaderMessage {
    pub fn generation(&self) -> u64 {
        match self {
            LoaderMessage::Ready { generation, .. }
            | LoaderMessage::Buffered { generation }
            | LoaderMessage::Failed { generation, .. } => *generation,
        }
    }
}

/// Start loading `url` on the runtime. Every message carries `generation`.
pub(crate) fn spawn_load(
    runtime: &Handle,
    backend: Arc<dyn StreamBackend>,
    url: String,
    generation: u64,
    tx: Sender<LoaderMessage>,
) -> AbortHandle {
    let task = runtime.spawn(async move {
        let opened = match backend.open(&url).await {
            Ok(opened) => opened,
            Err(error) => {
                log::warn!("Load #{} of {} failed: {}", generation, url, error);
                let _ = tx.send(LoaderMessage::Failed { generation, error });
                return;
            }
        };

        log::debug!(
            "Load #{} ready ({:.1}s announced)",
            generation,
            opened.prepared.duration_seconds
        );
        if tx
            .send(LoaderMessage::Ready {
                generation,
                stream: opened.prepared,
            })
            .is_err()
        {
            return;
        }

        if let Some(fill) = opened.fill {
            let message = match fill.await {
                Ok(()) => LoaderMessage::Buffered { generation },
                Err(error) => LoaderMessage::Failed { generation, error },
            };
            let _ = tx.send(message);
        }
    });
    task.abort_handle()
}
