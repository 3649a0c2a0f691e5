//! Pull-based stream of normalized chunks

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tracing::warn;

use super::engine::StreamEngine;
use crate::http::FrameStream;
use crate::protocol::{Response, StreamChunk};
use crate::providers::adapter::Adapter;
use crate::providers::error::{ProviderError, ProviderResult};

/// A streamed completion
///
/// Frames are read from the transport only when every chunk decoded from the
/// previous frame has been handed out. Dropping the stream drops the
/// underlying connection.
pub struct CompletionStream {
    adapter: Arc<dyn Adapter>,
    frames: Option<FrameStream>,
    engine: StreamEngine,
    pending: VecDeque<StreamChunk>,
    failure: Option<ProviderError>,
}

impl CompletionStream {
    /// Drive `frames` through `adapter`'s decoder
    pub fn new(adapter: Arc<dyn Adapter>, frames: FrameStream) -> Self {
        let engine = StreamEngine::new(adapter.name());
        Self {
            adapter,
            frames: Some(frames),
            engine,
            pending: VecDeque::new(),
            failure: None,
        }
    }

    /// The aggregate, available once the terminal chunk has been yielded
    pub fn response(&self) -> Option<&Response> {
        if self.pending.is_empty() {
            self.engine.response()
        } else {
            None
        }
    }

    /// Everything received so far; `complete` is false until the turn ended
    pub fn partial(&self) -> Response {
        self.engine.partial()
    }

    /// Consume the remaining chunks and return the aggregate
    pub async fn collect_response(mut self) -> ProviderResult<Response> {
        while let Some(chunk) = self.next().await {
            chunk?;
        }
        self.engine.into_response().ok_or(ProviderError::IncompleteStream)
    }

    fn close(&mut self) {
        self.frames = None;
    }
}

impl Stream for CompletionStream {
    type Item = ProviderResult<StreamChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(chunk) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(chunk)));
            }
            if let Some(err) = this.failure.take() {
                return Poll::Ready(Some(Err(err)));
            }

            let Some(frames) = this.frames.as_mut() else {
                return Poll::Ready(None);
            };

            match frames.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(frame))) => {
                    match this.engine.push_frame(this.adapter.as_ref(), &frame) {
                        Ok(chunks) => {
                            this.pending.extend(chunks);
                            if let Some(err) = this.engine.take_error() {
                                this.failure = Some(err);
                                this.close();
                            } else if this.engine.is_finished() {
                                this.close();
                            }
                        }
                        Err(e) => {
                            this.close();
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!(provider = %this.adapter.name(), error = %e, "Transport failed mid-stream");
                    this.engine.abort();
                    this.close();
                    return Poll::Ready(Some(Err(ProviderError::Transport(e))));
                }
                Poll::Ready(None) => {
                    this.close();
                    match this.engine.finish() {
                        Ok(chunk) => this.pending.extend(chunk),
                        Err(e) => return Poll::Ready(Some(Err(e))),
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("provider", &self.adapter.name())
            .field("status", &self.engine.status())
            .field("pending", &self.pending.len())
            .finish()
    }
}
