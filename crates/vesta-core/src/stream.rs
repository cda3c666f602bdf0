// ── Change subscriptions ──

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::model::ChangeSet;

/// A subscription to published change sets.
///
/// Each item is the delta of one publish. A subscriber that falls too
/// far behind skips the change sets it missed; it should re-read the
/// current snapshot when that happens.
pub struct ChangeStream {
    inner: BroadcastStream<Arc<ChangeSet>>,
}

impl ChangeStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Arc<ChangeSet>>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl Stream for ChangeStream {
    type Item = Arc<ChangeSet>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(changes))) => return Poll::Ready(Some(changes)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "change subscriber lagged, change sets dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
