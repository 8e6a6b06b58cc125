//! Output sequence of a search

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::results::ResultItem;

/// Lazily produced, cancellable sequence of results.
///
/// Dropping the stream cancels the search task, so a consumer may stop
/// early without further backend calls being issued. Once the token is
/// cancelled, items still in flight are discarded.
pub struct SearchStream {
    rx: mpsc::Receiver<ResultItem>,
    cancel: Option<CancellationToken>,
    _guard: Option<DropGuard>,
}

impl SearchStream {
    /// Receive from `rx` until `cancel` fires; dropping cancels `cancel`
    pub(crate) fn new(rx: mpsc::Receiver<ResultItem>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            _guard: Some(cancel.clone().drop_guard()),
            cancel: Some(cancel),
        }
    }

    /// A stream that ends immediately
    pub fn empty() -> Self {
        let (_, rx) = mpsc::channel(1);
        Self {
            rx,
            cancel: None,
            _guard: None,
        }
    }
}

impl Stream for SearchStream {
    type Item = ResultItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ResultItem>> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            self.rx.close();
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Producer side held by the search task
pub(crate) struct Emitter {
    tx: mpsc::Sender<ResultItem>,
    cancel: CancellationToken,
}

impl Emitter {
    pub(crate) fn new(tx: mpsc::Sender<ResultItem>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// False once cancelled or the consumer has gone away
    pub(crate) fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.tx.is_closed()
    }

    /// Yield one item. Returns false when the search must stop.
    pub(crate) async fn emit(&self, item: ResultItem) -> bool {
        if !self.is_live() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(item) => sent.is_ok(),
        }
    }
}
