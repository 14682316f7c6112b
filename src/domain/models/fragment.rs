#[cfg(test)]
#[path = "fragment_test.rs"]
mod tests;

use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::AiError;

/// Opaque text chunk, the only unit observed while streaming.
pub type StreamFragment = String;

pub const FRAGMENT_CHANNEL_CAPACITY: usize = 64;

type FragmentResult = Result<StreamFragment, AiError>;

/// Producer half handed to backends. Sending waits while the channel is full.
#[derive(Clone)]
pub struct FragmentSender {
    tx: mpsc::Sender<FragmentResult>,
}

impl FragmentSender {
    pub async fn send(&self, fragment: StreamFragment) -> Result<(), AiError> {
        return self
            .tx
            .send(Ok(fragment))
            .await
            .map_err(|_| return AiError::Cancelled);
    }

    async fn fail(&self, err: AiError) {
        // Nobody is left to tell when the receiver is gone.
        let _ = self.tx.send(Err(err)).await;
    }
}

/// Consumer half of a generation. Yields fragments in emission order and ends
/// either with `None` on a normal finish, or with a single `Err` item followed
/// by `None` when the producer failed.
///
/// Dropping the stream aborts the producer task, which tears down the
/// underlying transport.
pub struct FragmentStream {
    rx: mpsc::Receiver<FragmentResult>,
    producer: Option<JoinHandle<()>>,
}

impl FragmentStream {
    pub fn channel() -> (FragmentSender, FragmentStream) {
        let (tx, rx) = mpsc::channel::<FragmentResult>(FRAGMENT_CHANNEL_CAPACITY);
        let stream = FragmentStream { rx, producer: None };

        return (FragmentSender { tx }, stream);
    }

    /// Runs `producer` on its own task, forwarding its terminal error into the
    /// stream.
    pub fn spawn<F, Fut>(producer: F) -> FragmentStream
    where
        F: FnOnce(FragmentSender) -> Fut,
        Fut: Future<Output = Result<(), AiError>> + Send + 'static,
    {
        let (sender, mut stream) = FragmentStream::channel();
        let error_sender = sender.clone();
        let fut = producer(sender);

        stream.producer = Some(tokio::spawn(async move {
            if let Err(err) = fut.await {
                tracing::debug!(error = ?err, "Fragment producer failed");
                error_sender.fail(err).await;
            }
        }));

        return stream;
    }

    pub async fn next_fragment(&mut self) -> Option<FragmentResult> {
        return self.rx.recv().await;
    }

    /// Drains the stream into a single string.
    pub async fn collect_text(mut self) -> Result<String, AiError> {
        let mut text = "".to_string();
        while let Some(fragment) = self.next_fragment().await {
            text += &fragment?;
        }

        return Ok(text);
    }
}

impl Stream for FragmentStream {
    type Item = FragmentResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        return self.rx.poll_recv(cx);
    }
}

impl Drop for FragmentStream {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}
