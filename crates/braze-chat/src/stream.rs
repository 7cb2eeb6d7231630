//! Streaming delivery: accumulate fragments, flush on a fixed interval.
//!
//! One reader task drains the fragment stream into a locked buffer. The
//! calling worker ticks at `flush_interval` and edits the placeholder reply
//! with the buffered content, but only when the trimmed content is
//! non-empty and actually changed since the last successful flush. The
//! platform rejects no-op edits and edit-rate limits are tight.
//!
//! A stream error appends a terminal notice to the visible content and the
//! exchange is not persisted; a clean end returns the accumulated text so
//! the caller can append the assistant turn and persist.

use std::sync::Arc;

use braze_core::foundation::outbound::edit_tolerant;
use braze_core::{ChatId, MessageId, Outbound};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::error;

use crate::api::FragmentStream;
use crate::settings::ChatSettings;

const STREAM_INTERRUPTED: &str = "\n\n...the stream broke off here.";

/// Drives one streamed completion into the placeholder message.
///
/// Returns the accumulated content on a clean stream end, `None` when the
/// stream errored.
pub(crate) async fn stream_reply(
    mut stream: FragmentStream,
    outbound: Arc<dyn Outbound>,
    chat: ChatId,
    placeholder: MessageId,
    settings: &ChatSettings,
) -> Option<String> {
    let buffer = Arc::new(Mutex::new(String::new()));
    let (done_tx, mut done_rx) = oneshot::channel::<bool>();

    let reader_buffer = Arc::clone(&buffer);
    tokio::spawn(async move {
        let mut clean = true;
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => reader_buffer.lock().push_str(&fragment),
                Err(err) => {
                    error!(error = %err, "completion stream failed");
                    reader_buffer.lock().push_str(STREAM_INTERRUPTED);
                    clean = false;
                    break;
                }
            }
        }
        let _ = done_tx.send(clean);
    });

    let mut interval = tokio::time::interval(settings.flush_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_flushed = String::new();

    let clean = loop {
        tokio::select! {
            _ = interval.tick() => {
                let snapshot = buffer.lock().clone();
                if !snapshot.trim().is_empty() && snapshot.trim() != last_flushed.trim() {
                    match edit_tolerant(outbound.as_ref(), chat, placeholder, &snapshot).await {
                        Ok(()) => last_flushed = snapshot,
                        Err(err) => error!(error = %err, "streaming flush failed"),
                    }
                }
            }
            result = &mut done_rx => break result.unwrap_or(false),
        }
    };

    let content = buffer.lock().clone();
    let mut visible = content.clone();
    if visible.trim().is_empty() {
        visible = settings.fallback_text.clone();
    }
    if visible.trim() != last_flushed.trim() {
        if let Err(err) = edit_tolerant(outbound.as_ref(), chat, placeholder, &visible).await {
            error!(error = %err, "final streaming edit failed");
        }
    }

    clean.then_some(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CompletionError;
    use braze_core::RecordingOutbound;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const CHAT: ChatId = ChatId(1);
    const PLACEHOLDER: MessageId = MessageId(500);

    type Fragment = Result<String, CompletionError>;

    fn channel_stream(rx: mpsc::Receiver<Fragment>) -> FragmentStream {
        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }

    fn settings() -> ChatSettings {
        ChatSettings {
            flush_interval: Duration::from_secs(2),
            ..ChatSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn identical_trimmed_content_is_flushed_once() {
        let outbound = RecordingOutbound::new();
        let (tx, rx) = mpsc::channel::<Fragment>(8);
        let settings = settings();

        let runner = {
            let outbound: Arc<dyn Outbound> = outbound.clone();
            tokio::spawn(async move {
                stream_reply(channel_stream(rx), outbound, CHAT, PLACEHOLDER, &settings).await
            })
        };

        tx.send(Ok("hello".into())).await.unwrap();
        // Several flush intervals pass while the content stays the same.
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(outbound.edit_count(), 1);

        // Trailing whitespace does not count as a change.
        tx.send(Ok("  ".into())).await.unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(outbound.edit_count(), 1);

        drop(tx);
        let content = runner.await.unwrap();
        assert_eq!(content.as_deref(), Some("hello  "));
        // The final edit is skipped too: nothing changed after trimming.
        assert_eq!(outbound.edit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn growing_content_is_flushed_per_tick() {
        let outbound = RecordingOutbound::new();
        let (tx, rx) = mpsc::channel::<Fragment>(8);
        let settings = settings();

        let runner = {
            let outbound: Arc<dyn Outbound> = outbound.clone();
            tokio::spawn(async move {
                stream_reply(channel_stream(rx), outbound, CHAT, PLACEHOLDER, &settings).await
            })
        };

        tx.send(Ok("first".into())).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(Ok(" second".into())).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(tx);

        let content = runner.await.unwrap().unwrap();
        assert_eq!(content, "first second");
        assert_eq!(outbound.last_edit_text().as_deref(), Some("first second"));
        assert!(outbound.edit_count() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_error_appends_a_terminal_notice_and_skips_persisting() {
        let outbound = RecordingOutbound::new();
        let (tx, rx) = mpsc::channel::<Fragment>(8);
        let settings = settings();

        let runner = {
            let outbound: Arc<dyn Outbound> = outbound.clone();
            tokio::spawn(async move {
                stream_reply(channel_stream(rx), outbound, CHAT, PLACEHOLDER, &settings).await
            })
        };

        tx.send(Ok("partial".into())).await.unwrap();
        tx.send(Err(CompletionError::Interrupted("boom".into())))
            .await
            .unwrap();

        let content = runner.await.unwrap();
        assert_eq!(content, None);
        let last = outbound.last_edit_text().unwrap();
        assert!(last.starts_with("partial"));
        assert!(last.contains("broke off"));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_stream_falls_back() {
        let outbound = RecordingOutbound::new();
        let (tx, rx) = mpsc::channel::<Fragment>(8);
        let settings = settings();

        let runner = {
            let outbound: Arc<dyn Outbound> = outbound.clone();
            tokio::spawn(async move {
                stream_reply(channel_stream(rx), outbound, CHAT, PLACEHOLDER, &settings).await
            })
        };

        drop(tx);
        let content = runner.await.unwrap();
        assert_eq!(content.as_deref(), Some(""));
        assert_eq!(
            outbound.last_edit_text(),
            Some(ChatSettings::default().fallback_text)
        );
    }
}
