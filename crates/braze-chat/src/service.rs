//! The bounded completion worker.
//!
//! `/chat` handlers never talk to the completion API directly. They build a
//! [`ChatTask`] and offer it to the admission queue; a full queue rejects
//! synchronously so the handler can answer "busy" right away instead of
//! piling invisible work behind a slow backend. The consumer drains the
//! queue and spawns one worker per admitted task, holding a semaphore
//! permit so at most `max_workers` completions are in flight at once;
//! admitted tasks past the cap wait in the queue.

use std::sync::Arc;

use braze_core::foundation::outbound::edit_tolerant;
use braze_core::{ChatId, MessageId, Outbound};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::api::{CompletionApi, CompletionError, Turn};
use crate::history::History;
use crate::settings::ChatSettings;
use crate::stream::stream_reply;

/// How the finished completion reaches the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// One edit of the placeholder once the whole completion is in.
    Buffered,
    /// Periodic edits of the placeholder while fragments arrive.
    Streaming,
}

/// One admitted unit of completion work.
#[derive(Debug, Clone)]
pub struct ChatTask {
    pub chat: ChatId,
    /// The already-sent placeholder reply this task will edit in place.
    pub placeholder: MessageId,
    /// Full request: system turn, prior context, then the user prompt.
    pub turns: Vec<Turn>,
    pub mode: DeliveryMode,
}

/// The producer half: admission into the bounded queue.
#[derive(Clone)]
pub struct ChatService {
    queue: mpsc::Sender<ChatTask>,
}

impl ChatService {
    /// Builds the service and its unstarted consumer.
    pub fn new(
        api: Arc<dyn CompletionApi>,
        outbound: Arc<dyn Outbound>,
        history: History,
        settings: ChatSettings,
    ) -> (Self, ChatConsumer) {
        let (tx, rx) = mpsc::channel(settings.queue_depth.max(1));
        let consumer = ChatConsumer {
            queue: rx,
            permits: Arc::new(Semaphore::new(settings.max_workers.max(1))),
            worker: Arc::new(Worker {
                api,
                outbound,
                history,
                settings,
            }),
        };
        (Self { queue: tx }, consumer)
    }

    /// Builds the service and starts its consumer on the current runtime.
    pub fn spawn(
        api: Arc<dyn CompletionApi>,
        outbound: Arc<dyn Outbound>,
        history: History,
        settings: ChatSettings,
    ) -> Self {
        let (service, consumer) = Self::new(api, outbound, history, settings);
        tokio::spawn(consumer.run());
        service
    }

    /// Offers a task to the queue. `false` means the queue is full and the
    /// caller should tell the user to retry; the task is dropped.
    pub fn try_admit(&self, task: ChatTask) -> bool {
        match self.queue.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                debug!(chat = %task.chat, "completion queue full, rejecting");
                false
            }
            Err(TrySendError::Closed(task)) => {
                error!(chat = %task.chat, "completion consumer is gone, rejecting");
                false
            }
        }
    }
}

/// The consumer half: drains the queue, one spawned worker per task, at
/// most `max_workers` running at once.
pub struct ChatConsumer {
    queue: mpsc::Receiver<ChatTask>,
    permits: Arc<Semaphore>,
    worker: Arc<Worker>,
}

impl ChatConsumer {
    /// Runs until every `ChatService` handle is dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.queue.recv().await {
            // The semaphore is never closed, so acquisition only fails if
            // the runtime is tearing down.
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };
            let worker = Arc::clone(&self.worker);
            tokio::spawn(async move {
                worker.run(task).await;
                drop(permit);
            });
        }
    }
}

struct Worker {
    api: Arc<dyn CompletionApi>,
    outbound: Arc<dyn Outbound>,
    history: History,
    settings: ChatSettings,
}

impl Worker {
    async fn run(&self, task: ChatTask) {
        match task.mode {
            DeliveryMode::Buffered => self.run_buffered(task).await,
            DeliveryMode::Streaming => self.run_streaming(task).await,
        }
    }

    /// One completion call, one placeholder edit, then persist.
    async fn run_buffered(&self, task: ChatTask) {
        let content = match self.api.complete(&task.turns).await {
            Ok(content) => content,
            Err(err) => {
                error!(chat = %task.chat, error = %err, "completion failed");
                self.edit(task.chat, task.placeholder, &error_notice(&err))
                    .await;
                return;
            }
        };
        let visible = if content.trim().is_empty() {
            self.settings.fallback_text.clone()
        } else {
            content.clone()
        };
        self.edit(task.chat, task.placeholder, &visible).await;
        self.persist(&task, content).await;
    }

    /// Incremental edits while fragments arrive; persist only on a clean
    /// stream end.
    async fn run_streaming(&self, task: ChatTask) {
        let stream = match self.api.complete_stream(&task.turns).await {
            Ok(stream) => stream,
            Err(err) => {
                error!(chat = %task.chat, error = %err, "streamed completion failed to start");
                self.edit(task.chat, task.placeholder, &error_notice(&err))
                    .await;
                return;
            }
        };
        let content = stream_reply(
            stream,
            Arc::clone(&self.outbound),
            task.chat,
            task.placeholder,
            &self.settings,
        )
        .await;
        if let Some(content) = content {
            self.persist(&task, content).await;
        }
    }

    async fn edit(&self, chat: ChatId, message: MessageId, text: &str) {
        if let Err(err) = edit_tolerant(self.outbound.as_ref(), chat, message, text).await {
            error!(%chat, error = %err, "placeholder edit failed");
        }
    }

    /// Appends the assistant turn and stores the exchange under the
    /// placeholder id, so replying to that message continues the thread.
    async fn persist(&self, task: &ChatTask, content: String) {
        if self.history.keep_context() == 0 {
            return;
        }
        let mut turns = task.turns.clone();
        turns.push(Turn::assistant(content));
        self.history.save(task.chat, task.placeholder, &turns).await;
    }
}

fn error_notice(err: &CompletionError) -> String {
    format!("Something went wrong: {err}")
}
