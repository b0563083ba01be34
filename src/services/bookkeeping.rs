// ABOUTME: Background queue for post-stream side effects (session saves and usage increments)
// ABOUTME: A single worker drains an mpsc channel and logs failures instead of surfacing them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Bookkeeping Queue
//!
//! By the time a turn's bookkeeping runs, the caller has already received the
//! streamed reply. Failures here are logged with the user and session ids and
//! never reach the client.
//!
//! Jobs run one at a time in enqueue order. [`BookkeepingQueue::flush`]
//! resolves once every job enqueued before it has run.

use std::sync::Arc;

use promptsmith_core::models::ConversationSession;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::database::DatabaseProvider;

/// A unit of deferred work
#[derive(Debug)]
pub enum BookkeepingJob {
    /// Upsert the conversation record
    SaveSession(Box<ConversationSession>),
    /// Add one final generation to the user's monthly counter
    IncrementUsage {
        /// Owning user
        user_id: String,
        /// Session the generation belonged to, for logs
        session_id: Option<String>,
    },
    /// Resolve once all earlier jobs have run
    Flush(oneshot::Sender<()>),
}

/// Handle to the bookkeeping worker
///
/// Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct BookkeepingQueue {
    sender: mpsc::UnboundedSender<BookkeepingJob>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl BookkeepingQueue {
    /// Start the worker on the current tokio runtime
    #[must_use]
    pub fn spawn(store: Arc<dyn DatabaseProvider>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(store, receiver));

        Self {
            sender,
            worker: Arc::new(Mutex::new(Some(worker))),
        }
    }

    /// Queue a job; dropped with a warning if the worker has stopped
    pub fn enqueue(&self, job: BookkeepingJob) {
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            warn!(?job, "Bookkeeping worker stopped, dropping job");
        }
    }

    /// Wait until every job enqueued before this call has run
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.enqueue(BookkeepingJob::Flush(tx));
        if rx.await.is_err() {
            debug!("Bookkeeping worker gone before flush completed");
        }
    }

    /// Drain outstanding jobs and stop the worker
    pub async fn shutdown(&self) {
        self.flush().await;

        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        worker.abort();
        if let Err(e) = worker.await {
            if !e.is_cancelled() {
                error!(error = %e, "Bookkeeping worker panicked");
            }
        }
        info!("Bookkeeping queue drained");
    }
}

async fn run_worker(
    store: Arc<dyn DatabaseProvider>,
    mut receiver: mpsc::UnboundedReceiver<BookkeepingJob>,
) {
    while let Some(job) = receiver.recv().await {
        match job {
            BookkeepingJob::SaveSession(session) => save_session(store.as_ref(), &session).await,
            BookkeepingJob::IncrementUsage {
                user_id,
                session_id,
            } => increment_usage(store.as_ref(), &user_id, session_id.as_deref()).await,
            BookkeepingJob::Flush(done) => {
                // Receiver may have given up waiting
                let _ = done.send(());
            }
        }
    }
    debug!("Bookkeeping channel closed, worker exiting");
}

async fn save_session(store: &dyn DatabaseProvider, session: &ConversationSession) {
    match store.upsert_session(session).await {
        Ok(true) => debug!(
            user_id = %session.user_id,
            session_id = %session.id,
            status = session.status.as_str(),
            "Session saved"
        ),
        Ok(false) => warn!(
            user_id = %session.user_id,
            session_id = %session.id,
            "Session id belongs to another user, not saved"
        ),
        Err(e) => error!(
            user_id = %session.user_id,
            session_id = %session.id,
            error = %e,
            "Failed to save session"
        ),
    }
}

async fn increment_usage(store: &dyn DatabaseProvider, user_id: &str, session_id: Option<&str>) {
    match store.increment_prompts_used(user_id).await {
        Ok(0) => warn!(user_id, session_id, "No usage row to increment"),
        Ok(_) => debug!(user_id, session_id, "Usage incremented"),
        Err(e) => error!(user_id, session_id, error = %e, "Failed to increment usage"),
    }
}
