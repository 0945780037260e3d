//! Actor that owns the current session and sequences its stages.
//!
//! The host talks to the actor through a cloneable [`SessionHandle`]. Slow
//! stages (transcribe, translate, execute) run in spawned tasks that report
//! back on the completion channel tagged with the session they belong to;
//! classification and chart selection run inline. Every change is published
//! on a watch channel as a [`SessionSnapshot`].

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::pipeline::Pipeline;
use super::state::{Phase, Question, SessionEvent, SessionSnapshot};
use super::tracker::{ApplyOutcome, SessionId, SessionTracker};
use crate::connection::ActiveConnection;
use crate::db::{build_snapshot, DatabaseClient, SchemaSnapshot};
use crate::error::{GenvizError, Result};
use crate::llm::TranslationRequest;

/// The database a session asks questions about.
#[derive(Clone)]
pub struct SchemaContext {
    pub db: Arc<dyn DatabaseClient>,
    pub database: String,
    pub schema: Arc<SchemaSnapshot>,
    pub version: Option<String>,
}

impl SchemaContext {
    /// Introspects `database` through `db`.
    pub async fn load(db: Arc<dyn DatabaseClient>, database: &str) -> Result<Self> {
        let schema = build_snapshot(db.as_ref(), database).await?;
        let version = db.server_version().await;
        Ok(Self {
            db,
            database: database.to_string(),
            schema: Arc::new(schema),
            version,
        })
    }

    pub fn dialect(&self) -> &str {
        self.db.dialect()
    }
}

impl From<ActiveConnection> for SchemaContext {
    fn from(active: ActiveConnection) -> Self {
        Self {
            db: active.db,
            database: active.key.database,
            schema: active.schema,
            version: active.version,
        }
    }
}

/// Commands sent from the host to the actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// Start a session for a question, superseding the current one.
    Submit {
        question: Question,
        reply: oneshot::Sender<SessionId>,
    },
    /// Rebuild the schema snapshot and drop memoized translations.
    RefreshSchema {
        reply: oneshot::Sender<Result<Arc<SchemaSnapshot>>>,
    },
    Shutdown,
}

/// A stage task finished.
#[derive(Debug)]
struct Completion {
    id: SessionId,
    event: SessionEvent,
}

pub struct SessionActor {
    commands: mpsc::Receiver<SessionCommand>,
    completions_tx: mpsc::Sender<Completion>,
    completions: mpsc::Receiver<Completion>,
    snapshots: watch::Sender<Option<SessionSnapshot>>,
    tracker: SessionTracker,
    pipeline: Pipeline,
    context: SchemaContext,
}

impl SessionActor {
    /// Creates the actor and its handle without starting it.
    pub fn new(pipeline: Pipeline, context: SchemaContext) -> (SessionHandle, Self) {
        let (sender, commands) = mpsc::channel(32);
        let (completions_tx, completions) = mpsc::channel(32);
        let (snapshots, receiver) = watch::channel(None);

        let handle = SessionHandle {
            sender,
            snapshots: receiver,
        };
        let actor = Self {
            commands,
            completions_tx,
            completions,
            snapshots,
            tracker: SessionTracker::new(),
            pipeline,
            context,
        };
        (handle, actor)
    }

    /// Creates the actor and runs it on the tokio runtime.
    pub fn spawn(pipeline: Pipeline, context: SchemaContext) -> SessionHandle {
        let (handle, actor) = Self::new(pipeline, context);
        tokio::spawn(actor.run());
        handle
    }

    /// Processes commands and completions until shut down.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },

                Some(done) = self.completions.recv() => {
                    self.handle_completion(done);
                }
            }
        }

        debug!("Session actor stopped");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Submit { question, reply } => {
                if let Some(previous) = self.tracker.snapshot() {
                    if !previous.phase.is_terminal() {
                        info!("Session {} superseded while {}", previous.id, previous.phase);
                    }
                }
                let id = self.tracker.submit(question);
                info!("Session {} submitted", id);
                self.publish();
                let _ = reply.send(id);
                self.advance(id);
            }
            SessionCommand::RefreshSchema { reply } => {
                let _ = reply.send(self.refresh_schema().await);
            }
            SessionCommand::Shutdown => {}
        }
    }

    async fn refresh_schema(&mut self) -> Result<Arc<SchemaSnapshot>> {
        let snapshot = build_snapshot(self.context.db.as_ref(), &self.context.database).await?;
        self.context.schema = Arc::new(snapshot);
        self.pipeline.translator().invalidate();
        info!(
            "Schema refreshed: {} relations",
            self.context.schema.relations().count()
        );
        Ok(Arc::clone(&self.context.schema))
    }

    fn handle_completion(&mut self, done: Completion) {
        let Completion { id, event } = done;
        let name = event.name();

        match self.tracker.apply(id, event) {
            ApplyOutcome::Applied(phase) => {
                debug!("Session {} -> {} after {}", id, phase, name);
                self.publish();
                self.advance(id);
            }
            ApplyOutcome::Stale => {
                warn!("Dropping {} for superseded session {}", name, id);
            }
            ApplyOutcome::Rejected(e) => {
                warn!("Session {}: {}", id, e);
            }
        }
    }

    /// Starts whatever the session's phase calls for, running inline stages
    /// until the session waits on a task or finishes.
    fn advance(&mut self, id: SessionId) {
        loop {
            let Some(session) = self.tracker.session(id) else {
                return;
            };

            let event = match session.phase {
                Phase::Transcribing => {
                    if let Some(Question::Audio(audio)) = &session.question {
                        let audio = audio.clone();
                        let pipeline = self.pipeline.clone();
                        self.spawn_stage(id, async move { pipeline.transcribe(audio).await });
                    }
                    return;
                }
                Phase::Translating => {
                    let request = TranslationRequest {
                        schema: Arc::clone(&self.context.schema),
                        dialect: self.context.dialect().to_string(),
                        version: self.context.version.clone(),
                        question: session.question_text().unwrap_or_default().to_string(),
                    };
                    let pipeline = self.pipeline.clone();
                    self.spawn_stage(id, async move { pipeline.translate(request).await });
                    return;
                }
                Phase::Classifying => {
                    Pipeline::classify(session.generated_sql.as_deref().unwrap_or_default())
                }
                Phase::Executing => {
                    let sql = session.generated_sql.clone().unwrap_or_default();
                    let db = Arc::clone(&self.context.db);
                    let pipeline = self.pipeline.clone();
                    self.spawn_stage(id, async move { pipeline.execute(db, sql).await });
                    return;
                }
                Phase::Visualizing => match &session.result_set {
                    Some(result_set) => self.pipeline.visualize(result_set),
                    None => return,
                },
                Phase::Done | Phase::Failed => {
                    match &session.error {
                        Some(e) => info!("Session {} failed: {}", id, e),
                        None => info!("Session {} done", id),
                    }
                    return;
                }
                Phase::Idle => return,
            };

            let name = event.name();
            match self.tracker.apply(id, event) {
                ApplyOutcome::Applied(phase) => {
                    debug!("Session {} -> {} after {}", id, phase, name);
                    self.publish();
                }
                ApplyOutcome::Stale => return,
                ApplyOutcome::Rejected(e) => {
                    warn!("Session {}: {}", id, e);
                    return;
                }
            }
        }
    }

    fn spawn_stage<F>(&self, id: SessionId, stage: F)
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let event = stage.await;
            let _ = tx.send(Completion { id, event }).await;
        });
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.tracker.snapshot());
    }
}

/// Cloneable handle for talking to a running [`SessionActor`].
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<Option<SessionSnapshot>>,
}

impl SessionHandle {
    /// Submits a question. The returned id names the new current session.
    pub async fn submit(&self, question: Question) -> Result<SessionId> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Submit { question, reply })
            .await
            .map_err(|_| GenvizError::internal("Session actor closed"))?;
        rx.await
            .map_err(|_| GenvizError::internal("Session actor dropped the request"))
    }

    pub async fn refresh_schema(&self) -> Result<Arc<SchemaSnapshot>> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::RefreshSchema { reply })
            .await
            .map_err(|_| GenvizError::internal("Session actor closed"))?;
        rx.await
            .map_err(|_| GenvizError::internal("Session actor dropped the request"))?
    }

    /// The most recently published snapshot of the current session.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Waits until session `id` reaches Done or Failed.
    ///
    /// Fails if another question supersedes it first.
    pub async fn wait_for_terminal(&self, id: SessionId) -> Result<SessionSnapshot> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|current| {
                current
                    .as_ref()
                    .is_some_and(|s| s.id != id || s.phase.is_terminal())
            })
            .await
            .map_err(|_| GenvizError::internal("Session actor closed"))?
            .clone();

        match snapshot {
            Some(s) if s.id == id => Ok(s),
            _ => Err(GenvizError::internal(format!(
                "Session {id} was superseded by a newer question"
            ))),
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| GenvizError::internal("Session actor already closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Column, MockDatabaseClient};
    use crate::llm::{LlmTranslator, MockLlmClient};
    use crate::speech::MockTranscriber;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn spawn_actor(llm: MockLlmClient) -> SessionHandle {
        let db: Arc<dyn DatabaseClient> = Arc::new(
            MockDatabaseClient::new()
                .with_table("orders", vec![Column::new("id", "integer")]),
        );
        let context = SchemaContext::load(db, "shop").await.unwrap();
        let pipeline = Pipeline::new(
            Arc::new(MockTranscriber::new()),
            Arc::new(LlmTranslator::new(Box::new(llm))),
        );
        SessionActor::spawn(pipeline, context)
    }

    #[tokio::test]
    async fn test_submit_publishes_snapshot_before_reply() {
        let handle = spawn_actor(MockLlmClient::new().with_delay(Duration::from_millis(200))).await;

        let id = handle.submit(Question::text("how many orders")).await.unwrap();
        let snapshot = handle.snapshot().unwrap();

        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.phase, Phase::Translating);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_metric_question_completes() {
        let handle = spawn_actor(MockLlmClient::new()).await;

        let id = handle.submit(Question::text("how many orders")).await.unwrap();
        let done = timeout(Duration::from_secs(5), handle.wait_for_terminal(id))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(done.phase, Phase::Done);
        assert_eq!(
            done.sql.as_deref(),
            Some("SELECT COUNT(*) AS count FROM orders;")
        );
        assert!(done.chart.is_some());
    }

    #[tokio::test]
    async fn test_wait_for_superseded_session_fails() {
        let handle = spawn_actor(MockLlmClient::new().with_delay(Duration::from_millis(100))).await;

        let first = handle.submit(Question::text("how many orders")).await.unwrap();
        let second = handle.submit(Question::text("count orders")).await.unwrap();

        let err = handle.wait_for_terminal(first).await.unwrap_err();
        assert!(matches!(err, GenvizError::Internal(_)));

        let done = handle.wait_for_terminal(second).await.unwrap();
        assert_eq!(done.id, second);
    }

    #[tokio::test]
    async fn test_handle_errors_after_shutdown() {
        let handle = spawn_actor(MockLlmClient::new()).await;
        handle.shutdown().await.unwrap();

        // Give the actor time to drop its receiver.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.submit(Question::text("x")).await.is_err());
    }
}
