//! Query sessions: one question at a time, from audio or text to a chart.
//!
//! - [`state`] is the pure state machine.
//! - [`tracker`] holds the current session and fences out superseded ones.
//! - [`pipeline`] runs each stage against its collaborator under a timeout.
//! - [`actor`] wires them together behind a [`SessionHandle`].

pub mod actor;
pub mod pipeline;
pub mod state;
pub mod tracker;

pub use actor::{SchemaContext, SessionActor, SessionCommand, SessionHandle};
pub use pipeline::{Pipeline, StageTimeouts};
pub use state::{InvalidTransition, Phase, QuerySession, Question, SessionEvent, SessionSnapshot};
pub use tracker::{ApplyOutcome, SessionId, SessionTracker};
