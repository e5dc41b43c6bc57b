//! Casting Concierge - inbound-event pipeline for a talent-casting chat assistant
//!
//! Every webhook event goes through one pipeline:
//! - duplicate suppression keyed on the platform's event id
//! - intent classification (keyword heuristics or a hosted model)
//! - a confidence policy choosing answer, clarify or escalate
//! - a time-bounded conversation memory, swept on a schedule
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          HTTP API (webhook, health, admin)           │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//! ┌──────────────────────────▼───────────────────────────┐
//! │                 Assistant orchestrator               │
//! │  Dedupe │ Classifier │ Policy │ Responder │ Escalate │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//! ┌──────────────────────────▼───────────────────────────┐
//! │   SQLite: profiles, events, conversations, queue     │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assistant;
pub mod catalog;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod db;
pub mod dedupe;
pub mod error;
pub mod gateway;
pub mod messenger;
pub mod responder;
pub mod sweeper;

pub use assistant::{Action, Assistant, DecisionPolicy, HandleOutcome, InboundEvent, InboundMessage, Status};
pub use classifier::{Classification, Classifier, Intent};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
