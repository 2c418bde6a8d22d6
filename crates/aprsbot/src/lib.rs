//! # aprsbot
//!
//! Chat bot that relays `message` commands onto the APRS-IS network and
//! reports back when the recipient station acknowledges them.
//!
//! The crate provides:
//!
//! * [`MessageDispatchCommand`] — validates and transmits messages, and
//!   owns the background [`InboundListener`].
//! * [`PendingMessageTable`] — in-flight messages keyed by recipient and
//!   message id, shared by the command path and the listener.
//! * [`CommandRegistry`] / [`Command`] — chat command dispatch.
//! * [`NotificationSink`] — delivery of replies and asynchronous
//!   notifications to chat users.
//! * [`ConsoleTransport`] — a stdin/stdout chat transport.
//! * [`BotConfig`] — environment-driven configuration.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use aprsbot::{BotConfig, CommandContext, CommandRegistry, ConsoleSink, LinkSource, ReplyTarget};
//!
//! # async fn run() -> Result<(), aprsbot::ConfigError> {
//! let ctx = CommandContext {
//!     config: BotConfig::from_env()?,
//!     sink: Arc::new(ConsoleSink::stdout()),
//!     link: LinkSource::AprsIs,
//! };
//! let registry = CommandRegistry::build(&ctx).await;
//!
//! let reply = registry
//!     .dispatch("message KG5YOV test message", &ReplyTarget::new("console", "op"))
//!     .await;
//! println!("{:?}", reply.as_text());
//! registry.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod notify;
pub mod pending;
pub mod registry;

pub use command::{Command, CommandReply, MessageKind};
pub use config::BotConfig;
pub use console::ConsoleTransport;
pub use dispatch::{DispatchOutcome, DispatchSettings, MessageDispatchCommand};
pub use error::{ConfigError, ConstructionError, ValidationError};
pub use listener::{InboundListener, ListenerExit, ListenerHandle, ListenerState};
pub use notify::{ConsoleSink, NotificationSink, ReplyTarget};
pub use pending::{PendingMessage, PendingMessageTable};
pub use registry::{CommandContext, CommandRegistry, LinkSource};
