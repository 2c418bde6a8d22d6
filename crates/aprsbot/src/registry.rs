//! Command construction and dispatch.
//!
//! Commands are built once at startup from a fixed constructor list. A
//! constructor that fails (missing credentials, missing configuration,
//! unreachable network) is logged and skipped; the bot runs with whatever
//! commands could be built.

use std::sync::Arc;

use aprsbot_link::{AprsCredentials, PacketLink, connect_with_retry};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandReply, HelpCommand, QrzCommand, WebsiteCommand};
use crate::config::BotConfig;
use crate::dispatch::MessageDispatchCommand;
use crate::error::ConstructionError;
use crate::notify::{NotificationSink, ReplyTarget};

/// Reply for a command word nobody handles.
pub const UNKNOWN_COMMAND_REPLY: &str = "Not sure what you mean. Try 'help'.";

/// Where the `message` command gets its packet network from.
pub enum LinkSource {
    /// Log in to APRS-IS with `APRS_CALLSIGN` / `APRS_PASSWORD`.
    AprsIs,
    /// Use an already connected link.
    Provided(Arc<dyn PacketLink>),
    /// No packet network for this run.
    Offline,
}

/// Everything a command constructor may need.
pub struct CommandContext {
    /// Runtime configuration.
    pub config: BotConfig,
    /// Sink for asynchronous notifications.
    pub sink: Arc<dyn NotificationSink>,
    /// Packet network for the `message` command.
    pub link: LinkSource,
}

type Built = Result<Arc<dyn Command>, ConstructionError>;
type Constructor = for<'a> fn(&'a CommandContext) -> BoxFuture<'a, Built>;

/// Constructors run at startup, in help order.
const CONSTRUCTORS: &[(&str, Constructor)] = &[
    ("message", build_message as Constructor),
    ("qrz", build_qrz as Constructor),
    ("website", build_website as Constructor),
];

fn build_message(ctx: &CommandContext) -> BoxFuture<'_, Built> {
    async move {
        let link: Arc<dyn PacketLink> = match &ctx.link {
            LinkSource::Offline => {
                return Err(ConstructionError::Disabled("running offline".to_string()));
            }
            LinkSource::Provided(link) => link.clone(),
            LinkSource::AprsIs => {
                let credentials = AprsCredentials::from_env()?;
                let config = ctx.config.link_config(credentials);
                Arc::new(connect_with_retry(&config, &ctx.config.retry).await?)
            }
        };
        let command =
            MessageDispatchCommand::start(link, ctx.sink.clone(), ctx.config.dispatch_settings());
        Ok(Arc::new(command) as Arc<dyn Command>)
    }
    .boxed()
}

fn build_qrz(_ctx: &CommandContext) -> BoxFuture<'_, Built> {
    futures::future::ready(Ok(Arc::new(QrzCommand) as Arc<dyn Command>)).boxed()
}

fn build_website(ctx: &CommandContext) -> BoxFuture<'_, Built> {
    let result = ctx
        .config
        .club_website
        .as_ref()
        .map(|url| Arc::new(WebsiteCommand::new(url.clone())) as Arc<dyn Command>)
        .ok_or_else(|| ConstructionError::NotConfigured("CLUB_WEBSITE is not set".to_string()));
    futures::future::ready(result).boxed()
}

/// The loaded commands.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Run every constructor, skipping those that fail, then add `help`.
    pub async fn build(ctx: &CommandContext) -> Self {
        let mut commands = Vec::new();
        for (name, constructor) in CONSTRUCTORS {
            match constructor(ctx).await {
                Ok(command) => {
                    debug!(command = %name, "command loaded");
                    commands.push(command);
                }
                Err(e) => warn!(command = %name, error = %e, "failed to create command, skipping"),
            }
        }
        Self::from_commands(commands)
    }

    /// Registry over already constructed commands, plus `help`.
    pub fn from_commands(mut commands: Vec<Arc<dyn Command>>) -> Self {
        let help = HelpCommand::new(commands.iter().map(|c| (c.syntax(), c.help())));
        commands.push(Arc::new(help));
        info!(
            commands = ?commands.iter().map(|c| c.name()).collect::<Vec<_>>(),
            "command registry ready"
        );
        Self { commands }
    }

    /// Names of the loaded commands.
    pub fn names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.name()).collect()
    }

    /// Find the command for `word`, case-insensitively. `?` means `help`.
    pub fn find(&self, word: &str) -> Option<&Arc<dyn Command>> {
        let word = if word == "?" { "help" } else { word };
        self.commands
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(word))
    }

    /// Run the command named by the first word of `line`.
    pub async fn dispatch(&self, line: &str, target: &ReplyTarget) -> CommandReply {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return CommandReply::text(UNKNOWN_COMMAND_REPLY);
        };
        let args: Vec<&str> = words.collect();

        match self.find(word) {
            Some(command) => {
                debug!(command = command.name(), %target, "running command");
                command.do_command(&args, target).await
            }
            None => {
                debug!(%word, %target, "unknown command");
                CommandReply::text(UNKNOWN_COMMAND_REPLY)
            }
        }
    }

    /// Shut every command down, in load order.
    pub async fn shutdown(&self) {
        for command in &self.commands {
            command.shutdown().await;
        }
        info!("all commands shut down");
    }
}
