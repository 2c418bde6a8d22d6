//! The chat command interface and the commands that need no network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::notify::{NotificationSink, ReplyTarget};

/// How a [`CommandReply`] payload is delivered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    /// Plain text; the payload is a JSON string.
    Text,
    /// Structured attachments for the chat transport's rich API.
    Rich,
}

/// The immediate answer to a chat command.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CommandReply {
    /// Delivery method.
    pub kind: MessageKind,
    /// Reply body.
    pub payload: serde_json::Value,
}

impl CommandReply {
    /// A plain-text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            payload: serde_json::Value::String(text.into()),
        }
    }

    /// A structured reply.
    pub fn rich(payload: serde_json::Value) -> Self {
        Self {
            kind: MessageKind::Rich,
            payload,
        }
    }

    /// The text of a plain-text reply.
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            MessageKind::Text => self.payload.as_str(),
            MessageKind::Rich => None,
        }
    }

    /// Deliver through `sink` using the method matching [`kind`](Self::kind).
    pub async fn deliver(&self, sink: &dyn NotificationSink, target: &ReplyTarget) {
        match (self.kind, self.payload.as_str()) {
            (MessageKind::Text, Some(text)) => sink.notify(target, text).await,
            (MessageKind::Text, None) => sink.notify(target, &self.payload.to_string()).await,
            (MessageKind::Rich, _) => sink.notify_rich(target, &self.payload).await,
        }
    }
}

/// A chat command.
///
/// `do_command` receives the whitespace-separated words that followed the
/// command name.
#[async_trait]
pub trait Command: Send + Sync {
    /// Word that invokes the command.
    fn name(&self) -> &'static str;

    /// Usage line shown by `help`.
    fn syntax(&self) -> &'static str;

    /// One-line description shown by `help`.
    fn help(&self) -> &'static str;

    /// Run the command.
    async fn do_command(&self, args: &[&str], target: &ReplyTarget) -> CommandReply;

    /// Release resources. Called once when the bot exits.
    async fn shutdown(&self) {}
}

// ---------------------------------------------------------------------------
// Static commands
// ---------------------------------------------------------------------------

/// `help`: lists every loaded command.
pub struct HelpCommand {
    text: String,
}

impl HelpCommand {
    /// Build the help text from `(syntax, help)` pairs of the other commands.
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut text = String::from("I know how to do the following:");
        for (syntax, help) in entries {
            text.push_str(&format!("\n{syntax}\t\t{help}"));
        }
        text.push_str("\nhelp, ?\t\tShow this help information.");
        Self { text }
    }
}

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn syntax(&self) -> &'static str {
        "help"
    }

    fn help(&self) -> &'static str {
        "Show this help information."
    }

    async fn do_command(&self, _args: &[&str], _target: &ReplyTarget) -> CommandReply {
        CommandReply::text(self.text.clone())
    }
}

/// `qrz <callsign>`: link to the callsign's QRZ.com page.
pub struct QrzCommand;

#[async_trait]
impl Command for QrzCommand {
    fn name(&self) -> &'static str {
        "qrz"
    }

    fn syntax(&self) -> &'static str {
        "qrz <callsign>"
    }

    fn help(&self) -> &'static str {
        "Get a link to the callsign's QRZ.com page."
    }

    async fn do_command(&self, args: &[&str], _target: &ReplyTarget) -> CommandReply {
        match args.first() {
            Some(callsign) => CommandReply::text(format!(
                "https://www.qrz.com/lookup/{}",
                callsign.to_uppercase()
            )),
            None => CommandReply::text(format!(
                "You need to give me a callsign!\nCommand looks like: {}",
                self.syntax()
            )),
        }
    }
}

/// `website`: link to the club's website.
pub struct WebsiteCommand {
    url: String,
}

impl WebsiteCommand {
    /// Answer with `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Command for WebsiteCommand {
    fn name(&self) -> &'static str {
        "website"
    }

    fn syntax(&self) -> &'static str {
        "website"
    }

    fn help(&self) -> &'static str {
        "Get a link to the club's website."
    }

    async fn do_command(&self, _args: &[&str], _target: &ReplyTarget) -> CommandReply {
        CommandReply::text(format!("The club website is at {}", self.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> ReplyTarget {
        ReplyTarget::new("console", "tester")
    }

    #[tokio::test]
    async fn qrz_links_uppercased_callsign() {
        let reply = QrzCommand.do_command(&["kg5yov"], &target()).await;
        assert_eq!(reply.as_text(), Some("https://www.qrz.com/lookup/KG5YOV"));
    }

    #[tokio::test]
    async fn qrz_without_callsign_explains_usage() {
        let reply = QrzCommand.do_command(&[], &target()).await;
        assert_eq!(
            reply.as_text(),
            Some("You need to give me a callsign!\nCommand looks like: qrz <callsign>")
        );
    }

    #[tokio::test]
    async fn website_uses_configured_url() {
        let reply = WebsiteCommand::new("https://www.aa5ro.org/")
            .do_command(&[], &target())
            .await;
        assert_eq!(reply.as_text(), Some("The club website is at https://www.aa5ro.org/"));
    }

    #[tokio::test]
    async fn help_lists_entries_and_itself() {
        let help = HelpCommand::new([("qrz <callsign>", "Get a link."), ("website", "Club site.")]);
        let reply = help.do_command(&[], &target()).await;
        assert_eq!(
            reply.as_text(),
            Some(
                "I know how to do the following:\n\
                 qrz <callsign>\t\tGet a link.\n\
                 website\t\tClub site.\n\
                 help, ?\t\tShow this help information."
            )
        );
    }

    #[test]
    fn rich_replies_have_no_text() {
        let reply = CommandReply::rich(json!([{"title": "KG5YOV"}]));
        assert_eq!(reply.kind, MessageKind::Rich);
        assert!(reply.as_text().is_none());
        assert_eq!(MessageKind::Rich.to_string(), "rich");
    }
}
