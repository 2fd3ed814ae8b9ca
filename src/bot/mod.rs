//! Chat front end: the services the bot talks to and the flows that tie them
//! to the renderer.
//!
//! Transports and model clients live outside this crate; they plug in through
//! [`Messenger`], [`HistoryStore`], [`CompletionClient`], [`Transcriber`] and
//! [`ImageGenerator`].

mod history;
mod service;

pub use history::InMemoryHistory;
pub use service::ChatService;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

/// A message received from a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    /// Text body; `None` for voice and other non-text messages.
    pub text: Option<String>,
}

/// A message the bot has sent and may edit later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Plain,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
    UploadPhoto,
}

/// Follow-up offered under a transcribed voice message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceAction {
    /// Send the transcript to the language model.
    AskModel,
    /// Use the transcript as an image prompt.
    Dream,
}

impl VoiceAction {
    const PREFIX: &'static str = "voice_callback:";

    pub const ALL: [VoiceAction; 2] = [VoiceAction::AskModel, VoiceAction::Dream];

    pub fn label(self) -> &'static str {
        match self {
            VoiceAction::AskModel => "❓ Ask GPT",
            VoiceAction::Dream => "🎨 Dream",
        }
    }

    /// Payload attached to the inline button.
    pub fn callback_data(self) -> String {
        let task = match self {
            VoiceAction::AskModel => "ask_gpt",
            VoiceAction::Dream => "dream",
        };
        format!("{}{task}", Self::PREFIX)
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data.strip_prefix(Self::PREFIX)? {
            "ask_gpt" => Some(VoiceAction::AskModel),
            "dream" => Some(VoiceAction::Dream),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One stored conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub message_id: i64,
    pub chat_id: i64,
    pub role: Role,
    pub text: String,
}

/// Delivers messages to the chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Reply to `reply_to` in `chat_id` and return the sent message.
    async fn reply(&self, chat_id: i64, reply_to: i64, text: &str) -> Result<MessageRef>;

    /// Replace the text of a sent message. A rejected body surfaces as [`crate::Error::Api`].
    async fn edit(&self, message: &MessageRef, text: &str, mode: ParseMode) -> Result<()>;

    /// Like [`Messenger::edit`], with buttons for `actions` under the text.
    async fn edit_with_actions(
        &self,
        message: &MessageRef,
        text: &str,
        actions: &[VoiceAction],
    ) -> Result<()>;

    async fn send_photo(&self, chat_id: i64, url: &str, caption: Option<&str>) -> Result<()>;

    async fn chat_action(&self, chat_id: i64, action: ChatAction) -> Result<()>;
}

/// Conversation history keyed by chat.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<()>;

    /// All entries of a chat, oldest message id first.
    async fn history(&self, chat_id: i64) -> Result<Vec<HistoryEntry>>;

    async fn clear(&self, chat_id: i64) -> Result<()>;
}

/// Streams a model reply as text deltas.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn stream(&self, history: Vec<HistoryEntry>) -> Result<BoxStream<'static, Result<String>>>;
}

/// Speech to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Recognised text of all segments, concatenated.
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
    pub revised_prompt: Option<String>,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage>;
}

/// Arguments of a `/command args` message, `None` when `text` is not a command.
pub fn command_arguments(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('/')?;
    match rest.find(char::is_whitespace) {
        Some(at) => Some(rest[at..].trim_start()),
        None => Some(""),
    }
}

/// Whether `text` is `/name`, optionally addressed as `/name@botname`.
pub fn is_command(text: &str, name: &str) -> bool {
    let Some(rest) = text.strip_prefix('/') else {
        return false;
    };
    let word = rest.split_whitespace().next().unwrap_or_default();
    let command = word.split('@').next().unwrap_or_default();
    command.eq_ignore_ascii_case(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_arguments_split() {
        assert_eq!(command_arguments("/dalle a red fox"), Some("a red fox"));
        assert_eq!(command_arguments("/dalle@my_bot  two words"), Some("two words"));
        assert_eq!(command_arguments("/dalle"), Some(""));
        assert_eq!(command_arguments("just text"), None);
    }

    #[test]
    fn command_matching() {
        assert!(is_command("/clear", "clear"));
        assert!(is_command("/clear@my_bot", "clear"));
        assert!(is_command("/CLEAR now", "clear"));
        assert!(!is_command("/clearall", "clear"));
        assert!(!is_command("clear", "clear"));
    }

    #[test]
    fn voice_action_callback_data() {
        for action in VoiceAction::ALL {
            assert_eq!(
                VoiceAction::from_callback_data(&action.callback_data()),
                Some(action)
            );
        }
        assert_eq!(VoiceAction::AskModel.callback_data(), "voice_callback:ask_gpt");
        assert_eq!(VoiceAction::from_callback_data("voice_callback:other"), None);
        assert_eq!(VoiceAction::from_callback_data("dream"), None);
    }
}
