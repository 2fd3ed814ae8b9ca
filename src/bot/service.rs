use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tracing::{error, info, warn};

use super::{
    ChatAction, CompletionClient, HistoryEntry, HistoryStore, ImageGenerator, IncomingMessage,
    MessageRef, Messenger, ParseMode, Role, Transcriber, VoiceAction, command_arguments,
    is_command,
};
use crate::config::BotConfig;
use crate::error::{Error, Result};
use crate::render::Renderer;

/// Handles user requests: chat with the model, voice transcription, images.
pub struct ChatService {
    messenger: Arc<dyn Messenger>,
    history: Arc<dyn HistoryStore>,
    completion: Arc<dyn CompletionClient>,
    transcriber: Option<Arc<dyn Transcriber>>,
    images: Option<Arc<dyn ImageGenerator>>,
    renderer: Renderer,
    config: BotConfig,
}

impl ChatService {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        history: Arc<dyn HistoryStore>,
        completion: Arc<dyn CompletionClient>,
        renderer: Renderer,
        config: BotConfig,
    ) -> Self {
        Self {
            messenger,
            history,
            completion,
            transcriber: None,
            images: None,
            renderer,
            config,
        }
    }

    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    #[must_use]
    pub fn with_image_generator(mut self, images: Arc<dyn ImageGenerator>) -> Self {
        self.images = Some(images);
        self
    }

    fn authorize(&self, message: &IncomingMessage) -> Result<()> {
        if self.config.allowed_users.contains(&message.user_id) {
            Ok(())
        } else {
            warn!(user_id = message.user_id, "ignoring message from unknown user");
            Err(Error::Unauthorized(message.user_id))
        }
    }

    /// Route a text message: `/clear`, `/dalle`, or a model query.
    pub async fn handle_text(&self, message: &IncomingMessage) -> Result<()> {
        let text = message.text.as_deref().unwrap_or_default();
        if is_command(text, "clear") {
            self.clear_history(message).await
        } else if is_command(text, "dalle") {
            self.generate_image(message).await
        } else {
            self.chat(message).await
        }
    }

    pub async fn clear_history(&self, message: &IncomingMessage) -> Result<()> {
        self.authorize(message)?;
        self.history.clear(message.chat_id).await?;
        self.messenger
            .reply(message.chat_id, message.id, "History cleared.")
            .await?;
        Ok(())
    }

    /// Answer a query with the model, streaming the reply into a placeholder
    /// message and finally replacing it with the rendered HTML.
    pub async fn chat(&self, message: &IncomingMessage) -> Result<()> {
        self.authorize(message)?;
        let query = message.text.as_deref().unwrap_or_default();
        if query.trim().is_empty() {
            self.messenger
                .reply(message.chat_id, message.id, "Please specify the query")
                .await?;
            return Ok(());
        }

        let placeholder = self
            .messenger
            .reply(message.chat_id, message.id, "Generating...")
            .await?;

        self.history
            .append(HistoryEntry {
                message_id: message.id,
                chat_id: message.chat_id,
                role: Role::User,
                text: query.to_string(),
            })
            .await?;
        let history = self.history.history(message.chat_id).await?;

        let response = self.stream_reply(&placeholder, history).await?;
        if response.trim().is_empty() {
            self.messenger
                .edit(&placeholder, "No response received.", ParseMode::Plain)
                .await?;
            return Ok(());
        }

        self.history
            .append(HistoryEntry {
                message_id: placeholder.message_id,
                chat_id: placeholder.chat_id,
                role: Role::Assistant,
                text: response.clone(),
            })
            .await?;

        let html = self.renderer.render_markdown(&response);
        match self.messenger.edit(&placeholder, &html, ParseMode::Html).await {
            Ok(()) => {}
            Err(e) if e.is_message_not_modified() => {}
            Err(e) => {
                error!(error = %e, chat_id = placeholder.chat_id, "rendered reply rejected");
                self.messenger
                    .reply(placeholder.chat_id, placeholder.message_id, &e.report())
                    .await?;
            }
        }
        info!(chat_id = message.chat_id, bytes = response.len(), "answered query");
        Ok(())
    }

    /// Collect the completion, showing progress as plain text at most once
    /// per edit interval.
    async fn stream_reply(&self, placeholder: &MessageRef, history: Vec<HistoryEntry>) -> Result<String> {
        let interval = Duration::from_millis(self.config.edit_interval_ms);
        let mut stream = self.completion.stream(history).await?;
        let mut response = String::new();
        let mut last_edit: Option<Instant> = None;

        while let Some(chunk) = stream.next().await {
            response.push_str(&chunk?);
            if response.trim().is_empty() || last_edit.is_some_and(|at| at.elapsed() < interval) {
                continue;
            }
            match self.messenger.edit(placeholder, &response, ParseMode::Plain).await {
                Ok(()) => {}
                Err(e) if e.is_message_not_modified() => {}
                Err(e) => warn!(error = %e, "failed to show partial reply"),
            }
            last_edit = Some(Instant::now());
        }
        Ok(response)
    }

    /// Transcribe a voice message and offer follow-up actions on the transcript.
    pub async fn transcribe_voice(&self, message: &IncomingMessage, audio: Vec<u8>) -> Result<()> {
        self.authorize(message)?;
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or_else(|| Error::Transcription("no transcriber configured".to_string()))?;

        let sent = self
            .messenger
            .reply(message.chat_id, message.id, "Transcribing voice message...")
            .await?;
        let transcript = transcriber.transcribe(audio).await?;
        if transcript.trim().is_empty() {
            self.messenger
                .edit(&sent, "No transcripts found.", ParseMode::Plain)
                .await?;
            return Ok(());
        }

        self.messenger
            .edit_with_actions(&sent, &transcript, &VoiceAction::ALL)
            .await
    }

    /// Run the action picked under a transcript. `transcript` is the bot's
    /// message holding the text; `user_id` is whoever pressed the button.
    pub async fn voice_action(
        &self,
        action: VoiceAction,
        transcript: &IncomingMessage,
        user_id: i64,
    ) -> Result<()> {
        let request = IncomingMessage {
            user_id,
            ..transcript.clone()
        };
        match action {
            VoiceAction::AskModel => self.chat(&request).await,
            VoiceAction::Dream => self.generate_image(&request).await,
        }
    }

    /// Generate an image from `/dalle <prompt>`, or from the whole text when it
    /// is not a command.
    pub async fn generate_image(&self, message: &IncomingMessage) -> Result<()> {
        self.authorize(message)?;
        let text = message.text.as_deref().unwrap_or_default();
        let prompt = command_arguments(text).unwrap_or(text);
        if prompt.trim().is_empty() {
            self.messenger
                .reply(message.chat_id, message.id, "Please specify the prompt")
                .await?;
            return Ok(());
        }
        let images = self
            .images
            .as_ref()
            .ok_or_else(|| Error::ImageGeneration("no image generator configured".to_string()))?;

        let result = async {
            self.messenger
                .chat_action(message.chat_id, ChatAction::UploadPhoto)
                .await?;
            let image = images.generate(prompt).await?;
            self.messenger
                .send_photo(message.chat_id, &image.url, image.revised_prompt.as_deref())
                .await
        }
        .await;

        if let Err(e) = result {
            error!(error = %e, chat_id = message.chat_id, "image generation failed");
            self.messenger
                .reply(message.chat_id, message.id, &e.report())
                .await?;
        }
        Ok(())
    }
}
