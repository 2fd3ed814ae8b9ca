use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// The chat platform rejected a request.
    #[error("Telegram API error: {description}")]
    Api { description: String },

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Image generation error: {0}")]
    ImageGeneration(String),

    #[error("History store error: {0}")]
    History(String),

    #[error("User {0} is not allowed to use this bot")]
    Unauthorized(i64),
}

impl Error {
    /// Telegram answers an edit with identical content this way; it is not a failure.
    pub fn is_message_not_modified(&self) -> bool {
        match self {
            Error::Api { description } => {
                description.contains("message is not modified")
                    || description.contains("exactly the same")
            }
            _ => false,
        }
    }

    /// Text shown to the user when a request fails.
    pub fn report(&self) -> String {
        let detail = match self {
            Error::Api { description } => description.clone(),
            other => other.to_string(),
        };
        format!("[!] Bot exception:\n{detail}")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
