//! Markdown to Telegram HTML, plus the chat flows of a bot that relays
//! messages to a language model.
//!
//! ```
//! assert_eq!(tgmark::markdown_to_html("# Title"), "▎ <b>Title</b>");
//! assert_eq!(
//!     tgmark::markdown_to_html("||secret|| and __under__"),
//!     "<tg-spoiler>secret</tg-spoiler> and <u>under</u>"
//! );
//! ```

mod block;
pub mod bot;
mod config;
mod error;
pub mod escape;
pub mod logging;
mod parser;
mod render;

pub use block::{Block, List, ListItem, Span};
pub use config::{BotConfig, Config, RenderConfig};
pub use error::{Error, Result};
pub use render::Renderer;

/// Parse markdown text into a vector of blocks.
pub fn parse(markdown: &str) -> Vec<Block> {
    parser::parse(markdown)
}

/// Convert markdown to Telegram HTML using default config.
pub fn markdown_to_html(markdown: &str) -> String {
    markdown_to_html_with_config(markdown, &RenderConfig::default())
}

/// Convert markdown to Telegram HTML with custom config.
pub fn markdown_to_html_with_config(markdown: &str, config: &RenderConfig) -> String {
    Renderer::new(config.clone()).render(&parse(markdown))
}
