use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use tracing::{debug, trace};

use crate::block::{Block, List, ListItem, Span};

/// Parse markdown text into a list of blocks.
///
/// On top of CommonMark this recognises `||spoiler||` and `__underline__`. Both
/// are matched over the raw text: the first unescaped closing pair after an
/// opener ends it, and an underline never ends on a `__` that runs into
/// another `_`. `**strong**` stays [`Span::Bold`].
pub fn parse(markdown: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options).into_offset_iter();
    let mut state = ParseState::new(markdown);

    for (event, range) in parser {
        state.process_event(event, range);
    }

    let blocks = state.finish();
    debug!(blocks = blocks.len(), "parsed markdown");
    blocks
}

/// Two-character markers that open and close a span inside plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Spoiler,
    Underline,
}

impl Delimiter {
    const LEN: usize = 2;

    fn at(bytes: &[u8], index: usize) -> Option<Self> {
        match bytes.get(index..index + Self::LEN)? {
            b"||" => Some(Self::Spoiler),
            b"__" => Some(Self::Underline),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Spoiler => "||",
            Self::Underline => "__",
        }
    }
}

/// Inline formatting that is still waiting for its end event.
enum Frame {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Link { url: String, title: Option<String> },
    Image { src: String, title: Option<String> },
}

impl Frame {
    fn opened_by(delimiter: Delimiter) -> Self {
        match delimiter {
            Delimiter::Spoiler => Frame::Spoiler,
            Delimiter::Underline => Frame::Underline,
        }
    }

    fn delimiter(&self) -> Option<Delimiter> {
        match self {
            Frame::Spoiler => Some(Delimiter::Spoiler),
            Frame::Underline => Some(Delimiter::Underline),
            _ => None,
        }
    }

    fn into_span(self, content: Vec<Span>) -> Span {
        match self {
            Frame::Bold => Span::Bold(content),
            Frame::Italic => Span::Italic(content),
            Frame::Underline => Span::Underline(content),
            Frame::Strikethrough => Span::Strikethrough(content),
            Frame::Spoiler => Span::Spoiler(content),
            Frame::Link { url, title } => Span::Link {
                url,
                title,
                content,
            },
            Frame::Image { src, title } => Span::Image {
                src,
                title,
                alt: content,
            },
        }
    }
}

struct OpenSpan {
    frame: Frame,
    // Spans collected before this frame was opened
    parent: Vec<Span>,
}

enum Container {
    Quote(Vec<Block>),
    List {
        ordered: bool,
        next_number: u64,
        items: Vec<ListItem>,
    },
    Item {
        leader: String,
        children: Vec<Block>,
    },
}

/// Consecutive text events glued together, with the source offset of every
/// byte that was copied verbatim from the input.
#[derive(Default)]
struct TextRun {
    text: String,
    origin: Vec<Option<usize>>,
}

impl TextRun {
    fn push(&mut self, text: &str, range: Range<usize>, source: &str) {
        let verbatim = source.get(range.clone()) == Some(text);
        self.text.push_str(text);
        if verbatim {
            self.origin.extend((0..text.len()).map(|i| Some(range.start + i)));
        } else {
            self.origin.extend(std::iter::repeat_n(None, text.len()));
        }
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether a `_` copied from the source sits at `index`.
    fn underscore_at(&self, index: usize) -> bool {
        self.text.as_bytes().get(index) == Some(&b'_')
            && self.origin.get(index).is_some_and(Option::is_some)
    }

    fn is_unescaped_pair(&self, at: usize, source: &str) -> bool {
        match (self.origin[at], self.origin[at + 1]) {
            (Some(first), Some(second)) if second == first + 1 => {
                let backslashes = source.as_bytes()[..first]
                    .iter()
                    .rev()
                    .take_while(|&&b| b == b'\\')
                    .count();
                backslashes % 2 == 0
            }
            _ => false,
        }
    }
}

struct ParseState<'a> {
    source: &'a str,
    blocks: Vec<Block>,

    // Current inline content being built
    spans: Vec<Span>,
    // Inline formatting opened but not yet closed, innermost last
    open_spans: Vec<OpenSpan>,
    pending_text: TextRun,
    // Per open strong: where its closing `__` sits, if written with underscores
    strong_closers: Vec<Option<Range<usize>>>,

    // Current heading level (if in a heading)
    heading_level: Option<u8>,

    // Code block state
    in_code_block: bool,
    code_language: Option<String>,
    code_content: String,

    // Raw HTML block, kept as literal text
    html_block: Option<String>,

    // Quotes, lists and list items, innermost last
    containers: Vec<Container>,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            blocks: Vec::new(),
            spans: Vec::new(),
            open_spans: Vec::new(),
            pending_text: TextRun::default(),
            strong_closers: Vec::new(),
            heading_level: None,
            in_code_block: false,
            code_language: None,
            code_content: String::new(),
            html_block: None,
            containers: Vec::new(),
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush_loose_spans();
        // Well-formed event streams close every container; this only guards truncated input
        while let Some(container) = self.containers.pop() {
            self.close_container(container);
        }
        self.blocks
    }

    fn process_event(&mut self, event: Event, range: Range<usize>) {
        if let Event::Text(text) = &event {
            if self.in_code_block {
                self.code_content.push_str(text);
            } else if let Some(html) = self.html_block.as_mut() {
                html.push_str(text);
            } else {
                self.pending_text.push(text, range, self.source);
            }
            return;
        }
        self.flush_text();

        match event {
            // Headings
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush_loose_spans();
                self.heading_level = Some(heading_level_to_u8(level));
            }
            Event::End(TagEnd::Heading(_)) => {
                let content = self.take_inline();
                if let Some(level) = self.heading_level.take() {
                    self.push_block(Block::Heading { level, content });
                }
            }

            // Paragraphs
            Event::Start(Tag::Paragraph) => {
                self.flush_loose_spans();
            }
            Event::End(TagEnd::Paragraph) => {
                let content = self.take_inline();
                if !content.is_empty() {
                    self.push_block(Block::Paragraph { content });
                }
            }

            // Inline code
            Event::Code(code) => {
                self.spans.push(Span::Code(code.into_string()));
            }

            // Bold. A `__` pair goes back into the text so underline has a single matching rule
            Event::Start(Tag::Strong) => {
                let underscored = self
                    .source
                    .get(range.clone())
                    .is_some_and(|raw| raw.starts_with("__"));
                if underscored {
                    let opener = range.start..range.start + Delimiter::LEN;
                    self.pending_text
                        .push(Delimiter::Underline.as_str(), opener, self.source);
                    self.strong_closers
                        .push(Some(range.end - Delimiter::LEN..range.end));
                } else {
                    self.strong_closers.push(None);
                    self.open_span(Frame::Bold);
                }
            }
            Event::End(TagEnd::Strong) => match self.strong_closers.pop() {
                Some(Some(closer)) => {
                    self.pending_text
                        .push(Delimiter::Underline.as_str(), closer, self.source);
                }
                _ => self.close_span(),
            },
            Event::Start(Tag::Emphasis) => self.open_span(Frame::Italic),
            Event::Start(Tag::Strikethrough) => self.open_span(Frame::Strikethrough),
            Event::End(TagEnd::Emphasis | TagEnd::Strikethrough) => {
                self.close_span();
            }

            // Links and images
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) => {
                self.open_span(Frame::Link {
                    url: dest_url.into_string(),
                    title: non_empty(title.into_string()),
                });
            }
            Event::Start(Tag::Image {
                dest_url, title, ..
            }) => {
                self.open_span(Frame::Image {
                    src: dest_url.into_string(),
                    title: non_empty(title.into_string()),
                });
            }
            Event::End(TagEnd::Link | TagEnd::Image) => {
                self.close_span();
            }

            // Code blocks
            Event::Start(Tag::CodeBlock(kind)) => {
                self.flush_loose_spans();
                self.in_code_block = true;
                self.code_language = match kind {
                    CodeBlockKind::Fenced(lang) => {
                        let lang = lang.split_whitespace().next().unwrap_or_default();
                        non_empty(lang.to_string())
                    }
                    CodeBlockKind::Indented => None,
                };
                self.code_content.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                self.in_code_block = false;
                let content = std::mem::take(&mut self.code_content);
                let language = self.code_language.take();
                self.push_block(Block::CodeBlock { language, content });
            }

            // Raw HTML is shown as text, never passed through
            Event::Start(Tag::HtmlBlock) => {
                self.flush_loose_spans();
                self.html_block = Some(String::new());
            }
            Event::Html(html) => {
                if let Some(block) = self.html_block.as_mut() {
                    block.push_str(&html);
                } else {
                    self.push_literal(&html);
                }
            }
            Event::End(TagEnd::HtmlBlock) => {
                if let Some(html) = self.html_block.take() {
                    let text = html.trim_end_matches('\n');
                    if !text.is_empty() {
                        self.push_block(Block::Paragraph {
                            content: vec![Span::Text(text.to_string())],
                        });
                    }
                }
            }
            Event::InlineHtml(html) => {
                self.push_literal(&html);
            }

            // Block quotes
            Event::Start(Tag::BlockQuote(_)) => {
                self.flush_loose_spans();
                self.containers.push(Container::Quote(Vec::new()));
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.flush_loose_spans();
                if let Some(container) = self.containers.pop() {
                    self.close_container(container);
                }
            }

            // Lists
            Event::Start(Tag::List(first_number)) => {
                self.flush_loose_spans();
                self.containers.push(Container::List {
                    ordered: first_number.is_some(),
                    next_number: first_number.unwrap_or(1),
                    items: Vec::new(),
                });
            }
            Event::End(TagEnd::List(_)) => {
                if let Some(container) = self.containers.pop() {
                    self.close_container(container);
                }
            }

            Event::Start(Tag::Item) => {
                self.flush_loose_spans();
                let leader = self.item_leader(range.start);
                self.containers.push(Container::Item {
                    leader,
                    children: Vec::new(),
                });
            }
            Event::End(TagEnd::Item) => {
                self.flush_loose_spans();
                if let Some(container) = self.containers.pop() {
                    self.close_container(container);
                }
            }

            // Soft/hard breaks
            Event::SoftBreak => {
                self.spans.push(Span::SoftBreak);
            }
            Event::HardBreak => {
                self.spans.push(Span::LineBreak);
            }

            // Rules and everything not enabled above have no Telegram form
            _ => {}
        }
    }

    /// Move buffered text into `spans`, opening and closing spans at its
    /// `||` and `__` delimiters.
    fn flush_text(&mut self) {
        if self.pending_text.is_empty() {
            return;
        }
        let run = std::mem::take(&mut self.pending_text);
        let bytes = run.text.as_bytes();
        let mut last = 0;
        let mut i = 0;
        while i + 1 < bytes.len() {
            let Some(delimiter) =
                Delimiter::at(bytes, i).filter(|_| run.is_unescaped_pair(i, self.source))
            else {
                i += 1;
                continue;
            };
            match self.open_delimiter(delimiter) {
                None => {
                    self.push_literal(&run.text[last..i]);
                    self.open_span(Frame::opened_by(delimiter));
                }
                Some(index) => {
                    let empty =
                        index + 1 == self.open_spans.len() && self.spans.is_empty() && last == i;
                    let runs_on =
                        delimiter == Delimiter::Underline && run.underscore_at(i + Delimiter::LEN);
                    if empty || runs_on {
                        // Still content; the closer may start one byte later
                        i += 1;
                        continue;
                    }
                    self.push_literal(&run.text[last..i]);
                    self.close_delimited(index);
                }
            }
            i += Delimiter::LEN;
            last = i;
        }
        self.push_literal(&run.text[last..]);
    }

    /// Index of the open frame `delimiter` would close. Only frames opened by
    /// delimiters are looked through; any other frame bounds the search.
    fn open_delimiter(&self, delimiter: Delimiter) -> Option<usize> {
        for (index, open) in self.open_spans.iter().enumerate().rev() {
            match open.frame.delimiter() {
                Some(found) if found == delimiter => return Some(index),
                Some(_) => continue,
                None => return None,
            }
        }
        None
    }

    fn push_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(Span::Text(last)) => last.push_str(text),
            _ => self.spans.push(Span::Text(text.to_string())),
        }
    }

    fn open_span(&mut self, frame: Frame) {
        let parent = std::mem::take(&mut self.spans);
        self.open_spans.push(OpenSpan { frame, parent });
    }

    /// Close the innermost frame opened by markup. Delimiter frames still open
    /// inside it were never terminated and fall back to literal text.
    fn close_span(&mut self) {
        while let Some(open) = self.open_spans.pop() {
            let content = std::mem::replace(&mut self.spans, open.parent);
            match open.frame.delimiter() {
                Some(delimiter) => self.unwind(delimiter, content),
                None => {
                    self.spans.push(open.frame.into_span(content));
                    return;
                }
            }
        }
    }

    /// Close the delimiter frame at `index`, unwinding the frames above it.
    fn close_delimited(&mut self, index: usize) {
        while self.open_spans.len() > index + 1 {
            if let Some(open) = self.open_spans.pop() {
                let content = std::mem::replace(&mut self.spans, open.parent);
                if let Some(delimiter) = open.frame.delimiter() {
                    self.unwind(delimiter, content);
                }
            }
        }
        if let Some(open) = self.open_spans.pop() {
            let content = std::mem::replace(&mut self.spans, open.parent);
            self.spans.push(open.frame.into_span(content));
        }
    }

    fn unwind(&mut self, delimiter: Delimiter, content: Vec<Span>) {
        trace!(delimiter = delimiter.as_str(), "unterminated delimiter kept as text");
        self.push_literal(delimiter.as_str());
        self.extend_literal(content);
    }

    fn extend_literal(&mut self, spans: Vec<Span>) {
        for span in spans {
            match span {
                Span::Text(text) => self.push_literal(&text),
                other => self.spans.push(other),
            }
        }
    }

    /// Finish the inline content of the current block.
    fn take_inline(&mut self) -> Vec<Span> {
        self.flush_text();
        while !self.open_spans.is_empty() {
            self.close_span();
        }
        std::mem::take(&mut self.spans)
    }

    /// Tight list items carry text without a paragraph; fold it into one.
    fn flush_loose_spans(&mut self) {
        let content = self.take_inline();
        if !content.is_empty() {
            self.push_block(Block::Paragraph { content });
        }
    }

    fn push_block(&mut self, block: Block) {
        match self.containers.last_mut() {
            Some(Container::Quote(children)) | Some(Container::Item { children, .. }) => {
                children.push(block);
            }
            Some(Container::List { .. }) => {
                trace!("block outside of a list item dropped");
            }
            None => self.blocks.push(block),
        }
    }

    fn close_container(&mut self, container: Container) {
        match container {
            Container::Quote(children) => self.push_block(Block::Quote { children }),
            Container::List { ordered, items, .. } => {
                self.push_block(Block::List(List { ordered, items }))
            }
            Container::Item { leader, children } => {
                if let Some(Container::List { items, .. }) = self.containers.last_mut() {
                    items.push(ListItem { leader, children });
                }
            }
        }
    }

    /// The list marker as written at `offset`, or a synthesized one.
    fn item_leader(&mut self, offset: usize) -> String {
        let written = self.source.get(offset..).and_then(read_list_marker);
        let Some(Container::List {
            ordered,
            next_number,
            ..
        }) = self.containers.last_mut()
        else {
            return written.unwrap_or("-").to_string();
        };
        let number = *next_number;
        *next_number += 1;
        match written {
            Some(marker) => marker.to_string(),
            None if *ordered => format!("{number}."),
            None => "-".to_string(),
        }
    }
}

/// Read a list marker (`-`, `+`, `*`, `12.`, `3)`) at the start of `text`.
fn read_list_marker(text: &str) -> Option<&str> {
    let text = text.trim_start_matches(' ');
    let end = text
        .find(|c: char| c.is_whitespace())
        .unwrap_or(text.len());
    let marker = &text[..end];
    let valid = match marker {
        "-" | "+" | "*" => true,
        _ => {
            let digits = marker.len().saturating_sub(1);
            (1..=9).contains(&digits)
                && marker[..digits].bytes().all(|b| b.is_ascii_digit())
                && matches!(marker.as_bytes()[digits], b'.' | b')')
        }
    };
    valid.then_some(marker)
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
