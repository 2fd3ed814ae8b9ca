/// Inline text spans with formatting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text(String),
    Bold(Vec<Span>),
    Italic(Vec<Span>),
    Strikethrough(Vec<Span>),
    Code(String),
    Link {
        url: String,
        title: Option<String>,
        content: Vec<Span>,
    },
    /// Image; `alt` holds the parsed alt text.
    Image {
        src: String,
        title: Option<String>,
        alt: Vec<Span>,
    },
    /// `||text||`
    Spoiler(Vec<Span>),
    /// `__text__`
    Underline(Vec<Span>),
    SoftBreak,
    LineBreak,
}

/// A single list item. The first child is usually the item's leading paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Marker as written in the source: `-`, `+`, `*`, `1.`, `2)`...
    pub leader: String,
    pub children: Vec<Block>,
}

/// A list (ordered or unordered)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub ordered: bool,
    pub items: Vec<ListItem>,
}

/// Block-level elements parsed from Markdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading {
        level: u8,
        content: Vec<Span>,
    },
    Paragraph {
        content: Vec<Span>,
    },
    CodeBlock {
        language: Option<String>,
        content: String,
    },
    Quote {
        children: Vec<Block>,
    },
    List(List),
}

impl ListItem {
    /// True for `+`, `-` and `*` leaders.
    pub fn is_unordered(&self) -> bool {
        matches!(self.leader.as_str(), "+" | "-" | "*")
    }
}
