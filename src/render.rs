//! Telegram HTML output.
//!
//! Telegram's HTML parse mode accepts a handful of inline tags and no block
//! structure, so headings, paragraphs and lists are expressed with plain text
//! and whitespace while inline formatting maps onto the supported tags.

use tracing::debug;

use crate::block::{Block, List, ListItem, Span};
use crate::config::RenderConfig;
use crate::escape::{escape_attr, escape_html, escape_url, indent};

const EMOJI_PREFIX: &str = "tg://emoji?id=";

/// Renders a document tree to Telegram HTML.
///
/// Holds only configuration; list nesting depth is passed down the recursion,
/// so one renderer can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Parse and render markdown in one step.
    pub fn render_markdown(&self, markdown: &str) -> String {
        self.render(&crate::parse(markdown))
    }

    /// Render a whole document. Blocks are separated by a newline; leading and
    /// trailing newlines are dropped.
    pub fn render(&self, blocks: &[Block]) -> String {
        let rendered: Vec<String> = blocks
            .iter()
            .map(|block| self.render_block(block, 0))
            .collect();
        let out = rendered.join("\n").trim_matches('\n').to_string();
        debug!(blocks = blocks.len(), bytes = out.len(), "rendered telegram html");
        out
    }

    /// Render one block at the given list nesting depth.
    pub fn render_block(&self, block: &Block, depth: usize) -> String {
        match block {
            Block::Heading { level, content } => self.render_heading(*level, content),
            Block::Paragraph { content } => spans_to_html(content),
            Block::CodeBlock { language, content } => {
                render_code_block(language.as_deref(), content)
            }
            Block::Quote { children } => self.render_quote(children, depth),
            Block::List(list) => self.render_list(list, depth),
        }
    }

    fn render_heading(&self, level: u8, content: &[Span]) -> String {
        format!(
            "{} <b>{}</b>",
            self.config.heading_mark.repeat(usize::from(level)),
            spans_to_html(content)
        )
    }

    fn render_quote(&self, children: &[Block], depth: usize) -> String {
        let inner: Vec<String> = children
            .iter()
            .map(|child| self.render_block(child, depth))
            .collect();
        format!("<blockquote>{}</blockquote>", inner.join("\n"))
    }

    fn render_list(&self, list: &List, depth: usize) -> String {
        let mut out = String::from("\n");
        for item in &list.items {
            // An item with nested content ends without a newline
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.render_list_item(item, depth));
        }
        out.push('\n');
        out
    }

    /// First line carries the leader, everything after it is indented to line
    /// up with the text following the leader.
    fn render_list_item(&self, item: &ListItem, depth: usize) -> String {
        let indentation = item.leader.chars().count() + 1;
        let leader = if item.is_unordered() {
            self.config
                .bullet(depth)
                .map_or_else(|| item.leader.clone(), str::to_string)
        } else {
            item.leader.clone()
        };

        let child_depth = depth + 1;
        let mut children = item.children.iter();
        let mut lines = children
            .next()
            .map(|first| block_lines(&self.render_block(first, child_depth)))
            .unwrap_or_default();

        let first_line = if lines.is_empty() {
            leader
        } else {
            format!("{leader} {}", lines.remove(0))
        };

        let following: Vec<String> = lines
            .into_iter()
            .chain(children.flat_map(|child| block_lines(&self.render_block(child, child_depth))))
            .map(|line| if line.trim().is_empty() { String::new() } else { line })
            .collect();
        let following_block = indent(&following.join("\n"), &" ".repeat(indentation));

        format!("{first_line}\n{following_block}")
    }
}

/// Split a rendered block into lines, ignoring newlines around it.
fn block_lines(rendered: &str) -> Vec<String> {
    rendered
        .trim_matches('\n')
        .lines()
        .map(str::to_string)
        .collect()
}

fn render_code_block(language: Option<&str>, content: &str) -> String {
    match language {
        Some(lang) => format!(
            r#"<pre><code class="language-{}">{}</code></pre>"#,
            escape_attr(lang),
            escape_html(content)
        ),
        None => format!("<pre><code>{}</code></pre>", escape_html(content)),
    }
}

fn spans_to_html(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        span_to_html(span, &mut out);
    }
    out
}

fn wrap(tag: &str, inner: &[Span], out: &mut String) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(&spans_to_html(inner));
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn span_to_html(span: &Span, out: &mut String) {
    match span {
        Span::Text(text) => out.push_str(&escape_html(text)),
        Span::Bold(inner) => wrap("strong", inner, out),
        Span::Italic(inner) => wrap("em", inner, out),
        Span::Strikethrough(inner) => wrap("del", inner, out),
        Span::Underline(inner) => wrap("u", inner, out),
        Span::Spoiler(inner) => wrap("tg-spoiler", inner, out),
        Span::Code(code) => {
            out.push_str("<code>");
            out.push_str(&escape_html(code));
            out.push_str("</code>");
        }
        Span::Link {
            url,
            title,
            content,
        } => anchor(url, title.as_deref(), content, out),
        Span::Image { src, title, alt } => match emoji_id(src) {
            Some(id) => {
                out.push_str(&format!(r#"<tg-emoji emoji-id="{id}">"#));
                out.push_str(&spans_to_html(alt));
                out.push_str("</tg-emoji>");
            }
            // No inline images in messages; link to it instead
            None => anchor(src, title.as_deref(), alt, out),
        },
        // Telegram has no <br>
        Span::SoftBreak | Span::LineBreak => out.push('\n'),
    }
}

fn anchor(url: &str, title: Option<&str>, content: &[Span], out: &mut String) {
    out.push_str(r#"<a href=""#);
    out.push_str(&escape_url(url));
    out.push('"');
    if let Some(title) = title {
        out.push_str(r#" title=""#);
        out.push_str(&escape_attr(title));
        out.push('"');
    }
    out.push('>');
    out.push_str(&spans_to_html(content));
    out.push_str("</a>");
}

/// Numeric id of a `tg://emoji?id=<digits>` reference.
fn emoji_id(src: &str) -> Option<&str> {
    let rest = src.strip_prefix(EMOJI_PREFIX)?;
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::markdown_to_html;

    fn text(s: &str) -> Span {
        Span::Text(s.to_string())
    }

    fn item(leader: &str, children: Vec<Block>) -> ListItem {
        ListItem {
            leader: leader.to_string(),
            children,
        }
    }

    fn para(s: &str) -> Block {
        Block::Paragraph {
            content: vec![text(s)],
        }
    }

    fn bullet_list(items: Vec<ListItem>) -> Block {
        Block::List(List {
            ordered: false,
            items,
        })
    }

    #[test]
    fn heading() {
        assert_eq!(markdown_to_html("# Title"), "▎ <b>Title</b>");
        assert_eq!(markdown_to_html("### Deep"), "▎▎▎ <b>Deep</b>");
    }

    #[test]
    fn spoiler() {
        assert_eq!(
            markdown_to_html("||secret||"),
            "<tg-spoiler>secret</tg-spoiler>"
        );
    }

    #[test]
    fn underline() {
        assert_eq!(markdown_to_html("__under__"), "<u>under</u>");
        assert_eq!(markdown_to_html("__foo__bar"), "<u>foo</u>bar");
        assert_eq!(markdown_to_html("foo__bar__baz"), "foo<u>bar</u>baz");
        assert_eq!(markdown_to_html("__ a __"), "<u> a </u>");
        assert_eq!(markdown_to_html("__a___"), "<u>a_</u>");
    }

    #[test]
    fn leading_rule_does_not_hide_text() {
        assert_eq!(
            markdown_to_html("---\nHere is a list\n---\nMore text"),
            "▎▎ <b>Here is a list</b>\nMore text"
        );
    }

    #[test]
    fn nested_unordered_list() {
        assert_eq!(markdown_to_html("- a\n  - b"), "• a\n  ◦ b");
    }

    #[test]
    fn custom_emoji() {
        assert_eq!(
            markdown_to_html("![smile](tg://emoji?id=42)"),
            r#"<tg-emoji emoji-id="42">smile</tg-emoji>"#
        );
    }

    #[test]
    fn image_becomes_link() {
        assert_eq!(
            markdown_to_html("![alt-text](https://example.com/x.png)"),
            r#"<a href="https://example.com/x.png">alt-text</a>"#
        );
        assert_eq!(
            markdown_to_html(r#"![alt](https://example.com/x.png "A \"pic\"")"#),
            r#"<a href="https://example.com/x.png" title="A &quot;pic&quot;">alt</a>"#
        );
    }

    #[test]
    fn emoji_requires_digits() {
        assert_eq!(emoji_id("tg://emoji?id=42"), Some("42"));
        assert_eq!(emoji_id("tg://emoji?id=42&x=1"), Some("42"));
        assert_eq!(emoji_id("tg://emoji?id="), None);
        assert_eq!(emoji_id("tg://emoji?id=abc"), None);
        assert_eq!(emoji_id("https://example.com/tg://emoji?id=1"), None);
    }

    #[test]
    fn paragraphs_have_no_tags() {
        assert_eq!(markdown_to_html("one\n\ntwo"), "one\ntwo");
    }

    #[test]
    fn inline_formatting() {
        assert_eq!(
            markdown_to_html("**b** *i* ~~s~~ `c<d>`"),
            "<strong>b</strong> <em>i</em> <del>s</del> <code>c&lt;d&gt;</code>"
        );
    }

    #[test]
    fn links() {
        assert_eq!(
            markdown_to_html("[a & b](https://example.com/?q=1&r=2)"),
            r#"<a href="https://example.com/?q=1&amp;r=2">a &amp; b</a>"#
        );
    }

    #[test]
    fn escapes_text() {
        assert_eq!(
            markdown_to_html("1 < 2 && 3 > 2"),
            "1 &lt; 2 &amp;&amp; 3 &gt; 2"
        );
        assert_eq!(markdown_to_html("<script>x</script>"), "&lt;script&gt;x&lt;/script&gt;");
    }

    #[test]
    fn line_breaks() {
        assert_eq!(markdown_to_html("a\nb"), "a\nb");
        assert_eq!(markdown_to_html("a  \nb"), "a\nb");
    }

    #[test]
    fn code_block() {
        assert_eq!(
            markdown_to_html("```rust\nif a < b {}\n```"),
            "<pre><code class=\"language-rust\">if a &lt; b {}\n</code></pre>"
        );
        assert_eq!(
            markdown_to_html("    plain"),
            "<pre><code>plain\n</code></pre>"
        );
    }

    #[test]
    fn quote() {
        assert_eq!(
            markdown_to_html("> **hi**"),
            "<blockquote><strong>hi</strong></blockquote>"
        );
    }

    #[test]
    fn ordered_list_keeps_numbers() {
        assert_eq!(markdown_to_html("1. one\n2. two"), "1. one\n2. two");
    }

    #[test]
    fn ordered_list_indents_continuation() {
        let blocks = vec![Block::List(List {
            ordered: true,
            items: vec![item("10.", vec![para("a"), para("b")])],
        })];
        assert_eq!(Renderer::default().render(&blocks), "10. a\n    b");
    }

    #[test]
    fn bullets_follow_depth_and_clamp() {
        let markdown = "- a\n  - b\n    - c\n      - d";
        assert_eq!(
            markdown_to_html(markdown),
            "• a\n  ◦ b\n    ▪ c\n      ▪ d"
        );
    }

    #[test]
    fn sibling_after_nested_list_uses_outer_bullet() {
        assert_eq!(markdown_to_html("- a\n  - b\n- c"), "• a\n  ◦ b\n• c");
    }

    #[test]
    fn list_between_paragraphs() {
        assert_eq!(
            markdown_to_html("intro\n\n- a\n- b\n\noutro"),
            "intro\n\n• a\n• b\n\n\noutro"
        );
    }

    #[test]
    fn loose_item_blank_lines_are_not_indented() {
        let blocks = vec![bullet_list(vec![item(
            "-",
            vec![
                Block::Paragraph {
                    content: vec![text("a"), Span::SoftBreak, text("   "), Span::SoftBreak, text("b")],
                },
                para("c"),
            ],
        )])];
        assert_eq!(Renderer::default().render(&blocks), "• a\n\n  b\n  c");
    }

    #[test]
    fn empty_list_item_renders_leader() {
        let blocks = vec![bullet_list(vec![item("-", vec![]), item("*", vec![para("x")])])];
        assert_eq!(Renderer::default().render(&blocks), "•\n• x");
    }

    #[test]
    fn empty_bullet_config_keeps_leader() {
        let renderer = Renderer::new(RenderConfig {
            bullets: Vec::new(),
            heading_mark: "#".to_string(),
        });
        assert_eq!(renderer.render_markdown("+ a\n\n# T"), "+ a\n\n\n# <b>T</b>");
    }

    #[test]
    fn depth_is_a_parameter() {
        let renderer = Renderer::default();
        let list = bullet_list(vec![item("-", vec![para("x")])]);
        assert_eq!(renderer.render_block(&list, 0), "\n• x\n\n");
        assert_eq!(renderer.render_block(&list, 1), "\n◦ x\n\n");
        assert_eq!(renderer.render_block(&list, 7), "\n▪ x\n\n");
        // Rendering never changes later output
        assert_eq!(renderer.render_block(&list, 0), "\n• x\n\n");
    }

    #[test]
    fn deterministic_and_shareable() {
        let renderer = Renderer::default();
        let blocks = crate::parse("# T\n\n- ||a||\n  - __b__\n- ![e](tg://emoji?id=1)");
        let expected = renderer.render(&blocks);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| renderer.render(&blocks)))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn never_emits_block_tags() {
        let html = markdown_to_html(
            "# H\n\npara\n\n- a\n  1. b\n\n![i](https://x.y/i.png)\n\n---\n\nend",
        );
        for tag in ["<p>", "<h1>", "<ul>", "<ol>", "<li>", "<img", "<br", "<hr"] {
            assert!(!html.contains(tag), "{tag} in {html}");
        }
    }
}
