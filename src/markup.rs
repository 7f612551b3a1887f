// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Markup cleaning for chat message content.
//!
//! FoundryVTT stores message bodies as HTML fragments: dialogue wrapped in
//! `<p>` tags, inline styling spans, and entire chat cards for dice rolls.
//! This module parses those fragments into a small node tree and flattens
//! the tree back into clean text, keeping semantic emphasis (`<b>`,
//! `<strong>`, `<i>`, `<em>`) and discarding everything structural.
//!
//! The parser is deliberately forgiving. Exports in the wild contain
//! unclosed tags, stray close tags, raw `<` characters in dialogue, and
//! half-typed entities; all of them degrade to best-effort text instead of
//! an error. There is no failure path anywhere in this module.
//!
//! # Example
//!
//! ```
//! use fvtt2docx::markup;
//!
//! let nodes = markup::parse("<p>The <b>giant</b> stirs.</p>");
//! assert_eq!(markup::plain_text(&nodes), "The giant stirs.");
//! assert!(!markup::has_class(&nodes, "dice-roll"));
//! ```

/// One node of a parsed markup fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// An element with its parsed children.
    Element(Element),
    /// A run of character data, entities already decoded.
    Text(String),
}

/// A parsed element. Only the pieces the pipeline consumes are kept:
/// the tag name (lowercased), the `class` attribute tokens, and children.
/// All other attributes are presentational noise and are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name, e.g. `"div"`.
    pub name: String,
    /// Whitespace-split tokens of the `class` attribute.
    pub classes: Vec<String>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
}

/// One styled fragment of flattened text.
///
/// Adjacent text with the same styling is merged into a single span, and
/// whitespace is already collapsed, so concatenating span texts yields the
/// clean plain-text form of the fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// The text content.
    pub text: String,
    /// Bold emphasis inherited from `<b>` or `<strong>`.
    pub bold: bool,
    /// Italic emphasis inherited from `<i>` or `<em>`.
    pub italic: bool,
}

/// Elements that never have children.
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Returns `true` for elements whose boundaries separate words, so that
/// `<p>a</p><p>b</p>` flattens to `"a b"` rather than `"ab"`.
fn is_block_element(name: &str) -> bool {
    matches!(
        name,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "br"
            | "dd"
            | "div"
            | "dl"
            | "dt"
            | "fieldset"
            | "figcaption"
            | "figure"
            | "footer"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "hr"
            | "li"
            | "ol"
            | "p"
            | "pre"
            | "section"
            | "table"
            | "tbody"
            | "td"
            | "tfoot"
            | "th"
            | "thead"
            | "tr"
            | "ul"
    )
}

/// Parses an HTML fragment into a node tree.
///
/// Total over all inputs: unclosed tags are closed at the end of input,
/// stray close tags are ignored, comments and declarations are skipped,
/// `<script>` and `<style>` contents are dropped, and a `<` that does not
/// begin a tag is literal text.
#[must_use]
pub fn parse(html: &str) -> Vec<Node> {
    let chars: Vec<char> = html.chars().collect();
    let mut builder = TreeBuilder::default();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '&' {
            let (decoded, next) = decode_entity(&chars, i);
            text.push_str(&decoded);
            i = next;
            continue;
        }
        if chars[i] != '<' {
            text.push(chars[i]);
            i += 1;
            continue;
        }
        match chars.get(i + 1).copied() {
            Some(c) if c.is_ascii_alphabetic() => {
                flush_text(&mut builder, &mut text);
                let (tag, after) = read_open_tag(&chars, i + 1);
                i = after;
                if tag.self_closing || VOID_ELEMENTS.contains(&tag.name.as_str()) {
                    builder.append(Node::Element(Element {
                        name: tag.name,
                        classes: tag.classes,
                        children: Vec::new(),
                    }));
                } else if tag.name == "script" || tag.name == "style" {
                    i = skip_raw_text(&chars, i, &tag.name);
                } else {
                    builder.open(Element {
                        name: tag.name,
                        classes: tag.classes,
                        children: Vec::new(),
                    });
                }
            }
            Some('/') => {
                flush_text(&mut builder, &mut text);
                let (name, after) = read_close_tag(&chars, i + 2);
                i = after;
                if !name.is_empty() {
                    builder.close(&name);
                }
            }
            Some('!') => {
                i = skip_declaration(&chars, i);
            }
            _ => {
                // A lone '<' is dialogue, not markup.
                text.push('<');
                i += 1;
            }
        }
    }

    flush_text(&mut builder, &mut text);
    builder.finish()
}

/// Flattens a node tree into styled spans with collapsed whitespace.
///
/// All whitespace runs, including non-breaking spaces and the gaps implied
/// by block element boundaries, collapse to a single space. The result has
/// no leading or trailing whitespace and no empty spans.
#[must_use]
pub fn spans(nodes: &[Node]) -> Vec<Span> {
    let mut flattener = Flattener::default();
    flattener.walk(nodes, false, false);
    flattener.spans
}

/// Flattens a node tree into clean plain text.
///
/// Equivalent to concatenating the texts of [`spans`].
#[must_use]
pub fn plain_text(nodes: &[Node]) -> String {
    spans(nodes).iter().map(|span| span.text.as_str()).collect()
}

/// Returns `true` if any element in the tree carries the given class.
#[must_use]
pub fn has_class(nodes: &[Node], class: &str) -> bool {
    nodes.iter().any(|node| match node {
        Node::Element(el) => {
            el.classes.iter().any(|c| c == class) || has_class(&el.children, class)
        }
        Node::Text(_) => false,
    })
}

/// Returns the flattened text of the first element carrying the given
/// class, searching depth-first in document order.
#[must_use]
pub fn find_class_text(nodes: &[Node], class: &str) -> Option<String> {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.classes.iter().any(|c| c == class) {
                return Some(plain_text(&el.children));
            }
            if let Some(found) = find_class_text(&el.children, class) {
                return Some(found);
            }
        }
    }
    None
}

/// Builds the node tree while tags stream in. Open elements live on the
/// stack; closing an element attaches it to its parent (or the root list).
#[derive(Default)]
struct TreeBuilder {
    roots: Vec<Node>,
    stack: Vec<Element>,
}

impl TreeBuilder {
    fn append(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn open(&mut self, element: Element) {
        self.stack.push(element);
    }

    /// Closes the innermost open element with this name, implicitly closing
    /// anything opened inside it. Unmatched close tags are ignored.
    fn close(&mut self, name: &str) {
        let Some(depth) = self.stack.iter().rposition(|el| el.name == name) else {
            return;
        };
        while self.stack.len() > depth {
            let Some(element) = self.stack.pop() else {
                break;
            };
            self.append(Node::Element(element));
        }
    }

    fn finish(mut self) -> Vec<Node> {
        while let Some(element) = self.stack.pop() {
            self.append(Node::Element(element));
        }
        self.roots
    }
}

fn flush_text(builder: &mut TreeBuilder, text: &mut String) {
    if !text.is_empty() {
        builder.append(Node::Text(std::mem::take(text)));
    }
}

struct OpenTag {
    name: String,
    classes: Vec<String>,
    self_closing: bool,
}

/// Reads a tag from the first name character through the closing `>`,
/// returning the tag and the index just past it. Only the `class`
/// attribute is retained. An unterminated tag ends at the end of input.
fn read_open_tag(chars: &[char], start: usize) -> (OpenTag, usize) {
    let mut i = start;
    let mut name = String::new();
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
        name.push(chars[i].to_ascii_lowercase());
        i += 1;
    }

    let mut classes = Vec::new();
    let mut self_closing = false;
    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        match chars.get(i).copied() {
            None => break,
            Some('>') => {
                i += 1;
                break;
            }
            Some('/') => {
                self_closing = true;
                i += 1;
            }
            Some(_) => {
                // Only a '/' directly before '>' self-closes.
                self_closing = false;
                let mut attr = String::new();
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !matches!(chars[i], '=' | '>' | '/')
                {
                    attr.push(chars[i].to_ascii_lowercase());
                    i += 1;
                }
                while i < chars.len() && chars[i].is_whitespace() {
                    i += 1;
                }
                let mut value = String::new();
                if chars.get(i) == Some(&'=') {
                    i += 1;
                    while i < chars.len() && chars[i].is_whitespace() {
                        i += 1;
                    }
                    match chars.get(i).copied() {
                        Some(quote @ ('"' | '\'')) => {
                            i += 1;
                            while i < chars.len() && chars[i] != quote {
                                value.push(chars[i]);
                                i += 1;
                            }
                            if i < chars.len() {
                                i += 1;
                            }
                        }
                        _ => {
                            while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '>' {
                                value.push(chars[i]);
                                i += 1;
                            }
                        }
                    }
                }
                if attr == "class" {
                    classes = value.split_whitespace().map(str::to_owned).collect();
                }
            }
        }
    }

    (
        OpenTag {
            name,
            classes,
            self_closing,
        },
        i,
    )
}

/// Reads a close tag name starting just past `</`, returning the name and
/// the index past the closing `>`.
fn read_close_tag(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    let mut name = String::new();
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
        name.push(chars[i].to_ascii_lowercase());
        i += 1;
    }
    while i < chars.len() && chars[i] != '>' {
        i += 1;
    }
    let end = if i < chars.len() { i + 1 } else { i };
    (name, end)
}

/// Skips a comment (`<!-- -->`) or markup declaration (`<!DOCTYPE >`),
/// returning the index past it. Unterminated forms swallow the rest.
fn skip_declaration(chars: &[char], start: usize) -> usize {
    if chars.get(start + 2) == Some(&'-') && chars.get(start + 3) == Some(&'-') {
        let mut i = start + 4;
        while i + 3 <= chars.len() {
            if chars[i] == '-' && chars[i + 1] == '-' && chars[i + 2] == '>' {
                return i + 3;
            }
            i += 1;
        }
        return chars.len();
    }
    let mut i = start + 2;
    while i < chars.len() && chars[i] != '>' {
        i += 1;
    }
    if i < chars.len() { i + 1 } else { chars.len() }
}

/// Skips the raw contents of a `<script>` or `<style>` element through its
/// matching close tag, returning the index past that tag.
fn skip_raw_text(chars: &[char], start: usize, name: &str) -> usize {
    let name_chars: Vec<char> = name.chars().collect();
    let mut i = start;
    while i < chars.len() {
        if chars[i] == '<' && chars.get(i + 1) == Some(&'/') {
            let mut j = i + 2;
            let mut matched = true;
            for &expected in &name_chars {
                if j < chars.len() && chars[j].to_ascii_lowercase() == expected {
                    j += 1;
                } else {
                    matched = false;
                    break;
                }
            }
            if matched && chars.get(j).is_none_or(|c| *c == '>' || c.is_whitespace()) {
                while j < chars.len() && chars[j] != '>' {
                    j += 1;
                }
                return if j < chars.len() { j + 1 } else { chars.len() };
            }
        }
        i += 1;
    }
    chars.len()
}

/// Decodes the entity starting at `&`, returning the replacement text and
/// the index to resume at. Anything unrecognized keeps the literal `&`.
fn decode_entity(chars: &[char], start: usize) -> (String, usize) {
    let limit = (start + 32).min(chars.len());
    let mut i = start + 1;
    while i < limit && (chars[i].is_ascii_alphanumeric() || chars[i] == '#') {
        i += 1;
    }
    if i < chars.len() && chars[i] == ';' && i > start + 1 {
        let body: String = chars[start + 1..i].iter().collect();
        if let Some(decoded) = decode_entity_body(&body) {
            return (decoded, i + 1);
        }
    }
    ("&".to_owned(), start + 1)
}

fn decode_entity_body(body: &str) -> Option<String> {
    if let Some(code) = body.strip_prefix('#') {
        let parsed = if let Some(hex) = code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            code.parse::<u32>().ok()
        };
        return parsed.and_then(char::from_u32).map(String::from);
    }
    let replacement = match body {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        _ => return None,
    };
    Some(replacement.to_owned())
}

/// Walks the tree accumulating spans. A pending-space flag implements the
/// whitespace collapse: the space is emitted only when more visible text
/// follows, which also guarantees trimmed output.
#[derive(Default)]
struct Flattener {
    spans: Vec<Span>,
    pending_space: bool,
}

impl Flattener {
    fn walk(&mut self, nodes: &[Node], bold: bool, italic: bool) {
        for node in nodes {
            match node {
                Node::Text(text) => self.push_text(text, bold, italic),
                Node::Element(el) => {
                    let (child_bold, child_italic) = match el.name.as_str() {
                        "b" | "strong" => (true, italic),
                        "i" | "em" => (bold, true),
                        _ => (bold, italic),
                    };
                    let block = is_block_element(&el.name);
                    if block {
                        self.break_word();
                    }
                    self.walk(&el.children, child_bold, child_italic);
                    if block {
                        self.break_word();
                    }
                }
            }
        }
    }

    fn push_text(&mut self, text: &str, bold: bool, italic: bool) {
        for c in text.chars() {
            if c.is_whitespace() {
                self.break_word();
            } else {
                if self.pending_space {
                    self.append_char(' ', bold, italic);
                    self.pending_space = false;
                }
                self.append_char(c, bold, italic);
            }
        }
    }

    fn break_word(&mut self) {
        if !self.spans.is_empty() {
            self.pending_space = true;
        }
    }

    fn append_char(&mut self, c: char, bold: bool, italic: bool) {
        let needs_new = self
            .spans
            .last()
            .is_none_or(|span| span.bold != bold || span.italic != italic);
        if needs_new {
            self.spans.push(Span {
                text: String::new(),
                bold,
                italic,
            });
        }
        if let Some(span) = self.spans.last_mut() {
            span.text.push(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(html: &str) -> String {
        plain_text(&parse(html))
    }

    #[test]
    fn passes_plain_text_through() {
        assert_eq!(text_of("Hello world"), "Hello world");
    }

    #[test]
    fn strips_wrapping_tags() {
        assert_eq!(
            text_of(r#"<p>Hello <span style="color:red">world</span></p>"#),
            "Hello world"
        );
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(text_of("Hello\n\n   world\t!"), "Hello world !");
    }

    #[test]
    fn trims_leading_and_trailing_whitespace() {
        assert_eq!(text_of("  padded out  "), "padded out");
    }

    #[test]
    fn collapses_non_breaking_spaces() {
        assert_eq!(text_of("a&nbsp;&nbsp;b"), "a b");
    }

    #[test]
    fn decodes_named_entities() {
        assert_eq!(
            text_of("&lt;Fireball&gt; &amp; &quot;magic&quot;"),
            "<Fireball> & \"magic\""
        );
    }

    #[test]
    fn decodes_numeric_entities() {
        assert_eq!(text_of("&#65;&#x42;"), "AB");
    }

    #[test]
    fn keeps_unknown_entities_literal() {
        assert_eq!(text_of("roll &bogus; damage"), "roll &bogus; damage");
    }

    #[test]
    fn keeps_unterminated_entity_literal() {
        assert_eq!(text_of("AT&T"), "AT&T");
    }

    #[test]
    fn preserves_literal_less_than() {
        assert_eq!(text_of("x < 5 and y <3"), "x < 5 and y <3");
    }

    #[test]
    fn preserves_less_than_at_end() {
        assert_eq!(text_of("value<"), "value<");
    }

    #[test]
    fn keeps_bold_and_italic_spans() {
        let spans = spans(&parse("<b>bold</b> normal <em>it</em>"));
        assert_eq!(
            spans,
            vec![
                Span {
                    text: "bold".into(),
                    bold: true,
                    italic: false,
                },
                Span {
                    text: " normal".into(),
                    bold: false,
                    italic: false,
                },
                Span {
                    text: " it".into(),
                    bold: false,
                    italic: true,
                },
            ]
        );
    }

    #[test]
    fn nests_emphasis() {
        let spans = spans(&parse("<b>a<i>b</i></b>"));
        assert_eq!(
            spans,
            vec![
                Span {
                    text: "a".into(),
                    bold: true,
                    italic: false,
                },
                Span {
                    text: "b".into(),
                    bold: true,
                    italic: true,
                },
            ]
        );
    }

    #[test]
    fn strong_and_em_map_to_emphasis() {
        let spans = spans(&parse("<strong>x</strong><em>y</em>"));
        assert!(spans[0].bold && !spans[0].italic);
        assert!(!spans[1].bold && spans[1].italic);
    }

    #[test]
    fn closes_unclosed_tags_at_end_of_input() {
        let spans = spans(&parse("<b>never closed"));
        assert_eq!(spans.len(), 1);
        assert!(spans[0].bold);
        assert_eq!(spans[0].text, "never closed");
    }

    #[test]
    fn ignores_stray_close_tags() {
        assert_eq!(text_of("a</div>b"), "ab");
    }

    #[test]
    fn survives_malformed_tag_soup() {
        assert_eq!(text_of("<div <p>x"), "x");
    }

    #[test]
    fn treats_br_as_word_break() {
        assert_eq!(text_of("a<br>b"), "a b");
        assert_eq!(text_of("a<br/>b"), "a b");
    }

    #[test]
    fn treats_block_boundaries_as_word_breaks() {
        assert_eq!(text_of("<p>a</p><p>b</p>"), "a b");
        assert_eq!(text_of("<div>a</div><div>b</div>"), "a b");
    }

    #[test]
    fn inline_elements_do_not_break_words() {
        assert_eq!(text_of("cross<span>word</span>"), "crossword");
    }

    #[test]
    fn drops_script_and_style_contents() {
        assert_eq!(text_of("a<script>var x = '</b>';</script>b"), "ab");
        assert_eq!(text_of("a<style>.x { color: red }</style>b"), "ab");
    }

    #[test]
    fn skips_comments() {
        assert_eq!(text_of("a<!-- hidden -->b"), "ab");
    }

    #[test]
    fn survives_unterminated_comment() {
        assert_eq!(text_of("a<!-- swallowed"), "a");
    }

    #[test]
    fn skips_doctype() {
        assert_eq!(text_of("<!DOCTYPE html>x"), "x");
    }

    #[test]
    fn lowercases_tag_names() {
        let spans = spans(&parse("<B>x</B>"));
        assert!(spans[0].bold);
    }

    #[test]
    fn reads_quoted_attribute_containing_closing_bracket() {
        assert_eq!(text_of(r#"<span title="a > b">x</span>"#), "x");
    }

    #[test]
    fn handles_empty_input() {
        assert!(parse("").is_empty());
        assert_eq!(text_of(""), "");
    }

    #[test]
    fn finds_elements_by_class() {
        let html = concat!(
            r#"<div class="dice-roll"><div class="dice-result">"#,
            r#"<div class="dice-formula">2d6 + 3</div>"#,
            r#"<h4 class="dice-total">11</h4></div></div>"#,
        );
        let nodes = parse(html);
        assert!(has_class(&nodes, "dice-roll"));
        assert!(!has_class(&nodes, "dice-tooltip"));
        assert_eq!(find_class_text(&nodes, "dice-formula").as_deref(), Some("2d6 + 3"));
        assert_eq!(find_class_text(&nodes, "dice-total").as_deref(), Some("11"));
        assert_eq!(find_class_text(&nodes, "missing"), None);
    }

    #[test]
    fn matches_one_of_several_class_tokens() {
        let nodes = parse(r#"<div class="chat-card dice-roll">x</div>"#);
        assert!(has_class(&nodes, "dice-roll"));
        assert!(has_class(&nodes, "chat-card"));
    }
}
