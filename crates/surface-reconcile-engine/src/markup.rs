//! # Markup - Loading and Printing Surface Trees
//!
//! A small, forgiving markup reader used to build [`Surface`] trees in tests,
//! scenarios and the reference view. It is not an HTML parser: it knows
//! open tags, close tags, void elements and text, and decodes entities.
//!
//! Tokenizing is done with [Logos]; tag internals are picked apart with a
//! `regex`. Anything the lexer cannot classify becomes text, so loading
//! never fails.
//!
//! [Logos]: https://docs.rs/logos

use std::collections::BTreeMap;
use std::sync::OnceLock;

use logos::Logos;
use regex::Regex;

use crate::surface::{Surface, SurfaceData, SurfaceId};

/// Elements that never have children.
const VOID_TAGS: &[&str] = &["br", "img", "hr", "input"];

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"")]
enum TokenKind {
    /// `</tag>`
    #[regex(r"</[a-zA-Z][^<>]*>")]
    CloseTag,

    /// `<tag attr="value">` or `<tag/>`
    #[regex(r"<[a-zA-Z][^<>]*>")]
    OpenTag,

    /// `<!-- ... -->`, dropped. An unterminated comment runs to the end.
    #[token("<!--", comment_end)]
    Comment,

    /// Character data
    #[regex(r"[^<]+")]
    Text,
}

fn comment_end(lex: &mut logos::Lexer<TokenKind>) {
    let rest = lex.remainder();
    lex.bump(rest.find("-->").map_or(rest.len(), |end| end + 3));
}

fn tag_name_regex() -> &'static Regex {
    static TAG_NAME: OnceLock<Regex> = OnceLock::new();
    TAG_NAME.get_or_init(|| Regex::new(r"^</?([a-zA-Z][a-zA-Z0-9]*)").expect("Invalid tag name regex"))
}

fn attribute_regex() -> &'static Regex {
    static ATTRIBUTE: OnceLock<Regex> = OnceLock::new();
    ATTRIBUTE.get_or_init(|| {
        Regex::new(r#"([a-zA-Z_:][a-zA-Z0-9_:.-]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+)))?"#)
            .expect("Invalid attribute regex")
    })
}

fn tag_name(raw: &str) -> String {
    tag_name_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_ascii_lowercase())
        .unwrap_or_default()
}

fn attributes(raw: &str) -> BTreeMap<String, String> {
    let name_end = tag_name_regex().find(raw).map_or(0, |m| m.end());
    let body = raw[name_end..].trim_end_matches('>').trim_end_matches('/');
    attribute_regex()
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|v| html_escape::decode_html_entities(v.as_str()).into_owned())
                .unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

/// Parses `markup` and appends the resulting nodes to `parent`.
pub(crate) fn load_into(surface: &mut Surface, parent: SurfaceId, markup: &str) {
    let mut stack = vec![parent];
    let mut lexer = TokenKind::lexer(markup);
    while let Some(token) = lexer.next() {
        let raw = lexer.slice();
        let top = stack.last().copied().unwrap_or(parent);
        match token {
            Ok(TokenKind::OpenTag) => {
                let name = tag_name(raw);
                let element = surface.create_element(&name, attributes(raw));
                surface.append(top, element);
                if !raw.ends_with("/>") && !VOID_TAGS.contains(&name.as_str()) {
                    stack.push(element);
                }
            }
            Ok(TokenKind::CloseTag) => {
                let name = tag_name(raw);
                // Unmatched close tags are ignored; a match closes everything
                // opened after it.
                if let Some(depth) = stack
                    .iter()
                    .skip(1)
                    .rposition(|&open| surface.tag(open) == Some(name.as_str()))
                {
                    stack.truncate(depth + 1);
                }
            }
            Ok(TokenKind::Comment) => {}
            Ok(TokenKind::Text) | Err(()) => {
                let text = html_escape::decode_html_entities(raw);
                append_text(surface, top, &text);
            }
        }
    }
}

/// Appends text, merging into a trailing text node so stray `<` characters
/// do not fragment it.
fn append_text(surface: &mut Surface, parent: SurfaceId, text: &str) {
    if let Some(&last) = surface.children(parent).last()
        && let Some(existing) = surface.text(last)
    {
        let merged = format!("{existing}{text}");
        surface.set_text(last, &merged);
        return;
    }
    let node = surface.create_text(text);
    surface.append(parent, node);
}

pub(crate) fn serialize_children(surface: &Surface, id: SurfaceId) -> String {
    let mut out = String::new();
    for &child in surface.children(id) {
        serialize_node(surface, child, &mut out);
    }
    out
}

fn serialize_node(surface: &Surface, id: SurfaceId, out: &mut String) {
    match surface.data(id) {
        SurfaceData::Text(text) => out.push_str(&html_escape::encode_text(text)),
        SurfaceData::Element { tag, attrs } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&html_escape::encode_double_quoted_attribute(value));
                out.push('"');
            }
            out.push('>');
            if VOID_TAGS.contains(&tag.as_str()) {
                return;
            }
            for &child in surface.children(id) {
                serialize_node(surface, child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn roundtrip(markup: &str) -> String {
        Surface::from_markup(markup).to_markup()
    }

    #[rstest]
    #[case("<p>plain</p>", "<p>plain</p>")]
    #[case("<P>upper</P>", "<p>upper</p>")]
    #[case("<p>a<br>b</p>", "<p>a<br>b</p>")]
    #[case("<p>a<br/>b</p>", "<p>a<br>b</p>")]
    #[case("<p><img src=\"x.png\" alt='pic'></p>", "<p><img alt=\"pic\" src=\"x.png\"></p>")]
    #[case("<p>unclosed", "<p>unclosed</p>")]
    #[case("<p>a</em>b</p>", "<p>ab</p>")]
    #[case("<p>a<!-- note -->b</p>", "<p>ab</p>")]
    #[case("<p>a<!-- x > y -- z -->b</p>", "<p>ab</p>")]
    #[case("<p>a<!-- open", "<p>a</p>")]
    #[case("1 < 2", "1 &lt; 2")]
    fn test_load_forgiving(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(roundtrip(input), expected);
    }

    #[test]
    fn test_entities_are_decoded() {
        let surface = Surface::from_markup("<p>a &amp; b&nbsp;c</p>");
        assert_eq!(surface.text_content(surface.root()), "a & b\u{a0}c");
    }

    #[test]
    fn test_close_tag_closes_nested_elements() {
        let surface = Surface::from_markup("<ul><li><p>one</ul><p>two</p>");
        assert_eq!(
            surface.to_markup(),
            "<ul><li><p>one</p></li></ul><p>two</p>"
        );
    }

    #[test]
    fn test_link_attribute() {
        let surface = Surface::from_markup(r#"<p><a href="https://x.test/?a=1&amp;b=2">x</a></p>"#);
        let p = surface.children(surface.root())[0];
        let a = surface.children(p)[0];
        assert_eq!(surface.attr(a, "href"), Some("https://x.test/?a=1&b=2"));
    }
}
