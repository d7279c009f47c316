//! Regex scan over `<TE ...>...</TE>` blocks.
//!
//! Used when the markup cannot be read as a tree at all. Each block is
//! handled on its own, so one broken region only loses the tags inside it.

use super::{Extraction, TagAttributes, resolve_value, unescape_lenient};
use crate::error::{Result, XbrlError};
use regex::Regex;
use std::sync::LazyLock;

const CLOSE_TAG: &str = "</TE>";

static PATTERNS: LazyLock<std::result::Result<Patterns, regex::Error>> =
    LazyLock::new(Patterns::compile);

struct Patterns {
    open: Regex,
    attribute: Regex,
    paragraph: Regex,
    markup: Regex,
}

impl Patterns {
    fn compile() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            open: Regex::new(r"<TE(\s[^>]*)?>")?,
            attribute: Regex::new(
                r#"\b(ACODE|ACONTEXT|ADECIMAL)\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
            )?,
            paragraph: Regex::new(r"<P(?:\s[^>]*)?>([^<]*)</P>")?,
            markup: Regex::new(r"<[^>]+>")?,
        })
    }

    fn attributes(&self, text: &str) -> TagAttributes {
        let mut attrs = TagAttributes::default();
        for caps in self.attribute.captures_iter(text) {
            let (Some(key), Some(value)) = (caps.get(1), caps.get(2).or_else(|| caps.get(3)))
            else {
                continue;
            };
            attrs.set(
                key.as_str().as_bytes(),
                unescape_lenient(value.as_str()).into_owned(),
            );
        }
        attrs
    }

    fn value(&self, body: &str) -> String {
        let first_paragraph = self
            .paragraph
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .map(|m| unescape_lenient(m.as_str()).into_owned())
            .find(|text| !text.trim().is_empty());
        let stripped = self.markup.replace_all(body, "");
        resolve_value(first_paragraph, &unescape_lenient(&stripped))
    }
}

pub(super) fn extract(text: &str) -> Result<Extraction> {
    let patterns = PATTERNS.as_ref().map_err(|e| XbrlError::Pattern(e.clone()))?;
    let mut extraction = Extraction::default();
    let mut cursor = 0;

    while let Some(caps) = patterns.open.captures_at(text, cursor) {
        let Some(open) = caps.get(0) else {
            break;
        };
        let attr_text = caps.get(1).map_or("", |m| m.as_str());
        let attrs = patterns.attributes(attr_text);
        extraction.open_tag(&attrs);
        cursor = open.end();

        if attr_text.trim_end().ends_with('/') {
            extraction.emit(attrs, String::new());
            continue;
        }

        let rest = &text[open.end()..];
        let close = rest.find(CLOSE_TAG);
        let next_open = patterns.open.find(rest).map(|m| m.start());
        // A block without its own close tag is counted but yields no record.
        if let Some(close) = close
            && next_open.is_none_or(|next| close < next)
        {
            extraction.emit(attrs, patterns.value(&rest[..close]));
            cursor = open.end() + close + CLOSE_TAG.len();
        }
    }

    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survives_broken_markup_between_tags() {
        let doc = concat!(
            r#"<TE ACODE="a" ACONTEXT='CFY2024eFY'><P>1</P></TE>"#,
            "<<&&><TABLE <broken",
            r#"<TE ADECIMAL="-3" ACODE="b">2</TE>"#,
        );
        let extraction = extract(doc).unwrap();

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[0].context_ref, "CFY2024eFY");
        assert_eq!(extraction.records[1].decimal_scale, -3);
        assert_eq!(extraction.records[1].raw_value, "2");
    }

    #[test]
    fn test_unclosed_tag_is_counted_but_not_emitted() {
        let doc = r#"<TE ACODE="a">1 <TE ACODE="b">2</TE>"#;
        let extraction = extract(doc).unwrap();

        assert_eq!(extraction.stats.total_tags, 2);
        assert_eq!(extraction.stats.coded_tags, 2);
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].code, "b");
        assert_eq!(extraction.records[0].ordinal, 0);
    }

    #[test]
    fn test_does_not_match_longer_element_names() {
        let doc = r#"<TEXT ACODE="a">1</TEXT><TE ACODE="b">2</TE>"#;
        let extraction = extract(doc).unwrap();
        assert_eq!(extraction.stats.total_tags, 1);
        assert_eq!(extraction.records[0].code, "b");
    }

    #[test]
    fn test_patterns_compile() {
        assert!(PATTERNS.is_ok());
    }

    #[test]
    fn test_body_markup_is_stripped() {
        let doc = r#"<TE ACODE="a"><SPAN>1,</SPAN>000 &amp;</TE>"#;
        let extraction = extract(doc).unwrap();
        assert_eq!(extraction.records[0].raw_value, "1,000 &");
    }
}
