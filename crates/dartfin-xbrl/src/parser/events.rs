//! Event-driven extraction shared by the strict and tolerant tiers.

use super::{Extraction, TagAttributes, count_tag_openings, resolve_value, unescape_lenient};
use crate::error::{Result, XbrlError};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, BytesText, Event};
use tracing::debug;

const TE: &[u8] = b"TE";
const P: &[u8] = b"P";

#[derive(Debug, Clone, Copy)]
pub(super) enum Strictness {
    Strict,
    Tolerant { error_budget: usize },
}

impl Strictness {
    const fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// First `<P>` inside an open `TE`.
#[derive(Debug)]
struct Paragraph {
    text: String,
    pure: bool,
    nested: usize,
}

/// A `TE` element whose end has not been seen yet.
#[derive(Debug)]
struct OpenTag {
    attrs: TagAttributes,
    body: String,
    first_paragraph: Option<String>,
    paragraph: Option<Paragraph>,
}

impl OpenTag {
    const fn new(attrs: TagAttributes) -> Self {
        Self {
            attrs,
            body: String::new(),
            first_paragraph: None,
            paragraph: None,
        }
    }

    fn child_start(&mut self, name: &[u8]) {
        if let Some(paragraph) = self.paragraph.as_mut() {
            paragraph.pure = false;
            if name == P {
                paragraph.nested += 1;
            }
        } else if name == P && self.first_paragraph.is_none() {
            self.paragraph = Some(Paragraph {
                text: String::new(),
                pure: true,
                nested: 0,
            });
        }
    }

    fn child_empty(&mut self) {
        if let Some(paragraph) = self.paragraph.as_mut() {
            paragraph.pure = false;
        }
    }

    fn child_end(&mut self, name: &[u8]) {
        if name != P {
            return;
        }
        let Some(paragraph) = self.paragraph.as_mut() else {
            return;
        };
        if paragraph.nested > 0 {
            paragraph.nested -= 1;
            return;
        }
        if let Some(paragraph) = self.paragraph.take()
            && paragraph.pure
            && !paragraph.text.trim().is_empty()
        {
            self.first_paragraph = Some(paragraph.text);
        }
    }

    fn push_text(&mut self, text: &str) {
        self.body.push_str(text);
        if let Some(paragraph) = self.paragraph.as_mut() {
            paragraph.text.push_str(text);
        }
    }

    fn finish(self) -> (TagAttributes, String) {
        let value = resolve_value(self.first_paragraph, &self.body);
        (self.attrs, value)
    }
}

/// Walks `text` with `quick-xml`, collecting one record per coded `TE`.
pub(super) fn extract(text: &str, strictness: Strictness) -> Result<Extraction> {
    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = strictness.is_strict();
    config.allow_unmatched_ends = !strictness.is_strict();

    let mut extraction = Extraction::default();
    let mut open: Option<OpenTag> = None;
    let mut depth = 0usize;
    let mut errors = 0usize;
    let mut last_error_at = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                let Strictness::Tolerant { error_budget } = strictness else {
                    return Err(XbrlError::Malformed {
                        position: reader.error_position(),
                        message: err.to_string(),
                    });
                };

                let resume_at = reader.buffer_position();
                if last_error_at == Some(resume_at) {
                    return Err(XbrlError::NoProgress {
                        position: resume_at,
                    });
                }
                errors += 1;
                if errors > error_budget {
                    return Err(XbrlError::ErrorBudgetExhausted { errors });
                }
                debug!(position = reader.error_position(), error = %err, "Skipping markup error");
                last_error_at = Some(resume_at);
                continue;
            }
        };

        match event {
            Event::Start(start) => {
                depth += 1;
                if let Some(tag) = open.as_mut() {
                    tag.child_start(start.name().as_ref());
                } else if start.name().as_ref() == TE {
                    let attrs = read_attributes(&start, strictness, reader.buffer_position())?;
                    extraction.open_tag(&attrs);
                    open = Some(OpenTag::new(attrs));
                }
            }
            Event::Empty(start) => {
                if let Some(tag) = open.as_mut() {
                    tag.child_empty();
                } else if start.name().as_ref() == TE {
                    let attrs = read_attributes(&start, strictness, reader.buffer_position())?;
                    extraction.open_tag(&attrs);
                    extraction.emit(attrs, String::new());
                }
            }
            Event::End(end) => {
                depth = depth.saturating_sub(1);
                if end.name().as_ref() == TE {
                    if let Some(tag) = open.take() {
                        let (attrs, value) = tag.finish();
                        extraction.emit(attrs, value);
                    }
                } else if let Some(tag) = open.as_mut() {
                    tag.child_end(end.name().as_ref());
                }
            }
            Event::Text(text) => {
                if let Some(tag) = open.as_mut() {
                    let text = read_text(&text, strictness, reader.buffer_position())?;
                    tag.push_text(&text);
                }
            }
            Event::CData(cdata) => {
                if let Some(tag) = open.as_mut() {
                    tag.push_text(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth > 0 {
        if strictness.is_strict() {
            return Err(XbrlError::Truncated {
                open_elements: depth,
            });
        }
        if let Some(tag) = open {
            debug!(code = ?tag.attrs.code, "Discarding unclosed tag at end of input");
        }
    }

    // A recovered error can swallow a tag into a neighbouring start tag.
    if !strictness.is_strict() {
        let expected = count_tag_openings(text);
        if extraction.stats.total_tags < expected {
            return Err(XbrlError::MissedTags {
                seen: extraction.stats.total_tags,
                expected,
            });
        }
    }

    Ok(extraction)
}

fn read_attributes(
    start: &BytesStart<'_>,
    strictness: Strictness,
    position: u64,
) -> Result<TagAttributes> {
    let mut attrs = TagAttributes::default();
    let mut iter = start.attributes();
    iter.with_checks(strictness.is_strict());

    for attr in iter {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) if strictness.is_strict() => {
                return Err(XbrlError::Malformed {
                    position,
                    message: err.to_string(),
                });
            }
            Err(_) => break,
        };

        let value = if strictness.is_strict() {
            attr.unescape_value()
                .map_err(|err| XbrlError::Malformed {
                    position,
                    message: err.to_string(),
                })?
                .into_owned()
        } else {
            unescape_lenient(&String::from_utf8_lossy(&attr.value)).into_owned()
        };
        attrs.set(attr.key.as_ref(), value);
    }

    Ok(attrs)
}

fn read_text(text: &BytesText<'_>, strictness: Strictness, position: u64) -> Result<String> {
    if strictness.is_strict() {
        text.unescape()
            .map(|text| text.into_owned())
            .map_err(|err| XbrlError::Malformed {
                position,
                message: err.to_string(),
            })
    } else {
        Ok(unescape_lenient(&String::from_utf8_lossy(text)).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(extraction: &Extraction) -> Vec<&str> {
        extraction
            .records
            .iter()
            .map(|r| r.raw_value.as_str())
            .collect()
    }

    #[test]
    fn test_paragraph_with_markup_falls_back_to_body() {
        let doc = r#"<TE ACODE="a"><P>1<SPAN>2</SPAN></P></TE>"#;
        let extraction = extract(doc, Strictness::Strict).unwrap();
        assert_eq!(values(&extraction), ["12"]);
    }

    #[test]
    fn test_first_non_blank_paragraph_wins() {
        let doc = r#"<TE ACODE="a"><P></P><P>7</P><P>8</P></TE>"#;
        let extraction = extract(doc, Strictness::Strict).unwrap();
        assert_eq!(values(&extraction), ["7"]);
    }

    #[test]
    fn test_self_closing_tag_has_empty_value() {
        let doc = r#"<R><TE ACODE="a" ACONTEXT="CFY2024eFY"/><TE ACODE="b">3</TE></R>"#;
        let extraction = extract(doc, Strictness::Strict).unwrap();
        assert_eq!(values(&extraction), ["", "3"]);
        assert_eq!(extraction.records[1].ordinal, 1);
    }

    #[test]
    fn test_strict_rejects_truncation() {
        let doc = r#"<R><TE ACODE="a">3</TE><TE ACODE="b">4"#;
        let err = extract(doc, Strictness::Strict).unwrap_err();
        assert!(matches!(err, XbrlError::Truncated { open_elements: 2 }));
    }

    #[test]
    fn test_tolerant_discards_unclosed_tail() {
        let doc = r#"<R><TE ACODE="a">3</TE><TE ACODE="b">4"#;
        let extraction = extract(doc, Strictness::Tolerant { error_budget: 8 }).unwrap();
        assert_eq!(values(&extraction), ["3"]);
        assert_eq!(extraction.stats.coded_tags, 2);
    }

    #[test]
    fn test_tolerant_resolves_html_entities() {
        let doc = r#"<TE ACODE="a"><P>&nbsp;1,000&nbsp;</P></TE>"#;
        assert!(extract(doc, Strictness::Strict).is_err());

        let extraction = extract(doc, Strictness::Tolerant { error_budget: 8 }).unwrap();
        assert_eq!(values(&extraction), ["1,000"]);
    }

    #[test]
    fn test_tolerant_rejects_swallowed_tag() {
        let doc = r#"<R><TR <TE ACODE="a"><P>1</P></TE><TE ACODE="b">2</TE></TR></R>"#;
        let err = extract(doc, Strictness::Tolerant { error_budget: 8 }).unwrap_err();
        assert!(matches!(
            err,
            XbrlError::MissedTags {
                seen: 1,
                expected: 2
            }
        ));
    }

    #[test]
    fn test_tolerant_ignores_stray_end_tags() {
        let doc = r#"</X><R><TE ACODE="a">5</TE></Y></R>"#;
        assert!(extract(doc, Strictness::Strict).is_err());

        let extraction = extract(doc, Strictness::Tolerant { error_budget: 8 }).unwrap();
        assert_eq!(values(&extraction), ["5"]);
    }
}
