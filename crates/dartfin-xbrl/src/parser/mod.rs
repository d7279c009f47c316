//! Three-tier structural parser for DART filing documents.
//!
//! A filing body is nominally XML, but real documents contain stray tokens,
//! HTML entities, truncated tails and encoding glitches. The parser tries an
//! ordered list of strategies and keeps the first one that succeeds:
//!
//! 1. [`ParseTier::Strict`]: well-formed UTF-8 markup, end names checked.
//! 2. [`ParseTier::Tolerant`]: lossy decode, recoverable reader errors skipped.
//! 3. [`ParseTier::Pattern`]: regex scan over `<TE ...>...</TE>` blocks.
//!
//! Every strategy extracts the same `ACODE`/`ACONTEXT`/`ADECIMAL` attributes
//! and applies the same value rule: the text of the first nested `<P>` that
//! holds only non-blank text, else the element's text with markup stripped.

mod events;
mod pattern;

use crate::code::{CodeIndex, TagRecord};
use crate::document::{RawDocument, is_annual_report_body};
use crate::error::{Result, XbrlError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use tracing::{debug, warn};

/// Strategy that produced a [`ParsedDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseTier {
    /// Well-formed markup
    Strict,
    /// Markup reader skipping recoverable errors
    Tolerant,
    /// Textual pattern scan
    Pattern,
    /// Every strategy failed
    Unparsed,
}

impl ParseTier {
    /// Full fallback order.
    pub const FALLBACK_ORDER: [Self; 3] = [Self::Strict, Self::Tolerant, Self::Pattern];

    /// Short lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Tolerant => "tolerant",
            Self::Pattern => "pattern",
            Self::Unparsed => "unparsed",
        }
    }
}

impl fmt::Display for ParseTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters reported by the tier that produced the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// `TE` elements discovered
    pub total_tags: usize,
    /// `TE` elements carrying an `ACODE`
    pub coded_tags: usize,
}

/// A strategy that gave up, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierFailure {
    /// Strategy that failed
    pub tier: ParseTier,
    /// Error message
    pub reason: String,
}

/// Parser output: the code index plus how it was obtained.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Normalized code to records, document order preserved
    pub index: CodeIndex,
    /// Strategy that produced the index
    pub tier: ParseTier,
    /// Tag counters
    pub stats: ParseStats,
    /// Strategies attempted before `tier`
    pub failures: Vec<TierFailure>,
}

impl ParsedDocument {
    fn unparsed(failures: Vec<TierFailure>) -> Self {
        Self {
            index: CodeIndex::new(),
            tier: ParseTier::Unparsed,
            stats: ParseStats::default(),
            failures,
        }
    }
}

/// Parser settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Go straight to the pattern scan when the annual report markers are
    /// textually present
    pub shortcut_on_marker: bool,

    /// Recoverable errors the tolerant reader may skip before giving up
    pub tolerant_error_budget: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            shortcut_on_marker: false,
            tolerant_error_budget: 64,
        }
    }
}

/// Converts filing bytes into a [`CodeIndex`] with tiered fallback.
#[derive(Debug, Clone, Default)]
pub struct StructuralParser {
    config: ParserConfig,
}

impl StructuralParser {
    /// Creates a parser with the given settings.
    pub const fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Returns the parser settings.
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Strategies that will be attempted for `bytes`, in order.
    pub fn plan(&self, bytes: &[u8]) -> &'static [ParseTier] {
        if self.config.shortcut_on_marker && is_annual_report_body(bytes) {
            &ParseTier::FALLBACK_ORDER[2..]
        } else {
            &ParseTier::FALLBACK_ORDER
        }
    }

    /// Parses a document. Never fails; see [`ParsedDocument::tier`].
    pub fn parse(&self, document: &RawDocument) -> ParsedDocument {
        self.parse_bytes(&document.bytes)
    }

    /// Parses raw bytes. Never fails; see [`ParsedDocument::tier`].
    pub fn parse_bytes(&self, bytes: &[u8]) -> ParsedDocument {
        let mut failures = Vec::new();

        for &tier in self.plan(bytes) {
            match self.extract(tier, bytes) {
                Ok(extraction) => {
                    debug!(
                        %tier,
                        total_tags = extraction.stats.total_tags,
                        coded_tags = extraction.stats.coded_tags,
                        "Parse tier succeeded"
                    );
                    return extraction.into_document(tier, failures);
                }
                Err(err) => {
                    warn!(%tier, error = %err, "Parse tier failed, falling back");
                    failures.push(TierFailure {
                        tier,
                        reason: err.to_string(),
                    });
                }
            }
        }

        warn!(attempts = failures.len(), "Every parse tier failed");
        ParsedDocument::unparsed(failures)
    }

    /// Runs a single strategy without fallback.
    pub fn parse_with(&self, tier: ParseTier, bytes: &[u8]) -> Result<ParsedDocument> {
        self.extract(tier, bytes)
            .map(|extraction| extraction.into_document(tier, Vec::new()))
    }

    fn extract(&self, tier: ParseTier, bytes: &[u8]) -> Result<Extraction> {
        match tier {
            ParseTier::Strict => {
                let text = std::str::from_utf8(bytes).map_err(|e| XbrlError::InvalidUtf8 {
                    valid_up_to: e.valid_up_to(),
                })?;
                events::extract(strip_bom(text), events::Strictness::Strict)
            }
            ParseTier::Tolerant => {
                let text = String::from_utf8_lossy(bytes);
                events::extract(
                    strip_bom(&text),
                    events::Strictness::Tolerant {
                        error_budget: self.config.tolerant_error_budget,
                    },
                )
            }
            ParseTier::Pattern => pattern::extract(strip_bom(&String::from_utf8_lossy(bytes))),
            ParseTier::Unparsed => Ok(Extraction::default()),
        }
    }
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Attributes of one `TE` element.
#[derive(Debug, Default)]
struct TagAttributes {
    code: Option<String>,
    context_ref: Option<String>,
    decimal: Option<String>,
}

impl TagAttributes {
    fn set(&mut self, key: &[u8], value: String) {
        match key {
            b"ACODE" => {
                let code = value.trim();
                self.code = (!code.is_empty()).then(|| code.to_string());
            }
            b"ACONTEXT" => self.context_ref = Some(value.trim().to_string()),
            b"ADECIMAL" => self.decimal = Some(value),
            _ => {}
        }
    }

    const fn is_coded(&self) -> bool {
        self.code.is_some()
    }
}

/// Records and counters accumulated by one strategy.
#[derive(Debug, Default)]
struct Extraction {
    records: Vec<TagRecord>,
    stats: ParseStats,
}

impl Extraction {
    fn open_tag(&mut self, attrs: &TagAttributes) {
        self.stats.total_tags += 1;
        if attrs.is_coded() {
            self.stats.coded_tags += 1;
        }
    }

    fn emit(&mut self, attrs: TagAttributes, value: String) {
        let Some(code) = attrs.code else {
            return;
        };
        let ordinal = self.records.len();
        self.records.push(TagRecord {
            code,
            context_ref: attrs.context_ref.unwrap_or_default(),
            decimal_scale: TagRecord::parse_decimal_scale(attrs.decimal.as_deref()),
            raw_value: value,
            ordinal,
        });
    }

    fn into_document(self, tier: ParseTier, failures: Vec<TierFailure>) -> ParsedDocument {
        ParsedDocument {
            index: self.records.into_iter().collect(),
            tier,
            stats: self.stats,
            failures,
        }
    }
}

/// Picks the displayed value: first non-blank paragraph, else the stripped body.
fn resolve_value(first_paragraph: Option<String>, body: &str) -> String {
    first_paragraph.map_or_else(|| body.trim().to_string(), |p| p.trim().to_string())
}

/// Counts `<TE` openings by plain text search, ignoring longer element names
/// such as `<TEXT`.
fn count_tag_openings(text: &str) -> usize {
    text.match_indices("<TE")
        .filter(|(at, open)| {
            text[at + open.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_whitespace() || c == '>' || c == '/')
        })
        .count()
}

/// Resolves XML and common HTML entities, keeping the raw text when an
/// entity is unknown.
fn unescape_lenient(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape_with(raw, |entity| {
        quick_xml::escape::resolve_predefined_entity(entity).or(match entity {
            "nbsp" => Some(" "),
            _ => None,
        })
    })
    .unwrap_or(Cow::Borrowed(raw))
}
