//! Integration tests for tiered parsing and context filtering

use dartfin_xbrl::{
    ContextClassifier, EligibilityPolicy, ParseTier, ParserConfig, RawDocument, StructuralParser,
};

const CONSOLIDATED: &str =
    "_ifrs-full_ConsolidatedAndSeparateFinancialStatementsAxis_ifrs-full_ConsolidatedMember";

/// Builds a filing body with a balance sheet, an income statement and a
/// quarterly note, each row reported for the current and prior year.
fn sample_filing() -> String {
    let balance_sheet = [
        ("ifrs-full_CashAndCashEquivalents", "1,000", "900"),
        ("ifrs-full_Equity", "2,207,290", "2,000,000"),
        ("dart_ShortTermBorrowings", "300", "-"),
        ("ifrs-full_LeaseLiabilities", "45", "40"),
    ];
    let income_statement = [
        ("ifrs-full_FinanceCosts", "(12)", "10"),
        ("ifrs-full_CashFlowsFromUsedInOperatingActivities", "5,500", "5,100"),
    ];

    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<DOCUMENT>\n<DOCUMENT-NAME ACODE=\"11011\">사업보고서</DOCUMENT-NAME>\n<BODY>\n",
    );
    body.push_str("<TABLE><TR><TE>과목</TE><TE>당기</TE><TE>전기</TE></TR>\n");
    for (code, current, prior) in balance_sheet {
        body.push_str(&format!(
            "<TR><TE ACODE=\"{code}\" ACONTEXT=\"CFY2024eFY{CONSOLIDATED}\" ADECIMAL=\"-6\"><P>{current}</P></TE>\
             <TE ACODE=\"{code}\" ACONTEXT=\"PFY2023eFY{CONSOLIDATED}\" ADECIMAL=\"-6\"><P>{prior}</P></TE></TR>\n"
        ));
    }
    for (code, current, prior) in income_statement {
        body.push_str(&format!(
            "<TR><TE ACODE=\"{code}\" ACONTEXT=\"CFY2024dFY{CONSOLIDATED}\" ADECIMAL=\"-6\"><P>{current}</P></TE>\
             <TE ACODE=\"{code}\" ACONTEXT=\"PFY2023dFY{CONSOLIDATED}\" ADECIMAL=\"-6\"><P>{prior}</P></TE></TR>\n"
        ));
    }
    body.push_str(
        "<TR><TE ACODE=\"ifrs-full_Revenue\" ACONTEXT=\"CFY2024dQ4\" ADECIMAL=\"-6\"><P>77</P></TE></TR>\n",
    );
    body.push_str("</TABLE>\n</BODY>\n</DOCUMENT>\n");
    body
}

#[test]
fn test_strict_and_pattern_tiers_agree() {
    let parser = StructuralParser::default();
    let filing = sample_filing();

    let strict = parser
        .parse_with(ParseTier::Strict, filing.as_bytes())
        .unwrap();
    let pattern = parser
        .parse_with(ParseTier::Pattern, filing.as_bytes())
        .unwrap();

    assert_eq!(strict.stats.total_tags, 16);
    assert_eq!(strict.stats.coded_tags, 13);
    assert_eq!(strict.index, pattern.index);
    assert_eq!(strict.stats, pattern.stats);
}

#[test]
fn test_single_malformed_location_still_yields_index() {
    let filing = sample_filing().replacen(
        "<TR><TE ACODE=\"ifrs-full_Equity\"",
        "<TR <TE ACODE=\"ifrs-full_Equity\"",
        1,
    );
    let document = RawDocument::new("00126380", 2024, filing);

    let parsed = StructuralParser::default().parse(&document);

    // The reader folds the first equity tag into the broken row tag, so only
    // the pattern scan sees every element.
    assert_eq!(parsed.tier, ParseTier::Pattern);
    assert_eq!(parsed.failures.len(), 2);
    assert_eq!(parsed.stats.total_tags, 16);
    assert_eq!(parsed.stats.coded_tags, 13);
    assert!(!parsed.index.get_code("ifrs-full_CashAndCashEquivalents").is_empty());

    let equity = parsed.index.get_code("ifrs-full_Equity");
    assert_eq!(equity.len(), 2);
    assert_eq!(equity[0].raw_value, "2,207,290");
    assert!(equity[0].context_ref.starts_with("CFY2024eFY"));
}

#[test]
fn test_truncated_document_keeps_leading_tags() {
    let filing = sample_filing();
    let cut = filing.find("ifrs-full_FinanceCosts").unwrap();
    let document = RawDocument::new("00126380", 2024, &filing.as_bytes()[..cut]);

    let parsed = StructuralParser::default().parse(&document);

    assert!(matches!(
        parsed.tier,
        ParseTier::Tolerant | ParseTier::Pattern
    ));
    assert_eq!(parsed.index.get_code("ifrs-full_Equity").len(), 2);
    assert!(parsed.index.get_code("ifrs-full_FinanceCosts").is_empty());
}

#[test]
fn test_point_in_time_eligibility_grows_index() {
    let parsed = StructuralParser::default().parse_bytes(sample_filing().as_bytes());
    let classifier = ContextClassifier::new();

    let (duration_only, duration_stats) =
        parsed
            .index
            .filter_eligible(&classifier, 2024, &EligibilityPolicy::duration_only());
    let (both, both_stats) =
        parsed
            .index
            .filter_eligible(&classifier, 2024, &EligibilityPolicy::default());

    assert_eq!(duration_stats.code_index_size, 2);
    assert_eq!(duration_stats.eligible_tags, 2);
    assert_eq!(both_stats.code_index_size, 6);
    assert_eq!(both_stats.eligible_tags, 6);
    assert!(both.len() > duration_only.len());
    assert_eq!(both_stats.eligible_tags + both_stats.rejected_tags, 13);
}

#[test]
fn test_shortcut_skips_markup_tiers() {
    let parser = StructuralParser::new(ParserConfig {
        shortcut_on_marker: true,
        ..ParserConfig::default()
    });
    let parsed = parser.parse_bytes(sample_filing().as_bytes());

    assert_eq!(parsed.tier, ParseTier::Pattern);
    assert_eq!(parsed.index.record_count(), 13);
}
