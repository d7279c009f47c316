//! Classification of `ACONTEXT` references.
//!
//! DART context references lead with a period token such as `CFY2024dFY`:
//! a relation prefix (`CFY` current, `PFY` prior, `BPFY` before prior), the
//! four-digit fiscal year, and a period-kind token. `dFY` marks a duration
//! over the whole fiscal year (income and cash-flow statements), `eFY` marks
//! the fiscal year end (balance sheet). Quarter and half-year tokens such as
//! `dQ3` or `e3Q` are never eligible. Dimension members follow, separated by
//! `_`, for example `..._ifrs-full_ConsolidatedMember`.

use serde::{Deserialize, Serialize};

/// Period kind carried by a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodKind {
    /// Accumulated over the fiscal year (flow items)
    Duration,
    /// As of fiscal year end (stock items)
    PointInTime,
    /// Quarter-scoped, half-year or unrecognized
    Unknown,
}

/// Which reporting period a context refers to, relative to the filing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodRelation {
    /// `CFY`
    Current,
    /// `PFY`
    Prior,
    /// `BPFY`
    BeforePrior,
}

/// Consolidated or separate statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementScope {
    /// `ConsolidatedMember`
    Consolidated,
    /// `SeparateMember`
    Separate,
    /// No statement member present
    Unspecified,
}

/// Result of classifying one context reference against a target fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextKind {
    /// Period kind
    pub period: PeriodKind,
    /// Whether the embedded fiscal year equals the target
    pub matches_target_year: bool,
    /// Embedded fiscal year, if a period token was found
    pub fiscal_year: Option<i32>,
    /// Relation prefix, if a period token was found
    pub relation: Option<PeriodRelation>,
    /// Statement scope from the dimension members
    pub scope: StatementScope,
}

impl ContextKind {
    const fn unknown(scope: StatementScope) -> Self {
        Self {
            period: PeriodKind::Unknown,
            matches_target_year: false,
            fiscal_year: None,
            relation: None,
            scope,
        }
    }

    /// Returns true for a full-year duration in the target year.
    pub fn is_duration_match(&self) -> bool {
        self.period == PeriodKind::Duration && self.matches_target_year
    }

    /// Returns true for a fiscal-year-end instant in the target year.
    pub fn is_point_in_time_match(&self) -> bool {
        self.period == PeriodKind::PointInTime && self.matches_target_year
    }
}

/// Which classified contexts may feed indicator resolution.
///
/// Both period kinds are accepted by default. Dropping point-in-time loses
/// every balance-sheet item; dropping duration loses the income and cash-flow
/// statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityPolicy {
    /// Accept full-year duration contexts
    pub duration: bool,
    /// Accept fiscal-year-end contexts
    pub point_in_time: bool,
    /// Additionally require a consolidated or separate statement member
    pub require_statement_member: bool,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            duration: true,
            point_in_time: true,
            require_statement_member: false,
        }
    }
}

impl EligibilityPolicy {
    /// Policy accepting only duration contexts.
    pub const fn duration_only() -> Self {
        Self {
            duration: true,
            point_in_time: false,
            require_statement_member: false,
        }
    }

    /// Returns true if a record with this context may be resolved.
    pub fn is_eligible(&self, kind: &ContextKind) -> bool {
        let period_ok = (self.duration && kind.is_duration_match())
            || (self.point_in_time && kind.is_point_in_time_match());
        let scope_ok =
            !self.require_statement_member || kind.scope != StatementScope::Unspecified;
        period_ok && scope_ok
    }
}

/// Stateless classifier for DART context references.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextClassifier;

impl ContextClassifier {
    /// Creates a classifier.
    pub const fn new() -> Self {
        Self
    }

    /// Classifies `context_ref` against `target_fiscal_year`.
    pub fn classify(&self, context_ref: &str, target_fiscal_year: i32) -> ContextKind {
        let scope = statement_scope(context_ref);

        let Some((relation, fiscal_year, period)) =
            context_ref.split('_').find_map(parse_period_token)
        else {
            return ContextKind::unknown(scope);
        };

        ContextKind {
            period,
            matches_target_year: fiscal_year == target_fiscal_year,
            fiscal_year: Some(fiscal_year),
            relation: Some(relation),
            scope,
        }
    }
}

fn statement_scope(context_ref: &str) -> StatementScope {
    if context_ref.contains("ConsolidatedMember") {
        StatementScope::Consolidated
    } else if context_ref.contains("SeparateMember") {
        StatementScope::Separate
    } else {
        StatementScope::Unspecified
    }
}

/// Parses a segment like `CFY2024dFY` into relation, year and period kind.
fn parse_period_token(segment: &str) -> Option<(PeriodRelation, i32, PeriodKind)> {
    let (relation, rest) = if let Some(rest) = segment.strip_prefix("BPFY") {
        (PeriodRelation::BeforePrior, rest)
    } else if let Some(rest) = segment.strip_prefix("CFY") {
        (PeriodRelation::Current, rest)
    } else if let Some(rest) = segment.strip_prefix("PFY") {
        (PeriodRelation::Prior, rest)
    } else {
        return None;
    };

    let digits = rest.get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let fiscal_year = digits.parse().ok()?;

    let period = match &rest[4..] {
        "dFY" => PeriodKind::Duration,
        "eFY" => PeriodKind::PointInTime,
        _ => PeriodKind::Unknown,
    };

    Some((relation, fiscal_year, period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const CONSOLIDATED: &str =
        "_ifrs-full_ConsolidatedAndSeparateFinancialStatementsAxis_ifrs-full_ConsolidatedMember";

    #[rstest]
    #[case("CFY2024dFY", PeriodKind::Duration, true)]
    #[case("CFY2024eFY", PeriodKind::PointInTime, true)]
    #[case("PFY2023eFY", PeriodKind::PointInTime, false)]
    #[case("CFY2024dQ3", PeriodKind::Unknown, true)]
    #[case("CFY2024e3Q", PeriodKind::Unknown, true)]
    #[case("CFY2024dH1", PeriodKind::Unknown, true)]
    #[case("CFY2025dFY", PeriodKind::Duration, false)]
    fn test_classify_period(
        #[case] token: &str,
        #[case] period: PeriodKind,
        #[case] matches: bool,
    ) {
        let classifier = ContextClassifier::new();
        let kind = classifier.classify(&format!("{token}{CONSOLIDATED}"), 2024);
        assert_eq!(kind.period, period);
        assert_eq!(kind.matches_target_year, matches);
        assert_eq!(kind.scope, StatementScope::Consolidated);
    }

    #[test]
    fn test_relation_prefixes() {
        let classifier = ContextClassifier::new();
        assert_eq!(
            classifier.classify("BPFY2022eFY", 2022).relation,
            Some(PeriodRelation::BeforePrior)
        );
        assert_eq!(
            classifier.classify("PFY2023dFY", 2023).relation,
            Some(PeriodRelation::Prior)
        );
        assert_eq!(
            classifier.classify("CFY2024dFY", 2024).relation,
            Some(PeriodRelation::Current)
        );
    }

    #[rstest]
    #[case("")]
    #[case("FY2024dFY")]
    #[case("CFY20x4dFY")]
    #[case("CFY24")]
    #[case("ifrs-full_ConsolidatedMember")]
    fn test_unrecognized_contexts_are_unknown(#[case] context: &str) {
        let kind = ContextClassifier::new().classify(context, 2024);
        assert_eq!(kind.period, PeriodKind::Unknown);
        assert!(!kind.matches_target_year);
        assert_eq!(kind.fiscal_year, None);
    }

    #[test]
    fn test_scope_detection() {
        let classifier = ContextClassifier::new();
        assert_eq!(
            classifier
                .classify("CFY2024eFY_ifrs-full_SeparateMember", 2024)
                .scope,
            StatementScope::Separate
        );
        assert_eq!(
            classifier.classify("CFY2024eFY", 2024).scope,
            StatementScope::Unspecified
        );
    }

    #[test]
    fn test_default_policy_accepts_both_period_kinds() {
        let classifier = ContextClassifier::new();
        let policy = EligibilityPolicy::default();

        assert!(policy.is_eligible(&classifier.classify("CFY2024dFY", 2024)));
        assert!(policy.is_eligible(&classifier.classify("CFY2024eFY", 2024)));
        assert!(!policy.is_eligible(&classifier.classify("CFY2024dQ3", 2024)));
        assert!(!policy.is_eligible(&classifier.classify("PFY2023eFY", 2024)));
        assert!(!policy.is_eligible(&classifier.classify("CFY2024", 2024)));
    }

    #[test]
    fn test_duration_only_policy_drops_balance_sheet() {
        let classifier = ContextClassifier::new();
        let policy = EligibilityPolicy::duration_only();

        assert!(policy.is_eligible(&classifier.classify("CFY2024dFY", 2024)));
        assert!(!policy.is_eligible(&classifier.classify("CFY2024eFY", 2024)));
    }

    #[test]
    fn test_statement_member_requirement() {
        let classifier = ContextClassifier::new();
        let policy = EligibilityPolicy {
            require_statement_member: true,
            ..EligibilityPolicy::default()
        };

        assert!(!policy.is_eligible(&classifier.classify("CFY2024eFY", 2024)));
        assert!(policy.is_eligible(
            &classifier.classify(&format!("CFY2024eFY{CONSOLIDATED}"), 2024)
        ));
    }
}
