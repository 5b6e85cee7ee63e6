//! Filter expression language used to post-filter search results.
//!
//! ## Syntax
//! ```text
//! compute prod|live -test
//! ```
//!
//! - Whitespace separates terms; every term must pass (AND).
//! - `|` separates alternatives inside a term; any may match (OR).
//! - A leading `-` negates the term; a bare `-` is ignored.
//!
//! Matching is case-insensitive substring containment against any of the
//! supplied values. There is no escaping, and parsing never fails: malformed
//! input simply yields fewer terms.

/// A single AND-ed term of a filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTerm {
    /// Lower-cased alternatives, never empty.
    pub alternatives: Vec<String>,
    /// Whether a match on this term excludes the row.
    pub negate: bool,
}

impl FilterTerm {
    fn parse(token: &str) -> Option<Self> {
        if token == "-" {
            return None;
        }

        let (negate, body) = match token.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, token),
        };

        let alternatives: Vec<String> = body
            .split('|')
            .filter(|alt| !alt.is_empty())
            .map(str::to_lowercase)
            .collect();

        if alternatives.is_empty() {
            return None;
        }

        Some(Self {
            alternatives,
            negate,
        })
    }

    /// True if any alternative is contained in any of the (lower-cased) values.
    fn found_in(&self, values: &[String]) -> bool {
        self.alternatives
            .iter()
            .any(|alt| values.iter().any(|value| value.contains(alt.as_str())))
    }
}

/// Parsed filter expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterExpr {
    terms: Vec<FilterTerm>,
}

impl FilterExpr {
    /// Parse a raw filter string. Never fails.
    pub fn parse(raw: &str) -> Self {
        Self {
            terms: raw.split_whitespace().filter_map(FilterTerm::parse).collect(),
        }
    }

    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    /// An empty expression matches everything.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate the expression against a row of values.
    pub fn matches(&self, values: &[&str]) -> bool {
        if self.terms.is_empty() {
            return true;
        }

        let lowered: Vec<String> = values.iter().map(|v| v.to_lowercase()).collect();

        self.terms
            .iter()
            .all(|term| term.found_in(&lowered) != term.negate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alternatives(expr: &FilterExpr, idx: usize) -> Vec<&str> {
        expr.terms()[idx]
            .alternatives
            .iter()
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn test_empty_and_whitespace_have_no_terms() {
        assert!(FilterExpr::parse("").is_empty());
        assert!(FilterExpr::parse("   ").is_empty());
        assert!(FilterExpr::parse("\t \n").is_empty());
    }

    #[test]
    fn test_empty_expression_matches_everything() {
        let expr = FilterExpr::parse("   ");
        assert!(expr.matches(&[]));
        assert!(expr.matches(&["anything", "at all"]));
    }

    #[test]
    fn test_bare_dash_is_dropped() {
        assert!(FilterExpr::parse("-").is_empty());
        assert_eq!(FilterExpr::parse("- web").terms().len(), 1);
    }

    #[test]
    fn test_trailing_pipe_dropped() {
        let expr = FilterExpr::parse("web|");
        assert_eq!(expr.terms().len(), 1);
        assert_eq!(alternatives(&expr, 0), vec!["web"]);
    }

    #[test]
    fn test_all_empty_alternatives_drops_term() {
        assert!(FilterExpr::parse("|").is_empty());
        assert!(FilterExpr::parse("-||").is_empty());
    }

    #[test]
    fn test_negated_term() {
        let expr = FilterExpr::parse("-dev");
        assert_eq!(expr.terms().len(), 1);
        assert!(expr.terms()[0].negate);
        assert_eq!(alternatives(&expr, 0), vec!["dev"]);
    }

    #[test]
    fn test_alternatives_are_lowercased() {
        let expr = FilterExpr::parse("Web|API");
        assert_eq!(alternatives(&expr, 0), vec!["web", "api"]);
    }

    #[test]
    fn test_negation_is_case_insensitive() {
        let expr = FilterExpr::parse("-DEV");
        assert!(!expr.matches(&["my-dev-server"]));
        assert!(expr.matches(&["my-prod-server"]));
    }

    #[test]
    fn test_and_semantics() {
        let expr = FilterExpr::parse("compute -dev");
        assert!(expr.matches(&["compute.instance", "prod-vm", "us-central1"]));
        assert!(!expr.matches(&["compute.instance", "dev-vm"]));
    }

    #[test]
    fn test_or_semantics() {
        assert!(FilterExpr::parse("web|api|db").matches(&["db-server"]));
        assert!(!FilterExpr::parse("web|api").matches(&["mail-server"]));
    }

    #[test]
    fn test_negated_term_wins_over_positive_matches() {
        let expr = FilterExpr::parse("compute prod|live -test");
        assert!(!expr.matches(&["compute.instance", "prod-test-vm", "us-central1"]));
        assert!(expr.matches(&["compute.instance", "live-vm", "us-central1"]));
    }

    #[test]
    fn test_substring_not_anchored() {
        let expr = FilterExpr::parse("central");
        assert!(expr.matches(&["us-central1-a"]));
    }

    #[test]
    fn test_term_matches_across_values() {
        // Each term may be satisfied by a different value.
        let expr = FilterExpr::parse("vpn europe");
        assert!(expr.matches(&["compute.vpnTunnel", "tunnel-1", "europe-west1"]));
    }

    #[test]
    fn test_non_empty_expression_against_no_values() {
        assert!(!FilterExpr::parse("web").matches(&[]));
        assert!(FilterExpr::parse("-web").matches(&[]));
    }

    #[test]
    fn test_helper_reparses() {
        assert!(crate::filter::matches("WEB", &["web-1"]));
        assert!(!crate::filter::matches("-web", &["web-1"]));
    }
}
