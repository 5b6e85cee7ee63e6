pub mod expr;

pub use expr::{FilterExpr, FilterTerm};

/// Parse `raw` and evaluate it against `values` in one step.
///
/// Parsing is cheap enough that views call this per row instead of caching
/// the compiled expression.
pub fn matches(raw: &str, values: &[&str]) -> bool {
    FilterExpr::parse(raw).matches(values)
}
