//! Compact depth-range grammar for `valid_depths` rules.
//!
//! A depth list is a comma-separated string of tokens:
//!
//! - `0`: valid at every depth
//! - `5`: valid only at depth 5
//! - `-5`: valid at depths up to and including 5
//! - `5+`: valid at depth 5 and deeper
//! - `3-7`: valid between depths 3 and 7 inclusive (`3-0` means `3+`)
//!
//! Malformed tokens are logged and skipped so one bad entry cannot take the
//! whole catalog down.

use log::warn;

/// A single parsed depth constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthSpec {
    /// Valid at every depth.
    All,
    /// Valid at exactly this depth.
    Exactly(i32),
    /// Valid at this depth and shallower.
    AtMost(i32),
    /// Valid at this depth and deeper.
    AtLeast(i32),
    /// Valid inside this inclusive range.
    Between(i32, i32),
}

impl DepthSpec {
    /// Whether `depth` satisfies this constraint.
    pub fn matches(self, depth: i32) -> bool {
        match self {
            DepthSpec::All => true,
            DepthSpec::Exactly(n) => depth == n,
            DepthSpec::AtMost(n) => depth <= n,
            DepthSpec::AtLeast(n) => depth >= n,
            DepthSpec::Between(a, b) => depth >= a && depth <= b,
        }
    }
}

/// Parses a comma-separated depth list. Malformed tokens are skipped with a
/// warning.
pub fn parse_depth_list(list: &str) -> Vec<DepthSpec> {
    let mut specs = Vec::new();
    for token in list.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match parse_token(token) {
            Some(spec) => specs.push(spec),
            None => warn!("Skipping malformed depth token '{}'", token),
        }
    }
    specs
}

fn parse_token(token: &str) -> Option<DepthSpec> {
    if token == "0" {
        return Some(DepthSpec::All);
    }
    if let Some(rest) = token.strip_prefix('-') {
        return rest.parse().ok().map(DepthSpec::AtMost);
    }
    if let Some(rest) = token.strip_suffix('+') {
        return rest.parse().ok().map(DepthSpec::AtLeast);
    }
    if let Some((lo, hi)) = token.split_once('-') {
        let lo: i32 = lo.parse().ok()?;
        let hi: i32 = hi.parse().ok()?;
        // An open-ended upper bound is written as "N-0".
        if hi == 0 {
            return Some(DepthSpec::AtLeast(lo));
        }
        return Some(DepthSpec::Between(lo, hi));
    }
    token.parse().ok().map(DepthSpec::Exactly)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all() {
        assert_eq!(parse_depth_list("0"), vec![DepthSpec::All]);
        assert!(DepthSpec::All.matches(1));
        assert!(DepthSpec::All.matches(99));
    }

    #[test]
    fn test_parse_single_and_bounds() {
        assert_eq!(parse_depth_list("5"), vec![DepthSpec::Exactly(5)]);
        assert_eq!(parse_depth_list("-3"), vec![DepthSpec::AtMost(3)]);
        assert_eq!(parse_depth_list("4+"), vec![DepthSpec::AtLeast(4)]);
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_depth_list("3-7"), vec![DepthSpec::Between(3, 7)]);
        assert_eq!(parse_depth_list("3-0"), vec![DepthSpec::AtLeast(3)]);
        let spec = DepthSpec::Between(3, 7);
        assert!(!spec.matches(2));
        assert!(spec.matches(3));
        assert!(spec.matches(7));
        assert!(!spec.matches(8));
    }

    #[test]
    fn test_parse_list_skips_malformed() {
        let specs = parse_depth_list("1, bogus, 4+, x-y");
        assert_eq!(specs, vec![DepthSpec::Exactly(1), DepthSpec::AtLeast(4)]);
    }
}
