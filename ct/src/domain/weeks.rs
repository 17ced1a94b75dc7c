//! Week specification parsing
//!
//! Turns the `weeks` notation used in schedule entries into a concrete set of
//! week numbers. Recognized tokens, separated by `,` or `，`:
//!
//! - `n-m(单)` odd weeks in `[n, m]`
//! - `n-m(双)` even weeks in `[n, m]`
//! - `n-m` every week in `[n, m]`
//! - `n` a single week
//!
//! Anything else is dropped without error.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Largest week number accepted in a token
pub const MAX_WEEK: u32 = 100;

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*-\s*(\d+)\s*(?:[(（]\s*([单双])\s*[)）])?$").expect("week range pattern is valid")
});

static SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)$").expect("single week pattern is valid"));

/// Which weeks of a range a token selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    All,
    Odd,
    Even,
}

impl Parity {
    fn admits(self, week: u32) -> bool {
        match self {
            Parity::All => true,
            Parity::Odd => week % 2 == 1,
            Parity::Even => week % 2 == 0,
        }
    }
}

/// A deduplicated set of week numbers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekSet(BTreeSet<u32>);

impl WeekSet {
    /// Parse a week specification, skipping tokens that do not match
    pub fn parse(spec: &str) -> Self {
        debug!(%spec, "WeekSet::parse: called");
        let mut weeks = BTreeSet::new();

        for token in spec.split([',', '，']).map(str::trim).filter(|t| !t.is_empty()) {
            match parse_token(token) {
                Some((start, end, parity)) => {
                    weeks.extend((start..=end).filter(|w| *w >= 1 && parity.admits(*w)));
                }
                None => {
                    debug!(%token, "WeekSet::parse: dropping malformed token");
                }
            }
        }

        Self(weeks)
    }

    pub fn contains(&self, week: u32) -> bool {
        self.0.contains(&week)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weeks in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn max(&self) -> Option<u32> {
        self.0.last().copied()
    }
}

impl FromIterator<u32> for WeekSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for WeekSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        write!(f, "{}", joined)
    }
}

/// Parse one token into an inclusive range and parity filter
fn parse_token(token: &str) -> Option<(u32, u32, Parity)> {
    if let Some(caps) = SINGLE_RE.captures(token) {
        let week = bounded(&caps[1])?;
        return Some((week, week, Parity::All));
    }

    let caps = RANGE_RE.captures(token)?;
    let start = bounded(&caps[1])?;
    let end = bounded(&caps[2])?;
    let parity = match caps.get(3).map(|m| m.as_str()) {
        Some("单") => Parity::Odd,
        Some("双") => Parity::Even,
        _ => Parity::All,
    };
    Some((start, end, parity))
}

fn bounded(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok().filter(|n| *n <= MAX_WEEK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn weeks(spec: &str) -> Vec<u32> {
        WeekSet::parse(spec).iter().collect()
    }

    #[test]
    fn test_continuous_range() {
        assert_eq!(weeks("1-16"), (1..=16).collect::<Vec<_>>());
    }

    #[test]
    fn test_odd_range() {
        assert_eq!(weeks("1-8(单)"), vec![1, 3, 5, 7]);
    }

    #[test]
    fn test_even_range() {
        assert_eq!(weeks("2-8(双)"), vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_parity_range_with_opposite_start() {
        assert_eq!(weeks("2-9(单)"), vec![3, 5, 7, 9]);
        assert_eq!(weeks("1-7(双)"), vec![2, 4, 6]);
    }

    #[test]
    fn test_fullwidth_parentheses() {
        assert_eq!(weeks("1-8（单）"), vec![1, 3, 5, 7]);
    }

    #[test]
    fn test_explicit_list() {
        assert_eq!(weeks("1,3,5,7"), vec![1, 3, 5, 7]);
    }

    #[test]
    fn test_chinese_comma_and_mixed_tokens() {
        assert_eq!(weeks("1-3，6,9-12(双)"), vec![1, 2, 3, 6, 10, 12]);
    }

    #[test]
    fn test_invalid_inputs_are_empty() {
        assert!(WeekSet::parse("abc").is_empty());
        assert!(WeekSet::parse("").is_empty());
        assert!(WeekSet::parse(" , ,").is_empty());
    }

    #[test]
    fn test_invalid_tokens_are_dropped() {
        assert_eq!(weeks("1-4,x,7周,9"), vec![1, 2, 3, 4, 9]);
        assert_eq!(weeks("3-1"), Vec::<u32>::new());
    }

    #[test]
    fn test_zero_and_oversized_weeks() {
        assert_eq!(weeks("0-2"), vec![1, 2]);
        assert_eq!(weeks("0"), Vec::<u32>::new());
        assert!(WeekSet::parse("1-99999999").is_empty());
    }

    #[test]
    fn test_overlapping_tokens_dedupe() {
        let set = WeekSet::parse("1-4,3-6");
        assert_eq!(set.len(), 6);
        assert_eq!(set.max(), Some(6));
        assert_eq!(set.to_string(), "1,2,3,4,5,6");
    }

    proptest! {
        #[test]
        fn prop_odd_range_only_odd(start in 1u32..=MAX_WEEK, len in 0u32..40) {
            let end = (start + len).min(MAX_WEEK);
            let set = WeekSet::parse(&format!("{}-{}(单)", start, end));
            prop_assert!(set.iter().all(|w| w % 2 == 1 && w >= start && w <= end));
            prop_assert_eq!(set.len() as u32, (start..=end).filter(|w| w % 2 == 1).count() as u32);
        }

        #[test]
        fn prop_parity_halves_cover_range(start in 1u32..=MAX_WEEK, len in 0u32..40) {
            let end = (start + len).min(MAX_WEEK);
            let all = WeekSet::parse(&format!("{}-{}", start, end));
            let halves = WeekSet::parse(&format!("{0}-{1}(单),{0}-{1}(双)", start, end));
            prop_assert_eq!(all, halves);
        }

        #[test]
        fn prop_never_panics(spec in "\\PC*") {
            let _ = WeekSet::parse(&spec);
        }
    }
}
