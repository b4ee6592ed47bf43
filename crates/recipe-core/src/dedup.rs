use std::collections::HashSet;

/// Collapse every run of whitespace (including non-breaking spaces) into a
/// single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize each entry, drop blanks, and keep only the first occurrence of
/// each distinct string.
pub fn dedup_preserving_order<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let normalized = normalize_whitespace(item.as_ref());
        if normalized.is_empty() {
            continue;
        }
        if seen.insert(normalized.clone()) {
            out.push(normalized);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_inner_whitespace() {
        assert_eq!(normalize_whitespace("  2 dl\n\t mjölk  "), "2 dl mjölk");
    }

    #[test]
    fn non_breaking_space_is_whitespace() {
        assert_eq!(normalize_whitespace("1\u{a0}tsk salt"), "1 tsk salt");
    }

    #[test]
    fn first_occurrence_wins() {
        let out = dedup_preserving_order(["salt", "peppar", "salt", "smör"]);
        assert_eq!(out, vec!["salt", "peppar", "smör"]);
    }

    #[test]
    fn duplicates_after_normalization_are_merged() {
        let out = dedup_preserving_order(["1 ägg", " 1   ägg ", "", "   "]);
        assert_eq!(out, vec!["1 ägg"]);
    }
}
