use crate::model::Row;
use once_cell::sync::Lazy;
use regex::Regex;

static LISTING_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[•\-*]\s*(\S+\.md)|^\s*(\S+\.md)").expect("valid listing regex")
});

/// Pulls note paths out of the executor's plain-text fuzzy listing, in listing order.
pub fn parse_listing(stdout: &str) -> Vec<Row> {
    stdout
        .lines()
        .filter_map(|line| {
            let caps = LISTING_PATH_RE.captures(line)?;
            caps.get(1).or_else(|| caps.get(2)).map(|m| Row::note(m.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bullets_and_bare_paths() {
        let out = "Results for \"meetng\":\n\n  • notes/meeting.md\n  - daily/2024-01-02.md (score 0.8)\nprojects/plan.md\n\nNothing else here\n";
        let paths: Vec<String> = parse_listing(out)
            .iter()
            .filter_map(|r| r.path().map(str::to_string))
            .collect();
        assert_eq!(
            paths,
            vec!["notes/meeting.md", "daily/2024-01-02.md", "projects/plan.md"]
        );
    }

    #[test]
    fn empty_output_has_no_rows() {
        assert!(parse_listing("").is_empty());
        assert!(parse_listing("No matches\n").is_empty());
    }
}
