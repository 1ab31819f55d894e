//! Page metadata and output budgeting.
//!
//! Everything here is pure arithmetic over already-fetched data.

use crate::config::{BudgetConfig, Settings};
use crate::model::PaginationMeta;

/// A strict prefix of the input that fits the budget.
#[derive(Debug, Clone, PartialEq)]
pub struct Fitted<T> {
    pub items: Vec<T>,
    pub truncated: bool,
    pub original_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaginationEngine {
    default_page_size: usize,
    budget: BudgetConfig,
}

impl Default for PaginationEngine {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

fn measure(content: &str) -> (usize, usize) {
    (content.len(), content.split('\n').count())
}

impl PaginationEngine {
    pub fn new(default_page_size: usize, budget: BudgetConfig) -> Self {
        Self {
            default_page_size: default_page_size.max(1),
            budget,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.default_page_size, settings.budget())
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    pub fn budget(&self) -> BudgetConfig {
        self.budget
    }

    /// `limit` of 0 means "use the default page size".
    pub fn page_size(&self, limit: usize) -> usize {
        if limit > 0 {
            limit
        } else {
            self.default_page_size
        }
    }

    pub fn paginate(&self, returned: usize, total: usize, limit: usize, offset: usize) -> PaginationMeta {
        let page_size = self.page_size(limit);
        let end = offset.saturating_add(returned);
        let has_more = end < total;
        PaginationMeta {
            total,
            returned,
            page: offset / page_size + 1,
            page_size,
            has_more,
            next_offset: has_more.then_some(end),
        }
    }

    /// True if `content` is over the byte or line budget.
    pub fn exceeds_budget(&self, content: &str, ratio: Option<f64>) -> bool {
        let (max_bytes, max_lines) = self.budget.limits(ratio);
        let (bytes, lines) = measure(content);
        bytes > max_bytes || lines > max_lines
    }

    /// Keeps items in order until the next one would cross either budget.
    pub fn fit_to_budget<T, F>(&self, items: Vec<T>, serialize: F, ratio: Option<f64>) -> Fitted<T>
    where
        F: Fn(&T) -> String,
    {
        let (max_bytes, max_lines) = self.budget.limits(ratio);
        let original_count = items.len();
        let mut kept = Vec::new();
        let (mut total_bytes, mut total_lines) = (0usize, 0usize);

        for item in items {
            let (bytes, lines) = measure(&serialize(&item));
            if total_bytes + bytes > max_bytes || total_lines + lines > max_lines {
                break;
            }
            total_bytes += bytes;
            total_lines += lines;
            kept.push(item);
        }

        Fitted {
            truncated: kept.len() < original_count,
            items: kept,
            original_count,
        }
    }

    /// Cuts `content` to the byte and line budget on a character boundary.
    pub fn truncate_text(&self, content: &str, ratio: Option<f64>) -> (String, bool) {
        if !self.exceeds_budget(content, ratio) {
            return (content.to_string(), false);
        }
        let (max_bytes, max_lines) = self.budget.limits(ratio);

        let mut end = 0;
        let mut lines = 1;
        for (idx, ch) in content.char_indices() {
            let next = idx + ch.len_utf8();
            if next > max_bytes {
                break;
            }
            if ch == '\n' {
                if lines + 1 > max_lines {
                    break;
                }
                lines += 1;
            }
            end = next;
        }
        (content[..end].to_string(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(bytes: usize, lines: usize) -> PaginationEngine {
        PaginationEngine::new(50, BudgetConfig::new(bytes, lines, 1.0))
    }

    #[test]
    fn first_of_three_pages() {
        let meta = PaginationEngine::default().paginate(50, 127, 50, 0);
        assert_eq!(meta.page, 1);
        assert!(meta.has_more);
        assert_eq!(meta.next_offset, Some(50));
        assert_eq!(meta.returned, 50);
        assert_eq!(meta.page_size, 50);
    }

    #[test]
    fn last_page_and_empty() {
        let p = PaginationEngine::default();
        let meta = p.paginate(27, 127, 50, 100);
        assert_eq!(meta.page, 3);
        assert!(!meta.has_more);
        assert_eq!(meta.next_offset, None);

        let meta = p.paginate(0, 0, 50, 0);
        assert_eq!(meta.page, 1);
        assert!(!meta.has_more);
    }

    #[test]
    fn huge_offset_does_not_overflow() {
        let meta = PaginationEngine::default().paginate(3, 10, 50, usize::MAX - 1);
        assert!(!meta.has_more);
        assert_eq!(meta.next_offset, None);
        assert_eq!(meta.returned, 3);
    }

    #[test]
    fn zero_limit_uses_default() {
        let p = PaginationEngine::new(20, BudgetConfig::default());
        let meta = p.paginate(20, 100, 0, 40);
        assert_eq!(meta.page_size, 20);
        assert_eq!(meta.page, 3);
    }

    #[test]
    fn has_more_matches_arithmetic_for_all_small_inputs() {
        let p = PaginationEngine::default();
        for total in 0..30usize {
            for limit in 1..8usize {
                for offset in 0..35usize {
                    let returned = limit.min(total.saturating_sub(offset));
                    let meta = p.paginate(returned, total, limit, offset);
                    assert_eq!(meta.has_more, offset + returned < total);
                    assert_eq!(meta.next_offset.is_some(), meta.has_more);
                    if meta.has_more {
                        assert_eq!(meta.next_offset, Some(offset + returned));
                    }
                    assert!(meta.returned <= meta.page_size);
                    assert_eq!(meta.page, offset / limit + 1);
                }
            }
        }
    }

    #[test]
    fn exceeds_budget_by_bytes_or_lines() {
        let p = engine(10, 3);
        assert!(!p.exceeds_budget("0123456789", None));
        assert!(p.exceeds_budget("0123456789a", None));
        assert!(!p.exceeds_budget("a\nb\nc", None));
        assert!(p.exceeds_budget("a\nb\nc\nd", None));
        assert!(p.exceeds_budget("0123456789", Some(0.5)));
    }

    #[test]
    fn exceeds_budget_counts_utf8_bytes() {
        let p = engine(4, 10);
        assert!(!p.exceeds_budget("éé", None));
        assert!(p.exceeds_budget("ééé", None));
    }

    #[test]
    fn fit_keeps_a_prefix() {
        let p = engine(10, 100);
        let items = vec!["aaaa", "bbbb", "cccc", "d"];
        let fitted = p.fit_to_budget(items.clone(), |s| s.to_string(), None);
        assert_eq!(fitted.items, vec!["aaaa", "bbbb"]);
        assert!(fitted.truncated);
        assert_eq!(fitted.original_count, 4);
        assert_eq!(&items[..fitted.items.len()], fitted.items.as_slice());
    }

    #[test]
    fn fit_is_idempotent() {
        let p = engine(100, 5);
        let items: Vec<String> = (0..20).map(|i| format!("line {i}\nmore")).collect();
        let once = p.fit_to_budget(items, |s| s.clone(), None);
        assert!(once.truncated);
        let twice = p.fit_to_budget(once.items.clone(), |s| s.clone(), None);
        assert_eq!(twice.items, once.items);
        assert!(!twice.truncated);
    }

    #[test]
    fn fit_with_oversized_first_item() {
        let p = engine(3, 100);
        let fitted = p.fit_to_budget(vec!["toolong"], |s| s.to_string(), None);
        assert!(fitted.items.is_empty());
        assert!(fitted.truncated);
        assert_eq!(fitted.original_count, 1);
    }

    #[test]
    fn fit_everything_when_it_fits() {
        let p = PaginationEngine::default();
        let fitted = p.fit_to_budget(vec![1, 2, 3], |n| n.to_string(), None);
        assert_eq!(fitted.items, vec![1, 2, 3]);
        assert!(!fitted.truncated);
    }

    #[test]
    fn truncate_text_respects_char_boundaries() {
        let p = engine(5, 100);
        let (out, cut) = p.truncate_text("ééééé", None);
        assert!(cut);
        assert_eq!(out, "éé");

        let (out, cut) = p.truncate_text("abc", None);
        assert!(!cut);
        assert_eq!(out, "abc");
    }

    #[test]
    fn truncate_text_by_lines() {
        let p = engine(1000, 2);
        let (out, cut) = p.truncate_text("one\ntwo\nthree", None);
        assert!(cut);
        assert_eq!(out, "one\ntwo");
        assert!(!p.exceeds_budget(&out, None));
    }
}
