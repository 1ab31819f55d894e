//! `{{...}}` placeholder expansion for view SQL.
//!
//! Placeholders are replaced in a single left-to-right pass. A declared parameter
//! takes priority over a template variable of the same name; anything unknown is
//! left as written. Substituted text is never scanned again.

use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid placeholder regex"));

static OFFSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(today|this_week|this_month)([+-]\d+)$").expect("valid offset regex")
});

const DATE_FMT: &str = "%Y-%m-%d";

/// Clock and environment used to resolve template variables.
pub struct TemplateContext<'a> {
    pub now: NaiveDateTime,
    pub env: &'a (dyn Fn(&str) -> Option<String> + Send + Sync),
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl TemplateContext<'static> {
    pub fn system() -> Self {
        Self {
            now: Local::now().naive_local(),
            env: &process_env,
        }
    }
}

impl TemplateContext<'_> {
    fn today(&self) -> NaiveDate {
        self.now.date()
    }

    /// Resolves a template variable name (without braces), or `None` if unknown.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let today = self.today();
        let date = |d: NaiveDate| d.format(DATE_FMT).to_string();

        let value = match name {
            "today" => date(today),
            "yesterday" => date(today - Duration::days(1)),
            "now" => self.now.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "this_week" => date(start_of_week(today)),
            "last_week" => date(start_of_week(today - Duration::days(7))),
            "next_week" => date(start_of_week(today + Duration::days(7))),
            "this_month" | "start_of_month" => date(first_of_month(today)),
            "end_of_month" => date(end_of_month(today)),
            "last_month" => date(add_months(first_of_month(today), -1)),
            "next_month" => date(add_months(first_of_month(today), 1)),
            "year" => today.year().to_string(),
            "quarter" => format!("Q{}", quarter(today)),
            "start_of_quarter" => date(start_of_quarter(today)),
            "end_of_quarter" => date(end_of_month(add_months(start_of_quarter(today), 2))),
            _ => return self.resolve_dynamic(name),
        };
        Some(value)
    }

    fn resolve_dynamic(&self, name: &str) -> Option<String> {
        if let Some(spec) = name.strip_prefix("env:") {
            return Some(self.resolve_env(spec));
        }

        let caps = OFFSET_RE.captures(name)?;
        let n: i64 = caps.get(2)?.as_str().parse().ok()?;
        let today = self.today();
        let resolved = match caps.get(1)?.as_str() {
            "today" => today.checked_add_signed(Duration::try_days(n)?)?,
            "this_week" => start_of_week(today.checked_add_signed(Duration::try_weeks(n)?)?),
            _ => checked_add_months(first_of_month(today), n)?,
        };
        Some(resolved.format(DATE_FMT).to_string())
    }

    /// `VAR` or `DEFAULT:VAR`; an unset variable without a default becomes empty.
    fn resolve_env(&self, spec: &str) -> String {
        let (default, var) = match spec.split_once(':') {
            Some((default, var)) => (Some(default), var),
            None => (None, spec),
        };
        match (self.env)(var).filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => {
                if default.is_none() {
                    tracing::warn!(var, "environment variable not set, using empty string");
                }
                default.unwrap_or_default().to_string()
            }
        }
    }

    /// Expands placeholders in `template`. `params` hold already-rendered SQL text.
    pub fn expand(&self, template: &str, params: &BTreeMap<String, String>) -> String {
        PLACEHOLDER_RE
            .replace_all(template, |caps: &Captures| {
                let name = &caps[1];
                if let Some(value) = params.get(name) {
                    return value.clone();
                }
                self.resolve(name).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Resolves a value that is either a literal or a single `{{variable}}`.
    pub fn resolve_value(&self, value: &str) -> String {
        let trimmed = value.trim();
        match trimmed
            .strip_prefix("{{")
            .and_then(|rest| rest.strip_suffix("}}"))
        {
            Some(inner) => self
                .resolve(inner.trim())
                .unwrap_or_else(|| trimmed.to_string()),
            None => trimmed.to_string(),
        }
    }
}

fn start_of_week(d: NaiveDate) -> NaiveDate {
    d - Duration::days(d.weekday().num_days_from_monday() as i64)
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

fn checked_add_months(d: NaiveDate, n: i64) -> Option<NaiveDate> {
    let months = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
    if n >= 0 {
        d.checked_add_months(months)
    } else {
        d.checked_sub_months(months)
    }
}

fn add_months(d: NaiveDate, n: i64) -> NaiveDate {
    checked_add_months(d, n).unwrap_or(d)
}

fn end_of_month(d: NaiveDate) -> NaiveDate {
    add_months(first_of_month(d), 1) - Duration::days(1)
}

fn quarter(d: NaiveDate) -> u32 {
    (d.month() - 1) / 3 + 1
}

fn start_of_quarter(d: NaiveDate) -> NaiveDate {
    let month = (quarter(d) - 1) * 3 + 1;
    NaiveDate::from_ymd_opt(d.year(), month, 1).unwrap_or(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn fake_env(key: &str) -> Option<String> {
        (key == "PROJECT").then(|| "apollo".to_string())
    }

    fn ctx_at(y: i32, m: u32, d: u32) -> TemplateContext<'static> {
        TemplateContext {
            now: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            env: &no_env,
        }
    }

    #[test]
    fn resolves_fixed_variables() {
        // 2024-05-15 is a Wednesday
        let ctx = ctx_at(2024, 5, 15);
        assert_eq!(ctx.resolve("today").unwrap(), "2024-05-15");
        assert_eq!(ctx.resolve("yesterday").unwrap(), "2024-05-14");
        assert_eq!(ctx.resolve("this_week").unwrap(), "2024-05-13");
        assert_eq!(ctx.resolve("last_week").unwrap(), "2024-05-06");
        assert_eq!(ctx.resolve("next_week").unwrap(), "2024-05-20");
        assert_eq!(ctx.resolve("this_month").unwrap(), "2024-05-01");
        assert_eq!(ctx.resolve("end_of_month").unwrap(), "2024-05-31");
        assert_eq!(ctx.resolve("last_month").unwrap(), "2024-04-01");
        assert_eq!(ctx.resolve("next_month").unwrap(), "2024-06-01");
        assert_eq!(ctx.resolve("year").unwrap(), "2024");
        assert_eq!(ctx.resolve("quarter").unwrap(), "Q2");
        assert_eq!(ctx.resolve("start_of_quarter").unwrap(), "2024-04-01");
        assert_eq!(ctx.resolve("end_of_quarter").unwrap(), "2024-06-30");
        assert_eq!(ctx.resolve("now").unwrap(), "2024-05-15T10:30:00");
    }

    #[test]
    fn resolves_offsets() {
        let ctx = ctx_at(2024, 3, 1);
        assert_eq!(ctx.resolve("today-1").unwrap(), "2024-02-29");
        assert_eq!(ctx.resolve("today+7").unwrap(), "2024-03-08");
        assert_eq!(ctx.resolve("this_week-1").unwrap(), "2024-02-19");
        assert_eq!(ctx.resolve("this_month-2").unwrap(), "2024-01-01");
        assert_eq!(ctx.resolve("this_month+12").unwrap(), "2025-03-01");
    }

    #[test]
    fn resolves_env() {
        let ctx = TemplateContext {
            now: ctx_at(2024, 1, 1).now,
            env: &fake_env,
        };
        assert_eq!(ctx.resolve("env:PROJECT").unwrap(), "apollo");
        assert_eq!(ctx.resolve("env:MISSING").unwrap(), "");
        assert_eq!(ctx.resolve("env:fallback:MISSING").unwrap(), "fallback");
        assert_eq!(ctx.resolve("env:fallback:PROJECT").unwrap(), "apollo");
    }

    #[test]
    fn params_shadow_variables_and_unknown_stay() {
        let ctx = ctx_at(2024, 5, 15);
        let mut params = BTreeMap::new();
        params.insert("today".to_string(), "2000-01-01".to_string());
        let out = ctx.expand("a={{today}} b={{ unknown }} c={{yesterday}}", &params);
        assert_eq!(out, "a=2000-01-01 b={{ unknown }} c=2024-05-14");
    }

    #[test]
    fn bound_values_are_not_reexpanded() {
        let ctx = ctx_at(2024, 5, 15);
        let mut params = BTreeMap::new();
        params.insert("q".to_string(), "{{today}}".to_string());
        assert_eq!(ctx.expand("x='{{q}}'", &params), "x='{{today}}'");
    }

    #[test]
    fn out_of_range_offsets_stay_unresolved() {
        let ctx = ctx_at(2024, 5, 15);
        assert!(ctx.resolve("today+100000000").is_none());
        assert!(ctx.resolve("this_week-99999999999").is_none());
        assert!(ctx.resolve("this_month+99999999999").is_none());
        assert_eq!(ctx.resolve_value("{{today+100000000}}"), "{{today+100000000}}");
    }

    #[test]
    fn resolve_value_handles_literals_and_variables() {
        let ctx = ctx_at(2024, 5, 15);
        assert_eq!(ctx.resolve_value("2023-01-02"), "2023-01-02");
        assert_eq!(ctx.resolve_value("{{today-1}}"), "2024-05-14");
        assert_eq!(ctx.resolve_value("{{nope}}"), "{{nope}}");
    }
}
