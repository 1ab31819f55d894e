//! # Views
//!
//! A view is a named, optionally parameterized, read-only query. Three sources
//! are consulted, first match wins:
//!
//! 1. built-in views ([`builtin`])
//! 2. views declared in the notebook's `.notegate.json`
//! 3. views declared in the global config
//!
//! Binding a view validates the caller's parameters against the declaration,
//! fills in defaults, renders each value as SQL text according to its type and
//! then expands the template in one pass ([`template`]). The result goes through
//! the same SQL validator as a raw query.
//!
//! `orphans` and `broken-links` have no SQL of their own; they are computed from
//! the link graph in [`special`].

use crate::error::{NotegateError, Result};
use crate::model::{ParamType, ViewConfig, ViewDefinition, ViewOrigin, ViewParameter};
use crate::validation::{escape_sql_string, validate_sql, validate_view_name};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

pub mod builtin;
pub mod special;
pub mod template;

pub use template::TemplateContext;

pub const MAX_PARAMETERS: usize = 5;
const MAX_STRING_PARAM_LEN: usize = 256;

pub struct ViewRegistry<'a> {
    notebook: &'a BTreeMap<String, ViewConfig>,
    global: &'a BTreeMap<String, ViewConfig>,
}

impl<'a> ViewRegistry<'a> {
    pub fn new(
        notebook: &'a BTreeMap<String, ViewConfig>,
        global: &'a BTreeMap<String, ViewConfig>,
    ) -> Self {
        Self { notebook, global }
    }

    /// Looks a view up by name. Unknown names fail with the list of available views.
    pub fn get(&self, name: &str) -> Result<ViewDefinition> {
        validate_view_name(name)?;

        if let Some(def) = builtin::lookup(name) {
            return Ok(def);
        }
        if let Some(cfg) = self.notebook.get(name) {
            return Ok(ViewDefinition::from_config(name, ViewOrigin::Notebook, cfg));
        }
        if let Some(cfg) = self.global.get(name) {
            return Ok(ViewDefinition::from_config(name, ViewOrigin::Global, cfg));
        }

        Err(NotegateError::ViewNotFound {
            name: name.to_string(),
            available: self.names(),
        })
    }

    /// Every reachable view once, shadowed definitions omitted.
    pub fn list(&self) -> Vec<ViewDefinition> {
        let mut seen = BTreeSet::new();
        let mut views = Vec::new();

        for def in builtin::all() {
            seen.insert(def.name.clone());
            views.push(def);
        }
        for (origin, map) in [
            (ViewOrigin::Notebook, self.notebook),
            (ViewOrigin::Global, self.global),
        ] {
            for (name, cfg) in map {
                if seen.insert(name.clone()) {
                    views.push(ViewDefinition::from_config(name, origin, cfg));
                }
            }
        }
        views
    }

    pub fn names(&self) -> Vec<String> {
        self.list().into_iter().map(|v| v.name).collect()
    }
}

/// Checks a stored view definition before it is saved or used.
pub fn validate_view_config(name: &str, config: &ViewConfig) -> Result<()> {
    validate_view_name(name)?;
    let invalid = |message: String| NotegateError::InvalidParams {
        view: name.to_string(),
        message,
    };

    if config.parameters.len() > MAX_PARAMETERS {
        return Err(invalid(format!(
            "at most {} parameters are allowed",
            MAX_PARAMETERS
        )));
    }
    let mut names = BTreeSet::new();
    for param in &config.parameters {
        if validate_view_name(&param.name).is_err() {
            return Err(invalid(format!("invalid parameter name '{}'", param.name)));
        }
        if !names.insert(param.name.as_str()) {
            return Err(invalid(format!("duplicate parameter '{}'", param.name)));
        }
    }
    if config.query.trim().is_empty() {
        return Err(invalid("query must not be empty".to_string()));
    }
    validate_sql(&config.query)
}

fn check_type(param: &ViewParameter, value: &str) -> std::result::Result<(), String> {
    match param.kind {
        ParamType::String if value.chars().count() > MAX_STRING_PARAM_LEN => Err(format!(
            "string too long (max {} chars)",
            MAX_STRING_PARAM_LEN
        )),
        ParamType::String => Ok(()),
        ParamType::Number => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(|_| ())
            .ok_or_else(|| "expected a number".to_string()),
        ParamType::List => {
            if value.split(',').any(|item| item.trim().is_empty()) {
                Err("empty list item".to_string())
            } else {
                Ok(())
            }
        }
        ParamType::Date => {
            let v = value.trim();
            if v.starts_with("{{") && v.ends_with("}}") {
                return Ok(());
            }
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map(|_| ())
                .map_err(|_| "invalid date format (expected YYYY-MM-DD)".to_string())
        }
        ParamType::Bool => match value.trim().to_lowercase().as_str() {
            "true" | "false" => Ok(()),
            _ => Err("invalid boolean (expected true or false)".to_string()),
        },
    }
}

/// Validates caller parameters against the view and applies defaults.
pub fn bind_parameters(
    def: &ViewDefinition,
    supplied: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let invalid = |message: String| NotegateError::InvalidParams {
        view: def.name.clone(),
        message,
    };

    for name in supplied.keys() {
        if !def.parameters.iter().any(|p| &p.name == name) {
            return Err(invalid(format!("unknown parameter: {}", name)));
        }
    }

    let mut bound = BTreeMap::new();
    for param in &def.parameters {
        let value = match (supplied.get(&param.name), &param.default) {
            (Some(v), _) => v.clone(),
            (None, Some(d)) => d.clone(),
            (None, None) if param.required => {
                return Err(invalid(format!("missing required parameter: {}", param.name)));
            }
            (None, None) => continue,
        };
        check_type(param, &value)
            .map_err(|e| invalid(format!("invalid parameter {}: {}", param.name, e)))?;
        bound.insert(param.name.clone(), value);
    }
    Ok(bound)
}

/// Renders a validated value as the SQL text substituted for its placeholder.
fn render_value(kind: ParamType, value: &str, ctx: &TemplateContext<'_>) -> String {
    match kind {
        ParamType::String => escape_sql_string(value),
        ParamType::Number => value.trim().to_string(),
        ParamType::Bool => value.trim().to_lowercase(),
        ParamType::Date => escape_sql_string(&ctx.resolve_value(value)),
        ParamType::List => value
            .split(',')
            .map(|item| format!("'{}'", escape_sql_string(item.trim())))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Binds parameters into a SQL template and validates the result.
pub fn render_sql(
    def: &ViewDefinition,
    template: &str,
    bound: &BTreeMap<String, String>,
    ctx: &TemplateContext<'_>,
) -> Result<String> {
    let rendered: BTreeMap<String, String> = def
        .parameters
        .iter()
        .filter_map(|p| {
            bound
                .get(&p.name)
                .map(|v| (p.name.clone(), render_value(p.kind, v, ctx)))
        })
        .collect();
    let sql = ctx.expand(template, &rendered);
    validate_sql(&sql)?;
    Ok(sql)
}

/// Parses `key=value,key2=value2`. A segment without `=` continues the previous
/// value, so list values can be written inline: `status=todo,done,days=3`.
pub fn parse_view_params(input: &str) -> Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    let mut last: Option<String> = None;

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                if key.is_empty() {
                    return Err(NotegateError::InvalidParams {
                        view: String::new(),
                        message: format!("empty parameter name in: {}", part),
                    });
                }
                params.insert(key.to_string(), value.trim().to_string());
                last = Some(key.to_string());
            }
            None => match last.as_ref().and_then(|k| params.get_mut(k)) {
                Some(value) => {
                    value.push(',');
                    value.push_str(part);
                }
                None => {
                    return Err(NotegateError::InvalidParams {
                        view: String::new(),
                        message: format!("invalid parameter format: {} (expected key=value)", part),
                    })
                }
            },
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ViewBody;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn ctx() -> TemplateContext<'static> {
        TemplateContext {
            now: NaiveDate::from_ymd_opt(2024, 5, 15)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            env: &no_env,
        }
    }

    fn cfg(query: &str, parameters: Vec<ViewParameter>) -> ViewConfig {
        ViewConfig {
            description: None,
            parameters,
            query: query.to_string(),
        }
    }

    fn param(name: &str, kind: ParamType, required: bool) -> ViewParameter {
        ViewParameter {
            name: name.to_string(),
            kind,
            required,
            default: None,
            description: None,
        }
    }

    fn sql_of(def: &ViewDefinition) -> &str {
        match &def.body {
            ViewBody::Sql(s) => s,
            ViewBody::Special(_) => panic!("special view"),
        }
    }

    #[test]
    fn builtin_beats_notebook_beats_global() {
        let mut notebook = BTreeMap::new();
        notebook.insert("today".into(), cfg("SELECT 'nb-today'", vec![]));
        notebook.insert("mine".into(), cfg("SELECT 'nb-mine'", vec![]));
        let mut global = BTreeMap::new();
        global.insert("mine".into(), cfg("SELECT 'global-mine'", vec![]));
        global.insert("shared".into(), cfg("SELECT 'global-shared'", vec![]));

        let reg = ViewRegistry::new(&notebook, &global);
        assert_eq!(reg.get("today").unwrap().origin, ViewOrigin::BuiltIn);
        let mine = reg.get("mine").unwrap();
        assert_eq!(mine.origin, ViewOrigin::Notebook);
        assert_eq!(sql_of(&mine), "SELECT 'nb-mine'");
        assert_eq!(reg.get("shared").unwrap().origin, ViewOrigin::Global);

        let names = reg.names();
        assert_eq!(names.iter().filter(|n| *n == "today").count(), 1);
        assert_eq!(names.iter().filter(|n| *n == "mine").count(), 1);
        assert!(names.contains(&"shared".to_string()));
    }

    #[test]
    fn unknown_view_lists_available() {
        let empty = BTreeMap::new();
        let err = ViewRegistry::new(&empty, &empty)
            .get("nonexistent-view")
            .unwrap_err();
        match &err {
            NotegateError::ViewNotFound { available, .. } => {
                assert!(available.contains(&"kanban".to_string()))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.hint().unwrap().contains("broken-links"));
    }

    #[test]
    fn invalid_view_name_rejected_before_lookup() {
        let empty = BTreeMap::new();
        let err = ViewRegistry::new(&empty, &empty).get("../x").unwrap_err();
        assert!(matches!(err, NotegateError::InvalidViewName(_)));
    }

    #[test]
    fn binding_checks_unknown_required_and_types() {
        let def = ViewDefinition::from_config(
            "v",
            ViewOrigin::Notebook,
            &cfg(
                "SELECT 1",
                vec![
                    param("who", ParamType::String, true),
                    param("n", ParamType::Number, false),
                    param("since", ParamType::Date, false),
                    param("flag", ParamType::Bool, false),
                ],
            ),
        );

        let mut p = BTreeMap::new();
        assert!(bind_parameters(&def, &p).is_err());

        p.insert("who".into(), "me".into());
        assert!(bind_parameters(&def, &p).is_ok());

        p.insert("extra".into(), "1".into());
        assert!(bind_parameters(&def, &p).is_err());
        p.remove("extra");

        for (k, bad) in [("n", "abc"), ("since", "15/05/2024"), ("flag", "yes")] {
            let mut q = p.clone();
            q.insert(k.into(), bad.into());
            let err = bind_parameters(&def, &q).unwrap_err();
            assert!(matches!(err, NotegateError::InvalidParams { .. }), "{k}");
        }

        p.insert("since".into(), "{{today-7}}".into());
        assert!(bind_parameters(&def, &p).is_ok());
    }

    #[test]
    fn defaults_apply_to_builtins() {
        let def = builtin::lookup("kanban").unwrap();
        let bound = bind_parameters(&def, &BTreeMap::new()).unwrap();
        let sql = render_sql(&def, sql_of(&def), &bound, &ctx()).unwrap();
        assert!(sql.contains("IN ('todo', 'in-progress', 'done')"));

        let def = builtin::lookup("recent").unwrap();
        let mut p = BTreeMap::new();
        p.insert("days".to_string(), "30".to_string());
        let bound = bind_parameters(&def, &p).unwrap();
        let sql = render_sql(&def, sql_of(&def), &bound, &ctx()).unwrap();
        assert!(sql.contains("INTERVAL (30) DAY"));

        let def = builtin::lookup("today").unwrap();
        let sql = render_sql(&def, sql_of(&def), &BTreeMap::new(), &ctx()).unwrap();
        assert!(sql.contains("'2024-05-15'"));
    }

    #[test]
    fn string_values_are_escaped() {
        let def = ViewDefinition::from_config(
            "by-owner",
            ViewOrigin::Notebook,
            &cfg(
                "SELECT * FROM read_markdown('**/*.md') WHERE metadata->>'owner' = '{{owner}}'",
                vec![param("owner", ParamType::String, true)],
            ),
        );
        let mut p = BTreeMap::new();
        p.insert("owner".to_string(), "x' OR '1'='1".to_string());
        let bound = bind_parameters(&def, &p).unwrap();
        let sql = render_sql(&def, sql_of(&def), &bound, &ctx()).unwrap();
        assert!(sql.ends_with("= 'x'' OR ''1''=''1'"));
    }

    #[test]
    fn date_params_resolve_variables() {
        let def = ViewDefinition::from_config(
            "since",
            ViewOrigin::Global,
            &cfg(
                "SELECT * FROM t WHERE d >= '{{since}}'",
                vec![param("since", ParamType::Date, true)],
            ),
        );
        let mut p = BTreeMap::new();
        p.insert("since".to_string(), "{{today-1}}".to_string());
        let bound = bind_parameters(&def, &p).unwrap();
        let sql = render_sql(&def, sql_of(&def), &bound, &ctx()).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE d >= '2024-05-14'");
    }

    #[test]
    fn rendered_sql_is_validated() {
        let def = ViewDefinition::from_config(
            "evil",
            ViewOrigin::Notebook,
            &cfg("{{stmt}}", vec![param("stmt", ParamType::String, true)]),
        );
        let mut p = BTreeMap::new();
        p.insert("stmt".to_string(), "DELETE FROM notes".to_string());
        let bound = bind_parameters(&def, &p).unwrap();
        assert!(render_sql(&def, "{{stmt}}", &bound, &ctx()).is_err());
    }

    #[test]
    fn view_config_validation() {
        assert!(validate_view_config("ok", &cfg("SELECT 1", vec![])).is_ok());
        assert!(validate_view_config("bad name", &cfg("SELECT 1", vec![])).is_err());
        assert!(validate_view_config("ok", &cfg("DROP TABLE x", vec![])).is_err());
        assert!(validate_view_config("ok", &cfg("  ", vec![])).is_err());

        let many = (0..6)
            .map(|i| param(&format!("p{i}"), ParamType::String, false))
            .collect();
        assert!(validate_view_config("ok", &cfg("SELECT 1", many)).is_err());

        let dup = vec![
            param("a", ParamType::String, false),
            param("a", ParamType::Number, false),
        ];
        assert!(validate_view_config("ok", &cfg("SELECT 1", dup)).is_err());
    }

    #[test]
    fn parse_params() {
        let p = parse_view_params("status=todo,done, days = 3").unwrap();
        assert_eq!(p.get("status").unwrap(), "todo,done");
        assert_eq!(p.get("days").unwrap(), "3");
        assert!(parse_view_params("").unwrap().is_empty());
        assert!(parse_view_params("novalue").is_err());
        assert!(parse_view_params("=x").is_err());
    }
}
