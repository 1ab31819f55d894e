use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// How a notebook was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotebookSource {
    Explicit,
    Registered,
    Ancestor,
}

impl fmt::Display for NotebookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotebookSource::Explicit => "explicit",
            NotebookSource::Registered => "registered",
            NotebookSource::Ancestor => "ancestor",
        };
        f.write_str(s)
    }
}

/// AND/OR/NOT groups of `field<op>value` conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanFilters {
    #[serde(default)]
    pub and: Vec<String>,
    #[serde(default)]
    pub or: Vec<String>,
    #[serde(default)]
    pub not: Vec<String>,
}

impl BooleanFilters {
    pub fn is_empty(&self) -> bool {
        self.and.is_empty() && self.or.is_empty() && self.not.is_empty()
    }
}

/// A single, unambiguous search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRequest {
    Text(String),
    Fuzzy(String),
    Sql(String),
    Boolean(BooleanFilters),
    View {
        name: String,
        params: BTreeMap<String, String>,
    },
}

impl SearchRequest {
    pub fn label(&self) -> &'static str {
        match self {
            SearchRequest::Text(_) => "text",
            SearchRequest::Fuzzy(_) => "fuzzy",
            SearchRequest::Sql(_) => "sql",
            SearchRequest::Boolean(_) => "boolean",
            SearchRequest::View { .. } => "view",
        }
    }
}

/// Loosely populated request as it arrives from the outside. Several fields may be
/// set at once; [`SearchParams::into_request`] picks exactly one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<BooleanFilters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

type Selector = fn(&SearchParams) -> Option<SearchRequest>;

/// Dispatch order, highest priority first.
const PRECEDENCE: [(&str, Selector); 5] = [
    ("sql", |p: &SearchParams| p.sql.clone().map(SearchRequest::Sql)),
    ("boolean", |p: &SearchParams| p.filters.clone().map(SearchRequest::Boolean)),
    ("fuzzy", |p: &SearchParams| match (&p.query, p.fuzzy) {
        (Some(q), true) => Some(SearchRequest::Fuzzy(q.clone())),
        _ => None,
    }),
    ("text", |p: &SearchParams| p.query.clone().map(SearchRequest::Text)),
    ("view", |p: &SearchParams| {
        p.view.clone().map(|name| SearchRequest::View {
            name,
            params: p.params.clone(),
        })
    }),
];

impl SearchParams {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn sql(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            ..Default::default()
        }
    }

    pub fn filters(filters: BooleanFilters) -> Self {
        Self {
            filters: Some(filters),
            ..Default::default()
        }
    }

    /// Selects the request variant. With nothing populated this is a text search
    /// for the empty string, which lists everything.
    pub fn into_request(self) -> SearchRequest {
        PRECEDENCE
            .iter()
            .find_map(|(_, select)| select(&self))
            .unwrap_or_else(|| SearchRequest::Text(String::new()))
    }
}

/// A note-shaped executor row: a path plus whatever else the query selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRow {
    #[serde(alias = "file_path")]
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One executor result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Row {
    Note(NoteRow),
    Value(Map<String, Value>),
}

impl Row {
    pub fn note(path: impl Into<String>) -> Self {
        Row::Note(NoteRow {
            path: path.into(),
            extra: Map::new(),
        })
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        match &mut self {
            Row::Note(n) => {
                n.extra.insert(key.to_string(), value.into());
            }
            Row::Value(m) => {
                m.insert(key.to_string(), value.into());
            }
        }
        self
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Row::Note(n) => Some(&n.path),
            Row::Value(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Row::Note(n) => n.extra.get(key),
            Row::Value(m) => m.get(key),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.get_str("title")
    }

    /// Tags as strings; accepts either a JSON array or a JSON-encoded array string.
    pub fn tags(&self) -> Vec<String> {
        match self.get("tags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => serde_json::from_str::<Vec<String>>(s).unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total: usize,
    pub returned: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
}

/// Requested window into a result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl PageRequest {
    pub fn new(limit: Option<usize>, offset: usize) -> Self {
        Self { limit, offset }
    }
}

/// A bounded page of rows plus continuation metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<Row>,
    pub pagination: PaginationMeta,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Modified,
    Created,
    Title,
    Path,
}

impl SortBy {
    pub fn column(&self) -> &'static str {
        match self {
            SortBy::Modified => "metadata->>'modified'",
            SortBy::Created => "metadata->>'created'",
            SortBy::Title => "metadata->>'title'",
            SortBy::Path => "file_path",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub pattern: Option<String>,
}

/// A single note fetched by path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteContent {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub frontmatter: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookInfo {
    pub name: String,
    pub path: PathBuf,
    pub source: NotebookSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_count: Option<u64>,
    pub current: bool,
}

// --- Views ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewOrigin {
    BuiltIn,
    Notebook,
    Global,
}

impl fmt::Display for ViewOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewOrigin::BuiltIn => "built-in",
            ViewOrigin::Notebook => "notebook",
            ViewOrigin::Global => "global",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    List,
    Date,
    Bool,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::List => "list",
            ParamType::Date => "date",
            ParamType::Bool => "bool",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ViewParameter {
    pub fn optional(name: &str, kind: ParamType, default: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            default: Some(default.to_string()),
            description: Some(description.to_string()),
        }
    }
}

/// A view as stored in a config file; the name is the map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ViewParameter>,
    #[serde(alias = "sql")]
    pub query: String,
}

/// Views computed from note content rather than a single SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialView {
    Orphans,
    BrokenLinks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewBody {
    Sql(String),
    Special(SpecialView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    pub name: String,
    pub origin: ViewOrigin,
    pub description: Option<String>,
    pub parameters: Vec<ViewParameter>,
    pub body: ViewBody,
}

impl ViewDefinition {
    pub fn from_config(name: &str, origin: ViewOrigin, config: &ViewConfig) -> Self {
        Self {
            name: name.to_string(),
            origin,
            description: config.description.clone(),
            parameters: config.parameters.clone(),
            body: ViewBody::Sql(config.query.clone()),
        }
    }
}
