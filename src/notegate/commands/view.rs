use crate::commands::{CmdMessage, CmdResult, Runtime};
use crate::error::{FailureContext, NotegateError, Result};
use crate::executor::QueryExecutor;
use crate::model::{PageRequest, SearchRequest, ViewBody, ViewConfig, ViewDefinition, ViewOrigin, ViewParameter};
use crate::notebook::Notebook;
use crate::query::QueryBuilder;
use crate::validation::validate_pagination;
use serde::Serialize;
use std::collections::BTreeMap;

/// A view as shown to users.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSummary {
    pub name: String,
    pub origin: ViewOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ViewParameter>,
    /// Computed from the link graph instead of its own SQL.
    pub special: bool,
}

impl From<ViewDefinition> for ViewSummary {
    fn from(def: ViewDefinition) -> Self {
        let special = is_special(&def);
        Self {
            name: def.name,
            origin: def.origin,
            description: def.description,
            parameters: def.parameters,
            special,
        }
    }
}

pub async fn run<E: QueryExecutor + ?Sized>(
    rt: &Runtime<'_, E>,
    builder: &QueryBuilder<'_>,
    notebook: &Notebook,
    name: &str,
    params: BTreeMap<String, String>,
    page: PageRequest,
) -> Result<CmdResult> {
    validate_pagination(page.limit, page.offset)?;
    let limit = rt.pagination.page_size(page.limit.unwrap_or(0));
    let request = SearchRequest::View {
        name: name.to_string(),
        params,
    };
    let built = builder.build(&request, notebook, limit, page.offset)?;

    let results = rt
        .fetch(notebook, &built, limit, page.offset)
        .await
        .map_err(|e| e.reclassify(FailureContext::View(name)))?;
    Ok(CmdResult::default().with_query(&built).with_page(results))
}

/// Every reachable view, built-ins first.
pub fn list(builder: &QueryBuilder<'_>, notebook: &Notebook) -> CmdResult {
    let views = builder
        .registry(notebook)
        .list()
        .into_iter()
        .map(ViewSummary::from)
        .collect();
    CmdResult::default().with_views(views)
}

/// Stores a view in the notebook's config.
pub fn save(notebook: &mut Notebook, name: &str, config: ViewConfig) -> Result<CmdResult> {
    if crate::views::builtin::lookup(name).is_some() {
        return Err(NotegateError::InvalidParams {
            view: name.to_string(),
            message: "built-in views cannot be redefined".to_string(),
        });
    }
    let overwritten = notebook.save_view(name, config)?;

    let mut result = CmdResult::default();
    let verb = if overwritten { "Updated" } else { "Saved" };
    result.add_message(CmdMessage::success(format!(
        "{} view '{}' in notebook '{}'",
        verb,
        name,
        notebook.name()
    )));
    Ok(result)
}

pub fn delete(notebook: &mut Notebook, name: &str) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if notebook.delete_view(name)? {
        result.add_message(CmdMessage::success(format!("Deleted view '{}'", name)));
    } else {
        result.add_message(CmdMessage::warning(format!(
            "View '{}' is not defined in this notebook",
            name
        )));
    }
    Ok(result)
}

pub fn is_special(def: &ViewDefinition) -> bool {
    matches!(def.body, ViewBody::Special(_))
}
