use crate::model::{ParamType, SpecialView, ViewBody, ViewDefinition, ViewOrigin, ViewParameter};
use crate::query::NOTE_COLUMNS;

pub const BUILTIN_NAMES: [&str; 6] = [
    "today",
    "recent",
    "kanban",
    "untagged",
    "orphans",
    "broken-links",
];

fn sql(body: &str) -> ViewBody {
    ViewBody::Sql(format!(
        "SELECT {} FROM read_markdown('**/*.md') {}",
        NOTE_COLUMNS, body
    ))
}

fn view(name: &str, description: &str, parameters: Vec<ViewParameter>, body: ViewBody) -> ViewDefinition {
    ViewDefinition {
        name: name.to_string(),
        origin: ViewOrigin::BuiltIn,
        description: Some(description.to_string()),
        parameters,
        body,
    }
}

pub fn lookup(name: &str) -> Option<ViewDefinition> {
    let def = match name {
        "today" => view(
            "today",
            "Notes created or modified today",
            vec![],
            sql("WHERE CAST(metadata->>'modified' AS VARCHAR) >= '{{today}}' \
                 OR CAST(metadata->>'created' AS VARCHAR) >= '{{today}}' \
                 ORDER BY metadata->>'modified' DESC NULLS LAST"),
        ),
        "recent" => view(
            "recent",
            "Recently modified notes",
            vec![ViewParameter::optional(
                "days",
                ParamType::Number,
                "7",
                "How many days back to look",
            )],
            sql("WHERE TRY_CAST(metadata->>'modified' AS DATE) >= current_date - INTERVAL ({{days}}) DAY \
                 ORDER BY metadata->>'modified' DESC NULLS LAST"),
        ),
        "kanban" => view(
            "kanban",
            "Notes grouped by status",
            vec![ViewParameter::optional(
                "status",
                ParamType::List,
                "todo,in-progress,done",
                "Statuses to include, in column order",
            )],
            sql("WHERE metadata->>'status' IN ({{status}}) \
                 ORDER BY metadata->>'status', file_path"),
        ),
        "untagged" => view(
            "untagged",
            "Notes without tags",
            vec![],
            sql("WHERE metadata->'tags' IS NULL OR json_array_length(metadata->'tags') = 0 \
                 ORDER BY metadata->>'created' DESC NULLS LAST"),
        ),
        "orphans" => view(
            "orphans",
            "Notes nothing links to",
            vec![ViewParameter::optional(
                "definition",
                ParamType::String,
                "isolated",
                "no-incoming, no-links or isolated",
            )],
            ViewBody::Special(SpecialView::Orphans),
        ),
        "broken-links" => view(
            "broken-links",
            "Notes with links to missing notes",
            vec![],
            ViewBody::Special(SpecialView::BrokenLinks),
        ),
        _ => return None,
    };
    Some(def)
}

pub fn all() -> Vec<ViewDefinition> {
    BUILTIN_NAMES.iter().filter_map(|n| lookup(n)).collect()
}
