use crate::commands::{CmdResult, Runtime};
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::model::{ListOptions, PageRequest};
use crate::notebook::Notebook;
use crate::query::QueryBuilder;
use crate::validation::validate_pagination;

pub async fn run<E: QueryExecutor + ?Sized>(
    rt: &Runtime<'_, E>,
    builder: &QueryBuilder<'_>,
    notebook: &Notebook,
    options: &ListOptions,
    page: PageRequest,
) -> Result<CmdResult> {
    validate_pagination(page.limit, page.offset)?;
    let limit = rt.pagination.page_size(page.limit.unwrap_or(0));
    let built = builder.list(options, limit, page.offset)?;
    let results = rt.fetch(notebook, &built, limit, page.offset).await?;
    Ok(CmdResult::default().with_query(&built).with_page(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::memory::InMemoryExecutor;
    use crate::model::{NotebookSource, Row, SortBy, SortOrder};
    use crate::notebook::NotebookConfig;
    use crate::pagination::PaginationEngine;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tokio_util::sync::CancellationToken;

    fn notebook() -> Notebook {
        Notebook {
            path: PathBuf::from("/nb"),
            config: NotebookConfig::new("test"),
            source: NotebookSource::Explicit,
        }
    }

    #[tokio::test]
    async fn last_page_has_no_continuation() {
        let rows = (0..7).map(|i| Row::note(format!("{i}.md"))).collect();
        let exec = InMemoryExecutor::new().with_rows("/nb", rows);
        let cancel = CancellationToken::new();
        let rt = Runtime::new(&exec, PaginationEngine::default(), &cancel);
        let views = BTreeMap::new();
        let builder = QueryBuilder::new(&views);

        let options = ListOptions {
            sort_by: SortBy::Created,
            sort_order: SortOrder::Asc,
            pattern: None,
        };
        let result = run(&rt, &builder, &notebook(), &options, PageRequest::new(Some(5), 5))
            .await
            .unwrap();
        let page = result.page.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pagination.page, 2);
        assert!(!page.pagination.has_more);
        assert_eq!(page.pagination.next_offset, None);

        let sql = &exec.statements().await[0];
        assert!(sql.contains("ORDER BY metadata->>'created' ASC NULLS LAST"));
    }

    #[tokio::test]
    async fn traversal_pattern_is_rejected_up_front() {
        let exec = InMemoryExecutor::new();
        let cancel = CancellationToken::new();
        let rt = Runtime::new(&exec, PaginationEngine::default(), &cancel);
        let views = BTreeMap::new();
        let builder = QueryBuilder::new(&views);

        let options = ListOptions {
            pattern: Some("../../**/*.md".into()),
            ..Default::default()
        };
        let err = run(&rt, &builder, &notebook(), &options, PageRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_security());
        assert!(exec.statements().await.is_empty());
    }
}
