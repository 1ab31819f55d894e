use crate::commands::{CmdResult, Runtime};
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::model::{PageRequest, SearchParams};
use crate::notebook::Notebook;
use crate::query::QueryBuilder;
use crate::validation::validate_pagination;

pub async fn run<E: QueryExecutor + ?Sized>(
    rt: &Runtime<'_, E>,
    builder: &QueryBuilder<'_>,
    notebook: &Notebook,
    params: SearchParams,
    page: PageRequest,
) -> Result<CmdResult> {
    validate_pagination(page.limit, page.offset)?;
    let limit = rt.pagination.page_size(page.limit.unwrap_or(0));
    let request = params.into_request();
    let built = builder.build(&request, notebook, limit, page.offset)?;

    let results = rt.fetch(notebook, &built, limit, page.offset).await?;
    Ok(CmdResult::default().with_query(&built).with_page(results))
}
