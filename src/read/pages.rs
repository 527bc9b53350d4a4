use futures_util::{Stream, TryStreamExt, stream};
use serde::de::DeserializeOwned;
use serde_dynamo::from_items;
use std::sync::Arc;
use tracing::debug;

use crate::Error;
use crate::client::StoreClient;
use crate::read::ScanUnit;
use crate::write::Item;

/// One page returned by a scan call
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanPage {
    /// Items of the page
    pub items: Vec<Item>,
    /// Number of items returned after filtering
    pub count: i32,
    /// Number of items evaluated before filtering
    pub scanned_count: i32,
    /// Continuation token for the next page
    pub last_evaluated_key: Option<Item>,
}

impl ScanPage {
    /// Whether the store reported more data after this page
    pub fn has_more(&self) -> bool {
        self.last_evaluated_key
            .as_ref()
            .is_some_and(|key| !key.is_empty())
    }
}

/// Transform from a scan page to one output element
pub type PageMapper<O> = Arc<dyn Fn(ScanPage) -> Result<O, Error> + Send + Sync>;

/// Mapper emitting the raw items of each page
pub fn items() -> PageMapper<Vec<Item>> {
    Arc::new(|page: ScanPage| -> Result<Vec<Item>, Error> {
        Ok(page.items)
    })
}

/// Mapper deserializing the items of each page into `T`
pub fn typed<T>() -> PageMapper<Vec<T>>
where
    T: DeserializeOwned + 'static,
{
    Arc::new(|page: ScanPage| -> Result<Vec<T>, Error> {
        if page.items.is_empty() {
            return Ok(Vec::new());
        }
        Ok(from_items(page.items)?)
    })
}

/// Scan one segment to completion, emitting one mapped output per page
///
/// Pages are fetched lazily, one call per poll, until a page comes back
/// without a continuation token.
pub fn paginate<'a, C, O>(
    client: &'a C,
    unit: ScanUnit,
    mapper: &'a PageMapper<O>,
) -> impl Stream<Item = Result<O, Error>> + 'a
where
    C: StoreClient + ?Sized,
    O: 'a,
{
    stream::try_unfold(Some(unit), move |state| async move {
        let Some(unit) = state else {
            return Ok::<_, Error>(None);
        };

        let page = client.scan(&unit).await?;
        debug!(
            table = unit.request().table_name(),
            segment = unit.segment(),
            items = page.items.len(),
            more = page.has_more(),
            "Fetched scan page"
        );

        let next = unit.next_page(&page);
        let output = mapper(page)?;
        Ok(Some((output, next)))
    })
}

/// Collect every page of one segment
pub async fn read_segment<C, O>(
    client: &C,
    unit: ScanUnit,
    mapper: &PageMapper<O>,
) -> Result<Vec<O>, Error>
where
    C: StoreClient + ?Sized,
{
    paginate(client, unit, mapper).try_collect().await
}
