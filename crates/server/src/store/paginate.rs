use tracing::{debug, instrument, warn};

use crate::error::StoreError;
use crate::models::message::Message;
use crate::models::query::MessageQuery;
use crate::store::MessageStore;

#[derive(Clone, Copy, Debug)]
pub struct PaginationOptions {
    /// Row bound of a single store fetch.
    pub page_size: usize,
    /// Walk every page even without a search term.
    pub fetch_all: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Collected {
    pub messages: Vec<Message>,
    /// The store had more pages that were not fetched.
    pub truncated: bool,
}

/// Fetches pages from `store` until the result is complete for `query`.
///
/// Without a search term only the first page is fetched, unless `fetch_all` is
/// set. A search term is a post-filter, so an empty page says nothing about the
/// ones after it and every page has to be walked. Any failed fetch discards
/// the rows collected so far.
#[instrument(skip(store))]
pub async fn collect_messages(
    store: &dyn MessageStore,
    query: &MessageQuery,
    options: PaginationOptions,
) -> Result<Collected, StoreError> {
    let walk_all = options.fetch_all || query.requires_full_scan();
    let mut messages = Vec::new();
    let mut token = None;
    let mut pages = 0usize;
    loop {
        let page = store.fetch_page(query, token, options.page_size).await?;
        pages += 1;
        messages.extend(page.rows);
        token = page.next_token;
        if token.is_none() || !walk_all {
            break;
        }
    }
    let truncated = token.is_some();
    if truncated {
        warn!(
            rows = messages.len(),
            "returning first page only, the store holds more matching rows"
        );
    }
    debug!(pages, rows = messages.len(), "collected messages");
    Ok(Collected {
        messages,
        truncated,
    })
}
