use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::StoreError;
use crate::models::message::Message;
use crate::models::query::MessageQuery;
use crate::store::{MessagePage, MessageStore, MessageStream, PageToken};

pub fn message(author: &str, created_date: &str, text: &str) -> Message {
    Message {
        author: author.to_string(),
        created_date: created_date.to_string(),
        text: text.to_string(),
        topic_id: None,
        message_id: None,
    }
}

pub fn scenario() -> Vec<Message> {
    vec![
        message("A", "t1", "hello"),
        message("A", "t2", "world"),
        message("B", "t3", "hello world"),
    ]
}

/// In-memory store with DynamoDB semantics: `limit` bounds the rows evaluated
/// per page and the search term is applied afterwards, so a page may come back
/// empty while later pages still hold matches.
pub struct VecStore {
    messages: Vec<Message>,
    fail_on_fetch: Option<usize>,
    pub fetches: AtomicUsize,
}

impl VecStore {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            fail_on_fetch: None,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Fails the `n`th fetch, counting from one.
    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on_fetch = Some(n);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn keyed(&self, query: &MessageQuery) -> Vec<Message> {
        let mut keyed: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| query.author().map_or(true, |author| m.author == author))
            .cloned()
            .collect();
        keyed.sort_by(|a, b| a.created_date.cmp(&b.created_date));
        if !query.direction.is_ascending() {
            keyed.reverse();
        }
        keyed
    }
}

#[async_trait]
impl MessageStore for VecStore {
    async fn fetch_page(
        &self,
        query: &MessageQuery,
        token: Option<PageToken>,
        limit: usize,
    ) -> Result<MessagePage, StoreError> {
        let fetch = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_fetch == Some(fetch) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "store unavailable",
            )));
        }
        let offset = token.as_ref().map(PageToken::offset).transpose()?.unwrap_or(0);
        let keyed = self.keyed(query);
        let end = (offset + limit).min(keyed.len());
        let rows = keyed[offset.min(end)..end]
            .iter()
            .filter(|m| query.matches(m, true))
            .cloned()
            .collect();
        let next_token = (end < keyed.len()).then(|| PageToken::from_offset(end));
        Ok(MessagePage { rows, next_token })
    }

    fn stream(&self, query: MessageQuery) -> MessageStream {
        let mut items: Vec<Result<Message, StoreError>> = self
            .keyed(&query)
            .into_iter()
            .filter(|m| query.matches(m, true))
            .map(Ok)
            .collect();
        if self.fail_on_fetch.is_some() {
            items.push(Err(StoreError::BadToken));
        }
        futures::stream::iter(items).boxed()
    }
}
