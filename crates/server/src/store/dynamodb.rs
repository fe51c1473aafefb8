//! Message store over a DynamoDB table.
//!
//! The table is keyed by `author`, with `created_date` as sort key. A global
//! secondary index keyed on a constant partition marker and `created_date`
//! gives a date ordered view over every message.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use futures::StreamExt;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, from_items, to_item};
use tracing::{debug, info, instrument};

use crate::config::DynamoDbConfig;
use crate::error::StoreError;
use crate::models::message::Message;
use crate::models::query::{AccessPath, MessageQuery};
use crate::store::{MessagePage, MessageStore, MessageStream, PageToken};

/// `BatchWriteItem` accepts at most this many requests.
const BATCH_WRITE_LIMIT: usize = 25;
/// Attempts per batch before unprocessed writes are reported as an error.
const BATCH_WRITE_ATTEMPTS: u32 = 8;
const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

type Item = HashMap<String, AttributeValue>;

/// Doubling delay between retries of unprocessed writes.
#[derive(Debug)]
struct Backoff {
    delay: Duration,
    retries_left: u32,
}

impl Backoff {
    fn new(attempts: u32, initial: Duration) -> Self {
        Self {
            delay: initial,
            retries_left: attempts.saturating_sub(1),
        }
    }

    /// Delay before the next retry, `None` once the attempts are used up.
    fn next_delay(&mut self) -> Option<Duration> {
        if self.retries_left == 0 {
            return None;
        }
        self.retries_left -= 1;
        let delay = self.delay;
        self.delay = self.delay.saturating_mul(2);
        Some(delay)
    }
}

fn start_key_to_token(key: &Item) -> Result<PageToken, StoreError> {
    let key: serde_json::Value = from_item(key.clone())?;
    PageToken::from_json(&key)
}

fn token_to_start_key(token: &PageToken) -> Result<Item, StoreError> {
    let key: serde_json::Value = token.json()?;
    Ok(to_item(key)?)
}

pub struct DynamoMessageStore {
    client: Client,
    table: String,
    index: String,
    partition_key: String,
    partition_marker: String,
}

impl DynamoMessageStore {
    pub fn new(client: Client, config: &DynamoDbConfig) -> Self {
        Self {
            client,
            table: config.table.clone(),
            index: config.index.clone(),
            partition_key: config.partition_key.clone(),
            partition_marker: config.partition_marker.clone(),
        }
    }

    fn build_query(&self, query: &MessageQuery) -> QueryFluentBuilder {
        let mut request = self
            .client
            .query()
            .table_name(&self.table)
            .scan_index_forward(query.direction.is_ascending());
        request = match &query.path {
            AccessPath::ByAuthor(author) => request
                .key_condition_expression("#author = :author")
                .expression_attribute_names("#author", "author")
                .expression_attribute_values(":author", AttributeValue::S(author.clone())),
            AccessPath::AllByDate => request
                .index_name(&self.index)
                .key_condition_expression("#gsi_pk = :gsi_pk_value")
                .expression_attribute_names("#gsi_pk", &self.partition_key)
                .expression_attribute_values(
                    ":gsi_pk_value",
                    AttributeValue::S(self.partition_marker.clone()),
                ),
        };
        if let Some(search) = &query.search {
            // only applied to the rows of each page after the key condition
            request = request
                .filter_expression("contains(#text, :search_text)")
                .expression_attribute_names("#text", "text")
                .expression_attribute_values(":search_text", AttributeValue::S(search.clone()));
        }
        request
    }

    /// Writes `messages` into the table, stamping each with the index partition marker.
    #[instrument(skip_all, fields(table = %self.table, count = messages.len()))]
    pub async fn put_messages(&self, messages: &[Message]) -> Result<usize, StoreError> {
        let write_requests = messages
            .iter()
            .map(|message| -> Result<WriteRequest, StoreError> {
                let mut item: Item = to_item(message)?;
                item.insert(
                    self.partition_key.clone(),
                    AttributeValue::S(self.partition_marker.clone()),
                );
                let put = PutRequest::builder().set_item(Some(item)).build()?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut written = 0;
        for batch in write_requests.chunks(BATCH_WRITE_LIMIT) {
            written += self.write_batch(batch.to_vec()).await?;
        }
        info!("wrote {written} messages");
        Ok(written)
    }

    /// Sends one batch, retrying unprocessed writes with a doubling delay.
    async fn write_batch(&self, mut pending: Vec<WriteRequest>) -> Result<usize, StoreError> {
        let total = pending.len();
        let mut backoff = Backoff::new(BATCH_WRITE_ATTEMPTS, INITIAL_BACKOFF);
        loop {
            let output = self
                .client
                .batch_write_item()
                .request_items(&self.table, pending)
                .send()
                .await
                .map_err(aws_sdk_dynamodb::Error::from)?;
            pending = output
                .unprocessed_items()
                .and_then(|items| items.get(&self.table))
                .cloned()
                .unwrap_or_default();
            if pending.is_empty() {
                return Ok(total);
            }
            let Some(delay) = backoff.next_delay() else {
                return Err(StoreError::Unprocessed(pending.len()));
            };
            debug!(
                unprocessed = pending.len(),
                "retrying unprocessed writes in {delay:?}"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MessageStore for DynamoMessageStore {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn fetch_page(
        &self,
        query: &MessageQuery,
        token: Option<PageToken>,
        limit: usize,
    ) -> Result<MessagePage, StoreError> {
        let start_key = token.as_ref().map(token_to_start_key).transpose()?;
        let output = self
            .build_query(query)
            .limit(i32::try_from(limit).unwrap_or(i32::MAX))
            .set_exclusive_start_key(start_key)
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;

        let rows: Vec<Message> = from_items(output.items().to_vec())?;
        let next_token = output
            .last_evaluated_key()
            .map(start_key_to_token)
            .transpose()?;
        debug!(
            rows = rows.len(),
            scanned = output.scanned_count(),
            more = next_token.is_some(),
            "fetched page from dynamodb"
        );
        Ok(MessagePage { rows, next_token })
    }

    fn stream(&self, query: MessageQuery) -> MessageStream {
        let items = self.build_query(&query).into_paginator().items().send();
        futures::stream::unfold(items, |mut items| async move {
            let item = items.next().await?;
            let message = item
                .map_err(|e| StoreError::from(aws_sdk_dynamodb::Error::from(e)))
                .and_then(|item| -> Result<Message, StoreError> { Ok(from_item(item)?) });
            Some((message, items))
        })
        .boxed()
    }
}
