//! Backing stores for messages and gallery images.
//!
//! Every store is read-only. Paged results hand back an opaque [`PageToken`]
//! which must be passed verbatim into the next fetch.

use async_trait::async_trait;
use base64::prelude::BASE64_URL_SAFE_NO_PAD as BASE64;
use base64::Engine;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::models::image::ListImagesResponse;
use crate::models::message::Message;
use crate::models::query::MessageQuery;

pub mod dynamodb;
pub mod images;
pub mod json_file;
pub mod paginate;

pub type MessageStream = BoxStream<'static, Result<Message, StoreError>>;

/// Continuation marker of a paged store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageToken(String);

impl PageToken {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub(crate) fn from_offset(offset: usize) -> Self {
        Self(BASE64.encode(offset.to_string()))
    }

    pub(crate) fn offset(&self) -> Result<usize, StoreError> {
        let raw = BASE64.decode(&self.0).map_err(|_| StoreError::BadToken)?;
        std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(StoreError::BadToken)
    }

    pub(crate) fn from_json<T: Serialize>(value: &T) -> Result<Self, StoreError> {
        Ok(Self(BASE64.encode(serde_json::to_vec(value)?)))
    }

    pub(crate) fn json<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let raw = BASE64.decode(&self.0).map_err(|_| StoreError::BadToken)?;
        serde_json::from_slice(&raw).map_err(|_| StoreError::BadToken)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MessagePage {
    pub rows: Vec<Message>,
    pub next_token: Option<PageToken>,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetches one page of messages matching `query`, at most `limit` rows.
    async fn fetch_page(
        &self,
        query: &MessageQuery,
        token: Option<PageToken>,
        limit: usize,
    ) -> Result<MessagePage, StoreError>;

    /// Streams every message matching `query` as it is read from the store.
    ///
    /// Dropping the stream stops any in-flight read.
    fn stream(&self, query: MessageQuery) -> MessageStream;
}

#[derive(Clone, Debug, Default)]
pub struct ImagePage {
    pub images: Vec<String>,
    pub next_token: Option<PageToken>,
    pub is_truncated: bool,
}

impl From<ImagePage> for ListImagesResponse {
    fn from(page: ImagePage) -> Self {
        Self {
            images: page.images,
            next_token: page.next_token.map(PageToken::into_string),
            is_truncated: Some(page.is_truncated),
        }
    }
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn list(&self, limit: usize, token: Option<PageToken>)
        -> Result<ImagePage, StoreError>;
}
