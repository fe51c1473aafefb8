//! Message store over a flat JSON export.
//!
//! The file holds one JSON array of messages. It is parsed element by element on
//! a blocking thread and every matching record is pushed through a bounded
//! channel, so the whole document is never held in memory at once.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::{DeserializeSeed, Error as DeError, SeqAccess, Visitor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::models::message::Message;
use crate::models::query::MessageQuery;
use crate::store::{MessagePage, MessageStore, MessageStream, PageToken};

const CHANNEL_CAPACITY: usize = 256;
const CONSUMER_GONE: &str = "message consumer went away";

type Sink = mpsc::Sender<Result<Message, StoreError>>;

/// Visits the top level array and hands each accepted element to the sink.
struct ForEachMessage<'a, F> {
    sink: &'a Sink,
    accept: F,
}

impl<'de, F> DeserializeSeed<'de> for ForEachMessage<'_, F>
where
    F: FnMut(&Message) -> bool,
{
    type Value = ();

    fn deserialize<D: serde::Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, F> Visitor<'de> for ForEachMessage<'_, F>
where
    F: FnMut(&Message) -> bool,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON array of messages")
    }

    fn visit_seq<A: SeqAccess<'de>>(mut self, mut seq: A) -> Result<(), A::Error> {
        while let Some(message) = seq.next_element::<Message>()? {
            if (self.accept)(&message) && self.sink.blocking_send(Ok(message)).is_err() {
                return Err(DeError::custom(CONSUMER_GONE));
            }
        }
        Ok(())
    }
}

/// Parses `path` and sends every message accepted by `accept` into `sink`.
///
/// Runs on a blocking thread. Returns early, closing the file, once the receiving
/// side is dropped.
pub fn read_messages<F>(path: &Path, accept: F, sink: Sink)
where
    F: FnMut(&Message) -> bool,
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            let _ = sink.blocking_send(Err(e.into()));
            return;
        }
    };
    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));
    let result = ForEachMessage {
        sink: &sink,
        accept,
    }
    .deserialize(&mut deserializer)
    .and_then(|()| deserializer.end());
    match result {
        Ok(()) => {}
        Err(_) if sink.is_closed() => debug!("stopped reading {path:?}: consumer dropped"),
        Err(e) => {
            let _ = sink.blocking_send(Err(e.into()));
        }
    }
}

/// Spawns a blocking reader for `path` and returns the receiving end.
pub fn spawn_reader<F>(
    path: PathBuf,
    accept: F,
) -> (
    mpsc::Receiver<Result<Message, StoreError>>,
    JoinHandle<()>,
)
where
    F: FnMut(&Message) -> bool + Send + 'static,
{
    let (sink, receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = tokio::task::spawn_blocking(move || read_messages(&path, accept, sink));
    (receiver, handle)
}

/// A match tagged with its position in the file.
///
/// Orders by `created_date` in the requested direction, then by file position,
/// so the smallest value is the first row of the result.
struct Ranked {
    message: Message,
    seq: usize,
    ascending: bool,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_date = self.message.created_date.cmp(&other.message.created_date);
        let by_date = if self.ascending { by_date } else { by_date.reverse() };
        by_date.then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

pub struct JsonFileStore {
    path: PathBuf,
    case_sensitive: bool,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P, case_sensitive: bool) -> Self {
        Self {
            path: path.into(),
            case_sensitive,
        }
    }

    fn reader(
        &self,
        query: MessageQuery,
    ) -> (
        mpsc::Receiver<Result<Message, StoreError>>,
        JoinHandle<()>,
    ) {
        let case_sensitive = self.case_sensitive;
        spawn_reader(self.path.clone(), move |message| {
            query.matches(message, case_sensitive)
        })
    }
}

#[async_trait]
impl MessageStore for JsonFileStore {
    #[instrument(skip(self), fields(path = ?self.path))]
    async fn fetch_page(
        &self,
        query: &MessageQuery,
        token: Option<PageToken>,
        limit: usize,
    ) -> Result<MessagePage, StoreError> {
        let offset = token.as_ref().map(PageToken::offset).transpose()?.unwrap_or(0);
        let ascending = query.direction.is_ascending();
        // only the first `offset + limit` rows in index order are ever kept
        let keep = offset.saturating_add(limit);
        let mut best: BinaryHeap<Ranked> = BinaryHeap::new();
        let mut total = 0;

        let (mut receiver, handle) = self.reader(query.clone());
        while let Some(message) = receiver.recv().await {
            let ranked = Ranked {
                message: message?,
                seq: total,
                ascending,
            };
            total += 1;
            if best.len() < keep {
                best.push(ranked);
            } else if let Some(mut last) = best.peek_mut() {
                if ranked < *last {
                    *last = ranked;
                }
            }
        }
        handle.await?;

        let rows: Vec<Message> = best
            .into_sorted_vec()
            .into_iter()
            .skip(offset)
            .map(|ranked| ranked.message)
            .collect();
        let next_token = (keep < total).then(|| PageToken::from_offset(keep));
        debug!(
            rows = rows.len(),
            total,
            more = next_token.is_some(),
            "fetched page from json file"
        );
        Ok(MessagePage { rows, next_token })
    }

    fn stream(&self, query: MessageQuery) -> MessageStream {
        let (mut receiver, _handle) = self.reader(query);
        Box::pin(futures::stream::poll_fn(move |cx| receiver.poll_recv(cx)))
    }
}
