//! Offline tooling around the raw chat export.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, instrument, warn};

use crate::error::StoreError;
use crate::models::message::Message;
use crate::store::dynamodb::DynamoMessageStore;
use crate::store::json_file::spawn_reader;

const CONVERT_CHUNK_SIZE: usize = 200;
const LOAD_CHUNK_SIZE: usize = 500;

/// Rewrites a raw export into a streamlined message array.
///
/// Records are read and written in chunks, the input is never fully loaded.
/// The array goes to a sibling `.partial` file that replaces `output` only
/// once the whole input converted cleanly.
#[instrument]
pub async fn convert(input: &Path, output: &Path) -> Result<usize, StoreError> {
    let partial = partial_path(output);
    match write_converted(input, &partial).await {
        Ok(total) => {
            tokio::fs::rename(&partial, output).await?;
            Ok(total)
        }
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                warn!("could not remove {partial:?}: {cleanup}");
            }
            Err(e)
        }
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("converted"));
    name.push(".partial");
    output.with_file_name(name)
}

async fn write_converted(input: &Path, output: &Path) -> Result<usize, StoreError> {
    let (mut receiver, handle) = spawn_reader(input.to_path_buf(), |_| true);
    let mut writer = BufWriter::new(File::create(output).await?);
    let mut chunk: Vec<Message> = Vec::with_capacity(CONVERT_CHUNK_SIZE);
    let mut total = 0;

    writer.write_all(b"[").await?;
    loop {
        let next = receiver.recv().await.transpose()?;
        let done = next.is_none();
        chunk.extend(next);
        if chunk.len() >= CONVERT_CHUNK_SIZE || (done && !chunk.is_empty()) {
            for message in chunk.drain(..) {
                if total > 0 {
                    writer.write_all(b",").await?;
                }
                writer.write_all(&serde_json::to_vec(&message)?).await?;
                total += 1;
            }
            info!("written {total} messages");
        }
        if done {
            break;
        }
    }
    writer.write_all(b"]").await?;
    writer.flush().await?;
    handle.await?;
    Ok(total)
}

/// Loads a streamlined message array into DynamoDB.
#[instrument(skip(store))]
pub async fn load(store: &DynamoMessageStore, input: &Path) -> Result<usize, StoreError> {
    let (mut receiver, handle) = spawn_reader(input.to_path_buf(), |_| true);
    let mut chunk = Vec::with_capacity(LOAD_CHUNK_SIZE);
    let mut total = 0;
    while let Some(message) = receiver.recv().await {
        chunk.push(message?);
        if chunk.len() >= LOAD_CHUNK_SIZE {
            total += store.put_messages(&chunk).await?;
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        total += store.put_messages(&chunk).await?;
    }
    handle.await?;
    Ok(total)
}
