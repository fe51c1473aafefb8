use std::cmp::min;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::models::image::is_image_name;
use crate::store::{ImagePage, ImageStore, PageToken};

/// Images served straight from a local folder.
pub struct LocalImageStore {
    dir: PathBuf,
    url_prefix: String,
}

impl LocalImageStore {
    pub fn new<P: Into<PathBuf>>(dir: P, url_prefix: &str) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    async fn image_names(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound("Image directory".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_image_name(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    #[instrument(skip(self), fields(dir = ?self.dir))]
    async fn list(
        &self,
        limit: usize,
        token: Option<PageToken>,
    ) -> Result<ImagePage, StoreError> {
        let offset = token.as_ref().map(PageToken::offset).transpose()?.unwrap_or(0);
        let names = self.image_names().await?;
        let total = names.len();
        let end = min(offset.saturating_add(limit), total);
        let images = names[min(offset, total)..end]
            .iter()
            .map(|name| format!("{}/{name}", self.url_prefix))
            .collect::<Vec<_>>();
        let is_truncated = end < total;
        debug!(images = images.len(), total, "listed local images");
        Ok(ImagePage {
            images,
            next_token: is_truncated.then(|| PageToken::from_offset(end)),
            is_truncated,
        })
    }
}

/// Images kept in an S3 bucket, addressed by their public object URL.
pub struct S3ImageStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
    prefix: Option<String>,
}

impl S3ImageStore {
    pub fn new(
        client: aws_sdk_s3::Client,
        bucket: &str,
        region: &str,
        prefix: Option<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            region: region.to_string(),
            prefix,
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket,
            self.region,
            key.replace(' ', "%20")
        )
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list(
        &self,
        limit: usize,
        token: Option<PageToken>,
    ) -> Result<ImagePage, StoreError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(i32::try_from(limit).unwrap_or(i32::MAX))
            .set_prefix(self.prefix.clone())
            .set_continuation_token(token.map(PageToken::into_string))
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        let images = output
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .filter(|key| is_image_name(key))
            .map(|key| self.object_url(key))
            .collect::<Vec<_>>();
        debug!(images = images.len(), "listed s3 objects");
        Ok(ImagePage {
            images,
            next_token: output.next_continuation_token().map(PageToken::new),
            is_truncated: output.is_truncated().unwrap_or(false),
        })
    }
}
