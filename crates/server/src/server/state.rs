use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::info;

use crate::config::{AppConfig, ImagesConfig, MessagesConfig};
use crate::store::dynamodb::DynamoMessageStore;
use crate::store::images::{LocalImageStore, S3ImageStore};
use crate::store::json_file::JsonFileStore;
use crate::store::paginate::PaginationOptions;
use crate::store::{ImageStore, MessageStore};

pub struct AppState {
    pub messages: Arc<dyn MessageStore>,
    pub images: Arc<dyn ImageStore>,
    pub pagination: PaginationOptions,
}

pub async fn load_aws_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

impl AppState {
    pub async fn try_init(config: &AppConfig) -> anyhow::Result<Self> {
        let messages: Arc<dyn MessageStore> = match &config.messages {
            MessagesConfig::JsonFile {
                path,
                case_sensitive,
            } => {
                info!("serving messages from json file {path:?}");
                Arc::new(JsonFileStore::new(path, *case_sensitive))
            }
            MessagesConfig::DynamoDb(dynamo) => {
                info!("serving messages from dynamodb table {}", dynamo.table);
                let sdk_config = load_aws_config(dynamo.region.as_deref()).await;
                let client = aws_sdk_dynamodb::Client::new(&sdk_config);
                Arc::new(DynamoMessageStore::new(client, dynamo))
            }
        };
        let images: Arc<dyn ImageStore> = match &config.images {
            ImagesConfig::LocalDir { path, url_prefix } => {
                info!("serving images from directory {path:?}");
                Arc::new(LocalImageStore::new(path, url_prefix))
            }
            ImagesConfig::S3 {
                bucket,
                region,
                prefix,
            } => {
                let sdk_config = load_aws_config(region.as_deref()).await;
                let region = sdk_config
                    .region()
                    .map(|r| r.to_string())
                    .ok_or_else(|| anyhow::anyhow!("no aws region configured for bucket {bucket}"))?;
                info!("serving images from s3 bucket {bucket} in {region}");
                let client = aws_sdk_s3::Client::new(&sdk_config);
                Arc::new(S3ImageStore::new(client, bucket, &region, prefix.clone()))
            }
        };
        Ok(Self {
            messages,
            images,
            pagination: PaginationOptions {
                page_size: config.pagination.page_size,
                fetch_all: config.pagination.fetch_all,
            },
        })
    }
}
