use std::fs::read_to_string;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::server::constants::DEFAULT_MESSAGE_PAGE_SIZE;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_address")]
    pub address: String,
}

impl ServerConfig {
    fn default_address() -> String {
        "0.0.0.0:3000".to_string()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DynamoDbConfig {
    #[serde(default = "DynamoDbConfig::default_table")]
    pub table: String,
    #[serde(default = "DynamoDbConfig::default_index")]
    pub index: String,
    #[serde(default = "DynamoDbConfig::default_partition_key")]
    pub partition_key: String,
    #[serde(default = "DynamoDbConfig::default_partition_marker")]
    pub partition_marker: String,
    pub region: Option<String>,
}

impl DynamoDbConfig {
    fn default_table() -> String {
        "chat_messages".to_string()
    }
    fn default_index() -> String {
        "GSI_PartitionKey-created_date-index".to_string()
    }
    fn default_partition_key() -> String {
        "GSI_PartitionKey".to_string()
    }
    fn default_partition_marker() -> String {
        "ALL_MESSAGES".to_string()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagesConfig {
    JsonFile {
        path: PathBuf,
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },
    #[serde(rename = "dynamodb")]
    DynamoDb(DynamoDbConfig),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImagesConfig {
    LocalDir {
        #[serde(default = "ImagesConfig::default_dir")]
        path: PathBuf,
        #[serde(default = "ImagesConfig::default_url_prefix")]
        url_prefix: String,
    },
    S3 {
        bucket: String,
        region: Option<String>,
        prefix: Option<String>,
    },
}

impl ImagesConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from("public/img")
    }
    fn default_url_prefix() -> String {
        "/img".to_string()
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self::LocalDir {
            path: Self::default_dir(),
            url_prefix: Self::default_url_prefix(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "PaginationConfig::default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub fetch_all: bool,
}

impl PaginationConfig {
    fn default_page_size() -> usize {
        DEFAULT_MESSAGE_PAGE_SIZE
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: Self::default_page_size(),
            fetch_all: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub messages: MessagesConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl AppConfig {
    pub fn from_yaml_file<P: Into<PathBuf>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.into();
        let content = read_to_string(&path).with_context(|| format!("path: {path:?}"))?;
        Self::from_yaml_str(&content).with_context(|| format!("path: {path:?}"))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, anyhow::Error> {
        let config: Self = serde_yaml::from_str(content)?;
        anyhow::ensure!(
            config.pagination.page_size > 0,
            "pagination.page_size should be >= 1"
        );
        Ok(config)
    }
}
