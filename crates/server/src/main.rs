use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, MessagesConfig};
use crate::server::state::load_aws_config;
use crate::store::dynamodb::DynamoMessageStore;

pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod export;
pub(crate) mod models;
pub(crate) mod server;
pub(crate) mod store;

#[cfg(test)]
mod tests;

#[derive(Debug, Parser)]
#[command(version, about = "Chat archive viewer backend")]
struct Cli {
    /// Path of the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Convert a raw chat export into the streamlined message format.
    Convert {
        #[arg(long, default_value = "data/messages.json")]
        input: PathBuf,
        #[arg(long, default_value = "data/converted_messages.json")]
        output: PathBuf,
    },
    /// Load streamlined messages into the configured DynamoDB table.
    Load {
        #[arg(long, default_value = "data/converted_messages.json")]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = AppConfig::from_yaml_file(&cli.config)?;
            server::run_all(&config).await?;
        }
        Command::Convert { input, output } => {
            let total = export::convert(&input, &output)
                .await
                .with_context(|| format!("converting {input:?}"))?;
            info!("converted {total} messages into {output:?}");
        }
        Command::Load { input } => {
            let config = AppConfig::from_yaml_file(&cli.config)?;
            let MessagesConfig::DynamoDb(dynamo) = &config.messages else {
                anyhow::bail!("load requires a dynamodb message backend");
            };
            let sdk_config = load_aws_config(dynamo.region.as_deref()).await;
            let store = DynamoMessageStore::new(aws_sdk_dynamodb::Client::new(&sdk_config), dynamo);
            let total = export::load(&store, &input)
                .await
                .with_context(|| format!("loading {input:?}"))?;
            info!("loaded {total} messages into {}", dynamo.table);
        }
    }

    Ok(())
}
