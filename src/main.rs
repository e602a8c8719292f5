#![warn(clippy::dbg_macro, clippy::todo)]

mod admission;
mod annotate;
mod apiservice;
mod apply;
mod assets;
mod certs;
mod cluster;
mod config;
mod environment;
#[cfg(test)]
mod fake;
mod fingerprint;
mod hiveconfig;

use std::sync::Arc;

use futures::StreamExt;
use hiveconfig::{Context, HiveConfigSpec};
use kube::{
    client::Client,
    runtime::{watcher::Config, Controller},
    Api,
};
use log::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    KubeError {
        #[from]
        source: kube::Error,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Secret {secret} did not contain key {key}")]
    MissingKey { secret: String, key: String },
    #[error("Invalid manifest asset: {0}")]
    Asset(String),
    #[error("Failed to serialize object: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid HiveConfig: {0}")]
    UserInputError(String),
}

impl Error {
    /// True for both locally detected absence and a 404 from the API server.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::KubeError {
                source: kube::Error::Api(e),
            } => e.code == 404,
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), kube::Error> {
    env_logger::Builder::new()
        .parse_env(env_logger::Env::default().default_filter_or("info"))
        .init();
    let client = Client::try_default().await?;

    let context = Arc::new(Context::new(client.clone(), config::CONFIG.clone()));
    info!(
        "starting hiveconfig controller (image override: {:?}, pull policy override: {:?})",
        context.config.image, context.config.image_pull_policy
    );

    Controller::new(Api::all(client), Config::default())
        .run(HiveConfigSpec::reconcile, HiveConfigSpec::on_error, context)
        .for_each(|reconciliation_result| async move {
            match reconciliation_result {
                Ok(hive_config) => {
                    info!("HiveConfig reconciliation successful. Resource: {:?}", hive_config);
                }
                Err(reconciliation_err) => {
                    error!("HiveConfig reconciliation error: {:?}", reconciliation_err)
                }
            }
        })
        .await;
    Ok(())
}
