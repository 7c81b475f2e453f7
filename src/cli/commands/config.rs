//! Effective configuration command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{CommandOutput, output};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput {
    pub config: Config,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config)
            .map_or_else(|err| format!("Failed to render configuration: {err}"), |yaml| {
                yaml.trim_end().to_string()
            })
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

pub async fn execute(_args: ConfigArgs, config: &Config, json_mode: bool) -> Result<()> {
    output(
        &ConfigOutput {
            config: config.clone(),
        },
        json_mode,
    );
    Ok(())
}
