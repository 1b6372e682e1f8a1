//! Effective configuration.

use std::path::Path;

use crate::config::{self, Config};

/// Print the configuration with secrets masked; optionally save it.
pub fn cmd_config(config: &Config, path: Option<&Path>, write: bool) -> anyhow::Result<()> {
    let mut shown = config.clone();
    let credentials = &mut shown.credentials;
    for secret in [&mut credentials.api_password, &mut credentials.tmdb_api_key] {
        if secret.is_some() {
            *secret = Some("********".into());
        }
    }
    print!("{}", toml::to_string_pretty(&shown)?);

    if write {
        match path {
            Some(path) => config::save_to(config, path)?,
            None => config::save(config)?,
        }
    }
    Ok(())
}
