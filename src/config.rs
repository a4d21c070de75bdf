use crate::core::db::connection::Options;
use crate::core::db::driver::ConnectionInfo;
use crate::core::db::params::TypeSignature;
use crate::core::{Result, SafeConnError};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub connection: ConnectionInfo,
    #[serde(default)]
    pub options: OptionsConfig,
}

/// Option switches as written in the configuration file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    pub deduce_type: bool,
    pub reuse_statement: bool,
    pub param_separator: String,
    pub auto_connect: bool,
    pub type_signature: Option<String>,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        let defaults = Options::default();
        OptionsConfig {
            deduce_type: defaults.deduce_type,
            reuse_statement: defaults.reuse_statement,
            param_separator: defaults.param_separator,
            auto_connect: defaults.auto_connect,
            type_signature: None,
        }
    }
}

impl Config {
    pub fn connection_info(&self) -> ConnectionInfo {
        self.connection.clone()
    }

    /// Validates the option table and converts it to runtime `Options`.
    pub fn options(&self) -> Result<Options> {
        let type_signature = self
            .options
            .type_signature
            .as_deref()
            .map(str::parse::<TypeSignature>)
            .transpose()?;

        if !self.options.deduce_type && type_signature.is_none() {
            return Err(SafeConnError::Config(
                "deduce_type = false requires a type_signature".to_string(),
            ));
        }

        Ok(Options {
            deduce_type: self.options.deduce_type,
            reuse_statement: self.options.reuse_statement,
            param_separator: self.options.param_separator.clone(),
            auto_connect: self.options.auto_connect,
            type_signature,
        })
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = safeconn::config::load_config("safeconn.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
