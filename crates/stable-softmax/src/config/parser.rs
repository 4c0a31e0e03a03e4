use std::path::Path;

use crate::config::types::OperatorConfig;
use crate::error::Result;
use crate::tensor::TensorFile;

/// Parse an operator configuration file.
///
/// # Errors
///
/// Returns [`crate::error::SoftmaxError::Io`] if the file cannot be read,
/// or [`crate::error::SoftmaxError::Yaml`] if the YAML is malformed.
pub fn parse_config(path: &Path) -> Result<OperatorConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse an operator configuration from a YAML string.
pub fn parse_config_str(yaml: &str) -> Result<OperatorConfig> {
    let config: OperatorConfig = serde_yaml::from_str(yaml)?;
    Ok(config)
}

/// Text encoding of a tensor file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorFormat {
    Yaml,
    Json,
}

impl TensorFormat {
    /// `.json` files are JSON; everything else is read as YAML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parse a tensor from text.
pub fn parse_tensor_str(text: &str, format: TensorFormat) -> Result<TensorFile> {
    let file = match format {
        TensorFormat::Yaml => serde_yaml::from_str(text)?,
        TensorFormat::Json => serde_json::from_str(text)?,
    };
    Ok(file)
}

/// Load a tensor file, picking the format from the extension.
///
/// # Errors
///
/// Returns [`crate::error::SoftmaxError::Io`] on read failure and the
/// matching parse error for malformed contents.
pub fn load_tensor(path: &Path) -> Result<TensorFile> {
    let content = std::fs::read_to_string(path)?;
    parse_tensor_str(&content, TensorFormat::from_path(path))
}
