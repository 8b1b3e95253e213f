use std::path::Path;

use serde::de::DeserializeOwned;

use crate::file_format::FileFormat;

pub type Result<T> = anyhow::Result<T>;

pub fn deserialize<T: DeserializeOwned + 'static>(serialized: &str, format: FileFormat) -> Result<T> {
    match format {
        FileFormat::Yaml => Ok(serde_yml::from_str(serialized)?),
        FileFormat::Json => Ok(serde_json::from_str(serialized)?),
        FileFormat::Toml => Ok(toml::from_str(serialized)?),
    }
}

/// Read and deserialize a file, picking the format from its extension.
pub fn read_file<T: DeserializeOwned + 'static>(path: &Path) -> Result<T> {
    let format = FileFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", path.display(), e))?;
    deserialize(&text, format)
        .map_err(|e| anyhow::anyhow!("Failed to parse '{}': {}", path.display(), e))
}
