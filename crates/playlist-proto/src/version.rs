//! Version descriptors for the installed file set and the remote repository.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;

/// Token used when a descriptor carries no `version` field.
pub const FALLBACK_VERSION: &str = "0.0";

/// Contents of `version.json`.  Only `version` takes part in comparisons;
/// the other fields are display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDescriptor {
    #[serde(default = "fallback_version", deserialize_with = "version_token")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// Any other keys, carried through a read/write cycle untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PartialEq for VersionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for VersionDescriptor {}

impl fmt::Display for VersionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)?;
        if let Some(build) = &self.build {
            write!(f, " ({})", build)?;
        }
        if self.preview == Some(true) {
            write!(f, " [preview]")?;
        }
        Ok(())
    }
}

fn fallback_version() -> String {
    FALLBACK_VERSION.to_string()
}

/// Accept `"1.4"` as well as `1.4` for the version token.
fn version_token<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => fallback_version(),
        other => other.to_string(),
    })
}

impl VersionDescriptor {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            preview: None,
            build: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn read_from(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_slice(&bytes)?)
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
