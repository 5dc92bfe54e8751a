use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the fused schema SDL is read from.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct FusedSchemaConfig {
    /// Relative paths resolve against the directory of the configuration file.
    ///
    /// Can also be set via the `FUSED_SCHEMA_PATH` environment variable.
    #[serde(default = "default_fused_schema_path")]
    pub path: String,
}

impl Default for FusedSchemaConfig {
    fn default() -> Self {
        Self {
            path: default_fused_schema_path(),
        }
    }
}

fn default_fused_schema_path() -> String {
    "fused.graphql".to_string()
}

impl FusedSchemaConfig {
    pub fn resolve(&self, root_directory: &Path) -> PathBuf {
        root_directory.join(&self.path)
    }

    pub fn load(&self, root_directory: &Path) -> std::io::Result<String> {
        let path = self.resolve(root_directory);
        std::fs::read_to_string(&path).map_err(|err| {
            std::io::Error::new(
                err.kind(),
                format!("Failed to read fused schema '{}': {}", path.display(), err),
            )
        })
    }
}
