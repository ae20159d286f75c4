// src/deploy/credentials.rs

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::fs::FileSystem;

/// Transfer endpoint credentials, read from their own TOML file when a
/// deploy runs. They never appear in the manifest.
///
/// ```toml
/// host = "ftp.example.com"
/// user = "deploy"
/// password = "..."
/// port = 21
/// ```
///
/// A `host` of the form `file:///srv/www` targets a local mirror directory.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferCredentials {
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl fmt::Debug for TransferCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferCredentials")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

impl TransferCredentials {
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let bytes = fs
            .read(path)
            .with_context(|| format!("reading transfer credentials {}", path.display()))?;
        let text = String::from_utf8(bytes)
            .with_context(|| format!("credentials file {} is not UTF-8", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("parsing transfer credentials {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn debug_output_redacts_password() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "transfer.toml",
            "host = \"ftp.example.com\"\nuser = \"deploy\"\npassword = \"hunter2\"\n",
        );
        let creds = TransferCredentials::load(&fs, Path::new("transfer.toml")).unwrap();

        assert_eq!(creds.user, "deploy");
        let shown = format!("{creds:?}");
        assert!(!shown.contains("hunter2"), "{shown}");
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let fs = MockFileSystem::new();
        let err = TransferCredentials::load(&fs, Path::new("nope.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("nope.toml"));
    }
}
