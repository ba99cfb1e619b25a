//! Client configuration.

use std::path::{Path, PathBuf};

/// Where the client finds its certificate and keeps its local state.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub db_path: PathBuf,
    pub cache_dir: PathBuf,
    /// Name we announce for ourselves, overriding whatever a peer claims.
    pub device_name: String,
}

impl ClientConfig {
    /// Conventional layout under one data directory:
    /// `cert.pem`, `key.pem`, `catalog.db` and `blocks/`.
    pub fn in_dir(data_dir: &Path) -> Self {
        ClientConfig {
            cert_path: data_dir.join("cert.pem"),
            key_path: data_dir.join("key.pem"),
            db_path: data_dir.join("catalog.db"),
            cache_dir: data_dir.join("blocks"),
            device_name: "farview".to_string(),
        }
    }

    pub fn with_device_name(mut self, name: &str) -> Self {
        self.device_name = name.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_data_dir() {
        let config = ClientConfig::in_dir(Path::new("/var/lib/farview")).with_device_name("shelf");
        assert_eq!(config.cert_path, Path::new("/var/lib/farview/cert.pem"));
        assert_eq!(config.cache_dir, Path::new("/var/lib/farview/blocks"));
        assert_eq!(config.device_name, "shelf");
    }
}
