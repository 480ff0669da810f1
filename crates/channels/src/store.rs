use std::path::PathBuf;

use {anyhow::Result, async_trait::async_trait, skylark_config::SkylarkConfig};

/// Authoritative configuration storage.
///
/// The connector core never caches the document beyond a single request;
/// writers replace the whole document (read-modify-append-write), never
/// patch it in place.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load_config(&self) -> Result<SkylarkConfig>;
    async fn write_config_file(&self, config: &SkylarkConfig) -> Result<()>;
}

/// File-backed [`ConfigStore`] over the standard loader.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the discovered (or default) config path.
    #[must_use]
    pub fn at_default_path() -> Self {
        Self::new(skylark_config::find_or_default_config_path())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load_config(&self) -> Result<SkylarkConfig> {
        if !self.path.exists() {
            return Ok(SkylarkConfig::default());
        }
        Ok(skylark_config::load_config(&self.path)?)
    }

    async fn write_config_file(&self, config: &SkylarkConfig) -> Result<()> {
        skylark_config::write_config_file(&self.path, config)?;
        Ok(())
    }
}
