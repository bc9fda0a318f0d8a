use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_API_PORT: u16 = 8080;
const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_INDEX_TTL_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct QuillpostConfig {
    pub api_port: u16,
    /// Number of posts per feed page.
    pub page_size: usize,
    pub cache: CacheConfig,
    pub paths: QuillpostPaths,
}

impl QuillpostConfig {
    pub fn from_env() -> Result<Self> {
        let paths = QuillpostPaths::discover()?;
        let api_port = env::var("QUILLPOST_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_API_PORT);
        let page_size = env::var("QUILLPOST_PAGE_SIZE")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .filter(|&size: &usize| size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let cache = CacheConfig::from_env();
        Ok(Self {
            api_port,
            page_size,
            cache,
            paths,
        })
    }

    pub fn new(api_port: u16, paths: QuillpostPaths) -> Self {
        Self {
            api_port,
            page_size: DEFAULT_PAGE_SIZE,
            cache: CacheConfig::default(),
            paths,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a cached landing-page render stays valid.
    pub index_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            index_ttl: Duration::from_secs(DEFAULT_INDEX_TTL_SECS),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let index_ttl = env::var("QUILLPOST_CACHE_TTL_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_INDEX_TTL_SECS));
        Self { index_ttl }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuillpostPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Where image references handed to the core are expected to live.
    /// The backend never reads these files; serving them is someone
    /// else's job.
    pub media_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl QuillpostPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("quillpost.db");
        let media_dir = base.join("media");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            media_dir,
            logs_dir,
        })
    }
}
