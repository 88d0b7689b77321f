use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::normalize::{DEFAULT_CATEGORY, NormalizeOptions, PLACEHOLDER_COVER};

/// Site configuration. Resolved from defaults, then an optional YAML file,
/// then `ACERVO_*` environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub project_id: String,
    pub dataset: String,
    pub api_version: String,
    pub use_cdn: bool,
    /// Replaces the query endpoint origin (scheme, host and port).
    pub query_base_url: Option<String>,
    /// Static fallback: a local path or an http(s) URL to a JSON array.
    pub fallback: String,
    /// Extra attempts against the live query before falling back.
    pub retries: u32,
    pub reader_route: String,
    pub placeholder_cover: String,
    pub default_category: String,
    pub reviews_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: "07dzzde3".to_owned(),
            dataset: "production".to_owned(),
            api_version: "2021-10-21".to_owned(),
            use_cdn: true,
            query_base_url: None,
            fallback: "data/obras.json".to_owned(),
            retries: 1,
            reader_route: "./leitura.html".to_owned(),
            placeholder_cover: PLACEHOLDER_COVER.to_owned(),
            default_category: DEFAULT_CATEGORY.to_owned(),
            reviews_dir: PathBuf::from(".acervo/reviews"),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config
            .apply_env(|name| std::env::var(name).ok())
            .context("apply ACERVO_* environment")?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("parse config: {}", path.display()))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("ACERVO_PROJECT_ID") {
            self.project_id = v;
        }
        if let Some(v) = var("ACERVO_DATASET") {
            self.dataset = v;
        }
        if let Some(v) = var("ACERVO_API_VERSION") {
            self.api_version = v;
        }
        if let Some(v) = var("ACERVO_QUERY_BASE_URL") {
            self.query_base_url = Some(v);
        }
        if let Some(v) = var("ACERVO_FALLBACK") {
            self.fallback = v;
        }
        if let Some(v) = var("ACERVO_RETRIES") {
            self.retries = v
                .parse()
                .with_context(|| format!("invalid ACERVO_RETRIES={v:?}"))?;
        }
        if let Some(v) = var("ACERVO_REVIEWS_DIR") {
            self.reviews_dir = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            placeholder_cover: self.placeholder_cover.clone(),
            default_category: self.default_category.clone(),
        }
    }

    /// Origin of the content query API.
    pub fn query_origin(&self) -> String {
        match &self.query_base_url {
            Some(base) => base.trim_end_matches('/').to_owned(),
            None => {
                let host = if self.use_cdn { "apicdn" } else { "api" };
                format!("https://{}.{host}.sanity.io", self.project_id)
            }
        }
    }
}
