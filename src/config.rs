// ABOUTME: Run configuration loaded from TOML (tables, scrape sources, delays)
// ABOUTME: Falls back to ~/.adaptive-replicator/config.toml, then built-in defaults

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Tables migrated from the cloud store, in the order they are processed.
pub const DEFAULT_TABLES: [&str; 10] = [
    "inscricoes",
    "monitores",
    "escolas",
    "verification_codes",
    "cursos",
    "turmas",
    "turmas_monitores",
    "turmas_alunas",
    "aulas",
    "frequencia",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Destination namespace
    pub schema: String,
    /// Declared table order for `migrate`
    pub tables: Vec<String>,
    /// Whether an empty source may clear a destination table
    pub allow_empty_replace: bool,
    pub scrape: ScrapeConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            tables: DEFAULT_TABLES.iter().map(|t| t.to_string()).collect(),
            allow_empty_replace: false,
            scrape: ScrapeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeConfig {
    /// Destination table for scraped records
    pub table: String,
    /// Natural key used to skip already-present records
    pub conflict_columns: Vec<String>,
    pub uf: String,
    /// Fixed pause between page requests
    pub delay_ms: u64,
    pub max_pages: u32,
    pub request_timeout_secs: u64,
    /// Where `backup-{rede}-complete.json` files go; no backups when unset
    pub backup_dir: Option<PathBuf>,
    pub sources: Vec<ListingSource>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        let source = |path: &str, rede: &str, publica: bool| ListingSource {
            url: format!("https://escolas.com.br/{}/ma", path),
            rede: rede.to_string(),
            publica,
        };

        Self {
            table: "escolas".to_string(),
            conflict_columns: vec!["nome".to_string(), "municipio".to_string(), "uf".to_string()],
            uf: "MA".to_string(),
            delay_ms: 1000,
            max_pages: 50,
            request_timeout_secs: 30,
            backup_dir: None,
            sources: vec![
                source("particulares", "particular", false),
                source("estaduais", "estadual", true),
                source("federais", "federal", true),
                source("municipais", "municipal", true),
            ],
        }
    }
}

/// One paginated listing to scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSource {
    pub url: String,
    pub rede: String,
    pub publica: bool,
}

impl SyncConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Invalid configuration in {:?}", path))
    }

    /// Load `explicit` if given, else the default file if it exists, else
    /// the built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Using configuration from {:?}", path);
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        crate::utils::validate_postgres_identifier(&self.schema)
            .context("Invalid destination schema")?;
        for table in &self.tables {
            crate::utils::validate_postgres_identifier(table)
                .with_context(|| format!("Invalid table in configuration: '{}'", table))?;
        }
        crate::utils::validate_postgres_identifier(&self.scrape.table)
            .context("Invalid scrape table")?;
        for column in &self.scrape.conflict_columns {
            crate::utils::validate_postgres_identifier(column)
                .with_context(|| format!("Invalid conflict column '{}'", column))?;
        }
        if self.scrape.max_pages == 0 {
            bail!("scrape.max_pages must be at least 1");
        }
        let mut redes: Vec<&str> = self.scrape.sources.iter().map(|s| s.rede.as_str()).collect();
        redes.sort_unstable();
        if redes.windows(2).any(|w| w[0] == w[1]) {
            bail!("scrape.sources contains the same rede more than once");
        }
        Ok(())
    }
}

/// `~/.adaptive-replicator/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".adaptive-replicator").join("config.toml"))
}
