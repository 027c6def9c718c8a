use crate::services::placement::PlacementSettings;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub share_prefix: String,
    pub usage_ceiling: u64,
    pub usage_unit_bytes: u64,
    pub share_cache_ttl_secs: u64,
    pub conflict_retries: u32,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Capacity-aware share-backed document store")]
pub struct Args {
    /// Host to bind to (overrides SHARE_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SHARE_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding one sub-directory per share (overrides SHARE_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides SHARE_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Share name prefix; shares are named `{prefix}01`, `{prefix}02`, ...
    #[arg(long)]
    pub share_prefix: Option<String>,

    /// A share accepts writes while its usage is below this many units
    #[arg(long)]
    pub usage_ceiling: Option<u64>,

    /// Bytes per usage unit
    #[arg(long)]
    pub usage_unit_bytes: Option<u64>,

    /// Seconds to resume share scans from the last writable share (0 disables)
    #[arg(long)]
    pub share_cache_ttl_secs: Option<u64>,

    /// How often an upload is re-placed after losing a name race
    #[arg(long)]
    pub conflict_retries: Option<u32>,

    /// Largest accepted upload body in bytes
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

/// Read `key` from the environment, parsing it, or fall back to `default`.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    /// CLI values win over environment values, which win over defaults.
    pub fn merge(args: Args) -> Result<Self> {
        let cfg = Self {
            host: match args.host {
                Some(v) => v,
                None => env_or("SHARE_STORE_HOST", "0.0.0.0".to_string())?,
            },
            port: match args.port {
                Some(v) => v,
                None => env_or("SHARE_STORE_PORT", 3000)?,
            },
            storage_dir: match args.storage_dir {
                Some(v) => v,
                None => env_or("SHARE_STORE_STORAGE_DIR", "./data/shares".to_string())?,
            },
            database_url: match args.database_url {
                Some(v) => v,
                None => env_or(
                    "SHARE_STORE_DATABASE_URL",
                    "sqlite://./data/meta/share_store.db".to_string(),
                )?,
            },
            share_prefix: match args.share_prefix {
                Some(v) => v,
                None => env_or("SHARE_STORE_SHARE_PREFIX", "share".to_string())?,
            },
            usage_ceiling: match args.usage_ceiling {
                Some(v) => v,
                None => env_or("SHARE_STORE_USAGE_CEILING", 4999)?,
            },
            usage_unit_bytes: match args.usage_unit_bytes {
                Some(v) => v,
                None => env_or("SHARE_STORE_USAGE_UNIT_BYTES", 1 << 30)?,
            },
            share_cache_ttl_secs: match args.share_cache_ttl_secs {
                Some(v) => v,
                None => env_or("SHARE_STORE_SHARE_CACHE_TTL_SECS", 300)?,
            },
            conflict_retries: match args.conflict_retries {
                Some(v) => v,
                None => env_or("SHARE_STORE_CONFLICT_RETRIES", 3)?,
            },
            max_upload_bytes: match args.max_upload_bytes {
                Some(v) => v,
                None => env_or("SHARE_STORE_MAX_UPLOAD_BYTES", 100 << 20)?,
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.share_prefix.is_empty()
            || !self
                .share_prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            anyhow::bail!(
                "share prefix `{}` must be lowercase letters, digits or hyphens",
                self.share_prefix
            );
        }
        if self.usage_unit_bytes == 0 {
            anyhow::bail!("usage unit must be at least one byte");
        }
        if self.usage_ceiling == 0 {
            anyhow::bail!("usage ceiling must be at least 1");
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn placement_settings(&self) -> PlacementSettings {
        PlacementSettings {
            share_prefix: self.share_prefix.clone(),
            usage_ceiling: self.usage_ceiling,
            share_cache_ttl: match self.share_cache_ttl_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            host: Some("127.0.0.1".into()),
            port: Some(8080),
            storage_dir: Some("/tmp/shares".into()),
            database_url: Some("sqlite::memory:".into()),
            share_prefix: Some("fileshare".into()),
            usage_ceiling: Some(10),
            usage_unit_bytes: Some(1024),
            share_cache_ttl_secs: Some(0),
            conflict_retries: Some(1),
            max_upload_bytes: Some(1 << 20),
            migrate: false,
        }
    }

    #[test]
    fn cli_values_are_used() {
        let cfg = AppConfig::merge(args()).unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:8080");
        assert_eq!(cfg.usage_ceiling, 10);

        let settings = cfg.placement_settings();
        assert_eq!(settings.share_prefix, "fileshare");
        assert!(settings.share_cache_ttl.is_none());
    }

    #[test]
    fn cache_ttl_maps_to_duration() {
        let mut a = args();
        a.share_cache_ttl_secs = Some(30);
        let settings = AppConfig::merge(a).unwrap().placement_settings();
        assert_eq!(settings.share_cache_ttl, Some(Duration::from_secs(30)));
    }

    #[test]
    fn rejects_bad_prefix_and_unit() {
        let mut a = args();
        a.share_prefix = Some("Bad Prefix".into());
        assert!(AppConfig::merge(a).is_err());

        let mut a = args();
        a.usage_unit_bytes = Some(0);
        assert!(AppConfig::merge(a).is_err());
    }

    #[test]
    fn rejects_zero_usage_ceiling() {
        let mut a = args();
        a.usage_ceiling = Some(0);
        let err = AppConfig::merge(a).unwrap_err();
        assert!(err.to_string().contains("usage ceiling"));

        let mut a = args();
        a.usage_ceiling = Some(1);
        assert_eq!(AppConfig::merge(a).unwrap().usage_ceiling, 1);
    }
}
