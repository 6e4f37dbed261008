use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use filmswap_core::{BanPolicy, SwapConfig};

const PLACEHOLDER_TOKENS: &[&str] = &["", "change-me", "dev-token-change-me"];

/// Server settings, read from `FILMSWAP_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub backup_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub operator_token: String,
    pub command_token: String,
    pub swap: SwapConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = var("FILMSWAP_DB_PATH").unwrap_or_else(|| "filmswap.db".into());
        let backup_dir = var("FILMSWAP_BACKUP_DIR").unwrap_or_else(|| "backups".into());
        let host = var("FILMSWAP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("FILMSWAP_PORT")
            .unwrap_or_else(|| "3100".into())
            .parse()
            .context("FILMSWAP_PORT must be a port number")?;

        let operator_token = var("FILMSWAP_OPERATOR_TOKEN").unwrap_or_default();
        if PLACEHOLDER_TOKENS.contains(&operator_token.trim()) {
            bail!("FILMSWAP_OPERATOR_TOKEN must be set to a non-placeholder value");
        }
        let command_token = var("FILMSWAP_COMMAND_TOKEN").unwrap_or_default();
        if PLACEHOLDER_TOKENS.contains(&command_token.trim()) {
            bail!("FILMSWAP_COMMAND_TOKEN must be set to a non-placeholder value");
        }
        if command_token == operator_token {
            bail!("FILMSWAP_COMMAND_TOKEN must differ from FILMSWAP_OPERATOR_TOKEN");
        }

        let ban_policy: BanPolicy = match var("FILMSWAP_BAN_POLICY") {
            Some(raw) => raw.parse()?,
            None => BanPolicy::default(),
        };
        let match_seed = var("FILMSWAP_MATCH_SEED")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .context("FILMSWAP_MATCH_SEED must be an unsigned integer")?;

        Ok(Self {
            db_path: PathBuf::from(db_path),
            backup_dir: PathBuf::from(backup_dir),
            host,
            port,
            operator_token,
            command_token,
            swap: SwapConfig {
                ban_policy,
                match_seed,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_with_a_token() {
        let config = Config::from_lookup(lookup(&[
            ("FILMSWAP_OPERATOR_TOKEN", "s3cret"),
            ("FILMSWAP_COMMAND_TOKEN", "ch4t"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("filmswap.db"));
        assert_eq!(config.backup_dir, PathBuf::from("backups"));
        assert_eq!(config.port, 3100);
        assert_eq!(config.swap.ban_policy, BanPolicy::Permissive);
        assert_eq!(config.swap.match_seed, None);
    }

    #[test]
    fn placeholder_token_is_refused() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("FILMSWAP_OPERATOR_TOKEN", "change-me")])).is_err());
        // The chat layer needs its own token.
        assert!(Config::from_lookup(lookup(&[("FILMSWAP_OPERATOR_TOKEN", "s3cret")])).is_err());
        assert!(
            Config::from_lookup(lookup(&[
                ("FILMSWAP_OPERATOR_TOKEN", "s3cret"),
                ("FILMSWAP_COMMAND_TOKEN", "s3cret"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn parses_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("FILMSWAP_OPERATOR_TOKEN", "s3cret"),
            ("FILMSWAP_COMMAND_TOKEN", "ch4t"),
            ("FILMSWAP_PORT", "8080"),
            ("FILMSWAP_BAN_POLICY", "join-only"),
            ("FILMSWAP_MATCH_SEED", "42"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.swap.ban_policy, BanPolicy::JoinOnly);
        assert_eq!(config.swap.match_seed, Some(42));

        let bad = Config::from_lookup(lookup(&[
            ("FILMSWAP_OPERATOR_TOKEN", "s3cret"),
            ("FILMSWAP_COMMAND_TOKEN", "ch4t"),
            ("FILMSWAP_MATCH_SEED", "soon"),
        ]));
        assert!(bad.is_err());
    }
}
