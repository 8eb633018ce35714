use crate::error::{LedgerError, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// 24 leading zero bits
pub const DEFAULT_DIFFICULTY: u32 = 6;
/// Target is `1 << (256 - 4 * difficulty)`, so 63 leaves a 4-bit target
pub const MAX_DIFFICULTY: u32 = 63;
pub const DEFAULT_SUBSIDY: u64 = 10;

static DEFAULT_DATA_DIR: &str = "data";

const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";
const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";
const SUBSIDY_KEY: &str = "LEDGER_SUBSIDY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub difficulty: u32,
    pub subsidy: u64,
}

// Every field is optional in the file; missing ones keep their current value
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    difficulty: Option<u32>,
    subsidy: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            difficulty: DEFAULT_DIFFICULTY,
            subsidy: DEFAULT_SUBSIDY,
        }
    }
}

impl Config {
    /// Defaults overridden by whatever environment variables are set.
    ///
    /// Unparseable values are logged and ignored here; `load` is the strict
    /// variant.
    pub fn from_env() -> Config {
        let mut config = Config::default();
        if let Err(e) = config.apply_env() {
            log::warn!("Ignoring environment configuration: {e}");
        }
        config
    }

    /// Full resolution: defaults, then `file` if given, then environment.
    pub fn load(file: Option<&Path>) -> Result<Config> {
        let mut config = Config::default();
        if let Some(path) = file {
            config.apply_file(path)?;
        }
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config> {
        let mut config = Config::default();
        config.apply_toml(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        self.apply_toml(&contents)
    }

    fn apply_toml(&mut self, contents: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(contents)?;
        if let Some(data_dir) = file.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(difficulty) = file.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(subsidy) = file.subsidy {
            self.subsidy = subsidy;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = env::var(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(value) = env::var(DIFFICULTY_KEY) {
            self.difficulty = value
                .parse()
                .map_err(|e| LedgerError::Config(format!("{DIFFICULTY_KEY}={value}: {e}")))?;
        }
        if let Ok(value) = env::var(SUBSIDY_KEY) {
            self.subsidy = value
                .parse()
                .map_err(|e| LedgerError::Config(format!("{SUBSIDY_KEY}={value}: {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty == 0 || self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "Difficulty must be within 1..={MAX_DIFFICULTY}, got {}",
                self.difficulty
            )));
        }
        if self.subsidy == 0 {
            return Err(LedgerError::Config(
                "Subsidy must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory of the sled database holding the chain.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("blocks")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(config.subsidy, DEFAULT_SUBSIDY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_only_given_fields() {
        let config = Config::from_toml_str("difficulty = 2\n").unwrap();
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.subsidy, DEFAULT_SUBSIDY);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        assert!(matches!(
            Config::from_toml_str("mining_reward = 5\n"),
            Err(LedgerError::Config(_))
        ));
    }

    #[test]
    fn test_difficulty_bounds() {
        assert!(Config::from_toml_str("difficulty = 0\n").is_err());
        assert!(Config::from_toml_str("difficulty = 64\n").is_err());
        assert!(Config::from_toml_str("difficulty = 63\n").is_ok());
    }

    #[test]
    fn test_zero_subsidy_rejected() {
        assert!(Config::from_toml_str("subsidy = 0\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        fs::write(&path, "data_dir = \"/tmp/ledger\"\nsubsidy = 25\n").unwrap();

        let mut config = Config::default();
        config.apply_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ledger"));
        assert_eq!(config.subsidy, 25);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/ledger/blocks"));
    }
}
