use crate::errors::{AppError, AppResult};
use crate::ui::messages::success;
use crate::utils::time::{MS_PER_DAY, MS_PER_HOUR};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub default_driver: Option<String>,
    #[serde(default = "default_planned_duration_ms")]
    pub default_planned_duration_ms: i64,
    #[serde(default = "default_ride_expiry_hours")]
    pub ride_expiry_hours: i64,
    #[serde(default = "default_shift_expiry_days")]
    pub shift_expiry_days: i64,
    #[serde(default = "default_max_shift_duration_hours")]
    pub max_shift_duration_hours: i64,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_address")]
    pub default_address: String,
}

fn default_database() -> String {
    Config::database_file().to_string_lossy().to_string()
}
fn default_planned_duration_ms() -> i64 {
    8 * MS_PER_HOUR
}
fn default_ride_expiry_hours() -> i64 {
    4
}
fn default_shift_expiry_days() -> i64 {
    2
}
fn default_max_shift_duration_hours() -> i64 {
    24
}
fn default_busy_timeout_ms() -> u64 {
    5_000
}
fn default_address() -> String {
    "Address not provided".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            default_driver: None,
            default_planned_duration_ms: default_planned_duration_ms(),
            ride_expiry_hours: default_ride_expiry_hours(),
            shift_expiry_days: default_shift_expiry_days(),
            max_shift_duration_hours: default_max_shift_duration_hours(),
            busy_timeout_ms: default_busy_timeout_ms(),
            default_address: default_address(),
        }
    }
}

impl Config {
    /// Return the standard configuration directory (`~/.shiftledger`).
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".shiftledger")
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("shiftledger.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("shiftledger.sqlite")
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_file())
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn ride_expiry_ms(&self) -> i64 {
        self.ride_expiry_hours * MS_PER_HOUR
    }

    pub fn shift_expiry_ms(&self) -> i64 {
        self.shift_expiry_days * MS_PER_DAY
    }

    pub fn max_shift_duration_ms(&self) -> i64 {
        self.max_shift_duration_hours * MS_PER_HOUR
    }

    /// Initialize configuration and database files
    pub fn init_all(custom_db: Option<String>, is_test: bool) -> AppResult<Self> {
        let dir = Self::config_dir();

        // DB path: user provided or default
        let db_path = match custom_db {
            Some(name) => {
                let p = Path::new(&name);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    dir.join(p)
                }
            }
            None => Self::database_file(),
        };

        let config = Config {
            database: db_path.to_string_lossy().to_string(),
            ..Config::default()
        };

        // Write config file
        if !is_test {
            fs::create_dir_all(&dir)?;
            let yaml = serde_yaml::to_string(&config).map_err(|e| AppError::Config(e.to_string()))?;
            let mut file = fs::File::create(Self::config_file())?;
            file.write_all(yaml.as_bytes())?;
            success(format!("Config file: {:?}", Self::config_file()));
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        Ok(config)
    }
}
