use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use config as config_rs;
use ledger_core::DEFAULT_DIFFICULTY;

/// Beyond this the expected search (16^d hashes) stops being human-tolerable.
pub const MAX_DIFFICULTY: usize = 8;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct NodeConfiguration {
    pub node_id: String,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HttpConfig {
    pub http_addr: SocketAddr,
    pub http_cors: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            http_cors: vec!["*".to_string()],
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LedgerConfig {
    pub difficulty: usize,
    /// Seal a block for every accepted submission.
    pub auto_seal: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            auto_seal: true,
        }
    }
}

impl NodeConfiguration {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let format = if ext == "toml" {
            config_rs::FileFormat::Toml
        } else {
            config_rs::FileFormat::Json
        };

        let cfg = config_rs::Config::builder()
            .add_source(config_rs::File::from(path).format(format))
            .build()
            .with_context(|| format!("failed to load config file: {}", path.display()))?;

        cfg.try_deserialize::<NodeConfiguration>()
            .with_context(|| format!("failed to deserialize config: {}", path.display()))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config parent directory: {}", parent.display())
            })?;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let out = if ext == "toml" {
            toml::to_string_pretty(self).context("failed to serialize config as toml")?
        } else {
            serde_json::to_string_pretty(self).context("failed to serialize config as json")?
        };

        std::fs::write(path, out)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn merge_with_env(mut self) -> Self {
        if let Ok(v) = std::env::var("TOTEM_NODE_ID") {
            self.node_id = v;
        }
        if let Ok(v) = std::env::var("TOTEM_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TOTEM_HTTP_ADDR") {
            if let Ok(addr) = v.parse::<SocketAddr>() {
                self.http.http_addr = addr;
            }
        }
        if let Ok(v) = std::env::var("TOTEM_CORS") {
            let origins = v
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();
            if !origins.is_empty() {
                self.http.http_cors = origins;
            }
        }
        if let Ok(v) = std::env::var("TOTEM_DIFFICULTY") {
            if let Ok(n) = v.parse::<usize>() {
                self.ledger.difficulty = n;
            }
        }
        if let Ok(v) = std::env::var("TOTEM_AUTO_SEAL") {
            if let Ok(b) = v.parse::<bool>() {
                self.ledger.auto_seal = b;
            }
        }
        self
    }

    pub fn merge_with_cli(mut self, cli_args: &crate::cli::Cli) -> Self {
        match &cli_args.command {
            crate::cli::Commands::Init(args) => {
                if let Some(v) = &args.node_id {
                    self.node_id = v.clone();
                }
                if let Some(v) = &args.data_dir {
                    self.data_dir = v.clone();
                }
            }
            crate::cli::Commands::Start(args) => {
                if let Some(v) = &args.data_dir {
                    self.data_dir = v.clone();
                }
                if let Some(v) = &args.http_addr {
                    if let Ok(addr) = v.parse::<SocketAddr>() {
                        self.http.http_addr = addr;
                    }
                }
                if let Some(port) = args.http_port {
                    let ip = self.http.http_addr.ip();
                    self.http.http_addr = SocketAddr::new(ip, port);
                }
                if let Some(d) = args.difficulty {
                    self.ledger.difficulty = d;
                }
                if args.no_auto_seal {
                    self.ledger.auto_seal = false;
                }
            }
            _ => {}
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(anyhow!("node_id: must not be empty"));
        }
        if !self
            .node_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(anyhow!(
                "node_id: must contain only alphanumeric, dash, underscore"
            ));
        }

        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!(
                "data_dir: failed to create or access directory: {}",
                self.data_dir.display()
            )
        })?;

        let test_path = self.data_dir.join(".write_test");
        std::fs::write(&test_path, b"")
            .with_context(|| format!("data_dir: not writable: {}", self.data_dir.display()))?;
        let _ = std::fs::remove_file(&test_path);

        if self.http.http_addr.port() == 0 {
            return Err(anyhow!("http.http_addr: port must not be 0"));
        }
        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(anyhow!(
                "ledger.difficulty: must be between 0 and {MAX_DIFFICULTY}"
            ));
        }

        Ok(())
    }

    pub fn chain_dir(&self) -> PathBuf {
        self.data_dir.join("chain")
    }

    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("totem").join("config.toml")
    }

    pub fn default_data_dir() -> PathBuf {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("totem")
    }
}

impl Default for NodeConfiguration {
    fn default() -> Self {
        Self {
            node_id: "totem-1".to_string(),
            data_dir: Self::default_data_dir(),
            http: HttpConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}
