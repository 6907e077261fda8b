use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use usagemon_core::process::DEFAULT_TIMEOUT;
use usagemon_core::Service;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Usage monitor for AI coding agent CLIs")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Timeout per CLI invocation in milliseconds
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// Print outcomes as JSON
    #[arg(long)]
    pub json: bool,

    /// Services to query (claude, codex, gemini); defaults to all enabled
    pub services: Vec<Service>,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Wall-clock budget for each CLI invocation in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Per-service settings
    #[serde(default)]
    pub services: ServicesSettings,

    /// Refresh interval for periodic monitoring in seconds (not used by one-shot runs)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Usage notification settings (not used by one-shot runs)
    #[serde(default)]
    pub notifications: NotificationSettings,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_refresh_interval() -> u64 {
    300
}

/// Settings for each known service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesSettings {
    #[serde(default = "default_claude")]
    pub claude: ServiceSettings,
    #[serde(default = "default_codex")]
    pub codex: ServiceSettings,
    #[serde(default = "default_gemini")]
    pub gemini: ServiceSettings,
}

impl ServicesSettings {
    /// Settings for `service`
    pub fn get(&self, service: Service) -> &ServiceSettings {
        match service {
            Service::Claude => &self.claude,
            Service::Codex => &self.codex,
            Service::Gemini => &self.gemini,
        }
    }
}

impl Default for ServicesSettings {
    fn default() -> Self {
        Self {
            claude: default_claude(),
            codex: default_codex(),
            gemini: default_gemini(),
        }
    }
}

/// Settings for a single service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Include this service when none are named on the command line
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Executable to run instead of the default CLI name
    #[serde(default)]
    pub command: Option<String>,

    /// Display name (empty = product name)
    #[serde(default)]
    pub name: String,

    /// Display icon
    #[serde(default)]
    pub icon: String,
}

fn default_enabled() -> bool {
    true
}

impl ServiceSettings {
    /// Name to show for `service`
    pub fn label(&self, service: Service) -> &str {
        if self.name.trim().is_empty() {
            service.display_name()
        } else {
            &self.name
        }
    }
}

fn service_defaults(service: Service, icon: &str) -> ServiceSettings {
    ServiceSettings {
        enabled: default_enabled(),
        command: None,
        name: service.display_name().to_string(),
        icon: icon.to_string(),
    }
}

fn default_claude() -> ServiceSettings {
    service_defaults(Service::Claude, "🟠")
}

fn default_codex() -> ServiceSettings {
    service_defaults(Service::Codex, "🟢")
}

fn default_gemini() -> ServiceSettings {
    service_defaults(Service::Gemini, "🔵")
}

/// Notification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Enable notifications
    #[serde(default)]
    pub enabled: bool,

    /// Usage percentages that should trigger a notification
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<u8>,
}

fn default_thresholds() -> Vec<u8> {
    vec![50, 75, 90]
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            thresholds: default_thresholds(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            services: ServicesSettings::default(),
            refresh_interval_secs: default_refresh_interval(),
            notifications: NotificationSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                return Self::load_file(p);
            }
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("usagemon/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/usagemon/config.toml")),
            dirs::home_dir().map(|p| p.join(".usagemon.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::load_file(path);
            }
        }

        Ok(Self::default())
    }

    fn load_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(timeout_ms) = cli.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
    }

    /// Validate and normalize settings values
    pub fn validate(&mut self) {
        const MIN_TIMEOUT_MS: u64 = 1;

        if self.timeout_ms < MIN_TIMEOUT_MS {
            self.timeout_ms = MIN_TIMEOUT_MS;
        }
        self.notifications.thresholds.retain(|t| *t <= 100);
        self.notifications.thresholds.sort_unstable();
        self.notifications.thresholds.dedup();
    }

    /// Collection timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Services to query: the ones named on the command line, else all enabled
    pub fn selected_services(&self, requested: &[Service]) -> Vec<Service> {
        if !requested.is_empty() {
            let mut selected = Vec::new();
            for service in requested {
                if !selected.contains(service) {
                    selected.push(*service);
                }
            }
            return selected;
        }
        Service::ALL
            .into_iter()
            .filter(|s| self.services.get(*s).enabled)
            .collect()
    }
}
