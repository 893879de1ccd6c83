use anyhow::{bail, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Mac,
    Linux,
    Windows,
    Wsl,
    Other,
}

impl Platform {
    /// Every family except Windows provides the posix-only modules.
    pub fn is_posix(self) -> bool {
        !matches!(self, Platform::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(platform_to_str(*self))
    }
}

/// Process environment as seen by the aggregator: env vars, platform family
/// and the located config file.
#[derive(Debug, Clone)]
pub struct ContextEnv {
    vars: BTreeMap<String, String>,
    platform: Platform,
    config_path: Option<PathBuf>,
}

impl ContextEnv {
    pub fn new() -> Self {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: BTreeMap<String, String>) -> Self {
        let platform = detect_platform(&vars);
        Self {
            vars,
            platform,
            config_path: None,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Whether a UI toolkit can start: a display server on Linux/WSL/other,
    /// always on Mac and Windows.
    pub fn toolkit_available(&self) -> bool {
        match self.platform {
            Platform::Mac | Platform::Windows => true,
            Platform::Linux | Platform::Wsl | Platform::Other => {
                self.var("DISPLAY").is_some() || self.var("WAYLAND_DISPLAY").is_some()
            }
        }
    }

    /// Config path precedence:
    /// 1) --config (must exist)
    /// 2) PANOPLY_CONFIG (must exist)
    /// 3) XDG_CONFIG_HOME/panoply/config.toml (used only if present)
    pub fn locate_config(&mut self, cli_config: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(p) = cli_config {
            if !p.exists() {
                bail!("--config was provided but file does not exist: {}", p.display());
            }
            self.config_path = Some(p.to_path_buf());
            return Ok(self.config_path.clone());
        }

        if let Some(p) = self.var("PANOPLY_CONFIG").map(PathBuf::from) {
            if !p.exists() {
                bail!("PANOPLY_CONFIG is set but file does not exist: {}", p.display());
            }
            self.config_path = Some(p);
            return Ok(self.config_path.clone());
        }

        let p = self.default_config_path();
        if p.exists() {
            self.config_path = Some(p);
        }
        Ok(self.config_path.clone())
    }

    fn default_config_path(&self) -> PathBuf {
        let base = match self.var("XDG_CONFIG_HOME") {
            Some(xdg) => PathBuf::from(xdg),
            None => dirs::home_dir()
                .or_else(|| self.var("HOME").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config"),
        };
        base.join("panoply").join("config.toml")
    }
}

impl Default for ContextEnv {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_platform(vars: &BTreeMap<String, String>) -> Platform {
    let is_wsl = vars.contains_key("WSL_DISTRO_NAME") || vars.contains_key("WSL_INTEROP");
    if is_wsl {
        return Platform::Wsl;
    }

    if cfg!(target_os = "macos") {
        Platform::Mac
    } else if cfg!(target_os = "windows") {
        Platform::Windows
    } else if cfg!(target_os = "linux") {
        Platform::Linux
    } else {
        Platform::Other
    }
}

fn platform_to_str(p: Platform) -> &'static str {
    match p {
        Platform::Mac => "mac",
        Platform::Linux => "linux",
        Platform::Windows => "windows",
        Platform::Wsl => "wsl",
        Platform::Other => "other",
    }
}
