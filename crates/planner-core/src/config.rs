use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use planner_shared::TaskFilter;
use tracing::{debug, info, trace, warn};

/// Environment variables mapped onto config keys.
const ENV_OVERRIDES: [(&str, &str); 2] = [
    ("PLANNER_API_ENDPOINT", "api.endpoint"),
    ("PLANNER_API_KEY", "api.key"),
];

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Config {
    pub fn defaults() -> Self {
        let mut map = HashMap::new();
        map.insert("api.timeout".to_string(), "30".to_string());
        map.insert("color".to_string(), "on".to_string());
        map.insert("default.filter".to_string(), TaskFilter::All.name().to_string());
        Self {
            map,
            loaded_files: vec![],
        }
    }

    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Self::defaults();

        let rc = resolve_rc_path(rc_override)?;
        if let Some(path) = rc {
            info!(plannerrc = %path.display(), "loading plannerrc");
            cfg.load_file(&path)?;
        } else {
            debug!("no plannerrc found; using defaults");
        }

        cfg.apply_env(std::env::vars());
        Ok(cfg)
    }

    /// Copies recognised `PLANNER_*` variables over the loaded values.
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some((_, key)) = ENV_OVERRIDES.iter().find(|(env, _)| *env == name) else {
                continue;
            };
            debug!(env = %name, key, "applying environment override");
            self.map.insert((*key).to_string(), value);
        }
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> anyhow::Result<Option<bool>> {
        self.map
            .get(key)
            .map(|v| parse_bool(v).ok_or_else(|| anyhow!("invalid boolean for {key}: {v}")))
            .transpose()
    }

    pub fn api_timeout(&self) -> anyhow::Result<Duration> {
        let raw = self.get("api.timeout").unwrap_or_else(|| "30".to_string());
        let secs: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid api.timeout: {raw}"))?;
        if secs == 0 {
            return Err(anyhow!("api.timeout must be at least 1 second"));
        }
        Ok(Duration::from_secs(secs))
    }

    pub fn default_filter(&self) -> anyhow::Result<TaskFilter> {
        match self.get("default.filter") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid default.filter: {raw}")),
            None => Ok(TaskFilter::All),
        }
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }
            if line.is_empty() {
                continue;
            }

            if let Some(include_rest) = line.strip_prefix("include ") {
                let include_path = resolve_include_path(&base_dir, include_rest.trim())?;
                debug!(
                    file = %path.display(),
                    include = %include_path.display(),
                    line = line_num + 1,
                    "processing include"
                );

                if self.loaded_files.contains(&include_path) {
                    warn!(include = %include_path.display(), "include already loaded; skipping");
                } else if include_path.exists() {
                    self.load_file(&include_path)?;
                } else {
                    warn!(
                        include = %include_path.display(),
                        "include file does not exist; skipping"
                    );
                }
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            if key.is_empty() {
                return Err(anyhow!(
                    "empty key on config line {}:{}",
                    path.display(),
                    line_num + 1
                ));
            }
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

#[tracing::instrument(skip(override_path))]
fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var("PLANNERRC") {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let candidate = home.join(".plannerrc");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn resolve_include_path(base_dir: &Path, include: &str) -> anyhow::Result<PathBuf> {
    if include.trim().is_empty() {
        return Err(anyhow!("include path cannot be empty"));
    }

    let expanded = expand_tilde(Path::new(include));
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "on" | "true" => Some(true),
        "0" | "n" | "no" | "off" | "false" => Some(false),
        _ => None,
    }
}
