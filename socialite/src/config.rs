use crate::providers::gitee::Gitee;
use crate::providers::oschina::OsChina;
use crate::providers::qq::Qq;
use crate::types::{Credentials, OpenidMode};
use anyhow::Context;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable prefix for per-provider overrides.
const ENV_PREFIX: &str = "SOCIALITE";

/// Settings for one provider, as stored in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub appid: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default)]
    pub callback_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_agent_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// QQ only: login page style (`"mobile"` for the mobile page).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// QQ only.
    #[serde(default)]
    pub openid_mode: OpenidMode,
    /// QQ only: request the UnionID from the OpenID endpoint.
    #[serde(default)]
    pub use_unionid: bool,
}

impl ProviderSettings {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            appid: self.appid.clone(),
            app_secret: self.app_secret.clone(),
            callback_url: self.callback_url.clone(),
            login_agent_url: self.login_agent_url.clone(),
            scope: self.scope.clone(),
        }
    }

    pub fn qq(&self) -> Qq {
        let qq = Qq::new()
            .with_openid_mode(self.openid_mode)
            .with_unionid(self.use_unionid);
        match &self.display {
            Some(display) => qq.with_display(display.clone()),
            None => qq,
        }
    }

    pub fn gitee(&self) -> Gitee {
        Gitee
    }

    pub fn oschina(&self) -> OsChina {
        OsChina
    }

    /// Fail if a field every flow needs is blank.
    pub fn ensure_complete(&self, provider_id: &str) -> anyhow::Result<()> {
        for (name, value) in [
            ("appid", &self.appid),
            ("app_secret", &self.app_secret),
            ("callback_url", &self.callback_url),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!(
                    "{} is not configured for provider '{}' (set it in the config file or {})",
                    name,
                    provider_id,
                    env_var_name(provider_id, name)
                );
            }
        }
        Ok(())
    }

    /// Overlay `SOCIALITE_<PROVIDER>_*` environment variables.
    pub fn apply_env(&mut self, provider_id: &str) {
        self.apply_overrides(provider_id, |name| std::env::var(name).ok());
    }

    /// Overlay values from `lookup`, keyed by environment variable name. Blank
    /// values are ignored.
    pub fn apply_overrides(&mut self, provider_id: &str, lookup: impl Fn(&str) -> Option<String>) {
        let get = |field: &str| {
            lookup(&env_var_name(provider_id, field))
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        if let Some(v) = get("appid") {
            self.appid = v;
        }
        if let Some(v) = get("app_secret") {
            self.app_secret = v;
        }
        if let Some(v) = get("callback_url") {
            self.callback_url = v;
        }
        if let Some(v) = get("login_agent_url") {
            self.login_agent_url = Some(v);
        }
    }
}

/// `SOCIALITE_QQ_APP_SECRET` and friends.
pub fn env_var_name(provider_id: &str, field: &str) -> String {
    format!(
        "{}_{}_{}",
        ENV_PREFIX,
        provider_id.to_ascii_uppercase().replace('-', "_"),
        field.to_ascii_uppercase()
    )
}

/// The config file: provider id -> settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
}

/// Reads and writes the config file under an exclusive lock, with atomic saves.
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.socialite/config.json`
    pub fn default_path() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".socialite").join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn staging_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// Create the config directory, owner-only on Unix.
    fn prepare_dir(&self) -> anyhow::Result<()> {
        let Some(dir) = self.path.parent() else {
            return Ok(());
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create config directory {}", dir.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
        }
        Ok(())
    }

    fn acquire(&self) -> anyhow::Result<ConfigLock> {
        self.prepare_dir()?;
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        file.lock_exclusive()
            .with_context(|| format!("cannot lock {}", self.lock_path().display()))?;
        Ok(ConfigLock { file })
    }

    fn with_exclusive_lock<T>(&self, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
        let _lock = self.acquire()?;
        f()
    }

    fn load_unlocked(&self) -> anyhow::Result<AppConfig> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AppConfig::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", self.path.display()))
    }

    fn save_unlocked(&self, config: &AppConfig) -> anyhow::Result<()> {
        let staging = self.staging_path();
        let mut file = create_private(&staging)?;
        serde_json::to_writer_pretty(&mut file, config)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        drop(file);

        // Readers see either the old file or the complete new one.
        fs::rename(&staging, &self.path)
            .with_context(|| format!("cannot replace {}", self.path.display()))?;
        Ok(())
    }

    /// Load the config. A missing file is an empty config.
    pub fn load(&self) -> anyhow::Result<AppConfig> {
        self.with_exclusive_lock(|| self.load_unlocked())
    }

    /// Save the config atomically (temp file, then rename).
    pub fn save(&self, config: &AppConfig) -> anyhow::Result<()> {
        self.with_exclusive_lock(|| self.save_unlocked(config))
    }

    /// Insert or replace one provider's settings.
    pub fn set_provider(&self, provider_id: &str, settings: ProviderSettings) -> anyhow::Result<()> {
        self.with_exclusive_lock(|| {
            let mut cfg = self.load_unlocked()?;
            cfg.providers.insert(provider_id.to_string(), settings);
            self.save_unlocked(&cfg)
        })
    }

    /// Settings for `provider_id` from the file, with environment overrides
    /// applied. Missing entries start out empty.
    pub fn provider(&self, provider_id: &str) -> anyhow::Result<ProviderSettings> {
        let mut settings = self
            .load()?
            .providers
            .remove(provider_id)
            .unwrap_or_default();
        settings.apply_env(provider_id);
        Ok(settings)
    }
}

/// Held for the duration of one load or save.
struct ConfigLock {
    file: fs::File,
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Truncate-create `path`, readable by the owner only on Unix.
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.create(true).truncate(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let file = options.open(path)?;
    // An existing staging file keeps its old mode; tighten it.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    Ok(file)
}
