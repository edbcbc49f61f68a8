//! Configuration system for chatblocks.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. CLI flags (highest priority)
//! 2. Environment variables (CHATBLOCKS_*)
//! 3. Project manifests (.chatblocks/manifest.yaml, innermost wins)
//! 4. User global (~/.config/chatblocks/config.yaml)
//! 5. Built-in defaults (lowest priority)
//!
//! This module provides:
//! - `Config` struct with all settings
//! - `EnvVar` registry for documentation
//! - Helper functions for env var parsing
//! - Config loading and merging

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conversations::DEFAULT_BASE_URL;
use crate::platform::Platform;
use crate::session::SessionOptions;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration for chatblocks.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Embedded browser view settings
    pub embed: EmbedConfig,
    /// Behavior settings
    pub behavior: BehaviorConfig,
    /// Per-platform endpoints
    pub platforms: PlatformsConfig,
}

/// Embedded browser view settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EmbedConfig {
    /// View height in pixels
    pub height: u32,
    /// Page zoom, clamped to 0.1-2.0 when read
    pub zoom_factor: f64,
}

pub const DEFAULT_HEIGHT: u32 = 800;
pub const DEFAULT_ZOOM_FACTOR: f64 = 0.9;
const MIN_ZOOM_FACTOR: f64 = 0.1;
const MAX_ZOOM_FACTOR: f64 = 2.0;

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            height: DEFAULT_HEIGHT,
            zoom_factor: DEFAULT_ZOOM_FACTOR,
        }
    }
}

impl EmbedConfig {
    pub fn zoom(&self) -> f64 {
        if self.zoom_factor.is_nan() {
            return DEFAULT_ZOOM_FACTOR;
        }
        self.zoom_factor.clamp(MIN_ZOOM_FACTOR, MAX_ZOOM_FACTOR)
    }
}

/// Behavior defaults.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Suppress notices
    pub quiet: bool,
    /// Debounce window in milliseconds for every platform (null = per-platform default)
    pub debounce_ms: Option<u64>,
}

/// Per-platform endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PlatformsConfig {
    /// Base URL of a self-hosted Open WebUI instance (null = http://localhost:3000/)
    pub openwebui_url: Option<String>,
    /// Base for thread URLs built from detected ChatGPT conversations
    pub chatgpt_base_url: String,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            openwebui_url: None,
            chatgpt_base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

// ============================================================================
// Config Source Tracking
// ============================================================================

/// Source of a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in default
    Default,
    /// User global config (~/.config/chatblocks/config.yaml)
    UserGlobal,
    /// Project manifest (.chatblocks/manifest.yaml)
    ProjectManifest(String),
    /// Environment variable
    EnvVar(String),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::UserGlobal => write!(f, "~/.config/chatblocks/config.yaml"),
            ConfigSource::ProjectManifest(path) => write!(f, "{}", path),
            ConfigSource::EnvVar(name) => write!(f, "${}", name),
        }
    }
}

// ============================================================================
// Environment Variable Registry
// ============================================================================

/// Environment variable definition for documentation.
pub struct EnvVar {
    /// Variable name (e.g., "CHATBLOCKS_QUIET")
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Default value or behavior
    pub default: &'static str,
    /// Config path this maps to (e.g., "behavior.quiet")
    pub config_path: &'static str,
    /// Valid values (if enumerable)
    pub values: Option<&'static str>,
}

pub const ENV_QUIET: &str = "CHATBLOCKS_QUIET";
pub const ENV_DEBOUNCE_MS: &str = "CHATBLOCKS_DEBOUNCE_MS";
pub const ENV_OPENWEBUI_URL: &str = "CHATBLOCKS_OPENWEBUI_URL";
pub const ENV_LOG: &str = "CHATBLOCKS_LOG";

/// Registry of all supported environment variables.
pub const ENV_VARS: &[EnvVar] = &[
    EnvVar {
        name: "NO_COLOR",
        description: "Disable colored output (standard)",
        default: "unset",
        config_path: "-",
        values: Some("any non-empty value"),
    },
    EnvVar {
        name: ENV_QUIET,
        description: "Suppress notices after mutations",
        default: "false",
        config_path: "behavior.quiet",
        values: Some("1, true, yes"),
    },
    EnvVar {
        name: ENV_DEBOUNCE_MS,
        description: "Debounce window for navigation events",
        default: "per platform (300 or 2000)",
        config_path: "behavior.debounce_ms",
        values: Some("milliseconds"),
    },
    EnvVar {
        name: ENV_OPENWEBUI_URL,
        description: "Base URL of a self-hosted Open WebUI",
        default: "http://localhost:3000/",
        config_path: "platforms.openwebui_url",
        values: Some("http(s) URL"),
    },
    EnvVar {
        name: ENV_LOG,
        description: "Log filter for diagnostics on stderr",
        default: "warn",
        config_path: "-",
        values: Some("error, warn, info, debug, trace, or a tracing filter"),
    },
];

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Parse a boolean environment variable.
///
/// Returns `Some(true)` if the variable is set to a truthy value (1, true, yes),
/// `Some(false)` if set to a falsy value (0, false, no),
/// and `None` if unset or empty.
pub fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| {
        if v.is_empty() {
            return None;
        }
        let lower = v.to_lowercase();
        match lower.as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        }
    })
}

/// Parse a string environment variable.
///
/// Returns `Some(value)` if set and non-empty, `None` otherwise.
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub fn env_u64(name: &str) -> Option<u64> {
    env_string(name).and_then(|v| v.trim().parse().ok())
}

// ============================================================================
// Config Loading
// ============================================================================

/// Manifest file name within .chatblocks/
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Config directory name
pub const CONFIG_DIR: &str = ".chatblocks";

/// Load configuration from all file sources.
///
/// Resolution order (later overrides earlier):
/// 1. Built-in defaults
/// 2. User global (~/.config/chatblocks/config.yaml)
/// 3. Project manifests in every ancestor of `cwd`, outermost first
///
/// ENV vars are checked at point of use.
pub fn load_config(cwd: &Path) -> LoadedConfig {
    let mut config = Config::default();
    let mut sources = vec![ConfigSource::Default];

    if let Some(user_config_path) = user_config_path() {
        if let Some(user_config) = load_manifest(&user_config_path) {
            merge(&mut config, &user_config);
            sources.push(ConfigSource::UserGlobal);
        }
    }

    for path in collect_manifest_paths(cwd) {
        if let Some(manifest_config) = load_manifest(&path) {
            merge(&mut config, &manifest_config);
            sources.push(ConfigSource::ProjectManifest(
                path.to_string_lossy().to_string(),
            ));
        }
    }

    LoadedConfig { config, sources }
}

/// Result of loading configuration with source tracking.
#[derive(Debug)]
pub struct LoadedConfig {
    /// The merged configuration
    pub config: Config,
    /// Sources that contributed to this config (in order of application)
    pub sources: Vec<ConfigSource>,
}

/// Get the user config file path (~/.config/chatblocks/config.yaml).
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chatblocks").join("config.yaml"))
}

/// Load a manifest file, returning None if it doesn't exist or can't be parsed.
pub fn load_manifest(path: &Path) -> Option<Config> {
    let content = fs::read_to_string(path).ok()?;
    match serde_yaml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "ignoring unparsable manifest");
            None
        }
    }
}

/// Manifests in `cwd` and its ancestors, outermost first.
fn collect_manifest_paths(cwd: &Path) -> Vec<PathBuf> {
    let cwd = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
    let mut paths: Vec<PathBuf> = cwd
        .ancestors()
        .map(|dir| dir.join(CONFIG_DIR).join(MANIFEST_FILE))
        .filter(|manifest| manifest.is_file())
        .collect();
    paths.reverse();
    paths
}

/// Merge overlay config into base config.
///
/// Non-default values in overlay override values in base.
pub fn merge(base: &mut Config, overlay: &Config) {
    let default_embed = EmbedConfig::default();
    if overlay.embed.height != default_embed.height {
        base.embed.height = overlay.embed.height;
    }
    if overlay.embed.zoom_factor != default_embed.zoom_factor {
        base.embed.zoom_factor = overlay.embed.zoom_factor;
    }

    let default_behavior = BehaviorConfig::default();
    if overlay.behavior.quiet != default_behavior.quiet {
        base.behavior.quiet = overlay.behavior.quiet;
    }
    if overlay.behavior.debounce_ms.is_some() {
        base.behavior.debounce_ms = overlay.behavior.debounce_ms;
    }

    if overlay.platforms.openwebui_url.is_some() {
        base.platforms.openwebui_url = overlay.platforms.openwebui_url.clone();
    }
    if overlay.platforms.chatgpt_base_url != DEFAULT_BASE_URL {
        base.platforms.chatgpt_base_url = overlay.platforms.chatgpt_base_url.clone();
    }
}

/// Generate JSON schema for the config.
pub fn json_schema() -> String {
    let schema = schemars::schema_for!(Config);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}

/// Check if quiet mode is enabled (suppress notices).
///
/// Checks both config.behavior.quiet and CHATBLOCKS_QUIET env var.
pub fn is_quiet(config: &Config) -> bool {
    env_bool(ENV_QUIET).unwrap_or(config.behavior.quiet)
}

/// Debounce override, env first.
pub fn debounce_override(config: &Config) -> Option<Duration> {
    env_u64(ENV_DEBOUNCE_MS)
        .or(config.behavior.debounce_ms)
        .map(Duration::from_millis)
}

fn http_url(raw: String) -> Option<String> {
    let url = raw.trim();
    (url.starts_with("http://") || url.starts_with("https://")).then(|| url.to_string())
}

/// The Open WebUI base URL, env first. Values without an http(s) scheme are skipped.
pub fn openwebui_url(config: &Config) -> Option<String> {
    env_string(ENV_OPENWEBUI_URL)
        .and_then(http_url)
        .or_else(|| config.platforms.openwebui_url.clone().and_then(http_url))
}

/// Session options for `platform` under this configuration.
pub fn session_options(config: &Config, platform: Platform) -> SessionOptions {
    let fallback_url = match platform {
        Platform::Openwebui => openwebui_url(config),
        _ => None,
    };
    SessionOptions {
        debounce: debounce_override(config),
        fallback_url,
        base_url: config.platforms.chatgpt_base_url.clone(),
        ..SessionOptions::default()
    }
}

/// Generate a template manifest with comments.
pub fn template_manifest() -> String {
    r#"# chatblocks configuration manifest
# Place in .chatblocks/manifest.yaml

# Embedded view
# embed:
#   height: 800
#   zoom_factor: 0.9     # clamped to 0.1 - 2.0

# Behavior settings
# behavior:
#   quiet: false
#   debounce_ms: null    # null = per-platform default (300 or 2000)

# Platform endpoints
# platforms:
#   openwebui_url: null  # e.g. http://localhost:3000/
#   chatgpt_base_url: https://chatgpt.com
"#
    .to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to serialize env var tests
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn with_env<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let originals: Vec<_> = vars
            .iter()
            .map(|(k, _)| (*k, std::env::var(*k).ok()))
            .collect();

        // SAFETY: env access is serialized by ENV_MUTEX
        unsafe {
            for (k, v) in vars {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }

        let result = f();

        unsafe {
            for (k, original) in originals {
                match original {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }

        result
    }

    #[test]
    fn test_env_bool() {
        let cases = vec![
            (Some("1"), Some(true)),
            (Some("true"), Some(true)),
            (Some("YES"), Some(true)),
            (Some("0"), Some(false)),
            (Some("no"), Some(false)),
            (Some(""), None),
            (Some("maybe"), None),
            (None, None),
        ];
        for (value, want) in cases {
            let got = with_env(&[("CHATBLOCKS_TEST_BOOL", value)], || {
                env_bool("CHATBLOCKS_TEST_BOOL")
            });
            assert_eq!(got, want, "env_bool({:?}) = {:?}, want {:?}", value, got, want);
        }
    }

    #[test]
    fn test_env_u64() {
        with_env(&[("CHATBLOCKS_TEST_NUM", Some(" 250 "))], || {
            assert_eq!(env_u64("CHATBLOCKS_TEST_NUM"), Some(250));
        });
        with_env(&[("CHATBLOCKS_TEST_NUM", Some("soon"))], || {
            assert_eq!(env_u64("CHATBLOCKS_TEST_NUM"), None);
        });
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embed.height, 800);
        assert_eq!(config.embed.zoom(), 0.9);
        assert!(!config.behavior.quiet);
        assert_eq!(config.platforms.chatgpt_base_url, "https://chatgpt.com");
    }

    #[test]
    fn test_zoom_is_clamped() {
        let cases = vec![(0.0, 0.1), (0.5, 0.5), (5.0, 2.0), (f64::NAN, 0.9)];
        for (zoom_factor, want) in cases {
            let embed = EmbedConfig {
                zoom_factor,
                ..EmbedConfig::default()
            };
            let got = embed.zoom();
            assert_eq!(got, want, "zoom({:?}) = {:?}, want {:?}", zoom_factor, got, want);
        }
    }

    #[test]
    fn test_merge_overlay_wins() {
        let mut base = Config::default();
        let mut overlay = Config::default();
        overlay.embed.height = 600;
        overlay.behavior.debounce_ms = Some(50);

        merge(&mut base, &overlay);

        assert_eq!(base.embed.height, 600);
        assert_eq!(base.behavior.debounce_ms, Some(50));
        // Untouched values keep their defaults
        assert_eq!(base.embed.zoom_factor, 0.9);
        assert!(base.platforms.openwebui_url.is_none());
    }

    #[test]
    fn test_merge_default_overlay_keeps_base() {
        let mut base = Config::default();
        base.platforms.openwebui_url = Some("http://ai.lan/".into());
        merge(&mut base, &Config::default());
        assert_eq!(base.platforms.openwebui_url.as_deref(), Some("http://ai.lan/"));
    }

    #[test]
    fn test_manifests_outermost_first() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("notes").join("daily");
        fs::create_dir_all(inner.join(CONFIG_DIR)).unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(
            dir.path().join(CONFIG_DIR).join(MANIFEST_FILE),
            "embed:\n  height: 500\nbehavior:\n  quiet: true\n",
        )
        .unwrap();
        fs::write(inner.join(CONFIG_DIR).join(MANIFEST_FILE), "embed:\n  height: 640\n").unwrap();

        let loaded = load_config(&inner);
        assert_eq!(loaded.config.embed.height, 640);
        assert!(loaded.config.behavior.quiet);
        let manifests = loaded
            .sources
            .iter()
            .filter(|s| matches!(s, ConfigSource::ProjectManifest(_)))
            .count();
        assert_eq!(manifests, 2);
    }

    #[test]
    fn test_unparsable_manifest_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        let path = dir.path().join(CONFIG_DIR).join(MANIFEST_FILE);
        fs::write(&path, "embed: [not, a, map").unwrap();
        assert!(load_manifest(&path).is_none());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.behavior.debounce_ms = Some(900);
        config.platforms.openwebui_url = Some("https://webui.example.org/".into());

        with_env(
            &[
                (ENV_DEBOUNCE_MS, Some("120")),
                (ENV_OPENWEBUI_URL, None),
                (ENV_QUIET, Some("yes")),
            ],
            || {
                assert_eq!(debounce_override(&config), Some(Duration::from_millis(120)));
                assert_eq!(
                    openwebui_url(&config).as_deref(),
                    Some("https://webui.example.org/")
                );
                assert!(is_quiet(&config));
            },
        );

        with_env(
            &[
                (ENV_DEBOUNCE_MS, None),
                (ENV_OPENWEBUI_URL, Some("ftp://nope")),
                (ENV_QUIET, None),
            ],
            || {
                assert_eq!(debounce_override(&config), Some(Duration::from_millis(900)));
                assert_eq!(
                    openwebui_url(&config).as_deref(),
                    Some("https://webui.example.org/")
                );
                assert!(!is_quiet(&config));
            },
        );
    }

    #[test]
    fn test_openwebui_url_skips_non_http_sources() {
        let cases: &[(Option<&str>, Option<&str>, Option<&str>)] = &[
            // (env, config, expected)
            (Some("localhost:3000"), Some("https://webui.example.com/"), Some("https://webui.example.com/")),
            (Some(" http://env.lan/ "), Some("https://webui.example.com/"), Some("http://env.lan/")),
            (Some("localhost:3000"), Some("webui.example.com"), None),
            (None, Some("  https://webui.example.com/  "), Some("https://webui.example.com/")),
            (None, None, None),
        ];

        for (env, configured, expected) in cases {
            let mut config = Config::default();
            config.platforms.openwebui_url = configured.map(String::from);
            let got = with_env(&[(ENV_OPENWEBUI_URL, *env)], || openwebui_url(&config));
            assert_eq!(got.as_deref(), *expected, "env={:?} config={:?}", env, configured);
        }
    }

    #[test]
    fn test_session_options() {
        let mut config = Config::default();
        config.platforms.openwebui_url = Some("http://ai.lan:8080/".into());
        config.platforms.chatgpt_base_url = "https://chat.openai.com".into();

        with_env(
            &[(ENV_OPENWEBUI_URL, None), (ENV_DEBOUNCE_MS, None)],
            || {
                let webui = session_options(&config, Platform::Openwebui);
                assert_eq!(webui.fallback_url.as_deref(), Some("http://ai.lan:8080/"));
                assert_eq!(webui.base_url, "https://chat.openai.com");
                assert_eq!(webui.debounce, None);

                let claude = session_options(&config, Platform::Claude);
                assert_eq!(claude.fallback_url, None);
            },
        );
    }

    #[test]
    fn test_json_schema_generates() {
        let schema = json_schema();
        assert!(schema.contains("Config"));
        assert!(schema.contains("EmbedConfig"));
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Default.to_string(), "default");
        assert_eq!(
            ConfigSource::EnvVar("CHATBLOCKS_QUIET".to_string()).to_string(),
            "$CHATBLOCKS_QUIET"
        );
    }

    #[test]
    fn test_template_manifest_parses() {
        let template = template_manifest();
        assert!(template.contains("# chatblocks configuration manifest"));
        assert!(template.contains("embed:"));
        let parsed: Option<Config> = serde_yaml::from_str(&template).ok();
        // All comments: either an empty document or defaults
        assert!(parsed.is_none_or(|c| c.embed.height == 800));
    }
}
