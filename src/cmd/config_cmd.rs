//! `chatblocks config`: what the layered configuration resolves to.

use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use chatblocks::config::{
    self, CONFIG_DIR, Config, ConfigSource, ENV_VARS, LoadedConfig, MANIFEST_FILE,
    template_manifest, user_config_path,
};
use chatblocks::output::{self, OutputFormat};
use chatblocks::platform::PLATFORMS;

use crate::args::FormatArgs;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show every setting, its value and where it came from
    Show(ShowArgs),

    /// List environment variables
    Env,

    /// Output JSON schema for manifest validation
    Schema,

    /// Create template manifest file
    Init(InitArgs),
}

#[derive(Args)]
struct ShowArgs {
    /// Also list the files and variables that were applied, and the
    /// per-platform result
    #[arg(long)]
    effective: bool,

    #[command(flatten)]
    format: FormatArgs,
}

#[derive(Args)]
struct InitArgs {
    /// Directory to create manifest in (default: current directory)
    #[arg(default_value = ".")]
    path: String,

    /// Overwrite existing manifest
    #[arg(long)]
    force: bool,
}

#[derive(Serialize, Tabled)]
struct Setting {
    #[tabled(rename = "SETTING")]
    key: &'static str,
    #[tabled(rename = "VALUE")]
    value: String,
    #[tabled(rename = "FROM")]
    origin: String,
}

#[derive(Serialize, Tabled)]
struct PlatformRow {
    #[tabled(rename = "PLATFORM")]
    label: &'static str,
    #[tabled(rename = "FENCE")]
    fence: &'static str,
    #[tabled(rename = "DEBOUNCE")]
    debounce_ms: u128,
    #[tabled(rename = "NEW CHAT")]
    new_chat: String,
}

#[derive(Serialize)]
struct ShowReport {
    settings: Vec<Setting>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    platforms: Vec<PlatformRow>,
}

pub fn run(args: ConfigArgs, loaded: &LoadedConfig) -> Result<(), String> {
    match args.command {
        ConfigCommand::Show(show_args) => run_show(loaded, show_args),
        ConfigCommand::Env => run_env(),
        ConfigCommand::Schema => run_schema(),
        ConfigCommand::Init(init_args) => {
            let cwd = std::env::current_dir().map_err(|e| format!("cannot get cwd: {}", e))?;
            run_init(&cwd, init_args)
        }
    }
}

/// Where `path` got its value: a set env var, a file, or the default.
fn origin(path: &str, overridden: bool) -> String {
    let env = ENV_VARS
        .iter()
        .find(|v| v.config_path == path && config::env_string(v.name).is_some());
    match env {
        Some(var) => format!("${}", var.name),
        None if overridden => "file".to_string(),
        None => "default".to_string(),
    }
}

fn settings(config: &Config) -> Vec<Setting> {
    let defaults = Config::default();
    let embed = &config.embed;
    let zoom = if embed.zoom() == embed.zoom_factor {
        embed.zoom().to_string()
    } else {
        format!("{} (set {})", embed.zoom(), embed.zoom_factor)
    };

    vec![
        Setting {
            key: "embed.height",
            value: embed.height.to_string(),
            origin: origin("embed.height", embed.height != defaults.embed.height),
        },
        Setting {
            key: "embed.zoom_factor",
            value: zoom,
            origin: origin(
                "embed.zoom_factor",
                embed.zoom_factor != defaults.embed.zoom_factor,
            ),
        },
        Setting {
            key: "behavior.quiet",
            value: config::is_quiet(config).to_string(),
            origin: origin("behavior.quiet", config.behavior.quiet),
        },
        Setting {
            key: "behavior.debounce_ms",
            value: config::debounce_override(config)
                .map(|d| d.as_millis().to_string())
                .unwrap_or_else(|| "per platform".to_string()),
            origin: origin(
                "behavior.debounce_ms",
                config.behavior.debounce_ms.is_some(),
            ),
        },
        Setting {
            key: "platforms.openwebui_url",
            value: config::openwebui_url(config).unwrap_or_else(|| "-".to_string()),
            origin: origin(
                "platforms.openwebui_url",
                config.platforms.openwebui_url.is_some(),
            ),
        },
        Setting {
            key: "platforms.chatgpt_base_url",
            value: config.platforms.chatgpt_base_url.clone(),
            origin: origin(
                "platforms.chatgpt_base_url",
                config.platforms.chatgpt_base_url != defaults.platforms.chatgpt_base_url,
            ),
        },
    ]
}

fn platform_rows(config: &Config) -> Vec<PlatformRow> {
    PLATFORMS
        .iter()
        .map(|d| {
            let options = config::session_options(config, d.platform);
            let debounce: Duration = options.debounce.unwrap_or(d.debounce);
            PlatformRow {
                label: d.label,
                fence: d.fence_tag,
                debounce_ms: debounce.as_millis(),
                new_chat: options
                    .fallback_url
                    .unwrap_or_else(|| d.fallback_url.to_string()),
            }
        })
        .collect()
}

fn run_show(loaded: &LoadedConfig, args: ShowArgs) -> Result<(), String> {
    let config = &loaded.config;
    let mut report = ShowReport {
        settings: settings(config),
        sources: Vec::new(),
        platforms: Vec::new(),
    };
    if args.effective {
        report.sources = loaded.sources.iter().map(|s| s.to_string()).collect();
        report.sources.extend(
            ENV_VARS
                .iter()
                .filter(|v| config::env_string(v.name).is_some())
                .map(|v| ConfigSource::EnvVar(v.name.to_string()).to_string()),
        );
        report.platforms = platform_rows(config);
    }

    let format = args.format.resolve();
    match format {
        OutputFormat::Pretty => {
            let mut table = Table::new(&report.settings);
            table.with(Style::rounded());
            println!("{}", table);
            if !report.sources.is_empty() {
                println!();
                println!("{}", "Applied, lowest precedence first:".bold());
                for source in &report.sources {
                    println!("  {}", source);
                }
            }
            if !report.platforms.is_empty() {
                println!();
                let mut table = Table::new(&report.platforms);
                table.with(Style::rounded());
                println!("{}", table);
            }
        }
        OutputFormat::Plain => {
            for s in &report.settings {
                println!("{} | {} | {}", s.key, s.value, s.origin);
            }
            for source in &report.sources {
                println!("source | {}", source);
            }
            for p in &report.platforms {
                println!(
                    "{} | {} | {}ms | {}",
                    p.label, p.fence, p.debounce_ms, p.new_chat
                );
            }
        }
        OutputFormat::Json | OutputFormat::Yaml => output::print_structured(&report, format)?,
    }
    Ok(())
}

fn run_env() -> Result<(), String> {
    for var in ENV_VARS {
        let state = match config::env_string(var.name) {
            Some(value) => format!("= {}", value).green(),
            None => "unset".dimmed(),
        };
        println!("{} {}", var.name.bold(), state);
        println!("  {}", var.description);
        if let Some(values) = var.values {
            println!("  values: {}", values);
        }
        println!("  default: {}", var.default);
        if var.config_path != "-" {
            println!("  overrides: {}", var.config_path);
        }
        println!();
    }
    Ok(())
}

fn run_schema() -> Result<(), String> {
    println!("{}", config::json_schema());
    Ok(())
}

fn run_init(cwd: &Path, args: InitArgs) -> Result<(), String> {
    let config_dir = cwd.join(&args.path).join(CONFIG_DIR);
    let manifest_path = config_dir.join(MANIFEST_FILE);

    if manifest_path.exists() && !args.force {
        return Err(format!(
            "manifest already exists: {}\nUse --force to overwrite",
            manifest_path.display()
        ));
    }

    fs::create_dir_all(&config_dir)
        .map_err(|e| format!("failed to create {}: {}", config_dir.display(), e))?;
    fs::write(&manifest_path, template_manifest())
        .map_err(|e| format!("failed to write {}: {}", manifest_path.display(), e))?;

    println!("Created: {}", manifest_path.display());

    if let Some(user_path) = user_config_path()
        && !user_path.exists()
    {
        println!(
            "Hint: settings for every note can go in {}",
            user_path.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_origin() {
        let mut config = Config::default();
        config.embed.height = 640;
        config.embed.zoom_factor = 3.5;

        let rows = settings(&config);
        let find = |key: &str| rows.iter().find(|s| s.key == key).unwrap();

        assert_eq!(find("embed.height").value, "640");
        assert_eq!(find("embed.height").origin, "file");
        assert_eq!(find("embed.zoom_factor").value, "2 (set 3.5)");
        assert_eq!(find("platforms.chatgpt_base_url").origin, "default");
        assert_eq!(find("platforms.chatgpt_base_url").value, "https://chatgpt.com");
    }

    #[test]
    fn test_platform_rows_cover_every_platform() {
        let rows = platform_rows(&Config::default());
        assert_eq!(rows.len(), PLATFORMS.len());
        let claude = rows.iter().find(|r| r.fence == "smart-claude").unwrap();
        assert_eq!(claude.new_chat, "https://claude.ai/chat/new");
    }
}
