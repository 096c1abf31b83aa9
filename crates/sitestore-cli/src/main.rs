mod keys;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use sitestore_core::{paths, SiteStore, StoreOptions, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::keys::resolve_key;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and edit a site state store", long_about = None)]
struct Cli {
    /// Store directory (default: platform data dir, or SITESTORE_DIR)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// JSON file with store options
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// 32-byte store key as hex; otherwise the OS keyring is used
    #[arg(long, global = true, env = "SITESTORE_KEY", hide_env_values = true)]
    key_hex: Option<String>,
    /// Create and save a keyring key if none exists
    #[arg(long, global = true)]
    create_key: bool,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Per-site zoom levels
    Zoom {
        #[command(subcommand)]
        action: ZoomAction,
    },
    /// Per-site credentials (encrypted at rest)
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
    /// Per-site preferences
    Pref {
        #[command(subcommand)]
        action: PrefAction,
    },
    /// List origins, or the records of one origin
    Ls { origin: Option<String> },
    /// Remove stored data for one origin or for all of them
    Clear {
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        origin: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// Rewrite the data log without dead records
    Compact,
    /// Show record counts and log size
    Stats,
    /// Read back every record and report damaged ones
    Verify,
}

#[derive(Subcommand, Debug)]
enum ZoomAction {
    Get {
        origin: String,
    },
    Set {
        origin: String,
        #[arg(allow_negative_numbers = true)]
        level: f64,
    },
}

#[derive(Subcommand, Debug)]
enum SecretAction {
    Get {
        origin: String,
        name: String,
        /// Print the secret base64-encoded
        #[arg(long)]
        base64: bool,
    },
    Set {
        origin: String,
        name: String,
        value: String,
        /// Treat VALUE as base64
        #[arg(long)]
        base64: bool,
    },
    Rm {
        origin: String,
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum PrefAction {
    Get {
        origin: String,
        name: String,
    },
    Set {
        origin: String,
        name: String,
        value: String,
        #[arg(long = "type", value_enum, default_value_t = PrefType::Text)]
        kind: PrefType,
    },
    Rm {
        origin: String,
        name: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PrefType {
    Bool,
    Int,
    Float,
    Text,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store_dir = match &cli.store {
        Some(dir) => dir.clone(),
        None => paths::default_store_dir().context("resolve default store directory")?,
    };
    let options = load_options(cli.config.as_ref())?;
    let key = resolve_key(cli.key_hex.as_deref(), &store_dir, cli.create_key)?;
    debug!(store = %store_dir.display(), "opening store");
    let store = SiteStore::open_with(&store_dir, key, options)
        .with_context(|| format!("open store {}", store_dir.display()))?;

    let result = run(&store, cli.command, cli.json);
    store.close().context("close store")?;
    result
}

fn load_options(explicit: Option<&PathBuf>) -> Result<StoreOptions> {
    if let Some(path) = explicit {
        return StoreOptions::load(path).with_context(|| format!("load {}", path.display()));
    }
    match paths::default_options_path() {
        Ok(path) if path.exists() => {
            StoreOptions::load(&path).with_context(|| format!("load {}", path.display()))
        }
        _ => Ok(StoreOptions::default()),
    }
}

fn run(store: &SiteStore, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Zoom { action } => match action {
            ZoomAction::Get { origin } => {
                let level = store.get_zoom_level(origin.as_str())?;
                emit(json, &json!({ "origin": origin, "zoom": level }), || {
                    level.to_string()
                })
            }
            ZoomAction::Set { origin, level } => {
                store.set_zoom_level(origin.as_str(), level)?;
                Ok(())
            }
        },
        Commands::Secret { action } => match action {
            SecretAction::Get {
                origin,
                name,
                base64,
            } => {
                let secret = store
                    .get_secret(origin.as_str(), &name)?
                    .ok_or_else(|| anyhow!("no secret {name} for {origin}"))?;
                let text = if base64 {
                    general_purpose::STANDARD.encode(secret.as_slice())
                } else {
                    String::from_utf8(secret.to_vec())
                        .context("secret is not UTF-8; use --base64")?
                };
                emit(json, &json!({ "origin": origin, "name": name, "secret": text }), || {
                    text.clone()
                })
            }
            SecretAction::Set {
                origin,
                name,
                value,
                base64,
            } => {
                let bytes = if base64 {
                    general_purpose::STANDARD
                        .decode(value.as_bytes())
                        .context("decode base64 secret")?
                } else {
                    value.into_bytes()
                };
                store.set_secret(origin.as_str(), &name, &bytes)?;
                Ok(())
            }
            SecretAction::Rm { origin, name } => {
                if !store.remove_secret(origin.as_str(), &name)? {
                    bail!("no secret {name} for {origin}");
                }
                Ok(())
            }
        },
        Commands::Pref { action } => match action {
            PrefAction::Get { origin, name } => {
                let value = store
                    .get_preference(origin.as_str(), &name)?
                    .ok_or_else(|| anyhow!("no preference {name} for {origin}"))?;
                emit(json, &value, || describe(&value))
            }
            PrefAction::Set {
                origin,
                name,
                value,
                kind,
            } => {
                let value = parse_pref(&value, kind)?;
                store.set_preference(origin.as_str(), &name, &value)?;
                Ok(())
            }
            PrefAction::Rm { origin, name } => {
                if !store.remove_preference(origin.as_str(), &name)? {
                    bail!("no preference {name} for {origin}");
                }
                Ok(())
            }
        },
        Commands::Ls { origin: None } => {
            let origins: Vec<String> = store.origins()?.iter().map(ToString::to_string).collect();
            emit(json, &origins, || origins.join("\n"))
        }
        Commands::Ls {
            origin: Some(origin),
        } => {
            let names = store.names_for(origin.as_str())?;
            emit(json, &names, || names.join("\n"))
        }
        Commands::Clear { origin, all } => {
            let removed = match origin {
                Some(origin) if !all => store.clear_for_origin(origin.as_str())?,
                _ => store.clear_all()?,
            };
            emit(json, &json!({ "removed": removed }), || {
                format!("removed {removed} records")
            })
        }
        Commands::Compact => {
            let report = store.compact()?;
            emit(json, &report, || {
                format!(
                    "generation {}: {} records, {} -> {} bytes, {} skipped",
                    report.generation,
                    report.live_records,
                    report.bytes_before,
                    report.bytes_after,
                    report.skipped.len()
                )
            })
        }
        Commands::Stats => {
            let stats = store.stats()?;
            emit(json, &stats, || {
                format!(
                    "records:    {}\norigins:    {}\nlog bytes:  {}\ndead bytes: {}\ngeneration: {}",
                    stats.live_records,
                    stats.origins,
                    stats.log_bytes,
                    stats.dead_bytes,
                    stats.generation
                )
            })
        }
        Commands::Verify => {
            let report = store.verify()?;
            emit(json, &report, || {
                let mut lines = vec![format!(
                    "checked {} records, {} unreadable",
                    report.checked,
                    report.skipped.len()
                )];
                for skipped in &report.skipped {
                    lines.push(format!("  {} {}: {}", skipped.origin, skipped.name, skipped.reason));
                }
                lines.join("\n")
            })?;
            if !report.is_clean() {
                bail!("{} unreadable records", report.skipped.len());
            }
            Ok(())
        }
    }
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        let text = text();
        if !text.is_empty() {
            println!("{text}");
        }
    }
    Ok(())
}

fn parse_pref(raw: &str, kind: PrefType) -> Result<Value> {
    Ok(match kind {
        PrefType::Bool => Value::Bool(raw.parse().context("expected true or false")?),
        PrefType::Int => Value::Int(raw.parse().context("expected an integer")?),
        PrefType::Float => Value::Float(raw.parse().context("expected a number")?),
        PrefType::Text => Value::Text(raw.to_string()),
    })
}

fn describe(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Bytes(b) => general_purpose::STANDARD.encode(b),
        Value::Zoom(z) => z.scale.to_string(),
    }
}
