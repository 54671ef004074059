use anyhow::{Context, Result};
use bpr_audit::{verify_trail, AuditSettings, ChainCheck};
use bpr_engine::{AdminCaller, EngineError, EngineSettings};
use clap::{Parser, Subcommand};
use std::fs;

mod commands;

use commands::review::{self, DecideArgs};

#[derive(Parser)]
#[command(name = "bpr")]
#[command(about = "Bid participation reconciliation CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (falls back to BPR_CONFIG)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> site...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print one bid's roster: every participation with identity and status
    Roster {
        #[arg(long = "bid")]
        bid_id: String,
    },

    /// Bids posted in the listing window, grouped with per-bid counts
    Overview {
        /// Admin id the request is made as
        #[arg(long)]
        admin: String,
    },

    /// Confirm or reject one participation
    Decide {
        #[arg(long = "bid")]
        bid_id: String,

        /// Seller phone, any formatting
        #[arg(long)]
        phone: String,

        /// CONFIRMED | REJECTED
        #[arg(long)]
        decision: String,

        /// Admin id recorded on the confirmation
        #[arg(long)]
        admin: String,

        /// Must equal "<DECISION> <bid_id> <phone_key>"
        #[arg(long)]
        confirm: Option<String>,
    },

    /// A seller's participations in the listing window
    History {
        #[arg(long)]
        phone: String,
    },

    /// A seller's notification feed
    Notifications {
        #[arg(long)]
        phone: String,
    },

    /// Decision trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations
    Migrate,

    /// Load a JSON bundle of bids, participations, identities and confirmations
    Seed {
        #[arg(long)]
        file: String,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Check a decision trail's sequence and hash chain
    Verify {
        /// Trail path (defaults to /audit/path from config)
        #[arg(long)]
        path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = bpr_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = bpr_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_confirmations_table={} has_pair_guard={}",
                        s.ok, s.has_confirmations_table, s.has_pair_guard
                    );
                }
                DbCmd::Migrate => {
                    bpr_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
                DbCmd::Seed { file } => {
                    let loaded = commands::load_config(&cli.config_paths)?;
                    let settings = EngineSettings::from_config_json(&loaded.config_json)?;
                    let raw = fs::read_to_string(&file)
                        .with_context(|| format!("read seed file failed: {file}"))?;
                    let bundle = bpr_db::SeedBundle::from_json_str(&raw)?;
                    let r = bpr_db::seed(&pool, &bundle, settings.normalizer()).await?;
                    println!(
                        "seeded=true bids={} participations={} identities={} confirmations={}",
                        r.bids, r.participations, r.identities, r.confirmations
                    );
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = bpr_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Roster { bid_id } => {
            let settings = engine_settings(&cli.config_paths)?;
            let svc = commands::open_service(settings).await?;
            review::roster(&svc, &bid_id).await?;
        }

        Commands::Overview { admin } => {
            let settings = engine_settings(&cli.config_paths)?;
            let svc = commands::open_service(settings).await?;
            review::overview(&svc, &AdminCaller::new(admin)).await?;
        }

        Commands::Decide {
            bid_id,
            phone,
            decision,
            admin,
            confirm,
        } => {
            let loaded = commands::load_config(&cli.config_paths)?;
            let settings = EngineSettings::from_config_json(&loaded.config_json)?;
            let audit = AuditSettings::from_config_json(&loaded.config_json)?;

            let decision = commands::parse_decision(&decision)?;
            let phone_key = settings
                .normalizer()
                .normalize_str(&phone)
                .ok_or_else(|| EngineError::InvalidPhone { raw: phone.clone() })?;

            // Checked before touching the database.
            let expected = commands::expected_confirmation(decision, &bid_id, &phone_key);
            commands::enforce_confirmation(&expected, confirm.as_deref())?;

            let svc = commands::open_service(settings).await?;
            review::decide(
                &svc,
                &audit,
                DecideArgs {
                    bid_id: &bid_id,
                    phone_key: &phone_key,
                    decision,
                    admin: AdminCaller::new(admin),
                },
            )
            .await?;
        }

        Commands::History { phone } => {
            let settings = engine_settings(&cli.config_paths)?;
            let svc = commands::open_service(settings).await?;
            review::history(&svc, &phone).await?;
        }

        Commands::Notifications { phone } => {
            let settings = engine_settings(&cli.config_paths)?;
            let svc = commands::open_service(settings).await?;
            review::notifications(&svc, &phone).await?;
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => {
                let path = match path {
                    Some(p) => std::path::PathBuf::from(p),
                    None => {
                        let loaded = commands::load_config(&cli.config_paths)?;
                        AuditSettings::from_config_json(&loaded.config_json)?
                            .path
                            .context("no trail path: pass --path or set /audit/path")?
                    }
                };
                match verify_trail(&path)? {
                    ChainCheck::Intact { records } => {
                        println!("trail_ok=true records={} path={}", records, path.display());
                    }
                    ChainCheck::Broken { line, reason } => {
                        anyhow::bail!(
                            "trail broken at line {} ({}): {}",
                            line,
                            path.display(),
                            reason
                        );
                    }
                }
            }
        },
    }

    Ok(())
}

fn engine_settings(config_paths: &[String]) -> Result<EngineSettings> {
    let loaded = commands::load_config(config_paths)?;
    EngineSettings::from_config_json(&loaded.config_json)
}

/// Logs go to stderr; stdout carries command output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
