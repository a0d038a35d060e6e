//! Manage mission folders from the command line.
//!
//! Usage:
//!   mpc list
//!   mpc clone "Survey"
//!   mpc rename "Survey" "Harbor survey"
//!   mpc save DEMO --name "Harbor survey"

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use mpc_cli::{find_mission, report, start_session, ChangesPolicy, ConsoleDialogs};
use mpc_core::validate_flight_plan;
use mpc_session::{MissionSession, SessionConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Mission planner session tool
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Project folder (default: $MPC_PROJECT_FOLDER or ~/MissionControl Projects)
    #[arg(long, global = true)]
    project_folder: Option<PathBuf>,

    /// What to do with unsaved changes when a mission is closed
    #[arg(long, value_enum, default_value_t = ChangesPolicy::Keep, global = true)]
    changes: ChangesPolicy,

    /// Answer for the mission name prompt
    #[arg(long, global = true)]
    name: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List missions, newest first
    List,
    /// Create a mission named after the current time
    New,
    /// Show the content of a mission
    Show { mission: String },
    /// Copy a mission into "Clone of <mission>"
    Clone { mission: String },
    /// Rename a mission folder
    Rename { mission: String, new_name: String },
    /// Save a mission; the demo mission is renamed to --name
    Save { mission: String },
    /// Delete missions without content
    Prune,
    /// Check whether a name can be used for a mission
    CheckName { name: String },
    /// Run the gimbal and waypoint separation checks on every flight plan
    Validate { mission: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mpc_session=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = SessionConfig::from_env();
    if let Some(folder) = args.project_folder {
        config.project_folder = folder;
    }

    let dialogs = Arc::new(ConsoleDialogs::new(args.changes, args.name));
    let session = start_session(&config, dialogs);

    match args.command {
        Command::List => {
            let missions = session.refresh_missions().await?;
            println!("{}", report::mission_table(&missions));
        }
        Command::New => {
            let mission = session.load_new().await?;
            println!("Created '{}' at {}", mission.name(), mission.directory().display());
        }
        Command::Show { mission } => {
            let mission = session.load(locate(&session, &mission)?).await?;
            println!("{}", report::mission_line(&mission.info()));
            for plan in mission.flight_plans().get() {
                println!(
                    "  plan    {} ({} waypoints)",
                    plan.name(),
                    plan.waypoints().len()
                );
            }
            for matching in mission.matchings().get() {
                println!("  dataset {}", matching.name());
            }
            for log in mission.flight_logs().get() {
                println!("  log     {}", log.display());
            }
            close(&session).await?;
        }
        Command::Clone { mission } => {
            let source = session.load(locate(&session, &mission)?).await?;
            let clone = session.load_cloned(source).await?;
            println!("Cloned to '{}' at {}", clone.name(), clone.directory().display());
            close(&session).await?;
        }
        Command::Rename { mission, new_name } => {
            let mission = session.load(locate(&session, &mission)?).await?;
            session
                .rename(mission.clone(), new_name)
                .await
                .context("Rename failed")?;
            println!("Renamed to '{}'", mission.name());
            close(&session).await?;
        }
        Command::Save { mission } => {
            let mission = session.load(locate(&session, &mission)?).await?;
            if !session.save().await? {
                bail!("'{}' was not saved", mission.name());
            }
            println!("Saved '{}'", mission.name());
            close(&session).await?;
        }
        Command::Prune => {
            let catalogue = session.catalogue();
            let before = catalogue.missions().len();
            if !catalogue.delete_empty_missions() {
                bail!("Some empty missions could not be deleted");
            }
            let remaining = session.refresh_missions().await?.len();
            println!("Removed {} empty mission(s)", before.saturating_sub(remaining));
        }
        Command::CheckName { name } => {
            session.refresh_missions().await?;
            if !session.catalogue().is_valid_mission_name(&name) {
                bail!("'{name}' cannot be used as a mission name");
            }
            println!("'{name}' is available");
        }
        Command::Validate { mission } => {
            let mission = session.load(locate(&session, &mission)?).await?;
            let mut failed = 0;
            for plan in mission.flight_plans().get() {
                let report = validate_flight_plan(&plan);
                let flagged = plan
                    .waypoints()
                    .get()
                    .iter()
                    .filter(|wp| wp.airspace_warning().get())
                    .map(|wp| wp.index().to_string())
                    .collect::<Vec<_>>();
                println!(
                    "{:<32} gimbal {}  separation {}{}",
                    plan.name(),
                    verdict(report.gimbal_ok),
                    verdict(report.separation_ok),
                    if flagged.is_empty() {
                        String::new()
                    } else {
                        format!("  flagged waypoints: {}", flagged.join(", "))
                    }
                );
                if !report.is_ok() {
                    failed += 1;
                }
            }
            close(&session).await?;
            if failed > 0 {
                bail!("{failed} flight plan(s) failed validation");
            }
        }
    }

    Ok(())
}

fn verdict(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "FAILED"
    }
}

fn locate(session: &MissionSession, name: &str) -> Result<PathBuf> {
    find_mission(session, name).ok_or_else(|| anyhow!("No mission named '{name}'"))
}

async fn close(session: &MissionSession) -> Result<()> {
    if !session.close_on_exit().await? {
        bail!("Unsaved changes kept; mission left open");
    }
    Ok(())
}
