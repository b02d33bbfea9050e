use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{self, CommandReport};

#[derive(Parser)]
#[command(name = "devto-mirror")]
#[command(version, about = "Incremental Dev.to mirror for static hosting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch new posts, merge them into the archive and regenerate the site
    Sync {
        /// Ignore the last-run watermark for this run
        #[arg(long)]
        force_full: bool,

        /// Render a fixture article into a throwaway directory
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// Regenerate pages, index, sitemap and robots.txt from the archive
    Render {
        #[arg(long)]
        json: bool,
    },

    /// Fetch one article by slug and add it to the archive
    AddPost {
        /// Article slug as it appears in the Dev.to URL
        slug: String,

        #[arg(long)]
        json: bool,
    },

    /// Snapshot the current commit as a backup/<timestamp> branch
    Backup {
        #[arg(long)]
        json: bool,
    },

    /// Remove generated output and mirror state
    Reset {
        /// Actually remove files instead of listing them
        #[arg(long)]
        yes: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show resolved paths, config and state
    Status {
        #[arg(long)]
        json: bool,
    },
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{}: {}", report.command, if report.ok { "ok" } else { "failed" });
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let (report, json) = match cli.command {
        Command::Sync {
            force_full,
            dry_run,
            json,
        } => (
            commands::sync::run(&commands::sync::SyncOptions {
                force_full,
                dry_run,
            })?,
            json,
        ),
        Command::Render { json } => (commands::render::run()?, json),
        Command::AddPost { slug, json } => (commands::add_post::run(&slug)?, json),
        Command::Backup { json } => (commands::backup::run()?, json),
        Command::Reset { yes, json } => (commands::reset::run(yes)?, json),
        Command::Status { json } => (commands::status::run()?, json),
    };

    print_report(&report, json)?;
    if !report.ok {
        std::process::exit(2);
    }
    Ok(())
}
