//! # clonr CLI Application
//!
//! Main entry point for the clonr repository management utility. This
//! binary exposes the standalone subsystem: secure pairing between
//! instances, per-client encrypted sync, and password-protected
//! repository archives.

use anyhow::Result;
use clap::Parser;
use clonr::cli::{self, Cli, Commands, StandaloneCommands};
use clonr::terminal::StdTerminal;
use colored::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse arguments, set up logging, and dispatch to the command handlers.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clonr=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut terminal = StdTerminal;

    let Commands::Standalone { command } = cli.command;
    if let Err(e) = match command {
        StandaloneCommands::Init { host, port, output } => cli::init(host, port, output).await,
        StandaloneCommands::Rotate => cli::rotate().await,
        StandaloneCommands::Status => cli::status().await,
        StandaloneCommands::Disable { force } => cli::disable(force, &mut terminal).await,
        StandaloneCommands::Clients { all } => cli::clients(all).await,
        StandaloneCommands::Accept {
            display_key,
            client,
            list,
        } => cli::accept(display_key, client, list, &mut terminal).await,
        StandaloneCommands::Connect { key, name, file } => {
            cli::connect(key, name, file, &mut terminal).await
        }
        StandaloneCommands::Disconnect { name, force } => {
            cli::disconnect(name, force, &mut terminal).await
        }
        StandaloneCommands::Suspend { client, force } => {
            cli::set_client_status(client, "suspend", force, &mut terminal).await
        }
        StandaloneCommands::Reactivate { client } => {
            cli::set_client_status(client, "reactivate", true, &mut terminal).await
        }
        StandaloneCommands::Revoke { client, force } => {
            cli::set_client_status(client, "revoke", force, &mut terminal).await
        }
        StandaloneCommands::Archive {
            paths,
            output,
            no_git,
            compression,
            exclude,
            all,
            favorites,
            workspace,
        } => {
            cli::create_archive(
                paths,
                output,
                no_git,
                compression,
                exclude,
                all,
                favorites,
                workspace,
                &mut terminal,
            )
            .await
        }
        StandaloneCommands::Extract {
            archive,
            output,
            list,
        } => cli::extract_archive(archive, output, list, &mut terminal).await,
        StandaloneCommands::Decrypt {
            connection,
            all,
            list,
        } => cli::decrypt(connection, all, list, &mut terminal).await,
        StandaloneCommands::Encrypt { command } => cli::encrypt(command, &mut terminal).await,
    } {
        eprintln!(
            "{} {}\n{}",
            "Error:".red().bold(),
            e.to_string().red(),
            "Tip: Run with --help for usage information.".yellow()
        );
        std::process::exit(1);
    }
    Ok(())
}
