mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dockwalk_runner::RegistryCredentials;

#[derive(Parser)]
#[command(
    name = "dockwalk",
    about = "Build, save, and push a Docker image for every Dockerfile in a repository"
)]
#[command(version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Build only this unit (a directory containing a Dockerfile, relative to
    /// the root). Builds every unit in the tree when omitted.
    path: Option<PathBuf>,

    /// Repository root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Registry user for `docker login`
    #[arg(long, global = true, env = "DOCKER_USER")]
    docker_user: Option<String>,

    /// Registry password for `docker login`
    #[arg(long, global = true, env = "DOCKER_PASS", hide_env_values = true)]
    docker_pass: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the path of every buildable unit to a file, one per line
    List {
        /// Output file, relative to the root
        #[arg(long, short = 'o', default_value = "dockerlist")]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("ignoring .env: {e}"),
    }

    let Cli {
        command,
        path,
        root,
        docker_user,
        docker_pass,
    } = Cli::parse();

    match command {
        Some(Commands::List { output }) => commands::list(&root, &output)?,
        None => {
            let credentials = match (docker_user, docker_pass) {
                (Some(user), Some(pass)) => Some(RegistryCredentials::new(user, pass)),
                _ => None,
            };
            commands::build(&root, path.as_deref(), credentials).await?
        }
    }

    Ok(())
}
