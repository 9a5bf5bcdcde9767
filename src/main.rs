// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use saberfx::config::Session;
use saberfx::session::HostSession;
use tracing_subscriber::EnvFilter;

const EXAMPLE_SESSION: &str = r#"
pause_source: true

sabers:
  - id: 1
    type: left
    color: [0.78, 0.08, 0.08, 1.0]
  - id: 2
    type: right
    color: [0.16, 0.56, 0.86, 1.0]
  - id: 3
    type: left
    color: [0.95, 0.6, 0.1, 1.0]

events:
  - kind: created
    saber: 3
  - kind: initialize
  - kind: pause
  - kind: resume
  - kind: destroyed
    saber: 3
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Replays saber effect sessions."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replays a session file through the effect manager and prints the result.
    Replay {
        /// The path to the session file.
        path: String,
    },
    /// Verifies a session file without replaying it.
    Verify {
        /// The path to the session file.
        path: String,
    },
    /// Prints an example session file to stdout.
    Example {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { path } => {
            let session = Session::deserialize(&PathBuf::from(&path))?;
            let report = HostSession::new(&session)?.run()?;
            println!("{}", report);
        }
        Commands::Verify { path } => {
            let session = Session::deserialize(&PathBuf::from(&path))?;
            println!(
                "{} is valid ({} sabers, {} events).",
                path,
                session.sabers().len(),
                session.events().len()
            );
        }
        Commands::Example {} => {
            println!("{}", EXAMPLE_SESSION.trim_start());
        }
    }

    Ok(())
}
