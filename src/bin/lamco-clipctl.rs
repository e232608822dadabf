//! lamco-clipctl - command-line client for lamco-clipd
//!
//! Hook it up to the compositor's clipboard watcher:
//!
//! ```text
//! wl-paste --watch lamco-clipctl notify
//! ```

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use lamco_clip_history::client::{ClientError, HistoryClient};
use lamco_clip_history::config::default_socket_path;
use lamco_clip_history::history::EntrySummary;
use lamco_clip_history::protocol::{ClientCodec, DEFAULT_MAX_FRAME_SIZE};

/// Command-line arguments for lamco-clipctl
#[derive(Parser, Debug)]
#[command(name = "lamco-clipctl")]
#[command(version, about = "Query and control the clipboard history daemon", long_about = None)]
struct Args {
    /// Daemon socket path [default: $XDG_RUNTIME_DIR/lamco-clip.sock]
    #[arg(short, long, env = "LAMCO_CLIP_SOCKET", global = true)]
    socket: Option<PathBuf>,

    /// Largest response accepted; match the daemon's server.max_frame_size
    #[arg(
        long,
        env = "LAMCO_CLIP_MAX_FRAME_SIZE",
        global = true,
        default_value_t = DEFAULT_MAX_FRAME_SIZE
    )]
    max_frame_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tell the daemon the clipboard changed
    Notify,

    /// List history entries, newest first
    List {
        /// Print the manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print an entry's payload
    Get {
        /// Entry id
        id: u64,

        /// Write the payload to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Put an entry back on the clipboard
    Select {
        /// Entry id
        id: u64,
    },

    /// Delete an entry
    Delete {
        /// Entry id
        id: u64,
    },

    /// Delete every entry
    Clear,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("lamco-clipctl: {:#}", e);
        let code = match e.downcast_ref::<ClientError>() {
            Some(ClientError::NotFound(_)) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run(args: Args) -> Result<()> {
    let socket = match args.socket {
        Some(path) => path,
        None => default_socket_path()?,
    };

    let codec = ClientCodec::new(args.max_frame_size);
    let mut client = HistoryClient::connect_with(&socket, codec)
        .await
        .context("Is lamco-clipd running?")?;

    match args.command {
        Command::Notify => client.notify().await?,
        Command::List { json } => {
            let entries = client.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_manifest(&entries);
            }
        }
        Command::Get { id, output } => {
            let entry = client.get(id).await?;
            match output {
                Some(path) => std::fs::write(&path, &entry.payload)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&entry.payload)?;
                    stdout.flush()?;
                }
            }
        }
        Command::Select { id } => client.select(id).await?,
        Command::Delete { id } => client.delete(id).await?,
        Command::Clear => {
            let removed = client.clear().await?;
            println!("Removed {} entries", removed);
        }
    }

    Ok(())
}

fn print_manifest(entries: &[EntrySummary]) {
    for entry in entries {
        let when = Local
            .timestamp_millis_opt(entry.captured_at as i64)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());

        let description = if entry.preview.is_empty() {
            format!("[{} {}]", entry.content_type, human_size(entry.size))
        } else {
            entry.preview.clone()
        };

        println!("{:>6}  {}  {}", entry.id, when, description);
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_parse_get_with_output() {
        let args = Args::try_parse_from(["lamco-clipctl", "get", "7", "-o", "out.png"]).unwrap();
        match args.command {
            Command::Get { id, output } => {
                assert_eq!(id, 7);
                assert_eq!(output, Some(PathBuf::from("out.png")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_max_frame_size() {
        let args = Args::try_parse_from(["lamco-clipctl", "list"]).unwrap();
        assert_eq!(args.max_frame_size, DEFAULT_MAX_FRAME_SIZE);

        let args =
            Args::try_parse_from(["lamco-clipctl", "get", "3", "--max-frame-size", "134217728"])
                .unwrap();
        assert_eq!(args.max_frame_size, 134_217_728);
    }
}
