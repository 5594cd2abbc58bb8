use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing::{error, info, span, Level};
use tracing_subscriber::EnvFilter;

use objectwagon::{progress::LoggingProgress, TransferClient, TransferResult, Transport};

#[derive(Parser, Debug)]
#[command(name = "objectwagon", version, about = "Transfer artifacts to and from an object storage bucket")]
struct Args {
    /// Repository URL: s3://bucket[/dir], gs://bucket[/dir] or gcloud://bucket[/dir]
    repository: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print whether a resource exists
    Exists { resource: String },
    /// Print whether a resource was modified after TIMESTAMP (millis since epoch)
    Newer {
        resource: String,
        #[arg(allow_negative_numbers = true)]
        timestamp: i64,
    },
    /// Print every key under DIRECTORY
    List {
        #[arg(default_value = "")]
        directory: String,
    },
    /// Download RESOURCE to DEST
    Get { resource: String, dest: PathBuf },
    /// Upload SOURCE as RESOURCE
    Put { source: PathBuf, resource: String },
}

fn run(client: &mut TransferClient, args: Args) -> TransferResult<()> {
    client.connect(&args.repository)?;

    let result = match args.command {
        Command::Exists { resource } => client.exists(&resource).map(|found| println!("{}", found)),
        Command::Newer { resource, timestamp } => client
            .is_newer_than(&resource, timestamp)
            .map(|newer| println!("{}", newer)),
        Command::List { directory } => client.list(&directory).map(|keys| {
            for key in keys {
                println!("{}", key);
            }
        }),
        Command::Get { resource, dest } => {
            let mut progress = LoggingProgress::new(&resource);
            client.download(&resource, &dest, &mut progress)
        }
        Command::Put { source, resource } => {
            let mut progress = LoggingProgress::new(&resource);
            client.upload(&source, &resource, &mut progress)
        }
    };

    client.disconnect();
    result
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!("called");

    let args = Args::parse();
    info!(repository = args.repository, command = ?args.command, "args");

    let mut client = TransferClient::new();
    match run(&mut client, args) {
        Err(err) => {
            error!(error_message=%err, error_group="transfer");
            eprintln!("objectwagon: {}", err);
            ExitCode::FAILURE
        }
        Ok(()) => ExitCode::SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_newer_timestamp() {
        let cases = vec![("-1", -1), ("0", 0), ("1700000000000", 1_700_000_000_000)];

        for (arg, expected) in cases {
            let args = Args::try_parse_from(["objectwagon", "s3://bucket", "newer", "app.jar", arg]).unwrap();
            match args.command {
                Command::Newer { resource, timestamp } => {
                    assert_eq!(resource, "app.jar", "failed for case: {}", arg);
                    assert_eq!(timestamp, expected, "failed for case: {}", arg);
                }
                other => panic!("unexpected command for case {}: {:?}", arg, other),
            }
        }
    }
}
