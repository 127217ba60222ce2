use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use snapcopy::{CopyOptions, Endpoint, Token};
use snapcopy_client::{CancellationToken, RemotePathCopier};

mod utils;

#[derive(Parser)]
#[command(name = "snapcopyctl")]
#[command(author, version, about, long_about=None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Session {
    /// Address of the snapcopyd server, as HOST:PORT
    endpoint: Endpoint,

    /// Token of the published session
    token: Token,
}

#[derive(Subcommand)]
enum Command {
    /// List a path of a session
    Ls {
        #[command(flatten)]
        session: Session,

        /// Path relative to the session root
        #[arg(default_value = "")]
        path: String,
    },
    /// Copy a path of a session to the local file system
    Copy {
        #[command(flatten)]
        session: Session,

        /// Path relative to the session root
        source: String,

        /// Local destination
        dest: Utf8PathBuf,

        /// JSON file with the copy options, overridden by the flags below
        #[arg(long)]
        options: Option<Utf8PathBuf>,

        /// Size of the requested chunks (e.g. 64KiB)
        #[arg(long, value_parser = utils::parse_size)]
        chunk_size: Option<u32>,

        /// Retries per chunk on transient failures
        #[arg(long)]
        retries: Option<u32>,

        /// Timeout of a single request in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Files transferred concurrently
        #[arg(long)]
        jobs: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ls { session, path } => {
            let copier = RemotePathCopier::init(&session.endpoint, session.token).await?;
            let listing = copier.list(&path, &CopyOptions::default()).await?;
            utils::print_listing(&listing);
        }
        Command::Copy {
            session,
            source,
            dest,
            options,
            chunk_size,
            retries,
            timeout_ms,
            jobs,
        } => {
            let mut options = match options {
                Some(path) => CopyOptions::load_from_file(&path).await?,
                None => CopyOptions::default(),
            };
            if let Some(chunk_size) = chunk_size {
                options = options.with_chunk_size(chunk_size);
            }
            if let Some(retries) = retries {
                options = options.with_max_retries_per_chunk(retries);
            }
            if let Some(timeout_ms) = timeout_ms {
                options = options.with_request_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(jobs) = jobs {
                options = options.with_max_concurrent_file_transfers(jobs);
            }
            log::debug!("copy options: {options:?}");

            let copier = RemotePathCopier::init(&session.endpoint, session.token).await?;
            let cancel = CancellationToken::new();
            let ctrl_c = tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        log::warn!("received Ctrl-C, cancelling");
                        cancel.cancel();
                    }
                }
            });
            let res = copier
                .copy_with_cancel(&source, &dest, Some(&options), &cancel)
                .await;
            ctrl_c.abort();
            utils::print_summary(&res?);
        }
    }
    Ok(())
}
