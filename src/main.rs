use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ytdl_client::api::{ApiClient, ApiConfig, PollCancel, PollOptions, ProgressSnapshot};
use ytdl_client::application::{DialogSink, DirectorySink, DownloadCoordinator, HostSink};
use ytdl_client::domain::{AppError, DownloadEvent, DownloadHandle};

/// Command-line client for the YouTube audio downloader backend
#[derive(Parser)]
#[command(name = "ytdl-client", version)]
struct Cli {
    /// Backend API base URL (overrides YTDL_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show metadata for a video
    Info { url: String },
    /// Submit a download job and print its id
    Start { url: String },
    /// Print one progress snapshot for a job
    Progress { id: String },
    /// Poll a job until it completes or fails
    Wait {
        id: String,
        #[command(flatten)]
        poll: PollArgs,
    },
    /// Save the file produced by a completed job
    Fetch {
        id: String,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Look up, download, poll and save one video
    Download {
        url: String,
        #[command(flatten)]
        poll: PollArgs,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Check that the backend is up
    Health,
    /// Ask the backend to drop finished jobs
    Cleanup,
}

#[derive(Args)]
struct PollArgs {
    /// Milliseconds between progress checks
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Give up after this many progress checks
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[derive(Args)]
struct SaveArgs {
    /// Directory to save into
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Pick the destination with a save dialog instead
    #[arg(long, conflicts_with = "output")]
    ask: bool,
}

impl SaveArgs {
    fn sink(&self) -> HostSink {
        if self.ask {
            HostSink::Dialog(DialogSink)
        } else {
            HostSink::Directory(DirectorySink::new(&self.output))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "ytdl_client=debug"
    } else {
        "ytdl_client=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let mut config = ApiConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.set_base_url(url)?;
    }
    let client = ApiClient::new(config)?;

    match cli.command {
        Command::Info { url } => {
            print_json(&client.get_video_info(&url).await?);
        }
        Command::Start { url } => {
            let handle = client.start_download(&url).await?.into_handle()?;
            println!("{}", handle);
        }
        Command::Progress { id } => {
            let response = client
                .get_download_progress(&DownloadHandle::new(id))
                .await?;
            print_json(&response);
        }
        Command::Wait { id, poll } => {
            let bar = progress_bar();
            let result = client
                .poll_download_progress(
                    &DownloadHandle::new(id),
                    |snapshot| show_progress(&bar, snapshot),
                    poll_options(&client, &poll),
                )
                .await;
            finish(&bar, result.is_ok());
            print_json(&result?);
        }
        Command::Fetch { id, save } => {
            let fetched = client
                .fetch_file(&DownloadHandle::new(id), &save.sink())
                .await?;
            println!("Saved: {}", fetched.location.display());
        }
        Command::Download { url, poll, save } => {
            let options = poll_options(&client, &poll);
            let coordinator =
                DownloadCoordinator::new(client, save.sink()).with_poll_options(options);

            let bar = progress_bar();
            let result = coordinator
                .run(&url, |event| match event {
                    DownloadEvent::InfoReceived(info) => bar.println(format!(
                        "Title: {}",
                        info.title.as_deref().unwrap_or("Unknown")
                    )),
                    DownloadEvent::Started(handle) => bar.println(format!("Job: {}", handle)),
                    DownloadEvent::Progress(snapshot) => show_progress(&bar, &snapshot),
                    DownloadEvent::Saved(_) => {}
                })
                .await;
            finish(&bar, result.is_ok());

            let fetched = result?;
            println!("Saved: {}", fetched.location.display());
        }
        Command::Health => {
            let health = client.check_health().await;
            print_json(&health);
            if !health.success {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Cleanup => {
            print_json(&client.cleanup().await?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn poll_options(client: &ApiClient, args: &PollArgs) -> PollOptions {
    let mut options = PollOptions::from_config(client.config());
    if let Some(ms) = args.interval_ms {
        options.interval = Duration::from_millis(ms);
    }
    if args.max_attempts.is_some() {
        options.max_attempts = args.max_attempts;
    }
    options.with_cancel(cancel_on_ctrl_c())
}

/// First Ctrl-C stops polling, a second one exits.
fn cancel_on_ctrl_c() -> PollCancel {
    let cancel = PollCancel::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
    cancel
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    match ProgressStyle::with_template("{spinner} [{bar:40}] {pos:>3}% {msg}") {
        Ok(style) => bar.set_style(style.progress_chars("=> ")),
        Err(e) => error!(error = %e, "Invalid progress bar template"),
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn show_progress(bar: &ProgressBar, snapshot: &ProgressSnapshot) {
    bar.set_position(snapshot.percent.clamp(0.0, 100.0) as u64);

    let mut message = snapshot.status.to_string();
    if let Some(speed) = snapshot.speed.as_deref().filter(|s| !s.is_empty()) {
        message.push_str(&format!(" {}", speed));
    }
    if let Some(eta) = snapshot.eta.as_deref().filter(|s| !s.is_empty()) {
        message.push_str(&format!(" eta {}", eta));
    }
    bar.set_message(message);
}

fn finish(bar: &ProgressBar, ok: bool) {
    if ok {
        bar.finish_and_clear();
    } else {
        bar.abandon();
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!(error = %e, "Failed to render response"),
    }
}
