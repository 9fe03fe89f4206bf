use anyhow::Result;
use clap::Parser;
use snyk2nvd::{config::Config, logging, runner::write_feed, Runner, Snyk};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser)]
#[command(name = "snyk2nvd")]
#[command(
    author,
    version,
    about = "Download Snyk vulnerability advisories and convert them to NVD CVE JSON"
)]
struct Cli {
    /// Comma separated list of languages to download/convert. If not set, then use all available
    #[arg(long = "language", value_name = "LANGUAGES")]
    languages: Vec<String>,

    /// Download advisories from the Snyk API instead of converting input files
    #[arg(long)]
    download: bool,

    /// Only download advisories modified since this Unix timestamp
    #[arg(long, default_value_t = 0)]
    since: i64,

    /// Write the feed to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Advisory dumps to convert; stdin is read when none are given
    #[arg(conflicts_with = "download")]
    inputs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let filter = config.language_filter(&cli.languages);
    let provider = Snyk::new(filter, config.capacity());
    let runner = Runner::new(config, provider);

    let feed = if cli.download {
        runner.download(cli.since).await?
    } else {
        runner.convert(&cli.inputs).await?
    };

    write_feed(&feed, cli.output.as_deref())?;
    Ok(())
}
