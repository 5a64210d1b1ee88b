use clap::{ArgAction, Parser, Subcommand};
use issuefeed::config::DEFAULT_CONFIG_FILE;
use issuefeed::enrich::DEFAULT_FEED_ENTRIES;
use issuefeed::{
    DEFAULT_OUTPUT_DIR, Generator, GeneratorConfig, HttpFeedFetcher, HttpSiteProber, Record,
    ReqwestForgeClient, get_feed_content, normalize_body, write_documents,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "issuefeed-cli")]
#[command(about = "Generate grouped JSON documents from forge issues")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Generate(GenerateArgs),
    ParseBody(ParseBodyArgs),
    Feed(FeedArgs),
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    #[arg(long, action = ArgAction::SetTrue)]
    keep_raw: bool,
    #[arg(long = "no-enrich", action = ArgAction::SetTrue)]
    no_enrich: bool,
}

#[derive(clap::Args, Debug)]
struct ParseBodyArgs {
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long)]
    body: Option<String>,
}

#[derive(clap::Args, Debug)]
struct FeedArgs {
    #[arg(long)]
    url: String,
    #[arg(long, default_value_t = DEFAULT_FEED_ENTRIES)]
    num: usize,
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Generate(args) => generate_command(args).await,
        Commands::ParseBody(args) => parse_body_command(args),
        Commands::Feed(args) => feed_command(args).await,
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

/// Log filter comes from `ISSUEFEED_LOG`, falling back to `issuefeed=info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("ISSUEFEED_LOG")
        .unwrap_or_else(|_| EnvFilter::new("issuefeed=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn generate_command(args: GenerateArgs) -> Result<ExitCode, String> {
    let mut config =
        GeneratorConfig::load_from_path(&args.config).map_err(|error| error.to_string())?;
    if args.keep_raw {
        config.issues.keep_raw = true;
    }
    if args.no_enrich {
        config.enrich.probe_sites = false;
        config.enrich.fetch_feeds = false;
    }

    let forge = ReqwestForgeClient::from_config(&config.api).map_err(|error| error.to_string())?;
    let prober = HttpSiteProber::new(Duration::from_secs(config.enrich.probe_timeout_secs))
        .map_err(|error| error.to_string())?;
    let fetcher = HttpFeedFetcher::new(Duration::from_secs(config.enrich.feed_timeout_secs))
        .map_err(|error| error.to_string())?;

    let output = Generator::new(forge, prober, fetcher)
        .run(&config)
        .await
        .map_err(|error| error.to_string())?;
    tracing::info!(
        records = output.records.len(),
        groups = output.groups.len(),
        "generator finished"
    );
    let written = write_documents(&args.output_dir, &output.documents())
        .map_err(|error| error.to_string())?;

    for path in &written {
        println!("generated: {}", display_file_name(path));
    }
    if !output.skipped_issues.is_empty() {
        let skipped: Vec<String> = output
            .skipped_issues
            .iter()
            .map(|number| format!("#{number}"))
            .collect();
        println!("skipped: {}", skipped.join(", "));
    }
    println!("done");
    Ok(ExitCode::SUCCESS)
}

fn parse_body_command(args: ParseBodyArgs) -> Result<ExitCode, String> {
    let body = load_body(args.file.as_deref(), args.body.as_deref())?;
    let fields = normalize_body(0, &body).map_err(|error| error.to_string())?;
    let record = Record {
        fields,
        status: None,
        rss: None,
        raw: None,
    };
    let json = serde_json::to_string_pretty(&record).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

async fn feed_command(args: FeedArgs) -> Result<ExitCode, String> {
    let fetcher = HttpFeedFetcher::new(Duration::from_secs(args.timeout_secs))
        .map_err(|error| error.to_string())?;
    let entries = get_feed_content(&fetcher, &args.url, args.num).await;
    let json = serde_json::to_string_pretty(&entries).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn load_body(file: Option<&Path>, body: Option<&str>) -> Result<String, String> {
    match (file, body) {
        (Some(_), Some(_)) => Err("provide only one of --file or --body".to_string()),
        (None, None) => Err("one of --file or --body is required".to_string()),
        (Some(path), None) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed reading body file '{}': {e}", path.display())),
        (None, Some(body)) => Ok(body.to_string()),
    }
}

fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
