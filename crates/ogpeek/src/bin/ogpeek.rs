// ABOUTME: CLI binary for the ogpeek link preview engine.
// ABOUTME: Resolves URLs (or a saved HTML file) and prints the metadata records as JSON.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use ogpeek::{load_registry_file, Client, MetadataRecord, Strategy};

#[derive(Parser, Debug)]
#[command(name = "ogpeek")]
#[command(about = "Extract link preview metadata from web pages")]
struct Args {
    /// Acquisition strategy
    #[arg(short = 's', long = "strategy", value_enum, default_value_t = Strategy::Static)]
    strategy: Strategy,

    /// Maximum pages acquired at once (default: 16 static, 4 rendered)
    #[arg(short = 'j', long = "concurrency")]
    concurrency: Option<usize>,

    /// Per-page acquisition timeout in seconds
    #[arg(long = "timeout", default_value_t = 30)]
    timeout_secs: u64,

    /// User-Agent sent with every request
    #[arg(long = "user-agent")]
    user_agent: Option<String>,

    /// Allow fetching from private/local networks. The rendered strategy
    /// only checks the URL it navigates to, not redirects or subresources.
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,

    /// JSON file with extra catalog patterns
    #[arg(long = "catalog-patterns")]
    catalog_patterns: Option<PathBuf>,

    /// Chromium binary for the rendered strategy
    #[arg(long = "chrome-path")]
    chrome_path: Option<PathBuf>,

    /// HTML file to resolve (requires --url)
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// URL context for HTML file resolution (required with --html)
    #[arg(long = "url")]
    url: Option<String>,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long = "pretty")]
    pretty: bool,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long = "log-level", default_value = "warn")]
    log_level: String,

    /// URLs to resolve
    #[arg()]
    urls: Vec<String>,
}

fn format_output(records: &[MetadataRecord], pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(records)
    } else {
        serde_json::to_string(records)
    }
}

fn build_client(args: &Args) -> anyhow::Result<Client> {
    let mut builder = Client::builder()
        .strategy(args.strategy)
        .timeout(Duration::from_secs(args.timeout_secs))
        .allow_private_networks(args.allow_private_networks);

    if let Some(n) = args.concurrency {
        builder = builder.max_concurrency(n);
    }
    if let Some(ua) = &args.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    if let Some(path) = &args.chrome_path {
        builder = builder.chrome_executable(path.clone());
    }
    if let Some(path) = &args.catalog_patterns {
        builder = builder.registry(load_registry_file(path)?);
    }

    Ok(builder.build()?)
}

async fn collect(args: &Args, client: &Client) -> anyhow::Result<Vec<MetadataRecord>> {
    match (&args.html, &args.url) {
        (Some(html_path), Some(url)) => {
            let html = fs::read_to_string(html_path)
                .map_err(|e| anyhow::anyhow!("reading {}: {}", html_path.display(), e))?;
            Ok(vec![client.resolve_html(&html, url)?])
        }
        _ => Ok(client.run(&args.urls).await?),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.html.is_some() && args.url.is_none() {
        eprintln!("error: --url is required when using --html");
        return ExitCode::from(1);
    }

    if args.html.is_none() && args.urls.is_empty() {
        eprintln!("error: at least one URL is required, or use --html with --url");
        return ExitCode::from(1);
    }

    if args.html.is_some() && !args.urls.is_empty() {
        eprintln!("error: cannot use both --html and positional URLs");
        return ExitCode::from(1);
    }

    let client = match build_client(&args) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let start = Instant::now();
    let outcome = collect(&args, &client).await;
    let elapsed = start.elapsed();

    if let Err(e) = client.shutdown().await {
        tracing::warn!(error = %e, "shutdown failed");
    }

    let records = match outcome {
        Ok(records) => records,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let output_str = match format_output(&records, args.pretty) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error encoding records: {}", e);
            return ExitCode::from(1);
        }
    };

    let mut had_error = false;
    if let Some(output_path) = &args.output {
        if let Err(e) = fs::write(output_path, &output_str) {
            eprintln!("error writing to {:?}: {}", output_path, e);
            had_error = true;
        }
    } else {
        println!("{}", output_str);
    }

    if args.timing {
        let _ = writeln!(io::stderr(), "elapsed: {}ms", elapsed.as_millis());
    }

    if had_error {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
