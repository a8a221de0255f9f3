use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use blog2pod_core::{Blog2Pod, Blog2PodConfig, Reply, validate_url};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

mod echo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Turn a blog article into a narrated, tagged MP3 podcast
#[derive(Parser, Debug)]
#[command(name = "blog2pod")]
#[command(version)]
#[command(about = "Turn a blog article into a narrated MP3 podcast", long_about = None)]
struct Args {
    /// Article URL (http:// or https://)
    #[arg(value_name = "URL")]
    url: String,

    /// Directory for finished podcasts (default: $BLOG2POD_COMPLETED_DIR or ./completed)
    #[arg(long, value_name = "DIR")]
    completed_dir: Option<PathBuf>,

    /// Skip the headless browser and fetch over plain HTTP
    #[arg(long)]
    no_render: bool,

    /// Skip the language-model cleaning pass
    #[arg(long)]
    no_clean: bool,

    /// Only narrate the first page of paginated posts
    #[arg(long)]
    no_pagination: bool,

    /// Characters per speech request
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: Option<u64>,

    /// Print the narration text instead of producing audio
    #[arg(long)]
    print_text: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Blog2PodConfig> {
    let mut config = Blog2PodConfig::from_env().context("Failed to load configuration from the environment")?;

    if let Some(dir) = &args.completed_dir {
        config.pipeline.completed_dir = dir.clone();
    }
    if let Some(size) = args.chunk_size {
        config.speech.chunk_size = usize::try_from(size).context("Chunk size is too large")?;
    }
    if args.no_render {
        config.fetch.browser = None;
    }
    if args.no_clean {
        config.chat = None;
    }
    if args.no_pagination {
        config.pipeline.follow_pagination = false;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        echo::print_banner();
    }

    let url = match validate_url(&args.url) {
        Ok(url) => url,
        Err(e) => {
            echo::print_error(&Reply::failure(&e).to_string());
            return Ok(ExitCode::FAILURE);
        }
    };

    let config = load_config(&args)?;
    if args.verbose {
        echo::print_config(&config);
    }
    let pipeline = Blog2Pod::new(config).context("Failed to initialize service clients")?;

    echo::print_info(&Reply::Acknowledged.to_string());
    let started = Instant::now();

    if args.print_text {
        echo::print_step(1, 1, &format!("Extracting {}", url.as_str().bright_white().underline()));
        return match pipeline.prepare(url.as_str()).await {
            Ok(article) => {
                if args.verbose {
                    echo::print_timing("Extraction", started.elapsed());
                }
                println!("{}", article.clean_text);
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                echo::print_error(&Reply::failure(&e).to_string());
                Ok(ExitCode::FAILURE)
            }
        };
    }

    echo::print_step(1, 2, &format!("Building podcast from {}", url.as_str().bright_white().underline()));
    let podcast = match pipeline.run(url.as_str()).await {
        Ok(podcast) => podcast,
        Err(e) => {
            echo::print_error(&Reply::failure(&e).to_string());
            return Ok(ExitCode::FAILURE);
        }
    };

    echo::print_step(2, 2, "Done");
    if args.verbose {
        echo::print_timing("Total", started.elapsed());
    }
    if podcast.skipped_chunks > 0 {
        echo::print_warning(&format!("{} chunk(s) could not be narrated", podcast.skipped_chunks));
    }
    echo::print_podcast_details(&podcast);
    echo::print_success(&Reply::success(&podcast).to_string());

    Ok(ExitCode::SUCCESS)
}
