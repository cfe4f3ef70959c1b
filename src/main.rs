use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use chatbot_tester::{report, runner, utils, widget::Brand};

#[derive(Parser)]
#[command(name = "chatbot-tester")]
#[command(version = "0.1.0")]
#[command(about = "End-to-end conversation tests for customer-service chat widgets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run conversation file(s), a CSV scenario file, or a directory
    Run {
        /// Path to a conversation JSON, scenario CSV, or directory
        path: PathBuf,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for reports and screenshots
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Widget brand (virgin-media, o2)
        #[arg(short, long)]
        brand: Option<Brand>,

        /// Page hosting the chat widget
        #[arg(short, long)]
        url: Option<String>,

        /// Browser (chromium, firefox, webkit)
        #[arg(long)]
        browser: Option<String>,

        /// Show the browser window
        #[arg(long, default_value = "false")]
        headed: bool,

        /// Stop after the first failed conversation
        #[arg(long, default_value = "false")]
        stop_on_failure: bool,
    },

    /// Load and check scripts without starting a browser
    Validate {
        /// Path to a conversation JSON, scenario CSV, or directory
        path: PathBuf,
    },

    /// Print the summary of a results.json
    Report {
        /// Path to results.json
        results: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            path,
            config,
            output,
            brand,
            url,
            browser,
            headed,
            stop_on_failure,
        } => {
            let mut cfg = utils::Config::load(config.as_deref())?;
            if let Some(output) = output {
                cfg.output_dir = output;
            }
            if let Some(brand) = brand {
                cfg.brand = brand;
            }
            if let Some(url) = url {
                cfg.base_url = Some(url);
            }
            if let Some(browser) = browser {
                cfg.browser = browser;
            }
            if headed {
                cfg.headless = false;
            }
            if stop_on_failure {
                cfg.continue_on_failure = false;
            }

            println!(
                "{} Running conversations from: {}",
                "▶".green().bold(),
                path.display()
            );
            println!("  Brand: {}", cfg.brand.to_string().cyan());
            println!("  URL: {}", cfg.entry_url().cyan());
            println!("  Output: {}", cfg.output_dir.display().to_string().cyan());

            let summary = runner::run_path(&path, &cfg).await?;
            if summary.conversations_failed > 0 {
                std::process::exit(1);
            }
        }

        Commands::Validate { path } => {
            let counts = runner::validate_path(&path)?;
            let total: usize = counts.iter().map(|(_, n)| n).sum();
            for (file, count) in &counts {
                println!("  {} {} ({} conversations)", "✓".green(), file.display(), count);
            }
            println!(
                "{} {} conversations in {} files",
                "■".blue().bold(),
                total,
                counts.len()
            );
        }

        Commands::Report { results } => {
            report::print_summary(&results)?;
        }
    }

    Ok(())
}
