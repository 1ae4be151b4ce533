use clap::{Parser, Subcommand};
use autowriter::actions::gemini::{GeminiBackend, DEFAULT_MODEL};
use autowriter::compiler::loader::{load_script_library_if_present, read_optional_text};
use autowriter::driver::{BatchDriver, DriverConfig, TaskOutcome};
use autowriter::driver::config::load_sites_config;
use autowriter::runtime::channel::{CallChannel, RetryPolicy};
use autowriter::runtime::sheets::SheetsStore;
use autowriter::runtime::storage::TaskStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Result, bail};
use tracing::{info, error, warn};

#[derive(Parser)]
#[command(author, version, about = "Article Automation Tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every pending row of a task sheet
    Run {
        /// URL of the Google Sheet
        #[arg(long)]
        sheet_url: String,

        /// Name of the worksheet (defaults to the first tab)
        #[arg(long)]
        sheet_name: Option<String>,

        /// Run without sending to the model API or writing to the sheet
        #[arg(long)]
        dry_run: bool,

        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
        model: String,

        /// Bearer token for the Sheets API
        #[arg(long, env = "GOOGLE_SHEETS_ACCESS_TOKEN", hide_env_values = true)]
        sheets_token: String,

        /// Local step scripts overriding the sheet tabs (JSON or YAML)
        #[arg(long, default_value = "config/prompts.json")]
        prompts: PathBuf,

        /// Local shared rules overriding the base rules file and the rules tab
        #[arg(long, default_value = "config/common_rules.md")]
        common_rules: PathBuf,

        /// WordPress sites keyed by site name
        #[arg(long, default_value = "config/sites.json")]
        sites: PathBuf,

        #[arg(long, default_value = "instructions")]
        instructions_dir: PathBuf,

        #[arg(long, default_value_t = 30)]
        retry_delay_secs: u64,

        #[arg(long, default_value_t = 10)]
        max_retries: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sheet_url,
            sheet_name,
            dry_run,
            api_key,
            model,
            sheets_token,
            prompts,
            common_rules,
            sites,
            instructions_dir,
            retry_delay_secs,
            max_retries,
        } => {
            let api_key = match api_key.filter(|k| !k.is_empty()) {
                Some(k) => k,
                None if dry_run => String::new(),
                None => bail!("GEMINI_API_KEY env var not set."),
            };

            let manual_scripts = load_script_library_if_present(&prompts)?;
            let manual_rules = read_optional_text(&common_rules)?.filter(|r| !r.is_empty());
            info!(
                "Local config: {} script types, {} chars of shared rules",
                manual_scripts.len(),
                manual_rules.as_deref().map(|r| r.chars().count()).unwrap_or(0)
            );

            let config = DriverConfig {
                manual_scripts,
                manual_rules,
                instructions_dir,
                sites: load_sites_config(&sites)?,
                dry_run,
                ..DriverConfig::default()
            };

            info!("Initializing handlers...");
            let store: Arc<dyn TaskStore> = match SheetsStore::connect(&sheet_url, sheet_name, sheets_token).await {
                Ok(s) => Arc::new(s),
                Err(e) => {
                    error!("Failed to connect to sheet: {:#}", e);
                    return Ok(());
                }
            };

            let policy = RetryPolicy {
                max_attempts: max_retries,
                delay: Duration::from_secs(retry_delay_secs),
            };
            info!("Initializing Gemini with model: {}", model);
            let backend = Arc::new(GeminiBackend::new(api_key, model.clone()));
            let channel = CallChannel::new(model, policy);

            let mut driver = BatchDriver::new(store, backend, channel, config);
            let results = driver.run_batch().await?;

            let completed = results
                .iter()
                .filter(|r| matches!(r.outcome, TaskOutcome::Completed { .. }))
                .count();
            if completed < results.len() {
                warn!("{} of {} tasks did not complete", results.len() - completed, results.len());
            }
            info!("Completed {} tasks.", completed);
        }
    }

    Ok(())
}
