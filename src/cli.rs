//! Command-line interface.

use crate::api::{HttpShoppingApi, ShoppingListItem};
use crate::auth::{self, Mode, Session};
use crate::config::Config;
use crate::sync::{ListSynchronizer, SyncError};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use url::Url;

/// Keep track of your shopping items from the terminal
#[derive(Parser, Debug)]
#[command(name = "shoplist", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Shopping list API base URL (overrides config and SHOPLIST_API_URL)
    #[arg(long = "api-url", global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with Google through the browser
    Login,
    /// Forget the stored credential
    Logout,
    /// Show whether you are signed in
    Status,
    /// Show the shopping list
    #[command(visible_alias = "ls")]
    List(ListArgs),
    /// Add an item
    Add(AddArgs),
    /// Delete one item by id
    #[command(visible_alias = "remove")]
    Rm(RmArgs),
    /// Delete every item
    Clear,
    /// Finish sign-in from a callback URL pasted by hand
    Callback(CallbackArgs),
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short = 'o', long, default_value = "text", value_enum)]
    pub output_format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Item name; multiple words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    pub name: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct RmArgs {
    /// Item id as shown by `shoplist list`
    pub id: String,
}

#[derive(Parser, Debug)]
pub struct CallbackArgs {
    /// The address the browser landed on, including `?token=...`
    pub url: String,
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl Cli {
    /// Config from file and environment, with CLI flags on top.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load().context("Error loading config")?;
        if let Some(url) = &self.api_url {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

/// Install the tracing subscriber.
///
/// `--verbose` or `SHOPLIST_LOG` turns on debug output for this crate;
/// otherwise `RUST_LOG` is honored when set.
pub fn init_logging(verbose: bool) {
    if verbose || std::env::var("SHOPLIST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("shoplist=debug"))
            .with_writer(std::io::stderr)
            .try_init();
    } else if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);
    match run_inner(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run_inner(cli: Cli) -> Result<ExitCode> {
    let config = cli.resolve_config()?;
    let session = Arc::new(auth::open_session().context("Failed to open credential storage")?);
    tracing::debug!(api = %config.api_base_url, mode = ?session.mode(), "starting");

    match cli.command {
        Commands::Login => login(&config, session).await,
        Commands::Logout => {
            auth::logout(&session)?;
            println!("Logged out");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => Ok(status(&config, &session)),
        Commands::Callback(args) => callback(&session, &args.url),
        Commands::List(args) => {
            let Some(sync) = connect(&config, session) else {
                return Ok(not_signed_in());
            };
            let result = sync.list().await;
            Ok(finish(
                result.map(|items| print_items(&items, &args.output_format)),
                "Failed to load shopping list. Please try again.",
            ))
        }
        Commands::Add(args) => {
            let Some(sync) = connect(&config, session) else {
                return Ok(not_signed_in());
            };
            let result = sync.add(&args.name.join(" ")).await;
            Ok(finish(
                result.map(|item| println!("Item added! {} ({})", item.name, item.id)),
                "Failed to add item. Please try again.",
            ))
        }
        Commands::Rm(args) => {
            let Some(sync) = connect(&config, session) else {
                return Ok(not_signed_in());
            };
            let result = sync.remove_one(&args.id).await;
            Ok(finish(
                result.map(|()| println!("Item deleted!")),
                "Failed to delete item. Please try again.",
            ))
        }
        Commands::Clear => {
            let Some(sync) = connect(&config, session) else {
                return Ok(not_signed_in());
            };
            Ok(finish(
                clear(&sync).await,
                "Failed to clear list. Please try again.",
            ))
        }
    }
}

/// Build the synchronizer, or `None` when there is no credential to use.
fn connect(config: &Config, session: Arc<Session>) -> Option<ListSynchronizer> {
    if session.mode() == Mode::Unauthenticated {
        return None;
    }
    let api = Arc::new(HttpShoppingApi::new(
        config.api_base_url.clone(),
        config.request_timeout(),
    ));
    Some(ListSynchronizer::new(api, session))
}

fn not_signed_in() -> ExitCode {
    eprintln!("Not signed in. Run 'shoplist login' first.");
    ExitCode::from(1)
}

async fn login(config: &Config, session: Arc<Session>) -> Result<ExitCode> {
    if session.is_authenticated() {
        println!("Already signed in. Run 'shoplist logout' to switch accounts.");
        return Ok(ExitCode::SUCCESS);
    }
    match auth::login(config, session).await {
        Ok(()) => {
            println!("Welcome! You've been successfully logged in.");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Login failed: {e}");
            Ok(ExitCode::from(1))
        }
    }
}

fn status(config: &Config, session: &Session) -> ExitCode {
    match session.mode() {
        Mode::Authenticated => println!("Signed in to {}", config.api_base_url),
        Mode::Unauthenticated => println!("Not signed in"),
    }
    ExitCode::SUCCESS
}

fn callback(session: &Session, raw_url: &str) -> Result<ExitCode> {
    let mut url = Url::parse(raw_url).context("Invalid callback URL")?;
    match session.consume_credential_from_callback(&mut url)? {
        Some(_) => {
            println!("Welcome! You've been successfully logged in.");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No token found in {url}");
            Ok(ExitCode::from(1))
        }
    }
}

/// Print the outcome of a list operation the way the user should see it.
fn finish(result: Result<(), SyncError>, failure_message: &str) -> ExitCode {
    let Err(error) = result else {
        return ExitCode::SUCCESS;
    };
    match &error {
        SyncError::Auth(reason) => {
            eprintln!("{reason}. Run 'shoplist login' to sign in again.");
        }
        SyncError::Validation(reason) => eprintln!("{reason}"),
        SyncError::Network(e) => {
            tracing::debug!("{e}");
            eprintln!("Error: {failure_message}");
        }
    }
    ExitCode::from(1)
}

/// Deleting everything from an empty list is not worth a request.
async fn clear(sync: &ListSynchronizer) -> Result<(), SyncError> {
    if sync.list().await?.is_empty() {
        println!("Your shopping list is already empty");
        return Ok(());
    }
    sync.remove_all().await?;
    println!("List cleared!");
    Ok(())
}

fn print_items(items: &[ShoppingListItem], format: &OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(items) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to encode items: {e}"),
        },
        OutputFormat::Text => print!("{}", render_items(items)),
    }
}

/// Text rendering of the list, one item per line.
#[must_use]
pub fn render_items(items: &[ShoppingListItem]) -> String {
    if items.is_empty() {
        return "Your shopping list is empty\nAdd some items to get started!\n".to_string();
    }

    let id_width = items.iter().map(|item| item.id.len()).max().unwrap_or(0);
    let mut out = format!("Shopping Items ({})\n", items.len());
    for item in items {
        let _ = writeln!(
            out,
            "  {:<id_width$}  {}  (added {})",
            item.id,
            item.name,
            item.created_at.format("%Y-%m-%d"),
        );
    }
    out
}
