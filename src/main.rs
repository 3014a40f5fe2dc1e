//! IssueChat - chat room backed by GitHub Issues
//!
//! Main entry point for the IssueChat CLI.

use anyhow::{bail, Context as _};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use issuechat::chat::{Message, Snapshot};
use issuechat::client::ChatClient;
use issuechat::config::{validate_config, ChatConfig, RepositoryConfig};
use issuechat::events::ChatEvent;
use issuechat::query::{self, DateRange, FilterSpec, HasComments, SortMode};
use issuechat::supervisor::ConnectionState;
use std::path::{Path, PathBuf};
use std::process;

/// IssueChat - a chat room on top of GitHub Issues
#[derive(Parser, Debug)]
#[command(name = "issuechat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/issuechat/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository to use instead of the configured one (owner/name)
    #[arg(short, long, global = true)]
    repo: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a configuration file
    Init,

    /// Sync once and list messages
    List {
        /// Case-insensitive text search over title, body and author
        #[arg(short, long)]
        search: Option<String>,

        /// Only messages by this author (exact match)
        #[arg(short, long)]
        author: Option<String>,

        /// Only messages with a label containing this tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Only messages with (true) or without (false) comments
        #[arg(long)]
        has_comments: Option<bool>,

        /// Created on or after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        since: Option<String>,

        /// Created on or before this date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        until: Option<String>,

        /// Sort order: newest, oldest or popular
        #[arg(long, default_value = "newest")]
        sort: SortMode,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Send a message
    Send {
        /// Message title (3 to 100 characters)
        title: String,

        /// Message body (at least 10 characters)
        body: String,

        /// Extra labels (repeatable); the chat label is always added
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Keep syncing and print events until Ctrl-C
    Watch,

    /// Check the configuration and repository access
    Validate,

    /// Show message and author statistics
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Also print the Prometheus metrics collected during this run
        #[arg(long)]
        metrics: bool,
    },

    /// Show or change configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the configuration (API key redacted)
    Show,

    /// Set the repository (owner/name)
    SetRepo { repository: String },

    /// Set the API key; omit to clear and fall back to GITHUB_TOKEN
    SetKey { key: Option<String> },

    /// Set the poll interval and auto-sync toggle
    SetSync {
        /// Poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Enable or disable background polling
        #[arg(long)]
        auto_sync: Option<bool>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize logging
    if let Err(e) = issuechat::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(ChatConfig::default_path);

    match cli.command {
        Commands::Init => handle_init_command(&config_path, cli.repo.as_deref()),
        Commands::Config(ref cmd) => handle_config_command(cmd, &config_path),
        Commands::Validate => handle_validate_command(&config_path, cli.repo.as_deref()).await,
        Commands::List {
            search,
            author,
            tags,
            has_comments,
            since,
            until,
            sort,
            json,
        } => {
            let client = open_client(&config_path, cli.repo.as_deref())?;
            let snapshot = client.sync_now().await.context("Sync failed")?;

            let spec = FilterSpec {
                author,
                tags,
                has_comments: HasComments::from(has_comments),
                date_range: date_range(since.as_deref(), until.as_deref())?,
            };
            let view = query::apply(&snapshot, search.as_deref().unwrap_or(""), &spec, sort);

            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_messages(&view);
            }
            Ok(())
        }
        Commands::Send { title, body, tags } => {
            let client = open_client(&config_path, cli.repo.as_deref())?;
            let message = client
                .send_message(&title, &body, &tags)
                .await
                .context("Failed to send message")?;

            println!("✓ Sent #{} to {}", message.id, client.engine().config());
            Ok(())
        }
        Commands::Watch => handle_watch_command(&config_path, cli.repo.as_deref()).await,
        Commands::Stats { json, metrics } => {
            let client = open_client(&config_path, cli.repo.as_deref())?;
            let snapshot = client.sync_now().await.context("Sync failed")?;
            print_stats(&snapshot, json)?;
            if metrics {
                println!();
                print!("{}", issuechat::metrics::encode_metrics()?);
            }
            Ok(())
        }
    }
}

fn load_config(config_path: &Path, repo: Option<&str>) -> anyhow::Result<ChatConfig> {
    let mut config = ChatConfig::load_or_default(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    if let Some(repo) = repo {
        config.repository = Some(repo.to_string());
    }
    Ok(config)
}

fn open_client(config_path: &Path, repo: Option<&str>) -> anyhow::Result<ChatClient> {
    let config = load_config(config_path, repo)?;
    if config.repository.is_none() {
        bail!(
            "No repository configured. Run 'issuechat init --repo owner/name' or pass --repo."
        );
    }
    let client = ChatClient::from_config(config)?;
    Ok(client.with_config_path(config_path))
}

fn handle_init_command(config_file: &Path, repo: Option<&str>) -> anyhow::Result<()> {
    // Check if already initialized
    if config_file.exists() {
        println!("Configuration already exists at {}", config_file.display());
        println!();
        println!("To change the repository, run:");
        println!("  issuechat config set-repo <owner/name>");
        return Ok(());
    }

    let mut config = ChatConfig::new();
    if let Some(repo) = repo {
        let repo = RepositoryConfig::parse(repo)?;
        config.repository = Some(repo.slug());
    }
    config.save(config_file)?;

    println!("✓ Created configuration at {}", config_file.display());
    println!();
    println!("Next steps:");
    if config.repository.is_none() {
        println!("  1. Choose a repository:");
        println!("     issuechat config set-repo owner/name");
    } else {
        println!("  1. Repository: {}", config.repository.as_deref().unwrap_or_default());
    }
    println!("  2. Provide a token (or export GITHUB_TOKEN):");
    println!("     issuechat config set-key <token>");
    println!("  3. Check access and read messages:");
    println!("     issuechat validate");
    println!("     issuechat list");

    Ok(())
}

fn handle_config_command(cmd: &ConfigCommands, config_path: &Path) -> anyhow::Result<()> {
    let mut config = ChatConfig::load_or_default(config_path)?;

    match cmd {
        ConfigCommands::Show => {
            let mut shown = config.clone();
            shown.api_key = shown.api_key.map(|key| redact(&key));
            print!("{}", serde_yaml::to_string(&shown)?);
            println!("# path: {}", config_path.display());
            return Ok(());
        }
        ConfigCommands::SetRepo { repository } => {
            let repo = RepositoryConfig::parse(repository)?;
            config.repository = Some(repo.slug());
            println!("✓ Repository set to {}", repo);
        }
        ConfigCommands::SetKey { key } => {
            config.api_key = key.clone().filter(|k| !k.trim().is_empty());
            match config.api_key {
                Some(_) => println!("✓ API key updated"),
                None => println!("✓ API key cleared (GITHUB_TOKEN will be used if set)"),
            }
        }
        ConfigCommands::SetSync {
            interval,
            auto_sync,
        } => {
            if let Some(interval) = interval {
                if *interval == 0 {
                    bail!("Sync interval must be greater than 0");
                }
                config.sync_interval_seconds = *interval;
            }
            if let Some(auto_sync) = auto_sync {
                config.auto_sync = *auto_sync;
            }
            println!(
                "✓ Sync every {}s, auto-sync {}",
                config.sync_interval_seconds,
                if config.auto_sync { "on" } else { "off" }
            );
        }
    }

    config.save(config_path)?;
    Ok(())
}

async fn handle_validate_command(config_path: &Path, repo: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path, repo)?;

    if let Err(errors) = validate_config(&config) {
        println!("✗ Configuration has {} problem(s):", errors.len());
        for error in &errors {
            println!("  - {}", error);
        }
        bail!("Invalid configuration");
    }
    println!("✓ Configuration is valid");

    let client = ChatClient::from_config(config)?;
    let repo = client.engine().config();
    let report = client
        .engine()
        .transport()
        .validate_access(&repo.owner, &repo.name)
        .await;

    println!("Repository: {}", repo);
    println!("  accessible: {}", yes_no(report.accessible));
    println!("  read:       {}", yes_no(report.can_read));
    println!("  write:      {}", yes_no(report.can_write));
    if let Some(ref error) = report.error {
        println!("  error:      {}", error);
    }

    if !report.is_usable() {
        bail!("Repository is not usable for chat");
    }
    Ok(())
}

async fn handle_watch_command(config_path: &Path, repo: Option<&str>) -> anyhow::Result<()> {
    let client = open_client(config_path, repo)?;
    let (_subscription, mut events) = client.bus().subscribe_channel();
    let mut states = client.supervisor().subscribe_state();

    println!(
        "Watching {} (Ctrl-C to stop)",
        client.engine().config()
    );

    match client.start().await {
        Ok(snapshot) => print_messages(&snapshot),
        Err(e) => eprintln!("Initial sync failed: {} (retrying in the background)", e),
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(event) = events.recv() => print_event(&event),
            Ok(()) = states.changed() => {
                let status = client.supervisor().status();
                match status.last_error {
                    Some(ref error) if status.state == ConnectionState::Error => println!(
                        "[connection] {} (attempt {}): {}",
                        status.state, status.reconnect_attempts, error
                    ),
                    _ => println!("[connection] {}", status.state),
                }
            }
        }
    }

    client.shutdown();
    println!("Stopped.");
    Ok(())
}

fn print_event(event: &ChatEvent) {
    let at = event.timestamp().format("%H:%M:%S");
    match event {
        ChatEvent::MessageAdded { message, .. } => {
            println!("[{}] sent:", at);
            print_message(message);
        }
        ChatEvent::SyncCompleted { snapshot, .. } => {
            println!(
                "[{}] synced {} messages ({} new)",
                at,
                snapshot.len(),
                snapshot.new_count()
            );
            for message in snapshot.iter().filter(|m| m.is_new) {
                print_message(message);
            }
        }
        ChatEvent::Error { message, cause, .. } => {
            eprintln!("[{}] {}: {}", at, message, cause);
        }
    }
}

fn print_messages(snapshot: &Snapshot) {
    println!("{} messages", snapshot.len());
    println!();
    for message in snapshot.iter() {
        print_message(message);
    }
}

fn print_message(message: &Message) {
    let labels: Vec<&str> = message.labels.iter().map(|l| l.name.as_str()).collect();
    println!(
        "{} #{} {} · {}{}",
        if message.is_new { "●" } else { " " },
        message.id,
        message.author,
        message.created_at.format("%Y-%m-%d %H:%M"),
        if message.comment_count > 0 {
            format!(" · {} comments", message.comment_count)
        } else {
            String::new()
        }
    );
    println!("  {}", message.title);
    if !message.body.is_empty() {
        for line in message.body.lines().take(3) {
            println!("    {}", line);
        }
    }
    if !labels.is_empty() {
        println!("  [{}]", labels.join(", "));
    }
}

fn print_stats(snapshot: &Snapshot, json: bool) -> anyhow::Result<()> {
    let now = Utc::now();
    let totals = query::message_stats(snapshot);
    let activity = query::activity_summary(snapshot, now);
    let users = query::user_stats(snapshot);

    if json {
        let value = serde_json::json!({
            "messages": totals,
            "activity": activity,
            "users": users,
            "tags": query::available_tags(snapshot),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Messages:       {}", totals.total);
    println!("With comments:  {}", totals.with_comments);
    println!("Response rate:  {}%", totals.response_rate);
    println!("Authors:        {}", totals.unique_authors);
    println!("New:            {}", activity.new_messages);
    println!("Last hour:      {}", activity.last_hour);
    if let Some(last) = activity.last_activity {
        println!("Last activity:  {}", last.format("%Y-%m-%d %H:%M"));
    }

    println!();
    println!("By author:");
    let mut authors: Vec<_> = users.iter().collect();
    authors.sort_by(|a, b| b.1.message_count.cmp(&a.1.message_count));
    for (name, stats) in authors {
        println!(
            "  {:<20} {:>4}  last {}",
            name,
            stats.message_count,
            stats.last_message.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn date_range(since: Option<&str>, until: Option<&str>) -> anyhow::Result<Option<DateRange>> {
    if since.is_none() && until.is_none() {
        return Ok(None);
    }
    Ok(Some(DateRange {
        start: since.map(|s| parse_date(s, false)).transpose()?,
        end: until.map(|s| parse_date(s, true)).transpose()?,
    }))
}

/// Parse RFC 3339, or a bare date taken as the start (or end) of that day in UTC
fn parse_date(value: &str, end_of_day: bool) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD or RFC 3339", value))?;
    let naive = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    }
    .with_context(|| format!("Invalid date '{}'", value))?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn redact(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}…", visible)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
