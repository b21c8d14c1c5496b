//! Tally CLI - customer satisfaction ratings with offline support
//!
//! Usage: tally <command> [options]

use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tally_common::{Identity, Score, TallyError, EXIT_ERROR};
use tally_config::{Config, DEFAULT_CONFIG_TOML, TALLY_DIR};
use tally_core::aggregation::{format_timestamp, leaderboard, totals, Window};
use tally_core::complaint::is_complaint;
use tally_core::completion::{DailyTracker, TrackerSnapshot, UserSummary};
use tally_sync::store::keys;
use tally_sync::{DecisionReport, SessionStatus, Submission, SyncConfig, SyncEngine, SyncError};

#[derive(Parser)]
#[command(
    name = "tally",
    version = "0.1.0",
    about = "Tally customer satisfaction ratings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a Tally workspace in the current directory
    Init,

    /// Show connectivity and queued writes
    Status,

    /// Show who is signed in
    Session,

    /// Rate a customer visit from -2 (Very Poor) to 2 (Excellent)
    Rate {
        /// Customer number (digits only)
        customer_number: String,

        #[arg(allow_negative_numbers = true)]
        score: i32,
    },

    /// List ratings (your own unless you are an admin)
    Ratings {
        #[command(subcommand)]
        action: Option<RatingsAction>,

        /// Only ratings submitted by this email
        #[arg(long)]
        email: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Your weekly, monthly and all-time totals
    Totals {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank submitters by total score (admin)
    Leaderboard {
        /// all-time, weekly or monthly
        #[arg(long, default_value = "all-time")]
        window: Window,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile one day's expected visits against ratings (admin)
    Day {
        /// Day to review, YYYY-MM-DD
        date: NaiveDate,

        /// Expected visits for a user (repeatable)
        #[arg(long = "visits", value_name = "EMAIL=N", value_parser = parse_visits)]
        visits: Vec<(String, u32)>,

        /// Record the day as complete for a user
        #[arg(long, value_name = "EMAIL", conflicts_with = "not_complete")]
        complete: Option<String>,

        /// Record the day as not complete, charging one penalty per missing visit
        #[arg(long, value_name = "EMAIL")]
        not_complete: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a rating as a customer complaint (admin)
    Complaint { id: i64 },

    /// Show or change your profile name
    Profile {
        /// Full name, first and last
        #[arg(long)]
        name: Option<String>,
    },

    /// Replay queued writes now
    Sync,

    /// Monitor connectivity and sync automatically until interrupted
    Watch,
}

#[derive(Subcommand)]
enum RatingsAction {
    /// Delete a rating (admin)
    Delete { id: i64 },
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Ratings { json, .. }
            | Commands::Totals { json }
            | Commands::Leaderboard { json, .. }
            | Commands::Day { json, .. } => *json,
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tally_common::telemetry::init_tracing(cli.verbose, false);
    tracing::info!("Tally CLI started");

    let json = cli.command.wants_json();
    let result = match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Status => cmd_status().await,
        Commands::Session => cmd_session().await,
        Commands::Rate {
            customer_number,
            score,
        } => cmd_rate(customer_number, score).await,
        Commands::Ratings {
            action,
            email,
            json,
        } => cmd_ratings(action, email, json).await,
        Commands::Totals { json } => cmd_totals(json).await,
        Commands::Leaderboard { window, json } => cmd_leaderboard(window, json).await,
        Commands::Day {
            date,
            visits,
            complete,
            not_complete,
            json,
        } => cmd_day(date, visits, complete, not_complete, json).await,
        Commands::Complaint { id } => cmd_complaint(id).await,
        Commands::Profile { name } => cmd_profile(name).await,
        Commands::Sync => cmd_sync().await,
        Commands::Watch => cmd_watch().await,
    };

    if let Err(e) = result {
        if json {
            print_json_error(&e, error_code(&e));
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(EXIT_ERROR);
    }
}

//
// Helper functions
//

/// Print error as JSON for tool integration
fn print_json_error(error: &anyhow::Error, code: &str) {
    use serde_json::json;

    let json_error = json!({
        "success": false,
        "error": {
            "code": code,
            "message": error.to_string(),
        }
    });

    println!("{:#}", json_error);
}

fn error_code(error: &anyhow::Error) -> &'static str {
    if let Some(e) = error.downcast_ref::<SyncError>() {
        return match e {
            SyncError::Offline(_) => "OFFLINE",
            SyncError::Http(_) | SyncError::Server { .. } | SyncError::Shape { .. } => {
                "REMOTE_ERROR"
            }
            SyncError::Core(_) => "INVALID_INPUT",
            _ => "SYNC_ERROR",
        };
    }
    if let Some(e) = error.downcast_ref::<TallyError>() {
        return match e {
            TallyError::ValidationError(_) | TallyError::InvalidScore(_) => "INVALID_INPUT",
            TallyError::NotFound(_) => "NOT_FOUND",
            TallyError::Unauthorized(_) => "UNAUTHORIZED",
            _ => "ERROR",
        };
    }
    "ERROR"
}

/// `EMAIL=N` as given to `tally day --visits`
fn parse_visits(input: &str) -> Result<(String, u32), String> {
    let (email, count) = input
        .split_once('=')
        .ok_or_else(|| format!("expected EMAIL=N, got '{}'", input))?;

    let email = email.trim();
    if email.is_empty() {
        return Err("missing email before '='".to_string());
    }
    let count = count
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid visit count '{}': {}", count, e))?;

    Ok((email.to_string(), count))
}

fn workspace_root() -> anyhow::Result<PathBuf> {
    match std::env::var_os("TALLY_WORKSPACE") {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Ok(std::env::current_dir()?),
    }
}

/// Loaded config plus an engine whose connectivity was just probed
struct Workspace {
    config: Config,
    engine: SyncEngine,
}

impl Workspace {
    async fn open() -> anyhow::Result<Self> {
        let root = workspace_root()?;
        let config = Config::load(&root)?;
        let engine = SyncEngine::new(SyncConfig::from_config(&config))?;

        let online = engine.check_now().await;
        tracing::debug!(
            "Boundary at {} is {}",
            config.remote.base_url,
            if online { "reachable" } else { "unreachable" }
        );

        Ok(Self { config, engine })
    }

    fn session(&self) -> SessionStatus {
        let live = self.config.identity();
        self.engine
            .session()
            .resolve(self.engine.is_online(), live.as_ref(), Utc::now())
    }

    fn signed_in(&self) -> anyhow::Result<Identity> {
        match self.session() {
            SessionStatus::Authenticated { user, .. } => Ok(user),
            SessionStatus::SignInPending => Err(TallyError::Unauthorized(
                "sign-in pending: the server is unreachable and there is no cached session"
                    .to_string(),
            )
            .into()),
            SessionStatus::Unauthenticated => Err(TallyError::Unauthorized(format!(
                "not signed in; set [identity] email in {}/config.toml",
                TALLY_DIR
            ))
            .into()),
        }
    }

    fn require_admin(&self, user: &Identity) -> anyhow::Result<()> {
        if self.config.is_admin(&user.email) {
            Ok(())
        } else {
            Err(TallyError::Unauthorized(format!("{} is not an admin", user.email)).into())
        }
    }

    async fn close(self) {
        self.engine.shutdown().await;
    }
}

fn decision_label(summary: &UserSummary) -> &'static str {
    match summary.decision {
        None => "pending",
        Some(true) => "complete",
        Some(false) => "not complete",
    }
}

//
// Command implementations
//

async fn cmd_init() -> anyhow::Result<()> {
    use std::fs;

    let root = workspace_root()?;
    let tally_dir = root.join(TALLY_DIR);

    if !tally_dir.exists() {
        fs::create_dir_all(&tally_dir)?;
        eprintln!("✓ Created {}/", TALLY_DIR);
    } else {
        eprintln!("✓ {}/ already exists", TALLY_DIR);
    }

    let config_path = Config::path_in(&root);
    if !config_path.exists() {
        fs::write(&config_path, DEFAULT_CONFIG_TOML)?;
        eprintln!("✓ Created {}/config.toml", TALLY_DIR);
    } else {
        eprintln!("✓ {}/config.toml already exists", TALLY_DIR);
    }

    // Local state never belongs in version control
    let gitignore_path = root.join(".gitignore");
    let gitignore_entries = format!("\n# Tally\n{}/state.json\n", TALLY_DIR);
    update_gitignore(&gitignore_path, &gitignore_entries)?;

    eprintln!("\n✅ Workspace initialized successfully!");
    eprintln!("   Set [identity] email in {}/config.toml to start rating.", TALLY_DIR);
    Ok(())
}

fn update_gitignore(path: &Path, entries: &str) -> anyhow::Result<()> {
    use std::fs;

    if path.exists() {
        let content = fs::read_to_string(path)?;
        if !content.contains("state.json") {
            fs::write(path, format!("{}{}", content, entries))?;
            eprintln!("✓ Updated .gitignore");
        }
    } else {
        fs::write(path, entries)?;
        eprintln!("✓ Created .gitignore");
    }
    Ok(())
}

async fn cmd_status() -> anyhow::Result<()> {
    let ws = Workspace::open().await?;

    if ws.engine.is_online() {
        eprintln!("✓ Online ({})", ws.config.remote.base_url);
    } else {
        eprintln!("⚠ Offline ({} unreachable)", ws.config.remote.base_url);
    }

    let queue = ws.engine.queue();
    let owners = queue.owners();
    if owners.is_empty() {
        println!("No queued writes");
    }
    for owner in owners {
        println!("{}: {} queued", owner, queue.len(&owner));
    }

    ws.close().await;
    Ok(())
}

async fn cmd_session() -> anyhow::Result<()> {
    let ws = Workspace::open().await?;

    match ws.session() {
        SessionStatus::Authenticated { user, offline } => {
            let role = if ws.config.is_admin(&user.email) {
                " [admin]"
            } else {
                ""
            };
            println!(
                "Signed in as {} <{}>{}",
                user.display_name(),
                user.email,
                role
            );
            if offline {
                eprintln!("⚠ Offline: using cached session");
            }
        }
        SessionStatus::SignInPending => {
            println!("Sign-in pending: will complete once the server is reachable");
        }
        SessionStatus::Unauthenticated => println!("Not signed in"),
    }

    ws.close().await;
    Ok(())
}

async fn cmd_rate(customer_number: String, score: i32) -> anyhow::Result<()> {
    let score = Score::try_from(score)?;

    let ws = Workspace::open().await?;
    let user = ws.signed_in()?;

    // Earlier offline writes go first
    if ws.engine.is_online() {
        ws.engine.drain(&user.email).await;
    }

    let outcome = ws
        .engine
        .client()
        .submit_rating(&user, &customer_number, score)
        .await?;

    match &outcome {
        Submission::Sent(rating) => eprintln!(
            "✓ Rating {} recorded: customer {} scored {}",
            rating.id, rating.customer_number, rating.score
        ),
        Submission::Queued { .. } => eprintln!("⚠ {}", outcome.message()),
    }

    ws.close().await;
    Ok(())
}

async fn cmd_ratings(
    action: Option<RatingsAction>,
    email: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let ws = Workspace::open().await?;
    let user = ws.signed_in()?;
    let client = ws.engine.client();

    if let Some(RatingsAction::Delete { id }) = action {
        ws.require_admin(&user)?;
        client.delete_rating(id).await?;
        eprintln!("✓ Deleted rating {}", id);
        ws.close().await;
        return Ok(());
    }

    let admin = ws.config.is_admin(&user.email);
    let filter = match email {
        Some(email) if admin || email.eq_ignore_ascii_case(&user.email) => Some(email),
        Some(_) => {
            return Err(TallyError::Unauthorized(
                "only admins can list other users' ratings".to_string(),
            )
            .into())
        }
        None if admin => None,
        None => Some(user.email.clone()),
    };

    let mut ratings = client.ratings(filter.as_deref()).await?;
    ratings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if json {
        println!("{}", serde_json::to_string_pretty(&ratings)?);
    } else if ratings.is_empty() {
        eprintln!("No ratings yet");
    } else {
        for r in &ratings {
            let flag = if is_complaint(r) { " ⚑" } else { "" };
            println!(
                "{:>6}  {}  {:<24}  {:<18}  {}{}",
                r.id,
                format_timestamp(&r.created_at, &Local),
                r.name,
                r.customer_number,
                r.score,
                flag
            );
        }
        eprintln!("\n{} ratings", ratings.len());
    }

    ws.close().await;
    Ok(())
}

async fn cmd_totals(json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open().await?;
    let user = ws.signed_in()?;

    let ratings = ws.engine.client().ratings(Some(&user.email)).await?;
    let sums = totals(&ratings, &Local::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&sums)?);
    } else {
        for window in Window::ALL {
            println!("{:<10} {:+}", window.to_string(), sums.get(window));
        }
    }

    ws.close().await;
    Ok(())
}

async fn cmd_leaderboard(window: Window, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open().await?;
    let user = ws.signed_in()?;
    ws.require_admin(&user)?;

    let ratings = ws.engine.client().ratings(None).await?;
    let board = leaderboard(&ratings, window, &Local::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
    } else if board.is_empty() {
        eprintln!("No ratings in the {} window", window);
    } else {
        eprintln!("Leaderboard ({})", window);
        for entry in &board {
            println!(
                "{} {:>3}. {:<24} {:<32} {:+}",
                entry.marker.unwrap_or("  "),
                entry.rank,
                entry.name,
                entry.email,
                entry.total
            );
        }
    }

    ws.close().await;
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DayOutput<'a> {
    day: NaiveDate,
    users: &'a [UserSummary],
    warnings: &'a [String],
    decision: Option<&'a DecisionReport>,
    points: Option<i64>,
}

async fn cmd_day(
    date: NaiveDate,
    visits: Vec<(String, u32)>,
    complete: Option<String>,
    not_complete: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let ws = Workspace::open().await?;
    let user = ws.signed_in()?;
    ws.require_admin(&user)?;

    let client = ws.engine.client();
    let ratings = client.ratings(None).await?;
    let completions = client.completions().await?;

    // Visit overrides survive between invocations for the same day
    let store = ws.engine.store();
    let snapshot: TrackerSnapshot = store.get(keys::DAILY_TRACKER).unwrap_or_default();
    let mut tracker = DailyTracker::restore(Local, snapshot);
    tracker.select_day(date, false, &ratings, &completions);

    let mut warnings = Vec::new();
    for (email, count) in visits {
        let outcome = tracker.set_visit_count(&email, count)?;
        if let Some(warning) = outcome.warning() {
            warnings.push(warning);
        }
    }
    store.set(keys::DAILY_TRACKER, &tracker.snapshot());

    let plan = match (complete, not_complete) {
        (Some(email), _) => Some(tracker.complete(&email)?),
        (None, Some(email)) => Some(tracker.not_complete(&email)?),
        (None, None) => None,
    };

    let report = match &plan {
        Some(plan) => Some(client.record_decision(plan).await?),
        None => None,
    };

    if let (Some(plan), Some(report)) = (&plan, &report) {
        if report.record.is_none() {
            tracker.forget_decision(&plan.email, plan.day);
        }
        store.set(keys::DAILY_TRACKER, &tracker.snapshot());
    }

    if json {
        let output = DayOutput {
            day: date,
            users: tracker.summaries(),
            warnings: &warnings,
            decision: report.as_ref(),
            points: plan.as_ref().map(|p| p.points),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for warning in &warnings {
            eprintln!("⚠ {}", warning);
        }

        println!("Day {}", date);
        for s in tracker.summaries() {
            let points = match s.decision {
                Some(_) => format!("{:+}", s.points),
                None => "-".to_string(),
            };
            println!(
                "{:<32} {:<24} visits {:>2}  rated {:>2}  sum {:+}  {:<12} {}",
                s.email,
                s.name,
                s.visit_count,
                s.completed_ratings,
                s.day_sum,
                decision_label(s),
                points
            );
        }

        if let (Some(plan), Some(report)) = (&plan, &report) {
            if report.is_complete() {
                eprintln!(
                    "✓ Recorded {} for {} ({} penalties, {:+} points)",
                    if plan.record.completed { "complete" } else { "not complete" },
                    plan.email,
                    report.penalties_written,
                    plan.points
                );
            } else {
                eprintln!(
                    "⚠ Decision for {} partially written: {} penalties failed, record {}",
                    plan.email,
                    report.penalties_failed,
                    if report.record.is_some() { "saved" } else { "not saved" }
                );
            }
        }
    }

    ws.close().await;
    Ok(())
}

async fn cmd_complaint(id: i64) -> anyhow::Result<()> {
    let ws = Workspace::open().await?;
    let user = ws.signed_in()?;
    ws.require_admin(&user)?;

    let client = ws.engine.client();
    let ratings = client.ratings(None).await?;
    let rating = ratings
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| TallyError::NotFound(format!("rating {}", id)))?;

    if is_complaint(rating) {
        eprintln!("✓ Rating {} is already a complaint", id);
    } else {
        let updated = client.mark_complaint(rating).await?;
        eprintln!(
            "✓ Rating {} marked as complaint: {} scored {}",
            updated.id, updated.customer_number, updated.score
        );
    }

    ws.close().await;
    Ok(())
}

async fn cmd_profile(name: Option<String>) -> anyhow::Result<()> {
    let ws = Workspace::open().await?;
    let user = ws.signed_in()?;
    let client = ws.engine.client();

    if let Some(name) = name {
        let outcome = client.save_profile_name(&user, &name).await?;
        match &outcome {
            Submission::Sent(_) => eprintln!("✓ Profile name saved"),
            Submission::Queued { .. } => eprintln!("⚠ {}", outcome.message()),
        }
    }

    let view = client.load_profile(&user).await;
    println!("Email: {}", view.profile.email);
    println!(
        "Name:  {}",
        view.profile.name.as_deref().unwrap_or("(not set)")
    );
    if view.pending_name {
        eprintln!("⚠ Name change waiting to sync");
    }
    if view.needs_full_name {
        eprintln!("⚠ Please enter your full name (First and Last): tally profile --name \"First Last\"");
    }

    ws.close().await;
    Ok(())
}

async fn cmd_sync() -> anyhow::Result<()> {
    let ws = Workspace::open().await?;
    let queue = ws.engine.queue();

    if !ws.engine.is_online() {
        let queued: usize = queue.owners().iter().map(|o| queue.len(o)).sum();
        eprintln!("⚠ Server unreachable; {} writes remain queued", queued);
        ws.close().await;
        return Ok(());
    }

    let reports = ws.engine.drain_all().await;
    if reports.is_empty() {
        eprintln!("✓ Nothing to sync");
    }
    for (owner, report) in &reports {
        match &report.failed {
            None => eprintln!("✓ {}: {} replayed", owner, report.replayed),
            Some(error) => eprintln!(
                "⚠ {}: {} replayed, {} still queued ({})",
                owner, report.replayed, report.remaining, error
            ),
        }
    }

    ws.close().await;
    Ok(())
}

async fn cmd_watch() -> anyhow::Result<()> {
    let Workspace { config, mut engine } = Workspace::open().await?;

    eprintln!("✓ Watching connectivity to {}", config.remote.base_url);
    eprintln!(
        "  Currently {}. Press Ctrl+C to stop.",
        if engine.is_online() { "online" } else { "offline" }
    );

    let mut rx = engine.connectivity().subscribe();
    engine.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if *rx.borrow_and_update() {
                    eprintln!("✓ Back online, syncing queued writes");
                } else {
                    eprintln!("⚠ Connection lost, writes will be queued");
                }
            }
        }
    }

    engine.shutdown().await;
    eprintln!("✓ Stopped");
    Ok(())
}
