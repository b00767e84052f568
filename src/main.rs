use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use wowstat::config;
use wowstat::db;
use wowstat::parser::split_character_key;
use wowstat::{
    recorded_period, reset_now, time_until_reset, DataQualityEngine, ImportStatus, Importer,
    PeriodId, ResetOutcome, Roster, TracingSink, WeeklyResetController, VERSION,
};

#[derive(Parser)]
#[command(name = "wowstat")]
#[command(about = "Track weekly character progress from the WoW Stat Tracker addon")]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "WOWSTAT_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    /// Show debug diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import the addon's SavedVariables file
    Import {
        /// Addon data file (found under the game folder when omitted)
        #[arg(value_name = "FILE", env = "WOWSTAT_ADDON_FILE")]
        file: Option<PathBuf>,

        /// Game install folder, the one containing `_retail_`
        #[arg(long, env = "WOW_PATH", value_name = "DIR")]
        wow_path: Option<PathBuf>,
    },

    /// List tracked characters
    List,

    /// Show the current weekly period and time until reset
    Week {
        /// Evaluate at this unix timestamp instead of now
        #[arg(long, value_name = "UNIX")]
        at: Option<i64>,
    },

    /// Set a character's notes
    Notes {
        /// Character as Name-Realm
        character: String,
        text: String,
    },

    /// Stop tracking a character
    Delete {
        /// Character as Name-Realm
        character: String,
    },

    /// Clear this week's progress for every character now
    ResetWeekly,

    /// Show recent notifications
    Notifications {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Remove the notification with this id
        #[arg(long, value_name = "ID", conflicts_with = "clear")]
        remove: Option<String>,

        /// Remove every notification
        #[arg(long)]
        clear: bool,
    },

    /// Flag values outside the ranges the game allows
    Check,

    /// Export the roster
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let db_path = cli.db.clone().unwrap_or_else(config::default_db_path);
    config::ensure_parent_dir(&db_path)
        .with_context(|| format!("Failed to create directory for {}", db_path.display()))?;

    let conn = Connection::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    db::setup_database(&conn).context("Failed to set up database")?;

    let mut roster = db::load_roster(&conn).context("Failed to load roster")?;

    let mut reset = WeeklyResetController::new();
    match reset.run_once(&conn, &mut roster, Utc::now()) {
        Ok(ResetOutcome::Reset { previous, current, cleared }) => {
            println!("🔄 Weekly reset: {} → {} ({} characters cleared)", previous, current, cleared);
        }
        Ok(_) => {}
        // Period stays unrecorded, so the reset is retried next start
        Err(e) => tracing::warn!("weekly reset failed: {}", e),
    }

    match cli.command {
        Command::Import { file, wow_path } => run_import(&conn, &mut roster, file, wow_path),
        Command::List => run_list(&roster),
        Command::Week { at } => run_week(&conn, at),
        Command::Notes { character, text } => run_notes(&conn, &character, &text),
        Command::Delete { character } => run_delete(&conn, &mut roster, &character),
        Command::ResetWeekly => run_reset_weekly(&conn, &mut roster),
        Command::Notifications { limit, remove, clear } => {
            run_notifications(&conn, limit, remove.as_deref(), clear)
        }
        Command::Check => run_check(&roster),
        Command::Export { format, output } => run_export(&roster, format, &output),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// IMPORT
// ============================================================================

fn resolve_addon_file(
    conn: &Connection,
    file: Option<PathBuf>,
    wow_path: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(file);
    }

    let wow_path = match wow_path {
        Some(path) => {
            if !config::is_wow_install(&path) {
                bail!("{} does not contain a _retail_ folder", path.display());
            }
            db::set_setting(conn, db::WOW_PATH_KEY, &path.to_string_lossy())?;
            path
        }
        None => match db::get_setting(conn, db::WOW_PATH_KEY)? {
            Some(saved) => PathBuf::from(saved),
            None => config::detect_wow_path().context(
                "World of Warcraft not found; pass --wow-path or the addon file directly",
            )?,
        },
    };

    Ok(config::find_addon_file(&wow_path)?)
}

fn run_import(
    conn: &Connection,
    roster: &mut Roster,
    file: Option<PathBuf>,
    wow_path: Option<PathBuf>,
) -> Result<()> {
    let path = resolve_addon_file(conn, file, wow_path)?;
    println!("📂 Importing {}", path.display());

    let summary = Importer::new(conn, VERSION)
        .import_file(&path, roster, &mut TracingSink)
        .context("Import failed")?;

    if let Some(mismatch) = &summary.report.version_mismatch {
        println!("⚠️  {}", mismatch.message());
    }

    match summary.status {
        ImportStatus::NoData => println!("⚠️  {}", summary.message()),
        ImportStatus::UpToDate => println!("✓ {}", summary.message()),
        ImportStatus::Saved => println!("✅ {}", summary.message()),
    }
    if summary.report.skipped > 0 {
        println!("   Skipped {} records without a name or realm", summary.report.skipped);
    }

    Ok(())
}

// ============================================================================
// VIEWS
// ============================================================================

fn run_list(roster: &Roster) -> Result<()> {
    if roster.is_empty() {
        println!("No characters yet. Run `wowstat import` first.");
        return Ok(());
    }

    println!(
        "{:<28} {:>7} {:>5} {:>6} {:>5} {:>4} {:>6} {:>3}  {}",
        "Character", "iLvl", "Vault", "Delves", "Dungs", "T8+", "Gilded", "TW", "Notes"
    );
    println!("{}", "━".repeat(86));

    for c in roster.iter() {
        println!(
            "{:<28} {:>7.1} {:>5} {:>6} {:>5} {:>4} {:>6} {:>3}  {}",
            c.key(),
            c.item_level,
            if c.vault_visited { "✓" } else { "-" },
            c.delves,
            c.dungeons,
            c.vault_t8_plus,
            c.gilded_stash,
            c.timewalk,
            c.notes
        );
    }

    println!("\n{} characters", roster.len());
    Ok(())
}

fn format_countdown(remaining: Duration) -> String {
    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;
    format!("{}d {}h {}m", days, hours, minutes)
}

fn run_week(conn: &Connection, at: Option<i64>) -> Result<()> {
    let (period, now) = match at {
        Some(secs) => {
            let period = PeriodId::for_unix(secs)
                .with_context(|| format!("Timestamp {} is out of range", secs))?;
            let now = DateTime::<Utc>::from_timestamp(secs, 0)
                .with_context(|| format!("Timestamp {} is out of range", secs))?;
            (period, now)
        }
        None => (PeriodId::current(), Utc::now()),
    };

    println!("📅 Week {}", period);
    println!("   Resets in {}", format_countdown(time_until_reset(now)));
    match recorded_period(conn)? {
        Some(recorded) => println!("   Last reset check: week {}", recorded),
        None => println!("   Last reset check: never"),
    }
    Ok(())
}

fn run_notes(conn: &Connection, character: &str, text: &str) -> Result<()> {
    let (name, realm) = split_character_key(character)
        .with_context(|| format!("Expected Name-Realm, got '{}'", character))?;

    db::set_notes(conn, realm, name, text)?;
    println!("✓ Notes saved for {}", character);
    Ok(())
}

fn run_delete(conn: &Connection, roster: &mut Roster, character: &str) -> Result<()> {
    let (name, realm) = split_character_key(character)
        .with_context(|| format!("Expected Name-Realm, got '{}'", character))?;

    db::delete_character(conn, realm, name)?;
    roster.remove(realm, name);
    println!("✓ Deleted {} ({} characters left)", character, roster.len());
    Ok(())
}

fn run_reset_weekly(conn: &Connection, roster: &mut Roster) -> Result<()> {
    let cleared = reset_now(conn, roster).context("Failed to save weekly reset")?;
    println!("🔄 Cleared weekly progress for {} characters", cleared);
    Ok(())
}

fn run_notifications(
    conn: &Connection,
    limit: usize,
    remove: Option<&str>,
    clear: bool,
) -> Result<()> {
    if clear {
        let removed = db::clear_notifications(conn)?;
        println!("✓ Cleared {} notifications", removed);
        return Ok(());
    }
    if let Some(id) = remove {
        if !db::remove_notification(conn, id)? {
            bail!("No notification with id {}", id);
        }
        println!("✓ Removed notification {}", id);
        return Ok(());
    }

    let notifications = db::get_recent_notifications(conn, limit)?;
    if notifications.is_empty() {
        println!("No notifications.");
        return Ok(());
    }

    println!(
        "Showing {} of {}",
        notifications.len(),
        db::count_notifications(conn)?
    );

    for n in notifications {
        println!(
            "{} {}  {}  [{}]",
            n.kind.icon(),
            n.timestamp.format("%Y-%m-%d %H:%M"),
            n.message,
            n.id
        );
    }
    Ok(())
}

fn run_check(roster: &Roster) -> Result<()> {
    let engine = DataQualityEngine::new();
    let reports = engine.validate_batch(roster.iter());

    for report in reports.iter().filter(|r| !r.is_valid()) {
        println!("⚠️  {}", report.summary());
    }
    println!("🔍 {}", engine.batch_summary(&reports).summary());
    Ok(())
}

fn run_export(roster: &Roster, format: ExportFormat, output: &Path) -> Result<()> {
    match format {
        ExportFormat::Json => db::export_json(roster, output),
        ExportFormat::Csv => db::export_csv(roster, output),
    }
    .with_context(|| format!("Failed to export to {}", output.display()))?;

    println!("✓ Exported {} characters to {}", roster.len(), output.display());
    Ok(())
}
