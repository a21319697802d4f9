//! # CLI Layer
//!
//! This module is **one possible client** of docrecall. It is the only place
//! that parses arguments, reads files from disk, asks for confirmation, writes
//! to stdout/stderr, or installs the log subscriber.
//!
//! ## Structure
//!
//! - `run()`: Main dispatch logic (called by `main.rs`)
//! - `init_context()`: Resolves the data directory and opens the store
//! - `handle_*()`: Per-command handlers that call the API and print results

use super::render::{print_messages, render_config, render_history, render_hot_close, render_usage};
use super::setup::{Cli, Commands};
use clap::Parser;
use docrecall::commands::config::ConfigAction;
use docrecall::commands::CmdMessage;
use docrecall::editor::DocumentState;
use docrecall::error::{RecallError, Result};
use docrecall::init::{data_dir, initialize, RecallContext};
use docrecall::model::{FieldKind, Scope, SessionData, SessionKey};
use docrecall::upsert::WriteStatus;
use std::io::{self, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DOCRECALL_LOG";

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let dir = data_dir()?;

    match cli.command {
        // config does not need the database
        Commands::Config { key, value } => handle_config(&dir, key, value),
        command => dispatch(&dir, command),
    }
}

fn dispatch(dir: &Path, command: Commands) -> Result<()> {
    let ctx = initialize(dir)?;

    match command {
        Commands::Init => handle_init(&ctx),
        Commands::Capture {
            file,
            line,
            ch,
            clean,
        } => handle_capture(&ctx, &file, line, ch, clean),
        Commands::Snapshot { file } => handle_snapshot(&ctx, &file),
        Commands::Show { file, history } => handle_show(&ctx, &file, history),
        Commands::History { file } => handle_show(&ctx, &file, true),
        Commands::Restore { file, timestamp } => handle_restore(&ctx, &file, timestamp),
        Commands::Delete { file, history, at } => handle_delete(&ctx, &file, history, at),
        Commands::Wipe { history, yes } => handle_wipe(&ctx, history, yes),
        Commands::Stats => handle_stats(&ctx),
        Commands::Doctor => handle_doctor(&ctx),
        Commands::Config { key, value } => handle_config(dir, key, value),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Existing files are keyed by their canonical path; anything else as given.
fn session_key(file: &str) -> SessionKey {
    std::fs::canonicalize(file)
        .map(|p| SessionKey::new(p.to_string_lossy().into_owned()))
        .unwrap_or_else(|_| SessionKey::from(file))
}

fn scope_for(history: bool) -> Scope {
    if history {
        Scope::LocalHistory
    } else {
        Scope::HotClose
    }
}

fn read_document(file: &str) -> Result<(SessionKey, String)> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| RecallError::Api(format!("Could not read {}: {}", file, e)))?;
    Ok((session_key(file), text))
}

fn handle_init(ctx: &RecallContext) -> Result<()> {
    let result = ctx.api.init(ctx.config.features);
    print_messages(&result.messages);
    println!("{}", ctx.data_dir.display());
    Ok(())
}

fn handle_capture(ctx: &RecallContext, file: &str, line: u32, ch: u32, clean: bool) -> Result<()> {
    let (session, text) = read_document(file)?;
    let mut doc = DocumentState::new(session, text).with_cursor(line, ch);
    if clean {
        doc = doc.clean();
    }

    let report = ctx.api.capture_unsaved_changes(&doc);
    let mut messages = Vec::new();
    for (kind, outcome) in &report.fields {
        match &outcome.status {
            WriteStatus::Abandoned(err) => {
                messages.push(CmdMessage::warning(format!("{}: {}", field_name(*kind), err)))
            }
            WriteStatus::EncodeFailed(reason) => {
                messages.push(CmdMessage::warning(format!("{}: {}", field_name(*kind), reason)))
            }
            _ => {}
        }
    }
    match report.purged {
        Some(n) => messages.push(CmdMessage::success(format!(
            "Document is clean; removed {} hot-close row(s) for {}.",
            n, report.session
        ))),
        None if report.fields.iter().all(|(_, o)| o.status == WriteStatus::Disabled) => {
            messages.push(CmdMessage::info("Hot close is disabled."))
        }
        None => messages.push(CmdMessage::success(format!(
            "Captured {}/{} field(s) for {}.",
            report.stored(),
            report.fields.len(),
            report.session
        ))),
    }
    print_messages(&messages);
    Ok(())
}

fn field_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::CursorPosition => "cursor",
        FieldKind::ScrollPosition => "scroll",
        FieldKind::UndoRedoHistory => "history",
        FieldKind::DocumentText => "text",
    }
}

fn handle_snapshot(ctx: &RecallContext, file: &str) -> Result<()> {
    let (session, text) = read_document(file)?;
    let timestamp = docrecall::commands::now_millis();
    let report = ctx.api.record_save(&DocumentState::new(session, text).clean(), timestamp);

    let message = match &report.snapshot.status {
        WriteStatus::Inserted | WriteStatus::Updated => {
            CmdMessage::success(format!("Snapshot {} saved for {}.", timestamp, report.session))
        }
        WriteStatus::Disabled => CmdMessage::info("Local history is disabled."),
        WriteStatus::Abandoned(err) => CmdMessage::warning(format!("Snapshot not saved: {}", err)),
        WriteStatus::EncodeFailed(reason) => {
            CmdMessage::warning(format!("Snapshot not saved: {}", reason))
        }
    };
    print_messages(&[message]);
    Ok(())
}

fn handle_show(ctx: &RecallContext, file: &str, history: bool) -> Result<()> {
    let session = session_key(file);
    let output = match ctx.api.read_session(&session, scope_for(history)) {
        SessionData::HotClose(state) => render_hot_close(&session, &state),
        SessionData::LocalHistory(snapshots) => render_history(&session, &snapshots),
    };
    print!("{}", output);
    Ok(())
}

fn handle_restore(ctx: &RecallContext, file: &str, timestamp: i64) -> Result<()> {
    let session = session_key(file);
    match ctx.api.read_snapshot(&session, timestamp) {
        Some(snapshot) => {
            print!("{}", snapshot.text);
            Ok(())
        }
        None => Err(RecallError::Api(format!(
            "No snapshot {} for {}",
            timestamp, session
        ))),
    }
}

fn handle_delete(ctx: &RecallContext, file: &str, history: bool, at: Option<i64>) -> Result<()> {
    let result = ctx
        .api
        .delete_session(&session_key(file), scope_for(history), at);
    print_messages(&result.messages);
    Ok(())
}

fn handle_wipe(ctx: &RecallContext, history: bool, yes: bool) -> Result<()> {
    let scope = scope_for(history);
    if !yes {
        println!("This will permanently drop all {} data.", scope);
        print!("[Y] To wipe: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if input.trim() != "Y" {
            print_messages(&[CmdMessage::info("Operation cancelled.")]);
            return Ok(());
        }
    }

    let result = ctx.api.wipe_all(scope);
    print_messages(&result.messages);
    Ok(())
}

fn handle_stats(ctx: &RecallContext) -> Result<()> {
    let result = ctx.api.usage();
    print!("{}", render_usage(&result.usage));
    print_messages(&result.messages);
    Ok(())
}

fn handle_doctor(ctx: &RecallContext) -> Result<()> {
    let result = ctx.api.doctor();
    print_messages(&result.messages);
    Ok(())
}

fn handle_config(dir: &Path, key: Option<String>, value: Option<String>) -> Result<()> {
    let action = match (key, value) {
        (None, _) => ConfigAction::ShowAll,
        (Some(k), None) => ConfigAction::ShowKey(k),
        (Some(k), Some(v)) => ConfigAction::Set(k, v),
    };
    let show_all = matches!(action, ConfigAction::ShowAll);

    let result = docrecall::commands::config::run(dir, action)?;
    if show_all {
        if let Some(config) = &result.config {
            print!("{}", render_config(config));
        }
    }
    print_messages(&result.messages);
    if result.has_errors() {
        return Err(RecallError::Config("Configuration not changed".to_string()));
    }
    Ok(())
}
