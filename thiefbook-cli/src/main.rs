use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event;
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use thiefbook_core::{
    Command, FileStateStore, FsBookProvider, ReaderConfig, Session, SessionEvent, StateStore,
};
use thiefbook_tty::{write_status_line, DrawParams, EventMapper, TextPane, UiEvent};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "thiefbook",
    version,
    about = "page through very large text files one screen at a time"
)]
struct Args {
    /// Page to open the book on (1-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Lines shown per page, overriding the config file
    #[arg(short = 'n', long = "lines-per-page")]
    lines_per_page: Option<usize>,

    /// Blank lines between rendered lines, overriding the config file
    #[arg(short = 's', long = "line-spacing")]
    line_spacing: Option<usize>,

    /// Config file to read instead of the platform default
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Directory for reading positions and logs
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Print the page to stdout and exit
    #[arg(long = "print")]
    print: bool,

    /// Book to open; defaults to `book_path` from the config file
    file: Option<PathBuf>,
}

impl Args {
    fn apply_overrides(&self, config: &mut ReaderConfig) {
        if let Some(file) = &self.file {
            config.book_path = Some(file.clone());
        }
        if let Some(lines) = self.lines_per_page {
            config.lines_per_page = lines;
        }
        if let Some(spacing) = self.line_spacing {
            config.line_spacing = spacing;
        }
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "thiefbook", "thiefbook");
    let data_dir = match (&args.data_dir, &project_dirs) {
        (Some(dir), _) => dir.clone(),
        (None, Some(dirs)) => dirs.data_local_dir().to_path_buf(),
        (None, None) => return Err(anyhow!("unable to resolve platform data directories")),
    };
    let config_path = match (&args.config, &project_dirs) {
        (Some(path), _) => path.clone(),
        (None, Some(dirs)) => ReaderConfig::default_path(dirs),
        (None, None) => return Err(anyhow!("unable to resolve platform config directory")),
    };

    let _log_guard = init_logging(&data_dir, args.print)?;
    let config = load_config(&args, &config_path)?;
    info!(config = ?config_path, "configuration loaded");

    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(data_dir.join("state"))?);
    let mut session = Session::new(config, Arc::new(FsBookProvider::new()), store)?;
    if !session.open_configured()? {
        return Err(anyhow!(
            "no book to open: pass a file or set book_path in {:?}",
            config_path
        ));
    }

    if let Some(page) = args.page {
        session.apply(Command::GotoPage { page })?;
    }

    if args.print {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", session.view().text)?;
        return Ok(());
    }

    run_interactive(&mut session, || load_config(&args, &config_path))?;
    session.persist()?;
    Ok(())
}

fn load_config(args: &Args, path: &Path) -> Result<ReaderConfig> {
    let mut config = ReaderConfig::load(path)?;
    args.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

fn run_interactive<F>(session: &mut Session, reload_config: F) -> Result<()>
where
    F: Fn() -> Result<ReaderConfig>,
{
    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut pane = TextPane::new(stdout);
    let mut event_mapper = EventMapper::new();
    let mut notice: Option<String> = None;
    let mut dirty = true;

    loop {
        if dirty {
            let status = combine_status(
                Some(session.view().status_label()),
                event_mapper.pending_input().as_deref(),
                notice.as_deref(),
            );
            redraw(&mut pane, &session.view().text, status.as_deref())?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            let ui_event = event_mapper.map_event(ev);
            if notice.take().is_some() {
                dirty = true;
            }
            let action = match handle_event(ui_event, session, &reload_config) {
                Ok(action) => action,
                Err(err) => {
                    warn!(error = %format!("{:#}", err), "command failed");
                    notice = Some(format!("{:#}", err));
                    LoopAction::ContinueRedraw
                }
            };

            for event in session.events().lock().drain(..) {
                match event {
                    SessionEvent::Notice(message) => {
                        notice = Some(message);
                        dirty = true;
                    }
                    SessionEvent::RedrawNeeded(_) => dirty = true,
                    SessionEvent::BookOpened(id) => info!(%id, "book opened"),
                    SessionEvent::BookClosed(id) => info!(%id, "book closed"),
                }
            }

            match action {
                LoopAction::ContinueRedraw => dirty = true,
                LoopAction::Continue => {}
                LoopAction::Quit => break,
            }
        }
    }

    pane.clear_all()?;
    Ok(())
}

fn handle_event<F>(event: UiEvent, session: &mut Session, reload_config: &F) -> Result<LoopAction>
where
    F: Fn() -> Result<ReaderConfig>,
{
    match event {
        UiEvent::Command(cmd) => {
            session.apply(cmd)?;
            Ok(LoopAction::Continue)
        }
        UiEvent::Refresh => {
            let config = reload_config().context("failed to reload configuration")?;
            session.apply(Command::Refresh { config })?;
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::BeginJump | UiEvent::JumpInputChanged { .. } | UiEvent::JumpCancel => {
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::Quit => Ok(LoopAction::Quit),
        UiEvent::None => Ok(LoopAction::ContinueRedraw),
    }
}

fn redraw(pane: &mut TextPane<io::Stdout>, text: &str, status: Option<&str>) -> Result<()> {
    let (columns, rows) = terminal::size()?;
    let text_rows = rows.saturating_sub(1).max(1);

    pane.begin_sync_update()?;
    pane.draw(text, DrawParams::clamped(columns, text_rows))?;
    if let Some(status) = status {
        draw_status_line(pane, rows, status)?;
    }
    pane.end_sync_update()?;
    Ok(())
}

fn combine_status(
    base: Option<String>,
    pending_input: Option<&str>,
    notice: Option<&str>,
) -> Option<String> {
    let parts: Vec<String> = base
        .into_iter()
        .chain(pending_input.filter(|s| !s.is_empty()).map(str::to_string))
        .chain(notice.filter(|s| !s.is_empty()).map(str::to_string))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

fn draw_status_line(pane: &mut TextPane<io::Stdout>, rows: u16, status: &str) -> Result<()> {
    let status_row = rows.max(1) - 1;
    let writer = pane.writer();
    crossterm::execute!(
        writer,
        cursor::MoveTo(0, status_row),
        Clear(ClearType::CurrentLine)
    )?;
    write_status_line(writer, status)?;
    Ok(())
}

fn init_logging(data_dir: &Path, console: bool) -> Result<WorkerGuard> {
    let log_dir = data_dir.join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "thiefbook.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    // The interactive screen owns the terminal, so only print mode logs to it.
    let console_layer = console.then(|| tracing_subscriber::fmt::layer().with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_joins_present_parts() {
        assert_eq!(
            combine_status(Some("3/10".into()), Some("12"), Some("refreshed")).as_deref(),
            Some("3/10 | 12 | refreshed")
        );
        assert_eq!(
            combine_status(Some("3/10".into()), Some(""), None).as_deref(),
            Some("3/10")
        );
        assert_eq!(combine_status(None, None, None), None);
    }

    #[test]
    fn cli_flags_override_config_values() {
        let args = Args::parse_from([
            "thiefbook",
            "--lines-per-page",
            "40",
            "-s",
            "2",
            "novel.txt",
        ]);
        let mut config = ReaderConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.book_path, Some(PathBuf::from("novel.txt")));
        assert_eq!(config.lines_per_page, 40);
        assert_eq!(config.line_spacing, 2);
    }
}
