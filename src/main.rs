mod backend;
mod config;
mod ui;
mod viewer;

use backend::fetch::{build_client, FetchImage, HttpFetcher};
use backend::sequence::{self, Sequence, SequenceSource};
use config::Config;
use ui::ui::{App, ui};
use viewer::Viewer;

use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use log::{error, info};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, path::PathBuf, sync::Arc, time::Instant};
use tokio::time::MissedTickBehavior;

const SCRUB_STEP: isize = 10;

#[derive(Parser)]
#[command(name = "dashview", version, about = "Scrub through one photo per day")]
struct Cli {
    /// Index JSON (file or URL) listing the images, or a camera photo listing with --listing
    source: String,

    /// Treat SOURCE as a camera photo listing
    #[arg(long)]
    listing: bool,

    /// Bearer token for the photo listing
    #[arg(long, env = "DASHVIEW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Maximum simultaneous image fetches
    #[arg(long)]
    concurrency: Option<usize>,

    /// Autoplay period in milliseconds
    #[arg(long)]
    period: Option<u64>,

    /// Config file (default: ~/.config/dashview/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file
    #[arg(long)]
    log: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Step(isize),
    Scrub(isize),
    First,
    Last,
    TogglePlay,
    Faster,
    Slower,
    Quit,
}

fn action_for(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Left | KeyCode::Char('h') => Some(Action::Step(-1)),
        KeyCode::Right | KeyCode::Char('l') => Some(Action::Step(1)),
        KeyCode::PageUp => Some(Action::Scrub(-SCRUB_STEP)),
        KeyCode::PageDown => Some(Action::Scrub(SCRUB_STEP)),
        KeyCode::Home => Some(Action::First),
        KeyCode::End => Some(Action::Last),
        KeyCode::Char(' ') => Some(Action::TogglePlay),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::Faster),
        KeyCode::Char('-') => Some(Action::Slower),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        let file = match std::fs::File::create(log_path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Error: failed to open log file {}: {e}", log_path.display());
                std::process::exit(1);
            }
        };
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
    // no --log: the terminal belongs to the viewer, so no logger

    let mut cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    cfg.merge_cli(cli.concurrency, cli.period);
    let config = match cfg.resolve() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    let source = if cli.listing {
        SequenceSource::Listing {
            source: cli.source.clone(),
            token: cli.token.clone(),
            window: config.window,
        }
    } else {
        SequenceSource::Index(cli.source.clone())
    };

    if let Err(e) = run(source, config).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(source: SequenceSource, config: Config) -> anyhow::Result<()> {
    let client = build_client(&config.user_agent, config.request_timeout)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();

    app.set_loading("Loading image list...");
    terminal.draw(|f| ui(f, &mut app, None))?;

    let res = match sequence::load(&source, &client).await {
        Ok(sequence) => {
            app.set_ready();
            let fetcher = Arc::new(HttpFetcher::new(client));
            run_app(&mut terminal, &mut app, Arc::new(sequence), fetcher, &config).await
        }
        Err(err) => {
            error!("failed to load image list: {err}");
            app.set_failed(err.to_string());
            wait_for_quit(&mut terminal, &mut app).await
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

async fn autoplay_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

async fn run_app<F: FetchImage>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    sequence: Arc<Sequence>,
    fetcher: Arc<F>,
    config: &Config,
) -> io::Result<()> {
    let (mut viewer, mut outcomes) = Viewer::new(
        sequence,
        fetcher,
        config.concurrency,
        config.autoplay_period,
        config.failure_cooldown,
    );
    viewer.start();
    info!("viewer started with {} images", viewer.status().len);

    let mut event_stream = EventStream::new();
    let mut frames = tokio::time::interval(config.frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_status = None;

    loop {
        let deadline = viewer.autoplay_deadline();

        tokio::select! {
            // Display refresh
            _ = frames.tick() => {
                viewer.flush(app);
                let status = viewer.status();
                if app.take_dirty() || last_status.as_ref() != Some(&status) {
                    terminal.draw(|f| ui(f, app, Some(&status)))?;
                    last_status = Some(status);
                }
            }

            // Handle keyboard events
            Some(Ok(event)) = event_stream.next() => {
                match event {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        let now = Instant::now();
                        match action_for(key.code) {
                            Some(Action::Step(delta)) => viewer.step(delta),
                            Some(Action::Scrub(delta)) => viewer.seek_by(delta),
                            Some(Action::First) => viewer.seek(0),
                            Some(Action::Last) => viewer.seek_last(),
                            Some(Action::TogglePlay) => viewer.toggle_play(now),
                            Some(Action::Faster) => viewer.faster(now),
                            Some(Action::Slower) => viewer.slower(now),
                            Some(Action::Quit) => return Ok(()),
                            None => {}
                        }
                    }
                    Event::Resize(_, _) => app.mark_dirty(),
                    _ => {}
                }
            }

            // Fetch completions
            Some(outcome) = outcomes.recv() => {
                viewer.handle_outcome(outcome);
            }

            _ = autoplay_due(deadline) => {
                viewer.on_autoplay_tick(Instant::now());
            }
        }
    }
}

async fn wait_for_quit(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();
    loop {
        if app.take_dirty() {
            terminal.draw(|f| ui(f, app, None))?;
        }
        match event_stream.next().await {
            Some(Ok(Event::Key(key))) if action_for(key.code) == Some(Action::Quit) => {
                return Ok(());
            }
            Some(Ok(Event::Resize(_, _))) => app.mark_dirty(),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e),
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_keys() {
        assert_eq!(action_for(KeyCode::Left), Some(Action::Step(-1)));
        assert_eq!(action_for(KeyCode::Char('l')), Some(Action::Step(1)));
        assert_eq!(action_for(KeyCode::PageDown), Some(Action::Scrub(10)));
        assert_eq!(action_for(KeyCode::PageUp), Some(Action::Scrub(-10)));
        assert_eq!(action_for(KeyCode::Home), Some(Action::First));
        assert_eq!(action_for(KeyCode::End), Some(Action::Last));
    }

    #[test]
    fn test_playback_keys() {
        assert_eq!(action_for(KeyCode::Char(' ')), Some(Action::TogglePlay));
        assert_eq!(action_for(KeyCode::Char('+')), Some(Action::Faster));
        assert_eq!(action_for(KeyCode::Char('-')), Some(Action::Slower));
        assert_eq!(action_for(KeyCode::Esc), Some(Action::Quit));
        assert_eq!(action_for(KeyCode::Char('x')), None);
    }

    #[test]
    fn test_cli_parses_listing_flags() {
        let cli = Cli::try_parse_from([
            "dashview",
            "https://example.com/photos",
            "--listing",
            "--concurrency",
            "4",
            "--period",
            "250",
        ])
        .unwrap();
        assert!(cli.listing);
        assert_eq!(cli.concurrency, Some(4));
        assert_eq!(cli.period, Some(250));
        assert!(cli.log.is_none());
    }
}
