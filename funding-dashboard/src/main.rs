/// Funding Dashboard
///
/// Interactive terminal view of perpetual funding rates. Refreshes automatically every
/// `FUNDING_REFRESH_INTERVAL_SECS` and on demand, while the previous table stays on screen.
use std::{
    error::Error,
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use funding_dashboard::{
    Action, App, DashboardView,
    logging::{init_file_logging, log_file},
    ui,
};
use funding_data::{Config, RefreshState, Refresher, Scheduler, SchedulerHandle, SnapshotStore};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_file_logging(log_file())?;

    let config = Config::from_env();
    info!(?config, "starting funding dashboard");

    let refresher = Arc::new(Refresher::from_config(&config, Arc::new(SnapshotStore::new()))?);
    let scheduler = Scheduler::new(
        Arc::clone(&refresher),
        RefreshState::new(config.refresh_interval),
    )
    .spawn();

    let mut app = App::new(
        refresher.exchanges().collect(),
        config.rate_style,
        config.symbol_limit,
    );

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run(&mut terminal, &mut app, &refresher, &scheduler);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    scheduler.shutdown().await;
    info!("funding dashboard stopped");
    result.map_err(Into::into)
}

fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    refresher: &Refresher,
    scheduler: &SchedulerHandle,
) -> io::Result<()> {
    let state = scheduler.state();
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();
    let mut redraw = true;

    loop {
        if redraw || last_tick.elapsed() >= tick_rate {
            let view = DashboardView::capture(refresher, state.borrow().clone());
            terminal.draw(|f| ui::render(f, app, &view))?;
            last_tick = Instant::now();
            redraw = false;
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        if !event::poll(timeout)? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        redraw = true;
        match app.handle_key(key.code) {
            Some(Action::Quit) => return Ok(()),
            Some(Action::Refresh) => {
                if refresher.is_in_flight() {
                    info!("refresh already in flight, ignoring manual refresh");
                } else if !scheduler.refresh() {
                    warn!("scheduler unavailable, manual refresh dropped");
                }
            }
            Some(Action::SetSymbolLimit(limit)) => refresher.set_symbol_limit(limit),
            None => {}
        }
    }
}
