//! Interactive record viewer

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use hostcensus_inventory::CollectionResult;
use ratatui::prelude::*;
use tracing::warn;

mod action;
mod app;
mod event;
mod ui;

use action::Action;
use app::App;
use event::{Event, EventHandler};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

type Term = Terminal<CrosstermBackend<Stdout>>;

/// Show the result in a scrollable, filterable table until the user quits
///
/// # Errors
/// Returns error if the terminal cannot be set up, drawn or restored
pub async fn run(result: &CollectionResult) -> eyre::Result<()> {
    enable_raw_mode()?;
    let mut terminal = setup_or_restore(enter_screen, || {
        if let Err(e) = leave_screen(&mut io::stdout()) {
            warn!(error = %e, "failed to restore terminal");
        }
    })?;

    let mut app = App::new(result);
    let outcome = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    leave_screen(terminal.backend_mut())?;
    terminal.show_cursor()?;

    outcome
}

fn enter_screen() -> eyre::Result<Term> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn leave_screen(out: &mut impl Write) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(out, LeaveAlternateScreen)
}

/// Run `setup`, calling `restore` if it fails
fn setup_or_restore<T>(
    setup: impl FnOnce() -> eyre::Result<T>,
    restore: impl FnOnce(),
) -> eyre::Result<T> {
    setup().inspect_err(|_| restore())
}

async fn run_app(terminal: &mut Term, app: &mut App) -> eyre::Result<()> {
    let mut events = EventHandler::new(POLL_INTERVAL);
    events.start();

    loop {
        let height = terminal.size()?.height;
        app.page_size = usize::from(height.saturating_sub(ui::CHROME_HEIGHT).max(1));

        terminal.draw(|frame| ui::render(frame, app))?;

        let Some(event) = events.next().await else {
            break;
        };
        let action = match event {
            Event::Key(key) => event::key_to_action(key, app.search_active),
            Event::Resize(_, _) => Action::Render,
        };
        app.handle_action(action);

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_failed_setup_restores() {
        let restored = Cell::new(false);

        let result: eyre::Result<()> =
            setup_or_restore(|| Err(eyre::eyre!("no tty")), || restored.set(true));

        assert!(result.is_err());
        assert!(restored.get());
    }

    #[test]
    fn test_successful_setup_leaves_terminal_alone() {
        let restored = Cell::new(false);

        let value = setup_or_restore(|| Ok(7), || restored.set(true)).unwrap();

        assert_eq!(value, 7);
        assert!(!restored.get());
    }
}
