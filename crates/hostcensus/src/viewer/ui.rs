//! Record table and status bar

use hostcensus_inventory::CollectionKind;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

use super::app::App;

/// Rows taken by borders, header and status bar
pub const CHROME_HEIGHT: u16 = 4;

/// State colors
pub fn state_color(state: &str) -> Color {
    match state.to_lowercase().as_str() {
        "running" | "ready" => Color::Green,
        "startpending" | "start pending" | "queued" => Color::Yellow,
        "stoppending" | "stop pending" | "paused" | "pausepending" => Color::Cyan,
        "stopped" => Color::Red,
        "disabled" | "unknown" => Color::DarkGray,
        _ => Color::White,
    }
}

fn header_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

fn selected_style() -> Style {
    Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD)
}

fn kind_title(kind: CollectionKind) -> &'static str {
    match kind {
        CollectionKind::Services => "Services",
        CollectionKind::ScheduledTasks => "Scheduled Tasks",
    }
}

/// Render the whole viewer
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    render_table(frame, app, chunks[0]);
    render_status(frame, app, chunks[1]);
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let state_col = app.columns.iter().position(|c| *c == "State");

    let header = Row::new(app.columns.iter().map(|c| Cell::from(*c)))
        .style(header_style())
        .height(1);

    let rows: Vec<Row> = app
        .visible_rows()
        .map(|row| {
            Row::new(row.iter().enumerate().map(|(i, value)| {
                let cell = Cell::from(value.clone());
                if Some(i) == state_col {
                    cell.style(Style::default().fg(state_color(value)))
                } else {
                    cell
                }
            }))
        })
        .collect();

    // Descriptions get whatever is left
    let widths: Vec<Constraint> = app
        .columns
        .iter()
        .map(|c| match *c {
            "Description" => Constraint::Fill(1),
            "State" => Constraint::Length(10),
            "Host" => Constraint::Length(16),
            _ => Constraint::Max(32),
        })
        .collect();

    let visible = app.visible_count();
    let total = app.total();
    let title = format!(" {} ({visible}/{total}) ", kind_title(app.kind));

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .row_highlight_style(selected_style())
        .highlight_symbol("▸ ");

    let mut state = TableState::default();
    if visible > 0 {
        state.select(Some(app.selected));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let filter = if app.search_active {
        Span::styled(
            format!("/{}▏", app.search_query),
            Style::default().fg(Color::Yellow),
        )
    } else if app.search_query.is_empty() {
        Span::styled("no filter", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(
            format!("filter: {}", app.search_query),
            Style::default().fg(Color::Yellow),
        )
    };

    let keybindings = if app.search_active {
        "[Enter] Apply  [Esc] Clear  [Backspace] Delete"
    } else {
        "[j/k] Navigate  [g/G] Top/Bottom  [/] Filter  [Esc] Clear  [q] Quit"
    };

    let status_line = Line::from(vec![
        filter,
        Span::raw("  │  "),
        Span::styled(keybindings, Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(status_line), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_colors() {
        assert_eq!(state_color("Running"), Color::Green);
        assert_eq!(state_color("Ready"), Color::Green);
        assert_eq!(state_color("Stopped"), Color::Red);
        assert_eq!(state_color("Disabled"), Color::DarkGray);
        assert_eq!(state_color("Something"), Color::White);
    }
}
