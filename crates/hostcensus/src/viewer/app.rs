//! Viewer state and logic

use hostcensus_inventory::{CollectionKind, CollectionResult};

use super::action::Action;

/// Application state
pub struct App {
    pub kind: CollectionKind,
    /// Column headers
    pub columns: Vec<&'static str>,
    /// All rows, flattened
    rows: Vec<Vec<String>>,
    /// Indices into `rows` matching the filter
    visible: Vec<usize>,
    /// Selected position within `visible`
    pub selected: usize,
    /// Typing a filter
    pub search_active: bool,
    /// Case-insensitive substring filter
    pub search_query: String,
    /// Rows moved by PageUp/PageDown
    pub page_size: usize,
    should_quit: bool,
}

impl App {
    pub fn new(result: &CollectionResult) -> Self {
        let rows: Vec<Vec<String>> = result.records.iter().map(|r| r.values()).collect();
        let visible = (0..rows.len()).collect();
        Self {
            kind: result.kind,
            columns: result.kind.columns().to_vec(),
            rows,
            visible,
            selected: 0,
            search_active: false,
            search_query: String::new(),
            page_size: 10,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Total row count
    pub fn total(&self) -> usize {
        self.rows.len()
    }

    /// Rows that pass the filter, in original order
    pub fn visible_rows(&self) -> impl Iterator<Item = &[String]> {
        self.visible.iter().map(|&i| self.rows[i].as_slice())
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn handle_action(&mut self, action: Action) {
        let last = self.visible.len().saturating_sub(1);
        match action {
            Action::Quit => self.should_quit = true,
            Action::Up => self.selected = self.selected.saturating_sub(1),
            Action::Down => self.selected = (self.selected + 1).min(last),
            Action::PageUp => self.selected = self.selected.saturating_sub(self.page_size),
            Action::PageDown => self.selected = (self.selected + self.page_size).min(last),
            Action::First => self.selected = 0,
            Action::Last => self.selected = last,
            Action::Back => {
                self.search_active = false;
                if !self.search_query.is_empty() {
                    self.search_query.clear();
                    self.refilter();
                }
            }
            Action::SearchConfirm => self.search_active = false,
            Action::StartSearch => self.search_active = true,
            Action::SearchInput(c) => {
                if self.search_active {
                    self.search_query.push(c);
                    self.refilter();
                }
            }
            Action::SearchBackspace => {
                if self.search_active {
                    self.search_query.pop();
                    self.refilter();
                }
            }
            Action::Render | Action::None => {}
        }
    }

    fn refilter(&mut self) {
        let query = self.search_query.to_lowercase();
        self.visible = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                query.is_empty() || row.iter().any(|cell| cell.to_lowercase().contains(&query))
            })
            .map(|(i, _)| i)
            .collect();
        self.selected = self.selected.min(self.visible.len().saturating_sub(1));
    }
}
