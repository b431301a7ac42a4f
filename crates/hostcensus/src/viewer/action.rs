//! User actions for the viewer

/// Actions that can be performed in the viewer
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Quit the viewer
    Quit,
    /// Redraw after resize
    Render,
    /// Move selection up
    Up,
    /// Move selection down
    Down,
    /// Move one page up
    PageUp,
    /// Move one page down
    PageDown,
    /// Jump to first row
    First,
    /// Jump to last row
    Last,
    /// Clear the filter and leave filter input
    Back,
    /// Keep the typed filter and leave filter input
    SearchConfirm,
    /// Start typing a filter
    StartSearch,
    /// Append to the filter
    SearchInput(char),
    /// Delete from the filter
    SearchBackspace,
    /// No operation
    None,
}
