//! Type definitions for data source selection and UI state.

/// Outcome of the fuzzy finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceChoice {
    /// Index into the slice the finder was given.
    Index(usize),
    Cancelled,
}

/// Direction to cycle through entries in the selection UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDirection {
    Up,
    Down,
}

/// Visible window over the filtered entries.
#[derive(Clone, PartialEq, Debug)]
pub struct ViewportState {
    /// First filtered entry shown on screen.
    pub offset: usize,
    /// Rows available for entries.
    pub height: u16,
    pub width: u16,
}

/// Everything that affects what the finder draws.
///
/// `selected_index` points into the filtered entries, not the original slice.
#[derive(Clone, PartialEq, Debug)]
pub struct UiState {
    pub selected_index: usize,
    pub viewport: ViewportState,
    pub filter_text: String,
}

impl UiState {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            selected_index: 0,
            viewport: ViewportState {
                offset: 0,
                height,
                width,
            },
            filter_text: String::new(),
        }
    }

    /// Copy of this state with a new filter, scrolled back to the top.
    pub fn with_filter(&self, filter_text: String) -> Self {
        let mut state = self.clone();
        state.filter_text = filter_text;
        state.selected_index = 0;
        state.viewport.offset = 0;
        state
    }
}
