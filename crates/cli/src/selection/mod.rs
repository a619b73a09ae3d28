//! Interactive data source selection in the terminal.
//!
//! This module provides the built-in fuzzy finder used by `sdm-ui fzf` and
//! the hidden password prompt used by the terminal front ends.
//!
//! # Key Features
//!
//! - **Fuzzy Search**: Typing filters the list immediately, keeping recency order
//! - **Keyboard Navigation**: Arrow keys or ctrl-j/ctrl-k, with mouse support
//! - **Hidden Input**: Password entry without echo
//!
//! # User Interface
//!
//! The finder supports:
//! - Arrow keys, ctrl-j/ctrl-k or ctrl-n/ctrl-p to move
//! - Enter to connect to the highlighted data source
//! - Backspace to edit the filter, ctrl-u to clear it
//! - Escape or ctrl-c to quit without choosing

pub mod colors;
pub mod input;
pub mod types;
pub mod ui;

// Re-exports for convenience
pub use input::TerminalPrompt;
pub use types::SourceChoice;
pub use ui::prompt_for_data_source;
