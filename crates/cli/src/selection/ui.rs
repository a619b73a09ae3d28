use std::fmt::Display;
use std::io::{stdout, Write};
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::style::Color::{DarkBlue, DarkGreen, Reset, Yellow};
use crossterm::style::{
    Attribute, Color, Print, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{cursor, event, execute, queue, terminal, ExecutableCommand};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use itertools::Itertools;
use sdm_ui_core::error::Result;
use sdm_ui_core::listing::render_rows;
use sdm_ui_core::model::DataSource;

use super::colors::StatusColor;
use super::types::CycleDirection::{Down, Up};
use super::types::{CycleDirection, SourceChoice, UiState, ViewportState};

/// Header line plus filter line
const RESERVED_ROWS: u16 = 2;

/// Choice, replacement state and cursor movement requested by one key press
type KeyOutcome = (Option<SourceChoice>, Option<UiState>, Option<CycleDirection>);

struct RawModeGuard;

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Disable raw mode on drop
        let _ = disable_raw_mode();
        let mut stdout = stdout();
        let _ = stdout.execute(DisableMouseCapture);
        let _ = stdout.execute(LeaveAlternateScreen);
    }
}

/// Lets the user pick one of `data_sources` by typing to filter.
///
/// Returns the index into `data_sources`, or [`SourceChoice::Cancelled`] on
/// escape or ctrl-c.
///
/// # Errors
///
/// Returns an error if the terminal cannot be put into raw mode or drawn to.
pub fn prompt_for_data_source(data_sources: &[DataSource]) -> Result<SourceChoice> {
    let labels = render_rows(data_sources, false);
    let mut stdout = stdout();

    stdout.execute(EnterAlternateScreen)?;
    enable_raw_mode()?;

    // When this goes out of scope, raw mode and mouse capture is disabled
    let _raw_mode_guard = RawModeGuard;
    stdout.execute(EnableMouseCapture)?;

    let (width, height) = terminal::size()?;
    let mut ui_state = UiState::new(width, height.saturating_sub(RESERVED_ROWS));
    let mut indexes_to_display = filter_entries(&labels, &ui_state.filter_text);

    redraw_ui(&ui_state, &indexes_to_display, data_sources, &labels)?;

    let mut new_ui_state: Option<UiState> = None;
    let mut down_row: Option<u16> = None;

    loop {
        if let Some(state) = new_ui_state.take() {
            if state != ui_state {
                if state.filter_text != ui_state.filter_text {
                    indexes_to_display = filter_entries(&labels, &state.filter_text);
                }
                ui_state = state;
                redraw_ui(&ui_state, &indexes_to_display, data_sources, &labels)?;
            }
        }

        if !event::poll(Duration::from_millis(500))? {
            continue;
        }

        let mut index_change_direction: Option<CycleDirection> = None;

        match event::read()? {
            Event::Mouse(MouseEvent {
                kind,
                row,
                modifiers,
                ..
            }) if modifiers == KeyModifiers::NONE => match kind {
                MouseEventKind::Down(MouseButton::Left) => down_row = Some(row),
                MouseEventKind::Up(MouseButton::Left) => {
                    if let Some(row) = down_row.take() {
                        if let Some(choice) = clicked_choice(row, &ui_state, &indexes_to_display) {
                            return Ok(choice);
                        }
                    }
                }
                MouseEventKind::ScrollDown => index_change_direction = Some(Down),
                MouseEventKind::ScrollUp => index_change_direction = Some(Up),
                _ => {}
            },
            Event::Key(key_event) => {
                let (choice, state, direction) =
                    handle_key_event(key_event, &ui_state, &indexes_to_display)?;

                if let Some(choice) = choice {
                    return Ok(choice);
                }

                new_ui_state = state;
                index_change_direction = direction;
            }
            Event::Resize(width, height) => {
                new_ui_state = Some(handle_resize(
                    width,
                    height,
                    &ui_state,
                    indexes_to_display.len(),
                ));
            }
            _ => {}
        }

        if let Some(direction) = index_change_direction {
            let moved = move_selected_index(
                new_ui_state.as_ref().unwrap_or(&ui_state),
                indexes_to_display.len(),
                direction,
            );
            new_ui_state = Some(moved);
        }
    }
}

fn redraw_ui(
    ui_state: &UiState,
    indexes_to_display: &[usize],
    data_sources: &[DataSource],
    labels: &[String],
) -> Result<()> {
    let mut stdout = stdout();

    queue!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;

    print_header(ui_state, indexes_to_display.len(), labels.len())?;

    if indexes_to_display.is_empty() {
        queue!(
            stdout,
            MoveTo(0, 1),
            SetForegroundColor(Color::Red),
            Print("No matching data sources!"),
            SetAttribute(Attribute::Reset),
            SetForegroundColor(Reset),
        )?;
    } else {
        print_rows_with_selection(ui_state, indexes_to_display, data_sources, labels)?;
    }

    queue!(
        stdout,
        MoveTo(0, ui_state.viewport.height + 1),
        SetAttribute(Attribute::Bold),
        Print(format!("> {}", ui_state.filter_text)),
        SetAttribute(Attribute::Reset)
    )?;

    stdout.flush()?;
    Ok(())
}

/// Handle keyboard events in the selection UI
fn handle_key_event(
    key_event: KeyEvent,
    ui_state: &UiState,
    indexes_to_display: &[usize],
) -> Result<KeyOutcome> {
    if key_event.kind != KeyEventKind::Press {
        return Ok((None, None, None));
    }

    let control = key_event.modifiers.contains(KeyModifiers::CONTROL);

    match key_event.code {
        KeyCode::Up => Ok((None, None, Some(Up))),
        KeyCode::Down => Ok((None, None, Some(Down))),
        KeyCode::Char('k' | 'p') if control => Ok((None, None, Some(Up))),
        KeyCode::Char('j' | 'n') if control => Ok((None, None, Some(Down))),
        KeyCode::Char('c') if control => Ok((Some(SourceChoice::Cancelled), None, None)),
        KeyCode::Char('u') if control => {
            Ok((None, Some(ui_state.with_filter(String::new())), None))
        }
        KeyCode::Esc => Ok((Some(SourceChoice::Cancelled), None, None)),
        KeyCode::Enter => {
            if let Some(index) = indexes_to_display.get(ui_state.selected_index) {
                return Ok((Some(SourceChoice::Index(*index)), None, None));
            }

            execute!(stdout(), Print("\x07"))?;
            Ok((None, None, None))
        }
        KeyCode::Backspace if !ui_state.filter_text.is_empty() => {
            let mut filter_text = ui_state.filter_text.clone();
            filter_text.pop();
            Ok((None, Some(ui_state.with_filter(filter_text)), None))
        }
        KeyCode::Char(c) if !control && !key_event.modifiers.contains(KeyModifiers::ALT) => {
            let mut filter_text = ui_state.filter_text.clone();
            filter_text.push(c);
            Ok((None, Some(ui_state.with_filter(filter_text)), None))
        }
        _ => Ok((None, None, None)),
    }
}

/// Maps a left click on screen `row` to the entry drawn there.
fn clicked_choice(
    row: u16,
    ui_state: &UiState,
    indexes_to_display: &[usize],
) -> Option<SourceChoice> {
    if row == 0 || row > ui_state.viewport.height {
        // Header or filter line
        return None;
    }

    let clicked_index = (row - 1) as usize + ui_state.viewport.offset;
    indexes_to_display
        .get(clicked_index)
        .map(|index| SourceChoice::Index(*index))
}

/// Handle window resize events
fn handle_resize(width: u16, height: u16, ui_state: &UiState, displayed_count: usize) -> UiState {
    let new_height = height.saturating_sub(RESERVED_ROWS);
    let mut ui_state = ui_state.clone();
    let mut new_viewport = ViewportState {
        width,
        height: new_height,
        offset: ui_state.viewport.offset,
    };

    // If growing taller, try to show more items above current selection
    match new_height.cmp(&ui_state.viewport.height) {
        std::cmp::Ordering::Greater if new_viewport.offset > 0 => {
            let height_increase = new_height - ui_state.viewport.height;
            new_viewport.offset = new_viewport.offset.saturating_sub(height_increase as usize);
        }
        std::cmp::Ordering::Less
            if ui_state.selected_index >= new_viewport.offset + new_height as usize =>
        {
            new_viewport.offset = ui_state
                .selected_index
                .saturating_sub((new_height as usize).saturating_sub(1));

            if new_viewport.offset + new_height as usize > displayed_count {
                new_viewport.offset = displayed_count.saturating_sub(new_height as usize);
            }
        }
        _ => {}
    }

    ui_state.viewport = new_viewport;
    ui_state
}

/// Print the header for the selection UI
fn print_header(ui_state: &UiState, displayed_count: usize, total_count: usize) -> Result<()> {
    let mut stdout = stdout();
    let width = ui_state.viewport.width as usize;

    let left_padding_size = 2usize;
    let left_padding = " ".repeat(left_padding_size);

    let position = if displayed_count == 0 {
        0
    } else {
        ui_state.selected_index + 1
    };

    let instructions = format!(
        "↑/↓: Move   |   {}/{} of {}   |   <enter>: Connect   |   <esc>: Quit",
        pad_to_width_of(position, displayed_count),
        displayed_count,
        total_count
    );

    let right_padding =
        " ".repeat(width.saturating_sub(left_padding_size + instructions.chars().count()));

    queue!(
        stdout,
        MoveTo(0, 0),
        SetBackgroundColor(DarkGreen),
        Print(left_padding),
        Print(instructions),
        Print(right_padding),
        SetBackgroundColor(Reset),
        SetForegroundColor(Reset),
    )?;

    Ok(())
}

/// Pad a value to match the width of the largest value
fn pad_to_width_of<T: Display>(value: T, max_number: usize) -> String {
    let width = format!("{}", max_number).len();
    format!("{:>width$}", value.to_string())
}

/// Clear and write one data source row
fn clear_and_write_row(
    row: u16,
    label: &str,
    data_source: &DataSource,
    is_selected: bool,
    terminal_width: u16,
) -> Result<()> {
    let mut stdout = stdout();
    let terminal_width = terminal_width as usize;

    queue!(stdout, MoveTo(0, row), Clear(ClearType::CurrentLine))?;

    let content: String = label.chars().take(terminal_width).collect();
    let padding = " ".repeat(terminal_width.saturating_sub(content.chars().count()));

    if is_selected {
        queue!(
            stdout,
            SetAttribute(Attribute::Bold),
            SetBackgroundColor(DarkBlue),
            SetForegroundColor(Yellow),
        )?;
    } else {
        queue!(
            stdout,
            SetBackgroundColor(Reset),
            SetForegroundColor(data_source.foreground_color().unwrap_or(Reset)),
        )?;
    }

    queue!(
        stdout,
        Print(content),
        Print(padding),
        SetAttribute(Attribute::Reset),
        SetBackgroundColor(Reset),
        SetForegroundColor(Reset),
    )?;

    Ok(())
}

/// Print the visible rows with the selected one highlighted
fn print_rows_with_selection(
    ui_state: &UiState,
    indexes_to_display: &[usize],
    data_sources: &[DataSource],
    labels: &[String],
) -> Result<()> {
    let mut stdout = stdout();
    let viewport = &ui_state.viewport;

    let visible_rows = indexes_to_display
        .iter()
        .skip(viewport.offset)
        .take(viewport.height as usize);

    for (i, index) in visible_rows.enumerate() {
        let is_selected = i + viewport.offset == ui_state.selected_index;

        clear_and_write_row(
            i as u16 + 1,
            &labels[*index],
            &data_sources[*index],
            is_selected,
            viewport.width,
        )?;
        queue!(stdout, cursor::MoveToNextLine(1))?;
    }

    Ok(())
}

/// Move the selected index in the given direction, wrapping at both ends
fn move_selected_index(
    ui_state: &UiState,
    displayed_count: usize,
    direction: CycleDirection,
) -> UiState {
    if displayed_count == 0 {
        return ui_state.clone();
    }

    let mut new_index = ui_state.selected_index;
    let mut ui_state = ui_state.clone();
    let visible_rows = (ui_state.viewport.height as usize).max(1);

    match direction {
        Up => {
            if new_index == 0 {
                new_index = displayed_count - 1;
                ui_state.viewport.offset = new_index.saturating_sub(visible_rows - 1);
            } else {
                new_index -= 1;
                if new_index < ui_state.viewport.offset {
                    ui_state.viewport.offset = new_index;
                }
            }
        }
        Down => {
            new_index = (new_index + 1) % displayed_count;
            if new_index < ui_state.selected_index {
                ui_state.viewport.offset = 0;
            } else if new_index >= ui_state.viewport.offset + visible_rows {
                ui_state.viewport.offset = new_index + 1 - visible_rows;
            }
        }
    }

    ui_state.selected_index = new_index;
    ui_state
}

/// Indexes of the labels that fuzzy-match `predicate`, in their original
/// order. An empty predicate matches everything.
pub(crate) fn filter_entries(labels: &[String], predicate: &str) -> Vec<usize> {
    if predicate.is_empty() {
        return (0..labels.len()).collect();
    }

    let matcher = SkimMatcherV2::default();

    labels
        .iter()
        .positions(|label| matcher.fuzzy_match(label, predicate).is_some())
        .collect()
}
