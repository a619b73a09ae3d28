//! Selection through an external dmenu-style program (rofi or wofi).

use log::debug;
use sdm_ui_core::config::MenuProgram;
use sdm_ui_core::error::{Error, Result};
use sdm_ui_core::execution::run_command;

pub const MENU_PROMPT: &str = "Select Data Source";

/// Exit status rofi and wofi use when the menu is dismissed.
const MENU_DISMISSED: i32 = 1;

/// Arguments putting `menu` into dmenu mode with our prompt.
pub fn menu_args(menu: MenuProgram) -> [&'static str; 3] {
    match menu {
        MenuProgram::Rofi => ["-dmenu", "-p", MENU_PROMPT],
        MenuProgram::Wofi => ["--dmenu", "--prompt", MENU_PROMPT],
    }
}

/// Shows `lines` in the menu and returns the chosen one.
///
/// `None` means nothing was chosen: the menu was dismissed, it printed
/// nothing, or there was nothing to show.
///
/// # Errors
///
/// Returns an error if the menu cannot be launched or fails for any other
/// reason than being dismissed.
pub fn select_with_menu(menu: MenuProgram, lines: &[String]) -> Result<Option<String>> {
    if lines.is_empty() {
        debug!("Nothing to show in {}", menu.binary());
        return Ok(None);
    }

    let input = lines.join("\n");
    let output = run_command(menu.binary(), &menu_args(menu), Some(&input), None)?;

    if output.status.code() == Some(MENU_DISMISSED) {
        debug!("{} dismissed", menu.binary());
        return Ok(None);
    }

    if !output.success() {
        return Err(Error::Misc(format!(
            "`{}` exited with {}: {}",
            menu.binary(),
            output.status,
            output.stderr.trim()
        )));
    }

    let selection = output.stdout.trim();
    if selection.is_empty() {
        return Ok(None);
    }

    Ok(Some(selection.to_string()))
}

/// The data source name of a listing line: its first field.
///
/// Listing lines always carry at least a name and a status icon, so a line
/// with fewer than two whitespace-separated fields did not come from us.
pub fn entry_name(line: &str) -> Option<&str> {
    let mut fields = line.split_whitespace();
    let name = fields.next()?;
    fields.next()?;
    Some(name)
}
