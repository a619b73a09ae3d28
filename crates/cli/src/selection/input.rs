use std::io::{stderr, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::debug;
use sdm_ui_core::credentials::PasswordPrompt;
use sdm_ui_core::error::{Error, Result};

/// What a key press does to a password being typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PasswordKey {
    Continue,
    Submit,
    Cancel,
}

struct RawInputGuard;

impl Drop for RawInputGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Reads a password from the terminal without echoing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn prompt(&self, account: &str) -> Result<String> {
        let mut stderr = stderr();
        write!(stderr, "Password for {account}: ")?;
        stderr.flush()?;

        let password = read_hidden_line();

        // Raw mode swallowed the newline
        write!(stderr, "\r\n")?;
        stderr.flush()?;

        password
    }
}

fn read_hidden_line() -> Result<String> {
    enable_raw_mode()?;
    let _raw_input_guard = RawInputGuard;

    let mut password = String::new();

    loop {
        if let Event::Key(key_event) = event::read()? {
            match apply_password_key(&mut password, key_event) {
                PasswordKey::Continue => {}
                PasswordKey::Submit => return Ok(password),
                PasswordKey::Cancel => {
                    debug!("Password prompt cancelled");
                    return Err(Error::Cancelled);
                }
            }
        }
    }
}

/// Applies one key press to the hidden input buffer
fn apply_password_key(password: &mut String, key_event: KeyEvent) -> PasswordKey {
    if key_event.kind != KeyEventKind::Press {
        return PasswordKey::Continue;
    }

    let control = key_event.modifiers.contains(KeyModifiers::CONTROL);

    match key_event.code {
        KeyCode::Enter => PasswordKey::Submit,
        KeyCode::Esc => PasswordKey::Cancel,
        KeyCode::Char('c' | 'd') if control => PasswordKey::Cancel,
        KeyCode::Char('u') if control => {
            password.clear();
            PasswordKey::Continue
        }
        KeyCode::Backspace => {
            password.pop();
            PasswordKey::Continue
        }
        KeyCode::Char(c) if !control => {
            password.push(c);
            PasswordKey::Continue
        }
        _ => PasswordKey::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_keys(events: &[KeyEvent]) -> (String, PasswordKey) {
        let mut password = String::new();
        let mut last = PasswordKey::Continue;
        for event in events {
            last = apply_password_key(&mut password, *event);
            if last != PasswordKey::Continue {
                break;
            }
        }
        (password, last)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typed_password_is_submitted() {
        let (password, outcome) = type_keys(&[
            key(KeyCode::Char('h')),
            KeyEvent::new(KeyCode::Char('I'), KeyModifiers::SHIFT),
            key(KeyCode::Char('!')),
            key(KeyCode::Enter),
        ]);

        assert_eq!(password, "hI!");
        assert_eq!(outcome, PasswordKey::Submit);
    }

    #[test]
    fn test_backspace_and_clear() {
        let (password, _) = type_keys(&[
            key(KeyCode::Char('a')),
            key(KeyCode::Char('b')),
            key(KeyCode::Backspace),
            key(KeyCode::Char('c')),
        ]);
        assert_eq!(password, "ac");

        let (password, _) = type_keys(&[
            key(KeyCode::Char('a')),
            KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL),
            key(KeyCode::Char('z')),
        ]);
        assert_eq!(password, "z");
    }

    #[test]
    fn test_escape_and_ctrl_c_cancel() {
        let (_, outcome) = type_keys(&[key(KeyCode::Char('a')), key(KeyCode::Esc)]);
        assert_eq!(outcome, PasswordKey::Cancel);

        let (_, outcome) =
            type_keys(&[KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)]);
        assert_eq!(outcome, PasswordKey::Cancel);
    }

    #[test]
    fn test_key_release_is_ignored() {
        let release = KeyEvent::new_with_kind(
            KeyCode::Char('x'),
            KeyModifiers::NONE,
            KeyEventKind::Release,
        );
        let (password, outcome) = type_keys(&[release]);

        assert!(password.is_empty());
        assert_eq!(outcome, PasswordKey::Continue);
    }
}
