//! Desktop integration: notifications, browser and clipboard.

use std::process::{Command, Stdio};

use log::{debug, warn};

use crate::error::{Error, Result};

/// Application name shown on notifications.
pub const NOTIFICATION_APP_NAME: &str = "SDM CLI";

#[cfg(target_os = "macos")]
const URL_OPENER: &str = "open";
#[cfg(not(target_os = "macos"))]
const URL_OPENER: &str = "xdg-open";

/// Shows user-facing messages. Delivery is best-effort.
pub trait Notifier {
    fn notify(&self, title: &str, body: &str);
}

/// Hands a connected resource's address to the desktop.
pub trait Launcher {
    fn open_url(&self, url: &str) -> Result<()>;
    fn copy_to_clipboard(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) {
        debug!("Sending notification `{title}`");

        let result = notify_rust::Notification::new()
            .appname(NOTIFICATION_APP_NAME)
            .summary(title)
            .body(body)
            .show();

        if let Err(e) = result {
            warn!("Desktop notification `{title}` failed: {e}");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open_url(&self, url: &str) -> Result<()> {
        debug!("Opening `{url}` with `{URL_OPENER}`");

        // The opener may keep running as the browser; it is not waited on.
        Command::new(URL_OPENER)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::launch_error(URL_OPENER, e))?;

        Ok(())
    }

    fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        debug!("Copying to clipboard");

        arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_text(text.to_string()))
            .map_err(|e| Error::Clipboard(e.to_string()))
    }
}
