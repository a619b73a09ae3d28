//! Re-authentication and retry around a single `sdm` operation.
//!
//! An operation that fails because the session expired is retried once
//! after logging in again. Every other failure is terminal: it is reported
//! through a notification and returned as a distinct error.

use log::{debug, error, info};

use crate::classifier::ErrorKind;
use crate::credentials::CredentialProvider;
use crate::desktop::Notifier;
use crate::error::{Error, Result};
use crate::listing::ellipsize;
use crate::sdm::ExternalTool;

pub const TITLE_AUTHENTICATING: &str = "🔐 Authenticating...";
pub const TITLE_AUTHENTICATION_ERROR: &str = "🔐 Authentication error";
pub const TITLE_RESOURCE_NOT_FOUND: &str = "🔐 Resource not found";
pub const TITLE_COMMAND_ERROR: &str = "🔐 Error";
pub const TITLE_UNEXPECTED_ERROR: &str = "❗Unexpected error";

/// Longest notification body; raw tool output beyond it is cut.
pub const NOTIFICATION_BODY_LIMIT: usize = 200;

pub struct RecoveryController<'a> {
    account: &'a str,
    tool: &'a dyn ExternalTool,
    credentials: &'a dyn CredentialProvider,
    notifier: &'a dyn Notifier,
}

impl<'a> RecoveryController<'a> {
    pub fn new(
        account: &'a str,
        tool: &'a dyn ExternalTool,
        credentials: &'a dyn CredentialProvider,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            account,
            tool,
            credentials,
            notifier,
        }
    }

    /// Runs `operation`, logging in again and retrying it once if the
    /// session turns out to be unauthenticated.
    ///
    /// # Errors
    ///
    /// - [`Error::CredentialsRevoked`] if the stored password was rejected;
    ///   it has been removed from the keyring
    /// - [`Error::ResourceNotFound`] if the tool does not know the resource
    /// - [`Error::CommandFailed`] for any other classified failure
    /// - Infrastructure errors (launch, timeout, parsing) unchanged
    pub fn run_with_recovery<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        match operation() {
            Ok(value) => Ok(value),
            Err(Error::Sdm(e)) if e.kind == ErrorKind::Unauthorized => {
                info!("Session is not authenticated, logging in as `{}`", self.account);
                debug!("Unauthorized: {e}");
                self.reauthenticate()?;

                debug!("Retrying after login");
                operation().map_err(|e| self.report(e))
            }
            Err(e) => Err(self.report(e)),
        }
    }

    fn reauthenticate(&self) -> Result<()> {
        self.notifier.notify(TITLE_AUTHENTICATING, "");

        let password = match self.credentials.password(self.account) {
            Ok(password) => password,
            Err(e) => {
                error!("Failed to obtain password for `{}`: {e}", self.account);
                self.notify_truncated(TITLE_AUTHENTICATION_ERROR, &e.to_string());
                return Err(e);
            }
        };

        match self.tool.login(self.account, &password) {
            Ok(()) => {
                debug!("Login successful");
                Ok(())
            }
            Err(e) => Err(self.revoke_credentials(e)),
        }
    }

    fn revoke_credentials(&self, cause: Error) -> Error {
        error!("Credentials for `{}` were rejected: {cause}", self.account);

        if let Err(e) = self.credentials.forget(self.account) {
            error!("Failed to remove password from keyring: {e}");
        }
        self.notify_truncated(TITLE_AUTHENTICATION_ERROR, &cause.to_string());

        Error::CredentialsRevoked {
            account: self.account.to_string(),
            source: Box::new(cause),
        }
    }

    fn report(&self, failure: Error) -> Error {
        let e = match failure {
            Error::Sdm(e) => e,
            other => {
                error!("Unexpected error: {other}");
                self.notify_truncated(TITLE_UNEXPECTED_ERROR, &other.to_string());
                return other;
            }
        };

        match e.kind {
            ErrorKind::InvalidCredentials => self.revoke_credentials(Error::Sdm(e)),
            ErrorKind::ResourceNotFound => {
                error!("Resource not found: {e}");
                self.notify_truncated(TITLE_RESOURCE_NOT_FOUND, &e.to_string());
                Error::ResourceNotFound(e)
            }
            _ => {
                error!("Command failed: {e}");
                self.notify_truncated(TITLE_COMMAND_ERROR, &e.to_string());
                Error::CommandFailed(e)
            }
        }
    }

    fn notify_truncated(&self, title: &str, body: &str) {
        self.notifier
            .notify(title, &ellipsize(body.trim(), NOTIFICATION_BODY_LIMIT));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::classifier::SdmError;
    use crate::fakes::{FakeCredentials, FakeNotifier, FakeTool, ToolCall};

    const ACCOUNT: &str = "me@example.com";

    fn sdm_error(kind: ErrorKind, output: &str) -> Error {
        Error::Sdm(SdmError::new(kind, output, "exit status: 1"))
    }

    fn unauthorized() -> Error {
        sdm_error(ErrorKind::Unauthorized, "You are not authenticated")
    }

    #[test]
    fn test_success_does_not_authenticate() {
        let tool = FakeTool::default();
        let credentials = FakeCredentials::with_password("hunter2");
        let notifier = FakeNotifier::default();
        let controller = RecoveryController::new(ACCOUNT, &tool, &credentials, &notifier);

        let result = controller.run_with_recovery(|| Ok(42));

        assert_eq!(result.unwrap(), 42);
        assert!(tool.calls().is_empty());
        assert_eq!(credentials.password_requests(), 0);
        assert!(notifier.titles().is_empty());
    }

    #[test]
    fn test_unauthorized_then_success_logs_in_once() {
        let tool = FakeTool::default();
        let credentials = FakeCredentials::with_password("hunter2");
        let notifier = FakeNotifier::default();
        let controller = RecoveryController::new(ACCOUNT, &tool, &credentials, &notifier);

        let attempts = Cell::new(0);
        let result = controller.run_with_recovery(|| {
            attempts.set(attempts.get() + 1);
            if attempts.get() == 1 {
                Err(unauthorized())
            } else {
                Ok("done")
            }
        });

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.get(), 2);
        assert_eq!(
            tool.calls(),
            vec![ToolCall::Login(ACCOUNT.to_string(), "hunter2".to_string())]
        );
        assert_eq!(notifier.titles(), vec![TITLE_AUTHENTICATING]);
    }

    #[test]
    fn test_unauthorized_twice_is_terminal() {
        let tool = FakeTool::default();
        let credentials = FakeCredentials::with_password("hunter2");
        let notifier = FakeNotifier::default();
        let controller = RecoveryController::new(ACCOUNT, &tool, &credentials, &notifier);

        let attempts = Cell::new(0);
        let result: Result<()> = controller.run_with_recovery(|| {
            attempts.set(attempts.get() + 1);
            Err(unauthorized())
        });

        assert!(
            matches!(result, Err(Error::CommandFailed(ref e)) if e.kind == ErrorKind::Unauthorized)
        );
        assert_eq!(attempts.get(), 2);
        assert_eq!(tool.login_count(), 1);
        assert_eq!(notifier.titles(), vec![TITLE_AUTHENTICATING, TITLE_COMMAND_ERROR]);
    }

    #[test]
    fn test_invalid_credentials_revokes_without_retry() {
        let tool = FakeTool::default();
        let credentials = FakeCredentials::with_password("hunter2");
        let notifier = FakeNotifier::default();
        let controller = RecoveryController::new(ACCOUNT, &tool, &credentials, &notifier);

        let attempts = Cell::new(0);
        let result: Result<()> = controller.run_with_recovery(|| {
            attempts.set(attempts.get() + 1);
            Err(sdm_error(ErrorKind::InvalidCredentials, "access denied"))
        });

        assert!(matches!(result, Err(Error::CredentialsRevoked { .. })));
        assert_eq!(attempts.get(), 1);
        assert_eq!(credentials.forget_count(), 1);
        assert_eq!(tool.login_count(), 0);
        assert_eq!(notifier.titles(), vec![TITLE_AUTHENTICATION_ERROR]);
    }

    #[test]
    fn test_failed_login_revokes_credentials() {
        let tool = FakeTool::default();
        tool.push_login(Err(sdm_error(ErrorKind::InvalidCredentials, "access denied")));
        let credentials = FakeCredentials::with_password("wrong");
        let notifier = FakeNotifier::default();
        let controller = RecoveryController::new(ACCOUNT, &tool, &credentials, &notifier);

        let attempts = Cell::new(0);
        let result: Result<()> = controller.run_with_recovery(|| {
            attempts.set(attempts.get() + 1);
            Err(unauthorized())
        });

        match result {
            Err(Error::CredentialsRevoked { account, .. }) => assert_eq!(account, ACCOUNT),
            other => panic!("Expected revoked credentials, got {other:?}"),
        }
        assert_eq!(attempts.get(), 1);
        assert_eq!(credentials.forget_count(), 1);
        assert_eq!(
            notifier.titles(),
            vec![TITLE_AUTHENTICATING, TITLE_AUTHENTICATION_ERROR]
        );
    }

    #[test]
    fn test_password_failure_is_terminal() {
        let tool = FakeTool::default();
        let credentials = FakeCredentials::cancelling();
        let notifier = FakeNotifier::default();
        let controller = RecoveryController::new(ACCOUNT, &tool, &credentials, &notifier);

        let result: Result<()> = controller.run_with_recovery(|| Err(unauthorized()));

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(tool.login_count(), 0);
        assert_eq!(credentials.forget_count(), 0);
        assert_eq!(
            notifier.titles(),
            vec![TITLE_AUTHENTICATING, TITLE_AUTHENTICATION_ERROR]
        );
    }

    #[test]
    fn test_resource_not_found_is_reported() {
        let tool = FakeTool::default();
        let credentials = FakeCredentials::with_password("hunter2");
        let notifier = FakeNotifier::default();
        let controller = RecoveryController::new(ACCOUNT, &tool, &credentials, &notifier);

        let result: Result<()> = controller.run_with_recovery(|| {
            Err(sdm_error(ErrorKind::ResourceNotFound, "Cannot find datasource named 'db'"))
        });

        assert!(matches!(result, Err(Error::ResourceNotFound(_))));
        assert_eq!(notifier.titles(), vec![TITLE_RESOURCE_NOT_FOUND]);
    }

    #[test]
    fn test_infrastructure_error_passes_through() {
        let tool = FakeTool::default();
        let credentials = FakeCredentials::with_password("hunter2");
        let notifier = FakeNotifier::default();
        let controller = RecoveryController::new(ACCOUNT, &tool, &credentials, &notifier);

        let attempts = Cell::new(0);
        let result: Result<()> = controller.run_with_recovery(|| {
            attempts.set(attempts.get() + 1);
            Err(Error::Timeout {
                program: "sdm".to_string(),
                seconds: 30,
            })
        });

        assert!(matches!(result, Err(Error::Timeout { seconds: 30, .. })));
        assert_eq!(attempts.get(), 1);
        assert_eq!(notifier.titles(), vec![TITLE_UNEXPECTED_ERROR]);
    }

    #[test]
    fn test_long_output_is_truncated_in_notification() {
        let tool = FakeTool::default();
        let credentials = FakeCredentials::with_password("hunter2");
        let notifier = FakeNotifier::default();
        let controller = RecoveryController::new(ACCOUNT, &tool, &credentials, &notifier);

        let output = "x".repeat(1000);
        let _: Result<()> =
            controller.run_with_recovery(|| Err(sdm_error(ErrorKind::Unknown, &output)));

        let notifications = notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].1.chars().count(), NOTIFICATION_BODY_LIMIT);
        assert!(notifications[0].1.ends_with("..."));
    }
}
