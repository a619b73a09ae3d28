//! In-memory stand-ins for the tool, keyring, notifier and launcher.
//!
//! Clones share state, so a test can hand one clone to the code under test
//! and inspect the other afterwards.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::credentials::CredentialProvider;
use crate::desktop::{Launcher, Notifier};
use crate::error::{Error, Result};
use crate::model::DataSource;
use crate::sdm::{ExternalTool, ReadyState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Ready,
    Login(String, String),
    Logout,
    Status,
    Connect(String),
}

#[derive(Default)]
struct ToolState {
    calls: Vec<ToolCall>,
    ready: VecDeque<Result<ReadyState>>,
    login: VecDeque<Result<()>>,
    logout: VecDeque<Result<()>>,
    status: VecDeque<Result<Vec<DataSource>>>,
    connect: VecDeque<Result<()>>,
}

/// Replays queued responses; an empty queue answers with success.
#[derive(Default, Clone)]
pub struct FakeTool {
    state: Rc<RefCell<ToolState>>,
}

impl FakeTool {
    pub fn push_ready(&self, response: Result<ReadyState>) {
        self.state.borrow_mut().ready.push_back(response);
    }

    pub fn push_login(&self, response: Result<()>) {
        self.state.borrow_mut().login.push_back(response);
    }

    pub fn push_logout(&self, response: Result<()>) {
        self.state.borrow_mut().logout.push_back(response);
    }

    pub fn push_status(&self, response: Result<Vec<DataSource>>) {
        self.state.borrow_mut().status.push_back(response);
    }

    pub fn push_connect(&self, response: Result<()>) {
        self.state.borrow_mut().connect.push_back(response);
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.state.borrow().calls.clone()
    }

    pub fn login_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ToolCall::Login(..)))
            .count()
    }

    fn record(&self, call: ToolCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl ExternalTool for FakeTool {
    fn ready(&self) -> Result<ReadyState> {
        self.record(ToolCall::Ready);
        let response = self.state.borrow_mut().ready.pop_front();
        response.unwrap_or_else(|| Ok(ReadyState::default()))
    }

    fn login(&self, account: &str, password: &str) -> Result<()> {
        self.record(ToolCall::Login(account.to_string(), password.to_string()));
        let response = self.state.borrow_mut().login.pop_front();
        response.unwrap_or(Ok(()))
    }

    fn logout(&self) -> Result<()> {
        self.record(ToolCall::Logout);
        let response = self.state.borrow_mut().logout.pop_front();
        response.unwrap_or(Ok(()))
    }

    fn status(&self) -> Result<Vec<DataSource>> {
        self.record(ToolCall::Status);
        let response = self.state.borrow_mut().status.pop_front();
        response.unwrap_or_else(|| Ok(Vec::new()))
    }

    fn connect(&self, name: &str) -> Result<()> {
        self.record(ToolCall::Connect(name.to_string()));
        let response = self.state.borrow_mut().connect.pop_front();
        response.unwrap_or(Ok(()))
    }
}

#[derive(Default)]
struct CredentialState {
    password: Option<String>,
    password_requests: usize,
    forget_count: usize,
}

#[derive(Default, Clone)]
pub struct FakeCredentials {
    state: Rc<RefCell<CredentialState>>,
}

impl FakeCredentials {
    pub fn with_password(password: &str) -> Self {
        let credentials = Self::default();
        credentials.state.borrow_mut().password = Some(password.to_string());
        credentials
    }

    /// Behaves like a user dismissing the password prompt.
    pub fn cancelling() -> Self {
        Self::default()
    }

    pub fn password_requests(&self) -> usize {
        self.state.borrow().password_requests
    }

    pub fn forget_count(&self) -> usize {
        self.state.borrow().forget_count
    }
}

impl CredentialProvider for FakeCredentials {
    fn password(&self, _account: &str) -> Result<String> {
        let mut state = self.state.borrow_mut();
        state.password_requests += 1;
        state.password.clone().ok_or(Error::Cancelled)
    }

    fn forget(&self, _account: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.forget_count += 1;
        state.password = None;
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct FakeNotifier {
    notifications: Rc<RefCell<Vec<(String, String)>>>,
}

impl FakeNotifier {
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.borrow().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notifications
            .borrow()
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }
}

impl Notifier for FakeNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.notifications
            .borrow_mut()
            .push((title.to_string(), body.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchAction {
    OpenUrl(String),
    Copy(String),
}

#[derive(Default, Clone)]
pub struct FakeLauncher {
    actions: Rc<RefCell<Vec<LaunchAction>>>,
}

impl FakeLauncher {
    pub fn actions(&self) -> Vec<LaunchAction> {
        self.actions.borrow().clone()
    }
}

impl Launcher for FakeLauncher {
    fn open_url(&self, url: &str) -> Result<()> {
        self.actions
            .borrow_mut()
            .push(LaunchAction::OpenUrl(url.to_string()));
        Ok(())
    }

    fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        self.actions
            .borrow_mut()
            .push(LaunchAction::Copy(text.to_string()));
        Ok(())
    }
}
