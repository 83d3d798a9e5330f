use std::path::{Path, PathBuf};

use crate::observe::{ListenerId, Observers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    ErrorMessage(String),
    ReportPath(Option<PathBuf>),
}

/// State the presentation layer renders next to the task list: the message
/// of the last failed operation and the last rendered completion report.
///
/// The error message is empty while the last operation succeeded.
#[derive(Debug, Default)]
pub struct ViewState {
    error_message: String,
    report_path: Option<PathBuf>,
    observers: Observers<ViewChange>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }

    pub fn subscribe(&mut self, listener: impl Fn(&ViewChange) + 'static) -> ListenerId {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message != self.error_message {
            self.error_message = message;
            self.observers
                .notify(&ViewChange::ErrorMessage(self.error_message.clone()));
        }
    }

    pub fn clear_error(&mut self) {
        self.set_error(String::new());
    }

    pub fn set_report_path(&mut self, path: Option<PathBuf>) {
        if path != self.report_path {
            self.report_path = path;
            self.observers
                .notify(&ViewChange::ReportPath(self.report_path.clone()));
        }
    }
}
