// crates/error-archive-notify/src/notifier/mail.rs
// ============================================================================
// Module: Mail Notifier
// Description: Notifier that composes an error mail and hands it to a transport.
// Purpose: Mail a summary of every archived error to configured recipients.
// Dependencies: error-archive-core, serde, time
// ============================================================================

//! ## Overview
//! [`MailNotifier`] renders a plain-text mail for each notice and delivers it
//! through a [`MailTransport`]. The subject comes from a format string where
//! `{0}` is the error message and `{1}` the error type; line breaks in the
//! result are flattened to spaces. With no recipients configured, notices are
//! accepted and nothing is sent.
//! Invariants:
//! - Recipient lists are split on `;` and `,` and trimmed.
//! - The transport sees a fully composed message or nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use error_archive_core::ErrorEnvelope;
use error_archive_core::Notice;
use error_archive_core::Notifier;
use error_archive_core::NotifyError;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default notifier name.
const DEFAULT_NAME: &str = "mail";
/// Default subject format.
pub const DEFAULT_SUBJECT_FORMAT: &str = "Error ({1}): {0}";

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Mail priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailPriority {
    /// Low priority.
    Low,
    /// Normal priority.
    #[default]
    Normal,
    /// High priority.
    High,
}

/// Mail composition settings.
///
/// # Invariants
/// - `recipients` and `cc` may hold `;`- or `,`-delimited address lists.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailSettings {
    /// Sender address.
    #[serde(default)]
    pub sender: String,
    /// Recipient addresses.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Carbon-copy addresses.
    #[serde(default)]
    pub cc: Vec<String>,
    /// Subject format.
    #[serde(default = "default_subject_format")]
    pub subject_format: String,
    /// Mail priority.
    #[serde(default)]
    pub priority: MailPriority,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            sender: String::new(),
            recipients: Vec::new(),
            cc: Vec::new(),
            subject_format: default_subject_format(),
            priority: MailPriority::Normal,
        }
    }
}

/// Returns the default subject format.
fn default_subject_format() -> String {
    DEFAULT_SUBJECT_FORMAT.to_string()
}

// ============================================================================
// SECTION: Message & Transport
// ============================================================================

/// Composed mail message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Carbon-copy addresses.
    pub cc: Vec<String>,
    /// Single-line subject.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Priority.
    pub priority: MailPriority,
}

/// Delivers composed mail.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the message cannot be delivered.
    async fn send(&self, message: MailMessage) -> Result<(), NotifyError>;
}

// ============================================================================
// SECTION: Mail Notifier
// ============================================================================

/// Notifier that mails each archived error.
#[derive(Clone)]
pub struct MailNotifier {
    /// Notifier name.
    name: String,
    /// Composition settings.
    settings: MailSettings,
    /// Delivery transport.
    transport: Arc<dyn MailTransport>,
}

impl std::fmt::Debug for MailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailNotifier")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MailNotifier {
    /// Creates a mail notifier named `mail`.
    #[must_use]
    pub fn new(settings: MailSettings, transport: Arc<dyn MailTransport>) -> Self {
        Self::with_name(settings, transport, DEFAULT_NAME)
    }

    /// Creates a mail notifier with a custom name.
    #[must_use]
    pub fn with_name(settings: MailSettings, transport: Arc<dyn MailTransport>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings,
            transport,
        }
    }

    /// Composes the message for an envelope, or `None` without recipients.
    #[must_use]
    pub fn compose(&self, envelope: &ErrorEnvelope) -> Option<MailMessage> {
        let to = split_addresses(&self.settings.recipients);
        if to.is_empty() {
            return None;
        }
        Some(MailMessage {
            from: self.settings.sender.clone(),
            to,
            cc: split_addresses(&self.settings.cc),
            subject: format_subject(&self.settings.subject_format, envelope),
            body: render_body(envelope),
            priority: self.settings.priority,
        })
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, notice: &Notice<'_>) -> Result<(), NotifyError> {
        let Some(message) = self.compose(notice.envelope) else {
            tracing::debug!(notifier = %self.name, "mail notifier has no recipients");
            return Ok(());
        };
        self.transport.send(message).await
    }
}

// ============================================================================
// SECTION: Formatting
// ============================================================================

/// Splits and trims address lists.
fn split_addresses(lists: &[String]) -> Vec<String> {
    lists
        .iter()
        .flat_map(|list| list.split([';', ',']))
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fills `{0}` and `{1}` in one pass and flattens line breaks.
///
/// Placeholder text inside the substituted values is left as is.
fn format_subject(format: &str, envelope: &ErrorEnvelope) -> String {
    let mut subject = String::with_capacity(format.len());
    let mut rest = format;
    while let Some(start) = rest.find('{') {
        subject.push_str(&rest[.. start]);
        let tail = &rest[start ..];
        if let Some(after) = tail.strip_prefix("{0}") {
            subject.push_str(envelope.message());
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{1}") {
            subject.push_str(envelope.type_name());
            rest = after;
        } else {
            subject.push('{');
            rest = &tail[1 ..];
        }
    }
    subject.push_str(rest);
    subject.replace(['\r', '\n'], " ")
}

/// Renders the plain-text body.
fn render_body(envelope: &ErrorEnvelope) -> String {
    let mut body = String::new();
    let time = envelope.time().format(&Rfc3339).unwrap_or_else(|_| envelope.time().to_string());
    let _ = writeln!(body, "{}: {}", envelope.type_name(), envelope.message());
    let _ = writeln!(body);
    let _ = writeln!(body, "Application: {}", envelope.application());
    let _ = writeln!(body, "Host: {}", envelope.host());
    let _ = writeln!(body, "Time: {time}");
    let _ = writeln!(body, "Status: {}", envelope.status_code());
    if !envelope.user().is_empty() {
        let _ = writeln!(body, "User: {}", envelope.user());
    }
    if !envelope.source().is_empty() {
        let _ = writeln!(body, "Source: {}", envelope.source());
    }
    if !envelope.detail().is_empty() {
        let _ = writeln!(body);
        let _ = writeln!(body, "{}", envelope.detail());
    }
    if !envelope.server_variables().is_empty() {
        let _ = writeln!(body);
        let _ = writeln!(body, "Server variables:");
        for variable in envelope.server_variables().iter() {
            let _ = writeln!(body, "  {} = {}", variable.name, variable.value);
        }
    }
    body
}
