// crates/error-archive-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Error Archive Capture Pipeline
// Description: Capture, filter, persist, and notify for one failure.
// Purpose: Turn an unhandled error into a stored, announced archive entry.
// Dependencies: crate::{core, filter, interfaces}, futures-util, tokio, tracing
// ============================================================================

//! ## Overview
//! [`CapturePipeline::capture`] walks a fixed state machine:
//! `Received -> Filtering -> (Discarded | Persisting) -> Notifying -> Done`.
//! Filtering is skipped when no filters are registered. A swallowed
//! persistence failure still notifies, without an identifier. When an entry
//! was stored, an "entry logged" event is broadcast exactly once.
//! Invariants:
//! - `capture` never fails and never panics outward; every fault inside the
//!   pipeline is recorded to the diagnostic stream and yields no entry.
//! - A cancelled signal observed before persistence skips persistence and
//!   notification.
//! - Discarded errors are never retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::error::Error;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::core::builder::CaptureOptions;
use crate::core::builder::EnvelopeBuilder;
use crate::core::cancel::CancelSignal;
use crate::core::envelope::ErrorEnvelope;
use crate::core::exception::CapturedException;
use crate::core::identifiers::ErrorId;
use crate::core::request::RequestSource;
use crate::filter::CaptureFilter;
use crate::filter::FilterContext;
use crate::filter::run_filters;
use crate::interfaces::ErrorStore;
use crate::interfaces::Notifier;
use crate::runtime::dispatch::DispatchReport;
use crate::runtime::dispatch::NotificationDispatcher;
use crate::runtime::log::ErrorLog;
use crate::runtime::memory::InMemoryErrorStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default capacity of the entry-logged broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Pipeline construction errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Event channel capacity must be positive.
    #[error("event channel capacity must be greater than zero")]
    InvalidEventCapacity,
}

/// Stage reached by a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Envelope built; nothing decided yet.
    Received,
    /// Filters are running.
    Filtering,
    /// Filters discarded the error.
    Discarded,
    /// Cancellation observed before persistence.
    Cancelled,
    /// Envelope is being written.
    Persisting,
    /// Notifiers are running.
    Notifying,
    /// Every step ran.
    Done,
    /// A panic escaped a step and was contained.
    Faulted,
}

impl CaptureState {
    /// Returns a stable label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Filtering => "filtering",
            Self::Discarded => "discarded",
            Self::Cancelled => "cancelled",
            Self::Persisting => "persisting",
            Self::Notifying => "notifying",
            Self::Done => "done",
            Self::Faulted => "faulted",
        }
    }
}

/// Handle to a stored entry, broadcast as the entry-logged event.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedEntry {
    /// Stored identifier.
    pub id: ErrorId,
    /// Store that accepted the entry.
    pub store: String,
    /// Stored envelope.
    pub envelope: Arc<ErrorEnvelope>,
}

/// Detailed outcome of one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    /// Final state.
    pub state: CaptureState,
    /// Stored entry, when persistence succeeded.
    pub entry: Option<LoggedEntry>,
    /// Notification outcome, when notifiers ran.
    pub dispatch: Option<DispatchReport>,
}

impl CaptureReport {
    /// Creates a report for a capture that stopped early.
    const fn stopped(state: CaptureState) -> Self {
        Self {
            state,
            entry: None,
            dispatch: None,
        }
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for a capture pipeline.
///
/// # Invariants
/// - Filters and notifiers keep registration order.
/// - Without an explicit log, the process-wide in-memory store is used.
pub struct CapturePipelineBuilder {
    /// Persistence facade.
    log: Option<ErrorLog>,
    /// Capture filters in registration order.
    filters: Vec<Arc<dyn CaptureFilter>>,
    /// Notifiers in registration order.
    notifiers: NotificationDispatcher,
    /// Envelope recording options.
    options: CaptureOptions,
    /// Entry-logged channel capacity.
    event_capacity: usize,
}

impl Default for CapturePipelineBuilder {
    fn default() -> Self {
        Self {
            log: None,
            filters: Vec::new(),
            notifiers: NotificationDispatcher::new(),
            options: CaptureOptions::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl CapturePipelineBuilder {
    /// Uses an existing log facade.
    #[must_use]
    pub fn log(mut self, log: ErrorLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Uses a store with a fresh facade scoped to `application`.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn ErrorStore>, application: &str) -> Self {
        self.log = Some(ErrorLog::scoped(store, application));
        self
    }

    /// Registers a capture filter.
    #[must_use]
    pub fn filter(mut self, filter: impl CaptureFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Registers a shared capture filter.
    #[must_use]
    pub fn filter_arc(mut self, filter: Arc<dyn CaptureFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Registers a notifier.
    #[must_use]
    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.register(Arc::new(notifier));
        self
    }

    /// Registers a shared notifier.
    #[must_use]
    pub fn notifier_arc(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.register(notifier);
        self
    }

    /// Sets the envelope recording options.
    #[must_use]
    pub fn options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the entry-logged channel capacity.
    #[must_use]
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidEventCapacity`] when the capacity is zero.
    pub fn build(self) -> Result<CapturePipeline, PipelineError> {
        if self.event_capacity == 0 {
            return Err(PipelineError::InvalidEventCapacity);
        }
        let (events, _) = broadcast::channel(self.event_capacity);
        let log = self.log.unwrap_or_else(|| ErrorLog::new(Arc::new(InMemoryErrorStore::shared())));
        Ok(CapturePipeline {
            log,
            filters: self.filters,
            notifiers: self.notifiers,
            builder: EnvelopeBuilder::new(self.options),
            events,
        })
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Capture-filter-persist-notify pipeline.
///
/// # Invariants
/// - Configuration is immutable after construction; captures may run
///   concurrently.
pub struct CapturePipeline {
    /// Persistence facade.
    log: ErrorLog,
    /// Capture filters in registration order.
    filters: Vec<Arc<dyn CaptureFilter>>,
    /// Notifiers in registration order.
    notifiers: NotificationDispatcher,
    /// Envelope builder.
    builder: EnvelopeBuilder,
    /// Entry-logged event sender.
    events: broadcast::Sender<LoggedEntry>,
}

impl std::fmt::Debug for CapturePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturePipeline")
            .field("log", &self.log)
            .field("filters", &self.filters.iter().map(|filter| filter.name()).collect::<Vec<_>>())
            .field("notifiers", &self.notifiers)
            .finish_non_exhaustive()
    }
}

impl CapturePipeline {
    /// Returns a pipeline builder.
    #[must_use]
    pub fn builder() -> CapturePipelineBuilder {
        CapturePipelineBuilder::default()
    }

    /// Returns the persistence facade.
    #[must_use]
    pub const fn log(&self) -> &ErrorLog {
        &self.log
    }

    /// Subscribes to entry-logged events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LoggedEntry> {
        self.events.subscribe()
    }

    /// Captures a failure; returns the stored entry or `None`.
    pub async fn capture(
        &self,
        exception: Option<&CapturedException>,
        request: Option<&dyn RequestSource>,
        body: Option<&str>,
        cancel: &CancelSignal,
    ) -> Option<LoggedEntry> {
        self.capture_detailed(exception, request, body, cancel).await.entry
    }

    /// Snapshots an error at the caller's location and captures it.
    #[track_caller]
    pub fn capture_error<'a, E>(
        &'a self,
        error: &E,
        request: Option<&'a dyn RequestSource>,
        cancel: &'a CancelSignal,
    ) -> impl Future<Output = Option<LoggedEntry>> + 'a
    where
        E: Error + ?Sized,
    {
        let exception = CapturedException::from_error(error);
        async move { self.capture(Some(&exception), request, None, cancel).await }
    }

    /// Captures a failure and reports the state reached.
    pub async fn capture_detailed(
        &self,
        exception: Option<&CapturedException>,
        request: Option<&dyn RequestSource>,
        body: Option<&str>,
        cancel: &CancelSignal,
    ) -> CaptureReport {
        let run = AssertUnwindSafe(self.run(exception, request, body, cancel)).catch_unwind().await;
        match run {
            Ok(report) => report,
            Err(_) => {
                tracing::error!(store = self.log.store_name(), "error archive local exception: capture panicked");
                CaptureReport::stopped(CaptureState::Faulted)
            }
        }
    }

    /// Runs the state machine.
    async fn run(
        &self,
        exception: Option<&CapturedException>,
        request: Option<&dyn RequestSource>,
        body: Option<&str>,
        cancel: &CancelSignal,
    ) -> CaptureReport {
        let envelope = self.builder.build(exception, request, body).with_application(self.log.application());
        trace_state(CaptureState::Received, &envelope);

        let suppressed = if self.filters.is_empty() {
            BTreeSet::new()
        } else {
            trace_state(CaptureState::Filtering, &envelope);
            let context = FilterContext {
                envelope: &envelope,
                exception,
                request,
            };
            let outcome = run_filters(&self.filters, context);
            if outcome.discard {
                tracing::debug!(error_type = envelope.type_name(), "error dismissed by capture filters");
                return CaptureReport::stopped(CaptureState::Discarded);
            }
            outcome.suppressed
        };

        if cancel.is_cancelled() {
            tracing::debug!("capture cancelled before persistence");
            return CaptureReport::stopped(CaptureState::Cancelled);
        }

        trace_state(CaptureState::Persisting, &envelope);
        let id = self.log.append(envelope.clone(), cancel).await;
        trace_state(CaptureState::Notifying, &envelope);
        let dispatch = self.notifiers.dispatch(&envelope, id, &suppressed).await;

        let entry = id.map(|id| LoggedEntry {
            id,
            store: self.log.store_name().to_string(),
            envelope: Arc::new(envelope),
        });
        if let Some(entry) = &entry {
            // Send fails only when nobody subscribed.
            let _ = self.events.send(entry.clone());
        }
        CaptureReport {
            state: CaptureState::Done,
            entry,
            dispatch: Some(dispatch),
        }
    }
}

/// Records a state transition.
fn trace_state(state: CaptureState, envelope: &ErrorEnvelope) {
    tracing::trace!(state = state.as_str(), error_id = %envelope.id(), "capture state");
}
