//! Structured logging integration for events
//!
//! Converts event messages into `tracing` records with structured fields.
//! Installing a subscriber is left to the embedding application.

use crate::{
    AppEvent, EnvironmentEvent, EventMessage, EventReceiver, FetchEvent, GeneralEvent,
    ResolverEvent,
};
use tracing::{debug, error, info, warn};

/// Log an event message at the level implied by its event
#[allow(clippy::too_many_lines)]
pub fn log_event(message: &EventMessage) {
    let meta = &message.meta;
    let source = meta.source.as_str();
    let event_id = meta.event_id;
    let correlation = meta.correlation_id.as_deref();

    match &message.event {
        AppEvent::General(event) => match event {
            GeneralEvent::Warning { message, context } => {
                warn!(source, %event_id, ?correlation, context = ?context, "{message}");
            }
            GeneralEvent::Error { message, details } => {
                error!(source, %event_id, ?correlation, details = ?details, "{message}");
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(source, %event_id, ?correlation, context = ?context, "{message}");
            }
            GeneralEvent::OperationStarted { operation } => {
                info!(source, %event_id, ?correlation, operation = %operation, "Operation started");
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                info!(
                    source,
                    %event_id,
                    ?correlation,
                    operation = %operation,
                    success,
                    "Operation completed"
                );
            }
            GeneralEvent::OperationFailed { operation, failure } => {
                error!(
                    source,
                    %event_id,
                    ?correlation,
                    operation = %operation,
                    code = ?failure.code,
                    error = %failure.message,
                    hint = ?failure.hint,
                    "Operation failed"
                );
            }
        },

        AppEvent::Resolver(event) => match event {
            ResolverEvent::SessionStarted {
                session_id,
                package,
                dependencies,
                directives,
            } => {
                info!(
                    source,
                    %event_id,
                    session_id = %session_id,
                    package = %package,
                    dependencies,
                    directives,
                    "Prefetch session started"
                );
            }
            ResolverEvent::DirectivesApplied { replaced, renamed } => {
                info!(source, %event_id, ?correlation, replaced, renamed, "Replace directives applied");
            }
            ResolverEvent::Classified {
                modules,
                packages,
                toolchain,
            } => {
                info!(
                    source,
                    %event_id,
                    ?correlation,
                    modules,
                    packages,
                    toolchain,
                    "Dependencies classified"
                );
            }
            ResolverEvent::ManifestReady {
                digest,
                modules,
                packages,
            } => {
                info!(
                    source,
                    %event_id,
                    ?correlation,
                    digest = %digest,
                    modules,
                    packages,
                    "Manifest assembled"
                );
            }
            ResolverEvent::SessionCompleted {
                session_id,
                fetched,
                duration_ms,
            } => {
                info!(
                    source,
                    %event_id,
                    session_id = %session_id,
                    fetched,
                    duration_ms,
                    "Prefetch session completed"
                );
            }
            ResolverEvent::SessionFailed {
                session_id,
                failure,
            } => {
                error!(
                    source,
                    %event_id,
                    session_id = %session_id,
                    code = ?failure.code,
                    error = %failure.message,
                    hint = ?failure.hint,
                    "Prefetch session failed"
                );
            }
        },

        AppEvent::Fetch(event) => match event {
            FetchEvent::BatchStarted { modules, workers } => {
                info!(source, %event_id, ?correlation, modules, workers, "Fetch batch started");
            }
            FetchEvent::Started {
                module,
                version,
                attempt,
            } => {
                debug!(
                    source,
                    %event_id,
                    ?correlation,
                    module = %module,
                    version = %version,
                    attempt,
                    "Fetch started"
                );
            }
            FetchEvent::Retrying {
                module,
                version,
                attempt,
                delay_ms,
                failure,
            } => {
                warn!(
                    source,
                    %event_id,
                    ?correlation,
                    module = %module,
                    version = %version,
                    attempt,
                    delay_ms,
                    error = %failure.message,
                    "Fetch failed, retrying"
                );
            }
            FetchEvent::Completed {
                module,
                version,
                path,
            } => {
                info!(
                    source,
                    %event_id,
                    ?correlation,
                    module = %module,
                    version = %version,
                    path = %path.display(),
                    "Fetch completed"
                );
            }
            FetchEvent::Failed {
                module,
                version,
                failure,
            } => {
                error!(
                    source,
                    %event_id,
                    ?correlation,
                    module = %module,
                    version = %version,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    error = %failure.message,
                    "Fetch failed"
                );
            }
            FetchEvent::StagingCommitted { modules, cache_dir } => {
                info!(
                    source,
                    %event_id,
                    ?correlation,
                    modules,
                    cache_dir = %cache_dir.display(),
                    "Staged modules committed"
                );
            }
            FetchEvent::StagingDiscarded { staging_dir } => {
                warn!(
                    source,
                    %event_id,
                    ?correlation,
                    staging_dir = %staging_dir.display(),
                    "Staged modules discarded"
                );
            }
        },

        AppEvent::Environment(event) => match event {
            EnvironmentEvent::VariableResolved { name, value, kind } => {
                debug!(
                    source,
                    %event_id,
                    ?correlation,
                    name = %name,
                    value = %value,
                    kind = %kind,
                    "Environment variable resolved"
                );
            }
            EnvironmentEvent::DirectoryCreated { path } => {
                debug!(source, %event_id, ?correlation, path = %path.display(), "Directory ready");
            }
            EnvironmentEvent::Built { variables } => {
                info!(source, %event_id, ?correlation, variables, "Environment built");
            }
        },
    }
}

/// Drain a receiver into `tracing` until every sender is dropped
///
/// Returns the number of events logged.
pub async fn forward_to_tracing(mut receiver: EventReceiver) -> usize {
    let mut forwarded = 0;
    while let Some(message) = receiver.recv().await {
        log_event(&message);
        forwarded += 1;
    }
    forwarded
}
