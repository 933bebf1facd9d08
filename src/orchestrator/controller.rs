//! Filter lifecycle controller loop.
//!
//! Owns one lifecycle, runs directory fetches as background tasks and applies their results
//! in order. A newer refresh aborts the fetch still in flight, so only the newest result can
//! reach the lifecycle.

use crate::config::ControllerConfig;
use crate::directory::FilterDirectory;
use crate::editor::EditRequest;
use crate::error::DirectoryError;
use crate::lifecycle::{FetchTicket, FilterLifecycle, ListingOutcome};
use crate::model::{AppName, EditAction, Filter, SelectionHint};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

/// Commands sent by presentation layers to the controller.
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    SetApplication(AppName),
    /// External selection changed (`None` clears it).
    Select(Option<SelectionHint>),
    /// Reload the active application.
    Refresh,
    /// An edit already written to the directory elsewhere.
    Edit(EditAction),
    /// Write an edit through the directory, then react to it.
    Mutate(EditRequest),
    /// Stop once the fetch in flight (if any) has been applied.
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchStage {
    Listing,
    Bootstrap,
}

/// The one fetch allowed to be running.
struct InFlight {
    ticket: FetchTicket,
    stage: FetchStage,
    started: Instant,
    slow_reported: bool,
    handle: tokio::task::JoinHandle<Result<Vec<Filter>, DirectoryError>>,
}

fn spawn_fetch(
    directory: Arc<dyn FilterDirectory>,
    ticket: FetchTicket,
    stage: FetchStage,
    timeout: Duration,
) -> InFlight {
    let app_name = ticket.app_name().clone();
    let handle = tokio::spawn(async move {
        let fetch = async {
            match stage {
                FetchStage::Listing => directory.list_filters(&app_name).await,
                FetchStage::Bootstrap => directory.create_default_filters(&app_name).await,
            }
        };
        match tokio::time::timeout(timeout, fetch).await {
            Ok(res) => res,
            Err(_) => Err(DirectoryError::Timeout {
                app_name: app_name.to_string(),
                after: timeout,
            }),
        }
    });
    InFlight {
        ticket,
        stage,
        started: Instant::now(),
        slow_reported: false,
        handle,
    }
}

/// Replace whatever is in flight with a fetch for `ticket`.
fn start_fetch(
    in_flight: &mut Option<InFlight>,
    directory: &Arc<dyn FilterDirectory>,
    ticket: FetchTicket,
    stage: FetchStage,
    timeout: Duration,
) {
    if let Some(prev) = in_flight.take() {
        debug!(
            app_name = %prev.ticket.app_name(),
            generation = prev.ticket.generation(),
            "aborting superseded fetch"
        );
        prev.handle.abort();
    }
    *in_flight = Some(spawn_fetch(directory.clone(), ticket, stage, timeout));
}

/// Run the controller until `Quit` (or the command channel closes) and return the lifecycle
/// in its final state.
pub async fn run_controller(
    mut lifecycle: FilterLifecycle,
    directory: Arc<dyn FilterDirectory>,
    cfg: &ControllerConfig,
    mut cmd_rx: UnboundedReceiver<ControllerCommand>,
) -> FilterLifecycle {
    let mut in_flight: Option<InFlight> = None;
    let mut quit_pending = false;
    let mut watchdog = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if !quit_pending => {
                match cmd {
                    Some(ControllerCommand::SetApplication(app_name)) => {
                        let ticket = lifecycle.set_application_context(app_name);
                        start_fetch(&mut in_flight, &directory, ticket, FetchStage::Listing, cfg.fetch_timeout);
                    }
                    Some(ControllerCommand::Select(hint)) => {
                        lifecycle.set_selection_hint(hint);
                    }
                    Some(ControllerCommand::Refresh) => {
                        if let Some(app_name) = lifecycle.app_name().cloned() {
                            let ticket = lifecycle.begin_refresh(app_name);
                            start_fetch(&mut in_flight, &directory, ticket, FetchStage::Listing, cfg.fetch_timeout);
                        } else {
                            lifecycle.info("No application selected; nothing to refresh");
                        }
                    }
                    Some(ControllerCommand::Edit(action)) => {
                        if let Some(ticket) = lifecycle.on_edit_action(action) {
                            start_fetch(&mut in_flight, &directory, ticket, FetchStage::Listing, cfg.fetch_timeout);
                        }
                    }
                    Some(ControllerCommand::Mutate(request)) => {
                        // Mutations are rare and must finish before the reload they trigger,
                        // so they run inline.
                        match request.execute(directory.as_ref()).await {
                            Ok(action) => {
                                if let Some(ticket) = lifecycle.on_edit_action(action) {
                                    start_fetch(&mut in_flight, &directory, ticket, FetchStage::Listing, cfg.fetch_timeout);
                                }
                            }
                            Err(e) => lifecycle.report_error(e),
                        }
                    }
                    Some(ControllerCommand::Quit) | None => {
                        quit_pending = true;
                        if in_flight.is_none() {
                            break;
                        }
                        debug!("quit requested; waiting for fetch in flight");
                    }
                }
            }
            // Await the handle in place; taking it out before this branch wins would lose it
            // whenever another branch is chosen.
            maybe_done = async {
                if let Some(fetch) = in_flight.as_mut() {
                    return Some((&mut fetch.handle).await);
                }
                futures::future::pending().await
            } => {
                let (Some(join_res), Some(done)) = (maybe_done, in_flight.take()) else {
                    continue;
                };
                let result = join_res.unwrap_or_else(|e| {
                    Err(DirectoryError::fetch(
                        done.ticket.app_name().as_str(),
                        format!("fetch task failed: {e}"),
                    ))
                });
                match done.stage {
                    FetchStage::Listing => {
                        if let ListingOutcome::NeedsBootstrap(ticket) =
                            lifecycle.apply_listing(done.ticket, result)
                        {
                            start_fetch(&mut in_flight, &directory, ticket, FetchStage::Bootstrap, cfg.fetch_timeout);
                        }
                    }
                    FetchStage::Bootstrap => {
                        lifecycle.apply_bootstrap(done.ticket, result);
                    }
                }
                if quit_pending && in_flight.is_none() {
                    break;
                }
            }
            // Keep the UI informed when a fetch is slow to come back.
            _ = watchdog.tick() => {
                if let Some(fetch) = in_flight.as_mut() {
                    if !fetch.slow_reported && fetch.started.elapsed() >= cfg.slow_fetch_notice {
                        fetch.slow_reported = true;
                        lifecycle.info(format!(
                            "Still loading filters for {}…",
                            fetch.ticket.app_name()
                        ));
                    }
                }
            }
        }
    }

    info!(state = ?lifecycle.state(), "filter controller stopped");
    lifecycle
}
