//! Filter lifecycle: directory and current-filter state for one application context.
//!
//! The lifecycle never performs I/O on its own schedule. A refresh is split into
//! `begin_refresh`, which hands out a ticket stamped with a new generation, and
//! `apply_listing` / `apply_bootstrap`, which accept a result only when it carries the newest
//! generation. Whoever drives the fetch (the controller loop, or `refresh` below) decides when
//! the directory is called.

use crate::directory::FilterDirectory;
use crate::error::DirectoryError;
use crate::model::{AppName, EditAction, Filter, FilterEvent, FilterId, LifecycleState, SelectionHint};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Permission to apply one fetch result. Only the newest ticket is honoured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    app_name: AppName,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn app_name(&self) -> &AppName {
        &self.app_name
    }
}

/// What happened to a fetch result handed to the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    /// Directory replaced and selection re-resolved.
    Applied,
    /// The listing was empty; default filters must be requested with this ticket.
    NeedsBootstrap(FetchTicket),
    /// Default filters replaced the directory.
    Bootstrapped,
    /// The fetch failed; state was left as it was.
    Failed,
    /// A newer refresh started after this one; the result was dropped.
    Stale,
}

pub struct FilterLifecycle {
    app_name: Option<AppName>,
    // None until the first successful fetch, so "not loaded" and "empty" stay distinct.
    filters: Option<Vec<Filter>>,
    // Index into `filters`; never a copy.
    current: Option<usize>,
    hint: Option<SelectionHint>,
    state: LifecycleState,
    generation: u64,
    notify_after_bootstrap: bool,
    event_tx: UnboundedSender<FilterEvent>,
}

impl FilterLifecycle {
    pub fn new(event_tx: UnboundedSender<FilterEvent>) -> Self {
        Self {
            app_name: None,
            filters: None,
            current: None,
            hint: None,
            state: LifecycleState::Empty,
            generation: 0,
            notify_after_bootstrap: false,
            event_tx,
        }
    }

    /// Re-resolve and announce the selection after default filters are created.
    ///
    /// Off by default: the bootstrap path only announces the new directory.
    pub fn with_notify_after_bootstrap(mut self, enabled: bool) -> Self {
        self.notify_after_bootstrap = enabled;
        self
    }

    pub fn app_name(&self) -> Option<&AppName> {
        self.app_name.as_ref()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Loaded filters, or `None` when nothing has been loaded yet.
    pub fn filters(&self) -> Option<&[Filter]> {
        self.filters.as_deref()
    }

    pub fn current_filter(&self) -> Option<&Filter> {
        let idx = self.current?;
        self.filters.as_ref()?.get(idx)
    }

    pub fn selection_hint(&self) -> Option<&SelectionHint> {
        self.hint.as_ref()
    }

    /// True when nothing is loaded or the loaded directory has no entries.
    pub fn is_directory_empty(&self) -> bool {
        self.filters.as_ref().map_or(true, |f| f.is_empty())
    }

    /// Switch to `app_name` and start loading its directory.
    ///
    /// Switching to the application already active simply loads it again.
    pub fn set_application_context(&mut self, app_name: AppName) -> FetchTicket {
        info!(app_name = %app_name, "application context set");
        self.app_name = Some(app_name.clone());
        self.begin_refresh(app_name)
    }

    /// Start a refresh of `app_name`, superseding any refresh still in flight.
    pub fn begin_refresh(&mut self, app_name: AppName) -> FetchTicket {
        self.generation += 1;
        self.state = LifecycleState::Loading;
        debug!(app_name = %app_name, generation = self.generation, "refreshing filter directory");
        FetchTicket {
            generation: self.generation,
            app_name,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Apply the result of `list_filters` for `ticket`.
    pub fn apply_listing(
        &mut self,
        ticket: FetchTicket,
        listing: Result<Vec<Filter>, DirectoryError>,
    ) -> ListingOutcome {
        if !self.is_current(&ticket) {
            debug!(
                app_name = %ticket.app_name,
                generation = ticket.generation,
                newest = self.generation,
                "dropping stale filter listing"
            );
            return ListingOutcome::Stale;
        }

        let filters = match listing {
            Ok(filters) => filters,
            Err(error) => {
                self.fail(error);
                return ListingOutcome::Failed;
            }
        };

        if filters.is_empty() {
            info!(app_name = %ticket.app_name, "no filters found, creating defaults");
            self.state = LifecycleState::Bootstrapping;
            return ListingOutcome::NeedsBootstrap(ticket);
        }

        debug!(app_name = %ticket.app_name, count = filters.len(), "filter directory loaded");
        self.filters = Some(filters.clone());
        self.current = None;
        self.state = LifecycleState::Loaded;

        let hint = self.hint.clone();
        self.resolve_selection_and_notify(hint.as_ref());
        self.emit(FilterEvent::DirectoryLoaded {
            app_name: ticket.app_name,
            filters,
            loaded_at: now_rfc3339(),
        });
        ListingOutcome::Applied
    }

    /// Apply the result of `create_default_filters` for `ticket`.
    ///
    /// The selection hint is not consulted and no selection is announced unless
    /// `notify_after_bootstrap` is set; the current filter silently becomes the first default.
    pub fn apply_bootstrap(
        &mut self,
        ticket: FetchTicket,
        defaults: Result<Vec<Filter>, DirectoryError>,
    ) -> ListingOutcome {
        if !self.is_current(&ticket) {
            debug!(
                app_name = %ticket.app_name,
                generation = ticket.generation,
                "dropping stale default filters"
            );
            return ListingOutcome::Stale;
        }

        let filters = match defaults {
            Ok(filters) => filters,
            Err(error) => {
                self.fail(error);
                return ListingOutcome::Failed;
            }
        };

        info!(app_name = %ticket.app_name, count = filters.len(), "default filters created");
        self.filters = Some(filters.clone());
        self.state = LifecycleState::Loaded;
        if self.notify_after_bootstrap {
            let hint = self.hint.clone();
            self.resolve_selection_and_notify(hint.as_ref());
        } else {
            self.resolve_selection(None);
        }
        self.emit(FilterEvent::DirectoryBootstrapped {
            app_name: ticket.app_name,
            filters,
        });
        ListingOutcome::Bootstrapped
    }

    /// Make the entry matching `hint` current, falling back to the first entry.
    pub fn resolve_selection(&mut self, hint: Option<&SelectionHint>) {
        self.current = resolve_index(self.filters.as_deref().unwrap_or_default(), hint);
    }

    /// Resolve, then announce the current filter whether or not it changed.
    pub fn resolve_selection_and_notify(&mut self, hint: Option<&SelectionHint>) {
        self.resolve_selection(hint);
        let filter = self.current_filter().cloned();
        self.emit(FilterEvent::SelectionChanged { filter });
    }

    /// The externally supplied selection changed.
    pub fn set_selection_hint(&mut self, hint: Option<SelectionHint>) {
        self.hint = hint;
        let hint = self.hint.clone();
        self.resolve_selection_and_notify(hint.as_ref());
    }

    /// React to a completed edit. Returns the refresh to run, if an application is active.
    pub fn on_edit_action(&mut self, action: EditAction) -> Option<FetchTicket> {
        debug!(action = action.kind().as_tag(), filter_id = %action.filter_id(), "edit action");
        match action {
            EditAction::Save { filter_id } => self.on_save(filter_id),
            EditAction::SaveAs { filter_id } => self.on_save_as(filter_id),
            EditAction::Delete { .. } => self.on_delete(),
        }
    }

    fn on_save(&mut self, filter_id: FilterId) -> Option<FetchTicket> {
        self.hint = Some(SelectionHint::by_id(filter_id));
        self.refresh_active()
    }

    // Same effect as save for now: reload with the new id as the hint. Selection still matches
    // on name only, so the reload lands on the first entry.
    fn on_save_as(&mut self, filter_id: FilterId) -> Option<FetchTicket> {
        self.hint = Some(SelectionHint::by_id(filter_id));
        self.refresh_active()
    }

    fn on_delete(&mut self) -> Option<FetchTicket> {
        self.hint = None;
        self.refresh_active()
    }

    fn refresh_active(&mut self) -> Option<FetchTicket> {
        match self.app_name.clone() {
            Some(app_name) => Some(self.begin_refresh(app_name)),
            None => {
                warn!("edit action received before an application was set");
                None
            }
        }
    }

    /// Full refresh against `directory`: list, and bootstrap defaults when the list is empty.
    ///
    /// `app_name` becomes the active application.
    pub async fn refresh(
        &mut self,
        directory: &dyn FilterDirectory,
        app_name: AppName,
    ) -> ListingOutcome {
        self.app_name = Some(app_name.clone());
        let ticket = self.begin_refresh(app_name);
        self.complete_refresh(directory, ticket).await
    }

    /// Run the fetches for an already issued ticket.
    pub async fn complete_refresh(
        &mut self,
        directory: &dyn FilterDirectory,
        ticket: FetchTicket,
    ) -> ListingOutcome {
        let listing = directory.list_filters(&ticket.app_name).await;
        match self.apply_listing(ticket, listing) {
            ListingOutcome::NeedsBootstrap(ticket) => {
                let defaults = directory.create_default_filters(&ticket.app_name).await;
                self.apply_bootstrap(ticket, defaults)
            }
            other => other,
        }
    }

    /// Surface a failure that did not come from a fetch (e.g. a rejected mutation).
    pub fn report_error(&self, error: DirectoryError) {
        warn!(error = %error, "filter directory error");
        self.emit(FilterEvent::DirectoryError { error });
    }

    pub(crate) fn info(&self, message: impl Into<String>) {
        self.emit(FilterEvent::Info(message.into()));
    }

    fn fail(&mut self, error: DirectoryError) {
        self.state = LifecycleState::Error;
        self.report_error(error);
    }

    fn emit(&self, event: FilterEvent) {
        // Nobody listening is not an error for the lifecycle.
        let _ = self.event_tx.send(event);
    }
}

/// Index of the entry `hint` selects in `filters`.
///
/// A non-empty hint name picks the first case-insensitive name match. Anything else, including
/// a hint that only carries an id, picks the first entry.
pub fn resolve_index(filters: &[Filter], hint: Option<&SelectionHint>) -> Option<usize> {
    hint.and_then(SelectionHint::name)
        .and_then(|name| filters.iter().position(|f| f.matches_name(name)))
        .or(if filters.is_empty() { None } else { Some(0) })
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}
