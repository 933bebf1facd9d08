//! Filter selection, edit and save lifecycle for task and process filter lists.
//!
//! A [`lifecycle::FilterLifecycle`] owns the filters loaded for one application and the filter
//! currently selected among them. It talks to storage only through a
//! [`directory::FilterDirectory`] and reports changes as [`model::FilterEvent`]s. The
//! [`orchestrator`] runs a lifecycle behind a command channel for UI and CLI layers.

pub mod cli;
pub mod config;
pub mod directory;
pub mod editor;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod orchestrator;
pub mod summary;

pub use directory::FilterDirectory;
pub use error::{ConfigError, DirectoryError};
pub use lifecycle::{FetchTicket, FilterLifecycle, ListingOutcome};
pub use model::{AppName, EditAction, Filter, FilterEvent, FilterId, SelectionHint};
