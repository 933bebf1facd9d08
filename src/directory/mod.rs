//! Filter directory seam.
//!
//! The lifecycle never talks to storage directly: it asks a `FilterDirectory` for the filters of
//! an application and sends mutations back through it. Two local implementations live here, an
//! in-memory one and a JSON-file one, both sharing the same table semantics.

mod defaults;
mod file;
mod memory;

pub use defaults::default_filters;
pub use file::{default_store_path, JsonFileDirectory};
pub use memory::InMemoryDirectory;

use crate::error::{DirectoryError, MutationOp};
use crate::model::{AppName, Filter, FilterId, FilterKind};
use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[async_trait]
pub trait FilterDirectory: Send + Sync {
    /// Ordered filters for `app_name`. An application without filters yields an empty list.
    async fn list_filters(&self, app_name: &AppName) -> Result<Vec<Filter>, DirectoryError>;

    /// Materialize the standard starting set of filters for `app_name` and return it.
    async fn create_default_filters(
        &self,
        app_name: &AppName,
    ) -> Result<Vec<Filter>, DirectoryError>;

    /// Replace a saved filter (matched by application and id).
    async fn update_filter(&self, filter: &Filter) -> Result<Filter, DirectoryError>;

    /// Store a new filter and return it with its assigned id.
    async fn add_filter(&self, filter: &Filter) -> Result<Filter, DirectoryError>;

    async fn delete_filter(&self, filter: &Filter) -> Result<(), DirectoryError>;
}

/// Generate a random filter id.
pub(crate) fn new_filter_id() -> FilterId {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    FilterId::from(u64::from_le_bytes(b))
}

/// Per-application filter lists; the state behind both local directories.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct FilterTable {
    apps: BTreeMap<String, Vec<Filter>>,
}

impl FilterTable {
    pub(crate) fn list(&self, app_name: &AppName) -> Vec<Filter> {
        self.apps.get(app_name.as_str()).cloned().unwrap_or_default()
    }

    /// Replace the filters of `app_name`, assigning ids to unsaved ones.
    pub(crate) fn replace(&mut self, app_name: &AppName, filters: Vec<Filter>) {
        let filters = filters
            .into_iter()
            .map(|f| {
                let mut f = f.with_app(app_name);
                if f.id.is_none() {
                    f.id = Some(new_filter_id());
                }
                f
            })
            .collect();
        self.apps.insert(app_name.as_str().to_string(), filters);
    }

    /// Create the default set unless the application already has filters.
    pub(crate) fn bootstrap(&mut self, kind: FilterKind, app_name: &AppName) -> Vec<Filter> {
        let entry = self.apps.entry(app_name.as_str().to_string()).or_default();
        if entry.is_empty() {
            *entry = default_filters(kind, app_name)
                .into_iter()
                .map(|f| Filter {
                    id: Some(new_filter_id()),
                    ..f
                })
                .collect();
        }
        entry.clone()
    }

    pub(crate) fn update(&mut self, filter: &Filter) -> Result<Filter, DirectoryError> {
        let op = MutationOp::Update;
        let (app, id) = owner_and_id(filter, op)?;
        let slot = self
            .apps
            .get_mut(app)
            .and_then(|filters| filters.iter_mut().find(|f| f.id.as_ref() == Some(id)))
            .ok_or_else(|| DirectoryError::mutation(op, format!("filter {id} not found in {app}")))?;
        *slot = filter.clone();
        Ok(slot.clone())
    }

    pub(crate) fn add(&mut self, filter: &Filter) -> Result<Filter, DirectoryError> {
        let app = filter.app_name.as_deref().ok_or_else(|| {
            DirectoryError::mutation(MutationOp::Add, "filter has no application")
        })?;
        let stored = Filter {
            id: Some(new_filter_id()),
            ..filter.clone()
        };
        self.apps
            .entry(app.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    pub(crate) fn delete(&mut self, filter: &Filter) -> Result<(), DirectoryError> {
        let op = MutationOp::Delete;
        let (app, id) = owner_and_id(filter, op)?;
        let filters = self
            .apps
            .get_mut(app)
            .ok_or_else(|| DirectoryError::mutation(op, format!("no filters stored for {app}")))?;
        let before = filters.len();
        filters.retain(|f| f.id.as_ref() != Some(id));
        if filters.len() == before {
            return Err(DirectoryError::mutation(
                op,
                format!("filter {id} not found in {app}"),
            ));
        }
        Ok(())
    }
}

fn owner_and_id(filter: &Filter, op: MutationOp) -> Result<(&str, &FilterId), DirectoryError> {
    let app = filter
        .app_name
        .as_deref()
        .ok_or_else(|| DirectoryError::mutation(op, "filter has no application"))?;
    let id = filter
        .id
        .as_ref()
        .ok_or_else(|| DirectoryError::mutation(op, format!("filter `{}` has no id", filter.name)))?;
    Ok((app, id))
}
