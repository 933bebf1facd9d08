//! Editing a filter and writing the edit back to the directory.
//!
//! An editor holds the filter as loaded plus a working copy. Finishing the edit produces an
//! `EditRequest`; executing the request performs the directory mutation and yields the
//! `EditAction` the lifecycle reacts to.

use crate::directory::FilterDirectory;
use crate::error::{DirectoryError, MutationOp};
use crate::model::{EditAction, Filter, FilterId};
use tracing::info;

#[derive(Debug, Clone)]
pub struct FilterEditor {
    original: Filter,
    edited: Filter,
}

impl FilterEditor {
    pub fn new(filter: Filter) -> Self {
        Self {
            edited: filter.clone(),
            original: filter,
        }
    }

    /// The working copy.
    pub fn filter(&self) -> &Filter {
        &self.edited
    }

    pub fn original(&self) -> &Filter {
        &self.original
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.edited.query.insert(key.into(), value.into());
    }

    pub fn remove_field(&mut self, key: &str) {
        self.edited.query.remove(key);
    }

    pub fn is_modified(&self) -> bool {
        self.edited != self.original
    }

    /// Save and save-as are only offered for modified filters.
    pub fn can_save(&self) -> bool {
        self.is_modified()
    }

    pub fn can_delete(&self) -> bool {
        self.original.id.is_some()
    }

    pub fn save(self) -> EditRequest {
        EditRequest::Save(self.edited)
    }

    pub fn save_as(self, name: impl Into<String>, icon: Option<String>) -> EditRequest {
        EditRequest::SaveAs {
            filter: self.edited,
            name: name.into(),
            icon,
        }
    }

    /// Deletes the filter as it was loaded, ignoring unsaved edits.
    pub fn delete(self) -> EditRequest {
        EditRequest::Delete(self.original)
    }
}

/// A mutation waiting to be sent to the directory.
#[derive(Debug, Clone)]
pub enum EditRequest {
    Save(Filter),
    SaveAs {
        filter: Filter,
        name: String,
        icon: Option<String>,
    },
    Delete(Filter),
}

impl EditRequest {
    pub fn operation(&self) -> MutationOp {
        match self {
            EditRequest::Save(_) => MutationOp::Update,
            EditRequest::SaveAs { .. } => MutationOp::Add,
            EditRequest::Delete(_) => MutationOp::Delete,
        }
    }

    pub async fn execute(
        self,
        directory: &dyn FilterDirectory,
    ) -> Result<EditAction, DirectoryError> {
        let op = self.operation();
        match self {
            EditRequest::Save(filter) => {
                let saved = directory.update_filter(&filter).await?;
                let filter_id = require_id(&saved, op)?;
                info!(filter_id = %filter_id, name = %saved.name, "filter saved");
                Ok(EditAction::Save { filter_id })
            }
            EditRequest::SaveAs { filter, name, icon } => {
                let draft = Filter {
                    id: None,
                    name,
                    icon: icon.or(filter.icon.clone()),
                    ..filter
                };
                let added = directory.add_filter(&draft).await?;
                let filter_id = require_id(&added, op)?;
                info!(filter_id = %filter_id, name = %added.name, "filter saved as new");
                Ok(EditAction::SaveAs { filter_id })
            }
            EditRequest::Delete(filter) => {
                let filter_id = require_id(&filter, op)?;
                directory.delete_filter(&filter).await?;
                info!(filter_id = %filter_id, name = %filter.name, "filter deleted");
                Ok(EditAction::Delete { filter_id })
            }
        }
    }
}

fn require_id(filter: &Filter, op: MutationOp) -> Result<FilterId, DirectoryError> {
    filter.id.clone().ok_or_else(|| {
        DirectoryError::mutation(op, format!("filter `{}` has no id", filter.name))
    })
}
