use crate::error::{ConfigError, DirectoryError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Opaque filter query: filter-field name to value (state, sort, order, assignment, ...).
pub type FilterQuery = BTreeMap<String, serde_json::Value>;

/// Opaque filter identifier, unique within one application context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterId(String);

impl FilterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FilterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for FilterId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Non-empty application identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppName(String);

impl AppName {
    pub fn parse(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyAppName);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AppName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AppName> for String {
    fn from(value: AppName) -> Self {
        value.0
    }
}

/// A named, saved query definition over tasks or processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Absent for a filter that has not been saved yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FilterId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub query: FilterQuery,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            app_name: None,
            icon: None,
            query: FilterQuery::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<FilterId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_app(mut self, app_name: &AppName) -> Self {
        self.app_name = Some(app_name.as_str().to_string());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive name comparison used for selection.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// External selection input: which filter the caller would like to be current.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FilterId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SelectionHint {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn by_id(id: impl Into<FilterId>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
        }
    }

    /// The name to match on, if one was given and it is not blank.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Outcome of an edit performed on a filter, consumed by the lifecycle to refresh its directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "actionType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditAction {
    Save {
        #[serde(rename = "id")]
        filter_id: FilterId,
    },
    SaveAs {
        #[serde(rename = "id")]
        filter_id: FilterId,
    },
    Delete {
        #[serde(rename = "id")]
        filter_id: FilterId,
    },
}

impl EditAction {
    /// Build an action from its wire tag (`SAVE`, `SAVE_AS`, `DELETE`).
    pub fn from_tag(tag: &str, filter_id: FilterId) -> Result<Self, ConfigError> {
        match ActionKind::from_str(tag)? {
            ActionKind::Save => Ok(EditAction::Save { filter_id }),
            ActionKind::SaveAs => Ok(EditAction::SaveAs { filter_id }),
            ActionKind::Delete => Ok(EditAction::Delete { filter_id }),
        }
    }

    pub fn filter_id(&self) -> &FilterId {
        match self {
            EditAction::Save { filter_id }
            | EditAction::SaveAs { filter_id }
            | EditAction::Delete { filter_id } => filter_id,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            EditAction::Save { .. } => ActionKind::Save,
            EditAction::SaveAs { .. } => ActionKind::SaveAs,
            EditAction::Delete { .. } => ActionKind::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Save,
    SaveAs,
    Delete,
}

impl ActionKind {
    pub fn as_tag(self) -> &'static str {
        match self {
            ActionKind::Save => "SAVE",
            ActionKind::SaveAs => "SAVE_AS",
            ActionKind::Delete => "DELETE",
        }
    }
}

impl FromStr for ActionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SAVE" => Ok(ActionKind::Save),
            "SAVE_AS" | "SAVEAS" => Ok(ActionKind::SaveAs),
            "DELETE" => Ok(ActionKind::Delete),
            _ => Err(ConfigError::UnknownAction(s.to_string())),
        }
    }
}

/// Which family of default filters a directory bootstraps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    Task,
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Nothing loaded yet.
    Empty,
    Loading,
    Loaded,
    /// The listing came back empty and default filters are being created.
    Bootstrapping,
    /// The last fetch failed; the previous directory is still in place.
    Error,
}

#[derive(Debug, Clone)]
pub enum FilterEvent {
    SelectionChanged {
        filter: Option<Filter>,
    },
    DirectoryLoaded {
        app_name: AppName,
        filters: Vec<Filter>,
        loaded_at: String,
    },
    DirectoryBootstrapped {
        app_name: AppName,
        filters: Vec<Filter>,
    },
    DirectoryError {
        error: DirectoryError,
    },
    Info(String),
}

impl FilterEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            FilterEvent::SelectionChanged { filter: Some(f) } => {
                format!("Selected filter: {}", f.name)
            }
            FilterEvent::SelectionChanged { filter: None } => "No filter selected".to_string(),
            FilterEvent::DirectoryLoaded {
                app_name, filters, ..
            } => format!("Loaded {} filters for {}", filters.len(), app_name),
            FilterEvent::DirectoryBootstrapped { app_name, filters } => {
                format!("Created {} default filters for {}", filters.len(), app_name)
            }
            FilterEvent::DirectoryError { error } => format!("Filter error: {error}"),
            FilterEvent::Info(msg) => msg.clone(),
        }
    }
}
