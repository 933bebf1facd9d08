use super::{FilterDirectory, FilterTable};
use crate::error::DirectoryError;
use crate::model::{AppName, Filter, FilterKind};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Process-local directory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    kind: FilterKind,
    table: Mutex<FilterTable>,
}

impl InMemoryDirectory {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            table: Mutex::new(FilterTable::default()),
        }
    }

    /// Seed `app_name` with the given filters, replacing whatever it held.
    pub async fn seed(&self, app_name: &AppName, filters: Vec<Filter>) {
        self.table.lock().await.replace(app_name, filters);
    }
}

#[async_trait]
impl FilterDirectory for InMemoryDirectory {
    async fn list_filters(&self, app_name: &AppName) -> Result<Vec<Filter>, DirectoryError> {
        Ok(self.table.lock().await.list(app_name))
    }

    async fn create_default_filters(
        &self,
        app_name: &AppName,
    ) -> Result<Vec<Filter>, DirectoryError> {
        Ok(self.table.lock().await.bootstrap(self.kind, app_name))
    }

    async fn update_filter(&self, filter: &Filter) -> Result<Filter, DirectoryError> {
        self.table.lock().await.update(filter)
    }

    async fn add_filter(&self, filter: &Filter) -> Result<Filter, DirectoryError> {
        self.table.lock().await.add(filter)
    }

    async fn delete_filter(&self, filter: &Filter) -> Result<(), DirectoryError> {
        self.table.lock().await.delete(filter)
    }
}
