use super::{FilterDirectory, FilterTable};
use crate::error::{DirectoryError, MutationOp};
use crate::model::{AppName, Filter, FilterKind};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Default store location: `<data dir>/filter-lifecycle/filters.json`.
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filter-lifecycle")
        .join("filters.json")
}

/// Directory persisted as a single JSON document keyed by application name.
///
/// Every call reads the document, and mutations write it back whole. A missing file is an
/// empty directory.
#[derive(Debug)]
pub struct JsonFileDirectory {
    path: PathBuf,
    kind: FilterKind,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileDirectory {
    pub fn new(path: impl Into<PathBuf>, kind: FilterKind) -> Self {
        Self {
            path: path.into(),
            kind,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<FilterTable, String> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| format!("corrupt filter store {}: {e}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FilterTable::default()),
            Err(e) => Err(format!("read {}: {e}", self.path.display())),
        }
    }

    async fn store(&self, table: &FilterTable) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("create {}: {e}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(table).map_err(|e| e.to_string())?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| format!("write {}: {e}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| format!("replace {}: {e}", self.path.display()))
    }

    async fn mutate<T>(
        &self,
        op: MutationOp,
        apply: impl FnOnce(&mut FilterTable) -> Result<T, DirectoryError>,
    ) -> Result<T, DirectoryError> {
        let _guard = self.lock.lock().await;
        let mut table = self
            .load()
            .await
            .map_err(|msg| DirectoryError::mutation(op, msg))?;
        let out = apply(&mut table)?;
        self.store(&table)
            .await
            .map_err(|msg| DirectoryError::mutation(op, msg))?;
        Ok(out)
    }
}

#[async_trait]
impl FilterDirectory for JsonFileDirectory {
    async fn list_filters(&self, app_name: &AppName) -> Result<Vec<Filter>, DirectoryError> {
        let _guard = self.lock.lock().await;
        let table = self
            .load()
            .await
            .map_err(|msg| DirectoryError::fetch(app_name.as_str(), msg))?;
        Ok(table.list(app_name))
    }

    async fn create_default_filters(
        &self,
        app_name: &AppName,
    ) -> Result<Vec<Filter>, DirectoryError> {
        let _guard = self.lock.lock().await;
        let fetch_err = |msg: String| DirectoryError::fetch(app_name.as_str(), msg);
        let mut table = self.load().await.map_err(fetch_err)?;
        let defaults = table.bootstrap(self.kind, app_name);
        self.store(&table).await.map_err(fetch_err)?;
        Ok(defaults)
    }

    async fn update_filter(&self, filter: &Filter) -> Result<Filter, DirectoryError> {
        self.mutate(MutationOp::Update, |table| table.update(filter))
            .await
    }

    async fn add_filter(&self, filter: &Filter) -> Result<Filter, DirectoryError> {
        self.mutate(MutationOp::Add, |table| table.add(filter)).await
    }

    async fn delete_filter(&self, filter: &Filter) -> Result<(), DirectoryError> {
        self.mutate(MutationOp::Delete, |table| table.delete(filter))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_an_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileDirectory::new(dir.path().join("filters.json"), FilterKind::Task);
        let app = AppName::parse("hr").unwrap();

        assert!(store.list_filters(&app).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutations_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("filters.json");
        let app = AppName::parse("hr").unwrap();

        let store = JsonFileDirectory::new(&path, FilterKind::Task);
        let defaults = store.create_default_filters(&app).await.unwrap();
        let added = store
            .add_filter(&Filter::new("Overdue").with_app(&app))
            .await
            .unwrap();
        store.delete_filter(&defaults[1]).await.unwrap();

        let reopened = JsonFileDirectory::new(&path, FilterKind::Task);
        let names: Vec<_> = reopened
            .list_filters(&app)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["My Tasks", "Completed Tasks", "Overdue"]);
        assert!(added.id.is_some());
    }

    #[tokio::test]
    async fn saved_changes_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filters.json");
        let app = AppName::parse("hr").unwrap();

        let store = JsonFileDirectory::new(&path, FilterKind::Task);
        let mut mine = store.create_default_filters(&app).await.unwrap().remove(0);
        mine.query.insert("sort".into(), "createdDate".into());
        let saved = store.update_filter(&mine).await.unwrap();
        assert_eq!(saved, mine);

        let reopened = JsonFileDirectory::new(&path, FilterKind::Task);
        let listed = reopened.list_filters(&app).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, mine.id);
        assert_eq!(listed[0].query["sort"], "createdDate");

        let ghost = Filter::new("Ghost").with_id("404").with_app(&app);
        let err = reopened.update_filter(&ghost).await.unwrap_err();
        assert!(err.is_mutation());
    }

    #[tokio::test]
    async fn corrupt_store_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filters.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = JsonFileDirectory::new(&path, FilterKind::Task);

        let err = store
            .list_filters(&AppName::parse("hr").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_fetch());
    }
}
