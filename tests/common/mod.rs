#![allow(dead_code)]

use async_trait::async_trait;
use filter_lifecycle::error::MutationOp;
use filter_lifecycle::{AppName, DirectoryError, Filter, FilterDirectory, FilterEvent};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Directory whose answers are scripted per application, recording every call.
#[derive(Default)]
pub struct ScriptedDirectory {
    listings: Mutex<HashMap<String, Result<Vec<Filter>, DirectoryError>>>,
    defaults: Mutex<HashMap<String, Result<Vec<Filter>, DirectoryError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(self, app: &str, filters: Vec<Filter>) -> Self {
        self.set_listing(app, Ok(filters));
        self
    }

    pub fn set_listing(&self, app: &str, listing: Result<Vec<Filter>, DirectoryError>) {
        self.listings.lock().unwrap().insert(app.to_string(), listing);
    }

    pub fn defaults(self, app: &str, defaults: Result<Vec<Filter>, DirectoryError>) -> Self {
        self.defaults
            .lock()
            .unwrap()
            .insert(app.to_string(), defaults);
        self
    }

    pub fn delay(self, app: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(app.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    async fn record(&self, call: String, app: &str) {
        self.calls.lock().unwrap().push(call);
        let delay = self.delays.lock().unwrap().get(app).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl FilterDirectory for ScriptedDirectory {
    async fn list_filters(&self, app_name: &AppName) -> Result<Vec<Filter>, DirectoryError> {
        self.record(format!("list:{app_name}"), app_name.as_str()).await;
        self.listings
            .lock()
            .unwrap()
            .get(app_name.as_str())
            .cloned()
            .unwrap_or_else(|| Ok(vec![]))
    }

    async fn create_default_filters(
        &self,
        app_name: &AppName,
    ) -> Result<Vec<Filter>, DirectoryError> {
        self.record(format!("defaults:{app_name}"), app_name.as_str())
            .await;
        self.defaults
            .lock()
            .unwrap()
            .get(app_name.as_str())
            .cloned()
            .unwrap_or_else(|| Ok(vec![]))
    }

    async fn update_filter(&self, filter: &Filter) -> Result<Filter, DirectoryError> {
        self.calls.lock().unwrap().push(format!("update:{}", filter.name));
        Ok(filter.clone())
    }

    async fn add_filter(&self, filter: &Filter) -> Result<Filter, DirectoryError> {
        self.calls.lock().unwrap().push(format!("add:{}", filter.name));
        Ok(filter.clone().with_id("new-1"))
    }

    async fn delete_filter(&self, filter: &Filter) -> Result<(), DirectoryError> {
        self.calls.lock().unwrap().push(format!("delete:{}", filter.name));
        Err(DirectoryError::mutation(MutationOp::Delete, "read-only directory"))
    }
}

pub fn app(name: &str) -> AppName {
    AppName::parse(name).unwrap()
}

pub fn named(names: &[(u64, &str)]) -> Vec<Filter> {
    names
        .iter()
        .map(|(id, name)| Filter::new(*name).with_id(*id))
        .collect()
}

pub fn drain(rx: &mut UnboundedReceiver<FilterEvent>) -> Vec<FilterEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

pub fn selections(events: &[FilterEvent]) -> Vec<Option<String>> {
    events
        .iter()
        .filter_map(|ev| match ev {
            FilterEvent::SelectionChanged { filter } => Some(filter.as_ref().map(|f| f.name.clone())),
            _ => None,
        })
        .collect()
}
