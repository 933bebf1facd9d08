use crate::model::{AppName, Filter, FilterKind};

/// Standard starting filters for an application, without ids.
pub fn default_filters(kind: FilterKind, app_name: &AppName) -> Vec<Filter> {
    let filters = match kind {
        FilterKind::Task => vec![
            Filter::new("My Tasks")
                .with_icon("inbox")
                .with_field("state", "ASSIGNED")
                .with_field("assignment", "assignee"),
            Filter::new("Queued Tasks")
                .with_icon("queue")
                .with_field("state", "CREATED")
                .with_field("assignment", "candidate"),
            Filter::new("Completed Tasks")
                .with_icon("done")
                .with_field("state", "COMPLETED"),
        ],
        FilterKind::Process => vec![
            Filter::new("All Processes").with_icon("adjust"),
            Filter::new("Running Processes")
                .with_icon("inbox")
                .with_field("state", "RUNNING"),
            Filter::new("Completed Processes")
                .with_icon("done")
                .with_field("state", "COMPLETED"),
        ],
    };

    filters
        .into_iter()
        .map(|f| {
            f.with_app(app_name)
                .with_field("appName", app_name.as_str())
                .with_field("sort", "id")
                .with_field("order", "ASC")
        })
        .collect()
}
