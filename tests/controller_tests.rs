mod common;

use common::{app, drain, named, ScriptedDirectory};
use filter_lifecycle::config::ControllerConfig;
use filter_lifecycle::directory::InMemoryDirectory;
use filter_lifecycle::editor::FilterEditor;
use filter_lifecycle::model::{FilterKind, LifecycleState, SelectionHint};
use filter_lifecycle::orchestrator::{run_controller, ControllerCommand};
use filter_lifecycle::{DirectoryError, FilterDirectory, FilterEvent, FilterLifecycle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

fn config() -> ControllerConfig {
    ControllerConfig {
        fetch_timeout: Duration::from_secs(2),
        slow_fetch_notice: Duration::from_secs(2),
        ..ControllerConfig::default()
    }
}

/// Queue `commands`, run the controller to completion and collect what it emitted.
async fn drive(
    directory: Arc<dyn FilterDirectory>,
    cfg: &ControllerConfig,
    commands: Vec<ControllerCommand>,
) -> (FilterLifecycle, Vec<FilterEvent>) {
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    for cmd in commands {
        assert_ok!(cmd_tx.send(cmd));
    }
    assert_ok!(cmd_tx.send(ControllerCommand::Quit));

    let lifecycle = FilterLifecycle::new(evt_tx);
    let lifecycle = run_controller(lifecycle, directory, cfg, cmd_rx).await;
    let events = drain(&mut evt_rx);
    (lifecycle, events)
}

fn loaded_apps(events: &[FilterEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|ev| match ev {
            FilterEvent::DirectoryLoaded { app_name, .. } => Some(app_name.to_string()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn newest_application_wins() {
    let dir = Arc::new(
        ScriptedDirectory::new()
            .listing("slow", named(&[(1, "Slow Filter")]))
            .listing("fast", named(&[(2, "Fast Filter")]))
            .delay("slow", Duration::from_millis(200)),
    );

    let (lc, events) = drive(
        dir.clone(),
        &config(),
        vec![
            ControllerCommand::SetApplication(app("slow")),
            ControllerCommand::SetApplication(app("fast")),
        ],
    )
    .await;

    assert_eq!(lc.app_name().map(|a| a.as_str()), Some("fast"));
    assert_eq!(lc.filters().unwrap()[0].name, "Fast Filter");
    assert_eq!(loaded_apps(&events), vec!["fast"]);
    // Aborted before or during its sleep; either way it never answered.
    assert!(dir.count("list:slow") <= 1);
}

#[tokio::test]
async fn quit_waits_for_the_fetch_in_flight() {
    let dir = Arc::new(
        ScriptedDirectory::new()
            .listing("app1", named(&[(1, "Foo")]))
            .delay("app1", Duration::from_millis(50)),
    );

    let (lc, events) = drive(dir, &config(), vec![ControllerCommand::SetApplication(app("app1"))]).await;

    assert_eq!(lc.state(), LifecycleState::Loaded);
    assert_eq!(loaded_apps(&events), vec!["app1"]);
}

#[tokio::test]
async fn empty_listing_runs_the_bootstrap_fetch() {
    let dir = Arc::new(
        ScriptedDirectory::new().defaults("app1", Ok(named(&[(1, "My Tasks"), (2, "Queued Tasks")]))),
    );

    let (lc, events) = drive(dir.clone(), &config(), vec![ControllerCommand::SetApplication(app("app1"))]).await;

    assert_eq!(dir.calls(), vec!["list:app1", "defaults:app1"]);
    assert_eq!(lc.filters().map(|f| f.len()), Some(2));
    assert!(events
        .iter()
        .any(|ev| matches!(ev, FilterEvent::DirectoryBootstrapped { .. })));
}

#[tokio::test]
async fn slow_directory_times_out() {
    let dir = Arc::new(
        ScriptedDirectory::new()
            .listing("app1", named(&[(1, "Foo")]))
            .delay("app1", Duration::from_millis(500)),
    );
    let cfg = ControllerConfig {
        fetch_timeout: Duration::from_millis(50),
        ..config()
    };

    let (lc, events) = drive(dir, &cfg, vec![ControllerCommand::SetApplication(app("app1"))]).await;

    assert_eq!(lc.state(), LifecycleState::Error);
    assert!(lc.filters().is_none());
    let timed_out = events.iter().any(|ev| {
        matches!(
            ev,
            FilterEvent::DirectoryError {
                error: DirectoryError::Timeout { .. }
            }
        )
    });
    assert!(timed_out);
}

#[tokio::test]
async fn slow_fetch_is_reported() {
    let dir = Arc::new(
        ScriptedDirectory::new()
            .listing("app1", named(&[(1, "Foo")]))
            .delay("app1", Duration::from_millis(400)),
    );
    let cfg = ControllerConfig {
        slow_fetch_notice: Duration::from_millis(20),
        ..config()
    };

    let (_lc, events) = drive(dir, &cfg, vec![ControllerCommand::SetApplication(app("app1"))]).await;

    let notices: Vec<_> = events
        .iter()
        .filter(|ev| matches!(ev, FilterEvent::Info(msg) if msg.starts_with("Still loading")))
        .collect();
    assert_eq!(notices.len(), 1);
}

#[tokio::test]
async fn refresh_without_application_is_reported() {
    let dir = Arc::new(ScriptedDirectory::new());

    let (lc, events) = drive(dir.clone(), &config(), vec![ControllerCommand::Refresh]).await;

    assert_eq!(lc.state(), LifecycleState::Empty);
    assert!(dir.calls().is_empty());
    assert!(matches!(events.as_slice(), [FilterEvent::Info(_)]));
}

#[tokio::test]
async fn selection_follows_the_hint() {
    let dir = Arc::new(ScriptedDirectory::new().listing("app1", named(&[(1, "Foo"), (2, "Bar")])));

    let (lc, _events) = drive(
        dir,
        &config(),
        vec![
            ControllerCommand::Select(Some(SelectionHint::by_name("BAR"))),
            ControllerCommand::SetApplication(app("app1")),
        ],
    )
    .await;

    assert_eq!(lc.current_filter().unwrap().name, "Bar");
}

#[tokio::test]
async fn save_as_through_the_controller_reloads_the_directory() {
    let memory = Arc::new(InMemoryDirectory::new(FilterKind::Task));
    let hr = app("hr");
    let defaults = assert_ok!(memory.create_default_filters(&hr).await);

    let mut editor = FilterEditor::new(defaults[0].clone());
    editor.set_field("state", "COMPLETED");
    let request = editor.save_as("Done By Me", None);

    let (lc, events) = drive(
        memory.clone(),
        &config(),
        vec![
            ControllerCommand::SetApplication(hr.clone()),
            ControllerCommand::Mutate(request),
        ],
    )
    .await;

    let names: Vec<_> = lc.filters().unwrap().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["My Tasks", "Queued Tasks", "Completed Tasks", "Done By Me"]
    );
    // Selection matches on name only, so the reload lands on the first entry.
    assert_eq!(lc.current_filter().unwrap().name, "My Tasks");
    assert_eq!(loaded_apps(&events).last().map(String::as_str), Some("hr"));
}

#[tokio::test]
async fn rejected_mutation_is_reported_and_nothing_reloads() {
    let dir = Arc::new(ScriptedDirectory::new().listing("app1", named(&[(1, "Foo")])));
    let foo = named(&[(1, "Foo")]).remove(0).with_app(&app("app1"));

    let (lc, events) = drive(
        dir.clone(),
        &config(),
        vec![
            ControllerCommand::SetApplication(app("app1")),
            ControllerCommand::Mutate(FilterEditor::new(foo).delete()),
        ],
    )
    .await;

    assert_eq!(dir.count("delete:Foo"), 1);
    assert_eq!(dir.count("list:app1"), 1);
    assert_eq!(lc.filters().map(|f| f.len()), Some(1));
    assert!(events.iter().any(|ev| matches!(
        ev,
        FilterEvent::DirectoryError { error } if error.is_mutation()
    )));
}

#[tokio::test]
async fn closing_the_command_channel_stops_the_controller() {
    let (evt_tx, _evt_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ControllerCommand>();
    drop(cmd_tx);

    let dir: Arc<dyn FilterDirectory> = Arc::new(ScriptedDirectory::new());
    let lc = tokio::time::timeout(
        Duration::from_secs(1),
        run_controller(FilterLifecycle::new(evt_tx), dir, &config(), cmd_rx),
    )
    .await;
    assert_ok!(lc);
}
