use crate::config::ControllerConfig;
use crate::directory::{default_store_path, FilterDirectory, InMemoryDirectory, JsonFileDirectory};
use crate::editor::FilterEditor;
use crate::lifecycle::FilterLifecycle;
use crate::model::{AppName, EditAction, Filter, FilterEvent, FilterId, FilterKind, SelectionHint};
use crate::orchestrator::{run_controller, ControllerCommand};
use crate::summary::{build_text_summary, Snapshot};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "filter-lifecycle",
    version,
    about = "Load, select and edit task and process filters"
)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON filter store (defaults to the platform data directory)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Keep filters in memory only; nothing is written to disk
    #[arg(long)]
    pub memory: bool,

    /// Default filter family for applications without filters
    #[arg(long, value_enum)]
    pub kind: Option<FilterKind>,

    /// Upper bound on a single directory fetch
    #[arg(long)]
    pub fetch_timeout: Option<humantime::Duration>,

    /// Announce the selection after default filters are created
    #[arg(long)]
    pub notify_after_bootstrap: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Log filter, e.g. `info` or `filter_lifecycle=debug`
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Load the filters of an application and show the current one
    Show {
        #[arg(long)]
        app: String,
        /// Filter to select, matched by name ignoring case
        #[arg(long)]
        select: Option<String>,
    },
    /// Change fields of a filter and save it in place
    Save {
        #[arg(long)]
        app: String,
        /// Filter to edit, matched by name ignoring case
        #[arg(long)]
        name: String,
        /// Field to change, as key=value (value parsed as JSON when possible)
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, serde_json::Value)>,
    },
    /// Save a copy of a filter under a new name
    SaveAs {
        #[arg(long)]
        app: String,
        /// Filter to copy, matched by name ignoring case (defaults to the current filter)
        #[arg(long)]
        from: Option<String>,
        /// Name of the new filter
        #[arg(long = "as")]
        new_name: String,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, serde_json::Value)>,
    },
    /// Delete a filter
    Delete {
        #[arg(long)]
        app: String,
        #[arg(long)]
        name: String,
    },
    /// Replay an edit action reported by another client (SAVE, SAVE_AS, DELETE)
    Action {
        #[arg(long)]
        app: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        id: String,
    },
}

impl Command {
    fn app(&self) -> &str {
        match self {
            Command::Show { app, .. }
            | Command::Save { app, .. }
            | Command::SaveAs { app, .. }
            | Command::Delete { app, .. }
            | Command::Action { app, .. } => app,
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Build a `ControllerConfig` from the config file layers and CLI arguments.
pub fn build_config(args: &Cli) -> Result<ControllerConfig> {
    let mut cfg = ControllerConfig::load(args.config.as_deref()).context("load configuration")?;
    if let Some(kind) = args.kind {
        cfg.kind = kind;
    }
    if let Some(store) = args.store.clone() {
        cfg.store_path = Some(store);
    }
    if let Some(timeout) = args.fetch_timeout {
        cfg.fetch_timeout = timeout.into();
    }
    if args.notify_after_bootstrap {
        cfg.notify_after_bootstrap = true;
    }
    Ok(cfg)
}

fn open_directory(args: &Cli, cfg: &ControllerConfig) -> Arc<dyn FilterDirectory> {
    if args.memory {
        return Arc::new(InMemoryDirectory::new(cfg.kind));
    }
    let path = cfg.store_path.clone().unwrap_or_else(default_store_path);
    Arc::new(JsonFileDirectory::new(path, cfg.kind))
}

pub async fn run(args: Cli) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();
    let result = execute(&args, &out_tx).await;

    if let Ok(snapshot) = &result {
        if args.json {
            match serde_json::to_string_pretty(snapshot) {
                Ok(out) => {
                    let _ = out_tx.send(OutputLine::Stdout(out));
                }
                Err(e) => {
                    let _ = out_tx.send(OutputLine::Stderr(format!("Failed to render JSON: {e}")));
                }
            }
        } else {
            for line in build_text_summary(snapshot).lines {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
        }
    }
    // Flush whatever was queued, including notices sent before a failure.
    drop(out_tx);
    let _ = out_handle.await;

    let snapshot = result?;
    if !snapshot.errors.is_empty() {
        bail!("{} filter operation(s) failed", snapshot.errors.len());
    }
    Ok(())
}

/// Drive one controller run for `args` and capture where it ended up.
async fn execute(args: &Cli, out_tx: &mpsc::UnboundedSender<OutputLine>) -> Result<Snapshot> {
    let cfg = build_config(args)?;
    let app_name = AppName::parse(args.command.app())?;
    let directory = open_directory(args, &cfg);

    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<FilterEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ControllerCommand>();

    let lifecycle =
        FilterLifecycle::new(evt_tx).with_notify_after_bootstrap(cfg.notify_after_bootstrap);
    let controller = {
        let directory = directory.clone();
        let cfg = cfg.clone();
        tokio::spawn(async move { run_controller(lifecycle, directory, &cfg, cmd_rx).await })
    };

    let send = |cmd: ControllerCommand| {
        cmd_tx
            .send(cmd)
            .map_err(|_| anyhow!("filter controller stopped unexpectedly"))
    };

    let mut errors = Vec::new();
    if let Command::Show {
        select: Some(name), ..
    } = &args.command
    {
        send(ControllerCommand::Select(Some(SelectionHint::by_name(name))))?;
    }
    send(ControllerCommand::SetApplication(app_name))?;

    let edit = match &args.command {
        Command::Show { .. } => None,
        Command::Action { action, id, .. } => {
            match EditAction::from_tag(action, FilterId::new(id.as_str())) {
                Ok(action) => Some(ControllerCommand::Edit(action)),
                Err(e) => {
                    warn!(error = %e, "ignoring edit action");
                    let _ = out_tx.send(OutputLine::Stderr(format!("Ignored: {e}")));
                    None
                }
            }
        }
        command => {
            let filters = wait_for_directory(&mut evt_rx, out_tx, &mut errors).await?;
            Some(ControllerCommand::Mutate(build_request(command, &filters)?))
        }
    };
    if let Some(cmd) = edit {
        send(cmd)?;
    }
    send(ControllerCommand::Quit)?;

    let lifecycle = controller.await.context("filter controller task failed")?;
    while let Ok(ev) = evt_rx.try_recv() {
        report_event(&ev, out_tx, &mut errors);
    }

    Ok(Snapshot::capture(&lifecycle, errors))
}

/// Wait until the first directory arrives, reporting everything seen on the way.
async fn wait_for_directory(
    evt_rx: &mut mpsc::UnboundedReceiver<FilterEvent>,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
    errors: &mut Vec<String>,
) -> Result<Vec<Filter>> {
    while let Some(ev) = evt_rx.recv().await {
        match ev {
            FilterEvent::DirectoryLoaded { filters, .. }
            | FilterEvent::DirectoryBootstrapped { filters, .. } => return Ok(filters),
            FilterEvent::DirectoryError { error } if error.is_fetch() => {
                return Err(anyhow!(error).context("load filters"));
            }
            other => report_event(&other, out_tx, errors),
        }
    }
    bail!("filter controller stopped before the directory loaded")
}

fn report_event(
    ev: &FilterEvent,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
    errors: &mut Vec<String>,
) {
    match ev {
        FilterEvent::DirectoryError { error } => {
            errors.push(error.to_string());
            let _ = out_tx.send(OutputLine::Stderr(ev.to_message()));
        }
        FilterEvent::Info(_) => {
            let _ = out_tx.send(OutputLine::Stderr(ev.to_message()));
        }
        other => tracing::debug!(event = %other.to_message(), "filter event"),
    }
}

fn find_filter<'a>(filters: &'a [Filter], name: &str) -> Result<&'a Filter> {
    filters
        .iter()
        .find(|f| f.matches_name(name))
        .ok_or_else(|| anyhow!("no filter named `{name}`"))
}

fn build_request(
    command: &Command,
    filters: &[Filter],
) -> Result<crate::editor::EditRequest> {
    match command {
        Command::Save { name, set, .. } => {
            let mut editor = FilterEditor::new(find_filter(filters, name)?.clone());
            for (k, v) in set {
                editor.set_field(k.clone(), v.clone());
            }
            if !editor.can_save() {
                bail!("nothing to save: `{name}` is unchanged");
            }
            Ok(editor.save())
        }
        Command::SaveAs {
            from,
            new_name,
            icon,
            set,
            ..
        } => {
            let source = match from {
                Some(name) => find_filter(filters, name)?,
                None => filters
                    .first()
                    .ok_or_else(|| anyhow!("no filter to copy"))?,
            };
            let mut editor = FilterEditor::new(source.clone());
            for (k, v) in set {
                editor.set_field(k.clone(), v.clone());
            }
            Ok(editor.save_as(new_name.clone(), icon.clone()))
        }
        Command::Delete { name, .. } => {
            Ok(FilterEditor::new(find_filter(filters, name)?.clone()).delete())
        }
        Command::Show { .. } | Command::Action { .. } => {
            bail!("command does not edit a filter")
        }
    }
}
