use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use planner_shared::{TaskFilter, UiEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument, warn};

use crate::cli::Command;
use crate::config::Config;
use crate::gateway::SyncGateway;
use crate::graphql::{GraphqlGateway, GraphqlSettings};
use crate::render::Renderer;
use crate::store::TaskStore;

/// One line typed into `planner shell`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Event(UiEvent),
    List,
    Filters,
    Help,
    Quit,
    Empty,
}

const SHELL_HELP: &str = "commands: add <name> | toggle <id> | edit <id> <name> | \
                          delete <id> | filter <All|Active|Completed> | list | filters | \
                          help | quit";

#[instrument(skip(cfg, renderer, command))]
pub async fn dispatch(cfg: &Config, renderer: &Renderer, command: Command) -> anyhow::Result<()> {
    let default_filter = cfg.default_filter()?;

    if command == Command::Filters {
        renderer.print_filters(default_filter)?;
        return Ok(());
    }

    let settings = GraphqlSettings::from_config(cfg)?;
    let gateway = Arc::new(GraphqlGateway::new(settings)?);
    info!(endpoint = %gateway.endpoint(), "connecting to task API");

    let mut store = TaskStore::new(gateway);
    store.set_filter(default_filter);
    if !store.load().await {
        warn!("continuing with an empty task list");
    }

    if command == Command::Shell {
        let stdin = BufReader::new(tokio::io::stdin());
        return run_shell(&mut store, renderer, stdin, io::stdout()).await;
    }

    run_once(&mut store, renderer, command.event(), io::stdout().lock()).await
}

/// Applies at most one event and prints the visible list. Remote writes
/// are drained before returning, even when printing fails.
pub async fn run_once<G, W>(
    store: &mut TaskStore<G>,
    renderer: &Renderer,
    event: Option<UiEvent>,
    out: W,
) -> anyhow::Result<()>
where
    G: SyncGateway + 'static,
    W: Write,
{
    if let Some(event) = event
        && !store.apply(event)
    {
        warn!("no task with that id; nothing changed");
    }

    let printed = renderer.write_task_list(out, store.filter(), &store.visible_tasks());
    let synced = finish(store).await;
    printed.context("failed to print task list")?;
    synced
}

/// Interactive session: one load, then a stream of events from `input`.
/// Remote writes are drained before returning, even when reading or
/// printing fails.
#[instrument(skip_all)]
pub async fn run_shell<G, R, W>(
    store: &mut TaskStore<G>,
    renderer: &Renderer,
    input: R,
    out: W,
) -> anyhow::Result<()>
where
    G: SyncGateway + 'static,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let session = shell_session(store, renderer, input, out).await;
    let synced = finish(store).await;
    session?;
    synced
}

async fn shell_session<G, R, W>(
    store: &mut TaskStore<G>,
    renderer: &Renderer,
    reader: R,
    mut out: W,
) -> anyhow::Result<()>
where
    G: SyncGateway + 'static,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut updates = store.subscribe();
    renderer.write_task_list(&mut out, store.filter(), &store.visible_tasks())?;

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("failed reading stdin")? {
        let input = match parse_shell_line(&line) {
            Ok(input) => input,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        debug!(?input, "shell input");

        match input {
            ShellInput::Empty => {}
            ShellInput::Quit => break,
            ShellInput::Help => eprintln!("{SHELL_HELP}"),
            ShellInput::Filters => renderer.write_filters(&mut out, store.filter())?,
            ShellInput::List => {
                renderer.write_task_list(&mut out, store.filter(), &store.visible_tasks())?;
            }
            ShellInput::Event(event) => {
                let filter_change = matches!(event, UiEvent::SetFilter { .. });
                if !store.apply(event) {
                    eprintln!("no task with that id");
                    continue;
                }

                if updates.has_changed().unwrap_or(false) || filter_change {
                    let filter = store.filter();
                    let snapshot = updates.borrow_and_update();
                    let visible: Vec<_> = snapshot
                        .iter()
                        .filter(|task| filter.matches(task))
                        .collect();
                    renderer.write_task_list(&mut out, filter, &visible)?;
                }
            }
        }
    }

    Ok(())
}

/// Parses a shell line; ids are single words, names take the rest of the line.
pub fn parse_shell_line(line: &str) -> anyhow::Result<ShellInput> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ShellInput::Empty);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let input = match verb.to_ascii_lowercase().as_str() {
        "add" => {
            if rest.is_empty() {
                bail!("usage: add <name>");
            }
            ShellInput::Event(UiEvent::Add {
                name: rest.to_string(),
            })
        }
        "toggle" => ShellInput::Event(UiEvent::Toggle {
            id: single_id(rest, "toggle <id>")?,
        }),
        "delete" | "rm" => ShellInput::Event(UiEvent::Delete {
            id: single_id(rest, "delete <id>")?,
        }),
        "edit" => {
            let (id, name) = rest
                .split_once(char::is_whitespace)
                .map(|(id, name)| (id, name.trim()))
                .filter(|(_, name)| !name.is_empty())
                .ok_or_else(|| anyhow!("usage: edit <id> <name>"))?;
            ShellInput::Event(UiEvent::Edit {
                id: id.to_string(),
                name: name.to_string(),
            })
        }
        "filter" => {
            let filter: TaskFilter = rest.parse()?;
            ShellInput::Event(UiEvent::SetFilter { filter })
        }
        "list" | "ls" => ShellInput::List,
        "filters" => ShellInput::Filters,
        "help" | "?" => ShellInput::Help,
        "quit" | "exit" => ShellInput::Quit,
        other => bail!("unknown command {other:?}; type help"),
    };

    Ok(input)
}

fn single_id(rest: &str, usage: &str) -> anyhow::Result<String> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(id), None) => Ok(id.to_string()),
        _ => bail!("usage: {usage}"),
    }
}

async fn finish<G>(store: &mut TaskStore<G>) -> anyhow::Result<()>
where
    G: SyncGateway + 'static,
{
    let summary = store.flush().await;
    if summary.failed > 0 {
        bail!(
            "{} of {} remote update(s) failed; local and remote task lists may differ",
            summary.failed,
            summary.failed + summary.confirmed
        );
    }
    Ok(())
}
