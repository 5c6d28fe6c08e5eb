//! Command dispatch

use std::collections::HashSet;
use std::io;
use std::path::Path;

use clap::CommandFactory;
use tracing::{debug, instrument};

use crate::application::script;
use crate::application::services::NONE_NOTE;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{NodeId, TopicTree};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, run `treenote --help`".into(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "treenote", &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => cmd_config(cli, command),
        Commands::Init => cmd_init(&container(cli)?),
        Commands::Tree { orphans } => cmd_tree(&container(cli)?, *orphans),
        Commands::Convert { topic } => cmd_convert(&container(cli)?, topic.as_deref()),
        Commands::Replay { script, wait } => cmd_replay(&container(cli)?, script, *wait),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(workspace) = &cli.workspace {
        settings.workspace = workspace.clone();
    }
    debug!("workspace: {}", settings.workspace.display());
    Ok(settings)
}

fn container(cli: &Cli) -> CliResult<ServiceContainer> {
    Ok(ServiceContainer::new(load_settings(cli)?))
}

#[instrument(skip(container))]
fn cmd_init(container: &ServiceContainer) -> CliResult<()> {
    let created = container.session_service().init_workspace()?;
    output::success(&format!(
        "initialized {}",
        container.settings.workspace.display()
    ));
    for path in created {
        output::success_detail(&path.display());
    }
    Ok(())
}

fn topic_tree(tree: &TopicTree, id: NodeId) -> termtree::Tree<String> {
    let label = tree
        .get(id)
        .map(|node| output::topic_label(&node.name, node.position.x, node.position.y))
        .unwrap_or_default();
    termtree::Tree::new(label).with_leaves(
        tree.children(id)
            .iter()
            .map(|&child| topic_tree(tree, child)),
    )
}

#[instrument(skip(container))]
fn cmd_tree(container: &ServiceContainer, orphans: bool) -> CliResult<()> {
    let session = container.session_service();
    let tree = session.load()?;

    let root = tree.root();
    let printed = termtree::Tree::new(session.session_path().display().to_string()).with_leaves(
        tree.children(root)
            .iter()
            .map(|&child| topic_tree(&tree, child)),
    );
    output::info(&printed);

    if orphans {
        let topics: HashSet<&str> = tree.iter().map(|(_, node)| node.name.as_str()).collect();
        let unused: Vec<String> = container
            .note_service()
            .list_notes()
            .into_iter()
            .filter(|note| note != NONE_NOTE && !topics.contains(note.as_str()))
            .collect();
        if unused.is_empty() {
            output::success("every note belongs to a topic");
        } else {
            output::header("Notes without a topic:");
            for note in unused {
                output::detail(&note);
            }
        }
    }
    Ok(())
}

#[instrument(skip(container))]
fn cmd_convert(container: &ServiceContainer, topic: Option<&str>) -> CliResult<()> {
    let notes = container.note_service();
    let topics: Vec<String> = match topic {
        Some(topic) if notes.note_exists(topic) => vec![topic.to_string()],
        Some(topic) => {
            return Err(CliError::InvalidArgs(format!(
                "no note for topic {topic}: {}",
                notes.note_path(topic).display()
            )))
        }
        None => {
            let tree = container.session_service().load()?;
            let mut names: Vec<String> = tree
                .iter()
                .map(|(_, node)| node.name.clone())
                .filter(|name| notes.note_exists(name))
                .collect();
            names.sort();
            names.dedup();
            names
        }
    };

    let mut detail = container.detail_service();
    for topic in &topics {
        detail.request_conversion(topic)?;
    }

    let mut failed = 0;
    for done in detail.wait_all() {
        match &done.error {
            None => output::success_detail(&done.topic),
            Some(error) => {
                failed += 1;
                output::failure(&format!("{}: {}", done.topic, error));
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Infra(InfraError::Command {
            message: format!("{failed} of {} conversions failed", topics.len()),
        }));
    }
    output::success(&format!("converted {} topics", topics.len()));
    Ok(())
}

#[instrument(skip(container))]
fn cmd_replay(container: &ServiceContainer, script_path: &Path, wait: bool) -> CliResult<()> {
    let text = container
        .fs
        .read_to_string(script_path)
        .map_err(|e| InfraError::io(format!("read script {}", script_path.display()), e))?;
    let steps = script::parse_script(&text)?;

    let mut editor = container.editor()?;
    let reports = script::replay(&mut editor, &steps)?;
    if wait {
        editor.wait_for_conversions();
    }
    editor.save()?;

    let created = reports.iter().filter(|r| r.outcome.created.is_some()).count();
    let deleted: Vec<&str> = reports
        .iter()
        .flat_map(|r| r.deleted.iter().map(String::as_str))
        .collect();
    output::success(&format!(
        "replayed {} frames, {} topics created, {} deleted",
        reports.len(),
        created,
        deleted.len()
    ));
    for name in deleted {
        output::detail(&format!("deleted {name}"));
    }
    Ok(())
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::info(&format!("global: {}", path.display())),
                None => output::warning("no home directory, global config disabled"),
            }
            let local = cli.config.clone().unwrap_or_else(local_config_path);
            output::info(&format!("local:  {}", local.display()));
        }
    }
    Ok(())
}
