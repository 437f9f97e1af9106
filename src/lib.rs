// src/lib.rs
pub mod application;
pub mod cli;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;
pub mod ports;
pub mod util;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use application::{build_client, NoteService, NotesClient};
use cli::args::{Args, Backend, Command};
use config::Config;
use infrastructure::{RestNoteService, SqliteNoteStore};
use ports::TerminalPresenter;
use tokio::io::BufReader;
use tracing::{debug, info};

pub async fn run(args: Args) -> Result<()> {
    debug!(?args, "Starting noteflow with arguments");

    let config = load_config(&args)?;
    debug!(?config, "Resolved configuration");

    // Initialize infrastructure
    match args.backend {
        Backend::Sqlite => {
            let url = args.database.as_deref().unwrap_or(&config.database.url);
            let store = SqliteNoteStore::open(url)?;
            execute(&args, &config, Arc::new(store)).await
        }
        Backend::Rest => {
            let (url, key) = config.service.credentials()?;
            let service = RestNoteService::new(url, key)?;
            execute(&args, &config, Arc::new(service)).await
        }
    }
}

/// Config file (explicit or default location) overlaid with the environment.
pub fn load_config(args: &Args) -> Result<Config> {
    let path = args.config.clone().or_else(config::default_config_path);
    if let Some(explicit) = &args.config {
        if !explicit.exists() {
            bail!("Config file not found: {}", explicit.display());
        }
    }

    let mut config = Config::load_or_default(path.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(strategy) = args.client {
        config.client.strategy = strategy;
    }
    Ok(config)
}

async fn execute<S>(args: &Args, config: &Config, service: Arc<S>) -> Result<()>
where
    S: NoteService + 'static,
{
    // Initialize application
    let strategy = config.client.strategy;
    let client = build_client(strategy, service, config.client_settings());
    info!(?strategy, "Notes client ready");

    // Initialize presentation
    let presenter = TerminalPresenter::new();

    // Execute use case
    let result = match &args.command {
        Command::List {
            person,
            filter,
            json,
        } => list(client.as_ref(), &presenter, person, filter.as_deref(), *json).await,
        Command::Add { person, text } => add(client.as_ref(), person, &text.join(" ")).await,
        Command::Delete { note_id } => delete(client.as_ref(), *note_id).await,
        Command::Watch { person } => {
            if let Some(person) = person {
                client.set_person(person);
            }
            println!("{}", cli::session::HELP);
            let stdin = BufReader::new(tokio::io::stdin());
            cli::session::run_session(client.as_ref(), &presenter, stdin, &mut std::io::stdout())
                .await
        }
    };

    client.teardown();
    result
}

/// Load `person`'s notes under `filter` and wait for the settled view.
async fn load(client: &dyn NotesClient, person: &str, filter: &str) -> Result<domain::NotesView> {
    client.set_filter(filter);
    client.set_person(person);
    let mut views = client.subscribe();
    while let Some(view) = tokio_stream::StreamExt::next(&mut views).await {
        if view.person == person.trim() && view.filter == filter && !view.loading {
            if let Some(error) = &view.error {
                bail!("{error}");
            }
            return Ok(view);
        }
    }
    bail!("Notes client stopped before loading {person}")
}

async fn list(
    client: &dyn NotesClient,
    presenter: &TerminalPresenter,
    person: &str,
    filter: Option<&str>,
    json: bool,
) -> Result<()> {
    if person.trim().is_empty() {
        bail!("Username must not be empty");
    }
    let view = load(client, person, filter.unwrap_or_default()).await?;
    debug!(count = view.visible.len(), "Listing notes");

    if json {
        println!("{}", presenter.render_json(&view)?);
    } else {
        print!("{}", presenter.render(&view));
    }
    Ok(())
}

async fn add(client: &dyn NotesClient, person: &str, text: &str) -> Result<()> {
    client.set_person(person);
    let inserted = client
        .add_note(text)
        .await
        .with_context(|| format!("Failed to add note for {person}"))?;

    for note in inserted {
        println!("Added note {} for {}", note.id, note.person);
    }
    Ok(())
}

async fn delete(client: &dyn NotesClient, note_id: i64) -> Result<()> {
    let removed = client
        .delete_note(note_id)
        .await
        .with_context(|| format!("Failed to delete note {note_id}"))?;

    if removed.is_empty() {
        bail!("Note not found: {note_id}");
    }
    println!("Deleted note {note_id}");
    Ok(())
}
