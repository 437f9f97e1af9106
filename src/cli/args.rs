// src/cli/args.rs
use crate::application::Strategy;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
#[command(arg_required_else_help = true, disable_help_subcommand = true)]
pub struct Args {
    /// Path to config file (optional)
    #[arg(long, value_name = "CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database URL for the sqlite backend, e.g. sqlite://notes.db
    #[arg(short, long, value_name = "URL", global = true)]
    pub database: Option<String>,

    /// State-management strategy driving the notes screen
    #[arg(long, value_enum, global = true)]
    pub client: Option<Strategy>,

    /// Where notes are stored
    #[arg(short, long, value_enum, default_value_t = Backend::Sqlite, global = true)]
    pub backend: Backend,

    /// Verbosity level (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Local SQLite database
    Sqlite,
    /// Remote REST service (NOTES_SERVICE_URL / NOTES_SERVICE_KEY)
    Rest,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List a user's notes
    List {
        /// Username whose notes to list
        #[arg(value_name = "USER")]
        person: String,

        /// Only show notes containing this text
        #[arg(short, long, value_name = "TEXT")]
        filter: Option<String>,

        /// Output notes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a note for a user
    Add {
        /// Username owning the note
        #[arg(value_name = "USER")]
        person: String,

        /// Note text
        #[arg(value_name = "TEXT", required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Delete a note by id
    Delete {
        /// Note ID to delete
        #[arg(value_name = "NOTE_ID")]
        note_id: i64,
    },

    /// Interactive notes screen reading commands from stdin
    Watch {
        /// Username to load on start (optional)
        #[arg(value_name = "USER")]
        person: Option<String>,
    },
}
