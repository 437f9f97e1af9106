use clap::Parser;
use noteflow::application::Strategy;
use noteflow::cli::args::{Args, Backend, Command};

#[test]
fn given_no_subcommand_when_parsing_then_fails() {
    // Arrange
    let args = vec!["noteflow", "alice"];

    // Act & Assert
    let result = Args::try_parse_from(args);
    assert!(result.is_err(), "Should fail without subcommand");
}

#[test]
fn given_list_command_when_parsing_then_succeeds_with_defaults() {
    // Arrange
    let args = vec!["noteflow", "list", "alice"];

    // Act
    let parsed = Args::try_parse_from(args).unwrap();

    // Assert
    match parsed.command {
        Command::List {
            person,
            filter,
            json,
        } => {
            assert_eq!(person, "alice");
            assert_eq!(filter, None);
            assert!(!json);
        }
        _ => panic!("Expected List command"),
    }
    assert_eq!(parsed.backend, Backend::Sqlite);
    assert_eq!(parsed.client, None);
    assert_eq!(parsed.database, None);
}

#[test]
fn given_list_with_filter_and_json_when_parsing_then_sets_both() {
    let args = vec!["noteflow", "list", "alice", "--filter", "milk", "--json"];

    let parsed = Args::try_parse_from(args).unwrap();

    match parsed.command {
        Command::List { filter, json, .. } => {
            assert_eq!(filter.as_deref(), Some("milk"));
            assert!(json);
        }
        _ => panic!("Expected List command"),
    }
}

#[test]
fn given_add_with_unquoted_words_when_parsing_then_collects_text() {
    let args = vec!["noteflow", "add", "alice", "buy", "oat", "milk"];

    let parsed = Args::try_parse_from(args).unwrap();

    match parsed.command {
        Command::Add { person, text } => {
            assert_eq!(person, "alice");
            assert_eq!(text.join(" "), "buy oat milk");
        }
        _ => panic!("Expected Add command"),
    }
}

#[test]
fn given_add_without_text_when_parsing_then_fails() {
    let result = Args::try_parse_from(vec!["noteflow", "add", "alice"]);

    assert!(result.is_err());
}

#[test]
fn given_delete_command_when_parsing_then_succeeds() {
    let parsed = Args::try_parse_from(vec!["noteflow", "delete", "42"]).unwrap();

    match parsed.command {
        Command::Delete { note_id } => assert_eq!(note_id, 42),
        _ => panic!("Expected Delete command"),
    }
}

#[test]
fn given_non_numeric_id_when_parsing_delete_then_fails() {
    let result = Args::try_parse_from(vec!["noteflow", "delete", "abc"]);

    assert!(result.is_err());
}

#[test]
fn given_watch_without_user_when_parsing_then_person_is_none() {
    let parsed = Args::try_parse_from(vec!["noteflow", "watch"]).unwrap();

    match parsed.command {
        Command::Watch { person } => assert_eq!(person, None),
        _ => panic!("Expected Watch command"),
    }
}

#[test]
fn given_global_flags_after_subcommand_when_parsing_then_succeeds() {
    // Arrange - global flags work anywhere when marked as global
    let args = vec![
        "noteflow",
        "watch",
        "bob",
        "--client",
        "signal",
        "--backend",
        "rest",
        "-d",
        "sqlite::memory:",
        "-vv",
    ];

    // Act
    let parsed = Args::try_parse_from(args).unwrap();

    // Assert
    assert_eq!(parsed.client, Some(Strategy::Signal));
    assert_eq!(parsed.backend, Backend::Rest);
    assert_eq!(parsed.database.as_deref(), Some("sqlite::memory:"));
    assert_eq!(parsed.verbose, 2);
}

#[test]
fn given_unknown_strategy_when_parsing_then_fails() {
    let result = Args::try_parse_from(vec!["noteflow", "--client", "observable", "watch"]);

    assert!(result.is_err());
}
