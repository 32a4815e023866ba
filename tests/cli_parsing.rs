use autofix::cli::{Cli, Commands};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn test_parse_run_with_trailing_command() {
    let cli = Cli::try_parse_from([
        "autofix",
        "run",
        "--max-attempts",
        "3",
        "--no-ai",
        "--",
        "npm",
        "run",
        "build",
        "--prod",
    ])
    .unwrap();

    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.command, vec!["npm", "run", "build", "--prod"]);
            assert_eq!(args.max_attempts, Some(3));
            assert!(args.no_ai);
            assert!(!args.events);
            assert_eq!(args.dir, PathBuf::from("."));
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_run_requires_a_command() {
    assert!(Cli::try_parse_from(["autofix", "run"]).is_err());
}

#[test]
fn test_parse_classify_with_negative_exit_code() {
    let cli = Cli::try_parse_from([
        "autofix",
        "classify",
        "Error: Cannot find module 'express'",
        "--exit-code",
        "-1",
    ])
    .unwrap();

    match cli.command {
        Commands::Classify(args) => {
            assert_eq!(args.message, "Error: Cannot find module 'express'");
            assert_eq!(args.exit_code, Some(-1));
            assert!(args.dir.is_none());
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "autofix",
        "rules",
        "--fixable-only",
        "--language",
        "python",
        "--json",
        "--config",
        "ci.yaml",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("ci.yaml")));
    match cli.command {
        Commands::Rules(args) => {
            assert!(args.fixable_only);
            assert_eq!(args.language.as_deref(), Some("python"));
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_fix_and_init_defaults() {
    let cli = Cli::try_parse_from(["autofix", "fix", "-", "--project-id", "shop"]).unwrap();
    match cli.command {
        Commands::Fix(args) => {
            assert_eq!(args.error, "-");
            assert_eq!(args.project_id.as_deref(), Some("shop"));
            assert!(!args.no_ai);
        }
        _ => panic!("Wrong top-level command"),
    }

    let cli = Cli::try_parse_from(["autofix", "init", "--force"]).unwrap();
    match cli.command {
        Commands::Init(args) => {
            assert!(args.force);
            assert_eq!(args.path, PathBuf::from("."));
        }
        _ => panic!("Wrong top-level command"),
    }
}
