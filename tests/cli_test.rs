//! End-to-end tests for CLI commands that write to a buffer.

use clap::Parser;
use dbscope::cli::{self, Cli, CliError, DbCommand, OutputFormat};
use dbscope::config::Config;
use std::fs;
use tempfile::TempDir;

fn sqlite_config(dir: &TempDir) -> Config {
    let mut config = Config::default_config();
    config.database_url = format!("sqlite://{}", dir.path().join("main.db").display());
    config.analytics_database_url = Some(format!(
        "sqlite://{}",
        dir.path().join("analytics.db").display()
    ));
    config
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

#[test]
fn test_generate_csv() {
    let mut out = Vec::new();
    cli::generate(OutputFormat::Csv, 3, &mut out).unwrap();
    assert_eq!(
        output(out),
        "Generating 3 items in csv format...\nid,name\n0,Item 0\n1,Item 1\n2,Item 2\n"
    );
}

#[test]
fn test_generate_json_zero_items() {
    let mut out = Vec::new();
    cli::generate(OutputFormat::Json, 0, &mut out).unwrap();
    assert_eq!(output(out), "Generating 0 items in json format...\n[\n]\n");
}

#[test]
fn test_process_verbose_to_stdout() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, "data").unwrap();

    let mut out = Vec::new();
    cli::process_file(&input, None, true, &mut out).unwrap();
    let text = output(out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], format!("Processing file: {}", input.display()));
    assert!(lines[1].starts_with(&format!("Processed file: {} at ", input.display())));
    assert_eq!(lines[2], "File processing completed.");
}

#[test]
fn test_process_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.txt");
    let result = dir.path().join("out.txt");
    fs::write(&input, "data").unwrap();

    let mut out = Vec::new();
    cli::process_file(&input, Some(&result), false, &mut out).unwrap();
    assert!(out.is_empty());
    let written = fs::read_to_string(&result).unwrap();
    assert!(written.starts_with("Processed file: "));
}

#[test]
fn test_load_data_command_prints_processed_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.csv");
    fs::write(&path, "name,age,city\nAlice,30,Beijing\n").unwrap();

    let mut out = Vec::new();
    cli::load_data_command(&path, &mut out).unwrap();
    let text = output(out);
    assert!(text.starts_with("Loaded 1 records from "));
    assert!(text.contains("\"name\":\"Alice\""));
    assert!(text.contains("\"processed\":true"));
}

#[tokio::test]
async fn test_hello_through_run() {
    let cli = Cli::try_parse_from(["dbscope", "hello", "--count", "2", "--name", "Bob"]).unwrap();
    let mut input = "".as_bytes();
    let mut out = Vec::new();
    cli::run(cli, &mut input, &mut out).await.unwrap();
    assert_eq!(output(out), "Hello Bob!\nHello Bob!\n");
}

#[tokio::test]
async fn test_db_add_and_list_users() {
    let dir = TempDir::new().unwrap();
    let config = sqlite_config(&dir);

    let mut out = Vec::new();
    cli::run_db(
        DbCommand::AddUser {
            name: "Alice".to_string(),
            email: Some("alice@example.com".to_string()),
            age: Some(30),
            db: "analytics".to_string(),
        },
        &config,
        &mut out,
    )
    .await
    .unwrap();
    let text = output(out);
    assert!(text.contains("name='Alice', email='alice@example.com'"));
    assert!(text.contains("in 'analytics'"));

    let mut out = Vec::new();
    cli::run_db(
        DbCommand::ListUsers {
            db: "analytics".to_string(),
            skip: 0,
            limit: 100,
        },
        &config,
        &mut out,
    )
    .await
    .unwrap();
    assert!(output(out).starts_with("1 user(s) in 'analytics'"));

    let mut out = Vec::new();
    cli::run_db(
        DbCommand::ListUsers {
            db: "default".to_string(),
            skip: 0,
            limit: 100,
        },
        &config,
        &mut out,
    )
    .await
    .unwrap();
    assert!(output(out).starts_with("0 user(s) in 'default'"));
}

#[tokio::test]
async fn test_db_unknown_database_has_no_side_effects() {
    let dir = TempDir::new().unwrap();
    let config = sqlite_config(&dir);

    let mut out = Vec::new();
    let err = cli::run_db(
        DbCommand::AddUser {
            name: "Alice".to_string(),
            email: None,
            age: None,
            db: "missing".to_string(),
        },
        &config,
        &mut out,
    )
    .await
    .unwrap_err();
    match err {
        CliError::Database(e) => assert!(e.is_configuration()),
        other => panic!("expected database error, got {:?}", other),
    }
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_db_demo_runs_on_every_database() {
    let dir = TempDir::new().unwrap();
    let config = sqlite_config(&dir);

    let mut out = Vec::new();
    cli::run_db(DbCommand::Demo, &config, &mut out).await.unwrap();
    let text = output(out);
    assert!(text.starts_with("Databases: analytics, default\n"));
    assert!(text.contains("[analytics] 2 user(s)"));
    assert!(text.contains("[default] 2 user(s)"));
    assert!(text.contains("rolled back: 2 user(s) before, 2 after"));
}

#[tokio::test]
async fn test_db_init_reports_databases() {
    let dir = TempDir::new().unwrap();
    let mut config = sqlite_config(&dir);
    config.auto_create_tables = false;

    let mut out = Vec::new();
    cli::run_db(DbCommand::Init, &config, &mut out).await.unwrap();
    let text = output(out);
    assert!(text.contains("Registered analytics (SQLite): "));
    assert!(text.contains("Tables ready in 2 database(s)"));
    assert!(!text.contains("missing tables"));
}
