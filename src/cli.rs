//! Command-line interface.
//!
//! Every command writes its user-facing output to a caller-provided writer
//! so the commands can be exercised without a terminal. Logs go through
//! `tracing` and never mix with command output.

use crate::config::{Config, ConfigError};
use crate::data::{DataError, load_data, process_data};
use crate::db::schema::table_exists;
use crate::db::{Crud, DEFAULT_DATABASE, DatabaseManager, DbContext, Entity, Schema};
use crate::error::DbError;
use crate::fields;
use crate::models::{User, example_schema};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "dbscope", version, about = "Multi-database session toolkit")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Greet NAME a total of COUNT times
    Hello {
        /// Number of greetings
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// The person to greet (prompted for when missing)
        #[arg(long)]
        name: Option<String>,
    },

    /// Process a file and write a result line
    Process {
        #[arg(long)]
        verbose: bool,

        /// Write the result here instead of stdout
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        input: PathBuf,
    },

    /// Generate sample data in the given format
    Generate {
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Number of items to generate
        #[arg(long, default_value_t = 10)]
        count: usize,
    },

    /// Load, validate and process a CSV of users
    LoadData {
        /// Defaults to the configured data file
        path: Option<PathBuf>,
    },

    /// Database commands
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
pub enum DbCommand {
    /// Register the configured databases and create tables
    Init,

    /// Create a user in one database
    AddUser {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        age: Option<i64>,

        /// Target database name
        #[arg(long = "db", default_value = DEFAULT_DATABASE)]
        db: String,
    },

    /// List users of one database
    ListUsers {
        /// Source database name
        #[arg(long = "db", default_value = DEFAULT_DATABASE)]
        db: String,

        #[arg(long, default_value_t = 0)]
        skip: u64,

        #[arg(long, default_value_t = 100)]
        limit: u64,
    },

    /// Walk through per-database isolation on every configured database
    Demo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
    Xml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Xml => write!(f, "xml"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input file does not exist: {0}")]
    MissingInput(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl CliError {
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            CliError::Database(e) => e.suggestion(),
            _ => None,
        }
    }
}

/// Dispatch a parsed command line.
pub async fn run<R: BufRead, W: Write>(
    cli: Cli,
    input: &mut R,
    out: &mut W,
) -> Result<(), CliError> {
    match cli.command {
        Command::Hello { count, name } => hello(count, name.as_deref(), input, out),
        Command::Process {
            verbose,
            output,
            input: path,
        } => process_file(&path, output.as_deref(), verbose, out),
        Command::Generate { format, count } => generate(format, count, out),
        Command::LoadData { path } => {
            let path = path.unwrap_or_else(|| cli.config.data_file_path.clone());
            load_data_command(&path, out)
        }
        Command::Db(command) => run_db(command, &cli.config, out).await,
    }
}

pub fn hello<R: BufRead, W: Write>(
    count: u32,
    name: Option<&str>,
    input: &mut R,
    out: &mut W,
) -> Result<(), CliError> {
    let name = match name {
        Some(name) => name.to_string(),
        None => {
            write!(out, "Your name: ")?;
            out.flush()?;
            let mut line = String::new();
            input.read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    for _ in 0..count {
        writeln!(out, "Hello {}!", name)?;
    }
    Ok(())
}

pub fn process_file<W: Write>(
    input: &Path,
    output: Option<&Path>,
    verbose: bool,
    out: &mut W,
) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::MissingInput(input.to_path_buf()));
    }
    if verbose {
        writeln!(out, "Processing file: {}", input.display())?;
    }

    let line = format!(
        "Processed file: {} at {}",
        input.display(),
        Local::now().format("%Y-%m-%d %H:%M:%S%.6f")
    );
    match output {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            writeln!(file, "{}", line)?;
        }
        None => writeln!(out, "{}", line)?,
    }

    if verbose {
        writeln!(out, "File processing completed.")?;
    }
    Ok(())
}

pub fn generate<W: Write>(format: OutputFormat, count: usize, out: &mut W) -> Result<(), CliError> {
    writeln!(out, "Generating {} items in {} format...", count, format)?;
    match format {
        OutputFormat::Json => {
            writeln!(out, "[")?;
            for i in 0..count {
                let separator = if i + 1 < count { "," } else { "" };
                writeln!(out, "  {{\"id\": {}, \"name\": \"Item {}\"}}{}", i, i, separator)?;
            }
            writeln!(out, "]")?;
        }
        OutputFormat::Csv => {
            writeln!(out, "id,name")?;
            for i in 0..count {
                writeln!(out, "{},Item {}", i, i)?;
            }
        }
        OutputFormat::Xml => {
            writeln!(out, "<items>")?;
            for i in 0..count {
                writeln!(out, "  <item id='{}'>Item {}</item>", i, i)?;
            }
            writeln!(out, "</items>")?;
        }
    }
    Ok(())
}

pub fn load_data_command<W: Write>(path: &Path, out: &mut W) -> Result<(), CliError> {
    let records = load_data(path)?;
    writeln!(out, "Loaded {} records from {}", records.len(), path.display())?;
    for record in process_data(records) {
        let line = serde_json::to_string(&record).map_err(std::io::Error::other)?;
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Run a `db` subcommand against the configured databases.
pub async fn run_db<W: Write>(
    command: DbCommand,
    config: &Config,
    out: &mut W,
) -> Result<(), CliError> {
    let databases = config.database_map()?;
    let manager = Arc::new(DatabaseManager::new());
    let schema = example_schema();
    let create_tables = config.auto_create_tables || matches!(command, DbCommand::Init);
    manager
        .initialize(&databases, None, create_tables.then_some(&schema))
        .await?;

    let mut ctx = manager.context();
    let result = match command {
        DbCommand::Init => db_init(&manager, &schema, out).await,
        DbCommand::AddUser {
            name,
            email,
            age,
            db,
        } => add_user(&mut ctx, &db, name, email, age, out).await,
        DbCommand::ListUsers { db, skip, limit } => list_users(&mut ctx, &db, skip, limit, out).await,
        DbCommand::Demo => demo(&mut ctx, out).await,
    };

    manager.close_all().await;
    result
}

async fn db_init<W: Write>(
    manager: &DatabaseManager,
    schema: &Schema,
    out: &mut W,
) -> Result<(), CliError> {
    let mut ready = 0;
    for summary in manager.list().await {
        writeln!(
            out,
            "Registered {} ({}): {}",
            summary.name, summary.db_type, summary.url
        )?;
        let factory = manager.resolve(&summary.name).await?;
        let mut missing = Vec::new();
        for table in schema.tables() {
            if !table_exists(factory.pool(), table.name).await? {
                missing.push(table.name);
            }
        }
        if missing.is_empty() {
            ready += 1;
        } else {
            writeln!(out, "  missing tables: {}", missing.join(", "))?;
        }
    }
    writeln!(out, "Tables ready in {} database(s)", ready)?;
    Ok(())
}

async fn add_user<W: Write>(
    ctx: &mut DbContext,
    db: &str,
    name: String,
    email: Option<String>,
    age: Option<i64>,
    out: &mut W,
) -> Result<(), CliError> {
    let fields = fields! { "name" => name, "email" => email, "age" => age };
    let user = ctx
        .transactional(Some(db), None, move |session| {
            Box::pin(async move { User::create(session, fields).await })
        })
        .await?;
    info!(database = %ctx.current(), id = user.id(), "User added");
    writeln!(out, "Created {} in '{}'", user, ctx.current())?;
    Ok(())
}

async fn list_users<W: Write>(
    ctx: &mut DbContext,
    db: &str,
    skip: u64,
    limit: u64,
    out: &mut W,
) -> Result<(), CliError> {
    let users = ctx
        .with_db_session(Some(db), move |session| {
            Box::pin(async move { User::get_all(session, skip, limit).await })
        })
        .await?;
    writeln!(out, "{} user(s) in '{}'", users.len(), db)?;
    for user in users {
        writeln!(out, "  {}", user.to_dict())?;
    }
    Ok(())
}

/// Create users in every registered database, show that each database only
/// sees its own rows, and show that a failed transaction leaves nothing
/// behind.
async fn demo<W: Write>(ctx: &mut DbContext, out: &mut W) -> Result<(), CliError> {
    let names = ctx.manager().names().await;
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let tag = &tag[..8];
    writeln!(out, "Databases: {}", names.join(", "))?;

    writeln!(out, "1. Creating one user per database")?;
    for (i, name) in names.iter().enumerate() {
        let fields = fields! {
            "name" => format!("User{}", i + 1),
            "email" => format!("user{}.{}@{}.example", i + 1, tag, name),
            "age" => 25 + i as i64,
        };
        let user = ctx
            .transactional(Some(name), None, move |session| {
                Box::pin(async move { User::create(session, fields).await })
            })
            .await?;
        writeln!(out, "   [{}] {}", name, user)?;
    }

    writeln!(out, "2. Creating TestUser in every database")?;
    for (i, name) in names.iter().enumerate() {
        let email = format!("test.{}@{}.example", tag, name);
        let user = ctx
            .session_scope(Some(name), move |session| {
                Box::pin(async move {
                    let user = User::create(
                        session,
                        fields! { "name" => "TestUser", "email" => email, "age" => 20 + i as i64 },
                    )
                    .await?;
                    session.commit().await?;
                    Ok::<_, DbError>(user)
                })
            })
            .await?;
        writeln!(out, "   [{}] {}", name, user)?;
    }

    writeln!(out, "3. Users per database")?;
    for name in &names {
        let users = ctx
            .with_db_session(Some(name), |session| {
                Box::pin(async move { User::get_all_default(session).await })
            })
            .await?;
        writeln!(out, "   [{}] {} user(s)", name, users.len())?;
        for user in users {
            writeln!(out, "     {}", user)?;
        }
    }

    writeln!(out, "4. Failed transaction on '{}'", ctx.current())?;
    let before = ctx
        .session_scope(None, |session| Box::pin(async move { User::count(session).await }))
        .await?;
    let failed: Result<(), DbError> = ctx
        .transactional(None, None, |session| {
            Box::pin(async move {
                User::create(session, fields! { "name" => "Ghost" }).await?;
                Err::<(), _>(DbError::invalid_input("aborting demo transaction"))
            })
        })
        .await;
    if let Err(e) = &failed {
        warn!(error = %e, "Demo transaction rolled back");
    }
    let after = ctx
        .session_scope(None, |session| Box::pin(async move { User::count(session).await }))
        .await?;
    writeln!(out, "   rolled back: {} user(s) before, {} after", before, after)?;
    Ok(())
}
