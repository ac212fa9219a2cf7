use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use querysense::config::{self, Config, LoggingConfig, StorageBackend};
use querysense::db::PostgresStore;
use querysense::engine::QueryEngine;
use querysense::history::QueryHistory;
use querysense::import::{self, ImportMode};
use querysense::models::{CgpaStudent, MarksStudent, PerformanceMetric, StudentRecord, StudentRow};
use querysense::report::{self, OutputFormat};
use querysense::store::{JsonFileStore, RosterStore};

#[derive(Parser)]
#[command(name = "querysense")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ask plain-language questions about a student roster", long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/querysense/config.toml, then ./querysense.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question, e.g. "who has the highest cgpa in cse"
    #[command(long_about = "Ask a question about the roster.\n\n\
        Understood: highest/lowest/average cgpa, marks or attendance; \
        students above/below a number; list or show all; compare departments.\n\
        A department code (CSE, ECE, MECH, IT) narrows the answer, except for \
        department comparisons, which always cover the whole roster.")]
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write the answer to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Pause before answering, in milliseconds
        #[arg(long, default_value_t = 0)]
        think_ms: u64,
    },
    /// Print the current roster
    List,
    /// Add a student
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        department: String,
        #[arg(long)]
        cgpa: Option<f64>,
        #[arg(long)]
        marks: Option<f64>,
        #[arg(long)]
        attendance: f64,
        /// Date of birth as YYYY-MM-DD
        #[arg(long)]
        dob: Option<NaiveDate>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Delete a student by id
    Delete { id: i64 },
    /// Import students from a JSON or CSV file
    Import {
        file: PathBuf,
        /// Replace the roster instead of merging into it
        #[arg(long)]
        replace: bool,
    },
    /// Export the roster to a JSON or CSV file
    Export { file: PathBuf },
    /// Restore the built-in roster
    Reset,
    /// Show recent queries
    History {
        #[arg(long)]
        clear: bool,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Print a default configuration file
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default()?,
    };
    init_logging(&config.logging);

    if let Some(source) = &config.source {
        debug!(?source, "loaded configuration");
    }

    if let Commands::Config = cli.command {
        print!("{}", config::generate_default_config());
        return Ok(());
    }

    match config.roster.metric {
        PerformanceMetric::Cgpa => run::<CgpaStudent>(cli.command, &config).await,
        PerformanceMetric::Marks => run::<MarksStudent>(cli.command, &config).await,
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("querysense={}", logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn open_store<S: StudentRecord>(config: &Config) -> anyhow::Result<Box<dyn RosterStore<S>>> {
    match config.storage.backend {
        StorageBackend::File => Ok(Box::new(JsonFileStore::<S>::in_dir(&config.data_dir()))),
        StorageBackend::Postgres => Ok(Box::new(connect_postgres::<S>(config).await?)),
    }
}

async fn connect_postgres<S: StudentRecord>(config: &Config) -> anyhow::Result<PostgresStore<S>> {
    let database_url = config
        .storage
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to use the postgres backend")?;
    PostgresStore::connect(database_url, config.storage.max_connections)
        .await
        .context("failed to connect to Postgres")
}

async fn run<S: StudentRecord>(command: Commands, config: &Config) -> anyhow::Result<()> {
    if let Commands::InitDb = command {
        return init_db::<S>(config).await;
    }

    let store = open_store::<S>(config).await?;

    match command {
        Commands::Ask {
            query,
            format,
            out,
            think_ms,
        } => {
            let query = query.join(" ");
            ask(store.as_ref(), config, &query, format, out.as_deref(), think_ms).await?;
        }
        Commands::List => {
            let roster = store.current_roster().await?;
            print!("{}", report::roster_table(&roster));
        }
        Commands::Add {
            name,
            department,
            cgpa,
            marks,
            attendance,
            dob,
            email,
        } => {
            let id = store.allocate_id().await?;
            let row = StudentRow {
                id: Some(id),
                name,
                department,
                cgpa,
                marks,
                attendance,
                date_of_birth: dob,
                email,
            };
            let student = S::from_row(row).context("invalid student")?;
            store.append(vec![student.clone()]).await?;
            println!("Added {} with id {}.", student.name(), student.id());
        }
        Commands::Delete { id } => {
            if store.delete(id).await? {
                println!("Deleted student {id}.");
            } else {
                println!("No student with id {id}.");
            }
        }
        Commands::Import { file, replace } => {
            let mode = if replace {
                ImportMode::Replace
            } else {
                ImportMode::Merge
            };
            let summary = import::import_file(store.as_ref(), &file, mode).await?;
            println!(
                "Imported {} student record(s) from {} ({} new).",
                summary.valid,
                file.display(),
                summary.added
            );
            for rejected in &summary.rejected {
                println!("- skipped record {}: {}", rejected.index + 1, rejected.reason);
            }
        }
        Commands::Export { file } => {
            let count = import::export_file(store.as_ref(), &file).await?;
            println!("Exported {count} students to {}.", file.display());
        }
        Commands::Reset => {
            let roster = store.reset().await?;
            println!("Roster reset to {} default students.", roster.len());
        }
        Commands::History { clear } => {
            let mut history = QueryHistory::load(config.history_path(), config.history.capacity);
            if clear {
                history.clear();
                history.save()?;
                println!("Query history cleared.");
            } else if history.entries().is_empty() {
                println!("No recent queries.");
            } else {
                println!("Recent queries:");
                for (index, query) in history.entries().iter().enumerate() {
                    println!("{}. {query}", index + 1);
                }
            }
        }
        Commands::InitDb | Commands::Config => {}
    }

    Ok(())
}

#[tracing::instrument(skip_all, fields(query_id = %Uuid::new_v4()))]
async fn ask<S: StudentRecord>(
    store: &dyn RosterStore<S>,
    config: &Config,
    query: &str,
    format: OutputFormat,
    out: Option<&Path>,
    think_ms: u64,
) -> anyhow::Result<()> {
    let mut history = QueryHistory::load(config.history_path(), config.history.capacity);
    history.record(query);
    if let Err(err) = history.save() {
        warn!(%err, "failed to save query history");
    }

    let roster = store
        .current_roster()
        .await
        .context("failed to load roster")?;

    if think_ms > 0 {
        tokio::time::sleep(Duration::from_millis(think_ms)).await;
    }

    let engine = QueryEngine::new().with_roster_in_comparisons(config.roster.compare_with_roster);
    let result = engine.evaluate(query, &roster);
    info!(
        roster = roster.len(),
        error = result.is_error(),
        records = result.records().len(),
        chart_rows = result.chart().len(),
        "answered query"
    );
    debug!(message = result.message(), "answer");

    let rendered = report::render(query, &result, format)?;
    match out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Answer written to {}.", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}

async fn init_db<S: StudentRecord>(config: &Config) -> anyhow::Result<()> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let store = connect_postgres::<S>(config).await?;
            store.init_db().await?;
            println!("Schema ready.");
        }
        StorageBackend::File => {
            let store = JsonFileStore::<S>::in_dir(&config.data_dir());
            let roster = store.current_roster().await?;
            println!(
                "Roster file ready at {} ({} students).",
                store.path().display(),
                roster.len()
            );
        }
    }
    Ok(())
}
