use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Cell, Table as ComfyTable};
use shardexec::{
    ContextId, ExecuteResponse, ExecuteWorker, ExecutionRequest, MemoryBackend, ProxyConfig,
    ResourceStrategy, ResourceTracker, StatementClass,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Shardexec - runs one routed statement against a scripted backend
#[derive(Parser, Debug)]
#[command(name = "shardexec")]
#[command(about = "Execute a routed SQL statement against a fixture backend", long_about = None)]
struct Args {
    /// JSON fixture mapping SQL text to backend outcomes
    #[arg(short, long)]
    fixture: PathBuf,

    /// Statement to execute
    #[arg(short, long)]
    sql: String,

    /// Statement class assigned by the routing layer
    #[arg(short, long, value_enum, default_value_t = ClassArg::Query)]
    class: ClassArg,

    /// Resource strategy (memory | connection), overrides configuration
    #[arg(long)]
    strategy: Option<ResourceStrategy>,

    /// Capture generated keys for updates (true | false), overrides configuration
    #[arg(short = 'k', long, value_name = "BOOL")]
    generated_keys: Option<bool>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClassArg {
    Query,
    Update,
    Generic,
}

impl From<ClassArg> for StatementClass {
    fn from(class: ClassArg) -> Self {
        match class {
            ClassArg::Query => Self::Query,
            ClassArg::Update => Self::Update,
            ClassArg::Generic => Self::Generic,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Приоритет: CLI > ENV > файл > значения по умолчанию
    let mut config = ProxyConfig::load(args.config.as_deref())?;
    config.apply_overrides(args.strategy, args.generated_keys);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let backend = MemoryBackend::from_json(&std::fs::read_to_string(&args.fixture)?)?;
    info!(
        fixture = %args.fixture.display(),
        strategy = %config.resource_strategy,
        "backend fixture loaded"
    );

    let request = ExecutionRequest::new(&args.sql, args.class.into(), Box::new(backend.statement()))
        .with_strategy(config.resource_strategy)
        .with_generated_keys(config.return_generated_keys);

    let mut tracker = ResourceTracker::new();
    let context = ContextId::new(1);
    let response = ExecuteWorker::new(&mut tracker, context).execute(request)?;

    match response {
        ExecuteResponse::Query(mut query) => {
            let mut table = ComfyTable::new();
            table.load_preset(UTF8_FULL);
            table.set_header(query.header.columns.iter().map(|c| Cell::new(&c.name)));

            let columns = query.column_count();
            let mut rows = 0;
            while let Some(row) = query.rows.next_row(&mut tracker, columns)? {
                table.add_row(row.iter().map(|v| Cell::new(v.to_string())));
                rows += 1;
            }
            println!("{table}");
            println!("({rows} rows)");
        }
        ExecuteResponse::Update(ok) => {
            println!(
                "OK: {} row(s) affected, last insert id {}",
                ok.affected_rows, ok.last_insert_id
            );
        }
    }

    let released = tracker.release_all(context);
    info!(released, "execution context released");
    Ok(())
}
