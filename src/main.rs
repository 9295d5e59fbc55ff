use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use athena_query::config::Config;
use athena_query::error::ErrorResponse;
use athena_query::{AthenaConnection, AthenaError, Binding, QueryRequest};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Fetch and print the result rows
    Select,
    /// Run for effect only
    Statement,
    /// Print the result artifact path without downloading it
    Export,
}

/// Run SQL against Athena and print the outcome as JSON
#[derive(Debug, Parser)]
#[command(name = "athena-query", version)]
struct Cli {
    /// SQL text, `?` placeholders are filled from --bind in order
    sql: String,

    #[arg(long, value_enum, default_value = "select")]
    mode: Mode,

    /// Positional binding value (repeatable)
    #[arg(long = "bind")]
    bindings: Vec<String>,

    #[arg(long)]
    limit: Option<u64>,

    /// Needs a `ROW_NUMBER() OVER (...) AS rn` column in the statement
    #[arg(long)]
    offset: Option<u64>,

    /// Log the query without contacting Athena
    #[arg(long)]
    dry_run: bool,

    /// Print the statement that would be submitted and exit
    #[arg(long)]
    show_sql: bool,
}

impl Cli {
    fn request(&self) -> QueryRequest {
        let mut request = QueryRequest::new(self.sql.clone());
        for value in &self.bindings {
            request = request.bind(Binding::Text(value.clone()));
        }
        if let Some(limit) = self.limit {
            request = request.limit(limit);
        }
        if let Some(offset) = self.offset {
            request = request.offset(offset);
        }
        request
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli, config).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&e))?);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<String, AthenaError> {
    let cancel = CancellationToken::new();
    let mut connection = AthenaConnection::open(&config)?.with_cancellation(cancel.clone());
    if cli.dry_run {
        connection.set_pretending(true);
    }

    let request = cli.request();

    if cli.show_sql {
        return connection.prepare(request);
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the running query");
            cancel.cancel();
        }
    });

    info!("Running query in {:?} mode", cli.mode);

    let output = match cli.mode {
        Mode::Select => {
            let rows = connection.select(request).await?;
            serde_json::to_string_pretty(&rows)
                .map_err(|e| AthenaError::Internal(format!("Failed to encode rows: {}", e)))?
        }
        Mode::Statement => connection.statement(request).await?.to_string(),
        Mode::Export => connection.export(request).await?,
    };

    Ok(output)
}
