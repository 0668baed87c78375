use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use tracing::{debug, info};

use cellar_engine::{CellEngine, CellRecord};
use cellar_protocol::{body_from_text, format_timestamp, CellResponse, NamespacesResponse};
use cellar_server::{CellarServer, ServerConfig};
use cellar_store::{CellRepository, FileCellRepository, FileRepositoryConfig};
use cellar_types::Namespace;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    match cli.command {
        Command::Serve(ref args) => {
            let mut config = ServerConfig::load(args.config.as_deref())?;
            if let Some(bind) = args.bind {
                config.bind_addr = bind;
            }
            if let Some(dir) = &cli.data_dir {
                config.storage.data_dir = dir.clone();
            }
            let level = if cli.verbose { "debug" } else { config.log_level.as_str() };
            crate::init_tracing(level);
            runtime.block_on(CellarServer::new(config).serve())?;
            Ok(())
        }
        _ => {
            crate::init_tracing(if cli.verbose { "debug" } else { "warn" });
            let repo = Arc::new(open_repository(&cli.data_dir())?);
            let output = runtime.block_on(execute(repo, &cli))?;
            println!("{output}");
            Ok(())
        }
    }
}

fn open_repository(data_dir: &Path) -> anyhow::Result<FileCellRepository> {
    debug!(data_dir = %data_dir.display(), "opening repository");
    FileCellRepository::open(data_dir, FileRepositoryConfig::default())
        .with_context(|| format!("cannot open data directory {}", data_dir.display()))
}

/// Run a storage command and render its result.
async fn execute(repo: Arc<FileCellRepository>, cli: &Cli) -> anyhow::Result<String> {
    let format = cli.format;
    match &cli.command {
        Command::Put(args) => {
            let record = cmd_put(CellEngine::new(repo), args).await?;
            render_record(&record, format)
        }
        Command::Get(args) => {
            let record = CellEngine::new(repo)
                .get_exact(&args.namespace, &args.row, &args.column, args.ref_key)
                .await?;
            render_record(&record, format)
        }
        Command::Latest(args) => {
            let record = CellEngine::new(repo)
                .get_latest(&args.namespace, &args.row, &args.column)
                .await?;
            render_record(&record, format)
        }
        Command::Namespace(args) => match &args.action {
            NamespaceAction::Create { name } => {
                let namespace = Namespace::new(name.as_str())?;
                let created = repo.create_namespace(&namespace).await?;
                debug!(%namespace, created, "namespace create");
                Ok(match (format, created) {
                    (OutputFormat::Json, _) => {
                        serde_json::json!({ "namespace": name, "created": created }).to_string()
                    }
                    (OutputFormat::Text, true) => {
                        format!("{} Created namespace {}", "✓".green().bold(), name.yellow())
                    }
                    (OutputFormat::Text, false) => {
                        format!("Namespace {} already exists", name.yellow())
                    }
                })
            }
            NamespaceAction::List => {
                let namespaces = repo.namespaces().await?;
                let names: Vec<String> = namespaces.iter().map(|ns| ns.as_str().to_string()).collect();
                match format {
                    OutputFormat::Json => Ok(serde_json::to_string_pretty(&NamespacesResponse {
                        namespaces: names,
                    })?),
                    OutputFormat::Text if names.is_empty() => Ok("No namespaces.".into()),
                    OutputFormat::Text => Ok(names.join("\n")),
                }
            }
        },
        Command::Serve(_) => anyhow::bail!("serve does not run against a local data directory"),
    }
}

async fn cmd_put(engine: CellEngine, args: &PutArgs) -> anyhow::Result<CellRecord> {
    let body = body_from_text(&args.body)?;
    let row = args
        .row
        .clone()
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    let record = engine.put(&args.namespace, &row, &args.column, &body).await?;
    info!(
        namespace = %args.namespace,
        row_key = %row,
        column_key = %args.column,
        ref_key = record.version.ref_key.get(),
        "version written"
    );
    Ok(record)
}

fn render_record(record: &CellRecord, format: OutputFormat) -> anyhow::Result<String> {
    let response = CellResponse::from_record(record)?;
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&response)?),
        OutputFormat::Text => {
            let version = &record.version;
            Ok(format!(
                "{} {}/{}  {}\n  added_id: {}\n  created:  {}\n  body:     {}",
                format!("r#{}", version.ref_key).yellow().bold(),
                version.row_key.as_str().bold(),
                version.column_key.as_str().cyan(),
                format!("({} bytes)", version.body_len()).dimmed(),
                version.added_id,
                format_timestamp(&version.created_at),
                response.body,
            ))
        }
    }
}
