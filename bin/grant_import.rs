use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Arg, ArgMatches, Command};
use grant_csv_import::{
    logging, ImportEngine, ImportLimit, ImportSession, ImporterConfig, JsonFileRepository,
    UploadedFile, Workflow,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn cli() -> Command {
    Command::new("grant-import")
        .about("Import grant awards and project directors from CSV")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("TOML settings file"),
        )
        .arg(
            Arg::new("state-dir")
                .long("state-dir")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .default_value(".grant-import")
                .help("Where the staged session and the record store are kept"),
        )
        .subcommand(
            Command::new("upload")
                .about("Validate a CSV file and stage it for import")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("category")
                        .long("category")
                        .required(true)
                        .help("Group program slug, e.g. gpe"),
                )
                .arg(
                    Arg::new("content-encoding")
                        .long("content-encoding")
                        .default_value("")
                        .help("gzip or zstd when the file is compressed"),
                ),
        )
        .subcommand(Command::new("preview").about("Show how the first staged rows map"))
        .subcommand(
            Command::new("execute").about("Import staged rows").arg(
                Arg::new("limit")
                    .long("limit")
                    .value_parser(["1", "5", "all"])
                    .default_value("1"),
            ),
        )
        .subcommand(Command::new("status").about("Show what is staged"))
        .subcommand(Command::new("clear").about("Discard everything staged"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let config = ImporterConfig::load_or_default(
        matches.get_one::<PathBuf>("config").map(PathBuf::as_path),
    )?;
    logging::init(&config.log);

    let state_dir = matches
        .get_one::<PathBuf>("state-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(".grant-import"));
    let session_path = state_dir.join("session.json");

    let now = Utc::now();
    let mut session = ImportSession::load_or_default(&session_path).await;
    session.purge_expired(now);

    let workflow = Workflow::new(config)?;
    let result = dispatch(&matches, &workflow, &mut session, &state_dir, now).await;

    session
        .save(&session_path)
        .await
        .with_context(|| format!("writing {}", session_path.display()))?;
    result
}

async fn dispatch(
    matches: &ArgMatches,
    workflow: &Workflow,
    session: &mut ImportSession,
    state_dir: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("upload", sub)) => {
            let path = sub.get_one::<PathBuf>("file").context("--file is required")?;
            let category = sub.get_one::<String>("category").context("--category is required")?;
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let file = UploadedFile {
                name,
                content_encoding: sub
                    .get_one::<String>("content-encoding")
                    .cloned()
                    .unwrap_or_default(),
                data: data.into(),
            };
            let receipt = workflow.upload(session, file, category, now).await?;
            println!("{}", receipt.message());
        }
        Some(("preview", _)) => {
            let preview = workflow.preview(session, now)?;
            println!(
                "file={} category={} rows={}",
                preview.csv_file.as_deref().unwrap_or("(unknown)"),
                preview.category,
                preview.total_rows
            );
            println!("columns: {}", preview.columns.join(", "));
            for (i, row) in preview.rows.iter().enumerate() {
                println!(
                    "{:>3}  {} | {} | {}, {} | {} - {} | {} <{}> {}{}",
                    i + 1,
                    row.grant_number,
                    row.organization,
                    row.city,
                    row.state,
                    row.start_date,
                    row.end_date,
                    row.contact_name,
                    row.contact_email,
                    row.contact_phone,
                    row.contact_phone_extension
                        .as_deref()
                        .map(|e| format!(" ext. {e}"))
                        .unwrap_or_default(),
                );
            }
        }
        Some(("execute", sub)) => {
            let limit: ImportLimit = sub
                .get_one::<String>("limit")
                .map(String::as_str)
                .unwrap_or("1")
                .parse()?;
            let repo = Arc::new(JsonFileRepository::open(state_dir.join("records.json")).await?);
            let engine = ImportEngine::shared(repo);
            workflow.execute(session, &engine, limit, now).await?;
            if let Some(summary) = workflow.take_results(session, now) {
                println!("{summary}");
            }
        }
        Some(("status", _)) => match session.batch(now) {
            Some(batch) => println!(
                "staged: file={} category={} rows={}",
                session.csv_file(now).unwrap_or("(unknown)"),
                batch.category,
                batch.len()
            ),
            None => println!("nothing staged"),
        },
        Some(("clear", _)) => println!("{}", workflow.clear(session)),
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}
