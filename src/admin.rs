use std::io::Write;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;

use crate::db::types::{EntityRef, JobKind, TaskType};
use crate::tasks::enqueue::{enqueue_file_task, enqueue_text_task};
use crate::tasks::job::{Job, JobId};
use crate::tasks::store::{JobFilter, JobStore};

pub(crate) const USAGE: &str = "\
usage: queue_admin <command>

commands:
  list [--kind file|text] [--running|--queued] [--limit N] [--offset N]
  requeue <job_id>...
  requeue-all
  enqueue-file <entity>
  enqueue-text <response> <key> [context...] [--notes TEXT]";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    List(JobFilter),
    Requeue(Vec<JobId>),
    RequeueAll,
    EnqueueFile(EntityRef),
    EnqueueText { files: Vec<EntityRef>, notes: Option<String> },
    Help,
}

pub(crate) fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "list" => {
            let mut filter = JobFilter::default();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--kind" => {
                        let value = args.next().ok_or_else(|| anyhow!("--kind missing value"))?;
                        filter.kind = Some(value.parse::<JobKind>().map_err(|err| anyhow!(err))?);
                    }
                    "--running" => filter.running = Some(true),
                    "--queued" => filter.running = Some(false),
                    "--limit" => filter.limit = parse_number(&arg, args.next())?,
                    "--offset" => filter.offset = parse_number(&arg, args.next())?,
                    _ => bail!("Unknown argument: {arg}"),
                }
            }
            if filter.limit <= 0 || filter.offset < 0 {
                bail!("--limit must be positive and --offset non-negative");
            }
            Ok(Command::List(filter))
        }
        "requeue" => {
            let ids = args
                .map(|arg| arg.parse::<JobId>().with_context(|| format!("Invalid job id: {arg}")))
                .collect::<Result<Vec<_>>>()?;
            if ids.is_empty() {
                bail!("requeue needs at least one job id");
            }
            Ok(Command::Requeue(ids))
        }
        "requeue-all" => match args.next() {
            None => Ok(Command::RequeueAll),
            Some(arg) => bail!("Unknown argument: {arg}"),
        },
        "enqueue-file" => {
            let entity = args.next().ok_or_else(|| anyhow!("enqueue-file needs an entity"))?;
            if let Some(extra) = args.next() {
                bail!("Unknown argument: {extra}");
            }
            Ok(Command::EnqueueFile(parse_entity(&entity)?))
        }
        "enqueue-text" => {
            let mut files = Vec::new();
            let mut notes = None;
            while let Some(arg) = args.next() {
                if arg == "--notes" {
                    notes = Some(args.next().ok_or_else(|| anyhow!("--notes missing value"))?);
                } else {
                    files.push(parse_entity(&arg)?);
                }
            }
            if files.len() < 2 {
                bail!("enqueue-text needs a response and a key entity");
            }
            Ok(Command::EnqueueText { files, notes })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        _ => bail!("Unknown command: {command}"),
    }
}

fn parse_number(flag: &str, value: Option<String>) -> Result<i64> {
    let value = value.ok_or_else(|| anyhow!("{flag} missing value"))?;
    value.parse().with_context(|| format!("Invalid value for {flag}: {value}"))
}

fn parse_entity(value: &str) -> Result<EntityRef> {
    value.parse().with_context(|| format!("Invalid entity reference: {value}"))
}

pub(crate) async fn execute(
    command: Command,
    store: &dyn JobStore,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    match command {
        Command::Help => writeln!(out, "{USAGE}")?,
        Command::List(filter) => {
            let jobs = store.list(filter).await?;
            for job in &jobs {
                writeln!(out, "{}", describe(job))?;
            }
            writeln!(out, "{} job(s)", jobs.len())?;
        }
        Command::Requeue(ids) => {
            let mut missing = 0;
            for id in ids {
                if store.reset_to_queued(id).await? {
                    tracing::info!(job_id = id, "Requeued job");
                    writeln!(out, "requeued {id}")?;
                } else {
                    missing += 1;
                    writeln!(out, "job {id} not found")?;
                }
            }
            if missing > 0 {
                bail!("{missing} job(s) could not be requeued");
            }
        }
        Command::RequeueAll => {
            let count = store.reset_all_running_to_queued().await?;
            tracing::info!(count, "Requeued all running jobs");
            writeln!(out, "requeued {count} running job(s)")?;
        }
        Command::EnqueueFile(entity) => {
            let job_id = enqueue_file_task(store, TaskType::Generic, &[entity]).await?;
            writeln!(out, "enqueued file job {job_id}")?;
        }
        Command::EnqueueText { files, notes } => {
            let prompt_info = match notes {
                Some(notes) => json!({ "notes": notes }),
                None => json!({}),
            };
            let enqueued = enqueue_text_task(store, TaskType::Generic, &files, prompt_info).await?;
            writeln!(
                out,
                "enqueued text job {} (report key {})",
                enqueued.job_id, enqueued.result_key
            )?;
        }
    }

    Ok(())
}

fn describe(job: &Job) -> String {
    let refs =
        job.payload.entity_refs().iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
    format!(
        "{}\t{}\t{}\t{}\t{}",
        job.id,
        job.kind(),
        if job.running { "running" } else { "queued" },
        job.created_at,
        refs
    )
}
