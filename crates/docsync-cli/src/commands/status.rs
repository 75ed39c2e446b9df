use serde::Serialize;

use crate::commands::common::CliContext;
use crate::error::CliError;

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub documents: usize,
    pub unsynced_documents: usize,
    pub queued_changes: usize,
    pub open_conflicts: usize,
}

pub async fn collect_status(ctx: &CliContext) -> Result<StatusReport, CliError> {
    let sync = ctx.offline_sync()?;
    let documents = sync.documents_modified_since(i64::MIN).await?;

    Ok(StatusReport {
        db_path: ctx.db_path().display().to_string(),
        documents: documents.len(),
        unsynced_documents: documents
            .iter()
            .filter(|document| !document.is_synced())
            .count(),
        queued_changes: sync.pending_changes().await?.len(),
        open_conflicts: sync.open_conflicts().await?.len(),
    })
}

pub async fn run_status(ctx: &CliContext, as_json: bool) -> Result<(), CliError> {
    let report = collect_status(ctx).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Store:            {}", report.db_path);
    println!(
        "Documents:        {} ({} unsynced)",
        report.documents, report.unsynced_documents
    );
    println!("Queued changes:   {}", report.queued_changes);
    println!("Open conflicts:   {}", report.open_conflicts);
    Ok(())
}
