use crate::commands::common::{
    document_to_list_item, format_document_lines, now_millis, CliContext, DocumentListItem,
};
use crate::error::CliError;

pub async fn run_cache_show(
    ctx: &CliContext,
    document_id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let document = ctx
        .offline_sync()?
        .get_cached_document(document_id)
        .await?
        .ok_or_else(|| CliError::DocumentNotFound(document_id.to_string()))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        let item = document_to_list_item(&document);
        println!("Document:       {}", item.document_id);
        println!("Last modified:  {}", item.last_modified_iso);
        println!("Synced:         {}", if item.synced { "yes" } else { "no" });
        println!();
        println!("{}", serde_json::to_string_pretty(&document.content)?);
    }
    Ok(())
}

pub async fn run_cache_list(
    ctx: &CliContext,
    since: Option<i64>,
    unsynced_only: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let sync = ctx.offline_sync()?;
    let mut documents = sync
        .documents_modified_since(since.unwrap_or(i64::MIN))
        .await?;
    if unsynced_only {
        documents.retain(|document| !document.is_synced());
    }

    if as_json {
        let json_items = documents
            .iter()
            .map(document_to_list_item)
            .collect::<Vec<DocumentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if documents.is_empty() {
        println!("No cached documents.");
        return Ok(());
    }

    for line in format_document_lines(&documents, now_millis()) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_cache_clear(ctx: &CliContext, document_id: &str) -> Result<(), CliError> {
    let removed = ctx.offline_sync()?.clear_document_cache(document_id).await?;
    println!("Removed {removed} records for {document_id}");
    Ok(())
}
