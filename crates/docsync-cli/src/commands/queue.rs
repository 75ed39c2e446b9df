use crate::commands::common::{change_to_list_item, format_change_lines, ChangeListItem, CliContext};
use crate::error::CliError;

pub async fn run_queue_list(
    ctx: &CliContext,
    document_id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let changes = ctx.offline_sync()?.get_queued_changes(document_id).await?;

    if as_json {
        let json_items = changes
            .iter()
            .map(change_to_list_item)
            .collect::<Vec<ChangeListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if changes.is_empty() {
        println!("No queued changes for {document_id}.");
        return Ok(());
    }

    for line in format_change_lines(&changes) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_queue_clear(ctx: &CliContext, document_id: &str) -> Result<(), CliError> {
    let removed = ctx.offline_sync()?.clear_queued_changes(document_id).await?;
    println!("Dropped {removed} queued changes for {document_id}");
    Ok(())
}
