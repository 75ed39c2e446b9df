use crate::commands::common::{format_session_lines, now_millis, CliContext};
use crate::error::CliError;

pub async fn run_sessions_list(
    ctx: &CliContext,
    document_id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let sessions = ctx.sessions()?.list_sessions(document_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions recorded for {document_id}.");
        return Ok(());
    }

    for line in format_session_lines(&sessions, now_millis(), ctx.liveness_window_millis()) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sessions_prune(ctx: &CliContext, document_id: &str) -> Result<(), CliError> {
    let removed = ctx.sessions()?.prune_stale_sessions(document_id).await?;
    println!("Pruned {removed} stale sessions on {document_id}");
    Ok(())
}
