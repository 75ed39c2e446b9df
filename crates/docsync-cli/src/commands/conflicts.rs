use std::path::Path;

use docsync_core::models::ConflictId;
use docsync_core::Error as CoreError;
use serde_json::Value;

use crate::cli::ConflictSide;
use crate::commands::common::{
    conflict_to_list_item, format_conflict_lines, CliContext, ConflictListItem,
};
use crate::error::CliError;

pub async fn run_conflicts_list(
    ctx: &CliContext,
    document_id: &str,
    unresolved_only: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let mut conflicts = ctx.offline_sync()?.list_conflicts(document_id).await?;
    if unresolved_only {
        conflicts.retain(|conflict| !conflict.resolved);
    }

    if as_json {
        let json_items = conflicts
            .iter()
            .map(conflict_to_list_item)
            .collect::<Vec<ConflictListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded for {document_id}.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_conflicts_resolve(
    ctx: &CliContext,
    conflict_id: &str,
    content_file: Option<&Path>,
    take: Option<ConflictSide>,
) -> Result<(), CliError> {
    let conflict_id = parse_conflict_id(conflict_id)?;
    let sync = ctx.offline_sync()?;

    let content = match (content_file, take) {
        (Some(path), _) => read_content_file(path)?,
        (None, Some(side)) => {
            let conflict = sync
                .get_conflict(&conflict_id)
                .await?
                .ok_or_else(|| CoreError::ConflictNotFound(conflict_id.to_string()))?;
            match side {
                ConflictSide::Local => conflict.local_version,
                ConflictSide::Server => conflict.server_version,
            }
        }
        (None, None) => {
            return Err(CliError::Config(
                "pass --content-file or --take to choose the resolved content".to_string(),
            ));
        }
    };

    let document = sync.resolve_conflict(&conflict_id, content).await?;
    println!(
        "Resolved {conflict_id}; cached content of {} updated",
        document.document_id
    );
    Ok(())
}

pub fn parse_conflict_id(raw: &str) -> Result<ConflictId, CliError> {
    raw.trim()
        .parse::<ConflictId>()
        .map_err(|_| CliError::InvalidConflictId(raw.to_string()))
}

/// Read resolved content as JSON from a file.
pub fn read_content_file(path: &Path) -> Result<Value, CliError> {
    let payload = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&payload)?)
}
