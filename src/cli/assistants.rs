//! `assistants list` and `assistants delete` handlers.

use anyhow::{Context, Result};
use colored::Colorize;

use super::AssistantsAction;
use crate::transport::SessionTransport;

/// Dispatches an assistants subcommand to its handler.
pub async fn handle_assistants(
    transport: &dyn SessionTransport,
    action: AssistantsAction,
) -> Result<()> {
    match action {
        AssistantsAction::List => {
            let assistants = transport.list_assistants().await?;
            if assistants.is_empty() {
                println!("{}", "No assistants found.".dimmed());
                return Ok(());
            }
            println!("{}", "Assistants:".bold());
            for a in &assistants {
                println!(
                    "  {}  {}  {}",
                    a.id.yellow(),
                    a.name.as_deref().unwrap_or("(unnamed)"),
                    a.model.dimmed(),
                );
            }
        }
        AssistantsAction::Delete { all: true, .. } => {
            let deleted = delete_all(transport).await?;
            println!("Deleted {} assistant(s).", deleted);
        }
        AssistantsAction::Delete { id, all: false } => {
            let id = id.context("An assistant id or --all is required")?;
            transport
                .delete_assistant(&id)
                .await
                .with_context(|| format!("Failed to delete assistant {id}"))?;
            println!("Deleted assistant {}", id.yellow());
        }
    }
    Ok(())
}

/// Deletes every listed assistant, returning how many were removed.
async fn delete_all(transport: &dyn SessionTransport) -> Result<usize> {
    let assistants = transport.list_assistants().await?;
    for a in &assistants {
        transport
            .delete_assistant(&a.id)
            .await
            .with_context(|| format!("Failed to delete assistant {}", a.id))?;
        tracing::info!(assistant_id = %a.id, "assistant deleted");
    }
    Ok(assistants.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    #[tokio::test]
    async fn test_delete_all_removes_listed_assistants() {
        let transport = ScriptedTransport::default();
        let deleted = delete_all(&transport).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(transport.log.lock().unwrap().deleted, vec!["asst_1"]);
    }

    #[tokio::test]
    async fn test_delete_one_by_id() {
        let transport = ScriptedTransport::default();
        let action = AssistantsAction::Delete {
            id: Some("asst_9".into()),
            all: false,
        };
        handle_assistants(&transport, action).await.unwrap();
        assert_eq!(transport.log.lock().unwrap().deleted, vec!["asst_9"]);
    }
}
