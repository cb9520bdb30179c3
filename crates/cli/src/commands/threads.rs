//! `syllabot threads`: thread management against the configured store.

use std::sync::Arc;
use syllabot_agent::{ThreadLocks, ThreadRegistry};
use syllabot_core::message::ThreadId;

use crate::ThreadsCommand;

pub async fn run(command: ThreadsCommand) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let store = syllabot_checkpoint::build_from_config(&config).await?;
    let registry = ThreadRegistry::new(store, Arc::new(ThreadLocks::new()));

    match command {
        ThreadsCommand::List => {
            let threads = registry.list_threads().await?;
            if threads.is_empty() {
                println!("No threads yet.");
            }
            for t in threads {
                println!(
                    "{}  {}  {}",
                    t.last_active.format("%Y-%m-%d %H:%M"),
                    t.thread_id,
                    t.title
                );
            }
        }
        ThreadsCommand::Show { id } => {
            for entry in registry.history(&ThreadId::from(id)).await? {
                println!("[{}] {}", entry.role.as_str(), entry.content);
                println!();
            }
        }
        ThreadsCommand::Rename { id, title } => {
            registry.rename_thread(&ThreadId::from(id.as_str()), &title).await?;
            println!("Renamed {id}");
        }
        ThreadsCommand::Delete { id } => {
            let report = registry.delete_thread(&ThreadId::from(id)).await?;
            println!("Deleted {} ({} checkpoints)", report.thread_id, report.removed);
        }
    }

    Ok(())
}
