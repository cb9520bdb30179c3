//! `syllabot ask`: run one turn and stream the answer to stdout.

use std::io::Write;
use std::sync::Arc;
use syllabot_agent::{ConversationEngine, TurnEvent, TurnRequest};
use syllabot_core::message::ThreadId;
use syllabot_core::retrieval::Scope;

pub async fn run(
    thread: Option<String>,
    semester: u8,
    subject: String,
    unit: u8,
    message: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!("No API key configured. Set OPENAI_API_KEY or add api_key to");
        eprintln!("  {}", syllabot_config::AppConfig::config_dir().join("config.toml").display());
        return Err("missing API key".into());
    }

    let engine = Arc::new(ConversationEngine::from_config(&config).await?);
    let thread_id = thread.map(ThreadId::from).unwrap_or_default();
    let request = TurnRequest::new(thread_id, message, Scope::new(semester, subject, unit));
    request.validate()?;

    let mut rx = engine.run_turn(request);
    let mut stdout = std::io::stdout();

    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::Token { content } => {
                write!(stdout, "{content}")?;
                stdout.flush()?;
            }
            TurnEvent::Done {
                thread_id,
                title,
                summarized,
                message_count,
            } => {
                writeln!(stdout)?;
                eprintln!();
                eprintln!("  thread:   {thread_id}");
                if let Some(title) = title {
                    eprintln!("  title:    {title}");
                }
                eprintln!("  messages: {message_count}{}", if summarized { " (summarized)" } else { "" });
            }
            TurnEvent::Failed {
                kind,
                message,
                incomplete,
            } => {
                writeln!(stdout)?;
                if incomplete {
                    eprintln!("  [answer incomplete]");
                }
                return Err(format!("{kind}: {message}").into());
            }
        }
    }

    Ok(())
}
