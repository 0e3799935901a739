use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use debate_api_server::config::Settings;
use debate_api_server::logging::{ActivityLogger, LoggerConfig};
use debate_api_server::services::conversation::retention::windowed;
use debate_api_server::services::conversation::{
    ConversationId, ConversationManager, Side, Turn, TurnRequest,
};
use debate_api_server::services::LlmService;

#[derive(Parser, Debug)]
#[command(
    name = "debate-cli",
    version,
    about = "DebateBot - argue a position from the terminal"
)]
struct Args {
    /// Debate topic. Inferred from the first message when neither topic nor side is set.
    #[arg(long)]
    topic: Option<String>,

    /// Side the bot argues: pro or con
    #[arg(long)]
    side: Option<Side>,

    /// Number of recent turns shown by /history
    #[arg(long)]
    window: Option<usize>,
}

const HELP: &str = "Commands: /history, /reset, /quit. Anything else is sent as your argument.";

fn print_turns(turns: &[Turn]) {
    for turn in turns {
        println!("[{}] {}", turn.role.as_str(), turn.text);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut settings = Settings::load()?;
    if let Some(window) = args.window {
        settings.conversation.history_window = window;
    }

    let llm_service = Arc::new(LlmService::new(settings.llm.clone())?);
    let manager = ConversationManager::new(
        llm_service,
        &settings,
        ActivityLogger::new(LoggerConfig::default()),
    );

    println!("{}", HELP);

    let mut conversation: Option<ConversationId> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                conversation = None;
                println!("Started a new conversation.");
                continue;
            }
            "/history" => {
                match conversation.as_ref().map(|id| manager.conversation(id)) {
                    Some(Err(e)) => eprintln!("error: {}", e),
                    Some(Ok(snapshot)) => {
                        println!(
                            "Topic: {} | Side: {}",
                            snapshot.parameters.topic_or_placeholder(),
                            snapshot.parameters.side
                        );
                        print_turns(windowed(&snapshot.turns, manager.history_window()));
                    }
                    None => println!("No conversation yet."),
                }
                continue;
            }
            _ => {}
        }

        let request = match &conversation {
            Some(id) => TurnRequest::new(line).in_conversation(id.clone()),
            None => TurnRequest {
                topic: args.topic.clone(),
                side: args.side,
                ..TurnRequest::new(line)
            },
        };

        let outcome = match manager.handle_turn(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("error: {}", e);
                continue;
            }
        };

        if conversation.is_none() {
            println!(
                "[conversation {} | topic: {} | side: {}]",
                outcome.conversation_id,
                outcome.parameters.topic_or_placeholder(),
                outcome.parameters.side
            );
        }
        debug!("{} turns in window", outcome.history.len());

        if let Some(reply) = outcome.history.last() {
            let marker = if outcome.reply.is_degraded() { " (degraded)" } else { "" };
            println!("bot{}: {}", marker, reply.text);
        }
        conversation = Some(outcome.conversation_id);
    }

    Ok(())
}
