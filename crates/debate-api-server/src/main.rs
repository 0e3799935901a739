use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use debate_api_server::config::Settings;
use debate_api_server::logging::{ActivityLogger, LoggerConfig};
use debate_api_server::router::build_router;
use debate_api_server::services::{ConversationManager, LlmService};
use debate_api_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,debate_api_server=debug".to_string()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("🚀 Starting DebateBot API Server...");

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "✅ Configuration loaded (model: {}, history window: {}, unknown ids: {:?})",
        settings.llm.model,
        settings.conversation.history_window,
        settings.conversation.unknown_id_policy
    );

    let activity_logger = ActivityLogger::new(LoggerConfig::default());

    let llm_service = Arc::new(LlmService::new(settings.llm.clone())?);
    let conversation_manager = Arc::new(ConversationManager::new(
        llm_service,
        &settings,
        activity_logger,
    ));
    info!("✅ Conversation manager ready");

    spawn_cleanup(
        conversation_manager.clone(),
        settings.conversation.cleanup_interval_secs,
    );

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    let app = build_router(AppState::new(conversation_manager));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

/// Periodically drop idle conversations. An interval of 0 disables the sweep.
fn spawn_cleanup(manager: Arc<ConversationManager>, interval_secs: u64) {
    if interval_secs == 0 {
        info!("Conversation cleanup sweep disabled");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = manager.cleanup_expired();
            if removed > 0 {
                let stats = manager.stats();
                info!(
                    "Expired {} conversations ({} active, {} turns stored)",
                    removed, stats.active_conversations, stats.total_turns
                );
            }
        }
    });
}
