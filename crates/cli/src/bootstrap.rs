//! Wires the collaborators and the stage chain together, once, at startup.

use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::prelude::*,
    tracing::info,
};

use {
    deskbot_channels::{ChatChannelFactory, IdentityResolver, StaticDirectoryResolver},
    deskbot_pipeline::{ChatContextRegistry, PipelineBuilder, ReceiverRegistry, SweepStats},
    deskbot_receivers::{ServiceDeskClient, TicketFeedbackFactory},
    deskbot_telegram::{TelegramChannelFactory, spawn_polling},
};

use crate::{config::Config, conversations::RoleConversationFactory};

pub async fn run(config: Config) -> anyhow::Result<()> {
    // Client timeout above the long-polling timeout, as getUpdates blocks.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(config.telegram.client_timeout_secs))
        .build()?;
    let bot = Bot::with_client(config.telegram.token.expose_secret(), client);

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;
    info!(username = ?me.username, "telegram bot connected (webhook cleared)");

    let registry = Arc::new(ChatContextRegistry::new());
    let channels: Arc<dyn ChatChannelFactory> = Arc::new(TelegramChannelFactory::new(bot.clone()));
    let directory = Arc::new(StaticDirectoryResolver::new(config.directory.users.clone()));
    info!(users = directory.len(), "identity directory loaded");

    let servicedesk = Arc::new(ServiceDeskClient::new(&config.servicedesk)?);
    let mut receivers = ReceiverRegistry::new();
    receivers.register(Arc::new(TicketFeedbackFactory::new(
        Arc::clone(&servicedesk),
        Arc::clone(&directory) as Arc<dyn IdentityResolver>,
    )));
    let receivers = Arc::new(receivers);
    info!(receivers = ?receivers.list(), "callback receivers registered");

    let pipeline = Arc::new(
        PipelineBuilder::new()
            .registry(Arc::clone(&registry))
            .channels(Arc::clone(&channels))
            .directory(Arc::clone(&directory) as Arc<dyn IdentityResolver>)
            .conversations(Arc::new(RoleConversationFactory))
            .receivers(receivers)
            .build()?,
    );

    let cancel = spawn_polling(bot, &config.telegram, pipeline);

    // Periodic eviction of idle chat contexts and expired redirections.
    let sweep_cancel = cancel.clone();
    let sweep_registry = Arc::clone(&registry);
    let settings = config.pipeline.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(settings.sweep_interval_secs));
        loop {
            tokio::select! {
                _ = sweep_cancel.cancelled() => break,
                _ = interval.tick() => {
                    let stats = sweep_registry.sweep(
                        Duration::from_secs(settings.context_idle_secs),
                        Duration::from_secs(settings.redirection_ttl_secs),
                    );
                    if stats != SweepStats::default() {
                        info!(
                            contexts = stats.contexts_evicted,
                            redirections = stats.redirections_evicted,
                            bindings = stats.bindings_evicted,
                            "eviction sweep"
                        );
                    }
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();
    Ok(())
}
