//! Manual long-polling loop feeding the update pipeline.

use std::sync::Arc;

use {
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, UpdateKind as TgUpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    deskbot_common::{
        CallbackQuery, ChatId, IncomingMessage, MessageHandle, Update, UpdateKind, UserId,
    },
    deskbot_pipeline::UpdatePipeline,
};

use crate::config::TelegramConfig;

/// Map one teloxide update into the pipeline's wire type.
///
/// The transport update id becomes the sequence number. Updates without a
/// usable payload (no text, no callback data, inaccessible origin) map to
/// `None` and are skipped.
pub fn map_update(update: &teloxide::types::Update) -> Option<Update> {
    let seq = i64::from(update.id.0);
    match &update.kind {
        TgUpdateKind::Message(message) => {
            let from = message.from.as_ref()?;
            let text = message.text()?.to_string();
            Some(Update {
                chat: ChatId(message.chat.id.0),
                from: UserId(from.id.0),
                seq,
                kind: UpdateKind::Message(IncomingMessage {
                    text,
                    reply_to: message.reply_to_message().map(|m| MessageHandle(m.id.0)),
                }),
            })
        },
        TgUpdateKind::CallbackQuery(query) => {
            let data = query.data.clone()?;
            let origin = query.message.as_ref()?;
            Some(Update {
                chat: ChatId(origin.chat().id.0),
                from: UserId(query.from.id.0),
                seq,
                kind: UpdateKind::CallbackQuery(CallbackQuery {
                    token: query.id.to_string(),
                    data,
                    message: Some(MessageHandle(origin.id().0)),
                }),
            })
        },
        _ => None,
    }
}

/// Start polling for updates. Each mapped update runs on its own worker
/// task; ordering and mutual exclusion per chat are the pipeline's job.
///
/// Returns a token that stops the loop when cancelled.
pub fn spawn_polling(
    bot: Bot,
    config: &TelegramConfig,
    pipeline: Arc<UpdatePipeline>,
) -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let poll_timeout = config.poll_timeout_secs;

    tokio::spawn(async move {
        info!("starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            if cancel_clone.is_cancelled() {
                info!("telegram polling stopped");
                break;
            }

            let result = bot
                .get_updates()
                .offset(offset)
                .timeout(poll_timeout)
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
                .await;

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for tg_update in updates {
                        offset = tg_update.id.as_offset();
                        let callback_id = match &tg_update.kind {
                            TgUpdateKind::CallbackQuery(query) => Some(query.id.clone()),
                            _ => None,
                        };
                        let Some(update) = map_update(&tg_update) else {
                            debug!(update_id = tg_update.id.0, "skipping unmapped update");
                            continue;
                        };

                        let pipeline = Arc::clone(&pipeline);
                        let bot = bot.clone();
                        tokio::spawn(async move {
                            let chat = update.chat;
                            let seq = update.seq;
                            match pipeline.handle(update).await {
                                Ok(outcome) => {
                                    debug!(%chat, seq, ?outcome, "update handled");
                                },
                                Err(error) => {
                                    warn!(%chat, seq, %error, "update handling failed");
                                },
                            }
                            // Dismiss the client-side spinner either way.
                            if let Some(id) = callback_id
                                && let Err(error) = bot.answer_callback_query(id).await
                            {
                                debug!(%chat, %error, "failed to answer callback query");
                            }
                        });
                    }
                },
                Err(e) => {
                    // Another instance polling with the same token is fatal.
                    if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                        warn!("telegram polling disabled: another instance uses this token");
                        cancel_clone.cancel();
                        break;
                    }
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                },
            }
        }
    });

    cancel
}
