//! Channel management handlers

use crate::channels::telegram::webhook_url;
use crate::channels::ChannelDirectory;
use crate::channels::MessengerClient;
use crate::channels::TelegramClient;
use crate::cli::output::print_success;
use crate::database::Database;
use crate::models::ChannelBinding;
use crate::models::ChannelKind;
use crate::retry::build_http_client;
use crate::retry::RetryPolicy;
use crate::AppConfig;
use crate::Result;
use crate::ShopRagError;

async fn active_binding(
    config: &AppConfig,
    channel: ChannelKind,
    external_id: &str,
) -> Result<ChannelBinding> {
    let database = Database::from_config(config).await?;
    database
        .find_binding(channel, external_id)
        .await?
        .ok_or_else(|| ShopRagError::NotFound(format!("active {channel} binding {external_id}")))
}

fn telegram_client(config: &AppConfig) -> Result<TelegramClient> {
    let http = build_http_client(&config.http)?;
    Ok(TelegramClient::new(
        http,
        &config.telegram,
        RetryPolicy::from_config(&config.http),
    ))
}

fn messenger_client(config: &AppConfig) -> Result<MessengerClient> {
    let http = build_http_client(&config.http)?;
    Ok(MessengerClient::new(
        http,
        &config.messenger,
        RetryPolicy::from_config(&config.http),
    ))
}

pub async fn handle_telegram_set_webhook(config: &AppConfig, bot_id: &str) -> Result<()> {
    let public_base = config.telegram.public_base_url.as_deref().ok_or_else(|| {
        ShopRagError::ConfigError("telegram.public_base_url is required to set a webhook".to_string())
    })?;
    let binding = active_binding(config, ChannelKind::Telegram, bot_id).await?;
    let secret = binding.webhook_secret.as_deref().ok_or_else(|| {
        ShopRagError::ConfigError(format!("Telegram bot {bot_id} has no webhook secret"))
    })?;

    let url = webhook_url(public_base, secret)?;
    telegram_client(config)?
        .set_webhook(&binding.credential, &url, secret)
        .await?;
    print_success(&format!("Webhook for bot {bot_id} registered"));
    Ok(())
}

pub async fn handle_telegram_delete_webhook(config: &AppConfig, bot_id: &str) -> Result<()> {
    let binding = active_binding(config, ChannelKind::Telegram, bot_id).await?;
    telegram_client(config)?
        .delete_webhook(&binding.credential)
        .await?;
    print_success(&format!("Webhook for bot {bot_id} deleted"));
    Ok(())
}

pub async fn handle_messenger_subscribe(config: &AppConfig, page_id: &str) -> Result<()> {
    let binding = active_binding(config, ChannelKind::Messenger, page_id).await?;
    messenger_client(config)?
        .subscribe_app(page_id, &binding.credential)
        .await?;
    print_success(&format!("Page {page_id} subscribed"));
    Ok(())
}

pub async fn handle_messenger_unsubscribe(config: &AppConfig, page_id: &str) -> Result<()> {
    let binding = active_binding(config, ChannelKind::Messenger, page_id).await?;
    messenger_client(config)?
        .unsubscribe_app(page_id, &binding.credential)
        .await?;
    print_success(&format!("Page {page_id} unsubscribed"));
    Ok(())
}
