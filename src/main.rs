use clap::Parser;
use shoprag::cli::*;
use shoprag::config::AppConfig;
use shoprag::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_layered(path)?,
        None => AppConfig::load()?,
    };

    // Initialize logging
    if cli.verbose {
        shoprag::logging::init_logging_with_level("debug")?;
    } else {
        shoprag::logging::init_logging_with_config(Some(&config))?;
    }

    config.validate()?;
    info!("Configuration loaded successfully");

    // Execute the requested command
    match cli.command {
        Commands::Init { force } => handle_init_command(&config, force).await?,
        Commands::Serve {
            host,
            port,
            ephemeral_memory,
        } => handle_serve_command(config, host, port, ephemeral_memory).await?,
        Commands::Ask {
            question,
            tenants,
            context,
        } => handle_ask_command(&config, &question, &tenants, context.as_deref()).await?,
        Commands::Memory(MemoryCommands::Clear { owner }) => {
            handle_memory_clear(&config, owner).await?;
        }
        Commands::Telegram(TelegramCommands::SetWebhook { bot_id }) => {
            handle_telegram_set_webhook(&config, &bot_id).await?;
        }
        Commands::Telegram(TelegramCommands::DeleteWebhook { bot_id }) => {
            handle_telegram_delete_webhook(&config, &bot_id).await?;
        }
        Commands::Messenger(MessengerCommands::Subscribe { page_id }) => {
            handle_messenger_subscribe(&config, &page_id).await?;
        }
        Commands::Messenger(MessengerCommands::Unsubscribe { page_id }) => {
            handle_messenger_unsubscribe(&config, &page_id).await?;
        }
        Commands::Embed { text, image } => {
            handle_embed_command(&config, text.as_deref(), image.as_deref()).await?;
        }
        Commands::Backfill { tenant, batch_size } => {
            handle_backfill_command(&config, tenant, batch_size).await?;
        }
    }

    Ok(())
}
