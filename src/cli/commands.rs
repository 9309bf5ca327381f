//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "shoprag")]
#[command(about = "Multi-tenant RAG chatbot backend for Messenger and Telegram shops")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: configured level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (default: config.toml, then config.example.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database schema and indexes
    Init {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Start the webhook and operator API server
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,
        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep conversations in process memory instead of PostgreSQL
        #[arg(long)]
        ephemeral_memory: bool,
    },
    /// Answer a question from one or more tenants' catalogs
    Ask {
        /// The customer question
        question: String,
        /// Tenant id (repeatable)
        #[arg(short, long = "tenant", required = true)]
        tenants: Vec<Uuid>,
        /// Prior conversation as `user: …` / `bot: …` lines
        #[arg(long)]
        context: Option<String>,
    },
    /// Conversation memory commands
    #[command(subcommand)]
    Memory(MemoryCommands),
    /// Telegram bot webhook management
    #[command(subcommand)]
    Telegram(TelegramCommands),
    /// Messenger page subscription management
    #[command(subcommand)]
    Messenger(MessengerCommands),
    /// Embed text and/or an image and report the vector
    Embed {
        /// Text to embed
        #[arg(short, long)]
        text: Option<String>,
        /// Image file to embed (multimodal providers only)
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Generate embeddings for products that have none
    Backfill {
        /// Only this tenant's products
        #[arg(long)]
        tenant: Option<Uuid>,
        /// Products per embedding request
        #[arg(short, long, default_value = "50")]
        batch_size: usize,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Delete all sessions and messages of a dashboard user
    Clear {
        /// Owner (dashboard user) id
        #[arg(long)]
        owner: Uuid,
    },
}

#[derive(Subcommand)]
pub enum TelegramCommands {
    /// Register the bot's webhook at telegram.public_base_url
    SetWebhook {
        /// Bot id as stored in telegram_bots.bot_id
        bot_id: String,
    },
    /// Remove the bot's webhook
    DeleteWebhook {
        /// Bot id as stored in telegram_bots.bot_id
        bot_id: String,
    },
}

#[derive(Subcommand)]
pub enum MessengerCommands {
    /// Subscribe the app to a page's message events
    Subscribe {
        /// Facebook page id
        page_id: String,
    },
    /// Remove the app's page subscription
    Unsubscribe {
        /// Facebook page id
        page_id: String,
    },
}
