use super::Database;
use crate::Result;
use crate::ShopRagError;

/// pgvector refuses HNSW indexes above this many dimensions
const MAX_HNSW_DIMENSION: usize = 2000;

const REQUIRED_TABLES: [&str; 7] = [
    "tenants",
    "user_tenants",
    "facebook_pages",
    "telegram_bots",
    "bot_sessions",
    "bot_chat_messages",
    "products",
];

impl Database {
    /// Check if database schema is initialized
    /// Returns true if all required tables exist
    pub async fn is_schema_initialized(&self) -> Result<bool> {
        for table_name in REQUIRED_TABLES {
            let exists = sqlx::query_scalar::<_, bool>(
                r"
                SELECT EXISTS (
                    SELECT FROM information_schema.tables
                    WHERE table_schema = 'public'
                    AND table_name = $1
                )
                ",
            )
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                tracing::debug!("Missing required table: {}", table_name);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Verify database schema or return helpful error
    pub async fn verify_schema_or_error(&self) -> Result<()> {
        if !self.is_schema_initialized().await? {
            return Err(ShopRagError::Custom(
                "Database schema not initialized!\n\n\
                 Please run the following command to initialize the database:\n\n\
                 \x1b[1;32mshoprag init\x1b[0m"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Initialize database schema
    ///
    /// Idempotent. `dimension` sizes `products.embedding` and must match the
    /// embedding model.
    pub async fn init_schema(&self, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(ShopRagError::ConfigError(
                "embedding dimension must be positive".to_string(),
            ));
        }

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tenants (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_tenants (
                user_id UUID NOT NULL,
                tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (user_id, tenant_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS facebook_pages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL,
                tenant_id UUID REFERENCES tenants(id) ON DELETE SET NULL,
                page_id TEXT NOT NULL UNIQUE,
                page_name TEXT,
                access_token TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS telegram_bots (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL,
                tenant_id UUID REFERENCES tenants(id) ON DELETE SET NULL,
                bot_id TEXT NOT NULL UNIQUE,
                bot_username TEXT,
                bot_token TEXT NOT NULL,
                webhook_secret TEXT NOT NULL UNIQUE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS bot_sessions (
                id UUID PRIMARY KEY,
                owner_id UUID NOT NULL,
                tenant_id UUID NOT NULL,
                channel TEXT NOT NULL CHECK (channel IN ('messenger', 'telegram')),
                external_user_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_active_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (owner_id, tenant_id, channel, external_user_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS bot_chat_messages (
                id BIGSERIAL PRIMARY KEY,
                session_id UUID NOT NULL REFERENCES bot_sessions(id) ON DELETE CASCADE,
                owner_id UUID NOT NULL,
                tenant_id UUID NOT NULL,
                channel TEXT NOT NULL,
                external_user_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'bot')),
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Dimension is validated above and cannot be bound as a parameter
        let products_sql = format!(
            r"
            CREATE TABLE IF NOT EXISTS products (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                category TEXT,
                price NUMERIC(12, 2),
                currency TEXT,
                stock_quantity INTEGER,
                image_url TEXT,
                embedding VECTOR({dimension}),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "
        );
        sqlx::query(&products_sql).execute(&self.pool).await?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_user_tenants_user ON user_tenants(user_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_bot_sessions_owner ON bot_sessions(owner_id)",
            "CREATE INDEX IF NOT EXISTS idx_bot_chat_messages_session ON bot_chat_messages(session_id, id DESC)",
            "CREATE INDEX IF NOT EXISTS idx_bot_chat_messages_owner ON bot_chat_messages(owner_id)",
            "CREATE INDEX IF NOT EXISTS idx_products_tenant ON products(tenant_id)",
            "CREATE INDEX IF NOT EXISTS idx_products_missing_embedding ON products(tenant_id) WHERE embedding IS NULL",
        ];
        for statement in indexes {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        if dimension <= MAX_HNSW_DIMENSION {
            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_products_embedding ON products \
                 USING hnsw (embedding vector_cosine_ops)",
            )
            .execute(&self.pool)
            .await?;
        } else {
            tracing::warn!(
                "Embedding dimension {} exceeds HNSW limit {}, semantic search will scan",
                dimension,
                MAX_HNSW_DIMENSION
            );
        }

        tracing::info!("Database schema initialized (embedding dimension {})", dimension);
        Ok(())
    }
}
