//! Unit tests for data models
//!
//! Tests parsing, serialization, and model behavior.

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::models::*;

    // ====== Channel Kind Tests ======

    #[test]
    fn test_channel_kind_round_trips_through_str() {
        for kind in [ChannelKind::Messenger, ChannelKind::Telegram] {
            assert_eq!(kind.as_str().parse::<ChannelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_channel_kind_is_rejected() {
        assert!("whatsapp".parse::<ChannelKind>().is_err());
        assert!("Messenger".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn test_channel_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ChannelKind::Telegram).unwrap();
        assert_eq!(json, "\"telegram\"");
    }

    #[test]
    fn test_channel_message_limits() {
        assert_eq!(ChannelKind::Messenger.max_message_chars(), 2000);
        assert_eq!(ChannelKind::Telegram.max_message_chars(), 4096);
    }

    // ====== Sender Role Tests ======

    #[test]
    fn test_sender_role_parsing() {
        assert_eq!("user".parse::<SenderRole>().unwrap(), SenderRole::User);
        assert_eq!("bot".parse::<SenderRole>().unwrap(), SenderRole::Bot);
        assert!("assistant".parse::<SenderRole>().is_err());
    }

    // ====== Session Tests ======

    #[test]
    fn test_session_key_round_trip() {
        let key = SessionKey {
            owner_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            channel: ChannelKind::Messenger,
            external_user_id: "psid-1".to_string(),
        };
        let session = ConversationSession::new(&key);

        assert_eq!(session.key(), key);
        assert_eq!(session.created_at, session.last_active_at);
    }

    // ====== Enhanced Query Tests ======

    #[test]
    fn test_unchanged_query() {
        let query = EnhancedQuery::unchanged("cho pon kom vetta");
        assert_eq!(query.original, query.optimized);
        assert!(!query.was_rewritten());
    }

    // ====== Product Tests ======

    #[test]
    fn test_product_embedding_text_skips_blank_fields() {
        let product = Product {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Ponchik".to_string(),
            description: Some("   ".to_string()),
            category: Some("Bakery".to_string()),
            price: None,
            currency: None,
            stock_quantity: None,
            image_url: None,
        };

        assert_eq!(product.embedding_text(), "Name: Ponchik. Category: Bakery");
    }

    // ====== Channel Binding Tests ======

    #[test]
    fn test_binding_debug_redacts_credentials() {
        let binding = ChannelBinding {
            channel: ChannelKind::Telegram,
            external_id: "123456".to_string(),
            owner_id: Uuid::new_v4(),
            tenant_id: None,
            credential: "123456:SECRET-TOKEN".to_string(),
            webhook_secret: Some("path-secret".to_string()),
            display_name: None,
        };

        let debug = format!("{binding:?}");
        assert!(!debug.contains("SECRET-TOKEN"));
        assert!(!debug.contains("path-secret"));
        assert!(debug.contains("123456"));
    }
}
