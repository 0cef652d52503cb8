//! The collections and indexes of each schema variant.
//!
//! The variants are independent: each one is deployed on its own and there is
//! no migration path from one to another.

use super::{CollectionSpec, IndexSpec};

/// First variant: chat events and the users seen in chats.
pub fn v1() -> Vec<CollectionSpec> {
    vec![
        // Created empty, nothing indexes it.
        CollectionSpec::new("user", vec![]),
        CollectionSpec::new(
            "event",
            vec![IndexSpec::ascending(&["tg_chat_id", "user_id"], true)],
        ),
        CollectionSpec::new(
            "user_in_chat",
            vec![
                IndexSpec::ascending(&["tg_user_id"], true),
                IndexSpec::ascending(&["tg_username"], true),
            ],
        ),
    ]
}

pub fn v2() -> Vec<CollectionSpec> {
    vec![
        CollectionSpec::new(
            "users",
            vec![
                IndexSpec::ascending(&["tg_id"], true),
                IndexSpec::ascending(&["tg_username"], false),
                IndexSpec::ascending(&["created_at"], false),
            ],
        ),
        CollectionSpec::new(
            "messages",
            vec![
                IndexSpec::ascending(&["tg_chat_id", "tg_user_id"], false),
                IndexSpec::ascending(&["tg_chat_id", "tg_id"], true),
                IndexSpec::ascending(&["created_at"], false),
            ],
        ),
        CollectionSpec::new(
            "members",
            vec![IndexSpec::ascending(&["tg_chat_id", "tg_user_id"], true)],
        ),
    ]
}

pub fn v3() -> Vec<CollectionSpec> {
    vec![
        CollectionSpec::new(
            "users",
            vec![
                IndexSpec::ascending(&["tg_user_id"], true),
                IndexSpec::ascending(&["tg_username"], false),
            ],
        ),
        CollectionSpec::new(
            "messages",
            vec![IndexSpec::ascending(&["tg_chat_id", "tg_user_id"], false)],
        ),
    ]
}
