use tokio::task::JoinHandle;

use crate::db::{self, queries, Db};
use crate::models::Role;

/// Appends one user/assistant exchange to the message history off the
/// request path. Failures are logged and dropped.
pub fn record_exchange(
    db: &Db,
    conversation_id: &str,
    user_message: &str,
    assistant_message: &str,
) -> JoinHandle<()> {
    let db = db.clone();
    let conversation_id = conversation_id.to_string();
    let user_message = user_message.to_string();
    let assistant_message = assistant_message.to_string();

    tokio::task::spawn_blocking(move || {
        let result = db::lock(&db).and_then(|conn| {
            queries::append_message(&conn, &conversation_id, Role::User, &user_message)?;
            queries::append_message(&conn, &conversation_id, Role::Assistant, &assistant_message)
        });

        if let Err(e) = result {
            tracing::error!(conversation_id = %conversation_id, error = %e, "failed to record message history");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_exchange_appends_both_messages() {
        let db = db::shared(db::init_db(":memory:").unwrap());
        record_exchange(&db, "c1", "I have chest pain", "See a Cardiologist.")
            .await
            .unwrap();

        let messages = queries::get_messages(&db::lock(&db).unwrap(), "c1").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].content, "See a Cardiologist.");
    }
}
