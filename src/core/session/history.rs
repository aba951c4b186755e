//! Replay of prior conversation turns into a fresh upstream link.

use tracing::{debug, warn};

use super::transcript::{HistoryEntry, Role};
use crate::core::realtime::openai::{ClientEvent, ConversationItem};
use crate::core::realtime::{RealtimeResult, UpstreamConnection};

/// Send one `conversation.item.create` per user or assistant entry, in order.
///
/// Entries with any other role are skipped. Without a link this only warns.
/// Returns the number of items sent.
pub async fn inject_history(
    upstream: Option<&dyn UpstreamConnection>,
    history: &[HistoryEntry],
) -> RealtimeResult<usize> {
    let Some(upstream) = upstream else {
        warn!(entries = history.len(), "No upstream link, skipping history injection");
        return Ok(0);
    };

    let mut injected = 0;
    for entry in history {
        let Some(role) = Role::parse(&entry.role) else {
            debug!(role = %entry.role, "Skipping non-conversational history entry");
            continue;
        };
        let item = ConversationItem::text_message(role.as_str(), entry.content.clone());
        upstream
            .send(ClientEvent::ConversationItemCreate { item })
            .await?;
        injected += 1;
    }

    if injected > 0 {
        debug!(injected, "Injected conversation history");
    }
    Ok(injected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::testing::RecordingUpstream;

    #[tokio::test]
    async fn test_skips_other_roles() {
        let upstream = RecordingUpstream::default();
        let history = vec![
            HistoryEntry::new("user", "Hi"),
            HistoryEntry::new("system", "X"),
            HistoryEntry::new("assistant", "Hello"),
        ];

        let injected = inject_history(Some(&upstream), &history).await.unwrap();
        assert_eq!(injected, 2);

        let sent = upstream.sent();
        assert_eq!(
            sent,
            vec![
                ClientEvent::ConversationItemCreate {
                    item: ConversationItem::text_message("user", "Hi"),
                },
                ClientEvent::ConversationItemCreate {
                    item: ConversationItem::text_message("assistant", "Hello"),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_without_upstream_is_noop() {
        let history = vec![HistoryEntry::new("user", "Hi")];
        assert_eq!(inject_history(None, &history).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let upstream = RecordingUpstream::failing();
        let history = vec![HistoryEntry::new("user", "Hi")];
        assert!(inject_history(Some(&upstream), &history).await.is_err());
    }
}
