use std::collections::HashSet;

use uuid::Uuid;

use super::ChatEvent;
use crate::{db::models::Message, feed::Op};

/// One chat's messages as a client holds them.
///
/// A client sees its own writes twice, once in the response and once as the
/// feed echo. Both go through [`Timeline::apply`], keyed by message id. The two
/// paths are unordered, so a copy only replaces a row it cannot be older than:
/// a message only moves from plain to edited to deleted, and a removed id stays
/// removed.
#[derive(Debug, Default, Clone)]
pub struct Timeline {
    messages: Vec<Message>,
    removed: HashSet<Uuid>,
}

fn stage(message: &Message) -> u8 {
    match (message.is_deleted, message.is_edited) {
        (true, _) => 2,
        (false, true) => 1,
        (false, false) => 0,
    }
}

impl Timeline {
    pub fn from_history(history: Vec<Message>) -> Timeline {
        let mut timeline = Timeline::default();
        for message in history {
            timeline.apply(message);
        }
        timeline
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Insert or replace by id. Returns whether the view changed.
    pub fn apply(&mut self, message: Message) -> bool {
        if self.removed.contains(&message.id) {
            return false;
        }
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            if *existing == message || stage(&message) < stage(existing) {
                return false;
            }
            *existing = message;
            return true;
        }
        let at = self
            .messages
            .partition_point(|m| (m.created_at, m.id) <= (message.created_at, message.id));
        self.messages.insert(at, message);
        true
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        self.removed.insert(id);
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        self.messages.len() != before
    }

    pub fn apply_event(&mut self, event: &ChatEvent) -> bool {
        match event {
            ChatEvent::Message { op: Op::Delete, message } => self.remove(message.id),
            ChatEvent::Message { message, .. } => self.apply(message.clone()),
            ChatEvent::Typing { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::feed::tests::message_in;

    #[test]
    fn echo_of_own_write_is_deduplicated() {
        let chat = Uuid::now_v7();
        let mut timeline = Timeline::default();
        let sent = message_in(chat, "hi");

        assert!(timeline.apply(sent.clone()));
        let echo = ChatEvent::Message { op: Op::Insert, message: sent };
        assert!(!timeline.apply_event(&echo));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn later_copy_wins() {
        let chat = Uuid::now_v7();
        let original = message_in(chat, "tpyo");
        let mut edited = original.clone();
        edited.content = Some("typo".into());
        edited.is_edited = true;

        let mut timeline = Timeline::from_history(vec![original.clone()]);
        timeline.apply_event(&ChatEvent::Message { op: Op::Update, message: edited });
        assert_eq!(timeline.messages()[0].content.as_deref(), Some("typo"));
        assert!(timeline.messages()[0].is_edited);
    }

    #[test]
    fn a_late_response_cannot_undo_a_soft_delete() {
        let chat = Uuid::now_v7();
        let sent = message_in(chat, "secret");
        let mut deleted = sent.clone();
        deleted.content = None;
        deleted.is_deleted = true;

        let mut timeline = Timeline::default();
        timeline.apply_event(&ChatEvent::Message { op: Op::Insert, message: sent.clone() });
        timeline.apply_event(&ChatEvent::Message { op: Op::Update, message: deleted });
        assert!(!timeline.apply(sent));

        let row = &timeline.messages()[0];
        assert!(row.is_deleted);
        assert_eq!(row.content, None);
    }

    #[test]
    fn a_stale_copy_cannot_undo_an_edit_or_revive_a_removed_row() {
        let chat = Uuid::now_v7();
        let original = message_in(chat, "tpyo");
        let mut edited = original.clone();
        edited.content = Some("typo".into());
        edited.is_edited = true;

        let mut timeline = Timeline::from_history(vec![edited]);
        assert!(!timeline.apply(original.clone()));
        assert_eq!(timeline.messages()[0].content.as_deref(), Some("typo"));

        let gone = message_in(chat, "gone");
        timeline.apply(gone.clone());
        timeline.apply_event(&ChatEvent::Message { op: Op::Delete, message: gone.clone() });
        assert!(!timeline.apply(gone));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn stays_chronological_when_echoes_arrive_out_of_order() {
        let chat = Uuid::now_v7();
        let mut early = message_in(chat, "early");
        let late = message_in(chat, "late");
        early.created_at = late.created_at - Duration::seconds(5);

        let mut timeline = Timeline::default();
        timeline.apply(late);
        timeline.apply(early);
        let contents: Vec<_> = timeline.messages().iter().map(|m| m.content.as_deref().unwrap()).collect();
        assert_eq!(contents, ["early", "late"]);
    }

    #[test]
    fn delete_events_remove_and_typing_is_ignored() {
        let chat = Uuid::now_v7();
        let message = message_in(chat, "bye");
        let mut timeline = Timeline::from_history(vec![message.clone()]);
        assert!(!timeline.apply_event(&ChatEvent::Typing {
            indicator: crate::db::models::TypingIndicator {
                chat_id: chat,
                user_id: "u2".into(),
                is_typing: true,
                updated_at: message.created_at,
            },
        }));
        assert!(timeline.apply_event(&ChatEvent::Message { op: Op::Delete, message }));
        assert!(timeline.is_empty());
    }
}
