use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Conversation, Message, User};

/// Outcome of installing a freshly fetched conversation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutcome {
    Installed,
    /// The server returned no conversations; the caller must create one
    /// rather than leave the user without a conversation.
    NeedsConversation,
}

/// Ticket for an in-flight send. The generation counter replaces the timer
/// hack the web client used: a completion can only clear the ticket it
/// opened, so a background refresh can always tell whether a send for a
/// given conversation is still pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTicket {
    pub conversation_id: String,
    pub generation: u64,
}

/// Client-side session state: the cached user, the conversation list in
/// most-recently-updated-first order, the current selection, and the
/// in-flight send ticket.
///
/// Selection is held as an id, never as a copy of the conversation, so a
/// list refresh re-resolves it implicitly. All mutations swap whole values
/// (new list, new conversation) rather than editing in place.
#[derive(Default)]
pub struct Session {
    user: Option<User>,
    conversations: Vec<Conversation>,
    selected: Option<String>,
    in_flight: Option<SendTicket>,
    next_generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Install or clear the authenticated user. Clearing also drops the
    /// conversation list and selection, matching logout semantics.
    pub fn set_user(&mut self, user: Option<User>) {
        if user.is_none() {
            self.conversations = Vec::new();
            self.selected = None;
        }
        self.user = user;
    }

    pub fn credits(&self) -> u32 {
        self.user.as_ref().map(|u| u.credits).unwrap_or(0)
    }

    /// Optimistic mirror of the server-side deduction; floors at zero.
    pub fn debit_credits(&mut self, cost: u32) {
        if let Some(user) = &mut self.user {
            user.credits = user.credits.saturating_sub(cost);
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Set the selection if `id` is present in the current list; no-op
    /// otherwise.
    pub fn select(&mut self, id: &str) {
        if self.conversation(id).is_some() {
            self.selected = Some(id.to_string());
        }
    }

    /// Install a freshly fetched list.
    ///
    /// Selection rules: pin (or nothing selected) picks the most recent
    /// entry; a selection that survived the refresh is kept; a vanished
    /// selection falls back to the most recent entry unless a send to it is
    /// still in flight, in which case it is left untouched so the pending
    /// commit is not clobbered. A send in flight for a *different*
    /// conversation does not inhibit re-resolution.
    pub fn replace_conversations(
        &mut self,
        list: Vec<Conversation>,
        pin_selection: bool,
    ) -> ListOutcome {
        if list.is_empty() {
            self.conversations = list;
            self.selected = None;
            return ListOutcome::NeedsConversation;
        }

        self.conversations = list;

        let selected_alive = self
            .selected
            .as_deref()
            .is_some_and(|id| self.conversation(id).is_some());

        if pin_selection || self.selected.is_none() {
            self.selected = Some(self.conversations[0].id.clone());
        } else if !selected_alive && !self.sending_to_selected() {
            self.selected = Some(self.conversations[0].id.clone());
        }

        ListOutcome::Installed
    }

    /// Merge a new transcript and freshness timestamp into the conversation
    /// matching `id` and move it to the front of the list. The single
    /// mutation path after every committed send. Returns false when the
    /// conversation no longer exists (deleted mid-flight).
    pub fn upsert_conversation(
        &mut self,
        id: &str,
        messages: Vec<Message>,
        updated_at: DateTime<Utc>,
    ) -> bool {
        let Some(position) = self.conversations.iter().position(|c| c.id == id) else {
            debug!(id, "upsert target missing, dropping commit");
            return false;
        };

        let mut updated = self.conversations[position].clone();
        updated.messages = messages;
        updated.updated_at = updated_at;

        let mut next: Vec<Conversation> = Vec::with_capacity(self.conversations.len());
        next.push(updated);
        for (i, conversation) in self.conversations.drain(..).enumerate() {
            if i != position {
                next.push(conversation);
            }
        }
        self.conversations = next;
        true
    }

    /// Insert a newly created conversation at the front and select it.
    pub fn adopt_conversation(&mut self, conversation: Conversation) {
        let id = conversation.id.clone();
        let mut next = Vec::with_capacity(self.conversations.len() + 1);
        next.push(conversation);
        next.extend(self.conversations.drain(..));
        self.conversations = next;
        self.selected = Some(id);
    }

    /// Drop a deleted conversation; a dangling selection falls back to the
    /// most recent remaining entry.
    pub fn remove_conversation(&mut self, id: &str) {
        self.conversations.retain(|c| c.id != id);
        if self.selected.as_deref() == Some(id) {
            self.selected = self.conversations.first().map(|c| c.id.clone());
        }
    }

    /// Open a send ticket for `conversation_id` and return its generation.
    pub fn begin_send(&mut self, conversation_id: &str) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.in_flight = Some(SendTicket {
            conversation_id: conversation_id.to_string(),
            generation,
        });
        generation
    }

    /// Close the ticket opened by `begin_send`. A stale generation leaves a
    /// newer ticket untouched.
    pub fn finish_send(&mut self, generation: u64) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|t| t.generation == generation)
        {
            self.in_flight = None;
        }
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn sending_to(&self, conversation_id: &str) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|t| t.conversation_id == conversation_id)
    }

    fn sending_to_selected(&self) -> bool {
        self.selected
            .as_deref()
            .is_some_and(|id| self.sending_to(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: &str, messages: Vec<Message>) -> Conversation {
        Conversation {
            id: id.to_string(),
            user_id: Some("u-1".to_string()),
            name: "New Chat".to_string(),
            messages,
            updated_at: Utc::now(),
        }
    }

    fn user(credits: u32) -> User {
        User {
            id: "u-1".to_string(),
            name: "ada".to_string(),
            email: None,
            credits,
        }
    }

    #[test]
    fn select_ignores_unknown_ids() {
        let mut session = Session::new();
        session.replace_conversations(vec![conversation("a", vec![])], false);
        session.select("missing");
        assert_eq!(session.selected_id(), Some("a"));
    }

    #[test]
    fn empty_list_requests_conversation_creation() {
        let mut session = Session::new();
        session.replace_conversations(vec![conversation("a", vec![])], true);
        let outcome = session.replace_conversations(vec![], false);
        assert_eq!(outcome, ListOutcome::NeedsConversation);
        assert!(session.selected_id().is_none());
        assert!(session.conversations().is_empty());
    }

    #[test]
    fn pin_selects_most_recent_entry() {
        let mut session = Session::new();
        session.replace_conversations(
            vec![conversation("a", vec![]), conversation("b", vec![])],
            false,
        );
        session.select("b");
        session.replace_conversations(
            vec![conversation("c", vec![]), conversation("a", vec![])],
            true,
        );
        assert_eq!(session.selected_id(), Some("c"));
    }

    #[test]
    fn surviving_selection_is_kept_on_refresh() {
        let mut session = Session::new();
        session.replace_conversations(
            vec![conversation("a", vec![]), conversation("b", vec![])],
            false,
        );
        session.select("b");
        session.replace_conversations(
            vec![conversation("a", vec![]), conversation("b", vec![])],
            false,
        );
        assert_eq!(session.selected_id(), Some("b"));
    }

    #[test]
    fn vanished_selection_falls_back_to_first() {
        let mut session = Session::new();
        session.replace_conversations(
            vec![conversation("a", vec![]), conversation("b", vec![])],
            false,
        );
        session.select("b");
        session.replace_conversations(vec![conversation("a", vec![])], false);
        assert_eq!(session.selected_id(), Some("a"));
    }

    #[test]
    fn refresh_during_send_keeps_vanished_selection() {
        let mut session = Session::new();
        session.replace_conversations(
            vec![conversation("a", vec![]), conversation("b", vec![])],
            false,
        );
        session.select("b");
        session.begin_send("b");
        session.replace_conversations(vec![conversation("a", vec![])], false);
        // the pending commit for "b" must not be clobbered by a jump to "a"
        assert_eq!(session.selected_id(), Some("b"));
    }

    #[test]
    fn refresh_during_send_to_other_conversation_reresolves() {
        let mut session = Session::new();
        session.replace_conversations(
            vec![conversation("a", vec![]), conversation("b", vec![])],
            false,
        );
        session.select("b");
        session.begin_send("a");
        session.replace_conversations(vec![conversation("a", vec![])], false);
        // the guard is scoped to the conversation being sent to
        assert_eq!(session.selected_id(), Some("a"));
    }

    #[test]
    fn upsert_moves_conversation_to_front() {
        let mut session = Session::new();
        session.replace_conversations(
            vec![conversation("a", vec![]), conversation("b", vec![])],
            false,
        );
        let messages = vec![Message::user("hi"), Message::assistant("hello", false, None)];
        assert!(session.upsert_conversation("b", messages.clone(), Utc::now()));

        assert_eq!(session.conversations()[0].id, "b");
        assert_eq!(session.conversations()[0].messages.len(), 2);
        // the other conversation is untouched
        assert_eq!(session.conversations()[1].id, "a");
        assert!(session.conversations()[1].messages.is_empty());
    }

    #[test]
    fn upsert_of_deleted_conversation_is_dropped() {
        let mut session = Session::new();
        session.replace_conversations(vec![conversation("a", vec![])], false);
        assert!(!session.upsert_conversation("gone", vec![Message::user("x")], Utc::now()));
        assert_eq!(session.conversations().len(), 1);
    }

    #[test]
    fn stale_generation_cannot_clear_newer_ticket() {
        let mut session = Session::new();
        session.replace_conversations(vec![conversation("a", vec![])], false);
        let first = session.begin_send("a");
        let second = session.begin_send("a");
        session.finish_send(first);
        assert!(session.is_sending());
        session.finish_send(second);
        assert!(!session.is_sending());
    }

    #[test]
    fn credits_floor_at_zero() {
        let mut session = Session::new();
        session.set_user(Some(user(1)));
        session.debit_credits(2);
        assert_eq!(session.credits(), 0);
        session.debit_credits(1);
        assert_eq!(session.credits(), 0);
    }

    #[test]
    fn clearing_user_clears_conversations_and_selection() {
        let mut session = Session::new();
        session.set_user(Some(user(5)));
        session.replace_conversations(vec![conversation("a", vec![])], true);
        session.set_user(None);
        assert!(session.conversations().is_empty());
        assert!(session.selected_id().is_none());
        assert_eq!(session.credits(), 0);
    }

    #[test]
    fn adopt_and_remove_conversations() {
        let mut session = Session::new();
        session.replace_conversations(vec![conversation("a", vec![])], true);
        session.adopt_conversation(conversation("new", vec![]));
        assert_eq!(session.selected_id(), Some("new"));
        assert_eq!(session.conversations()[0].id, "new");

        session.remove_conversation("new");
        assert_eq!(session.selected_id(), Some("a"));
        session.remove_conversation("a");
        assert!(session.selected_id().is_none());
    }
}
