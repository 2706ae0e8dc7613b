//! Conversation view-model
//!
//! Owns the state of the active chat session: transcript, draft input, and
//! whether a turn is waiting on the assistant. Front ends read this state and
//! drive it through `submit`/`complete`; the network call itself happens
//! outside, so a UI can keep its event loop running while a turn is in flight.

use tracing::{debug, info};

use crate::ids;
use crate::state::Message;
use crate::transport::Transport;

/// Identifies one outstanding turn. Never reused for the lifetime of a
/// `Conversation`, so a reply can always be matched to the turn that asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse(TurnToken),
}

/// The request produced by a successful submit, to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub token: TurnToken,
    pub text: String,
    pub conversation_id: String,
}

pub struct Conversation {
    id: String,
    messages: Vec<Message>,
    draft: String,
    state: TurnState,
    next_token: u64,
    greeting: String,
}

impl Conversation {
    pub fn new(greeting: impl Into<String>) -> Self {
        let mut conversation = Self {
            id: String::new(),
            messages: Vec::new(),
            draft: String::new(),
            state: TurnState::Idle,
            next_token: 0,
            greeting: greeting.into(),
        };
        conversation.start_session();
        conversation
    }

    /// Replace the session wholesale: fresh id, transcript reset to the
    /// greeting. A turn still in flight becomes stale and its reply is dropped.
    pub fn start_session(&mut self) {
        if let TurnState::AwaitingResponse(token) = self.state {
            debug!(?token, "abandoning in-flight turn");
        }

        self.id = ids::conversation_id();
        self.messages = vec![Message::bot(self.greeting.clone())];
        self.draft.clear();
        self.state = TurnState::Idle;

        info!(conversation_id = %self.id, "started new session");
    }

    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn edit_draft(&mut self, edit: impl FnOnce(&mut String)) {
        edit(&mut self.draft);
    }

    /// Start a turn from the draft. Returns `None` and changes nothing when the
    /// draft is blank or another turn is still outstanding.
    pub fn submit(&mut self) -> Option<Turn> {
        if !self.can_submit() {
            return None;
        }

        let text = self.draft.trim().to_string();
        self.messages.push(Message::user(text.clone()));
        self.draft.clear();

        let token = TurnToken(self.next_token);
        self.next_token += 1;
        self.state = TurnState::AwaitingResponse(token);

        debug!(?token, conversation_id = %self.id, "submitted turn");

        Some(Turn {
            token,
            text,
            conversation_id: self.id.clone(),
        })
    }

    /// Finish the turn identified by `token` with the assistant's reply.
    /// Returns `false` if the token is not the outstanding turn, in which case
    /// the reply is discarded.
    pub fn complete(&mut self, token: TurnToken, reply: impl Into<String>) -> bool {
        if self.state != TurnState::AwaitingResponse(token) {
            debug!(?token, "discarding stale reply");
            return false;
        }

        self.messages.push(Message::bot(reply));
        self.state = TurnState::Idle;
        true
    }

    /// Run a whole turn against `transport`: submit, send, complete.
    pub async fn exchange<T: Transport>(&mut self, transport: &T) -> bool {
        let Some(turn) = self.submit() else {
            return false;
        };

        let reply = transport.send(&turn.text, &turn.conversation_id).await;
        self.complete(turn.token, reply)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state != TurnState::Idle
    }

    /// Whether a submit would start a turn right now.
    pub fn can_submit(&self) -> bool {
        self.state == TurnState::Idle && !self.draft.trim().is_empty()
    }
}
