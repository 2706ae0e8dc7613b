use parley_core::{ChatClient, Conversation, Sender, Transport, Turn, TurnToken};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::markdown;
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Landing,
    Chat,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App<T = ChatClient> {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    // Screen we're switching to; set between the trigger and the next tick
    pub transition: Option<Screen>,
    pub endpoint: String,

    // Active session
    pub conversation: Conversation,
    pub draft_cursor: usize, // cursor position in the draft, in chars

    // Chat scroll state
    pub chat_scroll: u16,
    pub max_chat_scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for the typing indicator

    // Transient footer notice
    pub status: Option<String>,

    // Areas for mouse hit-testing (updated during render)
    pub start_button_area: Option<Rect>,
    pub new_session_area: Option<Rect>,
    pub back_area: Option<Rect>,
    pub send_area: Option<Rect>,
    pub chat_area: Option<Rect>,

    transport: T,
    events: UnboundedSender<AppEvent>,
}

impl<T: Transport + Clone + 'static> App<T> {
    pub fn new(
        transport: T,
        endpoint: impl Into<String>,
        greeting: &str,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            screen: Screen::Landing,
            transition: None,
            endpoint: endpoint.into(),

            conversation: Conversation::new(greeting),
            draft_cursor: 0,

            chat_scroll: 0,
            max_chat_scroll: 0,
            follow_bottom: true,
            chat_height: 0,

            animation_frame: 0,
            status: None,

            start_button_area: None,
            new_session_area: None,
            back_area: None,
            send_area: None,
            chat_area: None,

            transport,
            events,
        }
    }

    /// Landing -> chat. Ignored while another switch is pending.
    pub fn start_chat(&mut self) -> bool {
        self.begin_transition(Screen::Landing, Screen::Chat)
    }

    /// Chat -> landing. Ignored while another switch is pending.
    pub fn back_to_home(&mut self) -> bool {
        self.begin_transition(Screen::Chat, Screen::Landing)
    }

    fn begin_transition(&mut self, from: Screen, to: Screen) -> bool {
        if self.transition.is_some() || self.screen != from {
            return false;
        }
        self.transition = Some(to);
        true
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Called by the Tick event: finishes a pending switch and animates
    pub fn tick(&mut self) {
        if let Some(target) = self.transition.take() {
            self.enter(target);
        }
        if self.conversation.is_awaiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    fn enter(&mut self, screen: Screen) {
        debug!(?screen, "switching screen");
        self.screen = screen;
        self.status = None;
        // The chat view always opens on a fresh session
        if screen == Screen::Chat {
            self.new_session();
        }
    }

    pub fn new_session(&mut self) {
        self.conversation.start_session();
        self.draft_cursor = 0;
        self.chat_scroll = 0;
        self.follow_bottom = true;
    }

    /// Submit the draft and hand the turn to a background task. The reply
    /// comes back through the event channel as `AppEvent::Reply`.
    pub fn submit(&mut self) -> bool {
        let Some(turn) = self.conversation.submit() else {
            return false;
        };
        self.draft_cursor = 0;
        self.follow_bottom = true;
        self.status = None;
        self.spawn_turn(turn);
        true
    }

    fn spawn_turn(&self, turn: Turn) {
        let transport = self.transport.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let text = transport.send(&turn.text, &turn.conversation_id).await;
            // Receiver is gone only when the app is shutting down
            let _ = events.send(AppEvent::Reply {
                token: turn.token,
                text,
            });
        });
    }

    pub fn apply_reply(&mut self, token: TurnToken, text: String) {
        if self.conversation.complete(token, text) {
            self.follow_bottom = true;
        }
    }

    // Draft editing

    pub fn insert_char(&mut self, c: char) {
        let cursor = self.draft_cursor;
        self.conversation.edit_draft(|draft| {
            let byte_pos = char_to_byte_index(draft, cursor);
            draft.insert(byte_pos, c);
        });
        self.draft_cursor += 1;
    }

    /// Insert pasted text at the cursor. Line endings become `\n`.
    pub fn paste(&mut self, text: &str) {
        for c in text.replace("\r\n", "\n").replace('\r', "\n").chars() {
            self.insert_char(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.draft_cursor == 0 {
            return;
        }
        self.draft_cursor -= 1;
        let cursor = self.draft_cursor;
        self.conversation.edit_draft(|draft| {
            let byte_pos = char_to_byte_index(draft, cursor);
            draft.remove(byte_pos);
        });
    }

    pub fn delete(&mut self) {
        let cursor = self.draft_cursor;
        if cursor >= self.draft_len() {
            return;
        }
        self.conversation.edit_draft(|draft| {
            let byte_pos = char_to_byte_index(draft, cursor);
            draft.remove(byte_pos);
        });
    }

    pub fn cursor_left(&mut self) {
        self.draft_cursor = self.draft_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.draft_cursor = (self.draft_cursor + 1).min(self.draft_len());
    }

    pub fn cursor_home(&mut self) {
        self.draft_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.draft_cursor = self.draft_len();
    }

    fn draft_len(&self) -> usize {
        self.conversation.draft().chars().count()
    }

    // Chat scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_chat_scroll);
        if self.chat_scroll >= self.max_chat_scroll {
            self.follow_bottom = true;
        }
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    /// Link destinations in the most recent assistant message
    pub fn latest_links(&self) -> Vec<String> {
        self.conversation
            .messages()
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Bot)
            .map(|m| markdown::links(&m.text))
            .unwrap_or_default()
    }
}
