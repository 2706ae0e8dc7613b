use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use parley_core::Transport;
use ratatui::layout::Rect;
use tracing::warn;

use crate::app::{App, Screen};
use crate::tui::AppEvent;

pub fn handle_event<T: Transport + Clone + 'static>(app: &mut App<T>, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Paste(text) => {
            if app.screen == Screen::Chat {
                app.paste(&text);
            }
        }
        AppEvent::Tick => app.tick(),
        AppEvent::Reply { token, text } => app.apply_reply(token, text),
    }
}

fn handle_key<T: Transport + Clone + 'static>(app: &mut App<T>, key: KeyEvent) {
    // Global keys that work on any screen
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.screen {
        Screen::Landing => handle_landing(app, key),
        Screen::Chat => handle_chat(app, key),
    }
}

fn handle_landing<T: Transport + Clone + 'static>(app: &mut App<T>, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('s') => {
            app.start_chat();
        }
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        _ => {}
    }
}

fn handle_chat<T: Transport + Clone + 'static>(app: &mut App<T>, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => {
            app.back_to_home();
        }
        KeyCode::Char('n') if ctrl => app.new_session(),
        KeyCode::Char('o') if ctrl => open_latest_links(app),

        // Bare Enter sends; with any modifier it starts a new line instead
        KeyCode::Enter => {
            if key.modifiers.is_empty() {
                app.submit();
            } else {
                app.insert_char('\n');
            }
        }

        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),

        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => {
            let lines = app.half_page();
            app.scroll_up(lines);
        }
        KeyCode::PageDown => {
            let lines = app.half_page();
            app.scroll_down(lines);
        }

        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn hit(area: Option<Rect>, mouse: &MouseEvent) -> bool {
    area.map(|r| point_in_rect(mouse.column, mouse.row, r)).unwrap_or(false)
}

fn handle_mouse<T: Transport + Clone + 'static>(app: &mut App<T>, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => match app.screen {
            Screen::Landing => {
                if hit(app.start_button_area, &mouse) {
                    app.start_chat();
                }
            }
            Screen::Chat => {
                if hit(app.new_session_area, &mouse) {
                    app.new_session();
                } else if hit(app.back_area, &mouse) {
                    app.back_to_home();
                } else if hit(app.send_area, &mouse) {
                    // Disabled button: submit is a no-op unless it can start a turn
                    app.submit();
                }
            }
        },
        MouseEventKind::ScrollDown if app.screen == Screen::Chat && hit(app.chat_area, &mouse) => {
            app.scroll_down(3);
        }
        MouseEventKind::ScrollUp if app.screen == Screen::Chat && hit(app.chat_area, &mouse) => {
            app.scroll_up(3);
        }
        _ => {}
    }
}

fn open_latest_links<T: Transport + Clone + 'static>(app: &mut App<T>) {
    let links = app.latest_links();
    if links.is_empty() {
        app.status = Some("No links in the last reply".to_string());
        return;
    }

    let opened = links.iter().filter(|url| open_in_browser(url)).count();
    app.status = Some(format!("Opened {} of {} link(s)", opened, links.len()));
}

/// Hand a URL to the platform's opener so it shows up in the browser
fn open_in_browser(url: &str) -> bool {
    use std::process::{Command, Stdio};

    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]);
        cmd
    } else {
        Command::new("xdg-open")
    };

    match command
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(_) => true,
        Err(e) => {
            warn!(url, error = %e, "failed to open link");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use tokio::sync::mpsc;

    #[derive(Clone)]
    struct Silent;

    impl Transport for Silent {
        async fn send(&self, _text: &str, _conversation_id: &str) -> String {
            "ok".to_string()
        }
    }

    fn app() -> App<Silent> {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(Silent, "http://test/chat", "Welcome", tx)
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn press(app: &mut App<Silent>, code: KeyCode) {
        handle_event(app, key(code, KeyModifiers::NONE));
    }

    fn click(app: &mut App<Silent>, column: u16, row: u16) {
        handle_event(
            app,
            AppEvent::Mouse(MouseEvent {
                kind: MouseEventKind::Down(MouseButton::Left),
                column,
                row,
                modifiers: KeyModifiers::NONE,
            }),
        );
    }

    fn open_chat(app: &mut App<Silent>) {
        press(app, KeyCode::Enter);
        handle_event(app, AppEvent::Tick);
        assert_eq!(app.screen, Screen::Chat);
    }

    #[test]
    fn test_ctrl_c_quits_anywhere() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn test_landing_keys() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        assert!(app.is_transitioning());
        press(&mut app, KeyCode::Enter);
        handle_event(&mut app, AppEvent::Tick);
        assert_eq!(app.screen, Screen::Chat);

        let mut app = self::app();
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_typing_and_newline() {
        let mut app = app();
        open_chat(&mut app);

        press(&mut app, KeyCode::Char('h'));
        press(&mut app, KeyCode::Char('i'));
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::ALT));
        press(&mut app, KeyCode::Char('x'));

        assert_eq!(app.conversation.draft(), "hi\nx");
        assert_eq!(app.conversation.messages().len(), 1);
    }

    #[test]
    fn test_ctrl_enter_inserts_newline() {
        let mut app = app();
        open_chat(&mut app);
        press(&mut app, KeyCode::Char('a'));
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::CONTROL));

        assert_eq!(app.conversation.draft(), "a\n");
        assert!(!app.conversation.is_awaiting());
    }

    #[test]
    fn test_multiline_paste_does_not_submit() {
        let mut app = app();
        open_chat(&mut app);
        press(&mut app, KeyCode::Char('>'));
        handle_event(&mut app, AppEvent::Paste("fn main() {\r\n    run();\n}".to_string()));

        assert_eq!(app.conversation.draft(), ">fn main() {\n    run();\n}");
        assert_eq!(app.draft_cursor, app.conversation.draft().chars().count());
        assert_eq!(app.conversation.messages().len(), 1);
        assert!(!app.conversation.is_awaiting());
    }

    #[test]
    fn test_paste_on_landing_is_ignored() {
        let mut app = app();
        handle_event(&mut app, AppEvent::Paste("hello".to_string()));
        assert_eq!(app.conversation.draft(), "");
    }

    #[test]
    fn test_ctrl_letters_are_not_typed() {
        let mut app = app();
        open_chat(&mut app);
        handle_event(&mut app, key(KeyCode::Char('w'), KeyModifiers::CONTROL));
        assert_eq!(app.conversation.draft(), "");
    }

    #[test]
    fn test_enter_on_blank_draft_does_nothing() {
        let mut app = app();
        open_chat(&mut app);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.conversation.messages().len(), 1);
        assert!(!app.conversation.is_awaiting());
    }

    #[tokio::test]
    async fn test_enter_submits() {
        let mut app = app();
        open_chat(&mut app);
        press(&mut app, KeyCode::Char('h'));
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.conversation.messages().len(), 2);
        assert_eq!(app.conversation.draft(), "");
        assert!(app.conversation.is_awaiting());
    }

    #[test]
    fn test_ctrl_n_starts_new_session() {
        let mut app = app();
        open_chat(&mut app);
        let id = app.conversation.id().to_string();
        press(&mut app, KeyCode::Char('z'));

        handle_event(&mut app, key(KeyCode::Char('n'), KeyModifiers::CONTROL));
        assert_ne!(app.conversation.id(), id);
        assert_eq!(app.conversation.draft(), "");
    }

    #[test]
    fn test_esc_goes_back_home() {
        let mut app = app();
        open_chat(&mut app);
        press(&mut app, KeyCode::Esc);
        handle_event(&mut app, AppEvent::Tick);
        assert_eq!(app.screen, Screen::Landing);
    }

    #[test]
    fn test_reply_event_is_applied() {
        let mut app = app();
        open_chat(&mut app);
        app.conversation.update_draft("hello");
        let turn = app.conversation.submit().unwrap();

        handle_event(
            &mut app,
            AppEvent::Reply {
                token: turn.token,
                text: "hi there".to_string(),
            },
        );
        assert_eq!(app.conversation.messages().last().unwrap().text, "hi there");
    }

    #[test]
    fn test_mouse_buttons() {
        let mut app = app();
        app.start_button_area = Some(Rect::new(10, 10, 20, 3));
        click(&mut app, 0, 0);
        assert!(!app.is_transitioning());
        click(&mut app, 15, 11);
        handle_event(&mut app, AppEvent::Tick);
        assert_eq!(app.screen, Screen::Chat);

        let id = app.conversation.id().to_string();
        app.new_session_area = Some(Rect::new(50, 0, 13, 1));
        app.back_area = Some(Rect::new(35, 0, 14, 1));
        app.send_area = Some(Rect::new(70, 20, 10, 3));

        // Disabled send button: blank draft
        click(&mut app, 72, 21);
        assert_eq!(app.conversation.messages().len(), 1);

        click(&mut app, 55, 0);
        assert_ne!(app.conversation.id(), id);

        click(&mut app, 40, 0);
        handle_event(&mut app, AppEvent::Tick);
        assert_eq!(app.screen, Screen::Landing);
    }

    #[test]
    fn test_point_in_rect_edges() {
        let rect = Rect::new(2, 3, 4, 2);
        assert!(point_in_rect(2, 3, rect));
        assert!(point_in_rect(5, 4, rect));
        assert!(!point_in_rect(6, 4, rect));
        assert!(!point_in_rect(5, 5, rect));
    }
}
