use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};
use tui_textarea::{CursorMove, Input, Key, TextArea};

/// Outcome of one key press in a [`TextInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInputEvent {
    None,
    Submit,
    Cancel,
}

/// Single-line text input backed by tui-textarea.
pub struct TextInput {
    textarea: TextArea<'static>,
}

impl TextInput {
    pub fn new() -> Self {
        let mut textarea = TextArea::default();
        textarea.set_cursor_line_style(Style::default());
        Self { textarea }
    }

    pub fn with_value(value: &str) -> Self {
        let mut input = Self::new();
        input.set_value(value);
        input
    }

    pub fn with_colors(mut self, text: Color, background: Color) -> Self {
        self.textarea.set_style(Style::default().fg(text).bg(background));
        self.textarea.set_cursor_line_style(Style::default());
        self
    }

    pub fn value(&self) -> String {
        self.textarea.lines().first().cloned().unwrap_or_default()
    }

    pub fn set_value(&mut self, value: &str) {
        let style = self.textarea.style();
        self.textarea = TextArea::new(vec![value.replace(['\n', '\r'], " ")]);
        self.textarea.set_style(style);
        self.textarea.set_cursor_line_style(Style::default());
        self.textarea.move_cursor(CursorMove::End);
    }

    pub fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> TextInputEvent {
        match event.code {
            KeyCode::Enter => TextInputEvent::Submit,
            KeyCode::Esc => TextInputEvent::Cancel,
            _ => {
                let input = key_event_to_input(event);
                if !matches!(input.key, Key::Char('\n') | Key::Char('\r') | Key::Null) {
                    self.textarea.input(input);
                }
                TextInputEvent::None
            }
        }
    }
}

impl Default for TextInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a crossterm key event to a tui-textarea input.
fn key_event_to_input(event: &KeyEvent) -> Input {
    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        _ => Key::Null,
    };
    Input {
        key,
        ctrl: event.modifiers.contains(KeyModifiers::CONTROL),
        alt: event.modifiers.contains(KeyModifiers::ALT),
        shift: event.modifiers.contains(KeyModifiers::SHIFT),
    }
}

impl Widget for &TextInput {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.textarea.render(area, buf);
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                let cell = &mut buf[(x, y)];
                let style = cell.style().remove_modifier(Modifier::UNDERLINED);
                cell.set_style(style);
            }
        }
    }
}
