//! Single-choice list prompt and splash screen.
//!
//! Rendering is shared between the live inline viewport and a `TestBackend`
//! so every screen can be asserted as plain text.

use crate::errors::BuilderError;
use crate::runtime::Prompter;
use crate::step_identity::StepKey;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::backend::{CrosstermBackend, TestBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::{Frame, Terminal, TerminalOptions, Viewport};

pub const DONE_LABEL: &str = "Done";
const MAX_VISIBLE_OPTIONS: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    Step(StepKey),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub choice: MenuChoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectPrompt {
    pub title: String,
    pub notice: Option<String>,
    pub options: Vec<SelectOption>,
    /// Index into `options` highlighted when the prompt opens.
    pub default: Option<usize>,
}

impl SelectPrompt {
    pub fn offers_done(&self) -> bool {
        self.options
            .iter()
            .any(|option| option.choice == MenuChoice::Done)
    }

    pub fn default_choice(&self) -> Option<&MenuChoice> {
        self.default
            .and_then(|index| self.options.get(index))
            .map(|option| &option.choice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplashScreen {
    pub title: String,
    pub body: String,
    pub proceed_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectState {
    pub selected: usize,
    pub scroll_offset: usize,
    pub max_visible: usize,
    len: usize,
}

impl SelectState {
    pub fn for_prompt(prompt: &SelectPrompt, max_visible: usize) -> Self {
        let len = prompt.options.len();
        let selected = prompt.default.filter(|index| *index < len).unwrap_or(0);
        let max_visible = max_visible.max(1);
        let scroll_offset = (selected + 1).saturating_sub(max_visible);
        Self {
            selected,
            scroll_offset,
            max_visible,
            len,
        }
    }

    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            if self.selected < self.scroll_offset {
                self.scroll_offset = self.selected;
            }
        }
    }

    pub fn select_next(&mut self) {
        if self.len > 0 && self.selected < self.len - 1 {
            self.selected += 1;
            if self.selected >= self.scroll_offset + self.max_visible {
                self.scroll_offset = self.selected - self.max_visible + 1;
            }
        }
    }

    pub fn page_up(&mut self) {
        for _ in 0..self.max_visible {
            self.select_prev();
        }
    }

    pub fn page_down(&mut self) {
        for _ in 0..self.max_visible {
            self.select_next();
        }
    }

    pub fn visible_range(&self) -> std::ops::Range<usize> {
        let end = (self.scroll_offset + self.max_visible).min(self.len);
        self.scroll_offset..end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Up,
    Down,
    PageUp,
    PageDown,
    Confirm,
    Cancel,
    Ignore,
}

pub fn action_for_key(key: &KeyEvent) -> KeyAction {
    if key.kind != KeyEventKind::Press {
        return KeyAction::Ignore;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') => KeyAction::Cancel,
            KeyCode::Char('p') => KeyAction::Up,
            KeyCode::Char('n') => KeyAction::Down,
            _ => KeyAction::Ignore,
        };
    }
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => KeyAction::Up,
        KeyCode::Down | KeyCode::Char('j') => KeyAction::Down,
        KeyCode::PageUp => KeyAction::PageUp,
        KeyCode::PageDown => KeyAction::PageDown,
        KeyCode::Enter => KeyAction::Confirm,
        KeyCode::Esc | KeyCode::Char('q') => KeyAction::Cancel,
        _ => KeyAction::Ignore,
    }
}

fn draw_select(frame: &mut Frame, area: Rect, prompt: &SelectPrompt, state: &SelectState) {
    let notice_height = if prompt.notice.is_some() { 1 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(notice_height),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    if let Some(notice) = &prompt.notice {
        frame.render_widget(
            Paragraph::new(notice.as_str()).style(Style::default().fg(Color::Red)),
            chunks[0],
        );
    }

    let items = state
        .visible_range()
        .filter_map(|index| prompt.options.get(index).map(|option| (index, option)))
        .map(|(index, option)| {
            if index == state.selected {
                ListItem::new(Line::from(vec![
                    Span::styled("> ", Style::default().fg(Color::Cyan)),
                    Span::styled(
                        option.label.clone(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ),
                ]))
            } else {
                ListItem::new(Line::from(vec![
                    Span::raw("  "),
                    Span::raw(option.label.clone()),
                ]))
            }
        })
        .collect::<Vec<_>>();

    frame.render_widget(
        List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(prompt.title.as_str()),
        ),
        chunks[1],
    );

    frame.render_widget(
        Paragraph::new("up/down move  enter select  esc cancel")
            .style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
}

fn draw_splash(frame: &mut Frame, area: Rect, screen: &SplashScreen) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    frame.render_widget(
        splash_body(screen).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(screen.title.as_str()),
            ),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(format!("[ {} ]  enter to continue, esc to quit", screen.proceed_label))
            .style(Style::default().fg(Color::Cyan)),
        chunks[1],
    );
}

fn select_height(prompt: &SelectPrompt, max_visible: usize) -> u16 {
    let rows = prompt.options.len().min(max_visible).max(1);
    let notice = usize::from(prompt.notice.is_some());
    // border top + bottom, help line
    (rows + notice + 3) as u16
}

fn splash_body(screen: &SplashScreen) -> Paragraph<'_> {
    Paragraph::new(screen.body.as_str()).wrap(Wrap { trim: false })
}

/// Rows needed to show the whole splash at `width` columns once the body wraps.
fn splash_height(screen: &SplashScreen, width: u16) -> u16 {
    // border left + right
    let inner = width.saturating_sub(2).max(1);
    let body = splash_body(screen).line_count(inner);
    // border top + bottom, proceed line
    u16::try_from(body + 3).unwrap_or(u16::MAX)
}

pub fn render_select(
    prompt: &SelectPrompt,
    state: &SelectState,
    width: u16,
    height: u16,
) -> Result<String, BuilderError> {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).map_err(|e| BuilderError::Prompt(e.to_string()))?;
    terminal
        .draw(|frame| draw_select(frame, frame.area(), prompt, state))
        .map_err(|e| BuilderError::Prompt(e.to_string()))?;
    Ok(test_buffer_text(terminal.backend(), width, height))
}

pub fn render_splash(
    screen: &SplashScreen,
    width: u16,
    height: u16,
) -> Result<String, BuilderError> {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).map_err(|e| BuilderError::Prompt(e.to_string()))?;
    terminal
        .draw(|frame| draw_splash(frame, frame.area(), screen))
        .map_err(|e| BuilderError::Prompt(e.to_string()))?;
    Ok(test_buffer_text(terminal.backend(), width, height))
}

fn test_buffer_text(backend: &TestBackend, width: u16, height: u16) -> String {
    let buffer = backend.buffer();
    let mut out = String::new();
    for y in 0..height {
        for x in 0..width {
            out.push_str(buffer[(x, y)].symbol());
        }
        out.push('\n');
    }
    out
}

/// Leaves raw mode. Safe to call when raw mode was never entered.
pub fn restore_terminal() {
    let _ = disable_raw_mode();
}

type InlineTerminal = Terminal<CrosstermBackend<std::io::Stdout>>;

fn with_inline_terminal<T>(
    height: u16,
    body: impl FnOnce(&mut InlineTerminal) -> Result<T, BuilderError>,
) -> Result<T, BuilderError> {
    let rows = crossterm::terminal::size()
        .map(|(_, rows)| rows)
        .unwrap_or(height);
    let height = height.min(rows.max(1));

    enable_raw_mode().map_err(|e| BuilderError::Prompt(e.to_string()))?;
    let result = Terminal::with_options(
        CrosstermBackend::new(std::io::stdout()),
        TerminalOptions {
            viewport: Viewport::Inline(height),
        },
    )
    .map_err(|e| BuilderError::Prompt(e.to_string()))
    .and_then(|mut terminal| {
        let outcome = body(&mut terminal);
        let _ = terminal.clear();
        outcome
    });
    restore_terminal();
    result
}

fn next_action() -> Result<KeyAction, BuilderError> {
    loop {
        match event::read().map_err(|e| BuilderError::Prompt(e.to_string()))? {
            Event::Key(key) => return Ok(action_for_key(&key)),
            _ => continue,
        }
    }
}

/// Live prompt on the controlling terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn splash(&self, screen: &SplashScreen) -> Result<(), BuilderError> {
        let width = crossterm::terminal::size()
            .map(|(cols, _)| cols)
            .unwrap_or(80);
        with_inline_terminal(splash_height(screen, width), |terminal| loop {
            terminal
                .draw(|frame| draw_splash(frame, frame.area(), screen))
                .map_err(|e| BuilderError::Prompt(e.to_string()))?;
            match next_action()? {
                KeyAction::Confirm => return Ok(()),
                KeyAction::Cancel => return Err(BuilderError::Cancelled),
                _ => {}
            }
        })
    }

    fn select(&self, prompt: &SelectPrompt) -> Result<MenuChoice, BuilderError> {
        if prompt.options.is_empty() {
            return Err(BuilderError::Prompt(format!(
                "no options to choose from for '{}'",
                prompt.title
            )));
        }
        let mut state = SelectState::for_prompt(prompt, MAX_VISIBLE_OPTIONS);
        with_inline_terminal(select_height(prompt, MAX_VISIBLE_OPTIONS), |terminal| loop {
            terminal
                .draw(|frame| draw_select(frame, frame.area(), prompt, &state))
                .map_err(|e| BuilderError::Prompt(e.to_string()))?;
            match next_action()? {
                KeyAction::Up => state.select_prev(),
                KeyAction::Down => state.select_next(),
                KeyAction::PageUp => state.page_up(),
                KeyAction::PageDown => state.page_down(),
                KeyAction::Confirm => {
                    return prompt
                        .options
                        .get(state.selected)
                        .map(|option| option.choice.clone())
                        .ok_or_else(|| BuilderError::Prompt("selection out of range".to_string()));
                }
                KeyAction::Cancel => return Err(BuilderError::Cancelled),
                KeyAction::Ignore => {}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::Step;
    use crate::step_identity::selector_key;

    fn prompt_with(len: usize, default: Option<usize>, notice: Option<&str>) -> SelectPrompt {
        let mut options = (0..len)
            .map(|index| {
                let step = Step::change(vec![vec![format!("#field-{index}")]], format!("v{index}"));
                SelectOption {
                    label: format!("option {index}"),
                    choice: MenuChoice::Step(selector_key(step.selectors())),
                }
            })
            .collect::<Vec<_>>();
        options.push(SelectOption {
            label: DONE_LABEL.to_string(),
            choice: MenuChoice::Done,
        });
        SelectPrompt {
            title: "Select a step for inputUsername".to_string(),
            notice: notice.map(str::to_string),
            options,
            default,
        }
    }

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn state_starts_on_default_and_scrolls_with_cursor() {
        let prompt = prompt_with(5, Some(5), None);
        let mut state = SelectState::for_prompt(&prompt, 3);
        assert_eq!(state.selected, 5);
        assert_eq!(state.visible_range(), 3..6);

        state.page_up();
        assert_eq!(state.selected, 2);
        assert_eq!(state.visible_range(), 2..5);

        state.select_prev();
        state.select_prev();
        state.select_prev();
        assert_eq!(state.selected, 0);
        assert_eq!(state.scroll_offset, 0);

        state.page_down();
        state.page_down();
        state.select_next();
        assert_eq!(state.selected, 5);
    }

    #[test]
    fn out_of_range_default_falls_back_to_first_option() {
        let prompt = prompt_with(2, Some(9), None);
        assert_eq!(SelectState::for_prompt(&prompt, 4).selected, 0);
    }

    #[test]
    fn key_bindings_map_to_actions() {
        assert_eq!(action_for_key(&press(KeyCode::Up, KeyModifiers::NONE)), KeyAction::Up);
        assert_eq!(action_for_key(&press(KeyCode::Char('j'), KeyModifiers::NONE)), KeyAction::Down);
        assert_eq!(action_for_key(&press(KeyCode::Enter, KeyModifiers::NONE)), KeyAction::Confirm);
        assert_eq!(action_for_key(&press(KeyCode::Esc, KeyModifiers::NONE)), KeyAction::Cancel);
        assert_eq!(
            action_for_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyAction::Cancel
        );
        assert_eq!(action_for_key(&press(KeyCode::Char('x'), KeyModifiers::NONE)), KeyAction::Ignore);
    }

    #[test]
    fn select_render_marks_highlighted_option_and_notice() {
        let prompt = prompt_with(2, Some(2), Some("inputUsername is required."));
        let state = SelectState::for_prompt(&prompt, 12);
        let frame = render_select(&prompt, &state, 80, 8).expect("render");
        assert!(frame.contains("Select a step for inputUsername"));
        assert!(frame.contains("inputUsername is required."));
        assert!(frame.contains("  option 0"));
        assert!(frame.contains("> Done"));
    }

    #[test]
    fn splash_render_shows_title_body_and_proceed_label() {
        let screen = SplashScreen {
            title: "Welcome".to_string(),
            body: "Map your fields.".to_string(),
            proceed_label: "Start Mapping".to_string(),
        };
        let frame = render_splash(&screen, 70, 6).expect("render");
        assert!(frame.contains("Welcome"));
        assert!(frame.contains("Map your fields."));
        assert!(frame.contains("[ Start Mapping ]"));
    }

    #[test]
    fn splash_height_counts_wrapped_rows_so_the_last_line_fits() {
        let screen = crate::elicitation::splash_screen();
        let logical = screen.body.lines().count() as u16 + 3;
        let height = splash_height(&screen, 80);
        assert!(height > logical, "{height} rows for {logical} logical rows");

        let frame = render_splash(&screen, 80, height).expect("render");
        assert!(frame.contains("Let's begin the mapping process!"));
        assert!(frame.contains("[ Start Mapping ]"));
        assert_eq!(splash_height(&screen, 400), logical);
    }

    #[test]
    fn prompt_reports_done_and_default_choice() {
        let prompt = prompt_with(1, Some(1), None);
        assert!(prompt.offers_done());
        assert_eq!(prompt.default_choice(), Some(&MenuChoice::Done));
        assert_eq!(select_height(&prompt, 12), 5);
    }
}
