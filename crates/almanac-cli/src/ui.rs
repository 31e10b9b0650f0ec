//! TUI implementation for almanac

use std::time::Instant;

use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use tokio::sync::mpsc;

use almanac_ai::Role;
use almanac_chat::{Attachment, Chat, ChatEvent};
use almanac_tui::{
    Theme,
    input::{Action, key_to_action},
    widgets::{
        ChatMessage, InputBox, MessageList, Spinner,
        message_list::calculate_message_height,
    },
};

use crate::commands::{self, CommandResult};

/// Messages sent from input handling to the session loop
#[derive(Debug)]
enum UiMessage {
    /// User submitted a prompt
    Submit(String),
    /// Slash command
    Command(String),
    /// User requested quit
    Quit,
    /// User requested clear
    Clear,
    /// Abort the in-flight call
    Abort,
}

/// TUI application state
struct TuiState {
    /// Rendered transcript
    messages: Vec<ChatMessage>,
    /// Input box
    input: InputBox,
    /// Current scroll position
    scroll: usize,
    /// Whether a turn is currently in flight
    is_processing: bool,
    /// Current status message
    status: String,
    /// Theme
    theme: Theme,
    /// Session token totals
    total_input_tokens: u32,
    total_output_tokens: u32,
    /// Label shown in the title bar
    model_label: String,
    /// Channel to the session loop
    ui_tx: mpsc::Sender<UiMessage>,
    /// Spinner start time for animation
    spinner_start: Instant,
}

impl TuiState {
    fn new(chat: &Chat, ui_tx: mpsc::Sender<UiMessage>) -> Self {
        let mut input = InputBox::new().with_placeholder("Type a schedule or /help...");
        input.set_focused(true);

        let messages = chat
            .session()
            .turns()
            .iter()
            .map(|turn| match turn.role {
                Role::User => ChatMessage::user(turn.text()),
                Role::Assistant => ChatMessage::assistant(turn.text()),
            })
            .collect();

        Self {
            messages,
            input,
            scroll: 0,
            is_processing: false,
            status: "Ready".to_string(),
            theme: Theme::dark(),
            total_input_tokens: 0,
            total_output_tokens: 0,
            model_label: chat.config().chain.primary.id.clone(),
            ui_tx,
            spinner_start: Instant::now(),
        }
    }

    /// Handle chat events
    fn handle_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::TurnStart => {
                self.is_processing = true;
            }
            ChatEvent::ReplyStart { model } => {
                self.status = format!("Waiting for {}...", model);
            }
            ChatEvent::ReplyUpdate { text } => {
                if let Some(last) = self.messages.last_mut() {
                    if last.is_streaming {
                        last.content = text;
                        self.scroll_to_bottom();
                        return;
                    }
                }
                self.messages.push(ChatMessage::assistant_streaming(text));
                self.scroll_to_bottom();
            }
            ChatEvent::FallbackStart { from, to } => {
                // Drop whatever the failed attempt streamed; the fallback
                // starts its reply from scratch
                self.pop_streaming_message();
                self.messages.push(ChatMessage::system(format!(
                    "{} is unavailable, retrying with {}",
                    from, to
                )));
                self.messages.push(ChatMessage::assistant_streaming(""));
                self.status = format!("Waiting for {}...", to);
                self.scroll_to_bottom();
            }
            ChatEvent::ReplyEnd { turn, usage } => {
                self.total_input_tokens += usage.input;
                self.total_output_tokens += usage.output;
                self.finish_reply(turn.text());
                self.scroll_to_bottom();
            }
            ChatEvent::Error { message } => {
                // No partial reply survives a failed turn
                self.pop_streaming_message();
                self.messages
                    .push(ChatMessage::error(format!("Error: {}", message)));
                self.scroll_to_bottom();
            }
        }
    }

    /// Replace the in-progress reply with the final text
    fn finish_reply(&mut self, text: String) {
        if let Some(last) = self.messages.last_mut() {
            if last.is_streaming {
                last.content = text;
                last.is_streaming = false;
                return;
            }
        }
        self.messages.push(ChatMessage::assistant(text));
    }

    /// Remove the in-progress reply placeholder, if one is showing
    fn pop_streaming_message(&mut self) {
        if self.messages.last().is_some_and(|m| m.is_streaming) {
            self.messages.pop();
        }
    }

    fn scroll_to_bottom(&mut self) {
        // Resolved against content height during render
        self.scroll = usize::MAX;
    }

    fn show_system_message(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::system(content));
        self.scroll_to_bottom();
    }

    fn ready_status(&mut self) {
        self.status = format!(
            "Ready | {} in, {} out",
            self.total_input_tokens, self.total_output_tokens
        );
    }

    /// Handle a keyboard action. Returns false to quit.
    async fn handle_action(&mut self, action: Action, width: u16) -> bool {
        match action {
            Action::Submit => {
                let content = self.input.content().to_string();
                // One in-flight call at a time: submission is disabled
                // while processing, not queued
                if !content.is_empty() && !self.is_processing {
                    self.input.clear();
                    if content.starts_with('/') {
                        let _ = self.ui_tx.send(UiMessage::Command(content)).await;
                    } else {
                        self.messages.push(ChatMessage::user(&content));
                        self.scroll_to_bottom();
                        let _ = self.ui_tx.send(UiMessage::Submit(content)).await;
                    }
                }
                true
            }
            Action::Quit | Action::Eof => {
                let _ = self.ui_tx.send(UiMessage::Quit).await;
                false
            }
            Action::Interrupt | Action::Escape => {
                if self.is_processing {
                    let _ = self.ui_tx.send(UiMessage::Abort).await;
                    self.status = "Cancelling...".to_string();
                    true
                } else {
                    let _ = self.ui_tx.send(UiMessage::Quit).await;
                    false
                }
            }
            Action::PageUp => {
                self.scroll = self.scroll.saturating_sub(10);
                true
            }
            Action::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                true
            }
            Action::Clear => {
                let _ = self.ui_tx.send(UiMessage::Clear).await;
                true
            }
            _ => {
                self.input.handle_action(&action, width);
                true
            }
        }
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),    // Transcript
                Constraint::Length(1), // Status
                Constraint::Length(3), // Input
            ])
            .split(size);

        self.render_messages(frame, chunks[0]);
        self.render_status(frame, chunks[1]);
        self.input
            .render(chunks[2], frame.buffer_mut(), &self.theme);
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!(" almanac │ {} ", self.model_label);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(title);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 {
            return;
        }

        let content_height = calculate_message_height(&self.messages, inner.width as usize);

        if self.scroll == usize::MAX {
            self.scroll = content_height.saturating_sub(inner.height as usize);
        } else {
            self.scroll = self
                .scroll
                .min(content_height.saturating_sub(inner.height as usize));
        }

        let message_list = MessageList::new(&self.messages, &self.theme).scroll(self.scroll);
        frame.render_widget(message_list, inner);

        if content_height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");

            let mut scrollbar_state = ScrollbarState::new(content_height)
                .position(self.scroll)
                .viewport_content_length(inner.height as usize);

            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if self.is_processing {
            let spinner =
                Spinner::new(&self.status, &self.theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        let left_content = format!("{} │ {}", self.model_label, self.status);
        let right_content = "Ctrl+L: clear │ Ctrl+C: quit │ /help: commands";

        let left_width = left_content.chars().count();
        let right_width = right_content.chars().count();
        let available = area.width as usize;

        let line = if left_width + right_width + 2 <= available {
            let spacing = available - left_width - right_width;
            Line::from(vec![
                Span::styled(&left_content, self.theme.dim_style()),
                Span::raw(" ".repeat(spacing)),
                Span::styled(right_content, self.theme.dim_style()),
            ])
        } else {
            Line::from(Span::styled(&left_content, self.theme.dim_style()))
        };

        frame.render_widget(Paragraph::new(line), area);
    }
}

/// Run the TUI application
pub async fn run_tui(chat: &mut Chat) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (ui_tx, mut ui_rx) = mpsc::channel::<UiMessage>(32);
    let mut state = TuiState::new(chat, ui_tx);
    let mut chat_rx = chat.subscribe();
    let mut event_stream = EventStream::new();
    let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(80));

    // Prompt queued for the next loop iteration, so the send future can be
    // created where its content is still in scope
    let mut pending_prompt: Option<String> = None;

    let result = loop {
        if let Some(content) = pending_prompt.take() {
            state.is_processing = true;
            state.spinner_start = Instant::now();
            state.status = "Thinking...".to_string();
            state.messages.push(ChatMessage::assistant_streaming(""));
            state.scroll_to_bottom();

            // Cancellation goes through the handle so the in-flight borrow
            // of the chat stays with the send future
            let handle = chat.handle();
            let mut send_future = std::pin::pin!(chat.send(&content));

            loop {
                terminal.draw(|frame| state.render(frame))?;
                let area_width = terminal.size()?.width;

                tokio::select! {
                    biased;

                    result = &mut send_future => {
                        // Failures were already surfaced as Error events
                        if let Err(e) = result {
                            tracing::debug!(error = %e, "turn failed");
                        }
                        break;
                    }

                    event = chat_rx.recv() => {
                        if let Ok(chat_event) = event {
                            state.handle_chat_event(chat_event);
                        }
                    }

                    event = event_stream.next() => {
                        match event {
                            Some(Ok(Event::Key(key))) => {
                                let action = key_to_action(key);
                                match action {
                                    Action::Interrupt | Action::Escape => {
                                        handle.abort();
                                        state.status = "Cancelling...".to_string();
                                    }
                                    Action::Quit | Action::Eof => {
                                        restore_terminal(&mut terminal)?;
                                        return Ok(());
                                    }
                                    _ => {
                                        // Typing stays live; submit is disabled
                                        state.input.handle_action(&action, area_width);
                                    }
                                }
                            }
                            Some(Ok(Event::Paste(text))) => {
                                state.input.handle_action(&Action::Paste(text), area_width);
                            }
                            Some(Ok(Event::Mouse(mouse))) => match mouse.kind {
                                MouseEventKind::ScrollUp => {
                                    state.scroll = state.scroll.saturating_sub(3);
                                }
                                MouseEventKind::ScrollDown => {
                                    state.scroll = state.scroll.saturating_add(3);
                                }
                                _ => {}
                            },
                            Some(Ok(_)) => {}
                            Some(Err(_)) | None => {
                                restore_terminal(&mut terminal)?;
                                return Ok(());
                            }
                        }
                    }

                    _ = tick_interval.tick() => {}
                }
            }

            // Drain any remaining chat events after the turn completes
            while let Ok(chat_event) = chat_rx.try_recv() {
                state.handle_chat_event(chat_event);
            }

            state.is_processing = false;
            state.ready_status();
            terminal.draw(|frame| state.render(frame))?;
            continue;
        }

        terminal.draw(|frame| state.render(frame))?;
        let area_width = terminal.size()?.width;

        tokio::select! {
            biased;

            event = chat_rx.recv() => {
                if let Ok(chat_event) = event {
                    state.handle_chat_event(chat_event);
                }
            }

            event = event_stream.next() => {
                match event {
                    Some(Ok(Event::Key(key))) => {
                        let action = key_to_action(key);
                        if !state.handle_action(action, area_width).await {
                            break Ok(());
                        }
                    }
                    Some(Ok(Event::Paste(text))) => {
                        state.handle_action(Action::Paste(text), area_width).await;
                    }
                    Some(Ok(Event::Mouse(mouse))) => match mouse.kind {
                        MouseEventKind::ScrollUp => {
                            state.scroll = state.scroll.saturating_sub(3);
                        }
                        MouseEventKind::ScrollDown => {
                            state.scroll = state.scroll.saturating_add(3);
                        }
                        _ => {}
                    },
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        break Err(anyhow::anyhow!("Event error: {}", e));
                    }
                    None => {
                        break Ok(());
                    }
                }
            }

            _ = tick_interval.tick() => {}

            msg = ui_rx.recv() => {
                match msg {
                    Some(UiMessage::Submit(content)) => {
                        pending_prompt = Some(content);
                    }
                    Some(UiMessage::Command(cmd)) => {
                        if !handle_command(&cmd, chat, &mut state) {
                            break Ok(());
                        }
                    }
                    Some(UiMessage::Clear) => {
                        clear_conversation(chat, &mut state);
                    }
                    Some(UiMessage::Abort) => {
                        chat.abort();
                    }
                    Some(UiMessage::Quit) | None => {
                        break Ok(());
                    }
                }
            }
        }
    };

    restore_terminal(&mut terminal)?;
    result
}

/// Execute a slash command. Returns false to quit.
fn handle_command(cmd: &str, chat: &mut Chat, state: &mut TuiState) -> bool {
    let Some(result) = commands::parse_command(cmd) else {
        return true;
    };

    match result {
        CommandResult::Help => {
            state.show_system_message(commands::help_text());
        }
        CommandResult::Clear => {
            clear_conversation(chat, state);
        }
        CommandResult::Exit => return false,
        CommandResult::Attach(path) => match Attachment::load(&path) {
            Ok(attachment) => {
                state.show_system_message(format!(
                    "Attached {} ({})",
                    attachment.label(),
                    attachment.mime_type()
                ));
                chat.attach(attachment);
            }
            Err(e) => {
                state
                    .messages
                    .push(ChatMessage::error(format!(
                        "Could not attach {}: {}",
                        path.display(),
                        e
                    )));
                state.scroll_to_bottom();
            }
        },
        CommandResult::Detach => {
            if chat.detach() {
                state.show_system_message("Attachment removed.");
            } else {
                state.show_system_message("No attachment to remove.");
            }
        }
        CommandResult::Unknown(cmd) => {
            state.show_system_message(format!(
                "Unknown command: /{}\nType /help for available commands.",
                cmd
            ));
        }
    }
    true
}

fn clear_conversation(chat: &mut Chat, state: &mut TuiState) {
    chat.clear();
    chat.push_assistant(crate::GREETING);
    state.messages.clear();
    state
        .messages
        .push(ChatMessage::assistant(crate::GREETING));
    state.total_input_tokens = 0;
    state.total_output_tokens = 0;
    state.scroll = 0;
    state.status = "Cleared".to_string();
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
