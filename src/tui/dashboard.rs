//! Live dashboard for a running check

use crate::proxy::{PoolRunner, ProbeResult, Progress, ProxyEntry};
use crate::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Duration;

/// Recent proxies kept per list for display
const MAX_RECENT: usize = 100;

/// Which side of the dashboard has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Working,
    Failed,
}

/// Dashboard state for one run
pub struct CheckerDashboard {
    runner: PoolRunner,
    entries: Vec<ProxyEntry>,
    progress: Progress,
    results: Vec<ProbeResult>,
    recent_working: VecDeque<ProbeResult>,
    recent_failed: VecDeque<ProbeResult>,
    pane: Pane,
    list_state: ListState,
    status_message: String,
    is_complete: bool,
    should_quit: bool,
}

impl CheckerDashboard {
    pub fn new(runner: PoolRunner, entries: Vec<ProxyEntry>) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            runner,
            progress: Progress::new(entries.len()),
            entries,
            results: Vec::new(),
            recent_working: VecDeque::new(),
            recent_failed: VecDeque::new(),
            pane: Pane::Working,
            list_state,
            status_message: "Starting proxy check... Press 'q' to quit.".to_string(),
            is_complete: false,
            should_quit: false,
        }
    }

    /// Take over the terminal until the user quits.
    ///
    /// Returns every result gathered so far; quitting early stops collecting.
    pub async fn run(mut self) -> Result<Vec<ProbeResult>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let outcome = self.run_app(&mut terminal).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        outcome?;
        Ok(self.results)
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let mut rx = self.runner.check_proxies_stream(std::mem::take(&mut self.entries));

        while !self.should_quit {
            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                    }
                }
            }

            // Drain whatever finished since the last frame
            loop {
                match rx.try_recv() {
                    Ok(result) => self.record(result),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if !self.is_complete {
                            self.is_complete = true;
                            self.status_message = format!(
                                "Complete! Checked: {} | Working: {} | Failed: {} | Press 'q' to continue",
                                self.progress.total,
                                self.progress.working,
                                self.progress.failed()
                            );
                        }
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn record(&mut self, result: ProbeResult) {
        self.progress.record(&result);

        let recent = if result.is_working() {
            &mut self.recent_working
        } else {
            &mut self.recent_failed
        };
        recent.push_back(result.clone());
        if recent.len() > MAX_RECENT {
            recent.pop_front();
        }
        self.results.push(result);

        self.status_message = format!(
            "Checking... {}% ({}/{}) | Working: {} | Failed: {}",
            self.progress.percent(),
            self.progress.checked,
            self.progress.total,
            self.progress.working,
            self.progress.failed()
        );
    }

    fn focused_len(&self) -> usize {
        match self.pane {
            Pane::Working => self.recent_working.len(),
            Pane::Failed => self.recent_failed.len(),
        }
    }

    fn handle_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => {
                self.pane = match self.pane {
                    Pane::Working => Pane::Failed,
                    Pane::Failed => Pane::Working,
                };
                self.list_state.select(Some(0));
            }
            KeyCode::Down => {
                let len = self.focused_len();
                let i = match self.list_state.selected() {
                    Some(i) if i + 1 < len => i + 1,
                    _ => 0,
                };
                self.list_state.select(Some(i));
            }
            KeyCode::Up => {
                let len = self.focused_len();
                let i = match self.list_state.selected() {
                    Some(0) | None => len.saturating_sub(1),
                    Some(i) => i - 1,
                };
                self.list_state.select(Some(i));
            }
            _ => {}
        }
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Progress bar
                Constraint::Min(0),    // Proxy lists
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new(format!("Proxy Checker ({} mode)", self.runner.checker().config().mode))
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let percent = self.progress.percent().min(100);
        let label = format!("{}/{} ({}%)", self.progress.checked, self.progress.total, percent);
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .percent(percent)
            .label(label);
        f.render_widget(gauge, chunks[1]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);

        let focus = self.pane;
        render_list(
            f,
            columns[0],
            ListView {
                title: "✓ Working",
                results: &self.recent_working,
                total: self.progress.working,
                color: Color::Green,
            },
            (focus == Pane::Working).then_some(&mut self.list_state),
        );
        render_list(
            f,
            columns[1],
            ListView {
                title: "✗ Failed",
                results: &self.recent_failed,
                total: self.progress.failed(),
                color: Color::Red,
            },
            (focus == Pane::Failed).then_some(&mut self.list_state),
        );

        let status = Paragraph::new(self.status_message.clone())
            .style(if self.is_complete {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            })
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[3]);
    }
}

struct ListView<'a> {
    title: &'a str,
    results: &'a VecDeque<ProbeResult>,
    total: usize,
    color: Color,
}

/// One list row: address, plus response time for working proxies
fn row_text(result: &ProbeResult) -> String {
    match result.response_time_ms {
        Some(ms) => format!("{} ({}ms)", result.address, ms),
        None => match result.errors.first() {
            Some(error) => format!("{} - {}", result.address, error),
            None => result.address.clone(),
        },
    }
}

fn render_list(f: &mut Frame, area: Rect, view: ListView<'_>, state: Option<&mut ListState>) {
    let items: Vec<ListItem> = view
        .results
        .iter()
        .rev() // Newest first
        .map(|result| ListItem::new(row_text(result)).style(Style::default().fg(view.color)))
        .collect();

    let border_style = if state.is_some() {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} ({})", view.title, view.total))
                .border_style(border_style),
        )
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol(">> ");

    match state {
        Some(state) => f.render_stateful_widget(list, area, state),
        None => f.render_widget(list, area),
    }
}
