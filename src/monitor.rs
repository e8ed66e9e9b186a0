//! Live terminal dashboard for a running [`Session`].
//!
//! Drawing only reads a [`Snapshot`], so the dashboard never touches the
//! worker's state directly.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};

use crate::protocol::Command;
use crate::session::{Session, Snapshot};

const REFRESH: Duration = Duration::from_millis(100);

/// Draws one frame of the dashboard.
pub fn draw(frame: &mut Frame, port: &str, running: bool, snapshot: &Snapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Min(0),
        ])
        .split(frame.size());

    let status = if running {
        Span::styled("running", Style::default().fg(Color::Green))
    } else {
        Span::styled("stopped", Style::default().fg(Color::Red))
    };
    let state = &snapshot.state;
    let position = Paragraph::new(vec![
        Line::from(vec![Span::raw("Port:       "), Span::raw(port.to_string()), Span::raw("  "), status]),
        Line::from(vec![
            Span::raw("Azimuth:    "),
            Span::styled(format!("{:.1}°", state.azimuth), bold()),
        ]),
        Line::from(vec![
            Span::raw("Elevation:  "),
            Span::styled(format!("{:.1}°", state.elevation), bold()),
        ]),
        Line::from(format!(
            "Resolution: {} pulses/degree",
            state.resolution.pulses_per_degree()
        )),
    ])
    .block(Block::default().title(" ROT2Prog Simulator ").borders(Borders::ALL));
    frame.render_widget(position, chunks[0]);

    let traffic = Paragraph::new(vec![
        Line::from(format!("Last command:      {}", describe(snapshot.last_command))),
        Line::from(format!("Frames received:   {}", snapshot.frames_received)),
        Line::from(format!("Responses sent:    {}", snapshot.responses_sent)),
        Line::from(format!("Incomplete frames: {}", snapshot.incomplete_frames)),
        Line::from(format!("Invalid commands:  {}", snapshot.invalid_commands)),
    ])
    .block(Block::default().title(" Traffic ").borders(Borders::ALL));
    frame.render_widget(traffic, chunks[1]);

    let help = Paragraph::new("Press 'q' or Esc to stop the simulator.");
    frame.render_widget(help, chunks[2]);
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn describe(command: Option<Command>) -> String {
    match command {
        None => String::from("-"),
        Some(Command::Stop) => String::from("Stop"),
        Some(Command::Status) => String::from("Status"),
        Some(Command::Set { h, v }) => format!("Set (H={h}, V={v})"),
        Some(Command::Invalid(code)) => format!("Invalid (K = {code:#04x})"),
    }
}

/// Runs the dashboard until the user quits or the worker stops.
///
/// Takes over the terminal (raw mode, alternate screen) and restores it on
/// the way out, even when drawing fails.
pub fn run(session: &Session, port: &str) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, session, port);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, session: &Session, port: &str) -> io::Result<()> {
    loop {
        let snapshot = session.snapshot();
        let running = session.is_running();
        terminal.draw(|frame| draw(frame, port, running, &snapshot))?;
        if !running {
            return Ok(());
        }

        if event::poll(REFRESH)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    return Ok(());
                }
            }
        }
    }
}
