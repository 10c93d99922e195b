use crate::app::App;
use crate::chat_view::draw_chat;
use crate::key_handlers::handle_chat_input;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, Mutex};

enum Event {
    Input(CEvent),
    Tick,
}

/// Sets up the terminal, runs the chat loop, and restores the terminal on
/// the way out.
pub async fn run_ui(app: Arc<Mutex<App>>) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        eprintln!("{:?}", err);
    }
    res
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: Arc<Mutex<App>>,
) -> Result<(), Box<dyn Error>> {
    let (tx, mut rx) = mpsc::channel::<Event>(100);

    // Input reader + ticker. Crossterm polling happens off the async
    // runtime's main path so the draw loop never blocks on the keyboard.
    std::thread::spawn(move || {
        let tick_rate = Duration::from_millis(100);
        let mut last_tick = Instant::now();
        loop {
            if event::poll(Duration::from_millis(50)).unwrap_or(false) {
                if let Ok(evt) = event::read() {
                    if tx.blocking_send(Event::Input(evt)).is_err() {
                        return;
                    }
                }
            }
            if last_tick.elapsed() >= tick_rate {
                if tx.blocking_send(Event::Tick).is_err() {
                    return;
                }
                last_tick = Instant::now();
            }
        }
    });

    loop {
        {
            let mut guard = app.lock().await;
            terminal.draw(|f| draw_chat(f, &mut guard))?;
            if guard.should_quit {
                break;
            }
        }

        match rx.recv().await {
            Some(Event::Input(CEvent::Key(key))) => {
                handle_chat_input(key, &app).await;
            }
            Some(Event::Input(_)) => {}
            Some(Event::Tick) => {
                let mut guard = app.lock().await;
                if guard.responding {
                    guard.status_indicator.update_spinner();
                }
            }
            None => break,
        }
    }

    Ok(())
}
