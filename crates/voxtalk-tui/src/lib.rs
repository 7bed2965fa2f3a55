pub mod app;
pub mod log_layer;
pub mod ui;

use std::sync::Arc;

use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use tokio::sync::{mpsc, watch};
use voxtalk_core::{LinkState, SessionEvent, UiCommand};

pub use app::App;
pub use log_layer::{LogBuffer, LogCaptureLayer, LogLine};

/// Run the TUI event loop. Blocks until the user quits.
pub async fn run(
    mut state_rx: watch::Receiver<LinkState>,
    mut event_rx: mpsc::UnboundedReceiver<SessionEvent>,
    cmd_tx: mpsc::UnboundedSender<UiCommand>,
    log_buffer: LogBuffer,
) -> std::io::Result<()> {
    let mut terminal = ratatui::init();
    let result = run_loop(
        &mut terminal,
        &mut state_rx,
        &mut event_rx,
        &cmd_tx,
        &log_buffer,
    )
    .await;
    ratatui::restore();
    result
}

async fn run_loop(
    terminal: &mut DefaultTerminal,
    state_rx: &mut watch::Receiver<LinkState>,
    event_rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    cmd_tx: &mpsc::UnboundedSender<UiCommand>,
    log_buffer: &LogBuffer,
) -> std::io::Result<()> {
    let mut app = App::new(Arc::clone(log_buffer));

    loop {
        // Drain session events and pick up link state changes
        while let Ok(event) = event_rx.try_recv() {
            app.apply_event(event);
        }
        if state_rx.has_changed().unwrap_or(false) {
            app.update_link(state_rx.borrow_and_update().clone());
        }

        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for events with a short timeout so we can re-render on state changes
        if event::poll(std::time::Duration::from_millis(33))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let action = app.handle_key(key);
                    match action {
                        app::AppAction::Quit => {
                            let _ = cmd_tx.send(UiCommand::Quit);
                            break;
                        }
                        app::AppAction::Command(cmd) => {
                            let _ = cmd_tx.send(cmd);
                        }
                        app::AppAction::None => {}
                    }
                }
            }
        }
    }

    Ok(())
}
