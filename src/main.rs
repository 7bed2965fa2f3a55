use anyhow::{Context, Result};
use clap::Parser;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use voxtalk_core::{LinkState, SessionEvent, SpeakingTracker, UiCommand};

#[derive(Parser)]
#[command(name = "voxtalk", about = "Full-duplex voice agent client")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Print conversation to stdout instead of running the TUI
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = voxtalk_core::AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    // Resolve the API key before touching any audio device, so a missing
    // key fails fast with a clear message.
    let api_key = config
        .resolve_api_key()
        .with_context(|| format!("set the {} environment variable", config.agent.api_key_env))?;

    // Set up TUI log buffer and layered tracing subscriber
    let log_buffer = Arc::new(Mutex::new(VecDeque::<voxtalk_tui::LogLine>::new()));
    let log_capture = voxtalk_tui::LogCaptureLayer::new(Arc::clone(&log_buffer), 1000);

    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(log_capture);

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::info!("voxtalk starting");

    let wire_rate = config.audio.sample_rate;
    let tracker = Arc::new(SpeakingTracker::new(Duration::from_millis(
        config.audio.grace_period_ms,
    )));

    let device_manager = voxtalk_audio::DeviceManager::new();

    tracing::info!("using input device: {}", config.audio.input_device);
    let input_device = device_manager
        .get_input_device(&config.audio.input_device)
        .with_context(|| format!("failed to get input device: {}", config.audio.input_device))?;

    tracing::info!("using output device: {}", config.audio.output_device);
    let output_device = device_manager
        .get_output_device(&config.audio.output_device)
        .with_context(|| {
            format!("failed to get output device: {}", config.audio.output_device)
        })?;

    let input_config = voxtalk_audio::device::negotiate_input_config(
        &input_device,
        wire_rate,
        config.audio.buffer_size,
    )
    .context("no usable input stream config")?;
    let output_config = voxtalk_audio::device::negotiate_output_config(
        &output_device,
        wire_rate,
        config.audio.buffer_size,
    )
    .context("no usable output stream config")?;

    // Output ring buffer: ~2 seconds of audio at the device rate
    let ring_capacity = output_config.sample_rate.0 as usize * 2;
    let (out_producer, out_consumer) = voxtalk_audio::create_ring_buffer(ring_capacity);

    let sink = voxtalk_audio::PlaybackSink::new(Arc::clone(&tracker));
    let playback_worker = sink.start(
        out_producer,
        wire_rate,
        output_config.sample_rate.0,
        Duration::from_millis(5),
    );

    let (_output, output_handle) = voxtalk_audio::OutputNode::new(
        &output_device,
        &output_config,
        out_consumer,
        sink.flush_flag(),
    )
    .context("failed to create output node")?;

    let gate = Arc::new(voxtalk_audio::CaptureGate::new(Arc::clone(&tracker)));
    let (mic_tx, mic_rx) = tokio::sync::mpsc::unbounded_channel();
    let (_capture, capture_handle) =
        voxtalk_audio::CaptureNode::new(&input_device, &input_config, wire_rate, gate, mic_tx)
            .context("failed to create capture node")?;

    tracing::info!(
        "audio up: mic {}Hz -> wire {}Hz -> speaker {}Hz",
        input_config.sample_rate.0,
        wire_rate,
        output_config.sample_rate.0,
    );

    // Session wiring: events flow session -> forwarder -> UI, commands flow
    // UI -> handler, stop flows everywhere via the watch channel.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<SessionEvent>();
    let (ui_event_tx, ui_event_rx) = tokio::sync::mpsc::unbounded_channel::<SessionEvent>();
    let (state_tx, state_rx) = tokio::sync::watch::channel(LinkState::default());
    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::unbounded_channel::<UiCommand>();
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    let connected = Arc::new(AtomicBool::new(false));

    let dispatcher = voxtalk_agent::Dispatcher::new(Arc::clone(&tracker), sink.clone());
    let session = voxtalk_agent::Session::new(config.agent.clone(), wire_rate);
    let session_task = tokio::spawn(async move {
        session
            .run(&api_key, mic_rx, dispatcher, event_tx, stop_rx)
            .await
    });

    // Forward session events to the UI, keeping the connected flag current.
    let forward_connected = Arc::clone(&connected);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::Connected => forward_connected.store(true, Ordering::Relaxed),
                SessionEvent::Closed => forward_connected.store(false, Ordering::Relaxed),
                _ => {}
            }
            if ui_event_tx.send(event).is_err() {
                break;
            }
        }
    });

    // State broadcast task (~30Hz)
    let broadcast_connected = Arc::clone(&connected);
    let broadcast_tracker = Arc::clone(&tracker);
    let broadcast_capture = capture_handle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(33));
        loop {
            interval.tick().await;
            let state = LinkState {
                connected: broadcast_connected.load(Ordering::Relaxed),
                agent_speaking: broadcast_tracker.is_speaking(),
                mic_muted: broadcast_capture.is_muted(),
            };
            if state_tx.send(state).is_err() {
                break; // UI closed
            }
        }
    });

    // Command handler task
    let cmd_capture = capture_handle.clone();
    let cmd_stop = stop_tx.clone();
    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                UiCommand::SetMicMuted(muted) => {
                    tracing::info!("mic {}", if muted { "muted" } else { "unmuted" });
                    cmd_capture.set_muted(muted);
                }
                UiCommand::Quit => {
                    let _ = cmd_stop.send(true);
                    break;
                }
            }
        }
    });

    if cli.headless {
        run_headless(ui_event_rx, stop_tx.clone()).await;
    } else {
        tracing::info!("TUI active, press 'q' to quit");
        voxtalk_tui::run(state_rx, ui_event_rx, cmd_tx, log_buffer)
            .await
            .context("TUI error")?;
    }

    tracing::info!("shutting down");
    let _ = stop_tx.send(true);
    match session_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("session ended with error: {}", e),
        Err(e) => tracing::error!("session task panicked: {}", e),
    }
    playback_worker.stop();

    if capture_handle.had_error() || output_handle.has_errored() {
        tracing::warn!("an audio stream reported errors during the session");
    }

    Ok(())
}

/// Print conversation events to stdout until Ctrl-C or the session closes.
async fn run_headless(
    mut events: tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
    stop_tx: tokio::sync::watch::Sender<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("interrupted, closing session");
                let _ = stop_tx.send(true);
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::Connected => {
                        println!("connection established, speak to begin");
                    }
                    SessionEvent::Welcome { session_id } => {
                        if let Some(id) = session_id {
                            println!("session {}", id);
                        }
                    }
                    SessionEvent::Ready => {
                        println!("settings applied, you can interrupt at any time");
                    }
                    SessionEvent::Transcript { role, content } => {
                        println!("{}: {}", role, content);
                    }
                    SessionEvent::Listening => println!("[listening]"),
                    SessionEvent::Thinking => println!("[thinking]"),
                    SessionEvent::EndOfThought => println!("[preparing response]"),
                    SessionEvent::AgentSpeaking => println!("[speaking]"),
                    SessionEvent::AgentFinished => println!("[done speaking]"),
                    SessionEvent::FirstAudio => println!("[receiving audio]"),
                    SessionEvent::BargeIn => println!("[you interrupted the assistant]"),
                    SessionEvent::Interrupted => println!("[assistant interrupted]"),
                    SessionEvent::FunctionCalling => println!("[calling function]"),
                    SessionEvent::Unknown(raw) => {
                        tracing::debug!("unhandled event: {}", raw);
                    }
                    SessionEvent::AgentError(description) => {
                        eprintln!("agent error: {}", description);
                    }
                    SessionEvent::Closed => {
                        println!("connection closed");
                        break;
                    }
                }
            }
        }
    }
}
