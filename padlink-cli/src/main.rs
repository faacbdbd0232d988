mod commands;
mod console;

use std::fs::File;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use padlink_core::prefs::{prefs_path, PANELS};
use padlink_core::{Config, ControlSurface, Input, Session, UiPrefs};
use padlink_net::WsConnector;

use commands::{Line, PanelCommand, HELP};
use console::Console;

/// How long the loop sleeps waiting for input before driving the session.
const TICK: Duration = Duration::from_millis(5);

fn init_logging(verbose: bool, log_path: Option<PathBuf>) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = log_path.unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("padlink")
            .join("padlink.log")
    });

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = File::create(&log_path).unwrap_or_else(|_| {
        File::create("/tmp/padlink.log").expect("Cannot create log file")
    });

    WriteLogger::init(log_level, simplelog::Config::default(), log_file)
        .expect("Failed to initialize logger");

    log::info!("padlink starting (log level: {:?})", log_level);
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
}

fn main() -> io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose, flag_value(&args, "--log-file").map(PathBuf::from));

    let mut config = match flag_value(&args, "--config") {
        Some(path) => Config::load_from(&PathBuf::from(path)),
        None => Config::load(),
    };
    if let Some(url) = flag_value(&args, "--url") {
        config.set_url(url);
    }

    let prefs_file = prefs_path();
    let mut prefs = prefs_file
        .as_deref()
        .map(|p| UiPrefs::load(p, &PANELS))
        .unwrap_or_else(|| UiPrefs::for_sections(&PANELS));

    let mut session = Session::new(&config, Box::new(WsConnector::new()));
    session.add_observer(Box::new(Console::new(io::stdout(), verbose)));

    // Stdin blocks, so it gets its own thread; the loop below owns the session.
    let (tx, rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("padlink-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;

    println!("padlink: connecting to {} (type help)", config.url());
    let clock = Instant::now();
    session.start(clock.elapsed());

    loop {
        match rx.recv_timeout(TICK) {
            Ok(text) if text.trim().is_empty() => {}
            Ok(text) => match commands::parse(&text) {
                Ok(Line::Quit) => break,
                Ok(line) => {
                    let touches_prefs = matches!(line, Line::Panel(_));
                    // Let input see the same clock the timers do.
                    session.advance(clock.elapsed());
                    if let Err(e) = run_line(&mut session, &mut prefs, line) {
                        println!("error: {}", e);
                    }
                    if let (true, Some(path)) = (touches_prefs, prefs_file.as_deref()) {
                        if let Err(e) = prefs.save(path) {
                            log::warn!("Could not save prefs: {}", e);
                        }
                    }
                }
                Err(e) => println!("{}", e),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        session.advance(clock.elapsed());
    }

    session.shutdown();
    log::info!("padlink exiting");
    Ok(())
}

fn run_line(session: &mut Session, prefs: &mut UiPrefs, line: Line) -> Result<(), String> {
    match line {
        Line::Input(input) => session.handle(input).map_err(|e| e.to_string())?,
        Line::Tap(key) => {
            session.handle(Input::KeyDown(key)).map_err(|e| e.to_string())?;
            session.handle(Input::KeyUp(key)).map_err(|e| e.to_string())?;
        }
        Line::Hit(pad) => {
            session.handle(Input::PadPress(pad)).map_err(|e| e.to_string())?;
            session.handle(Input::PadRelease(pad)).map_err(|e| e.to_string())?;
        }
        Line::OpenSelector(pad) => session.open_selector(pad).map_err(|e| e.to_string())?,
        Line::CloseSelector => session.close_selector(),
        Line::Choose { pad, name } => session.choose_sample(pad, &name).map_err(|e| e.to_string())?,
        Line::Audition { family, name } => {
            session.audition(&family, &name).map_err(|e| e.to_string())?
        }
        Line::RefreshSamples => session.refresh_samples().map_err(|e| e.to_string())?,
        Line::SampleFilter(filter) => session.set_sample_filter(filter),
        Line::ShowSamples => {
            for family in session.catalog().families() {
                let names: Vec<&str> = session
                    .catalog()
                    .samples(family)
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect();
                println!("{}: {}", family, names.join(", "));
            }
        }
        Line::Panel(command) => run_panel(prefs, command)?,
        Line::Status => println!("{}", console::status(session.store(), session.is_connected())),
        Line::Help => println!("{}", HELP),
        Line::Quit => {}
    }
    Ok(())
}

fn run_panel(prefs: &mut UiPrefs, command: PanelCommand) -> Result<(), String> {
    match command {
        PanelCommand::List => {
            for panel in &prefs.panel_order {
                let tab = prefs.current_tab.as_deref() == Some(panel.as_str());
                println!(
                    "{} {}{}",
                    if tab { '>' } else { ' ' },
                    panel,
                    if prefs.is_visible(panel) { "" } else { " (hidden)" }
                );
            }
        }
        PanelCommand::Toggle(panel) => match prefs.toggle_panel(&panel) {
            Some(visible) => println!("{} {}", panel, if visible { "shown" } else { "hidden" }),
            None => return Err(format!("no panel named {}", panel)),
        },
        PanelCommand::Move(panel, index) => {
            if !prefs.move_panel(&panel, index) {
                return Err(format!("no panel named {}", panel));
            }
        }
        PanelCommand::Tab(tab) => {
            if !prefs.select_tab(&tab) {
                return Err(format!("no panel named {}", tab));
            }
        }
    }
    Ok(())
}
