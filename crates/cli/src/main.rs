// Terminal front end for the Cadence playback engine
//
// Usage: cadence [file]
// Reads single-letter commands from stdin while the clip plays.

mod command;
mod controller;

use cadence_clip::ClipProvider;
use command::{Command, HELP};
use controller::Controller;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_millis()
            .try_init();
    });
}

fn main() -> ExitCode {
    init_logging();

    let controller = Controller::new(Arc::new(ClipProvider::new()));

    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        if let Err(e) = controller.open(&path) {
            eprintln!("cadence: {}", e);
            return ExitCode::FAILURE;
        }
    } else {
        println!("no file given; use 'o <file>' to open one");
    }
    println!("{}", HELP);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read stdin: {}", e);
                break;
            }
        };

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(command::ParseError::Empty) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        let result = match command {
            Command::Play => controller.replay().map_err(|e| e.to_string()),
            Command::Pause => controller.pause().map_err(|e| e.to_string()),
            Command::Resume => controller.resume().map_err(|e| e.to_string()),
            Command::Stop => controller.stop().map_err(|e| e.to_string()),
            Command::Open(path) => controller.open(&path).map_err(|e| e.to_string()),
            Command::Status => {
                println!("{}", controller.status_line());
                Ok(())
            }
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Quit => break,
        };
        if let Err(message) = result {
            println!("{}", message);
        }
    }

    controller.shutdown();
    log::info!("Exiting in state {}", controller.state());
    ExitCode::SUCCESS
}
