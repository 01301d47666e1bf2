// Progress ticker
// Periodically samples the engine position and pushes it to a display sink.

use crate::config::TickerConfig;
use crate::engine::PlaybackEngine;
use crate::state::TickerState;
use crate::time::{format_hms, ZERO_HMS};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Where the ticker reads time from
pub trait PositionSource: Send + Sync {
    /// Current position, or None once the source has been released
    fn position_seconds(&self) -> Option<u64>;

    fn duration_seconds(&self) -> u64;
}

impl PositionSource for PlaybackEngine {
    fn position_seconds(&self) -> Option<u64> {
        self.current_position_seconds().ok()
    }

    fn duration_seconds(&self) -> u64 {
        PlaybackEngine::duration_seconds(self)
    }
}

/// Receiver of display updates
pub trait DisplaySink: Send + Sync {
    /// `progress_value` is elapsed seconds, bounded by the clip duration
    fn on_progress(&self, formatted_time: &str, progress_value: u64);
}

struct TickerControl {
    state: TickerState,
    /// Bumped on every start/reset; a worker exits once it no longer matches
    generation: u64,
    last_display: (String, u64),
}

struct TickerShared {
    control: Mutex<TickerControl>,
    /// Held by the worker from its state check until the sink returns
    publishing: Mutex<()>,
    wake: Condvar,
    sink: Mutex<Option<Arc<dyn DisplaySink>>>,
    config: TickerConfig,
}

impl TickerShared {
    fn publish(&self, formatted_time: &str, progress_value: u64) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.on_progress(formatted_time, progress_value);
        }
    }

    fn run(&self, generation: u64, source: Arc<dyn PositionSource>) {
        log::debug!("Ticker thread started");
        let interval = self.config.interval;
        let mut next_tick = Instant::now() + interval;

        loop {
            {
                let mut control = self.control.lock();
                loop {
                    if control.generation != generation {
                        log::debug!("Ticker thread exited");
                        return;
                    }
                    match control.state {
                        TickerState::Stopped => return,
                        TickerState::Paused => {
                            self.wake.wait(&mut control);
                            // Count a full interval from the resume
                            next_tick = Instant::now() + interval;
                        }
                        TickerState::Running => {
                            if Instant::now() >= next_tick {
                                break;
                            }
                            let _ = self.wake.wait_until(&mut control, next_tick);
                        }
                    }
                }
            }
            next_tick += interval;

            let Some(position) = source.position_seconds() else {
                log::trace!("Ticker: no source attached, skipping update");
                continue;
            };
            let duration = source.duration_seconds();
            let progress_value = if duration > 0 {
                position.min(duration)
            } else {
                position
            };
            let formatted_time = format_hms(progress_value);

            let _publishing = self.publishing.lock();
            {
                let mut control = self.control.lock();
                if control.generation != generation || control.state != TickerState::Running {
                    continue;
                }
                control.last_display = (formatted_time.clone(), progress_value);
            }
            self.publish(&formatted_time, progress_value);
        }
    }
}

/// Once-per-interval display clock, pausable independently of playback
pub struct ProgressTicker {
    shared: Arc<TickerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressTicker {
    pub fn new() -> Self {
        Self::with_config(TickerConfig::default())
    }

    pub fn with_config(config: TickerConfig) -> Self {
        Self {
            shared: Arc::new(TickerShared {
                control: Mutex::new(TickerControl {
                    state: TickerState::Stopped,
                    generation: 0,
                    last_display: (ZERO_HMS.to_string(), 0),
                }),
                publishing: Mutex::new(()),
                wake: Condvar::new(),
                sink: Mutex::new(None),
                config,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn set_sink(&self, sink: Arc<dyn DisplaySink>) {
        *self.shared.sink.lock() = Some(sink);
    }

    /// Begin updates from position 0, replacing any previous run
    pub fn start(&self, source: Arc<dyn PositionSource>) {
        self.halt();

        let generation = {
            let mut control = self.shared.control.lock();
            control.generation += 1;
            control.state = TickerState::Running;
            control.last_display = (ZERO_HMS.to_string(), 0);
            control.generation
        };
        self.shared.publish(ZERO_HMS, 0);

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("cadence-ticker".to_string())
            .spawn(move || shared.run(generation, source));
        match spawned {
            Ok(handle) => *self.worker.lock() = Some(handle),
            Err(e) => {
                log::error!("Failed to spawn ticker thread: {}", e);
                self.shared.control.lock().state = TickerState::Stopped;
            }
        }
        log::debug!("Ticker started");
    }

    /// Suspend updates, keeping the displayed value.
    /// No update reaches the sink after this returns.
    pub fn pause(&self) {
        {
            let mut control = self.shared.control.lock();
            match control.state {
                TickerState::Running => {
                    control.state = TickerState::Paused;
                    self.shared.wake.notify_all();
                    log::debug!("Ticker paused at {}", control.last_display.0);
                }
                TickerState::Paused => {}
                TickerState::Stopped => {
                    log::debug!("Ticker pause ignored: not running");
                    return;
                }
            }
        }
        self.settle();
    }

    /// Continue updates from the last displayed value
    pub fn resume(&self) {
        let mut control = self.shared.control.lock();
        match control.state {
            TickerState::Paused => {
                control.state = TickerState::Running;
                self.shared.wake.notify_all();
                log::debug!("Ticker resumed");
            }
            TickerState::Running => {}
            TickerState::Stopped => log::debug!("Ticker resume ignored: not running"),
        }
    }

    /// Stop updates and restore the display to zero
    pub fn reset(&self) {
        self.halt();
        self.shared.control.lock().last_display = (ZERO_HMS.to_string(), 0);
        self.shared.publish(ZERO_HMS, 0);
        log::debug!("Ticker reset");
    }

    pub fn state(&self) -> TickerState {
        self.shared.control.lock().state
    }

    /// Last value pushed to the sink
    pub fn last_display(&self) -> (String, u64) {
        self.shared.control.lock().last_display.clone()
    }

    /// Wait out an update already on its way to the sink
    fn settle(&self) {
        if self.on_ticker_thread() {
            return;
        }
        drop(self.shared.publishing.lock());
    }

    fn on_ticker_thread(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map_or(false, |handle| handle.thread().id() == thread::current().id())
    }

    /// Stop the worker and wait for it, leaving the display untouched
    fn halt(&self) {
        {
            let mut control = self.shared.control.lock();
            control.generation += 1;
            control.state = TickerState::Stopped;
            self.shared.wake.notify_all();
        }
        let handle = {
            let mut worker = self.worker.lock();
            match worker.as_ref() {
                // Called from a sink on the ticker thread; it exits by itself
                Some(handle) if handle.thread().id() == thread::current().id() => None,
                _ => worker.take(),
            }
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Ticker thread panicked");
            }
        }
    }
}

impl Default for ProgressTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.halt();
    }
}
