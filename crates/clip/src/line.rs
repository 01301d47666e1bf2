// Output line for a decoded clip using cpal
// Supports Windows, macOS, and Linux

use crate::decode::{frames_to_micros, Clip};
use cadence_core::{AudioLine, LineEvent, LineListener, LoadError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Read cursor over a clip, shared with the audio callback
pub(crate) struct Playhead {
    clip: Clip,
    frame: AtomicUsize,
    running: AtomicBool,
}

impl Playhead {
    pub(crate) fn new(clip: Clip) -> Self {
        Self {
            clip,
            frame: AtomicUsize::new(0),
            running: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns the previous running flag
    pub(crate) fn set_running(&self, running: bool) -> bool {
        self.running.swap(running, Ordering::AcqRel)
    }

    pub(crate) fn position_micros(&self) -> u64 {
        frames_to_micros(
            self.frame.load(Ordering::Acquire) as u64,
            self.clip.sample_rate(),
        )
    }

    pub(crate) fn duration_micros(&self) -> u64 {
        self.clip.duration_micros()
    }

    /// Fill `out` from the cursor, padding with silence.
    /// Returns true exactly once, on the call that runs out of data while running.
    pub(crate) fn render(&self, out: &mut [f32]) -> bool {
        if !self.is_running() {
            out.fill(0.0);
            return false;
        }

        let channels = self.clip.channels().max(1) as usize;
        let total = self.clip.frames();
        let start = self.frame.load(Ordering::Acquire).min(total);
        let end = (start + out.len() / channels).min(total);

        let src = &self.clip.samples()[start * channels..end * channels];
        out[..src.len()].copy_from_slice(src);
        out[src.len()..].fill(0.0);
        self.frame.store(end, Ordering::Release);

        end >= total && self.set_running(false)
    }
}

/// Line events are delivered from here, never from the audio callback
fn spawn_dispatcher(
    listener: Arc<RwLock<Option<Arc<dyn LineListener>>>>,
) -> std::io::Result<(Sender<LineEvent>, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel::<LineEvent>();
    let handle = thread::Builder::new()
        .name("cadence-line-events".to_string())
        .spawn(move || {
            for event in rx {
                let listener = listener.read().clone();
                match listener {
                    Some(listener) => listener.on_line_event(event),
                    None => log::trace!("Line event {:?} with no listener", event),
                }
            }
        })?;
    Ok((tx, handle))
}

/// A decoded clip bound to the default output device
pub struct ClipLine {
    playhead: Arc<Playhead>,
    stream: Option<Stream>,
    events: Option<Sender<LineEvent>>,
    dispatcher: Option<JoinHandle<()>>,
    listener: Arc<RwLock<Option<Arc<dyn LineListener>>>>,
}

// SAFETY: cpal's Stream is marked !Send on some platforms. The stream is only
// created, played, paused and dropped through `&mut self`, so it is never
// touched from two threads at once; the audio callback shares nothing but the
// Arc'd playhead and the event sender, which are Send.
#[allow(unsafe_code)]
unsafe impl Send for ClipLine {}

impl ClipLine {
    /// Open an output stream configured to the clip's rate and channel count
    pub fn open(clip: Clip) -> Result<Self, LoadError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| LoadError::DeviceUnavailable("No output device available".to_string()))?;
        log::info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config = StreamConfig {
            channels: clip.channels(),
            sample_rate: cpal::SampleRate(clip.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };
        log::debug!("Stream config: {:?}", config);

        let listener: Arc<RwLock<Option<Arc<dyn LineListener>>>> = Arc::new(RwLock::new(None));
        let (events, dispatcher) = spawn_dispatcher(listener.clone())?;

        let playhead = Arc::new(Playhead::new(clip));
        let callback_playhead = playhead.clone();
        let callback_events = events.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if callback_playhead.render(data) {
                        let _ = callback_events.send(LineEvent::Stop);
                    }
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| {
                LoadError::DeviceUnavailable(format!("Failed to build output stream: {}", e))
            });

        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                drop(events);
                let _ = dispatcher.join();
                return Err(err);
            }
        };
        // Some hosts start streams on creation
        if let Err(e) = stream.pause() {
            log::debug!("Initial stream pause failed: {}", e);
        }

        let _ = events.send(LineEvent::Open);
        Ok(Self {
            playhead,
            stream: Some(stream),
            events: Some(events),
            dispatcher: Some(dispatcher),
            listener,
        })
    }

    fn emit(&self, event: LineEvent) {
        if let Some(events) = self.events.as_ref() {
            let _ = events.send(event);
        }
    }
}

impl AudioLine for ClipLine {
    fn duration_micros(&self) -> u64 {
        self.playhead.duration_micros()
    }

    fn position_micros(&self) -> u64 {
        self.playhead.position_micros()
    }

    fn is_running(&self) -> bool {
        self.playhead.is_running()
    }

    fn start(&mut self) -> Result<(), String> {
        let stream = self.stream.as_ref().ok_or("line closed")?;
        if self.playhead.is_running() {
            return Ok(());
        }
        self.playhead.set_running(true);
        if let Err(e) = stream.play() {
            self.playhead.set_running(false);
            return Err(format!("Failed to start stream: {}", e));
        }
        self.emit(LineEvent::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), String> {
        let was_running = self.playhead.set_running(false);
        if let Some(stream) = self.stream.as_ref() {
            stream
                .pause()
                .map_err(|e| format!("Failed to pause stream: {}", e))?;
        }
        if was_running {
            self.emit(LineEvent::Stop);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.playhead.set_running(false);
        // Dropping the stream stops the callback
        self.stream = None;
        self.emit(LineEvent::Close);
        self.events = None;

        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.thread().id() == thread::current().id() {
                return;
            }
            if dispatcher.join().is_err() {
                log::error!("Line event thread panicked");
            }
        }
        log::debug!("Clip line closed");
    }

    fn set_line_listener(&mut self, listener: Arc<dyn LineListener>) {
        *self.listener.write() = Some(listener);
    }
}

impl Drop for ClipLine {
    fn drop(&mut self) {
        if self.stream.is_some() {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_ramp(frames: usize) -> Clip {
        let samples = (0..frames * 2).map(|i| i as f32 / 1000.0).collect();
        Clip::new(samples, 1000, 2)
    }

    #[test]
    fn test_silent_until_running() {
        let playhead = Playhead::new(stereo_ramp(10));
        let mut out = [1.0f32; 8];
        assert!(!playhead.render(&mut out));
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(playhead.position_micros(), 0);
    }

    #[test]
    fn test_render_advances_and_reports_end_once() {
        let playhead = Playhead::new(stereo_ramp(10));
        playhead.set_running(true);

        let mut out = [0.0f32; 8];
        assert!(!playhead.render(&mut out));
        assert_eq!(out[0], 0.0);
        assert_eq!(out[7], 0.007);
        assert_eq!(playhead.position_micros(), 4_000);

        // 6 frames left, 8 frame buffer
        let mut out = [1.0f32; 16];
        assert!(playhead.render(&mut out));
        assert_eq!(out[0], 0.008);
        assert_eq!(out[11], 0.019);
        assert!(out[12..].iter().all(|s| *s == 0.0));
        assert!(!playhead.is_running());
        assert_eq!(playhead.position_micros(), playhead.duration_micros());

        // Restarting at the end runs out immediately
        playhead.set_running(true);
        assert!(playhead.render(&mut out));
        assert!(!playhead.render(&mut out));
    }

    #[test]
    fn test_stop_keeps_position() {
        let playhead = Playhead::new(stereo_ramp(100));
        playhead.set_running(true);
        let mut out = [0.0f32; 20];
        playhead.render(&mut out);

        assert!(playhead.set_running(false));
        let paused_at = playhead.position_micros();
        playhead.render(&mut out);
        assert_eq!(playhead.position_micros(), paused_at);

        playhead.set_running(true);
        playhead.render(&mut out);
        assert_eq!(out[0], 0.02);
        assert!(playhead.position_micros() > paused_at);
    }
}
