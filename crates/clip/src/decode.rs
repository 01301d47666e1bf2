// Whole-file decoding using Symphonia
// A clip is the complete track decoded to interleaved f32 and held in memory.

use cadence_core::LoadError;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use std::fs::File;
use std::path::Path;

/// Decoded audio held in memory
#[derive(Debug, Clone)]
pub struct Clip {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl Clip {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_micros(&self) -> u64 {
        frames_to_micros(self.frames() as u64, self.sample_rate)
    }
}

pub(crate) fn frames_to_micros(frames: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    frames * 1_000_000 / sample_rate as u64
}

fn map_error(err: SymphoniaError) -> LoadError {
    match err {
        SymphoniaError::IoError(e) => LoadError::Io(e.to_string()),
        SymphoniaError::Unsupported(what) => LoadError::UnsupportedFormat(what.to_string()),
        other => LoadError::UnsupportedFormat(other.to_string()),
    }
}

/// Decode the default audio track of `path`.
/// Fails with `UnsupportedFormat` once the clip grows past `max_secs` (0 = no limit).
pub fn decode_file(path: &Path, max_secs: u64) -> Result<Clip, LoadError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        // Running out of bytes while probing means no container matched
        .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::UnsupportedFormat("no audio track".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| LoadError::UnsupportedFormat("sample rate not specified".to_string()))?;
    let mut channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(map_error)?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(map_error(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(map_error(e)),
        };

        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;
        let needed = decoded.capacity() * spec.channels.count();
        if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
            sample_buf = Some(SampleBuffer::new(capacity, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
        channels = spec.channels.count() as u16;

        if max_secs > 0 && channels > 0 {
            let frames = (samples.len() / channels as usize) as u64;
            if frames > max_secs * sample_rate as u64 {
                return Err(LoadError::UnsupportedFormat(format!(
                    "longer than the {} second clip limit",
                    max_secs
                )));
            }
        }
    }

    if channels == 0 {
        return Err(LoadError::UnsupportedFormat(
            "channel layout not specified".to_string(),
        ));
    }

    let clip = Clip::new(samples, sample_rate, channels);
    log::info!(
        "Decoded {}: {}Hz, {} channels, {} frames",
        path.display(),
        clip.sample_rate(),
        clip.channels(),
        clip.frames()
    );
    Ok(clip)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Minimal 16-bit PCM WAV
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, frames: u32) -> Vec<u8> {
        let block_align = channels * 2;
        let data_len = frames * block_align as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames {
            // Quiet ramp
            let sample = ((i % 256) as i16 - 128) * 64;
            for _ in 0..channels {
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
        out
    }

    pub(crate) fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("cadence-{}-{}", std::process::id(), name));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_decode_wav() {
        let path = temp_file("stereo.wav", &wav_bytes(8000, 2, 16000));
        let clip = decode_file(&path, 0).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(clip.sample_rate(), 8000);
        assert_eq!(clip.channels(), 2);
        assert_eq!(clip.frames(), 16000);
        assert_eq!(clip.samples().len(), 32000);
        assert_eq!(clip.duration_micros(), 2_000_000);
        assert!(clip.samples().iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_text_file_is_unsupported() {
        let path = temp_file("notes.wav", b"these are not the samples you are looking for");
        let err = decode_file(&path, 0).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = decode_file(Path::new("/nonexistent/cadence/missing.wav"), 0).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_clip_limit() {
        let path = temp_file("long.wav", &wav_bytes(8000, 1, 8000 * 3));
        let err = decode_file(&path, 2).unwrap_err();
        let ok = decode_file(&path, 5);
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
        assert_eq!(ok.unwrap().frames(), 24000);
    }

    #[test]
    fn test_frames_to_micros() {
        assert_eq!(frames_to_micros(44100, 44100), 1_000_000);
        assert_eq!(frames_to_micros(22050, 44100), 500_000);
        assert_eq!(frames_to_micros(100, 0), 0);
    }
}
