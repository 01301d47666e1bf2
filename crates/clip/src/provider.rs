// AudioSourceProvider backed by in-memory clips

use crate::decode::decode_file;
use crate::line::ClipLine;
use cadence_core::{AudioLine, AudioSourceProvider, LoadError};
use once_cell::sync::Lazy;
use std::path::Path;

/// Default upper bound on clip length; the whole clip is held in memory
pub const DEFAULT_MAX_CLIP_SECS: u64 = 60 * 60;

/// File extensions the provider will try to open (lowercase)
pub static SUPPORTED_EXTENSIONS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "wav", "wave", "aif", "aiff", "flac", "mp3", "ogg", "oga", "m4a", "mp4", "aac", "mka",
        "mkv", "webm",
    ]
});

/// Clip provider configuration
#[derive(Debug, Clone)]
pub struct ClipConfig {
    /// Longest clip accepted, in seconds. 0 disables the limit.
    pub max_clip_secs: u64,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            max_clip_secs: DEFAULT_MAX_CLIP_SECS,
        }
    }
}

/// Whether `path` has one of the supported extensions
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Decodes whole files and plays them on the default output device
pub struct ClipProvider {
    config: ClipConfig,
}

impl ClipProvider {
    pub fn new() -> Self {
        Self::with_config(ClipConfig::default())
    }

    pub fn with_config(config: ClipConfig) -> Self {
        Self { config }
    }

    pub fn supported_extensions(&self) -> &'static [&'static str] {
        SUPPORTED_EXTENSIONS.as_slice()
    }
}

impl Default for ClipProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSourceProvider for ClipProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioLine>, LoadError> {
        if !is_supported(path) {
            return Err(LoadError::UnsupportedFormat(format!(
                "{}: unsupported file type",
                path.display()
            )));
        }
        let clip = decode_file(path, self.config.max_clip_secs)?;
        let line = ClipLine::open(clip)?;
        Ok(Box::new(line))
    }
}
