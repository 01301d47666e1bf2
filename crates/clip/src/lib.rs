// Clip-based audio source for the Cadence playback engine
//
// Files are decoded in full with Symphonia and played from memory through a
// cpal output stream.

pub mod decode;
pub mod line;
pub mod provider;

pub use decode::{decode_file, Clip};
pub use line::ClipLine;
pub use provider::{is_supported, ClipConfig, ClipProvider, SUPPORTED_EXTENSIONS};
