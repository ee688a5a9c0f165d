pub mod model;
pub mod segments;

pub use model::{
    ModelCache, ModelSize, RecognizerLoader, SpeechRecognizer, WhisperCliLoader,
    whisper_model_cache,
};
pub use segments::{NO_SPEECH_MAX, TranscriptSegment, filter_segments};
