// src/lib.rs
//
// Library entry point for FFI consumers (iOS/Swift, web) and Rust hosts.

mod clock;
mod config;
mod error;
mod event;
mod render;
mod tone_generator;
mod voice;
mod voice_allocator;

#[cfg(feature = "ios")]
pub mod ffi;

#[cfg(feature = "web")]
pub mod wasm;

// Re-export key types for Rust consumers
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::AllocatorConfig;
pub use error::{AllocError, ConfigError};
pub use event::GestureEvent;
pub use render::{KeyCue, key_cue};
pub use tone_generator::{
    CommandBuffer, MAX_PITCH_BEND, PITCH_BEND_CENTER, ToneCommand, ToneGenerator,
    pitch_bend_value,
};
pub use voice::{
    ChannelId, GestureId, NoteId, PlayState, Timestamp, Voice, key_from_note, note_from_key,
};
pub use voice_allocator::{VoiceAllocator, VoiceTable};
