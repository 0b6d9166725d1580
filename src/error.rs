// src/error.rs

use thiserror::Error;

use crate::voice::NoteId;

/// Recoverable failure of an allocator operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Every channel is owned by a voice. The gesture should be dropped.
    #[error("no free channel to play note {note}")]
    ChannelsExhausted { note: NoteId },
}

/// Rejected allocator configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("channel pool must not be empty")]
    NoChannels,

    #[error("channel pool of {0} exceeds the 128 addressable channels")]
    TooManyChannels(usize),

    #[error("max note bend must be positive and finite, got {0}")]
    InvalidNoteBend(f32),

    #[error("velocity {0} is outside 0-127")]
    InvalidVelocity(u8),

    #[error("sustain fade must be positive, got {0}")]
    InvalidSustainFade(f64),

    #[error("min opacity must be within 0-1, got {0}")]
    InvalidMinOpacity(f64),
}
