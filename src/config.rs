// src/config.rs

use crate::error::ConfigError;

// Default allocator configuration
pub const DEFAULT_CHANNELS: usize = 128;
pub const DEFAULT_MAX_NOTE_BEND: f32 = 4.0;
pub const DEFAULT_VELOCITY: u8 = 127;
pub const DEFAULT_SUSTAIN_FADE: f64 = 1.0;
pub const DEFAULT_MIN_OPACITY: f64 = 0.4;

/// Highest channel count the tone generator can address.
pub const MAX_CHANNELS: usize = 128;

/// Fixed parameters of a voice allocator, chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocatorConfig {
    /// Size of the channel pool.
    pub channels: usize,
    /// Semitones reached at full pitch bend deflection.
    pub max_note_bend: f32,
    /// Velocity of every start-note command.
    pub velocity: u8,
    /// Seconds a sustained key takes to fade to `min_opacity`.
    pub sustain_fade: f64,
    /// Resting opacity of a sustained key once faded.
    pub min_opacity: f64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            max_note_bend: DEFAULT_MAX_NOTE_BEND,
            velocity: DEFAULT_VELOCITY,
            sustain_fade: DEFAULT_SUSTAIN_FADE,
            min_opacity: DEFAULT_MIN_OPACITY,
        }
    }
}

impl AllocatorConfig {
    /// Default configuration with a different channel pool size.
    pub fn with_channels(channels: usize) -> Self {
        Self {
            channels,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        if self.channels > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels(self.channels));
        }
        if !self.max_note_bend.is_finite() || self.max_note_bend <= 0.0 {
            return Err(ConfigError::InvalidNoteBend(self.max_note_bend));
        }
        if self.velocity > 127 {
            return Err(ConfigError::InvalidVelocity(self.velocity));
        }
        if !self.sustain_fade.is_finite() || self.sustain_fade <= 0.0 {
            return Err(ConfigError::InvalidSustainFade(self.sustain_fade));
        }
        if !(0.0..=1.0).contains(&self.min_opacity) {
            return Err(ConfigError::InvalidMinOpacity(self.min_opacity));
        }
        Ok(())
    }
}
