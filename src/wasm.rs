//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! The browser has no synchronous sampler to call into, so the allocator
//! queues its tone generator commands and the page drains them after each
//! gesture. Time comes from the page as well (`performance.now()`), since
//! `Instant` is unavailable in the browser.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { isomorf_init, IsomorfAllocator } from './isomorf.js';
//!
//! await init();
//! isomorf_init();
//!
//! const allocator = new IsomorfAllocator();
//! allocator.set_time(performance.now() / 1000);
//! allocator.play(touch.identifier, 60, 0.0);
//!
//! const words = allocator.take_commands();
//! for (let i = 0; i < words.length; i += 4) {
//!     const [kind, channel, a, b] = words.subarray(i, i + 4);
//!     // 0 = start(note a, velocity b), 1 = stop(note a), 2 = bend(value a)
//! }
//!
//! // teardown: play the final stop-notes, then release the allocator
//! playCommands(allocator.shutdown());
//! allocator.free();
//! ```

use wasm_bindgen::prelude::*;

use crate::clock::ManualClock;
use crate::config::{
    AllocatorConfig, DEFAULT_CHANNELS, DEFAULT_MAX_NOTE_BEND, DEFAULT_MIN_OPACITY,
    DEFAULT_SUSTAIN_FADE, DEFAULT_VELOCITY,
};
use crate::tone_generator::CommandBuffer;
use crate::voice_allocator::VoiceAllocator;

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn isomorf_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration for creating an allocator.
#[wasm_bindgen]
#[derive(Clone, Copy)]
pub struct IsomorfConfig {
    /// Channel pool size (1-128).
    pub channels: u32,
    /// Semitones at full pitch bend deflection.
    pub max_note_bend: f32,
    /// Velocity of every start-note.
    pub velocity: u8,
    /// Seconds a sustained key takes to fade.
    pub sustain_fade: f64,
    /// Resting opacity of a faded sustained key.
    pub min_opacity: f64,
}

#[wasm_bindgen]
impl IsomorfConfig {
    /// Create a new configuration with default values.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with a custom channel pool size.
    pub fn with_channels(channels: u32) -> Self {
        Self {
            channels,
            ..Self::default()
        }
    }
}

impl Default for IsomorfConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS as u32,
            max_note_bend: DEFAULT_MAX_NOTE_BEND,
            velocity: DEFAULT_VELOCITY,
            sustain_fade: DEFAULT_SUSTAIN_FADE,
            min_opacity: DEFAULT_MIN_OPACITY,
        }
    }
}

impl From<IsomorfConfig> for AllocatorConfig {
    fn from(c: IsomorfConfig) -> Self {
        Self {
            channels: c.channels as usize,
            max_note_bend: c.max_note_bend,
            velocity: c.velocity,
            sustain_fade: c.sustain_fade,
            min_opacity: c.min_opacity,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Allocator
// ═══════════════════════════════════════════════════════════════════════════

#[wasm_bindgen]
pub struct IsomorfAllocator {
    inner: VoiceAllocator<CommandBuffer, ManualClock>,
}

#[wasm_bindgen]
impl IsomorfAllocator {
    /// Create an allocator with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<IsomorfAllocator, JsValue> {
        Self::new_with_config(IsomorfConfig::default())
    }

    /// Create an allocator with a custom configuration.
    pub fn new_with_config(config: IsomorfConfig) -> Result<IsomorfAllocator, JsValue> {
        VoiceAllocator::with_clock(config.into(), CommandBuffer::new(), ManualClock::default())
            .map(|inner| IsomorfAllocator { inner })
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Advance the allocator's clock to `now` seconds.
    pub fn set_time(&mut self, now: f64) {
        self.inner.clock().set(now);
    }

    /// Play `note` for `gesture`. Returns the channel, or -1 if the pool is full.
    pub fn play(&mut self, gesture: f64, note: u8, bend: f32) -> i32 {
        match self.inner.play(gesture as i64, note, bend) {
            Ok(channel) => channel as i32,
            Err(_) => -1,
        }
    }

    pub fn release(&mut self, gesture: f64) {
        self.inner.release(gesture as i64);
    }

    pub fn bend(&mut self, note: u8, amount: f32) {
        self.inner.bend(note, amount);
    }

    pub fn unbend_all(&mut self) {
        self.inner.unbend_all();
    }

    pub fn sustain_all(&mut self) {
        self.inner.sustain_all();
    }

    pub fn release_sustained(&mut self) {
        self.inner.release_sustained();
    }

    pub fn all_notes_off(&mut self) {
        self.inner.all_notes_off();
    }

    /// Drain queued tone generator commands as `[kind, channel, a, b]` quads.
    pub fn take_commands(&mut self) -> Vec<u32> {
        self.inner
            .generator_mut()
            .drain()
            .iter()
            .flat_map(|command| command.to_words())
            .collect()
    }

    /// Stop every sounding note and return the resulting commands.
    ///
    /// Call this before `free()`: commands queued while the allocator is
    /// being freed never reach the page.
    pub fn shutdown(&mut self) -> Vec<u32> {
        self.inner.all_notes_off();
        self.take_commands()
    }

    pub fn voice_count(&self) -> u32 {
        self.inner.active_count() as u32
    }

    /// Key opacity at the current clock time.
    pub fn key_opacity(&self, note: u8) -> f64 {
        self.inner.key_cue(note).opacity
    }

    /// Key saturation from the note's current bend.
    pub fn key_saturation(&self, note: u8) -> f64 {
        self.inner.key_cue(note).saturation
    }
}
