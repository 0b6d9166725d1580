// C-compatible FFI bindings for Swift/iOS integration.
//
// Safety requirements:
// - All pointers must be non-null unless documented otherwise
// - All handles must be created by this module and not fabricated
// - Callbacks in IsomorfToneGenerator must stay valid until the allocator
//   is destroyed, and are invoked on the calling thread
// - Caller must call allocator_destroy for each allocator_create

use std::ffi::c_void;

use crate::config::{
    AllocatorConfig, DEFAULT_CHANNELS, DEFAULT_MAX_NOTE_BEND, DEFAULT_MIN_OPACITY,
    DEFAULT_SUSTAIN_FADE, DEFAULT_VELOCITY,
};
use crate::render::KeyCue;
use crate::tone_generator::ToneGenerator;
use crate::voice::{ChannelId, NoteId, PlayState};
use crate::voice_allocator::VoiceAllocator;

use log::{LevelFilter, error, info};
use oslog::OsLogger;

// Logger subsystem identifier
const LOG_SUBSYSTEM: &str = "com.isomorf.engine";

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// Call once at application startup. Log output appears in Console.app and
/// Xcode's debug console.
#[unsafe(no_mangle)]
pub extern "C" fn isomorf_init_logger() {
    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Tone Generator Callbacks
// ═══════════════════════════════════════════════════════════════════════════

/// Tone generator implemented on the Swift side (e.g. an AVAudioUnitSampler).
///
/// `context` is passed back unchanged as the first argument of every call.
/// A NULL callback silently drops that kind of command.
#[repr(C)]
pub struct IsomorfToneGenerator {
    pub context: *mut c_void,
    pub start_note: Option<unsafe extern "C" fn(*mut c_void, u8, u8, u8)>,
    pub stop_note: Option<unsafe extern "C" fn(*mut c_void, u8, u8)>,
    pub set_pitch_bend: Option<unsafe extern "C" fn(*mut c_void, u8, u16)>,
}

impl ToneGenerator for IsomorfToneGenerator {
    fn start_note(&mut self, channel: ChannelId, note: NoteId, velocity: u8) {
        if let Some(callback) = self.start_note {
            unsafe { callback(self.context, channel, note, velocity) };
        }
    }

    fn stop_note(&mut self, channel: ChannelId, note: NoteId) {
        if let Some(callback) = self.stop_note {
            unsafe { callback(self.context, channel, note) };
        }
    }

    fn set_pitch_bend(&mut self, channel: ChannelId, value: u16) {
        if let Some(callback) = self.set_pitch_bend {
            unsafe { callback(self.context, channel, value) };
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle Types
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to a voice allocator driving a Swift tone generator.
pub struct IsomorfAllocator {
    inner: VoiceAllocator<IsomorfToneGenerator>,
}

// ═══════════════════════════════════════════════════════════════════════════
// FFI Result Types
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration for creating an allocator.
#[repr(C)]
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

/// Drawing cue for one key.
#[repr(C)]
pub struct IsomorfKeyCue {
    pub opacity: f64,
    pub saturation: f64,
}

impl From<KeyCue> for IsomorfKeyCue {
    fn from(c: KeyCue) -> Self {
        Self {
            opacity: c.opacity,
            saturation: c.saturation,
        }
    }
}

/// Voice state for UI display.
#[repr(C)]
pub struct IsomorfVoiceInfo {
    pub note: u8,
    pub channel: u8,
    /// True while a gesture holds the note, false while sustained.
    pub touching: bool,
    /// Gesture id when `touching`, otherwise 0.
    pub gesture: i64,
    /// Sustain start when not `touching`, otherwise 0.
    pub since: f64,
    pub bend: f32,
}

/// Get the default configuration values.
#[unsafe(no_mangle)]
pub extern "C" fn isomorf_default_config() -> IsomorfConfig {
    IsomorfConfig::default()
}

// ═══════════════════════════════════════════════════════════════════════════
// Allocator Creation
// ═══════════════════════════════════════════════════════════════════════════

/// Create a voice allocator.
///
/// Returns NULL if the configuration is invalid. The result must be freed
/// with `allocator_destroy`.
///
/// # Safety
/// - `config` must be a valid pointer or NULL for defaults
/// - `generator` callbacks and context must outlive the allocator
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_create(
    config: *const IsomorfConfig,
    generator: IsomorfToneGenerator,
) -> *mut IsomorfAllocator {
    let cfg = if config.is_null() {
        IsomorfConfig::default()
    } else {
        unsafe { std::ptr::read(config) }
    };

    match VoiceAllocator::new(cfg.into(), generator) {
        Ok(inner) => {
            info!("allocator_create: channels={}", cfg.channels);
            Box::into_raw(Box::new(IsomorfAllocator { inner }))
        }
        Err(e) => {
            error!("allocator_create: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Destroy an allocator. Every sounding note is stopped first.
///
/// # Safety
/// `allocator` must be a valid pointer returned by `allocator_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_destroy(allocator: *mut IsomorfAllocator) {
    if !allocator.is_null() {
        unsafe { drop(Box::from_raw(allocator)) };
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Allocator - Gestures
// ═══════════════════════════════════════════════════════════════════════════

/// Play `note` for `gesture`.
///
/// Returns the channel, or -1 if no channel is free (the gesture should be
/// dropped).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_play(
    allocator: *mut IsomorfAllocator,
    gesture: i64,
    note: u8,
    bend: f32,
) -> i32 {
    if allocator.is_null() {
        return -1;
    }
    match unsafe { (*allocator).inner.play(gesture, note, bend) } {
        Ok(channel) => channel as i32,
        Err(_) => -1,
    }
}

/// Release every note held by `gesture`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_release(allocator: *mut IsomorfAllocator, gesture: i64) {
    if allocator.is_null() {
        return;
    }
    unsafe { (*allocator).inner.release(gesture) };
}

/// Bend a sounding note by `amount` semitones.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_bend(allocator: *mut IsomorfAllocator, note: u8, amount: f32) {
    if allocator.is_null() {
        return;
    }
    unsafe { (*allocator).inner.bend(note, amount) };
}

/// Reset the bend of every sounding note.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_unbend_all(allocator: *mut IsomorfAllocator) {
    if allocator.is_null() {
        return;
    }
    unsafe { (*allocator).inner.unbend_all() };
}

/// Hold pedal down.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_sustain_all(allocator: *mut IsomorfAllocator) {
    if allocator.is_null() {
        return;
    }
    unsafe { (*allocator).inner.sustain_all() };
}

/// Hold pedal up.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_release_sustained(allocator: *mut IsomorfAllocator) {
    if allocator.is_null() {
        return;
    }
    unsafe { (*allocator).inner.release_sustained() };
}

/// Stop every sounding note.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_all_notes_off(allocator: *mut IsomorfAllocator) {
    if allocator.is_null() {
        return;
    }
    unsafe { (*allocator).inner.all_notes_off() };
}

// ═══════════════════════════════════════════════════════════════════════════
// Allocator - Readback
// ═══════════════════════════════════════════════════════════════════════════

/// Number of sounding notes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_voice_count(allocator: *const IsomorfAllocator) -> u32 {
    if allocator.is_null() {
        return 0;
    }
    unsafe { (*allocator).inner.active_count() as u32 }
}

/// Get the voice playing `note`.
///
/// Returns false (and leaves `out_info` untouched) if the note is silent.
///
/// # Safety
/// `out_info` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_voice_info(
    allocator: *const IsomorfAllocator,
    note: u8,
    out_info: *mut IsomorfVoiceInfo,
) -> bool {
    if allocator.is_null() || out_info.is_null() {
        return false;
    }
    let Some(voice) = (unsafe { (*allocator).inner.snapshot().get(note) }) else {
        return false;
    };

    let (touching, gesture, since) = match voice.state {
        PlayState::Touching(gesture) => (true, gesture, 0.0),
        PlayState::Sustaining { since } => (false, 0, since),
    };
    unsafe {
        *out_info = IsomorfVoiceInfo {
            note: voice.note,
            channel: voice.channel,
            touching,
            gesture,
            since,
            bend: voice.bend,
        };
    }
    true
}

/// Drawing cue for `note` at the current time.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocator_key_cue(
    allocator: *const IsomorfAllocator,
    note: u8,
) -> IsomorfKeyCue {
    if allocator.is_null() {
        return KeyCue::SILENT.into();
    }
    unsafe { (*allocator).inner.key_cue(note).into() }
}
