//! # Musical Tuning Module
//!
//! Equal-temperament note naming for detected bass frequencies (A4 = 440 Hz).
//!
//! ## Features
//! - Frequency to nearest MIDI note plus cents offset
//! - MIDI note to frequency
//! - Sharp-spelled note names ("C#2", "A4") from a table built once
//! - A `"---"` marker for frequencies outside the bass band

use once_cell::sync::Lazy;

use crate::pitch::is_valid_frequency;

/// Shown in place of a note name when there is no valid pitch.
pub const NO_NOTE: &str = "---";

const A4_FREQUENCY: f32 = 440.0;
const A4_MIDI: f32 = 69.0;

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Names for MIDI notes 0..=127, so naming a note never allocates.
static NOTE_NAMES: Lazy<Vec<String>> = Lazy::new(|| (0..128).map(format_note_name).collect());

fn format_note_name(midi_note: i32) -> String {
    let pitch_class = midi_note.rem_euclid(12) as usize;
    let octave = midi_note.div_euclid(12) - 1;
    format!("{}{}", PITCH_CLASSES[pitch_class], octave)
}

/// Converts a frequency to the nearest MIDI note and the deviation from it in cents.
///
/// # Returns
/// * `(midi_note, cents)` - cents lie in -50..=50
pub fn frequency_to_midi(frequency: f32) -> (i32, f32) {
    let exact = A4_MIDI + 12.0 * (frequency / A4_FREQUENCY).log2();
    let midi_note = exact.round() as i32;
    let cents = (exact - midi_note as f32) * 100.0;
    (midi_note, cents)
}

/// Equal-temperament frequency of a MIDI note.
pub fn midi_to_frequency(midi_note: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi_note as f32 - A4_MIDI) / 12.0)
}

/// Name of a MIDI note, e.g. 69 -> "A4", 28 -> "E1".
pub fn note_name(midi_note: i32) -> String {
    match usize::try_from(midi_note).ok().and_then(|i| NOTE_NAMES.get(i)) {
        Some(name) => name.clone(),
        None => format_note_name(midi_note),
    }
}

/// Borrowed name of a MIDI note inside 0..=127.
pub fn note_name_static(midi_note: i32) -> Option<&'static str> {
    let index = usize::try_from(midi_note).ok()?;
    NOTE_NAMES.get(index).map(String::as_str)
}

/// Names the nearest note to any positive frequency, e.g. 440 Hz -> "A4".
///
/// Returns `None` for zero, negative or non-finite input.
pub fn nearest_note_name(frequency: f32) -> Option<String> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return None;
    }
    let (midi_note, _) = frequency_to_midi(frequency);
    Some(note_name(midi_note))
}

/// Names the nearest note to `frequency`, or [`NO_NOTE`] outside the bass band.
pub fn frequency_to_note(frequency: f32) -> &'static str {
    if !is_valid_frequency(frequency) {
        return NO_NOTE;
    }
    let (midi_note, _) = frequency_to_midi(frequency);
    note_name_static(midi_note).unwrap_or(NO_NOTE)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat; 100 cents = 1 semitone.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
