//! Mulberry32: a tiny deterministic 32-bit PRNG.
//!
//! All functions are pure and return `(value, next_state)` so the caller
//! owns the stream state. The host uses one stream for spawn decisions and
//! derives a fresh stream per platform layout from the layout seed.

/// Returns a value in [0, 1) and the next state.
pub fn prng_next(state: u32) -> (f64, u32) {
    let mut t = state.wrapping_add(0x6d2b79f5);
    let next_state = t;
    t = (t ^ (t >> 15)).wrapping_mul(t | 1);
    t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
    let value = (t ^ (t >> 14)) as f64 / 4294967296.0;
    (value, next_state)
}

/// Returns an integer in [min, max] inclusive.
pub fn prng_int_range(state: u32, min: i32, max: i32) -> (i32, u32) {
    let (value, next_state) = prng_next(state);
    let range = (max - min + 1) as f64;
    (min + (value * range).floor() as i32, next_state)
}

/// Returns a float in [min, max).
pub fn prng_range(state: u32, min: f64, max: f64) -> (f64, u32) {
    let (value, next_state) = prng_next(state);
    (min + (max - min) * value, next_state)
}

/// Picks one element of a non-empty slice.
pub fn prng_pick<T: Copy>(state: u32, items: &[T]) -> (T, u32) {
    debug_assert!(!items.is_empty());
    let (idx, next_state) = prng_int_range(state, 0, items.len() as i32 - 1);
    (items[idx as usize], next_state)
}

/// Draws a fresh 32-bit seed from the stream.
pub fn prng_seed(state: u32) -> (u32, u32) {
    let (value, next_state) = prng_next(state);
    ((value * 4294967296.0) as u32, next_state)
}
