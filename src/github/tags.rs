//! Release tag selection

use rand::Rng;
use std::collections::HashSet;

/// Length of the random suffix appended to a taken tag
pub const SUFFIX_LEN: usize = 6;

/// Random suffixes tried before falling back to a timestamp
pub const MAX_RANDOM_TRIES: usize = 10;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Six random lowercase alphanumeric characters
pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Pick a tag that is not in `existing`
///
/// Tries `base` as-is, then `base-<suffix>` up to [`MAX_RANDOM_TRIES`] times,
/// then `base-<now_unix>`.
///
/// # Examples
///
/// ```
/// use drive_to_release::github::choose_release_tag;
/// use std::collections::HashSet;
///
/// let existing: HashSet<String> = ["video-clip".to_string()].into();
/// let tag = choose_release_tag("video-clip", &existing, || "abc123".to_string(), 0);
/// assert_eq!(tag, "video-clip-abc123");
/// ```
pub fn choose_release_tag<F>(
    base: &str,
    existing: &HashSet<String>,
    mut suffix: F,
    now_unix: u64,
) -> String
where
    F: FnMut() -> String,
{
    if !existing.contains(base) {
        return base.to_string();
    }

    for _ in 0..MAX_RANDOM_TRIES {
        let candidate = format!("{}-{}", base, suffix());
        if !existing.contains(&candidate) {
            return candidate;
        }
    }

    format!("{}-{}", base, now_unix)
}
