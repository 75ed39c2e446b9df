//! Collaborator color assignment

use std::collections::HashSet;

use rand::seq::SliceRandom;

/// Pick a color for a new session.
///
/// Returns the first palette entry not in `used`. Once every entry is taken
/// colors repeat, drawn uniformly at random. `None` only for an empty palette.
pub fn assign_color<'a>(palette: &'a [String], used: &HashSet<&str>) -> Option<&'a str> {
    palette
        .iter()
        .find(|color| !used.contains(color.as_str()))
        .or_else(|| palette.choose(&mut rand::thread_rng()))
        .map(String::as_str)
}
