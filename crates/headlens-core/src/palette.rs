//! Badge colours for users.
//!
//! A user keeps the same colour on every page: the colour is picked from
//! a fixed palette by user ID.

/// Background classes for user badges on machine cards.
const BADGE_COLORS: [&str; 12] = [
    "red lighten-1",
    "teal lighten-1",
    "blue lighten-1",
    "blue-grey lighten-1",
    "indigo lighten-2",
    "green lighten-1",
    "deep-orange lighten-1",
    "yellow lighten-2",
    "purple lighten-2",
    "indigo lighten-2",
    "brown lighten-1",
    "grey lighten-1",
];

/// Text classes for the same palette, used on the users page.
const TEXT_COLORS: [&str; 12] = [
    "red-text text-lighten-1",
    "teal-text text-lighten-1",
    "blue-text text-lighten-1",
    "blue-grey-text text-lighten-1",
    "indigo-text text-lighten-2",
    "green-text text-lighten-1",
    "deep-orange-text text-lighten-1",
    "yellow-text text-lighten-2",
    "purple-text text-lighten-2",
    "indigo-text text-lighten-2",
    "brown-text text-lighten-1",
    "grey-text text-lighten-1",
];

fn slot(user_id: u64) -> usize {
    (user_id % BADGE_COLORS.len() as u64) as usize
}

/// Badge background colour for a user.
#[must_use]
pub fn badge_color(user_id: u64) -> &'static str {
    BADGE_COLORS[slot(user_id)]
}

/// Text colour for a user.
#[must_use]
pub fn text_color(user_id: u64) -> &'static str {
    TEXT_COLORS[slot(user_id)]
}
