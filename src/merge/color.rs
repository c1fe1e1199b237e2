use std::collections::HashMap;

use owo_colors::AnsiColors;
use parking_lot::Mutex;

const PALETTE: &[AnsiColors] = &[
    AnsiColors::Cyan,
    AnsiColors::Magenta,
    AnsiColors::Yellow,
    AnsiColors::Blue,
    AnsiColors::Red,
    AnsiColors::Green,
    AnsiColors::BrightCyan,
    AnsiColors::BrightMagenta,
    AnsiColors::BrightYellow,
    AnsiColors::BrightBlue,
    AnsiColors::BrightRed,
    AnsiColors::BrightGreen,
];

/// Round-robin label colors. A key keeps the color it got the first time it was seen.
#[derive(Default)]
pub struct ColorAssigner {
    state: Mutex<Assignments>,
}

#[derive(Default)]
struct Assignments {
    next: usize,
    by_key: HashMap<String, AnsiColors>,
}

impl ColorAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, key: &str) -> AnsiColors {
        let mut state = self.state.lock();
        if let Some(color) = state.by_key.get(key) {
            return *color;
        }

        let color = PALETTE[state.next % PALETTE.len()];
        state.next = state.next.wrapping_add(1);
        state.by_key.insert(key.to_string(), color);
        color
    }

    /// Drops the assignments whose key matches. The round-robin position is kept.
    pub fn forget(&self, mut matches: impl FnMut(&str) -> bool) {
        self.state.lock().by_key.retain(|k, _| !matches(k));
    }

    pub fn len(&self) -> usize {
        self.state.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
