//! Typing effect for assistant replies
//!
//! The driver hands back the whole reply at once; the renderer reveals it
//! word by word at a slow, steady pace. `Typewriter` produces the frames,
//! `Pacing` says how long each one stays on screen.

use std::time::Duration;

pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(50);

/// Delay between reveal frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub per_chunk: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            per_chunk: DEFAULT_TYPING_DELAY,
        }
    }
}

/// Lazy sequence of cumulative prefixes of a reply.
///
/// Every frame but the last is the words so far, each followed by one
/// space. The last frame is the original text untouched, so line breaks and
/// markdown come back once the reveal ends. Empty text yields a single empty
/// frame. Consumed once; not restartable.
#[derive(Debug)]
pub struct Typewriter {
    text: String,
    offset: usize,
    shown: String,
    finished: bool,
}

impl Typewriter {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offset: 0,
            shown: String::new(),
            finished: false,
        }
    }
}

impl Iterator for Typewriter {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }

        let rest = self.text.get(self.offset..).unwrap_or_default();
        let word_and_tail = rest.trim_start();
        let word_len = word_and_tail
            .find(char::is_whitespace)
            .unwrap_or(word_and_tail.len());
        let (word, tail) = word_and_tail.split_at(word_len);

        if tail.trim().is_empty() {
            self.finished = true;
            return Some(self.text.clone());
        }

        self.shown.push_str(word);
        self.shown.push(' ');
        self.offset = self.text.len() - tail.len();
        Some(self.shown.clone())
    }
}
