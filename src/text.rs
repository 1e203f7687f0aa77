//! Composer text processing: `@` mentions, `:shortcode:` emoji and the
//! outgoing message pipeline.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::emoji;
use crate::models::User;

/// A partially typed shortcode at the end of the input (`:fi`, `:fire:`).
static TRAILING_SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\w*:*$").expect("static regex"));

static SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z0-9_+\-]+):").expect("static regex"));

/// The lowercased text after the last `@`, or `None` when there is no `@`.
pub fn mention_query(input: &str) -> Option<String> {
    input
        .rfind('@')
        .map(|idx| input[idx + 1..].to_lowercase())
}

/// Candidates whose display name contains the mention query,
/// case-insensitively. Order of `candidates` is preserved.
pub fn filter_mentions<'a>(input: &str, candidates: &'a [User]) -> Vec<&'a User> {
    let Some(query) = mention_query(input) else {
        return Vec::new();
    };
    candidates
        .iter()
        .filter(|user| user.effective_display_name().to_lowercase().contains(&query))
        .collect()
}

/// Replace everything from the last `@` with `@name `.
pub fn apply_mention(input: &str, display_name: &str) -> String {
    let prefix = input.rfind('@').map(|idx| &input[..idx]).unwrap_or(input);
    format!("{prefix}@{display_name} ")
}

/// Insert a picked emoji: a trailing partial shortcode is replaced, otherwise
/// the glyph is appended.
pub fn insert_emoji(input: &str, glyph: &str) -> String {
    match TRAILING_SHORTCODE.find(input) {
        Some(m) => format!("{}{}", &input[..m.start()], glyph),
        None => format!("{input}{glyph}"),
    }
}

/// The emoji picker opens while the input contains a colon.
pub fn wants_emoji_picker(input: &str) -> bool {
    input.contains(':')
}

/// Replace every known `:code:` with its glyph. Unknown codes are left as
/// typed. Applying it twice gives the same result as applying it once.
pub fn convert_emoji_codes(text: &str) -> String {
    SHORTCODE
        .replace_all(text, |caps: &Captures| match emoji::lookup(&caps[1]) {
            Some(glyph) => glyph.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Trim, convert shortcodes, and drop blank messages.
pub fn prepare_outgoing(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(convert_emoji_codes(trimmed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    Enter,
    ShiftEnter,
    Other,
}

impl KeyPress {
    /// Plain Enter submits, Shift+Enter inserts a newline.
    pub fn submits(self) -> bool {
        matches!(self, KeyPress::Enter)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposerState {
    pub text: String,
    /// Mention dropdown entries; empty hides the dropdown.
    pub mentions: Vec<User>,
    pub show_emoji_picker: bool,
}

impl ComposerState {
    pub fn show_mentions(&self) -> bool {
        !self.mentions.is_empty()
    }
}

/// Input box state for the native and private chats.
#[derive(Debug, Default)]
pub struct Composer {
    state: ComposerState,
    candidates: Vec<User>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ComposerState {
        &self.state
    }

    pub fn set_candidates(&mut self, candidates: Vec<User>) {
        self.candidates = candidates;
        self.refresh();
    }

    pub fn on_input(&mut self, text: &str) -> &ComposerState {
        self.state.text = text.to_string();
        self.refresh();
        &self.state
    }

    pub fn select_mention(&mut self, user: &User) -> &ComposerState {
        self.state.text = apply_mention(&self.state.text, user.effective_display_name());
        self.state.mentions.clear();
        &self.state
    }

    pub fn select_emoji(&mut self, glyph: &str) -> &ComposerState {
        self.state.text = insert_emoji(&self.state.text, glyph);
        self.refresh();
        &self.state
    }

    /// Returns the message to send when the key submits. Shift+Enter adds a
    /// newline instead.
    pub fn on_key(&mut self, key: KeyPress) -> Option<String> {
        match key {
            KeyPress::Enter => self.take_submission(),
            KeyPress::ShiftEnter => {
                self.state.text.push('\n');
                None
            }
            KeyPress::Other => None,
        }
    }

    /// Clear the input and hand back the prepared message, if any.
    pub fn take_submission(&mut self) -> Option<String> {
        let outgoing = prepare_outgoing(&self.state.text)?;
        self.state = ComposerState::default();
        Some(outgoing)
    }

    fn refresh(&mut self) {
        self.state.show_emoji_picker = wants_emoji_picker(&self.state.text);
        self.state.mentions = filter_mentions(&self.state.text, &self.candidates)
            .into_iter()
            .cloned()
            .collect();
    }
}
