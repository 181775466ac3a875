//! Content heuristics applied to user text before it leaves the client or
//! reaches an upstream API.

use std::collections::VecDeque;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;

const MIN_LENGTH: usize = 2;
const MAX_CHARACTER_RUN: usize = 10;
const MAX_PHRASE_LENGTH: usize = 20;
const MIN_PHRASE_REPEATS: usize = 4;

static SPAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"spam").expect("valid pattern"));
static TEST_BOILERPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"test\s*(message|msg|text)\s*\d*").expect("valid pattern"));
static PROFANITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)fuck|shit|bitch|asshole|damn").expect("valid pattern"));
static SPECIAL_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[!@#$%^&*()]{5,}").expect("valid pattern"));
static SINGLE_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*[a-z]\s*$").expect("valid pattern"));
static REPEATED_GREETING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(hi|hello|hey|yo|sup){3,}$").expect("valid pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbuseReason {
    TooShort,
    Duplicate,
    SpamToken,
    TestBoilerplate,
    RepeatedCharacter,
    RepeatedPhrase,
    Profanity,
    SpecialCharacters,
    SingleLetter,
    RepeatedGreeting,
    /// Rejected by a classifier that gave no reason.
    Other,
}

impl AbuseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbuseReason::TooShort => "too_short",
            AbuseReason::Duplicate => "duplicate",
            AbuseReason::SpamToken => "spam_token",
            AbuseReason::TestBoilerplate => "test_boilerplate",
            AbuseReason::RepeatedCharacter => "repeated_character",
            AbuseReason::RepeatedPhrase => "repeated_phrase",
            AbuseReason::Profanity => "profanity",
            AbuseReason::SpecialCharacters => "special_characters",
            AbuseReason::SingleLetter => "single_letter",
            AbuseReason::RepeatedGreeting => "repeated_greeting",
            AbuseReason::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: Option<AbuseReason>,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn reject(reason: AbuseReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Decides whether a piece of user text may be sent on.
pub trait ContentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Verdict;
}

/// Fixed, ordered pattern list. The first matching rule rejects; text that
/// matches nothing is allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternClassifier;

impl PatternClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl ContentClassifier for PatternClassifier {
    fn classify(&self, text: &str) -> Verdict {
        if is_too_short(text) {
            return Verdict::reject(AbuseReason::TooShort);
        }

        let rules: [(AbuseReason, fn(&str) -> bool); 8] = [
            (AbuseReason::SpamToken, |t| SPAM.is_match(t)),
            (AbuseReason::TestBoilerplate, |t| TEST_BOILERPLATE.is_match(t)),
            (AbuseReason::RepeatedCharacter, has_character_run),
            (AbuseReason::RepeatedPhrase, is_repeated_phrase),
            (AbuseReason::Profanity, |t| PROFANITY.is_match(t)),
            (AbuseReason::SpecialCharacters, |t| SPECIAL_CHARACTERS.is_match(t)),
            (AbuseReason::SingleLetter, |t| SINGLE_LETTER.is_match(t)),
            (AbuseReason::RepeatedGreeting, |t| REPEATED_GREETING.is_match(t)),
        ];

        rules
            .iter()
            .find(|(_, matches)| matches(text))
            .map(|(reason, _)| Verdict::reject(*reason))
            .unwrap_or_else(Verdict::allow)
    }
}

pub fn is_too_short(text: &str) -> bool {
    text.trim().chars().count() < MIN_LENGTH
}

/// Any character other than a line break repeated more than ten times in a row.
fn has_character_run(text: &str) -> bool {
    let mut previous = None;
    let mut run = 0usize;
    for c in text.chars() {
        if c == '\n' || c == '\r' {
            previous = None;
            run = 0;
            continue;
        }
        if previous == Some(c) {
            run += 1;
        } else {
            previous = Some(c);
            run = 1;
        }
        if run > MAX_CHARACTER_RUN {
            return true;
        }
    }
    false
}

/// The whole text is one short phrase (1..=20 chars) repeated four or more times.
fn is_repeated_phrase(text: &str) -> bool {
    if text.contains(['\n', '\r']) {
        return false;
    }
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    (1..=MAX_PHRASE_LENGTH.min(len)).any(|unit| {
        len % unit == 0
            && len / unit >= MIN_PHRASE_REPEATS
            && chars.chunks(unit).all(|chunk| chunk == &chars[..unit])
    })
}

/// Remembers recently sent texts so the same message cannot be fired over and
/// over within a short window.
#[derive(Debug)]
pub struct DuplicateTracker {
    window: Duration,
    max_repeats: usize,
    capacity: usize,
    recent: VecDeque<(String, Instant)>,
}

impl DuplicateTracker {
    pub fn new(window: Duration, max_repeats: usize, capacity: usize) -> Self {
        Self {
            window,
            max_repeats,
            capacity,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    /// Rejects `text` when it was already seen `max_repeats` times within the
    /// window; otherwise records it.
    pub fn check(&mut self, text: &str, now: Instant) -> Result<(), AbuseReason> {
        let normalized = text.trim().to_lowercase();
        let window = self.window;
        self.recent
            .retain(|(_, seen_at)| now.saturating_duration_since(*seen_at) < window);

        let repeats = self
            .recent
            .iter()
            .filter(|(seen, _)| *seen == normalized)
            .count();
        if repeats >= self.max_repeats {
            return Err(AbuseReason::Duplicate);
        }

        self.recent.push_back((normalized, now));
        while self.recent.len() > self.capacity {
            self.recent.pop_front();
        }
        Ok(())
    }
}
