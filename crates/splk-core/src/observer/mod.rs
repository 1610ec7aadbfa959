//! Observer - turns raw interaction text into typed `Signal`s.
//!
//! The base `Observer` is a single-stream, regex-driven pattern matcher that
//! extracts type-specific content per signal (§4.2) and reports an aggregate
//! confidence over the batch. `MultiStreamObserver` wraps it to tag signals
//! with the stream they came from and to filter stream-specific noise.
//! `AttentionFilter` gates IDE observations on files that haven't held the
//! user's attention long enough to trust.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::types::{content_hash, ObservationStream, Signal, SignalType};

const DIAGNOSTIC_RING_CAPACITY: usize = 256;
const CONTENT_CAP: usize = 200;
const EXTRACT_CAP: usize = 100;

struct Pattern {
    signal_type: SignalType,
    regex: &'static Regex,
    confidence: f32,
}

static CORRECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(no,? (?:actually|wait)|that'?s wrong|not like that|don'?t do that|\bwrong\b|\bactually\b|\binstead\b)\b").unwrap()
});
static CORRECTION_INSTEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:use|do|try)\s+(.+?)\s+instead\b").unwrap());
static PREFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:i (?:prefer|like|want|would rather)|i'?d rather|please (?:always|use))\b\s*(.*)").unwrap()
});
static AVERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:i (?:hate|dislike|don'?t like)|never use|avoid using|stop using)\b\s*(.*)").unwrap()
});
static EXPERTISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:i(?:'ve| have) (?:been )?(?:using|working with) (.+?) for \d+ years?|i'?m (?:an? )?(?:expert|senior|experienced) (?:in|with) (.+))\b").unwrap()
});
static GOAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:i(?:'m| am) (?:trying|planning|building) to|my goal is|i need to (?:ship|finish|launch))\b\s*(.*)").unwrap()
});
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:i'?m working on|this is (?:a|my) project called)\s+([A-Za-z][A-Za-z0-9_-]*)|using (?:the )?([A-Z][a-zA-Z0-9]+) (?:framework|library)").unwrap()
});
static WORKFLOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(i always|my workflow is|before i|after i (?:write|commit|push))\b").unwrap()
});
static CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(for context|background:|fyi,?|just so you know)\b").unwrap()
});
static PERSONALITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bi tend to (.+)|i'?m (?:a )?(perfectionist|pragmatist|night owl|early bird)\b").unwrap()
});

/// `(category label, keywords)`. First category whose keyword appears wins.
const STYLE_CATEGORIES: &[(&str, &[&str])] = &[
    ("formal", &["formally", "formal tone", "professional tone"]),
    ("casual", &["casually", "casual tone", "informally"]),
    ("technical", &["technical detail", "in technical terms"]),
    ("concise", &["keep it short", "keep it brief", "be brief", "be concise"]),
    ("detailed", &["explain in detail", "explain thoroughly", "be more detailed"]),
    ("direct", &["be more direct", "just tell me"]),
];

/// Vocabulary used for the expertise-by-token-count heuristic; any 3+
/// distinct hits from this list, absent an explicit "I'm an expert" phrase,
/// still counts as an EXPERTISE signal.
const TECHNICAL_VOCABULARY: &[&str] = &[
    "algorithm", "async", "kubernetes", "docker", "database", "concurrency",
    "recursion", "compiler", "runtime", "latency", "throughput", "kernel",
    "microservice", "distributed", "idempotent", "mutex", "threading",
    "cache", "indexing", "schema", "api", "protocol",
];

fn patterns() -> [Pattern; 8] {
    [
        Pattern { signal_type: SignalType::Correction, regex: &CORRECTION_RE, confidence: 0.85 },
        Pattern { signal_type: SignalType::Preference, regex: &PREFERENCE_RE, confidence: 0.7 },
        Pattern { signal_type: SignalType::Aversion, regex: &AVERSION_RE, confidence: 0.7 },
        Pattern { signal_type: SignalType::Expertise, regex: &EXPERTISE_RE, confidence: 0.65 },
        Pattern { signal_type: SignalType::Goal, regex: &GOAL_RE, confidence: 0.6 },
        Pattern { signal_type: SignalType::Entity, regex: &ENTITY_RE, confidence: 0.55 },
        Pattern { signal_type: SignalType::Workflow, regex: &WORKFLOW_RE, confidence: 0.55 },
        Pattern { signal_type: SignalType::Context, regex: &CONTEXT_RE, confidence: 0.4 },
    ]
}

fn cap(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        trimmed.chars().take(max).collect()
    }
}

/// Type-specific content extraction per the §4.2 table. Falls back to the
/// capped raw text when the pattern has no capture worth surfacing.
fn extract_content(signal_type: SignalType, user_input: &str, caps: &regex::Captures) -> String {
    match signal_type {
        SignalType::Correction => match CORRECTION_INSTEAD_RE.captures(user_input) {
            Some(c) => format!("Prefer: {}", cap(&c[1], EXTRACT_CAP)),
            None => cap(user_input, CONTENT_CAP),
        },
        SignalType::Preference => {
            let tail = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if tail.trim().is_empty() {
                cap(user_input, CONTENT_CAP)
            } else {
                cap(tail, EXTRACT_CAP)
            }
        }
        SignalType::Aversion => {
            let tail = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if tail.trim().is_empty() {
                format!("Avoid: {}", cap(user_input, EXTRACT_CAP))
            } else {
                format!("Avoid: {}", cap(tail, EXTRACT_CAP))
            }
        }
        SignalType::Expertise => {
            let domain = caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str())
                .unwrap_or("general");
            format!("Expert: {}", cap(domain, EXTRACT_CAP))
        }
        SignalType::Goal => {
            let tail = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if tail.trim().is_empty() {
                cap(user_input, CONTENT_CAP)
            } else {
                cap(tail, EXTRACT_CAP)
            }
        }
        SignalType::Entity => {
            let name = caps.iter().skip(1).flatten().next().map(|m| m.as_str());
            match name {
                Some(n) => n.to_string(),
                None => cap(user_input, CONTENT_CAP),
            }
        }
        SignalType::Personality => {
            let trait_label = caps.iter().skip(1).flatten().next().map(|m| m.as_str()).unwrap_or("tends_to");
            format!("trait:{}", trait_label.trim().replace(' ', "_").to_lowercase())
        }
        SignalType::Context | SignalType::Workflow | SignalType::Style => cap(user_input, CONTENT_CAP),
    }
}

fn expertise_by_vocabulary(user_input: &str) -> Option<String> {
    let lowered = user_input.to_lowercase();
    let mut hits: HashSet<&str> = HashSet::new();
    for word in TECHNICAL_VOCABULARY {
        if lowered.split(|c: char| !c.is_alphanumeric()).any(|t| t == *word) {
            hits.insert(word);
        }
    }
    if hits.len() >= 3 {
        let mut sorted: Vec<&str> = hits.into_iter().collect();
        sorted.sort();
        Some(format!("Expert: {}", sorted.join(",")))
    } else {
        None
    }
}

fn style_category_signal(user_input: &str) -> Option<String> {
    let lowered = user_input.to_lowercase();
    STYLE_CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(label, _)| format!("style:{label}"))
}

/// Length/question-count dynamics heuristics, independent of the keyword
/// patterns above (§4.2).
fn dynamics_signals(user_input: &str, hash: &str) -> Vec<Signal> {
    let mut out = Vec::new();
    let len = user_input.trim().chars().count();
    let questions = user_input.matches('?').count();

    if len < 50 {
        out.push(Signal::new(SignalType::Style, "style:concise_questions", 0.5, hash));
    } else if len > 300 {
        out.push(Signal::new(SignalType::Style, "style:detailed_context", 0.5, hash));
    }
    if questions > 2 {
        out.push(Signal::new(SignalType::Style, "style:multi_question", 0.5, hash));
    }
    out
}

/// Regex-driven extraction of typed `Signal`s from one `(user, ai)` turn.
pub struct Observer {
    diagnostics: VecDeque<String>,
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer {
    pub fn new() -> Self {
        Self {
            diagnostics: VecDeque::with_capacity(DIAGNOSTIC_RING_CAPACITY),
        }
    }

    /// Extract every signal the user turn matches, plus the style-category
    /// and dynamics-heuristic signals, deduplicated by `(type, normalised
    /// content)`. Order follows pattern declaration order, which is also
    /// specificity order (corrections before generic context mentions).
    pub fn observe(&mut self, user_input: &str, _ai_output: &str) -> Vec<Signal> {
        let hash = content_hash(user_input, _ai_output);
        let mut signals = Vec::new();

        for pattern in patterns() {
            if let Some(caps) = pattern.regex.captures(user_input) {
                let content = extract_content(pattern.signal_type, user_input, &caps);
                let signal = Signal::new(pattern.signal_type, content, pattern.confidence, hash.clone());
                self.record_diagnostic(format!("{:?} matched", pattern.signal_type));
                signals.push(signal);
            }
        }

        if let Some(trait_label) = PERSONALITY_RE.captures(user_input) {
            let content = extract_content(SignalType::Personality, user_input, &trait_label);
            signals.push(Signal::new(SignalType::Personality, content, 0.45, hash.clone()));
        }

        if !signals.iter().any(|s| s.signal_type == SignalType::Expertise) {
            if let Some(content) = expertise_by_vocabulary(user_input) {
                signals.push(Signal::new(SignalType::Expertise, content, 0.6, hash.clone()));
            }
        }

        if let Some(content) = style_category_signal(user_input) {
            signals.push(Signal::new(SignalType::Style, content, 0.5, hash.clone()));
        }
        signals.extend(dynamics_signals(user_input, &hash));

        dedup_signals(&mut signals);

        let aggregate = aggregate_confidence(&signals);
        if !signals.is_empty() {
            self.record_diagnostic(format!("{} signals, aggregate confidence {:.2}", signals.len(), aggregate));
        }
        signals
    }

    fn record_diagnostic(&mut self, msg: String) {
        if self.diagnostics.len() >= DIAGNOSTIC_RING_CAPACITY {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(msg);
        tracing::trace!(target: "splk_core::observer", "{}", self.diagnostics.back().unwrap());
    }

    pub fn recent_diagnostics(&self) -> impl Iterator<Item = &String> {
        self.diagnostics.iter()
    }
}

fn dedup_signals(signals: &mut Vec<Signal>) {
    let mut seen = HashSet::new();
    signals.retain(|s| seen.insert((s.signal_type, s.normalised_content())));
}

/// Weighted mean of `signal.confidence` over `SignalType::aggregate_weight`,
/// `0.0` for an empty batch (§4.2).
pub fn aggregate_confidence(signals: &[Signal]) -> f32 {
    let (weighted_sum, weight_total) = signals.iter().fold((0.0f32, 0.0f32), |(sum, total), s| {
        let w = s.signal_type.aggregate_weight();
        (sum + s.confidence * w, total + w)
    });
    if weight_total <= f32::EPSILON {
        0.0
    } else {
        weighted_sum / weight_total
    }
}

const NOISE_KEYWORDS: &[&str] = &["node_modules", "__pycache__", "total "];

static NOISE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\$|#|>|~/|(?:ls|cd|pwd|cat|mkdir|rm|sudo|npm|yarn|pip|git|cargo|python|node|docker|kubectl)\b)").unwrap()
});
static PROGRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\[[=#>\-\s\d%/.]*\]|[\\|/\-]\s*$)").unwrap());
static HEX_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F\-]+$").unwrap());
static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(error|traceback)\b").unwrap());

/// Whether a single terminal line is noise: shell prompts, command echoes,
/// progress bars/spinners, hex digests, and known noisy directory names
/// never become signals even if they'd otherwise match a pattern.
fn is_terminal_noise(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    if NOISE_PREFIX_RE.is_match(trimmed) || PROGRESS_RE.is_match(trimmed) {
        return true;
    }
    if HEX_LINE_RE.is_match(trimmed) && trimmed.chars().any(|c| c.is_ascii_hexdigit()) {
        return true;
    }
    NOISE_KEYWORDS.iter().any(|k| trimmed.to_lowercase().contains(k))
}

/// Drop terminal noise from a batch of lines, keeping only the ones
/// substantial enough to be worth observing (§8 scenario 6).
pub fn filter_terminal_noise<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    lines.iter().copied().filter(|l| !is_terminal_noise(l)).collect()
}

fn infer_language(file_path: &str) -> &'static str {
    match file_path.rsplit('.').next().unwrap_or("") {
        "rs" => "rust",
        "py" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "go" => "go",
        "rb" => "ruby",
        "java" => "java",
        "kt" => "kotlin",
        "swift" => "swift",
        "cpp" | "cc" | "hpp" | "h" => "cpp",
        "cs" => "csharp",
        "php" => "php",
        _ => "unknown",
    }
}

/// Per-stream noise filtering, applied before extraction is even attempted.
fn is_stream_noise(stream: ObservationStream, text: &str) -> bool {
    match stream {
        ObservationStream::Terminal => is_terminal_noise(text),
        ObservationStream::Ide => false,
        ObservationStream::Browser => text.trim().len() < 4,
    }
}

/// Wraps a base `Observer` to tag signals with their originating stream and
/// drop stream-specific noise before extraction is even attempted.
pub struct MultiStreamObserver {
    inner: Observer,
}

impl Default for MultiStreamObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiStreamObserver {
    pub fn new() -> Self {
        Self { inner: Observer::new() }
    }

    fn stream_label(stream: ObservationStream) -> &'static str {
        match stream {
            ObservationStream::Browser => "browser",
            ObservationStream::Ide => "ide",
            ObservationStream::Terminal => "terminal",
        }
    }

    /// Dispatch on `stream`:
    /// - *browser*: `(user_input, ai_output)`, full extraction as `Observer::observe`.
    /// - *ide*: `(file_path, line_content)`, language inferred from the
    ///   extension, exactly one CONTEXT signal.
    /// - *terminal*: `(text, _)`, noise-filtered; an `error`/`traceback` in
    ///   the surviving text yields exactly one CORRECTION signal.
    pub fn observe_stream(&mut self, stream: ObservationStream, a: &str, b: &str) -> Vec<Signal> {
        if is_stream_noise(stream, a) {
            return Vec::new();
        }
        let label = Self::stream_label(stream);

        match stream {
            ObservationStream::Browser => self
                .inner
                .observe(a, b)
                .into_iter()
                .map(|s| s.with_metadata("stream", label))
                .collect(),
            ObservationStream::Ide => {
                let file_path = a;
                let line_content = b;
                let language = infer_language(file_path);
                let hash = content_hash(file_path, line_content);
                let signal = Signal::new(SignalType::Context, cap(line_content, CONTENT_CAP), 0.4, hash)
                    .with_metadata("stream", label)
                    .with_metadata("file_path", file_path)
                    .with_metadata("language", language);
                vec![signal]
            }
            ObservationStream::Terminal => {
                if ERROR_RE.is_match(a) {
                    let hash = content_hash(a, b);
                    let signal =
                        Signal::new(SignalType::Correction, cap(a, CONTENT_CAP), 0.6, hash).with_metadata("stream", label);
                    vec![signal]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

/// Gates IDE observations on a per-file `(first_seen_at, has_interacted)`
/// pair: a file is attended iff `now - first_seen_at >= min_dwell` and the
/// user has explicitly interacted with it at least once. Unattended files
/// yield zero signals regardless of content.
pub struct AttentionFilter {
    inner: MultiStreamObserver,
    min_dwell: Duration,
    files: HashMap<String, (DateTime<Utc>, bool)>,
}

impl Default for AttentionFilter {
    fn default() -> Self {
        Self::new(15)
    }
}

impl AttentionFilter {
    pub fn new(min_dwell_secs: i64) -> Self {
        Self {
            inner: MultiStreamObserver::new(),
            min_dwell: Duration::seconds(min_dwell_secs),
            files: HashMap::new(),
        }
    }

    /// Record an IDE observation of `file_path` and, if the file is
    /// attended, forward to the wrapped observer.
    pub fn observe_ide(&mut self, file_path: &str, line_content: &str, interacted: bool) -> Vec<Signal> {
        if self.gate(file_path, interacted, Utc::now()) {
            self.inner.observe_stream(ObservationStream::Ide, file_path, line_content)
        } else {
            Vec::new()
        }
    }

    pub fn is_attended(&self, file_path: &str) -> bool {
        self.files
            .get(file_path)
            .map(|(_, has_interacted)| *has_interacted)
            .unwrap_or(false)
    }

    fn gate(&mut self, file_path: &str, interacted: bool, now: DateTime<Utc>) -> bool {
        let entry = self.files.entry(file_path.to_string()).or_insert((now, false));
        if interacted {
            entry.1 = true;
        }
        let (first_seen_at, has_interacted) = *entry;
        now - first_seen_at >= self.min_dwell && has_interacted
    }
}
