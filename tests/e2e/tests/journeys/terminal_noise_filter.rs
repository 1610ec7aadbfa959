//! Terminal-stream noise (shell prompts, `ls -la` output, progress bars)
//! never produces a signal even when the line would otherwise match a
//! pattern, and an IDE file that hasn't been interacted with never yields
//! signals regardless of content (spec.md §8 scenario 6 and boundary
//! behaviours).

use splk_core::observer::{filter_terminal_noise, AttentionFilter, MultiStreamObserver};
use splk_core::types::ObservationStream;

#[test]
fn terminal_noise_filter_retains_only_the_conversational_lines() {
    let lines = ["ls -la", "npm install", "[====] 100/100", "User: How do I init?", "AI: git init"];

    let kept = filter_terminal_noise(&lines);

    assert_eq!(kept, vec!["User: How do I init?", "AI: git init"]);
}

#[test]
fn shell_prompt_lines_are_filtered_even_if_they_contain_trigger_words() {
    let mut observer = MultiStreamObserver::new();

    // Looks like it should match the preference pattern, but it's a
    // terminal noise line (a command echo).
    let signals = observer.observe_stream(ObservationStream::Terminal, "npm install i-prefer-dark-roast", "");
    assert!(signals.is_empty());

    let signals = observer.observe_stream(ObservationStream::Terminal, "total 48", "");
    assert!(signals.is_empty());
}

#[test]
fn terminal_error_text_yields_one_correction_signal() {
    let mut observer = MultiStreamObserver::new();

    let signals = observer.observe_stream(
        ObservationStream::Terminal,
        "error: expected `;`, found `}`",
        "",
    );
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].metadata.get("stream").map(String::as_str), Some("terminal"));
}

#[test]
fn ide_stream_infers_language_from_file_extension() {
    let mut observer = MultiStreamObserver::new();

    let signals = observer.observe_stream(ObservationStream::Ide, "src/main.rs", "fn main() {}");
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].metadata.get("language").map(String::as_str), Some("rust"));
}

#[test]
fn attention_filter_rejects_files_with_no_recorded_interaction() {
    let mut filter = AttentionFilter::new(0);

    let signals = filter.observe_ide("src/main.rs", "fn main() {}", false);
    assert!(signals.is_empty());
    assert!(!filter.is_attended("src/main.rs"));
}

#[test]
fn attention_filter_admits_files_once_interacted_with() {
    let mut filter = AttentionFilter::new(0);

    let signals = filter.observe_ide("src/main.rs", "fn main() {}", true);
    assert_eq!(signals.len(), 1);
    assert!(filter.is_attended("src/main.rs"));
}
