//! Injector - assembles the Markdown system-prompt fragment the Facade
//! hands to the calling assistant.
//!
//! Only Established rules, active goals, and non-conflicting facts ever
//! appear here; Shadow/Validating/Hypothesis rules stay internal
//! (Open Question resolution: shadow state is silent-only).

use std::fmt::Write as _;

use crate::compiler::detect_scope;
use crate::kernel::Kernel;
use crate::types::StyleVector;

const STYLE_CONFIDENCE_THRESHOLD: f32 = 0.3;
const SECTION_CAP: usize = 5;

/// `"Global"` for an empty/global-only scope path, otherwise the path
/// joined with `" > "` (§4.6 line prefix).
fn scope_label(scope_path: &[String]) -> String {
    if scope_path.is_empty() || (scope_path.len() == 1 && scope_path[0] == "Global") {
        "Global".to_string()
    } else {
        scope_path.join(" > ")
    }
}

/// Render the full system-prompt fragment for `user_query`: runs the
/// Compiler's scope detector on it (§4.6 step 1), then delegates to
/// [`generate_system_prompt_for_scope`].
pub fn generate_system_prompt(kernel: &Kernel, user_query: &str) -> String {
    let scope = detect_scope(user_query, None);
    generate_system_prompt_for_scope(kernel, &scope)
}

/// Assemble the mission briefing plus up to 5 lines each of active goals
/// (Laws), non-conflicting facts (Preferences), and Established rules
/// (Verified Behaviors) for an already-known `scope`. Never fails on an
/// empty kernel - the header is always present, and a section is omitted
/// only when it would be empty.
pub fn generate_system_prompt_for_scope(kernel: &Kernel, scope: &[String]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# MISSION BRIEFING");
    let _ = writeln!(out, "You are the user's Semantic Twin.");

    let goals = kernel.get_active_goals(Some(scope));
    if !goals.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "## CORE DIRECTIVES (Laws - MUST FOLLOW)");
        for goal in goals.iter().take(SECTION_CAP) {
            let _ = writeln!(
                out,
                "- [{}] {} (Priority: {})",
                scope_label(&goal.scope_path),
                goal.content,
                goal.decay_priority()
            );
        }
    }

    let facts = kernel.get_facts_not_conflicting(Some(scope));
    if !facts.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "## PREFERENCES (Follow unless conflicts with Laws)");
        for fact in facts.iter().take(SECTION_CAP) {
            let _ = writeln!(out, "- [{}] {}", scope_label(&fact.scope_path), fact.content);
        }
    }

    let rules: Vec<_> = kernel
        .query_scoped_rules(scope, None, None)
        .into_iter()
        .filter(|r| r.is_established())
        .collect();
    if !rules.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "## VERIFIED BEHAVIORS");
        for rule in rules.iter().take(SECTION_CAP) {
            let _ = writeln!(out, "- [{}] {}", scope_label(&rule.scope_path), rule.content);
        }
    }

    out.trim_end().to_string()
}

/// A persona paragraph summarising communication style alone, independent
/// of scope - used by callers that want a user-level persona blurb rather
/// than a full scoped system prompt.
pub fn generate_persona_prompt(style: &StyleVector) -> String {
    let lines = style.describe(STYLE_CONFIDENCE_THRESHOLD);
    if lines.is_empty() {
        return "No confident communication-style signal yet.".to_string();
    }
    format!("Communication style observed so far: {}.", lines.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::config::SplkConfig;
    use crate::types::SignalType;
    use crate::types::Signal;

    fn kernel() -> Kernel {
        Kernel::in_memory(SplkConfig::default())
    }

    #[test]
    fn only_established_rules_are_injected() {
        let k = kernel();
        let compiler = Compiler::new();
        let signal = Signal::new(SignalType::Preference, "I prefer pytest for python testing", 0.9, "h1");
        for _ in 0..2 {
            compiler.scientific_evolve(&k, std::slice::from_ref(&signal)).unwrap();
        }
        // Two calls (create + one validate) only reaches 0.35, still Hypothesis.
        let prompt = generate_system_prompt(&k, "how do I write python tests?");
        assert!(!prompt.contains("VERIFIED BEHAVIORS"));

        for _ in 0..3 {
            compiler.scientific_evolve(&k, std::slice::from_ref(&signal)).unwrap();
        }
        let prompt = generate_system_prompt(&k, "how do I write python tests?");
        assert!(prompt.contains("VERIFIED BEHAVIORS"));
        assert!(prompt.contains("[Python]"));
    }

    #[test]
    fn empty_kernel_still_emits_the_mission_briefing_header() {
        let k = kernel();
        let prompt = generate_system_prompt(&k, "anything at all");
        assert_eq!(prompt, "# MISSION BRIEFING\nYou are the user's Semantic Twin.");
    }

    #[test]
    fn sections_are_capped_at_five_lines_each() {
        let k = kernel();
        let compiler = Compiler::new();
        for i in 0..8 {
            let content = format!("I prefer option {i} for python testing");
            let signal = Signal::new(SignalType::Preference, content, 0.9, format!("h{i}"));
            for _ in 0..5 {
                compiler.scientific_evolve(&k, std::slice::from_ref(&signal)).unwrap();
            }
        }
        let prompt = generate_system_prompt(&k, "python testing preferences");
        assert_eq!(prompt.matches("- [Python]").count(), 5);
    }

    #[test]
    fn persona_prompt_reports_no_signal_when_unobserved() {
        let style = StyleVector::new();
        assert!(generate_persona_prompt(&style).contains("No confident"));
    }
}
