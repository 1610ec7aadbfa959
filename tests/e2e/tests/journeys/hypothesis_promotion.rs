//! Hypothesis promotion journey: a creation signal plus three subsequent
//! validating signals on the hypothesis-gated pipeline promote a
//! `Hypothesis` into an established-track `ScopedRule` (universal
//! invariant 4, spec.md §8).

use splk_core::config::Pipeline;
use splk_e2e_tests::harness::{observe_n_times, TestSession};

#[test]
fn creation_plus_three_validations_promote_a_hypothesis_into_a_rule() {
    let mut fixture = TestSession::builder().pipeline(Pipeline::HypothesisBased).build();

    // 1 creation + 3 validating signals = hypothesis.validations reaches 3.
    observe_n_times(
        &mut fixture.session,
        "I prefer rust for backend services",
        "Noted.",
        4,
    );

    let metrics = fixture.session.kernel().metrics();
    assert_eq!(metrics.rule_count, 1);
}

#[test]
fn fewer_than_three_validations_do_not_promote() {
    let mut fixture = TestSession::builder().pipeline(Pipeline::HypothesisBased).build();

    // 1 creation + 2 validating signals = hypothesis.validations reaches 2.
    observe_n_times(
        &mut fixture.session,
        "I prefer rust for backend services",
        "Noted.",
        3,
    );

    let metrics = fixture.session.kernel().metrics();
    assert_eq!(metrics.rule_count, 0);
    assert_eq!(metrics.hypothesis_count, 1);
}
