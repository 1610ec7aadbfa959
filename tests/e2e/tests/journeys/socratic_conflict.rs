//! A signal that contradicts an already-Established rule must raise a
//! collaboration request rather than silently overwrite the user's
//! stated preference.

use splk_e2e_tests::harness::TestSession;
use splk_session::ObserveResult;

#[test]
fn contradicting_an_established_rule_raises_collaboration_request() {
    let mut fixture = TestSession::builder().build();

    // Five distinct observations: create (0.2) + four validates reach 0.8 (Established).
    for i in 0..5 {
        fixture
            .session
            .observe(&format!("I prefer pytest for python testing (turn {i})"), "Noted.", true)
            .unwrap();
    }

    let established = fixture.session.inject("writing python tests").rules_used;
    assert_eq!(established, 1);

    let result = fixture
        .session
        .observe("I hate pytest now, never use it for python testing", "Noted.", true)
        .unwrap();

    match result {
        ObserveResult::Observed { collaboration_requests, .. } => {
            assert_eq!(collaboration_requests, 1);
        }
        ObserveResult::Skipped => panic!("expected a fresh observation, not a dedup skip"),
    }

    // The established rule must survive untouched - no silent overwrite.
    assert_eq!(fixture.session.inject("writing python tests").rules_used, 1);
}
