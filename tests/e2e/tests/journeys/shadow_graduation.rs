//! A rule's progression Hypothesis -> Shadow -> Validating -> Established
//! tracks confidence exactly, and the Injector only ever surfaces the
//! Established tier (shadow rules stay silent).

use splk_e2e_tests::harness::TestSession;

fn established_count(fixture: &mut TestSession, query: &str) -> usize {
    fixture.session.inject(query).rules_used
}

#[test]
fn shadow_tier_rule_is_never_injected() {
    let mut fixture = TestSession::builder().build();

    // create (0.2, Hypothesis) + 2 validates -> 0.50 (Shadow).
    for i in 0..3 {
        fixture
            .session
            .observe(&format!("I prefer rust generics here (turn {i})"), "ok", true)
            .unwrap();
    }
    assert_eq!(established_count(&mut fixture, "writing rust code"), 0);

    // 2 more validates -> 0.65 (Validating), 0.80 (Established).
    for i in 3..5 {
        fixture
            .session
            .observe(&format!("I prefer rust generics here (turn {i})"), "ok", true)
            .unwrap();
    }
    assert_eq!(established_count(&mut fixture, "writing rust code"), 1);
}
