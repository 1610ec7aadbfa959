//! Saving a kernel to cold storage and loading it back into a fresh
//! session reproduces byte-identical injected prompts (spec.md §8,
//! testable property 7).

use splk_e2e_tests::harness::TestSession;

#[test]
fn save_then_load_reproduces_the_same_injected_prompt() {
    let mut original = TestSession::builder().build();
    original.session.teach("prefer rust for backend services", "preference").unwrap();
    original.session.teach("always write tests before implementation", "workflow").unwrap();

    let before = original.session.inject("backend rust work");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel_snapshot.json.gz");
    original.session.save(&path).unwrap();

    let mut restored = TestSession::builder().build();
    restored.session.load(&path).unwrap();

    let after = restored.session.inject("backend rust work");

    assert_eq!(before.system_prompt, after.system_prompt);
    assert_eq!(before.rules_used, after.rules_used);
    assert_eq!(
        restored.session.kernel().metrics().rule_count,
        original.session.kernel().metrics().rule_count
    );
}

#[test]
fn loading_an_incompatible_major_version_fails() {
    use std::io::Write;

    let mut fixture = TestSession::builder().build();
    fixture.session.teach("prefer tabs", "preference").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel_snapshot.json");
    fixture.session.save(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&contents).unwrap();
    value["version"] = serde_json::Value::String("999.0.0".to_string());

    let bad_path = dir.path().join("kernel_snapshot_bad.json");
    let mut file = std::fs::File::create(&bad_path).unwrap();
    file.write_all(serde_json::to_string(&value).unwrap().as_bytes()).unwrap();

    let mut loader = TestSession::builder().build();
    assert!(loader.session.load(&bad_path).is_err());
}
