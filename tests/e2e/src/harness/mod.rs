//! Test fixture builder: a `Session` wired to a temp-dir cold-storage
//! archive so integration tests never touch the real data directory and
//! clean up automatically when the fixture drops.

use splk_core::config::{Pipeline, SplkConfig};
use splk_session::Session;

/// Owns the `TempDir` so the archive directory outlives the `Session`
/// built on top of it; dropping this drops the directory.
pub struct TestSession {
    pub session: Session,
    _archive_dir: tempfile::TempDir,
}

impl TestSession {
    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder::default()
    }
}

#[derive(Default)]
pub struct TestSessionBuilder {
    pipeline: Option<Pipeline>,
    gc_threshold: Option<u32>,
    max_rules: Option<usize>,
}

impl TestSessionBuilder {
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn gc_threshold(mut self, threshold: u32) -> Self {
        self.gc_threshold = Some(threshold);
        self
    }

    pub fn max_rules(mut self, max: usize) -> Self {
        self.max_rules = Some(max);
        self
    }

    pub fn build(self) -> TestSession {
        let dir = tempfile::tempdir().expect("create temp archive dir");
        let mut config = SplkConfig {
            archive_path: Some(dir.path().join("archive")),
            gc_threshold: self.gc_threshold.unwrap_or(1000),
            ..SplkConfig::default()
        };
        if let Some(pipeline) = self.pipeline {
            config.pipeline = pipeline;
        }
        if let Some(max_rules) = self.max_rules {
            config.max_rules = max_rules;
        }
        let session = Session::new(config).expect("construct session");
        TestSession {
            session,
            _archive_dir: dir,
        }
    }
}

/// Drive `observe` repeatedly with the same `(user, ai)` pair, varying a
/// counter so each call produces a distinct content hash and is never
/// deduped - useful for reaching a rule's Established threshold.
pub fn observe_n_times(session: &mut Session, user_template: &str, ai: &str, n: usize) {
    for i in 0..n {
        let user = format!("{user_template} (turn {i})");
        session.observe(&user, ai, true).expect("observe should not fail");
    }
}
