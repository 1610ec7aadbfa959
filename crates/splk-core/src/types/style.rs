//! StyleVector - an exponential moving average over observed communication
//! preferences, recovered from the legacy `UserProfile` persona model.
//!
//! Not part of the scoped-rule pipeline; the Injector surfaces a dimension
//! only once its own confidence has cleared a threshold, so an unobserved
//! user never gets fabricated style guidance.

use serde::{Deserialize, Serialize};

const EMA_ALPHA: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleDimension {
    Formality,
    Verbosity,
    Technicality,
    Directness,
    Creativity,
    Pace,
}

impl StyleDimension {
    pub const ALL: [StyleDimension; 6] = [
        StyleDimension::Formality,
        StyleDimension::Verbosity,
        StyleDimension::Technicality,
        StyleDimension::Directness,
        StyleDimension::Creativity,
        StyleDimension::Pace,
    ];

    fn label(self) -> &'static str {
        match self {
            StyleDimension::Formality => "formality",
            StyleDimension::Verbosity => "verbosity",
            StyleDimension::Technicality => "technicality",
            StyleDimension::Directness => "directness",
            StyleDimension::Creativity => "creativity",
            StyleDimension::Pace => "pace",
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleVector {
    pub formality: f32,
    pub verbosity: f32,
    pub technicality: f32,
    pub directness: f32,
    pub creativity: f32,
    pub pace: f32,
    confidence: [f32; 6],
}

impl Default for StyleVector {
    fn default() -> Self {
        Self {
            formality: 0.5,
            verbosity: 0.5,
            technicality: 0.5,
            directness: 0.5,
            creativity: 0.5,
            pace: 0.5,
            confidence: [0.0; 6],
        }
    }
}

impl StyleVector {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, dim: StyleDimension) -> &mut f32 {
        match dim {
            StyleDimension::Formality => &mut self.formality,
            StyleDimension::Verbosity => &mut self.verbosity,
            StyleDimension::Technicality => &mut self.technicality,
            StyleDimension::Directness => &mut self.directness,
            StyleDimension::Creativity => &mut self.creativity,
            StyleDimension::Pace => &mut self.pace,
        }
    }

    /// Blend a freshly-observed sample (0.0-1.0) into the running estimate
    /// and bump that dimension's confidence toward 1.0.
    pub fn update(&mut self, dim: StyleDimension, observed: f32) {
        let observed = observed.clamp(0.0, 1.0);
        let idx = StyleDimension::ALL.iter().position(|d| *d == dim).unwrap();
        let current = *self.slot(dim);
        *self.slot(dim) = current + EMA_ALPHA * (observed - current);
        self.confidence[idx] = (self.confidence[idx] + 0.15).min(1.0);
    }

    pub fn confidence_of(&self, dim: StyleDimension) -> f32 {
        let idx = StyleDimension::ALL.iter().position(|d| *d == dim).unwrap();
        self.confidence[idx]
    }

    pub fn value_of(&self, dim: StyleDimension) -> f32 {
        match dim {
            StyleDimension::Formality => self.formality,
            StyleDimension::Verbosity => self.verbosity,
            StyleDimension::Technicality => self.technicality,
            StyleDimension::Directness => self.directness,
            StyleDimension::Creativity => self.creativity,
            StyleDimension::Pace => self.pace,
        }
    }

    /// Human-readable lines for dimensions whose confidence has cleared
    /// `threshold`; empty when nothing has been observed confidently enough.
    pub fn describe(&self, threshold: f32) -> Vec<String> {
        StyleDimension::ALL
            .into_iter()
            .filter(|d| self.confidence_of(*d) > threshold)
            .map(|d| {
                let v = self.value_of(d);
                let lean = if v > 0.6 {
                    "high"
                } else if v < 0.4 {
                    "low"
                } else {
                    "moderate"
                };
                format!("{}: {lean} ({v:.2})", d.label())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_moves_toward_observation() {
        let mut sv = StyleVector::new();
        for _ in 0..20 {
            sv.update(StyleDimension::Formality, 0.9);
        }
        assert!(sv.formality > 0.8);
        assert!(sv.confidence_of(StyleDimension::Formality) > 0.9);
    }

    #[test]
    fn describe_hides_low_confidence_dimensions() {
        let sv = StyleVector::new();
        assert!(sv.describe(0.3).is_empty());
    }

    #[test]
    fn describe_surfaces_after_enough_updates() {
        let mut sv = StyleVector::new();
        sv.update(StyleDimension::Directness, 0.9);
        sv.update(StyleDimension::Directness, 0.9);
        sv.update(StyleDimension::Directness, 0.9);
        let lines = sv.describe(0.3);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("directness"));
    }
}
