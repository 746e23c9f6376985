//! Selectors - turning continuous activation into discrete choices.
//!
//! The Boltzmann and categorical selectors compute a Boltzmann distribution
//! over the options of an activation packet and sample from it with their
//! own random source. Seeded selectors are reproducible: the same seed and
//! the same inputs give the same choices, and [`Selector::reset`] rewinds the
//! random source. [`ThresholdSelector`] is deterministic.

use construct_model::{ActivationPacket, ConstructSymbol, DecisionPacket};
use rand::prelude::*;
use std::any::Any;

use crate::error::SelectorError;

/// Converts option strengths into a decision.
pub trait Selector {
    /// Selection probabilities for every option in `strengths`.
    fn distribution(&self, strengths: &ActivationPacket) -> Result<ActivationPacket, SelectorError>;

    /// Sample a decision.
    fn select(&mut self, strengths: &ActivationPacket) -> Result<DecisionPacket, SelectorError>;

    /// Restore the random source to its construction-time state.
    fn reset(&mut self) {}

    /// Capture the random source so a failed pass can rewind it.
    /// Deterministic selectors return `None`.
    fn checkpoint(&self) -> Option<Checkpoint> {
        None
    }

    /// Rewind to a checkpoint taken by this selector.
    fn rewind(&mut self, _checkpoint: Checkpoint) {}
}

/// Opaque internal state of a propagator or selector.
pub type Checkpoint = Box<dyn Any>;

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn check_threshold(threshold: f64) -> Result<f64, SelectorError> {
    if threshold.is_nan() {
        return Err(SelectorError::InvalidThreshold(threshold));
    }
    Ok(threshold)
}

/// Softmax selector: `p_i = exp((s_i - max) / T) / sum_j exp((s_j - max) / T)`.
///
/// - `T == 0` is a hard max; tied winners share the probability evenly.
/// - All-zero strengths give a uniform distribution.
/// - `-inf` is an option with probability zero.
/// - Empty input, a `NaN` or `+inf` strength, or only `-inf` strengths, has
///   no viable option.
/// - With a threshold, options at or below it get probability zero. If none
///   is above it the distribution is all zeros and nothing is chosen.
///
/// `picks` options are drawn without replacement, only among options with
/// non-zero probability, so fewer may be returned.
#[derive(Debug, Clone)]
pub struct BoltzmannSelector {
    temperature: f64,
    threshold: Option<f64>,
    picks: usize,
    seed: Option<u64>,
    rng: StdRng,
}

impl BoltzmannSelector {
    /// Create a selector drawing one option, seeded from the OS.
    pub fn new(temperature: f64) -> Result<Self, SelectorError> {
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(SelectorError::InvalidTemperature(temperature));
        }

        Ok(Self {
            temperature,
            threshold: None,
            picks: 1,
            seed: None,
            rng: make_rng(None),
        })
    }

    /// Use a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self.rng = make_rng(self.seed);
        self
    }

    /// Draw `picks` options per decision.
    pub fn with_picks(mut self, picks: usize) -> Self {
        self.picks = picks;
        self
    }

    /// Only offer options whose strength is strictly above `threshold`.
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self, SelectorError> {
        self.threshold = Some(check_threshold(threshold)?);
        Ok(self)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn picks(&self) -> usize {
        self.picks
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn is_offered(&self, strength: f64) -> bool {
        strength > f64::NEG_INFINITY && self.threshold.map_or(true, |threshold| strength > threshold)
    }

    fn sample(&mut self, distribution: &ActivationPacket) -> Vec<ConstructSymbol> {
        let mut remaining: Vec<(&ConstructSymbol, f64)> = distribution
            .iter()
            .filter(|(_, probability)| *probability > 0.0)
            .collect();
        let mut chosen = Vec::with_capacity(self.picks.min(remaining.len()));

        while chosen.len() < self.picks && !remaining.is_empty() {
            let total: f64 = remaining.iter().map(|(_, probability)| probability).sum();
            let target = self.rng.random::<f64>() * total;

            let mut cumulative = 0.0;
            let mut index = remaining.len() - 1;
            for (i, (_, probability)) in remaining.iter().enumerate() {
                cumulative += probability;
                if target < cumulative {
                    index = i;
                    break;
                }
            }

            let (symbol, _) = remaining.remove(index);
            chosen.push(symbol.clone());
        }

        chosen
    }
}

impl Selector for BoltzmannSelector {
    fn distribution(&self, strengths: &ActivationPacket) -> Result<ActivationPacket, SelectorError> {
        let no_viable = || SelectorError::NoViableOption(strengths.len());
        if strengths.is_empty()
            || strengths
                .iter()
                .any(|(_, strength)| strength.is_nan() || strength == f64::INFINITY)
            || strengths.iter().all(|(_, strength)| strength == f64::NEG_INFINITY)
        {
            return Err(no_viable());
        }

        let max = strengths
            .iter()
            .map(|(_, strength)| strength)
            .filter(|strength| self.is_offered(*strength))
            .fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return Ok(strengths.map(|_, _| 0.0));
        }

        let weights = if self.temperature == 0.0 {
            strengths.map(|_, strength| {
                if self.is_offered(strength) && strength == max {
                    1.0
                } else {
                    0.0
                }
            })
        } else {
            strengths.map(|_, strength| {
                if self.is_offered(strength) {
                    ((strength - max) / self.temperature).exp()
                } else {
                    0.0
                }
            })
        };

        Ok(weights.scaled(1.0 / weights.total()))
    }

    fn select(&mut self, strengths: &ActivationPacket) -> Result<DecisionPacket, SelectorError> {
        let distribution = self.distribution(strengths)?;
        let chosen = self.sample(&distribution);

        Ok(DecisionPacket::new(chosen, strengths.clone(), distribution))
    }

    fn reset(&mut self) {
        self.rng = make_rng(self.seed);
    }

    fn checkpoint(&self) -> Option<Checkpoint> {
        Some(Box::new(self.rng.clone()))
    }

    fn rewind(&mut self, checkpoint: Checkpoint) {
        if let Ok(rng) = checkpoint.downcast::<StdRng>() {
            self.rng = *rng;
        }
    }
}

/// Samples options whose strengths are log-probabilities.
///
/// This is a Boltzmann selector fixed at `T = 1`: `exp(log p_i)` normalized
/// is the categorical distribution itself, and `-inf` (`ln 0`) is an option
/// that is never chosen.
#[derive(Debug, Clone)]
pub struct CategoricalSelector {
    inner: BoltzmannSelector,
}

impl CategoricalSelector {
    pub fn new() -> Self {
        Self {
            inner: BoltzmannSelector {
                temperature: 1.0,
                threshold: None,
                picks: 1,
                seed: None,
                rng: make_rng(None),
            },
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            inner: self.inner.with_seed(seed),
        }
    }

    pub fn with_picks(self, picks: usize) -> Self {
        Self {
            inner: self.inner.with_picks(picks),
        }
    }
}

impl Default for CategoricalSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for CategoricalSelector {
    fn distribution(&self, strengths: &ActivationPacket) -> Result<ActivationPacket, SelectorError> {
        self.inner.distribution(strengths)
    }

    fn select(&mut self, strengths: &ActivationPacket) -> Result<DecisionPacket, SelectorError> {
        self.inner.select(strengths)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn checkpoint(&self) -> Option<Checkpoint> {
        self.inner.checkpoint()
    }

    fn rewind(&mut self, checkpoint: Checkpoint) {
        self.inner.rewind(checkpoint);
    }
}

/// Chooses every option whose strength is strictly above a threshold,
/// strongest first (ties in symbol order).
///
/// The distribution holds `1.0` for chosen options and `0.0` for the rest.
/// Nothing above the threshold is an empty decision, not an error; a `NaN`
/// strength has no viable option.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSelector {
    threshold: f64,
}

impl ThresholdSelector {
    pub fn new(threshold: f64) -> Result<Self, SelectorError> {
        Ok(Self {
            threshold: check_threshold(threshold)?,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Selector for ThresholdSelector {
    fn distribution(&self, strengths: &ActivationPacket) -> Result<ActivationPacket, SelectorError> {
        if strengths.iter().any(|(_, strength)| strength.is_nan()) {
            return Err(SelectorError::NoViableOption(strengths.len()));
        }

        Ok(strengths.map(|_, strength| if strength > self.threshold { 1.0 } else { 0.0 }))
    }

    fn select(&mut self, strengths: &ActivationPacket) -> Result<DecisionPacket, SelectorError> {
        let distribution = self.distribution(strengths)?;

        let mut chosen: Vec<(&ConstructSymbol, f64)> = strengths
            .iter()
            .filter(|(symbol, _)| distribution.strength(symbol) > 0.0)
            .collect();
        chosen.sort_by(|(_, a), (_, b)| b.total_cmp(a));
        let chosen = chosen.into_iter().map(|(symbol, _)| symbol.clone()).collect();

        Ok(DecisionPacket::new(chosen, strengths.clone(), distribution))
    }
}
