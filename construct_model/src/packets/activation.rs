//! Activation packets - immutable maps from construct symbols to strengths.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entries;
use crate::symbols::ConstructSymbol;

/// Strengths of a set of constructs, as produced by one propagation step.
///
/// A packet is never modified after it is built: every operation that
/// "changes" strengths returns a new packet. Lookups through
/// [`ActivationPacket::strength`] treat a missing symbol as strength `0.0`;
/// use [`ActivationPacket::get`] to tell "absent" from "zero".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivationPacket {
    #[serde(with = "entries")]
    strengths: BTreeMap<ConstructSymbol, f64>,
}

impl ActivationPacket {
    /// Create an empty packet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this packet with `symbol` set to `strength`.
    pub fn with(mut self, symbol: ConstructSymbol, strength: f64) -> Self {
        self.strengths.insert(symbol, strength);
        self
    }

    /// Strength of `symbol`, or `0.0` if the packet does not mention it.
    pub fn strength(&self, symbol: &ConstructSymbol) -> f64 {
        self.get(symbol).unwrap_or(0.0)
    }

    /// Strength of `symbol`, if present.
    pub fn get(&self, symbol: &ConstructSymbol) -> Option<f64> {
        self.strengths.get(symbol).copied()
    }

    pub fn contains(&self, symbol: &ConstructSymbol) -> bool {
        self.strengths.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.strengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strengths.is_empty()
    }

    /// Iterate over entries in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&ConstructSymbol, f64)> {
        self.strengths.iter().map(|(symbol, strength)| (symbol, *strength))
    }

    /// Iterate over the symbols in the packet.
    pub fn symbols(&self) -> impl Iterator<Item = &ConstructSymbol> {
        self.strengths.keys()
    }

    /// Get all entries with strength at or above the threshold, strongest first.
    pub fn hot(&self, threshold: f64) -> Vec<(&ConstructSymbol, f64)> {
        let mut entries: Vec<_> = self
            .iter()
            .filter(|(_, strength)| *strength >= threshold)
            .collect();

        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        entries
    }

    /// Get the strongest entry. Ties go to the first symbol in order.
    pub fn hottest(&self) -> Option<(&ConstructSymbol, f64)> {
        self.iter().fold(None, |best, (symbol, strength)| match best {
            Some((_, best_strength)) if best_strength >= strength => best,
            _ => Some((symbol, strength)),
        })
    }

    /// Get the total strength in the packet.
    pub fn total(&self) -> f64 {
        self.strengths.values().sum()
    }

    /// Multiply every strength by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        self.map(|_, strength| strength * factor)
    }

    /// Drop entries below the threshold.
    pub fn pruned(&self, threshold: f64) -> Self {
        self.iter()
            .filter(|(_, strength)| *strength >= threshold)
            .map(|(symbol, strength)| (symbol.clone(), strength))
            .collect()
    }

    /// Rescale so the maximum strength is 1.0. Packets whose maximum is not
    /// positive are returned unchanged.
    pub fn normalized(&self) -> Self {
        match self.hottest() {
            Some((_, max)) if max > 0.0 => self.scaled(1.0 / max),
            _ => self.clone(),
        }
    }

    /// Apply `f` to every entry.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(&ConstructSymbol, f64) -> f64,
    {
        self.iter()
            .map(|(symbol, strength)| (symbol.clone(), f(symbol, strength)))
            .collect()
    }

    /// Merge with another packet. Symbols present in both are combined with `f`.
    pub fn merged<F>(&self, other: &ActivationPacket, f: F) -> Self
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut strengths = self.strengths.clone();
        for (symbol, strength) in other.iter() {
            strengths
                .entry(symbol.clone())
                .and_modify(|current| *current = f(*current, strength))
                .or_insert(strength);
        }
        Self { strengths }
    }

    /// Restrict to the given symbols. Symbols absent from this packet get
    /// strength `0.0` in the result.
    pub fn subpacket<'a>(&self, symbols: impl IntoIterator<Item = &'a ConstructSymbol>) -> Self {
        symbols
            .into_iter()
            .map(|symbol| (symbol.clone(), self.strength(symbol)))
            .collect()
    }
}

impl FromIterator<(ConstructSymbol, f64)> for ActivationPacket {
    fn from_iter<I: IntoIterator<Item = (ConstructSymbol, f64)>>(iter: I) -> Self {
        Self {
            strengths: iter.into_iter().collect(),
        }
    }
}
