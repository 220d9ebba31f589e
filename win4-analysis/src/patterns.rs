use serde::Serialize;

use crate::features::{DerivedDraw, PatternLabel};
use crate::frequency::{count_combos, pct, rank_counts, ComboCount};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Share {
    pub count: u32,
    pub pct: f64,
}

impl Share {
    fn of(count: u32, total: usize) -> Self {
        Self {
            count,
            pct: pct(count, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternShare {
    pub label: PatternLabel,
    pub ways: u32,
    pub share: Share,
}

/// Une ligne par motif, toujours les cinq, dans l'ordre ABCD..AAAA.
pub fn pattern_summary(table: &[DerivedDraw]) -> Vec<PatternShare> {
    PatternLabel::ALL
        .into_iter()
        .map(|label| {
            let count = table.iter().filter(|d| d.pattern == label).count() as u32;
            PatternShare {
                label,
                ways: label.ways(),
                share: Share::of(count, table.len()),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorStats {
    pub mirror_ends: Share,
    pub mirror_middle: Share,
    pub palindrome: Share,
}

pub fn mirror_analysis(table: &[DerivedDraw]) -> MirrorStats {
    let count = |pred: fn(&DerivedDraw) -> bool| table.iter().filter(|d| pred(d)).count() as u32;
    MirrorStats {
        mirror_ends: Share::of(count(|d| d.is_mirror_ends), table.len()),
        mirror_middle: Share::of(count(|d| d.is_mirror_middle), table.len()),
        palindrome: Share::of(count(|d| d.is_palindrome), table.len()),
    }
}

/// Paires de positions non ordonnées, numérotées de 1 à 4.
pub const POSITION_PAIRS: [(usize, usize); 6] = [(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairRepeat {
    pub positions: (usize, usize),
    pub share: Share,
}

pub fn position_pair_matrix(table: &[DerivedDraw]) -> Vec<PairRepeat> {
    POSITION_PAIRS
        .into_iter()
        .map(|(a, b)| {
            let count = table
                .iter()
                .filter(|d| d.digits[a - 1] == d.digits[b - 1])
                .count() as u32;
            PairRepeat {
                positions: (a, b),
                share: Share::of(count, table.len()),
            }
        })
        .collect()
}

/// Combinaisons les plus fréquentes d'un motif, pourcentages relatifs à ce motif.
pub fn combos_for_pattern(table: &[DerivedDraw], label: PatternLabel, top_n: Option<usize>) -> Vec<ComboCount> {
    let (counts, total) = count_combos(table.iter().filter(|d| d.pattern == label));
    rank_counts(counts, total, top_n)
}
