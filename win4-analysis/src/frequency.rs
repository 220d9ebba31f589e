use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use win4_db::models::Combo;

use crate::features::DerivedDraw;

pub(crate) fn pct(count: u32, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(count) / total as f64 * 100.0
    }
}

/// Comptes par position (lignes 0..4) et par chiffre (colonnes 0..10).
/// La matrice est toujours complète, un chiffre absent vaut 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionMatrix {
    pub counts: [[u32; 10]; 4],
}

impl PositionMatrix {
    pub fn get(&self, position: usize, digit: u8) -> u32 {
        self.counts[position][usize::from(digit)]
    }

    pub fn row_total(&self, position: usize) -> u32 {
        self.counts[position].iter().sum()
    }

    /// Chiffre le plus fréquent à cette position (le plus petit en cas d'égalité).
    pub fn modal_digit(&self, position: usize) -> u8 {
        let row = &self.counts[position];
        let mut best = 0usize;
        for digit in 1..10 {
            if row[digit] > row[best] {
                best = digit;
            }
        }
        best as u8
    }
}

pub fn digit_position_frequency(table: &[DerivedDraw]) -> PositionMatrix {
    position_counts(table.iter())
}

pub(crate) fn position_counts<'a>(draws: impl IntoIterator<Item = &'a DerivedDraw>) -> PositionMatrix {
    let mut counts = [[0u32; 10]; 4];
    for draw in draws {
        for (pos, &digit) in draw.digits.iter().enumerate() {
            counts[pos][usize::from(digit)] += 1;
        }
    }
    PositionMatrix { counts }
}

/// Fréquences d'une position (1 à 4). `None` hors de cette plage.
pub fn digit_frequency(table: &[DerivedDraw], position: usize) -> Option<[u32; 10]> {
    if !(1..=4).contains(&position) {
        return None;
    }
    Some(digit_position_frequency(table).counts[position - 1])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboCount {
    pub combo: Combo,
    pub count: u32,
    pub pct: f64,
}

pub(crate) fn count_combos<'a>(
    draws: impl IntoIterator<Item = &'a DerivedDraw>,
) -> (HashMap<Combo, u32>, usize) {
    let mut counts: HashMap<Combo, u32> = HashMap::new();
    let mut total = 0;
    for draw in draws {
        *counts.entry(draw.combo()).or_insert(0) += 1;
        total += 1;
    }
    (counts, total)
}

/// Tri par compte décroissant puis combinaison croissante.
pub(crate) fn rank_counts(counts: HashMap<Combo, u32>, total: usize, top_n: Option<usize>) -> Vec<ComboCount> {
    let mut ranked: Vec<ComboCount> = counts
        .into_iter()
        .map(|(combo, count)| ComboCount {
            combo,
            count,
            pct: pct(count, total),
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.combo.cmp(&b.combo)));
    if let Some(n) = top_n {
        ranked.truncate(n);
    }
    ranked
}

pub fn combo_frequency(table: &[DerivedDraw], top_n: Option<usize>) -> Vec<ComboCount> {
    let (counts, total) = count_combos(table);
    rank_counts(counts, total, top_n)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigitSumCount {
    pub sum: u8,
    pub count: u32,
    pub pct: f64,
}

/// Distribution des sommes 0..=36, sommes absentes incluses à 0.
pub fn digit_sum_distribution(table: &[DerivedDraw]) -> Vec<DigitSumCount> {
    let mut counts = [0u32; 37];
    for draw in table {
        counts[usize::from(draw.digit_sum)] += 1;
    }
    counts
        .iter()
        .enumerate()
        .map(|(sum, &count)| DigitSumCount {
            sum: sum as u8,
            count,
            pct: pct(count, table.len()),
        })
        .collect()
}

/// Date de coupure : `max(draw_date) - window_days`.
/// Récent = strictement après, antérieur = à la date ou avant.
/// Une fenêtre hors du calendrier couvre tout l'historique.
pub fn cutoff_date(table: &[DerivedDraw], window_days: u32) -> Option<NaiveDate> {
    let latest = table.iter().map(|d| d.date()).max()?;
    Some(
        latest
            .checked_sub_days(Days::new(u64::from(window_days)))
            .unwrap_or(NaiveDate::MIN),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotColdScore {
    pub combo: Combo,
    pub recent_count: u32,
    pub prior_count: u32,
    pub expected_recent: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HotColdTable {
    pub cutoff: Option<NaiveDate>,
    pub recent_draws: usize,
    pub prior_draws: usize,
    /// Du plus chaud au plus froid.
    pub scores: Vec<HotColdScore>,
}

impl HotColdTable {
    pub fn hottest(&self, n: usize) -> &[HotColdScore] {
        &self.scores[..n.min(self.scores.len())]
    }

    /// Du plus froid au moins froid, égalités par combinaison croissante.
    pub fn coldest(&self, n: usize) -> Vec<&HotColdScore> {
        let mut cold: Vec<&HotColdScore> = self.scores.iter().collect();
        cold.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(Ordering::Equal)
                .then(a.combo.cmp(&b.combo))
        });
        cold.truncate(n);
        cold
    }

    pub fn score_of(&self, combo: Combo) -> Option<&HotColdScore> {
        self.scores.iter().find(|s| s.combo == combo)
    }
}

pub fn hot_cold_scores(table: &[DerivedDraw], window_days: u32) -> HotColdTable {
    let Some(cutoff) = cutoff_date(table, window_days) else {
        return HotColdTable::default();
    };

    let mut counts: HashMap<Combo, (u32, u32)> = HashMap::new();
    let (mut recent_draws, mut prior_draws) = (0usize, 0usize);
    for draw in table {
        let entry = counts.entry(draw.combo()).or_insert((0, 0));
        if draw.date() > cutoff {
            entry.0 += 1;
            recent_draws += 1;
        } else {
            entry.1 += 1;
            prior_draws += 1;
        }
    }

    let mut scores: Vec<HotColdScore> = counts
        .into_iter()
        .map(|(combo, (recent_count, prior_count))| {
            let expected_recent = if prior_draws > 0 {
                f64::from(prior_count) / prior_draws as f64 * recent_draws as f64
            } else {
                0.0
            };
            HotColdScore {
                combo,
                recent_count,
                prior_count,
                expected_recent,
                score: f64::from(recent_count) - expected_recent,
            }
        })
        .collect();
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.combo.cmp(&b.combo))
    });

    HotColdTable {
        cutoff: Some(cutoff),
        recent_draws,
        prior_draws,
        scores,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotCombo {
    pub combo: Combo,
    pub count: u32,
    pub last_seen: NaiveDate,
}

/// Combinaisons les plus sorties dans la fenêtre récente.
pub fn hot_combos(table: &[DerivedDraw], window_days: u32, top_n: usize) -> Vec<HotCombo> {
    let Some(cutoff) = cutoff_date(table, window_days) else {
        return Vec::new();
    };
    let mut seen: HashMap<Combo, (u32, NaiveDate)> = HashMap::new();
    for draw in table.iter().filter(|d| d.date() > cutoff) {
        let entry = seen.entry(draw.combo()).or_insert((0, draw.date()));
        entry.0 += 1;
        entry.1 = entry.1.max(draw.date());
    }
    let mut hot: Vec<HotCombo> = seen
        .into_iter()
        .map(|(combo, (count, last_seen))| HotCombo { combo, count, last_seen })
        .collect();
    hot.sort_by(|a, b| b.count.cmp(&a.count).then(a.combo.cmp(&b.combo)));
    hot.truncate(top_n);
    hot
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColdCombo {
    pub combo: Combo,
    pub historical_count: u32,
    pub recent_count: u32,
    pub last_seen: NaiveDate,
}

/// Combinaisons sorties au moins `min_historical` fois avant la coupure
/// et au plus une fois depuis.
pub fn cold_combos(table: &[DerivedDraw], window_days: u32, min_historical: u32) -> Vec<ColdCombo> {
    let Some(cutoff) = cutoff_date(table, window_days) else {
        return Vec::new();
    };
    let mut seen: HashMap<Combo, (u32, u32, NaiveDate)> = HashMap::new();
    for draw in table {
        let entry = seen.entry(draw.combo()).or_insert((0, 0, draw.date()));
        if draw.date() > cutoff {
            entry.1 += 1;
        } else {
            entry.0 += 1;
        }
        entry.2 = entry.2.max(draw.date());
    }
    let mut cold: Vec<ColdCombo> = seen
        .into_iter()
        .filter(|(_, (historical, recent, _))| *historical >= min_historical && *recent <= 1)
        .map(|(combo, (historical_count, recent_count, last_seen))| ColdCombo {
            combo,
            historical_count,
            recent_count,
            last_seen,
        })
        .collect();
    cold.sort_by(|a, b| {
        b.historical_count
            .cmp(&a.historical_count)
            .then(a.combo.cmp(&b.combo))
    });
    cold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{daily, date, draw, midday};
    use win4_db::models::DrawType;

    fn combo(s: &str) -> Combo {
        s.parse().unwrap()
    }

    fn example_table() -> Vec<DerivedDraw> {
        vec![
            draw("2024-01-01", DrawType::Midday, "1234"),
            draw("2024-01-02", DrawType::Evening, "4321"),
            draw("2024-01-03", DrawType::Midday, "1234"),
        ]
    }

    #[test]
    fn test_combo_frequency_example() {
        let freq = combo_frequency(&example_table(), None);
        let pairs: Vec<(String, u32)> = freq.iter().map(|c| (c.combo.to_string(), c.count)).collect();
        assert_eq!(pairs, vec![("1234".to_string(), 2), ("4321".to_string(), 1)]);
        assert!((freq[0].pct - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_combo_frequency_ties_lexical() {
        let freq = combo_frequency(&daily(&["5000", "0500", "0050", "0500"]), Some(2));
        let combos: Vec<String> = freq.iter().map(|c| c.combo.to_string()).collect();
        assert_eq!(combos, vec!["0500", "0050"]);
    }

    #[test]
    fn test_position_matrix_complete_and_row_sums() {
        let table = daily(&["1234", "1111", "9870"]);
        let m = digit_position_frequency(&table);
        for pos in 0..4 {
            assert_eq!(m.row_total(pos), 3);
        }
        assert_eq!(m.get(0, 1), 2);
        assert_eq!(m.get(0, 5), 0);
        assert_eq!(m.get(3, 0), 1);
        assert_eq!(m.modal_digit(0), 1);

        let empty = digit_position_frequency(&[]);
        assert_eq!(empty.counts, [[0; 10]; 4]);
    }

    #[test]
    fn test_digit_frequency_bounds() {
        let table = daily(&["1234"]);
        assert_eq!(digit_frequency(&table, 2).unwrap()[2], 1);
        assert!(digit_frequency(&table, 0).is_none());
        assert!(digit_frequency(&table, 5).is_none());
    }

    #[test]
    fn test_digit_sum_distribution_zero_filled() {
        let dist = digit_sum_distribution(&daily(&["0000", "9999", "1234"]));
        assert_eq!(dist.len(), 37);
        assert_eq!(dist[0].count, 1);
        assert_eq!(dist[36].count, 1);
        assert_eq!(dist[10].count, 1);
        assert_eq!(dist[5].count, 0);
        assert!(digit_sum_distribution(&[]).iter().all(|d| d.pct == 0.0));
    }

    #[test]
    fn test_hot_cold_empty_prior_is_raw_recent_count() {
        let table = daily(&["1111", "2222", "1111", "3333"]);
        // la fenêtre couvre toute la table : rien n'est antérieur
        let hc = hot_cold_scores(&table, 365);
        assert_eq!(hc.prior_draws, 0);
        for s in &hc.scores {
            assert_eq!(s.score, f64::from(s.recent_count));
            assert_eq!(s.expected_recent, 0.0);
        }
        assert_eq!(hc.scores[0].combo, combo("1111"));
    }

    #[test]
    fn test_hot_cold_expected_from_prior_rate() {
        // 4 tirages antérieurs (01..04), 2 récents (05..06) avec une fenêtre de 2 jours
        let table = daily(&["1111", "1111", "2222", "3333", "2222", "2222"]);
        let hc = hot_cold_scores(&table, 2);
        assert_eq!(hc.cutoff, Some(date("2024-01-04")));
        assert_eq!(hc.prior_draws, 4);
        assert_eq!(hc.recent_draws, 2);

        let s = hc.score_of(combo("2222")).unwrap();
        assert_eq!(s.recent_count, 2);
        assert!((s.expected_recent - 0.5).abs() < 1e-9);
        assert!((s.score - 1.5).abs() < 1e-9);

        let cold = hc.score_of(combo("1111")).unwrap();
        assert!((cold.score + 1.0).abs() < 1e-9);
        assert_eq!(hc.hottest(1)[0].combo, combo("2222"));
        assert_eq!(hc.coldest(1)[0].combo, combo("1111"));
    }

    #[test]
    fn test_hot_cold_zero_window_has_no_recent() {
        let hc = hot_cold_scores(&daily(&["1111", "2222"]), 0);
        assert_eq!(hc.recent_draws, 0);
        assert!(hc.scores.iter().all(|s| s.score <= 0.0));
    }

    #[test]
    fn test_hot_cold_window_beyond_calendar() {
        let table = daily(&["1234", "4321"]);
        assert_eq!(cutoff_date(&table, u32::MAX), Some(NaiveDate::MIN));

        let hc = hot_cold_scores(&table, u32::MAX);
        assert_eq!(hc.recent_draws, 2);
        assert_eq!(hc.prior_draws, 0);
        assert_eq!(hot_combos(&table, u32::MAX, 10).len(), 2);
        assert!(cold_combos(&table, u32::MAX, 1).is_empty());
    }

    #[test]
    fn test_hot_cold_empty_table() {
        let hc = hot_cold_scores(&[], 30);
        assert!(hc.scores.is_empty());
        assert_eq!(hc.cutoff, None);
    }

    #[test]
    fn test_hot_and_cold_combos() {
        let mut table = daily(&["1111", "1111", "2222", "2222", "2222", "1111"]);
        table.push(midday("2024-01-07", "5555"));
        table.push(midday("2024-01-08", "5555"));
        // coupure au 2024-01-05 avec une fenêtre de 3 jours
        let hot = hot_combos(&table, 3, 10);
        assert_eq!(hot[0].combo, combo("5555"));
        assert_eq!(hot[0].count, 2);
        assert_eq!(hot[0].last_seen, date("2024-01-08"));

        let cold = cold_combos(&table, 3, 2);
        let combos: Vec<String> = cold.iter().map(|c| c.combo.to_string()).collect();
        assert_eq!(combos, vec!["2222", "1111"]);
        assert_eq!(cold[1].recent_count, 1);
        assert_eq!(cold[1].last_seen, date("2024-01-06"));

        assert!(hot_combos(&[], 3, 10).is_empty());
        assert!(cold_combos(&[], 3, 2).is_empty());
    }
}
