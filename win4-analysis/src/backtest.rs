use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use win4_db::models::{Combo, DrawType};

use crate::features::DerivedDraw;
use crate::frequency::position_counts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PredictionMethod {
    /// Combinaison la plus fréquente de la fenêtre
    #[default]
    MostFrequent,
    /// Chiffre modal de chaque position
    HotDigit,
}

/// Fenêtre de rétrospection, toujours strictement antérieure au tirage évalué.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LookbackWindow {
    /// Tirages dont la date est dans `[t - n jours, t)`.
    Days(u32),
    /// Les n tirages précédents.
    Draws(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestPoint {
    pub date: NaiveDate,
    pub draw_type: DrawType,
    pub predicted: Combo,
    pub actual: Combo,
    pub hit: bool,
    pub box_hit: bool,
    pub window_size: usize,
    /// Taux cumulés, `None` tant que le plancher d'échantillons n'est pas atteint
    pub running_hit_rate: Option<f64>,
    pub running_box_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestSummary {
    pub evaluated: usize,
    pub predictions: usize,
    pub straight_hits: usize,
    pub box_hits: usize,
}

impl BacktestSummary {
    pub fn hit_rate(&self) -> Option<f64> {
        rate(self.straight_hits, self.predictions)
    }

    pub fn box_hit_rate(&self) -> Option<f64> {
        rate(self.box_hits, self.predictions)
    }
}

fn rate(hits: usize, n: usize) -> Option<f64> {
    (n > 0).then(|| hits as f64 / n as f64)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestResult {
    pub points: Vec<BacktestPoint>,
    pub summary: BacktestSummary,
}

/// Prédiction à partir d'une fenêtre. `None` si la fenêtre est vide.
pub fn predict(window: &[&DerivedDraw], method: PredictionMethod) -> Option<Combo> {
    if window.is_empty() {
        return None;
    }
    match method {
        PredictionMethod::MostFrequent => {
            let mut counts: HashMap<Combo, u32> = HashMap::new();
            for draw in window {
                *counts.entry(draw.combo()).or_insert(0) += 1;
            }
            // égalités : la plus petite combinaison
            counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(combo, _)| combo)
        }
        PredictionMethod::HotDigit => {
            let matrix = position_counts(window.iter().copied());
            let digits = [0, 1, 2, 3].map(|pos| matrix.modal_digit(pos));
            Combo::from_digits(digits).ok()
        }
    }
}

/// Évaluation walk-forward sans fuite : chaque prédiction n'utilise que des
/// tirages antérieurs. Avec `Days`, un point n'est évalué que si la fenêtre
/// est entièrement couverte par l'historique.
pub fn backtest(
    table: &[DerivedDraw],
    window: LookbackWindow,
    method: PredictionMethod,
    min_samples: usize,
) -> BacktestResult {
    let mut ordered: Vec<&DerivedDraw> = table.iter().collect();
    ordered.sort_by_key(|d| d.chrono_key());

    let mut result = BacktestResult::default();
    let Some(first_date) = ordered.first().map(|d| d.date()) else {
        return result;
    };

    // bornes [lo, hi) de la fenêtre en jours, monotones
    let (mut lo, mut hi) = (0usize, 0usize);

    for (i, current) in ordered.iter().enumerate() {
        result.summary.evaluated += 1;
        let t = current.date();

        let lookback: &[&DerivedDraw] = match window {
            LookbackWindow::Days(days) => {
                let Some(start) = t.checked_sub_days(Days::new(u64::from(days))) else {
                    continue;
                };
                if start < first_date {
                    continue;
                }
                while hi < ordered.len() && ordered[hi].date() < t {
                    hi += 1;
                }
                while lo < hi && ordered[lo].date() < start {
                    lo += 1;
                }
                &ordered[lo..hi]
            }
            LookbackWindow::Draws(n) => {
                if n == 0 || i < n {
                    continue;
                }
                &ordered[i - n..i]
            }
        };

        let Some(predicted) = predict(lookback, method) else {
            continue;
        };

        let actual = current.combo();
        let hit = predicted == actual;
        let box_hit = predicted.signature() == current.signature;

        let summary = &mut result.summary;
        summary.predictions += 1;
        summary.straight_hits += usize::from(hit);
        summary.box_hits += usize::from(box_hit);

        let floor_reached = summary.predictions >= min_samples;
        result.points.push(BacktestPoint {
            date: t,
            draw_type: current.draw_type(),
            predicted,
            actual,
            hit,
            box_hit,
            window_size: lookback.len(),
            running_hit_rate: floor_reached.then(|| summary.straight_hits as f64 / summary.predictions as f64),
            running_box_rate: floor_reached.then(|| summary.box_hits as f64 / summary.predictions as f64),
        });
    }

    log::debug!(
        "Backtest {:?} {:?} : {} prédiction(s) sur {} tirage(s)",
        window,
        method,
        result.summary.predictions,
        result.summary.evaluated
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{daily, date, draw};

    fn combo(s: &str) -> Combo {
        s.parse().unwrap()
    }

    #[test]
    fn test_table_shorter_than_window_yields_nothing() {
        let table = daily(&["1234", "1234", "1234", "1234", "1234"]);
        let result = backtest(&table, LookbackWindow::Days(30), PredictionMethod::MostFrequent, 1);
        assert!(result.points.is_empty());
        assert_eq!(result.summary.evaluated, 5);
        assert_eq!(result.summary.predictions, 0);
        assert_eq!(result.summary.hit_rate(), None);
    }

    #[test]
    fn test_window_beyond_calendar_yields_nothing() {
        let table = daily(&["1234", "4321", "1234"]);
        let result = backtest(&table, LookbackWindow::Days(u32::MAX), PredictionMethod::MostFrequent, 1);
        assert_eq!(result.summary.evaluated, 3);
        assert_eq!(result.summary.predictions, 0);
        assert!(result.points.is_empty());
    }

    #[test]
    fn test_empty_table() {
        let result = backtest(&[], LookbackWindow::Days(7), PredictionMethod::HotDigit, 10);
        assert_eq!(result, BacktestResult::default());
    }

    #[test]
    fn test_no_lookahead() {
        // 01..03 : 1111, puis 04 : 2222 ; fenêtre de 3 jours
        let table = daily(&["1111", "1111", "1111", "2222", "2222"]);
        let result = backtest(&table, LookbackWindow::Days(3), PredictionMethod::MostFrequent, 1);
        assert_eq!(result.points.len(), 2);

        let p = &result.points[0];
        assert_eq!(p.date, date("2024-01-04"));
        assert_eq!(p.predicted, combo("1111"));
        assert_eq!(p.window_size, 3);
        assert!(!p.hit);

        // fenêtre [01-02, 01-05) : 1111 ×2, 2222 ×1
        let q = &result.points[1];
        assert_eq!(q.predicted, combo("1111"));
        assert_eq!(q.window_size, 3);
    }

    #[test]
    fn test_same_day_midday_excluded_for_evening() {
        let table = vec![
            draw("2024-01-01", DrawType::Midday, "1111"),
            draw("2024-01-02", DrawType::Midday, "5555"),
            draw("2024-01-02", DrawType::Evening, "5555"),
        ];
        let result = backtest(&table, LookbackWindow::Days(1), PredictionMethod::MostFrequent, 1);
        // les deux tirages du 02 ne voient que celui du 01
        assert_eq!(result.points.len(), 2);
        assert!(result.points.iter().all(|p| p.predicted == combo("1111")));
        assert!(result.points.iter().all(|p| p.window_size == 1));
    }

    #[test]
    fn test_draws_window_and_ties() {
        let table = daily(&["2222", "1111", "1111", "2222", "3333"]);
        let result = backtest(&table, LookbackWindow::Draws(2), PredictionMethod::MostFrequent, 1);
        assert_eq!(result.points.len(), 3);
        // [2222, 1111] : égalité, la plus petite gagne
        assert_eq!(result.points[0].predicted, combo("1111"));
        assert!(result.points[0].hit);
        assert_eq!(result.points[1].predicted, combo("1111"));
        assert!(!result.points[1].hit);
        assert_eq!(result.summary.straight_hits, 1);
    }

    #[test]
    fn test_hot_digit_method() {
        let table = daily(&["1234", "1299", "5634", "0000"]);
        let window: Vec<&DerivedDraw> = table[..3].iter().collect();
        assert_eq!(predict(&window, PredictionMethod::HotDigit), Some(combo("1234")));
        assert_eq!(predict(&[], PredictionMethod::HotDigit), None);
    }

    #[test]
    fn test_box_hit_flag() {
        let table = daily(&["1234", "4321"]);
        let result = backtest(&table, LookbackWindow::Draws(1), PredictionMethod::MostFrequent, 1);
        assert_eq!(result.points.len(), 1);
        assert!(!result.points[0].hit);
        assert!(result.points[0].box_hit);
        assert_eq!(result.summary.box_hit_rate(), Some(1.0));
    }

    #[test]
    fn test_running_rate_floor() {
        let combos = vec!["7777"; 15];
        let table = daily(&combos);
        let result = backtest(&table, LookbackWindow::Draws(1), PredictionMethod::MostFrequent, 10);
        assert_eq!(result.points.len(), 14);
        assert!(result.points[..9].iter().all(|p| p.running_hit_rate.is_none()));
        assert_eq!(result.points[9].running_hit_rate, Some(1.0));
        assert_eq!(result.summary.hit_rate(), Some(1.0));
    }
}
