use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Fenêtre récente (jours) pour hot/cold et le backtest.
    pub default_window_days: u32,
    pub min_draws_for_analysis: usize,
    pub default_top_n: usize,
    /// Taux de réussite glissant masqué tant que moins de prédictions ont été émises.
    pub min_backtest_samples: usize,
    pub cold_min_historical: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_window_days: 60,
            min_draws_for_analysis: 10,
            default_top_n: 20,
            min_backtest_samples: 10,
            cold_min_historical: 2,
        }
    }
}

/// Gains en dollars pour une mise de 1 $.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutConfig {
    pub straight: u32,
    pub box_24: u32,
    pub box_12: u32,
    pub box_6: u32,
    pub box_4: u32,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            straight: 5000,
            box_24: 208,
            box_12: 416,
            box_6: 833,
            box_4: 1250,
        }
    }
}

impl PayoutConfig {
    /// Pas de jeu box pour un quadruple (1 seul ordre).
    pub fn box_payout(&self, ways: u32) -> Option<u32> {
        match ways {
            24 => Some(self.box_24),
            12 => Some(self.box_12),
            6 => Some(self.box_6),
            4 => Some(self.box_4),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_payout_by_ways() {
        let p = PayoutConfig::default();
        assert_eq!(p.box_payout(24), Some(208));
        assert_eq!(p.box_payout(4), Some(1250));
        assert_eq!(p.box_payout(1), None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: AnalyticsConfig = serde_json::from_str(r#"{"default_top_n": 5}"#).unwrap();
        assert_eq!(cfg.default_top_n, 5);
        assert_eq!(cfg.default_window_days, 60);
        assert_eq!(cfg.min_backtest_samples, 10);
    }

    #[test]
    fn test_payout_roundtrip() {
        let p = PayoutConfig::default();
        let json = serde_json::to_string(&p).unwrap();
        let back: PayoutConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
