use serde::Serialize;

use win4_db::models::{Combo, DrawType};

use crate::config::PayoutConfig;
use crate::features::{box_type, BoxType, DerivedDraw};

fn newest_first(matches: &mut [&DerivedDraw]) {
    matches.sort_by(|a, b| b.chrono_key().cmp(&a.chrono_key()));
}

/// Tirages identiques à la requête, du plus récent au plus ancien.
pub fn check_straight(combo: Combo, table: &[DerivedDraw]) -> Vec<&DerivedDraw> {
    let mut hits: Vec<&DerivedDraw> = table.iter().filter(|d| d.combo() == combo).collect();
    newest_first(&mut hits);
    hits
}

/// Tirages de même signature (straight inclus), du plus récent au plus ancien.
pub fn check_box(combo: Combo, table: &[DerivedDraw]) -> Vec<&DerivedDraw> {
    let signature = combo.signature();
    let mut hits: Vec<&DerivedDraw> = table.iter().filter(|d| d.signature == signature).collect();
    newest_first(&mut hits);
    hits
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchKind {
    Straight,
    BoxOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawTypeBreakdown {
    pub draw_type: DrawType,
    pub straight: u32,
    /// Matches box, straight compris
    pub box_total: u32,
    pub box_only: u32,
}

#[derive(Debug, Clone)]
pub struct MatchReport<'a> {
    pub query: Combo,
    pub box_type: BoxType,
    pub straight: Vec<&'a DerivedDraw>,
    pub boxed: Vec<&'a DerivedDraw>,
    pub straight_payout: u32,
    pub box_payout: Option<u32>,
}

impl<'a> MatchReport<'a> {
    pub fn match_kind(&self, draw: &DerivedDraw) -> MatchKind {
        if draw.combo() == self.query {
            MatchKind::Straight
        } else {
            MatchKind::BoxOnly
        }
    }

    pub fn box_only(&self) -> impl Iterator<Item = &&'a DerivedDraw> + '_ {
        self.boxed.iter().filter(move |d| d.combo() != self.query)
    }

    pub fn box_only_count(&self) -> usize {
        self.box_only().count()
    }

    pub fn breakdown(&self) -> Vec<DrawTypeBreakdown> {
        DrawType::ALL
            .into_iter()
            .map(|draw_type| {
                let straight = self.straight.iter().filter(|d| d.draw_type() == draw_type).count() as u32;
                let box_total = self.boxed.iter().filter(|d| d.draw_type() == draw_type).count() as u32;
                DrawTypeBreakdown {
                    draw_type,
                    straight,
                    box_total,
                    box_only: box_total - straight,
                }
            })
            .collect()
    }
}

pub fn check_combo<'a>(combo: Combo, table: &'a [DerivedDraw], payouts: &PayoutConfig) -> MatchReport<'a> {
    let box_type = box_type(combo);
    MatchReport {
        query: combo,
        box_type,
        straight: check_straight(combo, table),
        boxed: check_box(combo, table),
        straight_payout: payouts.straight,
        box_payout: payouts.box_payout(box_type.ways),
    }
}
