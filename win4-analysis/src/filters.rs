use chrono::{Days, NaiveDate};

use win4_db::models::DrawType;

use crate::features::DerivedDraw;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DrawScope {
    #[default]
    Both,
    Midday,
    Evening,
}

impl DrawScope {
    pub fn includes(&self, draw_type: DrawType) -> bool {
        match self {
            DrawScope::Both => true,
            DrawScope::Midday => draw_type == DrawType::Midday,
            DrawScope::Evening => draw_type == DrawType::Evening,
        }
    }
}

/// Sélection par type de tirage et plage de dates inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawFilter {
    pub scope: DrawScope,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DrawFilter {
    pub fn matches(&self, draw: &DerivedDraw) -> bool {
        let date = draw.date();
        self.scope.includes(draw.draw_type())
            && self.start.map_or(true, |s| date >= s)
            && self.end.map_or(true, |e| date <= e)
    }

    pub fn apply(&self, table: &[DerivedDraw]) -> Vec<DerivedDraw> {
        table.iter().filter(|d| self.matches(d)).cloned().collect()
    }

    pub fn is_unfiltered(&self) -> bool {
        self.scope == DrawScope::Both && self.start.is_none() && self.end.is_none()
    }
}

pub fn date_range(table: &[DerivedDraw]) -> Option<(NaiveDate, NaiveDate)> {
    let min = table.iter().map(|d| d.date()).min()?;
    let max = table.iter().map(|d| d.date()).max()?;
    Some((min, max))
}

/// Début d'une plage "derniers N jours" se terminant à `latest` (7, 30, 90, 365...).
pub fn date_preset(latest: NaiveDate, days: u32) -> NaiveDate {
    latest
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}
