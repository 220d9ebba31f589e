use std::collections::BTreeSet;
use std::io::{Read, Write};

use chrono::NaiveDate;
use serde::Serialize;

use win4_db::models::{Combo, ValidationError};

use crate::features::{box_type, DerivedDraw, PatternLabel};
use crate::frequency::hot_cold_scores;

/// En-têtes reconnus pour la colonne des combinaisons, sinon la première colonne.
pub const COMBO_HEADERS: [&str; 5] = ["win4", "WIN4", "combo", "Combo", "number"];

/// Ensemble de combinaisons suivies. Possédé par l'appelant, passé par référence aux statistiques.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    combos: BTreeSet<Combo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    /// Déjà présentes
    pub skipped: usize,
    pub invalid: usize,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_combos<I: IntoIterator<Item = Combo>>(combos: I) -> Self {
        Self {
            combos: combos.into_iter().collect(),
        }
    }

    /// Saisie stricte, `Ok(false)` si déjà présente.
    pub fn add(&mut self, input: &str) -> Result<bool, ValidationError> {
        let combo: Combo = input.parse()?;
        Ok(self.insert(combo))
    }

    pub fn insert(&mut self, combo: Combo) -> bool {
        self.combos.insert(combo)
    }

    pub fn remove(&mut self, combo: Combo) -> bool {
        self.combos.remove(&combo)
    }

    pub fn contains(&self, combo: Combo) -> bool {
        self.combos.contains(&combo)
    }

    pub fn clear(&mut self) -> usize {
        let n = self.combos.len();
        self.combos.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    /// Ordre croissant.
    pub fn iter(&self) -> impl Iterator<Item = &Combo> {
        self.combos.iter()
    }

    /// Ajout en lot de valeurs brutes, ramenées à 4 chiffres comme les tirages.
    pub fn bulk_add<'a, I: IntoIterator<Item = &'a str>>(&mut self, values: I) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for raw in values {
            self.tally(raw, &mut summary);
        }
        summary
    }

    fn tally(&mut self, raw: &str, summary: &mut ImportSummary) {
        match Combo::canonicalize(raw) {
            Some(combo) if self.insert(combo) => summary.added += 1,
            Some(_) => summary.skipped += 1,
            None => {
                log::debug!("Valeur de watchlist invalide : {:?}", raw);
                summary.invalid += 1;
            }
        }
    }
}

/// Importe la colonne de combinaisons d'un CSV avec en-tête.
pub fn import_csv<R: Read>(watchlist: &mut Watchlist, reader: R) -> Result<ImportSummary, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = COMBO_HEADERS
        .iter()
        .find_map(|name| headers.iter().position(|h| h.trim() == *name))
        .unwrap_or(0);

    let mut summary = ImportSummary::default();
    for (i, record) in rdr.records().enumerate() {
        match record {
            Ok(record) => {
                let value = record.get(column).unwrap_or("");
                watchlist.tally(value, &mut summary);
            }
            Err(e) => {
                log::warn!("Ligne {} illisible : {}", i + 2, e);
                summary.invalid += 1;
            }
        }
    }
    Ok(summary)
}

pub fn export_csv<W: Write>(watchlist: &Watchlist, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["win4"])?;
    for combo in watchlist.iter() {
        wtr.write_record([combo.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistRow {
    #[serde(rename = "win4")]
    pub combo: Combo,
    pub straight_hits: u32,
    pub box_hits: u32,
    pub last_seen: Option<NaiveDate>,
    pub days_ago: Option<i64>,
    pub pattern: PatternLabel,
    pub box_ways: u32,
    pub recent_hits: u32,
    pub hot_score: f64,
}

/// Statistiques par combinaison suivie. `days_ago` est relatif à `today`.
pub fn watchlist_stats(
    table: &[DerivedDraw],
    watchlist: &Watchlist,
    window_days: u32,
    today: NaiveDate,
) -> Vec<WatchlistRow> {
    let scores = hot_cold_scores(table, window_days);
    watchlist
        .iter()
        .map(|&combo| {
            let signature = combo.signature();
            let mut straight_hits = 0;
            let mut box_hits = 0;
            let mut last_seen: Option<NaiveDate> = None;
            for draw in table {
                if draw.combo() == combo {
                    straight_hits += 1;
                    last_seen = last_seen.max(Some(draw.date()));
                }
                if draw.signature == signature {
                    box_hits += 1;
                }
            }
            let bt = box_type(combo);
            let score = scores.score_of(combo);
            WatchlistRow {
                combo,
                straight_hits,
                box_hits,
                last_seen,
                days_ago: last_seen.map(|d| (today - d).num_days()),
                pattern: bt.label,
                box_ways: bt.ways,
                recent_hits: score.map_or(0, |s| s.recent_count),
                hot_score: score.map_or(0.0, |s| s.score),
            }
        })
        .collect()
}

pub fn export_stats_csv<W: Write>(rows: &[WatchlistRow], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
