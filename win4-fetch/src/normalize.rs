use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use win4_db::models::{Combo, Draw, DrawType};

/// Enregistrement brut de l'API : une ligne par date, midi et soir séparés.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDrawRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub draw_date: Option<String>,
    #[serde(default, alias = "midday_win4", deserialize_with = "lenient_string")]
    pub midday_win_4: Option<String>,
    #[serde(default, alias = "evening_win4", deserialize_with = "lenient_string")]
    pub evening_win_4: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub midday_booster: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub evening_booster: Option<String>,
}

// L'API renvoie selon les jeux de données des chaînes ou des nombres
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    /// Tirages normalisés, du plus récent au plus ancien
    pub draws: Vec<Draw>,
    pub records: usize,
    /// Valeurs présentes mais impossibles à ramener à 4 chiffres
    pub discarded: usize,
}

/// Accepte "2024-01-15", "2024-01-15T00:00:00.000" ou "2024-01-15 00:00:00".
pub fn parse_draw_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day_part = raw.split(['T', ' ']).next().unwrap_or(raw);
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").ok()
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn normalize(records: &[RawDrawRecord]) -> NormalizeReport {
    let mut report = NormalizeReport {
        records: records.len(),
        ..NormalizeReport::default()
    };

    for record in records {
        let fields = [
            (DrawType::Midday, present(&record.midday_win_4), present(&record.midday_booster)),
            (DrawType::Evening, present(&record.evening_win_4), present(&record.evening_booster)),
        ];

        let date = record.draw_date.as_deref().and_then(parse_draw_date);
        let Some(draw_date) = date else {
            let lost = fields.iter().filter(|(_, value, _)| value.is_some()).count();
            if lost > 0 {
                log::debug!("Date illisible {:?}, {} tirage(s) ignoré(s)", record.draw_date, lost);
            }
            report.discarded += lost;
            continue;
        };

        for (draw_type, value, booster) in fields {
            let Some(value) = value else {
                continue;
            };
            match Combo::canonicalize(value) {
                Some(combo) => report.draws.push(Draw {
                    draw_date,
                    draw_type,
                    combo,
                    booster: booster.map(str::to_string),
                }),
                None => {
                    log::debug!("Valeur {:?} du {} ({}) ignorée", value, draw_date, draw_type);
                    report.discarded += 1;
                }
            }
        }
    }

    report.draws.sort_by(|a, b| b.chrono_key().cmp(&a.chrono_key()));
    report
}
