use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;

use crate::models::{Combo, Draw, DrawType};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    draw_date  TEXT NOT NULL,
    draw_type  TEXT NOT NULL,
    combo      TEXT NOT NULL,
    booster    TEXT,
    PRIMARY KEY (draw_date, draw_type)
);

CREATE TABLE IF NOT EXISTS watchlist (
    combo      TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS fetch_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    fetched_at  TEXT NOT NULL,
    rows        INTEGER NOT NULL,
    source      TEXT NOT NULL
);
";

const DATE_FORMAT: &str = "%Y-%m-%d";

// Midday avant Evening pour une même date
const CHRONO_ORDER: &str = "draw_date ASC, CASE draw_type WHEN 'Midday' THEN 0 ELSE 1 END ASC";
const REVERSE_ORDER: &str = "draw_date DESC, CASE draw_type WHEN 'Midday' THEN 0 ELSE 1 END DESC";

#[derive(Debug, Clone, PartialEq)]
pub struct FetchLogEntry {
    pub fetched_at: DateTime<Utc>,
    pub rows: u32,
    pub source: String,
}

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("win4.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    log::debug!("Base ouverte : {:?}", path);
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn row_to_draw(row: &Row<'_>) -> rusqlite::Result<Draw> {
    let raw_date: String = row.get(0)?;
    let raw_type: String = row.get(1)?;
    let raw_combo: String = row.get(2)?;

    let draw_date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
        .map_err(|e| conversion_error(0, e))?;
    let draw_type = raw_type.parse::<DrawType>().map_err(|e| conversion_error(1, e))?;
    let combo = raw_combo.parse::<Combo>().map_err(|e| conversion_error(2, e))?;

    Ok(Draw {
        draw_date,
        draw_type,
        combo,
        booster: row.get(3)?,
    })
}

pub fn insert_draw(conn: &Connection, draw: &Draw) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO draws (draw_date, draw_type, combo, booster)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            draw.draw_date.format(DATE_FORMAT).to_string(),
            draw.draw_type.as_str(),
            draw.combo.to_string(),
            draw.booster,
        ],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

/// Remplace toute la table (rafraîchissement complet du cache local).
pub fn replace_draws(conn: &Connection, draws: &[Draw]) -> Result<usize> {
    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;
    tx.execute("DELETE FROM draws", [])
        .context("Échec de la purge des tirages")?;

    let mut inserted = 0usize;
    for draw in draws {
        if insert_draw(&tx, draw)? {
            inserted += 1;
        }
    }

    tx.commit().context("Échec du commit")?;
    log::debug!("Table des tirages remplacée : {} reçus, {} insérés", draws.len(), inserted);
    Ok(inserted)
}

/// Tous les tirages, en ordre chronologique.
pub fn fetch_all_draws(conn: &Connection) -> Result<Vec<Draw>> {
    let sql = format!(
        "SELECT draw_date, draw_type, combo, booster FROM draws ORDER BY {CHRONO_ORDER}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let draws = stmt
        .query_map([], row_to_draw)?
        .collect::<Result<Vec<_>, _>>()
        .context("Lecture des tirages impossible")?;
    Ok(draws)
}

pub fn fetch_last_draws(conn: &Connection, limit: u32) -> Result<Vec<Draw>> {
    let sql = format!(
        "SELECT draw_date, draw_type, combo, booster FROM draws ORDER BY {REVERSE_ORDER} LIMIT ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let draws = stmt
        .query_map([limit], row_to_draw)?
        .collect::<Result<Vec<_>, _>>()
        .context("Lecture des tirages impossible")?;
    Ok(draws)
}

pub fn count_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count)
}

pub fn date_bounds(conn: &Connection) -> Result<Option<(NaiveDate, NaiveDate)>> {
    let (min, max): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(draw_date), MAX(draw_date) FROM draws",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    match (min, max) {
        (Some(min), Some(max)) => {
            let min = NaiveDate::parse_from_str(&min, DATE_FORMAT)
                .with_context(|| format!("Date invalide en base : '{}'", min))?;
            let max = NaiveDate::parse_from_str(&max, DATE_FORMAT)
                .with_context(|| format!("Date invalide en base : '{}'", max))?;
            Ok(Some((min, max)))
        }
        _ => Ok(None),
    }
}

pub fn record_fetch(conn: &Connection, rows: u32, source: &str, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO fetch_log (fetched_at, rows, source) VALUES (?1, ?2, ?3)",
        rusqlite::params![at.to_rfc3339(), rows, source],
    ).context("Échec de l'écriture du journal de récupération")?;
    Ok(())
}

pub fn last_fetch(conn: &Connection) -> Result<Option<FetchLogEntry>> {
    let row: Option<(String, u32, String)> = conn
        .query_row(
            "SELECT fetched_at, rows, source FROM fetch_log ORDER BY id DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let Some((raw_at, rows, source)) = row else {
        return Ok(None);
    };
    let fetched_at = DateTime::parse_from_rfc3339(&raw_at)
        .with_context(|| format!("Horodatage invalide : '{}'", raw_at))?
        .with_timezone(&Utc);
    Ok(Some(FetchLogEntry { fetched_at, rows, source }))
}

pub fn load_watchlist(conn: &Connection) -> Result<Vec<Combo>> {
    let mut stmt = conn.prepare("SELECT combo FROM watchlist ORDER BY combo ASC")?;
    let combos = stmt
        .query_map([], |row| {
            let raw: String = row.get(0)?;
            raw.parse::<Combo>().map_err(|e| conversion_error(0, e))
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Lecture de la liste de suivi impossible")?;
    Ok(combos)
}

pub fn add_watch(conn: &Connection, combo: Combo) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO watchlist (combo) VALUES (?1)",
        [combo.to_string()],
    ).context("Échec de l'ajout à la liste de suivi")?;
    Ok(changed > 0)
}

pub fn remove_watch(conn: &Connection, combo: Combo) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM watchlist WHERE combo = ?1",
        [combo.to_string()],
    ).context("Échec du retrait de la liste de suivi")?;
    Ok(changed > 0)
}

pub fn clear_watchlist(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM watchlist", [])
        .context("Échec de la purge de la liste de suivi")?;
    Ok(removed)
}

/// Remplace la liste de suivi persistée par `combos`.
pub fn save_watchlist<'a, I>(conn: &Connection, combos: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Combo>,
{
    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;
    tx.execute("DELETE FROM watchlist", [])?;
    let mut saved = 0usize;
    for combo in combos {
        if add_watch(&tx, *combo)? {
            saved += 1;
        }
    }
    tx.commit().context("Échec du commit")?;
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_draw(date: &str, draw_type: DrawType, combo: &str) -> Draw {
        Draw {
            draw_date: NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            draw_type,
            combo: combo.parse().unwrap(),
            booster: None,
        }
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_count() {
        let conn = memory_db();
        assert_eq!(count_draws(&conn).unwrap(), 0);

        insert_draw(&conn, &test_draw("2024-01-01", DrawType::Midday, "0042")).unwrap();
        assert_eq!(count_draws(&conn).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_ignored() {
        let conn = memory_db();
        let draw = test_draw("2024-01-01", DrawType::Evening, "1234");

        assert!(insert_draw(&conn, &draw).unwrap());
        assert!(!insert_draw(&conn, &draw).unwrap());
        // même date, autre tirage : accepté
        assert!(insert_draw(&conn, &test_draw("2024-01-01", DrawType::Midday, "1234")).unwrap());
        assert_eq!(count_draws(&conn).unwrap(), 2);
    }

    #[test]
    fn test_fetch_order() {
        let conn = memory_db();
        insert_draw(&conn, &test_draw("2024-01-05", DrawType::Midday, "0001")).unwrap();
        insert_draw(&conn, &test_draw("2024-01-01", DrawType::Evening, "0002")).unwrap();
        insert_draw(&conn, &test_draw("2024-01-01", DrawType::Midday, "0003")).unwrap();

        let all = fetch_all_draws(&conn).unwrap();
        let combos: Vec<String> = all.iter().map(|d| d.combo.to_string()).collect();
        assert_eq!(combos, vec!["0003", "0002", "0001"]);

        let last = fetch_last_draws(&conn, 2).unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].combo.to_string(), "0001");
        assert_eq!(last[1].draw_type, DrawType::Evening);
    }

    #[test]
    fn test_replace_draws_refreshes() {
        let conn = memory_db();
        insert_draw(&conn, &test_draw("2020-01-01", DrawType::Midday, "9999")).unwrap();

        let fresh = vec![
            test_draw("2024-02-01", DrawType::Midday, "1111"),
            test_draw("2024-02-01", DrawType::Evening, "2222"),
        ];
        assert_eq!(replace_draws(&conn, &fresh).unwrap(), 2);
        assert_eq!(count_draws(&conn).unwrap(), 2);

        let bounds = date_bounds(&conn).unwrap().unwrap();
        assert_eq!(bounds.0, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_date_bounds_empty() {
        let conn = memory_db();
        assert!(date_bounds(&conn).unwrap().is_none());
    }

    #[test]
    fn test_fetch_log_roundtrip() {
        let conn = memory_db();
        assert!(last_fetch(&conn).unwrap().is_none());

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        record_fetch(&conn, 120, "full", at).unwrap();
        record_fetch(&conn, 4, "recent", at + chrono::Duration::hours(1)).unwrap();

        let last = last_fetch(&conn).unwrap().unwrap();
        assert_eq!(last.rows, 4);
        assert_eq!(last.source, "recent");
    }

    #[test]
    fn test_watchlist_persistence() {
        let conn = memory_db();
        let a: Combo = "0427".parse().unwrap();
        let b: Combo = "1111".parse().unwrap();

        assert!(add_watch(&conn, b).unwrap());
        assert!(add_watch(&conn, a).unwrap());
        assert!(!add_watch(&conn, a).unwrap());
        assert_eq!(load_watchlist(&conn).unwrap(), vec![a, b]);

        assert!(remove_watch(&conn, b).unwrap());
        assert!(!remove_watch(&conn, b).unwrap());

        assert_eq!(save_watchlist(&conn, &[b]).unwrap(), 1);
        assert_eq!(load_watchlist(&conn).unwrap(), vec![b]);

        assert_eq!(clear_watchlist(&conn).unwrap(), 1);
        assert!(load_watchlist(&conn).unwrap().is_empty());
    }
}
