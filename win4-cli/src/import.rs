use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use win4_db::rusqlite::Connection;

use win4_db::db::{insert_draw, record_fetch, replace_draws};
use win4_fetch::client::{FetchClient, PageQuery, Transport};
use win4_fetch::normalize::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Tout l'historique, remplace la table locale
    Full,
    /// Les N derniers jours, ajoutés à la table existante
    Recent(u32),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub records: usize,
    pub draws: usize,
    pub discarded: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub replaced: bool,
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message("tirages");
    pb
}

/// Télécharge, normalise puis enregistre. En cas d'échec réseau rien n'est écrit.
pub fn fetch_into_db<T: Transport>(
    conn: &Connection,
    client: &FetchClient<T>,
    mode: FetchMode,
    today: NaiveDate,
) -> Result<FetchSummary> {
    let pb = progress_bar();
    let mut on_progress = |fetched: usize, estimated: u64| {
        pb.set_length(estimated.max(fetched as u64));
        pb.set_position(fetched as u64);
    };

    let fetched = match mode {
        FetchMode::Full => client.fetch_all(
            &PageQuery::default(),
            client.config().chunk_size,
            Some(&mut on_progress),
        ),
        FetchMode::Recent(days) => client.fetch_recent(days, today, Some(&mut on_progress)),
    };
    pb.finish_and_clear();
    let records = fetched.context("Échec du téléchargement des tirages")?;

    let report = normalize(&records);
    let mut summary = FetchSummary {
        records: report.records,
        draws: report.draws.len(),
        discarded: report.discarded,
        ..FetchSummary::default()
    };

    let source = match mode {
        FetchMode::Full => {
            if report.draws.is_empty() {
                bail!(
                    "Aucun tirage reçu ({} enregistrements), table locale conservée",
                    report.records
                );
            }
            summary.inserted = replace_draws(conn, &report.draws)?;
            summary.replaced = true;
            "full".to_string()
        }
        FetchMode::Recent(days) => {
            let tx = conn
                .unchecked_transaction()
                .context("Impossible de démarrer la transaction")?;
            for draw in &report.draws {
                if insert_draw(&tx, draw)? {
                    summary.inserted += 1;
                } else {
                    summary.skipped += 1;
                }
            }
            tx.commit().context("Échec du commit")?;
            format!("recent:{days}")
        }
    };

    record_fetch(conn, summary.draws as u32, &source, Utc::now())?;
    log::info!(
        "{} enregistrements, {} tirages, {} ignorés",
        summary.records,
        summary.draws,
        summary.discarded
    );
    Ok(summary)
}
