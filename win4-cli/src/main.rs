mod config;
mod display;
mod import;

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use win4_analysis::backtest::{backtest, LookbackWindow, PredictionMethod};
use win4_analysis::features::{add_features, DerivedDraw, PatternLabel};
use win4_analysis::filters::{date_preset, date_range, DrawFilter, DrawScope};
use win4_analysis::frequency::{
    cold_combos, combo_frequency, digit_position_frequency, digit_sum_distribution, hot_cold_scores,
    hot_combos,
};
use win4_analysis::matching::check_combo;
use win4_analysis::patterns::{combos_for_pattern, mirror_analysis, pattern_summary, position_pair_matrix};
use win4_analysis::watchlist::{export_csv, export_stats_csv, import_csv, watchlist_stats, Watchlist};
use win4_db::db::{
    add_watch, clear_watchlist, count_draws, date_bounds, fetch_all_draws, fetch_last_draws, last_fetch,
    load_watchlist, migrate, open_db, remove_watch, save_watchlist,
};
use win4_db::models::{Combo, DrawType};
use win4_db::rusqlite::Connection;
use win4_fetch::client::FetchClient;

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};
use crate::display::{
    display_backtest, display_cold_combos, display_combo_frequency, display_digit_sums, display_draws,
    display_fetch_summary, display_freshness, display_hot_cold, display_hot_combos, display_import_summary,
    display_match_report, display_overview, display_patterns, display_position_matrix, display_watchlist,
    display_watchlist_stats,
};
use crate::import::{fetch_into_db, FetchMode};

const EMPTY_DB: &str = "Base vide. Lancez d'abord : win4 fetch";

#[derive(Parser)]
#[command(name = "win4", about = "Analyse des tirages NY Win 4")]
struct Cli {
    /// Fichier de configuration JSON
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(flatten)]
    filters: FilterArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Date de début incluse (AAAA-MM-JJ)
    #[arg(long, global = true)]
    from: Option<NaiveDate>,

    /// Date de fin incluse (AAAA-MM-JJ)
    #[arg(long, global = true)]
    to: Option<NaiveDate>,

    /// Derniers N jours de l'historique (7, 30, 90, 365...)
    #[arg(long, global = true, conflicts_with = "from")]
    days: Option<u32>,

    /// Type de tirage
    #[arg(long, global = true, value_enum, default_value_t = DrawScope::Both)]
    draw_type: DrawScope,
}

impl FilterArgs {
    /// `--days` est relatif au dernier tirage de la table, pas à aujourd'hui.
    fn to_filter(&self, table: &[DerivedDraw]) -> Result<DrawFilter> {
        let start = match (self.days, date_range(table)) {
            (Some(days), Some((_, latest))) => Some(date_preset(latest, days)),
            _ => self.from,
        };
        if let (Some(s), Some(e)) = (start, self.to) {
            if s > e {
                bail!("Plage de dates vide : {} > {}", s, e);
            }
        }
        Ok(DrawFilter {
            scope: self.draw_type,
            start,
            end: self.to,
        })
    }
}

#[derive(Subcommand)]
enum Command {
    /// Télécharger les tirages depuis l'API open data de l'État de New York
    Fetch {
        /// Seulement les N derniers jours (ajout sans remplacer la table)
        #[arg(long)]
        recent_days: Option<u32>,

        /// Taille des pages
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Dates de mise à jour côté serveur et du dernier téléchargement local
    Freshness,

    /// Lister les derniers tirages
    List {
        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Vue d'ensemble de l'historique filtré
    Overview,

    /// Fréquences par position, combinaisons et sommes
    Frequency {
        /// Nombre de combinaisons à afficher
        #[arg(short, long)]
        top: Option<usize>,
    },

    /// Motifs, miroirs et positions égales
    Patterns {
        /// Détailler les combinaisons d'un motif (ABCD, AABC, AABB, AAAB, AAAA)
        #[arg(short, long)]
        pattern: Option<PatternLabel>,
    },

    /// Combinaisons chaudes et froides
    Trends {
        /// Fenêtre récente en jours
        #[arg(short, long)]
        window: Option<u32>,

        /// Nombre de lignes par tableau
        #[arg(short, long)]
        top: Option<usize>,
    },

    /// Évaluer une méthode de prédiction sans fuite d'information
    Backtest {
        /// Fenêtre de rétrospection (jours, ou tirages avec --by-draws)
        #[arg(short, long)]
        window: Option<u32>,

        /// Fenêtre exprimée en nombre de tirages
        #[arg(long)]
        by_draws: bool,

        /// Méthode de prédiction
        #[arg(short, long, value_enum, default_value_t = PredictionMethod::MostFrequent)]
        method: PredictionMethod,

        /// Prédictions minimales avant d'afficher un taux cumulé
        #[arg(long)]
        min_samples: Option<usize>,
    },

    /// Vérifier si une combinaison est déjà sortie (straight et box)
    Check {
        /// Combinaison à 4 chiffres
        combo: String,
    },

    /// Gérer la watchlist
    Watchlist {
        #[command(subcommand)]
        action: WatchAction,
    },

    /// Exporter les tirages filtrés en CSV
    Export {
        /// Fichier de sortie
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum WatchAction {
    /// Ajouter une combinaison
    Add { combo: String },
    /// Retirer une combinaison
    Remove { combo: String },
    /// Lister les combinaisons suivies
    List,
    /// Vider la watchlist
    Clear,
    /// Importer depuis un CSV (colonne win4, combo ou number)
    Import { file: PathBuf },
    /// Exporter en CSV
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Statistiques des combinaisons suivies
    Stats {
        /// Fenêtre récente en jours pour le score chaud/froid
        #[arg(short, long)]
        window: Option<u32>,

        /// Exporter les statistiques en CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    env_logger::init();
    if let Err(e) = dotenv {
        log::debug!("Pas de fichier .env : {}", e);
    }

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    let path = config.database_path();
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Fetch { recent_days, chunk_size } => cmd_fetch(&conn, config, recent_days, chunk_size),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::Freshness => cmd_freshness(&conn, config),
        Command::List { last } => cmd_list(&conn, last),
        Command::Overview => cmd_overview(&conn, &config, &cli.filters),
        Command::Frequency { top } => cmd_frequency(&conn, &config, &cli.filters, top),
        Command::Patterns { pattern } => cmd_patterns(&conn, &config, &cli.filters, pattern),
        Command::Trends { window, top } => cmd_trends(&conn, &config, &cli.filters, window, top),
        Command::Backtest {
            window,
            by_draws,
            method,
            min_samples,
        } => cmd_backtest(&conn, &config, &cli.filters, window, by_draws, method, min_samples),
        Command::Check { combo } => cmd_check(&conn, &config, &cli.filters, &combo),
        Command::Watchlist { action } => cmd_watchlist(&conn, &config, &cli.filters, action),
        Command::Export { output } => cmd_export(&conn, &cli.filters, &output),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn cmd_fetch(conn: &Connection, config: AppConfig, recent_days: Option<u32>, chunk_size: Option<usize>) -> Result<()> {
    let mut api = config.api;
    if let Some(size) = chunk_size {
        api.chunk_size = size;
    }
    if api.app_token.is_none() {
        println!("Pas de jeton d'application : limites de débit standard.");
    }
    let client = FetchClient::new(api)?;
    let mode = match recent_days {
        Some(days) => FetchMode::Recent(days),
        None => FetchMode::Full,
    };
    let summary = fetch_into_db(conn, &client, mode, today())?;
    display_fetch_summary(&summary);
    Ok(())
}

fn cmd_freshness(conn: &Connection, config: AppConfig) -> Result<()> {
    let client = FetchClient::new(config.api)?;
    let remote = match client.freshness() {
        Ok(f) => Some(f),
        Err(e) => {
            log::warn!("Métadonnées indisponibles : {}", e);
            None
        }
    };
    let local = last_fetch(conn)?;
    display_freshness(remote.as_ref(), local.as_ref(), date_bounds(conn)?);
    Ok(())
}

fn cmd_list(conn: &Connection, last: u32) -> Result<()> {
    let n = count_draws(conn)?;
    if n == 0 {
        println!("{EMPTY_DB}");
        return Ok(());
    }
    let draws = fetch_last_draws(conn, last)?;
    display_draws(&draws);
    Ok(())
}

/// Table enrichie et filtrée. `None` si la base est vide.
fn load_table(conn: &Connection, config: &AppConfig, filters: &FilterArgs) -> Result<Option<Vec<DerivedDraw>>> {
    let draws = fetch_all_draws(conn)?;
    if draws.is_empty() {
        println!("{EMPTY_DB}");
        return Ok(None);
    }
    let table = add_features(&draws);
    let filter = filters.to_filter(&table)?;
    let table = if filter.is_unfiltered() { table } else { filter.apply(&table) };

    if table.len() < config.analytics.min_draws_for_analysis {
        println!(
            "Attention : seulement {} tirage(s) après filtrage, résultats peu significatifs.",
            table.len()
        );
    }
    log::info!("{} tirages chargés", table.len());
    Ok(Some(table))
}

fn cmd_overview(conn: &Connection, config: &AppConfig, filters: &FilterArgs) -> Result<()> {
    let Some(table) = load_table(conn, config, filters)? else {
        return Ok(());
    };
    let patterns = pattern_summary(&table);
    let top = combo_frequency(&table, Some(1));
    display_overview(&table, &patterns, &top);
    Ok(())
}

fn cmd_frequency(conn: &Connection, config: &AppConfig, filters: &FilterArgs, top: Option<usize>) -> Result<()> {
    let Some(table) = load_table(conn, config, filters)? else {
        return Ok(());
    };
    let top = top.unwrap_or(config.analytics.default_top_n);
    display_position_matrix(&digit_position_frequency(&table));
    display_combo_frequency("Combinaisons les plus fréquentes", &combo_frequency(&table, Some(top)));
    display_digit_sums(&digit_sum_distribution(&table));
    Ok(())
}

fn cmd_patterns(
    conn: &Connection,
    config: &AppConfig,
    filters: &FilterArgs,
    pattern: Option<PatternLabel>,
) -> Result<()> {
    let Some(table) = load_table(conn, config, filters)? else {
        return Ok(());
    };
    display_patterns(&pattern_summary(&table), &mirror_analysis(&table), &position_pair_matrix(&table));
    if let Some(label) = pattern {
        let combos = combos_for_pattern(&table, label, Some(config.analytics.default_top_n));
        display_combo_frequency(&format!("Motif {} : {}", label, label.description()), &combos);
    }
    Ok(())
}

fn cmd_trends(
    conn: &Connection,
    config: &AppConfig,
    filters: &FilterArgs,
    window: Option<u32>,
    top: Option<usize>,
) -> Result<()> {
    let Some(table) = load_table(conn, config, filters)? else {
        return Ok(());
    };
    let window = window.unwrap_or(config.analytics.default_window_days);
    let top = top.unwrap_or(config.analytics.default_top_n);

    display_hot_cold(&hot_cold_scores(&table, window), top, window);
    display_hot_combos(&hot_combos(&table, window, top));
    display_cold_combos(&cold_combos(&table, window, config.analytics.cold_min_historical), top);
    Ok(())
}

fn cmd_backtest(
    conn: &Connection,
    config: &AppConfig,
    filters: &FilterArgs,
    window: Option<u32>,
    by_draws: bool,
    method: PredictionMethod,
    min_samples: Option<usize>,
) -> Result<()> {
    let Some(table) = load_table(conn, config, filters)? else {
        return Ok(());
    };
    let size = window.unwrap_or(config.analytics.default_window_days);
    let (lookback, label) = if by_draws {
        (LookbackWindow::Draws(size as usize), format!("{size} derniers tirages, {method:?}"))
    } else {
        (LookbackWindow::Days(size), format!("{size} jours, {method:?}"))
    };
    let min_samples = min_samples.unwrap_or(config.analytics.min_backtest_samples);

    let result = backtest(&table, lookback, method, min_samples);
    display_backtest(&result, &label, 15);
    Ok(())
}

fn cmd_check(conn: &Connection, config: &AppConfig, filters: &FilterArgs, input: &str) -> Result<()> {
    let combo = parse_combo(input)?;
    let Some(table) = load_table(conn, config, filters)? else {
        return Ok(());
    };
    let report = check_combo(combo, &table, &config.payouts);
    display_match_report(&report);
    Ok(())
}

fn parse_combo(input: &str) -> Result<Combo> {
    input
        .parse()
        .with_context(|| format!("Combinaison invalide '{}'", input))
}

fn cmd_watchlist(conn: &Connection, config: &AppConfig, filters: &FilterArgs, action: WatchAction) -> Result<()> {
    match action {
        WatchAction::Add { combo } => {
            let combo = parse_combo(&combo)?;
            if add_watch(conn, combo)? {
                println!("{combo} ajoutée à la watchlist.");
            } else {
                println!("{combo} est déjà suivie.");
            }
        }
        WatchAction::Remove { combo } => {
            let combo = parse_combo(&combo)?;
            if remove_watch(conn, combo)? {
                println!("{combo} retirée de la watchlist.");
            } else {
                println!("{combo} n'était pas suivie.");
            }
        }
        WatchAction::List => display_watchlist(&load_watchlist(conn)?),
        WatchAction::Clear => {
            let n = clear_watchlist(conn)?;
            println!("{n} combinaison(s) retirée(s).");
        }
        WatchAction::Import { file } => {
            let mut watchlist = Watchlist::from_combos(load_watchlist(conn)?);
            let reader = File::open(&file).with_context(|| format!("Impossible d'ouvrir {:?}", file))?;
            let summary = import_csv(&mut watchlist, reader)
                .with_context(|| format!("CSV illisible {:?}", file))?;
            save_watchlist(conn, watchlist.iter())?;
            display_import_summary(&summary);
        }
        WatchAction::Export { output } => {
            let watchlist = Watchlist::from_combos(load_watchlist(conn)?);
            export_csv(&watchlist, create_file(&output)?)?;
            println!("{} combinaison(s) exportée(s) vers {:?}", watchlist.len(), output);
        }
        WatchAction::Stats { window, output } => {
            let watchlist = Watchlist::from_combos(load_watchlist(conn)?);
            if watchlist.is_empty() {
                display_watchlist(&[]);
                return Ok(());
            }
            let Some(table) = load_table(conn, config, filters)? else {
                return Ok(());
            };
            let window = window.unwrap_or(config.analytics.default_window_days);
            let reference = date_range(&table).map_or_else(today, |(_, latest)| latest);
            let rows = watchlist_stats(&table, &watchlist, window, reference);
            display_watchlist_stats(&rows);
            if let Some(output) = output {
                export_stats_csv(&rows, create_file(&output)?)?;
                println!("Statistiques exportées vers {:?}", output);
            }
        }
    }
    Ok(())
}

fn create_file(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Impossible de créer {:?}", path))
}

#[derive(Serialize)]
struct ExportRow {
    draw_date: NaiveDate,
    draw_type: DrawType,
    win4: Combo,
    booster: Option<String>,
    pattern: PatternLabel,
    box_ways: u32,
    digit_sum: u8,
}

fn cmd_export(conn: &Connection, filters: &FilterArgs, output: &Path) -> Result<()> {
    let draws = fetch_all_draws(conn)?;
    if draws.is_empty() {
        println!("{EMPTY_DB}");
        return Ok(());
    }
    let table = add_features(&draws);
    let filter = filters.to_filter(&table)?;

    let mut wtr = csv::Writer::from_writer(create_file(output)?);
    let mut written = 0usize;
    for draw in table.iter().filter(|d| filter.matches(d)) {
        wtr.serialize(ExportRow {
            draw_date: draw.date(),
            draw_type: draw.draw_type(),
            win4: draw.combo(),
            booster: draw.draw.booster.clone(),
            pattern: draw.pattern,
            box_ways: draw.box_ways,
            digit_sum: draw.digit_sum,
        })?;
        written += 1;
    }
    wtr.flush()?;
    println!("{written} tirage(s) exporté(s) vers {:?}", output);
    Ok(())
}
