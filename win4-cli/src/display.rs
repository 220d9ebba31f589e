use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use textplots::Plot;

use win4_analysis::backtest::BacktestResult;
use win4_analysis::features::DerivedDraw;
use win4_analysis::frequency::{
    ColdCombo, ComboCount, DigitSumCount, HotColdScore, HotColdTable, HotCombo, PositionMatrix,
};
use win4_analysis::matching::{MatchKind, MatchReport};
use win4_analysis::patterns::{MirrorStats, PairRepeat, PatternShare};
use win4_analysis::watchlist::{ImportSummary, WatchlistRow};
use win4_db::db::FetchLogEntry;
use win4_db::models::{Combo, Draw, DrawType};
use win4_fetch::client::Freshness;

use crate::import::FetchSummary;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn bar(pct: f64, scale: f64) -> String {
    "█".repeat((pct * scale).round().max(0.0) as usize)
}

pub fn display_fetch_summary(summary: &FetchSummary) {
    println!("Téléchargement terminé :");
    println!("  Enregistrements reçus : {}", summary.records);
    println!("  Tirages normalisés    : {}", summary.draws);
    if summary.replaced {
        println!("  Table remplacée       : {} tirages", summary.inserted);
    } else {
        println!("  Insérés               : {}", summary.inserted);
        println!("  Doublons ignorés      : {}", summary.skipped);
    }
    if summary.discarded > 0 {
        println!("  Valeurs invalides     : {}", summary.discarded);
    }
}

pub fn display_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Date", "Tirage", "Win 4", "Booster"]);
    for draw in draws {
        table.add_row(vec![
            draw.draw_date.to_string(),
            draw.draw_type.to_string(),
            draw.combo.to_string(),
            draw.booster.clone().unwrap_or_else(|| "—".to_string()),
        ]);
    }
    println!("{table}");
}

fn format_timestamp(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "inconnu".to_string())
}

pub fn display_freshness(
    remote: Option<&Freshness>,
    local: Option<&FetchLogEntry>,
    bounds: Option<(chrono::NaiveDate, chrono::NaiveDate)>,
) {
    println!("\n== Fraîcheur des données ==\n");
    let mut table = new_table(vec!["Source", "Horodatage"]);
    match remote {
        Some(f) => {
            table.add_row(vec!["Données mises à jour".to_string(), format_timestamp(f.data_updated)]);
            table.add_row(vec!["Lignes mises à jour".to_string(), format_timestamp(f.rows_updated)]);
            table.add_row(vec!["Métadonnées modifiées".to_string(), format_timestamp(f.metadata_updated)]);
        }
        None => {
            table.add_row(vec!["Serveur".to_string(), "indisponible".to_string()]);
        }
    }
    match local {
        Some(entry) => table.add_row(vec![
            "Dernier téléchargement local".to_string(),
            format!("{} ({} tirages, {})", format_timestamp(Some(entry.fetched_at)), entry.rows, entry.source),
        ]),
        None => table.add_row(vec!["Dernier téléchargement local".to_string(), "jamais".to_string()]),
    };
    if let Some((first, last)) = bounds {
        table.add_row(vec!["Historique local".to_string(), format!("{first} → {last}")]);
    }
    println!("{table}");
}

pub fn display_overview(table_draws: &[DerivedDraw], patterns: &[PatternShare], top: &[ComboCount]) {
    println!("\n== Vue d'ensemble ==\n");
    let midday = table_draws.iter().filter(|d| d.draw_type() == DrawType::Midday).count();
    let repeats = table_draws.iter().filter(|d| d.has_repeat).count();
    let first = table_draws.iter().map(|d| d.date()).min();
    let last = table_draws.iter().max_by_key(|d| d.chrono_key());

    let mut table = new_table(vec!["Indicateur", "Valeur"]);
    table.add_row(vec!["Tirages".to_string(), table_draws.len().to_string()]);
    table.add_row(vec![
        "Midday / Evening".to_string(),
        format!("{} / {}", midday, table_draws.len() - midday),
    ]);
    if let (Some(first), Some(last)) = (first, last) {
        table.add_row(vec!["Période".to_string(), format!("{} → {}", first, last.date())]);
        table.add_row(vec![
            "Dernier tirage".to_string(),
            format!("{} {} : {}", last.date(), last.draw_type(), last.combo()),
        ]);
    }
    table.add_row(vec![
        "Avec répétition".to_string(),
        format!("{:.1}%", share_pct(repeats, table_draws.len())),
    ]);
    if let Some(best) = top.first() {
        table.add_row(vec![
            "Combinaison la plus fréquente".to_string(),
            format!("{} ({} fois)", best.combo, best.count),
        ]);
    }
    println!("{table}");

    display_pattern_table(patterns);
}

fn share_pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

pub fn display_position_matrix(matrix: &PositionMatrix) {
    println!("\n── Fréquence des chiffres par position ──");
    let mut header = vec!["Position".to_string()];
    header.extend((0..10).map(|d| d.to_string()));
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for pos in 0..4 {
        let modal = matrix.modal_digit(pos);
        let mut row = vec![Cell::new(format!("P{}", pos + 1))];
        for digit in 0..10u8 {
            let cell = Cell::new(matrix.get(pos, digit));
            row.push(if digit == modal && matrix.row_total(pos) > 0 {
                cell.fg(Color::Green)
            } else {
                cell
            });
        }
        table.add_row(row);
    }
    println!("{table}");
}

pub fn display_combo_frequency(title: &str, counts: &[ComboCount]) {
    println!("\n── {title} ──");
    if counts.is_empty() {
        println!("  (aucune combinaison)");
        return;
    }
    let mut table = new_table(vec!["#", "Win 4", "Sorties", "%"]);
    for (i, c) in counts.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            c.combo.to_string(),
            c.count.to_string(),
            format!("{:.3}", c.pct),
        ]);
    }
    println!("{table}");
}

pub fn display_digit_sums(sums: &[DigitSumCount]) {
    println!("\n── Distribution des sommes de chiffres ──");
    let mut table = new_table(vec!["Somme", "Tirages", "%", ""]);
    for s in sums.iter().filter(|s| s.count > 0) {
        table.add_row(vec![
            s.sum.to_string(),
            s.count.to_string(),
            format!("{:.2}", s.pct),
            bar(s.pct, 3.0),
        ]);
    }
    println!("{table}");
}

fn display_pattern_table(patterns: &[PatternShare]) {
    println!("\n── Motifs ──");
    let mut table = new_table(vec!["Motif", "Description", "Tirages", "%", "Attendu %"]);
    for p in patterns {
        table.add_row(vec![
            p.label.to_string(),
            p.label.description().to_string(),
            p.share.count.to_string(),
            format!("{:.2}", p.share.pct),
            format!("{:.1}", p.label.theoretical_pct()),
        ]);
    }
    println!("{table}");
}

pub fn display_patterns(patterns: &[PatternShare], mirrors: &MirrorStats, pairs: &[PairRepeat]) {
    display_pattern_table(patterns);

    println!("\n── Miroirs ──");
    let mut table = new_table(vec!["Propriété", "Tirages", "%"]);
    for (name, share) in [
        ("Extrémités égales (P1 = P4)", mirrors.mirror_ends),
        ("Centre égal (P2 = P3)", mirrors.mirror_middle),
        ("Palindrome", mirrors.palindrome),
    ] {
        table.add_row(vec![name.to_string(), share.count.to_string(), format!("{:.2}", share.pct)]);
    }
    println!("{table}");

    println!("\n── Positions égales ──");
    let mut table = new_table(vec!["Paire", "Tirages", "%", ""]);
    for pair in pairs {
        table.add_row(vec![
            format!("P{} = P{}", pair.positions.0, pair.positions.1),
            pair.share.count.to_string(),
            format!("{:.2}", pair.share.pct),
            bar(pair.share.pct, 1.0),
        ]);
    }
    println!("{table}");
}

fn score_rows(title: &str, scores: &[&HotColdScore], color: Color) {
    println!("\n── {title} ──");
    if scores.is_empty() {
        println!("  (aucune combinaison)");
        return;
    }
    let mut table = new_table(vec!["Win 4", "Récent", "Antérieur", "Attendu", "Score"]);
    for s in scores {
        table.add_row(vec![
            Cell::new(s.combo),
            Cell::new(s.recent_count),
            Cell::new(s.prior_count),
            Cell::new(format!("{:.3}", s.expected_recent)),
            Cell::new(format!("{:+.3}", s.score)).fg(color),
        ]);
    }
    println!("{table}");
}

pub fn display_hot_cold(scores: &HotColdTable, top_n: usize, window_days: u32) {
    println!(
        "\n== Chaud / froid sur {} jours ({} récents, {} antérieurs) ==",
        window_days, scores.recent_draws, scores.prior_draws
    );
    if let Some(cutoff) = scores.cutoff {
        println!("  Coupure : {cutoff}");
    }
    let hottest: Vec<&HotColdScore> = scores.hottest(top_n).iter().collect();
    score_rows("Plus chaudes", &hottest, Color::Green);
    score_rows("Plus froides", &scores.coldest(top_n), Color::Red);
}

pub fn display_hot_combos(hot: &[HotCombo]) {
    println!("\n── Sorties récentes ──");
    if hot.is_empty() {
        println!("  (aucune combinaison)");
        return;
    }
    let mut table = new_table(vec!["Win 4", "Sorties", "Dernière"]);
    for h in hot {
        table.add_row(vec![h.combo.to_string(), h.count.to_string(), h.last_seen.to_string()]);
    }
    println!("{table}");
}

pub fn display_cold_combos(cold: &[ColdCombo], top_n: usize) {
    println!("\n── Anciennes favorites devenues rares ──");
    if cold.is_empty() {
        println!("  (aucune combinaison)");
        return;
    }
    let mut table = new_table(vec!["Win 4", "Avant", "Récent", "Dernière"]);
    for c in cold.iter().take(top_n) {
        table.add_row(vec![
            c.combo.to_string(),
            c.historical_count.to_string(),
            c.recent_count.to_string(),
            c.last_seen.to_string(),
        ]);
    }
    println!("{table}");
}

pub fn display_backtest(result: &BacktestResult, label: &str, last: usize) {
    let s = &result.summary;
    println!("\n== Backtest ({label}) ==\n");
    let fmt_rate = |r: Option<f64>| r.map_or("—".to_string(), |r| format!("{:.3}%", r * 100.0));

    let mut table = new_table(vec!["Indicateur", "Valeur"]);
    table.add_row(vec!["Tirages parcourus".to_string(), s.evaluated.to_string()]);
    table.add_row(vec!["Prédictions".to_string(), s.predictions.to_string()]);
    table.add_row(vec!["Straight gagnants".to_string(), s.straight_hits.to_string()]);
    table.add_row(vec!["Box gagnants".to_string(), s.box_hits.to_string()]);
    table.add_row(vec!["Taux straight".to_string(), fmt_rate(s.hit_rate())]);
    table.add_row(vec!["Taux box".to_string(), fmt_rate(s.box_hit_rate())]);
    // hasard : 1/10 000 en straight
    table.add_row(vec!["Hasard (straight)".to_string(), "0.010%".to_string()]);
    println!("{table}");

    if result.points.is_empty() {
        println!("  Aucune prédiction : historique plus court que la fenêtre.");
        return;
    }

    println!("\n── Dernières prédictions ──");
    let mut table = new_table(vec!["Date", "Tirage", "Prédit", "Réel", "Résultat", "Fenêtre"]);
    let start = result.points.len().saturating_sub(last);
    for p in &result.points[start..] {
        let (text, color) = if p.hit {
            ("STRAIGHT", Color::Green)
        } else if p.box_hit {
            ("BOX", Color::Yellow)
        } else {
            ("—", Color::White)
        };
        table.add_row(vec![
            Cell::new(p.date),
            Cell::new(p.draw_type),
            Cell::new(p.predicted),
            Cell::new(p.actual),
            Cell::new(text).fg(color),
            Cell::new(p.window_size),
        ]);
    }
    println!("{table}");

    let points: Vec<(f32, f32)> = result
        .points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.running_box_rate.map(|r| (i as f32, (r * 100.0) as f32)))
        .collect();
    if points.len() < 2 {
        return;
    }
    let y_max = points.iter().map(|p| p.1).fold(0.0f32, f32::max).max(0.1) * 1.1;
    println!("\n── Taux box cumulé (%) ──");
    let shape = textplots::Shape::Lines(&points);
    let mut chart = textplots::Chart::new_with_y_range(120, 40, 0.0, points.len() as f32, 0.0, y_max);
    println!("{}", chart.lineplot(&shape));
}

pub fn display_match_report(report: &MatchReport<'_>) {
    let bt = &report.box_type;
    println!("\n== Vérification de {} ==\n", report.query);
    println!(
        "  Motif {} : {} (signature {})",
        bt.label,
        bt.label.description(),
        bt.signature
    );
    println!("  Gain straight (mise 1 $) : {} $", report.straight_payout);
    match report.box_payout {
        Some(p) => println!("  Gain box {}-way (mise 1 $) : {} $", bt.ways, p),
        None => println!("  Pas de jeu box pour un quadruple"),
    }

    let mut table = new_table(vec!["Tirage", "Straight", "Box (total)", "Box seul"]);
    for b in report.breakdown() {
        table.add_row(vec![
            b.draw_type.to_string(),
            b.straight.to_string(),
            b.box_total.to_string(),
            b.box_only.to_string(),
        ]);
    }
    table.add_row(vec![
        "Total".to_string(),
        report.straight.len().to_string(),
        report.boxed.len().to_string(),
        report.box_only_count().to_string(),
    ]);
    println!("{table}");

    if report.boxed.is_empty() {
        println!("  Jamais sortie, ni en straight ni en box.");
        return;
    }

    let mut table = new_table(vec!["Date", "Tirage", "Win 4", "Type"]);
    for draw in &report.boxed {
        let (kind, color) = match report.match_kind(draw) {
            MatchKind::Straight => ("Straight", Color::Green),
            MatchKind::BoxOnly => ("Box", Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(draw.date()),
            Cell::new(draw.draw_type()),
            Cell::new(draw.combo()),
            Cell::new(kind).fg(color),
        ]);
    }
    println!("{table}");
}

pub fn display_watchlist(combos: &[Combo]) {
    if combos.is_empty() {
        println!("Watchlist vide. Ajoutez une combinaison : win4 watchlist add 1234");
        return;
    }
    let mut table = new_table(vec!["#", "Win 4"]);
    for (i, c) in combos.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), c.to_string()]);
    }
    println!("{table}");
}

pub fn display_watchlist_stats(rows: &[WatchlistRow]) {
    println!("\n== Statistiques de la watchlist ==\n");
    let mut table = new_table(vec![
        "Win 4", "Motif", "Straight", "Box", "Dernière", "Jours", "Récent", "Score",
    ]);
    for r in rows {
        let color = if r.hot_score > 0.0 {
            Color::Green
        } else if r.hot_score < 0.0 {
            Color::Red
        } else {
            Color::White
        };
        table.add_row(vec![
            Cell::new(r.combo),
            Cell::new(format!("{} ({}-way)", r.pattern, r.box_ways)),
            Cell::new(r.straight_hits),
            Cell::new(r.box_hits),
            Cell::new(r.last_seen.map_or("jamais".to_string(), |d| d.to_string())),
            Cell::new(r.days_ago.map_or("—".to_string(), |d| d.to_string())),
            Cell::new(r.recent_hits),
            Cell::new(format!("{:+.3}", r.hot_score)).fg(color),
        ]);
    }
    println!("{table}");
}

pub fn display_import_summary(summary: &ImportSummary) {
    println!("Import terminé :");
    println!("  Ajoutées          : {}", summary.added);
    println!("  Doublons ignorés  : {}", summary.skipped);
    if summary.invalid > 0 {
        println!("  Invalides         : {}", summary.invalid);
    }
}
