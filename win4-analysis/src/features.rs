use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use win4_db::models::{Combo, Draw, DrawType, ValidationError};

/// Forme du multiensemble des 4 chiffres, dans l'ordre de probabilité décroissante.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PatternLabel {
    #[serde(rename = "ABCD")]
    Abcd,
    #[serde(rename = "AABC")]
    Aabc,
    #[serde(rename = "AABB")]
    Aabb,
    #[serde(rename = "AAAB")]
    Aaab,
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl PatternLabel {
    pub const ALL: [PatternLabel; 5] = [
        PatternLabel::Abcd,
        PatternLabel::Aabc,
        PatternLabel::Aabb,
        PatternLabel::Aaab,
        PatternLabel::Aaaa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternLabel::Abcd => "ABCD",
            PatternLabel::Aabc => "AABC",
            PatternLabel::Aabb => "AABB",
            PatternLabel::Aaab => "AAAB",
            PatternLabel::Aaaa => "AAAA",
        }
    }

    /// Nombre d'ordres distincts du multiensemble.
    pub fn ways(&self) -> u32 {
        match self {
            PatternLabel::Abcd => 24,
            PatternLabel::Aabc => 12,
            PatternLabel::Aabb => 6,
            PatternLabel::Aaab => 4,
            PatternLabel::Aaaa => 1,
        }
    }

    /// Part du motif parmi les 10 000 combinaisons possibles.
    pub fn theoretical_pct(&self) -> f64 {
        let combos = match self {
            PatternLabel::Abcd => 5040,
            PatternLabel::Aabc => 4320,
            PatternLabel::Aabb => 270,
            PatternLabel::Aaab => 360,
            PatternLabel::Aaaa => 10,
        };
        f64::from(combos) / 100.0
    }

    pub fn description(&self) -> &'static str {
        match self {
            PatternLabel::Abcd => "Tous différents (24-way)",
            PatternLabel::Aabc => "Une paire (12-way)",
            PatternLabel::Aabb => "Deux paires (6-way)",
            PatternLabel::Aaab => "Triple (4-way)",
            PatternLabel::Aaaa => "Quadruple (1-way)",
        }
    }
}

impl fmt::Display for PatternLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        PatternLabel::ALL
            .into_iter()
            .find(|p| p.as_str() == upper)
            .ok_or_else(|| format!("motif inconnu '{}' (ABCD, AABC, AABB, AAAB, AAAA)", s.trim()))
    }
}

/// Multiplicités des chiffres distincts, triées par ordre décroissant.
/// Calculées sur les chiffres triés en comparant les voisins.
pub fn multiplicities(combo: Combo) -> Vec<u8> {
    let sorted = combo.signature().digits();
    let mut runs = Vec::with_capacity(4);
    let mut run = 1u8;
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] {
            run += 1;
        } else {
            runs.push(run);
            run = 1;
        }
    }
    runs.push(run);
    runs.sort_unstable_by(|a, b| b.cmp(a));
    runs
}

pub fn pattern_label(combo: Combo) -> PatternLabel {
    match multiplicities(combo).as_slice() {
        [4] => PatternLabel::Aaaa,
        [3, 1] => PatternLabel::Aaab,
        [2, 2] => PatternLabel::Aabb,
        [2, 1, 1] => PatternLabel::Aabc,
        _ => PatternLabel::Abcd,
    }
}

fn factorial(n: u8) -> u32 {
    (1..=u32::from(n)).product()
}

/// 4! / ∏ multiplicité! (coefficient multinomial).
pub fn box_ways(combo: Combo) -> u32 {
    let denominator: u32 = multiplicities(combo).into_iter().map(factorial).product();
    24 / denominator
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoxType {
    pub label: PatternLabel,
    pub ways: u32,
    pub signature: Combo,
}

pub fn box_type(combo: Combo) -> BoxType {
    BoxType {
        label: pattern_label(combo),
        ways: box_ways(combo),
        signature: combo.signature(),
    }
}

pub fn box_type_for(input: &str) -> Result<BoxType, ValidationError> {
    Ok(box_type(input.parse()?))
}

/// Tirage enrichi. Tous les champs dérivent de `draw.combo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedDraw {
    pub draw: Draw,
    pub digits: [u8; 4],
    pub digit_sum: u8,
    pub signature: Combo,
    pub pattern: PatternLabel,
    pub box_ways: u32,
    pub is_mirror_ends: bool,
    pub is_mirror_middle: bool,
    pub is_palindrome: bool,
    pub has_repeat: bool,
}

impl DerivedDraw {
    pub fn from_draw(draw: Draw) -> Self {
        let combo = draw.combo;
        let digits = combo.digits();
        let is_mirror_ends = digits[0] == digits[3];
        let is_mirror_middle = digits[1] == digits[2];
        let bt = box_type(combo);
        Self {
            digits,
            digit_sum: combo.digit_sum(),
            signature: bt.signature,
            pattern: bt.label,
            box_ways: bt.ways,
            is_mirror_ends,
            is_mirror_middle,
            is_palindrome: is_mirror_ends && is_mirror_middle,
            has_repeat: bt.label != PatternLabel::Abcd,
            draw,
        }
    }

    pub fn combo(&self) -> Combo {
        self.draw.combo
    }

    pub fn date(&self) -> NaiveDate {
        self.draw.draw_date
    }

    pub fn draw_type(&self) -> DrawType {
        self.draw.draw_type
    }

    pub fn chrono_key(&self) -> (NaiveDate, DrawType) {
        self.draw.chrono_key()
    }
}

pub fn add_features(draws: &[Draw]) -> Vec<DerivedDraw> {
    draws.iter().cloned().map(DerivedDraw::from_draw).collect()
}
