use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("combinaison vide")]
    Empty,
    #[error("caractère non numérique '{0}' (chiffres 0-9 uniquement)")]
    NonDigit(char),
    #[error("la combinaison doit contenir exactement 4 chiffres (reçu {0})")]
    WrongLength(usize),
    #[error("type de tirage inconnu : '{0}' (midday ou evening)")]
    UnknownDrawType(String),
}

/// Combinaison Win 4 : exactement 4 chiffres, répétitions autorisées.
/// L'ordre dérivé (chiffre par chiffre) coïncide avec l'ordre lexical de la forme texte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Combo([u8; 4]);

impl Combo {
    pub fn from_digits(digits: [u8; 4]) -> Result<Self, ValidationError> {
        for &d in &digits {
            if d > 9 {
                return Err(ValidationError::NonDigit(char::from(b'0'.saturating_add(d))));
            }
        }
        Ok(Self(digits))
    }

    pub fn digits(&self) -> [u8; 4] {
        self.0
    }

    pub fn digit(&self, position: usize) -> u8 {
        self.0[position]
    }

    /// Clé d'égalité box : les chiffres triés par ordre croissant.
    pub fn signature(&self) -> Combo {
        let mut sorted = self.0;
        sorted.sort_unstable();
        Combo(sorted)
    }

    pub fn digit_sum(&self) -> u8 {
        self.0.iter().sum()
    }

    pub fn reversed(&self) -> Combo {
        let [a, b, c, d] = self.0;
        Combo([d, c, b, a])
    }

    /// Forme canonique d'une valeur brute de l'API :
    /// troncature au point décimal, suppression des non-chiffres,
    /// complétion à gauche par des zéros, ou conservation des 4 derniers chiffres.
    /// `None` si aucun chiffre ne subsiste : jamais de "0000" par défaut.
    pub fn canonicalize(raw: &str) -> Option<Combo> {
        let trimmed = raw.trim();
        let integral = match trimmed.find('.') {
            Some(pos) => &trimmed[..pos],
            None => trimmed,
        };
        let digits: Vec<u8> = integral
            .bytes()
            .filter(u8::is_ascii_digit)
            .map(|b| b - b'0')
            .collect();
        if digits.is_empty() {
            return None;
        }

        let mut out = [0u8; 4];
        if digits.len() >= 4 {
            out.copy_from_slice(&digits[digits.len() - 4..]);
        } else {
            out[4 - digits.len()..].copy_from_slice(&digits);
        }
        Some(Combo(out))
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}{b}{c}{d}")
    }
}

/// Saisie utilisateur stricte : exactement 4 chiffres après suppression des espaces.
impl FromStr for Combo {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty);
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_digit()) {
            return Err(ValidationError::NonDigit(c));
        }
        if s.len() != 4 {
            return Err(ValidationError::WrongLength(s.len()));
        }
        let b = s.as_bytes();
        Ok(Combo([b[0] - b'0', b[1] - b'0', b[2] - b'0', b[3] - b'0']))
    }
}

impl TryFrom<String> for Combo {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Combo> for String {
    fn from(combo: Combo) -> Self {
        combo.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DrawType {
    Midday,
    Evening,
}

impl DrawType {
    pub const ALL: [DrawType; 2] = [DrawType::Midday, DrawType::Evening];

    pub fn as_str(&self) -> &'static str {
        match self {
            DrawType::Midday => "Midday",
            DrawType::Evening => "Evening",
        }
    }
}

impl fmt::Display for DrawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrawType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "midday" | "midi" => Ok(DrawType::Midday),
            "evening" | "soir" => Ok(DrawType::Evening),
            other => Err(ValidationError::UnknownDrawType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub draw_date: NaiveDate,
    pub draw_type: DrawType,
    pub combo: Combo,
    pub booster: Option<String>,
}

impl Draw {
    pub fn new(draw_date: NaiveDate, draw_type: DrawType, combo: Combo) -> Self {
        Self {
            draw_date,
            draw_type,
            combo,
            booster: None,
        }
    }

    /// Clé chronologique : date, puis Midday avant Evening.
    pub fn chrono_key(&self) -> (NaiveDate, DrawType) {
        (self.draw_date, self.draw_type)
    }
}

pub fn validate_combo(input: &str) -> Result<Combo, ValidationError> {
    input.parse()
}
