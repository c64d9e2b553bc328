//! Cell values and column types.
//!
//! A dataset cell is a string, an integer, a float, or missing. Values coming
//! from spreadsheets are loosely typed (a year may be `2010` in one sheet and
//! `2010.0` in another), so equality and hashing go through [`CellKey`], which
//! treats integral floats and integers as the same value.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell of a tabular dataset.
///
/// Deserializes untagged so configuration files can list plain values
/// (`allowed.year = [2018, 2019]`, `allowed.city = ["Hangzhou"]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Str(String),
    #[default]
    Missing,
}

impl CellValue {
    /// Builds a float cell, mapping NaN to missing.
    pub fn float(value: f64) -> Self {
        if value.is_nan() {
            Self::Missing
        } else {
            Self::Float(value)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Numeric view of the cell. Strings are not parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(_) | Self::Missing => None,
        }
    }

    /// Numeric view of the cell, parsing numeric-looking strings.
    pub fn to_f64_lenient(&self) -> Option<f64> {
        match self {
            Self::Str(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
            other => other.as_f64(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The column type this value belongs to, `None` for missing.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Int(_) => Some(ColumnType::Int),
            Self::Float(_) => Some(ColumnType::Float),
            Self::Str(_) => Some(ColumnType::Str),
            Self::Missing => None,
        }
    }

    /// Hashable identity used for membership tests and joins.
    pub fn key(&self) -> CellKey {
        match self {
            Self::Int(v) => CellKey::Int(*v),
            Self::Float(v) => {
                if v.fract() == 0.0 && v.abs() < 9.0e15 {
                    CellKey::Int(*v as i64)
                } else {
                    CellKey::Float(v.to_bits())
                }
            }
            Self::Str(s) => CellKey::Text(s.clone()),
            Self::Missing => CellKey::Missing,
        }
    }

    /// Natural total order: numbers (by value), then strings (lexicographic),
    /// then missing.
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        fn class(value: &CellValue) -> u8 {
            match value {
                CellValue::Int(_) | CellValue::Float(_) => 0,
                CellValue::Str(_) => 1,
                CellValue::Missing => 2,
            }
        }
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                let a = self.as_f64().unwrap_or_default();
                let b = other.as_f64().unwrap_or_default();
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            _ => class(self).cmp(&class(other)),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{v}")
                }
            }
            Self::Str(s) => f.write_str(s),
            Self::Missing => Ok(()),
        }
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::float(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

/// Hashable, equality-comparable identity of a [`CellValue`].
///
/// Integral floats collapse onto `Int`, so `2010` and `2010.0` match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellKey {
    Int(i64),
    Float(u64),
    Text(String),
    Missing,
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Self::Text(s) => f.write_str(s),
            Self::Missing => f.write_str("<missing>"),
        }
    }
}

/// Logical column type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    Str,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Infers the narrowest type holding every value.
    ///
    /// Any string makes the column a string column; any float widens an
    /// integer column. A column with no present values is a float column.
    pub fn infer<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a CellValue>,
    {
        let mut seen_int = false;
        let mut seen_float = false;
        for value in values {
            match value {
                CellValue::Str(_) => return Self::Str,
                CellValue::Float(_) => seen_float = true,
                CellValue::Int(_) => seen_int = true,
                CellValue::Missing => {}
            }
        }
        if seen_int && !seen_float {
            Self::Int
        } else {
            Self::Float
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
        };
        f.write_str(name)
    }
}

/// Types a column of raw text cells.
///
/// The column is integer if every present cell parses as `i64`, float if
/// every present cell parses as `f64`, and string otherwise. Blank cells are
/// missing. A cell with a leading zero (`0571`) is a code, not a number, and
/// keeps the whole column as strings so codes survive a round trip.
pub fn parse_text_column<S: AsRef<str>>(raw: &[S]) -> Vec<CellValue> {
    let present = || {
        raw.iter()
            .map(|cell| cell.as_ref().trim())
            .filter(|cell| !cell.is_empty())
    };
    let numeric = !present().any(has_leading_zero);
    let all_int = numeric && present().all(|cell| cell.parse::<i64>().is_ok());
    let all_float = all_int
        || (numeric && present().all(|cell| cell.parse::<f64>().is_ok_and(|v| !v.is_nan())));

    raw.iter()
        .map(|cell| {
            let trimmed = cell.as_ref().trim();
            if trimmed.is_empty() {
                CellValue::Missing
            } else if all_int {
                trimmed.parse::<i64>().map_or(CellValue::Missing, CellValue::Int)
            } else if all_float {
                trimmed.parse::<f64>().map_or(CellValue::Missing, CellValue::float)
            } else {
                CellValue::Str(cell.as_ref().to_string())
            }
        })
        .collect()
}

fn has_leading_zero(cell: &str) -> bool {
    let digits = cell.strip_prefix(['-', '+']).unwrap_or(cell);
    let mut chars = digits.chars();
    chars.next() == Some('0') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_float_and_int_share_a_key() {
        assert_eq!(CellValue::Float(2010.0).key(), CellValue::Int(2010).key());
        assert_ne!(CellValue::Float(2010.5).key(), CellValue::Int(2010).key());
        assert_ne!(CellValue::from("2010").key(), CellValue::Int(2010).key());
    }

    #[test]
    fn natural_order_puts_numbers_first_and_missing_last() {
        let mut values = vec![
            CellValue::Missing,
            CellValue::from("b"),
            CellValue::Float(2.5),
            CellValue::from("a"),
            CellValue::Int(2),
        ];
        values.sort_by(CellValue::natural_cmp);
        assert_eq!(
            values,
            vec![
                CellValue::Int(2),
                CellValue::Float(2.5),
                CellValue::from("a"),
                CellValue::from("b"),
                CellValue::Missing,
            ]
        );
    }

    #[test]
    fn nan_becomes_missing() {
        assert!(CellValue::from(f64::NAN).is_missing());
        assert_eq!(CellValue::from(Option::<i64>::None), CellValue::Missing);
    }

    #[test]
    fn infer_widens_and_falls_back_to_string() {
        let ints = [CellValue::Int(1), CellValue::Missing];
        let mixed = [CellValue::Int(1), CellValue::Float(1.5)];
        let text = [CellValue::Int(1), CellValue::from("x")];
        assert_eq!(ColumnType::infer(&ints), ColumnType::Int);
        assert_eq!(ColumnType::infer(&mixed), ColumnType::Float);
        assert_eq!(ColumnType::infer(&text), ColumnType::Str);
        assert_eq!(ColumnType::infer(&[CellValue::Missing]), ColumnType::Float);
    }

    #[test]
    fn display_drops_integral_fraction() {
        assert_eq!(CellValue::Float(20.0).to_string(), "20");
        assert_eq!(CellValue::Float(20.5).to_string(), "20.5");
        assert_eq!(CellValue::Missing.to_string(), "");
    }

    #[test]
    fn untagged_values_deserialize_from_json() {
        let values: Vec<CellValue> = serde_json::from_str(r#"[2018, 2.5, "Hangzhou"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                CellValue::Int(2018),
                CellValue::Float(2.5),
                CellValue::from("Hangzhou"),
            ]
        );
    }

    #[test]
    fn text_columns_are_typed_as_a_whole() {
        assert_eq!(
            parse_text_column(&["2018", " ", "2019"]),
            vec![CellValue::Int(2018), CellValue::Missing, CellValue::Int(2019)]
        );
        assert_eq!(
            parse_text_column(&["1", "2.5"]),
            vec![CellValue::Float(1.0), CellValue::Float(2.5)]
        );
        assert_eq!(
            parse_text_column(&["001", "abc"]),
            vec![CellValue::from("001"), CellValue::from("abc")]
        );
    }

    #[test]
    fn zero_padded_codes_stay_text() {
        assert_eq!(
            parse_text_column(&["0571", "0574"]),
            vec![CellValue::from("0571"), CellValue::from("0574")]
        );
        assert_eq!(
            parse_text_column(&["0571", "2.5"]),
            vec![CellValue::from("0571"), CellValue::from("2.5")]
        );
        assert_eq!(
            parse_text_column(&["0", "0.25", "-0.5"]),
            vec![CellValue::Float(0.0), CellValue::Float(0.25), CellValue::Float(-0.5)]
        );
    }
}
