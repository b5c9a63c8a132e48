use std::collections::BTreeSet;
use thiserror::Error;

/// Largest residue range accepted in a single `start-end` item.
pub const MAX_RANGE_LEN: usize = 100_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error(
        "Invalid length '{0}'. Expected a number with an optional unit (e.g., '0.5nm', '5A', '5Å')."
    )]
    InvalidLength(String),

    #[error("Unknown length unit '{unit}' in '{value}'. Supported units: nm, A, Å.")]
    UnknownUnit { value: String, unit: String },

    #[error("Length must be positive, got '{0}'.")]
    NonPositiveLength(String),

    #[error(
        "Invalid residue list '{0}'. Expected comma-separated numbers or ranges (e.g., '1-10,15')."
    )]
    InvalidResidueList(String),

    #[error("Residue range '{0}' is reversed.")]
    ReversedRange(String),

    #[error("Residue range '{0}' spans more than {max} residues.", max = MAX_RANGE_LEN)]
    RangeTooLarge(String),
}

/// Parses a length and returns it in nanometres.
///
/// Accepts `nm`, `A`/`Å`/`ang` suffixes (case-insensitive) with optional
/// whitespace. A bare number is taken as nanometres.
pub fn parse_length_nm(text: &str) -> Result<f64, ParseError> {
    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| c.is_alphabetic() || c == 'Å')
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidLength(text.to_string()))?;

    let nm = match unit.trim().to_lowercase().as_str() {
        "" | "nm" => value,
        "a" | "å" | "ang" | "angstrom" => value / 10.0,
        other => {
            return Err(ParseError::UnknownUnit {
                value: text.to_string(),
                unit: other.to_string(),
            });
        }
    };

    if nm.is_finite() && nm > 0.0 {
        Ok(nm)
    } else {
        Err(ParseError::NonPositiveLength(text.to_string()))
    }
}

/// Parses a residue list such as `1-10,15,20-22`.
pub fn parse_residue_list(text: &str) -> Result<BTreeSet<isize>, ParseError> {
    let invalid = || ParseError::InvalidResidueList(text.to_string());
    let mut residues = BTreeSet::new();

    for part in text.split(',').map(str::trim) {
        if part.is_empty() {
            return Err(invalid());
        }
        // A leading '-' belongs to a negative residue number, not a range.
        match part.char_indices().skip(1).find(|&(_, c)| c == '-') {
            Some((dash, _)) => {
                let start: isize = part[..dash].trim().parse().map_err(|_| invalid())?;
                let end: isize = part[dash + 1..].trim().parse().map_err(|_| invalid())?;
                if start > end {
                    return Err(ParseError::ReversedRange(part.to_string()));
                }
                if end.abs_diff(start) >= MAX_RANGE_LEN {
                    return Err(ParseError::RangeTooLarge(part.to_string()));
                }
                residues.extend(start..=end);
            }
            None => {
                residues.insert(part.parse().map_err(|_| invalid())?);
            }
        }
    }
    Ok(residues)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn lengths_are_normalized_to_nanometres() {
        assert!((parse_length_nm("0.5").unwrap() - 0.5).abs() < TOLERANCE);
        assert!((parse_length_nm("0.5nm").unwrap() - 0.5).abs() < TOLERANCE);
        assert!((parse_length_nm("5A").unwrap() - 0.5).abs() < TOLERANCE);
        assert!((parse_length_nm("5 Å").unwrap() - 0.5).abs() < TOLERANCE);
        assert!((parse_length_nm(" 12.5 ang ").unwrap() - 1.25).abs() < TOLERANCE);
        assert!((parse_length_nm("3NM").unwrap() - 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn invalid_lengths_are_rejected() {
        assert_eq!(
            parse_length_nm("abc"),
            Err(ParseError::InvalidLength("abc".to_string()))
        );
        assert!(matches!(
            parse_length_nm("5 furlongs"),
            Err(ParseError::UnknownUnit { .. })
        ));
        assert_eq!(
            parse_length_nm("0nm"),
            Err(ParseError::NonPositiveLength("0nm".to_string()))
        );
        assert!(parse_length_nm("-1A").is_err());
    }

    #[test]
    fn residue_lists_accept_numbers_and_ranges() {
        let residues = parse_residue_list("1-3, 7,10-11").unwrap();
        assert_eq!(
            residues.into_iter().collect::<Vec<_>>(),
            vec![1, 2, 3, 7, 10, 11]
        );
    }

    #[test]
    fn residue_lists_accept_negative_numbers() {
        let residues = parse_residue_list("-2--1,-5").unwrap();
        assert_eq!(residues.into_iter().collect::<Vec<_>>(), vec![-5, -2, -1]);
    }

    #[test]
    fn malformed_residue_lists_are_rejected() {
        assert!(matches!(
            parse_residue_list("1,,2"),
            Err(ParseError::InvalidResidueList(_))
        ));
        assert!(matches!(
            parse_residue_list("a-b"),
            Err(ParseError::InvalidResidueList(_))
        ));
        assert_eq!(
            parse_residue_list("9-3"),
            Err(ParseError::ReversedRange("9-3".to_string()))
        );
    }

    #[test]
    fn non_ascii_residue_lists_are_rejected_without_panicking() {
        for text in ["Å5", "Å-5", "5-Å", "é"] {
            assert_eq!(
                parse_residue_list(text),
                Err(ParseError::InvalidResidueList(text.to_string()))
            );
        }
    }

    #[test]
    fn oversized_ranges_are_rejected() {
        let text = format!("-{0}-{0}", isize::MAX);
        assert_eq!(
            parse_residue_list(&text),
            Err(ParseError::RangeTooLarge(text.clone()))
        );
        assert_eq!(parse_residue_list("1-100000").unwrap().len(), MAX_RANGE_LEN);
        assert!(matches!(
            parse_residue_list("1-100001"),
            Err(ParseError::RangeTooLarge(_))
        ));
    }
}
