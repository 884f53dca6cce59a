//! Row classification and taxon key construction
//!
//! Every rule that decides whether an input row describes a wildlife
//! observation, and which taxon it belongs to, lives here. Both passes call
//! these functions so that a row is classified identically each time.
//!
//! Normalization trims the raw value and treats the sentinel tokens in
//! [`ABSENT_TOKENS`] as absent. The common name additionally treats the
//! placeholder `empty` as absent. Case is preserved everywhere: two values
//! that differ only by letter case are different taxa.

use crate::constants::{
    ABSENT_TOKENS, COMMON_NAME_ABSENT_TOKENS, RANK_COUNT, TAXONOMY_RANKS,
};
use crate::models::{ObservationRow, Taxon, TaxonKey};

/// Normalize a raw value: trimmed and non-empty, or `None` if absent
pub fn normalize_field(value: &str) -> Option<&str> {
    normalize_with(value, ABSENT_TOKENS)
}

/// Normalize a common name, which also treats `empty` as absent
pub fn normalize_common_name(value: &str) -> Option<&str> {
    normalize_with(value, COMMON_NAME_ABSENT_TOKENS)
}

fn normalize_with<'a>(value: &'a str, absent_tokens: &[&str]) -> Option<&'a str> {
    let trimmed = value.trim();
    if absent_tokens
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
    {
        None
    } else {
        Some(trimmed)
    }
}

/// Check whether a row describes a wildlife observation
///
/// True when at least one hierarchy rank is present, or the common name is
/// present and not the `empty` placeholder.
pub fn is_wildlife_row(row: &ObservationRow) -> bool {
    row.ranks.iter().any(|value| normalize_field(value).is_some())
        || normalize_common_name(&row.common_name).is_some()
}

/// Build the composite taxon key for a row
pub fn taxon_key(row: &ObservationRow) -> TaxonKey {
    TaxonKey::new(std::array::from_fn(|index| {
        let value = if index < RANK_COUNT {
            normalize_field(&row.ranks[index])
        } else {
            normalize_common_name(&row.common_name)
        };
        value.unwrap_or_default().to_string()
    }))
}

/// Find the most specific rank present on a row
///
/// Scans from variety up to kingdom and returns the first present
/// `(rank, value)`. Returns `None` when no rank is present, which only
/// happens for rows that qualify through their common name alone.
pub fn most_specific(row: &ObservationRow) -> Option<(&'static str, &str)> {
    TAXONOMY_RANKS
        .iter()
        .zip(row.ranks.iter())
        .rev()
        .find_map(|(rank, value)| normalize_field(value).map(|v| (*rank, v)))
}

/// Materialize the taxon record for a wildlife row
pub fn taxon_from_row(row: &ObservationRow) -> Taxon {
    let ranks = std::array::from_fn(|index| normalize_field(&row.ranks[index]).map(str::to_string));
    let (most_specific_level, most_specific_name) = match most_specific(row) {
        Some((rank, value)) => (Some(rank.to_string()), Some(value.to_string())),
        None => (None, None),
    };

    Taxon {
        ranks,
        common_name: normalize_common_name(&row.common_name).map(str::to_string),
        most_specific_level,
        most_specific_name,
    }
}

/// Frame index used to order images within a sequence
///
/// Missing or unparseable values sort first as frame 0. Integral decimals
/// such as `2.0` (common in spreadsheet exports) are accepted; exponent
/// forms and values outside the `i64` range are not.
pub fn frame_index(row: &ObservationRow) -> i64 {
    let Some(value) = normalize_field(&row.frame_num) else {
        return 0;
    };

    if let Ok(frame) = value.parse::<i64>() {
        return frame;
    }

    match value.split_once('.') {
        Some((whole, fraction))
            if !whole.is_empty()
                && !fraction.is_empty()
                && whole.bytes().all(|b| b.is_ascii_digit())
                && fraction.bytes().all(|b| b == b'0') =>
        {
            whole.parse::<i64>().unwrap_or(0)
        }
        _ => 0,
    }
}
