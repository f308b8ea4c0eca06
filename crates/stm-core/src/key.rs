//! Group keys and fuzzy normalization
//!
//! The same [`fuzzy_normalize`] is used to compute fuzzy group keys and to
//! compare cell values during fuzzy unification, so the two can never
//! disagree about which values are equivalent.

use crate::table::CellValue;
use std::borrow::Cow;

/// Characters ignored by fuzzy comparison
pub const SEPARATORS: [char; 6] = ['-', ' ', '_', '.', '/', '\\'];

/// Case-fold `value` and strip every separator character.
///
/// `"Spec-01"`, `"spec 01"` and `"SPEC_01"` all become `"spec01"`. Folding
/// is the full Unicode one, so `"Straße"` matches `"STRASSE"`.
pub fn fuzzy_normalize(value: &str) -> String {
    let stripped: String = value.chars().filter(|c| !SEPARATORS.contains(c)).collect();
    caseless::default_case_fold_str(&stripped)
}

/// Key used to partition rows into groups. `None` is the null key; all
/// rows with a null unifying field share it.
pub type GroupKey = Option<String>;

/// The form of `value` that equality is checked on: the value itself in
/// exact mode, its [`fuzzy_normalize`]d form in fuzzy mode.
pub fn comparison_key(value: &str, fuzzy: bool) -> Cow<'_, str> {
    if fuzzy {
        Cow::Owned(fuzzy_normalize(value))
    } else {
        Cow::Borrowed(value)
    }
}

/// Compute the group key of a unifying-field cell
pub fn group_key(cell: &CellValue, fuzzy: bool) -> GroupKey {
    cell.as_str()
        .map(|value| comparison_key(value, fuzzy).into_owned())
}
