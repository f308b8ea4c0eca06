//! Merge engine: group rows on the unifying field and collapse each group
//!
//! The pipeline is load, concatenate, group, unify, write. Everything is
//! held in memory until the output is written, so configuration errors
//! surface before any output file exists.

use crate::error::{Error, Result};
use crate::format::{Delimiter, LineEnding, TableFormat};
use crate::key::{comparison_key, group_key, GroupKey};
use crate::report::{ConflictRecord, MergeReport, Warning};
use crate::table::{concat_tables, normalize_column_name, CellValue, Column, Row, Table};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the column appended to every output
pub const REMARKS_COLUMN: &str = "remarks";

/// Settings for one merge run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Column whose value decides which rows belong together
    pub unifying_field: String,
    /// Compare values ignoring case and separator characters
    pub fuzzy_merge: bool,
    /// Delimiter of every input file
    pub input_format: Delimiter,
    /// Delimiter of the output file
    pub output_format: Delimiter,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            unifying_field: "specimenid".to_string(),
            fuzzy_merge: false,
            input_format: Delimiter::Tab,
            output_format: Delimiter::Tab,
        }
    }
}

impl MergeConfig {
    /// Exact-mode tab-to-tab config for the given field
    pub fn new(unifying_field: impl Into<String>) -> Self {
        Self {
            unifying_field: unifying_field.into(),
            ..Self::default()
        }
    }

    /// Set fuzzy comparison
    pub fn fuzzy(mut self, fuzzy_merge: bool) -> Self {
        self.fuzzy_merge = fuzzy_merge;
        self
    }

    /// Set input and output delimiters
    pub fn formats(mut self, input: Delimiter, output: Delimiter) -> Self {
        self.input_format = input;
        self.output_format = output;
        self
    }

    /// The unifying field as it appears among normalized columns
    pub fn field_name(&self) -> String {
        normalize_column_name(&self.unifying_field)
    }
}

/// Remark attached to every row of a group that could not be merged
pub fn conflict_remark(field_name: &str) -> String {
    format!(
        "Rows for this {} not merged due to multiple occurrences with non-identical content in one table",
        field_name
    )
}

/// Rows sharing a group key, as indices into the table's rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// The computed key (normalized in fuzzy mode)
    pub key: GroupKey,
    /// Row indices in input order
    pub rows: Vec<usize>,
}

impl Group {
    /// Number of rows in the group
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the group has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Partition rows by the key of the cell at `field_index`.
///
/// Groups come out in order of first appearance of their key. All rows with
/// a null key end up in one group.
pub fn group_rows(table: &Table, field_index: usize, fuzzy: bool) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut by_key: HashMap<GroupKey, usize> = HashMap::new();

    for (row_idx, row) in table.rows.iter().enumerate() {
        let key = row
            .get(field_index)
            .and_then(|cell| group_key(cell, fuzzy));

        match by_key.entry(key) {
            Entry::Occupied(entry) => groups[*entry.get()].rows.push(row_idx),
            Entry::Vacant(entry) => {
                groups.push(Group {
                    key: entry.key().clone(),
                    rows: vec![row_idx],
                });
                entry.insert(groups.len() - 1);
            }
        }
    }

    groups
}

/// Result of unifying one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unified {
    /// One value (or null) per column
    Merged(Vec<CellValue>),
    /// Names of the columns holding non-equivalent values
    Conflict { columns: Vec<String> },
}

/// Collapse a group into one row, column by column.
///
/// Nulls are ignored. The first non-null value in row order is the result
/// for a column if every other non-null value compares equal to it (after
/// fuzzy normalization when `fuzzy` is set). A single disagreeing column
/// makes the whole group a conflict.
pub fn unify_group(table: &Table, group: &Group, fuzzy: bool) -> Unified {
    let mut merged = Vec::with_capacity(table.column_count());
    let mut conflicting = Vec::new();

    for column in &table.columns {
        let mut values = group
            .rows
            .iter()
            .filter_map(|&r| table.rows[r].get(column.index))
            .filter_map(CellValue::as_str);

        let Some(canonical) = values.next() else {
            merged.push(CellValue::Empty);
            continue;
        };

        let target = comparison_key(canonical, fuzzy);
        if values.all(|v| comparison_key(v, fuzzy) == target) {
            merged.push(CellValue::Text(canonical.to_string()));
        } else {
            conflicting.push(column.name.clone());
        }
    }

    if conflicting.is_empty() {
        Unified::Merged(merged)
    } else {
        Unified::Conflict {
            columns: conflicting,
        }
    }
}

/// A merged table ready to be written, with its report
#[derive(Debug, Clone)]
pub struct MergedTable {
    /// Input columns plus `remarks`
    pub table: Table,
    pub report: MergeReport,
}

/// Merge an already loaded (and concatenated) table in memory
pub fn merge_table(table: &Table, config: &MergeConfig) -> Result<MergedTable> {
    let field = config.field_name();
    let field_index = table
        .find_column(&field)
        .map(|c| c.index)
        .ok_or_else(|| Error::UnifyingFieldMissing {
            field: field.clone(),
            path: table.sources.first().cloned().unwrap_or_default(),
        })?;

    let groups = group_rows(table, field_index, config.fuzzy_merge);
    debug!(
        "{} rows fell into {} groups on '{}'",
        table.row_count(),
        groups.len(),
        field
    );

    let mut columns = table.columns.clone();
    columns.push(Column::new(REMARKS_COLUMN.to_string(), columns.len()));

    let remark = CellValue::Text(conflict_remark(&field));
    let mut rows = Vec::with_capacity(table.row_count());
    let mut conflicts = Vec::new();
    let mut warnings = Vec::new();

    for group in &groups {
        if group.key.is_none() {
            warnings.push(Warning::NullKeys { rows: group.len() });
        }

        match unify_group(table, group, config.fuzzy_merge) {
            Unified::Merged(mut cells) => {
                cells.push(CellValue::Empty);
                rows.push(Row {
                    cells,
                    origin: table.rows[group.rows[0]].origin,
                });
            }
            Unified::Conflict { columns: differing } => {
                let first = &table.rows[group.rows[0]];
                let mut sources: Vec<PathBuf> = Vec::new();

                for &r in &group.rows {
                    let original = &table.rows[r];
                    let mut cells = original.cells.clone();
                    cells.push(remark.clone());
                    rows.push(Row {
                        cells,
                        origin: original.origin,
                    });

                    if let Some(source) = table.source_of(original) {
                        if !sources.contains(source) {
                            sources.push(source.clone());
                        }
                    }
                }

                debug!(
                    "group {:?} not merged, columns differ: {}",
                    group.key,
                    differing.join(", ")
                );
                conflicts.push(ConflictRecord {
                    key: first
                        .get(field_index)
                        .and_then(CellValue::as_str)
                        .map(str::to_string),
                    rows: group.len(),
                    columns: differing,
                    sources,
                });
            }
        }
    }

    let report = MergeReport {
        inputs: table.sources.clone(),
        output: None,
        unifying_field: field,
        fuzzy_merge: config.fuzzy_merge,
        rows_read: table.row_count(),
        rows_written: rows.len(),
        groups: groups.len(),
        merged_groups: groups.len() - conflicts.len(),
        conflicts,
        warnings,
        finished_at: Utc::now(),
    };

    let mut merged = Table::new(PathBuf::new());
    merged.columns = columns;
    merged.rows = rows;
    merged.sources = table.sources.clone();
    merged.lossy_decode = table.lossy_decode;

    Ok(MergedTable {
        table: merged,
        report,
    })
}

/// Load every input and concatenate them.
///
/// Each input must contain the unifying field. A pre-existing `remarks`
/// column is dropped so the output's own can take its place.
pub fn load_inputs<P: AsRef<Path>>(
    inputs: &[P],
    format: &dyn TableFormat,
    config: &MergeConfig,
) -> Result<(Table, Vec<Warning>)> {
    if inputs.is_empty() {
        return Err(Error::NoInputs);
    }

    let field = config.field_name();
    let mut tables = Vec::with_capacity(inputs.len());
    let mut warnings = Vec::new();

    for path in inputs {
        let path = path.as_ref();
        debug!("loading {} as {}", path.display(), format.label());

        let mut table = format.load_table(path)?;

        if table.lossy_decode {
            warnings.push(Warning::LossyDecode {
                path: path.to_path_buf(),
            });
        }
        if table.drop_column(REMARKS_COLUMN) {
            warnings.push(Warning::RemarksColumnReplaced {
                path: path.to_path_buf(),
            });
        }
        if table.find_column(&field).is_none() {
            return Err(Error::UnifyingFieldMissing {
                field,
                path: path.to_path_buf(),
            });
        }

        tables.push(table);
    }

    Ok((concat_tables(tables), warnings))
}

fn load_and_merge<P: AsRef<Path>>(inputs: &[P], config: &MergeConfig) -> Result<MergedTable> {
    let input_format = config.input_format.format();
    let (table, mut warnings) = load_inputs(inputs, &input_format, config)?;

    let mut merged = merge_table(&table, config)?;
    warnings.append(&mut merged.report.warnings);
    for warning in &warnings {
        warn!("{}", warning);
    }
    merged.report.warnings = warnings;

    Ok(merged)
}

/// Merge `inputs` into the file at `output`, using the platform line ending
pub fn merge<P: AsRef<Path>>(
    inputs: &[P],
    output: &Path,
    config: &MergeConfig,
) -> Result<MergeReport> {
    let merged = load_and_merge(inputs, config)?;

    config
        .output_format
        .format()
        .save_table(output, &merged.table)?;
    info!(
        "wrote {} rows to {}",
        merged.report.rows_written,
        output.display()
    );

    let mut report = merged.report;
    report.output = Some(output.to_path_buf());
    report.finished_at = Utc::now();
    Ok(report)
}

/// Merge `inputs` into a stream, using `\n` line endings
pub fn merge_to_writer<P: AsRef<Path>>(
    inputs: &[P],
    writer: &mut dyn Write,
    config: &MergeConfig,
) -> Result<MergeReport> {
    let merged = load_and_merge(inputs, config)?;

    config.output_format.format().write_table(
        writer,
        &merged.table,
        LineEnding::Lf,
        Path::new("<stream>"),
    )?;

    let mut report = merged.report;
    report.finished_at = Utc::now();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse(content: &str, source: &str) -> Table {
        Delimiter::Tab
            .format()
            .read_table(content, Path::new(source))
            .unwrap()
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn cells(table: &Table, row: usize) -> Vec<String> {
        table.rows[row]
            .cells
            .iter()
            .map(CellValue::to_string_value)
            .collect()
    }

    #[test]
    fn test_unique_keys_pass_through() {
        let table = parse("id\tspecies\n1\tA\n2\tB\n3\t\n", "a.tsv");

        let merged = merge_table(&table, &MergeConfig::new("id")).unwrap();

        assert_eq!(merged.table.column_names(), vec!["id", "species", "remarks"]);
        assert_eq!(merged.table.row_count(), 3);
        assert_eq!(cells(&merged.table, 0), vec!["1", "A", ""]);
        assert_eq!(cells(&merged.table, 2), vec!["3", "", ""]);
        assert!(merged.report.conflicts.is_empty());
        assert_eq!(merged.report.merged_groups, 3);
    }

    #[test]
    fn test_exact_conflict_keeps_every_row() {
        let table = parse("id\tspecies\n1\tA\n1\tB\n", "a.tsv");

        let merged = merge_table(&table, &MergeConfig::new("id")).unwrap();

        let remark = conflict_remark("id");
        assert_eq!(merged.table.row_count(), 2);
        assert_eq!(cells(&merged.table, 0), vec!["1", "A", remark.as_str()]);
        assert_eq!(cells(&merged.table, 1), vec!["1", "B", remark.as_str()]);

        let conflict = &merged.report.conflicts[0];
        assert_eq!(conflict.key.as_deref(), Some("1"));
        assert_eq!(conflict.rows, 2);
        assert_eq!(conflict.columns, vec!["species".to_string()]);
        assert_eq!(conflict.sources, vec![PathBuf::from("a.tsv")]);
    }

    #[test]
    fn test_nulls_never_conflict() {
        let table = parse("id\tspecies\n1\tA\n1\t\n", "a.tsv");

        let merged = merge_table(&table, &MergeConfig::new("id")).unwrap();

        assert_eq!(merged.table.row_count(), 1);
        assert_eq!(cells(&merged.table, 0), vec!["1", "A", ""]);
    }

    #[test]
    fn test_all_null_column_stays_null() {
        let table = parse("id\tspecies\tnotes\n1\tA\t\n1\tA\t\n", "a.tsv");

        let merged = merge_table(&table, &MergeConfig::new("id")).unwrap();

        assert_eq!(merged.table.rows[0].cells[2], CellValue::Empty);
    }

    #[test]
    fn test_fuzzy_keys_group_together() {
        let table = parse("id\tloc\nSpec-01\tX\nspec 01\tX\nSPEC_01\tX\n", "a.tsv");

        let exact = merge_table(&table, &MergeConfig::new("id")).unwrap();
        assert_eq!(exact.report.groups, 3);
        assert_eq!(exact.table.row_count(), 3);

        let fuzzy = merge_table(&table, &MergeConfig::new("id").fuzzy(true)).unwrap();
        assert_eq!(fuzzy.report.groups, 1);
        assert_eq!(fuzzy.table.row_count(), 1);
        // The group is labelled with the first row's raw value
        assert_eq!(cells(&fuzzy.table, 0), vec!["Spec-01", "X", ""]);
    }

    #[test]
    fn test_fuzzy_column_unification() {
        let table = parse(
            "id\tlocality\n1\tRio de Janeiro\n1\trio-de-janeiro\n",
            "a.tsv",
        );
        let config = MergeConfig::new("id").fuzzy(true);

        let merged = merge_table(&table, &config).unwrap();
        assert_eq!(merged.table.row_count(), 1);
        assert_eq!(cells(&merged.table, 0), vec!["1", "Rio de Janeiro", ""]);

        let table = parse(
            "id\tlocality\n1\tRio de Janeiro\n1\trio-de-janeiro\n1\tSao Paulo\n",
            "a.tsv",
        );
        let merged = merge_table(&table, &config).unwrap();
        assert_eq!(merged.table.row_count(), 3);
        assert_eq!(cells(&merged.table, 1)[1], "rio-de-janeiro");
        assert_eq!(merged.report.conflicts[0].columns, vec!["locality".to_string()]);
    }

    #[test]
    fn test_conflict_in_one_column_unmerges_group() {
        let table = parse("id\ta\tb\n1\tsame\tx\n1\tsame\ty\n2\tq\tz\n", "a.tsv");

        let merged = merge_table(&table, &MergeConfig::new("id")).unwrap();

        assert_eq!(merged.table.row_count(), 3);
        assert_eq!(merged.report.merged_groups, 1);
        assert_eq!(merged.report.conflicted_groups(), 1);
        assert_eq!(cells(&merged.table, 2), vec!["2", "q", "z", ""]);
    }

    #[test]
    fn test_null_keys_form_one_group() {
        let table = parse("id\tloc\n\tX\n1\tY\n\tX\n", "a.tsv");

        let merged = merge_table(&table, &MergeConfig::new("id")).unwrap();

        assert_eq!(merged.report.groups, 2);
        assert_eq!(cells(&merged.table, 0), vec!["", "X", ""]);
        assert_eq!(merged.report.warnings, vec![Warning::NullKeys { rows: 2 }]);
    }

    #[test]
    fn test_groups_in_first_appearance_order() {
        let table = parse("id\n3\n1\n3\n2\n1\n", "a.tsv");

        let groups = group_rows(&table, 0, false);

        let keys: Vec<_> = groups.iter().map(|g| g.key.clone().unwrap()).collect();
        assert_eq!(keys, vec!["3", "1", "2"]);
        assert_eq!(groups[0].rows, vec![0, 2]);
        assert_eq!(groups[1].rows, vec![1, 4]);
    }

    #[test]
    fn test_unify_singleton_never_conflicts() {
        let table = parse("id\tloc\n1\tX\n", "a.tsv");
        let group = Group {
            key: Some("1".to_string()),
            rows: vec![0],
        };

        assert_eq!(
            unify_group(&table, &group, true),
            Unified::Merged(vec![text("1"), text("X")])
        );
    }

    #[test]
    fn test_row_count_conservation() {
        let table = parse(
            "id\tloc\n1\tX\n1\tY\n2\tA\n2\tA\n2\t\n3\tB\n4\tC\n4\tD\n4\tC\n",
            "a.tsv",
        );

        let merged = merge_table(&table, &MergeConfig::new("id")).unwrap();

        let conflicted_rows: usize = merged.report.conflicts.iter().map(|c| c.rows).sum();
        assert_eq!(
            merged.table.row_count(),
            merged.report.merged_groups + conflicted_rows
        );
        assert_eq!(merged.table.row_count(), 2 + 1 + 1 + 3);
    }

    #[test]
    fn test_field_matched_case_insensitively() {
        let table = parse("SpecimenID\tloc\nS1\tX\n", "a.tsv");

        let merged = merge_table(&table, &MergeConfig::new("SPECIMENID")).unwrap();

        assert_eq!(merged.report.unifying_field, "specimenid");
    }

    #[test]
    fn test_missing_field_is_config_error() {
        let table = parse("id\tloc\n1\tX\n", "a.tsv");

        let err = merge_table(&table, &MergeConfig::new("species")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(matches!(err, Error::UnifyingFieldMissing { .. }));
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: MergeConfig =
            serde_json::from_str(r#"{"unifying_field": "species", "output_format": "csv"}"#)
                .unwrap();

        assert_eq!(config.unifying_field, "species");
        assert!(!config.fuzzy_merge);
        assert_eq!(config.input_format, Delimiter::Tab);
        assert_eq!(config.output_format, Delimiter::Comma);
    }

    #[test]
    fn test_conflict_remark_text() {
        assert_eq!(
            conflict_remark("specimenid"),
            "Rows for this specimenid not merged due to multiple occurrences with non-identical content in one table"
        );
    }
}
