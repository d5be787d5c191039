use crate::dataset::MissingReport;

/// How the user chose to handle flagged columns before generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardAction {
    DropRows,
    KeepAll,
    Cancel,
}

/// Columns that are both mentioned in the instruction and carry missing
/// values, in dataset order.
///
/// Mention detection is a raw substring match against the instruction text,
/// so a column name contained in an unrelated word is flagged too ("age"
/// inside "average"). The guard over-warns rather than under-warns.
pub fn flagged_columns(instruction: &str, report: &MissingReport) -> Vec<String> {
    report
        .columns_with_missing()
        .filter(|c| instruction.contains(&c.name))
        .map(|c| c.name.clone())
        .collect()
}
