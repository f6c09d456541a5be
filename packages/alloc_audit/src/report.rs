//! Allocation audit reports.

use std::fmt;

use crate::{AllocationRecord, ReleaseAttemptRecord};

const ISSUE_WIDTH: usize = 14;

const COLUMN_TITLES: [&str; COLUMN_COUNT] = [
    "File",
    "Line",
    "Type",
    "Item Count",
    "Type Size",
    "Total Size",
];

const COLUMN_COUNT: usize = 6;

const LEAKED_ALLOC: &str = "LEAKED ALLOC";
const FAILED_ALLOC: &str = "FAILED ALLOC";
const FAILED_FREE: &str = "FAILED FREE";

/// A snapshot of the state of a [`Registry`](crate::Registry), ready to be rendered.
///
/// The rendered form (via [`Display`](fmt::Display)) starts with a one-line summary of how many
/// bytes were allocated and how many of them leaked. If anything went wrong (leaks, failed
/// allocations or releases that matched nothing) the summary is followed by a blank line and
/// a table with one row per problem: leaks first, then failed allocations, then failed
/// releases, each group in the order the events happened.
///
/// # Examples
///
/// ```
/// use alloc_audit::Registry;
///
/// let registry = Registry::system();
///
/// let data = registry.allocate::<u32>(4);
/// registry.release(data).unwrap();
///
/// let report = registry.report();
/// assert!(!report.has_issues());
/// assert_eq!(
///     report.to_string(),
///     "16 bytes allocated in total, with 0 leaked."
/// );
/// ```
#[derive(Clone, Debug)]
pub struct Report {
    leaked: Vec<AllocationRecord>,
    failed_allocations: Vec<AllocationRecord>,
    failed_releases: Vec<ReleaseAttemptRecord>,
    total_allocated_bytes: u128,
    total_leaked_bytes: u128,
}

impl Report {
    /// Creates a report from the registry lists.
    ///
    /// Released allocations only contribute to the total byte count, they are never listed.
    #[must_use]
    pub(crate) fn new<'a>(
        leaked: impl IntoIterator<Item = &'a AllocationRecord>,
        released: &[AllocationRecord],
        failed_allocations: &[AllocationRecord],
        failed_releases: &[ReleaseAttemptRecord],
    ) -> Self {
        let leaked: Vec<AllocationRecord> = leaked.into_iter().copied().collect();

        let total_leaked_bytes = sum_bytes(&leaked);
        let total_allocated_bytes = sum_bytes(released).saturating_add(total_leaked_bytes);

        Self {
            leaked,
            failed_allocations: failed_allocations.to_vec(),
            failed_releases: failed_releases.to_vec(),
            total_allocated_bytes,
            total_leaked_bytes,
        }
    }

    /// Bytes of every successful allocation, whether since released or still live.
    #[must_use]
    pub fn total_allocated_bytes(&self) -> u128 {
        self.total_allocated_bytes
    }

    /// Bytes of every allocation that is still live.
    #[must_use]
    pub fn total_leaked_bytes(&self) -> u128 {
        self.total_leaked_bytes
    }

    /// Allocations that were never released, oldest first.
    #[must_use]
    pub fn leaked(&self) -> &[AllocationRecord] {
        &self.leaked
    }

    /// Allocations the raw allocator could not satisfy, oldest first.
    #[must_use]
    pub fn failed_allocations(&self) -> &[AllocationRecord] {
        &self.failed_allocations
    }

    /// Releases that did not match any live allocation, oldest first.
    #[must_use]
    pub fn failed_releases(&self) -> &[ReleaseAttemptRecord] {
        &self.failed_releases
    }

    /// Whether the report contains anything besides the summary line.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        !self.leaked.is_empty()
            || !self.failed_allocations.is_empty()
            || !self.failed_releases.is_empty()
    }

    /// Prints the report to stdout.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        println!("{self}");
    }

    fn rows(&self) -> Vec<Row> {
        let leaked = self
            .leaked
            .iter()
            .map(|record| Row::allocation(LEAKED_ALLOC, record));

        let failed_allocations = self
            .failed_allocations
            .iter()
            .map(|record| Row::allocation(FAILED_ALLOC, record));

        let failed_releases = self.failed_releases.iter().map(Row::release);

        leaked
            .chain(failed_allocations)
            .chain(failed_releases)
            .collect()
    }
}

fn sum_bytes(records: &[AllocationRecord]) -> u128 {
    records
        .iter()
        .map(AllocationRecord::total_bytes)
        .fold(0, u128::saturating_add)
}

/// One table row with every cell already rendered.
#[derive(Debug)]
struct Row {
    issue: &'static str,
    cells: [String; COLUMN_COUNT],
}

impl Row {
    fn allocation(issue: &'static str, record: &AllocationRecord) -> Self {
        Self {
            issue,
            cells: [
                record.site().file().to_owned(),
                record.site().line().to_string(),
                record.type_name().to_owned(),
                record.count().to_string(),
                record.element_size().to_string(),
                record.total_bytes().to_string(),
            ],
        }
    }

    fn release(record: &ReleaseAttemptRecord) -> Self {
        Self {
            issue: FAILED_FREE,
            cells: [
                record.site().file().to_owned(),
                record.site().line().to_string(),
                String::new(),
                "0".to_owned(),
                "0".to_owned(),
                "0".to_owned(),
            ],
        }
    }
}

/// Width of every column: wide enough for its title and for every value in it.
fn column_widths(rows: &[Row]) -> [usize; COLUMN_COUNT] {
    let mut widths = COLUMN_TITLES.map(|title| title.chars().count());

    for row in rows {
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    widths
}

fn write_line<S: AsRef<str>>(
    f: &mut fmt::Formatter<'_>,
    issue: &str,
    cells: &[S; COLUMN_COUNT],
    widths: &[usize; COLUMN_COUNT],
) -> fmt::Result {
    write!(f, "| {issue:>width$} |", width = ISSUE_WIDTH)?;

    for (cell, width) in cells.iter().zip(widths) {
        write!(f, " {:>width$} |", cell.as_ref())?;
    }

    Ok(())
}

fn write_border(
    f: &mut fmt::Formatter<'_>,
    fill: char,
    widths: &[usize; COLUMN_COUNT],
) -> fmt::Result {
    // Everything between the two corners: the issue cell with its padding and closing bar,
    // then one padded cell and closing bar per column.
    let inner = widths.iter().fold(ISSUE_WIDTH.saturating_add(2), |acc, width| {
        acc.saturating_add(width.saturating_add(3))
    });

    f.write_str("+")?;
    for _ in 0..inner {
        write!(f, "{fill}")?;
    }
    f.write_str("+")
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes allocated in total, with {} leaked.",
            self.total_allocated_bytes, self.total_leaked_bytes
        )?;

        if !self.has_issues() {
            return Ok(());
        }

        let rows = self.rows();
        let widths = column_widths(&rows);

        f.write_str("\n\n")?;
        write_border(f, '=', &widths)?;
        f.write_str("\n")?;
        write_line(f, "Issue", &COLUMN_TITLES, &widths)?;
        f.write_str("\n")?;
        write_border(f, '-', &widths)?;
        f.write_str("\n")?;

        for row in &rows {
            write_line(f, row.issue, &row.cells, &widths)?;
            f.write_str("\n")?;
        }

        write_border(f, '=', &widths)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::CallSite;

    static_assertions::assert_impl_all!(Report: Send, Sync);

    fn record(
        file: &'static str,
        line: u32,
        count: usize,
        size: usize,
        name: &'static str,
    ) -> AllocationRecord {
        AllocationRecord::new(count, size, name, CallSite::new(file, line))
    }

    #[test]
    fn clean_report_is_single_summary_line() {
        let released = [record("main.c", 5, 2, 4, "int")];
        let report = Report::new([], &released, &[], &[]);

        assert!(!report.has_issues());
        assert_eq!(report.total_allocated_bytes(), 8);
        assert_eq!(report.total_leaked_bytes(), 0);
        assert_eq!(
            report.to_string(),
            "8 bytes allocated in total, with 0 leaked."
        );
    }

    #[test]
    fn empty_report_has_zero_totals() {
        let report = Report::new([], &[], &[], &[]);

        assert_eq!(
            report.to_string(),
            "0 bytes allocated in total, with 0 leaked."
        );
    }

    #[test]
    fn totals_combine_released_and_leaked() {
        let leaked = [record("main.c", 9, 10, 1, "char")];
        let released = [
            record("main.c", 5, 4, 4, "int"),
            record("main.c", 7, 3, 4, "int"),
        ];

        let report = Report::new(&leaked, &released, &[], &[]);

        assert_eq!(report.total_allocated_bytes(), 38);
        assert_eq!(report.total_leaked_bytes(), 10);
    }

    #[test]
    fn failed_allocations_do_not_count_as_allocated() {
        let failed = [record("main.c", 3, 1000, 8, "double")];

        let report = Report::new([], &[], &failed, &[]);

        assert!(report.has_issues());
        assert_eq!(report.total_allocated_bytes(), 0);
        assert_eq!(report.failed_allocations(), &failed);
    }

    #[test]
    fn renders_table_with_all_issue_kinds() {
        let leaked = [record("main.c", 9, 10, 1, "char")];
        let failed = [record("main.c", 3, 2, 8, "double")];
        let failed_releases = [ReleaseAttemptRecord::new(CallSite::new("main.c", 12))];

        let report = Report::new(&leaked, &[], &failed, &failed_releases);

        let expected = "\
10 bytes allocated in total, with 10 leaked.

+===============================================================================+
|          Issue |   File | Line |   Type | Item Count | Type Size | Total Size |
+-------------------------------------------------------------------------------+
|   LEAKED ALLOC | main.c |    9 |   char |         10 |         1 |         10 |
|   FAILED ALLOC | main.c |    3 | double |          2 |         8 |         16 |
|    FAILED FREE | main.c |   12 |        |          0 |         0 |          0 |
+===============================================================================+";

        assert_eq!(report.to_string(), expected);
    }

    #[test]
    fn borders_match_header_width() {
        let leaked = [record("a_rather_long_file_name.c", 123_456, 1, 1, "u8")];

        let text = Report::new(&leaked, &[], &[], &[]).to_string();
        let lines: Vec<&str> = text.lines().skip(2).collect();

        let header_width = lines.get(1).unwrap().chars().count();
        for line in &lines {
            assert_eq!(line.chars().count(), header_width, "line {line:?}");
        }
    }

    #[test]
    fn columns_grow_to_fit_values() {
        let leaked = [record("x.c", 1, 1_234_567_890, 10, "a::very::long::TypeName")];

        let text = Report::new(&leaked, &[], &[], &[]).to_string();

        assert!(text.contains("| a::very::long::TypeName |"));
        assert!(text.contains("| 1234567890 |"));
        assert!(text.contains("| 12345678900 |"));
        assert!(text.contains("|  Total Size |"));
        assert!(text.contains("|                    Type |"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let leaked = [record("main.c", 9, 10, 1, "char")];
        let report = Report::new(&leaked, &[], &[], &[]);

        assert_eq!(report.to_string(), report.to_string());
    }
}
