//! Filter/sort pipeline over a process snapshot.
//!
//! A [`Selection`] bundles the filters (AND-composed), the sort order, the
//! result limit and the column projection. The CLI list view, the kill
//! preview and the kill executor all go through [`Selection::select`], so the
//! same request always yields the same records.

use glob::Pattern;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::SelectionError;
use crate::process::classifier::{display_status, is_high_memory, is_orphan, Classifier};
use crate::process::record::ProcessRecord;

/// Default floor of the `min-memory` filter.
pub const DEFAULT_MIN_MEMORY_MB: f64 = 5.0;

// -------------------------------------------------------------------------
// Filters
// -------------------------------------------------------------------------

/// Named filter presets shared by every front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPreset {
    Orphans,
    Killable,
    HighMemory,
    Stale,
}

impl FilterPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterPreset::Orphans => "orphans",
            FilterPreset::Killable => "killable",
            FilterPreset::HighMemory => "high-memory",
            FilterPreset::Stale => "stale",
        }
    }
}

impl FromStr for FilterPreset {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "orphans" | "orphan" => Ok(FilterPreset::Orphans),
            "killable" => Ok(FilterPreset::Killable),
            "high-memory" | "high_memory" | "highmem" => Ok(FilterPreset::HighMemory),
            "stale" => Ok(FilterPreset::Stale),
            other => Err(SelectionError::UnknownFilter(other.to_string())),
        }
    }
}

impl fmt::Display for FilterPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Working-directory matcher: exact path, or glob when the argument carries
/// wildcard characters.
#[derive(Debug, Clone, PartialEq)]
pub enum CwdMatcher {
    Exact(String),
    Glob(Pattern),
}

fn trim_trailing_slashes(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

impl CwdMatcher {
    /// Builds a matcher; with no argument it matches the invoking process's
    /// own working directory.
    pub fn parse(arg: Option<&str>) -> Result<Self, SelectionError> {
        let arg = arg.map(str::trim).filter(|a| !a.is_empty());
        let Some(arg) = arg else {
            let here = std::env::current_dir()
                .map_err(|e| SelectionError::CurrentDirUnavailable(e.to_string()))?;
            return Ok(CwdMatcher::Exact(
                trim_trailing_slashes(&here.to_string_lossy()).to_string(),
            ));
        };

        if arg.contains(['*', '?', '[']) {
            let pattern = Pattern::new(arg).map_err(|e| SelectionError::InvalidCwdPattern {
                pattern: arg.to_string(),
                reason: e.msg.to_string(),
            })?;
            Ok(CwdMatcher::Glob(pattern))
        } else {
            Ok(CwdMatcher::Exact(trim_trailing_slashes(arg).to_string()))
        }
    }

    /// An unreadable (empty) cwd never matches.
    pub fn matches(&self, cwd: &str) -> bool {
        if cwd.is_empty() {
            return false;
        }
        match self {
            CwdMatcher::Exact(path) => trim_trailing_slashes(cwd) == path.as_str(),
            CwdMatcher::Glob(pattern) => pattern.matches(cwd),
        }
    }
}

/// One predicate over a [`ProcessRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Orphans,
    Killable,
    HighMemory { threshold_mb: f64 },
    MinMemory { min_mb: f64 },
    Cwd(CwdMatcher),
    Stale,
}

fn check_threshold(value: f64) -> Result<f64, SelectionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SelectionError::InvalidThreshold(value))
    }
}

impl Filter {
    pub fn high_memory(threshold_mb: f64) -> Result<Self, SelectionError> {
        Ok(Filter::HighMemory {
            threshold_mb: check_threshold(threshold_mb)?,
        })
    }

    pub fn min_memory(min_mb: f64) -> Result<Self, SelectionError> {
        Ok(Filter::MinMemory {
            min_mb: check_threshold(min_mb)?,
        })
    }

    pub fn cwd(arg: Option<&str>) -> Result<Self, SelectionError> {
        Ok(Filter::Cwd(CwdMatcher::parse(arg)?))
    }

    /// Expands a preset; `high-memory` uses `threshold_mb`.
    pub fn from_preset(preset: FilterPreset, threshold_mb: f64) -> Result<Self, SelectionError> {
        match preset {
            FilterPreset::Orphans => Ok(Filter::Orphans),
            FilterPreset::Killable => Ok(Filter::Killable),
            FilterPreset::HighMemory => Filter::high_memory(threshold_mb),
            FilterPreset::Stale => Ok(Filter::Stale),
        }
    }

    pub fn matches(&self, classifier: &Classifier, p: &ProcessRecord) -> bool {
        match self {
            Filter::Orphans => is_orphan(p),
            Filter::Killable => classifier.is_killable(p),
            Filter::HighMemory { threshold_mb } => is_high_memory(p, *threshold_mb),
            Filter::MinMemory { min_mb } => p.rss_mb >= *min_mb,
            Filter::Cwd(matcher) => matcher.matches(&p.cwd),
            Filter::Stale => p.exe_deleted,
        }
    }

    /// Whether this filter narrows a selection down to intended targets. The
    /// memory floor alone only suppresses noise.
    pub fn selects_targets(&self) -> bool {
        !matches!(self, Filter::MinMemory { .. })
    }
}

// -------------------------------------------------------------------------
// Sorting
// -------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Memory,
    Cpu,
    Pid,
    Name,
    Cwd,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Memory => "memory",
            SortField::Cpu => "cpu",
            SortField::Pid => "pid",
            SortField::Name => "name",
            SortField::Cwd => "cwd",
        }
    }

    /// Ascending comparison on this field alone.
    fn compare(&self, a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
        match self {
            SortField::Memory => a.rss_mb.total_cmp(&b.rss_mb),
            SortField::Cpu => a.cpu_percent.total_cmp(&b.cpu_percent),
            SortField::Pid => a.pid.cmp(&b.pid),
            SortField::Name => a.name.cmp(&b.name),
            SortField::Cwd => a.cwd.cmp(&b.cwd),
        }
    }
}

impl FromStr for SortField {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" | "rss" => Ok(SortField::Memory),
            "cpu" => Ok(SortField::Cpu),
            "pid" => Ok(SortField::Pid),
            "name" => Ok(SortField::Name),
            "cwd" => Ok(SortField::Cwd),
            other => Err(SelectionError::UnknownSortField(other.to_string())),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }
}

/// Sorts in place. Equal primary keys fall back to ascending pid whatever
/// the direction.
pub fn sort_records(records: &mut [&ProcessRecord], field: SortField, order: SortOrder) {
    records.sort_by(|a, b| {
        let primary = field.compare(a, b);
        let primary = match order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| a.pid.cmp(&b.pid))
    });
}

// -------------------------------------------------------------------------
// Columns
// -------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Pid,
    Name,
    RssMb,
    CpuPercent,
    Cwd,
    Ppid,
    ParentName,
    Status,
    Cmdline,
    Username,
}

pub const ALL_COLUMNS: &[Column] = &[
    Column::Pid,
    Column::Name,
    Column::RssMb,
    Column::CpuPercent,
    Column::Cwd,
    Column::Ppid,
    Column::ParentName,
    Column::Status,
    Column::Cmdline,
    Column::Username,
];

pub const DEFAULT_COLUMNS: &[Column] = &[
    Column::Pid,
    Column::Name,
    Column::RssMb,
    Column::CpuPercent,
    Column::Cwd,
    Column::Ppid,
    Column::Status,
];

/// A projected cell, typed so JSON output keeps numbers numeric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Int(u32),
    Float(f64),
    Text(String),
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Int(v) => write!(f, "{}", v),
            ColumnValue::Float(v) => write!(f, "{:.1}", v),
            ColumnValue::Text(v) => f.write_str(v),
        }
    }
}

impl Column {
    pub fn key(&self) -> &'static str {
        match self {
            Column::Pid => "pid",
            Column::Name => "name",
            Column::RssMb => "rss_mb",
            Column::CpuPercent => "cpu_percent",
            Column::Cwd => "cwd",
            Column::Ppid => "ppid",
            Column::ParentName => "parent_name",
            Column::Status => "status",
            Column::Cmdline => "cmdline",
            Column::Username => "username",
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            Column::Pid => "PID",
            Column::Name => "Name",
            Column::RssMb => "RAM (MB)",
            Column::CpuPercent => "CPU%",
            Column::Cwd => "CWD",
            Column::Ppid => "PPID",
            Column::ParentName => "Parent",
            Column::Status => "Status",
            Column::Cmdline => "Command",
            Column::Username => "User",
        }
    }

    pub fn value(&self, p: &ProcessRecord) -> ColumnValue {
        match self {
            Column::Pid => ColumnValue::Int(p.pid),
            Column::Name => ColumnValue::Text(p.name.clone()),
            Column::RssMb => ColumnValue::Float(p.rss_mb),
            Column::CpuPercent => ColumnValue::Float(p.cpu_percent),
            Column::Cwd => ColumnValue::Text(p.cwd.clone()),
            Column::Ppid => ColumnValue::Int(p.ppid),
            Column::ParentName => ColumnValue::Text(p.parent_name.clone()),
            Column::Status => ColumnValue::Text(display_status(p)),
            Column::Cmdline => ColumnValue::Text(p.cmdline.clone()),
            Column::Username => ColumnValue::Text(p.username.clone()),
        }
    }
}

impl FromStr for Column {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        ALL_COLUMNS
            .iter()
            .copied()
            .find(|c| c.key() == key)
            .ok_or(SelectionError::UnknownColumn(key))
    }
}

/// Parses a comma-separated column list, rejecting unknown names.
pub fn parse_columns(list: &str) -> Result<Vec<Column>, SelectionError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Column::from_str)
        .collect()
}

/// One record seen through a column projection. Serializes as a map whose
/// keys follow the column order.
#[derive(Debug, Clone, Copy)]
pub struct ProjectedRow<'a> {
    pub columns: &'a [Column],
    pub record: &'a ProcessRecord,
}

impl ProjectedRow<'_> {
    pub fn values(&self) -> Vec<ColumnValue> {
        self.columns.iter().map(|c| c.value(self.record)).collect()
    }
}

impl Serialize for ProjectedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in self.columns {
            map.serialize_entry(column.key(), &column.value(self.record))?;
        }
        map.end()
    }
}

// -------------------------------------------------------------------------
// Selection
// -------------------------------------------------------------------------

/// A complete selection request.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub filters: Vec<Filter>,
    pub sort: SortField,
    pub order: SortOrder,
    pub limit: Option<usize>,
    pub columns: Vec<Column>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: SortField::default(),
            order: SortOrder::default(),
            limit: None,
            columns: DEFAULT_COLUMNS.to_vec(),
        }
    }
}

impl Selection {
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sorted_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = field;
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        if !columns.is_empty() {
            self.columns = columns;
        }
        self
    }

    /// True when at least one filter picks targets rather than just
    /// trimming noise.
    pub fn has_target_filter(&self) -> bool {
        self.filters.iter().any(Filter::selects_targets)
    }

    pub fn matches(&self, classifier: &Classifier, p: &ProcessRecord) -> bool {
        self.filters.iter().all(|f| f.matches(classifier, p))
    }

    /// Filters, sorts and limits `records`.
    pub fn select<'a>(
        &self,
        classifier: &Classifier,
        records: &'a [ProcessRecord],
    ) -> Vec<&'a ProcessRecord> {
        let mut selected: Vec<&ProcessRecord> = records
            .iter()
            .filter(|p| self.matches(classifier, p))
            .collect();
        sort_records(&mut selected, self.sort, self.order);
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }

    pub fn project<'a>(&'a self, records: &[&'a ProcessRecord]) -> Vec<ProjectedRow<'a>> {
        records
            .iter()
            .map(|&record| ProjectedRow {
                columns: &self.columns,
                record,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::record::ProcessStatus;

    fn record(pid: u32, name: &str, rss_mb: f64, cwd: &str) -> ProcessRecord {
        ProcessRecord {
            pid,
            ppid: 1,
            name: name.to_string(),
            cmdline: name.to_string(),
            cwd: cwd.to_string(),
            rss_mb,
            status: ProcessStatus::Sleeping,
            ..Default::default()
        }
    }

    fn pids(records: &[&ProcessRecord]) -> Vec<u32> {
        records.iter().map(|r| r.pid).collect()
    }

    #[test]
    fn test_preset_and_sort_parsing() {
        assert_eq!("High-Memory".parse::<FilterPreset>(), Ok(FilterPreset::HighMemory));
        assert_eq!("stale".parse::<FilterPreset>(), Ok(FilterPreset::Stale));
        assert!(matches!(
            "zombies".parse::<FilterPreset>(),
            Err(SelectionError::UnknownFilter(_))
        ));

        assert_eq!("rss".parse::<SortField>(), Ok(SortField::Memory));
        assert_eq!("mem".parse::<SortField>(), Ok(SortField::Memory));
        assert!(matches!(
            "age".parse::<SortField>(),
            Err(SelectionError::UnknownSortField(_))
        ));
    }

    #[test]
    fn test_parse_columns() {
        assert_eq!(
            parse_columns("pid, name,,rss_mb").expect("columns"),
            vec![Column::Pid, Column::Name, Column::RssMb]
        );
        assert_eq!(
            parse_columns("pid,bogus"),
            Err(SelectionError::UnknownColumn("bogus".to_string()))
        );
    }

    #[test]
    fn test_thresholds_are_validated() {
        assert!(Filter::high_memory(500.0).is_ok());
        assert_eq!(
            Filter::min_memory(-1.0),
            Err(SelectionError::InvalidThreshold(-1.0))
        );
        assert!(Filter::high_memory(f64::NAN).is_err());
    }

    #[test]
    fn test_cwd_exact_and_glob() {
        let exact = CwdMatcher::parse(Some("/home/u/proj/")).expect("matcher");
        assert!(exact.matches("/home/u/proj"));
        assert!(!exact.matches("/home/u/proj/sub"));
        assert!(!exact.matches(""));

        let glob = CwdMatcher::parse(Some("/home/u/*")).expect("matcher");
        assert!(matches!(glob, CwdMatcher::Glob(_)));
        assert!(glob.matches("/home/u/proj"));
        assert!(!glob.matches("/srv/app"));

        let root = CwdMatcher::parse(Some("/")).expect("matcher");
        assert!(root.matches("/"));
    }

    #[test]
    fn test_malformed_glob_is_rejected() {
        assert!(matches!(
            CwdMatcher::parse(Some("/home/[unclosed")),
            Err(SelectionError::InvalidCwdPattern { .. })
        ));
    }

    #[test]
    fn test_cwd_without_argument_uses_current_dir() {
        let here = std::env::current_dir().expect("current dir");
        let matcher = CwdMatcher::parse(None).expect("matcher");
        assert!(matcher.matches(&here.to_string_lossy()));
    }

    #[test]
    fn test_sort_ties_break_on_ascending_pid() {
        let records = vec![
            record(30, "b", 100.0, "/"),
            record(10, "a", 100.0, "/"),
            record(20, "c", 200.0, "/"),
        ];
        let mut refs: Vec<&ProcessRecord> = records.iter().collect();

        sort_records(&mut refs, SortField::Memory, SortOrder::Descending);
        assert_eq!(pids(&refs), vec![20, 10, 30]);

        sort_records(&mut refs, SortField::Memory, SortOrder::Ascending);
        assert_eq!(pids(&refs), vec![10, 30, 20]);

        sort_records(&mut refs, SortField::Name, SortOrder::Ascending);
        assert_eq!(pids(&refs), vec![10, 30, 20]);
    }

    #[test]
    fn test_name_sort_is_case_sensitive() {
        let records = vec![record(1, "beta", 1.0, "/"), record(2, "Alpha", 1.0, "/")];
        let mut refs: Vec<&ProcessRecord> = records.iter().collect();
        sort_records(&mut refs, SortField::Name, SortOrder::Ascending);
        assert_eq!(pids(&refs), vec![2, 1]);
    }

    #[test]
    fn test_select_composes_filters_and_limits() {
        let records = vec![
            record(1, "a", 700.0, "/srv/app"),
            record(2, "b", 600.0, "/home/u"),
            record(3, "c", 800.0, "/srv/app"),
            record(4, "d", 2.0, "/srv/app"),
        ];
        let selection = Selection::default()
            .with_filter(Filter::high_memory(500.0).expect("filter"))
            .with_filter(Filter::cwd(Some("/srv/app")).expect("filter"))
            .with_limit(Some(1));

        let selected = selection.select(&Classifier::default(), &records);
        assert_eq!(pids(&selected), vec![3]);
        assert!(selection.has_target_filter());
    }

    #[test]
    fn test_min_memory_alone_selects_no_targets() {
        let selection = Selection::default().with_filter(Filter::min_memory(5.0).expect("filter"));
        assert!(!selection.has_target_filter());
    }

    #[test]
    fn test_projection_keeps_column_order() {
        let mut p = record(42, "node", 12.34, "/srv");
        p.exe_deleted = true;
        let selection = Selection::default().with_columns(vec![Column::Status, Column::Pid, Column::RssMb]);
        let rows = selection.project(&[&p]);

        let json = serde_json::to_string(&rows[0]).expect("serialize");
        assert_eq!(json, r#"{"status":"stale [orphan]","pid":42,"rss_mb":12.34}"#);
        assert_eq!(rows[0].values()[2].to_string(), "12.3");
    }
}
