//! Forecast Export Aggregation
//!
//! The resource-planning service exports one CSV row per person and role
//! with a column of scheduled hours per month. Rows for the allowed roles
//! are converted to FTE and the distinct people among them form the
//! available capacity.

use std::collections::HashSet;

use chrono::NaiveDate;
use log::warn;

use crate::error::CapacityError;

/// Scheduled hours that make up one full-time month.
pub const HOURS_PER_FTE: f64 = 172.5;

/// Roles counted towards capacity unless configured otherwise.
pub const DEFAULT_ROLES: &[&str] = &["DK", "US inc."];

const ROLES_COLUMN: &str = "Roles";
const PERSON_COLUMN: &str = "Person";

/// FTE committed in the export and the headcount it comes from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastTotals {
    pub ftes: f64,
    pub capacity: usize,
}

/// Returns the export column holding hours for `month`, e.g. `Jan 2025`.
pub fn month_column(month: NaiveDate) -> String {
    month.format("%b %Y").to_string()
}

/// Aggregates a forecast export for `month`.
pub fn aggregate_export(
    export: &str,
    month: NaiveDate,
    roles: &[String],
) -> Result<ForecastTotals, CapacityError> {
    let mut lines = export.trim().lines();
    let header = lines.next().ok_or(CapacityError::EmptyExport)?;
    let columns = split_fields(header);

    let column = |name: &str| columns.iter().position(|c| c == name);
    let hours_label = month_column(month);

    let roles_idx = column(ROLES_COLUMN)
        .ok_or_else(|| CapacityError::MissingColumn(ROLES_COLUMN.to_string()))?;
    let hours_idx = column(&hours_label)
        .ok_or_else(|| CapacityError::MissingColumn(hours_label.clone()))?;
    let person_idx = column(PERSON_COLUMN);

    let mut ftes = 0.0;
    let mut people = HashSet::new();

    for line in lines.filter(|l| !l.trim().is_empty()) {
        let fields = split_fields(line);

        let role = fields.get(roles_idx).map(String::as_str).unwrap_or("");
        if !roles.iter().any(|r| r == role) {
            continue;
        }

        let hours = fields.get(hours_idx).map(String::as_str).unwrap_or("0");
        ftes += match hours.trim().parse::<f64>() {
            Ok(hours) => hours / HOURS_PER_FTE,
            Err(_) => {
                warn!("Invalid number for {}: '{}'", hours_label, hours);
                0.0
            }
        };

        let person = person_idx
            .and_then(|i| fields.get(i))
            .map(String::as_str)
            .unwrap_or("Unknown");
        people.insert(person.to_string());
    }

    Ok(ForecastTotals {
        ftes,
        capacity: people.len(),
    })
}

/// Splits one CSV line on commas that sit outside double quotes.
///
/// Surrounding quotes are removed and doubled quotes unescaped.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn january() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn default_roles() -> Vec<String> {
        DEFAULT_ROLES.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_month_column() {
        assert_eq!(month_column(january()), "Jan 2025");
        assert_eq!(month_column(NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()), "Nov 2024");
    }

    #[test]
    fn test_split_fields_respects_quotes() {
        assert_eq!(split_fields(r#"a,"b, c",d"#), vec!["a", "b, c", "d"]);
        assert_eq!(split_fields(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
        assert_eq!(split_fields("a,,b\r"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_aggregate_filters_roles_and_counts_people() {
        let export = "\
Person,Roles,Project,Jan 2025,Feb 2025
Alice,DK,Alpha,172.5,100
Alice,DK,Beta,86.25,0
Bob,US inc.,Alpha,172.5,0
Carol,Contractor,Alpha,172.5,0
";
        let totals = aggregate_export(export, january(), &default_roles()).unwrap();

        assert!((totals.ftes - 2.5).abs() < 1e-9);
        assert_eq!(totals.capacity, 2);
    }

    #[test]
    fn test_invalid_hours_count_as_zero() {
        let export = "Person,Roles,Jan 2025\nAlice,DK,n/a\nBob,DK,172.5\n";
        let totals = aggregate_export(export, january(), &default_roles()).unwrap();

        assert!((totals.ftes - 1.0).abs() < 1e-9);
        assert_eq!(totals.capacity, 2);
    }

    #[test]
    fn test_missing_person_column_groups_as_unknown() {
        let export = "Roles,Jan 2025\nDK,172.5\nDK,172.5\n";
        let totals = aggregate_export(export, january(), &default_roles()).unwrap();

        assert_eq!(totals.capacity, 1);
        assert!((totals.ftes - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_row_is_tolerated() {
        let export = "Person,Roles,Jan 2025\nAlice,DK\n";
        let totals = aggregate_export(export, january(), &default_roles()).unwrap();

        assert_eq!(totals.ftes, 0.0);
        assert_eq!(totals.capacity, 1);
    }

    #[test]
    fn test_missing_month_column_is_error() {
        let export = "Person,Roles,Feb 2025\nAlice,DK,10\n";
        let err = aggregate_export(export, january(), &default_roles()).unwrap_err();
        assert!(matches!(err, CapacityError::MissingColumn(ref c) if c == "Jan 2025"));
    }

    #[test]
    fn test_empty_export_is_error() {
        let err = aggregate_export("  \n", january(), &default_roles()).unwrap_err();
        assert!(matches!(err, CapacityError::EmptyExport));
    }

    #[test]
    fn test_quoted_role_matches() {
        let export = "Person,Roles,Jan 2025\n\"Doe, Jane\",\"US inc.\",172.5\n";
        let totals = aggregate_export(export, january(), &default_roles()).unwrap();

        assert_eq!(totals.capacity, 1);
    }
}
