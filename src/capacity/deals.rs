//! CRM Deal Aggregation
//!
//! Deals are fetched page by page, following the `paging.next.after`
//! cursor until a page arrives without one. Each deal starting in the
//! target month contributes its FTE spread evenly over the months it runs.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CapacityError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One page of deal search results.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DealsPage {
    #[serde(default)]
    pub results: Vec<Deal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
}

impl DealsPage {
    /// Returns the cursor for the following page, if any.
    pub fn next_cursor(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .map(|n| n.after.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Paging {
    pub next: Option<NextPage>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NextPage {
    pub after: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Deal {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: DealProperties,
}

/// Deal properties as returned by the CRM (values are usually strings).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DealProperties {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(rename = "fte_s_", default)]
    pub fte: Option<Value>,
}

/// A paginated source of deals.
pub trait DealSource {
    /// Fetches the page following `after`, or the first page when `None`.
    fn fetch_page(&mut self, after: Option<&str>) -> Result<DealsPage, CapacityError>;
}

/// Serves pages recorded in a JSON file, in file order.
///
/// The file holds either one page object or an array of pages.
pub struct FileDealSource {
    path: PathBuf,
    pages: Option<VecDeque<DealsPage>>,
}

impl FileDealSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pages: None,
        }
    }

    fn load(&self) -> Result<VecDeque<DealsPage>, CapacityError> {
        let content = fs::read_to_string(&self.path).map_err(|source| CapacityError::Read {
            path: self.path.clone(),
            source,
        })?;

        Ok(match serde_json::from_str::<Value>(&content)? {
            Value::Array(pages) => pages
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<_, _>>()?,
            page => VecDeque::from([serde_json::from_value(page)?]),
        })
    }
}

impl DealSource for FileDealSource {
    fn fetch_page(&mut self, after: Option<&str>) -> Result<DealsPage, CapacityError> {
        if self.pages.is_none() {
            self.pages = Some(self.load()?);
        }

        debug!("Reading deals page after {:?} from {}", after, self.path.display());

        self.pages
            .as_mut()
            .and_then(VecDeque::pop_front)
            .ok_or(CapacityError::NoPages)
    }
}

/// Follows the paging cursor until exhausted and returns every deal.
pub fn collect_deals(source: &mut dyn DealSource) -> Result<Vec<Deal>, CapacityError> {
    let mut page = source.fetch_page(None)?;
    let mut deals = Vec::new();

    loop {
        let cursor = page.next_cursor().map(str::to_string);
        deals.append(&mut page.results);

        match cursor {
            Some(after) => page = source.fetch_page(Some(&after))?,
            None => break,
        }
    }

    Ok(deals)
}

/// Sums the monthly FTE of deals starting in `month`.
pub fn aggregate_deals(deals: &[Deal], month: NaiveDate) -> f64 {
    deals
        .iter()
        .filter_map(|deal| monthly_fte(&deal.properties, month))
        .sum()
}

fn monthly_fte(properties: &DealProperties, month: NaiveDate) -> Option<f64> {
    let start = parse_date(properties.start_date.as_deref()?)?;
    let end = parse_date(properties.end_date.as_deref()?)?;
    let fte = parse_number(properties.fte.as_ref()?)?;

    if start.year() != month.year() || start.month() != month.month() {
        return None;
    }

    Some(fte / months_between(start, end) as f64)
}

/// Whole calendar months from `start` to `end`, never less than one.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    months.max(1)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
