//! Query descriptor construction.
//!
//! Every read starts from a partition-key equality on one of the table's
//! indexes and is then refined by the optional `single`, `start` and `end`
//! query parameters. Time bounds are handed to the store untouched; a
//! non-numeric bound is rejected by the store, not here.

use crate::value::{Item, StorageValue};
use std::collections::HashMap;

/// Sort key shared by the table and all of its indexes
pub const SORT_KEY: &str = "EpochTime";

/// Separator used when synthesizing composite partition keys
pub const COMPOSITE_SEPARATOR: char = '#';

const PARTITION_NAME: &str = "#pk";
const PARTITION_VALUE: &str = ":pk";
const START_VALUE: &str = ":start";
const END_VALUE: &str = ":end";

/// Path parameters captured by the router, keyed by parameter name
pub type PathParams = HashMap<String, String>;

/// Optional query string parameters shared by all read routes
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    /// Inclusive lower bound on `EpochTime`
    pub start: Option<String>,
    /// Inclusive upper bound on `EpochTime`
    pub end: Option<String>,
    /// Return only the most recent matching record
    pub single: Option<String>,
}

impl QueryParams {
    /// Collapse raw query-string pairs to one value per key.
    ///
    /// A repeated key keeps its last value. Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "start" => &mut params.start,
                "end" => &mut params.end,
                "single" => &mut params.single,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        params
    }
}

/// Restriction on the sort key, chosen by which bounds are present
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyCondition {
    Unbounded,
    AtLeast(String),
    AtMost(String),
    Between { start: String, end: String },
}

impl SortKeyCondition {
    pub fn from_bounds(start: Option<&str>, end: Option<&str>) -> Self {
        match (start, end) {
            (Some(start), Some(end)) => Self::Between {
                start: start.to_string(),
                end: end.to_string(),
            },
            (Some(start), None) => Self::AtLeast(start.to_string()),
            (None, Some(end)) => Self::AtMost(end.to_string()),
            (None, None) => Self::Unbounded,
        }
    }

    fn expression(&self) -> Option<String> {
        match self {
            Self::Unbounded => None,
            Self::AtLeast(_) => Some(format!("{SORT_KEY} >= {START_VALUE}")),
            Self::AtMost(_) => Some(format!("{SORT_KEY} <= {END_VALUE}")),
            Self::Between { .. } => Some(format!(
                "{SORT_KEY} BETWEEN {START_VALUE} AND {END_VALUE}"
            )),
        }
    }

    fn bind_values(&self, values: &mut Item) {
        match self {
            Self::Unbounded => {}
            Self::AtLeast(start) => {
                values.insert(START_VALUE.to_string(), StorageValue::N(start.clone()));
            }
            Self::AtMost(end) => {
                values.insert(END_VALUE.to_string(), StorageValue::N(end.clone()));
            }
            Self::Between { start, end } => {
                values.insert(START_VALUE.to_string(), StorageValue::N(start.clone()));
                values.insert(END_VALUE.to_string(), StorageValue::N(end.clone()));
            }
        }
    }
}

/// A single store query, mutated in place as pages are fetched
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub table_name: String,
    /// Secondary index to query; `None` queries the base table
    pub index_name: Option<String>,
    pub partition_key_name: String,
    pub partition_key_value: String,
    pub sort_condition: SortKeyCondition,
    pub limit: Option<i32>,
    /// Ascending sort-key order when true
    pub scan_forward: bool,
    /// Continuation token from the previous page
    pub exclusive_start_key: Option<Item>,
}

impl QueryDescriptor {
    /// Partition-only query: `<name> = <value>`
    pub fn new(
        table_name: impl Into<String>,
        partition_key_name: impl Into<String>,
        partition_key_value: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            index_name: None,
            partition_key_name: partition_key_name.into(),
            partition_key_value: partition_key_value.into(),
            sort_condition: SortKeyCondition::Unbounded,
            limit: None,
            scan_forward: true,
            exclusive_start_key: None,
        }
    }

    pub fn with_index(mut self, index_name: Option<String>) -> Self {
        self.index_name = index_name;
        self
    }

    /// Apply the `single` parameter.
    ///
    /// When it parses as true the query is capped at one item in descending
    /// order, i.e. the most recent record under the key condition. Returns
    /// whether single mode is on.
    pub fn evaluate_single(&mut self, params: &QueryParams) -> bool {
        let single = params
            .single
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(false);

        if single {
            self.limit = Some(1);
            self.scan_forward = false;
        }
        single
    }

    /// Apply the `start` / `end` parameters
    pub fn evaluate_time_range(&mut self, params: &QueryParams) {
        self.sort_condition =
            SortKeyCondition::from_bounds(params.start.as_deref(), params.end.as_deref());
    }

    /// Both refinements, in order
    pub fn refine(mut self, params: &QueryParams) -> Self {
        self.evaluate_single(params);
        self.evaluate_time_range(params);
        self
    }

    pub fn is_single(&self) -> bool {
        self.limit == Some(1) && !self.scan_forward
    }

    pub fn key_condition_expression(&self) -> String {
        let partition = format!("{PARTITION_NAME} = {PARTITION_VALUE}");
        match self.sort_condition.expression() {
            Some(sort) => format!("{partition} AND {sort}"),
            None => partition,
        }
    }

    pub fn expression_attribute_names(&self) -> HashMap<String, String> {
        HashMap::from([(PARTITION_NAME.to_string(), self.partition_key_name.clone())])
    }

    pub fn expression_attribute_values(&self) -> Item {
        let mut values = Item::from([(
            PARTITION_VALUE.to_string(),
            StorageValue::S(self.partition_key_value.clone()),
        )]);
        self.sort_condition.bind_values(&mut values);
        values
    }
}

/// Join two path parameters as `<first>#<second>`.
///
/// Order is significant: `("ProjectId", "DeviceId")` yields `p1#d1`, never
/// `d1#p1`. A missing parameter contributes an empty string.
pub fn composite_key(path: &PathParams, first: &str, second: &str) -> String {
    join_key(
        path.get(first).map(String::as_str).unwrap_or_default(),
        path.get(second).map(String::as_str).unwrap_or_default(),
    )
}

pub(crate) fn join_key(first: &str, second: &str) -> String {
    format!("{first}{COMPOSITE_SEPARATOR}{second}")
}

/// Boolean parsing with the usual spellings: `1 t T TRUE true True` and
/// `0 f F FALSE false False`. Anything else is `None`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(start: Option<&str>, end: Option<&str>, single: Option<&str>) -> QueryParams {
        QueryParams {
            start: start.map(String::from),
            end: end.map(String::from),
            single: single.map(String::from),
        }
    }

    fn descriptor() -> QueryDescriptor {
        QueryDescriptor::new("Telemetry", "ProjectId", "sensors")
    }

    #[test]
    fn test_time_range_truth_table() {
        let cases = [
            (
                Some("100"),
                Some("200"),
                "#pk = :pk AND EpochTime BETWEEN :start AND :end",
                vec![":pk", ":start", ":end"],
            ),
            (
                Some("100"),
                None,
                "#pk = :pk AND EpochTime >= :start",
                vec![":pk", ":start"],
            ),
            (
                None,
                Some("200"),
                "#pk = :pk AND EpochTime <= :end",
                vec![":pk", ":end"],
            ),
            (None, None, "#pk = :pk", vec![":pk"]),
        ];

        for (start, end, expected, bound) in cases {
            let mut query = descriptor();
            query.evaluate_time_range(&params(start, end, None));
            assert_eq!(query.key_condition_expression(), expected);

            let values = query.expression_attribute_values();
            assert_eq!(values.len(), bound.len(), "bound values for {expected}");
            for key in bound {
                assert!(values.contains_key(key), "{key} missing for {expected}");
            }
        }
    }

    #[test]
    fn test_bounds_are_numeric_operands_passed_through() {
        let mut query = descriptor();
        query.evaluate_time_range(&params(Some("1700000000.5"), Some("not-a-number"), None));

        let values = query.expression_attribute_values();
        assert_eq!(values[":start"], StorageValue::N("1700000000.5".into()));
        assert_eq!(values[":end"], StorageValue::N("not-a-number".into()));
        assert_eq!(values[":pk"], StorageValue::S("sensors".into()));
    }

    #[test]
    fn test_partition_name_bound_through_placeholder() {
        let query = QueryDescriptor::new("Telemetry", "ProjectId#DeviceId", "p1#d1");
        assert_eq!(
            query.expression_attribute_names(),
            HashMap::from([("#pk".to_string(), "ProjectId#DeviceId".to_string())])
        );
    }

    #[test]
    fn test_single_mode_caps_and_reverses() {
        let mut query = descriptor();
        assert!(query.evaluate_single(&params(None, None, Some("true"))));
        assert_eq!(query.limit, Some(1));
        assert!(!query.scan_forward);
        assert!(query.is_single());
    }

    #[test]
    fn test_single_mode_independent_of_time_range() {
        let query = descriptor().refine(&params(Some("1"), Some("2"), Some("1")));
        assert_eq!(query.limit, Some(1));
        assert!(!query.scan_forward);
        assert_eq!(
            query.sort_condition,
            SortKeyCondition::Between {
                start: "1".into(),
                end: "2".into()
            }
        );
    }

    #[test]
    fn test_single_mode_off_when_absent_false_or_unparseable() {
        for single in [None, Some("false"), Some("0"), Some("yes"), Some("")] {
            let mut query = descriptor();
            assert!(!query.evaluate_single(&params(None, None, single)));
            assert_eq!(query.limit, None);
            assert!(query.scan_forward);
            assert!(!query.is_single());
        }
    }

    #[test]
    fn test_parse_bool_spellings() {
        for s in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        for s in ["tRUE", "yes", "2", " true"] {
            assert_eq!(parse_bool(s), None, "{s}");
        }
    }

    #[test]
    fn test_repeated_query_keys_keep_last_value() {
        let params = QueryParams::from_pairs([
            ("single", "true"),
            ("start", "5"),
            ("single", "false"),
            ("other", "x"),
        ]);
        assert_eq!(params.single.as_deref(), Some("false"));
        assert_eq!(params.start.as_deref(), Some("5"));
        assert_eq!(params.end, None);
    }

    #[test]
    fn test_composite_key_order() {
        let path = PathParams::from([
            ("ProjectId".to_string(), "p1".to_string()),
            ("DeviceId".to_string(), "d1".to_string()),
        ]);
        assert_eq!(composite_key(&path, "ProjectId", "DeviceId"), "p1#d1");
        assert_eq!(composite_key(&path, "DeviceId", "ProjectId"), "d1#p1");
    }

    #[test]
    fn test_composite_key_missing_parameter() {
        let path = PathParams::from([("ProjectId".to_string(), "p1".to_string())]);
        assert_eq!(composite_key(&path, "ProjectId", "LocationId"), "p1#");
    }
}
