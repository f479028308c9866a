use serde::{Deserialize, Serialize};
use std::fmt;

/// Abstract request produced by the translator: which metrics to compute,
/// which dimensions to group by and which filters to apply.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct QueryJson {
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = "LIKE")]
    Like,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::GtEq => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::LtEq => "<=",
            FilterOperator::Like => "LIKE",
        };
        write!(f, "{}", op)
    }
}

/// Scalar compared against in a filter.
///
/// Numbers are kept as [`serde_json::Number`] so that `1` and `1.0` survive a
/// save/load cycle exactly as the translator wrote them.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    Number(serde_json::Number),
    Boolean(bool),
    Text(String),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Number(number) => write!(f, "{}", number),
            FilterValue::Boolean(flag) => write!(f, "{}", flag),
            FilterValue::Text(text) => write!(f, "'{}'", text),
        }
    }
}

/// Date truncation requested through a name suffix such as
/// `ordered_date__week`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGrain {
    Week,
    Month,
    Year,
}

impl DateGrain {
    const SUFFIXES: [(&'static str, DateGrain); 3] = [
        ("__week", DateGrain::Week),
        ("__month", DateGrain::Month),
        ("__year", DateGrain::Year),
    ];

    /// Splits `name` into its base name and the grain its suffix requests.
    pub fn split(name: &str) -> (&str, Option<DateGrain>) {
        for (suffix, grain) in Self::SUFFIXES {
            if let Some(base) = name.strip_suffix(suffix) {
                return (base, Some(grain));
            }
        }
        (name, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use serde_json::json;

    #[rstest]
    #[case::week("ordered_date__week", "ordered_date", Some(DateGrain::Week))]
    #[case::month("ordered_date__month", "ordered_date", Some(DateGrain::Month))]
    #[case::year("created_at__year", "created_at", Some(DateGrain::Year))]
    #[case::no_suffix("status", "status", None)]
    #[case::unknown_suffix("created_at__day", "created_at__day", None)]
    fn test_date_grain_split(
        #[case] name: &str,
        #[case] base: &str,
        #[case] grain: Option<DateGrain>,
    ) {
        assert_eq!(DateGrain::split(name), (base, grain));
    }

    #[test]
    fn test_missing_sequences_default_to_empty() {
        let query: QueryJson = serde_json::from_value(json!({"metrics": ["order_count"]})).unwrap();
        assert_eq!(query.metrics, vec!["order_count"]);
        assert!(query.dimensions.is_empty());
        assert!(query.filters.is_empty());
    }

    #[rstest]
    #[case::integer(json!(1), "1")]
    #[case::float(json!(1000.5), "1000.5")]
    #[case::text(json!("Complete"), "'Complete'")]
    #[case::boolean(json!(true), "true")]
    fn test_filter_value_scalars(#[case] value: serde_json::Value, #[case] rendered: &str) {
        let filter: Filter = serde_json::from_value(json!({
            "field": "status",
            "operator": "=",
            "value": value,
        }))
        .unwrap();
        assert_eq!(filter.value.to_string(), rendered);
    }

    #[rstest]
    #[case::null(json!(null))]
    #[case::array(json!(["a", "b"]))]
    #[case::object(json!({"a": 1}))]
    fn test_filter_value_rejects_non_scalars(#[case] value: serde_json::Value) {
        let filter = serde_json::from_value::<Filter>(json!({
            "field": "status",
            "operator": "=",
            "value": value,
        }));
        assert!(filter.is_err());
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let filter = serde_json::from_value::<Filter>(json!({
            "field": "num_of_item",
            "operator": "BETWEEN",
            "value": 1,
        }));
        assert!(filter.is_err());
    }

    #[test]
    fn test_number_precision_is_preserved() {
        let value: FilterValue = serde_json::from_value(json!(1.0)).unwrap();
        assert_eq!(serde_json::to_value(&value).unwrap(), json!(1.0));
        let value: FilterValue = serde_json::from_value(json!(1)).unwrap();
        assert_eq!(serde_json::to_value(&value).unwrap(), json!(1));
    }
}
