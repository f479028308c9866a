use super::query::{DateGrain, QueryJson};
use super::semantic_layer::SemanticLayerJson;
use std::fmt;

/// A name in a [`QueryJson`] that its [`SemanticLayerJson`] cannot serve.
///
/// The translator is supposed to resolve everything it asks for; the cache
/// only reports what is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    UnknownMetric(String),
    UnknownDimension(String),
    UnknownFilterField(String),
    MissingJoin { from: String, to: String },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::UnknownMetric(name) => {
                write!(f, "metric `{}` has no semantic layer definition", name)
            }
            Inconsistency::UnknownDimension(name) => {
                write!(f, "dimension `{}` has no semantic layer definition", name)
            }
            Inconsistency::UnknownFilterField(name) => {
                write!(f, "filter field `{}` is neither a dimension nor a metric", name)
            }
            Inconsistency::MissingJoin { from, to } => {
                write!(f, "no join definition between `{}` and `{}`", from, to)
            }
        }
    }
}

/// Checks that every metric, dimension and filter field resolves, and that
/// every relation used by the resolved definitions joins to the first one.
pub fn check(query: &QueryJson, layer: &SemanticLayerJson) -> Vec<Inconsistency> {
    let mut found = Vec::new();
    let mut tables: Vec<&str> = Vec::new();

    for name in &query.metrics {
        match layer.metric(name) {
            Some(metric) => push_unique(&mut tables, &metric.table),
            None => found.push(Inconsistency::UnknownMetric(name.clone())),
        }
    }

    for name in &query.dimensions {
        match layer.dimension(name) {
            Some(dimension) => push_unique(&mut tables, &dimension.table),
            None => found.push(Inconsistency::UnknownDimension(name.clone())),
        }
    }

    for filter in &query.filters {
        let (base, _) = DateGrain::split(&filter.field);
        if layer.dimension(base).is_none() && layer.metric(base).is_none() {
            found.push(Inconsistency::UnknownFilterField(filter.field.clone()));
        }
    }

    if let Some((primary, others)) = tables.split_first() {
        for other in others {
            if layer.join_between(primary, other).is_none() {
                found.push(Inconsistency::MissingJoin {
                    from: primary.to_string(),
                    to: other.to_string(),
                });
            }
        }
    }

    found
}

fn push_unique<'a>(tables: &mut Vec<&'a str>, table: &'a str) {
    if !tables.contains(&table) {
        tables.push(table);
    }
}
