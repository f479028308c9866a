use super::query::DateGrain;
use serde::{Deserialize, Serialize};

/// Resolved counterpart of a [`QueryJson`](super::QueryJson): the SQL each
/// requested name maps to and how the relations involved join together.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SemanticLayerJson {
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub dimensions: Vec<DimensionDefinition>,
    #[serde(default)]
    pub joins: Vec<JoinDefinition>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricDefinition {
    pub name: String,
    /// Aggregate expression, e.g. `SUM(sale_price)`
    pub sql: String,
    pub table: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DimensionDefinition {
    pub name: String,
    pub sql: String,
    pub table: String,
}

/// One-to-many join between two relations.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct JoinDefinition {
    pub one: String,
    pub many: String,
    /// Join predicate, e.g. `order_items.order_id = orders.order_id`
    pub join: String,
}

impl JoinDefinition {
    pub fn connects(&self, left: &str, right: &str) -> bool {
        (self.one == left && self.many == right) || (self.one == right && self.many == left)
    }
}

impl SemanticLayerJson {
    pub fn metric(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Looks up a dimension, ignoring any date-grain suffix on `name`.
    pub fn dimension(&self, name: &str) -> Option<&DimensionDefinition> {
        let (base, _) = DateGrain::split(name);
        self.dimensions.iter().find(|d| d.name == base)
    }

    /// Finds a join between `left` and `right` regardless of which side is
    /// the `one` relation.
    pub fn join_between(&self, left: &str, right: &str) -> Option<&JoinDefinition> {
        self.joins.iter().find(|j| j.connects(left, right))
    }
}
