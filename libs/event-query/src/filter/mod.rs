//! Typed filter predicates and the expression tree combining them.
//!
//! A `FilterExpr` is built by the caller-facing layer and interpreted
//! uniformly: the planner splits it into conjuncts and routes each one to
//! storage or to the in-memory post-filter, and `matches` evaluates it
//! against a storage row.

pub mod attribute;
pub mod geo;
pub mod temporal;
pub mod text;

pub use attribute::AttributePredicate;
pub use geo::GeoPredicate;
pub use temporal::TimePredicate;
pub use text::TextPredicate;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::EventRow;
use crate::store::StorageCapabilities;
use crate::Result;

/// Extra cost for a clause over a field the backend has no index for.
const UNINDEXED_PENALTY: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpr {
    Atom(FilterAtom),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterAtom {
    Geo(GeoPredicate),
    Time(TimePredicate),
    Attribute(AttributePredicate),
    Text(TextPredicate),
}

/// Coarse predicate families, the unit of storage capability and indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    Publisher,
    Status,
    DataSource,
    Time,
    InLanguage,
    Keywords,
    BoundingBox,
    Radius,
    Polygon,
    Text,
}

impl PredicateKind {
    pub const ALL: [PredicateKind; 10] = [
        PredicateKind::Publisher,
        PredicateKind::Status,
        PredicateKind::DataSource,
        PredicateKind::Time,
        PredicateKind::InLanguage,
        PredicateKind::Keywords,
        PredicateKind::BoundingBox,
        PredicateKind::Radius,
        PredicateKind::Polygon,
        PredicateKind::Text,
    ];

    /// Base cost rank: exact matches first, geometry and text last.
    pub fn rank(self) -> u32 {
        match self {
            PredicateKind::Publisher => 0,
            PredicateKind::Status => 1,
            PredicateKind::DataSource => 2,
            PredicateKind::Time => 3,
            PredicateKind::InLanguage => 4,
            PredicateKind::Keywords => 5,
            PredicateKind::BoundingBox => 6,
            PredicateKind::Radius => 7,
            PredicateKind::Polygon => 8,
            PredicateKind::Text => 9,
        }
    }
}

impl FilterAtom {
    pub fn kind(&self) -> PredicateKind {
        match self {
            FilterAtom::Geo(GeoPredicate::BoundingBox { .. }) => PredicateKind::BoundingBox,
            FilterAtom::Geo(GeoPredicate::Radius { .. }) => PredicateKind::Radius,
            FilterAtom::Geo(GeoPredicate::Polygon { .. }) => PredicateKind::Polygon,
            FilterAtom::Time(_) => PredicateKind::Time,
            FilterAtom::Attribute(a) => match a {
                AttributePredicate::AnyOfKeywords { .. }
                | AttributePredicate::AllOfKeywords { .. } => PredicateKind::Keywords,
                AttributePredicate::Publisher { .. } => PredicateKind::Publisher,
                AttributePredicate::Status { .. } => PredicateKind::Status,
                AttributePredicate::DataSource { .. } => PredicateKind::DataSource,
                AttributePredicate::InLanguage { .. } => PredicateKind::InLanguage,
            },
            FilterAtom::Text(_) => PredicateKind::Text,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterAtom::Geo(p) => p.name(),
            FilterAtom::Time(p) => p.name(),
            FilterAtom::Attribute(p) => p.name(),
            FilterAtom::Text(p) => p.name(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            FilterAtom::Geo(p) => p.validate(),
            FilterAtom::Time(p) => p.validate(),
            FilterAtom::Attribute(p) => p.validate(),
            FilterAtom::Text(p) => p.validate(),
        }
    }

    pub fn matches(&self, row: &EventRow) -> bool {
        match self {
            FilterAtom::Geo(p) => geo::matches(row.geometry.as_ref(), p),
            FilterAtom::Time(p) => temporal::matches(row.event.start_time, row.event.end_time, p),
            FilterAtom::Attribute(p) => attribute::matches(&row.event, p),
            FilterAtom::Text(p) => text::matches(&row.event, p),
        }
    }
}

impl FilterExpr {
    pub fn atom(atom: impl Into<FilterAtom>) -> Self {
        FilterExpr::Atom(atom.into())
    }

    pub fn and(self, other: FilterExpr) -> Self {
        FilterExpr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: FilterExpr) -> Self {
        FilterExpr::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        FilterExpr::Not(Box::new(self))
    }

    /// Evaluate left to right, short-circuiting `And` and `Or`.
    pub fn matches(&self, row: &EventRow) -> bool {
        match self {
            FilterExpr::Atom(atom) => atom.matches(row),
            FilterExpr::And(a, b) => a.matches(row) && b.matches(row),
            FilterExpr::Or(a, b) => a.matches(row) || b.matches(row),
            FilterExpr::Not(inner) => !inner.matches(row),
        }
    }

    /// Flatten top-level `And` nodes, keeping left-to-right order.
    pub fn conjuncts(self) -> Vec<FilterExpr> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts(self, out: &mut Vec<FilterExpr>) {
        match self {
            FilterExpr::And(a, b) => {
                a.collect_conjuncts(out);
                b.collect_conjuncts(out);
            }
            other => out.push(other),
        }
    }

    /// Every atom in the tree, left to right.
    pub fn atoms(&self) -> Vec<&FilterAtom> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a FilterAtom>) {
        match self {
            FilterExpr::Atom(atom) => out.push(atom),
            FilterExpr::And(a, b) | FilterExpr::Or(a, b) => {
                a.collect_atoms(out);
                b.collect_atoms(out);
            }
            FilterExpr::Not(inner) => inner.collect_atoms(out),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.atoms().into_iter().try_for_each(FilterAtom::validate)
    }

    /// Whether the backend can evaluate every atom of this clause natively.
    pub fn is_supported_by(&self, capabilities: &StorageCapabilities) -> bool {
        self.atoms()
            .into_iter()
            .all(|atom| capabilities.supports(atom.kind()))
    }

    /// Estimated cost: the most expensive atom decides.
    pub fn cost(&self, capabilities: &StorageCapabilities) -> u32 {
        self.atoms()
            .into_iter()
            .map(|atom| {
                let kind = atom.kind();
                let penalty = if capabilities.is_indexed(kind) {
                    0
                } else {
                    UNINDEXED_PENALTY
                };
                kind.rank() + penalty
            })
            .max()
            .unwrap_or(0)
    }

    /// Whether every matching row must satisfy some atom of `kind`.
    ///
    /// Atoms under `not` never count; an `or` counts only when both branches do.
    pub fn requires(&self, kind: PredicateKind) -> bool {
        match self {
            FilterExpr::Atom(atom) => atom.kind() == kind,
            FilterExpr::And(a, b) => a.requires(kind) || b.requires(kind),
            FilterExpr::Or(a, b) => a.requires(kind) && b.requires(kind),
            FilterExpr::Not(_) => false,
        }
    }
}

impl From<GeoPredicate> for FilterAtom {
    fn from(p: GeoPredicate) -> Self {
        FilterAtom::Geo(p)
    }
}

impl From<TimePredicate> for FilterAtom {
    fn from(p: TimePredicate) -> Self {
        FilterAtom::Time(p)
    }
}

impl From<AttributePredicate> for FilterAtom {
    fn from(p: AttributePredicate) -> Self {
        FilterAtom::Attribute(p)
    }
}

impl From<TextPredicate> for FilterAtom {
    fn from(p: TextPredicate) -> Self {
        FilterAtom::Text(p)
    }
}

impl fmt::Display for FilterAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterAtom::Geo(GeoPredicate::BoundingBox { min, max }) => write!(
                f,
                "geo.bounding_box[({}, {})..({}, {})]",
                min.lat, min.lon, max.lat, max.lon
            ),
            FilterAtom::Geo(GeoPredicate::Radius { center, meters }) => {
                write!(f, "geo.radius[({}, {}) <= {meters}m]", center.lat, center.lon)
            }
            FilterAtom::Geo(GeoPredicate::Polygon { vertices }) => {
                write!(f, "geo.polygon[{} vertices]", vertices.len())
            }
            FilterAtom::Time(p) => match p {
                TimePredicate::Overlaps { from, to } => {
                    write!(f, "time.overlaps[{}, {}]", from.to_rfc3339(), to.to_rfc3339())
                }
                TimePredicate::StartsAfter { instant }
                | TimePredicate::EndsBefore { instant }
                | TimePredicate::ActiveAt { instant } => {
                    write!(f, "{}[{}]", p.name(), instant.to_rfc3339())
                }
            },
            FilterAtom::Attribute(p) => match p {
                AttributePredicate::AnyOfKeywords { ids } | AttributePredicate::AllOfKeywords { ids } => {
                    let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
                    write!(f, "{}[{}]", p.name(), ids.join(", "))
                }
                AttributePredicate::Publisher { id } | AttributePredicate::DataSource { id } => {
                    write!(f, "{} = {id}", p.name())
                }
                AttributePredicate::Status { one_of } => {
                    let statuses: Vec<&str> = one_of.iter().map(|s| s.as_str()).collect();
                    write!(f, "status in [{}]", statuses.join(", "))
                }
                AttributePredicate::InLanguage { languages } => {
                    let codes: Vec<&str> = languages.iter().map(|l| l.code()).collect();
                    write!(f, "in_language[{}]", codes.join(", "))
                }
            },
            FilterAtom::Text(p) => write!(f, "text ~ '{}'", p.needle()),
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Atom(atom) => write!(f, "{atom}"),
            FilterExpr::And(a, b) => write!(f, "({a} AND {b})"),
            FilterExpr::Or(a, b) => write!(f, "({a} OR {b})"),
            FilterExpr::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}
