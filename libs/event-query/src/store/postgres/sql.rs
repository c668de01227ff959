//! SQL rendering for [`StorageQuery`] against the PostGIS/hstore schema.
//!
//! Clauses become positional `$n` parameters collected in a `Vec<BindValue>`;
//! only integers computed here (limit, offset, SRID) are inlined.

use chrono::{DateTime, Utc};

use crate::filter::{AttributePredicate, FilterAtom, FilterExpr, GeoPredicate, TextPredicate, TimePredicate};
use crate::models::polygon_wkt;
use crate::planner::{SortField, SortKey, StorageQuery};
use crate::text::escape_like;

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    TextArray(Vec<String>),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

const EVENT_COLUMNS: &str = "e.id, \
     hstore_to_json(e.name) AS name, \
     hstore_to_json(e.short_description) AS short_description, \
     hstore_to_json(e.description) AS description, \
     hstore_to_json(e.info_url) AS info_url, \
     hstore_to_json(e.location_extra_info) AS location_extra_info, \
     e.start_time, e.end_time, e.location_id, e.keywords, e.audience, e.in_language, \
     e.publisher, e.data_source, e.super_event_id, e.status, e.last_modified_time, \
     ST_AsGeoJSON(l.position)::json AS geometry";

const FROM: &str = " FROM event e LEFT JOIN place l ON l.id = e.location_id WHERE TRUE";

fn push(bind_params: &mut Vec<BindValue>, value: BindValue) -> usize {
    bind_params.push(value);
    bind_params.len()
}

pub fn build_select(query: &StorageQuery) -> (String, Vec<BindValue>) {
    let mut sql = format!("SELECT {EVENT_COLUMNS}{FROM}");
    let mut bind_params = Vec::new();

    push_clauses(&mut sql, &mut bind_params, &query.clauses);
    push_order_by(&mut sql, &mut bind_params, &query.sort, query);

    if let Some(window) = query.window {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", window.limit, window.offset));
    }

    (sql, bind_params)
}

pub fn build_count(query: &StorageQuery) -> (String, Vec<BindValue>) {
    let mut sql = format!("SELECT COUNT(*){FROM}");
    let mut bind_params = Vec::new();
    push_clauses(&mut sql, &mut bind_params, &query.clauses);
    (sql, bind_params)
}

fn push_clauses(sql: &mut String, bind_params: &mut Vec<BindValue>, clauses: &[FilterExpr]) {
    for clause in clauses {
        sql.push_str(" AND ");
        sql.push_str(&expr_sql(clause, bind_params));
    }
}

fn expr_sql(expr: &FilterExpr, bind_params: &mut Vec<BindValue>) -> String {
    match expr {
        FilterExpr::Atom(atom) => atom_sql(atom, bind_params),
        FilterExpr::And(a, b) => format!(
            "({} AND {})",
            expr_sql(a, bind_params),
            expr_sql(b, bind_params)
        ),
        FilterExpr::Or(a, b) => format!(
            "({} OR {})",
            expr_sql(a, bind_params),
            expr_sql(b, bind_params)
        ),
        FilterExpr::Not(inner) => format!("NOT ({})", expr_sql(inner, bind_params)),
    }
}

fn atom_sql(atom: &FilterAtom, bind_params: &mut Vec<BindValue>) -> String {
    match atom {
        FilterAtom::Geo(p) => geo_sql(p, bind_params),
        FilterAtom::Time(p) => time_sql(p, bind_params),
        FilterAtom::Attribute(p) => attribute_sql(p, bind_params),
        FilterAtom::Text(p) => text_sql(p, bind_params),
    }
}

fn geo_sql(predicate: &GeoPredicate, bind_params: &mut Vec<BindValue>) -> String {
    match predicate {
        GeoPredicate::BoundingBox { min, max } => {
            let min_lon = push(bind_params, BindValue::Float(min.lon));
            let min_lat = push(bind_params, BindValue::Float(min.lat));
            let max_lon = push(bind_params, BindValue::Float(max.lon));
            let max_lat = push(bind_params, BindValue::Float(max.lat));
            format!(
                "(l.position IS NOT NULL AND ST_CoveredBy(l.position, \
                 ST_MakeEnvelope(${min_lon}, ${min_lat}, ${max_lon}, ${max_lat}, 4326)))"
            )
        }
        GeoPredicate::Radius { center, meters } => {
            let lon = push(bind_params, BindValue::Float(center.lon));
            let lat = push(bind_params, BindValue::Float(center.lat));
            let m = push(bind_params, BindValue::Float(*meters));
            // Every vertex within the radius, on the sphere.
            format!(
                "(l.position IS NOT NULL AND NOT EXISTS (\
                 SELECT 1 FROM ST_DumpPoints(l.position) dp \
                 WHERE NOT ST_DWithin(dp.geom::geography, \
                 ST_SetSRID(ST_MakePoint(${lon}, ${lat}), 4326)::geography, ${m}, false)))"
            )
        }
        GeoPredicate::Polygon { vertices } => {
            let wkt = push(bind_params, BindValue::Text(polygon_wkt(vertices)));
            format!(
                "(l.position IS NOT NULL AND ST_CoveredBy(l.position, ST_GeomFromText(${wkt}, 4326)))"
            )
        }
    }
}

fn time_sql(predicate: &TimePredicate, bind_params: &mut Vec<BindValue>) -> String {
    match *predicate {
        TimePredicate::Overlaps { from, to } => {
            let to = push(bind_params, BindValue::Timestamp(to));
            let from = push(bind_params, BindValue::Timestamp(from));
            format!("(e.start_time <= ${to} AND (e.end_time IS NULL OR e.end_time >= ${from}))")
        }
        TimePredicate::StartsAfter { instant } => {
            let idx = push(bind_params, BindValue::Timestamp(instant));
            format!("e.start_time >= ${idx}")
        }
        TimePredicate::EndsBefore { instant } => {
            let idx = push(bind_params, BindValue::Timestamp(instant));
            format!("(e.end_time IS NOT NULL AND e.end_time <= ${idx})")
        }
        TimePredicate::ActiveAt { instant } => {
            let idx = push(bind_params, BindValue::Timestamp(instant));
            format!("(e.start_time <= ${idx} AND (e.end_time IS NULL OR e.end_time >= ${idx}))")
        }
    }
}

fn attribute_sql(predicate: &AttributePredicate, bind_params: &mut Vec<BindValue>) -> String {
    match predicate {
        AttributePredicate::AnyOfKeywords { ids } => {
            let idx = push(bind_params, BindValue::TextArray(ids.iter().map(|id| id.0.clone()).collect()));
            format!("e.keywords && ${idx}::text[]")
        }
        AttributePredicate::AllOfKeywords { ids } => {
            let idx = push(bind_params, BindValue::TextArray(ids.iter().map(|id| id.0.clone()).collect()));
            format!("e.keywords @> ${idx}::text[]")
        }
        AttributePredicate::Publisher { id } => {
            let idx = push(bind_params, BindValue::Text(id.clone()));
            format!("e.publisher = ${idx}")
        }
        AttributePredicate::Status { one_of } => {
            let idx = push(
                bind_params,
                BindValue::TextArray(one_of.iter().map(|s| s.as_str().to_string()).collect()),
            );
            format!("e.status = ANY(${idx})")
        }
        AttributePredicate::DataSource { id } => {
            let idx = push(bind_params, BindValue::Text(id.clone()));
            format!("e.data_source = ${idx}")
        }
        AttributePredicate::InLanguage { languages } => {
            let idx = push(
                bind_params,
                BindValue::TextArray(languages.iter().map(|l| l.code().to_string()).collect()),
            );
            format!("e.in_language && ${idx}::text[]")
        }
    }
}

fn text_sql(predicate: &TextPredicate, bind_params: &mut Vec<BindValue>) -> String {
    let field = |column: &str, bind_params: &mut Vec<BindValue>| match &predicate.languages {
        Some(languages) => {
            let idx = push(
                bind_params,
                BindValue::TextArray(languages.iter().map(|l| l.code().to_string()).collect()),
            );
            format!("array_to_string(e.{column} -> ${idx}::text[], ' ')")
        }
        None => format!("array_to_string(avals(e.{column}), ' ')"),
    };

    let haystack = format!(
        "concat_ws(' ', {}, {}, {})",
        field("name", bind_params),
        field("short_description", bind_params),
        field("description", bind_params)
    );
    let pattern = push(
        bind_params,
        BindValue::Text(format!("%{}%", escape_like(&predicate.needle()))),
    );
    format!("regexp_replace(lower(unaccent({haystack})), '\\s+', ' ', 'g') LIKE ${pattern}")
}

fn push_order_by(
    sql: &mut String,
    bind_params: &mut Vec<BindValue>,
    sort: &[SortKey],
    query: &StorageQuery,
) {
    let mut order_by = Vec::with_capacity(sort.len());
    for key in sort {
        let dir = if key.descending { "DESC" } else { "ASC" };
        let expr = match key.field {
            SortField::Id => format!("e.id COLLATE \"C\" {dir}"),
            SortField::StartTime => format!("e.start_time {dir}"),
            SortField::EndTime => format!("e.end_time {dir} NULLS LAST"),
            SortField::LastModified => format!("e.last_modified_time {dir} NULLS LAST"),
            SortField::Name => {
                let lookups: Vec<String> = query
                    .name_languages
                    .iter()
                    .map(|lang| {
                        let idx = push(bind_params, BindValue::Text(lang.code().to_string()));
                        format!("e.name -> ${idx}")
                    })
                    .collect();
                format!(
                    "lower(COALESCE({})) COLLATE \"C\" {dir} NULLS LAST",
                    lookups.join(", ")
                )
            }
        };
        order_by.push(expr);
    }

    if order_by.is_empty() {
        sql.push_str(" ORDER BY e.id COLLATE \"C\" ASC");
        return;
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_by.join(", "));
}
