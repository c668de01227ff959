//! PostgreSQL/PostGIS backend.
//!
//! Translatable columns are `hstore` and read back through `hstore_to_json`;
//! place geometries are read back through `ST_AsGeoJSON`.

pub mod sql;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use self::sql::BindValue;
use super::{EventStore, StorageCapabilities};
use crate::config::QueryConfig;
use crate::filter::PredicateKind;
use crate::models::{
    Event, EventId, EventRow, EventStatus, Geometry, Keyword, KeywordId, Language, LocalizedText,
    Location, LocationId,
};
use crate::planner::StorageQuery;
use crate::{Error, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
    polygon_native: bool,
}

impl PgEventStore {
    pub fn new(pool: PgPool, config: &QueryConfig) -> Self {
        Self {
            pool,
            polygon_native: config.polygon_native,
        }
    }

    pub async fn connect(database_url: &str, config: &QueryConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, config))
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    bind_values: Vec<BindValue>,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for value in bind_values {
        query = match value {
            BindValue::Text(v) => query.bind(v),
            BindValue::TextArray(vs) => query.bind(vs),
            BindValue::Float(v) => query.bind(v),
            BindValue::Timestamp(v) => query.bind(v),
        };
    }
    query
}

#[async_trait]
impl EventStore for PgEventStore {
    fn capabilities(&self) -> StorageCapabilities {
        let capabilities = StorageCapabilities::all().with_indexed(&[
            PredicateKind::Publisher,
            PredicateKind::Status,
            PredicateKind::DataSource,
            PredicateKind::Time,
            PredicateKind::Keywords,
            PredicateKind::BoundingBox,
            PredicateKind::Radius,
            PredicateKind::Polygon,
        ]);
        if self.polygon_native {
            capabilities
        } else {
            capabilities.without_native(PredicateKind::Polygon)
        }
    }

    async fn fetch_events(&self, query: &StorageQuery) -> Result<Vec<EventRow>> {
        let (sql, bind_values) = sql::build_select(query);
        debug!(sql = %sql, binds = bind_values.len(), "Fetching events");

        let rows = bind_all(sqlx::query(&sql), bind_values)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_row).collect()
    }

    async fn count_events(&self, query: &StorageQuery) -> Result<usize> {
        let (sql, bind_values) = sql::build_count(query);

        let row = bind_all(sqlx::query(&sql), bind_values)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get(0)?;
        Ok(usize::try_from(total).unwrap_or(0))
    }

    async fn fetch_keywords(&self, ids: &[KeywordId]) -> Result<Vec<Keyword>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = ids.iter().map(|id| id.0.clone()).collect();
        let rows = sqlx::query(
            "SELECT id, hstore_to_json(name) AS name, data_source, deprecated, replaced_by_id \
             FROM keyword WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Keyword> {
                Ok(Keyword {
                    id: KeywordId::new(row.try_get::<String, _>("id")?),
                    name: localized(row, "name")?.unwrap_or_default(),
                    data_source: row.try_get("data_source")?,
                    deprecated: row.try_get("deprecated")?,
                    replaced_by: row
                        .try_get::<Option<String>, _>("replaced_by_id")?
                        .map(KeywordId::new),
                })
            })
            .collect()
    }

    async fn fetch_locations(&self, ids: &[LocationId]) -> Result<Vec<Location>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = ids.iter().map(|id| id.0.clone()).collect();
        let rows = sqlx::query(
            "SELECT id, ST_AsGeoJSON(position)::json AS geometry, \
             hstore_to_json(name) AS name, hstore_to_json(street_address) AS street_address \
             FROM place WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut locations = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id")?;
            let Some(geometry) = row.try_get::<Option<JsonValue>, _>("geometry")? else {
                debug!(location = %id, "Skipping place without position");
                continue;
            };
            locations.push(Location {
                id: LocationId::new(id),
                geometry: Geometry::from_geojson(&geometry)?,
                name: localized(row, "name")?,
                street_address: localized(row, "street_address")?,
            });
        }
        Ok(locations)
    }
}

fn event_row(row: &PgRow) -> Result<EventRow> {
    let id: String = row.try_get("id")?;
    let status_raw: String = row.try_get("status")?;
    let status = EventStatus::parse(&status_raw).ok_or_else(|| {
        Error::StorageUnavailable(format!("event {id} has unknown status '{status_raw}'").into())
    })?;

    let geometry = row
        .try_get::<Option<JsonValue>, _>("geometry")?
        .map(|g| Geometry::from_geojson(&g))
        .transpose()?;

    let event = Event {
        name: localized(row, "name")?.unwrap_or_default(),
        short_description: localized(row, "short_description")?,
        description: localized(row, "description")?,
        info_url: localized(row, "info_url")?,
        location_extra_info: localized(row, "location_extra_info")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        location: row
            .try_get::<Option<String>, _>("location_id")?
            .map(LocationId::new),
        keywords: id_list(row, "keywords")?.into_iter().map(KeywordId::new).collect(),
        audience: id_list(row, "audience")?.into_iter().map(KeywordId::new).collect(),
        in_language: id_list(row, "in_language")?
            .iter()
            .filter_map(|code| Language::from_tag(code))
            .collect(),
        publisher: row.try_get("publisher")?,
        data_source: row.try_get("data_source")?,
        super_event: row
            .try_get::<Option<String>, _>("super_event_id")?
            .map(EventId::new),
        status,
        last_modified_time: row.try_get("last_modified_time")?,
        id: EventId::new(id),
    };
    Ok(EventRow::new(event, geometry))
}

fn id_list(row: &PgRow, column: &str) -> Result<Vec<String>> {
    Ok(row
        .try_get::<Option<Vec<String>>, _>(column)?
        .unwrap_or_default())
}

/// Read an `hstore_to_json` column, keeping only supported languages.
fn localized(row: &PgRow, column: &str) -> Result<Option<LocalizedText>> {
    let Some(value) = row.try_get::<Option<JsonValue>, _>(column)? else {
        return Ok(None);
    };
    let entries: BTreeMap<String, Option<String>> = serde_json::from_value(value)?;

    let mut text = LocalizedText::new();
    for (code, entry) in entries {
        match (Language::from_tag(&code), entry) {
            (Some(language), Some(entry)) if !entry.is_empty() => text.insert(language, entry),
            (None, Some(_)) => warn!(column, language = %code, "Ignoring unsupported translation"),
            _ => {}
        }
    }
    Ok((!text.is_empty()).then_some(text))
}
