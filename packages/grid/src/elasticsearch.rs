//! [`GridIndex`] backed by an Elasticsearch index of `GeoJSON` crime features.
//!
//! Documents are expected to look like
//!
//! ```json
//! {
//!   "geometry": { "coordinates": [-122.674417, 45.523813] },
//!   "properties": { "crimeType": "Larceny", "reportTime": "2013-06-03T23:15:00-07:00" }
//! }
//! ```
//!
//! with `geometry.coordinates` mapped as a `geo_point`. Cells come from a
//! `geohash_grid` aggregation on that field.
//!
//! A cell's records are read through a point in time with `search_after`
//! paging (Elasticsearch 7.10 or later), so cells larger than the index's
//! `max_result_window` are listed completely.

use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use crime_radar_grid_models::{CrimeRecord, GridCell};
use serde_json::{Value, json};

use crate::geohash_cell::decode_cell;
use crate::report_time::parse_report_time;
use crate::{GridError, GridIndex, YearWindow};

/// Field holding each document's `geo_point`.
const LOCATION_FIELD: &str = "geometry.coordinates";

/// Field holding each document's report timestamp.
const REPORT_TIME_FIELD: &str = "properties.reportTime";

/// How long a point in time is kept open between pages.
const PIT_KEEP_ALIVE: &str = "1m";

/// Maximum length of an error body included in [`GridError::Status`].
const BODY_PREVIEW_LEN: usize = 500;

/// Tuning knobs for [`ElasticsearchGridIndex`].
#[derive(Debug, Clone, Copy)]
pub struct ElasticsearchOptions {
    /// Radius around a coordinate searched when resolving its cell.
    pub nearby_radius_km: f64,
    /// Hits fetched per search request when listing a cell's records.
    pub page_size: u32,
    /// Upper bound on buckets returned by a cell enumeration.
    pub max_cells: u32,
    /// Offset applied to naive report times and to year boundaries.
    pub reference_offset: FixedOffset,
}

impl Default for ElasticsearchOptions {
    fn default() -> Self {
        Self {
            nearby_radius_km: 0.1,
            page_size: 5000,
            max_cells: 10_000,
            reference_offset: FixedOffset::west_opt(8 * 3600).unwrap_or_else(utc),
        }
    }
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap_or_else(|| unreachable!("zero offset is always valid"))
}

/// Grid index over an Elasticsearch `_search` endpoint.
pub struct ElasticsearchGridIndex {
    client: reqwest::Client,
    base_url: String,
    index: String,
    search_url: String,
    options: ElasticsearchOptions,
}

impl ElasticsearchGridIndex {
    /// Creates an adapter with its own HTTP client. `timeout` bounds each
    /// HTTP request, so a multi-page listing may take longer in total.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        index: &str,
        timeout: Duration,
        options: ElasticsearchOptions,
    ) -> Result<Self, GridError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, index, options))
    }

    /// Creates an adapter that shares an existing HTTP client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        index: &str,
        options: ElasticsearchOptions,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let search_url = format!("{base_url}/{index}/_search");
        Self {
            client,
            base_url,
            index: index.to_string(),
            search_url,
            options,
        }
    }

    /// Returns the `_search` URL this adapter queries.
    #[must_use]
    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    async fn search(&self, body: &Value) -> Result<Value, GridError> {
        self.send(self.client.post(&self.search_url).json(body)).await
    }

    async fn open_point_in_time(&self) -> Result<String, GridError> {
        let url = format!(
            "{}/{}/_pit?keep_alive={PIT_KEEP_ALIVE}",
            self.base_url, self.index
        );
        let response = self.send(self.client.post(url)).await?;

        response["id"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| GridError::MalformedResponse {
                message: "point in time response without id".to_string(),
            })
    }

    async fn close_point_in_time(&self, id: &str) {
        let url = format!("{}/_pit", self.base_url);
        let request = self.client.delete(url).json(&json!({ "id": id }));
        if let Err(e) = self.send(request).await {
            log::warn!("Failed to close point in time: {e}");
        }
    }

    async fn list_records(
        &self,
        cell: &GridCell,
        window: &YearWindow,
        pit_id: &mut String,
    ) -> Result<Vec<CrimeRecord>, GridError> {
        let url = format!("{}/_search", self.base_url);
        let page_size = self.options.page_size.max(1);

        let mut records = Vec::new();
        let mut search_after: Option<Value> = None;

        loop {
            let body = records_query(cell, window, pit_id, search_after.as_ref(), page_size);
            let response = self.send(self.client.post(&url).json(&body)).await?;
            if let Some(id) = response["pit_id"].as_str() {
                id.clone_into(pit_id);
            }

            let page = parse_hits(&response, self.options.reference_offset)?;
            let fetched = u32::try_from(page.len()).unwrap_or(u32::MAX);
            records.extend(page);

            if fetched < page_size {
                break;
            }
            search_after = Some(last_sort_values(&response)?);
            log::debug!(
                "Cell {} has more than {} records, fetching next page",
                cell.hash,
                records.len()
            );
        }

        Ok(records)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, GridError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = if text.len() > BODY_PREVIEW_LEN {
                format!("{}...", truncate(&text, BODY_PREVIEW_LEN))
            } else {
                text
            };
            return Err(GridError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl GridIndex for ElasticsearchGridIndex {
    async fn cell_for(
        &self,
        longitude: f64,
        latitude: f64,
        precision: u8,
    ) -> Result<Option<GridCell>, GridError> {
        let body = cell_query(longitude, latitude, precision, self.options.nearby_radius_km);
        let response = self.search(&body).await?;
        let cells = parse_grid_buckets(&response, precision)?;
        Ok(cells.into_iter().next())
    }

    async fn all_cells(&self, precision: u8) -> Result<Vec<GridCell>, GridError> {
        let body = cells_query(precision, self.options.max_cells);
        let response = self.search(&body).await?;
        let cells = parse_grid_buckets(&response, precision)?;

        if u32::try_from(cells.len()).is_ok_and(|n| n >= self.options.max_cells) {
            log::warn!(
                "Cell enumeration at precision {precision} hit the {} bucket limit; \
                 some cells may be missing",
                self.options.max_cells
            );
        }

        Ok(cells)
    }

    async fn records_in(&self, cell: &GridCell, year: i32) -> Result<Vec<CrimeRecord>, GridError> {
        let window = YearWindow::new(year, self.options.reference_offset).ok_or_else(|| {
            GridError::MalformedResponse {
                message: format!("year {year} is out of range"),
            }
        })?;

        let mut pit_id = self.open_point_in_time().await?;
        let records = self.list_records(cell, &window, &mut pit_id).await;
        self.close_point_in_time(&pit_id).await;

        records
    }
}

fn truncate(text: &str, max: usize) -> &str {
    let mut end = max.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn geohash_grid(precision: u8, size: Option<u32>) -> Value {
    let mut grid = json!({
        "field": LOCATION_FIELD,
        "precision": precision,
    });
    if let Some(size) = size {
        grid["size"] = json!(size);
    }
    json!({ "grid": { "geohash_grid": grid } })
}

/// Builds the search body that resolves the cell around a coordinate.
#[must_use]
pub fn cell_query(longitude: f64, latitude: f64, precision: u8, radius_km: f64) -> Value {
    json!({
        "size": 0,
        "query": {
            "bool": {
                "filter": {
                    "geo_distance": {
                        "distance": format!("{radius_km}km"),
                        LOCATION_FIELD: [longitude, latitude],
                    }
                }
            }
        },
        "aggregations": geohash_grid(precision, None),
    })
}

/// Builds the search body that enumerates every cell at a precision.
#[must_use]
pub fn cells_query(precision: u8, max_cells: u32) -> Value {
    json!({
        "size": 0,
        "aggregations": geohash_grid(precision, Some(max_cells)),
    })
}

/// Builds one page of the search that lists a cell's records for a year.
///
/// Pages are read inside the point in time `pit_id`. The first page has
/// no `search_after`; each later page passes the `sort` values of the
/// previous page's last hit. `_shard_doc` breaks ties between records
/// reported at the same instant.
#[must_use]
pub fn records_query(
    cell: &GridCell,
    window: &YearWindow,
    pit_id: &str,
    search_after: Option<&Value>,
    size: u32,
) -> Value {
    let mut body = json!({
        "size": size,
        "track_total_hits": false,
        "pit": { "id": pit_id, "keep_alive": PIT_KEEP_ALIVE },
        "sort": [{ REPORT_TIME_FIELD: "asc" }, { "_shard_doc": "asc" }],
        "query": {
            "bool": {
                "filter": [
                    {
                        "geo_bounding_box": {
                            LOCATION_FIELD: {
                                "top_left": { "lon": cell.bounds.west, "lat": cell.bounds.north },
                                "bottom_right": { "lon": cell.bounds.east, "lat": cell.bounds.south },
                            }
                        }
                    },
                    {
                        "range": {
                            REPORT_TIME_FIELD: {
                                "gte": window.start.to_rfc3339(),
                                "lt": window.end.to_rfc3339(),
                            }
                        }
                    }
                ]
            }
        }
    });
    if let Some(after) = search_after {
        body["search_after"] = after.clone();
    }
    body
}

/// Returns the `sort` values of the last hit, the cursor for the next
/// page.
///
/// # Errors
///
/// Returns [`GridError::MalformedResponse`] if there are no hits or the
/// last hit carries no sort values.
pub fn last_sort_values(body: &Value) -> Result<Value, GridError> {
    body["hits"]["hits"]
        .as_array()
        .and_then(|hits| hits.last())
        .map(|hit| &hit["sort"])
        .filter(|sort| sort.is_array())
        .cloned()
        .ok_or_else(|| GridError::MalformedResponse {
            message: "last hit without sort values".to_string(),
        })
}

/// Decodes the `grid` aggregation buckets of a search response, in the
/// order the backend returned them.
///
/// # Errors
///
/// Returns [`GridError`] if the aggregation is missing or a bucket key is
/// not a valid geohash.
pub fn parse_grid_buckets(body: &Value, precision: u8) -> Result<Vec<GridCell>, GridError> {
    let buckets = body["aggregations"]["grid"]["buckets"]
        .as_array()
        .ok_or_else(|| GridError::MalformedResponse {
            message: "missing aggregations.grid.buckets".to_string(),
        })?;

    buckets
        .iter()
        .map(|bucket| {
            let key = bucket["key"]
                .as_str()
                .ok_or_else(|| GridError::MalformedResponse {
                    message: format!("bucket without string key: {bucket}"),
                })?;
            decode_cell(key, precision)
        })
        .collect()
}

/// Decodes the `hits.hits[]._source` documents of a search response.
///
/// # Errors
///
/// Returns [`GridError`] if the hits array is missing or a document lacks
/// its crime type, report time, or coordinates.
pub fn parse_hits(body: &Value, reference: FixedOffset) -> Result<Vec<CrimeRecord>, GridError> {
    let hits = body["hits"]["hits"]
        .as_array()
        .ok_or_else(|| GridError::MalformedResponse {
            message: "missing hits.hits".to_string(),
        })?;

    hits.iter()
        .map(|hit| parse_feature(&hit["_source"], reference))
        .collect()
}

fn parse_feature(source: &Value, reference: FixedOffset) -> Result<CrimeRecord, GridError> {
    let properties = &source["properties"];

    let crime_type = properties["crimeType"]
        .as_str()
        .ok_or_else(|| GridError::MalformedResponse {
            message: "document without properties.crimeType".to_string(),
        })?;

    let report_time = properties["reportTime"]
        .as_str()
        .ok_or_else(|| GridError::MalformedResponse {
            message: "document without properties.reportTime".to_string(),
        })?;

    let coordinates = &source["geometry"]["coordinates"];
    let (Some(longitude), Some(latitude)) = (coordinates[0].as_f64(), coordinates[1].as_f64())
    else {
        return Err(GridError::MalformedResponse {
            message: format!("document with invalid geometry.coordinates: {coordinates}"),
        });
    };

    Ok(CrimeRecord {
        crime_type: crime_type.to_string(),
        report_time: parse_report_time(report_time, reference)?,
        longitude,
        latitude,
    })
}
