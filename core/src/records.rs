//! Diary detail: the data points behind one record category.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::adapter::HttpAdapter;
use crate::error::ApiError;
use crate::types::{GraphPoint, GraphPointUpdate, PhotoEntry};

/// Stateless service over the graph and photo history endpoints.
pub struct RecordService {
    adapter: Arc<HttpAdapter>,
}

impl RecordService {
    pub fn new(adapter: Arc<HttpAdapter>) -> Self {
        Self { adapter }
    }

    /// Graph points oldest first. Undated points go last, in server order.
    pub async fn graph_history(&self, record_id: i64) -> Result<Vec<GraphPoint>, ApiError> {
        let client = self.adapter.client();
        let response = self.adapter.send(client.build_graph_history(record_id)).await?;
        let mut points = client.parse_graph_history(response)?.points;
        points.sort_by(|a, b| by_date(a.graph_date.as_deref(), b.graph_date.as_deref()));
        debug!(record_id, count = points.len(), "graph history loaded");
        Ok(points)
    }

    /// Photo entries oldest first. Undated entries go last, in server order.
    pub async fn photo_history(&self, record_id: i64) -> Result<Vec<PhotoEntry>, ApiError> {
        let client = self.adapter.client();
        let response = self.adapter.send(client.build_photo_history(record_id)).await?;
        let mut entries = client.parse_photo_history(response)?.entries;
        entries.sort_by(|a, b| by_date(a.photo_date.as_deref(), b.photo_date.as_deref()));
        Ok(entries)
    }

    /// The newest dated point, if the record has any.
    pub async fn latest_graph_value(&self, record_id: i64) -> Result<Option<GraphPoint>, ApiError> {
        let points = self.graph_history(record_id).await?;
        Ok(points.into_iter().filter(|p| p.graph_date.is_some()).last())
    }

    pub async fn update_graph_point(
        &self,
        record_id: i64,
        data_id: i64,
        update: GraphPointUpdate,
    ) -> Result<GraphPoint, ApiError> {
        if !update.graph_data.is_finite() {
            return Err(ApiError::validation("graph value must be a number"));
        }
        let client = self.adapter.client();
        let request = client.build_update_graph_point(record_id, data_id, &update)?;
        client.parse_graph_point(self.adapter.send(request).await?)
    }

    pub async fn delete_graph_point(&self, record_id: i64, data_id: i64) -> Result<(), ApiError> {
        let client = self.adapter.client();
        let response = self
            .adapter
            .send(client.build_delete_graph_point(record_id, data_id))
            .await?;
        client.parse_empty(response)
    }
}

/// ISO dates compare correctly as strings. `sort_by` is stable, so equal and
/// missing dates keep their relative order.
fn by_date(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
