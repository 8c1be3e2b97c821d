//! C3: storage pipeline.
//!
//! One GET against `/storage/storage-units`. The design assumes a single
//! page of 100 suffices — storage-unit counts are small in practice — so if
//! the response claims more, only the first page is kept.

use serde::Deserialize;

use crate::client::HttpClient;
use crate::error::ClientError;
use crate::scrape_context::ScrapeContext;
use crate::tracing_facade::{attr, span_name, Tracer};
use crate::wire::Document;

const PATH: &str = "/storage/storage-units";
const TAPE_STORAGE_TYPE: &str = "Tape";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Free,
    Used,
}

impl Dimension {
    pub fn as_label(self) -> &'static str {
        match self {
            Dimension::Free => "free",
            Dimension::Used => "used",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageSample {
    pub name: String,
    pub server_type: String,
    pub dimension: Dimension,
    pub bytes: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageUnitAttributes {
    storage_unit_name: String,
    storage_unit_type: String,
    server_type: String,
    free_space_bytes: f64,
    used_space_bytes: f64,
}

/// Opens the `netbackup.fetch_storage` span (C8) for the duration of the
/// fetch, recording the `netbackup.endpoint` attribute.
pub async fn fetch_storage(
    client: &HttpClient,
    ctx: ScrapeContext,
    tracer: &Tracer,
) -> Result<Vec<StorageSample>, ClientError> {
    let span = tracer.start_span(span_name::FETCH_STORAGE);
    let _enter = span.enter();
    span.record(attr::ENDPOINT, PATH);

    let url = client.snapshot().build_url(
        PATH,
        &[("page[limit]", "100".to_string()), ("page[offset]", "0".to_string())],
    )?;

    let doc: Document<StorageUnitAttributes> = client.get_json(&url, ctx, PATH).await?;

    Ok(doc
        .data
        .into_iter()
        .map(|r| r.attributes)
        .filter(|unit| unit.storage_unit_type != TAPE_STORAGE_TYPE)
        .flat_map(|unit| {
            [
                StorageSample {
                    name: unit.storage_unit_name.clone(),
                    server_type: unit.server_type.clone(),
                    dimension: Dimension::Free,
                    bytes: unit.free_space_bytes,
                },
                StorageSample {
                    name: unit.storage_unit_name,
                    server_type: unit.server_type,
                    dimension: Dimension::Used,
                    bytes: unit.used_space_bytes,
                },
            ]
        })
        .collect())
}
