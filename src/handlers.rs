use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::{
    archive,
    error::{AppError, AppResult},
    models::{BatchSummary, HealthStatus},
    parser,
    state::AppState,
};

/// Multipart field carrying the uploaded archive.
pub const UPLOAD_FIELD: &str = "file";

const EXPORT_DISPOSITION: &str = "attachment; filename=\"data.zip\"";

pub async fn healthcheck() -> Json<HealthStatus> {
    Json(HealthStatus { status: "ok" })
}

/// `POST /api/v0/prices`: decode, parse, persist, then report the table summary.
pub async fn upload_prices(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<BatchSummary>> {
    let mut multipart = multipart.map_err(|err| AppError::invalid_upload(err.body_text()))?;
    let upload = read_upload_field(&mut multipart).await?;
    let upload_bytes = upload.len();

    let records = run_blocking(move || {
        let entry = archive::decode(&upload)?;
        parser::parse(entry.as_bytes())
    })
    .await?;

    let summary = state.store.bulk_insert_and_summarize(&records).await?;

    info!(
        upload_bytes,
        total_items = summary.total_items,
        total_categories = summary.total_categories,
        total_price = summary.total_price,
        "price batch committed"
    );

    Ok(Json(summary))
}

/// `GET /api/v0/prices`: the whole collection as a zip holding `data.csv`.
pub async fn download_prices(State(state): State<AppState>) -> AppResult<Response> {
    let records = state.store.read_all().await?;
    let count = records.len();

    let body = run_blocking(move || archive::encode(&records)).await?;

    info!(records = count, bytes = body.len(), "price export served");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (header::CONTENT_DISPOSITION, EXPORT_DISPOSITION),
        ],
        body,
    )
        .into_response())
}

async fn read_upload_field(multipart: &mut Multipart) -> AppResult<Bytes> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::invalid_upload(err.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|err| AppError::invalid_upload(err.body_text()));
        }
    }

    Err(AppError::invalid_upload(format!(
        "multipart field `{UPLOAD_FIELD}` is missing"
    )))
}

/// Archive and table work is CPU-bound; keep it off the async workers.
async fn run_blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AppError::internal(format!("blocking task failed: {err}")))?
}
