//! File upload, listing, reindex, and deletion endpoints

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::indexing::service::IngestOutcome;
use crate::server::state::AppState;
use crate::types::response::{FileUploadStatus, FilesListResponse, IndexResponse};

/// POST /files - upload and index one or more files
///
/// Each file gets its own status entry; the response is 200 only when every
/// file indexed successfully, mirroring the consistency guarantee: success
/// means both stores agree.
pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<FileUploadStatus>>)> {
    let mut statuses = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::internal(format!("Failed to read multipart field: {}", e)))?
    {
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("file_{}.bin", Uuid::new_v4()));

        let data = match field.bytes().await {
            Ok(d) => d,
            Err(e) => {
                statuses.push(FileUploadStatus::failed(
                    filename,
                    format!("failed to read upload: {}", e),
                ));
                continue;
            }
        };

        tracing::info!("Uploading '{}' ({} bytes)", filename, data.len());

        match state.indexing().ingest_upload(&filename, &data).await {
            Ok(IngestOutcome::Indexed(result)) => {
                statuses.push(FileUploadStatus::success(filename, result.chunks_written));
            }
            Ok(IngestOutcome::Unchanged) => {
                statuses.push(FileUploadStatus::success(filename, 0));
            }
            Err(e) => {
                tracing::error!("Indexing '{}' failed: {}", filename, e);
                statuses.push(FileUploadStatus::failed(filename, e.to_string()));
            }
        }
    }

    if statuses.is_empty() {
        return Err(Error::invalid_document("no files uploaded"));
    }

    let all_ok = statuses.iter().all(|s| s.status == "success");
    let code = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((code, Json(statuses)))
}

/// GET /files - list registered documents
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FilesListResponse>> {
    let files = state.indexing().list()?;
    Ok(Json(FilesListResponse { files }))
}

/// DELETE /files/{path} - remove a document from both stores
pub async fn delete_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<IndexResponse>> {
    state.indexing().remove(&path).await?;
    Ok(Json(IndexResponse {
        status: "ok".to_string(),
        message: format!("removed '{}'", path),
    }))
}

/// POST /index/{path} - force a rebuild of a stored document
pub async fn reindex_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<IndexResponse>> {
    let result = state.indexing().reindex_stored(&path).await?;
    Ok(Json(IndexResponse {
        status: "ok".to_string(),
        message: format!(
            "reindexed '{}' ({} chunks)",
            result.file_path, result.chunks_written
        ),
    }))
}

/// POST /retry/{path} - re-run the vector write for pending rows
pub async fn retry_pending(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<IndexResponse>> {
    let result = state.indexing().retry_pending(&path).await?;
    let message = if result.chunks_written == 0 {
        format!("'{}' has no pending chunks", path)
    } else {
        format!(
            "restored {} pending chunks for '{}'",
            result.chunks_written, path
        )
    };
    Ok(Json(IndexResponse {
        status: "ok".to_string(),
        message,
    }))
}
