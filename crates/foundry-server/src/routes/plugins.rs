//! Plugin management and download routes

use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use tracing::debug;

use foundry_registry::db::SearchField;
use foundry_registry::registry::{FileDelivery, FileUpload, PublishRequest};

use crate::{
    AppState,
    error::{ApiError, Result},
    models::{
        ApiResponse, DownloadQuery, ListQuery, Paginated, PluginDetails, PluginSummary,
        PublishResponse, SearchQuery, VersionDetails,
    },
};

/// Create plugin routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plugins).post(publish_plugin))
        // Static paths before the catch-all plugin name routes
        .route("/index", get(registry_index))
        .route("/search", get(search_plugins))
        .route("/{name}", get(show_plugin))
        .route("/{name}/download", get(download_latest))
        .route("/{name}/versions/{version}", get(show_version))
        .route("/{name}/versions/{version}/download", get(download_version))
        .route(
            "/{name}/versions/{version}/files/{filename}",
            get(download_file),
        )
}

/// List plugins with optional search and author filtering
async fn list_plugins(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<PluginSummary>>> {
    debug!("Listing plugins with query: {:?}", query);

    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 100);

    let (plugins, total) = state
        .registry
        .list_plugins(
            query.search.as_deref(),
            SearchField::default(),
            query.author.as_deref(),
            per_page,
            (page - 1) * per_page,
        )
        .await?;

    let summaries = summarize(&state, plugins).await?;
    Ok(Json(Paginated::new(summaries, page, per_page, total)))
}

/// Search plugins by a single field (or all of them)
async fn search_plugins(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Paginated<PluginSummary>>> {
    if query.q.trim().is_empty() {
        return Err(ApiError::validation("search term cannot be empty"));
    }

    let field = match &query.field {
        Some(field) => field.parse::<SearchField>()?,
        None => SearchField::Any,
    };

    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 100);

    let (plugins, total) = state
        .registry
        .list_plugins(Some(&query.q), field, None, per_page, (page - 1) * per_page)
        .await?;

    let summaries = summarize(&state, plugins).await?;
    Ok(Json(Paginated::new(summaries, page, per_page, total)))
}

/// Attach latest-version and version-count information to a page of
/// plugin rows.
async fn summarize(
    state: &AppState,
    plugins: Vec<foundry_registry::entities::Plugin>,
) -> Result<Vec<PluginSummary>> {
    let mut summaries = Vec::with_capacity(plugins.len());
    for plugin in plugins {
        let (plugin, versions) = state.registry.get_plugin_versions(&plugin.name).await?;
        let latest = versions
            .iter()
            .find(|v| v.is_latest)
            .or_else(|| versions.first())
            .map(|v| v.version.clone());
        summaries.push(PluginSummary::from_plugin(
            plugin,
            latest,
            versions.len() as i64,
        ));
    }
    Ok(summaries)
}

/// Machine-readable index of every plugin and its versions
async fn registry_index(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let index = state.registry.list_index().await?;
    Ok(Json(serde_json::to_value(index)?))
}

/// Publish a new plugin version from a multipart form
async fn publish_plugin(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<PublishResponse>>)> {
    let mut request = PublishRequest::default();
    let mut saw_plugin_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };

        match field_name.as_str() {
            "plugin_file" => {
                let upload = read_file_field(field).await?;
                if !upload.file_name.ends_with(".py") {
                    return Err(ApiError::validation("plugin file must be a .py file"));
                }
                saw_plugin_file = true;
                request.plugin_file = upload;
            }
            "manifest_file" => {
                request.manifest_file = Some(read_file_field(field).await?);
            }
            "additional_files" | "additional_files[]" => {
                request.additional_files.push(read_file_field(field).await?);
            }
            "name" => request.name = Some(read_text_field(field).await?),
            "version" => request.version = Some(read_text_field(field).await?),
            "description" => request.description = Some(read_text_field(field).await?),
            "author" => request.author = Some(read_text_field(field).await?),
            other => {
                debug!("Ignoring unknown multipart field {:?}", other);
            }
        }
    }

    if !saw_plugin_file {
        return Err(ApiError::validation("plugin_file field is required"));
    }
    if request.plugin_file.content.is_empty() {
        return Err(ApiError::validation("plugin file is empty"));
    }

    let receipt = state.registry.publish(request).await?;

    let response = PublishResponse {
        download_url: format!(
            "/api/v1/plugins/{}/versions/{}/download",
            receipt.plugin_name, receipt.version
        ),
        plugin: receipt.plugin_name,
        version: receipt.version,
        checksum: receipt.checksum,
        is_latest: receipt.is_latest,
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            response,
            "Plugin published successfully",
        )),
    ))
}

async fn read_file_field(field: axum::extract::multipart::Field<'_>) -> Result<FileUpload> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read upload: {}", e)))?;

    Ok(FileUpload {
        file_name,
        content: content.to_vec(),
    })
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read field: {}", e)))
}

/// Show a plugin and all of its versions
async fn show_plugin(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<PluginDetails>>> {
    let (plugin, versions) = state.registry.get_plugin_versions(&name).await?;
    Ok(Json(ApiResponse::new(PluginDetails::new(plugin, versions))))
}

/// Show one version of a plugin
async fn show_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<ApiResponse<VersionDetails>>> {
    let (plugin, version, files, dependencies) =
        state.registry.get_version_details(&name, &version).await?;
    Ok(Json(ApiResponse::new(VersionDetails::new(
        plugin,
        version,
        files,
        dependencies,
    ))))
}

/// Download the latest version, as a ZIP bundle or a JSON file listing
async fn download_latest(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    download(&state, &name, "latest", query).await
}

/// Download a specific version, as a ZIP bundle or a JSON file listing
async fn download_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    download(&state, &name, &version, query).await
}

async fn download(
    state: &AppState,
    name: &str,
    version_ref: &str,
    query: DownloadQuery,
) -> Result<Response> {
    match query.format.as_deref() {
        Some("json") => {
            let listing = state.registry.get_version_files(name, version_ref).await?;
            Ok(Json(listing).into_response())
        }
        None | Some("zip") => {
            let download = state.registry.get_archive(name, version_ref).await?;
            // Read the staged archive before the temp file drops.
            let content = tokio::fs::read(download.archive.path()).await?;

            Ok((
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", download.file_name),
                    ),
                ],
                Body::from(content),
            )
                .into_response())
        }
        Some(other) => Err(ApiError::bad_request(format!(
            "unknown download format {:?} (expected zip or json)",
            other
        ))),
    }
}

/// Download a single file of a version
async fn download_file(
    State(state): State<AppState>,
    Path((name, version, filename)): Path<(String, String, String)>,
) -> Result<Response> {
    match state.registry.get_file(&name, &version, &filename).await? {
        FileDelivery::Redirect(url) => Ok(Redirect::temporary(&url).into_response()),
        FileDelivery::Stream {
            content,
            content_type,
            file_name,
        } => Ok((
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file_name),
                ),
            ],
            Body::from(content),
        )
            .into_response()),
    }
}
