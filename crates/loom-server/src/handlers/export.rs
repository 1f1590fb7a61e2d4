use axum::http::header;
use axum::response::{IntoResponse, Json};
use loom_core::{generate_react_code, EXPORT_FILENAME};
use loom_suggest::BuilderContext;

/// Generate the component for a posted canvas and return it as a download.
pub async fn export_code(Json(context): Json<BuilderContext>) -> impl IntoResponse {
    let canvas = context.into_canvas();
    let code = generate_react_code(&canvas.nodes, &canvas.edges);

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        code,
    )
}
