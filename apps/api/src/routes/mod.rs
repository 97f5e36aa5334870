pub mod health;
pub mod pagination;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::applications::handlers as applications;
use crate::cv::handlers as cvs;
use crate::listings::handlers as jobs;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Job listings
        .route("/api/v1/jobs", post(jobs::handle_create))
        .route("/api/v1/jobs/search", get(jobs::handle_search))
        .route("/api/v1/jobs/featured", get(jobs::handle_featured))
        .route(
            "/api/v1/jobs/:id",
            get(jobs::handle_get)
                .put(jobs::handle_update)
                .delete(jobs::handle_delete),
        )
        .route("/api/v1/jobs/:id/view", post(jobs::handle_view))
        .route("/api/v1/jobs/:id/apply", post(applications::handle_apply))
        .route(
            "/api/v1/jobs/:id/applications",
            get(applications::handle_list_for_job),
        )
        .route(
            "/api/v1/jobs/:id/applications/statistics",
            get(applications::handle_statistics),
        )
        // Applications
        .route("/api/v1/applications/mine", get(applications::handle_mine))
        .route(
            "/api/v1/applications/:id",
            get(applications::handle_get)
                .patch(applications::handle_update_details)
                .delete(applications::handle_delete),
        )
        .route(
            "/api/v1/applications/:id/status",
            patch(applications::handle_update_status),
        )
        .route(
            "/api/v1/applications/:id/withdraw",
            post(applications::handle_withdraw),
        )
        // CVs
        .route("/api/v1/cvs", get(cvs::handle_list).post(cvs::handle_create))
        .route("/api/v1/cvs/public/:id", get(cvs::handle_get_public))
        .route(
            "/api/v1/cvs/:id",
            get(cvs::handle_get)
                .put(cvs::handle_update)
                .delete(cvs::handle_delete),
        )
        .route("/api/v1/cvs/:id/default", patch(cvs::handle_set_default))
        .with_state(state)
}
