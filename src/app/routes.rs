use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use url::Url;

use crate::app::model::{
    ErrorBody, NewReview, ReviewsResponse, WorkResponse, WorksQuery, WorksResponse,
};
use crate::catalog::{CatalogPage, DEFAULT_PAGE_URL, DetailView};
use crate::config::Config;
use crate::filter::{ALL, FilterState, filter_works};
use crate::formats::WorkRecord;
use crate::kv_store::KvStore;
use crate::reader::{ReaderError, fetch_work_detail};
use crate::reviews::{Reviews, newest_first, summarize};

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

#[derive(Clone)]
pub struct AppState {
    catalog: Arc<CatalogPage>,
    config: Arc<Config>,
    client: reqwest::Client,
    reviews: Reviews,
}

impl AppState {
    pub fn new(
        works: Vec<WorkRecord>,
        config: Config,
        client: reqwest::Client,
        store: Arc<dyn KvStore>,
    ) -> anyhow::Result<Self> {
        let url = Url::parse(DEFAULT_PAGE_URL)?;
        Ok(Self {
            catalog: Arc::new(CatalogPage::open(works, url, config.reader_route.clone())),
            config: Arc::new(config),
            client,
            reviews: Reviews::new(store),
        })
    }
}

/// API routes only; the caller adds the static fallback.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/works", get(list_works))
        .route("/api/works/:slug", get(get_work))
        .route(
            "/api/works/:slug/reviews",
            get(list_reviews).post(add_review).delete(clear_reviews),
        )
        .route("/api/author", get(get_author))
        .route("/api/author/profile", get(get_author_profile))
        .with_state(state)
}

/// API routes plus the static site in `web_dir` (index.html for unknown
/// paths), all traced.
pub fn site(state: AppState, web_dir: &std::path::Path) -> Router {
    let web_index = web_dir.join("index.html");
    let app = if web_index.exists() {
        let static_files = ServeDir::new(web_dir).not_found_service(ServeFile::new(web_index));
        router(state).fallback_service(static_files)
    } else {
        tracing::warn!(web_dir = %web_dir.display(), "static site not found");
        router(state).fallback(|| async { (StatusCode::NOT_FOUND, "not found\n") })
    };
    app.layer(TraceLayer::new_for_http())
}

async fn list_works(
    State(state): State<AppState>,
    Query(q): Query<WorksQuery>,
) -> Json<WorksResponse> {
    let filter = FilterState::new(
        q.q.unwrap_or_default(),
        q.year.as_deref().unwrap_or(ALL),
        q.category.as_deref().unwrap_or(ALL),
    );
    let works = filter_works(state.catalog.works(), &filter)
        .into_iter()
        .map(|work| crate::catalog::Card::new(work, &state.config.reader_route))
        .collect();

    Json(WorksResponse {
        query: crate::url_state::to_query(&filter),
        works,
        years: state.catalog.year_options(),
        categories: state.catalog.category_options(),
    })
}

async fn get_work(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<WorkResponse>, ApiError> {
    let summary = summarize(&review_list(&state, &slug).await?);

    match fetch_work_detail(&state.client, &state.config, &slug).await {
        Ok(detail) => Ok(Json(WorkResponse {
            detail: DetailView::new(&detail.work, &state.config.reader_route, summary),
            chapters: detail.chapters,
        })),
        Err(ReaderError::Connection) => {
            // Chapters need the live query; the loaded catalog still has the rest.
            let detail = state
                .catalog
                .detail(&slug, summary)
                .ok_or_else(|| api_error(StatusCode::BAD_GATEWAY, ReaderError::Connection.to_string()))?;
            tracing::warn!(slug, "serving detail from loaded catalog");
            Ok(Json(WorkResponse {
                detail,
                chapters: Vec::new(),
            }))
        }
        Err(err @ ReaderError::MissingSlug) => {
            Err(api_error(StatusCode::BAD_REQUEST, err.to_string()))
        }
        Err(err) => Err(api_error(StatusCode::NOT_FOUND, err.to_string())),
    }
}

async fn review_list(
    state: &AppState,
    slug: &str,
) -> Result<Vec<crate::formats::ReviewRecord>, ApiError> {
    state.reviews.list(slug).await.map_err(|err| {
        tracing::error!(slug, error = %format!("{err:#}"), "read reviews");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "review store unavailable")
    })
}

fn reviews_response(reviews: &[crate::formats::ReviewRecord]) -> ReviewsResponse {
    ReviewsResponse {
        summary: summarize(reviews),
        reviews: newest_first(reviews).into_iter().cloned().collect(),
    }
}

async fn list_reviews(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ReviewsResponse>, ApiError> {
    let reviews = review_list(&state, &slug).await?;
    Ok(Json(reviews_response(&reviews)))
}

async fn add_review(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<NewReview>,
) -> Result<(StatusCode, Json<ReviewsResponse>), ApiError> {
    if !(1..=5).contains(&body.rating) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "rating must be between 1 and 5",
        ));
    }
    let reviews = state
        .reviews
        .add(&slug, body.rating, &body.comment)
        .await
        .map_err(|err| {
            tracing::error!(slug, error = %format!("{err:#}"), "add review");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "review store unavailable")
        })?;
    Ok((StatusCode::CREATED, Json(reviews_response(&reviews))))
}

async fn clear_reviews(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.reviews.clear(&slug).await.map_err(|err| {
        tracing::error!(slug, error = %format!("{err:#}"), "clear reviews");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "review store unavailable")
    })?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_author(
    State(state): State<AppState>,
) -> Result<Json<crate::author::AuthorPage>, ApiError> {
    crate::author::fetch_page(&state.client, &state.config)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Autor não encontrado."))
}

async fn get_author_profile(
    State(state): State<AppState>,
) -> Result<Json<crate::author::AuthorProfile>, ApiError> {
    crate::author::fetch_profile(&state.client, &state.config)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Autor não encontrado."))
}
