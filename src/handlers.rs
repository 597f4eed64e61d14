use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{
    Article, ArticleView, Category, HeroMode, LocalArticleView, NormalizedWeather,
};
use crate::state::AppState;
use crate::weather::WeatherError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
            code: status.as_u16(),
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct HomeContext {
    pub hero: Option<ArticleView>,
    pub latest: Vec<LocalArticleView>,
    pub trending: Vec<LocalArticleView>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct CategoryContext {
    pub category: Category,
    pub articles: Vec<LocalArticleView>,
}

#[derive(Debug, Serialize)]
pub struct ArticleContext {
    pub article: LocalArticleView,
    pub body: String,
}

fn summary(state: &AppState, article: &Article) -> LocalArticleView {
    let category = state
        .store
        .get_category(article.category_id)
        .map(|c| c.name)
        .unwrap_or_default();
    LocalArticleView::new(article, &category)
}

/// Mode-governed choice between the external hero and the newest local
/// article. `None` means the page renders without a hero slot — a normal
/// state, not an error.
async fn select_hero(state: &AppState) -> Option<ArticleView> {
    let newest = state.store.list_recent(1).into_iter().next();
    match state.config.hero_mode {
        HeroMode::LocalOnly => newest.map(|a| ArticleView::Local(summary(state, &a))),
        HeroMode::PreferLocal => match newest {
            Some(a) => Some(ArticleView::Local(summary(state, &a))),
            None => state
                .hero_resolver()
                .get_hero()
                .await
                .map(ArticleView::external),
        },
        HeroMode::PreferExternal => match state.hero_resolver().get_hero().await {
            Some(hero) => Some(ArticleView::external(hero)),
            None => newest.map(|a| ArticleView::Local(summary(state, &a))),
        },
    }
}

pub async fn home(State(state): State<AppState>) -> Json<HomeContext> {
    let recent = state.store.list_recent(10);
    let hero = select_hero(&state).await;
    let hero_local_id = match &hero {
        Some(ArticleView::Local(view)) => Some(view.id),
        _ => None,
    };

    let latest = recent
        .iter()
        .filter(|a| Some(a.id) != hero_local_id)
        .take(4)
        .map(|a| summary(&state, a))
        .collect();
    let trending = recent.iter().take(5).map(|a| summary(&state, a)).collect();

    Json(HomeContext {
        hero,
        latest,
        trending,
        categories: state.store.list_categories(),
    })
}

pub async fn category_page(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<CategoryContext>, (StatusCode, Json<ErrorResponse>)> {
    let category = state
        .store
        .get_category(id)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Category not found"))?;
    let articles = state
        .store
        .list_by_category(id)
        .iter()
        .map(|a| LocalArticleView::new(a, &category.name))
        .collect();
    Ok(Json(CategoryContext { category, articles }))
}

pub async fn article_detail(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ArticleContext>, (StatusCode, Json<ErrorResponse>)> {
    let article = state
        .store
        .get_article(id)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Article not found"))?;
    Ok(Json(ArticleContext {
        article: summary(&state, &article),
        body: article.body,
    }))
}

/// Detail page for an externally sourced article. Unknown or expired
/// identifiers fall back to the home experience instead of erroring.
pub async fn external_article_detail(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Response {
    let resolved = state
        .registry()
        .resolve(
            &external_id,
            &state.http,
            state.config.page_fetch_timeout(),
            state.config.max_paragraphs,
        )
        .await;
    match resolved {
        Some(article) => Json(ArticleView::external(article)).into_response(),
        None => {
            info!(%external_id, "Unknown or expired external article; redirecting home");
            Redirect::to("/").into_response()
        }
    }
}

pub async fn hero_api(State(state): State<AppState>) -> Response {
    match select_hero(&state).await {
        Some(view) => Json(view).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn weather_proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<NormalizedWeather>, (StatusCode, Json<ErrorResponse>)> {
    if let Some(expected) = &state.config.csrf_token {
        let provided = headers.get("x-csrf-token").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(error_response(
                StatusCode::FORBIDDEN,
                "CSRF token missing or invalid",
            ));
        }
    }

    let lat = body
        .get("lat")
        .and_then(Value::as_f64)
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "lat must be a number"))?;
    let lon = body
        .get("lon")
        .and_then(Value::as_f64)
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "lon must be a number"))?;

    state.weather().get_weather(lat, lon).await.map(Json).map_err(|e| {
        warn!(error = %e, "Weather proxy request failed");
        let status = match e {
            WeatherError::InvalidCoordinates(_) => StatusCode::BAD_REQUEST,
            WeatherError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
            WeatherError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        error_response(status, &e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::routes::create_router;
    use crate::store;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(mode: HeroMode, seed: bool, csrf_token: Option<&str>) -> AppState {
        let mut config = Config::default();
        config.hero_mode = mode;
        config.csrf_token = csrf_token.map(str::to_string);
        let state = AppState::new(config).unwrap();
        if seed {
            store::seed_demo(state.store.as_ref());
        }
        state
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_home_context_with_local_hero() {
        let app = create_router(test_state(HeroMode::LocalOnly, true, None));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let context = body_json(response).await;
        assert_eq!(context["hero"]["external"], Value::Bool(false));
        let hero_id = context["hero"]["id"].as_u64().unwrap();
        let latest = context["latest"].as_array().unwrap();
        assert_eq!(latest.len(), 4);
        assert!(latest.iter().all(|a| a["id"].as_u64() != Some(hero_id)));
        assert_eq!(context["trending"].as_array().unwrap().len(), 5);
        assert_eq!(context["categories"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_hero_endpoint_empty_store_is_no_content() {
        let app = create_router(test_state(HeroMode::LocalOnly, false, None));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/hero")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_category_page_unknown_is_not_found() {
        let app = create_router(test_state(HeroMode::LocalOnly, true, None));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/category/999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["code"].as_u64(), Some(404));
    }

    #[tokio::test]
    async fn test_article_detail_includes_body() {
        let app = create_router(test_state(HeroMode::LocalOnly, true, None));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/news/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["body"].as_str().unwrap().contains("clinical trials"));
        assert_eq!(body["article"]["category"].as_str(), Some("World"));
    }

    #[tokio::test]
    async fn test_unknown_external_article_redirects_home() {
        let app = create_router(test_state(HeroMode::LocalOnly, false, None));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/news/external/feedfeedfeedfeed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/");
    }

    #[tokio::test]
    async fn test_weather_rejects_non_numeric_coordinates() {
        let app = create_router(test_state(HeroMode::LocalOnly, false, None));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/weather")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"lat": "not-a-number", "lon": 2.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_weather_requires_csrf_token_when_configured() {
        let app = create_router(test_state(HeroMode::LocalOnly, false, Some("tok")));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/weather")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"lat": 1.0, "lon": 2.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_weather_csrf_token_accepted_then_validates_body() {
        let app = create_router(test_state(HeroMode::LocalOnly, false, Some("tok")));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/weather")
                    .header("content-type", "application/json")
                    .header("x-csrf-token", "tok")
                    .body(Body::from(r#"{"lon": 2.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
