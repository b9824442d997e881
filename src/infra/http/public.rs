use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};

use crate::{application::error::HttpError, cache::ContentCacheManager, config::SiteSettings};

use super::{
    middleware::log_responses,
    views::{CategoryView, DocumentPage, HomeView, PostView, SiteView},
};

#[derive(Clone)]
pub struct HttpState {
    pub content: Arc<ContentCacheManager>,
    pub site: Arc<SiteSettings>,
}

impl HttpState {
    pub fn new(content: Arc<ContentCacheManager>, site: SiteSettings) -> Self {
        Self {
            content,
            site: Arc::new(site),
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/categories", get(categories))
        .route("/api/hot", get(hot))
        .route("/api/list", get(list_root))
        .route("/api/list/{*dir}", get(list_dir))
        .route("/api/posts/{*path}", get(post_detail))
        .route("/{*path}", get(content_page))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
}

async fn home(State(state): State<HttpState>) -> Json<HomeView> {
    Json(HomeView {
        title: state.site.brand.clone(),
        site: SiteView::from(state.site.as_ref()),
        categories: category_views(&state.content),
        hot: hot_views(&state.content),
    })
}

async fn categories(State(state): State<HttpState>) -> Json<Vec<CategoryView>> {
    Json(category_views(&state.content))
}

async fn hot(State(state): State<HttpState>) -> Json<Vec<PostView>> {
    Json(hot_views(&state.content))
}

async fn list_root(State(state): State<HttpState>) -> Response {
    listing(state, String::new()).await
}

async fn list_dir(State(state): State<HttpState>, Path(dir): Path<String>) -> Response {
    listing(state, dir).await
}

async fn listing(state: HttpState, dir: String) -> Response {
    const SOURCE: &str = "infra::http::public::listing";

    let result = blocking(SOURCE, move || {
        let key = state.content.root().normalize(&dir)?;
        state.content.list(&key).map_err(HttpError::from)
    })
    .await;

    match result {
        Ok(posts) => Json(posts.iter().map(PostView::summary).collect::<Vec<_>>()).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn post_detail(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::post_detail";

    let result = blocking(SOURCE, move || {
        let root = state.content.root();
        let key = root.normalize(&path)?;
        if !root.is_tracked_key(&key) {
            return Err(not_found(SOURCE, &key));
        }
        Ok(state.content.get(&key)?.snapshot())
    })
    .await;

    match result {
        Ok(post) => Json(PostView::full(post)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// A tracked document is served as HTML. Any other path is treated as a
/// directory: its landing document if it has one, else its listing.
async fn content_page(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::content_page";

    let result = blocking(SOURCE, move || {
        let content = &state.content;
        let site = state.site.as_ref();
        let key = content.root().normalize(&path)?;

        if content.root().is_tracked_key(&key) {
            let post = content.get(&key)?;
            let html = post.with(|post| {
                DocumentPage {
                    title: &post.title,
                    body: &post.html,
                    site,
                }
                .render_html()
            })?;
            return Ok(Page::Document(html));
        }

        if !content.root().fs_path(&key).is_dir() {
            return Err(not_found(SOURCE, &key));
        }

        let landing = landing_key(&key, &content.config().index_file_name());
        match content.get(&landing) {
            Ok(post) => {
                let title = key.rsplit('/').next().unwrap_or_default();
                let html = post.with(|post| {
                    DocumentPage {
                        title,
                        body: &post.html,
                        site,
                    }
                    .render_html()
                })?;
                Ok(Page::Document(html))
            }
            Err(err) if err.is_not_found() => {
                let posts = content.list(&key)?;
                Ok(Page::Listing(posts.iter().map(PostView::summary).collect()))
            }
            Err(err) => Err(err.into()),
        }
    })
    .await;

    match result {
        Ok(Page::Document(html)) => Html(html).into_response(),
        Ok(Page::Listing(posts)) => Json(posts).into_response(),
        Err(err) => err.into_response(),
    }
}

enum Page {
    Document(String),
    Listing(Vec<PostView>),
}

fn category_views(content: &ContentCacheManager) -> Vec<CategoryView> {
    content.categories().iter().map(CategoryView::from).collect()
}

fn hot_views(content: &ContentCacheManager) -> Vec<PostView> {
    content.hot().iter().map(PostView::summary).collect()
}

fn landing_key(dir: &str, index_file: &str) -> String {
    if dir.is_empty() {
        index_file.to_string()
    } else {
        format!("{dir}/{index_file}")
    }
}

fn not_found(source: &'static str, key: &str) -> HttpError {
    HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Not found",
        format!("no document or directory at `{key}`"),
    )
}

/// Run a call into the synchronous content facade on the blocking pool.
async fn blocking<T, F>(source: &'static str, task: F) -> Result<T, HttpError>
where
    F: FnOnce() -> Result<T, HttpError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|err| {
        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
    })?
}
