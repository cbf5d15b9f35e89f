//! Data file loading. Every loader degrades to an empty value on failure; the
//! viewer keeps working with whatever did load.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use pzmap_shared::{ContainerFile, ContainerSet, Mark, PoiRecord, SpriteLookup};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::{POI_PATH, SPRITE_LOOKUP_PATH, container_path};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where data files come from. The browser build fetches over HTTP; tests
/// substitute canned or deferred responses.
pub trait Fetch {
    fn fetch_text(&self, path: &str) -> LocalBoxFuture<'static, Result<String, FetchError>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetch;

impl Fetch for HttpFetch {
    fn fetch_text(&self, path: &str) -> LocalBoxFuture<'static, Result<String, FetchError>> {
        let path = path.to_string();
        async move {
            let resp = gloo_net::http::Request::get(&path)
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            if !resp.ok() {
                return Err(FetchError::Status(resp.status()));
            }
            resp.text()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))
        }
        .boxed_local()
    }
}

pub async fn fetch_json<T: DeserializeOwned>(fetch: &dyn Fetch, path: &str) -> Result<T, FetchError> {
    let text = fetch.fetch_text(path).await?;
    Ok(serde_json::from_str(&text)?)
}

pub async fn load_or_default<T: DeserializeOwned + Default>(fetch: &dyn Fetch, path: &str) -> T {
    match fetch_json(fetch, path).await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path, error = %e, "data file unavailable, using empty default");
            T::default()
        }
    }
}

pub async fn load_poi_marks(fetch: &dyn Fetch) -> Vec<Mark> {
    let records: Vec<PoiRecord> = load_or_default(fetch, POI_PATH).await;
    let marks: Vec<Mark> = records.into_iter().map(PoiRecord::into_mark).collect();
    tracing::info!(count = marks.len(), "POI markers loaded");
    marks
}

pub async fn load_marks(fetch: &dyn Fetch, path: &str) -> Vec<Mark> {
    load_or_default(fetch, path).await
}

/// Coordinates of one container type, `None` when the file or the type is missing.
pub async fn load_containers(fetch: &dyn Fetch, container_type: &str) -> Option<ContainerSet> {
    let path = container_path(container_type);
    match fetch_json::<ContainerFile>(fetch, &path).await {
        Ok(mut file) => file.remove(container_type),
        Err(e) => {
            tracing::error!(container_type, error = %e, "failed to load container data");
            None
        }
    }
}

type LookupFuture = Shared<LocalBoxFuture<'static, Rc<SpriteLookup>>>;

/// The sprite lookup is large and immutable, so it is fetched at most once.
/// The first caller stores the in-flight future; everyone after awaits the
/// same one, including callers that arrive before it resolves.
#[derive(Clone)]
pub struct SpriteCache {
    fetch: Rc<dyn Fetch>,
    path: String,
    pending: Rc<RefCell<Option<LookupFuture>>>,
}

impl fmt::Debug for SpriteCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteCache")
            .field("path", &self.path)
            .field("started", &self.pending.borrow().is_some())
            .finish()
    }
}

impl SpriteCache {
    pub fn new(fetch: Rc<dyn Fetch>) -> Self {
        Self::with_path(fetch, SPRITE_LOOKUP_PATH)
    }

    pub fn with_path(fetch: Rc<dyn Fetch>, path: &str) -> Self {
        Self {
            fetch,
            path: path.to_string(),
            pending: Rc::new(RefCell::new(None)),
        }
    }

    pub fn get(&self) -> LookupFuture {
        self.pending
            .borrow_mut()
            .get_or_insert_with(|| {
                let fetch = self.fetch.clone();
                let path = self.path.clone();
                async move {
                    let lookup: SpriteLookup = load_or_default(fetch.as_ref(), &path).await;
                    tracing::info!(sprites = lookup.len(), "sprite lookup loaded");
                    Rc::new(lookup)
                }
                .boxed_local()
                .shared()
            })
            .clone()
    }
}
