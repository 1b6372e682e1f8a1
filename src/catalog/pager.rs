//! Paginated group listing with one re-authentication per rejected page.
//!
//! The loop asks a [`PageSource`] for page 1, 2, ... until a page arrives
//! without a `next` link. If a page comes back `401`, the session refreshes
//! once and the same page is retried once. A page that still fails ends the
//! walk: the pages already collected are returned and the failure is
//! logged, so a mid-listing token expiry costs at most the tail of one
//! group.

use async_trait::async_trait;

use super::CatalogError;
use super::auth::AuthSession;
use super::dto::{RawStream, StreamPage};

/// Upstream page size.
pub const PAGE_SIZE: u32 = 250;

/// Hard stop against a server that never stops returning `next`.
const MAX_PAGES: u32 = 10_000;

/// Fetches one page of one group with a given bearer token.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        group: &str,
        page: u32,
        token: &str,
    ) -> Result<StreamPage, CatalogError>;
}

/// Every stream listed for `group`.
///
/// Fails only when the first page can't be fetched; later failures
/// truncate the result instead.
pub async fn collect_group(
    source: &dyn PageSource,
    auth: &AuthSession,
    group: &str,
) -> Result<Vec<RawStream>, CatalogError> {
    let mut token = auth.bearer().await?;
    let mut streams = Vec::new();
    let mut page = 1;

    while page <= MAX_PAGES {
        let result = match source.fetch_page(group, page, &token).await {
            Err(CatalogError::Unauthorized) => {
                match auth.refresh_after_rejection(&token).await {
                    Ok(fresh) => {
                        token = fresh;
                        source.fetch_page(group, page, &token).await
                    }
                    Err(e) => Err(e),
                }
            }
            other => other,
        };

        match result {
            Ok(StreamPage { results, next, .. }) => {
                tracing::debug!(
                    target: "catalog",
                    "Group '{}' page {}: {} streams",
                    group,
                    page,
                    results.len()
                );
                streams.extend(results);
                if next.is_none() {
                    return Ok(streams);
                }
                page += 1;
            }
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                tracing::error!(
                    target: "catalog",
                    "Listing of group '{}' stopped at page {}: {} (keeping {} streams)",
                    group,
                    page,
                    e,
                    streams.len()
                );
                return Ok(streams);
            }
        }
    }

    tracing::warn!(target: "catalog", "Group '{}' exceeded {} pages", group, MAX_PAGES);
    Ok(streams)
}

#[cfg(test)]
pub mod mocks {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// Serves `pages` in order. Pages listed in `reject_once` return `401`
    /// on their first request; pages in `reject_always` always do.
    #[derive(Default)]
    pub struct ScriptedPages {
        pub pages: Vec<Vec<RawStream>>,
        pub reject_once: Mutex<HashSet<u32>>,
        pub reject_always: HashSet<u32>,
        pub requests: AtomicUsize,
        /// `(page, token)` per request
        pub seen: Mutex<Vec<(u32, String)>>,
    }

    impl ScriptedPages {
        pub fn new(pages: Vec<Vec<RawStream>>) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }

        pub fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for ScriptedPages {
        async fn fetch_page(
            &self,
            _group: &str,
            page: u32,
            token: &str,
        ) -> Result<StreamPage, CatalogError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push((page, token.to_string()));

            if self.reject_always.contains(&page) || self.reject_once.lock().remove(&page) {
                return Err(CatalogError::Unauthorized);
            }
            let idx = (page - 1) as usize;
            let results = self.pages.get(idx).cloned().ok_or(CatalogError::NotFound)?;
            let next = (idx + 1 < self.pages.len()).then(|| format!("?page={}", page + 1));
            Ok(StreamPage {
                count: None,
                next,
                results,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::mocks::ScriptedPages;
    use super::*;
    use crate::catalog::auth::mocks::MockIssuer;

    fn raw(id: i64) -> RawStream {
        RawStream {
            id,
            name: Some(format!("Stream {id}")),
            ..Default::default()
        }
    }

    fn auth(issuer: Arc<MockIssuer>) -> AuthSession {
        AuthSession::new(issuer, Duration::from_secs(900), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_collects_every_page() {
        let source = ScriptedPages::new(vec![vec![raw(1), raw(2)], vec![raw(3)], vec![raw(4)]]);
        let issuer = Arc::new(MockIssuer::default());
        let streams = collect_group(&source, &auth(issuer.clone()), "Movies")
            .await
            .unwrap();

        let ids: Vec<i64> = streams.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(source.requests(), 3);
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_mid_listing_refreshes_once() {
        let source = ScriptedPages::new(vec![vec![raw(1)], vec![raw(2)], vec![raw(3)]]);
        source.reject_once.lock().insert(2);
        let issuer = Arc::new(MockIssuer::default());

        let streams = collect_group(&source, &auth(issuer.clone()), "Movies")
            .await
            .unwrap();

        assert_eq!(streams.len(), 3);
        // initial login + exactly one refresh
        assert_eq!(issuer.calls(), 2);
        // page 2 requested twice, the retry with the new token
        let seen = source.seen.lock().clone();
        assert_eq!(
            seen,
            vec![
                (1, "token-1".to_string()),
                (2, "token-1".to_string()),
                (2, "token-2".to_string()),
                (3, "token-2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_failure_keeps_earlier_pages() {
        let mut source = ScriptedPages::new(vec![vec![raw(1), raw(2)], vec![raw(3)], vec![raw(4)]]);
        source.reject_always.insert(2);
        let issuer = Arc::new(MockIssuer::default());

        let streams = collect_group(&source, &auth(issuer.clone()), "Movies")
            .await
            .unwrap();

        assert_eq!(streams.len(), 2);
        assert_eq!(issuer.calls(), 2);
        // page 2 tried twice, page 3 never
        assert_eq!(source.requests(), 3);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_an_error() {
        let mut source = ScriptedPages::new(vec![vec![raw(1)]]);
        source.reject_always.insert(1);
        let result = collect_group(&source, &auth(Arc::new(MockIssuer::default())), "Movies").await;
        assert!(matches!(result, Err(CatalogError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_login_failure_is_an_error() {
        let source = ScriptedPages::new(vec![vec![raw(1)]]);
        let issuer = Arc::new(MockIssuer {
            fail: true,
            ..Default::default()
        });
        let result = collect_group(&source, &auth(issuer), "Movies").await;
        assert!(matches!(result, Err(CatalogError::Login(_))));
        assert_eq!(source.requests(), 0);
    }
}
