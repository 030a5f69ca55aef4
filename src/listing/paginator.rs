//! Category queue pagination.
//!
//! A distributor exposes several catalogue sections (CD, vinyl, tape), each
//! paginated. Running out of pages in one section moves on to the next queued
//! section instead of stopping the crawl.

use crate::catalogue::MediaType;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// One catalogue section of a distributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUrl {
    pub url: String,
    pub media_type: MediaType,
}

/// The page the crawl should fetch next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTarget {
    pub url: String,
    pub media_type: Option<MediaType>,
}

/// Serializable crawl position, so an interrupted crawl can be resumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginatorState {
    pub current_url: Option<String>,
    pub current_media_type: Option<MediaType>,
    pub queue: VecDeque<CategoryUrl>,
    pub visited: HashSet<String>,
    pub pages_fetched: usize,
}

#[derive(Debug, Clone)]
pub struct CategoryPaginator {
    state: PaginatorState,
}

impl CategoryPaginator {
    /// Starts at `start_url`, or at the first category when none is given.
    /// Every other category is queued in configuration order.
    pub fn new(categories: &[CategoryUrl], start_url: Option<&str>) -> Self {
        let start = match start_url {
            Some(url) => Some(PageTarget {
                url: url.to_string(),
                media_type: categories
                    .iter()
                    .find(|c| c.url == url)
                    .map(|c| c.media_type),
            }),
            None => categories.first().map(|c| PageTarget {
                url: c.url.clone(),
                media_type: Some(c.media_type),
            }),
        };

        let mut queue = VecDeque::new();
        let mut seen: HashSet<&str> = HashSet::new();
        if let Some(start) = &start {
            seen.insert(start.url.as_str());
        }
        for category in categories {
            if seen.insert(category.url.as_str()) {
                queue.push_back(category.clone());
            }
        }

        Self {
            state: PaginatorState {
                current_url: start.as_ref().map(|s| s.url.clone()),
                current_media_type: start.and_then(|s| s.media_type),
                queue,
                visited: HashSet::new(),
                pages_fetched: 0,
            },
        }
    }

    pub fn from_state(state: PaginatorState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &PaginatorState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.current_url.is_none() && self.state.queue.is_empty()
    }

    pub fn current(&self) -> Option<PageTarget> {
        self.state.current_url.as_ref().map(|url| PageTarget {
            url: url.clone(),
            media_type: self.state.current_media_type,
        })
    }

    /// Records that the current page was fetched and moves to the next one.
    ///
    /// `next_page_url` is the page's own "next" link. Without one, or when it
    /// points back to an already visited page, the next queued category
    /// becomes current.
    pub fn advance(&mut self, next_page_url: Option<String>) {
        if let Some(current) = self.state.current_url.take() {
            self.state.visited.insert(current);
            self.state.pages_fetched += 1;
        }

        match next_page_url {
            Some(next) if !self.state.visited.contains(&next) => {
                self.state.current_url = Some(next);
                return;
            }
            Some(next) => {
                warn!("Next page {} was already visited, moving to next category", next);
            }
            None => {}
        }

        while let Some(category) = self.state.queue.pop_front() {
            if self.state.visited.contains(&category.url) {
                continue;
            }
            debug!(
                "Switching to category {} ({})",
                category.url,
                category.media_type.as_str()
            );
            self.state.current_url = Some(category.url);
            self.state.current_media_type = Some(category.media_type);
            return;
        }

        self.state.current_media_type = None;
    }
}
