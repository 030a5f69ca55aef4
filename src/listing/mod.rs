mod error;
mod paginator;
mod selector_source;
mod source;

pub use error::{ListingError, ListingErrorKind};
pub use paginator::{CategoryPaginator, CategoryUrl, PageTarget, PaginatorState};
pub use selector_source::{split_raw_title, DistributorSelectors, SelectorListingSource};
pub use source::{ListingPage, ListingSource, RawListing};
