mod models;
mod schema;
mod sqlite_store;
mod store;

pub use models::{
    CandidateSortField, CatalogueIndexFilter, CatalogueIndexUpsert, CatalogueSortField,
    DecisionUpdate, Paged, PendingVerificationFilter, VerificationCandidate,
    VerificationCandidateFilter, DEFAULT_PAGE_SIZE,
};
pub use sqlite_store::SqliteCatalogueStore;
pub use store::{AgentStore, BandReferenceStore, CatalogueIndexStore, VerificationStore};
