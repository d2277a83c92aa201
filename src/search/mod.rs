//! Search query composition
//!
//! Turns front door parameters into a single-index search or one federated
//! request across every discoverable index:
//!
//! ```text
//!   q, index, page, pageSize, taxonomies, galaxy, facetsDistribution
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │  SearchRequest (query.rs)                        │
//! │  - IndexTarget: position (clamped) or "all"     │
//! │  - Pagination: page/pageSize clamped to >= 1    │
//! │  - FacetSelection: taxonomy shapes, galaxies    │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │  QueryComposer (service.rs)                      │
//! │  - discoverable index list (cached)             │
//! │  - per-index filter (facets.rs)                 │
//! │  - <mark> highlighting on all attributes        │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//!            IndexStore::search / multi_search
//! ```

pub mod facets;
pub mod query;
pub mod service;

pub use facets::{distribution_for, filter_for, galaxy_filter, taxonomy_filter};
pub use query::{FacetSelection, IndexTarget, Pagination, SearchRequest, TaxonomyFacet};
pub use service::{DiscoverableIndex, QueryComposer};
