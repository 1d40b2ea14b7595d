//! Catalog Query & Facet Filter
pub mod facets;
pub mod filter;
pub mod predicate;
pub mod search;

pub use facets::{FacetOption, FacetSummary, ReferenceKind, ReferenceRow};
pub use filter::{CatalogFilters, PagingDefaults, SortOrder, StorageOrder};
pub use predicate::Predicate;
pub use search::{PageMeta, PricedProduct, SearchPage};
