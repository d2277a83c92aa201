//! Per-index facet filters
//!
//! Taxonomy indexes hold three record shapes told apart only by which fields
//! are present:
//!
//! | Shape     | `version` | `namespace` | `predicate` |
//! |-----------|-----------|-------------|-------------|
//! | root      | yes       | yes         | no          |
//! | predicate | no        | yes         | no          |
//! | entry     | no        | yes         | yes         |
//!
//! The filters below select a shape by testing exactly those fields.

use super::{FacetSelection, TaxonomyFacet};
use crate::models::Collection;
use crate::store::FilterExpr;

pub fn taxonomy_facet_filter(facet: TaxonomyFacet) -> FilterExpr {
    match facet {
        TaxonomyFacet::Namespaces => FilterExpr::exists("version"),
        TaxonomyFacet::Predicates => FilterExpr::And(vec![
            FilterExpr::group(FilterExpr::exists("namespace")),
            FilterExpr::not(FilterExpr::exists("version")),
            FilterExpr::not(FilterExpr::exists("predicate")),
        ]),
        TaxonomyFacet::Values => FilterExpr::exists("predicate"),
    }
}

/// OR of the selected shapes
pub fn taxonomy_filter(facets: &[TaxonomyFacet]) -> Option<FilterExpr> {
    FilterExpr::any(facets.iter().map(|f| taxonomy_facet_filter(*f)).collect())
}

/// OR of `galaxy = '<name>'`
pub fn galaxy_filter(galaxies: &[String]) -> Option<FilterExpr> {
    FilterExpr::any(
        galaxies
            .iter()
            .map(|name| FilterExpr::equals("galaxy", name.as_str()))
            .collect(),
    )
}

/// Filter for one index. Indexes that are not a known collection, or whose
/// collection has no facets, never get a filter.
pub fn filter_for(collection: Option<Collection>, selection: &FacetSelection) -> Option<FilterExpr> {
    match collection? {
        Collection::Taxonomies => taxonomy_filter(&selection.taxonomies),
        Collection::GalaxyClusters => galaxy_filter(&selection.galaxies),
        Collection::Objects => None,
    }
}

/// Requested facet distribution restricted to what the index can facet on
pub fn distribution_for(collection: Option<Collection>, selection: &FacetSelection) -> Vec<String> {
    let Some(collection) = collection else {
        return Vec::new();
    };
    let filterable = collection.filterable_attributes();
    selection
        .distribution
        .iter()
        .filter(|attr| filterable.contains(&attr.as_str()))
        .cloned()
        .collect()
}
