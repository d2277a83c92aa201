//! Search request parsing
//!
//! Every parser here is total: malformed input degrades to a default instead
//! of producing an error.

use serde::Serialize;
use std::fmt;
use strum::{EnumIter, EnumString, IntoEnumIterator};

/// Which index (or indexes) a search runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTarget {
    /// Federated search over every discoverable index
    All,
    /// Position in the discoverable index list; clamped on use
    Position(i64),
}

impl IndexTarget {
    /// `all` selects every index; anything non-numeric selects position 0.
    ///
    /// Integers too large for `i64` saturate, so they still clamp to the
    /// last (or first) index.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "all" {
            return IndexTarget::All;
        }
        let position = raw.parse().unwrap_or_else(|_| saturated_integer(raw).unwrap_or(0));
        IndexTarget::Position(position)
    }

    /// Clamp a position into `0..len`; `None` for `All` or an empty list.
    pub fn resolve(&self, len: usize) -> Option<usize> {
        match self {
            IndexTarget::All => None,
            IndexTarget::Position(_) if len == 0 => None,
            IndexTarget::Position(pos) => {
                let last = len - 1;
                Some(usize::try_from(*pos).map_or(0, |p| p.min(last)))
            }
        }
    }

    /// Metrics label
    pub fn label(&self) -> &'static str {
        match self {
            IndexTarget::All => "all",
            IndexTarget::Position(_) => "single",
        }
    }
}

/// `i64::MAX` / `i64::MIN` for a well-formed integer that overflows `i64`
fn saturated_integer(raw: &str) -> Option<i64> {
    let (negative, digits) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(if negative { i64::MIN } else { i64::MAX })
}

impl Default for IndexTarget {
    fn default() -> Self {
        IndexTarget::Position(0)
    }
}

impl fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexTarget::All => f.write_str("all"),
            IndexTarget::Position(pos) => write!(f, "{}", pos),
        }
    }
}

/// 1-based page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Pagination {
    /// Both values are clamped to at least 1.
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1) as usize,
            page_size: page_size.max(1) as usize,
        }
    }

    /// Parse raw query values. An unparsable page means the first page; an
    /// unparsable page size means `default_page_size`.
    pub fn from_params(page: Option<&str>, page_size: Option<&str>, default_page_size: i64) -> Self {
        let page = page.and_then(|p| p.trim().parse().ok()).unwrap_or(1);
        let page_size = page_size
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(default_page_size);
        Self::new(page, page_size)
    }

    pub fn limit(&self) -> usize {
        self.page_size
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// Taxonomy record shape a caller can restrict results to
///
/// Declaration order is the order filters are combined in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, EnumIter, strum::Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TaxonomyFacet {
    Namespaces,
    Predicates,
    Values,
}

/// Caller-supplied facet selections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSelection {
    /// Sorted, without duplicates
    pub taxonomies: Vec<TaxonomyFacet>,
    pub galaxies: Vec<String>,
    /// Attributes to return a facet distribution for
    pub distribution: Vec<String>,
}

impl FacetSelection {
    /// Parse the comma-separated `taxonomies`, `galaxy` and
    /// `facetsDistribution` parameters. Unknown taxonomy tokens are ignored.
    pub fn from_params(
        taxonomies: Option<&str>,
        galaxies: Option<&str>,
        distribution: Option<&str>,
    ) -> Self {
        let wanted: Vec<TaxonomyFacet> = split_list(taxonomies)
            .filter_map(|token| token.parse().ok())
            .collect();

        Self {
            taxonomies: TaxonomyFacet::iter().filter(|f| wanted.contains(f)).collect(),
            galaxies: dedup(split_list(galaxies)),
            distribution: dedup(split_list(distribution)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.taxonomies.is_empty() && self.galaxies.is_empty()
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn dedup<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in tokens {
        if !out.iter().any(|t| t == token) {
            out.push(token.to_string());
        }
    }
    out
}

/// A fully parsed search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub target: IndexTarget,
    pub pagination: Pagination,
    pub facets: FacetSelection,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_target(mut self, target: IndexTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_facets(mut self, facets: FacetSelection) -> Self {
        self.facets = facets;
        self
    }
}
