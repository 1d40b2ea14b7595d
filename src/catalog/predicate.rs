//! Composable catalog predicate.
//!
//! Each facet contributes at most one sub-predicate (internally OR-ing its selected
//! values); the facets are folded together with AND. The same tree is rendered to SQL
//! for the Postgres store and evaluated directly against product graphs in memory.

use sqlx::{Postgres, QueryBuilder};

use super::filter::{CatalogFilters, DiamondGroup, DiamondToken};
use crate::domain::aggregates::product::{Diamond, Id, Product, VariantMetal};

/// Metal-family constraints that must all hold on the same metal-link row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetalLinkFilter {
    pub metal_ids: Vec<Id>,
    pub purity_ids: Vec<Id>,
    pub tone_ids: Vec<Id>,
}

impl MetalLinkFilter {
    fn is_empty(&self) -> bool { self.metal_ids.is_empty() && self.purity_ids.is_empty() && self.tone_ids.is_empty() }

    fn matches(&self, link: &VariantMetal) -> bool {
        constraint_holds(&self.metal_ids, link.metal.as_ref().map(|r| r.id))
            && constraint_holds(&self.purity_ids, link.purity.as_ref().map(|r| r.id))
            && constraint_holds(&self.tone_ids, link.tone.as_ref().map(|r| r.id))
    }
}

fn constraint_holds(allowed: &[Id], actual: Option<Id>) -> bool {
    allowed.is_empty() || actual.is_some_and(|id| allowed.contains(&id))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Active,
    Text(String),
    CategoryIds(Vec<Id>),
    CategoryNames(Vec<String>),
    CatalogIds(Vec<Id>),
    CatalogNames(Vec<String>),
    BrandIds(Vec<Id>),
    VariantMetal(MetalLinkFilter),
    VariantDiamond(DiamondToken),
    ReadyMade,
}

type FacetBuilder = fn(&CatalogFilters) -> Option<Predicate>;

const FACET_BUILDERS: &[(&str, FacetBuilder)] = &[
    ("active", active),
    ("search", search),
    ("category", category),
    ("catalog", catalog),
    ("brand", brand),
    ("metal", metal_family),
    ("diamond", diamond),
    ("ready_made", ready_made),
];

/// Fold every active facet into one conjunctive predicate.
pub fn build(filters: &CatalogFilters) -> Predicate {
    let mut parts = Vec::new();
    for (name, builder) in FACET_BUILDERS {
        if let Some(p) = builder(filters) {
            tracing::trace!(facet = name, predicate = ?p, "facet filter");
            parts.push(p);
        }
    }
    Predicate::All(parts)
}

fn active(_: &CatalogFilters) -> Option<Predicate> { Some(Predicate::Active) }

fn search(f: &CatalogFilters) -> Option<Predicate> {
    f.search.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()).map(|s| Predicate::Text(s.to_string()))
}

fn ids_or_names(ids: &[Id], names: &[String], by_id: fn(Vec<Id>) -> Predicate, by_name: fn(Vec<String>) -> Predicate) -> Option<Predicate> {
    let mut any = Vec::new();
    if !ids.is_empty() { any.push(by_id(ids.to_vec())); }
    if !names.is_empty() { any.push(by_name(names.to_vec())); }
    (!any.is_empty()).then_some(Predicate::Any(any))
}

fn category(f: &CatalogFilters) -> Option<Predicate> {
    ids_or_names(&f.categories.ids, &f.categories.names, Predicate::CategoryIds, Predicate::CategoryNames)
}

fn catalog(f: &CatalogFilters) -> Option<Predicate> {
    ids_or_names(&f.catalogs.ids, &f.catalogs.names, Predicate::CatalogIds, Predicate::CatalogNames)
}

fn brand(f: &CatalogFilters) -> Option<Predicate> {
    (!f.brands.is_empty()).then(|| Predicate::BrandIds(f.brands.clone()))
}

/// metal, metal_purity and metal_tone compose into a single link condition.
fn metal_family(f: &CatalogFilters) -> Option<Predicate> {
    let link = MetalLinkFilter { metal_ids: f.metals.clone(), purity_ids: f.purities.clone(), tone_ids: f.tones.clone() };
    (!link.is_empty()).then_some(Predicate::VariantMetal(link))
}

/// Any one diamond token is enough.
fn diamond(f: &CatalogFilters) -> Option<Predicate> {
    (!f.diamonds.is_empty()).then(|| Predicate::Any(f.diamonds.iter().copied().map(Predicate::VariantDiamond).collect()))
}

fn ready_made(f: &CatalogFilters) -> Option<Predicate> { f.ready_made.then_some(Predicate::ReadyMade) }

fn eq_ignore_case_any(names: &[String], value: &str) -> bool { names.iter().any(|n| n.eq_ignore_ascii_case(value)) }

fn diamond_attr(d: &Diamond, group: DiamondGroup) -> Option<Id> {
    match group {
        DiamondGroup::Shape => d.shape.as_ref().map(|r| r.id),
        DiamondGroup::Color => d.color.as_ref().map(|r| r.id),
        DiamondGroup::Clarity => d.clarity.as_ref().map(|r| r.id),
    }
}

impl Predicate {
    pub fn matches(&self, p: &Product) -> bool {
        match self {
            Self::All(parts) => parts.iter().all(|x| x.matches(p)),
            Self::Any(parts) => parts.iter().any(|x| x.matches(p)),
            Self::Active => p.is_active,
            Self::Text(q) => {
                let q = q.to_lowercase();
                p.name.to_lowercase().contains(&q) || p.sku.to_lowercase().contains(&q)
            }
            Self::CategoryIds(ids) => p.category.as_ref().is_some_and(|c| ids.contains(&c.id)),
            Self::CategoryNames(names) => p.category.as_ref().is_some_and(|c| eq_ignore_case_any(names, &c.name)),
            Self::CatalogIds(ids) => p.catalogs.iter().any(|c| ids.contains(&c.id)),
            Self::CatalogNames(names) => p.catalogs.iter().any(|c| eq_ignore_case_any(names, &c.name)),
            Self::BrandIds(ids) => p.brand.as_ref().is_some_and(|b| ids.contains(&b.id)),
            Self::VariantMetal(link) => p.variants.iter().any(|v| v.metals.iter().any(|m| link.matches(m))),
            Self::VariantDiamond(token) => p.variants.iter().any(|v| {
                v.diamonds.iter().filter_map(|d| d.diamond.as_ref()).any(|d| diamond_attr(d, token.group) == Some(token.id))
            }),
            Self::ReadyMade => p.is_ready_made(),
        }
    }

    /// Render as a SQL boolean expression over the products table aliased `p`.
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::All(parts) => push_joined(qb, parts, " AND ", "TRUE"),
            Self::Any(parts) => push_joined(qb, parts, " OR ", "FALSE"),
            Self::Active => { qb.push("p.is_active = TRUE"); }
            Self::Text(q) => {
                let pattern = format!("%{}%", q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"));
                qb.push("(p.name ILIKE ").push_bind(pattern.clone()).push(" OR p.sku ILIKE ").push_bind(pattern).push(")");
            }
            Self::CategoryIds(ids) => { qb.push("p.category_id = ANY(").push_bind(ids.clone()).push(")"); }
            Self::CategoryNames(names) => {
                qb.push("EXISTS (SELECT 1 FROM categories c WHERE c.id = p.category_id AND LOWER(c.name) = ANY(")
                    .push_bind(lowercase(names))
                    .push("))");
            }
            Self::CatalogIds(ids) => {
                qb.push("EXISTS (SELECT 1 FROM catalog_products cp WHERE cp.product_id = p.id AND cp.catalog_id = ANY(")
                    .push_bind(ids.clone())
                    .push("))");
            }
            Self::CatalogNames(names) => {
                qb.push("EXISTS (SELECT 1 FROM catalog_products cp JOIN catalogs cg ON cg.id = cp.catalog_id WHERE cp.product_id = p.id AND LOWER(cg.name) = ANY(")
                    .push_bind(lowercase(names))
                    .push("))");
            }
            Self::BrandIds(ids) => { qb.push("p.brand_id = ANY(").push_bind(ids.clone()).push(")"); }
            Self::VariantMetal(link) => {
                qb.push("EXISTS (SELECT 1 FROM product_variants v JOIN variant_metals vm ON vm.variant_id = v.id WHERE v.product_id = p.id");
                for (column, ids) in [("vm.metal_id", &link.metal_ids), ("vm.purity_id", &link.purity_ids), ("vm.tone_id", &link.tone_ids)] {
                    if !ids.is_empty() {
                        qb.push(" AND ").push(column).push(" = ANY(").push_bind(ids.clone()).push(")");
                    }
                }
                qb.push(")");
            }
            Self::VariantDiamond(token) => {
                qb.push("EXISTS (SELECT 1 FROM product_variants v JOIN variant_diamonds vd ON vd.variant_id = v.id JOIN diamonds d ON d.id = vd.diamond_id WHERE v.product_id = p.id AND d.")
                    .push(token.group.as_str())
                    .push("_id = ")
                    .push_bind(token.id)
                    .push(")");
            }
            Self::ReadyMade => { qb.push("p.base_price > 0"); }
        }
    }
}

fn push_joined(qb: &mut QueryBuilder<'_, Postgres>, parts: &[Predicate], sep: &str, empty: &str) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 { qb.push(sep); }
        part.push_sql(qb);
    }
    qb.push(")");
}

fn lowercase(names: &[String]) -> Vec<String> { names.iter().map(|n| n.to_lowercase()).collect() }
