//! Two-phase catalog search.
//!
//! Price is computed, never stored, so the storage query can only narrow by facets.
//! The pipeline is: storage filter -> price annotation -> in-memory price range,
//! price sort and pagination over the annotated list.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::filter::{CatalogFilters, SortOrder};
use crate::domain::aggregates::product::{Id, NamedRef, Product};
use crate::pricing::configuration::configuration_label;
use crate::pricing::{CustomerContext, PriceBreakdown, PriceOptions, PricingEngine};
use crate::Result;

#[derive(Clone, Debug, Serialize)]
pub struct PricedProduct {
    pub id: Id,
    pub name: String,
    pub sku: String,
    pub category: Option<NamedRef>,
    pub brand: Option<NamedRef>,
    pub uses_metal: bool,
    pub uses_diamond: bool,
    pub is_ready_made: bool,
    pub base_price: Option<Decimal>,
    pub image: Option<String>,
    pub purity: Option<String>,
    pub created_at: DateTime<Utc>,
    pub default_variant_id: Option<Id>,
    pub configuration_label: Option<String>,
    pub price_total: Decimal,
    pub price_breakdown: PriceBreakdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total: usize,
    pub last_page: u32,
}

impl PageMeta {
    pub fn new(current_page: u32, per_page: u32, total: usize) -> Self {
        let per_page = per_page.max(1);
        let last_page = total.div_ceil(per_page as usize).max(1) as u32;
        Self { current_page, per_page, total, last_page }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchPage {
    pub products: Vec<PricedProduct>,
    #[serde(rename = "pageMeta")]
    pub page_meta: PageMeta,
}

/// Effective price: the default variant's price (the first variant when none is
/// flagged), or the making-charge-only price for a product without variants.
pub fn price_product(engine: &PricingEngine<'_>, product: &Product, customer: &CustomerContext) -> Result<PricedProduct> {
    let (variant_id, label, breakdown) = match product.default_variant() {
        Some(v) => (Some(v.id), Some(configuration_label(v)), engine.calculate_price(product, customer, &PriceOptions::variant(v.id))?),
        None => (None, None, engine.calculate_price(product, customer, &PriceOptions::making_only())?),
    };
    Ok(PricedProduct {
        id: product.id,
        name: product.name.clone(),
        sku: product.sku.clone(),
        category: product.category.clone(),
        brand: product.brand.clone(),
        uses_metal: product.uses_metal,
        uses_diamond: product.uses_diamond,
        is_ready_made: product.is_ready_made(),
        base_price: product.base_price,
        image: product.primary_image().map(|m| m.url.clone()),
        purity: product.purity_label().map(str::to_string),
        created_at: product.created_at,
        default_variant_id: variant_id,
        configuration_label: label,
        price_total: breakdown.payable_total(),
        price_breakdown: breakdown,
    })
}

pub fn price_all(engine: &PricingEngine<'_>, products: &[Product], customer: &CustomerContext) -> Result<Vec<PricedProduct>> {
    products.iter().map(|p| price_product(engine, p, customer)).collect()
}

/// Price range, then price sort, then a plain slice for the requested page. Ties on
/// price are broken by product id so pages are stable whatever order storage returned.
pub fn window(mut priced: Vec<PricedProduct>, filters: &CatalogFilters) -> SearchPage {
    if filters.has_price_window() {
        priced.retain(|p| {
            filters.price_min.map_or(true, |min| p.price_total >= min) && filters.price_max.map_or(true, |max| p.price_total <= max)
        });
    }
    match filters.sort {
        SortOrder::PriceAsc => priced.sort_by(|a, b| a.price_total.cmp(&b.price_total).then(a.id.cmp(&b.id))),
        SortOrder::PriceDesc => priced.sort_by(|a, b| b.price_total.cmp(&a.price_total).then(a.id.cmp(&b.id))),
        SortOrder::Newest | SortOrder::Name => {}
    }
    let total = priced.len();
    let page_meta = PageMeta::new(filters.page, filters.per_page, total);
    let start = (filters.page.saturating_sub(1) as usize).saturating_mul(page_meta.per_page as usize);
    let products = priced.into_iter().skip(start).take(page_meta.per_page as usize).collect();
    SearchPage { products, page_meta }
}
