//! Catalog browsing: faceted search, product detail and the dashboard shelf.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use super::PricingInputs;
use crate::catalog::search::{price_all, price_product, window};
use crate::catalog::{predicate, CatalogFilters, FacetSummary, PageMeta, PagingDefaults, PricedProduct, Predicate, ReferenceKind, StorageOrder};
use crate::domain::aggregates::product::ProductMedia;
use crate::domain::aggregates::Id;
use crate::pricing::configuration::{enumerate, Configuration};
use crate::pricing::{CustomerContext, PricingPolicy};
use crate::store::Store;
use crate::{CommerceError, Result};

#[derive(Clone, Debug, Serialize)]
pub struct CatalogPage {
    pub products: Vec<PricedProduct>,
    pub facets: FacetSummary,
    #[serde(rename = "pageMeta")]
    pub page_meta: PageMeta,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: PricedProduct,
    pub metadata: Value,
    pub media: Vec<ProductMedia>,
    pub configurations: Vec<Configuration>,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    paging: PagingDefaults,
    policy: PricingPolicy,
    recent_limit: u32,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>, paging: PagingDefaults, policy: PricingPolicy, recent_limit: u32) -> Self {
        Self { store, paging, policy, recent_limit }
    }

    /// Search from raw query pairs (`metal[]=1&metal[]=2`, `diamond=shape:3`, ...).
    pub async fn search_params(&self, params: &[(String, String)], customer: CustomerContext) -> Result<CatalogPage> {
        let filters = CatalogFilters::from_pairs(params, self.paging)?;
        self.search(&filters, customer).await
    }

    #[instrument(skip(self, filters), fields(page = filters.page, sort = ?filters.sort))]
    pub async fn search(&self, filters: &CatalogFilters, customer: CustomerContext) -> Result<CatalogPage> {
        let predicate = predicate::build(filters);
        let candidates = self.store.fetch_products(&predicate, filters.sort.storage_order(), None).await?;
        let inputs = PricingInputs::load(self.store.as_ref()).await?;
        let priced = price_all(&inputs.engine(&self.policy), &candidates, &customer)?;
        tracing::debug!(candidates = candidates.len(), "Catalog candidates priced");
        let page = window(priced, filters);
        Ok(CatalogPage { products: page.products, facets: self.facets().await?, page_meta: page.page_meta })
    }

    /// Every active reference value per facet, ordered for display.
    pub async fn facets(&self) -> Result<FacetSummary> {
        let mut summary = FacetSummary::default();
        for kind in ReferenceKind::ALL {
            summary.set(kind, self.store.reference_rows(kind).await?);
        }
        Ok(summary)
    }

    #[instrument(skip(self))]
    pub async fn product_detail(&self, product_id: Id, customer: CustomerContext) -> Result<ProductDetail> {
        let product = self
            .store
            .find_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(CommerceError::not_found("product", product_id))?;
        let inputs = PricingInputs::load(self.store.as_ref()).await?;
        let engine = inputs.engine(&self.policy);
        let configurations = enumerate(&engine, &product, &customer)?;
        let mut media = product.media.clone();
        media.sort_by_key(|m| (m.position, m.id));
        Ok(ProductDetail {
            product: price_product(&engine, &product, &customer)?,
            metadata: product.metadata.clone(),
            media,
            configurations,
        })
    }

    /// Newest active products, priced like catalog entries.
    #[instrument(skip(self))]
    pub async fn recent_products(&self, customer: CustomerContext) -> Result<Vec<PricedProduct>> {
        let products = self.store.fetch_products(&Predicate::Active, StorageOrder::NewestFirst, Some(i64::from(self.recent_limit))).await?;
        let inputs = PricingInputs::load(self.store.as_ref()).await?;
        price_all(&inputs.engine(&self.policy), &products, &customer)
    }
}
