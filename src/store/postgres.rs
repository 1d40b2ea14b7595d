//! PostgreSQL store backed by sqlx.
//!
//! Product graphs are loaded in two passes: the filtered product rows first, then
//! variants, metal/diamond links, catalogs and media for all matched ids at once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor, QueryBuilder};
use std::collections::{BTreeSet, HashMap};
use tracing::{instrument, warn};

use super::{CartStore, CartWrite, CatalogStore, CostModelStore, OrderStore, WishlistStore};
use crate::catalog::{Predicate, ReferenceKind, ReferenceRow, StorageOrder};
use crate::domain::aggregates::product::{Diamond, MakingCharge, ProductMedia, VariantDiamond, VariantMetal};
use crate::domain::aggregates::quotation::QuotationItem;
use crate::domain::aggregates::{
    CartLine, CollapsePlan, Id, LineConfiguration, LineStamp, NamedRef, NewCartLine, NewOrder, NewQuotation, NewWishlistLine, Order,
    OrderItem, OrderStatus, Product, Quotation, QuotationStatus, Variant, WishlistLine,
};
use crate::domain::value_objects::{Money, Quantity};
use crate::pricing::{CustomerTier, MetalRateKey, Offer, OfferDiscount, OfferScope, RateTable};
use crate::{CommerceError, Result};

const PRODUCT_COLUMNS: &str = "SELECT p.id, p.name, p.sku, p.uses_metal, p.uses_diamond, p.is_active, p.base_price, \
     p.making_charge_fixed, p.making_charge_percentage, p.metadata, p.category_id, pc.name AS category_name, \
     p.brand_id, pb.name AS brand_name, p.created_at \
     FROM products p LEFT JOIN categories pc ON pc.id = p.category_id LEFT JOIN brands pb ON pb.id = p.brand_id WHERE ";

const CART_LINE_COLUMNS: &str = "id, cart_id, product_id, variant_id, quantity, configuration, version, created_at";
const WISHLIST_LINE_COLUMNS: &str = "id, wishlist_id, product_id, variant_id, configuration, created_at";
const QUOTATION_COLUMNS: &str = "id, reference, customer_id, product_id, quantity, comment, status, items, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool { &self.pool }

    async fn assemble(&self, rows: Vec<ProductRow>) -> Result<Vec<Product>> {
        if rows.is_empty() { return Ok(vec![]); }
        let ids: Vec<Id> = rows.iter().map(|r| r.id).collect();

        let catalogs: Vec<CatalogLinkRow> = sqlx::query_as(
            "SELECT cp.product_id, cg.id, cg.name FROM catalog_products cp JOIN catalogs cg ON cg.id = cp.catalog_id \
             WHERE cp.product_id = ANY($1) ORDER BY cg.display_order, cg.name",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let media: Vec<MediaRow> = sqlx::query_as(
            "SELECT id, product_id, url, position FROM product_media WHERE product_id = ANY($1) ORDER BY position, id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let variants: Vec<VariantRow> = sqlx::query_as(
            "SELECT v.id, v.product_id, v.label, v.sku, v.inventory_quantity, v.is_default, v.metadata, \
             v.size_id, s.name AS size_name \
             FROM product_variants v LEFT JOIN sizes s ON s.id = v.size_id WHERE v.product_id = ANY($1) ORDER BY v.id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let metals: Vec<MetalLinkRow> = sqlx::query_as(
            "SELECT vm.variant_id, vm.metal_id, m.name AS metal_name, vm.purity_id, mp.name AS purity_name, \
             vm.tone_id, mt.name AS tone_name, vm.weight \
             FROM variant_metals vm JOIN product_variants v ON v.id = vm.variant_id \
             LEFT JOIN metals m ON m.id = vm.metal_id \
             LEFT JOIN metal_purities mp ON mp.id = vm.purity_id \
             LEFT JOIN metal_tones mt ON mt.id = vm.tone_id \
             WHERE v.product_id = ANY($1) ORDER BY vm.id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let diamonds: Vec<DiamondLinkRow> = sqlx::query_as(
            "SELECT vd.variant_id, vd.count, d.id AS diamond_id, d.name AS diamond_name, \
             d.shape_id, ds.name AS shape_name, d.color_id, dc.name AS color_name, d.clarity_id, dl.name AS clarity_name \
             FROM variant_diamonds vd JOIN product_variants v ON v.id = vd.variant_id \
             LEFT JOIN diamonds d ON d.id = vd.diamond_id \
             LEFT JOIN diamond_shapes ds ON ds.id = d.shape_id \
             LEFT JOIN diamond_colors dc ON dc.id = d.color_id \
             LEFT JOIN diamond_clarities dl ON dl.id = d.clarity_id \
             WHERE v.product_id = ANY($1) ORDER BY vd.id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut metals_by_variant: HashMap<Id, Vec<VariantMetal>> = HashMap::new();
        for m in metals {
            metals_by_variant.entry(m.variant_id).or_default().push(VariantMetal {
                metal: named(m.metal_id, m.metal_name),
                purity: named(m.purity_id, m.purity_name),
                tone: named(m.tone_id, m.tone_name),
                weight: m.weight,
            });
        }

        let mut diamonds_by_variant: HashMap<Id, Vec<VariantDiamond>> = HashMap::new();
        for d in diamonds {
            let diamond = d.diamond_id.map(|id| Diamond {
                id,
                name: d.diamond_name,
                shape: named(d.shape_id, d.shape_name),
                color: named(d.color_id, d.color_name),
                clarity: named(d.clarity_id, d.clarity_name),
            });
            diamonds_by_variant.entry(d.variant_id).or_default().push(VariantDiamond { diamond, count: d.count });
        }

        let mut variants_by_product: HashMap<Id, Vec<Variant>> = HashMap::new();
        for v in variants {
            variants_by_product.entry(v.product_id).or_default().push(Variant {
                id: v.id,
                product_id: v.product_id,
                label: v.label,
                sku: v.sku,
                inventory_quantity: v.inventory_quantity,
                is_default: v.is_default,
                size: named(v.size_id, v.size_name),
                metadata: v.metadata,
                metals: metals_by_variant.remove(&v.id).unwrap_or_default(),
                diamonds: diamonds_by_variant.remove(&v.id).unwrap_or_default(),
            });
        }

        let mut catalogs_by_product: HashMap<Id, Vec<NamedRef>> = HashMap::new();
        for c in catalogs {
            catalogs_by_product.entry(c.product_id).or_default().push(NamedRef::new(c.id, c.name));
        }

        let mut media_by_product: HashMap<Id, Vec<ProductMedia>> = HashMap::new();
        for m in media {
            media_by_product.entry(m.product_id).or_default().push(ProductMedia { id: m.id, url: m.url, position: m.position });
        }

        Ok(rows
            .into_iter()
            .map(|r| Product {
                id: r.id,
                name: r.name,
                sku: r.sku,
                uses_metal: r.uses_metal,
                uses_diamond: r.uses_diamond,
                is_active: r.is_active,
                base_price: r.base_price,
                making_charge: MakingCharge::resolve(r.making_charge_fixed, r.making_charge_percentage, &r.metadata),
                metadata: r.metadata,
                category: named(r.category_id, r.category_name),
                brand: named(r.brand_id, r.brand_name),
                catalogs: catalogs_by_product.remove(&r.id).unwrap_or_default(),
                variants: variants_by_product.remove(&r.id).unwrap_or_default(),
                media: media_by_product.remove(&r.id).unwrap_or_default(),
                created_at: r.created_at,
            })
            .collect())
    }
}

/// A link whose target row is missing is treated as absent.
fn named(id: Option<Id>, name: Option<String>) -> Option<NamedRef> {
    Some(NamedRef::new(id?, name?))
}

/// Each stamp's line must be among `current` (id to version) at the stamped version.
fn check_stamps<'a>(current: &HashMap<Id, i64>, stamps: impl IntoIterator<Item = &'a LineStamp>) -> Result<()> {
    for stamp in stamps {
        match current.get(&stamp.id) {
            None => return Err(CommerceError::not_found("cart line", stamp.id)),
            Some(version) if *version != stamp.version => {
                return Err(CommerceError::Conflict(format!("cart line {} was modified concurrently", stamp.id)));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

async fn insert_cart_line<'e, E: PgExecutor<'e>>(executor: E, line: &NewCartLine) -> Result<CartLineRow> {
    let sql = format!(
        "INSERT INTO cart_items (cart_id, product_id, variant_id, quantity, configuration) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {}",
        CART_LINE_COLUMNS
    );
    let row: CartLineRow = sqlx::query_as(&sql)
        .bind(line.cart_id)
        .bind(line.product_id)
        .bind(line.variant_id)
        .bind(i64::from(line.quantity.value()))
        .bind(line.configuration.to_value())
        .fetch_one(executor)
        .await?;
    Ok(row)
}

fn stored_quantity(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| CommerceError::Validation(format!("stored quantity {} is out of range", value)))
}

// =============================================================================
// Row types
// =============================================================================

#[derive(FromRow)]
struct ProductRow {
    id: Id,
    name: String,
    sku: String,
    uses_metal: bool,
    uses_diamond: bool,
    is_active: bool,
    base_price: Option<Decimal>,
    making_charge_fixed: Option<Decimal>,
    making_charge_percentage: Option<Decimal>,
    metadata: Value,
    category_id: Option<Id>,
    category_name: Option<String>,
    brand_id: Option<Id>,
    brand_name: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CatalogLinkRow { product_id: Id, id: Id, name: String }

#[derive(FromRow)]
struct MediaRow { id: Id, product_id: Id, url: String, position: i32 }

#[derive(FromRow)]
struct VariantRow {
    id: Id,
    product_id: Id,
    label: Option<String>,
    sku: Option<String>,
    inventory_quantity: Option<i64>,
    is_default: bool,
    metadata: Value,
    size_id: Option<Id>,
    size_name: Option<String>,
}

#[derive(FromRow)]
struct MetalLinkRow {
    variant_id: Id,
    metal_id: Option<Id>,
    metal_name: Option<String>,
    purity_id: Option<Id>,
    purity_name: Option<String>,
    tone_id: Option<Id>,
    tone_name: Option<String>,
    weight: Option<Decimal>,
}

#[derive(FromRow)]
struct DiamondLinkRow {
    variant_id: Id,
    count: i32,
    diamond_id: Option<Id>,
    diamond_name: Option<String>,
    shape_id: Option<Id>,
    shape_name: Option<String>,
    color_id: Option<Id>,
    color_name: Option<String>,
    clarity_id: Option<Id>,
    clarity_name: Option<String>,
}

#[derive(FromRow)]
struct OfferRow {
    id: Id,
    name: String,
    discount_type: String,
    discount_value: Decimal,
    scope: String,
    scope_ids: Vec<Id>,
    tiers: Vec<String>,
}

impl OfferRow {
    fn into_offer(self) -> Option<Offer> {
        let discount = match self.discount_type.as_str() {
            "percentage" => OfferDiscount::Percentage(self.discount_value),
            "flat" => OfferDiscount::Flat(self.discount_value),
            other => {
                warn!(offer_id = self.id, discount_type = other, "Skipping offer with unknown discount type");
                return None;
            }
        };
        let scope = match self.scope.as_str() {
            "products" => OfferScope::Products(self.scope_ids),
            "categories" => OfferScope::Categories(self.scope_ids),
            _ => OfferScope::AllProducts,
        };
        let tiers = self
            .tiers
            .iter()
            .filter_map(|t| match t.parse::<CustomerTier>() {
                Ok(tier) => Some(tier),
                Err(e) => {
                    warn!(offer_id = self.id, "{}", e);
                    None
                }
            })
            .collect();
        Some(Offer { id: self.id, name: self.name, discount, scope, tiers })
    }
}

#[derive(FromRow)]
struct CartLineRow {
    id: Id,
    cart_id: Id,
    product_id: Id,
    variant_id: Option<Id>,
    quantity: i64,
    configuration: Value,
    version: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = CommerceError;
    fn try_from(r: CartLineRow) -> Result<Self> {
        Ok(Self {
            id: r.id, cart_id: r.cart_id, product_id: r.product_id, variant_id: r.variant_id,
            quantity: Quantity::new(r.quantity)?, configuration: LineConfiguration::from_value(r.configuration)?,
            version: r.version, created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct WishlistLineRow {
    id: Id,
    wishlist_id: Id,
    product_id: Id,
    variant_id: Option<Id>,
    configuration: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<WishlistLineRow> for WishlistLine {
    type Error = CommerceError;
    fn try_from(r: WishlistLineRow) -> Result<Self> {
        Ok(Self {
            id: r.id, wishlist_id: r.wishlist_id, product_id: r.product_id, variant_id: r.variant_id,
            configuration: LineConfiguration::from_value(r.configuration)?, created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct QuotationRow {
    id: Id,
    reference: String,
    customer_id: Id,
    product_id: Id,
    quantity: i64,
    comment: Option<String>,
    status: String,
    items: Json<Vec<QuotationItem>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuotationRow> for Quotation {
    type Error = CommerceError;
    fn try_from(r: QuotationRow) -> Result<Self> {
        let status = QuotationStatus::parse(&r.status)
            .ok_or_else(|| CommerceError::Validation(format!("quotation {} has unknown status '{}'", r.id, r.status)))?;
        Ok(Self {
            id: r.id, reference: r.reference, customer_id: r.customer_id, product_id: r.product_id,
            quantity: stored_quantity(r.quantity)?, comment: r.comment, status, items: r.items.0, created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Id,
    order_number: String,
    customer_id: Id,
    quotation_id: Id,
    status: String,
    currency: String,
    total: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct OrderItemRow {
    order_id: Id,
    product_id: Id,
    variant_id: Option<Id>,
    quantity: i64,
    unit_price: Decimal,
    total_price: Decimal,
    metadata: Value,
}

impl OrderItemRow {
    fn into_item(self, currency: &str) -> Result<OrderItem> {
        Ok(OrderItem {
            product_id: self.product_id, variant_id: self.variant_id, quantity: stored_quantity(self.quantity)?,
            unit_price: Money::new(self.unit_price, currency), total_price: Money::new(self.total_price, currency),
            metadata: self.metadata,
        })
    }
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl CostModelStore for PgStore {
    #[instrument(skip(self))]
    async fn rate_table(&self) -> Result<RateTable> {
        let mut table = RateTable::default();
        let metal_rates: Vec<(Id, Id, Id, Decimal)> =
            sqlx::query_as("SELECT metal_id, purity_id, tone_id, rate_per_gram FROM metal_rates").fetch_all(&self.pool).await?;
        for (metal_id, purity_id, tone_id, rate) in metal_rates {
            table.insert_metal_rate(MetalRateKey { metal_id, purity_id, tone_id }, rate);
        }
        let diamond_rates: Vec<(Id, Decimal)> =
            sqlx::query_as("SELECT diamond_id, rate FROM diamond_rates").fetch_all(&self.pool).await?;
        for (diamond_id, rate) in diamond_rates {
            table.insert_diamond_rate(diamond_id, rate);
        }
        Ok(table)
    }

    #[instrument(skip(self))]
    async fn active_offers(&self) -> Result<Vec<Offer>> {
        let rows: Vec<OfferRow> = sqlx::query_as(
            "SELECT id, name, discount_type, discount_value, scope, scope_ids, tiers FROM offers \
             WHERE is_active AND (starts_at IS NULL OR starts_at <= NOW()) AND (ends_at IS NULL OR ends_at >= NOW()) \
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().filter_map(OfferRow::into_offer).collect())
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    #[instrument(skip(self, predicate))]
    async fn fetch_products(&self, predicate: &Predicate, order: StorageOrder, limit: Option<i64>) -> Result<Vec<Product>> {
        let mut qb = QueryBuilder::new(PRODUCT_COLUMNS);
        predicate.push_sql(&mut qb);
        qb.push(match order {
            StorageOrder::NewestFirst => " ORDER BY p.created_at DESC, p.id DESC",
            StorageOrder::NameAsc => " ORDER BY p.name ASC, p.id ASC",
        });
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        self.assemble(rows).await
    }

    #[instrument(skip(self))]
    async fn find_products(&self, ids: &[Id]) -> Result<Vec<Product>> {
        if ids.is_empty() { return Ok(vec![]); }
        let mut qb = QueryBuilder::new(PRODUCT_COLUMNS);
        qb.push("p.id = ANY(").push_bind(ids.to_vec()).push(")");
        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let mut products: HashMap<Id, Product> = self.assemble(rows).await?.into_iter().map(|p| (p.id, p)).collect();
        Ok(ids.iter().filter_map(|id| products.remove(id)).collect())
    }

    async fn reference_rows(&self, kind: ReferenceKind) -> Result<Vec<ReferenceRow>> {
        let sql = format!("SELECT id, name, is_active, display_order FROM {}", kind.table());
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart_for(&self, customer_id: Id) -> Result<Id> {
        let id: Id = sqlx::query_scalar(
            "INSERT INTO carts (customer_id) VALUES ($1) \
             ON CONFLICT (customer_id) DO UPDATE SET customer_id = EXCLUDED.customer_id RETURNING id",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn cart_lines(&self, cart_id: Id) -> Result<Vec<CartLine>> {
        let sql = format!("SELECT {} FROM cart_items WHERE cart_id = $1 ORDER BY id", CART_LINE_COLUMNS);
        let rows: Vec<CartLineRow> = sqlx::query_as(&sql).bind(cart_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(CartLine::try_from).collect()
    }

    #[instrument(skip(self, line), fields(cart_id = line.cart_id, product_id = line.product_id))]
    async fn insert_line(&self, line: NewCartLine) -> Result<CartLine> {
        insert_cart_line(&self.pool, &line).await?.try_into()
    }

    #[instrument(skip(self, configuration))]
    async fn update_line(&self, line_id: Id, expected_version: i64, quantity: Quantity, configuration: &LineConfiguration) -> Result<CartLine> {
        let sql = format!(
            "UPDATE cart_items SET quantity = $3, configuration = $4, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 RETURNING {}",
            CART_LINE_COLUMNS
        );
        let row: Option<CartLineRow> = sqlx::query_as(&sql)
            .bind(line_id)
            .bind(expected_version)
            .bind(i64::from(quantity.value()))
            .bind(configuration.to_value())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row.try_into(),
            None => {
                let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM cart_items WHERE id = $1)")
                    .bind(line_id)
                    .fetch_one(&self.pool)
                    .await?;
                if exists {
                    Err(CommerceError::Conflict(format!("cart line {} was modified concurrently", line_id)))
                } else {
                    Err(CommerceError::not_found("cart line", line_id))
                }
            }
        }
    }

    async fn delete_line(&self, cart_id: Id, line_id: Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(line_id)
            .bind(cart_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, plan), fields(keep = plan.keep.id, removed = plan.delete.len()))]
    async fn collapse(&self, cart_id: Id, plan: &CollapsePlan) -> Result<CartLine> {
        plan.check_distinct()?;
        let ids: Vec<Id> = plan.stamps().map(|s| s.id).collect();
        let mut tx = self.pool.begin().await?;
        let current: Vec<(Id, i64)> = sqlx::query_as("SELECT id, version FROM cart_items WHERE cart_id = $1 AND id = ANY($2) FOR UPDATE")
            .bind(cart_id)
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;
        let current: HashMap<Id, i64> = current.into_iter().collect();
        check_stamps(&current, plan.stamps())?;

        if !plan.delete.is_empty() {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = ANY($2)")
                .bind(cart_id)
                .bind(plan.deleted_ids())
                .execute(&mut *tx)
                .await?;
        }
        let sql = format!(
            "UPDATE cart_items SET quantity = $3, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND cart_id = $2 RETURNING {}",
            CART_LINE_COLUMNS
        );
        let row: Option<CartLineRow> = sqlx::query_as(&sql)
            .bind(plan.keep.id)
            .bind(cart_id)
            .bind(i64::from(plan.quantity.value()))
            .fetch_optional(&mut *tx)
            .await?;
        let row = row.ok_or(CommerceError::not_found("cart line", plan.keep.id))?;
        tx.commit().await?;
        row.try_into()
    }

    #[instrument(skip(self, lines, quotations), fields(lines = lines.len(), quotations = quotations.len()))]
    async fn submit_quotations(&self, cart_id: Id, lines: &[LineStamp], quotations: Vec<NewQuotation>) -> Result<Vec<Quotation>> {
        let mut tx = self.pool.begin().await?;
        let current: Vec<(Id, i64)> = sqlx::query_as("SELECT id, version FROM cart_items WHERE cart_id = $1 FOR UPDATE")
            .bind(cart_id)
            .fetch_all(&mut *tx)
            .await?;
        let current: BTreeSet<LineStamp> = current.into_iter().map(|(id, version)| LineStamp { id, version }).collect();
        if current != lines.iter().copied().collect::<BTreeSet<_>>() {
            return Err(CommerceError::Conflict("cart changed while submitting".into()));
        }

        let sql = format!(
            "INSERT INTO quotations (reference, customer_id, product_id, quantity, comment, status, items) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            QUOTATION_COLUMNS
        );
        let mut created = Vec::with_capacity(quotations.len());
        for q in &quotations {
            let row: QuotationRow = sqlx::query_as(&sql)
                .bind(&q.reference)
                .bind(q.customer_id)
                .bind(q.product_id)
                .bind(i64::from(q.quantity))
                .bind(&q.comment)
                .bind(QuotationStatus::Submitted.as_str())
                .bind(Json(&q.items))
                .fetch_one(&mut *tx)
                .await?;
            created.push(Quotation::try_from(row)?);
        }

        let line_ids: Vec<Id> = lines.iter().map(|s| s.id).collect();
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = ANY($2)")
            .bind(cart_id)
            .bind(&line_ids)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(created)
    }
}

#[async_trait]
impl WishlistStore for PgStore {
    async fn wishlist_for(&self, customer_id: Id) -> Result<Id> {
        let id: Id = sqlx::query_scalar(
            "INSERT INTO wishlists (customer_id) VALUES ($1) \
             ON CONFLICT (customer_id) DO UPDATE SET customer_id = EXCLUDED.customer_id RETURNING id",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn wishlist_lines(&self, wishlist_id: Id) -> Result<Vec<WishlistLine>> {
        let sql = format!("SELECT {} FROM wishlist_items WHERE wishlist_id = $1 ORDER BY id", WISHLIST_LINE_COLUMNS);
        let rows: Vec<WishlistLineRow> = sqlx::query_as(&sql).bind(wishlist_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(WishlistLine::try_from).collect()
    }

    async fn insert_wishlist_line(&self, line: NewWishlistLine) -> Result<WishlistLine> {
        let sql = format!(
            "INSERT INTO wishlist_items (wishlist_id, product_id, variant_id, configuration) VALUES ($1, $2, $3, $4) RETURNING {}",
            WISHLIST_LINE_COLUMNS
        );
        let row: WishlistLineRow = sqlx::query_as(&sql)
            .bind(line.wishlist_id)
            .bind(line.product_id)
            .bind(line.variant_id)
            .bind(line.configuration.to_value())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn delete_wishlist_line(&self, wishlist_id: Id, line_id: Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE id = $1 AND wishlist_id = $2")
            .bind(line_id)
            .bind(wishlist_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, write))]
    async fn move_to_cart(&self, wishlist_id: Id, line_id: Id, write: CartWrite) -> Result<CartLine> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM wishlist_items WHERE id = $1 AND wishlist_id = $2")
            .bind(line_id)
            .bind(wishlist_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(CommerceError::not_found("wishlist line", line_id));
        }

        let row = match write {
            CartWrite::Update { line, quantity } => {
                let sql = format!(
                    "UPDATE cart_items SET quantity = $3, version = version + 1, updated_at = NOW() \
                     WHERE id = $1 AND version = $2 RETURNING {}",
                    CART_LINE_COLUMNS
                );
                let row: Option<CartLineRow> = sqlx::query_as(&sql)
                    .bind(line.id)
                    .bind(line.version)
                    .bind(i64::from(quantity.value()))
                    .fetch_optional(&mut *tx)
                    .await?;
                row.ok_or_else(|| CommerceError::Conflict(format!("cart line {} was modified concurrently", line.id)))?
            }
            CartWrite::Insert(new) => insert_cart_line(&mut *tx, &new).await?,
        };
        tx.commit().await?;
        row.try_into()
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn find_quotation(&self, customer_id: Id, quotation_id: Id) -> Result<Option<Quotation>> {
        let sql = format!("SELECT {} FROM quotations WHERE id = $1 AND customer_id = $2", QUOTATION_COLUMNS);
        let row: Option<QuotationRow> = sqlx::query_as(&sql).bind(quotation_id).bind(customer_id).fetch_optional(&self.pool).await?;
        row.map(Quotation::try_from).transpose()
    }

    async fn customer_quotations(&self, customer_id: Id) -> Result<Vec<Quotation>> {
        let sql = format!("SELECT {} FROM quotations WHERE customer_id = $1 ORDER BY created_at DESC, id DESC", QUOTATION_COLUMNS);
        let rows: Vec<QuotationRow> = sqlx::query_as(&sql).bind(customer_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(Quotation::try_from).collect()
    }

    async fn customer_orders(&self, customer_id: Id) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT id, order_number, customer_id, quotation_id, status, currency, total, created_at FROM orders \
             WHERE customer_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        if rows.is_empty() { return Ok(vec![]); }

        let ids: Vec<Id> = rows.iter().map(|r| r.id).collect();
        let items: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT order_id, product_id, variant_id, quantity, unit_price, total_price, metadata FROM order_items \
             WHERE order_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        let mut items_by_order: HashMap<Id, Vec<OrderItemRow>> = HashMap::new();
        for item in items {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        rows.into_iter()
            .map(|r| {
                let items = items_by_order
                    .remove(&r.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|i| i.into_item(&r.currency))
                    .collect::<Result<Vec<_>>>()?;
                let status = OrderStatus::parse(&r.status)
                    .ok_or_else(|| CommerceError::Validation(format!("order {} has unknown status '{}'", r.id, r.status)))?;
                Ok(Order {
                    id: r.id, order_number: r.order_number, customer_id: r.customer_id, quotation_id: r.quotation_id,
                    status, items, total: Money::new(r.total, &r.currency), created_at: r.created_at,
                })
            })
            .collect()
    }

    #[instrument(skip(self, order), fields(quotation_id = order.quotation_id))]
    async fn place_order(&self, order: NewOrder, expected: QuotationStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE quotations SET status = $3 WHERE id = $1 AND status = $2")
            .bind(order.quotation_id)
            .bind(expected.as_str())
            .bind(QuotationStatus::Ordered.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(CommerceError::Conflict(format!("quotation {} is no longer {}", order.quotation_id, expected.as_str())));
        }

        let (id, created_at): (Id, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO orders (order_number, customer_id, quotation_id, status, currency, total) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id, created_at",
        )
        .bind(&order.order_number)
        .bind(order.customer_id)
        .bind(order.quotation_id)
        .bind(order.status.as_str())
        .bind(order.total.currency())
        .bind(order.total.amount())
        .fetch_one(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, variant_id, quantity, unit_price, total_price, metadata) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.amount())
            .bind(item.total_price.amount())
            .bind(&item.metadata)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(Order {
            id, order_number: order.order_number, customer_id: order.customer_id, quotation_id: order.quotation_id,
            status: order.status, items: order.items, total: order.total, created_at,
        })
    }
}
