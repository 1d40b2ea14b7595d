//! Catalog query parameters.
//!
//! Values arrive as repeated keys (`metal=1&metal=2`), bracketed keys (`metal[]=1`) or
//! comma-separated lists (`metal=1,2`); all three forms are accepted.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::aggregates::product::Id;
use crate::{CommerceError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Name,
    PriceAsc,
    PriceDesc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" | "newest" => Ok(Self::Newest),
            "name" => Ok(Self::Name),
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            other => Err(CommerceError::Validation(format!("unknown sort '{}'", other))),
        }
    }

    /// Order the data store can apply. Price sorts happen after pricing, so storage
    /// falls back to newest-first.
    pub fn storage_order(&self) -> StorageOrder {
        match self {
            Self::Name => StorageOrder::NameAsc,
            _ => StorageOrder::NewestFirst,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageOrder { NewestFirst, NameAsc }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiamondGroup { Shape, Color, Clarity }

impl DiamondGroup {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Shape => "shape", Self::Color => "color", Self::Clarity => "clarity" }
    }
}

/// A `group:id` diamond filter token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DiamondToken { pub group: DiamondGroup, pub id: Id }

impl DiamondToken {
    pub fn parse(token: &str) -> Result<Self> {
        let invalid = || CommerceError::Validation(format!("invalid diamond filter '{}', expected group:id", token));
        let (group, id) = token.split_once(':').ok_or_else(invalid)?;
        let group = match group.trim() {
            "shape" => DiamondGroup::Shape,
            "color" => DiamondGroup::Color,
            "clarity" => DiamondGroup::Clarity,
            _ => return Err(invalid()),
        };
        let id = id.trim().parse().map_err(|_| invalid())?;
        Ok(Self { group, id })
    }
}

/// Values that may be given either as numeric ids or as names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdsOrNames { pub ids: Vec<Id>, pub names: Vec<String> }

impl IdsOrNames {
    fn from_values(values: &[String]) -> Self {
        let mut out = Self::default();
        for v in values {
            match v.parse::<Id>() {
                Ok(id) => out.ids.push(id),
                Err(_) => out.names.push(v.clone()),
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() && self.names.is_empty() }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatalogFilters {
    pub search: Option<String>,
    pub categories: IdsOrNames,
    pub catalogs: IdsOrNames,
    pub brands: Vec<Id>,
    pub metals: Vec<Id>,
    pub purities: Vec<Id>,
    pub tones: Vec<Id>,
    pub diamonds: Vec<DiamondToken>,
    pub ready_made: bool,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub sort: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PagingDefaults { pub per_page: u32, pub max_per_page: u32 }

impl Default for PagingDefaults {
    fn default() -> Self { Self { per_page: 12, max_per_page: 100 } }
}

impl CatalogFilters {
    pub fn unfiltered(defaults: PagingDefaults) -> Self {
        Self {
            search: None, categories: IdsOrNames::default(), catalogs: IdsOrNames::default(), brands: vec![],
            metals: vec![], purities: vec![], tones: vec![], diamonds: vec![], ready_made: false,
            price_min: None, price_max: None, sort: SortOrder::default(), page: 1, per_page: defaults.per_page,
        }
    }

    pub fn from_pairs(pairs: &[(String, String)], defaults: PagingDefaults) -> Result<Self> {
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in pairs {
            let key = key.as_str();
            let key = key.strip_suffix("[]").unwrap_or(key);
            let values = grouped.entry(key.to_string()).or_default();
            values.extend(value.split(',').map(str::trim).filter(|v| !v.is_empty()).map(str::to_string));
        }
        let values = |key: &str| values_of(&grouped, key);
        let single = |key: &str| values_of(&grouped, key).first().map(String::as_str);

        let mut filters = Self::unfiltered(defaults);
        filters.search = single("search").map(str::to_string);
        filters.categories = IdsOrNames::from_values(values("category"));
        filters.catalogs = IdsOrNames::from_values(values("catalog"));
        filters.brands = parse_ids("brand", values("brand"))?;
        filters.metals = parse_ids("metal", values("metal"))?;
        filters.purities = parse_ids("metal_purity", values("metal_purity"))?;
        filters.tones = parse_ids("metal_tone", values("metal_tone"))?;
        filters.diamonds = values("diamond").iter().map(|t| DiamondToken::parse(t)).collect::<Result<_>>()?;
        filters.ready_made = single("ready_made").map(parse_flag).transpose()?.unwrap_or(false);
        filters.price_min = single("price_min").map(|v| parse_decimal("price_min", v)).transpose()?;
        filters.price_max = single("price_max").map(|v| parse_decimal("price_max", v)).transpose()?;
        filters.sort = SortOrder::parse(single("sort").unwrap_or(""))?;
        filters.page = single("page").map(|v| parse_positive("page", v)).transpose()?.unwrap_or(1);
        filters.per_page = single("per_page")
            .map(|v| parse_positive("per_page", v))
            .transpose()?
            .unwrap_or(defaults.per_page)
            .min(defaults.max_per_page);
        Ok(filters)
    }

    pub fn has_price_window(&self) -> bool { self.price_min.is_some() || self.price_max.is_some() }
}

fn values_of<'a>(grouped: &'a HashMap<String, Vec<String>>, key: &str) -> &'a [String] {
    grouped.get(key).map(Vec::as_slice).unwrap_or(&[])
}

fn parse_ids(key: &str, values: &[String]) -> Result<Vec<Id>> {
    values
        .iter()
        .map(|v| v.parse::<Id>().map_err(|_| CommerceError::Validation(format!("{} must be numeric ids, got '{}'", key, v))))
        .collect()
}

fn parse_flag(v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CommerceError::Validation(format!("ready_made must be a boolean, got '{}'", v))),
    }
}

fn parse_decimal(key: &str, v: &str) -> Result<Decimal> {
    v.parse().map_err(|_| CommerceError::Validation(format!("{} must be a number, got '{}'", key, v)))
}

fn parse_positive(key: &str, v: &str) -> Result<u32> {
    match v.parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(CommerceError::Validation(format!("{} must be a positive integer, got '{}'", key, v))),
    }
}
