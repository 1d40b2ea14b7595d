//! Facet summary: the full set of browsable reference values, independent of the
//! current filter selection.

use serde::Serialize;

use crate::domain::aggregates::product::Id;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceKind { Category, Metal, Purity, Tone, Shape, Color, Clarity, Brand, Catalog, Size }

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 10] = [
        Self::Category, Self::Metal, Self::Purity, Self::Tone, Self::Shape, Self::Color, Self::Clarity, Self::Brand, Self::Catalog,
        Self::Size,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Self::Category => "categories",
            Self::Metal => "metals",
            Self::Purity => "metal_purities",
            Self::Tone => "metal_tones",
            Self::Shape => "diamond_shapes",
            Self::Color => "diamond_colors",
            Self::Clarity => "diamond_clarities",
            Self::Brand => "brands",
            Self::Catalog => "catalogs",
            Self::Size => "sizes",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct ReferenceRow {
    pub id: Id,
    pub name: String,
    pub is_active: bool,
    pub display_order: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FacetOption { pub id: Id, pub name: String }

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FacetSummary {
    pub categories: Vec<FacetOption>,
    pub metals: Vec<FacetOption>,
    pub purities: Vec<FacetOption>,
    pub tones: Vec<FacetOption>,
    pub shapes: Vec<FacetOption>,
    pub colors: Vec<FacetOption>,
    pub clarities: Vec<FacetOption>,
    pub brands: Vec<FacetOption>,
    pub catalogs: Vec<FacetOption>,
    pub sizes: Vec<FacetOption>,
}

impl FacetSummary {
    pub fn set(&mut self, kind: ReferenceKind, rows: Vec<ReferenceRow>) {
        let options = active_options(rows);
        match kind {
            ReferenceKind::Category => self.categories = options,
            ReferenceKind::Metal => self.metals = options,
            ReferenceKind::Purity => self.purities = options,
            ReferenceKind::Tone => self.tones = options,
            ReferenceKind::Shape => self.shapes = options,
            ReferenceKind::Color => self.colors = options,
            ReferenceKind::Clarity => self.clarities = options,
            ReferenceKind::Brand => self.brands = options,
            ReferenceKind::Catalog => self.catalogs = options,
            ReferenceKind::Size => self.sizes = options,
        }
    }
}

/// Active rows ordered by (display_order, name).
pub fn active_options(mut rows: Vec<ReferenceRow>) -> Vec<FacetOption> {
    rows.retain(|r| r.is_active);
    rows.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.name.cmp(&b.name)));
    rows.into_iter().map(|r| FacetOption { id: r.id, name: r.name }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Id, name: &str, is_active: bool, display_order: i32) -> ReferenceRow {
        ReferenceRow { id, name: name.into(), is_active, display_order }
    }

    #[test]
    fn test_active_only_in_display_order() {
        let rows = vec![row(1, "Rose", true, 2), row(2, "Yellow", true, 1), row(3, "Black", false, 0), row(4, "White", true, 1)];
        let names: Vec<String> = active_options(rows).into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["White", "Yellow", "Rose"]);
    }

    #[test]
    fn test_summary_routes_rows_by_kind() {
        let mut summary = FacetSummary::default();
        summary.set(ReferenceKind::Size, vec![row(9, "7", true, 0)]);
        summary.set(ReferenceKind::Brand, vec![row(3, "Aurum", false, 0)]);
        assert_eq!(summary.sizes, vec![FacetOption { id: 9, name: "7".into() }]);
        assert!(summary.brands.is_empty());
    }
}
