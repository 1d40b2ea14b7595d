//! Wishlist Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cart::LineConfiguration;
use super::product::Id;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WishlistLine {
    pub id: Id,
    pub wishlist_id: Id,
    pub product_id: Id,
    pub variant_id: Option<Id>,
    pub configuration: LineConfiguration,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewWishlistLine {
    pub wishlist_id: Id,
    pub product_id: Id,
    pub variant_id: Option<Id>,
    pub configuration: LineConfiguration,
}

impl WishlistLine {
    pub fn is_same(&self, other: &NewWishlistLine) -> bool {
        self.product_id == other.product_id && self.variant_id == other.variant_id && self.configuration == other.configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_selection_includes_configuration() {
        let line = WishlistLine { id: 1, wishlist_id: 1, product_id: 2, variant_id: Some(3), configuration: LineConfiguration::default(), created_at: Utc::now() };
        let mut candidate = NewWishlistLine { wishlist_id: 1, product_id: 2, variant_id: Some(3), configuration: LineConfiguration::default() };
        assert!(line.is_same(&candidate));
        candidate.configuration = LineConfiguration::from_value(json!({"notes": "rose"})).unwrap();
        assert!(!line.is_same(&candidate));
    }
}
