//! Static product catalog.
//!
//! Products are defined at build time and never mutated at runtime. Prices are
//! in AUD cents. Products flagged `requires_assessment` are Schedule 3
//! therapeutic vapes and are only shown to buyers whose assessment has been
//! approved.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{AccessStatus, Cents};

/// Unique product slug (e.g. `lana-mint-20`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Wrap a slug.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TherapeuticVapes,
    NrtGum,
    NrtPatches,
    NrtLozenges,
}

impl Category {
    /// Human-readable category name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::TherapeuticVapes => "Therapeutic Vapes",
            Self::NrtGum => "Nicotine Gum",
            Self::NrtPatches => "Nicotine Patches",
            Self::NrtLozenges => "Nicotine Lozenges",
        }
    }
}

/// Regulatory schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// Pharmacist-only medicine.
    S3,
    /// Unscheduled, general sale.
    None,
}

/// An immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub brand: &'static str,
    pub category: Category,
    pub product_type: &'static str,
    pub nicotine_strength_mg: Option<u32>,
    pub flavour: Option<&'static str>,
    pub description: &'static str,
    pub price: Cents,
    pub schedule: Schedule,
    pub requires_assessment: bool,
    pub in_stock: bool,
    pub badge: Option<&'static str>,
}

impl Product {
    /// Whether a buyer with the given access status may see and buy this product.
    #[must_use]
    pub const fn is_available_to(&self, access: AccessStatus) -> bool {
        !self.requires_assessment || access.grants_gated_access()
    }
}

const fn vape(
    id: &'static str,
    name: &'static str,
    flavour: &'static str,
    description: &'static str,
) -> Product {
    Product {
        id,
        name,
        brand: "Lana",
        category: Category::TherapeuticVapes,
        product_type: "pod",
        nicotine_strength_mg: Some(20),
        flavour: Some(flavour),
        description,
        price: Cents::new(2995),
        schedule: Schedule::S3,
        requires_assessment: true,
        in_stock: true,
        badge: None,
    }
}

#[allow(clippy::too_many_arguments)]
const fn nrt(
    id: &'static str,
    name: &'static str,
    category: Category,
    product_type: &'static str,
    strength_mg: u32,
    flavour: Option<&'static str>,
    description: &'static str,
    price: u64,
) -> Product {
    Product {
        id,
        name,
        brand: "Ntell",
        category,
        product_type,
        nicotine_strength_mg: Some(strength_mg),
        flavour,
        description,
        price: Cents::new(price),
        schedule: Schedule::None,
        requires_assessment: false,
        in_stock: true,
        badge: None,
    }
}

static PRODUCTS: [Product; 13] = [
    vape(
        "lana-mint-20",
        "Lana Mint 20mg/mL Pods",
        "Mint",
        "Refreshing mint therapeutic vape pods. Pack of 2.",
    ),
    vape(
        "lana-mint-ice-20",
        "Lana Mint Ice 20mg/mL Pods",
        "Mint Ice",
        "Cool mint ice therapeutic vape pods. Pack of 2.",
    ),
    vape(
        "lana-tobacco-20",
        "Lana Tobacco 20mg/mL Pods",
        "Tobacco",
        "Classic tobacco therapeutic vape pods. Pack of 2.",
    ),
    Product {
        id: "lana-device",
        name: "Lana Device",
        brand: "Lana",
        category: Category::TherapeuticVapes,
        product_type: "device",
        nicotine_strength_mg: None,
        flavour: None,
        description: "Rechargeable device compatible with all Lana pods.",
        price: Cents::new(3995),
        schedule: Schedule::S3,
        requires_assessment: true,
        in_stock: true,
        badge: Some("Starter Kit"),
    },
    Product {
        id: "lana-starter-bundle",
        name: "Lana Starter Bundle",
        brand: "Lana",
        category: Category::TherapeuticVapes,
        product_type: "bundle",
        nicotine_strength_mg: Some(20),
        flavour: None,
        description: "One Lana device plus two packs of pods in your chosen flavour.",
        price: Cents::new(5995),
        schedule: Schedule::S3,
        requires_assessment: true,
        in_stock: true,
        badge: Some("Best Value"),
    },
    nrt(
        "ntell-gum-mint-4",
        "Ntell Nicotine Gum Mint 4mg",
        Category::NrtGum,
        "gum",
        4,
        Some("Mint"),
        "Sugar-free nicotine gum for heavier smokers. 96 pieces.",
        3699,
    ),
    nrt(
        "ntell-gum-mint-2",
        "Ntell Nicotine Gum Mint 2mg",
        Category::NrtGum,
        "gum",
        2,
        Some("Mint"),
        "Sugar-free nicotine gum for lighter smokers. 96 pieces.",
        3499,
    ),
    nrt(
        "ntell-gum-fruit-4",
        "Ntell Nicotine Gum Fruit 4mg",
        Category::NrtGum,
        "gum",
        4,
        Some("Fruit"),
        "Fruit flavoured sugar-free nicotine gum. 96 pieces.",
        3699,
    ),
    nrt(
        "ntell-patch-21",
        "Ntell Nicotine Patch 21mg",
        Category::NrtPatches,
        "patch",
        21,
        None,
        "Step 1 24-hour patch. 28 patches.",
        3299,
    ),
    nrt(
        "ntell-patch-14",
        "Ntell Nicotine Patch 14mg",
        Category::NrtPatches,
        "patch",
        14,
        None,
        "Step 2 24-hour patch. 28 patches.",
        3099,
    ),
    nrt(
        "ntell-patch-7",
        "Ntell Nicotine Patch 7mg",
        Category::NrtPatches,
        "patch",
        7,
        None,
        "Step 3 24-hour patch. 28 patches.",
        2899,
    ),
    nrt(
        "ntell-loz-mint-4",
        "Ntell Nicotine Lozenge Mint 4mg",
        Category::NrtLozenges,
        "lozenge",
        4,
        Some("Mint"),
        "Mint lozenges for strong cravings. 72 lozenges.",
        2199,
    ),
    nrt(
        "ntell-loz-mint-2",
        "Ntell Nicotine Lozenge Mint 2mg",
        Category::NrtLozenges,
        "lozenge",
        2,
        Some("Mint"),
        "Mint lozenges for mild cravings. 72 lozenges.",
        1999,
    ),
];

/// Read-only view over a product list.
///
/// [`Catalog::standard`] is the shipped product list. Tests build catalogs
/// from their own fixtures with [`Catalog::from_static`].
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    products: &'static [Product],
}

impl Catalog {
    /// The shipped Exhale product list.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            products: &PRODUCTS,
        }
    }

    /// Build a catalog over a caller-provided list.
    #[must_use]
    pub const fn from_static(products: &'static [Product]) -> Self {
        Self { products }
    }

    /// Look up a product by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&'static Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// All products, in display order.
    #[must_use]
    pub const fn all(&self) -> &'static [Product] {
        self.products
    }

    /// Products a buyer with the given access status may see.
    pub fn visible_to(&self, access: AccessStatus) -> impl Iterator<Item = &'static Product> {
        self.products
            .iter()
            .filter(move |p| p.is_available_to(access))
    }

    /// Products in a category, ignoring access.
    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &'static Product> {
        self.products.iter().filter(move |p| p.category == category)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let catalog = Catalog::standard();
        let ids: HashSet<_> = catalog.all().iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), catalog.all().len());
    }

    #[test]
    fn test_lookup() {
        let catalog = Catalog::standard();
        let patch = catalog.get("ntell-patch-21").unwrap();
        assert_eq!(patch.price, Cents::new(3299));
        assert_eq!(patch.category, Category::NrtPatches);
        assert!(catalog.get("no-such-product").is_none());
    }

    #[test]
    fn test_gated_products_are_s3_vapes() {
        for product in Catalog::standard().all() {
            assert_eq!(
                product.requires_assessment,
                product.schedule == Schedule::S3,
                "{}",
                product.id
            );
            if product.requires_assessment {
                assert_eq!(product.category, Category::TherapeuticVapes);
            }
        }
    }

    #[test]
    fn test_visibility_follows_access_status() {
        let catalog = Catalog::standard();
        let anonymous: Vec<_> = catalog.visible_to(AccessStatus::None).collect();
        assert_eq!(anonymous.len(), 8);
        assert!(anonymous.iter().all(|p| !p.requires_assessment));

        assert_eq!(catalog.visible_to(AccessStatus::Pending).count(), 8);
        assert_eq!(catalog.visible_to(AccessStatus::Approved).count(), 13);
    }

    #[test]
    fn test_in_category() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.in_category(Category::NrtLozenges).count(), 2);
        assert_eq!(catalog.in_category(Category::TherapeuticVapes).count(), 5);
    }
}
