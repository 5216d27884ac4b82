use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use typesafe_repository::async_ops::{Get, List, Save};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;

/// One catalog record. The `code` is the business key: uploads are keyed on
/// it for insert-or-update, and a record without it never reaches the
/// catalog.
#[derive(Id, Clone, Debug, Default, PartialEq, Serialize)]
#[Id(ref_id, get_id)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    #[id]
    pub code: String,
    pub barcode: Option<String>,
    pub name: String,
    pub group: Option<String>,
    pub subgroup: Option<String>,
    pub reference: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub promo_price: Option<Decimal>,
    pub stock_current: Decimal,
    pub stock_min: Decimal,
    pub stock_max: Decimal,
    pub tax_code: Option<String>,
    pub unit: Option<String>,
    pub gross_weight: Option<Decimal>,
    pub net_weight: Option<Decimal>,
    pub location: Option<String>,
    pub balance: Option<Decimal>,
}

impl InventoryItem {
    /// A record lacking both business key and name is not importable.
    pub fn is_importable(&self) -> bool {
        !(self.code.is_empty() && self.name.is_empty())
    }
}

#[async_trait]
pub trait CatalogRepository:
    Repository<InventoryItem, Error = anyhow::Error>
    + Save<InventoryItem>
    + Get<InventoryItem>
    + List<InventoryItem>
    + Send
    + Sync
{
    /// Which of the given business keys are already present in the catalog.
    async fn find_existing_codes(&self, codes: &[String])
        -> Result<HashSet<String>, Self::Error>;
    /// Insert-or-overwrite one chunk of records keyed on `code`. Existing
    /// rows are replaced whole, there is no partial-field merge.
    async fn upsert_chunk(&self, items: Vec<InventoryItem>) -> Result<(), Self::Error>;
    /// Distinct subgroup values currently stored in the catalog.
    async fn list_subgroups(&self) -> Result<Vec<String>, Self::Error>;
}
