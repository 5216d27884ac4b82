use anyhow::Context;
use async_trait::async_trait;
use estoque_types::{CatalogRepository, InventoryItem};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, List, Save};
use typesafe_repository::prelude::*;
use typesafe_repository::IdentityOf;

const SELECT_COLUMNS: &str = "code, barcode, name, group_name, subgroup, reference, brand, \
     cost_price, sale_price, promo_price, stock_current, stock_min, stock_max, \
     tax_code, unit, gross_weight, net_weight, location, balance";

pub struct SqliteCatalogRepository {
    conn: Connection,
}

impl SqliteCatalogRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            let _ = conn.pragma_update(None, "journal_mode", &"WAL");
            let _ = conn.pragma_update(None, "synchronous", &"NORMAL");
            let _ = conn.pragma_update(None, "busy_timeout", &5000i64);
            conn.execute(
                "CREATE TABLE IF NOT EXISTS item (
                    code TEXT PRIMARY KEY,
                    barcode TEXT,
                    name TEXT NOT NULL,
                    group_name TEXT,
                    subgroup TEXT,
                    reference TEXT,
                    brand TEXT,
                    cost_price TEXT NOT NULL DEFAULT '0',
                    sale_price TEXT NOT NULL DEFAULT '0',
                    promo_price TEXT,
                    stock_current TEXT NOT NULL DEFAULT '0',
                    stock_min TEXT NOT NULL DEFAULT '0',
                    stock_max TEXT NOT NULL DEFAULT '0',
                    tax_code TEXT,
                    unit TEXT,
                    gross_weight TEXT,
                    net_weight TEXT,
                    location TEXT,
                    balance TEXT
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

// Decimals travel as TEXT. Values written by older tooling may not parse;
// those fall back to zero instead of failing the whole read.
fn decimal_from_db(raw: String) -> Decimal {
    raw.trim().parse().unwrap_or_default()
}

fn opt_decimal_from_db(raw: Option<String>) -> Option<Decimal> {
    raw.and_then(|s| s.trim().parse().ok())
}

fn item_from_row(row: &rusqlite::Row) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        code: row.get(0)?,
        barcode: row.get(1)?,
        name: row.get(2)?,
        group: row.get(3)?,
        subgroup: row.get(4)?,
        reference: row.get(5)?,
        brand: row.get(6)?,
        cost_price: decimal_from_db(row.get(7)?),
        sale_price: decimal_from_db(row.get(8)?),
        promo_price: opt_decimal_from_db(row.get(9)?),
        stock_current: decimal_from_db(row.get(10)?),
        stock_min: decimal_from_db(row.get(11)?),
        stock_max: decimal_from_db(row.get(12)?),
        tax_code: row.get(13)?,
        unit: row.get(14)?,
        gross_weight: opt_decimal_from_db(row.get(15)?),
        net_weight: opt_decimal_from_db(row.get(16)?),
        location: row.get(17)?,
        balance: opt_decimal_from_db(row.get(18)?),
    })
}

fn insert_item(conn: &rusqlite::Connection, item: &InventoryItem) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR REPLACE INTO item (
            code, barcode, name, group_name, subgroup, reference, brand,
            cost_price, sale_price, promo_price, stock_current, stock_min, stock_max,
            tax_code, unit, gross_weight, net_weight, location, balance
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        rusqlite::params![
            item.code,
            item.barcode,
            item.name,
            item.group,
            item.subgroup,
            item.reference,
            item.brand,
            item.cost_price.to_string(),
            item.sale_price.to_string(),
            item.promo_price.map(|d| d.to_string()),
            item.stock_current.to_string(),
            item.stock_min.to_string(),
            item.stock_max.to_string(),
            item.tax_code,
            item.unit,
            item.gross_weight.map(|d| d.to_string()),
            item.net_weight.map(|d| d.to_string()),
            item.location,
            item.balance.map(|d| d.to_string()),
        ],
    )
}

impl Repository<InventoryItem> for SqliteCatalogRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Save<InventoryItem> for SqliteCatalogRepository {
    async fn save(&self, item: InventoryItem) -> Result<(), Self::Error> {
        self.conn
            .call(move |conn| {
                insert_item(conn, &item)?;
                Ok(())
            })
            .await
            .context("Unable to save catalog item")
    }
}

#[async_trait]
impl Get<InventoryItem> for SqliteCatalogRepository {
    async fn get_one(
        &self,
        id: &IdentityOf<InventoryItem>,
    ) -> Result<Option<InventoryItem>, Self::Error> {
        let code = id.clone();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM item WHERE code = ?1"
                ))?;
                let mut rows = stmt.query([code])?;
                match rows.next()? {
                    Some(row) => Ok(Some(item_from_row(row)?)),
                    None => Ok(None),
                }
            })
            .await
            .context("Unable to get catalog item")
    }
}

#[async_trait]
impl List<InventoryItem> for SqliteCatalogRepository {
    async fn list(&self) -> Result<Vec<InventoryItem>, Self::Error> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM item ORDER BY code"
                ))?;
                let items = stmt
                    .query_map([], item_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await
            .context("Unable to list catalog items")
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn find_existing_codes(
        &self,
        codes: &[String],
    ) -> Result<HashSet<String>, Self::Error> {
        if codes.is_empty() {
            return Ok(HashSet::new());
        }
        let codes = codes.to_vec();
        self.conn
            .call(move |conn| {
                let placeholders = vec!["?"; codes.len()].join(", ");
                let mut stmt = conn.prepare(&format!(
                    "SELECT code FROM item WHERE code IN ({placeholders})"
                ))?;
                let found = stmt
                    .query_map(rusqlite::params_from_iter(codes.iter()), |row| row.get(0))?
                    .collect::<Result<HashSet<String>, _>>()?;
                Ok(found)
            })
            .await
            .context("Unable to look up existing codes")
    }

    async fn upsert_chunk(&self, items: Vec<InventoryItem>) -> Result<(), Self::Error> {
        if items.is_empty() {
            return Ok(());
        }
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for item in items.iter() {
                    insert_item(&tx, item)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .context("Unable to upsert catalog chunk")
    }

    async fn list_subgroups(&self) -> Result<Vec<String>, Self::Error> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT subgroup FROM item
                     WHERE subgroup IS NOT NULL AND subgroup != ''
                     ORDER BY subgroup",
                )?;
                let subgroups = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(subgroups)
            })
            .await
            .context("Unable to list catalog subgroups")
    }
}
