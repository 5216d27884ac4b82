use crate::grid::Cell;
use crate::header_map::{CanonicalField, ColumnMapping, FieldKind};
use crate::subgroup::SubgroupCatalog;
use estoque_types::InventoryItem;
use rust_decimal::Decimal;
use time::OffsetDateTime;

/// Parse localized numeric text. Accepts both "1.234,56" and "1234.56";
/// currency symbols, units and other noise are stripped before parsing.
pub fn parse_numeric(raw: &str) -> Option<Decimal> {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if filtered.is_empty() {
        return None;
    }
    let normalized = if filtered.contains(',') {
        // pt-BR form: "." is a thousands separator, "," the decimal mark.
        filtered.replace('.', "").replace(',', ".")
    } else {
        filtered
    };
    normalized.parse().ok()
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Build one catalog record from a data row. Parsing never fails: required
/// numerics coerce to zero, optional ones stay absent, and a row with a name
/// but no code gets a generated key so it can still be imported.
pub fn parse_row(
    row: &[Cell],
    mapping: &ColumnMapping,
    row_idx: usize,
    subgroups: &mut SubgroupCatalog,
) -> InventoryItem {
    let mut item = InventoryItem::default();
    for (column, field) in mapping.iter() {
        let raw = match row.get(column) {
            Some(cell) => cell.to_text(),
            None => continue,
        };
        match field.kind() {
            FieldKind::RequiredNumeric => {
                let parsed = parse_numeric(&raw);
                // A negative price is invalid input and falls back to the
                // default; stock levels may legitimately go negative.
                let value = match field {
                    CanonicalField::CostPrice | CanonicalField::SalePrice => {
                        parsed.filter(|v| !v.is_sign_negative()).unwrap_or_default()
                    }
                    _ => parsed.unwrap_or_default(),
                };
                match field {
                    CanonicalField::CostPrice => item.cost_price = value,
                    CanonicalField::SalePrice => item.sale_price = value,
                    CanonicalField::StockCurrent => item.stock_current = value,
                    CanonicalField::StockMin => item.stock_min = value,
                    CanonicalField::StockMax => item.stock_max = value,
                    _ => {}
                }
            }
            FieldKind::OptionalNumeric => {
                let value = parse_numeric(&raw);
                match field {
                    CanonicalField::PromoPrice => item.promo_price = value,
                    CanonicalField::GrossWeight => item.gross_weight = value,
                    CanonicalField::NetWeight => item.net_weight = value,
                    CanonicalField::Balance => item.balance = value,
                    _ => {}
                }
            }
            FieldKind::RequiredText | FieldKind::Text => match field {
                CanonicalField::Code => item.code = raw.trim().to_string(),
                CanonicalField::Name => item.name = raw.trim().to_string(),
                CanonicalField::Barcode => item.barcode = non_empty(raw),
                CanonicalField::Group => item.group = non_empty(raw),
                CanonicalField::Subgroup => {
                    let trimmed = raw.trim();
                    item.subgroup = (!trimmed.is_empty()).then(|| subgroups.resolve(trimmed));
                }
                CanonicalField::Reference => item.reference = non_empty(raw),
                CanonicalField::Brand => item.brand = non_empty(raw),
                CanonicalField::TaxCode => item.tax_code = non_empty(raw),
                CanonicalField::Unit => item.unit = non_empty(raw),
                CanonicalField::Location => item.location = non_empty(raw),
                _ => {}
            },
        }
    }
    if item.code.is_empty() && !item.name.is_empty() {
        item.code = format!(
            "AUTO_{}_{}",
            row_idx,
            OffsetDateTime::now_utc().unix_timestamp()
        );
    }
    item
}
