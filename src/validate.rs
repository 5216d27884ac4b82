use crate::grid::Cell;
use crate::header_map::{CanonicalField, ColumnMapping};
use crate::row::parse_numeric;
use estoque_types::InventoryItem;
use serde::Serialize;

pub const MAX_CODE_LEN: usize = 100;
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_BARCODE_LEN: usize = 50;

/// One advisory finding for the upload preview. Findings never block the
/// import; the parsed record is committed as-is.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub row: usize,
    pub field: CanonicalField,
    pub message: String,
    pub value: String,
}

impl ValidationError {
    fn new(row: usize, field: CanonicalField, message: &str, value: &str) -> Self {
        Self {
            row,
            field,
            message: message.to_string(),
            value: value.to_string(),
        }
    }
}

fn raw_cell(row: &[Cell], mapping: &ColumnMapping, field: CanonicalField) -> Option<String> {
    let column = mapping.column_of(field)?;
    let cell = row.get(column)?;
    (!cell.is_empty()).then(|| cell.to_text())
}

/// Inspect one row against the record parsed from it and report anything a
/// back-office operator should review before committing.
pub fn validate_row(
    row: &[Cell],
    mapping: &ColumnMapping,
    item: &InventoryItem,
    row_idx: usize,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if item.code.is_empty() {
        errors.push(ValidationError::new(
            row_idx,
            CanonicalField::Code,
            "Campo obrigatório",
            "",
        ));
    } else if item.code.chars().count() > MAX_CODE_LEN {
        errors.push(ValidationError::new(
            row_idx,
            CanonicalField::Code,
            "Código excede o tamanho máximo",
            &item.code,
        ));
    }

    if item.name.is_empty() {
        errors.push(ValidationError::new(
            row_idx,
            CanonicalField::Name,
            "Campo obrigatório",
            "",
        ));
    } else if item.name.chars().count() > MAX_NAME_LEN {
        errors.push(ValidationError::new(
            row_idx,
            CanonicalField::Name,
            "Descrição excede o tamanho máximo",
            &item.name,
        ));
    }

    if let Some(barcode) = &item.barcode {
        if barcode.chars().count() > MAX_BARCODE_LEN {
            errors.push(ValidationError::new(
                row_idx,
                CanonicalField::Barcode,
                "Código de barras excede o tamanho máximo",
                barcode,
            ));
        }
    }

    for field in [CanonicalField::CostPrice, CanonicalField::SalePrice] {
        let Some(raw) = raw_cell(row, mapping, field) else {
            continue;
        };
        match parse_numeric(&raw) {
            None => errors.push(ValidationError::new(row_idx, field, "Número inválido", &raw)),
            Some(v) if v.is_sign_negative() => errors.push(ValidationError::new(
                row_idx,
                field,
                "Valor não pode ser negativo",
                &raw,
            )),
            Some(_) => {}
        }
    }

    // Stock may go negative; only unparsable input is worth a finding.
    if let Some(raw) = raw_cell(row, mapping, CanonicalField::StockCurrent) {
        if parse_numeric(&raw).is_none() {
            errors.push(ValidationError::new(
                row_idx,
                CanonicalField::StockCurrent,
                "Número inválido",
                &raw,
            ));
        }
    }

    errors
}
