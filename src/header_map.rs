use crate::strip_diacritics;
use serde::Serialize;
use std::collections::HashSet;

/// Target attributes of an inventory record. Spreadsheet columns are mapped
/// onto these by keyword matching over the normalized header text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Code,
    Barcode,
    Name,
    Group,
    Subgroup,
    Reference,
    Brand,
    CostPrice,
    SalePrice,
    PromoPrice,
    StockCurrent,
    StockMin,
    StockMax,
    TaxCode,
    Unit,
    GrossWeight,
    NetWeight,
    Location,
    Balance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Text that must end up non-empty for the record to be usable.
    RequiredText,
    Text,
    /// Unparsable or missing input coerces to zero.
    RequiredNumeric,
    /// Unparsable or missing input stays absent.
    OptionalNumeric,
}

impl CanonicalField {
    pub fn kind(self) -> FieldKind {
        use CanonicalField::*;
        match self {
            Code | Name => FieldKind::RequiredText,
            CostPrice | SalePrice | StockCurrent | StockMin | StockMax => {
                FieldKind::RequiredNumeric
            }
            PromoPrice | GrossWeight | NetWeight | Balance => FieldKind::OptionalNumeric,
            Barcode | Group | Subgroup | Reference | Brand | TaxCode | Unit | Location => {
                FieldKind::Text
            }
        }
    }
}

/// Keyword dictionary, in matching order. Order disambiguates overlapping
/// vocabularies: "cod. barras" must hit Barcode before Code can see "cod",
/// "estoque mínimo" must hit StockMin before StockCurrent sees "estoque",
/// and "preço de custo" / "preço promocional" must win over the generic
/// "preço" of SalePrice.
const FIELD_KEYWORDS: &[(CanonicalField, &[&str])] = &[
    (CanonicalField::Barcode, &["barras", "barcode", "ean", "gtin"]),
    (CanonicalField::Code, &["codigo", "cod", "sku"]),
    (
        CanonicalField::Name,
        &["descricao", "nome do produto", "nome", "produto", "name"],
    ),
    (
        CanonicalField::Subgroup,
        &["subgrupo", "sub-grupo", "sub grupo", "subcategoria"],
    ),
    (
        CanonicalField::Group,
        &["grupo", "secao", "departamento", "categoria"],
    ),
    (CanonicalField::Reference, &["referencia", "ref"]),
    (CanonicalField::Brand, &["marca", "fabricante", "brand"]),
    (CanonicalField::CostPrice, &["custo", "cost"]),
    (CanonicalField::PromoPrice, &["promoc", "oferta", "promo"]),
    (
        CanonicalField::SalePrice,
        &["venda", "preco", "valor unitario", "price"],
    ),
    (
        CanonicalField::StockMin,
        &["estoque minimo", "est min", "minimo"],
    ),
    (
        CanonicalField::StockMax,
        &["estoque maximo", "est max", "maximo"],
    ),
    (
        CanonicalField::StockCurrent,
        &["estoque", "saldo atual", "quantidade", "qtde", "qtd", "stock"],
    ),
    (
        CanonicalField::TaxCode,
        &["ncm", "cst", "tributac", "imposto"],
    ),
    (CanonicalField::Unit, &["unidade", "und", "medida", "un"]),
    (CanonicalField::GrossWeight, &["peso bruto", "peso b"]),
    (CanonicalField::NetWeight, &["peso liquido", "peso l", "peso"]),
    (
        CanonicalField::Location,
        &["localizacao", "local", "endereco", "prateleira", "corredor"],
    ),
    (CanonicalField::Balance, &["balanco", "saldo", "balance"]),
];

/// Source column index to canonical field, built once per file during the
/// header scan and immutable afterwards.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ColumnMapping {
    columns: Vec<(usize, CanonicalField)>,
}

impl ColumnMapping {
    pub fn iter(&self) -> impl Iterator<Item = (usize, CanonicalField)> + '_ {
        self.columns.iter().copied()
    }

    pub fn field_of(&self, column: usize) -> Option<CanonicalField> {
        self.columns
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, f)| *f)
    }

    pub fn column_of(&self, field: CanonicalField) -> Option<usize> {
        self.columns
            .iter()
            .find(|(_, f)| *f == field)
            .map(|(c, _)| *c)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Map raw header strings to canonical fields. Each column claims at most
/// one field and each field is claimed at most once; the first column to
/// match wins, later columns matching the same field stay unmapped.
pub fn map_headers(headers: &[String]) -> ColumnMapping {
    let mut claimed: HashSet<CanonicalField> = HashSet::new();
    let mut columns = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        let normalized = normalize_header(header);
        if normalized.is_empty() {
            continue;
        }
        let alnum = alphanumeric(&normalized);
        for (field, keywords) in FIELD_KEYWORDS {
            if claimed.contains(field) {
                continue;
            }
            // Substring matching only on the space-preserving form; the
            // alphanumeric form would let keywords bleed across word
            // boundaries ("preco de custo" -> "precodecusto" contains "cod").
            let matched = keywords
                .iter()
                .any(|kw| normalized.contains(kw) || alnum == alphanumeric(kw));
            if matched {
                claimed.insert(*field);
                columns.push((idx, *field));
                break;
            }
        }
    }
    ColumnMapping { columns }
}

fn normalize_header(header: &str) -> String {
    strip_diacritics(header.trim()).to_lowercase()
}

fn alphanumeric(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).collect()
}
