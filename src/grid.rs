use rust_decimal::Decimal;

/// One decoded spreadsheet cell. Decoders (CSV here, XLSX upstream) reduce
/// every sheet to this shape before the pipeline ever sees it.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Text(String),
    Number(Decimal),
    Empty,
}

impl Cell {
    pub fn to_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Empty => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
            Cell::Empty => true,
        }
    }
}

/// Header row plus data rows, column order preserved as uploaded.
#[derive(Clone, Debug, Default)]
pub struct SheetGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Decode an uploaded CSV into a grid. Delimiter is sniffed from the header
/// line because back-office exports in pt-BR locales routinely use ";".
pub fn read_csv_grid(data: &[u8]) -> Result<SheetGrid, anyhow::Error> {
    let data = data.strip_prefix("\u{feff}".as_bytes()).unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(data))
        .flexible(true)
        .from_reader(data);
    let headers = reader.headers()?.iter().map(ToString::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(cell.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(SheetGrid { headers, rows })
}

fn sniff_delimiter(data: &[u8]) -> u8 {
    let first_line = data.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_comma_csv() {
        let data = b"Codigo,Descricao\n001,Arroz\n002,Feijao\n";
        let grid = read_csv_grid(data).expect("csv");
        assert_eq!(vec!["Codigo", "Descricao"], grid.headers);
        assert_eq!(2, grid.rows.len());
        assert_eq!(Cell::Text("Arroz".to_string()), grid.rows[0][1]);
    }

    #[test]
    fn sniffs_semicolon_delimiter() {
        let data = "Código;Descrição;Preço\n001;Polpa de Fruta;10,50\n".as_bytes();
        let grid = read_csv_grid(data).expect("csv");
        assert_eq!(3, grid.headers.len());
        assert_eq!(Cell::Text("10,50".to_string()), grid.rows[0][2]);
    }

    #[test]
    fn strips_utf8_bom() {
        let data = "\u{feff}Codigo,Descricao\n1,x\n".as_bytes();
        let grid = read_csv_grid(data).expect("csv");
        assert_eq!("Codigo", grid.headers[0]);
    }

    #[test]
    fn empty_cells_decode_as_empty() {
        let data = b"Codigo,Descricao,Preco\n001,,\n";
        let grid = read_csv_grid(data).expect("csv");
        assert_eq!(Cell::Empty, grid.rows[0][1]);
        assert_eq!(Cell::Empty, grid.rows[0][2]);
    }

    #[test]
    fn file_without_data_rows_decodes_to_empty_grid() {
        let grid = read_csv_grid(b"Codigo,Descricao\n").expect("csv");
        assert!(grid.rows.is_empty());
        assert_eq!(2, grid.headers.len());
    }
}
