use crate::grid::SheetGrid;
use crate::header_map::{map_headers, ColumnMapping};
use crate::row::parse_row;
use crate::subgroup::SubgroupCatalog;
use crate::validate::{validate_row, ValidationError};
use derive_more::{Display, Error};
use serde::Serialize;

/// Findings reported per file are capped so a structurally broken upload
/// does not flood the preview payload.
pub const MAX_PLAN_ERRORS: usize = 50;

#[derive(Debug, Display, Error)]
pub enum ImportFileError {
    #[display("Nenhuma coluna reconhecida em \"{file}\"")]
    UnrecognizedSchema {
        #[error(ignore)]
        file: String,
    },
    #[display("O arquivo \"{file}\" não contém linhas de dados")]
    EmptyFile {
        #[error(ignore)]
        file: String,
    },
}

/// Preview of one uploaded file: what the header scan mapped, how many rows
/// parsed cleanly, and the first findings an operator should review.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileImportPlan {
    pub file_name: String,
    pub total_rows: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub errors: Vec<ValidationError>,
    pub mapping: ColumnMapping,
}

impl FileImportPlan {
    /// Dry-run the pipeline over a decoded grid. Rows with findings still
    /// count toward the import; only schema-level problems reject the file.
    pub fn build(file_name: &str, grid: &SheetGrid) -> Result<Self, ImportFileError> {
        if grid.rows.is_empty() {
            return Err(ImportFileError::EmptyFile {
                file: file_name.to_string(),
            });
        }
        let mapping = map_headers(&grid.headers);
        if mapping.is_empty() {
            return Err(ImportFileError::UnrecognizedSchema {
                file: file_name.to_string(),
            });
        }

        // Scratch canonicalizer: the committed import re-parses with the
        // session-wide one seeded from the catalog.
        let mut subgroups = SubgroupCatalog::default();
        let mut errors = Vec::new();
        let mut invalid_count = 0;
        for (idx, row) in grid.rows.iter().enumerate() {
            let item = parse_row(row, &mapping, idx, &mut subgroups);
            let row_errors = validate_row(row, &mapping, &item, idx);
            if !row_errors.is_empty() {
                invalid_count += 1;
                let room = MAX_PLAN_ERRORS.saturating_sub(errors.len());
                errors.extend(row_errors.into_iter().take(room));
            }
        }

        Ok(Self {
            file_name: file_name.to_string(),
            total_rows: grid.rows.len(),
            valid_count: grid.rows.len() - invalid_count,
            invalid_count,
            errors,
            mapping,
        })
    }
}
