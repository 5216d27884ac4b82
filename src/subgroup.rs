use crate::strip_diacritics;
use std::collections::HashMap;

/// Canonicalizes free-form subgroup text across an import session. Variants
/// that differ only in case, accents or spacing fold onto the first spelling
/// seen; values already in the catalog keep their stored spelling.
#[derive(Clone, Debug, Default)]
pub struct SubgroupCatalog {
    entries: HashMap<String, String>,
}

impl SubgroupCatalog {
    /// Pre-load canonical spellings from the stored catalog so imports reuse
    /// them instead of minting new variants.
    pub fn seed<I: IntoIterator<Item = String>>(&mut self, values: I) {
        for value in values {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                continue;
            }
            self.entries
                .entry(fold_key(trimmed))
                .or_insert_with(|| trimmed.to_string());
        }
    }

    /// Resolve raw cell text to its canonical spelling, registering the
    /// uppercased trimmed input when the key is new.
    pub fn resolve(&mut self, raw: &str) -> String {
        let trimmed = raw.trim();
        self.entries
            .entry(fold_key(trimmed))
            .or_insert_with(|| trimmed.to_uppercase())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fold_key(s: &str) -> String {
    let upper = strip_diacritics(s).to_uppercase();
    upper.split_whitespace().collect::<Vec<_>>().join(" ")
}
