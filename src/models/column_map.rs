use crate::error::ReconError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Semantic columns of a receiving journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    ReceiptNumber,
    Supplier,
    ReceiptDate,
    ProductName,
    Quantity,
    Unit,
    UnitPrice,
    Subtotal,
    TaxAmount,
    GrossAmount,
    Department,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 11] = [
        ColumnRole::ReceiptNumber,
        ColumnRole::Supplier,
        ColumnRole::ReceiptDate,
        ColumnRole::ProductName,
        ColumnRole::Quantity,
        ColumnRole::Unit,
        ColumnRole::UnitPrice,
        ColumnRole::Subtotal,
        ColumnRole::TaxAmount,
        ColumnRole::GrossAmount,
        ColumnRole::Department,
    ];

    /// Key used in the `[columns]` table of the config file.
    pub fn key(self) -> &'static str {
        match self {
            ColumnRole::ReceiptNumber => "receipt_number",
            ColumnRole::Supplier => "supplier",
            ColumnRole::ReceiptDate => "receipt_date",
            ColumnRole::ProductName => "product_name",
            ColumnRole::Quantity => "quantity",
            ColumnRole::Unit => "unit",
            ColumnRole::UnitPrice => "unit_price",
            ColumnRole::Subtotal => "subtotal",
            ColumnRole::TaxAmount => "tax_amount",
            ColumnRole::GrossAmount => "gross_amount",
            ColumnRole::Department => "department",
        }
    }

    /// Column layout of the standard receiving-journal export.
    pub fn default_index(self) -> usize {
        match self {
            ColumnRole::ReceiptNumber => 0,
            ColumnRole::Supplier => 3,
            ColumnRole::ReceiptDate => 23,
            ColumnRole::ProductName => 0,
            ColumnRole::Quantity => 8,
            ColumnRole::Unit => 9,
            ColumnRole::UnitPrice => 13,
            ColumnRole::Subtotal => 25,
            ColumnRole::TaxAmount => 30,
            ColumnRole::GrossAmount => 34,
            ColumnRole::Department => 37,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Column identifier as written in config: `"AE"`, `"D # supplier"`, `"3"` or `3`.
/// Any other TOML value lands in `Other` and resolves to an error, never a failed load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnId {
    Index(u32),
    Text(String),
    Other(toml::Value),
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnId::Index(i) => write!(f, "{}", i),
            ColumnId::Text(s) => f.write_str(s),
            ColumnId::Other(v) => write!(f, "{}", v),
        }
    }
}

/// Column index (0-based) to Excel letter (0→A, 25→Z, 26→AA).
pub fn col_index_to_letter(index: usize) -> String {
    let mut n = index;
    let mut s = String::new();
    loop {
        let r = (n % 26) as u8;
        s.insert(0, (b'A' + r) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    s
}

/// Excel letter to column index (A→0, Z→25, AA→26). Text after `#` is a comment.
/// Returns `None` unless the remaining text is one or more letters A–Z (any case).
pub fn col_letter_to_index(letters: &str) -> Option<usize> {
    let letters = letters.split('#').next().unwrap_or("").trim();
    if letters.is_empty() {
        return None;
    }
    let mut value: usize = 0;
    for c in letters.chars() {
        let upper = c.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return None;
        }
        let digit = (upper as u8 - b'A' + 1) as usize;
        value = value.checked_mul(26)?.checked_add(digit)?;
    }
    Some(value - 1)
}

/// Resolve one configured identifier. Purely numeric text is taken as the index itself.
pub fn resolve_column(role: ColumnRole, id: &ColumnId) -> Result<usize, ReconError> {
    let invalid = || ReconError::InvalidColumnIdentifier {
        role: role.key().to_string(),
        identifier: id.to_string(),
    };
    match id {
        ColumnId::Index(i) => Ok(*i as usize),
        ColumnId::Text(raw) => {
            let trimmed = raw.trim();
            if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
                return trimmed.parse::<usize>().map_err(|_| invalid());
            }
            col_letter_to_index(trimmed).ok_or_else(invalid)
        }
        ColumnId::Other(_) => Err(invalid()),
    }
}

/// Resolved zero-based index for every [`ColumnRole`]. Built once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    indices: [usize; 11],
}

impl Default for ColumnMap {
    fn default() -> Self {
        let mut indices = [0; 11];
        for role in ColumnRole::ALL {
            indices[role.slot()] = role.default_index();
        }
        Self { indices }
    }
}

impl ColumnMap {
    /// Resolve configured identifiers; any role that is missing or fails to resolve keeps its
    /// default index. Returns the map plus the errors that were recovered from.
    pub fn resolve(configured: &BTreeMap<String, ColumnId>) -> (Self, Vec<ReconError>) {
        let mut map = Self::default();
        let mut recovered = Vec::new();
        for role in ColumnRole::ALL {
            let Some(id) = configured.get(role.key()) else {
                continue;
            };
            match resolve_column(role, id) {
                Ok(index) => map.indices[role.slot()] = index,
                Err(e) => {
                    tracing::warn!(
                        role = role.key(),
                        identifier = %id,
                        default = %col_index_to_letter(role.default_index()),
                        "invalid column identifier, using default"
                    );
                    recovered.push(e);
                }
            }
        }
        for key in configured.keys() {
            if !ColumnRole::ALL.iter().any(|r| r.key() == key) {
                tracing::warn!(key = %key, "unknown column role in config ignored");
            }
        }
        (map, recovered)
    }

    pub fn get(&self, role: ColumnRole) -> usize {
        self.indices[role.slot()]
    }

    pub fn with(mut self, role: ColumnRole, index: usize) -> Self {
        self.indices[role.slot()] = index;
        self
    }

    /// `role=LETTER` pairs for logging.
    pub fn describe(&self) -> String {
        ColumnRole::ALL
            .iter()
            .map(|r| format!("{}={}", r.key(), col_index_to_letter(self.get(*r))))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ColumnId {
        ColumnId::Text(s.to_string())
    }

    #[test]
    fn letters_resolve_base26() {
        for (letters, expected) in [("A", 0), ("Z", 25), ("AA", 26), ("AZ", 51), ("BA", 52), ("AE", 30), ("AL", 37)] {
            assert_eq!(resolve_column(ColumnRole::Quantity, &text(letters)).unwrap(), expected, "{}", letters);
        }
    }

    #[test]
    fn comment_and_case_are_ignored() {
        assert_eq!(resolve_column(ColumnRole::Unit, &text("A#note")).unwrap(), 0);
        assert_eq!(resolve_column(ColumnRole::Unit, &text("ae # tax")).unwrap(), 30);
    }

    #[test]
    fn numeric_identifiers_are_indices() {
        assert_eq!(resolve_column(ColumnRole::Unit, &text("3")).unwrap(), 3);
        assert_eq!(resolve_column(ColumnRole::Unit, &ColumnId::Index(3)).unwrap(), 3);
    }

    #[test]
    fn mixed_identifier_is_rejected() {
        let err = resolve_column(ColumnRole::Supplier, &text("1A")).unwrap_err();
        assert!(matches!(err, ReconError::InvalidColumnIdentifier { ref role, ref identifier } if role == "supplier" && identifier == "1A"));
        assert!(resolve_column(ColumnRole::Supplier, &text("")).is_err());
        assert!(resolve_column(ColumnRole::Supplier, &text("A-B")).is_err());
        assert!(resolve_column(ColumnRole::Supplier, &text("#only comment")).is_err());
    }

    #[test]
    fn letter_round_trip_matches_index_to_letter() {
        for index in [0, 25, 26, 51, 52, 701, 702] {
            assert_eq!(col_letter_to_index(&col_index_to_letter(index)), Some(index));
        }
    }

    #[test]
    fn bad_role_falls_back_without_touching_others() {
        let mut configured = BTreeMap::new();
        configured.insert("supplier".to_string(), text("1A"));
        configured.insert("quantity".to_string(), text("K"));
        let (map, recovered) = ColumnMap::resolve(&configured);
        assert_eq!(map.get(ColumnRole::Supplier), 3);
        assert_eq!(map.get(ColumnRole::Quantity), 10);
        assert_eq!(map.get(ColumnRole::TaxAmount), 30);
        assert_eq!(recovered.len(), 1);
    }

    #[test]
    fn defaults_cover_every_role() {
        let map = ColumnMap::default();
        assert_eq!(map.get(ColumnRole::ReceiptDate), 23);
        assert_eq!(map.get(ColumnRole::GrossAmount), 34);
        assert_eq!(map.get(ColumnRole::Department), 37);
        assert!(map.describe().starts_with("receipt_number=A, supplier=D"));
    }
}
