use std::collections::HashMap;

use super::ImportError;

/// Columns understood by the rate import sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImportColumn {
    CenterName,
    Tonnage,
    Kind,
    Region,
    Amount,
    Conditions,
    ValidFrom,
    ValidTo,
}

impl ImportColumn {
    pub const ALL: [ImportColumn; 8] = [
        ImportColumn::CenterName,
        ImportColumn::Tonnage,
        ImportColumn::Kind,
        ImportColumn::Region,
        ImportColumn::Amount,
        ImportColumn::Conditions,
        ImportColumn::ValidFrom,
        ImportColumn::ValidTo,
    ];

    pub const REQUIRED: [ImportColumn; 4] =
        [ImportColumn::CenterName, ImportColumn::Tonnage, ImportColumn::Kind, ImportColumn::Amount];

    pub fn key(&self) -> &'static str {
        match self {
            Self::CenterName => "center_name",
            Self::Tonnage => "tonnage",
            Self::Kind => "kind",
            Self::Region => "region",
            Self::Amount => "amount",
            Self::Conditions => "conditions",
            Self::ValidFrom => "valid_from",
            Self::ValidTo => "valid_to",
        }
    }

    /// Header used by the spreadsheet template.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CenterName => "센터명",
            Self::Tonnage => "톤수",
            Self::Kind => "요금종류",
            Self::Region => "지역",
            Self::Amount => "금액",
            Self::Conditions => "조건",
            Self::ValidFrom => "적용시작일",
            Self::ValidTo => "적용종료일",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::CenterName => &["center", "centername"],
            Self::Kind => &["rate_kind", "ratekind", "type"],
            Self::Conditions => &["description"],
            Self::ValidFrom => &["validfrom", "from"],
            Self::ValidTo => &["validto", "to"],
            _ => &[],
        }
    }

    /// Maps a header cell to a column; case, surrounding space and a BOM are ignored.
    pub fn from_header(header: &str) -> Option<Self> {
        let trimmed = header.trim_start_matches('\u{feff}').trim();
        let normalized = trimmed.to_ascii_lowercase().replace(|c: char| c == ' ' || c == '-', "_");
        Self::ALL.into_iter().find(|column| {
            column.key() == normalized
                || column.label() == trimmed
                || column.aliases().contains(&normalized.as_str())
        })
    }
}

/// Resolved position of each recognised column in the header row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap {
    positions: HashMap<ImportColumn, usize>,
}

impl HeaderMap {
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut positions = HashMap::new();
        for (index, header) in headers.iter().enumerate() {
            if let Some(column) = ImportColumn::from_header(header.as_ref()) {
                positions.entry(column).or_insert(index);
            }
        }
        Self { positions }
    }

    pub fn position(&self, column: ImportColumn) -> Option<usize> {
        self.positions.get(&column).copied()
    }
}

/// Missing or repeated columns in the header row. Unknown columns are ignored.
pub fn validate_headers<S: AsRef<str>>(headers: &[S], required: &[ImportColumn]) -> Vec<ImportError> {
    let mut errors = Vec::new();
    let mut seen: HashMap<ImportColumn, usize> = HashMap::new();

    for header in headers {
        if let Some(column) = ImportColumn::from_header(header.as_ref()) {
            let count = seen.entry(column).or_insert(0);
            *count += 1;
            if *count == 2 {
                errors.push(ImportError::DuplicateHeader { header: column.label().to_string() });
            }
        }
    }

    for column in required {
        if !seen.contains_key(column) {
            errors.push(ImportError::MissingHeader { header: column.label().to_string() });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::{validate_headers, HeaderMap, ImportColumn};
    use crate::import::ImportError;

    #[test]
    fn korean_and_english_headers_are_recognised() {
        assert_eq!(ImportColumn::from_header("센터명"), Some(ImportColumn::CenterName));
        assert_eq!(ImportColumn::from_header(" Center Name "), Some(ImportColumn::CenterName));
        assert_eq!(ImportColumn::from_header("\u{feff}톤수"), Some(ImportColumn::Tonnage));
        assert_eq!(ImportColumn::from_header("VALID-FROM"), Some(ImportColumn::ValidFrom));
        assert_eq!(ImportColumn::from_header("비고"), None);
    }

    #[test]
    fn reports_every_missing_required_column() {
        let errors = validate_headers(&["센터명", "지역"], &ImportColumn::REQUIRED);

        assert_eq!(
            errors,
            vec![
                ImportError::MissingHeader { header: "톤수".to_string() },
                ImportError::MissingHeader { header: "요금종류".to_string() },
                ImportError::MissingHeader { header: "금액".to_string() },
            ]
        );
    }

    #[test]
    fn repeated_column_is_reported_once() {
        let errors = validate_headers(
            &["center_name", "센터명", "center", "tonnage", "kind", "amount"],
            &ImportColumn::REQUIRED,
        );

        assert_eq!(errors, vec![ImportError::DuplicateHeader { header: "센터명".to_string() }]);
    }

    #[test]
    fn header_map_keeps_first_position() {
        let map = HeaderMap::from_headers(&["금액", "비고", "amount", "센터명"]);

        assert_eq!(map.position(ImportColumn::Amount), Some(0));
        assert_eq!(map.position(ImportColumn::CenterName), Some(3));
        assert_eq!(map.position(ImportColumn::Region), None);
    }
}
