use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::headers::{validate_headers, HeaderMap, ImportColumn};
use super::ImportError;
use crate::domain::rate::{center_key, NewRateDetail, RateKind};

/// Header occupies spreadsheet row 1; data starts at row 2.
const FIRST_DATA_ROW: usize = 2;

/// One (center, tonnage) rate assembled from consecutive or scattered rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateImportRecord {
    pub center_name: String,
    pub tonnage: Decimal,
    pub rows: Vec<usize>,
    pub details: Vec<NewRateDetail>,
}

impl RateImportRecord {
    pub fn first_row(&self) -> usize {
        self.rows.first().copied().unwrap_or(FIRST_DATA_ROW)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedImport {
    pub records: Vec<RateImportRecord>,
    pub errors: Vec<ImportError>,
    pub row_count: usize,
}

impl ParsedImport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct ParsedRow {
    center_name: String,
    tonnage: Decimal,
    detail: NewRateDetail,
}

/// Parses a rate sheet. Never fails as a whole: header problems, oversize
/// files and bad rows all land in `errors`.
pub fn parse_import_file<R: Read>(mut reader: R, max_rows: usize) -> ParsedImport {
    let mut parsed = ParsedImport::default();
    let mut input = Vec::new();
    if let Err(error) = reader.read_to_end(&mut input) {
        parsed.errors.push(ImportError::Unreadable { message: error.to_string() });
        return parsed;
    }
    let mut csv = ReaderBuilder::new().trim(Trim::All).flexible(true).from_reader(input.as_slice());

    let headers = match csv.headers() {
        Ok(headers) => headers.iter().map(str::to_string).collect::<Vec<_>>(),
        Err(error) => {
            parsed.errors.push(ImportError::Unreadable { message: error.to_string() });
            return parsed;
        }
    };

    let header_errors = validate_headers(&headers, &ImportColumn::REQUIRED);
    if !header_errors.is_empty() {
        parsed.errors = header_errors;
        return parsed;
    }
    let columns = HeaderMap::from_headers(&headers);

    let mut rows = Vec::new();
    let mut row = FIRST_DATA_ROW - 1;
    for result in csv.records() {
        // The reader drops empty lines without yielding a record; each one is
        // still a sheet row.
        let start = match &result {
            Ok(record) => record.position(),
            Err(error) => error.position(),
        };
        row += 1 + start.map_or(0, |position| empty_lines_at(&input, position.byte() as usize));
        match result {
            Ok(record) if is_blank(&record) => continue,
            Ok(record) => rows.push((row, record)),
            Err(error) => parsed.errors.push(ImportError::InvalidRow {
                row,
                column: None,
                message: error.to_string(),
            }),
        }
        if rows.len() > max_rows {
            parsed.errors = vec![ImportError::TooManyRows { max_rows }];
            return parsed;
        }
    }
    parsed.row_count = rows.len();

    let mut groups: Vec<RateImportRecord> = Vec::new();
    let mut index_by_key: HashMap<(String, Decimal), usize> = HashMap::new();
    let mut failed_keys: HashMap<(String, Decimal), Vec<usize>> = HashMap::new();

    for (row, record) in rows {
        match parse_row(row, &record, &columns) {
            Ok(parsed_row) => {
                let key = (center_key(&parsed_row.center_name), parsed_row.tonnage.normalize());
                let index = *index_by_key.entry(key).or_insert_with(|| {
                    groups.push(RateImportRecord {
                        center_name: parsed_row.center_name.clone(),
                        tonnage: parsed_row.tonnage,
                        rows: Vec::new(),
                        details: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[index].rows.push(row);
                groups[index].details.push(parsed_row.detail);
            }
            Err((key, errors)) => {
                if let Some(key) = key {
                    failed_keys.entry(key).or_default().push(row);
                }
                parsed.errors.extend(errors);
            }
        }
    }

    // A rate is imported whole or not at all.
    for record in groups {
        let key = (center_key(&record.center_name), record.tonnage.normalize());
        match failed_keys.get(&key) {
            Some(bad_rows) => parsed.errors.push(ImportError::IncompleteRate {
                row: record.first_row(),
                center_name: record.center_name,
                tonnage: record.tonnage,
                invalid_rows: bad_rows.clone(),
            }),
            None => parsed.records.push(record),
        }
    }

    parsed
}

type RowFailure = (Option<(String, Decimal)>, Vec<ImportError>);

fn parse_row(row: usize, record: &StringRecord, columns: &HeaderMap) -> Result<ParsedRow, RowFailure> {
    let mut errors = Vec::new();
    let mut invalid = |column: ImportColumn, message: String| {
        errors.push(ImportError::InvalidRow {
            row,
            column: Some(column.label().to_string()),
            message,
        });
    };

    let center_name = match cell(record, columns, ImportColumn::CenterName) {
        Some(value) => Some(value.to_string()),
        None => {
            invalid(ImportColumn::CenterName, "center name is required".to_string());
            None
        }
    };

    let tonnage = match cell(record, columns, ImportColumn::Tonnage) {
        None => {
            invalid(ImportColumn::Tonnage, "tonnage is required".to_string());
            None
        }
        Some(raw) => match parse_tonnage(raw) {
            Some(value) if value > Decimal::ZERO => Some(value),
            Some(value) => {
                invalid(ImportColumn::Tonnage, format!("tonnage must be positive (got {value})"));
                None
            }
            None => {
                invalid(ImportColumn::Tonnage, format!("`{raw}` is not a number"));
                None
            }
        },
    };

    let kind = match cell(record, columns, ImportColumn::Kind) {
        None => {
            invalid(ImportColumn::Kind, "rate kind is required".to_string());
            None
        }
        Some(raw) => match RateKind::from_str(raw) {
            Ok(kind) => Some(kind),
            Err(error) => {
                invalid(ImportColumn::Kind, error.to_string());
                None
            }
        },
    };

    let amount = match cell(record, columns, ImportColumn::Amount) {
        None => {
            invalid(ImportColumn::Amount, "amount is required".to_string());
            None
        }
        Some(raw) => match parse_amount(raw) {
            Some(value) if value >= Decimal::ZERO => Some(value),
            Some(value) => {
                invalid(ImportColumn::Amount, format!("amount must not be negative (got {value})"));
                None
            }
            None => {
                invalid(ImportColumn::Amount, format!("`{raw}` is not an amount"));
                None
            }
        },
    };

    let mut date = |column: ImportColumn| match cell(record, columns, column) {
        None => None,
        Some(raw) => match parse_date(raw) {
            Some(value) => Some(value),
            None => {
                invalid(column, format!("`{raw}` is not a date (expected YYYY-MM-DD)"));
                None
            }
        },
    };
    let valid_from = date(ImportColumn::ValidFrom);
    let valid_to = date(ImportColumn::ValidTo);

    let key = match (&center_name, tonnage) {
        (Some(center_name), Some(tonnage)) => Some((center_key(center_name), tonnage.normalize())),
        _ => None,
    };

    let (Some(center_name), Some(tonnage), Some(kind), Some(amount)) =
        (center_name, tonnage, kind, amount)
    else {
        return Err((key, errors));
    };
    if !errors.is_empty() {
        return Err((key, errors));
    }

    let mut detail = NewRateDetail::new(kind, amount).with_validity(valid_from, valid_to);
    detail.region = cell(record, columns, ImportColumn::Region).map(str::to_string);
    detail.conditions = cell(record, columns, ImportColumn::Conditions).map(str::to_string);

    if let Err(error) = detail.validate() {
        let column = Some(ImportColumn::ValidTo.label().to_string());
        return Err((key, vec![ImportError::InvalidRow { row, column, message: error.to_string() }]));
    }

    Ok(ParsedRow { center_name, tonnage, detail })
}

fn cell<'r>(record: &'r StringRecord, columns: &HeaderMap, column: ImportColumn) -> Option<&'r str> {
    columns
        .position(column)
        .and_then(|index| record.get(index))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Empty lines starting at `start`, the offset where the reader resumes after
/// the previous record. A CRLF split across that boundary is not a line.
fn empty_lines_at(input: &[u8], start: usize) -> usize {
    let mut index = start;
    if index > 0 && input.get(index - 1) == Some(&b'\r') && input.get(index) == Some(&b'\n') {
        index += 1;
    }
    let mut count = 0;
    while let Some(&byte) = input.get(index) {
        match byte {
            b'\r' if input.get(index + 1) == Some(&b'\n') => index += 2,
            b'\r' | b'\n' => index += 1,
            _ => break,
        }
        count += 1;
    }
    count
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Decimal tonnage with an optional `t` or `톤` suffix.
pub fn parse_tonnage(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim().trim_end_matches(['t', 'T', '톤']).trim();
    Decimal::from_str(trimmed).ok()
}

/// Accepts thousands separators and a trailing 원.
fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned = raw.trim().trim_end_matches('원').replace(',', "");
    Decimal::from_str(cleaned.trim()).ok()
}

/// `YYYY-MM-DD` (also `/` or `.` separated) as midnight UTC, or RFC 3339.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.with_timezone(&Utc));
    }
    ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"]
        .into_iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::{parse_date, parse_import_file};
    use crate::domain::rate::RateKind;
    use crate::import::ImportError;

    const SHEET: &str = "\
센터명,톤수,요금종류,지역,금액,조건,적용시작일,적용종료일
서울센터,5,BASE,,\"50,000\",,,
서울센터,5,기본운임,서울,60000,,2026-01-01,
서울센터,5,CALL_FEE,,5000,,,
부산센터,2.5t,SPECIAL,,1000,야간 할증,,2026-12-31
서울센터,5.0,경유비,,8000,,,
";

    #[test]
    fn groups_rows_by_center_and_tonnage() {
        let parsed = parse_import_file(SHEET.as_bytes(), 100);

        assert!(parsed.is_clean(), "unexpected errors: {:?}", parsed.errors);
        assert_eq!(parsed.row_count, 5);
        assert_eq!(parsed.records.len(), 2);

        let seoul = &parsed.records[0];
        assert_eq!(seoul.center_name, "서울센터");
        assert_eq!(seoul.tonnage, dec!(5));
        assert_eq!(seoul.rows, vec![2, 3, 4, 6]);
        assert_eq!(seoul.details[0].amount, dec!(50000));
        assert_eq!(seoul.details[1].region.as_deref(), Some("서울"));
        assert_eq!(
            seoul.details[1].valid_from,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single()
        );
        assert_eq!(seoul.details[3].kind, RateKind::WaypointFee);

        let busan = &parsed.records[1];
        assert_eq!(busan.tonnage, dec!(2.5));
        assert_eq!(busan.details[0].conditions.as_deref(), Some("야간 할증"));
    }

    #[test]
    fn bad_rows_are_reported_with_row_numbers_and_sink_their_rate() {
        let sheet = "\
center_name,tonnage,kind,amount
서울센터,5,BASE,50000
서울센터,5,UNKNOWN,1000
부산센터,abc,BASE,40000
대구센터,1,BASE,-1
광주센터,1,BASE,30000
";
        let parsed = parse_import_file(sheet.as_bytes(), 100);

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].center_name, "광주센터");

        let rows = parsed
            .errors
            .iter()
            .filter_map(|error| match error {
                ImportError::InvalidRow { row, .. } => Some(*row),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(rows, vec![3, 4, 5]);
        assert!(parsed.errors.iter().any(|error| matches!(
            error,
            ImportError::IncompleteRate { row: 2, invalid_rows, .. } if invalid_rows == &vec![3]
        )));
    }

    #[test]
    fn missing_headers_stop_before_rows() {
        let parsed = parse_import_file("센터명,금액\n서울센터,1000\n".as_bytes(), 100);

        assert!(parsed.records.is_empty());
        assert_eq!(parsed.row_count, 0);
        assert_eq!(parsed.errors.len(), 2);
    }

    #[test]
    fn oversize_sheet_is_rejected() {
        let mut sheet = String::from("center_name,tonnage,kind,amount\n");
        for _ in 0..4 {
            sheet.push_str("서울센터,5,BASE,50000\n");
        }

        let parsed = parse_import_file(sheet.as_bytes(), 3);

        assert!(parsed.records.is_empty());
        assert_eq!(parsed.errors, vec![ImportError::TooManyRows { max_rows: 3 }]);
    }

    #[test]
    fn inverted_validity_window_is_a_row_error() {
        let sheet = "\
center_name,tonnage,kind,amount,valid_from,valid_to
서울센터,5,BASE,50000,2026-06-01,2026-01-01
";
        let parsed = parse_import_file(sheet.as_bytes(), 10);

        assert!(parsed.records.is_empty());
        assert!(matches!(parsed.errors[0], ImportError::InvalidRow { row: 2, .. }));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let sheet = "center_name,tonnage,kind,amount\n,,,\n서울센터,5,BASE,50000\n";
        let parsed = parse_import_file(sheet.as_bytes(), 10);

        assert!(parsed.is_clean());
        assert_eq!(parsed.records[0].rows, vec![3]);
    }

    #[test]
    fn rows_after_an_empty_line_keep_their_sheet_position() {
        let sheet = "center_name,tonnage,kind,amount\n서울센터,5,BASE,50000\n\n부산센터,abc,BASE,1\n광주센터,1,BASE,30000\n";
        let parsed = parse_import_file(sheet.as_bytes(), 10);

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].rows, vec![2]);
        assert_eq!(parsed.records[1].rows, vec![5]);
        assert!(matches!(parsed.errors.as_slice(), [ImportError::InvalidRow { row: 4, .. }]));
    }

    #[test]
    fn quoted_multiline_cell_is_one_sheet_row() {
        let sheet = "center_name,tonnage,kind,amount,conditions\n서울센터,5,BASE,50000,\"야간\n할증\"\n부산센터,abc,BASE,1,\n";
        let parsed = parse_import_file(sheet.as_bytes(), 10);

        assert_eq!(parsed.records[0].rows, vec![2]);
        assert_eq!(parsed.records[0].details[0].conditions.as_deref(), Some("야간\n할증"));
        assert!(matches!(parsed.errors.as_slice(), [ImportError::InvalidRow { row: 3, .. }]));
    }

    #[test]
    fn crlf_sheet_counts_empty_lines_once() {
        let sheet = "center_name,tonnage,kind,amount\r\n서울센터,5,BASE,50000\r\n\r\n\r\n부산센터,abc,BASE,1\r\n";
        let parsed = parse_import_file(sheet.as_bytes(), 10);

        assert_eq!(parsed.records[0].rows, vec![2]);
        assert!(matches!(parsed.errors.as_slice(), [ImportError::InvalidRow { row: 5, .. }]));
    }

    #[test]
    fn dates_accept_plain_and_rfc3339_forms() {
        let midnight = Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).single();
        assert_eq!(parse_date("2026-03-05"), midnight);
        assert_eq!(parse_date("2026.03.05"), midnight);
        assert_eq!(parse_date("2026-03-05T09:00:00+09:00"), midnight);
        assert_eq!(parse_date("05/03/2026"), None);
    }
}
