//! CSV ingest for uploaded price tables.
//!
//! The first row is always treated as a header and discarded. Every following
//! row with at least five fields becomes a [`PriceRecord`]; shorter rows are
//! skipped. Fields that fail to coerce never reject a row: they are replaced
//! according to [`FallbackPolicy`]. Only a table the CSV tokenizer cannot read
//! (broken quoting, invalid UTF-8) fails the whole upload.

use std::fmt;

use chrono::{Datelike, NaiveDate, Utc};

use crate::{
    error::{AppError, AppResult},
    models::PriceRecord,
};

/// Minimum number of fields a row needs to be ingested.
pub const MIN_FIELDS: usize = 5;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Substitutions used when a field cannot be coerced.
///
/// | field        | rule                                   | fallback     |
/// |--------------|----------------------------------------|--------------|
/// | `id`         | signed 64-bit integer                  | `id`         |
/// | `name`       | verbatim                               | none         |
/// | `category`   | verbatim                               | none         |
/// | `price`      | finite decimal, sign kept              | `price`      |
/// | `created_at` | `YYYY-MM-DD`, not `0001-01-01`         | `created_at` |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackPolicy {
    pub id: i64,
    pub price: f64,
    pub created_at: NaiveDate,
}

impl FallbackPolicy {
    /// Zero id, zero price and the current UTC date.
    pub fn today() -> Self {
        Self::on(Utc::now().date_naive())
    }

    pub fn on(date: NaiveDate) -> Self {
        Self {
            id: 0,
            price: 0.0,
            created_at: date,
        }
    }

    pub fn coerce_id(&self, raw: &str) -> i64 {
        raw.parse::<i64>().unwrap_or(self.id)
    }

    pub fn coerce_price(&self, raw: &str) -> f64 {
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => self.price,
        }
    }

    pub fn coerce_date(&self, raw: &str) -> NaiveDate {
        if !is_iso_date_shape(raw) {
            return self.created_at;
        }
        match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(date) if !is_zero_date(date) => date,
            _ => self.created_at,
        }
    }

    fn coerce_row(&self, row: &csv::StringRecord) -> PriceRecord {
        PriceRecord {
            id: self.coerce_id(&row[0]),
            name: row[1].to_string(),
            category: row[2].to_string(),
            price: self.coerce_price(&row[3]),
            created_at: self.coerce_date(&row[4]),
        }
    }
}

/// `DDDD-DD-DD` with ASCII digits only. chrono alone would also take signs,
/// padding spaces and single-digit months or days.
fn is_iso_date_shape(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

// 0001-01-01 is what an unset timestamp decodes to upstream.
fn is_zero_date(date: NaiveDate) -> bool {
    date.year() == 1 && date.ordinal() == 1
}

/// Parses a whole CSV table using today's date for unreadable `create_date` values.
pub fn parse(table: &[u8]) -> AppResult<Vec<PriceRecord>> {
    parse_with(table, &FallbackPolicy::today())
}

/// An unreadable header counts as an empty table; any later tokenizer failure
/// rejects the whole table.
pub fn parse_with(table: &[u8], policy: &FallbackPolicy) -> AppResult<Vec<PriceRecord>> {
    if let Err(err) = check_quoting(table) {
        if err.in_header() {
            tracing::debug!(error = %err, "unreadable header, treating table as empty");
            return Ok(Vec::new());
        }
        return Err(AppError::malformed_table(err.to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(table);
    let mut rows = reader.records();

    match rows.next() {
        None => return Ok(Vec::new()),
        Some(Err(err)) => {
            tracing::debug!(error = %err, "unreadable header, treating table as empty");
            return Ok(Vec::new());
        }
        Some(Ok(_header)) => {}
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in rows {
        let row = row.map_err(table_error)?;
        if row.len() < MIN_FIELDS {
            dropped += 1;
            continue;
        }
        records.push(policy.coerce_row(&row));
    }

    tracing::debug!(parsed = records.len(), dropped, "parsed price table");
    Ok(records)
}

fn table_error(err: csv::Error) -> AppError {
    AppError::malformed_table(err.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QuoteError {
    line: usize,
    /// Zero-based index of the record holding the fault; 0 is the header.
    record: usize,
    reason: &'static str,
}

impl QuoteError {
    fn in_header(&self) -> bool {
        self.record == 0
    }
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// Rejects tables the lenient CSV tokenizer would otherwise accept silently:
/// a bare `"` inside an unquoted field, text after a closing quote, or a quoted
/// field left open at end of input.
fn check_quoting(table: &[u8]) -> Result<(), QuoteError> {
    let mut state = QuoteState::FieldStart;
    let mut line = 1usize;
    let mut record = 0usize;
    let mut record_has_content = false;

    for &byte in table {
        let fault = |reason| QuoteError {
            line,
            record,
            reason,
        };
        state = match state {
            QuoteState::FieldStart => match byte {
                b'"' => QuoteState::Quoted,
                b',' | b'\r' | b'\n' => QuoteState::FieldStart,
                _ => QuoteState::Unquoted,
            },
            QuoteState::Unquoted => match byte {
                b'"' => return Err(fault("bare \" in non-quoted field")),
                b',' | b'\r' | b'\n' => QuoteState::FieldStart,
                _ => QuoteState::Unquoted,
            },
            QuoteState::Quoted if byte == b'"' => QuoteState::QuoteInQuoted,
            QuoteState::Quoted => QuoteState::Quoted,
            QuoteState::QuoteInQuoted => match byte {
                b'"' => QuoteState::Quoted,
                b',' | b'\r' | b'\n' => QuoteState::FieldStart,
                _ => return Err(fault("extraneous or missing \" in quoted field")),
            },
        };

        match byte {
            b'\n' => {
                line += 1;
                // Blank lines are skipped by the reader and do not end a record.
                if state == QuoteState::FieldStart && record_has_content {
                    record += 1;
                    record_has_content = false;
                }
            }
            b'\r' => {}
            _ => record_has_content = true,
        }
    }

    if state == QuoteState::Quoted {
        return Err(QuoteError {
            line,
            record,
            reason: "unterminated quoted field",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{FallbackPolicy, parse, parse_with};
    use crate::error::AppError;

    fn fixed_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 6, 1).unwrap()
    }

    fn parse_fixed(table: &str) -> Vec<crate::models::PriceRecord> {
        parse_with(table.as_bytes(), &FallbackPolicy::on(fixed_day())).unwrap()
    }

    #[test]
    fn empty_table_yields_no_records() {
        assert!(parse(b"").unwrap().is_empty());
        assert!(parse(b"id,name,category,price,create_date\n").unwrap().is_empty());
    }

    #[test]
    fn header_is_discarded_regardless_of_content() {
        let records = parse_fixed("1,looks,like,10,2024-01-01\n2,apple,fruit,3.5,2024-02-03\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 2);
    }

    #[test]
    fn valid_rows_are_coerced_in_order() {
        let records = parse_fixed(
            "id,name,category,price,create_date\n\
             7,apple,fruit,1.25,2024-03-09\n\
             3,\"bolt, steel\",hardware,-4,2023-12-31\n",
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 7);
        assert_eq!(records[0].name, "apple");
        assert_eq!(records[0].category, "fruit");
        assert_eq!(records[0].price, 1.25);
        assert_eq!(
            records[0].created_at,
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
        assert_eq!(records[1].name, "bolt, steel");
        assert_eq!(records[1].price, -4.0);
    }

    #[test]
    fn short_rows_are_dropped_and_extra_fields_ignored() {
        let records = parse_fixed(
            "id,name,category,price,create_date\n\
             1,apple,fruit,2\n\
             2,pear,fruit,3,2024-01-01,extra,columns\n",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 2);
    }

    #[test]
    fn unparsable_fields_fall_back() {
        let records = parse_fixed(
            "id,name,category,price,create_date\n\
             abc,apple,fruit,xyz,not-a-date\n\
             99999999999999999999,pear,fruit,NaN,2024-13-01\n\
             5,plum,fruit,inf,0001-01-01\n",
        );
        assert_eq!(records.len(), 3);
        for record in &records {
            assert_eq!(record.price, 0.0);
            assert_eq!(record.created_at, fixed_day());
        }
        assert_eq!(records[0].id, 0);
        assert_eq!(records[1].id, 0);
        assert_eq!(records[2].id, 5);
    }

    #[test]
    fn date_must_be_exact_iso_shape() {
        let policy = FallbackPolicy::on(fixed_day());
        assert_eq!(policy.coerce_date("2024-1-5"), fixed_day());
        assert_eq!(policy.coerce_date(" 2024-01-05"), fixed_day());
        assert_eq!(policy.coerce_date("2024- 1-05"), fixed_day());
        assert_eq!(policy.coerce_date("+2024-1-05"), fixed_day());
        assert_eq!(policy.coerce_date("2024-01- 5"), fixed_day());
        assert_eq!(policy.coerce_date("2024/01/05"), fixed_day());
        assert_eq!(
            policy.coerce_date("2024-01-05"),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert_eq!(
            policy.coerce_date("1970-01-01"),
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
        );
    }

    #[test]
    fn today_policy_uses_current_date() {
        let records = parse(b"h\n1,a,b,1,garbage\n").unwrap();
        let today = chrono::Utc::now().date_naive();
        assert!(records[0].created_at >= today - chrono::Duration::days(1));
        assert!(records[0].created_at <= today + chrono::Duration::days(1));
    }

    #[test]
    fn broken_quoting_fails_the_table() {
        for table in [
            "id,name,category,price,create_date\n1,\"open,fruit,1,2024-01-01\n",
            "id,name,category,price,create_date\n1,ap\"ple,fruit,1,2024-01-01\n",
            "id,name,category,price,create_date\n1,\"apple\"x,fruit,1,2024-01-01\n",
        ] {
            assert!(matches!(
                parse(table.as_bytes()),
                Err(AppError::MalformedTable(_))
            ));
        }
    }

    #[test]
    fn unreadable_header_yields_empty_table() {
        for table in [
            "id,na\"me,category,price,create_date\n1,a,b,1,2024-01-01\n",
            "\"id,name\n1,a,b,1,2024-01-01\n",
            "\"id\"x,name,category,price,create_date\n1,a,b,1,2024-01-01\n",
            "\n\nid,na\"me\n1,a,b,1,2024-01-01\n",
        ] {
            assert!(parse_fixed(table).is_empty(), "table: {table:?}");
        }
    }

    #[test]
    fn quoting_fault_after_blank_lines_is_still_a_row_fault() {
        let table = "id,name,category,price,create_date\n\n\n1,ap\"ple,fruit,1,2024-01-01\n";
        assert!(matches!(
            parse(table.as_bytes()),
            Err(AppError::MalformedTable(_))
        ));
    }

    #[test]
    fn quoted_header_spanning_lines_is_one_record() {
        let records = parse_fixed(
            "\"id\nnumber\",name,category,price,create_date\n\
             4,apple,fruit,2,2024-01-01\n",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 4);
    }

    #[test]
    fn escaped_quotes_and_embedded_newlines_are_accepted() {
        let records = parse_fixed(
            "id,name,category,price,create_date\r\n\
             1,\"the \"\"best\"\"\nplum\",fruit,2,2024-01-01\r\n",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "the \"best\"\nplum");
    }

    #[test]
    fn invalid_utf8_fails_the_table() {
        let table = b"id,name,category,price,create_date\n1,\xff\xfe,fruit,1,2024-01-01\n";
        assert!(matches!(parse(table), Err(AppError::MalformedTable(_))));
    }
}
