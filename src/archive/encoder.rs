use std::io::{Cursor, Write};

use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{
    error::{AppError, AppResult},
    models::{CSV_HEADER, DATA_FILE_NAME, PriceRecord},
};

/// Renders records as `data.csv` and wraps it as the only entry of a new zip archive.
///
/// Prices are written as whole numbers; the fractional part kept in storage is
/// dropped on export.
pub fn encode(records: &[PriceRecord]) -> AppResult<Vec<u8>> {
    let table = write_table(records)?;

    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    archive
        .start_file(DATA_FILE_NAME, options)
        .map_err(|err| AppError::internal(format!("failed to start archive entry: {err}")))?;
    archive
        .write_all(&table)
        .map_err(|err| AppError::internal(format!("failed to write archive entry: {err}")))?;
    let bytes = archive
        .finish()
        .map_err(|err| AppError::internal(format!("failed to finish archive: {err}")))?
        .into_inner();

    tracing::debug!(records = records.len(), bytes = bytes.len(), "encoded price archive");
    Ok(bytes)
}

fn write_table(records: &[PriceRecord]) -> AppResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER).map_err(table_write_error)?;
    for record in records {
        writer
            .write_record([
                record.id.to_string(),
                record.name.clone(),
                record.category.clone(),
                format_price(record.price),
                record.created_at.format("%Y-%m-%d").to_string(),
            ])
            .map_err(table_write_error)?;
    }

    writer
        .into_inner()
        .map_err(|err| AppError::internal(format!("failed to flush table: {err}")))
}

fn format_price(price: f64) -> String {
    format!("{price:.0}")
}

fn table_write_error(err: csv::Error) -> AppError {
    AppError::internal(format!("failed to write table row: {err}"))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use chrono::NaiveDate;
    use zip::ZipArchive;

    use super::{encode, format_price};
    use crate::models::PriceRecord;

    fn record(id: i64, name: &str, category: &str, price: f64) -> PriceRecord {
        PriceRecord {
            id,
            name: name.to_string(),
            category: category.to_string(),
            price,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        }
    }

    fn unpack(bytes: Vec<u8>) -> (Vec<String>, String) {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names = archive.file_names().map(str::to_string).collect();
        let mut table = String::new();
        archive
            .by_name("data.csv")
            .unwrap()
            .read_to_string(&mut table)
            .unwrap();
        (names, table)
    }

    #[test]
    fn writes_single_data_entry_with_header() {
        let (names, table) = unpack(encode(&[]).unwrap());
        assert_eq!(names, vec!["data.csv".to_string()]);
        assert_eq!(table, "id,name,category,price,create_date\n");
    }

    #[test]
    fn rows_follow_record_order_and_round_prices() {
        let records = vec![
            record(2, "pear", "fruit", 10.4),
            record(1, "bolt, steel", "hardware", 99.6),
        ];
        let (_, table) = unpack(encode(&records).unwrap());
        assert_eq!(
            table,
            "id,name,category,price,create_date\n\
             2,pear,fruit,10,2024-01-15\n\
             1,\"bolt, steel\",hardware,100,2024-01-15\n"
        );
    }

    #[test]
    fn price_rendering_drops_fraction() {
        assert_eq!(format_price(0.0), "0");
        assert_eq!(format_price(12.49), "12");
        assert_eq!(format_price(12.51), "13");
        assert_eq!(format_price(-3.7), "-4");
    }
}
