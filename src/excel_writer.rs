use anyhow::Result;
use csv::StringRecord;
use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet, XlsxError};
use std::path::Path;
use tracing::{info, warn};

use crate::csv_writer::CsvStore;
use crate::models::{ProductRecord, CSV_FIELDS};

/// Excel refuses cell text longer than this.
pub const MAX_CELL_CHARS: usize = 32_000;

const REPLACED_CHARS: [char; 9] = [
    '\r', '\n', '\t', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{00b4}', '\u{00b0}',
];

pub fn clean_text_for_excel(text: &str) -> String {
    let replaced: String = text
        .trim()
        .chars()
        .map(|c| if REPLACED_CHARS.contains(&c) { ' ' } else { c })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_CELL_CHARS).collect()
}

/// One row of the product table as it goes into the workbook.
pub enum ExportRow {
    Product(ProductRecord),
    /// A row that does not fit `ProductRecord`; its cells are written as text.
    Raw(StringRecord),
}

const DESCRIPTION_COL: u16 = 6;

struct RowFormats {
    cell: Format,
    price: Format,
}

pub struct ExcelExporter {
    workbook: Workbook,
}

impl ExcelExporter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            workbook: Workbook::new(),
        })
    }

    /// Writes a header row plus one row per entry and returns the number
    /// of data rows.
    pub fn write_rows(&mut self, rows: &[ExportRow]) -> Result<usize> {
        let worksheet = self.workbook.add_worksheet();

        let header_format = Format::new().set_bold().set_border(FormatBorder::Thin);
        for (col, header) in CSV_FIELDS.iter().enumerate() {
            worksheet.write_with_format(0, col as u16, *header, &header_format)?;
        }

        worksheet.set_column_width(1, 40)?; // title
        worksheet.set_column_width(DESCRIPTION_COL, 80)?;
        worksheet.set_column_width(9, 60)?; // additional_images
        worksheet.set_freeze_panes(1, 0)?;

        let formats = RowFormats {
            cell: Format::new().set_border(FormatBorder::Thin),
            price: Format::new()
                .set_border(FormatBorder::Thin)
                .set_num_format("#,##0.00"),
        };

        for (row_idx, entry) in rows.iter().enumerate() {
            let row = (row_idx + 1) as u32;
            match entry {
                ExportRow::Product(product) => write_product(worksheet, row, product, &formats)?,
                ExportRow::Raw(record) => write_raw(worksheet, row, record, &formats)?,
            }
        }

        Ok(rows.len())
    }

    pub fn save<P: AsRef<Path>>(mut self, filename: P) -> Result<()> {
        self.workbook.save(filename.as_ref())?;
        Ok(())
    }
}

fn write_product(
    worksheet: &mut Worksheet,
    row: u32,
    product: &ProductRecord,
    formats: &RowFormats,
) -> Result<(), XlsxError> {
    worksheet.write_with_format(row, 0, product.no, &formats.cell)?;
    worksheet.write_with_format(row, 1, &product.title, &formats.cell)?;
    worksheet.write_with_format(row, 2, &product.sku, &formats.cell)?;
    worksheet.write_with_format(row, 3, &product.category, &formats.cell)?;
    for (col, price) in [(4, product.original_price), (5, product.discount_price)] {
        match price {
            Some(value) => worksheet.write_with_format(row, col, value, &formats.price)?,
            None => worksheet.write_blank(row, col, &formats.price)?,
        };
    }
    worksheet.write_with_format(
        row,
        DESCRIPTION_COL,
        &clean_text_for_excel(&product.description),
        &formats.cell,
    )?;
    worksheet.write_with_format(row, 7, &product.image_url, &formats.cell)?;
    worksheet.write_with_format(row, 8, &product.url, &formats.cell)?;
    worksheet.write_with_format(row, 9, &product.additional_images, &formats.cell)?;
    Ok(())
}

fn write_raw(
    worksheet: &mut Worksheet,
    row: u32,
    record: &StringRecord,
    formats: &RowFormats,
) -> Result<(), XlsxError> {
    for (col, field) in record.iter().enumerate() {
        let col = col as u16;
        if col == DESCRIPTION_COL {
            worksheet.write_with_format(row, col, &clean_text_for_excel(field), &formats.cell)?;
        } else {
            worksheet.write_with_format(row, col, field, &formats.cell)?;
        }
    }
    Ok(())
}

/// Types each table row, keeping rows that fail to parse as raw text.
pub fn to_export_rows(headers: &StringRecord, records: Vec<StringRecord>) -> Vec<ExportRow> {
    records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| match record.deserialize::<ProductRecord>(Some(headers)) {
            Ok(product) => ExportRow::Product(product),
            Err(e) => {
                // +2: header line and 1-based numbering
                warn!("Table row {} exported as text: {}", idx + 2, e);
                ExportRow::Raw(record)
            }
        })
        .collect()
}

/// Regenerates the spreadsheet from the full product table. Returns the
/// number of rows exported, or `None` when there is no table yet.
pub fn convert_to_excel<P: AsRef<Path>>(store: &CsvStore, xlsx_path: P) -> Result<Option<usize>> {
    if !store.exists() {
        info!("No product table at {}, skipping Excel export", store.path().display());
        return Ok(None);
    }

    let (headers, records) = store.read_records()?;
    let rows = to_export_rows(&headers, records);
    let mut excel_writer = ExcelExporter::new()?;
    let written = excel_writer.write_rows(&rows)?;
    excel_writer.save(xlsx_path.as_ref())?;

    info!("Converted CSV to Excel: {}", xlsx_path.as_ref().display());
    Ok(Some(written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_clean_text_for_excel() {
        assert_eq!(
            clean_text_for_excel("Line1\r\nLine2\t \u{201c}quoted\u{201d}"),
            "Line1 Line2 quoted"
        );
        assert_eq!(clean_text_for_excel("  Scale 1:10 \u{2018}Pro\u{2019}  "), "Scale 1:10 Pro");
        assert_eq!(clean_text_for_excel("Max 45\u{00b0} angle"), "Max 45 angle");
        assert_eq!(clean_text_for_excel(""), "");
    }

    #[test]
    fn test_clean_text_truncates_long_descriptions() {
        let long = "ä".repeat(MAX_CELL_CHARS + 50);
        let cleaned = clean_text_for_excel(&long);
        assert_eq!(cleaned.chars().count(), MAX_CELL_CHARS);
    }

    #[test]
    fn test_export_matches_table_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("products.csv"));
        let xlsx = dir.path().join("products.xlsx");

        store.write_header().unwrap();
        assert_eq!(convert_to_excel(&store, &xlsx).unwrap(), Some(0));
        assert!(xlsx.exists());

        let products: Vec<ProductRecord> = (1..=3)
            .map(|no| ProductRecord {
                no,
                sku: format!("SKU{no}"),
                description: "a\t\u{201c}b\u{201d}".to_string(),
                discount_price: Some(5.0),
                ..ProductRecord::default()
            })
            .collect();
        store.write_products(&products).unwrap();

        let table_lines = fs::read_to_string(store.path()).unwrap().lines().count();
        let exported = convert_to_excel(&store, &xlsx).unwrap().unwrap();
        assert_eq!(exported + 1, table_lines);

        // The source table keeps the raw description.
        assert_eq!(store.read_products().unwrap()[0].description, "a\t\u{201c}b\u{201d}");
    }

    #[test]
    fn test_missing_table_skips_export() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("absent.csv"));
        let xlsx = dir.path().join("products.xlsx");

        assert_eq!(convert_to_excel(&store, &xlsx).unwrap(), None);
        assert!(!xlsx.exists());
    }

    #[test]
    fn test_malformed_rows_are_exported_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("products.csv"));
        let xlsx = dir.path().join("products.xlsx");

        store
            .write_products(&[ProductRecord {
                no: 1,
                sku: "GOOD".to_string(),
                ..ProductRecord::default()
            }])
            .unwrap();
        let mut table = fs::read_to_string(store.path()).unwrap();
        table.push_str("x,Legacy,OLD,,n/a,,\"desc\ttab\",,,\n");
        fs::write(store.path(), &table).unwrap();

        let (headers, records) = store.read_records().unwrap();
        let rows = to_export_rows(&headers, records);
        assert_eq!(rows.len(), 2);
        assert!(matches!(&rows[0], ExportRow::Product(p) if p.sku == "GOOD"));
        assert!(matches!(&rows[1], ExportRow::Raw(r) if r.get(2) == Some("OLD")));

        assert_eq!(convert_to_excel(&store, &xlsx).unwrap(), Some(2));
        assert!(xlsx.exists());
    }
}
