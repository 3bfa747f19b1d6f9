use crate::commands::ReportSink;
use crate::error::ReconError;
use crate::services::aggregate::{ReportingPeriod, SupplierGroup};
use crate::types::LineItemRecord;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use std::fs;
use std::path::{Path, PathBuf};

const FONT: &str = "宋体";
const HEADER_FILL: u32 = 0xD9D9D9;
const ZEBRA_FILL: u32 = 0xF2F2F2;
const NEGATIVE_FILL: u32 = 0xFFCCCC;
/// Title row, spacer row, column header row.
const HEADER_ROW: u32 = 2;
const FIRST_DATA_ROW: u32 = 3;
const PAPER_A4: u8 = 9;

const DETAIL_SHEET: &str = "对账明细表";
const SUMMARY_SHEET: &str = "商品汇总表";
const BACKUP_SHEET: &str = "对账明细";
const TOTAL_LABEL: &str = "合计";
const UNDATED_FOLDER: &str = "undated";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// Left aligned, wrapped (product names).
    Text,
    Centered,
    Quantity,
    Money,
    Rate,
}

struct ColumnDef {
    header: &'static str,
    width: f64,
    kind: ColumnKind,
}

const fn col(header: &'static str, width: f64, kind: ColumnKind) -> ColumnDef {
    ColumnDef { header, width, kind }
}

const DETAIL_COLUMNS: &[ColumnDef] = &[
    col("收货单号", 15.0, ColumnKind::Centered),
    col("收货日期", 12.0, ColumnKind::Centered),
    col("商品名称", 30.0, ColumnKind::Text),
    col("实收数量", 10.0, ColumnKind::Quantity),
    col("基本单位", 10.0, ColumnKind::Centered),
    col("单价", 10.0, ColumnKind::Money),
    col("小计金额", 12.0, ColumnKind::Money),
    col("税额", 10.0, ColumnKind::Money),
    col("税率", 8.0, ColumnKind::Rate),
    col("小计价税", 12.0, ColumnKind::Money),
    col("部门", 15.0, ColumnKind::Centered),
];

const SUMMARY_COLUMNS: &[ColumnDef] = &[
    col("商品名称", 40.0, ColumnKind::Text),
    col("实收数量", 15.0, ColumnKind::Quantity),
    col("基本单位", 10.0, ColumnKind::Centered),
    col("平均单价", 15.0, ColumnKind::Money),
    col("小计金额", 15.0, ColumnKind::Money),
    col("税额", 12.0, ColumnKind::Money),
    col("税率", 8.0, ColumnKind::Rate),
    col("小计价税", 15.0, ColumnKind::Money),
];

const BACKUP_HEADERS: &[&str] = &[
    "收货单号", "收货日期", "商品名称", "实收数量", "基本单位", "单价", "小计金额", "税额", "税率", "小计价税", "部门", "供应商名称",
];

/// Cell content before formatting.
enum Value<'a> {
    Text(&'a str),
    Date(Option<NaiveDate>),
    Number(Option<Decimal>),
}

/// Remove characters that can corrupt Excel's sheet XML and cause "unreadable content".
/// Drops control chars (except tab, newline, CR).
fn sanitize_cell(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let u = c as u32;
            c == '\t' || c == '\n' || c == '\r' || !(u < 0x20 || u == 0x7F || u == 0xFFFE || u == 0xFFFF)
        })
        .collect()
}

/// Supplier name usable as a file name on Windows and Unix.
fn safe_file_name(name: &str) -> String {
    let cleaned: String = sanitize_cell(name)
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\n' | '\r' | '\t' => '_',
            _ => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.').to_string();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// `&` starts a control code in page headers.
fn escape_header_text(s: &str) -> String {
    s.replace('&', "&&")
}

fn cell_format(kind: ColumnKind, fill: Option<u32>, bold: bool) -> Format {
    let mut format = Format::new()
        .set_font_name(FONT)
        .set_font_size(10)
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::VerticalCenter);
    format = match kind {
        ColumnKind::Text => format.set_align(FormatAlign::Left).set_text_wrap(),
        ColumnKind::Centered => format.set_align(FormatAlign::Center).set_text_wrap(),
        ColumnKind::Quantity => format.set_align(FormatAlign::Right).set_num_format("#,##0.000"),
        ColumnKind::Money => format.set_align(FormatAlign::Right).set_num_format("#,##0.00"),
        ColumnKind::Rate => format.set_align(FormatAlign::Center).set_num_format("0%"),
    };
    if let Some(rgb) = fill {
        format = format.set_background_color(Color::RGB(rgb));
    }
    if bold {
        format = format.set_bold();
    }
    format
}

fn header_format() -> Format {
    Format::new()
        .set_font_name(FONT)
        .set_font_size(11)
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_border(FormatBorder::Thin)
}

fn write_value(worksheet: &mut Worksheet, row: u32, col: u16, value: &Value<'_>, format: &Format) -> Result<(), XlsxError> {
    match value {
        Value::Text(text) if !text.is_empty() => worksheet
            .write_string_with_format(row, col, sanitize_cell(text), format)
            .map(|_| ()),
        Value::Date(Some(date)) => worksheet
            .write_string_with_format(row, col, date.format("%Y-%m-%d").to_string(), format)
            .map(|_| ()),
        Value::Number(Some(n)) => worksheet
            .write_number_with_format(row, col, n.to_f64().unwrap_or_default(), format)
            .map(|_| ()),
        _ => worksheet.write_blank(row, col, format).map(|_| ()),
    }
}

/// Landscape A4, one page wide, title rows repeated, page x of y in the footer.
fn set_page_layout(
    worksheet: &mut Worksheet,
    company_name: &str,
    period: Option<&ReportingPeriod>,
) -> Result<(), XlsxError> {
    worksheet.set_landscape();
    worksheet.set_paper_size(PAPER_A4);
    worksheet.set_print_fit_to_pages(1, 0);
    worksheet.set_margins(0.5, 0.5, 0.5, 0.5, 0.3, 0.3);
    worksheet.set_footer("&C第 &P 页，共 &N 页");
    let mut header = String::new();
    if !company_name.trim().is_empty() {
        header.push_str(&format!("&L{}", escape_header_text(company_name.trim())));
    }
    if let Some(p) = period {
        header.push_str(&format!("&R{} ~ {}", p.start.format("%Y-%m-%d"), p.end.format("%Y-%m-%d")));
    }
    if !header.is_empty() {
        worksheet.set_header(&header);
    }
    worksheet.set_repeat_rows(0, HEADER_ROW)?;
    Ok(())
}

/// Merged title, spacer row and the column header row.
fn write_sheet_heading(worksheet: &mut Worksheet, title: &str, columns: &[ColumnDef]) -> Result<(), XlsxError> {
    let last_col = (columns.len() - 1) as u16;
    for (i, def) in columns.iter().enumerate() {
        worksheet.set_column_width(i as u16, def.width)?;
    }
    let title_format = Format::new()
        .set_font_name(FONT)
        .set_font_size(16)
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    worksheet.merge_range(0, 0, 0, last_col, &sanitize_cell(title), &title_format)?;
    worksheet.set_row_height(0, 30)?;
    worksheet.merge_range(1, 0, 1, last_col, "", &Format::new())?;
    worksheet.set_row_height(1, 10)?;

    let format = header_format();
    for (i, def) in columns.iter().enumerate() {
        worksheet.write_string_with_format(HEADER_ROW, i as u16, def.header, &format)?;
    }
    worksheet.set_row_height(HEADER_ROW, 20)?;
    Ok(())
}

/// Data row with zebra striping; negative gross amounts are highlighted instead.
fn write_data_row(
    worksheet: &mut Worksheet,
    row: u32,
    index: usize,
    values: &[Value<'_>],
    columns: &[ColumnDef],
    negative: bool,
) -> Result<(), XlsxError> {
    let fill = if negative {
        Some(NEGATIVE_FILL)
    } else if index % 2 == 0 {
        Some(ZEBRA_FILL)
    } else {
        None
    };
    let multi_line = values.iter().any(|v| matches!(v, Value::Text(t) if t.contains('\n')));
    for (i, (value, def)) in values.iter().zip(columns).enumerate() {
        write_value(worksheet, row, i as u16, value, &cell_format(def.kind, fill, false))?;
    }
    worksheet.set_row_height(row, if multi_line { 30 } else { 20 })?;
    Ok(())
}

fn write_total_row(worksheet: &mut Worksheet, row: u32, values: &[Value<'_>], columns: &[ColumnDef]) -> Result<(), XlsxError> {
    for (i, (value, def)) in values.iter().zip(columns).enumerate() {
        let kind = if i == 0 { ColumnKind::Centered } else { def.kind };
        write_value(worksheet, row, i as u16, value, &cell_format(kind, Some(HEADER_FILL), true))?;
    }
    worksheet.set_row_height(row, 20)?;
    Ok(())
}

fn is_negative(amount: Option<Decimal>) -> bool {
    amount.map(|a| a.is_sign_negative() && !a.is_zero()).unwrap_or(false)
}

fn write_detail_sheet(worksheet: &mut Worksheet, group: &SupplierGroup, company_name: &str) -> Result<(), XlsxError> {
    worksheet.set_name(DETAIL_SHEET)?;
    set_page_layout(worksheet, company_name, group.period.as_ref())?;
    write_sheet_heading(worksheet, &format!("{} 对账明细表", group.supplier_name), DETAIL_COLUMNS)?;

    let mut row = FIRST_DATA_ROW;
    for (index, record) in group.records.iter().enumerate() {
        let values = [
            Value::Text(&record.receipt_number),
            Value::Date(record.receipt_date),
            Value::Text(&record.product_name),
            Value::Number(record.quantity),
            Value::Text(record.unit.as_deref().unwrap_or("")),
            Value::Number(record.unit_price),
            Value::Number(record.subtotal),
            Value::Number(record.tax_amount),
            Value::Number(record.tax_rate),
            Value::Number(record.gross_amount),
            Value::Text(record.department.as_deref().unwrap_or("")),
        ];
        write_data_row(worksheet, row, index, &values, DETAIL_COLUMNS, is_negative(record.gross_amount))?;
        row += 1;
    }

    let totals = &group.totals;
    let total_values = [
        Value::Text(TOTAL_LABEL),
        Value::Text(""),
        Value::Text(""),
        Value::Number(None),
        Value::Text(""),
        Value::Number(None),
        Value::Number(Some(totals.subtotal)),
        Value::Number(Some(totals.tax_amount)),
        Value::Number(None),
        Value::Number(Some(totals.gross_amount)),
        Value::Text(""),
    ];
    write_total_row(worksheet, row, &total_values, DETAIL_COLUMNS)
}

fn write_summary_sheet(worksheet: &mut Worksheet, group: &SupplierGroup, company_name: &str) -> Result<(), XlsxError> {
    worksheet.set_name(SUMMARY_SHEET)?;
    set_page_layout(worksheet, company_name, group.period.as_ref())?;
    write_sheet_heading(worksheet, &format!("{} 商品汇总表", group.supplier_name), SUMMARY_COLUMNS)?;

    let mut row = FIRST_DATA_ROW;
    for (index, product) in group.products.iter().enumerate() {
        let values = [
            Value::Text(&product.product_name),
            Value::Number(Some(product.quantity)),
            Value::Text(product.unit.as_deref().unwrap_or("")),
            Value::Number(product.unit_price),
            Value::Number(Some(product.subtotal)),
            Value::Number(Some(product.tax_amount)),
            Value::Number(product.tax_rate),
            Value::Number(Some(product.gross_amount)),
        ];
        write_data_row(worksheet, row, index, &values, SUMMARY_COLUMNS, is_negative(Some(product.gross_amount)))?;
        row += 1;
    }

    let totals = &group.product_totals;
    let total_values = [
        Value::Text(TOTAL_LABEL),
        Value::Number(Some(totals.quantity)),
        Value::Text(""),
        Value::Number(None),
        Value::Number(Some(totals.subtotal)),
        Value::Number(Some(totals.tax_amount)),
        Value::Number(None),
        Value::Number(Some(totals.gross_amount)),
    ];
    write_total_row(worksheet, row, &total_values, SUMMARY_COLUMNS)
}

/// `<output_dir>/<YYYYMM>/<supplier>_对账明细表_<YYYYMM>.xlsx`
pub fn report_path(output_dir: &Path, group: &SupplierGroup) -> PathBuf {
    let label = group
        .period
        .map(|p| p.label())
        .unwrap_or_else(|| UNDATED_FOLDER.to_string());
    output_dir
        .join(&label)
        .join(format!("{}_对账明细表_{}.xlsx", safe_file_name(&group.supplier_name), label))
}

/// Write one supplier statement workbook (detail sheet + product summary sheet).
pub fn write_supplier_report(output_dir: &Path, company_name: &str, group: &SupplierGroup) -> Result<PathBuf, ReconError> {
    let path = report_path(output_dir, group);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut workbook = Workbook::new();
    let detail = workbook.add_worksheet();
    write_detail_sheet(detail, group, company_name)?;
    let summary = workbook.add_worksheet();
    write_summary_sheet(summary, group, company_name)?;
    workbook.save(&path)?;
    Ok(path)
}

/// Dump the merged record table, before any grouping, to `<backup_dir>/对账明细备份_<stamp>.xlsx`.
pub fn write_backup(backup_dir: &Path, records: &[LineItemRecord], stamp: &str) -> Result<PathBuf, ReconError> {
    fs::create_dir_all(backup_dir)?;
    let path = backup_dir.join(format!("对账明细备份_{}.xlsx", stamp));

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(BACKUP_SHEET)?;
    let bold = Format::new().set_bold();
    let plain = Format::new();
    for (col, header) in BACKUP_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        let values = [
            Value::Text(&record.receipt_number),
            Value::Date(record.receipt_date),
            Value::Text(&record.product_name),
            Value::Number(record.quantity),
            Value::Text(record.unit.as_deref().unwrap_or("")),
            Value::Number(record.unit_price),
            Value::Number(record.subtotal),
            Value::Number(record.tax_amount),
            Value::Number(record.tax_rate),
            Value::Number(record.gross_amount),
            Value::Text(record.department.as_deref().unwrap_or("")),
            Value::Text(&record.supplier_name),
        ];
        for (col, value) in values.iter().enumerate() {
            write_value(worksheet, row, col as u16, value, &plain)?;
        }
    }
    worksheet.set_freeze_panes(1, 0)?;
    workbook.save(&path)?;
    Ok(path)
}

/// Writes statements and backups as formatted xlsx files.
#[derive(Debug, Clone)]
pub struct XlsxReportWriter {
    pub output_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub company_name: String,
}

impl ReportSink for XlsxReportWriter {
    fn write_supplier(&mut self, group: &SupplierGroup) -> Result<PathBuf, ReconError> {
        write_supplier_report(&self.output_dir, &self.company_name, group)
    }

    fn write_backup(&mut self, records: &[LineItemRecord]) -> Result<PathBuf, ReconError> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        write_backup(&self.backup_dir, records, &stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregate::group_by_supplier;
    use calamine::{open_workbook_auto, Data, Reader};

    fn record(supplier: &str, receipt: &str, on: Option<NaiveDate>, product: &str, gross: &str) -> LineItemRecord {
        LineItemRecord {
            receipt_number: receipt.to_string(),
            receipt_date: on,
            product_name: product.to_string(),
            quantity: Some(Decimal::ONE),
            unit: Some("KG".to_string()),
            unit_price: gross.parse().ok(),
            subtotal: gross.parse().ok(),
            tax_amount: Some(Decimal::ZERO),
            tax_rate: Some(Decimal::ZERO),
            gross_amount: gross.parse().ok(),
            department: None,
            supplier_name: supplier.to_string(),
        }
    }

    #[test]
    fn file_names_are_filesystem_safe() {
        assert_eq!(safe_file_name("上海/食品:公司"), "上海_食品_公司");
        assert_eq!(safe_file_name(" 甲 "), "甲");
        assert_eq!(safe_file_name("???"), "___");
        assert_eq!(safe_file_name(""), "_");
    }

    #[test]
    fn sanitize_drops_control_characters_only() {
        assert_eq!(sanitize_cell("a\u{1}b\nc & <d>"), "ab\nc & <d>");
    }

    #[test]
    fn report_path_uses_period_folder() {
        let groups = group_by_supplier(&[record("甲", "0001", NaiveDate::from_ymd_opt(2024, 2, 15), "A", "1")]).unwrap();
        let path = report_path(Path::new("out"), &groups[0]);
        assert_eq!(path, Path::new("out/202402/甲_对账明细表_202402.xlsx"));

        let undated = group_by_supplier(&[record("乙", "0001", None, "A", "1")]).unwrap();
        let path = report_path(Path::new("out"), &undated[0]);
        assert_eq!(path, Path::new("out/undated/乙_对账明细表_undated.xlsx"));
    }

    #[test]
    fn supplier_report_has_detail_and_summary_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let on = NaiveDate::from_ymd_opt(2024, 5, 6);
        let groups = group_by_supplier(&[
            record("甲", "0001", on, "Rice\n大米", "200.00"),
            record("甲", "0002", on, "Oil", "-50.00"),
        ])
        .unwrap();
        let path = write_supplier_report(dir.path(), "Test & Co", &groups[0]).unwrap();
        assert!(path.exists());

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names().to_vec(), vec![DETAIL_SHEET.to_string(), SUMMARY_SHEET.to_string()]);
        let detail = workbook.worksheet_range(DETAIL_SHEET).unwrap();
        assert_eq!(detail.get_value((0, 0)), Some(&Data::String("甲 对账明细表".to_string())));
        assert_eq!(detail.get_value((2, 0)), Some(&Data::String("收货单号".to_string())));
        assert_eq!(detail.get_value((3, 0)), Some(&Data::String("0001".to_string())));
        assert_eq!(detail.get_value((3, 1)), Some(&Data::String("2024-05-06".to_string())));
        assert_eq!(detail.get_value((5, 0)), Some(&Data::String(TOTAL_LABEL.to_string())));
        assert_eq!(detail.get_value((5, 9)), Some(&Data::Float(150.0)));

        let summary = workbook.worksheet_range(SUMMARY_SHEET).unwrap();
        assert_eq!(summary.get_value((5, 0)), Some(&Data::String(TOTAL_LABEL.to_string())));
        assert_eq!(summary.get_value((5, 1)), Some(&Data::Float(2.0)));
    }

    #[test]
    fn backup_contains_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record("", "0001", None, "A", "1"),
            record("甲", "0002", NaiveDate::from_ymd_opt(2024, 1, 1), "B", "2"),
        ];
        let path = write_backup(&dir.path().join("backup"), &records, "20240101_000000").unwrap();
        assert!(path.ends_with("对账明细备份_20240101_000000.xlsx"));

        let mut workbook = open_workbook_auto(&path).unwrap();
        let range = workbook.worksheet_range(BACKUP_SHEET).unwrap();
        assert_eq!(range.height(), 3);
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("0001".to_string())));
        assert_eq!(range.get_value((2, 11)), Some(&Data::String("甲".to_string())));
    }
}
