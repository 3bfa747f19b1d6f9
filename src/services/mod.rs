pub mod aggregate;
pub mod receipt_blocks;
pub mod record_normalizer;
pub mod workbook_reader;
