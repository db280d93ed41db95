// ==========================================
// 客户关系管理工具 - 表格解码器实现
// ==========================================
// 阶段 0: 字节缓冲 → 表头 + 原始行
// 支持: CSV (.csv) / 电子表格 (.xlsx/.xls/.xlsm/.xlsb/.ods, 仅第一个工作表)
// ==========================================

use crate::domain::import::{CellValue, DecodedTable, RawRow};
use crate::importer::error::{DecodeError, ImporterResult};
use crate::importer::importer_trait::TabularDecoder;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::io::Cursor;
use tracing::debug;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// 空表头列的占位名
const EMPTY_HEADER: &str = "__EMPTY";

// ==========================================
// 表头规范化
// ==========================================
// 规则: TRIM; 空表头 → __EMPTY; 重复表头追加 _1, _2 ...（首次出现保留原名）
pub fn normalize_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut headers = Vec::new();

    for cell in raw {
        let trimmed = cell.as_ref().trim();
        let base = if trimmed.is_empty() { EMPTY_HEADER } else { trimmed };

        let mut candidate = base.to_string();
        let mut suffix = 0;
        while seen.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}_{}", base, suffix);
        }

        seen.insert(candidate.clone());
        headers.push(candidate);
    }

    headers
}

/// 将一行单元格按表头组装为 RawRow; 全空行返回 None
fn build_row<I>(headers: &[String], cells: I) -> Option<RawRow>
where
    I: IntoIterator<Item = CellValue>,
{
    let mut row = RawRow::with_capacity(headers.len());
    for (header, cell) in headers.iter().zip(cells) {
        row.insert(header.clone(), cell);
    }

    if row.values().all(CellValue::is_empty) {
        None
    } else {
        Some(row)
    }
}

// ==========================================
// CSV Decoder 实现
// ==========================================
pub struct CsvDecoder;

impl TabularDecoder for CsvDecoder {
    fn decode(&self, bytes: &[u8], _file_name: Option<&str>) -> ImporterResult<DecodedTable> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        std::str::from_utf8(bytes).map_err(|e| DecodeError::InvalidEncoding(e.to_string()))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        let mut records = reader.records();

        // 读取表头（首行）
        let header_record = match records.next() {
            Some(record) => record.map_err(DecodeError::from)?,
            None => return Err(DecodeError::MissingHeaderRow.into()),
        };
        let headers = normalize_headers(header_record.iter());

        // 读取所有数据行
        let mut rows = Vec::new();
        for result in records {
            let record = result.map_err(DecodeError::from)?;
            if let Some(row) = build_row(&headers, record.iter().map(CellValue::from)) {
                rows.push(row);
            }
        }

        debug!(columns = headers.len(), rows = rows.len(), "CSV 解码完成");
        Ok(DecodedTable { headers, rows })
    }
}

// ==========================================
// Spreadsheet Decoder 实现
// ==========================================
pub struct SpreadsheetDecoder;

impl SpreadsheetDecoder {
    fn cell_value(cell: &Data) -> CellValue {
        match cell {
            Data::Empty | Data::Error(_) => CellValue::Empty,
            Data::String(s) => CellValue::from(s.as_str()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            other => CellValue::from(other.to_string().as_str()),
        }
    }
}

impl TabularDecoder for SpreadsheetDecoder {
    fn decode(&self, bytes: &[u8], _file_name: Option<&str>) -> ImporterResult<DecodedTable> {
        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(DecodeError::from)?;

        // 仅读取第一个工作表（按位置）
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(DecodeError::NoWorksheet)?
            .map_err(DecodeError::from)?;

        let mut rows_iter = range.rows();
        let header_row = rows_iter.next().ok_or(DecodeError::MissingHeaderRow)?;
        let headers = normalize_headers(header_row.iter().map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string(),
        }));

        let mut rows = Vec::new();
        for data_row in rows_iter {
            if let Some(row) = build_row(&headers, data_row.iter().map(Self::cell_value)) {
                rows.push(row);
            }
        }

        debug!(columns = headers.len(), rows = rows.len(), "电子表格解码完成");
        Ok(DecodedTable { headers, rows })
    }
}

// ==========================================
// 通用解码器（按扩展名选择, 无扩展名时按内容嗅探）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    Csv,
    Spreadsheet,
}

pub struct UniversalDecoder {
    max_bytes: usize,
    supported_extensions: Vec<String>,
}

impl UniversalDecoder {
    /// # 参数
    /// - max_bytes: 允许的最大文件大小
    /// - supported_extensions: 允许的扩展名（如 ".csv"）, 比较时忽略大小写
    pub fn new(max_bytes: usize, supported_extensions: Vec<String>) -> Self {
        let supported_extensions = supported_extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        Self {
            max_bytes,
            supported_extensions,
        }
    }

    /// 构造格式错误（附带当前允许的扩展名列表）
    fn unsupported(&self, ext: &str) -> DecodeError {
        let supported = self
            .supported_extensions
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join(", ");
        DecodeError::UnsupportedFormat {
            extension: format!(".{}", ext),
            supported,
        }
    }

    /// 判定文件格式
    pub fn detect_format(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> Result<DetectedFormat, DecodeError> {
        let ext = file_name
            .and_then(|name| std::path::Path::new(name).extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext {
            Some(ext) => {
                if !self.supported_extensions.contains(&ext) {
                    return Err(self.unsupported(&ext));
                }
                match ext.as_str() {
                    "csv" => Ok(DetectedFormat::Csv),
                    "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Ok(DetectedFormat::Spreadsheet),
                    other => Err(self.unsupported(other)),
                }
            }
            None if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) => {
                Ok(DetectedFormat::Spreadsheet)
            }
            None => Ok(DetectedFormat::Csv),
        }
    }
}

impl TabularDecoder for UniversalDecoder {
    fn decode(&self, bytes: &[u8], file_name: Option<&str>) -> ImporterResult<DecodedTable> {
        if bytes.len() > self.max_bytes {
            return Err(DecodeError::FileTooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            }
            .into());
        }

        match self.detect_format(bytes, file_name)? {
            DetectedFormat::Csv => CsvDecoder.decode(bytes, file_name),
            DetectedFormat::Spreadsheet => SpreadsheetDecoder.decode(bytes, file_name),
        }
    }
}
