// ==========================================
// 客户关系管理工具 - 导入领域模型
// ==========================================
// 职责: 导入管道各阶段的数据结构
// 流程: RawRow → ColumnMapping → CandidateRecord → ValidatedRecord → ImportResult
// 生命周期: 全部为请求级对象, 不作为进程状态保留
// ==========================================

use crate::domain::customer::NewCustomer;
use crate::domain::types::{Confidence, ImportErrorKind, MappingSource, TargetField};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// CellValue - 单元格原始值
// ==========================================
// 序列化: 字符串/数字/布尔原样输出, 空值为 null
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Bool(b) => write!(f, "{}", b),
            // 整数值的浮点数按整数输出（表格中的电话号码常被存为数字）
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

/// 原始行: 表头 → 单元格值
pub type RawRow = HashMap<String, CellValue>;

// ==========================================
// DecodedTable - 解码结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct DecodedTable {
    /// 表头（首行, 保持列顺序, 已去重）
    pub headers: Vec<String>,
    /// 数据行（保持文件顺序, 已跳过全空行）
    pub rows: Vec<RawRow>,
}

impl DecodedTable {
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }
}

// ==========================================
// ColumnMapping - 列映射
// ==========================================
// 约束: 每个值必须是解码表头中的成员（绑定时校验）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ColumnMapping {
    pub fn get(&self, field: TargetField) -> Option<&str> {
        match field {
            TargetField::Name => self.name.as_deref(),
            TargetField::Email => self.email.as_deref(),
            TargetField::Phone => self.phone.as_deref(),
        }
    }

    pub fn set(&mut self, field: TargetField, header: Option<String>) {
        match field {
            TargetField::Name => self.name = header,
            TargetField::Email => self.email = header,
            TargetField::Phone => self.phone = header,
        }
    }

    /// 三个字段均未映射
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }

    /// 未映射的字段列表
    pub fn missing_fields(&self) -> Vec<TargetField> {
        TargetField::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }
}

// ==========================================
// MappingGuess - 列映射推断结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingGuess {
    pub mapping: ColumnMapping,
    pub confidence: Confidence,
    pub notes: String,
    pub source: MappingSource,
}

// ==========================================
// CandidateRecord - 投影后的候选记录
// ==========================================
// 说明: 缺失映射或缺失单元格 → 空字符串（由校验器报告）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
}

// ==========================================
// ValidatedRecord - 通过校验的记录
// ==========================================
// 说明: email 已小写 + TRIM, name/phone 已 TRIM; 只有此类型可落库
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl From<ValidatedRecord> for NewCustomer {
    fn from(record: ValidatedRecord) -> Self {
        NewCustomer {
            name: record.name,
            email: record.email,
            phone: record.phone,
        }
    }
}

/// 重复邮箱的行错误消息
pub const MSG_EMAIL_EXISTS: &str = "Email already exists";

// ==========================================
// ImportError - 行级错误
// ==========================================
// 行号: 1 起算且包含表头行（第 1 条数据行 = 第 2 行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportError {
    pub row: usize,
    pub field: String,
    pub message: String,
    pub kind: ImportErrorKind,
}

impl ImportError {
    pub fn validation(row: usize, field: TargetField, message: &str) -> Self {
        Self {
            row,
            field: field.as_str().to_string(),
            message: message.to_string(),
            kind: ImportErrorKind::Validation,
        }
    }

    pub fn duplicate_email(row: usize) -> Self {
        Self {
            row,
            field: TargetField::Email.as_str().to_string(),
            message: MSG_EMAIL_EXISTS.to_string(),
            kind: ImportErrorKind::Duplicate,
        }
    }

    pub fn persistence(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            field: "unknown".to_string(),
            message: message.into(),
            kind: ImportErrorKind::Persistence,
        }
    }
}

/// 数据行下标（0 起）→ 报告行号
pub fn row_number_for_index(index: usize) -> usize {
    index + 2
}

// ==========================================
// ImportResult - 导入结果
// ==========================================
// 不变式: total == success + failed; failed == errors.len()
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<ImportError>,
}

impl ImportResult {
    pub fn empty() -> Self {
        ImportResultBuilder::new(0).finish()
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.success + self.failed && self.failed == self.errors.len()
    }
}

/// 导入结果累加器（逐行记录成功或失败）
#[derive(Debug)]
pub struct ImportResultBuilder {
    total: usize,
    success: usize,
    errors: Vec<ImportError>,
}

impl ImportResultBuilder {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            success: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.success += 1;
    }

    pub fn record_error(&mut self, error: ImportError) {
        self.errors.push(error);
    }

    pub fn processed(&self) -> usize {
        self.success + self.errors.len()
    }

    pub fn finish(self) -> ImportResult {
        debug_assert_eq!(self.processed(), self.total, "每一行必须恰好记录一次");
        ImportResult {
            total: self.total,
            success: self.success,
            failed: self.errors.len(),
            errors: self.errors,
        }
    }
}

// ==========================================
// PreviewResult - 预览结果（不落库）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub success: bool,
    pub columns: Vec<String>,
    pub sample_rows: Vec<RawRow>,
    pub total_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<ColumnMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Vec<CandidateRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PreviewResult {
    /// 失败预览（供 API 层包装调用级错误）
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            columns: Vec::new(),
            sample_rows: Vec::new(),
            total_rows: 0,
            mapping: None,
            preview: None,
            confidence: None,
            notes: None,
            error: Some(error.into()),
        }
    }
}

// ==========================================
// ImportBatch - 导入批次记录（历史）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub batch_id: String,
    pub file_name: Option<String>,
    pub total_rows: usize,
    pub success_rows: usize,
    pub failed_rows: usize,
    pub mapping_source: MappingSource,
    pub imported_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

// ==========================================
// ImportTemplate - 导入模板说明
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTemplate {
    pub required_columns: Vec<String>,
    pub supported_formats: Vec<String>,
    #[serde(rename = "maxFileSizeMB")]
    pub max_file_size_mb: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_display_integral_number() {
        assert_eq!(CellValue::Number(1012345678.0).to_string(), "1012345678");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Bool(true).to_string(), "true");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn test_cell_value_serde_untagged() {
        let json = serde_json::to_string(&vec![
            CellValue::Text("Kim".to_string()),
            CellValue::Number(3.0),
            CellValue::Empty,
        ])
        .unwrap();
        assert_eq!(json, r#"["Kim",3.0,null]"#);
    }

    #[test]
    fn test_mapping_missing_fields() {
        let mapping = ColumnMapping {
            name: Some("이름".to_string()),
            email: None,
            phone: None,
        };
        assert_eq!(
            mapping.missing_fields(),
            vec![TargetField::Email, TargetField::Phone]
        );
        assert!(!mapping.is_empty());
        assert!(ColumnMapping::default().is_empty());
    }

    #[test]
    fn test_builder_keeps_invariant() {
        let mut builder = ImportResultBuilder::new(3);
        builder.record_success();
        builder.record_error(ImportError::validation(3, TargetField::Name, "Name is required"));
        builder.record_error(ImportError::duplicate_email(4));
        let result = builder.finish();

        assert_eq!(result.total, 3);
        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 2);
        assert!(result.is_consistent());
    }

    #[test]
    fn test_empty_result() {
        let result = ImportResult::empty();
        assert_eq!(result.total, 0);
        assert!(result.errors.is_empty());
        assert!(result.is_consistent());
    }

    #[test]
    fn test_template_wire_names() {
        let template = ImportTemplate {
            required_columns: vec!["name".to_string()],
            supported_formats: vec![".csv".to_string()],
            max_file_size_mb: 10,
        };
        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(value["maxFileSizeMB"], 10);
        assert_eq!(value["requiredColumns"][0], "name");
    }

    #[test]
    fn test_preview_serializes_camel_case() {
        let value = serde_json::to_value(PreviewResult::failed("boom")).unwrap();
        assert_eq!(value["success"], false);
        assert!(value.get("sampleRows").is_some());
        assert!(value.get("totalRows").is_some());
        assert!(value.get("mapping").is_none());
    }
}
