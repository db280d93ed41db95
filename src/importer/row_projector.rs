// ==========================================
// 客户关系管理工具 - 行投影器
// ==========================================
// 阶段 2: RawRow × ColumnMapping → CandidateRecord
// 规则: 单元格强制转为字符串后 TRIM; 未映射或缺失单元格 → 空字符串
// 纯函数, 对任意行永不失败
// ==========================================

use crate::domain::import::{CandidateRecord, ColumnMapping, RawRow};
use crate::domain::types::TargetField;
use crate::importer::column_mapper::ensure_headers_exist;
use crate::importer::error::MappingError;

// ==========================================
// BoundMapping - 已对表头校验过的映射
// ==========================================
// 只能通过 bind 构造, 保证每个列名都是表头成员
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundMapping {
    mapping: ColumnMapping,
}

impl BoundMapping {
    /// 将映射绑定到表头
    ///
    /// # 返回
    /// - Err(MappingError::DanglingHeader): 映射引用了表头中不存在的列
    pub fn bind(mapping: ColumnMapping, headers: &[String]) -> Result<Self, MappingError> {
        ensure_headers_exist(&mapping, headers)?;
        Ok(Self { mapping })
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn into_inner(self) -> ColumnMapping {
        self.mapping
    }
}

/// 从原始行中取出某字段对应的值
fn project_field(row: &RawRow, mapping: &ColumnMapping, field: TargetField) -> String {
    mapping
        .get(field)
        .and_then(|header| row.get(header))
        .map(|cell| cell.to_string().trim().to_string())
        .unwrap_or_default()
}

/// 单行投影
pub fn project_row(row: &RawRow, mapping: &BoundMapping) -> CandidateRecord {
    let mapping = mapping.mapping();
    CandidateRecord {
        name: project_field(row, mapping, TargetField::Name),
        email: project_field(row, mapping, TargetField::Email),
        phone: project_field(row, mapping, TargetField::Phone),
    }
}

/// 批量投影（保持行顺序）
pub fn project_rows(rows: &[RawRow], mapping: &BoundMapping) -> Vec<CandidateRecord> {
    rows.iter().map(|row| project_row(row, mapping)).collect()
}
