// ==========================================
// 客户关系管理工具 - 客户领域模型
// ==========================================
// 职责: 客户实体 / 新建客户 / 分页结果
// 用途: 导入层写入, 仓储层落库
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Customer - 客户主数据
// ==========================================
// 对齐: customer 表 (email 唯一, 已规范化)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String, // 小写 + TRIM 后的邮箱
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// NewCustomer - 待插入客户
// ==========================================
// 来源: 通过校验的导入行 (ValidatedRecord)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

// ==========================================
// Page - 分页结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// 分页计算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total_pages: u32,
    pub offset: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    /// 计算分页参数（page 从 1 开始）
    pub fn calculate(total: u64, page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total_pages = total.div_ceil(u64::from(page_size)) as u32;

        Self {
            total_pages,
            offset: u64::from(page - 1) * u64::from(page_size),
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}
