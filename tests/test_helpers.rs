// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

#![allow(dead_code)]

use ppop_crm::config::AppSettings;
use ppop_crm::db::{init_schema, open_sqlite_connection};
use ppop_crm::ImportApi;
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 基于临时数据库创建 ImportApi（默认设置, 启发式映射）
pub fn create_test_api() -> (NamedTempFile, String, ImportApi) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(&db_path, AppSettings::default()).expect("创建 ImportApi 失败");
    (temp_file, db_path, api)
}

/// 生成 CSV 文本
///
/// # 参数
/// - headers: 表头
/// - rows: 数据行（与表头对齐）
pub fn csv_text(headers: &[&str], rows: &[&[&str]]) -> String {
    let mut out = headers.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// 生成 n 行有效客户数据（email 互不相同）
pub fn generate_customer_rows(n: usize) -> String {
    let mut out = String::from("이름,이메일,전화번호\n");
    for i in 0..n {
        out.push_str(&format!(
            "고객{},customer{}@example.com,010-{:04}-{:04}\n",
            i,
            i,
            i / 10000,
            i % 10000
        ));
    }
    out
}
