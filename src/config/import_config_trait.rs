// ==========================================
// 客户关系管理工具 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含导入逻辑
// ==========================================

use crate::config::settings::{ImportSettings, REQUIRED_COLUMNS};
use crate::importer::column_mapper::MappingStrategy;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ImportSettings（settings.json + 环境变量）
pub trait ImportConfigReader: Send + Sync {
    /// 获取单个文件大小上限（字节）
    ///
    /// # 默认值
    /// - 10 MB
    fn max_file_size_bytes(&self) -> usize;

    /// 获取允许的文件扩展名
    ///
    /// # 返回
    /// - Vec<String>: 带点的小写扩展名（如 ".csv"）
    ///
    /// # 默认值
    /// - [".csv", ".xlsx", ".xls"]
    fn supported_extensions(&self) -> Vec<String>;

    /// 获取导入模板的必需列
    ///
    /// # 默认值
    /// - ["name", "email", "phone"]
    fn required_columns(&self) -> Vec<String> {
        REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    /// 获取列映射策略
    ///
    /// # 默认值
    /// - Heuristic
    fn mapping_strategy(&self) -> MappingStrategy;

    /// 推理失败时是否直接报告（不回退启发式）
    ///
    /// # 默认值
    /// - false
    fn strict_mapping(&self) -> bool;

    /// 映射三字段全部缺失时是否中止导入
    ///
    /// # 默认值
    /// - false（继续导入, 每行报告 "Name is required"）
    fn require_mapping(&self) -> bool;

    /// 获取用于列映射推断的样本行数
    ///
    /// # 默认值
    /// - 5
    fn sample_size(&self) -> usize;
}

impl ImportConfigReader for ImportSettings {
    fn max_file_size_bytes(&self) -> usize {
        (self.max_file_size_mb as usize).saturating_mul(1024 * 1024)
    }

    fn supported_extensions(&self) -> Vec<String> {
        self.supported_extensions
            .iter()
            .map(|ext| {
                let ext = ext.trim().to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect()
    }

    fn mapping_strategy(&self) -> MappingStrategy {
        self.mapping_strategy
    }

    fn strict_mapping(&self) -> bool {
        self.strict_mapping
    }

    fn require_mapping(&self) -> bool {
        self.require_mapping
    }

    fn sample_size(&self) -> usize {
        self.sample_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_settings_reader() {
        let mut settings = ImportSettings::default();
        settings.supported_extensions = vec!["CSV".to_string(), ".xlsx".to_string()];
        settings.sample_size = 0;

        assert_eq!(settings.max_file_size_bytes(), 10 * 1024 * 1024);
        assert_eq!(settings.supported_extensions(), vec![".csv", ".xlsx"]);
        assert_eq!(settings.required_columns(), vec!["name", "email", "phone"]);
        assert_eq!(settings.sample_size(), 1);
        assert_eq!(settings.mapping_strategy(), MappingStrategy::Heuristic);
    }
}
