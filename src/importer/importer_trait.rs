// ==========================================
// 客户关系管理工具 - 导入管道 Trait
// ==========================================
// 职责: 定义导入管道各阶段的可替换接口（不包含实现）
// 说明: 推理服务与仓储均为外部协作者, 测试中注入假实现
// ==========================================

use crate::domain::import::{DecodedTable, MappingGuess, RawRow};
use crate::importer::error::{ImporterResult, MappingError};
use async_trait::async_trait;

// ==========================================
// TabularDecoder Trait
// ==========================================
// 用途: 字节缓冲 → 表头 + 原始行（阶段 0）
// 实现者: CsvDecoder, SpreadsheetDecoder, UniversalDecoder
pub trait TabularDecoder: Send + Sync {
    /// 解码表格数据
    ///
    /// # 参数
    /// - bytes: 上传文件的完整内容
    /// - file_name: 原始文件名（用于按扩展名选择格式, 可为空）
    ///
    /// # 返回
    /// - Ok(DecodedTable): 表头（首行）+ 数据行（文件顺序）
    /// - Err: DecodeError（不支持的格式、解析失败、缺少表头）
    fn decode(&self, bytes: &[u8], file_name: Option<&str>) -> ImporterResult<DecodedTable>;
}

// ==========================================
// ColumnMapper Trait
// ==========================================
// 用途: 推断 name/email/phone 对应的列（阶段 1）
// 实现者: HeuristicColumnMapper, InferenceColumnMapper
#[async_trait]
pub trait ColumnMapper: Send + Sync {
    /// 推断列映射
    ///
    /// # 参数
    /// - headers: 解码得到的表头列表
    /// - samples: 样本行（至多 5 行）
    ///
    /// # 返回
    /// - Ok(MappingGuess): 映射 + 置信度 + 备注
    /// - Err(MappingError): 推断失败（调用方决定回退或中止）
    ///
    /// # 约束
    /// - 返回的映射中每个列名都必须出现在 headers 中
    async fn infer_mapping(
        &self,
        headers: &[String],
        samples: &[RawRow],
    ) -> Result<MappingGuess, MappingError>;
}

// ==========================================
// InferenceClient Trait
// ==========================================
// 用途: 外部结构化推理服务（LLM）的最小调用接口
// 实现者: GeminiClient（生产）, 测试中的假客户端
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// 发送提示词并返回模型的原始文本输出
    ///
    /// # 返回
    /// - Ok(String): 模型输出（可能包含 JSON 以外的说明文字）
    /// - Err(MappingError::Inference): 网络/鉴权/服务端错误
    async fn generate(&self, prompt: &str) -> Result<String, MappingError>;
}
