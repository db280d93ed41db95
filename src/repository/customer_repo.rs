// ==========================================
// 客户关系管理工具 - 客户 Repository Trait
// ==========================================
// 职责: 定义客户数据访问接口（不包含业务逻辑）
// 红线: Repository 不含校验规则, 只做数据 CRUD
// ==========================================

use crate::domain::customer::{Customer, NewCustomer, Page};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// CustomerRepository Trait
// ==========================================
// 用途: 导入管道的去重与写入协作者 + 读侧查询
// 实现者: CustomerRepositoryImpl（使用 rusqlite）, 测试中的假实现
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// 检查邮箱是否已存在
    ///
    /// # 参数
    /// - email: 已规范化（小写 + TRIM）的邮箱
    ///
    /// # 返回
    /// - Ok(true): 已存在（包括本次导入中先前插入的记录）
    /// - Ok(false): 不存在
    async fn exists_by_email(&self, email: &str) -> RepositoryResult<bool>;

    /// 插入客户
    ///
    /// # 返回
    /// - Ok(Customer): 插入后的完整记录（含 id 与时间戳）
    /// - Err(UniqueConstraintViolation): 邮箱已存在（并发导入竞争）
    /// - Err: 其他存储错误
    async fn insert(&self, customer: NewCustomer) -> RepositoryResult<Customer>;

    /// 按邮箱查询客户
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Customer>>;

    /// 客户总数
    async fn count(&self) -> RepositoryResult<u64>;

    /// 分页查询（按创建时间倒序）
    ///
    /// # 参数
    /// - page: 页码（1 起, 小于 1 视为 1）
    /// - page_size: 每页条数（小于 1 视为 1）
    async fn list(&self, page: u32, page_size: u32) -> RepositoryResult<Page<Customer>>;
}
