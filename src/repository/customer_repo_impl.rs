// ==========================================
// 客户关系管理工具 - 客户 Repository 实现
// ==========================================
// 职责: 实现客户数据访问（使用 rusqlite）
// 约束: email 列 UNIQUE, 作为去重检查之外的最终防线
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::customer::{Customer, NewCustomer, Page, Pagination};
use crate::repository::customer_repo::CustomerRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, name, email, phone, created_at, updated_at";

// ==========================================
// CustomerRepositoryImpl
// ==========================================
pub struct CustomerRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CustomerRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
        Ok(Customer {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

#[async_trait]
impl CustomerRepository for CustomerRepositoryImpl {
    async fn exists_by_email(&self, email: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM customer WHERE email = ?1 LIMIT 1",
                params![email],
                |_row| Ok(true),
            )
            .optional()?;
        Ok(found.unwrap_or(false))
    }

    async fn insert(&self, customer: NewCustomer) -> RepositoryResult<Customer> {
        let now = Utc::now();
        let record = Customer {
            id: Uuid::new_v4().to_string(),
            name: customer.name,
            email: customer.email,
            phone: customer.phone,
            created_at: now,
            updated_at: now,
        };

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO customer (id, name, email, phone, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.name,
                record.email,
                record.phone,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Customer>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM customer WHERE email = ?1", SELECT_COLUMNS);
        let customer = conn
            .query_row(&sql, params![email], Self::map_row)
            .optional()?;
        Ok(customer)
    }

    async fn count(&self) -> RepositoryResult<u64> {
        let conn = self.get_conn()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM customer", [], |row| row.get(0))?;
        Ok(total.max(0) as u64)
    }

    async fn list(&self, page: u32, page_size: u32) -> RepositoryResult<Page<Customer>> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total = self.count().await?;
        let pagination = Pagination::calculate(total, page, page_size);

        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM customer ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(
                params![i64::from(page_size), pagination.offset as i64],
                Self::map_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            page,
            page_size,
            total_pages: pagination.total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn repo() -> CustomerRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        CustomerRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn new_customer(email: &str) -> NewCustomer {
        NewCustomer {
            name: "Kim".to_string(),
            email: email.to_string(),
            phone: "010-1234-5678".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_exists() {
        let repo = repo();
        assert!(!repo.exists_by_email("kim@test.com").await.unwrap());

        let inserted = repo.insert(new_customer("kim@test.com")).await.unwrap();
        assert!(!inserted.id.is_empty());
        assert!(repo.exists_by_email("kim@test.com").await.unwrap());

        let found = repo.find_by_email("kim@test.com").await.unwrap().unwrap();
        assert_eq!(found, inserted);
    }

    #[tokio::test]
    async fn test_unique_email_backstop() {
        let repo = repo();
        repo.insert(new_customer("a@b.com")).await.unwrap();
        let err = repo.insert(new_customer("a@b.com")).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_pages() {
        let repo = repo();
        for i in 0..5 {
            repo.insert(new_customer(&format!("c{}@x.com", i))).await.unwrap();
        }

        let page = repo.list(2, 2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 2);

        let last = repo.list(3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);
    }
}
