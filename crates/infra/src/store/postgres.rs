//! Postgres-backed directory store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (other) | Any other | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Backend` |
//!
//! Roles are stored as their rank and statuses as their code (`SMALLINT`), so
//! `ORDER BY role` follows the role hierarchy.

use std::future::Future;
use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::instrument;
use uuid::Uuid;

use atelier_auth::{
    AccessRow, AccessSource, AuthzError, CompanyRole, CompanyVisibility, Employee, Membership,
    UserDirectory,
};
use atelier_core::{
    Company, CompanyId, CompanyQuery, CompanyStatus, Listing, Page, Tag, TagId, UserAccount, UserId,
};

use super::r#trait::{CompanyScope, DirectoryStore, StoreError};

/// Directory schema. Every statement is idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id           UUID PRIMARY KEY,
    email        TEXT NOT NULL,
    full_name    TEXT NULL,
    is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
    is_active    BOOLEAN NOT NULL DEFAULT TRUE
);
CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (lower(email));

CREATE TABLE IF NOT EXISTS companies (
    id          UUID PRIMARY KEY,
    seq         BIGSERIAL NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NULL,
    status      SMALLINT NOT NULL DEFAULT 1 CHECK (status IN (1, 9)),
    is_deleted  BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE UNIQUE INDEX IF NOT EXISTS companies_live_title_key
    ON companies (lower(title)) WHERE NOT is_deleted;

CREATE TABLE IF NOT EXISTS company_members (
    company_id UUID NOT NULL REFERENCES companies (id),
    user_id    UUID NOT NULL REFERENCES users (id),
    seq        BIGSERIAL NOT NULL,
    role       SMALLINT NOT NULL CHECK (role IN (1, 5, 9)),
    PRIMARY KEY (company_id, user_id)
);

CREATE TABLE IF NOT EXISTS company_tags (
    id          UUID PRIMARY KEY,
    company_id  UUID NOT NULL REFERENCES companies (id),
    seq         BIGSERIAL NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS company_tags_title_key
    ON company_tags (company_id, lower(title));
"#;

/// Postgres-backed directory store.
///
/// Every access lookup is a single statement, so the company row and the
/// caller's membership come from one snapshot.
///
/// The [`DirectoryStore`] impl is synchronous and bridges into the async
/// methods with `block_in_place`; it must be called from a multi-threaded
/// tokio runtime.
#[derive(Debug, Clone)]
pub struct PostgresDirectoryStore {
    pool: Arc<PgPool>,
}

impl PostgresDirectoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create tables and indexes if they are missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    pub async fn lookup_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<CompanyVisibility>, StoreError> {
        let row = sqlx::query("SELECT status, is_deleted FROM companies WHERE id = $1")
            .bind(company_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("lookup_company", e))?;

        row.map(|row| -> Result<CompanyVisibility, StoreError> {
            let decode = |e: sqlx::Error| decode_error("lookup_company", e);
            let status: i16 = row.try_get("status").map_err(decode)?;
            Ok(CompanyVisibility {
                status: decode_status(status)?,
                is_deleted: row.try_get("is_deleted").map_err(decode)?,
            })
        })
        .transpose()
    }

    /// Company status and the caller's role, joined in one statement.
    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id), err)]
    pub async fn lookup_access(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<AccessRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT c.status, c.is_deleted, m.role
            FROM companies c
            LEFT JOIN company_members m
                ON m.company_id = c.id AND m.user_id = $2
            WHERE c.id = $1
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("lookup_access", e))?;

        row.map(|row| -> Result<AccessRow, StoreError> {
            let decode = |e: sqlx::Error| decode_error("lookup_access", e);
            let status: i16 = row.try_get("status").map_err(decode)?;
            let role: Option<i16> = row.try_get("role").map_err(decode)?;
            Ok(AccessRow {
                status: decode_status(status)?,
                is_deleted: row.try_get("is_deleted").map_err(decode)?,
                role: role.map(decode_role).transpose()?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    pub async fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query(
            "SELECT id, email, full_name, is_superuser, is_active FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user", e))?;

        row.map(|row| {
            UserRow::from_row(&row)
                .map(UserAccount::from)
                .map_err(|e| decode_error("find_user", e))
        })
        .transpose()
    }

    #[instrument(skip(self, account), fields(user_id = %account.id), err)]
    pub async fn insert_user(&self, account: UserAccount) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, full_name, is_superuser, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                full_name = EXCLUDED.full_name,
                is_superuser = EXCLUDED.is_superuser,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.email)
        .bind(&account.full_name)
        .bind(account.is_superuser)
        .bind(account.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    /// Insert the company and its owner membership in one transaction.
    #[instrument(skip(self, company), fields(company_id = %company.id, owner = %owner), err)]
    pub async fn create_company(&self, company: &Company, owner: UserId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_company", e))?;

        sqlx::query(
            r#"
            INSERT INTO companies (id, title, description, status, is_deleted)
            VALUES ($1, $2, $3, $4, FALSE)
            "#,
        )
        .bind(company.id.as_uuid())
        .bind(&company.title)
        .bind(&company.description)
        .bind(company.status.code())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_company", e))?;

        sqlx::query("INSERT INTO company_members (company_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(company.id.as_uuid())
            .bind(owner.as_uuid())
            .bind(encode_role(CompanyRole::Owner))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_company", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_company", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(company_id = %id), err)]
    pub async fn find_company(&self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, description, status, is_deleted
            FROM companies
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_company", e))?;

        row.map(|row| company_from_row("find_company", &row)).transpose()
    }

    #[instrument(skip(self, company), fields(company_id = %company.id), err)]
    pub async fn update_company(&self, company: &Company) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE companies
            SET title = $2, description = $3, status = $4
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(company.id.as_uuid())
        .bind(&company.title)
        .bind(&company.description)
        .bind(company.status.code())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_company", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("company {}", company.id)));
        }
        Ok(())
    }

    /// Flag the company deleted and drop its memberships and tags.
    #[instrument(skip(self), fields(company_id = %id), err)]
    pub async fn soft_delete_company(&self, id: CompanyId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("soft_delete_company", e))?;

        let result =
            sqlx::query("UPDATE companies SET is_deleted = TRUE WHERE id = $1 AND NOT is_deleted")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("soft_delete_company", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("company {id}")));
        }

        sqlx::query("DELETE FROM company_members WHERE company_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("soft_delete_company", e))?;
        sqlx::query("DELETE FROM company_tags WHERE company_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("soft_delete_company", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("soft_delete_company", e))?;
        Ok(())
    }

    #[instrument(skip(self, query), err)]
    pub async fn list_companies(
        &self,
        scope: CompanyScope,
        query: &CompanyQuery,
    ) -> Result<Listing<Company>, StoreError> {
        let viewer: Option<Uuid> = match scope {
            CompanyScope::All => None,
            CompanyScope::VisibleTo(user_id) => Some(*user_id.as_uuid()),
        };
        let pattern = query.name.as_deref().map(like_pattern);

        const FILTER: &str = r#"
            FROM companies c
            WHERE NOT c.is_deleted
              AND ($1::TEXT IS NULL OR c.title ILIKE $1)
              AND ($2::UUID IS NULL
                   OR c.status = 1
                   OR EXISTS (
                       SELECT 1 FROM company_members m
                       WHERE m.company_id = c.id AND m.user_id = $2
                   ))
        "#;

        let count_sql = format!("SELECT COUNT(*) AS count {FILTER}");
        let page_sql = format!(
            "SELECT c.id, c.title, c.description, c.status, c.is_deleted {FILTER} \
             ORDER BY c.seq ASC LIMIT $3 OFFSET $4"
        );

        let count: i64 = sqlx::query(&count_sql)
            .bind(&pattern)
            .bind(viewer)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_companies", e))?
            .try_get("count")
            .map_err(|e| decode_error("list_companies", e))?;

        let rows = sqlx::query(&page_sql)
            .bind(&pattern)
            .bind(viewer)
            .bind(i64::from(query.page.limit.min(Page::MAX_LIMIT)))
            .bind(i64::from(query.page.skip))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_companies", e))?;

        let data = rows
            .iter()
            .map(|row| company_from_row("list_companies", row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Listing::new(data, count.max(0) as u64))
    }

    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id), err)]
    pub async fn find_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<CompanyRole>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT m.role
            FROM company_members m
            JOIN companies c ON c.id = m.company_id
            WHERE m.company_id = $1 AND m.user_id = $2 AND NOT c.is_deleted
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_membership", e))?;

        row.map(|row| -> Result<CompanyRole, StoreError> {
            let role: i16 = row.try_get("role").map_err(|e| decode_error("find_membership", e))?;
            decode_role(role)
        })
        .transpose()
    }

    #[instrument(
        skip(self),
        fields(
            company_id = %membership.company_id,
            user_id = %membership.user_id,
            role = %membership.role
        ),
        err
    )]
    pub async fn upsert_membership(&self, membership: Membership) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO company_members (company_id, user_id, role)
            SELECT $1, $2, $3
            FROM companies c
            WHERE c.id = $1 AND NOT c.is_deleted
            ON CONFLICT (company_id, user_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(membership.company_id.as_uuid())
        .bind(membership.user_id.as_uuid())
        .bind(encode_role(membership.role))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_membership", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("company {}", membership.company_id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id), err)]
    pub async fn delete_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM company_members WHERE company_id = $1 AND user_id = $2")
                .bind(company_id.as_uuid())
                .bind(user_id.as_uuid())
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("delete_membership", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    pub async fn list_employees(
        &self,
        company_id: CompanyId,
        page: Page,
    ) -> Result<Listing<Employee>, StoreError> {
        let count: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM company_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.company_id = $1
            "#,
        )
        .bind(company_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_employees", e))?
        .try_get("count")
        .map_err(|e| decode_error("list_employees", e))?;

        let rows = sqlx::query(
            r#"
            SELECT u.id, u.email, u.full_name, m.role
            FROM company_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.company_id = $1
            ORDER BY m.seq ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(i64::from(page.limit.min(Page::MAX_LIMIT)))
        .bind(i64::from(page.skip))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_employees", e))?;

        let data = rows
            .iter()
            .map(|row| {
                EmployeeRow::from_row(row)
                    .map_err(|e| decode_error("list_employees", e))
                    .and_then(Employee::try_from)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Listing::new(data, count.max(0) as u64))
    }

    #[instrument(skip(self, tag), fields(company_id = %tag.company_id, tag_id = %tag.id), err)]
    pub async fn insert_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO company_tags (id, company_id, title, description)
            SELECT $1, $2, $3, $4
            FROM companies c
            WHERE c.id = $2 AND NOT c.is_deleted
            "#,
        )
        .bind(tag.id.as_uuid())
        .bind(tag.company_id.as_uuid())
        .bind(&tag.title)
        .bind(&tag.description)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_tag", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("company {}", tag.company_id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(company_id = %company_id, tag_id = %tag_id), err)]
    pub async fn find_tag(
        &self,
        company_id: CompanyId,
        tag_id: TagId,
    ) -> Result<Option<Tag>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, company_id, title, description
            FROM company_tags
            WHERE id = $1 AND company_id = $2
            "#,
        )
        .bind(tag_id.as_uuid())
        .bind(company_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_tag", e))?;

        row.map(|row| {
            TagRow::from_row(&row)
                .map(Tag::from)
                .map_err(|e| decode_error("find_tag", e))
        })
        .transpose()
    }

    #[instrument(skip(self, tag), fields(company_id = %tag.company_id, tag_id = %tag.id), err)]
    pub async fn update_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE company_tags
            SET title = $3, description = $4
            WHERE id = $1 AND company_id = $2
            "#,
        )
        .bind(tag.id.as_uuid())
        .bind(tag.company_id.as_uuid())
        .bind(&tag.title)
        .bind(&tag.description)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_tag", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("tag {}", tag.id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(company_id = %company_id, tag_id = %tag_id), err)]
    pub async fn delete_tag(
        &self,
        company_id: CompanyId,
        tag_id: TagId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM company_tags WHERE id = $1 AND company_id = $2")
            .bind(tag_id.as_uuid())
            .bind(company_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_tag", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    pub async fn list_tags(&self, company_id: CompanyId) -> Result<Vec<Tag>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, company_id, title, description
            FROM company_tags
            WHERE company_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(company_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_tags", e))?;

        rows.iter()
            .map(|row| {
                TagRow::from_row(row)
                    .map(Tag::from)
                    .map_err(|e| decode_error("list_tags", e))
            })
            .collect()
    }

    /// Drive an async store call to completion from synchronous code.
    ///
    /// `block_in_place` panics on a current-thread runtime, so anything other
    /// than a multi-threaded runtime is refused up front.
    fn run<T>(&self, fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        let handle = Handle::try_current().map_err(|_| {
            StoreError::Backend(
                "PostgresDirectoryStore requires a tokio runtime; call it from within one"
                    .to_string(),
            )
        })?;
        if !matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) {
            return Err(StoreError::Backend(
                "PostgresDirectoryStore requires a multi-threaded tokio runtime".to_string(),
            ));
        }
        tokio::task::block_in_place(|| handle.block_on(fut))
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                // Referenced user or company is missing.
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {operation}")),
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn decode_error(operation: &str, err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row in {operation}: {err}"))
}

fn decode_status(code: i16) -> Result<CompanyStatus, StoreError> {
    CompanyStatus::from_code(code)
        .ok_or_else(|| StoreError::Backend(format!("unknown company status code {code}")))
}

fn encode_role(role: CompanyRole) -> i16 {
    i16::from(role.rank())
}

fn decode_role(rank: i16) -> Result<CompanyRole, StoreError> {
    u8::try_from(rank)
        .ok()
        .and_then(CompanyRole::from_rank)
        .ok_or_else(|| StoreError::Backend(format!("unknown role rank {rank}")))
}

/// `ILIKE` pattern for a substring search, with wildcards in the needle escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn company_from_row(operation: &str, row: &PgRow) -> Result<Company, StoreError> {
    CompanyRow::from_row(row)
        .map_err(|e| decode_error(operation, e))
        .and_then(Company::try_from)
}

#[derive(Debug)]
struct CompanyRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    status: i16,
    is_deleted: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for CompanyRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CompanyRow {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
}

impl TryFrom<CompanyRow> for Company {
    type Error = StoreError;

    fn try_from(row: CompanyRow) -> Result<Self, Self::Error> {
        Ok(Company {
            id: CompanyId::from_uuid(row.id),
            title: row.title,
            description: row.description,
            status: decode_status(row.status)?,
            is_deleted: row.is_deleted,
        })
    }
}

#[derive(Debug)]
struct UserRow {
    id: Uuid,
    email: String,
    full_name: Option<String>,
    is_superuser: bool,
    is_active: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
            is_superuser: row.try_get("is_superuser")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

impl From<UserRow> for UserAccount {
    fn from(row: UserRow) -> Self {
        UserAccount {
            id: UserId::from_uuid(row.id),
            email: row.email,
            full_name: row.full_name,
            is_superuser: row.is_superuser,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug)]
struct EmployeeRow {
    id: Uuid,
    email: String,
    full_name: Option<String>,
    role: i16,
}

impl<'r> sqlx::FromRow<'r, PgRow> for EmployeeRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EmployeeRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
            role: row.try_get("role")?,
        })
    }
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = StoreError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        Ok(Employee {
            user_id: UserId::from_uuid(row.id),
            email: row.email,
            full_name: row.full_name,
            role: decode_role(row.role)?,
        })
    }
}

#[derive(Debug)]
struct TagRow {
    id: Uuid,
    company_id: Uuid,
    title: String,
    description: Option<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for TagRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TagRow {
            id: row.try_get("id")?,
            company_id: row.try_get("company_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
        })
    }
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: TagId::from_uuid(row.id),
            company_id: CompanyId::from_uuid(row.company_id),
            title: row.title,
            description: row.description,
        }
    }
}

impl AccessSource for PostgresDirectoryStore {
    fn lookup_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<CompanyVisibility>, AuthzError> {
        Ok(self.run(self.lookup_company(company_id))?)
    }

    fn lookup_access(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<AccessRow>, AuthzError> {
        Ok(self.run(self.lookup_access(company_id, user_id))?)
    }
}

impl UserDirectory for PostgresDirectoryStore {
    fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, AuthzError> {
        Ok(self.run(self.find_user(id))?)
    }
}

impl DirectoryStore for PostgresDirectoryStore {
    fn insert_user(&self, account: UserAccount) -> Result<(), StoreError> {
        self.run(self.insert_user(account))
    }

    fn create_company(&self, company: &Company, owner: UserId) -> Result<(), StoreError> {
        self.run(self.create_company(company, owner))
    }

    fn find_company(&self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        self.run(self.find_company(id))
    }

    fn update_company(&self, company: &Company) -> Result<(), StoreError> {
        self.run(self.update_company(company))
    }

    fn soft_delete_company(&self, id: CompanyId) -> Result<(), StoreError> {
        self.run(self.soft_delete_company(id))
    }

    fn list_companies(
        &self,
        scope: CompanyScope,
        query: &CompanyQuery,
    ) -> Result<Listing<Company>, StoreError> {
        self.run(self.list_companies(scope, query))
    }

    fn find_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<CompanyRole>, StoreError> {
        self.run(self.find_membership(company_id, user_id))
    }

    fn upsert_membership(&self, membership: Membership) -> Result<(), StoreError> {
        self.run(self.upsert_membership(membership))
    }

    fn delete_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        self.run(self.delete_membership(company_id, user_id))
    }

    fn list_employees(
        &self,
        company_id: CompanyId,
        page: Page,
    ) -> Result<Listing<Employee>, StoreError> {
        self.run(self.list_employees(company_id, page))
    }

    fn insert_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        self.run(self.insert_tag(tag))
    }

    fn find_tag(&self, company_id: CompanyId, tag_id: TagId) -> Result<Option<Tag>, StoreError> {
        self.run(self.find_tag(company_id, tag_id))
    }

    fn update_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        self.run(self.update_tag(tag))
    }

    fn delete_tag(&self, company_id: CompanyId, tag_id: TagId) -> Result<bool, StoreError> {
        self.run(self.delete_tag(company_id, tag_id))
    }

    fn list_tags(&self, company_id: CompanyId) -> Result<Vec<Tag>, StoreError> {
        self.run(self.list_tags(company_id))
    }
}

#[cfg(test)]
mod tests {
    use atelier_auth::{AccessGrant, DenialReason, Principal, resolve_access};
    use atelier_core::{NewCompany, NewTag};
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::config::DATABASE_URL;

    /// Store against `ATELIER_DATABASE_URL`, or `None` when no database is configured.
    async fn live_store() -> Option<PostgresDirectoryStore> {
        let url = std::env::var(DATABASE_URL).ok().filter(|v| !v.trim().is_empty())?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("failed to connect to test database");
        let store = PostgresDirectoryStore::new(pool);
        store.ensure_schema().await.expect("failed to apply schema");
        Some(store)
    }

    async fn register(store: &PostgresDirectoryStore) -> UserId {
        let id = UserId::new();
        store
            .insert_user(UserAccount::new(id, format!("{id}@example.com")))
            .await
            .unwrap();
        id
    }

    async fn company(
        store: &PostgresDirectoryStore,
        title: &str,
        status: CompanyStatus,
        owner: UserId,
    ) -> Company {
        let draft = NewCompany::new(title).with_status(status);
        let company = Company::from_draft(CompanyId::new(), draft).unwrap();
        store.create_company(&company, owner).await.unwrap();
        company
    }

    fn unique_title(prefix: &str) -> String {
        format!("{prefix}-{}", CompanyId::new())
    }

    #[tokio::test]
    async fn current_thread_runtime_is_a_backend_error() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://atelier@localhost/atelier")
            .unwrap();
        let store = PostgresDirectoryStore::new(pool);

        let found = DirectoryStore::find_company(&store, CompanyId::new());
        assert!(matches!(found, Err(StoreError::Backend(_))));

        let access = AccessSource::lookup_access(&store, CompanyId::new(), UserId::new());
        assert!(matches!(access, Err(AuthzError::Lookup(_))));

        let resolved = resolve_access(&store, &Principal::user(UserId::new()), CompanyId::new());
        assert!(matches!(resolved, Err(AuthzError::Lookup(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn access_lookup_joins_status_and_membership() {
        let Some(store) = live_store().await else {
            return;
        };
        let owner = register(&store).await;
        let stranger = register(&store).await;
        let private = company(&store, &unique_title("vault"), CompanyStatus::Private, owner).await;
        let public = company(&store, &unique_title("plaza"), CompanyStatus::Public, owner).await;

        assert_eq!(store.lookup_access(CompanyId::new(), owner).await.unwrap(), None);

        let row = store.lookup_access(private.id, owner).await.unwrap().unwrap();
        assert_eq!(row.role, Some(CompanyRole::Owner));
        assert!(!row.is_deleted);

        let row = store.lookup_access(private.id, stranger).await.unwrap().unwrap();
        assert_eq!(row.status, CompanyStatus::Private);
        assert_eq!(row.role, None);

        // Through the sync bridge.
        let denied = resolve_access(&store, &Principal::user(stranger), private.id).unwrap_err();
        assert_eq!(denied, AuthzError::PermissionDenied(DenialReason::PrivateCompany));

        let guest = resolve_access(&store, &Principal::user(stranger), public.id).unwrap();
        assert_eq!(guest.grant, AccessGrant::PublicGuest);

        let missing = resolve_access(&store, &Principal::user(owner), CompanyId::new());
        assert!(matches!(missing, Err(AuthzError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn soft_delete_cascades_and_frees_title() {
        let Some(store) = live_store().await else {
            return;
        };
        let owner = register(&store).await;
        let member = register(&store).await;
        let title = unique_title("acme");
        let acme = company(&store, &title, CompanyStatus::Public, owner).await;

        let clash = Company::from_draft(CompanyId::new(), NewCompany::new(title.to_uppercase()))
            .unwrap();
        assert!(matches!(
            store.create_company(&clash, owner).await,
            Err(StoreError::Conflict(_))
        ));

        store
            .upsert_membership(Membership {
                company_id: acme.id,
                user_id: member,
                role: CompanyRole::Reader,
            })
            .await
            .unwrap();
        let tag = Tag::from_draft(TagId::new(), acme.id, NewTag::new("logo")).unwrap();
        store.insert_tag(&tag).await.unwrap();

        store.soft_delete_company(acme.id).await.unwrap();

        let row = store.lookup_access(acme.id, member).await.unwrap().unwrap();
        assert!(row.is_deleted);
        assert_eq!(row.role, None);
        assert_eq!(store.find_company(acme.id).await.unwrap(), None);
        assert!(store.list_tags(acme.id).await.unwrap().is_empty());
        assert!(matches!(
            store.soft_delete_company(acme.id).await,
            Err(StoreError::NotFound(_))
        ));

        let guest = resolve_access(&store, &Principal::user(member), acme.id);
        assert!(matches!(guest, Err(AuthzError::NotFound(_))));

        company(&store, &title.to_uppercase(), CompanyStatus::Private, owner).await;
    }

    #[test]
    fn roles_round_trip_through_rank_column() {
        for role in CompanyRole::ALL {
            assert_eq!(decode_role(encode_role(role)).unwrap(), role);
        }
        assert!(decode_role(3).is_err());
        assert!(decode_role(-1).is_err());
    }

    #[test]
    fn unknown_status_code_is_a_backend_error() {
        assert_eq!(decode_status(1).unwrap(), CompanyStatus::Public);
        assert!(matches!(decode_status(4), Err(StoreError::Backend(_))));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("acme"), "%acme%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
