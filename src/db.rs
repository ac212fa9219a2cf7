use std::collections::HashSet;
use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::info;

use crate::models::{StudentRecord, StudentRow};
use crate::store::{dedupe_ids, RosterStore, StoreError, StoreResult};

const SELECT_STUDENTS: &str = r#"
    SELECT id, name, department, cgpa, marks, attendance, date_of_birth, email
    FROM querysense.students
    ORDER BY position
"#;

const INSERT_STUDENT: &str = r#"
    INSERT INTO querysense.students
    (id, name, department, cgpa, marks, attendance, date_of_birth, email)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (id) DO NOTHING
"#;

/// Roster kept in the `querysense.students` table.
pub struct PostgresStore<S> {
    pool: PgPool,
    _records: PhantomData<fn() -> S>,
}

impl<S: StudentRecord> PostgresStore<S> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _records: PhantomData,
        }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Creates or upgrades the schema.
    pub async fn init_db(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database schema ready");
        Ok(())
    }

    async fn replace_all(&self, records: &[S]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM querysense.students")
            .execute(&mut *tx)
            .await?;
        for student in records {
            insert_student(&mut tx, student).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn read_row(row: &PgRow) -> Result<StudentRow, sqlx::Error> {
    Ok(StudentRow {
        id: Some(row.try_get("id")?),
        name: row.try_get("name")?,
        department: row.try_get("department")?,
        cgpa: row.try_get("cgpa")?,
        marks: row.try_get::<Option<i32>, _>("marks")?.map(f64::from),
        attendance: f64::from(row.try_get::<i32, _>("attendance")?),
        date_of_birth: row.try_get("date_of_birth")?,
        email: row.try_get("email")?,
    })
}

async fn insert_student<S: StudentRecord>(
    tx: &mut Transaction<'_, Postgres>,
    student: &S,
) -> StoreResult<bool> {
    let row = student.to_row();
    let result = sqlx::query(INSERT_STUDENT)
        .bind(student.id())
        .bind(&row.name)
        .bind(&row.department)
        .bind(row.cgpa)
        .bind(row.marks.map(|marks| marks as i32))
        .bind(row.attendance as i32)
        .bind(row.date_of_birth)
        .bind(&row.email)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl<S: StudentRecord> RosterStore<S> for PostgresStore<S> {
    async fn current_roster(&self) -> StoreResult<Vec<S>> {
        let rows = sqlx::query(SELECT_STUDENTS).fetch_all(&self.pool).await?;
        let mut students = Vec::with_capacity(rows.len());

        for row in rows {
            let row = read_row(&row)?;
            let id = row.id.unwrap_or_default();
            let student = S::from_row(row).map_err(|source| StoreError::InvalidRecord { id, source })?;
            students.push(student);
        }

        Ok(students)
    }

    async fn replace(&self, records: Vec<S>) -> StoreResult<()> {
        let records = dedupe_ids(records);
        self.replace_all(&records).await?;
        info!(count = records.len(), "replaced roster");
        Ok(())
    }

    async fn append(&self, records: Vec<S>) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0usize;
        let mut seen = HashSet::new();

        for student in &records {
            if !seen.insert(student.id()) {
                continue;
            }
            if insert_student(&mut tx, student).await? {
                added += 1;
            }
        }

        tx.commit().await?;
        info!(added, "appended records");
        Ok(added)
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM querysense.students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(id, "deleted record");
        }
        Ok(deleted)
    }

    async fn reset(&self) -> StoreResult<Vec<S>> {
        let defaults = S::default_roster();
        self.replace_all(&defaults).await?;
        info!(count = defaults.len(), "reset roster to defaults");
        Ok(defaults)
    }

    async fn allocate_id(&self) -> StoreResult<i64> {
        let id: i64 = sqlx::query(
            r#"
            SELECT setval(
                'querysense.student_ids',
                GREATEST(
                    nextval('querysense.student_ids'),
                    (SELECT COALESCE(MAX(id), 0) + 1 FROM querysense.students)
                )
            ) AS id
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("id");
        Ok(id)
    }
}
