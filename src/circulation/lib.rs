use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::DomainError;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn parse_date(s: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| DomainError::Internal(anyhow::anyhow!("bad date {s}: {e}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub member_id: i32,
    pub member_name: String,
    pub issue_date: String,
    pub due_date: String,
    pub return_date: Option<String>,
    pub fine: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Returned,
    Overdue,
}

impl IssueState {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(IssueState::Open),
            "returned" => Some(IssueState::Returned),
            "overdue" => Some(IssueState::Overdue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CirculationSettings {
    pub fine_per_day: f64,
    pub loan_period_days: i64,
    pub max_books_per_member: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettings {
    pub fine_per_day: Option<f64>,
    pub loan_period_days: Option<i64>,
    pub max_books_per_member: Option<i64>,
}

const ISSUE_COLUMNS: &str = r#"
    issues.id,
    issues.book_id,
    books.title,
    issues.member_id,
    members.name,
    issues.issue_date,
    issues.due_date,
    issues.return_date,
    issues.fine
"#;

pub struct Circulation<'a> {
    db: &'a Database,
}

impl<'a> Circulation<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn conn(&self) -> &libsql::Connection {
        self.db.connection()
    }

    pub async fn settings(&self) -> Result<CirculationSettings, DomainError> {
        let mut settings = CirculationSettings {
            fine_per_day: 0.0,
            loan_period_days: 0,
            max_books_per_member: 0,
        };

        let mut rows = self.conn().query("SELECT key, value FROM settings", ()).await?;
        while let Some(row) = rows.next().await? {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            match key.as_str() {
                "fine_per_day" => {
                    settings.fine_per_day = value
                        .parse()
                        .map_err(|_| DomainError::Internal(anyhow::anyhow!("bad fine_per_day: {value}")))?
                }
                "loan_period_days" => {
                    settings.loan_period_days = value
                        .parse()
                        .map_err(|_| DomainError::Internal(anyhow::anyhow!("bad loan_period_days: {value}")))?
                }
                "max_books_per_member" => {
                    settings.max_books_per_member = value.parse().map_err(|_| {
                        DomainError::Internal(anyhow::anyhow!("bad max_books_per_member: {value}"))
                    })?
                }
                _ => {}
            }
        }

        Ok(settings)
    }

    pub async fn update_settings(&self, input: UpdateSettings) -> Result<CirculationSettings, DomainError> {
        if let Some(fine) = input.fine_per_day {
            if fine < 0.0 {
                return Err(DomainError::Invalid("fine_per_day cannot be negative".into()));
            }
            self.set_setting("fine_per_day", &fine.to_string()).await?;
        }
        if let Some(days) = input.loan_period_days {
            if days < 1 {
                return Err(DomainError::Invalid("loan_period_days must be at least 1".into()));
            }
            self.set_setting("loan_period_days", &days.to_string()).await?;
        }
        if let Some(max) = input.max_books_per_member {
            if max < 1 {
                return Err(DomainError::Invalid("max_books_per_member must be at least 1".into()));
            }
            self.set_setting("max_books_per_member", &max.to_string()).await?;
        }

        self.settings().await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), DomainError> {
        self.conn()
            .execute(
                "INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                libsql::params![key, value],
            )
            .await?;
        Ok(())
    }

    pub async fn issue_book(&self, book_id: i32, member_id: i32) -> Result<Issue, DomainError> {
        self.issue_book_on(book_id, member_id, today()).await
    }

    /// Issues a copy of `book_id` to `member_id` as of `date`. All checks and
    /// the availability decrement run in one transaction.
    pub async fn issue_book_on(
        &self,
        book_id: i32,
        member_id: i32,
        date: NaiveDate,
    ) -> Result<Issue, DomainError> {
        let _guard = self.db.lock_tx().await;

        self.conn().execute("BEGIN TRANSACTION", ()).await?;

        let result = self.issue_book_internal(book_id, member_id, date).await;

        match result {
            Ok(issue_id) => {
                self.conn().execute("COMMIT", ()).await?;
                self.get_issue(issue_id)
                    .await?
                    .ok_or_else(|| DomainError::Internal(anyhow::anyhow!("created loan vanished")))
            }
            Err(e) => {
                let _ = self.conn().execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn issue_book_internal(
        &self,
        book_id: i32,
        member_id: i32,
        date: NaiveDate,
    ) -> Result<i32, DomainError> {
        let settings = self.settings().await?;

        let mut rows = self
            .conn()
            .query(
                "SELECT status FROM members WHERE id = ? AND deleted_at IS NULL",
                libsql::params![member_id],
            )
            .await?;
        let member_status: String = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => return Err(DomainError::NotFound("member")),
        };
        if member_status != "active" {
            return Err(DomainError::Conflict(format!(
                "member is {} and cannot borrow",
                member_status
            )));
        }

        let mut rows = self
            .conn()
            .query(
                "SELECT available_copies FROM books WHERE id = ? AND deleted_at IS NULL",
                libsql::params![book_id],
            )
            .await?;
        let available: i32 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => return Err(DomainError::NotFound("book")),
        };
        if available < 1 {
            return Err(DomainError::Conflict("no copies available".into()));
        }

        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM issues WHERE member_id = ? AND return_date IS NULL",
                libsql::params![member_id],
            )
            .await?;
        let open_loans: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        if open_loans >= settings.max_books_per_member {
            return Err(DomainError::Conflict(format!(
                "member already holds {} open loan(s), the limit",
                open_loans
            )));
        }

        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM issues WHERE member_id = ? AND book_id = ? AND return_date IS NULL",
                libsql::params![member_id, book_id],
            )
            .await?;
        if rows.next().await?.is_some() {
            return Err(DomainError::Conflict("member already holds a copy of this book".into()));
        }

        let due = date + Duration::days(settings.loan_period_days);

        let mut rows = self
            .conn()
            .query(
                "INSERT INTO issues (book_id, member_id, issue_date, due_date) VALUES (?, ?, ?, ?) RETURNING id",
                libsql::params![
                    book_id,
                    member_id,
                    date.format(DATE_FORMAT).to_string(),
                    due.format(DATE_FORMAT).to_string()
                ],
            )
            .await?;
        let issue_id: i32 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => return Err(DomainError::Internal(anyhow::anyhow!("failed to create loan"))),
        };

        self.conn()
            .execute(
                "UPDATE books SET available_copies = available_copies - 1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
                libsql::params![book_id],
            )
            .await?;
        self.db.refresh_book_status(book_id).await?;

        Ok(issue_id)
    }

    pub async fn return_book(&self, issue_id: i32) -> Result<Issue, DomainError> {
        self.return_book_on(issue_id, today()).await
    }

    /// Closes a loan as of `date`: records the return, computes the fine,
    /// releases the copy and reinstates the member when nothing of theirs is
    /// overdue anymore.
    pub async fn return_book_on(&self, issue_id: i32, date: NaiveDate) -> Result<Issue, DomainError> {
        let _guard = self.db.lock_tx().await;

        self.conn().execute("BEGIN TRANSACTION", ()).await?;

        let result = self.return_book_internal(issue_id, date).await;

        match result {
            Ok(()) => {
                self.conn().execute("COMMIT", ()).await?;
                self.get_issue(issue_id)
                    .await?
                    .ok_or_else(|| DomainError::Internal(anyhow::anyhow!("returned loan vanished")))
            }
            Err(e) => {
                let _ = self.conn().execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn return_book_internal(&self, issue_id: i32, date: NaiveDate) -> Result<(), DomainError> {
        let settings = self.settings().await?;

        let mut rows = self
            .conn()
            .query(
                "SELECT book_id, member_id, due_date, return_date FROM issues WHERE id = ?",
                libsql::params![issue_id],
            )
            .await?;
        let row = match rows.next().await? {
            Some(row) => row,
            None => return Err(DomainError::NotFound("loan")),
        };
        let book_id: i32 = row.get(0)?;
        let member_id: i32 = row.get(1)?;
        let due_date: String = row.get(2)?;
        let return_date: Option<String> = row.get(3)?;

        if return_date.is_some() {
            return Err(DomainError::Conflict("loan is already returned".into()));
        }

        let due = parse_date(&due_date)?;
        let days_late = (date - due).num_days().max(0);
        let fine = days_late as f64 * settings.fine_per_day;

        self.conn()
            .execute(
                "UPDATE issues SET return_date = ?, fine = ? WHERE id = ?",
                libsql::params![date.format(DATE_FORMAT).to_string(), fine, issue_id],
            )
            .await?;

        self.conn()
            .execute(
                "UPDATE books SET available_copies = MIN(available_copies + 1, total_copies), updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
                libsql::params![book_id],
            )
            .await?;
        self.db.refresh_book_status(book_id).await?;

        // A suspended member comes back once nothing of theirs is overdue.
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM issues WHERE member_id = ? AND return_date IS NULL AND due_date < ?",
                libsql::params![member_id, date.format(DATE_FORMAT).to_string()],
            )
            .await?;
        let still_overdue: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        if still_overdue == 0 {
            self.conn()
                .execute(
                    "UPDATE members SET status = 'active', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ? AND status = 'suspended'",
                    libsql::params![member_id],
                )
                .await?;
        }

        Ok(())
    }

    pub async fn get_issue(&self, issue_id: i32) -> Result<Option<Issue>, DomainError> {
        let query = format!(
            r#"SELECT {} FROM issues
JOIN books ON books.id = issues.book_id
JOIN members ON members.id = issues.member_id
WHERE issues.id = ?"#,
            ISSUE_COLUMNS
        );
        let mut rows = self.conn().query(&query, libsql::params![issue_id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_issue(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn list_issues(
        &self,
        state: Option<IssueState>,
        member_id: Option<i32>,
    ) -> Result<Vec<Issue>, DomainError> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        match state {
            Some(IssueState::Open) => conditions.push("issues.return_date IS NULL"),
            Some(IssueState::Returned) => conditions.push("issues.return_date IS NOT NULL"),
            Some(IssueState::Overdue) => {
                conditions.push("issues.return_date IS NULL AND issues.due_date < ?");
                params.push(today().format(DATE_FORMAT).to_string().into());
            }
            None => {}
        }
        if let Some(member_id) = member_id {
            conditions.push("issues.member_id = ?");
            params.push(member_id.into());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            r#"SELECT {} FROM issues
JOIN books ON books.id = issues.book_id
JOIN members ON members.id = issues.member_id
{}
ORDER BY issues.id DESC"#,
            ISSUE_COLUMNS, where_clause
        );

        let mut rows = self.conn().query(&query, params).await?;
        let mut issues = Vec::new();
        while let Some(row) = rows.next().await? {
            issues.push(Self::row_to_issue(&row)?);
        }
        Ok(issues)
    }

    pub async fn count_open(&self) -> Result<i32, DomainError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM issues WHERE return_date IS NULL", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    pub async fn count_overdue(&self) -> Result<i32, DomainError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM issues WHERE return_date IS NULL AND due_date < ?",
                libsql::params![today().format(DATE_FORMAT).to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    /// Suspends active members sitting on overdue loans. Returns how many
    /// members were suspended. Run periodically by the maintenance task.
    pub async fn sweep_overdue(&self, date: NaiveDate) -> Result<u64, DomainError> {
        let changed = self
            .conn()
            .execute(
                r#"UPDATE members
SET status = 'suspended', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
WHERE status = 'active'
  AND deleted_at IS NULL
  AND id IN (SELECT member_id FROM issues WHERE return_date IS NULL AND due_date < ?)"#,
                libsql::params![date.format(DATE_FORMAT).to_string()],
            )
            .await?;
        Ok(changed)
    }

    fn row_to_issue(row: &libsql::Row) -> Result<Issue, DomainError> {
        Ok(Issue {
            id: row.get(0)?,
            book_id: row.get(1)?,
            book_title: row.get(2)?,
            member_id: row.get(3)?,
            member_name: row.get(4)?,
            issue_date: row.get(5)?,
            due_date: row.get(6)?,
            return_date: row.get(7)?,
            fine: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::test_db;
    use crate::members::{CreateMember, MemberStatus, Members};
    use crate::model::CreateBook;

    async fn seed(db: &crate::db::Database) -> (i32, i32) {
        let book = db
            .create_book(CreateBook {
                title: "The Count of Monte Cristo".to_string(),
                isbn: "978-0140449266".to_string(),
                category: Some("Fiction".to_string()),
                authors: vec!["Alexandre Dumas".to_string()],
                total_copies: 2,
            })
            .await
            .unwrap();
        let member = Members::new(db.connection())
            .register(CreateMember {
                name: "Edmond Dantes".to_string(),
                email: "edmond@example.com".to_string(),
                phone: None,
                address: None,
            })
            .await
            .unwrap();
        (book.id, member.id)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn issue_decrements_availability_and_sets_due_date() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let (book_id, member_id) = seed(&db).await;
        let circulation = Circulation::new(&db);

        let issue = circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap();
        assert_eq!(issue.issue_date, "2026-08-01");
        assert_eq!(issue.due_date, "2026-08-15"); // seeded loan period: 14 days
        assert!(issue.return_date.is_none());

        let book = db.get_book_by_id(book_id).await.unwrap().unwrap();
        assert_eq!(book.available_copies, 1);
        assert_eq!(book.status, "Available");
    }

    #[tokio::test]
    async fn last_copy_flips_status_to_issued_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let (book_id, member_id) = seed(&db).await;
        let members = Members::new(db.connection());
        let other = members
            .register(CreateMember {
                name: "Mercedes Herrera".to_string(),
                email: "mercedes@example.com".to_string(),
                phone: None,
                address: None,
            })
            .await
            .unwrap();
        let circulation = Circulation::new(&db);

        circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap();
        let second = circulation
            .issue_book_on(book_id, other.id, date("2026-08-01"))
            .await
            .unwrap();

        let book = db.get_book_by_id(book_id).await.unwrap().unwrap();
        assert_eq!(book.available_copies, 0);
        assert_eq!(book.status, "Issued");

        // No copies left for a third borrower.
        let third = members
            .register(CreateMember {
                name: "Fernand Mondego".to_string(),
                email: "fernand@example.com".to_string(),
                phone: None,
                address: None,
            })
            .await
            .unwrap();
        let err = circulation
            .issue_book_on(book_id, third.id, date("2026-08-02"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        circulation
            .return_book_on(second.id, date("2026-08-03"))
            .await
            .unwrap();
        let book = db.get_book_by_id(book_id).await.unwrap().unwrap();
        assert_eq!(book.available_copies, 1);
        assert_eq!(book.status, "Available");
    }

    #[tokio::test]
    async fn on_time_return_has_no_fine() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let (book_id, member_id) = seed(&db).await;
        let circulation = Circulation::new(&db);

        let issue = circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap();
        let returned = circulation
            .return_book_on(issue.id, date("2026-08-15"))
            .await
            .unwrap();
        assert_eq!(returned.return_date.as_deref(), Some("2026-08-15"));
        assert_eq!(returned.fine, Some(0.0));
    }

    #[tokio::test]
    async fn late_return_fines_days_overdue_times_rate() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let (book_id, member_id) = seed(&db).await;
        let circulation = Circulation::new(&db);

        circulation
            .update_settings(UpdateSettings {
                fine_per_day: Some(2.5),
                loan_period_days: None,
                max_books_per_member: None,
            })
            .await
            .unwrap();

        let issue = circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap();
        // Due 2026-08-15, returned 2026-08-18: 3 days late.
        let returned = circulation
            .return_book_on(issue.id, date("2026-08-18"))
            .await
            .unwrap();
        assert_eq!(returned.fine, Some(7.5));
    }

    #[tokio::test]
    async fn double_return_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let (book_id, member_id) = seed(&db).await;
        let circulation = Circulation::new(&db);

        let issue = circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap();
        circulation
            .return_book_on(issue.id, date("2026-08-10"))
            .await
            .unwrap();
        let err = circulation
            .return_book_on(issue.id, date("2026-08-11"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn issue_refuses_unknown_and_non_active_members() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let (book_id, member_id) = seed(&db).await;
        let circulation = Circulation::new(&db);
        let members = Members::new(db.connection());

        let err = circulation
            .issue_book_on(book_id, 9999, date("2026-08-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound("member")));

        let err = circulation
            .issue_book_on(9999, member_id, date("2026-08-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound("book")));

        members
            .set_status(member_id, MemberStatus::Suspended)
            .await
            .unwrap();
        let err = circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // Availability untouched by the refused issue.
        let book = db.get_book_by_id(book_id).await.unwrap().unwrap();
        assert_eq!(book.available_copies, 2);
    }

    #[tokio::test]
    async fn loan_limit_and_duplicate_loan_are_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let (book_id, member_id) = seed(&db).await;
        let circulation = Circulation::new(&db);

        circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap();

        // Second copy of the same title is refused.
        let err = circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        circulation
            .update_settings(UpdateSettings {
                fine_per_day: None,
                loan_period_days: None,
                max_books_per_member: Some(1),
            })
            .await
            .unwrap();

        let other_book = db
            .create_book(CreateBook {
                title: "The Three Musketeers".to_string(),
                isbn: "978-0140437263".to_string(),
                category: None,
                authors: vec![],
                total_copies: 1,
            })
            .await
            .unwrap();
        let err = circulation
            .issue_book_on(other_book.id, member_id, date("2026-08-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn sweep_suspends_and_return_reinstates() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let (book_id, member_id) = seed(&db).await;
        let circulation = Circulation::new(&db);
        let members = Members::new(db.connection());

        let issue = circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap();

        // Nothing overdue yet on the due date itself.
        assert_eq!(circulation.sweep_overdue(date("2026-08-15")).await.unwrap(), 0);

        let suspended = circulation.sweep_overdue(date("2026-08-20")).await.unwrap();
        assert_eq!(suspended, 1);
        let member = members.get(member_id).await.unwrap().unwrap();
        assert_eq!(member.status, MemberStatus::Suspended);

        // Sweep is idempotent.
        assert_eq!(circulation.sweep_overdue(date("2026-08-21")).await.unwrap(), 0);

        circulation
            .return_book_on(issue.id, date("2026-08-22"))
            .await
            .unwrap();
        let member = members.get(member_id).await.unwrap().unwrap();
        assert_eq!(member.status, MemberStatus::Active);
    }

    #[tokio::test]
    async fn list_issues_filters_by_state_and_member() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let (book_id, member_id) = seed(&db).await;
        let circulation = Circulation::new(&db);

        let issue = circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap();
        assert_eq!(circulation.count_open().await.unwrap(), 1);

        let open = circulation.list_issues(Some(IssueState::Open), None).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].book_title, "The Count of Monte Cristo");
        assert_eq!(open[0].member_name, "Edmond Dantes");

        let mine = circulation.list_issues(None, Some(member_id)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(circulation
            .list_issues(None, Some(member_id + 1))
            .await
            .unwrap()
            .is_empty());

        circulation
            .return_book_on(issue.id, date("2026-08-10"))
            .await
            .unwrap();
        assert!(circulation
            .list_issues(Some(IssueState::Open), None)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            circulation
                .list_issues(Some(IssueState::Returned), None)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(circulation.count_open().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn open_loans_block_book_and_member_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let (book_id, member_id) = seed(&db).await;
        let circulation = Circulation::new(&db);
        let members = Members::new(db.connection());

        let issue = circulation
            .issue_book_on(book_id, member_id, date("2026-08-01"))
            .await
            .unwrap();

        let err = db.soft_delete_book(book_id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        let err = members.soft_delete(member_id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        circulation
            .return_book_on(issue.id, date("2026-08-02"))
            .await
            .unwrap();
        db.soft_delete_book(book_id).await.unwrap();
        members.soft_delete(member_id).await.unwrap();
    }

    #[tokio::test]
    async fn settings_update_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let circulation = Circulation::new(&db);

        let settings = circulation.settings().await.unwrap();
        assert_eq!(settings.fine_per_day, 1.0);
        assert_eq!(settings.loan_period_days, 14);
        assert_eq!(settings.max_books_per_member, 5);

        let updated = circulation
            .update_settings(UpdateSettings {
                fine_per_day: Some(0.5),
                loan_period_days: Some(21),
                max_books_per_member: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.fine_per_day, 0.5);
        assert_eq!(updated.loan_period_days, 21);

        let err = circulation
            .update_settings(UpdateSettings {
                fine_per_day: Some(-1.0),
                loan_period_days: None,
                max_books_per_member: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Invalid(_)));
    }
}
