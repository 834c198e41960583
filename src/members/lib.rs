use libsql::Connection;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::handler::HandlerParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
    Suspended,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
            MemberStatus::Suspended => "suspended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(MemberStatus::Active),
            "inactive" => Some(MemberStatus::Inactive),
            "suspended" => Some(MemberStatus::Suspended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: MemberStatus,
    pub open_loans: i32,
    pub joined_at: String,
    pub updated_at: String,
}

/// Compact shape returned by the autocomplete endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberHit {
    pub id: i32,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMember {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMember {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

const MEMBER_COLUMNS: &str = r#"
    members.id,
    members.name,
    members.email,
    members.phone,
    members.address,
    members.status,
    members.joined_at,
    members.updated_at,
    (SELECT COUNT(*) FROM issues WHERE issues.member_id = members.id AND issues.return_date IS NULL)
"#;

pub struct Members<'a> {
    conn: &'a Connection,
}

impl<'a> Members<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn register(&self, input: CreateMember) -> Result<Member, DomainError> {
        let name = input.name.trim();
        let email = input.email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(DomainError::Invalid("name and email are required".into()));
        }
        if !email.contains('@') {
            return Err(DomainError::Invalid("email is not valid".into()));
        }

        let query = "INSERT INTO members (name, email, phone, address) VALUES (?, ?, ?, ?) RETURNING id";

        let mut rows = match self
            .conn
            .query(query, libsql::params![name, email, input.phone, input.address])
            .await
        {
            Ok(rows) => rows,
            Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
                return Err(DomainError::Conflict(format!(
                    "a member with email {} already exists",
                    email
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let id: i32 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            return Err(DomainError::Internal(anyhow::anyhow!("failed to register member")));
        };

        self.get(id)
            .await?
            .ok_or_else(|| DomainError::Internal(anyhow::anyhow!("registered member vanished")))
    }

    pub async fn get(&self, id: i32) -> Result<Option<Member>, DomainError> {
        let query = format!(
            "SELECT {} FROM members WHERE members.id = ? AND members.deleted_at IS NULL",
            MEMBER_COLUMNS
        );
        let mut rows = self.conn.query(&query, libsql::params![id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_member(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn list(&self, params: HandlerParams) -> Result<Vec<Member>, DomainError> {
        let mut members = Vec::new();

        if let Some(q) = &params.q {
            let query = format!(
                r#"SELECT {} FROM members
WHERE members.deleted_at IS NULL
  AND (members.name LIKE ? OR members.email LIKE ? OR members.phone LIKE ?)
ORDER BY members.id
LIMIT ? OFFSET ?"#,
                MEMBER_COLUMNS
            );
            let pattern = format!("%{}%", q);
            let mut rows = self
                .conn
                .query(
                    &query,
                    libsql::params![
                        pattern.clone(),
                        pattern.clone(),
                        pattern,
                        params.limit as i32,
                        params.offset as i32
                    ],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                members.push(Self::row_to_member(&row)?);
            }
        } else {
            let query = format!(
                "SELECT {} FROM members WHERE members.deleted_at IS NULL ORDER BY members.id LIMIT ? OFFSET ?",
                MEMBER_COLUMNS
            );
            let mut rows = self
                .conn
                .query(&query, libsql::params![params.limit as i32, params.offset as i32])
                .await?;
            while let Some(row) = rows.next().await? {
                members.push(Self::row_to_member(&row)?);
            }
        }

        Ok(members)
    }

    pub async fn search(&self, q: &str, limit: i32) -> Result<Vec<MemberHit>, DomainError> {
        let query = r#"
SELECT id, name, email
FROM members
WHERE deleted_at IS NULL AND (name LIKE ? OR email LIKE ?)
ORDER BY name
LIMIT ?
"#;
        let pattern = format!("%{}%", q);
        let mut rows = self
            .conn
            .query(query, libsql::params![pattern.clone(), pattern, limit])
            .await?;

        let mut hits = vec![];
        while let Some(row) = rows.next().await? {
            hits.push(MemberHit {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
            });
        }
        Ok(hits)
    }

    pub async fn count(&self) -> Result<i32, DomainError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM members WHERE deleted_at IS NULL", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    pub async fn update(&self, id: i32, input: UpdateMember) -> Result<Option<Member>, DomainError> {
        if self.get(id).await?.is_none() {
            return Ok(None);
        }

        let mut updates = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(name) = &input.name {
            if name.trim().is_empty() {
                return Err(DomainError::Invalid("name cannot be blank".into()));
            }
            updates.push("name = ?");
            params.push(name.trim().to_string().into());
        }
        if let Some(email) = &input.email {
            if !email.contains('@') {
                return Err(DomainError::Invalid("email is not valid".into()));
            }
            updates.push("email = ?");
            params.push(email.trim().to_string().into());
        }
        if let Some(phone) = &input.phone {
            updates.push("phone = ?");
            params.push(phone.clone().into());
        }
        if let Some(address) = &input.address {
            updates.push("address = ?");
            params.push(address.clone().into());
        }

        if updates.is_empty() {
            return self.get(id).await;
        }

        updates.push("updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')");
        params.push(id.into());

        let query = format!("UPDATE members SET {} WHERE id = ?", updates.join(", "));

        if let Err(e) = self.conn.execute(&query, params).await {
            if e.to_string().contains("UNIQUE constraint failed") {
                return Err(DomainError::Conflict("a member with this email already exists".into()));
            }
            return Err(e.into());
        }
        self.get(id).await
    }

    pub async fn set_status(&self, id: i32, status: MemberStatus) -> Result<Option<Member>, DomainError> {
        if self.get(id).await?.is_none() {
            return Ok(None);
        }

        self.conn
            .execute(
                "UPDATE members SET status = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
                libsql::params![status.as_str(), id],
            )
            .await?;
        self.get(id).await
    }

    pub async fn soft_delete(&self, id: i32) -> Result<(), DomainError> {
        let member = match self.get(id).await? {
            Some(member) => member,
            None => return Err(DomainError::NotFound("member")),
        };

        if member.open_loans > 0 {
            return Err(DomainError::Conflict(format!(
                "member has {} open loan(s) and cannot be deleted",
                member.open_loans
            )));
        }

        self.conn
            .execute(
                "UPDATE members SET deleted_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
                libsql::params![id],
            )
            .await?;
        Ok(())
    }

    fn row_to_member(row: &libsql::Row) -> Result<Member, DomainError> {
        let status_str: String = row.get(5)?;
        let status = MemberStatus::from_str(&status_str)
            .ok_or_else(|| DomainError::Internal(anyhow::anyhow!("invalid member status: {}", status_str)))?;

        Ok(Member {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            address: row.get(4)?,
            status,
            joined_at: row.get(6)?,
            updated_at: row.get(7)?,
            open_loans: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::test_db;
    use crate::handler::HandlerParams;

    fn params(q: Option<&str>) -> HandlerParams {
        HandlerParams {
            q: q.map(|s| s.to_string()),
            page: 1,
            limit: 50,
            offset: 0,
        }
    }

    pub(crate) fn sample_member(email: &str) -> CreateMember {
        CreateMember {
            name: "Edmond Dantes".to_string(),
            email: email.to_string(),
            phone: Some("555-0123".to_string()),
            address: Some("Chateau d'If".to_string()),
        }
    }

    #[tokio::test]
    async fn register_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let members = Members::new(db.connection());

        let member = members.register(sample_member("edmond@example.com")).await.unwrap();
        assert_eq!(member.status, MemberStatus::Active);
        assert_eq!(member.open_loans, 0);

        let fetched = members.get(member.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "edmond@example.com");
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let members = Members::new(db.connection());

        members.register(sample_member("e@example.com")).await.unwrap();
        let err = members.register(sample_member("e@example.com")).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let members = Members::new(db.connection());

        let mut input = sample_member("not-an-email");
        input.email = "not-an-email".to_string();
        let err = members.register(input).await.unwrap_err();
        assert!(matches!(err, DomainError::Invalid(_)));
    }

    #[tokio::test]
    async fn list_searches_name_and_email() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let members = Members::new(db.connection());

        members.register(sample_member("edmond@example.com")).await.unwrap();
        members
            .register(CreateMember {
                name: "Mercedes Herrera".to_string(),
                email: "mercedes@example.com".to_string(),
                phone: None,
                address: None,
            })
            .await
            .unwrap();

        let hits = members.list(params(Some("Dantes"))).await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits = members.list(params(Some("example.com"))).await.unwrap();
        assert_eq!(hits.len(), 2);
        let hits = members.search("merc", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Mercedes Herrera");
    }

    #[tokio::test]
    async fn status_transitions_and_soft_delete() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let members = Members::new(db.connection());

        let member = members.register(sample_member("edmond@example.com")).await.unwrap();

        let suspended = members
            .set_status(member.id, MemberStatus::Suspended)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(suspended.status, MemberStatus::Suspended);

        members.soft_delete(member.id).await.unwrap();
        assert!(members.get(member.id).await.unwrap().is_none());
        assert_eq!(members.count().await.unwrap(), 0);

        let err = members.soft_delete(member.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_changes_profile_fields() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(dir.path()).await;
        let members = Members::new(db.connection());

        let member = members.register(sample_member("edmond@example.com")).await.unwrap();
        let updated = members
            .update(
                member.id,
                UpdateMember {
                    name: Some("Count of Monte Cristo".to_string()),
                    email: None,
                    phone: None,
                    address: Some("Paris".to_string()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Count of Monte Cristo");
        assert_eq!(updated.address.as_deref(), Some("Paris"));
        assert_eq!(updated.email, "edmond@example.com");
    }
}
