use super::util::{is_dup_key, store_error};
use crate::domain_model::*;
use crate::domain_port::{CredentialStore, CredentialStoreError};
use chrono::NaiveDate;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

/// Credentials in the `users` table shared with the user service.
/// See `schema/users.sql`.
pub struct MySqlCredentialStore {
    pool: MySqlPool,
}

impl MySqlCredentialStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlCredentialStore { pool }
    }

    #[inline]
    fn id_as_bytes(id: &SubjectId) -> &[u8] {
        id.0.as_bytes()
    }

    fn row_to_credential(row: MySqlRow) -> Result<Credential, CredentialStoreError> {
        let id_bytes: Vec<u8> = row.try_get("id").map_err(|e| store_error("decode id", e))?;
        let id = SubjectId(Uuid::from_slice(&id_bytes).map_err(|e| store_error("decode id", e))?);

        let role: String = row.try_get("role").map_err(|e| store_error("decode role", e))?;
        let role: Role = role.parse().map_err(|e| store_error("decode role", e))?;

        let birthday: Option<NaiveDate> = row
            .try_get("birthday")
            .map_err(|e| store_error("decode birthday", e))?;

        Ok(Credential {
            id,
            email: row.try_get("email").map_err(|e| store_error("decode email", e))?,
            password: row
                .try_get("password")
                .map_err(|e| store_error("decode password", e))?,
            role,
            nick: row.try_get("nick").map_err(|e| store_error("decode nick", e))?,
            birthday,
        })
    }
}

#[async_trait::async_trait]
impl CredentialStore for MySqlCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Credential, CredentialStoreError> {
        let row: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, email, password, role, nick, birthday
FROM users
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("query by email", e))?;

        row.map(Self::row_to_credential)
            .transpose()?
            .ok_or(CredentialStoreError::NotFound)
    }

    async fn find_by_id(&self, id: SubjectId) -> Result<Credential, CredentialStoreError> {
        let row: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, email, password, role, nick, birthday
FROM users
WHERE id = ?
"#,
        )
        .bind(Self::id_as_bytes(&id))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("query by id", e))?;

        row.map(Self::row_to_credential)
            .transpose()?
            .ok_or(CredentialStoreError::NotFound)
    }

    async fn exists(&self, email: &str) -> Result<bool, CredentialStoreError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?) AS present")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("query exists", e))?;

        let present: i64 = row
            .try_get("present")
            .map_err(|e| store_error("decode exists", e))?;
        Ok(present != 0)
    }

    async fn create(&self, credential: Credential) -> Result<SubjectId, CredentialStoreError> {
        let res = sqlx::query(
            r#"
INSERT INTO users (id, email, password, role, nick, birthday)
VALUES (?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(Self::id_as_bytes(&credential.id))
        .bind(&credential.email)
        .bind(&credential.password)
        .bind(credential.role.as_str())
        .bind(&credential.nick)
        .bind(credential.birthday)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(credential.id),
            Err(e) if is_dup_key(&e) => Err(CredentialStoreError::AlreadyExists),
            Err(e) => Err(store_error("insert user", e)),
        }
    }
}
