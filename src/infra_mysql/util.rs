use sqlx::mysql::MySqlDatabaseError;

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == 1062; // ER_DUP_ENTRY
        }
    }

    false
}

pub fn store_error(context: &str, err: impl std::fmt::Display) -> crate::domain_port::CredentialStoreError {
    crate::domain_port::CredentialStoreError::Unavailable(format!("{context}: {err}"))
}
