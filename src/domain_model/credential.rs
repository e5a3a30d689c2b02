use super::{Role, SubjectId};
use chrono::NaiveDate;

/// A user record as held by the credential store.
///
/// `password` is whatever the store keeps (plaintext or a PHC hash, depending
/// on the configured scheme). It is opaque to everything but the hasher.
#[derive(Clone)]
pub struct Credential {
    pub id: SubjectId,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub nick: String,
    pub birthday: Option<NaiveDate>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("nick", &self.nick)
            .field("birthday", &self.birthday)
            .finish()
    }
}

/// Registration input; the store assigns nothing, the id is chosen up front.
#[derive(Clone)]
pub struct NewCredential {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub nick: String,
    pub birthday: Option<NaiveDate>,
}

impl std::fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewCredential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("nick", &self.nick)
            .field("birthday", &self.birthday)
            .finish()
    }
}

impl NewCredential {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err("email is not valid");
        }
        if self.password.is_empty() {
            return Err("password must not be empty");
        }
        if self.nick.trim().is_empty() {
            return Err("nick must not be empty");
        }
        Ok(())
    }

    pub fn into_credential(self, id: SubjectId, stored_password: String) -> Credential {
        Credential {
            id,
            email: self.email,
            password: stored_password,
            role: self.role,
            nick: self.nick,
            birthday: self.birthday,
        }
    }
}
