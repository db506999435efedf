use super::error::{EntityApiErrorKind, Error};
use async_trait::async_trait;
use entity::users::Model;
use entity::Id;
use log::*;
use serde::Deserialize;
use utoipa::ToSchema;

/// Fields required to create a user. `password` is plain text and is hashed on insert.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Clone, Deserialize, ToSchema)]
#[schema(as = user::Credentials)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

// Hand-written so the password never reaches a log line.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new user. Fails with `RecordAlreadyExists` if the email or username is taken.
    async fn create_user(&self, new_user: NewUser) -> Result<Model, Error>;

    async fn find_user_by_id(&self, id: &Id) -> Result<Option<Model>, Error>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Model>, Error>;

    /// Activates or deactivates an account.
    async fn set_user_active(&self, id: &Id, is_active: bool) -> Result<Model, Error>;
}

/// Looks up the user for `creds` and checks the password against the stored hash.
///
/// Returns `Ok(None)` for an unknown email and `RecordUnauthenticated` for a wrong
/// password, mirroring how the rest of the layer separates "absent" from "refused".
pub async fn authenticate<D>(db: &D, creds: &Credentials) -> Result<Option<Model>, Error>
where
    D: UserRepository + ?Sized,
{
    match db.find_user_by_email(&creds.email).await? {
        Some(user) => {
            verify_password(&creds.password, &user.password)?;
            Ok(Some(user))
        }
        None => {
            debug!("No user registered for email {}", creds.email);
            Ok(None)
        }
    }
}

pub fn verify_password(password_to_verify: &str, password_hash: &str) -> Result<(), Error> {
    match password_auth::verify_password(password_to_verify, password_hash) {
        Ok(_) => Ok(()),
        Err(_) => Err(Error::new(EntityApiErrorKind::RecordUnauthenticated)),
    }
}

pub fn generate_hash(password: String) -> String {
    password_auth::generate_hash(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;

    fn new_user() -> NewUser {
        NewUser {
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            password: "Wonderland1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_authenticate_accepts_correct_password() {
        let db = MemoryDatabase::new();
        let created = db.create_user(new_user()).await.unwrap();

        let creds = Credentials {
            email: "alice@example.com".to_string(),
            password: "Wonderland1".to_string(),
        };

        let user = authenticate(&db, &creds).await.unwrap();
        assert_eq!(user.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_wrong_password() {
        let db = MemoryDatabase::new();
        db.create_user(new_user()).await.unwrap();

        let creds = Credentials {
            email: "alice@example.com".to_string(),
            password: "wrong".to_string(),
        };

        let err = authenticate(&db, &creds).await.unwrap_err();
        assert_eq!(err.error_kind, EntityApiErrorKind::RecordUnauthenticated);
    }

    #[tokio::test]
    async fn test_authenticate_unknown_email_is_absent() {
        let db = MemoryDatabase::new();
        let creds = Credentials {
            email: "nobody@example.com".to_string(),
            password: "Wonderland1".to_string(),
        };

        assert!(authenticate(&db, &creds).await.unwrap().is_none());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            email: "alice@example.com".to_string(),
            password: "Wonderland1".to_string(),
        };

        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("Wonderland1"));
    }
}
