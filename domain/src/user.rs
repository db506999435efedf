use crate::{error::Error, users, Database, Id};
use entity_api::UserRepository;

pub use entity_api::user::{Credentials, NewUser};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

/// Validates and inserts a new account. Duplicate emails or usernames are a conflict.
pub async fn create(db: &dyn Database, new_user: NewUser) -> Result<users::Model, Error> {
    let new_user = validate(new_user)?;
    Ok(db.create_user(new_user).await?)
}

pub async fn find_by_id(db: &dyn Database, id: &Id) -> Result<users::Model, Error> {
    db.find_user_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("User not found"))
}

pub async fn find_by_email(db: &dyn Database, email: &str) -> Result<Option<users::Model>, Error> {
    Ok(db.find_user_by_email(email).await?)
}

/// Deactivated accounts can no longer log in, refresh or call protected endpoints.
pub async fn set_active(db: &dyn Database, id: &Id, is_active: bool) -> Result<users::Model, Error> {
    Ok(db.set_user_active(id, is_active).await?)
}

fn validate(new_user: NewUser) -> Result<NewUser, Error> {
    let email = new_user.email.trim().to_string();
    if !email.contains('@') {
        return Err(Error::invalid("Invalid email address"));
    }

    let username = new_user.username.trim().to_string();
    if username.chars().count() < MIN_USERNAME_LEN
        || !username.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(Error::invalid(format!(
            "Username must be at least {MIN_USERNAME_LEN} alphanumeric characters"
        )));
    }

    let first_name = new_user.first_name.trim().to_string();
    let last_name = new_user.last_name.trim().to_string();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(Error::invalid("First and last name are required"));
    }

    let password = new_user.password;
    if password.chars().count() < MIN_PASSWORD_LEN
        || !password.chars().any(|c| c.is_uppercase())
        || !password.chars().any(|c| c.is_lowercase())
        || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err(Error::invalid(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters with an uppercase letter, a lowercase letter and a digit"
        )));
    }

    Ok(NewUser {
        email,
        username,
        first_name,
        last_name,
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, EntityErrorKind, InternalErrorKind};
    use entity_api::MemoryDatabase;

    fn new_user() -> NewUser {
        NewUser {
            email: "bob@example.com".to_string(),
            username: "bob42".to_string(),
            first_name: "Bob".to_string(),
            last_name: "Builder".to_string(),
            password: "CanWeFix1".to_string(),
        }
    }

    fn entity_kind(err: Error) -> EntityErrorKind {
        match err.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Entity(kind)) => kind,
            other => panic!("expected an entity error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_hashes_password() {
        let db = MemoryDatabase::new();
        let user = create(&db, new_user()).await.unwrap();

        assert_ne!(user.password, "CanWeFix1");
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let db = MemoryDatabase::new();
        create(&db, new_user()).await.unwrap();

        let err = create(&db, new_user()).await.unwrap_err();
        assert_eq!(entity_kind(err), EntityErrorKind::Conflict);
    }

    #[test]
    fn test_validation_rules() {
        let invalid = [
            NewUser {
                email: "no-at-sign".to_string(),
                ..new_user()
            },
            NewUser {
                username: "bo".to_string(),
                ..new_user()
            },
            NewUser {
                username: "bob_42".to_string(),
                ..new_user()
            },
            NewUser {
                first_name: "  ".to_string(),
                ..new_user()
            },
            NewUser {
                password: "Short1".to_string(),
                ..new_user()
            },
            NewUser {
                password: "alllowercase1".to_string(),
                ..new_user()
            },
            NewUser {
                password: "NoDigitsHere".to_string(),
                ..new_user()
            },
        ];

        for user in invalid {
            let err = validate(user).unwrap_err();
            assert_eq!(entity_kind(err), EntityErrorKind::Invalid);
        }

        assert!(validate(new_user()).is_ok());
    }

    #[tokio::test]
    async fn test_find_by_id_missing_is_not_found() {
        let db = MemoryDatabase::new();
        let err = find_by_id(&db, &"missing".to_string()).await.unwrap_err();
        assert_eq!(entity_kind(err), EntityErrorKind::NotFound);
    }
}
