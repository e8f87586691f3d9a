//! Mock authentication against the backend's user roster.
//!
//! The roster endpoint serves every user with its password material; the
//! console checks credentials locally and keeps the logged-in profile in
//! `session.json`. Password material never reaches the session or the
//! on-disk roster cache.

use crate::client::{ApiError, UserDirectory};
use crate::models::naval::{User, UserId, UserRecord, UserRole, UserUpdate};
use crate::notifications::short_id;
use crate::storage::{StateDir, StoreError};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use log::{info, warn};
use rand_core::OsRng;
use subtle::ConstantTimeEq;

pub const SESSION_FILE: &str = "session.json";
pub const ROSTER_FILE: &str = "roster.json";
const AVATAR_BASE: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    NotLoggedIn,
    Forbidden,
    UsernameTaken(String),
    Validation(String),
    Hash(String),
    Api(ApiError),
    Store(StoreError),
}

impl core::fmt::Display for AuthError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AuthError::InvalidCredentials => f.write_str("invalid username or password"),
            AuthError::NotLoggedIn => f.write_str("not logged in"),
            AuthError::Forbidden => f.write_str("administrator role required"),
            AuthError::UsernameTaken(name) => write!(f, "username '{}' already exists", name),
            AuthError::Validation(msg) => write!(f, "invalid input: {}", msg),
            AuthError::Hash(msg) => write!(f, "password hashing failed: {}", msg),
            AuthError::Api(e) => write!(f, "{}", e),
            AuthError::Store(e) => write!(f, "state file error: {}", e),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Api(e) => Some(e),
            AuthError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ApiError> for AuthError {
    fn from(value: ApiError) -> Self {
        AuthError::Api(value)
    }
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        AuthError::Store(value)
    }
}

/// Checks a presented password against what the roster stores.
pub trait CredentialVerifier {
    fn verify(&self, stored: &str, presented: &str) -> Result<bool, AuthError>;
}

/// Argon2 PHC strings are verified as hashes; anything else is a legacy
/// plaintext entry compared in constant time.
#[derive(Debug, Default, Clone, Copy)]
pub struct RosterVerifier;

impl CredentialVerifier for RosterVerifier {
    fn verify(&self, stored: &str, presented: &str) -> Result<bool, AuthError> {
        if stored.starts_with("$argon2") {
            let parsed = PasswordHash::new(stored).map_err(|e| AuthError::Hash(e.to_string()))?;
            return Ok(Argon2::default().verify_password(presented.as_bytes(), &parsed).is_ok());
        }
        Ok(stored.as_bytes().ct_eq(presented.as_bytes()).into())
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
}

pub struct AuthService<D, V = RosterVerifier> {
    directory: D,
    verifier: V,
    state: StateDir,
    // Last roster fetched in this process; login falls back to it.
    known: Vec<UserRecord>,
}

impl<D: UserDirectory> AuthService<D, RosterVerifier> {
    pub fn new(directory: D, state: StateDir) -> Self {
        AuthService::with_verifier(directory, RosterVerifier, state)
    }
}

impl<D: UserDirectory, V: CredentialVerifier> AuthService<D, V> {
    pub fn with_verifier(directory: D, verifier: V, state: StateDir) -> Self {
        AuthService {
            directory,
            verifier,
            state,
            known: Vec::new(),
        }
    }

    fn refresh_roster(&mut self) -> Result<&[UserRecord], AuthError> {
        match self.directory.list_users() {
            Ok(records) => {
                let public: Vec<User> = records.iter().map(|r| r.profile.clone()).collect();
                if let Err(e) = self.state.write(ROSTER_FILE, &public) {
                    warn!("Failed to cache user roster: {}", e);
                }
                self.known = records;
            }
            Err(e) if self.known.is_empty() => return Err(e.into()),
            Err(e) => warn!("Roster fetch failed, using last known roster: {}", e),
        }
        Ok(&self.known)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<User, AuthError> {
        let record = self
            .refresh_roster()?
            .iter()
            .find(|r| r.profile.username == username)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;
        let stored = record.password.as_deref().ok_or(AuthError::InvalidCredentials)?;
        if !self.verifier.verify(stored, password)? {
            return Err(AuthError::InvalidCredentials);
        }
        self.state.write(SESSION_FILE, &record.profile)?;
        info!("User {} logged in", record.profile.username);
        Ok(record.profile)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.state.remove(SESSION_FILE)?;
        Ok(())
    }

    pub fn current_user(&self) -> Result<Option<User>, AuthError> {
        Ok(self.state.read(SESSION_FILE)?)
    }

    fn require_user(&self) -> Result<User, AuthError> {
        self.current_user()?.ok_or(AuthError::NotLoggedIn)
    }

    fn require_admin(&self) -> Result<User, AuthError> {
        let user = self.require_user()?;
        if user.role != UserRole::Admin {
            return Err(AuthError::Forbidden);
        }
        Ok(user)
    }

    /// Registers a regular user and logs them in.
    pub fn signup(&mut self, request: SignupRequest) -> Result<User, AuthError> {
        for (field, value) in [
            ("username", &request.username),
            ("password", &request.password),
            ("name", &request.name),
            ("email", &request.email),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::Validation(format!("{} must not be empty", field)));
            }
        }
        let username = request.username.trim().to_string();
        let taken = self
            .refresh_roster()
            .map(|roster| roster.iter().any(|r| r.profile.username == username))
            .unwrap_or(false);
        if taken {
            return Err(AuthError::UsernameTaken(username));
        }

        let record = UserRecord {
            profile: User {
                id: UserId(short_id(9)),
                avatar: Some(format!("{}{}", AVATAR_BASE, username)),
                username: username.clone(),
                name: request.name.trim().to_string(),
                email: request.email.trim().to_string(),
                role: UserRole::User,
            },
            password: Some(hash_password(&request.password)?),
        };
        let created = match self.directory.create_user(&record) {
            Ok(created) => created,
            Err(e) if e.is_rejected() => return Err(AuthError::UsernameTaken(username)),
            Err(e) => return Err(e.into()),
        };
        self.known.push(created.clone());
        self.state.write(SESSION_FILE, &created.profile)?;
        info!("User {} signed up", created.profile.username);
        Ok(created.profile)
    }

    /// Updates the logged-in user's own profile. A new password is hashed
    /// before it leaves the process and never enters the session.
    pub fn update_profile(&mut self, mut update: UserUpdate) -> Result<User, AuthError> {
        let mut session = self.require_user()?;
        update.role = None;
        if let Some(password) = update.password.take() {
            if password.trim().is_empty() {
                return Err(AuthError::Validation("password must not be empty".into()));
            }
            update.password = Some(hash_password(&password)?);
        }
        let saved = self.directory.update_user(&session.id, &update)?;
        update.apply_to(&mut session);
        session.id = saved.profile.id;
        self.state.write(SESSION_FILE, &session)?;
        Ok(session)
    }

    pub fn promote(&mut self, user_id: &UserId, role: UserRole) -> Result<User, AuthError> {
        let admin = self.require_admin()?;
        let update = UserUpdate {
            role: Some(role),
            ..UserUpdate::default()
        };
        let saved = self.directory.update_user(user_id, &update)?;
        if admin.id == *user_id {
            self.state.write(SESSION_FILE, &saved.profile)?;
        }
        info!("User {} role set to {}", saved.profile.username, role);
        Ok(saved.profile)
    }

    /// Returns true when the deleted user was the session's own and the
    /// session was closed.
    pub fn delete(&mut self, user_id: &UserId) -> Result<bool, AuthError> {
        let admin = self.require_admin()?;
        self.directory.delete_user(user_id)?;
        self.known.retain(|r| r.profile.id != *user_id);
        if admin.id == *user_id {
            self.logout()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Roster without password material; served from the cache file when the
    /// backend cannot be reached.
    pub fn users(&mut self) -> Result<Vec<User>, AuthError> {
        match self.directory.list_users() {
            Ok(records) => {
                let public: Vec<User> = records.iter().map(|r| r.profile.clone()).collect();
                self.state.write(ROSTER_FILE, &public)?;
                self.known = records;
                Ok(public)
            }
            Err(e) => match self.state.read::<Vec<User>>(ROSTER_FILE)? {
                Some(cached) => {
                    warn!("Roster fetch failed, showing cached roster: {}", e);
                    Ok(cached)
                }
                None => Err(e.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    struct FakeDirectory {
        records: RefCell<Vec<UserRecord>>,
        offline: Cell<bool>,
    }

    impl FakeDirectory {
        fn seeded() -> Self {
            let json = std::fs::read_to_string("tests/data/users.json").expect("fixture present");
            FakeDirectory {
                records: RefCell::new(serde_json::from_str(&json).unwrap()),
                offline: Cell::new(false),
            }
        }

        fn check(&self) -> Result<(), ApiError> {
            if self.offline.get() {
                return Err(ApiError::Transport("connection refused".into()));
            }
            Ok(())
        }
    }

    impl UserDirectory for &FakeDirectory {
        fn list_users(&self) -> Result<Vec<UserRecord>, ApiError> {
            self.check()?;
            Ok(self.records.borrow().clone())
        }

        fn create_user(&self, record: &UserRecord) -> Result<UserRecord, ApiError> {
            self.check()?;
            self.records.borrow_mut().push(record.clone());
            Ok(record.clone())
        }

        fn update_user(&self, user_id: &UserId, update: &UserUpdate) -> Result<UserRecord, ApiError> {
            self.check()?;
            let mut records = self.records.borrow_mut();
            let record = records
                .iter_mut()
                .find(|r| r.profile.id == *user_id)
                .ok_or(ApiError::Http {
                    status: 404,
                    message: "Usuario no encontrado".into(),
                })?;
            update.apply_to(&mut record.profile);
            if let Some(p) = &update.password {
                record.password = Some(p.clone());
            }
            Ok(record.clone())
        }

        fn delete_user(&self, user_id: &UserId) -> Result<(), ApiError> {
            self.check()?;
            self.records.borrow_mut().retain(|r| r.profile.id != *user_id);
            Ok(())
        }
    }

    fn service<'a>(dir: &'a FakeDirectory, state: &tempfile::TempDir) -> AuthService<&'a FakeDirectory> {
        AuthService::new(dir, StateDir::new(state.path()))
    }

    #[test]
    fn seeded_admin_logs_in_and_mismatches_fail() {
        let dir = FakeDirectory::seeded();
        let tmp = tempfile::tempdir().unwrap();
        let mut auth = service(&dir, &tmp);

        assert!(matches!(auth.login("admin", "wrong"), Err(AuthError::InvalidCredentials)));
        assert!(matches!(auth.login("ghost", "password123"), Err(AuthError::InvalidCredentials)));
        assert!(matches!(auth.login("Admin", "password123"), Err(AuthError::InvalidCredentials)));
        assert_eq!(auth.current_user().unwrap(), None);

        let user = auth.login("admin", "password123").unwrap();
        assert_eq!(user.role, UserRole::Admin);
        assert_eq!(auth.current_user().unwrap(), Some(user));
        let raw = std::fs::read_to_string(tmp.path().join(SESSION_FILE)).unwrap();
        assert!(!raw.contains("password"));

        auth.logout().unwrap();
        assert_eq!(auth.current_user().unwrap(), None);
    }

    #[test]
    fn login_falls_back_to_last_known_roster() {
        let dir = FakeDirectory::seeded();
        let tmp = tempfile::tempdir().unwrap();
        let mut auth = service(&dir, &tmp);

        dir.offline.set(true);
        assert!(matches!(auth.login("admin", "password123"), Err(AuthError::Api(_))));

        dir.offline.set(false);
        auth.users().unwrap();
        dir.offline.set(true);
        assert_eq!(auth.login("operator1", "password123").unwrap().username, "operator1");
    }

    #[test]
    fn signup_hashes_password_and_rejects_duplicates() {
        let dir = FakeDirectory::seeded();
        let tmp = tempfile::tempdir().unwrap();
        let mut auth = service(&dir, &tmp);
        let request = SignupRequest {
            username: "helm".into(),
            password: "s3cret".into(),
            name: "Timonel".into(),
            email: "helm@navalsec.com".into(),
        };

        let user = auth.signup(request.clone()).unwrap();
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.id.0.len(), 9);
        assert_eq!(user.avatar.as_deref(), Some("https://api.dicebear.com/7.x/avataaars/svg?seed=helm"));
        assert_eq!(auth.current_user().unwrap(), Some(user));

        let stored = dir.records.borrow().last().and_then(|r| r.password.clone()).unwrap();
        assert!(stored.starts_with("$argon2"));
        assert!(auth.login("helm", "s3cret").is_ok());
        assert!(matches!(auth.signup(request), Err(AuthError::UsernameTaken(_))));
    }

    #[test]
    fn verifier_handles_hashes_and_plaintext() {
        let hash = hash_password("password123").unwrap();
        let v = RosterVerifier;
        assert!(v.verify(&hash, "password123").unwrap());
        assert!(!v.verify(&hash, "password124").unwrap());
        assert!(v.verify("password123", "password123").unwrap());
        assert!(!v.verify("password123", "password12").unwrap());
    }

    #[test]
    fn profile_update_keeps_password_out_of_session() {
        let dir = FakeDirectory::seeded();
        let tmp = tempfile::tempdir().unwrap();
        let mut auth = service(&dir, &tmp);
        auth.login("operator1", "password123").unwrap();

        let update = UserUpdate {
            name: Some("Jefe de Cubierta".into()),
            password: Some("newpass".into()),
            role: Some(UserRole::Admin),
            ..UserUpdate::default()
        };
        let user = auth.update_profile(update).unwrap();
        assert_eq!(user.name, "Jefe de Cubierta");
        assert_eq!(user.role, UserRole::User);
        let raw = std::fs::read_to_string(tmp.path().join(SESSION_FILE)).unwrap();
        assert!(!raw.contains("newpass") && !raw.contains("argon2"));
        assert!(auth.login("operator1", "newpass").is_ok());
    }

    #[test]
    fn admin_operations_require_admin_and_self_delete_logs_out() {
        let dir = FakeDirectory::seeded();
        let tmp = tempfile::tempdir().unwrap();
        let mut auth = service(&dir, &tmp);

        assert!(matches!(auth.delete(&UserId("2".into())), Err(AuthError::NotLoggedIn)));
        auth.login("operator1", "password123").unwrap();
        assert!(matches!(
            auth.promote(&UserId("3".into()), UserRole::Admin),
            Err(AuthError::Forbidden)
        ));

        auth.login("admin", "password123").unwrap();
        let promoted = auth.promote(&UserId("3".into()), UserRole::Admin).unwrap();
        assert_eq!(promoted.role, UserRole::Admin);
        assert!(!auth.delete(&UserId("2".into())).unwrap());
        assert!(auth.delete(&UserId("1".into())).unwrap());
        assert_eq!(auth.current_user().unwrap(), None);
        assert_eq!(dir.records.borrow().len(), 1);
    }

    #[test]
    fn users_served_from_cache_when_offline() {
        let dir = FakeDirectory::seeded();
        let tmp = tempfile::tempdir().unwrap();
        let mut auth = service(&dir, &tmp);

        dir.offline.set(true);
        assert!(auth.users().is_err());
        dir.offline.set(false);
        assert_eq!(auth.users().unwrap().len(), 3);
        dir.offline.set(true);
        let cached = auth.users().unwrap();
        assert_eq!(cached.len(), 3);
        let raw = std::fs::read_to_string(tmp.path().join(ROSTER_FILE)).unwrap();
        assert!(!raw.contains("password123"));
    }
}
