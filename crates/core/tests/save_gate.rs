//! End-to-end behavior of `Elegant::save` with the provider-booted factory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::{json, Value};

use reinforce_core::types::Attributes;
use reinforce_core::validation::presence::{Exclusion, PresenceVerifier};
use reinforce_core::validation::RuleTable;
use reinforce_core::{
    CoreError, Elegant, Model, Persister, ReinforceServiceProvider, SaveError, SaveOptions,
};

struct User;

impl Model for User {
    const NAME: &'static str = "User";
    const TABLE: &'static str = "users";

    fn rules() -> RuleTable {
        RuleTable::new()
            .with("email", "required|email|unique:users")
            .with("role", "required|ini:admin,user")
    }
}

/// Emails already stored, plus a log of every lookup.
#[derive(Debug, Default)]
struct TakenEmails {
    taken: Vec<String>,
    lookups: Mutex<Vec<String>>,
}

#[async_trait]
impl PresenceVerifier for TakenEmails {
    async fn count(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        _exclude: Option<&Exclusion>,
    ) -> Result<u64, CoreError> {
        self.lookups
            .lock()
            .map_err(|e| CoreError::Internal(e.to_string()))?
            .push(format!("{table}.{column}"));
        let value = value.as_str().unwrap_or_default();
        Ok(self.taken.iter().filter(|t| t.as_str() == value).count() as u64)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("write rejected")]
struct WriteRejected;

#[derive(Default)]
struct Memory {
    writes: AtomicUsize,
}

#[async_trait]
impl Persister for Memory {
    type Error = WriteRejected;

    async fn save<M: Model>(
        &self,
        entity: &mut Elegant<M>,
        _options: SaveOptions,
    ) -> Result<bool, WriteRejected> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) as i64;
        if !entity.exists() {
            entity.set(M::PRIMARY_KEY, n + 1);
        }
        Ok(true)
    }
}

fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().unwrap_or_default()
}

fn setup(taken: &[&str]) -> (reinforce_core::validation::ValidatorFactory, Arc<TakenEmails>) {
    let verifier = Arc::new(TakenEmails {
        taken: taken.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    let mut factory = ReinforceServiceProvider::new().factory();
    factory.set_presence_verifier(verifier.clone());
    (factory, verifier)
}

#[tokio::test]
async fn new_user_is_checked_for_uniqueness() {
    let (factory, verifier) = setup(&["taken@example.com"]);
    let persister = Memory::default();

    let mut user = Elegant::<User>::new();
    user.fill(attrs(json!({"email": "taken@example.com", "role": "Admin"})));

    let err = user
        .save(&factory, &persister, SaveOptions::default())
        .await
        .unwrap_err();

    let SaveError::Validation(failed) = err else {
        panic!("expected a validation failure");
    };
    assert_eq!(failed.errors().len(), 1);
    assert_eq!(failed.errors()[0].field, "email");
    assert_eq!(failed.errors()[0].rule, "unique");
    assert_eq!(verifier.lookups.lock().unwrap().as_slice(), ["users.email"]);
    assert_eq!(persister.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn clean_email_skips_unique_lookup() {
    let (factory, verifier) = setup(&["ada@example.com"]);
    let persister = Memory::default();

    // Stored record whose own email would collide with itself.
    let mut user = Elegant::<User>::retrieved(attrs(json!({
        "id": 1,
        "email": "ada@example.com",
        "role": "admin"
    })));
    user.set("role", "USER");

    let saved = user
        .save(&factory, &persister, SaveOptions::default())
        .await
        .unwrap();

    assert!(saved);
    assert!(verifier.lookups.lock().unwrap().is_empty());
    assert!(user.get_dirty(false).is_empty());
}

#[tokio::test]
async fn changed_email_is_checked_again() {
    let (factory, verifier) = setup(&["grace@example.com"]);
    let persister = Memory::default();

    let mut user = Elegant::<User>::retrieved(attrs(json!({
        "id": 1,
        "email": "ada@example.com",
        "role": "admin"
    })));
    user.set("email", "grace@example.com");

    let err = user
        .save(&factory, &persister, SaveOptions::default())
        .await
        .unwrap_err();

    assert_matches!(err, SaveError::Validation(_));
    assert_eq!(verifier.lookups.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn ini_rejects_values_outside_the_list() {
    let (factory, _) = setup(&[]);
    let persister = Memory::default();

    let mut user = Elegant::<User>::new();
    user.fill(attrs(json!({"email": "new@example.com", "role": "guest"})));

    let err = user
        .save(&factory, &persister, SaveOptions::default())
        .await
        .unwrap_err();

    let SaveError::Validation(failed) = err else {
        panic!("expected a validation failure");
    };
    assert_eq!(failed.to_string(), "User failed to validate");
    assert_eq!(failed.errors()[0].rule, "ini");
    assert_eq!(failed.errors()[0].message, "The selected role is invalid.");
}

#[tokio::test]
async fn successful_insert_marks_record_existing() {
    let (factory, _) = setup(&[]);
    let persister = Memory::default();

    let mut user = Elegant::<User>::new();
    user.fill(attrs(json!({"email": "new@example.com", "role": "ADMIN"})));

    assert!(user
        .save(&factory, &persister, SaveOptions::default())
        .await
        .unwrap());
    assert!(user.exists());
    assert_eq!(user.key(), Some(1));
    assert_eq!(user.original(), user.attributes());
}
