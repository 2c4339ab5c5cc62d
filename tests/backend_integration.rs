//! Integration tests against a live identity backend
//!
//! These tests talk to a real identity-toolkit endpoint and require:
//! 1. A project with email/password authentication enabled
//! 2. Environment variables set in a .env file
//! 3. Run with: cargo test --features integration-tests -- --test-threads=1

#![cfg(feature = "integration-tests")]

use authkit::backend::rest::RestIdentityBackend;
use authkit::backend::{Credential, IdentityBackend};
use std::env;

/// Load environment variables from .env file
fn load_env() {
    dotenvy::dotenv().ok();
}

fn get_test_config() -> (String, String, String) {
    load_env();

    let api_key = env::var("AUTHKIT_API_KEY").expect("AUTHKIT_API_KEY must be set in .env file");
    let email = env::var("TEST_USER_EMAIL").expect("TEST_USER_EMAIL must be set in .env file");
    let password =
        env::var("TEST_USER_PASSWORD").expect("TEST_USER_PASSWORD must be set in .env file");

    (api_key, email, password)
}

/// Test: authenticate with email and password
#[tokio::test]
async fn test_authenticate_with_password() {
    let (api_key, email, password) = get_test_config();

    let backend = RestIdentityBackend::new(&api_key).expect("backend");
    let user = backend
        .authenticate(Credential::EmailPassword {
            email: email.clone(),
            password,
        })
        .await
        .expect("authenticate");

    assert!(!user.uid.is_empty());
    assert_eq!(user.email.as_deref(), Some(email.as_str()));
    assert!(backend.current_user().await.is_some());

    backend.sign_out().await;
    assert!(backend.current_user().await.is_none());
}

/// Test: create account, re-authenticate, update password, delete
#[tokio::test]
async fn test_account_lifecycle() {
    let (api_key, _, _) = get_test_config();

    let backend = RestIdentityBackend::new(&api_key).expect("backend");

    // Unique email for this run
    let stamp = chrono::Utc::now().timestamp();
    let test_email = format!("authkit-test+{}@example.com", stamp);
    let test_password = "TempPassword123!";

    let created = backend
        .create_account(&test_email, test_password)
        .await
        .expect("create account");
    assert!(!created.uid.is_empty());

    backend
        .reauthenticate(Credential::EmailPassword {
            email: test_email.clone(),
            password: test_password.to_string(),
        })
        .await
        .expect("reauthenticate");

    backend
        .update_password("NewTempPassword456!")
        .await
        .expect("update password");

    // Clean up
    backend
        .delete_current_account()
        .await
        .expect("delete account");
    assert!(backend.current_user().await.is_none());
}

/// Test: password reset request for the known account
#[tokio::test]
async fn test_send_password_reset() {
    let (api_key, email, _) = get_test_config();

    let backend = RestIdentityBackend::new(&api_key).expect("backend");
    backend
        .send_password_reset(&email)
        .await
        .expect("send password reset");
}
