//! Integration tests for the token repository against a real database.
//!
//! Exercises the queries the token authority relies on:
//! - Insert and exact-string lookup
//! - Owner resolution without loading the token
//! - Bulk purpose-scoped revocation and its row-count semantics
//! - Deadline expiry sweep
//! - The trigger that forbids clearing flags
//!
//! Requires `DATABASE_URL`; run with `cargo test -- --ignored`.

use chrono::{Duration, Utc};
use lectern_core::roles::UserRole;
use lectern_core::tokens::{TokenPurpose, TokenState};
use lectern_db::models::token::CreateToken;
use lectern_db::models::user::{CreateUser, User};
use lectern_db::repositories::{TokenRepo, UserRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn create_user(pool: &PgPool, email: &str) -> User {
    let input = CreateUser {
        email: email.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        role: UserRole::Student,
        is_active: true,
    };
    UserRepo::create(pool, &input).await.unwrap()
}

fn new_token(user_id: i64, value: &str, purpose: TokenPurpose) -> CreateToken {
    CreateToken {
        user_id,
        token: value.to_string(),
        purpose,
        expires_at: Some(Utc::now() + Duration::hours(1)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_and_find_by_token(pool: PgPool) {
    let user = create_user(&pool, "find@test.com").await;
    let created = TokenRepo::create(&pool, &new_token(user.id, "tok-find", TokenPurpose::Access))
        .await
        .unwrap();

    assert_eq!(created.state(), TokenState::Active);
    assert_eq!(created.purpose, TokenPurpose::Access);

    let found = TokenRepo::find_by_token(&pool, "tok-find").await.unwrap().unwrap();
    assert_eq!(found, created);
    assert!(TokenRepo::exists_by_token(&pool, "tok-find").await.unwrap());

    assert!(TokenRepo::find_by_token(&pool, "nonexistent").await.unwrap().is_none());
    assert!(!TokenRepo::exists_by_token(&pool, "nonexistent").await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_token_string_violates_unique_constraint(pool: PgPool) {
    let user = create_user(&pool, "dup@test.com").await;
    TokenRepo::create(&pool, &new_token(user.id, "same", TokenPurpose::Access))
        .await
        .unwrap();

    let err = TokenRepo::create(&pool, &new_token(user.id, "same", TokenPurpose::Refresh))
        .await
        .unwrap_err();
    match err {
        sqlx::Error::Database(db_err) => {
            assert_eq!(db_err.code().as_deref(), Some("23505"));
            assert_eq!(db_err.constraint(), Some("uq_tokens_token"));
        }
        other => panic!("expected unique violation, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_find_user_by_token(pool: PgPool) {
    let user = create_user(&pool, "owner@test.com").await;
    TokenRepo::create(&pool, &new_token(user.id, "tok-owner", TokenPurpose::Refresh))
        .await
        .unwrap();

    let owner = TokenRepo::find_user_by_token(&pool, "tok-owner").await.unwrap().unwrap();
    assert_eq!(owner.id, user.id);
    assert_eq!(owner.email, "owner@test.com");

    assert!(TokenRepo::find_user_by_token(&pool, "missing").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_revoke_session_tokens_scenario(pool: PgPool) {
    let user = create_user(&pool, "a@b.com").await;
    let t1 = TokenRepo::create(&pool, &new_token(user.id, "T1", TokenPurpose::Access))
        .await
        .unwrap();
    let t2 = TokenRepo::create(&pool, &new_token(user.id, "T2", TokenPurpose::Refresh))
        .await
        .unwrap();
    let t3 = TokenRepo::create(&pool, &new_token(user.id, "T3", TokenPurpose::ResetPassword))
        .await
        .unwrap();

    let count =
        TokenRepo::revoke_by_email_and_purposes(&pool, "a@b.com", &TokenPurpose::SESSION)
            .await
            .unwrap();
    assert_eq!(count, 2);

    for t in [&t1, &t2] {
        let row = TokenRepo::find_by_token(&pool, &t.token).await.unwrap().unwrap();
        assert!(row.revoked && row.expired);
    }
    let row = TokenRepo::find_by_token(&pool, &t3.token).await.unwrap().unwrap();
    assert_eq!(row.state(), TokenState::Active);

    // Matched rows are counted again even though nothing changes.
    let again =
        TokenRepo::revoke_by_email_and_purposes(&pool, "a@b.com", &TokenPurpose::SESSION)
            .await
            .unwrap();
    assert_eq!(again, 2);

    let active = TokenRepo::list_active_by_email(&pool, "a@b.com").await.unwrap();
    assert_eq!(active, vec![t3]);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_revoke_is_scoped_to_owner(pool: PgPool) {
    let alice = create_user(&pool, "alice@test.com").await;
    let bob = create_user(&pool, "bob@test.com").await;
    TokenRepo::create(&pool, &new_token(alice.id, "alice-access", TokenPurpose::Access))
        .await
        .unwrap();
    TokenRepo::create(&pool, &new_token(bob.id, "bob-access", TokenPurpose::Access))
        .await
        .unwrap();

    let count =
        TokenRepo::revoke_by_email_and_purposes(&pool, "alice@test.com", &TokenPurpose::SESSION)
            .await
            .unwrap();
    assert_eq!(count, 1);

    let bob_token = TokenRepo::find_by_token(&pool, "bob-access").await.unwrap().unwrap();
    assert!(!bob_token.revoked);

    let unknown =
        TokenRepo::revoke_by_email_and_purposes(&pool, "nobody@test.com", &TokenPurpose::SESSION)
            .await
            .unwrap();
    assert_eq!(unknown, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_expire_due_flips_only_passed_deadlines(pool: PgPool) {
    let user = create_user(&pool, "sweep@test.com").await;
    let now = Utc::now();

    let mut due = new_token(user.id, "due", TokenPurpose::AccountActivation);
    due.expires_at = Some(now - Duration::minutes(1));
    let mut open_ended = new_token(user.id, "open", TokenPurpose::AccountActivation);
    open_ended.expires_at = None;

    TokenRepo::create(&pool, &due).await.unwrap();
    TokenRepo::create(&pool, &open_ended).await.unwrap();
    TokenRepo::create(&pool, &new_token(user.id, "later", TokenPurpose::Access))
        .await
        .unwrap();

    assert_eq!(TokenRepo::expire_due(&pool, now).await.unwrap(), 1);
    assert_eq!(TokenRepo::expire_due(&pool, now).await.unwrap(), 0);

    let due_row = TokenRepo::find_by_token(&pool, "due").await.unwrap().unwrap();
    assert_eq!(due_row.state(), TokenState::Expired);
    let open_row = TokenRepo::find_by_token(&pool, "open").await.unwrap().unwrap();
    assert_eq!(open_row.state(), TokenState::Active);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_consume_takes_token_once(pool: PgPool) {
    let user = create_user(&pool, "consume@test.com").await;
    let now = Utc::now();
    TokenRepo::create(&pool, &new_token(user.id, "refresh-once", TokenPurpose::Refresh))
        .await
        .unwrap();

    let wrong = TokenRepo::consume(&pool, "refresh-once", TokenPurpose::Access, now)
        .await
        .unwrap();
    assert!(wrong.is_none());

    let consumed = TokenRepo::consume(&pool, "refresh-once", TokenPurpose::Refresh, now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(consumed.state(), TokenState::ExpiredAndRevoked);

    let again = TokenRepo::consume(&pool, "refresh-once", TokenPurpose::Refresh, now)
        .await
        .unwrap();
    assert!(again.is_none());

    let late = now + Duration::hours(2);
    TokenRepo::create(&pool, &new_token(user.id, "refresh-late", TokenPurpose::Refresh))
        .await
        .unwrap();
    let overdue = TokenRepo::consume(&pool, "refresh-late", TokenPurpose::Refresh, late)
        .await
        .unwrap();
    assert!(overdue.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_trigger_rejects_clearing_revoked_flag(pool: PgPool) {
    let user = create_user(&pool, "mono@test.com").await;
    let token = TokenRepo::create(&pool, &new_token(user.id, "mono", TokenPurpose::Access))
        .await
        .unwrap();
    TokenRepo::revoke_by_email_and_purposes(&pool, "mono@test.com", &[TokenPurpose::Access])
        .await
        .unwrap();

    let result = sqlx::query("UPDATE tokens SET revoked = false WHERE id = $1")
        .bind(token.id)
        .execute(&pool)
        .await;
    assert!(result.is_err(), "clearing a revoked flag must be rejected");

    let row = TokenRepo::find_by_token(&pool, "mono").await.unwrap().unwrap();
    assert!(row.revoked);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_list_by_user_keeps_revoked_history(pool: PgPool) {
    let user = create_user(&pool, "history@test.com").await;
    for value in ["h1", "h2", "h3"] {
        TokenRepo::create(&pool, &new_token(user.id, value, TokenPurpose::Access))
            .await
            .unwrap();
    }
    TokenRepo::revoke_by_email_and_purposes(&pool, "history@test.com", &TokenPurpose::SESSION)
        .await
        .unwrap();

    let history = TokenRepo::list_by_user(&pool, user.id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|t| t.revoked));
    assert_eq!(history[0].token, "h3");
}
