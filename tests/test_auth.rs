//! Integration tests for users, login and token storage on a local board.

mod common;

use common::*;
use taskboard::BoardError;

#[tokio::test]
async fn test_seed_default_users_once() -> anyhow::Result<()> {
    // 1. Seeding an empty board creates the three default accounts
    let (board, _temp_dir) = create_task_board().await;
    let users: Vec<User> = board.users().await?;
    let usernames: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(usernames, vec!["admin", "anowak", "pkowalski"]);
    assert_eq!(users[0].role, Role::Admin);

    // 2. A second run leaves the board alone
    assert_eq!(board.seed_default_users().await?, 0);
    assert_eq!(board.users().await?.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_login_sets_session_and_tokens() -> anyhow::Result<()> {
    // 1. Log in with the seeded developer
    let (board, _temp_dir) = create_task_board().await;
    let mut session = board.session().await?;
    assert!(!board.store().are_tokens_present().await?);

    let tokens = board.login(&mut session, "anowak", "admin").await?;
    assert_eq!(tokens.user_id, DEVELOPER_ID);

    // 2. The session and the store agree on who is logged in
    assert_eq!(session.user_id, DEVELOPER_ID);
    assert_eq!(board.session().await?.user_id, DEVELOPER_ID);
    assert_eq!(board.current_user(&session).await?.username, "anowak");

    // 3. Tokens were stored and verify against the board's keys
    assert!(board.store().are_tokens_present().await?);
    let claims = board.store().keys().verify_token(&tokens.token)?;
    assert_eq!(claims.user_id, DEVELOPER_ID);
    assert_eq!(claims.role, Role::Developer);

    Ok(())
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() -> anyhow::Result<()> {
    let (board, _temp_dir) = create_task_board().await;
    let mut session = board.session().await?;

    let wrong_password = board.login(&mut session, "anowak", "nope").await;
    assert!(matches!(wrong_password, Err(BoardError::InvalidCredentials)));

    let unknown_user = board.login(&mut session, "ghost", "admin").await;
    assert!(matches!(unknown_user, Err(BoardError::InvalidCredentials)));

    assert_eq!(session.user_id, 0);
    assert!(matches!(
        board.current_user(&session).await,
        Err(BoardError::NotLoggedIn)
    ));

    Ok(())
}

#[tokio::test]
async fn test_password_change_takes_effect() -> anyhow::Result<()> {
    let (board, _temp_dir) = create_task_board().await;
    let db = board.store();

    let update = UserUpdate {
        password: Some("s3cret".to_string()),
        ..UserUpdate::default()
    };
    let user = db.update_user(ADMIN_ID, &update).await?.expect("admin exists");
    assert_eq!(user.username, "admin");

    assert!(db.login("admin", "admin").await?.is_none());
    assert!(db.login("admin", "s3cret").await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_refresh_token_rotation() -> anyhow::Result<()> {
    // 1. Log in to get a recorded refresh token
    let (board, _temp_dir) = create_task_board().await;
    let db = board.store();
    let tokens = db.login("pkowalski", "admin").await?.expect("valid login");

    // 2. It can mint access tokens
    let access = db
        .issue_access_token(&tokens.refresh_token, Some(60))
        .await?
        .expect("known refresh token");
    assert_eq!(db.keys().verify_token(&access)?.user_id, DEVOPS_ID);

    // 3. Rotating replaces it
    let rotated = db
        .rotate_refresh_token(&tokens.refresh_token)
        .await?
        .expect("known refresh token");
    assert_ne!(rotated.refresh_token, tokens.refresh_token);
    assert!(db.issue_access_token(&tokens.refresh_token, None).await?.is_none());
    assert!(db.issue_access_token(&rotated.refresh_token, None).await?.is_some());

    // 4. Tokens never recorded are refused
    let forged = db.keys().issue_refresh_token(&db.keys().verify_token(&access)?)?;
    assert!(db.rotate_refresh_token(&forged).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_saved_tokens_round_trip() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_board().await;
    assert!(db.get_saved_tokens().await?.is_none());

    db.save_tokens("access", "refresh").await?;
    db.save_tokens("access-2", "refresh-2").await?;

    let saved = db.get_saved_tokens().await?.expect("tokens saved");
    assert_eq!(saved.token, "access-2");
    assert_eq!(saved.refresh_token, "refresh-2");
    assert!(db.are_tokens_present().await?);

    Ok(())
}

#[tokio::test]
async fn test_users_never_serialize_passwords() -> anyhow::Result<()> {
    let (board, _temp_dir) = create_task_board().await;
    let user = board.user(ADMIN_ID).await?;
    let json = serde_json::to_value(&user)?;
    assert!(json.get("password").is_none());
    assert!(json.get("passwordHash").is_none());
    assert_eq!(json["role"], "admin");

    Ok(())
}
