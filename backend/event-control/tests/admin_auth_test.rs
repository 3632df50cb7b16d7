//! Admin credential pair: registration, login, refresh rotation, logout
//! revocation, and pre-signed artifact URLs.

mod common;

use common::spawn_app;
use event_control::error::AppError;
use event_control::services::admin::{LoginInput, RegisterAdminInput};

fn register_input() -> RegisterAdminInput {
    RegisterAdminInput {
        email: "Ops@Example.com".to_string(),
        name: "Ops".to_string(),
        password: "correct horse".to_string(),
    }
}

#[tokio::test]
async fn register_login_and_refresh() {
    let app = spawn_app();
    let admin = app.state.admin.register(register_input()).await.unwrap();
    assert_eq!(admin.email, "ops@example.com");

    let duplicate = app.state.admin.register(register_input()).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let weak = app
        .state
        .admin
        .register(RegisterAdminInput {
            email: "other@example.com".to_string(),
            password: "short".to_string(),
            ..register_input()
        })
        .await;
    assert!(matches!(weak, Err(AppError::InvalidInput(_))));

    let wrong = app
        .state
        .admin
        .login(LoginInput {
            email: "ops@example.com".to_string(),
            password: "incorrect horse".to_string(),
        })
        .await;
    assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

    let tokens = app
        .state
        .admin
        .login(LoginInput {
            email: "OPS@example.com".to_string(),
            password: "correct horse".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(tokens.admin.admin_id, admin.admin_id);

    // An access token is not accepted on the refresh path.
    let misuse = app.state.admin.refresh(&tokens.access_token).await;
    assert!(matches!(misuse, Err(AppError::Unauthorized(_))));

    app.clock.advance(chrono::Duration::minutes(1));
    let rotated = app.state.admin.refresh(&tokens.refresh_token).await.unwrap();
    assert_ne!(rotated.refresh_token, tokens.refresh_token);

    // Rotation revoked the previous refresh token.
    let stale = app.state.admin.refresh(&tokens.refresh_token).await;
    assert!(matches!(stale, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn logout_revokes_refresh() {
    let app = spawn_app();
    let admin = app.state.admin.register(register_input()).await.unwrap();
    let tokens = app
        .state
        .admin
        .login(LoginInput {
            email: "ops@example.com".to_string(),
            password: "correct horse".to_string(),
        })
        .await
        .unwrap();

    app.state.admin.logout(&admin.admin_id).await.unwrap();
    let revoked = app.state.admin.refresh(&tokens.refresh_token).await;
    assert!(matches!(revoked, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn presigned_urls_sanitize_input() {
    let app = spawn_app();

    let (key, url) = app
        .state
        .admin
        .upload_url("my movie (final).mp4", "video/mp4")
        .await
        .unwrap();
    assert!(key.starts_with("uploads/"));
    assert!(key.ends_with("/my_movie__final_.mp4"));
    assert!(url.contains("vod-test"));

    let empty = app.state.admin.upload_url("///", "video/mp4").await;
    assert!(matches!(empty, Err(AppError::InvalidInput(_))));

    let url = app
        .state
        .admin
        .download_url("vod/e1/index.m3u8")
        .await
        .unwrap();
    assert!(url.contains("vod/e1/index.m3u8"));

    let traversal = app.state.admin.download_url("../secrets").await;
    assert!(matches!(traversal, Err(AppError::InvalidInput(_))));
    let blank = app.state.admin.download_url("  ").await;
    assert!(matches!(blank, Err(AppError::InvalidInput(_))));
}
