use serde_json::json;
use server::notify::EmailTemplate;

use crate::common::{PASSWORD, TestApp, routes};

mod registration {
    use super::*;

    #[tokio::test]
    async fn new_accounts_start_unconfirmed() {
        let app = TestApp::spawn().await;

        let res = app
            .post(
                routes::REGISTER,
                &json!({"username": "Alice", "password": PASSWORD, "email": "alice@example.com"}),
                None,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text());
        assert_eq!(res.body["username"], "alice");
        assert_eq!(res.body["confirmed"], false);

        let login = app.login("alice", PASSWORD).await;
        assert_eq!(login.status, 401);
        assert_eq!(login.code(), "NOT_CONFIRMED");
    }

    #[tokio::test]
    async fn confirmation_link_enables_login() {
        let app = TestApp::spawn().await;
        app.post(
            routes::REGISTER,
            &json!({"username": "alice", "password": PASSWORD, "email": "alice@example.com"}),
            None,
        )
        .await;

        let token = app
            .email_token("alice@example.com", EmailTemplate::Confirm)
            .await;
        let res = app.get(&routes::confirm(&token), None).await;
        assert_eq!(res.status, 200, "{}", res.text());

        let login = app.login("ALICE", PASSWORD).await;
        assert_eq!(login.status, 200);
        assert!(login.body["token"].is_string());
        assert_eq!(login.body["admin"], false);
    }

    #[tokio::test]
    async fn taken_username_or_email_is_a_conflict() {
        let app = TestApp::spawn().await;
        app.create_user("alice").await;

        let same_name = app
            .post(
                routes::REGISTER,
                &json!({"username": "ALICE", "password": PASSWORD, "email": "other@example.com"}),
                None,
            )
            .await;
        assert_eq!(same_name.status, 409);
        assert_eq!(same_name.code(), "CONFLICT");

        let same_email = app
            .post(
                routes::REGISTER,
                &json!({"username": "bob", "password": PASSWORD, "email": "alice@example.com"}),
                None,
            )
            .await;
        assert_eq!(same_email.status, 409);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let app = TestApp::spawn().await;

        for body in [
            json!({"username": "alice", "password": "short", "email": "alice@example.com"}),
            json!({"username": "no spaces!", "password": PASSWORD, "email": "a@example.com"}),
            json!({"username": "alice", "password": PASSWORD, "email": "not-an-email"}),
            json!({"username": "alice"}),
        ] {
            let res = app.post(routes::REGISTER, &body, None).await;
            assert_eq!(res.status, 400, "accepted {body}");
            assert_eq!(res.code(), "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn confirmation_can_be_resent_until_confirmed() {
        let app = TestApp::spawn().await;
        app.post(
            routes::REGISTER,
            &json!({"username": "alice", "password": PASSWORD, "email": "alice@example.com"}),
            None,
        )
        .await;

        let resend = app
            .post(
                routes::RESEND_CONFIRMATION,
                &json!({"email": "alice@example.com"}),
                None,
            )
            .await;
        assert_eq!(resend.status, 200);

        let token = app
            .email_token("alice@example.com", EmailTemplate::Confirm)
            .await;
        app.get(&routes::confirm(&token), None).await;

        let again = app
            .post(
                routes::RESEND_CONFIRMATION,
                &json!({"email": "alice@example.com"}),
                None,
            )
            .await;
        assert_eq!(again.status, 409);

        let unknown = app
            .post(
                routes::RESEND_CONFIRMATION,
                &json!({"email": "nobody@example.com"}),
                None,
            )
            .await;
        assert_eq!(unknown.status, 404);
    }
}

mod login {
    use super::*;

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let app = TestApp::spawn().await;
        app.create_user("alice").await;

        let wrong = app.login("alice", "wrongpassword").await;
        let unknown = app.login("nobody", PASSWORD).await;

        assert_eq!(wrong.status, 401);
        assert_eq!(wrong.code(), "INVALID_CREDENTIALS");
        assert_eq!(unknown.status, 401);
        assert_eq!(unknown.code(), "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn seeded_admin_can_log_in() {
        let app = TestApp::spawn().await;
        let res = app.login(crate::common::ADMIN, PASSWORD).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["admin"], true);
    }

    #[tokio::test]
    async fn protected_routes_require_a_session_token() {
        let app = TestApp::spawn().await;
        let path = routes::user_actions("alice");
        let follow = json!({"type": "follow"});

        let missing = app.post(&path, &follow, None).await;
        assert_eq!(missing.status, 401);
        assert_eq!(missing.code(), "TOKEN_MISSING");

        let garbage = app.post(&path, &follow, Some("not-a-jwt")).await;
        assert_eq!(garbage.status, 401);
        assert_eq!(garbage.code(), "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn email_tokens_are_not_session_tokens() {
        let app = TestApp::spawn().await;
        app.create_user("alice").await;
        app.post(
            routes::RESET_PASSWORD,
            &json!({"email": "alice@example.com"}),
            None,
        )
        .await;
        let reset_token = app
            .email_token("alice@example.com", EmailTemplate::Reset)
            .await;

        let res = app
            .post(
                &routes::user_actions("alice"),
                &json!({"type": "follow"}),
                Some(&reset_token),
            )
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_INVALID");
    }
}

mod password_reset {
    use super::*;

    #[tokio::test]
    async fn reset_link_sets_a_new_password() {
        let app = TestApp::spawn().await;
        app.create_user("alice").await;

        let res = app
            .post(
                routes::RESET_PASSWORD,
                &json!({"email": "alice@example.com"}),
                None,
            )
            .await;
        assert_eq!(res.status, 200);
        let token = app
            .email_token("alice@example.com", EmailTemplate::Reset)
            .await;

        let res = app
            .post(
                routes::RESET_PASSWORD_CONFIRM,
                &json!({"token": token, "password": "brand-new-pass"}),
                None,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text());

        assert_eq!(app.login("alice", PASSWORD).await.status, 401);
        assert_eq!(app.login("alice", "brand-new-pass").await.status, 200);
    }

    #[tokio::test]
    async fn confirmation_token_cannot_reset_a_password() {
        let app = TestApp::spawn().await;
        app.post(
            routes::REGISTER,
            &json!({"username": "alice", "password": PASSWORD, "email": "alice@example.com"}),
            None,
        )
        .await;
        let confirm_token = app
            .email_token("alice@example.com", EmailTemplate::Confirm)
            .await;

        let res = app
            .post(
                routes::RESET_PASSWORD_CONFIRM,
                &json!({"token": confirm_token, "password": "brand-new-pass"}),
                None,
            )
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_INVALID");
    }
}
