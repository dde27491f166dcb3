use std::time::Duration;

use serde_json::json;

use crate::common::{MAX_FILE_SIZE, TestApp, routes};

mod submission {
    use super::*;

    #[tokio::test]
    async fn first_submission_creates_a_queued_record() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;

        let res = app
            .upload("dropper.exe", b"MZ first".to_vec(), &token, Some("DE"))
            .await;

        assert_eq!(res.status, 201, "{}", res.text());
        assert_eq!(res.body["status"], "Queued");
        assert_eq!(res.body["size"], 8);
        assert_eq!(res.body["submissions"][0]["filename"], "dropper.exe");
        assert_eq!(res.body["submissions"][0]["source"], "web");
        assert_eq!(res.body["submissions"][0]["country"], "DE");
        assert_eq!(app.queue.published().len(), 1);
    }

    #[tokio::test]
    async fn repeat_submission_appends_and_requeues() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;
        let sha256 = app.submit(b"MZ same", &token).await;

        let res = app
            .upload("renamed.exe", b"MZ same".to_vec(), &token, None)
            .await;

        assert_eq!(res.status, 200, "{}", res.text());
        assert_eq!(res.body["sha256"], sha256);
        let submissions = res.body["submissions"].as_array().unwrap();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[1]["filename"], "renamed.exe");
        assert_eq!(app.queue.published().len(), 2);
    }

    #[tokio::test]
    async fn api_source_is_recorded() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;
        let part = reqwest::multipart::Part::bytes(b"MZ api".to_vec()).file_name("a.bin");
        let res = app
            .client
            .post(format!("http://{}{}?source=api", app.addr, routes::FILES))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(reqwest::multipart::Form::new().part("file", part))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 201);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["submissions"][0]["source"], "api");
    }

    #[tokio::test]
    async fn oversized_files_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;
        let data = vec![0u8; MAX_FILE_SIZE as usize + 1];

        let res = app.upload("big.bin", data, &token, None).await;

        assert_eq!(res.status, 413);
        assert_eq!(res.code(), "PAYLOAD_TOO_LARGE");
        assert!(app.queue.published().is_empty());
    }

    #[tokio::test]
    async fn empty_files_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;

        let res = app.upload("empty.bin", Vec::new(), &token, None).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn submitting_requires_a_token() {
        let app = TestApp::spawn().await;
        let part = reqwest::multipart::Part::bytes(b"MZ".to_vec()).file_name("a.bin");
        let res = app
            .client
            .post(format!("http://{}{}", app.addr, routes::FILES))
            .multipart(reqwest::multipart::Form::new().part("file", part))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 401);
    }
}

mod lookup {
    use super::*;

    #[tokio::test]
    async fn hash_lookup_is_case_insensitive() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;
        let sha256 = app.submit(b"MZ lookup", &token).await;

        let res = app.get(&routes::file(&sha256.to_uppercase()), None).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["sha256"], sha256);
    }

    #[tokio::test]
    async fn unknown_and_malformed_hashes() {
        let app = TestApp::spawn().await;

        let unknown = app.get(&routes::file(&"ab".repeat(32)), None).await;
        assert_eq!(unknown.status, 404);
        assert_eq!(unknown.code(), "NOT_FOUND");

        let malformed = app.get(&routes::file("not-a-hash"), None).await;
        assert_eq!(malformed.status, 400);
    }

    #[tokio::test]
    async fn download_is_a_zip_archive() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;
        let sha256 = app.submit(b"MZ download me", &token).await;

        let res = app.get(&routes::file_download(&sha256), Some(&token)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.content_type.as_deref(), Some("application/zip"));
        assert!(res.bytes.starts_with(b"PK"));
    }
}

mod actions {
    use super::*;

    #[tokio::test]
    async fn rescan_publishes_a_new_job() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;
        let sha256 = app.submit(b"MZ rescan", &token).await;

        let res = app
            .post(&routes::file_actions(&sha256), &json!({"type": "rescan"}), Some(&token))
            .await;

        assert_eq!(res.status, 200, "{}", res.text());
        assert_eq!(res.body["action"], "rescan");
        assert_eq!(app.queue.published().len(), 2);
    }

    #[tokio::test]
    async fn rescan_of_unknown_file_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;

        let res = app
            .post(
                &routes::file_actions(&"cd".repeat(32)),
                &json!({"type": "rescan"}),
                Some(&token),
            )
            .await;

        assert_eq!(res.status, 404);
        assert!(app.queue.published().is_empty());
    }

    #[tokio::test]
    async fn unknown_action_type_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;
        let sha256 = app.submit(b"MZ action", &token).await;

        let res = app
            .post(&routes::file_actions(&sha256), &json!({"type": "explode"}), Some(&token))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn like_and_unlike_are_idempotent() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;
        let sha256 = app.submit(b"MZ likeable", &token).await;
        let path = routes::file_actions(&sha256);

        let first = app.post(&path, &json!({"type": "like"}), Some(&token)).await;
        let second = app.post(&path, &json!({"type": "like"}), Some(&token)).await;
        assert_eq!(first.body["changed"], true);
        assert_eq!(second.body["changed"], false);

        let likes = app.get(&routes::user_list("alice", "likes"), None).await;
        assert_eq!(likes.body.as_array().unwrap().len(), 1);
        assert_eq!(likes.body[0]["sha256"], sha256);

        let unlike = app.post(&path, &json!({"type": "unlike"}), Some(&token)).await;
        assert_eq!(unlike.body["changed"], true);
        let profile = app.get(&routes::user("alice"), None).await;
        assert_eq!(profile.body["likes_count"], 0);
    }
}

mod admin {
    use super::*;

    async fn wait_until_gone(app: &TestApp, sha256: &str) {
        for _ in 0..200 {
            if app.get(&routes::file(sha256), None).await.status == 404 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("file record {sha256} was not purged");
    }

    #[tokio::test]
    async fn only_admins_can_purge() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;

        let res = app.delete(routes::FILES, Some(&token)).await;

        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn purged_samples_can_be_re_ingested() {
        let app = TestApp::spawn().await;
        let token = app.create_user("alice").await;
        let admin = app.admin_token().await;
        let sha256 = app.submit(b"MZ keep the bytes", &token).await;

        let purge = app.delete(routes::FILES, Some(&admin)).await;
        assert_eq!(purge.status, 202);
        wait_until_gone(&app, &sha256).await;

        let ingest = app
            .post_empty(&routes::file_ingest(&sha256), Some(&admin))
            .await;
        assert_eq!(ingest.status, 201, "{}", ingest.text());
        assert_eq!(ingest.body["status"], "Queued");
        assert_eq!(ingest.body["submissions"][0]["source"], "api");

        let again = app
            .post_empty(&routes::file_ingest(&sha256), Some(&admin))
            .await;
        assert_eq!(again.status, 200);
        assert_eq!(app.queue.published().len(), 3);
    }

    #[tokio::test]
    async fn ingest_needs_stored_bytes() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;

        let res = app
            .post_empty(&routes::file_ingest(&"ef".repeat(32)), Some(&admin))
            .await;

        assert_eq!(res.status, 404);
    }
}
