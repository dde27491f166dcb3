use serde_json::json;

use crate::common::{MAX_AVATAR_SIZE, PNG, TestApp, routes};

mod follows {
    use super::*;

    #[tokio::test]
    async fn follow_updates_both_sides() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        app.create_user("bob").await;

        let res = app
            .post(&routes::user_actions("bob"), &json!({"type": "follow"}), Some(&alice))
            .await;
        assert_eq!(res.status, 200, "{}", res.text());

        let following = app.get(&routes::user_list("alice", "following"), None).await;
        let followers = app.get(&routes::user_list("bob", "followers"), None).await;
        assert_eq!(following.body, json!(["bob"]));
        assert_eq!(followers.body, json!(["alice"]));

        let bob = app.get(&routes::user("bob"), None).await;
        assert_eq!(bob.body["followers_count"], 1);
        assert!(bob.body.get("email").is_none());
        assert!(bob.body.get("password").is_none());
    }

    #[tokio::test]
    async fn following_twice_changes_nothing() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        app.create_user("bob").await;
        let path = routes::user_actions("BOB");

        app.post(&path, &json!({"type": "follow"}), Some(&alice)).await;
        let again = app.post(&path, &json!({"type": "follow"}), Some(&alice)).await;
        assert_eq!(again.status, 200);

        let profile = app.get(&routes::user("alice"), None).await;
        assert_eq!(profile.body["following_count"], 1);
        let activities = app.get(&routes::user_list("alice", "activities"), None).await;
        let follows = activities
            .body
            .as_array()
            .unwrap()
            .iter()
            .filter(|a| a["type"] == "follow")
            .count();
        assert_eq!(follows, 1);
    }

    #[tokio::test]
    async fn unfollow_updates_both_sides() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        app.create_user("bob").await;
        let path = routes::user_actions("bob");
        app.post(&path, &json!({"type": "follow"}), Some(&alice)).await;

        let res = app.post(&path, &json!({"type": "unfollow"}), Some(&alice)).await;
        assert_eq!(res.status, 200);

        let following = app.get(&routes::user_list("alice", "following"), None).await;
        let followers = app.get(&routes::user_list("bob", "followers"), None).await;
        assert_eq!(following.body, json!([]));
        assert_eq!(followers.body, json!([]));
    }

    #[tokio::test]
    async fn self_and_unknown_targets_are_rejected() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;

        let own = app
            .post(&routes::user_actions("alice"), &json!({"type": "follow"}), Some(&alice))
            .await;
        assert_eq!(own.status, 400);
        assert_eq!(own.code(), "VALIDATION_ERROR");

        let ghost = app
            .post(&routes::user_actions("ghost"), &json!({"type": "follow"}), Some(&alice))
            .await;
        assert_eq!(ghost.status, 404);

        let profile = app.get(&routes::user("alice"), None).await;
        assert_eq!(profile.body["following_count"], 0);
    }

    #[tokio::test]
    async fn unknown_users_have_no_lists() {
        let app = TestApp::spawn().await;
        for list in ["activities", "likes", "following", "followers", "comments", "submissions"] {
            let res = app.get(&routes::user_list("ghost", list), None).await;
            assert_eq!(res.status, 404, "{list}");
        }
    }
}

mod comments {
    use super::*;

    #[tokio::test]
    async fn posted_comments_show_on_file_and_author() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let sha256 = app.submit(b"MZ discuss", &alice).await;

        let res = app
            .post(
                &routes::file_comments(&sha256),
                &json!({"body": "  beacons to a paste site  "}),
                Some(&alice),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text());
        assert_eq!(res.body["body"], "beacons to a paste site");
        assert_eq!(res.body["username"], "alice");

        let listed = app.get(&routes::file_comments(&sha256), None).await;
        assert_eq!(listed.body.as_array().unwrap().len(), 1);

        let mine = app.get(&routes::user_list("alice", "comments"), None).await;
        assert_eq!(mine.body[0]["id"], res.body["id"]);
        assert_eq!(mine.body[0]["sha256"], sha256);
    }

    #[tokio::test]
    async fn empty_comments_and_unknown_files_are_rejected() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let sha256 = app.submit(b"MZ quiet", &alice).await;

        let blank = app
            .post(&routes::file_comments(&sha256), &json!({"body": "   "}), Some(&alice))
            .await;
        assert_eq!(blank.status, 400);

        let missing = app
            .post(
                &routes::file_comments(&"12".repeat(32)),
                &json!({"body": "hello"}),
                Some(&alice),
            )
            .await;
        assert_eq!(missing.status, 404);
    }

    #[tokio::test]
    async fn only_the_author_can_delete() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;
        let sha256 = app.submit(b"MZ mine", &alice).await;
        let posted = app
            .post(&routes::file_comments(&sha256), &json!({"body": "mine"}), Some(&alice))
            .await;
        let id = posted.body["id"].as_str().unwrap().to_string();
        let path = routes::file_comment(&sha256, &id);

        let by_bob = app.delete(&path, Some(&bob)).await;
        assert_eq!(by_bob.status, 403);
        assert_eq!(by_bob.code(), "PERMISSION_DENIED");

        let by_alice = app.delete(&path, Some(&alice)).await;
        assert_eq!(by_alice.status, 204);

        let listed = app.get(&routes::file_comments(&sha256), None).await;
        assert_eq!(listed.body, json!([]));

        let twice = app.delete(&path, Some(&alice)).await;
        assert_eq!(twice.status, 404);
    }
}

mod avatars {
    use super::*;

    #[tokio::test]
    async fn owner_can_upload_and_anyone_can_fetch() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let avatar = routes::user_list("alice", "avatar");

        let before = app.get(&avatar, None).await;
        assert_eq!(before.status, 404);

        let res = app.put_bytes(&avatar, PNG.to_vec(), &alice).await;
        assert_eq!(res.status, 200, "{}", res.text());

        let fetched = app.get(&avatar, None).await;
        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.content_type.as_deref(), Some("image/png"));
        assert_eq!(fetched.bytes, PNG);

        let profile = app.get(&routes::user("alice"), None).await;
        assert_eq!(profile.body["has_avatar"], true);
    }

    #[tokio::test]
    async fn avatar_uploads_are_checked() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice").await;
        let bob = app.create_user("bob").await;
        let avatar = routes::user_list("alice", "avatar");

        let not_owner = app.put_bytes(&avatar, PNG.to_vec(), &bob).await;
        assert_eq!(not_owner.status, 403);

        let not_image = app.put_bytes(&avatar, b"plain text".to_vec(), &alice).await;
        assert_eq!(not_image.status, 400);

        let mut big = PNG.to_vec();
        big.resize(MAX_AVATAR_SIZE as usize + 1, 0);
        let too_big = app.put_bytes(&avatar, big, &alice).await;
        assert_eq!(too_big.status, 413);
        assert_eq!(too_big.code(), "PAYLOAD_TOO_LARGE");
    }
}

/// Two users submit the same content; only the first is credited, and the
/// likes, follows and timelines line up afterwards.
#[tokio::test]
async fn shared_sample_scenario() {
    let app = TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;

    let first = app.upload("abc.exe", b"ABC".to_vec(), &alice, None).await;
    assert_eq!(first.status, 201);
    let sha256 = first.body["sha256"].as_str().unwrap().to_string();
    let second = app.upload("abc-copy.exe", b"ABC".to_vec(), &bob, None).await;
    assert_eq!(second.status, 200);

    let record = app.get(&routes::file(&sha256), None).await;
    assert_eq!(record.body["submissions"].as_array().unwrap().len(), 2);
    assert_eq!(app.queue.published().len(), 2);

    let alice_subs = app.get(&routes::user_list("alice", "submissions"), None).await;
    let bob_subs = app.get(&routes::user_list("bob", "submissions"), None).await;
    assert_eq!(alice_subs.body.as_array().unwrap().len(), 1);
    assert_eq!(alice_subs.body[0]["sha256"], sha256);
    assert_eq!(bob_subs.body, json!([]));

    app.post(&routes::file_actions(&sha256), &json!({"type": "like"}), Some(&bob))
        .await;
    app.post(&routes::user_actions("alice"), &json!({"type": "follow"}), Some(&bob))
        .await;

    let timeline = app
        .get(&format!("{}?limit=2", routes::user_list("bob", "activities")), None)
        .await;
    let kinds: Vec<&str> = timeline
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["follow", "like"]);

    let alice_timeline = app.get(&routes::user_list("alice", "activities"), None).await;
    assert_eq!(alice_timeline.body[0]["type"], "submit");
    assert_eq!(alice_timeline.body[0]["content"]["sha256"], sha256);
}
