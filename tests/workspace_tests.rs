use std::sync::Arc;

use kpop_companion::{
    config::AppConfig,
    invitations,
    models::{CreateChatRequest, FederatedIdentity, Room},
    notify::{NoticeLevel, Notifier},
    selector::{ChatTab, ChatView, SelectOutcome},
    session::Session,
    store::{paths, DocumentStore, MemoryStore},
    text::KeyPress,
    video::NoMetadata,
    workspace::Workspace,
};

fn identity(uid: &str, name: &str) -> FederatedIdentity {
    FederatedIdentity {
        uid: uid.into(),
        display_name: name.into(),
        email: None,
        photo_url: None,
    }
}

fn workspace(store: &MemoryStore) -> Workspace {
    Workspace::new(
        AppConfig::test_default(),
        Arc::new(store.clone()),
        Arc::new(NoMetadata),
        Arc::new(Session::in_memory()),
        Notifier::default(),
    )
}

#[tokio::test]
async fn native_chat_requires_sign_in() {
    let store = MemoryStore::new();
    let mut ws = workspace(&store);

    let outcome = ws.select_tab(ChatTab::NativeChat).await;
    assert_eq!(outcome, SelectOutcome::LoginRequired);
    assert_eq!(ws.selector().selected(), &ChatTab::EmbeddedExternalChat);

    let notices = ws.notifier().active();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Info);
    assert_eq!(notices[0].message, "You must log in to use this chat");
}

#[tokio::test]
async fn sign_in_caches_user_in_session() {
    let store = MemoryStore::new();
    let mut ws = workspace(&store);

    let user = ws.sign_in(&identity("u1", "One")).await.unwrap();
    assert_eq!(user.uid, "u1");
    assert_eq!(ws.current_user().map(|u| u.uid), Some("u1".to_string()));
    assert!(store.get(&paths::user("u1")).await.unwrap().is_some());

    ws.sign_out().await;
    assert!(ws.current_user().is_none());
}

#[tokio::test]
async fn session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::test_default();
    config.session_path = dir.path().join("session.json").to_string_lossy().into_owned();
    let store = MemoryStore::new();

    {
        let mut ws = Workspace::open(
            config.clone(),
            Arc::new(store.clone()),
            Arc::new(NoMetadata),
            Notifier::default(),
        );
        ws.sign_in(&identity("u1", "One")).await.unwrap();
        ws.load_video("https://youtu.be/abc123").await.unwrap();
    }

    let mut ws = Workspace::open(
        config,
        Arc::new(store.clone()),
        Arc::new(NoMetadata),
        Notifier::default(),
    );
    ws.resume().await;
    assert_eq!(ws.current_user().map(|u| u.uid), Some("u1".to_string()));
    assert_eq!(ws.selector().current_video_id(), Some("abc123"));
    assert_eq!(ws.session().video_history()[0].title, "Video abc123");
}

#[tokio::test]
async fn loading_a_video_mounts_its_room() {
    let store = MemoryStore::new();
    let mut ws = workspace(&store);
    ws.sign_in(&identity("u1", "One")).await.unwrap();

    let loaded = ws
        .load_video("https://www.youtube.com/watch?v=abc123")
        .await
        .unwrap();
    assert_eq!(loaded.video_id, "abc123");
    assert_eq!(ws.session().last_video_id().as_deref(), Some("abc123"));
    assert_eq!(ws.session().video_history().len(), 1);

    // The embedded chat has no native feed
    assert!(ws.mounted_room().is_none());
    assert!(matches!(ws.view(), ChatView::Embedded { src: Some(_) }));

    ws.select_tab(ChatTab::NativeChat).await;
    assert_eq!(
        ws.mounted_room(),
        Some(&Room::Livestream("abc123".to_string()))
    );
    assert_eq!(store.active_subscriptions(), 1);
}

#[tokio::test]
async fn invalid_video_url_is_reported() {
    let store = MemoryStore::new();
    let mut ws = workspace(&store);

    assert!(ws.load_video("not a url").await.is_none());
    let notices = ws.notifier().active();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn switching_rooms_closes_the_previous_feed() {
    let store = MemoryStore::new();
    let mut ws = workspace(&store);
    let user = ws.sign_in(&identity("u1", "One")).await.unwrap();
    ws.load_video("https://youtu.be/abc123").await.unwrap();
    ws.select_tab(ChatTab::NativeChat).await;
    assert_eq!(store.active_subscriptions(), 1);

    let chat = invitations::create_chat(
        &store,
        &user,
        &CreateChatRequest {
            name: "Party".into(),
            url: "https://youtu.be/zzz999".into(),
            invited_users: vec![],
        },
        5,
    )
    .await
    .unwrap();

    let outcome = ws.open_private_chat(&chat.id).await;
    assert_eq!(
        outcome,
        SelectOutcome::ResolveVideo {
            chat_id: chat.id.clone()
        }
    );
    assert_eq!(ws.mounted_room(), Some(&Room::PrivateChat(chat.id.clone())));
    // Old feed gone, one live query left
    assert_eq!(store.active_subscriptions(), 1);

    // The chat's video differs from the one playing
    assert_eq!(ws.adoption_offer(), Some("zzz999"));
    assert_eq!(ws.adopt_private_video().await.as_deref(), Some("zzz999"));
    assert_eq!(ws.selector().current_video_id(), Some("zzz999"));

    ws.select_tab(ChatTab::EmbeddedExternalChat).await;
    assert!(ws.mounted_room().is_none());
    assert_eq!(store.active_subscriptions(), 0);
}

#[tokio::test]
async fn accepting_twice_opens_one_tab() {
    let store = MemoryStore::new();
    let mut owner_ws = workspace(&store);
    let owner = owner_ws.sign_in(&identity("owner", "Owner")).await.unwrap();

    let mut ws = workspace(&store);
    ws.sign_in(&identity("guest", "Guest")).await.unwrap();

    let chat = invitations::create_chat(
        &store,
        &owner,
        &CreateChatRequest {
            name: "Party".into(),
            url: "https://youtu.be/abc123".into(),
            invited_users: vec!["guest".into()],
        },
        5,
    )
    .await
    .unwrap();
    let invitation = invitations::pending_invitations(&store, "guest")
        .await
        .unwrap()
        .remove(0);

    assert_eq!(
        ws.accept_invitation(&invitation.id).await.as_deref(),
        Some(chat.id.as_str())
    );
    assert_eq!(
        ws.accept_invitation(&invitation.id).await.as_deref(),
        Some(chat.id.as_str())
    );
    assert_eq!(ws.selector().open_tabs(), [chat.id.clone()]);
}

#[tokio::test]
async fn rejecting_without_sign_in_fails() {
    let store = MemoryStore::new();
    let mut ws = workspace(&store);
    assert!(!ws.reject_invitation("whatever").await);
    assert_eq!(ws.notifier().active().len(), 1);
}

#[tokio::test]
async fn submit_sends_and_clears_input() {
    let store = MemoryStore::new();
    let mut ws = workspace(&store);
    ws.sign_in(&identity("u1", "One")).await.unwrap();
    ws.load_video("https://youtu.be/abc123").await.unwrap();
    ws.select_tab(ChatTab::NativeChat).await;

    let state = ws.on_input("hi :fire:");
    assert_eq!(state.text, "hi :fire:");

    // Shift+Enter never submits
    assert!(ws.on_key(KeyPress::ShiftEnter).await.is_none());

    let message = ws.on_key(KeyPress::Enter).await.unwrap();
    assert_eq!(message.text, "hi 🔥");
    assert_eq!(message.author_uid.as_deref(), Some("u1"));
    assert_eq!(ws.on_input("").text, "");

    let feed = ws.feed_mut().unwrap();
    let mut snapshot = feed.messages();
    while snapshot.is_empty() {
        snapshot = feed.changed().await.unwrap();
    }
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].message.text, "hi 🔥");
}

#[tokio::test]
async fn blank_submit_writes_nothing() {
    let store = MemoryStore::new();
    let mut ws = workspace(&store);
    ws.sign_in(&identity("u1", "One")).await.unwrap();
    ws.load_video("https://youtu.be/abc123").await.unwrap();
    ws.select_tab(ChatTab::NativeChat).await;

    ws.on_input("   ");
    assert!(ws.submit().await.is_none());

    let room = Room::Livestream("abc123".into());
    let docs = store
        .query(&paths::messages(&room), &Default::default())
        .await
        .unwrap();
    assert!(docs.is_empty());
}
