//! Client-side state holder tying the chat components together.
//!
//! Owns the session, the selector, the composer, the mounted message feed
//! and the presence poller. Remote failures are reported through the
//! [`Notifier`] and surface to callers only as `None`/`false`.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::feed::{AuthorCache, MessageFeed};
use crate::invitations;
use crate::livestreams;
use crate::messages;
use crate::models::{
    CreateChatRequest, FederatedIdentity, LoadedVideo, Message, MessageView, PrivateChat, Room,
    User,
};
use crate::notify::Notifier;
use crate::presence::{PresenceEstimator, PresencePoller};
use crate::selector::{ChatSelector, ChatTab, ChatView, SelectOutcome};
use crate::session::Session;
use crate::store::DocumentStore;
use crate::text::{Composer, ComposerState, KeyPress};
use crate::users;
use crate::video::VideoMetadata;

pub struct Workspace {
    config: AppConfig,
    store: Arc<dyn DocumentStore>,
    metadata: Arc<dyn VideoMetadata>,
    session: Arc<Session>,
    notifier: Notifier,
    authors: Arc<AuthorCache>,
    presence: Arc<PresenceEstimator>,
    selector: ChatSelector,
    composer: Composer,
    feed: Option<MessageFeed>,
    poller: Option<PresencePoller>,
}

impl Workspace {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        metadata: Arc<dyn VideoMetadata>,
        session: Arc<Session>,
        notifier: Notifier,
    ) -> Self {
        let authors = Arc::new(AuthorCache::new(store.clone(), config.author_cache_ttl()));
        let presence = Arc::new(PresenceEstimator::from_config(store.clone(), &config));
        let selector = ChatSelector::new(session.last_video_id());
        Self {
            config,
            store,
            metadata,
            session,
            notifier,
            authors,
            presence,
            selector,
            composer: Composer::new(),
            feed: None,
            poller: None,
        }
    }

    /// Workspace backed by the session file at `config.session_path`.
    pub fn open(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        metadata: Arc<dyn VideoMetadata>,
        notifier: Notifier,
    ) -> Self {
        let session = Arc::new(Session::load(&config.session_path));
        Self::new(config, store, metadata, session, notifier)
    }

    /// Mount whatever the restored session points at (presence for the last
    /// video). Call once after construction.
    pub async fn resume(&mut self) {
        self.remount().await;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn selector(&self) -> &ChatSelector {
        &self.selector
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.last_user()
    }

    fn report(&self, context: &str, error: AppError) {
        self.notifier.report(context, &error);
    }

    // ─── Account ───────────────────────────────────────

    pub async fn sign_in(&mut self, identity: &FederatedIdentity) -> Option<User> {
        let user = match users::sign_in(self.store.as_ref(), identity).await {
            Ok(user) => user,
            Err(e) => {
                self.report("sign-in", e);
                return None;
            }
        };
        if let Err(e) = self.session.set_last_user(&user).await {
            self.report("session", e);
        }
        Some(user)
    }

    /// Forget the cached user and fall back to the embedded chat.
    pub async fn sign_out(&mut self) {
        if let Err(e) = self.session.clear_last_user().await {
            self.report("session", e);
        }
        self.selector.select(ChatTab::EmbeddedExternalChat, false);
        self.remount().await;
    }

    // ─── Video ─────────────────────────────────────────

    pub async fn load_video(&mut self, url: &str) -> Option<LoadedVideo> {
        let loaded =
            match livestreams::load_video(self.store.as_ref(), self.metadata.as_ref(), url).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    self.report("video", e);
                    return None;
                }
            };

        if let Err(e) = self.session.set_last_video_id(&loaded.video_id).await {
            self.report("session", e);
        }
        if let Err(e) = self.session.record_history(&loaded.title, &loaded.url).await {
            self.report("session", e);
        }
        self.selector.set_current_video(&loaded.video_id);
        self.remount().await;
        Some(loaded)
    }

    pub fn adoption_offer(&self) -> Option<&str> {
        self.selector.adoption_offer()
    }

    /// Switch the player to the selected private chat's video.
    pub async fn adopt_private_video(&mut self) -> Option<String> {
        let video_id = self.selector.adopt_private_video()?;
        if let Err(e) = self.session.set_last_video_id(&video_id).await {
            self.report("session", e);
        }
        self.remount().await;
        Some(video_id)
    }

    // ─── Tabs ──────────────────────────────────────────

    pub async fn select_tab(&mut self, tab: ChatTab) -> SelectOutcome {
        let outcome = self.selector.select(tab, self.session.is_signed_in());
        match &outcome {
            SelectOutcome::LoginRequired => {
                self.notifier
                    .info("chat", AppError::LoginRequired.to_string());
            }
            SelectOutcome::ResolveVideo { chat_id } => {
                match invitations::resolve_chat_video(self.store.as_ref(), chat_id).await {
                    Ok(video_id) => {
                        self.selector.apply_resolution(chat_id, video_id);
                    }
                    Err(e) => self.report("private-chat", e),
                }
            }
            SelectOutcome::Selected => {}
        }
        self.remount().await;
        outcome
    }

    pub async fn open_private_chat(&mut self, chat_id: &str) -> SelectOutcome {
        self.select_tab(ChatTab::PrivateChat(chat_id.to_string())).await
    }

    pub async fn close_tab(&mut self, chat_id: &str) -> bool {
        let closed = self.selector.close_tab(chat_id);
        if closed {
            self.remount().await;
        }
        closed
    }

    // ─── Private chats ─────────────────────────────────

    pub async fn create_chat(&mut self, req: &CreateChatRequest) -> Option<PrivateChat> {
        let user = self.require_user()?;
        match invitations::create_chat(
            self.store.as_ref(),
            &user,
            req,
            self.config.max_private_chats,
        )
        .await
        {
            Ok(chat) => {
                self.selector.open_tab(&chat.id);
                Some(chat)
            }
            Err(e) => {
                self.report("private-chat", e);
                None
            }
        }
    }

    /// Accept and open the chat's tab (once, however often this is called).
    pub async fn accept_invitation(&mut self, invitation_id: &str) -> Option<String> {
        let user = self.require_user()?;
        match invitations::accept_invitation(self.store.as_ref(), &user.uid, invitation_id).await {
            Ok(invitation) => {
                self.selector.open_tab(&invitation.chat_id);
                Some(invitation.chat_id)
            }
            Err(e) => {
                self.report("invitation", e);
                None
            }
        }
    }

    pub async fn reject_invitation(&mut self, invitation_id: &str) -> bool {
        let Some(user) = self.require_user() else {
            return false;
        };
        match invitations::reject_invitation(self.store.as_ref(), &user.uid, invitation_id).await {
            Ok(_) => true,
            Err(e) => {
                self.report("invitation", e);
                false
            }
        }
    }

    fn require_user(&self) -> Option<User> {
        let user = self.session.last_user();
        if user.is_none() {
            self.notifier
                .info("chat", AppError::LoginRequired.to_string());
        }
        user
    }

    // ─── Composer ──────────────────────────────────────

    pub fn on_input(&mut self, text: &str) -> ComposerState {
        if let Some(poller) = &self.poller {
            self.composer.set_candidates(poller.users());
        }
        self.composer.on_input(text).clone()
    }

    pub fn select_mention(&mut self, user: &User) -> ComposerState {
        self.composer.select_mention(user).clone()
    }

    pub fn select_emoji(&mut self, glyph: &str) -> ComposerState {
        self.composer.select_emoji(glyph).clone()
    }

    pub async fn on_key(&mut self, key: KeyPress) -> Option<Message> {
        if key.submits() {
            self.submit().await
        } else {
            self.composer.on_key(key);
            None
        }
    }

    /// Send the composed text to the mounted room. The input is cleared
    /// before the write completes.
    pub async fn submit(&mut self) -> Option<Message> {
        let room = self.feed.as_ref()?.room().clone();
        let user = self.require_user()?;
        let text = self.composer.take_submission()?;
        match messages::send_message(self.store.as_ref(), &room, &user, &text).await {
            Ok(message) => message,
            Err(e) => {
                self.report("chat", e);
                None
            }
        }
    }

    // ─── Views ─────────────────────────────────────────

    pub fn view(&self) -> ChatView {
        self.selector.view(&self.config.embed_domain)
    }

    pub fn mounted_room(&self) -> Option<&Room> {
        self.feed.as_ref().map(MessageFeed::room)
    }

    pub fn messages(&self) -> Vec<MessageView> {
        self.feed.as_ref().map(MessageFeed::messages).unwrap_or_default()
    }

    pub fn feed_mut(&mut self) -> Option<&mut MessageFeed> {
        self.feed.as_mut()
    }

    pub fn active_users(&self) -> Vec<User> {
        self.poller
            .as_ref()
            .map(PresencePoller::users)
            .unwrap_or_default()
    }

    fn target_room(&self) -> Option<Room> {
        match self.selector.selected() {
            ChatTab::EmbeddedExternalChat => None,
            ChatTab::NativeChat => self
                .selector
                .current_video_id()
                .map(|id| Room::Livestream(id.to_string())),
            ChatTab::PrivateChat(chat_id) => Some(Room::PrivateChat(chat_id.clone())),
        }
    }

    /// Bring the mounted feed and presence poller in line with the
    /// selection. An unchanged room keeps its feed.
    async fn remount(&mut self) {
        let target = self.target_room();
        if self.mounted_room() != target.as_ref() {
            if let Some(mut old) = self.feed.take() {
                old.close();
            }
            if let Some(room) = target {
                match MessageFeed::open(self.store.clone(), self.authors.clone(), room).await {
                    Ok(feed) => self.feed = Some(feed),
                    Err(e) => self.report("feed", e),
                }
            }
        }

        let presence_room = self
            .selector
            .current_video_id()
            .map(|id| Room::Livestream(id.to_string()));
        let polled = self.poller.as_ref().map(|p| p.room().clone());
        if polled != presence_room {
            self.poller = presence_room.map(|room| {
                PresencePoller::spawn(
                    self.presence.clone(),
                    room,
                    self.config.presence_poll_interval(),
                    self.notifier.clone(),
                )
            });
        }
    }
}
