//! Which chat is shown next to the player.
//!
//! The selector is pure state: it never touches the store. Video resolution
//! for private chats is requested through [`SelectOutcome`] and fed back
//! with [`ChatSelector::apply_resolution`].

use serde::{Deserialize, Serialize};

use crate::video::chat_embed_url;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum ChatTab {
    EmbeddedExternalChat,
    NativeChat,
    PrivateChat(String),
}

impl ChatTab {
    pub fn requires_login(&self) -> bool {
        !matches!(self, ChatTab::EmbeddedExternalChat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected,
    /// Refused; the selection is unchanged.
    LoginRequired,
    /// Selected; the caller should look up the chat's video and call
    /// `apply_resolution`.
    ResolveVideo { chat_id: String },
}

/// The child view to mount for the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum ChatView {
    /// `src` is absent until a video is loaded.
    Embedded { src: Option<String> },
    Native { video_id: Option<String> },
    Private { chat_id: String },
}

#[derive(Debug, Clone)]
pub struct ChatSelector {
    selected: ChatTab,
    open_tabs: Vec<String>,
    current_video_id: Option<String>,
    /// Chat id and the video its URL resolved to.
    resolved: Option<(String, Option<String>)>,
}

impl Default for ChatSelector {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ChatSelector {
    pub fn new(current_video_id: Option<String>) -> Self {
        Self {
            selected: ChatTab::EmbeddedExternalChat,
            open_tabs: Vec::new(),
            current_video_id,
            resolved: None,
        }
    }

    pub fn selected(&self) -> &ChatTab {
        &self.selected
    }

    pub fn open_tabs(&self) -> &[String] {
        &self.open_tabs
    }

    pub fn current_video_id(&self) -> Option<&str> {
        self.current_video_id.as_deref()
    }

    pub fn set_current_video(&mut self, video_id: &str) {
        self.current_video_id = Some(video_id.to_string());
    }

    pub fn select(&mut self, tab: ChatTab, signed_in: bool) -> SelectOutcome {
        if tab.requires_login() && !signed_in {
            return SelectOutcome::LoginRequired;
        }

        let outcome = match &tab {
            ChatTab::PrivateChat(chat_id) => {
                self.open_tab(chat_id);
                self.resolved = None;
                SelectOutcome::ResolveVideo {
                    chat_id: chat_id.clone(),
                }
            }
            _ => SelectOutcome::Selected,
        };
        self.selected = tab;
        outcome
    }

    /// Returns `false` if the tab was already open.
    pub fn open_tab(&mut self, chat_id: &str) -> bool {
        if self.open_tabs.iter().any(|id| id == chat_id) {
            return false;
        }
        self.open_tabs.push(chat_id.to_string());
        true
    }

    /// Close a private tab. If it was selected, the first remaining tab is
    /// selected, or the embedded chat when none remain.
    pub fn close_tab(&mut self, chat_id: &str) -> bool {
        let before = self.open_tabs.len();
        self.open_tabs.retain(|id| id != chat_id);
        if self.open_tabs.len() == before {
            return false;
        }

        if self.selected == ChatTab::PrivateChat(chat_id.to_string()) {
            self.selected = match self.open_tabs.first() {
                Some(next) => ChatTab::PrivateChat(next.clone()),
                None => ChatTab::EmbeddedExternalChat,
            };
            self.resolved = None;
        }
        true
    }

    /// Record the video a private chat points at. Ignored if that chat is no
    /// longer selected.
    pub fn apply_resolution(&mut self, chat_id: &str, video_id: Option<String>) -> bool {
        if self.selected != ChatTab::PrivateChat(chat_id.to_string()) {
            return false;
        }
        self.resolved = Some((chat_id.to_string(), video_id));
        true
    }

    /// The selected private chat's video, when it differs from the one
    /// playing.
    pub fn adoption_offer(&self) -> Option<&str> {
        let (chat_id, video_id) = self.resolved.as_ref()?;
        if self.selected != ChatTab::PrivateChat(chat_id.clone()) {
            return None;
        }
        let video_id = video_id.as_deref()?;
        (self.current_video_id.as_deref() != Some(video_id)).then_some(video_id)
    }

    /// Switch the player to the offered video. Returns the adopted id.
    pub fn adopt_private_video(&mut self) -> Option<String> {
        let video_id = self.adoption_offer()?.to_string();
        self.current_video_id = Some(video_id.clone());
        Some(video_id)
    }

    pub fn view(&self, embed_domain: &str) -> ChatView {
        match &self.selected {
            ChatTab::EmbeddedExternalChat => ChatView::Embedded {
                src: self
                    .current_video_id
                    .as_deref()
                    .map(|id| chat_embed_url(id, embed_domain)),
            },
            ChatTab::NativeChat => ChatView::Native {
                video_id: self.current_video_id.clone(),
            },
            ChatTab::PrivateChat(chat_id) => ChatView::Private {
                chat_id: chat_id.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private(id: &str) -> ChatTab {
        ChatTab::PrivateChat(id.into())
    }

    #[test]
    fn starts_on_embedded_chat() {
        let selector = ChatSelector::new(Some("abc123".into()));
        assert_eq!(selector.selected(), &ChatTab::EmbeddedExternalChat);
        assert_eq!(
            selector.view("fans.example"),
            ChatView::Embedded {
                src: Some(
                    "https://www.youtube.com/live_chat?v=abc123&embed_domain=fans.example".into()
                )
            }
        );
        assert_eq!(
            ChatSelector::default().view("x"),
            ChatView::Embedded { src: None }
        );
    }

    #[test]
    fn native_and_private_need_login() {
        let mut selector = ChatSelector::new(None);
        assert_eq!(
            selector.select(ChatTab::NativeChat, false),
            SelectOutcome::LoginRequired
        );
        assert_eq!(
            selector.select(private("c1"), false),
            SelectOutcome::LoginRequired
        );
        assert_eq!(selector.selected(), &ChatTab::EmbeddedExternalChat);
        assert!(selector.open_tabs().is_empty());

        assert_eq!(
            selector.select(ChatTab::NativeChat, true),
            SelectOutcome::Selected
        );
        assert_eq!(
            selector.select(ChatTab::EmbeddedExternalChat, false),
            SelectOutcome::Selected
        );
    }

    #[test]
    fn selecting_private_chat_opens_tab_once() {
        let mut selector = ChatSelector::new(None);
        assert_eq!(
            selector.select(private("c1"), true),
            SelectOutcome::ResolveVideo {
                chat_id: "c1".into()
            }
        );
        selector.select(private("c1"), true);
        assert!(!selector.open_tab("c1"));
        assert_eq!(selector.open_tabs(), ["c1".to_string()]);
    }

    #[test]
    fn closing_selected_tab_falls_back() {
        let mut selector = ChatSelector::new(None);
        selector.open_tab("a");
        selector.open_tab("b");
        selector.open_tab("c");
        selector.select(private("b"), true);

        assert!(selector.close_tab("b"));
        assert_eq!(selector.selected(), &private("a"));

        assert!(selector.close_tab("c"));
        assert_eq!(selector.selected(), &private("a"));

        assert!(selector.close_tab("a"));
        assert_eq!(selector.selected(), &ChatTab::EmbeddedExternalChat);
        assert!(!selector.close_tab("a"));
    }

    #[test]
    fn selection_never_points_at_a_closed_tab() {
        // Deterministic pseudo-random open/select/close sequence.
        let mut selector = ChatSelector::new(None);
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..2000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let id = format!("chat{}", seed % 5);
            match (seed >> 8) % 3 {
                0 => {
                    selector.open_tab(&id);
                }
                1 => {
                    selector.select(private(&id), true);
                }
                _ => {
                    selector.close_tab(&id);
                }
            }

            if let ChatTab::PrivateChat(selected) = selector.selected() {
                assert!(selector.open_tabs().contains(selected));
            }
            let mut unique = selector.open_tabs().to_vec();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), selector.open_tabs().len());
        }
    }

    #[test]
    fn offers_private_chat_video_when_different() {
        let mut selector = ChatSelector::new(Some("current".into()));
        selector.select(private("c1"), true);
        assert_eq!(selector.adoption_offer(), None);

        assert!(selector.apply_resolution("c1", Some("other".into())));
        assert_eq!(selector.adoption_offer(), Some("other"));
        // Offering does not switch by itself.
        assert_eq!(selector.current_video_id(), Some("current"));

        assert_eq!(selector.adopt_private_video().as_deref(), Some("other"));
        assert_eq!(selector.current_video_id(), Some("other"));
        assert_eq!(selector.adoption_offer(), None);
    }

    #[test]
    fn no_offer_for_same_or_unparseable_video() {
        let mut selector = ChatSelector::new(Some("same".into()));
        selector.select(private("c1"), true);
        selector.apply_resolution("c1", Some("same".into()));
        assert_eq!(selector.adoption_offer(), None);

        selector.apply_resolution("c1", None);
        assert_eq!(selector.adoption_offer(), None);
        assert_eq!(selector.adopt_private_video(), None);
    }

    #[test]
    fn stale_resolution_is_ignored() {
        let mut selector = ChatSelector::new(None);
        selector.select(private("c1"), true);
        selector.select(ChatTab::NativeChat, true);
        assert!(!selector.apply_resolution("c1", Some("v".into())));
        assert_eq!(selector.adoption_offer(), None);
    }

    #[test]
    fn views_follow_selection() {
        let mut selector = ChatSelector::new(Some("abc".into()));
        selector.select(ChatTab::NativeChat, true);
        assert_eq!(
            selector.view("d"),
            ChatView::Native {
                video_id: Some("abc".into())
            }
        );
        selector.select(private("c9"), true);
        assert_eq!(
            selector.view("d"),
            ChatView::Private {
                chat_id: "c9".into()
            }
        );
    }
}
