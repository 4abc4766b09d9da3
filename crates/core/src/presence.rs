//! Best-effort "who is here" feed per document.
//!
//! Entries are refreshed by heartbeats and treated as gone once
//! `now - last_seen` reaches the TTL, whether or not the client ever sent a
//! clean leave. Presence has no locking semantics; any number of users may
//! be active at once.

use std::collections::{BTreeMap, HashMap};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use crate::types::{Timestamp, UserId};

/// Presence entries older than this many seconds are considered stale.
pub const PRESENCE_TTL_SECS: i64 = 300;

/// Cursor/avatar colours handed out to collaborators.
pub const PRESENCE_COLORS: &[&str] = &[
    "#EF4444", "#F97316", "#EAB308", "#22C55E", "#14B8A6", "#3B82F6", "#8B5CF6", "#EC4899",
];

/// Stable colour for a user, so every client paints them the same.
pub fn color_for(user_id: &str) -> &'static str {
    // FNV-1a
    let hash = user_id
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
            (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
        });
    PRESENCE_COLORS[(hash % PRESENCE_COLORS.len() as u64) as usize]
}

/// What a client reports about itself on heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceInfo {
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
    pub color: String,
    pub typing: bool,
    pub typing_at: Option<Timestamp>,
    pub last_seen: Timestamp,
}

impl PresenceEntry {
    pub fn is_live(&self, now: Timestamp, ttl: Duration) -> bool {
        now - self.last_seen < ttl
    }

    /// The typing flag has its own clock and lapses on the same TTL; there is
    /// no "stopped typing" event to wait for.
    pub fn is_typing(&self, now: Timestamp, ttl: Duration) -> bool {
        self.typing && self.typing_at.is_some_and(|at| now - at < ttl)
    }
}

type EntryMap = BTreeMap<UserId, PresenceEntry>;

/// Live view of one document's presence map.
pub struct PresenceFeed {
    rx: watch::Receiver<EntryMap>,
    ttl: Duration,
}

impl PresenceFeed {
    /// Entries live at `now`, with typing flags resolved against the TTL.
    pub fn active(&self, now: Timestamp) -> Vec<PresenceEntry> {
        live_entries(&self.rx.borrow(), now, self.ttl)
    }

    /// Wait for the next change. Returns `false` once the tracker dropped
    /// the document.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

fn live_entries(entries: &EntryMap, now: Timestamp, ttl: Duration) -> Vec<PresenceEntry> {
    entries
        .values()
        .filter(|e| e.is_live(now, ttl))
        .map(|e| PresenceEntry {
            typing: e.is_typing(now, ttl),
            ..e.clone()
        })
        .collect()
}

/// Presence maps for every open document, keyed by document id.
pub struct PresenceTracker {
    documents: RwLock<HashMap<String, watch::Sender<EntryMap>>>,
    ttl: Duration,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(PRESENCE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn sender(&self, document_id: &str) -> watch::Sender<EntryMap> {
        if let Some(tx) = self.documents.read().await.get(document_id) {
            return tx.clone();
        }
        self.documents
            .write()
            .await
            .entry(document_id.to_string())
            .or_insert_with(|| watch::channel(EntryMap::new()).0)
            .clone()
    }

    /// Record that `user_id` is viewing the document. Typing state is kept.
    pub async fn heartbeat(
        &self,
        document_id: &str,
        user_id: &str,
        info: PresenceInfo,
        now: Timestamp,
    ) {
        let tx = self.sender(document_id).await;
        tx.send_modify(|entries| {
            let entry = entries
                .entry(user_id.to_string())
                .or_insert_with(|| PresenceEntry {
                    user_id: user_id.to_string(),
                    name: String::new(),
                    avatar_url: None,
                    color: color_for(user_id).to_string(),
                    typing: false,
                    typing_at: None,
                    last_seen: now,
                });
            entry.name = info.name;
            entry.avatar_url = info.avatar_url;
            entry.last_seen = now;
        });
    }

    /// Update the typing flag without touching `last_seen`. Returns `false`
    /// when the user has no presence entry on the document.
    pub async fn set_typing(
        &self,
        document_id: &str,
        user_id: &str,
        typing: bool,
        now: Timestamp,
    ) -> bool {
        let Some(tx) = self.documents.read().await.get(document_id).cloned() else {
            return false;
        };
        tx.send_if_modified(|entries| match entries.get_mut(user_id) {
            Some(entry) => {
                entry.typing = typing;
                entry.typing_at = Some(now);
                true
            }
            None => false,
        })
    }

    /// Clean leave. Returns whether an entry was removed.
    pub async fn clear(&self, document_id: &str, user_id: &str) -> bool {
        let Some(tx) = self.documents.read().await.get(document_id).cloned() else {
            return false;
        };
        tx.send_if_modified(|entries| entries.remove(user_id).is_some())
    }

    pub async fn subscribe(&self, document_id: &str) -> PresenceFeed {
        PresenceFeed {
            rx: self.sender(document_id).await.subscribe(),
            ttl: self.ttl,
        }
    }

    pub async fn active(&self, document_id: &str, now: Timestamp) -> Vec<PresenceEntry> {
        match self.documents.read().await.get(document_id) {
            Some(tx) => live_entries(&tx.borrow(), now, self.ttl),
            None => Vec::new(),
        }
    }

    /// Drop stale entries everywhere, and forget documents nobody is present
    /// on or subscribed to. Returns the number of entries removed.
    pub async fn prune(&self, now: Timestamp) -> usize {
        let ttl = self.ttl;
        let mut documents = self.documents.write().await;
        let mut removed = 0;
        for tx in documents.values() {
            tx.send_if_modified(|entries| {
                let before = entries.len();
                entries.retain(|_, e| e.is_live(now, ttl));
                removed += before - entries.len();
                before != entries.len()
            });
        }
        documents.retain(|_, tx| !tx.borrow().is_empty() || tx.receiver_count() > 0);
        removed
    }
}
