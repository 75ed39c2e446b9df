//! Collaboration sessions and the presence data attached to them.
//!
//! Session records live in the same [`KeyValueStore`] as the offline cache.
//! Every committed change is published on the [`EventBus`] for whatever
//! transport relays presence to other clients.

mod access;
mod palette;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::clock::{Clock, IdGenerator, RandomIdGenerator, SystemClock};
use crate::config::CoreConfig;
use crate::db::{Collection, IndexLookup, KeyValueStore, StoredRecord};
use crate::error::{Error, Result};
use crate::events::{CollabEvent, EventBus};
use crate::models::{
    ActiveUser, CollaborationSession, CursorPosition, JoinedSession, PresenceStatus, SessionId,
};
use crate::util::require_identifier;

pub use access::{AllowAll, DisplayNameResolver, PermissionChecker, Role, UserIdAsName};
pub use palette::assign_color;

/// Tracks collaboration sessions per document
pub struct SessionManager<S, P, N> {
    store: Arc<S>,
    permissions: P,
    names: N,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    events: EventBus,
    palette: Vec<String>,
    liveness_window_ms: i64,
    /// Serializes session writes; rejoin and color choice need a stable view
    roster: Mutex<()>,
}

impl<S, P, N> SessionManager<S, P, N>
where
    S: KeyValueStore,
    P: PermissionChecker,
    N: DisplayNameResolver,
{
    /// Create a manager using the palette and liveness window from `config`.
    pub fn new(store: Arc<S>, permissions: P, names: N, config: &CoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            permissions,
            names,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIdGenerator),
            events: EventBus::new(config.event_capacity),
            palette: config.palette.clone(),
            liveness_window_ms: config.liveness_window_millis(),
            roster: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Join a document, or refresh the caller's existing session on it.
    ///
    /// Requires at least [`Role::Viewer`]. A rejoin keeps the session id,
    /// color, and join time.
    pub async fn join_session(&self, document_id: &str, user_id: &str) -> Result<JoinedSession> {
        let document_id = require_identifier(document_id, "document_id")?;
        let user_id = require_identifier(user_id, "user_id")?;
        self.require_role(&document_id, &user_id, Role::Viewer)
            .await?;
        let user_name = self.names.resolve_display_name(&user_id).await?;

        let _roster = self.roster.lock().await;
        let now = self.clock.now_millis();
        let sessions = self.list_sessions(&document_id).await?;

        let session = if let Some(existing) = sessions.iter().find(|s| s.user_id == user_id) {
            tracing::debug!("User {user_id} rejoined document {document_id}");
            CollaborationSession {
                presence_status: PresenceStatus::Active,
                last_activity: now,
                ..existing.clone()
            }
        } else {
            let used = sessions
                .iter()
                .map(|s| s.user_color.as_str())
                .collect::<HashSet<_>>();
            let user_color = assign_color(&self.palette, &used)
                .ok_or_else(|| Error::Config("palette must not be empty".to_string()))?
                .to_string();
            CollaborationSession {
                id: self.ids.session_id(),
                document_id,
                user_id,
                user_color,
                cursor_position: None,
                presence_status: PresenceStatus::Active,
                last_activity: now,
                joined_at: now,
            }
        };
        self.write_session(&session).await?;

        tracing::info!(
            "User {} joined document {} as {}",
            session.user_id,
            session.document_id,
            session.user_color
        );
        self.events.publish(CollabEvent::SessionJoined {
            session_id: session.id,
            document_id: session.document_id.clone(),
            user_id: session.user_id.clone(),
            user_color: session.user_color.clone(),
        });
        Ok(JoinedSession { session, user_name })
    }

    /// Leave a session owned by `user_id`.
    pub async fn leave_session(&self, session_id: &SessionId, user_id: &str) -> Result<()> {
        let _roster = self.roster.lock().await;
        let session = self.owned_session(session_id, user_id).await?;
        self.store
            .delete(Collection::Sessions, &session_id.as_str())
            .await?;

        tracing::info!(
            "User {} left document {}",
            session.user_id,
            session.document_id
        );
        self.events.publish(CollabEvent::SessionLeft {
            session_id: session.id,
            document_id: session.document_id,
            user_id: session.user_id,
        });
        Ok(())
    }

    /// Collaborators active within the liveness window, earliest joiner first.
    pub async fn get_active_sessions(
        &self,
        document_id: &str,
        user_id: &str,
    ) -> Result<Vec<ActiveUser>> {
        let document_id = require_identifier(document_id, "document_id")?;
        let user_id = require_identifier(user_id, "user_id")?;
        self.require_role(&document_id, &user_id, Role::Viewer)
            .await?;

        let now = self.clock.now_millis();
        let mut live = self
            .list_sessions(&document_id)
            .await?
            .into_iter()
            .filter(|session| session.is_live(now, self.liveness_window_ms))
            .collect::<Vec<_>>();
        live.sort_by_key(|session| session.joined_at);

        let mut users = Vec::with_capacity(live.len());
        for session in live {
            let user_name = self.names.resolve_display_name(&session.user_id).await?;
            users.push(session.into_active_user(user_name));
        }
        Ok(users)
    }

    /// Record a cursor move in the caller's session.
    pub async fn broadcast_cursor_position(
        &self,
        session_id: &SessionId,
        user_id: &str,
        position: CursorPosition,
    ) -> Result<CollaborationSession> {
        let _roster = self.roster.lock().await;
        let mut session = self.owned_session(session_id, user_id).await?;
        session.cursor_position = Some(position);
        session.last_activity = self.clock.now_millis();
        self.write_session(&session).await?;

        self.events.publish(CollabEvent::CursorMoved {
            session_id: session.id,
            document_id: session.document_id.clone(),
            user_id: session.user_id.clone(),
            position,
        });
        Ok(session)
    }

    /// Record a presence change in the caller's session.
    pub async fn broadcast_presence(
        &self,
        session_id: &SessionId,
        user_id: &str,
        presence: PresenceStatus,
    ) -> Result<CollaborationSession> {
        let _roster = self.roster.lock().await;
        let mut session = self.owned_session(session_id, user_id).await?;
        session.presence_status = presence;
        session.last_activity = self.clock.now_millis();
        self.write_session(&session).await?;

        tracing::debug!(
            "User {} is {} on {}",
            session.user_id,
            presence.as_str(),
            session.document_id
        );
        self.events.publish(CollabEvent::PresenceChanged {
            session_id: session.id,
            document_id: session.document_id.clone(),
            user_id: session.user_id.clone(),
            presence,
        });
        Ok(session)
    }

    /// Delete sessions outside the liveness window, freeing their colors.
    pub async fn prune_stale_sessions(&self, document_id: &str) -> Result<u64> {
        let document_id = require_identifier(document_id, "document_id")?;
        let _roster = self.roster.lock().await;
        let now = self.clock.now_millis();

        let stale = self
            .list_sessions(&document_id)
            .await?
            .into_iter()
            .filter(|session| !session.is_live(now, self.liveness_window_ms))
            .map(|session| (Collection::Sessions, session.id.as_str()))
            .collect::<Vec<_>>();

        let removed = self.store.delete_batch(&stale).await?;
        if removed > 0 {
            tracing::info!("Pruned {removed} stale sessions on {document_id}");
        }
        Ok(removed)
    }

    /// Every session record on a document, stale ones included, in join order.
    pub async fn list_sessions(&self, document_id: &str) -> Result<Vec<CollaborationSession>> {
        self.store
            .find(Collection::Sessions, IndexLookup::DocumentId(document_id))
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }

    async fn require_role(&self, document_id: &str, user_id: &str, role: Role) -> Result<()> {
        if self
            .permissions
            .has_permission(document_id, user_id, role)
            .await?
        {
            Ok(())
        } else {
            tracing::warn!("User {user_id} lacks {role} on document {document_id}");
            Err(Error::InsufficientPermission {
                document_id: document_id.to_string(),
                user_id: user_id.to_string(),
            })
        }
    }

    /// Load a session, treating another user's session as missing.
    async fn owned_session(
        &self,
        session_id: &SessionId,
        user_id: &str,
    ) -> Result<CollaborationSession> {
        let user_id = require_identifier(user_id, "user_id")?;
        let session: Option<CollaborationSession> = self
            .store
            .get(Collection::Sessions, &session_id.as_str())
            .await?
            .map(|record| record.decode())
            .transpose()?;

        session
            .filter(|session| session.user_id == user_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    async fn write_session(&self, session: &CollaborationSession) -> Result<()> {
        let record = StoredRecord::encode(
            session.id.as_str(),
            &session.document_id,
            session.last_activity,
            session,
        )?;
        self.store.put(Collection::Sessions, record).await
    }
}

impl<S, P, N> std::fmt::Debug for SessionManager<S, P, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("palette", &self.palette)
            .field("liveness_window_ms", &self.liveness_window_ms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::DEFAULT_PALETTE;
    use crate::db::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::time::Duration;

    const START: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60_000;

    #[derive(Default)]
    struct FakePermissions {
        roles: HashMap<(String, String), Role>,
    }

    impl FakePermissions {
        fn grant(mut self, document_id: &str, user_id: &str, role: Role) -> Self {
            self.roles
                .insert((document_id.to_string(), user_id.to_string()), role);
            self
        }
    }

    impl PermissionChecker for FakePermissions {
        async fn has_permission(&self, document_id: &str, user_id: &str, role: Role) -> Result<bool> {
            Ok(self
                .roles
                .get(&(document_id.to_string(), user_id.to_string()))
                .is_some_and(|held| held.satisfies(role)))
        }
    }

    struct FakeNames;

    impl DisplayNameResolver for FakeNames {
        async fn resolve_display_name(&self, user_id: &str) -> Result<String> {
            Ok(format!("User {}", user_id.to_uppercase()))
        }
    }

    type TestManager = SessionManager<MemoryStore, FakePermissions, FakeNames>;

    fn manager_with(permissions: FakePermissions) -> (TestManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let manager = SessionManager::new(
            Arc::new(MemoryStore::new()),
            permissions,
            FakeNames,
            &CoreConfig::default(),
        )
        .unwrap()
        .with_clock(clock.clone());
        (manager, clock)
    }

    fn viewers(document_id: &str, users: &[&str]) -> FakePermissions {
        users.iter().fold(FakePermissions::default(), |acc, user| {
            acc.grant(document_id, user, Role::Viewer)
        })
    }

    #[tokio::test]
    async fn join_creates_session_with_first_palette_color() {
        let (manager, _clock) = manager_with(viewers("d1", &["u1"]));
        let mut rx = manager.events().subscribe();

        let joined = manager.join_session("d1", "u1").await.unwrap();
        assert_eq!(joined.user_name, "User U1");
        assert_eq!(joined.session.user_color, DEFAULT_PALETTE[0]);
        assert_eq!(joined.session.presence_status, PresenceStatus::Active);
        assert_eq!(joined.session.joined_at, START);
        assert_eq!(joined.session.cursor_position, None);

        assert_eq!(
            rx.recv().await.unwrap(),
            CollabEvent::SessionJoined {
                session_id: joined.session.id,
                document_id: "d1".to_string(),
                user_id: "u1".to_string(),
                user_color: DEFAULT_PALETTE[0].to_string(),
            }
        );
    }

    #[tokio::test]
    async fn join_without_permission_writes_nothing() {
        let (manager, _clock) = manager_with(viewers("other", &["u1"]));

        let error = manager.join_session("d1", "u1").await.unwrap_err();
        assert!(matches!(error, Error::InsufficientPermission { .. }));
        assert!(manager.list_sessions("d1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejoin_updates_in_place() {
        let (manager, clock) = manager_with(viewers("d1", &["u1"]));
        let first = manager.join_session("d1", "u1").await.unwrap().session;
        manager
            .broadcast_presence(&first.id, "u1", PresenceStatus::Away)
            .await
            .unwrap();

        clock.advance(MINUTE);
        let second = manager.join_session("d1", "u1").await.unwrap().session;

        assert_eq!(second.id, first.id);
        assert_eq!(second.user_color, first.user_color);
        assert_eq!(second.joined_at, START);
        assert_eq!(second.last_activity, START + MINUTE);
        assert_eq!(second.presence_status, PresenceStatus::Active);
        assert_eq!(manager.list_sessions("d1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn colors_are_unique_while_palette_has_room() {
        let users = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let (manager, _clock) = manager_with(viewers("d1", &users));

        let mut colors = Vec::new();
        for user in users {
            colors.push(manager.join_session("d1", user).await.unwrap().session.user_color);
        }
        assert_eq!(colors, DEFAULT_PALETTE.to_vec());
    }

    #[tokio::test]
    async fn concurrent_joins_get_distinct_colors() {
        let (manager, _clock) = manager_with(viewers("d1", &["u1", "u2"]));
        let (a, b) = tokio::join!(manager.join_session("d1", "u1"), manager.join_session("d1", "u2"));
        assert_ne!(a.unwrap().session.user_color, b.unwrap().session.user_color);
    }

    #[tokio::test]
    async fn colors_are_scoped_per_document() {
        let permissions = viewers("d1", &["u1"]).grant("d2", "u2", Role::Viewer);
        let (manager, _clock) = manager_with(permissions);

        let a = manager.join_session("d1", "u1").await.unwrap().session;
        let b = manager.join_session("d2", "u2").await.unwrap().session;
        assert_eq!(a.user_color, b.user_color);
    }

    #[tokio::test]
    async fn stale_session_keeps_its_color_reserved() {
        let (manager, clock) = manager_with(viewers("d1", &["u1", "u2", "u3"]));
        let stale = manager.join_session("d1", "u1").await.unwrap().session;

        clock.advance(10 * MINUTE);
        let fresh = manager.join_session("d1", "u2").await.unwrap().session;
        assert_ne!(fresh.user_color, stale.user_color);
        assert_eq!(fresh.user_color, DEFAULT_PALETTE[1]);

        let active = manager.get_active_sessions("d1", "u2").await.unwrap();
        assert_eq!(
            active.iter().map(|u| u.user_id.as_str()).collect::<Vec<_>>(),
            vec!["u2"]
        );

        // Pruning frees the color for the next newcomer
        assert_eq!(manager.prune_stale_sessions("d1").await.unwrap(), 1);
        let next = manager.join_session("d1", "u3").await.unwrap().session;
        assert_eq!(next.user_color, stale.user_color);
    }

    #[tokio::test]
    async fn active_sessions_respect_window_and_join_order() {
        let (manager, clock) = manager_with(viewers("d1", &["u1", "u2", "u3"]));
        let first = manager.join_session("d1", "u1").await.unwrap().session;
        clock.advance(MINUTE);
        manager.join_session("d1", "u2").await.unwrap();
        clock.advance(MINUTE);
        manager.join_session("d1", "u3").await.unwrap();

        // u1 keeps activity fresh, u2 falls just outside the window
        clock.advance(3 * MINUTE);
        manager
            .broadcast_cursor_position(&first.id, "u1", CursorPosition::caret(3))
            .await
            .unwrap();
        clock.advance(MINUTE + 1);

        let active = manager.get_active_sessions("d1", "u1").await.unwrap();
        assert_eq!(
            active.iter().map(|u| u.user_id.as_str()).collect::<Vec<_>>(),
            vec!["u1", "u3"]
        );
        assert_eq!(active[0].user_name, "User U1");
        assert_eq!(active[0].cursor_position, Some(CursorPosition::caret(3)));
    }

    #[tokio::test]
    async fn active_sessions_require_viewer() {
        let (manager, _clock) = manager_with(viewers("d1", &["u1"]));
        manager.join_session("d1", "u1").await.unwrap();

        let error = manager.get_active_sessions("d1", "intruder").await.unwrap_err();
        assert!(matches!(error, Error::InsufficientPermission { .. }));
    }

    #[tokio::test]
    async fn custom_liveness_window_is_honored() {
        let clock = Arc::new(ManualClock::new(START));
        let config = CoreConfig::default().with_liveness_window(Duration::from_secs(30));
        let manager = SessionManager::new(
            Arc::new(MemoryStore::new()),
            viewers("d1", &["u1"]),
            FakeNames,
            &config,
        )
        .unwrap()
        .with_clock(clock.clone());

        manager.join_session("d1", "u1").await.unwrap();
        clock.advance(31_000);
        assert!(manager.get_active_sessions("d1", "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn leave_is_scoped_to_owner() {
        let (manager, _clock) = manager_with(viewers("d1", &["u1", "u2"]));
        let session = manager.join_session("d1", "u1").await.unwrap().session;
        let mut rx = manager.events().subscribe();

        let error = manager.leave_session(&session.id, "u2").await.unwrap_err();
        assert!(matches!(error, Error::SessionNotFound(_)));
        assert_eq!(manager.list_sessions("d1").await.unwrap().len(), 1);

        manager.leave_session(&session.id, "u1").await.unwrap();
        assert!(manager.list_sessions("d1").await.unwrap().is_empty());
        assert!(matches!(
            rx.recv().await.unwrap(),
            CollabEvent::SessionLeft { session_id, .. } if session_id == session.id
        ));

        let again = manager.leave_session(&session.id, "u1").await.unwrap_err();
        assert!(matches!(again, Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn cursor_and_presence_updates_are_scoped_and_published() {
        let (manager, clock) = manager_with(viewers("d1", &["u1"]));
        let session = manager.join_session("d1", "u1").await.unwrap().session;
        let mut rx = manager.events().subscribe();
        clock.advance(500);

        let position = CursorPosition { anchor: 2, head: 9 };
        let moved = manager
            .broadcast_cursor_position(&session.id, "u1", position)
            .await
            .unwrap();
        assert_eq!(moved.cursor_position, Some(position));
        assert_eq!(moved.last_activity, START + 500);

        let idle = manager
            .broadcast_presence(&session.id, "u1", PresenceStatus::Idle)
            .await
            .unwrap();
        assert_eq!(idle.presence_status, PresenceStatus::Idle);
        assert_eq!(idle.cursor_position, Some(position));

        assert!(matches!(
            rx.recv().await.unwrap(),
            CollabEvent::CursorMoved { position: p, .. } if p == position
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            CollabEvent::PresenceChanged { presence: PresenceStatus::Idle, .. }
        ));

        let error = manager
            .broadcast_presence(&session.id, "someone-else", PresenceStatus::Away)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::SessionNotFound(_)));
        let error = manager
            .broadcast_cursor_position(&SessionId::new(), "u1", position)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn blank_user_id_is_invalid_input_on_session_updates() {
        let (manager, _clock) = manager_with(viewers("d1", &["u1"]));
        let session = manager.join_session("d1", "u1").await.unwrap().session;

        let leave = manager.leave_session(&session.id, "  ").await.unwrap_err();
        assert!(matches!(leave, Error::InvalidInput(_)));
        let cursor = manager
            .broadcast_cursor_position(&session.id, "", CursorPosition::caret(1))
            .await
            .unwrap_err();
        assert!(matches!(cursor, Error::InvalidInput(_)));
        let presence = manager
            .broadcast_presence(&session.id, "\u{0}", PresenceStatus::Idle)
            .await
            .unwrap_err();
        assert!(matches!(presence, Error::InvalidInput(_)));

        // Padded ids are trimmed, matching join_session
        let moved = manager
            .broadcast_cursor_position(&session.id, " u1 ", CursorPosition::caret(2))
            .await
            .unwrap();
        assert_eq!(moved.cursor_position, Some(CursorPosition::caret(2)));
        assert_eq!(manager.list_sessions("d1").await.unwrap().len(), 1);
    }

    #[test]
    fn empty_palette_is_rejected_at_construction() {
        let config = CoreConfig::default().with_palette(Vec::<String>::new());
        let result = SessionManager::new(
            Arc::new(MemoryStore::new()),
            FakePermissions::default(),
            FakeNames,
            &config,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
