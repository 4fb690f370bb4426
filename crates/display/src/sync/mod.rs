//! The sync coordinator.
//!
//! Owns the application state of one display instance and runs the
//! mutation pipeline every state change goes through: validate, apply,
//! mirror to the local cache, run the post-mutation hooks, push to the
//! remote store in the background, and schedule the force-update broadcast
//! that nudges other instances.
//!
//! Remote pushes are deliberately fire-and-forget: the local save is
//! already durable when the push starts, a push failure is logged (and
//! optionally surfaced as a warning notice) but never reverts local state.

pub mod hooks;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use barberboard_core::{
    Background, BoardSnapshot, BoardState, ChairStatus, Contact, ContactError, ContactId,
    ContactKind, ContactList, Gallery, ImageId, NewImage, SessionId, SettingsError, SettingsPatch,
    ShopSettings, VersionMarker, version_token,
};

use crate::config::SyncConfig;
use crate::notify::{Notice, Notifier};
use crate::reload::{ReloadGate, ReloadHandler, ReloadReason};
use crate::store::{
    LocalStore, LocalStoreError, RecordPath, RemoteError, RemoteStore, Subscription, keys,
};
use crate::tabs::{TabChannel, TabMessage};

pub use hooks::{HookRegistry, MutationKind, QUEUE_PRESSURE_THRESHOLD, queue_pressure};

/// Mutation failures. Everything here is a rejected input; failures of the
/// remote store never surface as errors on the mutation path.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Contact(#[from] ContactError),
    #[error("background image is larger than {max} bytes", max = Background::MAX_BYTES)]
    BackgroundTooLarge,
    #[error("no chair numbered {0}")]
    UnknownChair(u32),
}

/// The whole of one display instance's application state.
///
/// There are no ambient globals: everything the display renders lives here
/// and every mutation goes through [`SyncCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppData {
    pub settings: ShopSettings,
    pub contacts: ContactList,
    pub gallery: Gallery,
    pub background: Option<Background>,
    pub board: BoardState,
}

impl Default for AppData {
    fn default() -> Self {
        let settings = ShopSettings::default();
        let board = BoardState::with_chairs(settings.chair_count);
        Self {
            settings,
            contacts: ContactList::new(),
            gallery: Gallery::new(),
            background: None,
            board,
        }
    }
}

/// Coordinates one display instance's state with the shared store and with
/// other instances. Cheaply cloneable; clones share the same state.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: SyncConfig,
    data: RwLock<AppData>,
    local: LocalStore,
    remote: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    reloader: Arc<dyn ReloadHandler>,
    hooks: std::sync::RwLock<HookRegistry>,
    tabs: TabChannel,
    session: SessionId,
    language: std::sync::Mutex<String>,
    reload_gate: ReloadGate,
    last_seen_version: std::sync::Mutex<Option<String>>,
    version_subscription: std::sync::Mutex<Option<Subscription>>,
    force_update_tx: mpsc::Sender<()>,
    force_update_rx: std::sync::Mutex<Option<mpsc::Receiver<()>>>,
    pushes: std::sync::Mutex<Vec<JoinHandle<()>>>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    started: AtomicBool,
}

impl SyncCoordinator {
    /// Build a coordinator: open the local cache, load (or mint) the
    /// session id, and seed state from the cache. Nothing touches the
    /// remote store until [`start`](Self::start).
    ///
    /// The queue-pressure hook is installed by default; register more with
    /// [`register_hook`](Self::register_hook).
    ///
    /// # Errors
    ///
    /// Returns an error when the cache directory cannot be created.
    pub fn new(
        config: SyncConfig,
        remote: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        reloader: Arc<dyn ReloadHandler>,
        tabs: TabChannel,
    ) -> Result<Self, LocalStoreError> {
        let local = LocalStore::open(&config.data_dir)?;

        let session = local
            .get::<SessionId>(keys::USER_SESSION_ID)
            .unwrap_or_else(|| {
                let session = SessionId::generate();
                local.set(keys::USER_SESSION_ID, &session);
                session
            });
        let language = local
            .get::<String>(keys::LANG)
            .unwrap_or_else(|| "ar".to_string());

        let mut data = AppData::default();
        if let Some(settings) = local.get::<ShopSettings>(keys::SETTINGS) {
            data.settings = settings;
        }
        if let Some(contacts) = local.get::<ContactList>(keys::CONTACTS) {
            data.contacts = contacts;
        }
        if let Some(gallery) = local.get::<Gallery>(keys::GALLERY) {
            data.gallery = gallery;
        }
        if let Some(background) = local.get::<Background>(keys::BACKGROUND) {
            data.background = Some(background);
        }
        data.board.resize_chairs(data.settings.chair_count);

        let mut registry = HookRegistry::new();
        registry.register("queue-pressure", queue_pressure(Arc::clone(&notifier)));

        let (force_update_tx, force_update_rx) = mpsc::channel(16);
        let (shutdown, _) = watch::channel(false);
        let reload_gate = ReloadGate::new(config.reload_debounce);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                config,
                data: RwLock::new(data),
                local,
                remote,
                notifier,
                reloader,
                hooks: std::sync::RwLock::new(registry),
                tabs,
                session,
                language: std::sync::Mutex::new(language),
                reload_gate,
                last_seen_version: std::sync::Mutex::new(None),
                version_subscription: std::sync::Mutex::new(None),
                force_update_tx,
                force_update_rx: std::sync::Mutex::new(Some(force_update_rx)),
                pushes: std::sync::Mutex::new(Vec::new()),
                tasks: std::sync::Mutex::new(Vec::new()),
                shutdown,
                started: AtomicBool::new(false),
            }),
        })
    }

    /// Bring the instance online: establish the remote session, restore the
    /// board snapshot, pull all records, open live subscriptions, and start
    /// the background tasks.
    ///
    /// Every failure on this path degrades instead of aborting: a rejected
    /// session or failed batch pull leaves the instance serving cached
    /// data, with subscriptions skipped until the next restart.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            warn!("start called twice, ignoring");
            return;
        }

        if let Err(e) = self.inner.remote.ensure_session().await {
            warn!(error = %e, "remote session unavailable, continuing with local data");
        }

        self.restore_board_snapshot().await;

        match self.pull_records().await {
            Ok(()) => {
                for path in RecordPath::RECORDS {
                    match self.inner.remote.subscribe(path).await {
                        Ok(subscription) => self.spawn_record_subscription(path, subscription),
                        Err(e) => warn!(%path, error = %e, "record subscription failed"),
                    }
                }
                match self.inner.remote.subscribe(RecordPath::Version).await {
                    Ok(subscription) => {
                        *lock(&self.inner.version_subscription) = Some(subscription);
                    }
                    Err(e) => warn!(error = %e, "version subscription failed"),
                }
            }
            Err(e) => {
                warn!(error = %e, "initial pull failed, starting with cached data only");
            }
        }

        self.inner.local.set(keys::AUTO_REFRESH_ACTIVE, &true);
        self.spawn_board_autosave();
        self.spawn_force_update_debouncer();
        self.spawn_tab_listener();
        info!(session = %self.inner.session, "sync coordinator started");
    }

    /// Stop background tasks, wait for in-flight pushes, and persist a
    /// final board snapshot.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown.send(true);
        let tasks: Vec<JoinHandle<()>> = lock(&self.inner.tasks).drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        self.flush_pushes().await;
        self.save_board_snapshot().await;
        self.inner.local.set(keys::AUTO_REFRESH_ACTIVE, &false);
        info!("sync coordinator stopped");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// A clone of the current application state, for rendering layers.
    pub async fn snapshot(&self) -> AppData {
        self.inner.data.read().await.clone()
    }

    /// This instance's session id.
    #[must_use]
    pub fn session(&self) -> &SessionId {
        &self.inner.session
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// The device-local language preference (never synced).
    #[must_use]
    pub fn language(&self) -> String {
        lock(&self.inner.language).clone()
    }

    pub fn set_language(&self, lang: impl Into<String>) {
        let lang = lang.into();
        self.inner.local.set(keys::LANG, &lang);
        *lock(&self.inner.language) = lang;
    }

    /// The version token recorded at the last successful pull.
    #[must_use]
    pub fn last_seen_version(&self) -> Option<String> {
        lock(&self.inner.last_seen_version).clone()
    }

    pub(crate) fn record_version_token(&self, token: String) {
        *lock(&self.inner.last_seen_version) = Some(token);
    }

    /// Register a named post-mutation hook; hooks run in registration
    /// order after every mutation.
    pub fn register_hook<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(MutationKind, &AppData) + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(name, callback);
    }

    // =========================================================================
    // Record mutations
    // =========================================================================

    /// Validate and save new shop settings. A changed chair count resizes
    /// the board; chairs that survive keep their status, new chairs start
    /// available.
    ///
    /// # Errors
    ///
    /// Returns the violated constraint; state is unchanged on error.
    #[instrument(skip(self, settings))]
    pub async fn save_settings(&self, settings: ShopSettings) -> Result<(), SyncError> {
        if let Err(e) = settings.validate() {
            self.notify(Notice::error(e.to_string()));
            return Err(e.into());
        }
        {
            let mut data = self.inner.data.write().await;
            data.settings = settings;
            let chair_count = data.settings.chair_count;
            data.board.resize_chairs(chair_count);
            self.inner.local.set(keys::SETTINGS, &data.settings);
            self.inner
                .local
                .set(keys::BOARD_STATE, &data.board.snapshot(Utc::now()));
        }
        self.finish_mutation(
            MutationKind::Settings,
            Some(RecordPath::Settings),
            Some(Notice::success("settings saved")),
        )
        .await;
        Ok(())
    }

    /// Restore the built-in default settings and an empty board.
    #[instrument(skip(self))]
    pub async fn reset_settings(&self) {
        {
            let mut data = self.inner.data.write().await;
            data.settings = ShopSettings::default();
            data.board = BoardState::with_chairs(data.settings.chair_count);
            self.inner.local.set(keys::SETTINGS, &data.settings);
            self.inner.local.remove(keys::BOARD_STATE);
        }
        self.finish_mutation(
            MutationKind::Settings,
            Some(RecordPath::Settings),
            Some(Notice::success("settings reset to defaults")),
        )
        .await;
    }

    /// Add a contact link. At most one contact per kind.
    ///
    /// # Errors
    ///
    /// Rejects a duplicate kind or blank value; the list is unchanged.
    #[instrument(skip(self, value), fields(kind = %kind))]
    pub async fn add_contact(
        &self,
        kind: ContactKind,
        value: impl Into<String>,
    ) -> Result<ContactId, SyncError> {
        let contact = Contact::new(kind, value);
        let id = contact.id;
        let added = {
            let mut data = self.inner.data.write().await;
            let added = data.contacts.add(contact);
            if added.is_ok() {
                self.inner.local.set(keys::CONTACTS, &data.contacts);
            }
            added
        };
        if let Err(e) = added {
            self.notify(Notice::error(e.to_string()));
            return Err(e.into());
        }
        self.finish_mutation(
            MutationKind::Contacts,
            Some(RecordPath::Contacts),
            Some(Notice::success("contact added")),
        )
        .await;
        Ok(id)
    }

    /// Remove a contact by id. Returns whether anything was removed; an
    /// unknown id is a silent no-op.
    #[instrument(skip(self))]
    pub async fn delete_contact(&self, id: ContactId) -> bool {
        let removed = {
            let mut data = self.inner.data.write().await;
            if data.contacts.remove(id).is_err() {
                false
            } else {
                self.inner.local.set(keys::CONTACTS, &data.contacts);
                true
            }
        };
        if removed {
            self.finish_mutation(
                MutationKind::Contacts,
                Some(RecordPath::Contacts),
                Some(Notice::success("contact removed")),
            )
            .await;
        }
        removed
    }

    /// Append a gallery image (already encoded as a data URI) and return
    /// its assigned id.
    #[instrument(skip(self, image), fields(name = %image.name, size = image.size))]
    pub async fn add_gallery_image(&self, image: NewImage) -> ImageId {
        let id = {
            let mut data = self.inner.data.write().await;
            let id = data.gallery.add(image);
            self.inner.local.set(keys::GALLERY, &data.gallery);
            id
        };
        self.finish_mutation(
            MutationKind::Gallery,
            Some(RecordPath::Gallery),
            Some(Notice::success("image added to gallery")),
        )
        .await;
        id
    }

    /// Remove a gallery image by id. Unknown ids are a silent no-op.
    #[instrument(skip(self))]
    pub async fn delete_gallery_image(&self, id: ImageId) -> bool {
        let removed = {
            let mut data = self.inner.data.write().await;
            if data.gallery.remove(id).is_none() {
                false
            } else {
                self.inner.local.set(keys::GALLERY, &data.gallery);
                true
            }
        };
        if removed {
            self.finish_mutation(
                MutationKind::Gallery,
                Some(RecordPath::Gallery),
                Some(Notice::success("image removed from gallery")),
            )
            .await;
        }
        removed
    }

    /// Replace the background image.
    ///
    /// # Errors
    ///
    /// Rejects sources larger than [`Background::MAX_BYTES`].
    #[instrument(skip(self, src, name), fields(size = size))]
    pub async fn set_background(
        &self,
        src: impl Into<String>,
        name: impl Into<String>,
        size: u64,
    ) -> Result<(), SyncError> {
        let Some(background) = Background::new(src, name, size) else {
            self.notify(Notice::error("background image is too large"));
            return Err(SyncError::BackgroundTooLarge);
        };
        {
            let mut data = self.inner.data.write().await;
            self.inner.local.set(keys::BACKGROUND, &background);
            data.background = Some(background);
        }
        self.finish_mutation(
            MutationKind::Background,
            Some(RecordPath::Background),
            Some(Notice::success("background updated")),
        )
        .await;
        Ok(())
    }

    /// Clear the background image; the display falls back to its built-in
    /// look.
    #[instrument(skip(self))]
    pub async fn remove_background(&self) {
        {
            let mut data = self.inner.data.write().await;
            data.background = None;
            self.inner.local.remove(keys::BACKGROUND);
        }
        self.finish_mutation(
            MutationKind::Background,
            Some(RecordPath::Background),
            Some(Notice::success("background removed")),
        )
        .await;
    }

    // =========================================================================
    // Board operations
    // =========================================================================

    /// One more customer in the queue. Returns the new count; at capacity
    /// the count is unchanged and a warning notice is emitted.
    #[instrument(skip(self))]
    pub async fn add_customer(&self) -> u32 {
        let (count, changed) = {
            let mut data = self.inner.data.write().await;
            let before = data.board.waiting_customers;
            let max_waiting = data.settings.max_waiting;
            let count = data.board.adjust_waiting(1, max_waiting);
            (count, count != before)
        };
        if changed {
            self.save_board_snapshot().await;
            self.finish_mutation(MutationKind::Board, None, None).await;
        } else {
            self.notify(Notice::warning("the waiting queue is full"));
        }
        count
    }

    /// One customer leaves the queue. Returns the new count; at zero the
    /// count is unchanged and a warning notice is emitted.
    #[instrument(skip(self))]
    pub async fn remove_customer(&self) -> u32 {
        let (count, changed) = {
            let mut data = self.inner.data.write().await;
            let before = data.board.waiting_customers;
            let max_waiting = data.settings.max_waiting;
            let count = data.board.adjust_waiting(-1, max_waiting);
            (count, count != before)
        };
        if changed {
            self.save_board_snapshot().await;
            self.finish_mutation(MutationKind::Board, None, None).await;
        } else {
            self.notify(Notice::warning("no customers are waiting"));
        }
        count
    }

    /// Empty the queue and free every chair.
    #[instrument(skip(self))]
    pub async fn reset_queue(&self) {
        {
            let mut data = self.inner.data.write().await;
            data.board.reset();
        }
        self.save_board_snapshot().await;
        self.finish_mutation(
            MutationKind::Board,
            None,
            Some(Notice::success("queue reset")),
        )
        .await;
    }

    /// Flip one chair between available and occupied.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownChair`] for a chair number outside the
    /// board.
    #[instrument(skip(self))]
    pub async fn toggle_chair(&self, chair: u32) -> Result<ChairStatus, SyncError> {
        let toggled = {
            let mut data = self.inner.data.write().await;
            data.board.toggle_chair(chair)
        };
        let Some(status) = toggled else {
            self.notify(Notice::error(format!("no chair numbered {chair}")));
            return Err(SyncError::UnknownChair(chair));
        };
        self.save_board_snapshot().await;
        self.finish_mutation(MutationKind::Board, None, None).await;
        Ok(status)
    }

    // =========================================================================
    // Remote synchronization
    // =========================================================================

    /// Pull all records and the version marker in one concurrent batch and
    /// apply them. All-or-nothing: if any fetch fails, nothing is applied.
    ///
    /// # Errors
    ///
    /// The first fetch failure. Decode failures of individual records are
    /// not errors; the record keeps its current value.
    #[instrument(skip(self))]
    pub async fn pull_records(&self) -> Result<(), RemoteError> {
        let remote = &self.inner.remote;
        let (settings, contacts, gallery, background, version) = tokio::join!(
            remote.get(RecordPath::Settings),
            remote.get(RecordPath::Contacts),
            remote.get(RecordPath::Gallery),
            remote.get(RecordPath::Background),
            remote.get(RecordPath::Version),
        );
        let settings = settings?;
        let contacts = contacts?;
        let gallery = gallery?;
        let background = background?;
        let version = version?;

        self.apply_remote(RecordPath::Settings, settings).await;
        self.apply_remote(RecordPath::Contacts, contacts).await;
        self.apply_remote(RecordPath::Gallery, gallery).await;
        self.apply_remote(RecordPath::Background, background).await;

        let token = version_token(&version);
        debug!(token = %token, "recorded version token");
        *lock(&self.inner.last_seen_version) = Some(token);
        Ok(())
    }

    /// Re-pull, gated to at most once per configured window through the
    /// persisted `lastUpdateCheck` marker. Returns whether a pull ran.
    #[instrument(skip(self))]
    pub async fn check_for_updates(&self) -> bool {
        let now = Utc::now().timestamp_millis();
        let gate = i64::try_from(self.inner.config.update_check_gate.as_millis())
            .unwrap_or(i64::MAX);
        let last = self
            .inner
            .local
            .get_millis(keys::LAST_UPDATE_CHECK)
            .unwrap_or(0);
        if now.saturating_sub(last) < gate {
            debug!("update check gated");
            return false;
        }
        self.inner.local.set_millis(keys::LAST_UPDATE_CHECK, now);
        if let Err(e) = self.pull_records().await {
            warn!(error = %e, "update check pull failed");
        }
        true
    }

    /// Push a force-update to every display: write a fresh version marker,
    /// stamp the same-host markers, and post the broadcast message.
    /// Mutations schedule this through a debounce; it can also be invoked
    /// directly ("update all displays" button).
    #[instrument(skip(self))]
    pub async fn force_update_all(&self) {
        let now = Utc::now().timestamp_millis();
        if let Err(e) = self
            .inner
            .remote
            .set(RecordPath::Version, Value::from(now))
            .await
        {
            self.log_push_failure(RecordPath::Version, &e);
        }
        self.inner.local.set_millis(keys::FORCE_REFRESH_ALL, now);
        self.inner.local.set_millis(keys::LAST_GLOBAL_UPDATE, now);
        self.inner.tabs.post(TabMessage::ForceUpdate {
            timestamp: now,
            source: self.inner.session.clone(),
        });
        self.notify(Notice::success("update pushed to all displays"));
        info!("force update broadcast");
    }

    /// React to a force-update from another instance: drop the freshness
    /// markers, re-pull, and hard-reload after the configured delay. The
    /// reload is unconditional and exempt from the reload debounce.
    pub async fn handle_force_update(&self, message: &TabMessage) {
        if message.source() == &self.inner.session {
            return;
        }
        info!(source = %message.source(), "force update received");
        self.inner.local.remove(keys::LAST_SYSTEM_UPDATE);
        self.inner.local.remove(keys::LAST_UPDATE_CHECK);
        if let Err(e) = self.pull_records().await {
            warn!(error = %e, "re-pull after force update failed");
        }
        tokio::time::sleep(self.inner.config.broadcast_reload_delay).await;
        self.reload_now(ReloadReason::ForceUpdate);
    }

    /// Wait for in-flight remote pushes to settle. Shutdown calls this;
    /// tests use it to observe push effects deterministically.
    pub async fn flush_pushes(&self) {
        let pushes: Vec<JoinHandle<()>> = lock(&self.inner.pushes).drain(..).collect();
        for push in pushes {
            let _ = push.await;
        }
    }

    /// Persist the current board (waiting count + chairs) with a
    /// timestamp.
    pub async fn save_board_snapshot(&self) {
        let data = self.inner.data.read().await;
        self.inner
            .local
            .set(keys::BOARD_STATE, &data.board.snapshot(Utc::now()));
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Apply a remote value to state and cache. JSON `null` keeps the
    /// current value (the remote is authoritative only when present), and
    /// so does a value that fails to decode.
    async fn apply_remote(&self, path: RecordPath, value: Value) {
        if value.is_null() {
            debug!(%path, "remote record absent, keeping current value");
            return;
        }
        let mut data = self.inner.data.write().await;
        match path {
            RecordPath::Settings => match serde_json::from_value::<SettingsPatch>(value) {
                Ok(patch) => {
                    data.settings.apply_patch(patch);
                    let chair_count = data.settings.chair_count;
                    data.board.resize_chairs(chair_count);
                    self.inner.local.set(keys::SETTINGS, &data.settings);
                }
                Err(e) => warn!(%path, error = %e, "undecodable remote settings, keeping current"),
            },
            RecordPath::Contacts => match serde_json::from_value::<ContactList>(value) {
                Ok(contacts) => {
                    data.contacts = contacts;
                    self.inner.local.set(keys::CONTACTS, &data.contacts);
                }
                Err(e) => warn!(%path, error = %e, "undecodable remote contacts, keeping current"),
            },
            RecordPath::Gallery => match serde_json::from_value::<Gallery>(value) {
                Ok(gallery) => {
                    data.gallery = gallery;
                    self.inner.local.set(keys::GALLERY, &data.gallery);
                }
                Err(e) => warn!(%path, error = %e, "undecodable remote gallery, keeping current"),
            },
            RecordPath::Background => match serde_json::from_value::<Background>(value) {
                Ok(background) => {
                    self.inner.local.set(keys::BACKGROUND, &background);
                    data.background = Some(background);
                }
                Err(e) => {
                    warn!(%path, error = %e, "undecodable remote background, keeping current");
                }
            },
            RecordPath::Version => {}
        }
    }

    /// The tail of every mutation: hooks, optional remote push, debounced
    /// force-update, optional notice.
    async fn finish_mutation(
        &self,
        kind: MutationKind,
        push: Option<RecordPath>,
        notice: Option<Notice>,
    ) {
        let snapshot = self.snapshot().await;
        self.inner
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .run(kind, &snapshot);

        if let Some(path) = push
            && let Some(value) = self.record_value(&snapshot, path)
        {
            self.spawn_push(path, value);
        }
        self.schedule_force_update();
        if let Some(notice) = notice {
            self.notify(notice);
        }
    }

    /// Serialize the record at `path` for pushing. `None` (with a log) on
    /// the serialization failures that should never happen.
    fn record_value(&self, data: &AppData, path: RecordPath) -> Option<Value> {
        let result = match path {
            RecordPath::Settings => serde_json::to_value(&data.settings),
            RecordPath::Contacts => serde_json::to_value(&data.contacts),
            RecordPath::Gallery => serde_json::to_value(&data.gallery),
            RecordPath::Background => data
                .background
                .as_ref()
                .map_or(Ok(Value::Null), serde_json::to_value),
            RecordPath::Version => Ok(Value::from(VersionMarker::now().as_i64())),
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%path, error = %e, "record failed to serialize, skipping push");
                None
            }
        }
    }

    fn spawn_push(&self, path: RecordPath, value: Value) {
        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            coordinator.push_record(path, value).await;
        });
        lock(&self.inner.pushes).push(handle);
    }

    /// Write the record, then bump the version marker so other displays
    /// notice. Failures are logged and abandoned; the local value stands.
    async fn push_record(&self, path: RecordPath, value: Value) {
        match self.inner.remote.set(path, value).await {
            Ok(()) => {
                debug!(%path, "pushed record");
                let marker = VersionMarker::now();
                if let Err(e) = self
                    .inner
                    .remote
                    .set(RecordPath::Version, Value::from(marker.as_i64()))
                    .await
                {
                    self.log_push_failure(RecordPath::Version, &e);
                }
            }
            Err(e) => self.log_push_failure(path, &e),
        }
    }

    fn log_push_failure(&self, path: RecordPath, error: &RemoteError) {
        if matches!(error, RemoteError::PermissionDenied { .. }) {
            warn!(%path, error = %error, "remote write rejected by store rules");
        } else {
            warn!(%path, error = %error, "remote write failed, local value stands");
        }
        if self.inner.config.notify_on_remote_failures {
            self.notify(Notice::warning(format!(
                "saving {path} to the shared store failed"
            )));
        }
    }

    fn schedule_force_update(&self) {
        // A full queue means a broadcast is already pending
        let _ = self.inner.force_update_tx.try_send(());
    }

    fn notify(&self, notice: Notice) {
        self.inner.notifier.notify(notice);
    }

    pub(crate) fn reload_now(&self, reason: ReloadReason) {
        self.inner.reloader.reload(reason);
    }

    /// Debounced reload: consult the persisted gate, fire or drop.
    /// Returns whether the reload fired.
    pub(crate) fn reload_debounced(&self, reason: ReloadReason) -> bool {
        let now = Utc::now().timestamp_millis();
        if self.inner.reload_gate.permit(&self.inner.local, now) {
            self.inner.reloader.reload(reason);
            true
        } else {
            info!(?reason, "reload suppressed by debounce");
            false
        }
    }

    pub(crate) fn take_version_subscription(&self) -> Option<Subscription> {
        lock(&self.inner.version_subscription).take()
    }

    pub(crate) fn local(&self) -> &LocalStore {
        &self.inner.local
    }

    pub(crate) fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.remote
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    pub(crate) fn register_task(&self, handle: JoinHandle<()>) {
        lock(&self.inner.tasks).push(handle);
    }

    async fn restore_board_snapshot(&self) {
        let Some(snapshot) = self.inner.local.get::<BoardSnapshot>(keys::BOARD_STATE) else {
            return;
        };
        if snapshot.is_fresh(Utc::now()) {
            let mut data = self.inner.data.write().await;
            data.board.restore(snapshot);
            let chair_count = data.settings.chair_count;
            data.board.resize_chairs(chair_count);
            debug!("board snapshot restored");
        } else {
            debug!("discarding stale board snapshot");
            self.inner.local.remove(keys::BOARD_STATE);
        }
    }

    fn spawn_record_subscription(&self, path: RecordPath, mut subscription: Subscription) {
        let coordinator = self.clone();
        let mut shutdown = self.shutdown_signal();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    value = subscription.recv() => match value {
                        Some(value) => coordinator.apply_remote(path, value).await,
                        None => {
                            debug!(%path, "record subscription ended");
                            break;
                        }
                    }
                }
            }
        });
        self.register_task(handle);
    }

    fn spawn_board_autosave(&self) {
        let coordinator = self.clone();
        let mut shutdown = self.shutdown_signal();
        let period = self.inner.config.board_autosave;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately; skip it so the loop saves
            // on the period, not at startup.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => coordinator.save_board_snapshot().await,
                }
            }
        });
        self.register_task(handle);
    }

    fn spawn_force_update_debouncer(&self) {
        let Some(mut rx) = lock(&self.inner.force_update_rx).take() else {
            return;
        };
        let coordinator = self.clone();
        let mut shutdown = self.shutdown_signal();
        let window = self.inner.config.force_update_debounce;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    signal = rx.recv() => {
                        if signal.is_none() {
                            break;
                        }
                        // Trailing debounce: wait out the window, fold any
                        // further signals into this broadcast.
                        tokio::time::sleep(window).await;
                        while rx.try_recv().is_ok() {}
                        coordinator.force_update_all().await;
                    }
                }
            }
        });
        self.register_task(handle);
    }

    fn spawn_tab_listener(&self) {
        let coordinator = self.clone();
        let mut shutdown = self.shutdown_signal();
        let mut rx = self.inner.tabs.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    message = rx.recv() => match message {
                        Ok(message) => coordinator.handle_force_update(&message).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "tab listener lagged, resuming");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
        self.register_task(handle);
    }
}

/// Lock a std mutex, riding through poisoning: state protected by these
/// locks stays usable even if a hook panicked while holding one.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
