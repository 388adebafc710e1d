// ── Marketplace facade ──
//
// Full lifecycle management for one backend project: client setup,
// sign-in, command routing, and live searches. Every view of the app
// (search, detail, dashboard, create/edit) goes through this type.

use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use handover_api::{
    AuthClient, Credentials, Direction, RealtimeConfig, RealtimeHandle, RealtimeMessage,
    RestClient, Rows, SignUp, StorageClient, TableQuery,
};

use crate::command::requests::ListingRow;
use crate::command::{
    Command, CommandEnvelope, CommandResult, ListingDraft, PhotoUpload, UploadProgress,
    validate_photos,
};
use crate::config::BackendConfig;
use crate::error::CoreError;
use crate::model::{
    Dashboard, Listing, ListingDetail, ListingId, NewProfile, Profile, RelatedListing, Review,
    Role, SessionUser, UserId, mean_rating,
};
use crate::reconcile::{ListingSource, LiveSearch};
use crate::search::{LISTINGS_TABLE, SearchCriteria, SearchPage};
use crate::state::{AppState, NotificationKind};

const COMMAND_CHANNEL_SIZE: usize = 64;

const PROFILES_TABLE: &str = "profiles";
const REVIEWS_TABLE: &str = "reviews";
const FAVORITES_TABLE: &str = "wishlists";
const RELATED_LIMIT: u64 = 4;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// What a sign-up produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// Email confirmation is off; the new user is signed in.
    SignedIn(SessionUser),
    /// The account exists but must be confirmed from the email first.
    ConfirmationPending { email: String },
}

// ── Marketplace ──────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<MarketplaceInner>`. Reads go straight to
/// the backend; writes are [`Command`]s processed one at a time by a
/// background task.
#[derive(Clone)]
pub struct Marketplace {
    inner: Arc<MarketplaceInner>,
}

struct MarketplaceInner {
    config: BackendConfig,
    state: Arc<AppState>,
    connection_state: watch::Sender<ConnectionState>,
    command_tx: Mutex<mpsc::Sender<CommandEnvelope>>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    /// Child token for the current connection, replaced on reconnect.
    cancel_child: Mutex<CancellationToken>,
    clients: Mutex<Option<Arc<Clients>>>,
    /// Realtime channel, opened by the first live search.
    realtime: Mutex<Option<RealtimeHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// The four service clients, sharing one credential cell.
struct Clients {
    credentials: Arc<Credentials>,
    rest: RestClient,
    storage: StorageClient,
    auth: AuthClient,
}

impl Marketplace {
    /// Create a new Marketplace. Does NOT connect -- call
    /// [`connect()`](Self::connect) to build clients and start tasks.
    pub fn new(config: BackendConfig, state: Arc<AppState>) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(MarketplaceInner {
                config,
                state,
                connection_state,
                command_tx: Mutex::new(command_tx),
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                clients: Mutex::new(None),
                realtime: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.inner.config
    }

    /// The shared client state this marketplace reports into.
    pub fn state(&self) -> &Arc<AppState> {
        &self.inner.state
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Build the service clients and spawn the command processor.
    ///
    /// Nothing is sent to the backend until the first call.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Connecting);

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let clients = match build_clients(&self.inner.config) {
            Ok(clients) => clients,
            Err(e) => {
                let _ = self.inner.connection_state.send(ConnectionState::Failed);
                return Err(e);
            }
        };
        *self.inner.clients.lock().await = Some(Arc::new(clients));

        let mut handles = self.inner.task_handles.lock().await;
        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let ctrl = self.clone();
            handles.push(tokio::spawn(command_processor_task(ctrl, rx, child)));
        }
        drop(handles);

        self.inner.state.set_loading(false);
        let _ = self.inner.connection_state.send(ConnectionState::Connected);
        info!(url = %self.inner.config.url, "connected to backend");
        Ok(())
    }

    /// Stop background tasks, leave the realtime channel, and end the
    /// session if one is open.
    pub async fn disconnect(&self) {
        // Cancel the child token (not the parent -- allows reconnect).
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        if let Some(handle) = self.inner.realtime.lock().await.take() {
            handle.shutdown();
        }

        if let Some(clients) = self.inner.clients.lock().await.take() {
            if clients.credentials.is_signed_in() {
                if let Err(e) = clients.auth.sign_out().await {
                    warn!(error = %e, "sign-out failed (non-fatal)");
                }
            }
        }
        self.inner.state.set_user(None);

        // Recreate the command channel so a reconnect can spawn a fresh
        // processor; the previous receiver was consumed.
        {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
            *self.inner.command_tx.lock().await = tx;
            *self.inner.command_rx.lock().await = Some(rx);
        }

        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// One-shot: connect, run closure, disconnect.
    ///
    /// Optimized for CLI: the realtime channel is disabled since a
    /// single request-response cycle never needs it.
    pub async fn oneshot<F, Fut, T>(
        config: BackendConfig,
        state: Arc<AppState>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Marketplace) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.realtime_enabled = false;

        let marketplace = Marketplace::new(cfg, state);
        marketplace.connect().await?;
        let result = f(marketplace.clone()).await;
        marketplace.disconnect().await;
        result
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    async fn clients(&self) -> Result<Arc<Clients>, CoreError> {
        self.inner
            .clients
            .lock()
            .await
            .clone()
            .ok_or(CoreError::Disconnected)
    }

    // ── Session ──────────────────────────────────────────────────

    /// Register an account and write its `profiles` row.
    ///
    /// `full_name` and `role` land in the user metadata as well. When the
    /// profile row cannot be written the new session is dropped and a
    /// [`CoreError::PartialFailure`] is returned: the account itself
    /// exists and cannot be removed with the project's public key.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        full_name: Option<&str>,
        role: Role,
    ) -> Result<SignUpOutcome, CoreError> {
        let clients = self.clients().await?;
        let mut metadata = serde_json::json!({ "role": role });
        if let Some(name) = full_name {
            metadata["full_name"] = serde_json::Value::from(name);
        }

        let signed_up = clients.auth.sign_up(email, password, &metadata).await?;
        let user_id = match signed_up {
            SignUp::Session(ref session) => &session.user.id,
            SignUp::Pending(ref user) => &user.id,
        };

        let profile = NewProfile::new(UserId::from(user_id.as_str()), email, full_name, role);
        let written: Result<Vec<serde_json::Value>, _> =
            clients.rest.insert(PROFILES_TABLE, &profile).await;
        if let Err(e) = written {
            warn!(user = %profile.id, error = %e, "profile row not written after sign-up");
            if let Err(e) = clients.auth.sign_out().await {
                debug!(error = %e, "sign-out after failed registration");
            }
            return Err(CoreError::PartialFailure {
                message: format!("Account {email} was created but its profile was not saved: {e}"),
                cleaned_up: false,
            });
        }

        match signed_up {
            SignUp::Session(session) => {
                let user = SessionUser::from(session.user);
                self.inner.state.set_user(Some(user.clone()));
                info!(user = %user.id, %role, "signed up and signed in");
                Ok(SignUpOutcome::SignedIn(user))
            }
            SignUp::Pending(user) => {
                info!(user = %user.id, %role, "sign-up pending email confirmation");
                Ok(SignUpOutcome::ConfirmationPending {
                    email: user.email.unwrap_or_else(|| email.to_owned()),
                })
            }
        }
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SessionUser, CoreError> {
        let clients = self.clients().await?;
        let session = clients.auth.sign_in_with_password(email, password).await?;
        let user = SessionUser::from(session.user);
        self.inner.state.set_user(Some(user.clone()));
        info!(user = %user.id, "signed in");
        Ok(user)
    }

    /// End the session. The local session is cleared even if the
    /// backend call fails.
    pub async fn sign_out(&self) -> Result<(), CoreError> {
        let clients = self.clients().await?;
        let result = clients.auth.sign_out().await;
        self.inner.state.set_user(None);
        result.map_err(CoreError::from)
    }

    pub fn current_user(&self) -> Option<Arc<SessionUser>> {
        self.inner.state.user()
    }

    fn require_user(&self) -> Result<Arc<SessionUser>, CoreError> {
        self.current_user().ok_or(CoreError::NotSignedIn)
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Run one page of a listing search.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<SearchPage, CoreError> {
        let clients = self.clients().await?;
        let rows: Rows<Listing> = clients
            .rest
            .select(LISTINGS_TABLE, &criteria.to_table_query())
            .await?;

        let total = rows
            .total
            .unwrap_or_else(|| u64::try_from(rows.rows.len()).unwrap_or(u64::MAX));
        debug!(total, page = criteria.page(), "search complete");
        Ok(SearchPage {
            items: rows.rows,
            total,
            page: criteria.page(),
        })
    }

    /// Run a search and keep its result current from the realtime channel.
    pub async fn live_search(&self, criteria: SearchCriteria) -> Result<LiveSearch, CoreError> {
        let realtime = if self.inner.config.realtime_enabled {
            Some(self.realtime_subscription().await?)
        } else {
            None
        };
        let cancel = self.inner.cancel_child.lock().await.child_token();
        LiveSearch::start(self.clone(), criteria, realtime, cancel).await
    }

    async fn realtime_subscription(&self) -> Result<broadcast::Receiver<RealtimeMessage>, CoreError> {
        let mut guard = self.inner.realtime.lock().await;
        if let Some(ref handle) = *guard {
            return Ok(handle.subscribe());
        }

        let clients = self.clients().await?;
        let config = &self.inner.config;
        let cancel = self.inner.cancel_child.lock().await.child_token();
        let handle = RealtimeHandle::connect(
            &config.url,
            Arc::clone(&clients.credentials),
            RealtimeConfig::new(config.channel.clone(), LISTINGS_TABLE),
            cancel,
        )?;
        let rx = handle.subscribe();
        *guard = Some(handle);
        info!(channel = %config.channel, "realtime channel opening");
        Ok(rx)
    }

    /// The signed-in donor's own listings, newest first, with totals.
    pub async fn dashboard(&self) -> Result<Dashboard, CoreError> {
        let user = self.require_user()?;
        let clients = self.clients().await?;
        let query = TableQuery::new()
            .eq("user_id", &user.id)
            .order("created_at", Direction::Descending);
        let rows: Rows<Listing> = clients.rest.select(LISTINGS_TABLE, &query).await?;
        Ok(Dashboard::new(rows.rows))
    }

    /// Everything the detail view shows for one listing.
    pub async fn listing_detail(&self, id: &ListingId) -> Result<ListingDetail, CoreError> {
        let clients = self.clients().await?;
        let listing = fetch_listing(&clients, id).await?;

        let owner_query = TableQuery::new()
            .select(Profile::COLUMNS)
            .eq("id", &listing.user_id);
        let reviews_query = TableQuery::new()
            .select(Review::COLUMNS)
            .eq("reviewed_id", &listing.user_id)
            .order("created_at", Direction::Descending);
        let related_query = TableQuery::new()
            .select(RelatedListing::COLUMNS)
            .eq("category", listing.category)
            .neq("id", &listing.id)
            .limit(RELATED_LIMIT);

        let (owner, reviews, related, is_favorite) = tokio::join!(
            clients
                .rest
                .select_one::<Profile>(PROFILES_TABLE, &owner_query),
            clients.rest.select::<Review>(REVIEWS_TABLE, &reviews_query),
            clients
                .rest
                .select::<RelatedListing>(LISTINGS_TABLE, &related_query),
            self.is_favorite(&clients, &listing.id),
        );

        let owner = owner?.unwrap_or_else(|| Profile {
            id: listing.user_id.clone(),
            full_name: None,
            avatar_url: None,
        });
        let reviews = reviews?.rows;

        Ok(ListingDetail {
            owner_rating: mean_rating(&reviews),
            review_count: reviews.len(),
            reviews,
            related: related?.rows,
            is_favorite: is_favorite?,
            owner,
            listing,
        })
    }

    async fn is_favorite(&self, clients: &Clients, id: &ListingId) -> Result<bool, CoreError> {
        let Some(user) = self.current_user() else {
            return Ok(false);
        };
        let query = TableQuery::new()
            .eq("user_id", &user.id)
            .eq("announcement_id", id);
        Ok(clients.rest.count(FAVORITES_TABLE, &query).await? > 0)
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result. The outcome is also posted
    /// to the notification queue.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        self.execute_with_progress(cmd, None).await
    }

    /// [`execute`](Self::execute), reporting photo upload progress.
    pub async fn execute_with_progress(
        &self,
        cmd: Command,
        progress: Option<UploadProgress>,
    ) -> Result<CommandResult, CoreError> {
        if *self.inner.connection_state.borrow() != ConnectionState::Connected {
            return Err(CoreError::Disconnected);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let command_tx = self.inner.command_tx.lock().await.clone();

        command_tx
            .send(CommandEnvelope {
                command: cmd,
                progress,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        let result = rx.await.map_err(|_| CoreError::Disconnected)?;
        self.notify_outcome(&result);
        result
    }

    /// Add or remove a listing from the signed-in user's wishlist.
    /// Returns the new membership.
    pub async fn toggle_favorite(&self, id: ListingId) -> Result<bool, CoreError> {
        match self.execute(Command::ToggleFavorite { id }).await? {
            CommandResult::Favorite { favorite, .. } => Ok(favorite),
            other => Err(CoreError::Internal(format!(
                "unexpected result for favorite toggle: {other:?}"
            ))),
        }
    }

    fn notify_outcome(&self, result: &Result<CommandResult, CoreError>) {
        let state = &self.inner.state;
        match result {
            Ok(CommandResult::Created(listing)) => {
                state.notify(NotificationKind::Success, format!("Listed \"{}\"", listing.title));
            }
            Ok(CommandResult::Updated(listing)) => {
                state.notify(NotificationKind::Success, format!("Updated \"{}\"", listing.title));
            }
            Ok(CommandResult::Deleted { .. }) => {
                state.notify(NotificationKind::Success, "Listing deleted");
            }
            Ok(CommandResult::Favorite { favorite, .. }) => {
                let message = if *favorite {
                    "Added to favorites"
                } else {
                    "Removed from favorites"
                };
                state.notify(NotificationKind::Info, message);
            }
            Err(e) => {
                state.notify(NotificationKind::Error, e.to_string());
            }
        }
    }
}

impl ListingSource for Marketplace {
    fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> impl std::future::Future<Output = Result<SearchPage, CoreError>> + Send {
        Marketplace::search(self, criteria)
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Process commands from the mpsc channel one at a time.
async fn command_processor_task(
    marketplace: Marketplace,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result =
                    route_command(&marketplace, envelope.command, envelope.progress.as_ref()).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

async fn route_command(
    marketplace: &Marketplace,
    cmd: Command,
    progress: Option<&UploadProgress>,
) -> Result<CommandResult, CoreError> {
    let user = marketplace.require_user()?;
    let clients = marketplace.clients().await?;
    let ctx = WriteContext {
        clients: &clients,
        user: &user,
        progress,
    };

    match cmd {
        Command::CreateListing { draft, photos } => {
            ctx.create_listing(draft, &photos).await.map(CommandResult::Created)
        }
        Command::UpdateListing {
            id,
            draft,
            keep_photos,
            new_photos,
        } => ctx
            .update_listing(&id, draft, &keep_photos, &new_photos)
            .await
            .map(CommandResult::Updated),
        Command::DeleteListing { id } => {
            let photos_removed = ctx.delete_listing(&id).await?;
            Ok(CommandResult::Deleted { id, photos_removed })
        }
        Command::ToggleFavorite { id } => {
            let favorite = ctx.toggle_favorite(&id).await?;
            Ok(CommandResult::Favorite { id, favorite })
        }
    }
}

/// Objects uploaded by one command, for compensation on failure.
#[derive(Debug, Default)]
struct Uploaded {
    urls: Vec<String>,
    paths: Vec<String>,
}

#[derive(Serialize)]
struct FavoriteRow<'a> {
    user_id: &'a UserId,
    announcement_id: &'a ListingId,
}

struct WriteContext<'a> {
    clients: &'a Clients,
    user: &'a SessionUser,
    progress: Option<&'a UploadProgress>,
}

impl WriteContext<'_> {
    /// Validate, upload photos, insert. A failed insert removes the
    /// photos it uploaded.
    async fn create_listing(
        &self,
        draft: ListingDraft,
        photos: &[PhotoUpload],
    ) -> Result<Listing, CoreError> {
        let draft = draft.normalized();
        draft.validate()?;
        validate_photos(0, photos)?;

        let uploaded = self.upload_photos(photos).await?;

        let row = ListingRow {
            user_id: Some(&self.user.id),
            ..ListingRow::new(&draft, &uploaded.urls)
        };
        let inserted = self
            .clients
            .rest
            .insert::<Listing, _>(LISTINGS_TABLE, &row)
            .await
            .map_err(CoreError::from)
            .and_then(|rows| {
                rows.into_iter()
                    .next()
                    .ok_or_else(|| CoreError::Internal("insert returned no row".into()))
            });

        match inserted {
            Ok(listing) => {
                info!(id = %listing.id, photos = uploaded.urls.len(), "listing created");
                Ok(listing)
            }
            Err(e) => Err(self.compensate(&uploaded.paths, e, "Failed to create listing").await),
        }
    }

    /// Validate, check ownership, upload new photos, patch the row.
    /// Photos dropped by the edit are removed once the row is saved.
    async fn update_listing(
        &self,
        id: &ListingId,
        draft: ListingDraft,
        keep_photos: &[String],
        new_photos: &[PhotoUpload],
    ) -> Result<Listing, CoreError> {
        let draft = draft.normalized();
        draft.validate()?;
        validate_photos(keep_photos.len(), new_photos)?;

        let existing = self.owned_listing(id).await?;
        if let Some(stray) = keep_photos.iter().find(|p| !existing.photos.contains(p)) {
            return Err(CoreError::validation(
                "photos",
                format!("{stray} is not a photo of this listing"),
            ));
        }

        let uploaded = self.upload_photos(new_photos).await?;
        let photos: Vec<String> = keep_photos
            .iter()
            .chain(uploaded.urls.iter())
            .cloned()
            .collect();

        let row = ListingRow {
            updated_at: Some(Utc::now()),
            ..ListingRow::new(&draft, &photos)
        };
        let query = TableQuery::new()
            .eq("id", id)
            .eq("user_id", &self.user.id);
        let updated = self
            .clients
            .rest
            .update::<Listing, _>(LISTINGS_TABLE, &query, &row)
            .await
            .map_err(CoreError::from)
            .and_then(|rows| {
                rows.into_iter()
                    .next()
                    .ok_or_else(|| CoreError::not_found("Listing", id))
            });

        let updated = match updated {
            Ok(listing) => listing,
            Err(e) => {
                return Err(self.compensate(&uploaded.paths, e, "Failed to update listing").await);
            }
        };

        let dropped: Vec<String> = existing
            .photos
            .iter()
            .filter(|url| !keep_photos.contains(url))
            .filter_map(|url| self.clients.storage.object_path_from_url(url))
            .collect();
        self.remove_quietly(&dropped).await;

        info!(id = %updated.id, "listing updated");
        Ok(updated)
    }

    /// Delete the row, then its photo objects. Returns how many objects
    /// were removed.
    async fn delete_listing(&self, id: &ListingId) -> Result<usize, CoreError> {
        let existing = self.owned_listing(id).await?;

        let query = TableQuery::new()
            .eq("id", id)
            .eq("user_id", &self.user.id);
        let deleted: Vec<Listing> = self.clients.rest.delete(LISTINGS_TABLE, &query).await?;
        let photos = deleted
            .into_iter()
            .next()
            .map_or(existing.photos, |row| row.photos);

        let paths: Vec<String> = photos
            .iter()
            .filter_map(|url| self.clients.storage.object_path_from_url(url))
            .collect();
        let removed = if self.remove_quietly(&paths).await {
            paths.len()
        } else {
            0
        };

        info!(%id, photos_removed = removed, "listing deleted");
        Ok(removed)
    }

    async fn toggle_favorite(&self, id: &ListingId) -> Result<bool, CoreError> {
        let query = TableQuery::new()
            .eq("user_id", &self.user.id)
            .eq("announcement_id", id);
        let removed: Vec<serde_json::Value> =
            self.clients.rest.delete(FAVORITES_TABLE, &query).await?;
        if !removed.is_empty() {
            return Ok(false);
        }

        let row = FavoriteRow {
            user_id: &self.user.id,
            announcement_id: id,
        };
        let _: Vec<serde_json::Value> = self.clients.rest.insert(FAVORITES_TABLE, &row).await?;
        Ok(true)
    }

    // ── Helpers ──────────────────────────────────────────────────

    async fn owned_listing(&self, id: &ListingId) -> Result<Listing, CoreError> {
        let listing = fetch_listing(self.clients, id).await?;
        if !listing.is_owned_by(&self.user.id) {
            return Err(CoreError::Forbidden {
                message: "only the donor who listed this item can change it".into(),
            });
        }
        Ok(listing)
    }

    /// Upload in order, reporting progress after each photo. A failure
    /// removes whatever this call already uploaded.
    async fn upload_photos(&self, photos: &[PhotoUpload]) -> Result<Uploaded, CoreError> {
        let mut uploaded = Uploaded::default();
        if let Some(progress) = self.progress {
            progress.report(0, photos.len());
        }

        for (done, photo) in photos.iter().enumerate() {
            let path = photo.object_path(&self.user.id);
            match self
                .clients
                .storage
                .upload(&path, &photo.content_type, photo.bytes.clone())
                .await
            {
                Ok(url) => {
                    uploaded.urls.push(url);
                    uploaded.paths.push(path);
                }
                Err(e) => {
                    return Err(self
                        .compensate(&uploaded.paths, e.into(), "Photo upload failed")
                        .await);
                }
            }
            if let Some(progress) = self.progress {
                progress.report(done + 1, photos.len());
            }
        }
        Ok(uploaded)
    }

    /// Remove orphaned uploads after a failed step. With nothing to
    /// clean up the original error is returned unchanged.
    async fn compensate(&self, paths: &[String], err: CoreError, context: &str) -> CoreError {
        if paths.is_empty() {
            return err;
        }
        warn!(error = %err, orphans = paths.len(), "{context}; removing uploaded photos");
        let cleaned_up = match self.clients.storage.remove(paths).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, ?paths, "failed to remove orphaned photos");
                false
            }
        };
        CoreError::PartialFailure {
            message: format!("{context}: {err}"),
            cleaned_up,
        }
    }

    /// Best-effort removal; failures are logged. Returns whether it worked.
    async fn remove_quietly(&self, paths: &[String]) -> bool {
        match self.clients.storage.remove(paths).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, ?paths, "failed to remove photos (non-fatal)");
                false
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn build_clients(config: &BackendConfig) -> Result<Clients, CoreError> {
    let transport = config.transport();
    let credentials = Credentials::new(config.anon_key.clone());
    let http = transport.build_client(credentials.anon_key())?;

    Ok(Clients {
        rest: RestClient::with_client(http.clone(), &config.url, Arc::clone(&credentials))?,
        storage: StorageClient::with_client(
            http.clone(),
            &config.url,
            config.bucket.clone(),
            Arc::clone(&credentials),
        )?,
        auth: AuthClient::with_client(http, &config.url, Arc::clone(&credentials))?,
        credentials,
    })
}

async fn fetch_listing(clients: &Clients, id: &ListingId) -> Result<Listing, CoreError> {
    clients
        .rest
        .select_one(LISTINGS_TABLE, &TableQuery::new().eq("id", id))
        .await?
        .ok_or_else(|| CoreError::not_found("Listing", id))
}
