//! Application state management for the reception kiosk.
//!
//! This module contains the `App` struct that owns all UI state, the record
//! store handle, and the channel through which background store operations
//! report back. Store calls never run on the UI loop: they are spawned and
//! their results are drained by `check_background_tasks` once per frame.
//! Backends with change notifications push snapshots through the same
//! channel; while that subscription is down the app polls instead.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use reception_core::auth::{AdminGate, CredentialStore};
use reception_core::catalog::Catalog;
use reception_core::config::{Backend, Config};
use reception_core::export::{self, ExportKind};
use reception_core::models::{Category, LogEntry, VisitorRecord};
use reception_core::notify::Notifier;
use reception_core::router::{Router, View};
use reception_core::store::{self, RecordStore, Snapshot, StoreError};
use reception_core::summary::Summary;
use reception_core::timestamp_now;
use reception_core::wizard::{Action, Step, Transition, Wizard};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for password input.
pub const MAX_PASSWORD_LENGTH: usize = 64;

/// Maximum length of a completion message being edited.
pub const MAX_MESSAGE_LENGTH: usize = 400;

/// Entries on the main menu after the visitor categories.
pub const MAIN_MENU_EXTRAS: [&str; 2] = ["部員 出退勤", "管理者"];

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state (overlays on top of the current view)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ConfirmingDelete(VisitorRecord),
    ConfirmingQuit,
    Quitting,
}

/// Which field of the student entry form has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonField {
    Grade,
    Class,
    StudentId,
}

impl PersonField {
    pub fn next(&self) -> Self {
        match self {
            PersonField::Grade => PersonField::Class,
            PersonField::Class => PersonField::StudentId,
            PersonField::StudentId => PersonField::Grade,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            PersonField::Grade => PersonField::StudentId,
            PersonField::Class => PersonField::Grade,
            PersonField::StudentId => PersonField::Class,
        }
    }
}

/// Admin console sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTab {
    Summary,
    Visitors(Category),
    MemberLog,
    Messages,
}

impl AdminTab {
    pub fn all() -> Vec<AdminTab> {
        let mut tabs = vec![AdminTab::Summary];
        tabs.extend(Category::ALL.iter().map(|c| AdminTab::Visitors(*c)));
        tabs.push(AdminTab::MemberLog);
        tabs.push(AdminTab::Messages);
        tabs
    }

    pub fn title(&self) -> String {
        match self {
            AdminTab::Summary => "集計".to_string(),
            AdminTab::Visitors(c) => c.label().to_string(),
            AdminTab::MemberLog => "出退勤履歴".to_string(),
            AdminTab::Messages => "完了メッセージ".to_string(),
        }
    }

    fn offset(&self, delta: isize) -> AdminTab {
        let tabs = Self::all();
        let index = tabs.iter().position(|t| t == self).unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        tabs[((index + delta).rem_euclid(len)) as usize]
    }

    pub fn next(&self) -> AdminTab {
        self.offset(1)
    }

    pub fn prev(&self) -> AdminTab {
        self.offset(-1)
    }
}

/// A completion message being edited on the admin Messages tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEditor {
    pub category: Category,
    pub text: String,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned store operations.
enum TaskResult {
    Loaded(Result<Snapshot, StoreError>),
    Submitted {
        category: Category,
        result: Result<(), StoreError>,
    },
    MemberToggled(Result<LogEntry, StoreError>),
    RecordRemoved(Result<(), StoreError>),
    ResetDone(Result<(), StoreError>),
    MessagesSaved(Result<(), StoreError>),
    Streamed(Snapshot),
    WatchEnded(Result<(), StoreError>),
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    // Core services
    pub config: Config,
    pub catalog: Arc<Catalog>,
    store: Arc<dyn RecordStore>,

    // UI State
    pub state: AppState,
    pub router: Router,
    pub notifier: Notifier,
    pub admin: AdminGate,

    // Data as of the last load
    pub snapshot: Snapshot,
    pub summary: Summary,

    // Main menu
    pub main_selection: usize,

    // Intake wizard
    pub wizard: Option<Wizard>,
    pub intake_cursor: usize,
    pub person_field: PersonField,
    pub grade_cursor: usize,
    pub class_cursor: usize,

    // Member check-in
    pub member_selection: usize,
    pub member_toggle_pending: bool,

    // Admin console
    pub password_input: String,
    pub admin_tab: AdminTab,
    pub admin_selection: usize,
    pub message_editor: Option<MessageEditor>,
    pub last_export: Option<PathBuf>,

    // Background task channel
    task_rx: mpsc::Receiver<TaskResult>,
    task_tx: mpsc::Sender<TaskResult>,
    refresh_in_flight: bool,
    refresh_queued: bool,
    last_refresh: Instant,
    watching: bool,
}

impl App {
    /// Create the application with the store selected in `config`.
    pub fn new(config: Config) -> Result<Self> {
        let token = if config.backend == Backend::Remote {
            CredentialStore::db_token()
        } else {
            None
        };
        let store = store::open(&config, token)?;
        Ok(Self::with_store(config, store))
    }

    /// Create the application around an existing store.
    pub fn with_store(mut config: Config, store: Arc<dyn RecordStore>) -> Self {
        config.separate_reset_password();
        let now = Instant::now();
        let (task_tx, task_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let snapshot = Snapshot::default();

        Self {
            catalog: Arc::new(config.catalog()),
            router: Router::new(config.completion_timeout(), config.member_idle_timeout(), now),
            notifier: Notifier::new(config.notification_ttl()),
            admin: AdminGate::new(config.admin_password.clone(), config.reset_password.clone()),
            summary: Summary::from_snapshot(&snapshot),
            snapshot,
            store,
            config,

            state: AppState::Normal,
            main_selection: 0,

            wizard: None,
            intake_cursor: 0,
            person_field: PersonField::Grade,
            grade_cursor: 0,
            class_cursor: 0,

            member_selection: 0,
            member_toggle_pending: false,

            password_input: String::new(),
            admin_tab: AdminTab::Summary,
            admin_selection: 0,
            message_editor: None,
            last_export: None,

            task_rx,
            task_tx,
            refresh_in_flight: false,
            refresh_queued: false,
            last_refresh: now,
            watching: false,
        }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn view(&self) -> View {
        self.router.view()
    }

    pub fn notify_success(&mut self, text: impl Into<String>) {
        self.notifier.success(text, Instant::now());
    }

    pub fn notify_error(&mut self, text: impl Into<String>) {
        self.notifier.error(text, Instant::now());
    }

    /// Switch views, resetting the per-view cursors.
    pub fn go(&mut self, view: View) {
        let landed = self
            .router
            .go(view, self.admin.is_authenticated(), Instant::now());
        match landed {
            View::Main => self.wizard = None,
            View::Members => self.member_selection = 0,
            View::AdminLogin | View::AdminReset => self.password_input.clear(),
            View::Admin => self.message_editor = None,
            View::Intake(_) | View::Completion(_) => {}
        }
    }

    // ========================================================================
    // Background tasks
    // ========================================================================

    fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = task.await;
            if tx.send(result).await.is_err() {
                error!("Background task finished after the UI channel closed");
            }
        });
    }

    /// Reload the snapshot. A request made while a load is running is
    /// queued, since that load may predate the latest write.
    pub fn refresh(&mut self) {
        if self.refresh_in_flight {
            self.refresh_queued = true;
            return;
        }
        self.refresh_in_flight = true;
        self.last_refresh = Instant::now();
        let store = self.store.clone();
        self.spawn_task(async move { TaskResult::Loaded(store.load().await) });
    }

    /// Subscribe to store changes if the backend offers them. Snapshots
    /// are forwarded into the task channel as they arrive.
    pub fn start_watch(&mut self) {
        if self.watching || !self.store.supports_watch() {
            return;
        }
        self.watching = true;
        self.last_refresh = Instant::now();

        let (updates_tx, mut updates_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let forward = self.task_tx.clone();
        tokio::spawn(async move {
            while let Some(snapshot) = updates_rx.recv().await {
                if forward.send(TaskResult::Streamed(snapshot)).await.is_err() {
                    break;
                }
            }
        });

        let store = self.store.clone();
        self.spawn_task(async move { TaskResult::WatchEnded(store.watch(updates_tx).await) });
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.summary = Summary::from_snapshot(&snapshot);
        self.snapshot = snapshot;
        self.clamp_selections();
    }

    /// Drain finished background tasks and apply their results.
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.task_rx.try_recv() {
            self.process_task_result(result);
        }
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Loaded(result) => {
                self.refresh_in_flight = false;
                match result {
                    Ok(snapshot) => self.apply_snapshot(snapshot),
                    Err(e) => {
                        warn!(error = %e, "Failed to load records");
                        self.notify_error(format!("データの読み込みに失敗しました: {}", e));
                    }
                }
                if std::mem::take(&mut self.refresh_queued) {
                    self.refresh();
                }
            }
            TaskResult::Submitted { category, result } => match result {
                Ok(()) => {
                    info!(?category, "Reception recorded");
                    self.wizard = None;
                    self.go(View::Completion(category));
                    self.refresh();
                }
                Err(e) => {
                    error!(?category, error = %e, "Failed to record reception");
                    if let Some(wizard) = self.wizard.as_mut() {
                        wizard.submission_failed();
                    }
                    self.notify_error(format!("送信に失敗しました。もう一度お試しください。({})", e));
                }
            },
            TaskResult::MemberToggled(result) => {
                self.member_toggle_pending = false;
                match result {
                    Ok(entry) => {
                        self.notify_success(format!("{}さん: {}しました", entry.name, entry.kind.label()));
                        self.refresh();
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to toggle member");
                        self.notify_error(format!("出退勤の記録に失敗しました: {}", e));
                    }
                }
            }
            TaskResult::RecordRemoved(result) => match result {
                Ok(()) => {
                    self.notify_success("記録を削除しました。");
                    self.refresh();
                }
                Err(StoreError::NotFound) => {
                    self.notify_error("記録が見つかりませんでした。");
                    self.refresh();
                }
                Err(e) => self.notify_error(format!("削除に失敗しました: {}", e)),
            },
            TaskResult::ResetDone(result) => match result {
                Ok(()) => {
                    info!("All collections reset");
                    self.notify_success("全データをリセットしました。");
                    self.go(View::Admin);
                    self.refresh();
                }
                Err(e) => self.notify_error(format!("リセットに失敗しました: {}", e)),
            },
            TaskResult::MessagesSaved(result) => match result {
                Ok(()) => {
                    self.notify_success("メッセージを保存しました。");
                    self.refresh();
                }
                Err(e) => self.notify_error(format!("保存に失敗しました: {}", e)),
            },
            TaskResult::Streamed(snapshot) => {
                self.last_refresh = Instant::now();
                self.apply_snapshot(snapshot);
            }
            TaskResult::WatchEnded(result) => {
                self.watching = false;
                self.last_refresh = Instant::now();
                match result {
                    Ok(()) => debug!("Change subscription ended"),
                    Err(e) => warn!(error = %e, "Change subscription lost, polling until it reconnects"),
                }
            }
        }
    }

    /// Per-frame housekeeping: timeouts, notification expiry, and a poll
    /// plus resubscribe while the change subscription is down.
    pub fn tick(&mut self) {
        let now = Instant::now();
        if self.router.tick(now) {
            debug!("View timed out back to main");
            self.go(View::Main);
        }
        self.notifier.expire(now);

        if self.store.supports_watch()
            && !self.watching
            && now.saturating_duration_since(self.last_refresh) >= self.config.remote_refresh()
        {
            self.refresh();
            self.start_watch();
        }
    }

    fn clamp_selections(&mut self) {
        let rows = self.admin_row_count();
        if self.admin_selection >= rows {
            self.admin_selection = rows.saturating_sub(1);
        }
        let members = self.catalog.members.len();
        if self.member_selection >= members {
            self.member_selection = members.saturating_sub(1);
        }
    }

    // ========================================================================
    // Intake
    // ========================================================================

    pub fn start_intake(&mut self, category: Category) {
        self.wizard = Some(Wizard::new(category, self.catalog.clone()));
        self.go(View::Intake(category));
        self.sync_intake_cursor();
    }

    /// Apply a wizard action, reporting refusals in the notification slot.
    pub fn apply_wizard(&mut self, action: Action) {
        let Some(wizard) = self.wizard.as_mut() else {
            return;
        };
        match wizard.apply(action) {
            Ok(Transition::Exited) => self.go(View::Main),
            Ok(Transition::Moved) => self.sync_intake_cursor(),
            Ok(Transition::Stayed) => {}
            Err(e) => self.notify_error(e.to_string()),
        }
    }

    /// Place the cursors where the new step's saved values are.
    fn sync_intake_cursor(&mut self) {
        self.intake_cursor = 0;
        let Some(wizard) = self.wizard.as_ref() else {
            return;
        };
        if let Step::Person { .. } = wizard.step() {
            let current = &wizard.draft().current;
            self.person_field = PersonField::Grade;
            self.grade_cursor = current
                .grade
                .as_ref()
                .and_then(|g| self.catalog.grades.iter().position(|x| x == g))
                .unwrap_or(0);
            self.class_cursor = current
                .class
                .as_ref()
                .and_then(|c| self.catalog.classes.iter().position(|x| x == c))
                .unwrap_or(0);
        }
    }

    /// Turn the confirmed draft into records and persist them after the delay.
    pub fn submit_intake(&mut self) {
        let Some(wizard) = self.wizard.as_mut() else {
            return;
        };
        let category = wizard.category();
        match wizard.submit(&timestamp_now()) {
            Ok(records) => {
                debug!(?category, count = records.len(), "Submitting reception");
                let store = self.store.clone();
                let delay = self.config.submit_delay();
                self.spawn_task(async move {
                    tokio::time::sleep(delay).await;
                    TaskResult::Submitted {
                        category,
                        result: store.append_many(records).await,
                    }
                });
            }
            Err(e) => self.notify_error(e.to_string()),
        }
    }

    pub fn completion_message(&self, category: Category) -> &str {
        self.snapshot.messages.message_for(category)
    }

    // ========================================================================
    // Members
    // ========================================================================

    pub fn toggle_selected_member(&mut self) {
        if self.member_toggle_pending {
            return;
        }
        let Some(name) = self.catalog.members.get(self.member_selection).cloned() else {
            return;
        };
        self.member_toggle_pending = true;
        let store = self.store.clone();
        self.spawn_task(async move {
            TaskResult::MemberToggled(store.toggle_member(name, timestamp_now()).await)
        });
    }

    // ========================================================================
    // Admin
    // ========================================================================

    pub fn submit_login(&mut self) {
        match self.admin.login(&self.password_input) {
            Ok(()) => {
                info!("Admin logged in");
                self.admin_tab = AdminTab::Summary;
                self.admin_selection = 0;
                self.go(View::Admin);
                self.refresh();
            }
            Err(e) => {
                warn!("Admin login failed");
                self.password_input.clear();
                self.notify_error(e.to_string());
            }
        }
    }

    pub fn logout(&mut self) {
        self.admin.logout();
        self.go(View::Main);
    }

    pub fn submit_reset(&mut self) {
        match self.admin.authorize_reset(&self.password_input) {
            Ok(()) => {
                self.password_input.clear();
                let store = self.store.clone();
                self.spawn_task(async move { TaskResult::ResetDone(store.reset_all().await) });
            }
            Err(e) => {
                warn!("Reset passphrase rejected");
                self.password_input.clear();
                self.notify_error(e.to_string());
            }
        }
    }

    /// Rows of the current admin visitor table, newest first.
    pub fn admin_visitor_rows(&self) -> Vec<VisitorRecord> {
        match self.admin_tab {
            AdminTab::Visitors(category) => self.snapshot.visitors.records_newest_first(category),
            _ => Vec::new(),
        }
    }

    pub fn admin_row_count(&self) -> usize {
        match self.admin_tab {
            AdminTab::Summary => 0,
            AdminTab::Visitors(category) => self.snapshot.visitors.len(category),
            AdminTab::MemberLog => self.snapshot.member_log.len(),
            AdminTab::Messages => Category::ALL.len(),
        }
    }

    pub fn request_delete_selected(&mut self) {
        if let Some(record) = self.admin_visitor_rows().get(self.admin_selection).cloned() {
            self.state = AppState::ConfirmingDelete(record);
        }
    }

    pub fn delete_record(&mut self, record: VisitorRecord) {
        let store = self.store.clone();
        self.spawn_task(async move { TaskResult::RecordRemoved(store.remove(record).await) });
    }

    pub fn export(&mut self, kind: ExportKind) {
        let dir = match self.config.export_dir() {
            Ok(dir) => dir,
            Err(e) => {
                self.notify_error(format!("保存先が見つかりません: {}", e));
                return;
            }
        };
        match export::export_to_dir(&dir, &self.snapshot, kind, &Local::now()) {
            Ok(path) => {
                self.notify_success(format!("{} を保存しました: {}", kind.label(), path.display()));
                self.last_export = Some(path);
            }
            Err(e) => self.notify_error(e.to_string()),
        }
    }

    pub fn start_message_edit(&mut self) {
        if let Some(category) = Category::ALL.get(self.admin_selection).copied() {
            self.message_editor = Some(MessageEditor {
                category,
                text: self.completion_message(category).to_string(),
            });
        }
    }

    pub fn save_message_edit(&mut self) {
        let Some(editor) = self.message_editor.take() else {
            return;
        };
        let mut messages = self.snapshot.messages.clone();
        messages.set(editor.category, &editor.text);
        let store = self.store.clone();
        self.spawn_task(async move { TaskResult::MessagesSaved(store.save_messages(messages).await) });
    }
}

// ============================================================================
// Tests
// ============================================================================
