//! # Stock List Synchronizer
//!
//! Owns the locally held, paginated stock collection behind one list view.
//!
//! ## Load State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         List Load Phases                                │
//! │                                                                         │
//! │   reset_and_load_first_page()          load_next_page()                 │
//! │              │                                │                         │
//! │              ▼                                ▼                         │
//! │   ┌──────────────────┐   ok   ┌──────┐   ┌──────────────┐               │
//! │   │ LoadingFirstPage │───────►│ Idle │◄──│ LoadingMore  │               │
//! │   └────────┬─────────┘        └──────┘ ok└──────┬───────┘               │
//! │            │ err                  ▲             │ err                   │
//! │            ▼                      │             ▼                       │
//! │        ┌───────┐   user retry     │         ┌───────┐                   │
//! │        │ Error │──────────────────┘         │ Error │                   │
//! │        └───────┘                            └───────┘                   │
//! │                                                                         │
//! │  At most one page load is in flight (busy flag). A reset supersedes    │
//! │  any in-flight load by bumping the generation counter.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency Rules
//! - No two held stocks share an id. Every arriving page is filtered against
//!   the held ids and against ids with a delete in flight.
//! - A response is applied only if its generation is current and the view
//!   is alive. Pages at or below the highest applied page are dropped.
//! - A failed load never touches the held collection.
//! - `delete` removes the stock before the request is sent. If the server
//!   refuses, the stock is put back at its old position and the error is
//!   reported.
//!
//! State lives behind a `std::sync::Mutex` that is only taken between await
//! points, never across one.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use dosely_core::validation::validate_stock_name;
use dosely_core::view::{filter_by_name, StockCardView, StockListView};
use dosely_core::{PageWindow, Stock, StockId, StockPage};

use crate::api::StockApi;
use crate::error::{ClientError, ClientResult};

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives list events for the presentation shell.
pub trait ListEventEmitter: Send + Sync {
    /// A page was applied.
    fn on_loaded(&self, loaded: usize, total: usize, has_more: bool);

    /// An operation failed and should be reported at its call site.
    fn on_error(&self, message: &str, retryable: bool);
}

/// No-op emitter for tests and headless use.
pub struct NoOpEmitter;

impl ListEventEmitter for NoOpEmitter {
    fn on_loaded(&self, _loaded: usize, _total: usize, _has_more: bool) {}
    fn on_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// State
// =============================================================================

/// Where the list is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    LoadingFirstPage,
    LoadingMore,
    /// The last load failed; the held collection is the last good one.
    Error,
}

/// A consistent copy of the list state.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot {
    pub stocks: Vec<Stock>,
    pub window: PageWindow,
    pub phase: LoadPhase,
    pub has_more: bool,
    pub last_error: Option<String>,
}

/// What a page request needs to be applied when it returns.
struct PageTicket {
    generation: u64,
    seq: u64,
    page_number: u32,
    page_size: u32,
    removed: usize,
}

struct ListState {
    stocks: Vec<Stock>,
    window: PageWindow,
    phase: LoadPhase,
    busy: bool,
    /// Set when a page came back empty.
    exhausted: bool,
    /// Loaded stocks deleted on the server since the last applied page.
    removed_since_page: usize,
    /// Sequence of the last page request and of the last page applied.
    load_seq: u64,
    applied_seq: u64,
    generation: u64,
    alive: bool,
    pending_deletes: HashSet<StockId>,
    last_error: Option<String>,
}

impl ListState {
    fn new(page_size: u32) -> Self {
        ListState {
            stocks: Vec::new(),
            window: PageWindow::empty(page_size),
            phase: LoadPhase::Idle,
            busy: false,
            exhausted: false,
            removed_since_page: 0,
            load_seq: 0,
            applied_seq: 0,
            generation: 0,
            alive: true,
            pending_deletes: HashSet::new(),
            last_error: None,
        }
    }

    fn ensure_alive(&self) -> ClientResult<()> {
        if self.alive {
            Ok(())
        } else {
            Err(ClientError::TornDown)
        }
    }

    /// Stocks the server still counts: held ones plus those mid-delete.
    fn counted(&self) -> usize {
        self.stocks.len() + self.pending_deletes.len()
    }

    fn has_more(&self) -> bool {
        if self.exhausted {
            return false;
        }
        match self.window.total_count {
            Some(total) => self.counted() < total,
            None => true,
        }
    }

    fn contains(&self, id: StockId) -> bool {
        self.stocks.iter().any(|s| s.id == id)
    }

    /// Appends the stocks of `page` that are not held or being deleted.
    /// Returns how many were appended.
    fn merge(&mut self, page: StockPage) -> usize {
        let mut seen: HashSet<StockId> = self.stocks.iter().map(|s| s.id).collect();
        seen.extend(self.pending_deletes.iter().copied());

        let before = self.stocks.len();
        for stock in page.items {
            if seen.insert(stock.id) {
                self.stocks.push(stock);
            } else {
                debug!(stock_id = stock.id, "Dropping duplicate stock from page");
            }
        }
        self.window.total_count = Some(page.total);
        self.stocks.len() - before
    }

    fn fail(&mut self, error: &ClientError) {
        self.phase = LoadPhase::Error;
        self.last_error = Some(error.to_string());
    }

    fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            stocks: self.stocks.clone(),
            window: self.window,
            phase: self.phase,
            has_more: self.has_more(),
            last_error: self.last_error.clone(),
        }
    }
}

// =============================================================================
// Synchronizer
// =============================================================================

/// The paginated stock list of one mounted view.
pub struct StockListSynchronizer<A: StockApi + ?Sized> {
    api: Arc<A>,
    state: Mutex<ListState>,
    emitter: Arc<dyn ListEventEmitter>,
}

impl<A: StockApi + ?Sized> StockListSynchronizer<A> {
    pub fn new(api: Arc<A>, page_size: u32) -> Self {
        Self::with_emitter(api, page_size, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(api: Arc<A>, page_size: u32, emitter: Arc<dyn ListEventEmitter>) -> Self {
        StockListSynchronizer {
            api,
            state: Mutex::new(ListState::new(page_size.max(1))),
            emitter,
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ListState) -> R,
    {
        let state = self.state.lock().expect("List state mutex poisoned");
        f(&state)
    }

    fn with_state_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ListState) -> R,
    {
        let mut state = self.state.lock().expect("List state mutex poisoned");
        f(&mut state)
    }

    fn report(&self, error: &ClientError) {
        if error.is_user_facing() {
            self.emitter.on_error(&error.to_string(), error.is_retryable());
        }
    }

    fn report_loaded(&self) {
        let (loaded, total, has_more) = self.with_state(|s| {
            (
                s.stocks.len(),
                s.window.total_count.unwrap_or(s.stocks.len()),
                s.has_more(),
            )
        });
        self.emitter.on_loaded(loaded, total, has_more);
    }

    // =========================================================================
    // Paging
    // =========================================================================

    /// Clears the list and loads page 1.
    ///
    /// Any load still in flight is superseded and its response dropped.
    pub async fn reset_and_load_first_page(&self) -> ClientResult<()> {
        let (generation, page_size) = self.with_state_mut(|s: &mut ListState| {
            s.ensure_alive()?;
            s.generation += 1;
            s.stocks.clear();
            s.window = PageWindow::empty(s.window.page_size);
            s.exhausted = false;
            s.removed_since_page = 0;
            s.applied_seq = s.load_seq;
            s.last_error = None;
            s.phase = LoadPhase::LoadingFirstPage;
            s.busy = true;
            Ok::<_, ClientError>((s.generation, s.window.page_size))
        })?;

        debug!(generation, page_size, "Loading first page");
        let result = self.api.list_stocks(1, page_size).await;

        let outcome = self.with_state_mut(|s: &mut ListState| -> ClientResult<bool> {
            s.ensure_alive()?;
            if s.generation != generation {
                debug!(generation, "Dropping superseded first page");
                return Ok(false);
            }
            s.busy = false;
            match result {
                Ok(page) => {
                    s.exhausted = page.items.is_empty();
                    let added = s.merge(page);
                    s.window.page_number = 1;
                    s.phase = LoadPhase::Idle;
                    info!(added, total = ?s.window.total_count, "First page loaded");
                    Ok(true)
                }
                Err(e) => {
                    s.fail(&e);
                    Err(e)
                }
            }
        });

        match outcome {
            Ok(true) => {
                self.report_loaded();
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                warn!(error = %e, "First page failed");
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Loads the page after the last applied one.
    ///
    /// Deletes confirmed since then shift the server's offsets, so the
    /// request may repeat an applied page; the overlap is deduplicated.
    ///
    /// Returns `Ok(false)` without a request when a load is already in
    /// flight or nothing is left to load.
    pub async fn load_next_page(&self) -> ClientResult<bool> {
        let ticket = self.with_state_mut(|s| {
            s.ensure_alive()?;
            if s.busy || !s.has_more() {
                return Ok::<_, ClientError>(None);
            }
            s.busy = true;
            s.phase = if s.window.page_number == 0 {
                LoadPhase::LoadingFirstPage
            } else {
                LoadPhase::LoadingMore
            };
            s.last_error = None;
            s.load_seq += 1;
            Ok(Some(PageTicket {
                generation: s.generation,
                seq: s.load_seq,
                page_number: s.window.resume_page(s.removed_since_page),
                page_size: s.window.page_size,
                removed: s.removed_since_page,
            }))
        })?;

        let Some(PageTicket {
            generation,
            seq,
            page_number,
            page_size,
            removed,
        }) = ticket
        else {
            debug!("Next page not requested: busy or exhausted");
            return Ok(false);
        };

        debug!(page = page_number, page_size, "Loading page");
        let result = self.api.list_stocks(page_number, page_size).await;

        let outcome = self.with_state_mut(|s: &mut ListState| -> ClientResult<bool> {
            s.ensure_alive()?;
            if s.generation != generation {
                debug!(page = page_number, "Dropping page from before a reset");
                return Ok(false);
            }
            s.busy = false;
            match result {
                // Pages within a generation are applied in request order.
                Ok(_) if seq <= s.applied_seq => {
                    debug!(page = page_number, applied = s.window.page_number, "Dropping stale page");
                    s.phase = LoadPhase::Idle;
                    Ok(false)
                }
                Ok(page) => {
                    s.exhausted = page.items.is_empty();
                    let added = s.merge(page);
                    s.window.page_number = page_number;
                    s.applied_seq = seq;
                    s.removed_since_page = s.removed_since_page.saturating_sub(removed);
                    s.phase = LoadPhase::Idle;
                    debug!(
                        page = page_number,
                        added,
                        held = s.stocks.len(),
                        has_more = s.has_more(),
                        "Page applied"
                    );
                    Ok(true)
                }
                Err(e) => {
                    s.fail(&e);
                    Err(e)
                }
            }
        });

        match outcome {
            Ok(applied) => {
                if applied {
                    self.report_loaded();
                }
                Ok(applied)
            }
            Err(e) => {
                warn!(page = page_number, error = %e, "Page load failed");
                self.report(&e);
                Err(e)
            }
        }
    }

    /// The infinite-scroll sentinel came into view.
    ///
    /// Ignored during the first load and after a failed load; retrying a
    /// failed load is left to the user.
    pub async fn on_sentinel_visible(&self) -> ClientResult<bool> {
        let ignore = self.with_state(|s| {
            s.ensure_alive()?;
            Ok::<_, ClientError>(matches!(
                s.phase,
                LoadPhase::LoadingFirstPage | LoadPhase::Error
            ))
        })?;
        if ignore {
            return Ok(false);
        }
        self.load_next_page().await
    }

    /// Loads pages until the server has nothing left.
    pub async fn load_all(&self) -> ClientResult<usize> {
        if self.page_window().page_number == 0 {
            self.reset_and_load_first_page().await?;
        }
        while self.load_next_page().await? {}
        Ok(self.with_state(|s| s.stocks.len()))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Creates a stock and puts it first once the server confirms it.
    pub async fn create(&self, name: &str) -> ClientResult<Stock> {
        let name = validate_stock_name(name)?;
        self.with_state(|s| s.ensure_alive())?;

        let created = match self.api.create_stock(&name).await {
            Ok(stock) => stock,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };

        self.with_state_mut(|s| {
            s.ensure_alive()?;
            if s.contains(created.id) {
                debug!(stock_id = created.id, "Created stock already held");
            } else {
                s.stocks.insert(0, created.clone());
                if let Some(total) = s.window.total_count.as_mut() {
                    *total += 1;
                }
            }
            Ok::<_, ClientError>(())
        })?;

        info!(stock_id = created.id, name = %created.name, "Stock created");
        Ok(created)
    }

    /// Renames a stock once the server confirms it.
    pub async fn rename(&self, id: StockId, name: &str) -> ClientResult<Stock> {
        let name = validate_stock_name(name)?;
        self.with_state(|s| s.ensure_alive())?;

        let mut renamed = match self.api.rename_stock(id, &name).await {
            Ok(stock) => stock,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };
        if renamed.name.trim().is_empty() {
            renamed.name = name;
        }

        self.with_state_mut(|s: &mut ListState| -> ClientResult<Stock> {
            s.ensure_alive()?;
            match s.stocks.iter_mut().find(|st| st.id == id) {
                Some(held) => {
                    held.name = renamed.name.clone();
                    Ok(held.clone())
                }
                None => Ok(renamed),
            }
        })
    }

    /// Removes a stock right away, then asks the server to delete it.
    ///
    /// On failure the stock is restored at its old position, unless a
    /// reload already brought it back.
    pub async fn delete(&self, id: StockId) -> ClientResult<()> {
        let (index, removed) = self.with_state_mut(|s| {
            s.ensure_alive()?;
            let index = s
                .stocks
                .iter()
                .position(|st| st.id == id)
                .ok_or(ClientError::StockNotLoaded(id))?;
            let removed = s.stocks.remove(index);
            s.pending_deletes.insert(id);
            Ok::<_, ClientError>((index, removed))
        })?;

        debug!(stock_id = id, index, "Stock removed locally, deleting on server");
        let result = self.api.delete_stock(id).await;

        let outcome = self.with_state_mut(|s: &mut ListState| -> ClientResult<()> {
            s.pending_deletes.remove(&id);
            s.ensure_alive()?;
            match result {
                Ok(()) => {
                    if let Some(total) = s.window.total_count.as_mut() {
                        *total = total.saturating_sub(1);
                    }
                    s.removed_since_page += 1;
                    Ok(())
                }
                Err(e) => {
                    if !s.contains(id) {
                        let at = index.min(s.stocks.len());
                        s.stocks.insert(at, removed);
                    }
                    s.last_error = Some(e.to_string());
                    Err(e)
                }
            }
        });

        match outcome {
            Ok(()) => {
                info!(stock_id = id, "Stock deleted");
                Ok(())
            }
            Err(e) => {
                warn!(stock_id = id, error = %e, "Delete failed, stock restored");
                self.report(&e);
                Err(e)
            }
        }
    }

    // =========================================================================
    // Detail
    // =========================================================================

    /// Fetches a stock fresh from the server, medicines included.
    ///
    /// The summary entry, if held, is replaced with the fresh copy.
    pub async fn open_detail(&self, id: StockId) -> ClientResult<Stock> {
        self.with_state(|s| s.ensure_alive())?;

        let stock = match self.api.get_stock(id).await {
            Ok(stock) => stock,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };

        self.with_state(|s| s.ensure_alive())?;
        self.apply_detail(&stock);
        Ok(stock)
    }

    /// Replaces the held entry with the same id. Returns false if the stock
    /// is not held or the view is gone.
    pub fn apply_detail(&self, stock: &Stock) -> bool {
        self.with_state_mut(|s| {
            if !s.alive {
                return false;
            }
            match s.stocks.iter_mut().find(|st| st.id == stock.id) {
                Some(held) => {
                    *held = stock.clone();
                    true
                }
                None => false,
            }
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// The view was unmounted. Every later response is dropped.
    pub fn teardown(&self) {
        self.with_state_mut(|s| {
            s.alive = false;
            s.generation += 1;
            s.busy = false;
            s.phase = LoadPhase::Idle;
            s.stocks.clear();
        });
        debug!("Stock list torn down");
    }

    pub fn is_alive(&self) -> bool {
        self.with_state(|s| s.alive)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn snapshot(&self) -> ListSnapshot {
        self.with_state(|s| s.snapshot())
    }

    pub fn stocks(&self) -> Vec<Stock> {
        self.with_state(|s| s.stocks.clone())
    }

    pub fn has_more(&self) -> bool {
        self.with_state(|s| s.has_more())
    }

    pub fn phase(&self) -> LoadPhase {
        self.with_state(|s| s.phase)
    }

    pub fn page_window(&self) -> PageWindow {
        self.with_state(|s| s.window)
    }

    /// The list screen's view model, filtered by the search box.
    pub fn view(&self, query: &str) -> StockListView {
        self.with_state(|s| StockListView {
            cards: filter_by_name(&s.stocks, query)
                .into_iter()
                .map(StockCardView::from)
                .collect(),
            loaded_count: s.stocks.len(),
            total_count: s.window.total_count,
            loading_first_page: s.phase == LoadPhase::LoadingFirstPage,
            loading_more: s.phase == LoadPhase::LoadingMore,
            has_more: s.has_more(),
            last_error: s.last_error.clone(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
