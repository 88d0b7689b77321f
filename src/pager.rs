//! Paged document viewer.
//!
//! `Idle → Loading → Ready`, or `Loading → Failed`. While `Ready`, a render
//! may be in flight; navigation arriving during a render is dropped, not
//! queued. `dispose` returns the viewer to `Idle` from any state and
//! invalidates any render still in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::debounce::{Debouncer, RESIZE_DELAY};
use crate::document::{DocumentLoader, InputEvents, InputKind, ListenerId, PageDocument, Surface};

/// Scale used when the surface width or the page width is unknown or zero.
pub const DEFAULT_SCALE: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "message")]
pub enum PagerPhase {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PagerState {
    pub current_page: u32,
    pub total_pages: u32,
    pub is_rendering: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    NotReady,
    Busy,
    OutOfRange,
    Unbound,
    /// The document was disposed while the render was in flight.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered(u32),
    Failed(u32),
    Skipped(Skip),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Other,
}

pub fn display_scale(available_width: Option<f64>, natural_width: f64) -> f64 {
    match available_width {
        Some(width)
            if width.is_finite()
                && width > 0.0
                && natural_width.is_finite()
                && natural_width > 0.0 =>
        {
            width / natural_width
        }
        _ => DEFAULT_SCALE,
    }
}

struct Inner {
    phase: PagerPhase,
    document: Option<Arc<dyn PageDocument>>,
    current_page: u32,
    total_pages: u32,
    listeners: Vec<ListenerId>,
}

impl Inner {
    fn idle() -> Self {
        Self {
            phase: PagerPhase::Idle,
            document: None,
            current_page: 0,
            total_pages: 0,
            listeners: Vec::new(),
        }
    }
}

pub struct Pager {
    loader: Arc<dyn DocumentLoader>,
    events: Arc<dyn InputEvents>,
    surface: tokio::sync::Mutex<Box<dyn Surface>>,
    inner: Mutex<Inner>,
    /// Bumped by `dispose`; renders and loads from an older generation are
    /// discarded.
    generation: AtomicU64,
    /// Generation owning the busy flag, or 0 when idle.
    rendering: AtomicU64,
    resize: Debouncer,
}

struct BusyGuard<'a> {
    rendering: &'a AtomicU64,
    generation: u64,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let _ = self.rendering.compare_exchange(
            self.generation,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

impl Pager {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        events: Arc<dyn InputEvents>,
        surface: Box<dyn Surface>,
    ) -> Self {
        Self {
            loader,
            events,
            surface: tokio::sync::Mutex::new(surface),
            inner: Mutex::new(Inner::idle()),
            generation: AtomicU64::new(1),
            rendering: AtomicU64::new(0),
            resize: Debouncer::new(RESIZE_DELAY),
        }
    }

    pub fn phase(&self) -> PagerPhase {
        self.inner().phase.clone()
    }

    pub fn state(&self) -> PagerState {
        let inner = self.inner();
        PagerState {
            current_page: inner.current_page,
            total_pages: inner.total_pages,
            is_rendering: self.is_rendering(),
        }
    }

    /// Loads `location` and renders its first page. Only valid from `Idle`;
    /// call [`Pager::dispose`] before loading another document.
    pub async fn load(&self, location: &str) -> anyhow::Result<()> {
        let generation = {
            let mut inner = self.inner();
            if inner.phase != PagerPhase::Idle {
                anyhow::bail!("viewer is not idle ({:?}); dispose it first", inner.phase);
            }
            inner.phase = PagerPhase::Loading;
            self.generation.load(Ordering::SeqCst)
        };
        tracing::debug!(location, "loading document");

        let document = match self.loader.load(location).await {
            Ok(document) => document,
            Err(err) => {
                let message = "Não foi possível carregar o documento.".to_owned();
                tracing::warn!(location, error = %format!("{err:#}"), "document load failed");
                let current = {
                    let mut inner = self.inner();
                    let current = !self.is_stale(generation);
                    if current {
                        inner.phase = PagerPhase::Failed(message.clone());
                    }
                    current
                };
                if current {
                    self.surface.lock().await.show_message(&message);
                }
                return Err(err.context(format!("load document: {location}")));
            }
        };

        let total = document.page_count();
        {
            let mut inner = self.inner();
            if self.is_stale(generation) {
                tracing::debug!(location, "viewer disposed while loading; discarding document");
                return Ok(());
            }
            inner.document = Some(document);
            inner.total_pages = total;
            inner.current_page = u32::from(total > 0);
            inner.phase = PagerPhase::Ready;
            inner.listeners = vec![
                self.events.attach(InputKind::Keyboard),
                self.events.attach(InputKind::Resize),
            ];
        }
        tracing::debug!(location, total, "document ready");

        if total > 0 {
            self.render_page(1).await;
        } else {
            self.surface.lock().await.show_indicator(0, 0);
        }
        Ok(())
    }

    pub async fn go_to_next(&self) -> RenderOutcome {
        self.step(1).await
    }

    pub async fn go_to_previous(&self) -> RenderOutcome {
        self.step(-1).await
    }

    async fn step(&self, delta: i64) -> RenderOutcome {
        let target = {
            let inner = self.inner();
            if inner.phase != PagerPhase::Ready {
                return RenderOutcome::Skipped(Skip::NotReady);
            }
            if self.is_rendering() {
                return RenderOutcome::Skipped(Skip::Busy);
            }
            let target = i64::from(inner.current_page) + delta;
            if target < 1 || target > i64::from(inner.total_pages) {
                return RenderOutcome::Skipped(Skip::OutOfRange);
            }
            target
        };
        match u32::try_from(target) {
            Ok(target) => self.render_page(target).await,
            Err(_) => RenderOutcome::Skipped(Skip::OutOfRange),
        }
    }

    /// Renders page `page` and makes it current. Dropped while another render
    /// is in flight; a render outliving its document draws nothing.
    pub async fn render_page(&self, page: u32) -> RenderOutcome {
        let (document, generation) = {
            let mut inner = self.inner();
            let Some(document) = inner.document.clone() else {
                return RenderOutcome::Skipped(Skip::NotReady);
            };
            if inner.phase != PagerPhase::Ready {
                return RenderOutcome::Skipped(Skip::NotReady);
            }
            if page < 1 || page > inner.total_pages {
                return RenderOutcome::Skipped(Skip::OutOfRange);
            }
            let generation = self.generation.load(Ordering::SeqCst);
            if self
                .rendering
                .compare_exchange(0, generation, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                tracing::debug!(page, "render in flight; dropping request");
                return RenderOutcome::Skipped(Skip::Busy);
            }
            inner.current_page = page;
            (document, generation)
        };
        let _busy = BusyGuard {
            rendering: &self.rendering,
            generation,
        };

        let mut surface = self.surface.lock().await;
        if self.is_stale(generation) {
            return RenderOutcome::Skipped(Skip::Stale);
        }
        let result = draw(document.as_ref(), page, &mut **surface).await;
        if self.is_stale(generation) {
            tracing::debug!(page, "document disposed during render; discarding frame");
            surface.clear();
            return RenderOutcome::Skipped(Skip::Stale);
        }
        let total = self.inner().total_pages;
        surface.show_indicator(page, total);

        match result {
            Ok(()) => RenderOutcome::Rendered(page),
            Err(err) => {
                tracing::warn!(page, error = %format!("{err:#}"), "page render failed");
                surface.show_message(&format!("Erro ao exibir a página {page}."));
                RenderOutcome::Failed(page)
            }
        }
    }

    pub async fn handle_key(&self, key: Key) -> RenderOutcome {
        match key {
            Key::ArrowLeft => self.go_to_previous().await,
            Key::ArrowRight => self.go_to_next().await,
            Key::Other => RenderOutcome::Skipped(Skip::Unbound),
        }
    }

    /// Schedules a re-render of the current page once resizing settles.
    pub fn on_resize(self: &Arc<Self>) {
        if self.phase() != PagerPhase::Ready {
            return;
        }
        let pager = Arc::clone(self);
        self.resize.call(move || async move {
            let page = pager.state().current_page;
            pager.render_page(page).await;
        });
    }

    /// Releases the document and detaches listeners. Safe in any state.
    pub fn dispose(&self) {
        self.resize.cancel();
        let mut inner = self.inner();
        for id in inner.listeners.drain(..) {
            self.events.detach(id);
        }
        *inner = Inner::idle();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.rendering.store(0, Ordering::SeqCst);
    }

    fn is_rendering(&self) -> bool {
        self.rendering.load(Ordering::SeqCst) != 0
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn draw(
    document: &dyn PageDocument,
    page: u32,
    surface: &mut dyn Surface,
) -> anyhow::Result<()> {
    let natural_width = document.page_width(page).await?;
    let scale = display_scale(surface.available_width(), natural_width);
    document.render(page, scale, surface).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::document::{ListenerRegistry, TextSurface};

    struct FakeDocument {
        pages: u32,
        renders: Arc<AtomicUsize>,
        gate: Option<(u32, Arc<Notify>)>,
        broken_page: Option<u32>,
    }

    #[async_trait]
    impl PageDocument for FakeDocument {
        fn page_count(&self) -> u32 {
            self.pages
        }

        async fn page_width(&self, _page: u32) -> anyhow::Result<f64> {
            Ok(100.0)
        }

        async fn render(
            &self,
            page: u32,
            scale: f64,
            surface: &mut dyn Surface,
        ) -> anyhow::Result<()> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            if let Some((gated, notify)) = &self.gate
                && *gated == page
            {
                notify.notified().await;
            }
            if self.broken_page == Some(page) {
                anyhow::bail!("rasterizer exploded");
            }
            surface.clear();
            surface.draw_line(&format!("page {page} @ {scale}"));
            Ok(())
        }
    }

    struct FakeLoader {
        pages: u32,
        renders: Arc<AtomicUsize>,
        gate: Option<(u32, Arc<Notify>)>,
        broken_page: Option<u32>,
        fail: bool,
    }

    #[async_trait]
    impl DocumentLoader for FakeLoader {
        async fn load(&self, location: &str) -> anyhow::Result<Arc<dyn PageDocument>> {
            if self.fail {
                anyhow::bail!("404 for {location}");
            }
            Ok(Arc::new(FakeDocument {
                pages: self.pages,
                renders: Arc::clone(&self.renders),
                gate: self.gate.clone(),
                broken_page: self.broken_page,
            }))
        }
    }

    struct Harness {
        pager: Arc<Pager>,
        renders: Arc<AtomicUsize>,
        registry: Arc<ListenerRegistry>,
        surface: TextSurface,
    }

    fn harness(pages: u32, gate: Option<(u32, Arc<Notify>)>) -> Harness {
        build(FakeLoader {
            pages,
            renders: Arc::new(AtomicUsize::new(0)),
            gate,
            broken_page: None,
            fail: false,
        })
    }

    fn build(loader: FakeLoader) -> Harness {
        let renders = Arc::clone(&loader.renders);
        let registry = Arc::new(ListenerRegistry::new());
        let surface = TextSurface::new(Some(300.0));
        let pager = Arc::new(Pager::new(
            Arc::new(loader),
            registry.clone(),
            Box::new(surface.clone()),
        ));
        Harness {
            pager,
            renders,
            registry,
            surface,
        }
    }

    #[test]
    fn scale_falls_back_when_width_unknown() {
        assert_eq!(display_scale(Some(300.0), 100.0), 3.0);
        assert_eq!(display_scale(None, 100.0), DEFAULT_SCALE);
        assert_eq!(display_scale(Some(0.0), 100.0), DEFAULT_SCALE);
        assert_eq!(display_scale(Some(300.0), 0.0), DEFAULT_SCALE);
        assert_eq!(display_scale(Some(f64::NAN), 100.0), DEFAULT_SCALE);
    }

    #[tokio::test]
    async fn load_renders_first_page() {
        let h = harness(3, None);
        h.pager.load("doc.pdf").await.unwrap();

        assert_eq!(h.pager.phase(), PagerPhase::Ready);
        assert_eq!(
            h.pager.state(),
            PagerState {
                current_page: 1,
                total_pages: 3,
                is_rendering: false
            }
        );
        let frame = h.surface.frame();
        assert_eq!(frame.lines, vec!["page 1 @ 3"]);
        assert_eq!(frame.indicator.as_deref(), Some("Página 1 de 3"));
        assert_eq!(h.registry.active(InputKind::Keyboard), 1);
        assert_eq!(h.registry.active(InputKind::Resize), 1);
    }

    #[tokio::test]
    async fn navigation_moves_within_range() {
        let h = harness(3, None);
        h.pager.load("doc.pdf").await.unwrap();

        assert_eq!(h.pager.go_to_previous().await, RenderOutcome::Skipped(Skip::OutOfRange));
        assert_eq!(h.pager.go_to_next().await, RenderOutcome::Rendered(2));
        assert_eq!(h.pager.handle_key(Key::ArrowRight).await, RenderOutcome::Rendered(3));
        assert_eq!(h.pager.handle_key(Key::ArrowLeft).await, RenderOutcome::Rendered(2));
        assert_eq!(h.pager.handle_key(Key::Other).await, RenderOutcome::Skipped(Skip::Unbound));
        assert_eq!(h.pager.state().current_page, 2);
    }

    #[tokio::test]
    async fn next_on_last_page_issues_no_render() {
        let h = harness(10, None);
        h.pager.load("doc.pdf").await.unwrap();
        assert_eq!(h.pager.render_page(10).await, RenderOutcome::Rendered(10));
        let before = h.renders.load(Ordering::SeqCst);

        assert_eq!(h.pager.go_to_next().await, RenderOutcome::Skipped(Skip::OutOfRange));
        assert_eq!(h.pager.state().current_page, 10);
        assert_eq!(h.renders.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn navigation_is_ignored_before_load() {
        let h = harness(3, None);
        assert_eq!(h.pager.go_to_next().await, RenderOutcome::Skipped(Skip::NotReady));
        assert_eq!(h.pager.go_to_previous().await, RenderOutcome::Skipped(Skip::NotReady));
        assert_eq!(h.pager.render_page(1).await, RenderOutcome::Skipped(Skip::NotReady));
        assert_eq!(h.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn navigation_during_render_is_dropped() {
        let notify = Arc::new(Notify::new());
        let h = harness(5, Some((2, Arc::clone(&notify))));
        h.pager.load("doc.pdf").await.unwrap();

        let pager = Arc::clone(&h.pager);
        let in_flight = tokio::spawn(async move { pager.go_to_next().await });
        while !h.pager.state().is_rendering {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.pager.go_to_next().await, RenderOutcome::Skipped(Skip::Busy));
        assert_eq!(h.pager.go_to_previous().await, RenderOutcome::Skipped(Skip::Busy));
        assert_eq!(h.pager.render_page(4).await, RenderOutcome::Skipped(Skip::Busy));

        notify.notify_one();
        assert_eq!(in_flight.await.unwrap(), RenderOutcome::Rendered(2));
        assert!(!h.pager.state().is_rendering);

        assert_eq!(h.pager.go_to_next().await, RenderOutcome::Rendered(3));
    }

    #[tokio::test]
    async fn render_failure_is_shown_and_clears_busy_flag() {
        let h = build(FakeLoader {
            pages: 3,
            renders: Arc::new(AtomicUsize::new(0)),
            gate: None,
            broken_page: Some(2),
            fail: false,
        });
        h.pager.load("doc.pdf").await.unwrap();

        assert_eq!(h.pager.go_to_next().await, RenderOutcome::Failed(2));
        let frame = h.surface.frame();
        assert_eq!(frame.message.as_deref(), Some("Erro ao exibir a página 2."));
        assert_eq!(frame.indicator.as_deref(), Some("Página 2 de 3"));
        assert!(!h.pager.state().is_rendering);
        assert_eq!(h.pager.go_to_next().await, RenderOutcome::Rendered(3));
    }

    #[tokio::test]
    async fn failed_load_is_terminal_until_disposed() {
        let h = build(FakeLoader {
            pages: 3,
            renders: Arc::new(AtomicUsize::new(0)),
            gate: None,
            broken_page: None,
            fail: true,
        });

        assert!(h.pager.load("missing.pdf").await.is_err());
        assert!(matches!(h.pager.phase(), PagerPhase::Failed(_)));
        assert_eq!(
            h.surface.frame().message.as_deref(),
            Some("Não foi possível carregar o documento.")
        );
        assert_eq!(h.registry.active(InputKind::Keyboard), 0);
        assert!(h.pager.load("missing.pdf").await.is_err());

        h.pager.dispose();
        assert_eq!(h.pager.phase(), PagerPhase::Idle);
    }

    #[tokio::test]
    async fn dispose_detaches_listeners_and_allows_reload() {
        let h = harness(2, None);
        h.pager.dispose();
        assert_eq!(h.pager.phase(), PagerPhase::Idle);

        h.pager.load("a.pdf").await.unwrap();
        assert!(h.pager.load("b.pdf").await.is_err());

        h.pager.dispose();
        assert_eq!(h.registry.active(InputKind::Keyboard), 0);
        assert_eq!(h.registry.active(InputKind::Resize), 0);
        assert_eq!(
            h.pager.state(),
            PagerState {
                current_page: 0,
                total_pages: 0,
                is_rendering: false
            }
        );

        h.pager.load("b.pdf").await.unwrap();
        assert_eq!(h.registry.active(InputKind::Keyboard), 1);
        assert_eq!(h.registry.active(InputKind::Resize), 1);
    }

    #[tokio::test]
    async fn dispose_during_render_then_reload_shows_new_first_page() {
        let notify = Arc::new(Notify::new());
        let h = harness(3, Some((2, Arc::clone(&notify))));
        h.pager.load("a.pdf").await.unwrap();

        let pager = Arc::clone(&h.pager);
        let stale = tokio::spawn(async move { pager.go_to_next().await });
        while !h.pager.state().is_rendering {
            tokio::task::yield_now().await;
        }

        h.pager.dispose();
        assert!(!h.pager.state().is_rendering);

        let pager = Arc::clone(&h.pager);
        let reload = tokio::spawn(async move { pager.load("b.pdf").await });
        notify.notify_one();

        assert_eq!(stale.await.unwrap(), RenderOutcome::Skipped(Skip::Stale));
        reload.await.unwrap().unwrap();

        assert_eq!(
            h.pager.state(),
            PagerState {
                current_page: 1,
                total_pages: 3,
                is_rendering: false
            }
        );
        let frame = h.surface.frame();
        assert_eq!(frame.lines, vec!["page 1 @ 3"]);
        assert_eq!(frame.indicator.as_deref(), Some("Página 1 de 3"));
        assert_eq!(h.pager.go_to_previous().await, RenderOutcome::Skipped(Skip::OutOfRange));
    }

    #[tokio::test]
    async fn empty_document_is_ready_with_no_pages() {
        let h = harness(0, None);
        h.pager.load("vazio.pdf").await.unwrap();

        assert_eq!(h.pager.phase(), PagerPhase::Ready);
        assert_eq!(h.pager.state().current_page, 0);
        assert_eq!(h.pager.go_to_next().await, RenderOutcome::Skipped(Skip::OutOfRange));
        assert_eq!(h.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resize_burst_rerenders_once() {
        let h = harness(4, None);
        h.pager.load("doc.pdf").await.unwrap();
        h.pager.go_to_next().await;
        let before = h.renders.load(Ordering::SeqCst);

        for _ in 0..5 {
            h.pager.on_resize();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(h.renders.load(Ordering::SeqCst), before + 1);
        assert_eq!(h.pager.state().current_page, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_cancels_pending_resize() {
        let h = harness(4, None);
        h.pager.load("doc.pdf").await.unwrap();
        let before = h.renders.load(Ordering::SeqCst);

        h.pager.on_resize();
        h.pager.dispose();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(h.renders.load(Ordering::SeqCst), before);
    }
}
