//! Seams between the paged viewer and the outside world: the page
//! rasterizer, the drawing surface and the input event source. A plain-text
//! implementation of each is provided for terminal reading.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

/// A loaded multi-page document.
#[async_trait]
pub trait PageDocument: Send + Sync {
    fn page_count(&self) -> u32;

    /// Natural width of page `page` (1-based) at scale 1.
    async fn page_width(&self, page: u32) -> anyhow::Result<f64>;

    /// Draws page `page` (1-based) into `surface` at `scale`.
    async fn render(&self, page: u32, scale: f64, surface: &mut dyn Surface)
    -> anyhow::Result<()>;
}

#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, location: &str) -> anyhow::Result<Arc<dyn PageDocument>>;
}

/// The fixed drawing area a page is rendered into.
pub trait Surface: Send {
    /// Width available for a page, if known.
    fn available_width(&self) -> Option<f64>;
    fn resize(&mut self, width: f64, height: f64);
    fn clear(&mut self);
    fn draw_line(&mut self, text: &str);
    fn show_indicator(&mut self, current: u32, total: u32);
    fn show_message(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Keyboard,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Where viewer input listeners are attached.
pub trait InputEvents: Send + Sync {
    fn attach(&self, kind: InputKind) -> ListenerId;
    fn detach(&self, id: ListenerId);
}

/// Keeps track of attached listeners.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    active: HashMap<ListenerId, InputKind>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self, kind: InputKind) -> usize {
        self.lock().active.values().filter(|k| **k == kind).count()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputEvents for ListenerRegistry {
    fn attach(&self, kind: InputKind) -> ListenerId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner.active.insert(id, kind);
        id
    }

    fn detach(&self, id: ListenerId) {
        self.lock().active.remove(&id);
    }
}

/// Text split into fixed-height pages of wrapped lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    columns: usize,
    pages: Vec<Vec<String>>,
}

impl TextDocument {
    pub fn paginate(text: &str, columns: usize, lines_per_page: usize) -> Self {
        let columns = columns.max(1);
        let lines_per_page = lines_per_page.max(1);

        let mut lines = Vec::new();
        for paragraph in text.trim_end().lines() {
            wrap_into(paragraph, columns, &mut lines);
        }
        if lines.iter().all(|line| line.trim().is_empty()) {
            lines.clear();
        }

        let pages = lines
            .chunks(lines_per_page)
            .map(<[String]>::to_vec)
            .collect();
        Self { columns, pages }
    }

    pub fn page(&self, page: u32) -> Option<&[String]> {
        let index = usize::try_from(page).ok()?.checked_sub(1)?;
        self.pages.get(index).map(Vec::as_slice)
    }
}

#[async_trait]
impl PageDocument for TextDocument {
    fn page_count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }

    async fn page_width(&self, _page: u32) -> anyhow::Result<f64> {
        Ok(self.columns as f64)
    }

    async fn render(
        &self,
        page: u32,
        scale: f64,
        surface: &mut dyn Surface,
    ) -> anyhow::Result<()> {
        let lines = self
            .page(page)
            .ok_or_else(|| anyhow::anyhow!("page {page} out of range"))?;
        surface.resize(self.columns as f64 * scale, lines.len() as f64 * scale);
        surface.clear();
        for line in lines {
            surface.draw_line(line);
        }
        Ok(())
    }
}

fn wrap_into(paragraph: &str, columns: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    let mut width = 0;
    for word in paragraph.split_whitespace() {
        let word_width = word.chars().count();
        if width > 0 && width + 1 + word_width > columns {
            out.push(std::mem::take(&mut current));
            width = 0;
        }
        if width > 0 {
            current.push(' ');
            width += 1;
        }
        current.push_str(word);
        width += word_width;
    }
    out.push(current);
}

/// Loads text documents from inline entries, http(s) URLs or local paths.
#[derive(Debug, Clone)]
pub struct TextDocumentLoader {
    client: reqwest::Client,
    columns: usize,
    lines_per_page: usize,
    inline: HashMap<String, String>,
}

impl TextDocumentLoader {
    pub fn new(client: reqwest::Client, columns: usize, lines_per_page: usize) -> Self {
        Self {
            client,
            columns,
            lines_per_page,
            inline: HashMap::new(),
        }
    }

    /// Registers text served for `location` without any I/O.
    pub fn with_inline(mut self, location: impl Into<String>, text: impl Into<String>) -> Self {
        self.inline.insert(location.into(), text.into());
        self
    }
}

#[async_trait]
impl DocumentLoader for TextDocumentLoader {
    async fn load(&self, location: &str) -> anyhow::Result<Arc<dyn PageDocument>> {
        let text = match self.inline.get(location) {
            Some(text) => text.clone(),
            None => {
                let bytes = crate::source::read_location(&self.client, location).await?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
        };
        Ok(Arc::new(TextDocument::paginate(
            &text,
            self.columns,
            self.lines_per_page,
        )))
    }
}

/// What a [`TextSurface`] currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextFrame {
    pub width: f64,
    pub height: f64,
    pub lines: Vec<String>,
    pub indicator: Option<String>,
    pub message: Option<String>,
}

/// A surface backed by shared memory. Clones observe the same frame.
#[derive(Debug, Clone)]
pub struct TextSurface {
    available_width: Option<f64>,
    frame: Arc<Mutex<TextFrame>>,
}

impl TextSurface {
    pub fn new(available_width: Option<f64>) -> Self {
        Self {
            available_width,
            frame: Arc::new(Mutex::new(TextFrame::default())),
        }
    }

    pub fn frame(&self) -> TextFrame {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, TextFrame> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Surface for TextSurface {
    fn available_width(&self) -> Option<f64> {
        self.available_width
    }

    fn resize(&mut self, width: f64, height: f64) {
        let mut frame = self.lock();
        frame.width = width;
        frame.height = height;
    }

    fn clear(&mut self) {
        let mut frame = self.lock();
        frame.lines.clear();
        frame.message = None;
    }

    fn draw_line(&mut self, text: &str) {
        self.lock().lines.push(text.to_owned());
    }

    fn show_indicator(&mut self, current: u32, total: u32) {
        self.lock().indicator = Some(format!("Página {current} de {total}"));
    }

    fn show_message(&mut self, message: &str) {
        self.lock().message = Some(message.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginates_wrapped_lines() {
        let text = "um dois tres quatro cinco seis\nsete\n\noito";
        let doc = TextDocument::paginate(text, 10, 3);

        assert_eq!(doc.page_count(), 3);
        assert_eq!(
            doc.page(1).unwrap(),
            ["um dois", "tres", "quatro"].map(String::from).as_slice()
        );
        assert_eq!(
            doc.page(2).unwrap(),
            ["cinco seis", "sete", ""].map(String::from).as_slice()
        );
        assert_eq!(doc.page(3).unwrap(), ["oito"].map(String::from).as_slice());
        assert_eq!(doc.page(0), None);
        assert_eq!(doc.page(4), None);
    }

    #[test]
    fn blank_text_has_no_pages() {
        assert_eq!(TextDocument::paginate("  \n\n", 20, 5).page_count(), 0);
        assert_eq!(TextDocument::paginate("", 20, 5).page_count(), 0);
    }

    #[test]
    fn long_words_get_their_own_line() {
        let doc = TextDocument::paginate("a extraordinariamente b", 5, 10);
        assert_eq!(
            doc.page(1).unwrap(),
            ["a", "extraordinariamente", "b"].map(String::from).as_slice()
        );
    }

    #[tokio::test]
    async fn render_draws_scaled_page() {
        let doc = TextDocument::paginate("linha um\nlinha dois", 20, 10);
        let surface = TextSurface::new(Some(40.0));
        let mut target = surface.clone();

        doc.render(1, 2.0, &mut target).await.unwrap();

        let frame = surface.frame();
        assert_eq!(frame.lines, vec!["linha um", "linha dois"]);
        assert_eq!(frame.width, 40.0);
        assert_eq!(frame.height, 4.0);
    }

    #[tokio::test]
    async fn inline_entries_skip_io() {
        let loader = TextDocumentLoader::new(reqwest::Client::new(), 30, 2)
            .with_inline("capitulo:1", "a\nb\nc");
        let doc = loader.load("capitulo:1").await.unwrap();
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn registry_counts_active_listeners() {
        let registry = ListenerRegistry::new();
        let key = registry.attach(InputKind::Keyboard);
        registry.attach(InputKind::Resize);
        assert_eq!(registry.active(InputKind::Keyboard), 1);

        registry.detach(key);
        assert_eq!(registry.active(InputKind::Keyboard), 0);
        assert_eq!(registry.active(InputKind::Resize), 1);
    }
}
