use std::fmt;
use std::sync::Arc;

use anyhow::Context as _;
use serde_json::Value;

use crate::cli::ReadArgs;
use crate::config::Config;
use crate::document::{ListenerRegistry, TextDocumentLoader, TextSurface};
use crate::formats::{Chapter, WorkDetail};
use crate::normalize::{normalize_chapters, normalize_work};
use crate::pager::{Pager, PagerPhase};

/// Reader failures, displayed as the message shown to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    MissingSlug,
    NotFound,
    NotAvailable,
    Connection,
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::MissingSlug => "Obra não especificada.",
            Self::NotFound => "Livro não encontrado.",
            Self::NotAvailable => "Livro não disponível para leitura.",
            Self::Connection => "Erro de conexão com o acervo.",
        };
        f.write_str(message)
    }
}

impl std::error::Error for ReaderError {}

pub async fn fetch_work_detail(
    client: &reqwest::Client,
    config: &Config,
    slug: &str,
) -> Result<WorkDetail, ReaderError> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(ReaderError::MissingSlug);
    }

    let url = crate::sanity::query_url(config, crate::sanity::WORK_QUERY, &[("obra", slug)])
        .map_err(|err| {
            tracing::error!(error = %format!("{err:#}"), "build work query url");
            ReaderError::Connection
        })?;
    let result = crate::sanity::fetch_result(client, &url)
        .await
        .map_err(|err| {
            tracing::error!(slug, error = %format!("{err:#}"), "work query failed");
            ReaderError::Connection
        })?;

    work_detail_from_result(&result, config)
}

pub fn work_detail_from_result(result: &Value, config: &Config) -> Result<WorkDetail, ReaderError> {
    if result.is_null() {
        return Err(ReaderError::NotFound);
    }
    let work = normalize_work(result, &config.normalize_options()).map_err(|err| {
        tracing::error!(error = %format!("{err:#}"), "malformed work record");
        ReaderError::NotFound
    })?;
    if !work.visible {
        return Err(ReaderError::NotAvailable);
    }
    let chapters = normalize_chapters(result.get("capitulos"));
    Ok(WorkDetail { work, chapters })
}

/// Chapter list with a single open chapter. Locked chapters cannot be opened.
#[derive(Debug, Clone)]
pub struct ChapterView {
    chapters: Vec<Chapter>,
    active: Option<usize>,
}

impl ChapterView {
    /// Opens the first available chapter, if any.
    pub fn new(chapters: Vec<Chapter>) -> Self {
        let active = chapters.iter().position(|c| c.available);
        Self { chapters, active }
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&Chapter> {
        self.active.and_then(|i| self.chapters.get(i))
    }

    /// Returns the opened chapter, or `None` (leaving the selection alone)
    /// when `index` is out of range or locked.
    pub fn open(&mut self, index: usize) -> Option<&Chapter> {
        let chapter = self.chapters.get(index)?;
        if !chapter.available {
            tracing::debug!(index, name = %chapter.name, "chapter is locked");
            return None;
        }
        self.active = Some(index);
        self.chapters.get(index)
    }
}

pub async fn run(args: ReadArgs, config: &Config) -> anyhow::Result<()> {
    let client = crate::source::http_client()?;
    let Some(slug) = args.obra.as_deref() else {
        anyhow::bail!("{}", ReaderError::MissingSlug);
    };

    let detail = fetch_work_detail(&client, config, slug)
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    let work = &detail.work;

    println!("{}", work.title);
    if !work.synopsis.is_empty() {
        println!("{}", work.synopsis);
    }
    if !work.purchase_link.is_empty() {
        println!("Comprar: {}", work.purchase_link);
    }
    println!();

    let mut view = ChapterView::new(detail.chapters.clone());
    if let Some(index) = args.chapter {
        let index = index.checked_sub(1).context("--chapter is 1-based")?;
        if view.open(index).is_none() {
            anyhow::bail!("capítulo {} indisponível", index + 1);
        }
    }

    for (index, chapter) in view.chapters().iter().enumerate() {
        let marker = if view.active_index() == Some(index) {
            ">"
        } else {
            " "
        };
        let lock = if chapter.available { "" } else { " 🔒" };
        println!("{marker} {}. {}{lock}", index + 1, chapter.name);
    }
    println!();

    let location = match (&args.file, view.active()) {
        (Some(file), _) => file.clone(),
        (None, Some(chapter)) => {
            if args.page.is_none() {
                println!("{}\n", chapter.name);
                println!("{}", chapter.content);
                return Ok(());
            }
            format!("capitulo:{}", view.active_index().unwrap_or_default() + 1)
        }
        (None, None) => match &work.document_url {
            Some(url) => url.clone(),
            None => {
                println!("Nenhum capítulo disponível.");
                return Ok(());
            }
        },
    };

    let mut loader = TextDocumentLoader::new(client, args.columns, args.lines);
    if args.file.is_none()
        && let Some(chapter) = view.active()
    {
        loader = loader.with_inline(location.clone(), chapter.content.clone());
    }
    let surface = TextSurface::new(Some(args.columns as f64));
    let pager = Pager::new(
        Arc::new(loader),
        Arc::new(ListenerRegistry::new()),
        Box::new(surface.clone()),
    );

    let loaded = pager.load(&location).await;
    if let PagerPhase::Failed(message) = pager.phase() {
        println!("{message}");
        return loaded;
    }
    if let Some(page) = args.page
        && page != 1
    {
        pager.render_page(page).await;
    }

    let frame = surface.frame();
    for line in &frame.lines {
        println!("{line}");
    }
    if let Some(message) = &frame.message {
        println!("{message}");
    }
    if let Some(indicator) = &frame.indicator {
        println!("\n{indicator}");
    }
    pager.dispose();
    Ok(())
}
