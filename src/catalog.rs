use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cli::CatalogArgs;
use crate::config::Config;
use crate::debounce::{Debouncer, SEARCH_DELAY};
use crate::filter::{FilterState, filter_works};
use crate::formats::WorkRecord;
use crate::normalize::DEFAULT_CATEGORY;
use crate::reviews::ReviewSummary;
use crate::url_state;

/// Page URL used when none is given on the command line.
pub const DEFAULT_PAGE_URL: &str = "http://localhost/obras-galeria.html";

/// Slider excerpt length, in characters.
pub const EXCERPT_LEN: usize = 80;

pub const EMPTY_MESSAGE: &str = "Nenhuma obra encontrada.";

/// The catalog page: the loaded works, the active filters and the page URL
/// they are mirrored into.
#[derive(Debug, Clone)]
pub struct CatalogPage {
    works: Vec<WorkRecord>,
    state: FilterState,
    url: Url,
    reader_route: String,
}

impl CatalogPage {
    pub fn open(works: Vec<WorkRecord>, url: Url, reader_route: impl Into<String>) -> Self {
        let state = url_state::from_url(&url);
        tracing::debug!(works = works.len(), ?state, "catalog opened");
        Self {
            works,
            state,
            url,
            reader_route: reader_route.into(),
        }
    }

    pub fn works(&self) -> &[WorkRecord] {
        &self.works
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn visible(&self) -> Vec<&WorkRecord> {
        filter_works(&self.works, &self.state)
    }

    pub fn set_term(&mut self, term: impl Into<String>) -> Vec<&WorkRecord> {
        self.state.set_term(term);
        self.sync()
    }

    pub fn set_year(&mut self, year: &str) -> Vec<&WorkRecord> {
        self.state.set_year(year);
        self.sync()
    }

    pub fn set_category(&mut self, category: &str) -> Vec<&WorkRecord> {
        self.state.set_category(category);
        self.sync()
    }

    fn sync(&mut self) -> Vec<&WorkRecord> {
        url_state::replace_url(&mut self.url, &self.state);
        self.visible()
    }

    /// Distinct non-empty years, newest first.
    pub fn year_options(&self) -> Vec<String> {
        let years: BTreeSet<&str> = self
            .works
            .iter()
            .map(|w| w.year.as_str())
            .filter(|y| !y.is_empty())
            .collect();
        years.into_iter().rev().map(str::to_owned).collect()
    }

    pub fn category_options(&self) -> Vec<CategoryOption> {
        let categories: BTreeSet<String> = self
            .works
            .iter()
            .map(|w| w.category.to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        categories
            .into_iter()
            .map(|value| CategoryOption {
                label: capitalize(&value),
                value,
            })
            .collect()
    }

    pub fn cards(&self) -> Vec<Card> {
        self.visible()
            .into_iter()
            .map(|work| Card::new(work, &self.reader_route))
            .collect()
    }

    pub fn detail(&self, slug: &str, reviews: ReviewSummary) -> Option<DetailView> {
        self.works
            .iter()
            .find(|w| w.slug == slug)
            .map(|work| DetailView::new(work, &self.reader_route, reviews))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub slug: String,
    pub title: String,
    pub category_label: String,
    pub year_label: String,
    pub cover_image_url: String,
    pub read_link: Option<String>,
}

impl Card {
    pub fn new(work: &WorkRecord, reader_route: &str) -> Self {
        Self {
            slug: work.slug.clone(),
            title: work.title.clone(),
            category_label: category_label(&work.category),
            year_label: label_or(&work.year, "S/D"),
            cover_image_url: work.cover_image_url.clone(),
            read_link: (!work.slug.is_empty())
                .then(|| url_state::reader_link(reader_route, &work.slug)),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        write!(f, "  {} · {}", self.category_label, self.year_label)?;
        if let Some(link) = &self.read_link {
            write!(f, "\n  Ler online: {link}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "href", rename_all = "lowercase")]
pub enum ReadAction {
    /// A link hosted elsewhere, opened in a new tab.
    External(String),
    /// The built-in reader.
    Internal(String),
    Hidden,
}

/// Everything the detail dialog shows for one work, review summary included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailView {
    pub slug: String,
    pub title: String,
    pub year_label: String,
    pub category_label: String,
    pub synopsis: String,
    pub cover_image_url: String,
    pub read_action: ReadAction,
    pub purchase_link: Option<String>,
    pub reviews: ReviewSummary,
}

impl DetailView {
    pub fn new(work: &WorkRecord, reader_route: &str, reviews: ReviewSummary) -> Self {
        let read_action = if let Some(link) = usable_link(&work.read_link) {
            ReadAction::External(link)
        } else if !work.slug.is_empty() {
            ReadAction::Internal(url_state::reader_link(reader_route, &work.slug))
        } else {
            ReadAction::Hidden
        };

        Self {
            slug: work.slug.clone(),
            title: work.title.clone(),
            year_label: label_or(&work.year, "N/A"),
            category_label: category_label(&work.category),
            synopsis: work.synopsis.clone(),
            cover_image_url: work.cover_image_url.clone(),
            read_action,
            purchase_link: usable_link(&work.purchase_link),
            reviews,
        }
    }
}

/// Home page slider card. Selecting it opens the gallery searched by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideCard {
    pub title: String,
    pub excerpt: String,
    pub cover_image_url: String,
    pub gallery_link: String,
}

impl SlideCard {
    pub fn new(work: &WorkRecord, gallery_route: &str) -> Self {
        let state = FilterState::new(work.title.clone(), "", "");
        Self {
            title: work.title.clone(),
            excerpt: truncate(&work.synopsis, EXCERPT_LEN),
            cover_image_url: work.cover_image_url.clone(),
            gallery_link: format!("{gallery_route}?{}", url_state::to_query(&state)),
        }
    }
}

/// Search input that applies the term once typing pauses.
pub struct SearchBox {
    page: Arc<Mutex<CatalogPage>>,
    debouncer: Debouncer,
}

impl SearchBox {
    pub fn new(page: Arc<Mutex<CatalogPage>>) -> Self {
        Self {
            page,
            debouncer: Debouncer::new(SEARCH_DELAY),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn input(&self, term: impl Into<String>) {
        let page = Arc::clone(&self.page);
        let term = term.into();
        self.debouncer.call(move || async move {
            let mut page = page.lock().unwrap_or_else(PoisonError::into_inner);
            let visible = page.set_term(term).len();
            tracing::debug!(visible, url = %page.url(), "search applied");
        });
    }
}

fn usable_link(link: &str) -> Option<String> {
    let link = link.trim();
    (!link.is_empty() && link != "#").then(|| link.to_owned())
}

fn label_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_owned()
    } else {
        value.to_owned()
    }
}

fn category_label(category: &str) -> String {
    if category.is_empty() {
        capitalize(DEFAULT_CATEGORY)
    } else {
        capitalize(category)
    }
}

pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The gallery page address without query or fragment.
pub fn gallery_route(url: &Url) -> String {
    let mut route = url.clone();
    route.set_query(None);
    route.set_fragment(None);
    route.into()
}

/// Last line of a `--json` listing.
#[derive(Debug, Serialize)]
struct ListingTrailer<'a> {
    url: &'a str,
    total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

pub async fn run(args: CatalogArgs, config: &Config) -> anyhow::Result<()> {
    let client = crate::source::http_client()?;
    let chain = crate::source::FallbackChain::from_config(&client, config)?;
    let works = chain.load_works(&config.normalize_options()).await;

    let url = Url::parse(args.url.as_deref().unwrap_or(DEFAULT_PAGE_URL)).context("parse --url")?;

    if args.home {
        let route = gallery_route(&url);
        for work in &works {
            let slide = SlideCard::new(work, &route);
            if args.json {
                println!("{}", serde_json::to_string(&slide)?);
            } else {
                println!("{}\n  {}", slide.title, slide.excerpt);
            }
        }
        return Ok(());
    }

    let mut page = CatalogPage::open(works, url, config.reader_route.clone());
    if let Some(term) = args.q {
        page.set_term(term);
    }
    if let Some(year) = args.year.as_deref() {
        page.set_year(year);
    }
    if let Some(category) = args.category.as_deref() {
        page.set_category(category);
    }

    let cards = page.cards();
    if args.json {
        for card in &cards {
            println!("{}", serde_json::to_string(card)?);
        }
        let trailer = ListingTrailer {
            url: page.url().as_str(),
            total: cards.len(),
            message: cards.is_empty().then_some(EMPTY_MESSAGE),
        };
        println!("{}", serde_json::to_string(&trailer)?);
        return Ok(());
    }

    if cards.is_empty() {
        println!("{EMPTY_MESSAGE}");
    }
    for card in &cards {
        println!("{card}\n");
    }
    println!("{}", page.url());
    Ok(())
}
