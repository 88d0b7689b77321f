use anyhow::Context as _;
use chrono::{DateTime, Datelike as _, NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::formats::{Chapter, WorkRecord};

pub const DEFAULT_TITLE: &str = "Sem título";
pub const DEFAULT_CATEGORY: &str = "obra";
pub const PLACEHOLDER_COVER: &str = "../img/capa-padrao.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub placeholder_cover: String,
    pub default_category: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            placeholder_cover: PLACEHOLDER_COVER.to_owned(),
            default_category: DEFAULT_CATEGORY.to_owned(),
        }
    }
}

/// Turns a candidate list of raw content records into work records.
///
/// Anything other than an array yields an empty list. A record that fails to
/// normalize is logged with its index and skipped; the rest of the batch is kept.
pub fn normalize_works(data: &Value, options: &NormalizeOptions) -> Vec<WorkRecord> {
    let Some(items) = data.as_array() else {
        tracing::warn!(kind = value_kind(data), "expected an array of works");
        return Vec::new();
    };

    tracing::debug!(count = items.len(), "normalizing works");

    let mut out = Vec::with_capacity(items.len());
    for (index, raw) in items.iter().enumerate() {
        match normalize_work(raw, options) {
            Ok(work) => out.push(work),
            Err(err) => {
                tracing::error!(index, error = %format!("{err:#}"), "skipping malformed work record");
            }
        }
    }
    out
}

pub fn normalize_work(raw: &Value, options: &NormalizeOptions) -> anyhow::Result<WorkRecord> {
    let Value::Object(item) = raw else {
        anyhow::bail!("work record must be an object, got {}", value_kind(raw));
    };

    let (release_date, year) = match non_empty_str(item.get("dataLancamento")) {
        Some(raw_date) => match parse_release_date(raw_date) {
            Some(date) => (
                Some(date.format("%Y-%m-%d").to_string()),
                date.year().to_string(),
            ),
            None => {
                tracing::debug!(raw_date, "unparseable release date; leaving it empty");
                (None, String::new())
            }
        },
        None => (None, String::new()),
    };

    let category = resolve_category(item)
        .context("resolve category")?
        .unwrap_or_else(|| options.default_category.clone())
        .to_lowercase();

    Ok(WorkRecord {
        id: non_empty_str(item.get("_id")).map(str::to_owned),
        title: non_empty_str(item.get("titulo"))
            .unwrap_or(DEFAULT_TITLE)
            .to_owned(),
        slug: resolve_slug(item.get("slug")),
        cover_image_url: resolve_cover(item).unwrap_or_else(|| options.placeholder_cover.clone()),
        synopsis: str_or_empty(item.get("sinopse")),
        purchase_link: str_or_empty(item.get("linkAmazon")),
        read_link: str_or_empty(item.get("linkLeitura")),
        release_date,
        year,
        category,
        visible: resolve_visibility(item),
        free_access: item
            .get("acessoLivre")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        document_url: non_empty_str(item.get("arquivo"))
            .or_else(|| non_empty_str(raw.pointer("/arquivo/asset/url")))
            .map(str::to_owned),
    })
}

/// Chapters keep their source position unless an explicit order is given.
pub fn normalize_chapters(data: Option<&Value>) -> Vec<Chapter> {
    let Some(items) = data.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut chapters = Vec::with_capacity(items.len());
    for (index, raw) in items.iter().enumerate() {
        let Value::Object(item) = raw else {
            tracing::error!(index, kind = value_kind(raw), "skipping malformed chapter");
            continue;
        };
        chapters.push(Chapter {
            order: item
                .get("ordem")
                .or_else(|| item.get("order"))
                .and_then(Value::as_i64),
            name: non_empty_str(item.get("nome"))
                .map(str::to_owned)
                .unwrap_or_else(|| format!("Capítulo {}", index + 1)),
            content: str_or_empty(item.get("conteudo")),
            available: item
                .get("disponivel")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        });
    }

    // sort_by_key is stable, so unordered chapters stay where they were.
    chapters.sort_by_key(|chapter| chapter.order.unwrap_or(i64::MAX));
    chapters
}

pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.with_timezone(&Utc).date_naive());
    }
    None
}

/// Resolution order: first entry of `categorias`, then `categoria`, then a
/// plain-string `categorias`. A field with an unexpected type is an error.
fn resolve_category(item: &Map<String, Value>) -> anyhow::Result<Option<String>> {
    let categorias = item.get("categorias");

    if let Some(Value::Array(values)) = categorias {
        match values.first() {
            Some(Value::String(first)) if !first.is_empty() => return Ok(Some(first.clone())),
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(other) => {
                anyhow::bail!("categorias[0] must be a string, got {}", value_kind(other))
            }
        }
    }

    match item.get("categoria") {
        Some(Value::String(categoria)) if !categoria.is_empty() => {
            return Ok(Some(categoria.clone()));
        }
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(other) => anyhow::bail!("categoria must be a string, got {}", value_kind(other)),
    }

    match categorias {
        Some(Value::String(categorias)) if !categorias.is_empty() => Ok(Some(categorias.clone())),
        None | Some(Value::Null) | Some(Value::String(_)) | Some(Value::Array(_)) => Ok(None),
        Some(other) => anyhow::bail!(
            "categorias must be a string or an array, got {}",
            value_kind(other)
        ),
    }
}

fn resolve_slug(slug: Option<&Value>) -> String {
    match slug {
        Some(Value::String(slug)) => slug.clone(),
        Some(Value::Object(slug)) => str_or_empty(slug.get("current")),
        _ => String::new(),
    }
}

fn resolve_cover(item: &Map<String, Value>) -> Option<String> {
    ["image", "capa", "capaUrl"]
        .into_iter()
        .find_map(|key| non_empty_str(item.get(key)))
        .or_else(|| {
            item.get("capa")
                .and_then(|capa| capa.pointer("/asset/url"))
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
        })
        .map(str::to_owned)
}

/// Absent `visivel` counts as visible unless a `status` other than "Publicado" is set.
fn resolve_visibility(item: &Map<String, Value>) -> bool {
    if let Some(visible) = item.get("visivel").and_then(Value::as_bool) {
        return visible;
    }
    match non_empty_str(item.get("status")) {
        Some(status) => status == "Publicado",
        None => true,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn str_or_empty(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_owned()
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
