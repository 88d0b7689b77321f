use anyhow::Context as _;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use url::Url;

use crate::config::Config;

/// Visible or published works, newest first.
pub const WORKS_QUERY: &str = r#"*[_type == "livro" && (visivel == true || status == "Publicado")] | order(dataLancamento desc){
  _id,
  titulo,
  "slug": slug.current,
  sinopse,
  linkAmazon,
  linkLeitura,
  dataLancamento,
  "image": capa.asset->url,
  "categorias": categorias[]->titulo,
  status,
  visivel,
  acessoLivre,
  "arquivo": arquivo.asset->url
}"#;

/// One work by slug (`$obra`), chapters included. Visibility is checked by the caller.
pub const WORK_QUERY: &str = r#"*[_type == "livro" && slug.current == $obra][0]{
  _id,
  titulo,
  "slug": slug.current,
  sinopse,
  linkAmazon,
  linkLeitura,
  dataLancamento,
  "image": capa.asset->url,
  "categorias": categorias[]->titulo,
  status,
  visivel,
  acessoLivre,
  "arquivo": arquivo.asset->url,
  capitulos
}"#;

pub const AUTHOR_QUERY: &str = r#"*[_type == "author"][0]{
  name,
  subtitle,
  "backgroundImageUrl": backgroundImage.asset->url,
  "authorImageUrl": authorImage.asset->url,
  description
}"#;

pub const AUTHOR_PAGE_QUERY: &str = r#"*[_type == "authorPage"][0]{
  name,
  subtitle,
  "imageUrl": authorImage.asset->url,
  mainDescription,
  timeline,
  interests,
  literaryApproach,
  activism,
  collaborators,
  motivationalQuotes
}"#;

/// Builds the query endpoint URL. Parameters are sent as GROQ parameters
/// (`$name=<json>`), never spliced into the query text.
pub fn query_url(config: &Config, query: &str, params: &[(&str, &str)]) -> anyhow::Result<Url> {
    let endpoint = format!(
        "{}/v{}/data/query/{}",
        config.query_origin(),
        config.api_version,
        config.dataset
    );
    let mut url = Url::parse(&endpoint).with_context(|| format!("parse endpoint: {endpoint}"))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("query", query);
        for (name, value) in params {
            let encoded = serde_json::to_string(value).context("encode query parameter")?;
            pairs.append_pair(&format!("${name}"), &encoded);
        }
    }
    Ok(url)
}

/// GETs a query URL and returns the `result` member of the response envelope
/// (`Value::Null` when absent). Non-2xx statuses, non-JSON content types and
/// unparseable bodies are errors.
pub async fn fetch_result(client: &reqwest::Client, url: &Url) -> anyhow::Result<Value> {
    tracing::debug!(endpoint = %url, "content query");

    let response = client
        .get(url.clone())
        .header(ACCEPT, "application/json")
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);
    let raw = response.text().await.context("read query response body")?;

    if !status.is_success() {
        let message = parse_error_message(&raw).unwrap_or(raw);
        anyhow::bail!("content query error ({status}): {message}");
    }
    if let Some(content_type) = content_type
        && !content_type.contains("json")
    {
        anyhow::bail!("content query returned non-JSON content type: {content_type}");
    }

    let mut envelope: Value = serde_json::from_str(&raw).context("parse query response")?;
    tracing::debug!(bytes = raw.len(), "content query response");

    Ok(envelope
        .get_mut("result")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw_json).ok()?;
    let error = value.get("error")?;
    let message = error
        .get("description")
        .or_else(|| error.get("message"))
        .and_then(Value::as_str)?;
    Some(message.to_owned())
}
