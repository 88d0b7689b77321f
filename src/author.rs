use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cli::AuthorArgs;
use crate::config::Config;

/// Home page author block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorProfile {
    pub name: Option<String>,
    pub subtitle: Option<String>,
    pub background_image_url: Option<String>,
    pub author_image_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorPage {
    pub name: Option<String>,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    pub main_description: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub timeline: Vec<TimelineEntry>,
    #[serde(deserialize_with = "nullable")]
    pub interests: Vec<Topic>,
    #[serde(deserialize_with = "nullable")]
    pub literary_approach: Vec<Topic>,
    #[serde(deserialize_with = "nullable")]
    pub activism: Vec<ActivismEntry>,
    #[serde(deserialize_with = "nullable")]
    pub collaborators: Vec<Collaborator>,
    pub motivational_quotes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineEntry {
    #[serde(deserialize_with = "nullable")]
    pub year: String,
    #[serde(deserialize_with = "nullable")]
    pub event: String,
}

/// Interests and approach items were stored either as plain text or as
/// titled topics, depending on the document revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Topic {
    Titled {
        #[serde(rename = "topicTitle", default, deserialize_with = "nullable")]
        title: String,
        #[serde(rename = "topicContent", default, deserialize_with = "nullable")]
        content: String,
    },
    Plain(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivismEntry {
    #[serde(deserialize_with = "nullable")]
    pub year: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collaborator {
    #[serde(deserialize_with = "nullable")]
    pub collab_name: String,
    #[serde(deserialize_with = "nullable")]
    pub collab_role: String,
    #[serde(deserialize_with = "nullable")]
    pub collab_bio: String,
}

/// GROQ projects absent fields as `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

pub async fn fetch_profile(client: &reqwest::Client, config: &Config) -> Option<AuthorProfile> {
    fetch_document(client, config, crate::sanity::AUTHOR_QUERY, "author").await
}

pub async fn fetch_page(client: &reqwest::Client, config: &Config) -> Option<AuthorPage> {
    fetch_document(client, config, crate::sanity::AUTHOR_PAGE_QUERY, "authorPage").await
}

async fn fetch_document<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    config: &Config,
    query: &str,
    doc_type: &str,
) -> Option<T> {
    let result: anyhow::Result<Value> = async {
        let url = crate::sanity::query_url(config, query, &[])?;
        crate::sanity::fetch_result(client, &url).await
    }
    .await;

    match result {
        Ok(value) => parse_document(value, doc_type),
        Err(err) => {
            tracing::error!(doc_type, error = %format!("{err:#}"), "author query failed");
            None
        }
    }
}

fn parse_document<T: serde::de::DeserializeOwned>(value: Value, doc_type: &str) -> Option<T> {
    if value.is_null() {
        tracing::debug!(doc_type, "no document");
        return None;
    }
    match serde_json::from_value(value) {
        Ok(doc) => Some(doc),
        Err(err) => {
            tracing::error!(doc_type, %err, "malformed document");
            None
        }
    }
}

pub async fn run(args: AuthorArgs, config: &Config) -> anyhow::Result<()> {
    let client = crate::source::http_client()?;

    if args.profile {
        let Some(profile) = fetch_profile(&client, config).await else {
            println!("Autor não encontrado.");
            return Ok(());
        };
        if args.json {
            println!("{}", serde_json::to_string_pretty(&profile)?);
        } else {
            print!("{}", render_profile(&profile));
        }
        return Ok(());
    }

    let Some(page) = fetch_page(&client, config).await else {
        println!("Autor não encontrado.");
        return Ok(());
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print!("{}", render_page(&page));
    }
    Ok(())
}

pub fn render_profile(profile: &AuthorProfile) -> String {
    let mut out = String::new();
    for line in [&profile.name, &profile.subtitle, &profile.description]
        .into_iter()
        .flatten()
    {
        out.push_str(line);
        out.push('\n');
    }
    out
}

pub fn render_page(page: &AuthorPage) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    for line in [&page.name, &page.subtitle, &page.main_description]
        .into_iter()
        .flatten()
    {
        let _ = writeln!(out, "{line}");
    }

    if !page.timeline.is_empty() {
        let _ = writeln!(out, "\nTrajetória");
        for item in &page.timeline {
            let _ = writeln!(out, "  {}  {}", item.year, item.event);
        }
    }
    for (heading, topics) in [
        ("Campos de interesse", &page.interests),
        ("Abordagem literária", &page.literary_approach),
    ] {
        if topics.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{heading}");
        for topic in topics {
            match topic {
                Topic::Titled { title, content } if content.is_empty() => {
                    let _ = writeln!(out, "  - {title}");
                }
                Topic::Titled { title, content } => {
                    let _ = writeln!(out, "  - {title}: {content}");
                }
                Topic::Plain(text) => {
                    let _ = writeln!(out, "  - {text}");
                }
            }
        }
    }
    if !page.activism.is_empty() {
        let _ = writeln!(out, "\nParticipação e atuação");
        for item in &page.activism {
            let _ = writeln!(out, "  {}  {}", item.year, item.description);
        }
    }
    if !page.collaborators.is_empty() {
        let _ = writeln!(out, "\nColaboradores");
        for c in &page.collaborators {
            let _ = writeln!(out, "  {} ({}): {}", c.collab_name, c.collab_role, c.collab_bio);
        }
    }
    if let Some(quotes) = &page.motivational_quotes {
        let _ = writeln!(out, "\n\"{quotes}\"");
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn page_accepts_both_topic_shapes() {
        let value = json!({
            "name": "Mário Paulo",
            "imageUrl": "https://cdn/autor.jpg",
            "timeline": [{"year": "2019", "event": "Primeiro livro"}],
            "interests": [
                {"topicTitle": "Memória", "topicContent": "Arquivos e afetos"},
                "Periferia"
            ],
            "literaryApproach": ["Prosa curta"],
            "activism": null,
            "collaborators": [{"collabName": "Ana", "collabRole": "Capa", "collabBio": "Ilustradora"}],
            "unexpected": true
        });

        let page: AuthorPage = parse_document(value, "authorPage").unwrap();
        assert_eq!(page.image_url.as_deref(), Some("https://cdn/autor.jpg"));
        assert_eq!(page.timeline[0].event, "Primeiro livro");
        assert_eq!(
            page.interests,
            vec![
                Topic::Titled {
                    title: "Memória".into(),
                    content: "Arquivos e afetos".into()
                },
                Topic::Plain("Periferia".into())
            ]
        );
        assert!(page.activism.is_empty());

        let text = render_page(&page);
        assert!(text.starts_with("Mário Paulo\n"));
        assert!(text.contains("  - Memória: Arquivos e afetos\n"));
        assert!(text.contains("  Ana (Capa): Ilustradora\n"));
    }

    #[test]
    fn null_document_is_none() {
        assert_eq!(parse_document::<AuthorProfile>(Value::Null, "author"), None);
    }

    #[test]
    fn malformed_document_is_none() {
        let value = json!({"timeline": "not a list"});
        assert_eq!(parse_document::<AuthorPage>(value, "authorPage"), None);
    }

    #[test]
    fn profile_renders_present_fields_only() {
        let profile = AuthorProfile {
            name: Some("Mário".into()),
            description: Some("Escritor.".into()),
            ..Default::default()
        };
        assert_eq!(render_profile(&profile), "Mário\nEscritor.\n");
    }
}
