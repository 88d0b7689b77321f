use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub content: ContentArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Where content comes from. Flags override the config file and `ACERVO_*`.
#[derive(Debug, Clone, Default, Args)]
pub struct ContentArgs {
    /// YAML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Origin replacing the content query endpoint's (scheme, host, port).
    #[arg(long, global = true)]
    pub query_base_url: Option<String>,

    /// Static fallback works file (path or http(s) URL).
    #[arg(long, global = true)]
    pub fallback: Option<String>,

    /// Extra attempts against the live query before falling back.
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Directory of the local review store.
    #[arg(long, global = true)]
    pub reviews_dir: Option<PathBuf>,
}

impl ContentArgs {
    pub fn resolve(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(base) = &self.query_base_url {
            config.query_base_url = Some(base.clone());
        }
        if let Some(fallback) = &self.fallback {
            config.fallback = fallback.clone();
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(dir) = &self.reviews_dir {
            config.reviews_dir = dir.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Catalog(CatalogArgs),
    Read(ReadArgs),
    Reviews {
        #[command(subcommand)]
        command: ReviewsCommand,
    },
    Author(AuthorArgs),
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Page URL whose query carries the filters (`q`, `year`, `category`).
    #[arg(long)]
    pub url: Option<String>,

    /// Search term (title or synopsis).
    #[arg(long)]
    pub q: Option<String>,

    #[arg(long)]
    pub year: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Print JSON lines instead of text.
    #[arg(long)]
    pub json: bool,

    /// Print the home page slider instead of the gallery.
    #[arg(long)]
    pub home: bool,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Work slug.
    #[arg(long)]
    pub obra: Option<String>,

    /// Chapter to open (1-based). Defaults to the first available one.
    #[arg(long)]
    pub chapter: Option<usize>,

    /// Show the open chapter (or `--file`) through the pager at this page.
    #[arg(long)]
    pub page: Option<u32>,

    /// Text document to page through instead of a chapter.
    #[arg(long)]
    pub file: Option<String>,

    #[arg(long, default_value_t = 72)]
    pub columns: usize,

    #[arg(long, default_value_t = 24)]
    pub lines: usize,
}

#[derive(Debug, Subcommand)]
pub enum ReviewsCommand {
    Add(ReviewsAddArgs),
    List(ReviewsTarget),
    Clear(ReviewsTarget),
}

#[derive(Debug, Args)]
pub struct ReviewsAddArgs {
    /// Work slug.
    #[arg(long)]
    pub obra: String,

    /// 1 to 5.
    #[arg(long)]
    pub rating: u8,

    #[arg(long, default_value = "")]
    pub comment: String,
}

#[derive(Debug, Args)]
pub struct ReviewsTarget {
    /// Work slug.
    #[arg(long)]
    pub obra: String,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct AuthorArgs {
    #[arg(long)]
    pub json: bool,

    /// Show the home page profile instead of the about page.
    #[arg(long)]
    pub profile: bool,
}

#[derive(Debug, Subcommand)]
pub enum SchemaCommand {
    /// Print the content model as JSON.
    Print,
    /// Validate a JSON array of documents.
    Check(SchemaCheckArgs),
}

#[derive(Debug, Args)]
pub struct SchemaCheckArgs {
    #[arg(long)]
    pub file: String,

    /// Document type of every entry.
    #[arg(long = "type", default_value = "livro")]
    pub doc_type: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_content_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "acervo",
            "catalog",
            "--fallback",
            "obras.json",
            "--retries",
            "0",
            "--category",
            "poesia",
        ])
        .unwrap();
        assert_eq!(cli.content.fallback.as_deref(), Some("obras.json"));

        let config = cli.content.resolve().unwrap();
        assert_eq!(config.fallback, "obras.json");
        assert_eq!(config.retries, 0);

        let Command::Catalog(args) = cli.command else {
            panic!("expected catalog");
        };
        assert_eq!(args.category.as_deref(), Some("poesia"));
    }

    #[test]
    fn schema_check_defaults_to_livro() {
        let cli =
            Cli::try_parse_from(["acervo", "schema", "check", "--file", "obras.json"]).unwrap();
        let Command::Schema {
            command: SchemaCommand::Check(args),
        } = cli.command
        else {
            panic!("expected schema check");
        };
        assert_eq!(args.doc_type, "livro");
    }
}
