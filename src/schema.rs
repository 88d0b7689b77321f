//! Content model of the CMS: the four document types the site reads, and a
//! validator for documents kept in a static fallback file.

use std::fmt;
use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;
use serde_json::Value;

use crate::cli::{SchemaCheckArgs, SchemaCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Text,
    Slug,
    Url,
    Image,
    File,
    Date,
    Boolean,
    Reference,
    Array,
    Object,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Group {
    pub name: &'static str,
    pub title: &'static str,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOptions {
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub list: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hotspot: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: &'static str,
    pub title: &'static str,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<FieldOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<&'static str>,
    /// Referenced document type, for references and arrays of references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<&'static str>,
    /// Item kind of an array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub of: Option<FieldKind>,
    /// Members of an object, or of each object item of an array.
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub fields: &'static [Field],
}

impl Field {
    const fn new(name: &'static str, title: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            title,
            kind,
            group: None,
            required: false,
            options: None,
            initial_value: None,
            to: None,
            of: None,
            fields: &[],
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn group(mut self, group: &'static str) -> Self {
        self.group = Some(group);
        self
    }

    const fn options(mut self, options: FieldOptions) -> Self {
        self.options = Some(options);
        self
    }

    const fn initial(mut self, value: &'static str) -> Self {
        self.initial_value = Some(value);
        self
    }

    const fn of(mut self, kind: FieldKind, fields: &'static [Field]) -> Self {
        self.of = Some(kind);
        self.fields = fields;
        self
    }

    const fn to(mut self, doc_type: &'static str) -> Self {
        self.to = Some(doc_type);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DocumentType {
    pub name: &'static str,
    pub title: &'static str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub groups: &'static [Group],
    pub fields: &'static [Field],
}

pub const STATUS_OPTIONS: &[&str] = &["Rascunho", "Em Revisão", "Publicado"];

const HOTSPOT: FieldOptions = FieldOptions {
    list: &[],
    source: None,
    hotspot: true,
};

use FieldKind as K;

const CHAPTER_FIELDS: &[Field] = &[
    Field::new("nome", "Nome do Capítulo", K::String),
    Field::new("conteudo", "Conteúdo/Preview", K::Text),
    Field::new("disponivel", "Publicado?", K::Boolean),
];

pub const LIVRO: DocumentType = DocumentType {
    name: "livro",
    title: "Livros (Obras)",
    groups: &[],
    fields: &[
        Field::new("titulo", "Título", K::String).required(),
        Field::new("slug", "URL Amigável (Slug)", K::Slug).options(FieldOptions {
            list: &[],
            source: Some("titulo"),
            hotspot: false,
        }),
        Field::new("status", "Status de Publicação", K::String)
            .options(FieldOptions {
                list: STATUS_OPTIONS,
                source: None,
                hotspot: false,
            })
            .initial("Rascunho"),
        Field::new("visivel", "Visível no site", K::Boolean),
        Field::new("acessoLivre", "Acesso livre", K::Boolean),
        Field::new("capa", "Capa do Livro", K::Image).options(HOTSPOT),
        Field::new("sinopse", "Sinopse", K::Text),
        Field::new("linkAmazon", "Link Amazon", K::Url),
        Field::new("linkLeitura", "Link de Leitura", K::Url),
        Field::new("dataLancamento", "Data de Lançamento", K::Date),
        Field::new("categorias", "Categorias", K::Array)
            .of(K::Reference, &[])
            .to("categoria"),
        Field::new("arquivo", "Arquivo do Livro", K::File),
        Field::new("capitulos", "Capítulos", K::Array).of(K::Object, CHAPTER_FIELDS),
    ],
};

pub const CATEGORIA: DocumentType = DocumentType {
    name: "categoria",
    title: "Categorias / Gêneros",
    groups: &[],
    fields: &[
        Field::new("titulo", "Nome da Categoria", K::String).required(),
        Field::new("descricao", "Descrição", K::Text),
    ],
};

pub const AUTHOR: DocumentType = DocumentType {
    name: "author",
    title: "Pagina Inicial",
    groups: &[],
    fields: &[
        Field::new("name", "Nome do Autor", K::String),
        Field::new("subtitle", "Subtítulo", K::String),
        Field::new("backgroundImage", "Imagem de Fundo", K::Image).options(HOTSPOT),
        Field::new("authorImage", "Foto do Autor", K::Image).options(HOTSPOT),
        Field::new("description", "Descrição do Autor", K::Text),
    ],
};

const TIMELINE_FIELDS: &[Field] = &[
    Field::new("year", "Ano", K::String),
    Field::new("event", "Informação da Trajetória", K::Text),
];

const TOPIC_FIELDS: &[Field] = &[
    Field::new("topicTitle", "Título do Tópico", K::String),
    Field::new("topicContent", "Descrição do Tópico", K::Text),
];

const ACTIVISM_FIELDS: &[Field] = &[
    Field::new("year", "Ano ou Período", K::String),
    Field::new("description", "Descrição da Atuação", K::Text),
];

const COLLABORATOR_FIELDS: &[Field] = &[
    Field::new("collabName", "Nome do Colaborador", K::String),
    Field::new("collabRole", "O que colaborou (Cargo)", K::String),
    Field::new("collabBio", "Descrição do Trabalho", K::Text),
];

pub const AUTHOR_PAGE: DocumentType = DocumentType {
    name: "authorPage",
    title: "Página Sobre o Autor",
    groups: &[
        Group {
            name: "perfil",
            title: "Perfil Principal",
        },
        Group {
            name: "trajetoria",
            title: "Linha do Tempo",
        },
        Group {
            name: "abordagem",
            title: "Abordagem Literária",
        },
        Group {
            name: "atuacao",
            title: "Participação/Atuação",
        },
        Group {
            name: "colaboradores",
            title: "Colaboradores",
        },
        Group {
            name: "declaracao",
            title: "Frases Motivacionais",
        },
    ],
    fields: &[
        Field::new("name", "Nome do Autor", K::String).group("perfil"),
        Field::new("subtitle", "Subtítulo", K::String).group("perfil"),
        Field::new("authorImage", "Foto do Autor", K::Image)
            .group("perfil")
            .options(HOTSPOT),
        Field::new("mainDescription", "Descrição Principal", K::Text).group("perfil"),
        Field::new("timeline", "Trajetória (Ano a Ano)", K::Array)
            .group("trajetoria")
            .of(K::Object, TIMELINE_FIELDS),
        Field::new("interests", "Campos de Interesse", K::Array)
            .group("abordagem")
            .of(K::Object, TOPIC_FIELDS),
        Field::new("literaryApproach", "Abordagem Literária", K::Array)
            .group("abordagem")
            .of(K::Text, &[]),
        Field::new("activism", "Participação e Atuação Social", K::Array)
            .group("atuacao")
            .of(K::Object, ACTIVISM_FIELDS),
        Field::new("collaborators", "Lista de Colaboradores", K::Array)
            .group("colaboradores")
            .of(K::Object, COLLABORATOR_FIELDS),
        Field::new("motivationalQuotes", "Frases Motivacionais", K::Text).group("declaracao"),
    ],
};

pub const DOCUMENT_TYPES: &[DocumentType] = &[LIVRO, CATEGORIA, AUTHOR, AUTHOR_PAGE];

pub fn document_type(name: &str) -> Option<&'static DocumentType> {
    DOCUMENT_TYPES.iter().find(|t| t.name == name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Checks required fields and option lists of `value` against `doc_type`.
pub fn validate(doc_type: &DocumentType, value: &Value) -> Vec<Violation> {
    let Some(object) = value.as_object() else {
        return vec![Violation {
            field: "(document)".to_owned(),
            message: format!("expected an object, got {}", crate::normalize::value_kind(value)),
        }];
    };

    let mut violations = Vec::new();
    for field in doc_type.fields {
        let present = object.get(field.name).filter(|v| !is_blank(v));
        match present {
            None if field.required => violations.push(Violation {
                field: field.name.to_owned(),
                message: "required".to_owned(),
            }),
            Some(Value::String(s)) => {
                if let Some(options) = field.options
                    && !options.list.is_empty()
                    && !options.list.contains(&s.as_str())
                {
                    violations.push(Violation {
                        field: field.name.to_owned(),
                        message: format!("{s:?} is not one of {}", options.list.join(", ")),
                    });
                }
            }
            _ => {}
        }
    }
    violations
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

pub async fn run(command: SchemaCommand) -> anyhow::Result<()> {
    match command {
        SchemaCommand::Print => {
            println!("{}", serde_json::to_string_pretty(DOCUMENT_TYPES)?);
        }
        SchemaCommand::Check(SchemaCheckArgs { file, doc_type }) => {
            let doc_type = document_type(&doc_type)
                .ok_or_else(|| anyhow::anyhow!("unknown document type: {doc_type}"))?;
            let count = check_file(Path::new(&file), doc_type).await?;
            if count > 0 {
                anyhow::bail!("{count} violation(s) in {file}");
            }
            println!("ok");
        }
    }
    Ok(())
}

async fn check_file(path: &Path, doc_type: &DocumentType) -> anyhow::Result<usize> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("read: {}", path.display()))?;
    let data: Value = serde_json::from_slice(&raw)
        .with_context(|| format!("parse JSON: {}", path.display()))?;
    let Value::Array(documents) = data else {
        anyhow::bail!("{}: expected a JSON array of documents", path.display());
    };

    let mut count = 0;
    for (index, document) in documents.iter().enumerate() {
        for violation in validate(doc_type, document) {
            println!("#{index} {violation}");
            count += 1;
        }
    }
    tracing::debug!(documents = documents.len(), violations = count, "checked file");
    Ok(count)
}
