//! Semantic search over a folder of plain-text documents.
//!
//! tantivy owns the on-disk index layout under the caller-designated index
//! directory; this module only feeds it a corpus and asks it questions. The
//! corpus is the set of `.txt` files directly inside the docs folder, coerced
//! to ASCII before indexing: bytes outside ASCII are dropped, never rejected,
//! so mixed-encoding corpora index without error.

use std::io::ErrorKind;
use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{STORED, STRING, Schema, TEXT, Value};
use tantivy::snippet::SnippetGenerator;
use tantivy::{Index, IndexReader, IndexWriter, TantivyDocument, doc};
use thiserror::Error;
use walkdir::WalkDir;

const WRITER_MEMORY_BUDGET: usize = 50_000_000;
const SNIPPET_MAX_CHARS: usize = 200;

/// Errors surfaced while building or querying a search index.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Existing index directory could not be removed for a rebuild.
    #[error("Failed to clear index directory {path}: {source}")]
    Cleanup {
        /// Directory that resisted removal.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Index directory could not be created.
    #[error("Failed to prepare index directory {path}: {source}")]
    Prepare {
        /// Directory that could not be created.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Corpus folder or one of its files could not be read.
    #[error("Failed to read corpus at {path}: {source}")]
    Corpus {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The indexing collaborator reported a failure.
    #[error("Index operation failed: {0}")]
    Index(#[from] tantivy::TantivyError),
}

/// One ranked answer span returned by [`SearchIndex::ask`].
#[derive(Debug, Clone)]
pub struct Answer {
    /// Name of the source document within the corpus folder.
    pub document: String,
    /// BM25 relevance score assigned by the index.
    pub score: f32,
    /// Text span around the matching terms.
    pub snippet: String,
}

/// Handle to a built (or opened) on-disk search index.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    schema: IndexSchema,
}

struct IndexSchema {
    document: tantivy::schema::Field,
    body: tantivy::schema::Field,
}

fn build_schema() -> (Schema, IndexSchema) {
    let mut builder = Schema::builder();
    let document = builder.add_text_field("document", STRING | STORED);
    let body = builder.add_text_field("body", TEXT | STORED);
    (builder.build(), IndexSchema { document, body })
}

/// Remove `path` and everything under it, treating "already absent" as success.
///
/// Any other failure (permissions, I/O) surfaces as [`SearchError::Cleanup`].
pub fn ensure_absent(path: &Path) -> Result<(), SearchError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SearchError::Cleanup {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Coerce raw file bytes to an ASCII string, dropping everything else.
fn ascii_lossy(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|byte| byte.is_ascii())
        .map(|&byte| byte as char)
        .collect()
}

/// Load the `.txt` files directly inside `docs_dir` as `(name, ascii_text)` pairs.
fn load_corpus(docs_dir: &Path) -> Result<Vec<(String, String)>, SearchError> {
    let mut docs = Vec::new();
    for entry in WalkDir::new(docs_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| SearchError::Corpus {
            path: docs_dir.display().to_string(),
            source: err.into(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "txt") {
            continue;
        }
        let bytes = std::fs::read(path).map_err(|source| SearchError::Corpus {
            path: path.display().to_string(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        docs.push((name, ascii_lossy(&bytes)));
    }
    Ok(docs)
}

/// Build a search index over the `.txt` files in `docs_dir`, persisting it in
/// `index_dir`.
///
/// With `rebuild` set, any existing index at `index_dir` is removed first;
/// a not-yet-existing directory is not an error.
pub fn build_index(
    docs_dir: &Path,
    index_dir: &Path,
    rebuild: bool,
) -> Result<SearchIndex, SearchError> {
    if rebuild {
        ensure_absent(index_dir)?;
    }
    std::fs::create_dir_all(index_dir).map_err(|source| SearchError::Prepare {
        path: index_dir.display().to_string(),
        source,
    })?;

    let (schema, fields) = build_schema();
    let index = Index::create_in_dir(index_dir, schema)?;

    let docs = load_corpus(docs_dir)?;
    tracing::info!(
        docs = docs.len(),
        index_dir = %index_dir.display(),
        "Indexing corpus"
    );

    let mut writer: IndexWriter = index.writer(WRITER_MEMORY_BUDGET)?;
    for (name, body) in &docs {
        writer.add_document(doc!(
            fields.document => name.as_str(),
            fields.body => body.as_str(),
        ))?;
    }
    writer.commit()?;

    let reader = index.reader()?;
    Ok(SearchIndex {
        index,
        reader,
        schema: fields,
    })
}

/// Open a previously built index at `index_dir`.
pub fn open_index(index_dir: &Path) -> Result<SearchIndex, SearchError> {
    let index = Index::open_in_dir(index_dir)?;
    let schema = index.schema();
    let fields = IndexSchema {
        document: schema.get_field("document")?,
        body: schema.get_field("body")?,
    };
    let reader = index.reader()?;
    Ok(SearchIndex {
        index,
        reader,
        schema: fields,
    })
}

impl SearchIndex {
    /// Answer `query` with up to `top_k` ranked snippets.
    ///
    /// A `top_k` of zero asks for nothing and gets exactly that. Parsing is
    /// lenient: a query the parser cannot fully understand degrades to
    /// whatever terms survive rather than erroring.
    pub fn ask(&self, query: &str, top_k: usize) -> Result<Vec<Answer>, SearchError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let parser = QueryParser::for_index(&self.index, vec![self.schema.body]);
        let (parsed, errors) = parser.parse_query_lenient(query);
        if !errors.is_empty() {
            tracing::debug!(query, ?errors, "Query parsed leniently");
        }

        let searcher = self.reader.searcher();
        let hits = searcher.search(&parsed, &TopDocs::with_limit(top_k))?;

        let mut generator = SnippetGenerator::create(&searcher, &*parsed, self.schema.body)?;
        generator.set_max_num_chars(SNIPPET_MAX_CHARS);

        let mut answers = Vec::with_capacity(hits.len());
        for (score, address) in hits {
            let doc: TantivyDocument = searcher.doc(address)?;
            let document = doc
                .get_first(self.schema.document)
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string();
            let snippet = generator.snippet_from_doc(&doc).fragment().to_string();
            let snippet = if snippet.is_empty() {
                // Match on a stored field without positions; fall back to a prefix.
                doc.get_first(self.schema.body)
                    .and_then(|value| value.as_str())
                    .unwrap_or_default()
                    .chars()
                    .take(SNIPPET_MAX_CHARS)
                    .collect()
            } else {
                snippet
            };
            answers.push(Answer {
                document,
                score,
                snippet,
            });
        }
        tracing::debug!(query, answers = answers.len(), "Answered query");
        Ok(answers)
    }
}

/// Render answers as a plain-text table for terminal display.
pub fn render_answers(answers: &[Answer]) -> String {
    if answers.is_empty() {
        return "(no answers)".to_string();
    }
    let doc_width = answers
        .iter()
        .map(|answer| answer.document.len())
        .max()
        .unwrap_or(0)
        .max("document".len());

    let mut out = String::new();
    out.push_str(&format!(
        "{:>8}  {:<doc_width$}  answer\n",
        "score", "document"
    ));
    for answer in answers {
        let flat = answer.snippet.replace(['\n', '\r'], " ");
        out.push_str(&format!(
            "{:>8.3}  {:<doc_width$}  {}\n",
            answer.score, answer.document, flat
        ));
    }
    out
}
