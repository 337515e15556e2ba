//! Tantivy-based search index module.
//!
//! Indexes DAO and document projections with field boosting.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::{DaoProjection, DocumentProjection, RecordKind};

/// Field boost values.
const BOOST_TITLE: f32 = 10.0;
const BOOST_DESCRIPTION: f32 = 7.0;
const BOOST_DOCUMENT_TYPE: f32 = 5.0;
const BOOST_LOCATION: f32 = 4.0;

/// Deepest hit a query may page to. Tantivy allocates a buffer of
/// `limit + offset` entries up front.
pub const MAX_RESULT_WINDOW: usize = 10_000;

/// Search result with record id, kind and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub record_id: String,
    pub kind: RecordKind,
    pub score: f32,
}

/// Search index schema fields.
struct SearchFields {
    record_id: Field,
    kind: Field,
    title: Field,
    description: Field,
    location: Field,
    document_type: Field,
}

/// Tantivy search index over projections.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        // Define schema; record_id is a raw token so it can be deleted by term
        let mut schema_builder = Schema::builder();
        let record_id = schema_builder.add_text_field("record_id", STRING | STORED);
        let kind = schema_builder.add_text_field("kind", STRING | STORED);
        let title = schema_builder.add_text_field("title", TEXT | STORED);
        let description = schema_builder.add_text_field("description", TEXT);
        let location = schema_builder.add_text_field("location", TEXT);
        let document_type = schema_builder.add_text_field("document_type", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            record_id,
            kind,
            title,
            description,
            location,
            document_type,
        };

        // Try to open existing index or create new one
        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from the cached projections.
    pub async fn rebuild(
        &self,
        daos: &[DaoProjection],
        documents: &[DocumentProjection],
    ) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;

        for dao in daos {
            writer.add_document(self.dao_document(dao))?;
        }
        for document in documents {
            writer.add_document(self.document_document(document))?;
        }

        writer.commit()?;

        // Reload reader to see new documents
        self.reader.reload()?;

        tracing::info!(
            "Search index rebuilt with {} DAOs and {} documents",
            daos.len(),
            documents.len()
        );
        Ok(())
    }

    /// Index or re-index a single DAO.
    pub async fn index_dao(&self, dao: &DaoProjection) -> Result<(), AppError> {
        self.replace(&dao.id, self.dao_document(dao)).await
    }

    /// Index or re-index a single document.
    pub async fn index_document(&self, document: &DocumentProjection) -> Result<(), AppError> {
        self.replace(&document.id, self.document_document(document))
            .await
    }

    async fn replace(&self, record_id: &str, doc: TantivyDocument) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.record_id, record_id));
        writer.add_document(doc)?;
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Search for projections matching the query.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() || limit == 0 || offset >= MAX_RESULT_WINDOW {
            return Ok(Vec::new());
        }
        let window = limit.saturating_add(offset).min(MAX_RESULT_WINDOW);

        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![
                self.fields.title,
                self.fields.description,
                self.fields.location,
                self.fields.document_type,
            ],
        );

        // Parse the user query
        let base_query = query_parser
            .parse_query(query_str)
            .map_err(|e| AppError::Validation(format!("Invalid search query: {}", e)))?;

        // Create field-specific boosted queries
        let mut subqueries: Vec<(Occur, Box<dyn tantivy::query::Query>)> = Vec::new();

        let field_queries = [
            (self.fields.title, BOOST_TITLE),
            (self.fields.description, BOOST_DESCRIPTION),
            (self.fields.document_type, BOOST_DOCUMENT_TYPE),
            (self.fields.location, BOOST_LOCATION),
        ];

        for (field, boost) in field_queries {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                let boosted = BoostQuery::new(field_query, boost);
                subqueries.push((Occur::Should, Box::new(boosted)));
            }
        }

        // Combine with OR semantics
        let combined_query = if subqueries.is_empty() {
            base_query
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        // Execute search with pagination
        let top_docs = searcher
            .search(&combined_query, &TopDocs::with_limit(window))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results: Vec<SearchResult> = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let record_id = doc.get_first(self.fields.record_id)?.as_str()?.to_string();
                let kind = RecordKind::from_str(doc.get_first(self.fields.kind)?.as_str()?)?;
                Some(SearchResult {
                    record_id,
                    kind,
                    score,
                })
            })
            .collect();

        Ok(results)
    }

    fn dao_document(&self, dao: &DaoProjection) -> TantivyDocument {
        doc!(
            self.fields.record_id => dao.id.clone(),
            self.fields.kind => RecordKind::Dao.as_str().to_string(),
            self.fields.title => dao.name.clone(),
            self.fields.description => dao.description.clone().unwrap_or_default(),
            self.fields.location => dao.location.clone().unwrap_or_default(),
            self.fields.document_type => String::new()
        )
    }

    fn document_document(&self, document: &DocumentProjection) -> TantivyDocument {
        doc!(
            self.fields.record_id => document.id.clone(),
            self.fields.kind => RecordKind::Document.as_str().to_string(),
            self.fields.title => document.title.clone(),
            self.fields.description => String::new(),
            self.fields.location => String::new(),
            self.fields.document_type => document.document_type.clone()
        )
    }
}
