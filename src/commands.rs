use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use bidwise_core::bootstrap::AppBuilder;
use bidwise_core::config::VectorBackend;
use bidwise_memory::document::jsonl;
use bidwise_memory::document::loader::PreprocessedLoader;
use bidwise_memory::{Chunk, IndexReport};
use bidwise_core::ExtractionSchema;
use bidwise_retrieval::metrics::{
    AnswerScores, AnswerSummary, CaseScores, EvalSummary, load_eval_set,
};
use bidwise_retrieval::{
    RetrievalRequest, RetrievalResult, SearchFilters, fuzzy_match_organization,
    match_business_name,
};
use serde::Serialize;

use crate::FilterArgs;

const ORG_MATCH_THRESHOLD: f32 = 0.8;
const PREVIEW_CHARS: usize = 200;

pub struct SearchOptions {
    pub top_k: Option<usize>,
    pub hybrid: bool,
    pub rerank: bool,
    pub json: bool,
}

pub async fn chunk(
    app: &AppBuilder,
    input: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let paths = &app.config().paths;
    let input = input.unwrap_or(&paths.preprocessed);
    let output = output.unwrap_or(&paths.chunks);
    let chunker = app.build_chunker()?;

    let documents = PreprocessedLoader::default()
        .load_dir(input)
        .await
        .with_context(|| format!("failed to load documents from {}", input.display()))?;

    let chunks: Vec<Chunk> = documents
        .iter()
        .flat_map(|doc| chunker.chunk_document(doc))
        .collect();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    jsonl::write_jsonl(output, &chunks)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    tracing::info!(
        documents = documents.len(),
        chunks = chunks.len(),
        output = %output.display(),
        "chunking complete"
    );
    println!("{} documents -> {} chunks ({})", documents.len(), chunks.len(), output.display());
    Ok(())
}

pub async fn index(app: &AppBuilder, chunks: Option<&Path>) -> anyhow::Result<()> {
    let path = chunks.unwrap_or(&app.config().paths.chunks);
    if app.config().vector.backend == VectorBackend::Memory {
        tracing::warn!("vector backend is in-memory, the index is discarded on exit");
    }
    let indexer = app.build_indexer(app.build_embedder()?, app.build_store()?);
    let report: IndexReport = indexer
        .index_file(path)
        .await
        .with_context(|| format!("failed to index {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn search(
    app: &AppBuilder,
    query: &str,
    args: &FilterArgs,
    opts: &SearchOptions,
) -> anyhow::Result<()> {
    let agent = app.build_search_agent().await?;
    let catalog = if args.org.is_some() || args.business.is_some() {
        Catalog::load(&app.config().paths.chunks).await
    } else {
        Catalog::default()
    };

    let mut request = RetrievalRequest::new(query).rerank(opts.rerank);
    if opts.hybrid {
        request = request.hybrid(true);
    }
    if let Some(k) = opts.top_k {
        request = request.top_k(k);
    }
    if let Some(filters) = catalog.resolve(args) {
        request = request.filters(filters);
    }

    let response = agent.retrieve(request).await?;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    println!(
        "{} results of {} candidates in {:?}",
        response.results.len(),
        response.total_found,
        response.search_time
    );
    for (i, result) in response.results.iter().enumerate() {
        print_result(i + 1, result);
    }
    Ok(())
}

pub async fn ask(
    app: &AppBuilder,
    question: &str,
    docs: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let generation = app.build_loop().await?;
    let outcome = generation.run(question, Some(docs)).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    println!("{}\n", outcome.answer);
    println!(
        "confidence: {} | passes: {} | retries: {}",
        outcome.confidence, outcome.passes, outcome.retry_count
    );
    for (i, source) in outcome.sources.iter().enumerate() {
        print_result(i + 1, source);
    }
    for note in &outcome.diagnostics {
        eprintln!("note: {note}");
    }
    Ok(())
}

#[derive(Serialize)]
struct CaseReport<'a> {
    query: &'a str,
    scores: CaseScores,
    retrieved: Vec<String>,
}

#[derive(Serialize)]
struct EvalReport<'a> {
    summary: EvalSummary,
    cases: Vec<CaseReport<'a>>,
}

pub async fn eval(app: &AppBuilder, file: &Path, k: usize, hybrid: bool) -> anyhow::Result<()> {
    let cases = load_eval_set(file)
        .await
        .with_context(|| format!("failed to load eval set {}", file.display()))?;
    let agent = app.build_search_agent().await?;

    let mut scores = Vec::with_capacity(cases.len());
    let mut latencies = Vec::with_capacity(cases.len());
    let mut reports = Vec::with_capacity(cases.len());
    for case in &cases {
        let mut request = RetrievalRequest::new(case.query.as_str()).top_k(k);
        if hybrid {
            request = request.hybrid(true);
        }
        let started = Instant::now();
        let response = agent.retrieve(request).await?;
        latencies.push(started.elapsed());

        let retrieved = ranked_doc_ids(&response.results);
        let case_scores = CaseScores::compute(&case.relevant_doc_ids, &retrieved, k);
        tracing::debug!(query = %case.query, recall = case_scores.recall, "case scored");
        scores.push(case_scores);
        reports.push(CaseReport {
            query: &case.query,
            scores: case_scores,
            retrieved,
        });
    }

    let report = EvalReport {
        summary: EvalSummary::from_cases(k, &scores, &latencies),
        cases: reports,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[derive(Serialize)]
struct AnswerCaseReport<'a> {
    query: &'a str,
    scores: AnswerScores,
    answer: String,
    cited: Vec<String>,
}

#[derive(Serialize)]
struct AnswerReport<'a> {
    summary: AnswerSummary,
    cases: Vec<AnswerCaseReport<'a>>,
}

/// Run the generation loop per case and score citations and answers.
pub async fn eval_answers(app: &AppBuilder, file: &Path) -> anyhow::Result<()> {
    let cases = load_eval_set(file)
        .await
        .with_context(|| format!("failed to load eval set {}", file.display()))?;
    let generation = app.build_loop().await?;

    let mut scores = Vec::with_capacity(cases.len());
    let mut reports = Vec::with_capacity(cases.len());
    for case in &cases {
        let outcome = generation.run(&case.query, None).await;
        let cited = ranked_doc_ids(&outcome.sources);
        let case_scores = AnswerScores::compute(case, &outcome.answer, &cited);
        tracing::debug!(
            query = %case.query,
            citation_recall = case_scores.citation_recall,
            "answer scored"
        );
        scores.push(case_scores);
        reports.push(AnswerCaseReport {
            query: &case.query,
            scores: case_scores,
            answer: outcome.answer,
            cited,
        });
    }

    let report = AnswerReport {
        summary: AnswerSummary::from_cases(&scores),
        cases: reports,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn summarize(
    app: &AppBuilder,
    doc_id: &str,
    section: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let generation = app.build_loop().await?;
    if let Some(section) = section {
        let summary = generation.summarize_section(doc_id, section).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("[{} / {}]\n{}", summary.doc_id, summary.section_name, summary.summary);
        }
        return Ok(());
    }

    let summary = generation.summarize_document(doc_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("[{}]\n{}", summary.doc_id, summary.summary);
    if let Some(budget) = summary.budget {
        println!("\nbudget: {budget:.0}");
    }
    if let Some(deadline) = summary.deadline {
        println!("deadline: {deadline}");
    }
    Ok(())
}

pub async fn extract(app: &AppBuilder, doc_id: &str, schema: Option<&Path>) -> anyhow::Result<()> {
    let schema = match schema {
        Some(path) => Some(load_schema(path).await?),
        None => None,
    };
    let generation = app.build_loop().await?;
    let extracted = generation.extract_info(doc_id, schema.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&extracted)?);
    Ok(())
}

async fn load_schema(path: &Path) -> anyhow::Result<ExtractionSchema> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("schema {} is not a JSON object", path.display()))
}

/// Doc ids in rank order, one entry per document.
fn ranked_doc_ids(results: &[RetrievalResult]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    results
        .iter()
        .filter(|r| seen.insert(r.doc_id.as_str()))
        .map(|r| r.doc_id.clone())
        .collect()
}

fn print_result(rank: usize, result: &RetrievalResult) {
    let title = result.metadata.title().unwrap_or(&result.doc_id);
    let section = result.metadata.section_name.as_deref().unwrap_or("-");
    let preview: String = result.text.chars().take(PREVIEW_CHARS).collect();
    println!("\n[{rank}] {title} / {section} (score {:.3}, {})", result.score, result.chunk_id);
    println!("{}", preview.replace('\n', " "));
}

/// Organizations and business names present in the chunk artifact.
#[derive(Debug, Default)]
struct Catalog {
    organizations: Vec<String>,
    /// business name -> doc ids
    businesses: BTreeMap<String, BTreeSet<String>>,
}

impl Catalog {
    async fn load(path: &Path) -> Self {
        match jsonl::read_jsonl(path).await {
            Ok(chunks) => Self::from_chunks(&chunks),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "no chunk artifact for filter lookup");
                Self::default()
            }
        }
    }

    fn from_chunks(chunks: &[Chunk]) -> Self {
        let mut organizations = BTreeSet::new();
        let mut businesses: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for chunk in chunks {
            if let Some(org) = &chunk.metadata.organization {
                organizations.insert(org.clone());
            }
            if let Some(name) = &chunk.metadata.business_name {
                businesses
                    .entry(name.clone())
                    .or_default()
                    .insert(chunk.doc_id.clone());
            }
        }
        Self {
            organizations: organizations.into_iter().collect(),
            businesses,
        }
    }

    /// Turn CLI flags into store filters, correcting the organization
    /// spelling and expanding business keywords into document ids.
    fn resolve(&self, args: &FilterArgs) -> Option<SearchFilters> {
        let mut filters = SearchFilters {
            amount_min: args.amount_min,
            amount_max: args.amount_max,
            deadline_from: args.deadline_from,
            deadline_to: args.deadline_to,
            ..SearchFilters::default()
        };

        if let Some(org) = &args.org {
            let resolved = fuzzy_match_organization(org, &self.organizations, ORG_MATCH_THRESHOLD)
                .into_iter()
                .next()
                .unwrap_or_else(|| org.clone());
            if &resolved != org {
                tracing::info!(query = %org, resolved = %resolved, "organization corrected");
            }
            filters.organization = Some(resolved);
        }

        let mut doc_ids: Option<BTreeSet<String>> =
            (!args.docs.is_empty()).then(|| args.docs.iter().cloned().collect());
        if let Some(keywords) = &args.business {
            let matched: BTreeSet<String> = self
                .businesses
                .iter()
                .filter(|(name, _)| match_business_name(keywords, name))
                .flat_map(|(_, ids)| ids.iter().cloned())
                .collect();
            if matched.is_empty() {
                tracing::warn!(keywords = %keywords, "no business name matched, filtering on exact name");
                filters.business_name = Some(keywords.clone());
            } else {
                doc_ids = Some(match doc_ids {
                    Some(ids) => ids.intersection(&matched).cloned().collect(),
                    None => matched,
                });
            }
        }
        filters.doc_ids = doc_ids.map(|ids| ids.into_iter().collect());

        (filters != SearchFilters::default()).then_some(filters)
    }
}
