mod display;

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use reklamo_ai::{
    AnchorCache, AnchorSet, EmbeddingService, FallbackClassifier, HttpEmbeddingService,
};
use reklamo_core::{
    CategoryHierarchy, CategoryNormalizer, EngineConfig, HierarchyOverride, LabelMap,
    TaxonomyNormalizer,
};
use reklamo_engine::Engine;
use reklamo_nlp::{JsonFileSource, phrase_tokens};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reklamo", version)]
#[command(about = "Classify citizen complaints written in English, Tagalog, or Bisaya")]
struct Cli {
    #[command(flatten)]
    opts: EngineOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct EngineOpts {
    /// Engine configuration (JSON)
    #[arg(long, global = true, env = "REKLAMO_CONFIG")]
    config: Option<PathBuf>,

    /// Keyword dictionary (JSON)
    #[arg(long, global = true, env = "REKLAMO_DICTIONARY")]
    dictionary: Option<PathBuf>,

    /// Category taxonomy (JSON) used to normalise labels
    #[arg(long, global = true, env = "REKLAMO_TAXONOMY")]
    taxonomy: Option<PathBuf>,

    /// Category hierarchy override (JSON)
    #[arg(long, global = true, env = "REKLAMO_HIERARCHY")]
    hierarchy: Option<PathBuf>,

    /// Embedding service base URL (e.g. http://localhost:11434)
    #[arg(long, global = true, env = "REKLAMO_EMBED_URL")]
    embed_url: Option<String>,

    /// Embedding model name sent to the service
    #[arg(
        long,
        global = true,
        env = "REKLAMO_EMBED_MODEL",
        default_value = "nomic-embed-text"
    )]
    embed_model: String,

    /// Local sentence-transformers model directory (model.onnx + tokenizer.json)
    #[cfg(feature = "onnx")]
    #[arg(long, global = true, env = "REKLAMO_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Anchor phrases (JSON: {"Category": ["phrase", ...]})
    #[arg(long, global = true, env = "REKLAMO_ANCHORS")]
    anchors: Option<PathBuf>,

    /// Durable anchor-centroid cache file
    #[arg(long, global = true, env = "REKLAMO_ANCHOR_CACHE")]
    anchor_cache: Option<PathBuf>,

    /// Output JSON instead of cards
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Classify one complaint
    Classify {
        /// Complaint text
        #[arg(required = true)]
        text: Vec<String>,

        /// Skip the embedding fallback
        #[arg(long)]
        rules_only: bool,
    },

    /// Classify a file with one complaint per line (JSON lines out)
    Batch {
        /// Input file
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Skip the embedding fallback
        #[arg(long)]
        rules_only: bool,
    },

    /// Inspect the keyword index
    Lexicon {
        /// Look up a term
        #[arg(long)]
        term: Option<String>,

        /// List the terms of a parent category
        #[arg(long)]
        category: Option<String>,
    },

    /// Compute anchor centroids and write the anchor cache
    Anchors,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = &cli.opts;

    match cli.command {
        Command::Classify { text, rules_only } => {
            let text = text.join(" ");
            let engine = build_engine(opts, !rules_only).await?;
            let result = if rules_only {
                engine.classify_rules(Some(&text))
            } else {
                engine.classify(Some(&text)).await
            };
            let review = engine.review_candidate(&text, &result);

            if opts.json {
                let out = serde_json::json!({ "result": result, "review": review });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                display::print_result_card(&text, &result, review.as_ref());
            }
        }

        Command::Batch {
            file,
            output,
            rules_only,
        } => {
            let input = std::fs::File::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            let texts: Vec<String> = BufReader::new(input)
                .lines()
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("reading {}", file.display()))?
                .into_iter()
                .filter(|l| !l.trim().is_empty())
                .collect();
            eprintln!("  Read {} complaints from {}", texts.len(), file.display());

            let engine = build_engine(opts, !rules_only).await?;
            let start = Instant::now();
            let results = if rules_only {
                engine.classify_many_rules(&texts)
            } else {
                engine.classify_many(&texts).await
            };
            let elapsed = start.elapsed().as_secs_f64();

            let sink: Box<dyn Write> = match &output {
                Some(path) => Box::new(
                    std::fs::File::create(path)
                        .with_context(|| format!("creating {}", path.display()))?,
                ),
                None => Box::new(std::io::stdout().lock()),
            };
            let mut sink = BufWriter::new(sink);
            let mut overrides = 0usize;
            let mut queued = 0usize;
            for (text, result) in texts.iter().zip(&results) {
                let review = engine.review_candidate(text, result);
                overrides += usize::from(result.ai_used);
                queued += usize::from(review.is_some());
                let line = serde_json::json!({ "text": text, "result": result, "review": review });
                serde_json::to_writer(&mut sink, &line)?;
                sink.write_all(b"\n")?;
            }
            sink.flush()?;

            let rate = if elapsed > 0.0 {
                results.len() as f64 / elapsed
            } else {
                0.0
            };
            eprintln!(
                "  Classified {} complaints in {elapsed:.2}s ({rate:.0}/s), {overrides} embedding overrides, {queued} for review",
                results.len()
            );
        }

        Command::Lexicon { term, category } => {
            let engine = build_engine(opts, false).await?;
            let index = engine.lexicon().snapshot();

            if let Some(term) = term {
                let key = phrase_tokens(&term).join(" ");
                let entry = index.get(&key);
                if opts.json {
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                } else {
                    match entry {
                        Some(e) => display::print_entry(e),
                        None => println!("{key:?} is not in the keyword index"),
                    }
                }
            } else if let Some(category) = category {
                let entries = index.entries_for(&category);
                if opts.json {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else {
                    display::print_entries(&category, &entries);
                }
            } else if opts.json {
                println!("{}", serde_json::to_string_pretty(&index.stats())?);
            } else {
                display::print_lexicon_stats(&index.stats());
            }
        }

        Command::Anchors => {
            let Some(cache_path) = opts.anchor_cache.clone() else {
                bail!("--anchor-cache (or REKLAMO_ANCHOR_CACHE) is required");
            };
            let Some(fallback) = build_fallback(opts).await? else {
                bail!("no embedding service available; set --embed-url or --model-dir");
            };
            let centroids = fallback
                .initialize()
                .await
                .context("computing anchor centroids")?;

            if opts.json {
                let out = serde_json::json!({
                    "model_id": fallback.model_id(),
                    "cache": cache_path,
                    "categories": centroids.centroids().keys().collect::<Vec<_>>(),
                    "dim": centroids.dim(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("Anchor centroids");
                println!("  {:<22} {}", "model", fallback.model_id());
                println!("  {:<22} {}", "categories", centroids.len());
                println!("  {:<22} {}", "dimension", centroids.dim());
                println!("  {:<22} {}", "cache", cache_path.display());
            }
        }
    }

    Ok(())
}

fn load_config(opts: &EngineOpts) -> anyhow::Result<EngineConfig> {
    let config = match &opts.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

fn load_labels(opts: &EngineOpts) -> anyhow::Result<LabelMap> {
    let mut hierarchy = CategoryHierarchy::builtin();
    if let Some(path) = &opts.hierarchy {
        let overrides = HierarchyOverride::from_json_file(path)
            .with_context(|| format!("loading hierarchy {}", path.display()))?;
        hierarchy = hierarchy.with_override(overrides);
    }

    let normalizer: Option<Arc<dyn CategoryNormalizer>> = match &opts.taxonomy {
        Some(path) => Some(Arc::new(
            TaxonomyNormalizer::from_json_file(path)
                .with_context(|| format!("loading taxonomy {}", path.display()))?,
        )),
        None => None,
    };

    Ok(LabelMap::new(Arc::new(hierarchy), normalizer))
}

async fn build_engine(opts: &EngineOpts, with_fallback: bool) -> anyhow::Result<Engine> {
    let config = load_config(opts)?;
    let mut builder = Engine::builder()
        .config(config)
        .labels(load_labels(opts)?);

    if let Some(path) = &opts.dictionary {
        builder = builder.dictionary(Arc::new(JsonFileSource::new(path)));
    }
    if with_fallback && let Some(fallback) = build_fallback(opts).await? {
        builder = builder.fallback(fallback);
    }

    let engine = builder.build();
    if engine.fallback().is_some() {
        engine.warm_up().await;
    }
    Ok(engine)
}

/// Fallback classifier over whichever embedding service is configured.
/// `None` when no service is configured or the service did not respond.
async fn build_fallback(opts: &EngineOpts) -> anyhow::Result<Option<Arc<FallbackClassifier>>> {
    let Some(service) = embedding_service(opts).await else {
        return Ok(None);
    };

    let anchors = match &opts.anchors {
        Some(path) => AnchorSet::from_json_file(path)
            .with_context(|| format!("loading anchors {}", path.display()))?,
        None => AnchorSet::default(),
    };

    let mut fallback = FallbackClassifier::new(service, anchors);
    if let Some(path) = &opts.anchor_cache {
        fallback = fallback.with_cache(AnchorCache::new(path));
    }
    Ok(Some(Arc::new(fallback)))
}

async fn embedding_service(opts: &EngineOpts) -> Option<Arc<dyn EmbeddingService>> {
    #[cfg(feature = "onnx")]
    if let Some(dir) = &opts.model_dir {
        return match reklamo_ai::OnnxEmbeddingService::load(dir) {
            Ok(service) => Some(Arc::new(service)),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to load embedding model, rule-only mode");
                None
            }
        };
    }

    let url = opts.embed_url.as_deref()?;
    let service = HttpEmbeddingService::new(url, opts.embed_model.as_str());
    match service.warm_up().await {
        Ok(dim) => {
            info!(dim, "using remote embeddings");
            Some(Arc::new(service))
        }
        Err(_) => {
            warn!("continuing in rule-only mode");
            None
        }
    }
}
