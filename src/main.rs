use anyhow::Context;
use docsift::catalog::Catalog;
use docsift::cli::{ApiKeyAction, CatalogAction, Cli, Commands, ConfigAction};
use docsift::config::Config;
use docsift::error::{DocsiftError, Result};
use docsift::pipeline::{FieldDescriptionOverrides, Pipeline, RowRecord};
use docsift::storage::{Database, StorageManager};
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    let command = cli.command.name();
    run(cli).with_context(|| format!("docsift {} failed", command))
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "docsift=debug" } else { "docsift=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Config { action } = cli.command {
        return cmd_config(cli.config, cli.profile, action);
    }

    let config = load_config(cli.config, cli.profile)?;
    let pipeline = open_pipeline(&config)?;

    match cli.command {
        Commands::Add { files, rows } => cmd_add(&pipeline, &files, rows),
        Commands::List { json } => cmd_list(&pipeline, json),
        Commands::Show { id } => cmd_show(&pipeline, &id),
        Commands::Cluster { ids, instructions } => cmd_cluster(&pipeline, &ids, instructions.as_deref()),
        Commands::Assign { id, category } => {
            let document = pipeline.assign_category(&id, &category)?;
            println!("✓ {} → {}", document.title, category.trim());
            Ok(())
        }
        Commands::Categories => cmd_categories(&pipeline),
        Commands::Organize { categories, ids } => cmd_organize(&pipeline, categories, &ids),
        Commands::Fields {
            category,
            count,
            instructions,
            apply,
        } => cmd_fields(&pipeline, &category, count, instructions.as_deref(), apply),
        Commands::FieldsAll {
            count,
            instructions,
            apply,
        } => cmd_fields_all(&pipeline, count, instructions.as_deref(), apply),
        Commands::Catalog { action } => cmd_catalog(&pipeline, action),
        Commands::Describe => {
            let descriptions = pipeline.describe_missing_fields()?;
            for d in &descriptions {
                println!("  {}.{}: {}", d.category, d.field_name, d.description);
            }
            println!("✓ Described {} fields", descriptions.len());
            Ok(())
        }
        Commands::Extract {
            ids,
            instructions,
            descriptions,
        } => cmd_extract(&pipeline, &ids, instructions.as_deref(), descriptions.as_deref()),
        Commands::Justify { id, field } => {
            let justification = pipeline.justify_field(&id, &field)?;
            println!("{}", justification.passage);
            Ok(())
        }
        Commands::ApiKey { action } => cmd_api_key(&pipeline, action),
        Commands::Reset { yes } => {
            if !yes {
                println!("This deletes every document and the catalog. Re-run with --yes to confirm.");
                return Ok(());
            }
            pipeline.reset()?;
            println!("✓ All documents and the catalog were removed");
            Ok(())
        }
        // handled before the store is opened
        Commands::Config { .. } => Ok(()),
    }
}

fn open_pipeline(config: &Config) -> Result<Pipeline<Database>> {
    let storage = StorageManager::new(config.resolved_data_dir()?)?;
    tracing::debug!("Using database at {}", storage.database_path().display());
    Pipeline::from_config(storage.database, config, None)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| DocsiftError::Io {
        source: e,
        context: format!("Failed to read {}", path.display()),
    })
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| DocsiftError::Json {
        source: e,
        context: format!("Failed to serialize {}", what),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn selection(ids: &[String]) -> Option<&[String]> {
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

fn cmd_add(pipeline: &Pipeline<Database>, files: &[PathBuf], rows: bool) -> Result<()> {
    for path in files {
        let text = read_file(path)?;
        let filename = file_name(path);

        if rows {
            let records: Vec<RowRecord> = text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| RowRecord {
                    title: None,
                    content: line.trim().to_string(),
                })
                .collect();
            let documents = pipeline.ingest_rows(&filename, &records)?;
            println!("✓ {}: {} rows", filename, documents.len());
        } else {
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| filename.clone());
            let document = pipeline.ingest_text(&title, &text, &filename)?;
            println!("✓ {} ({})", filename, document.id);
        }
    }
    Ok(())
}

fn cmd_list(pipeline: &Pipeline<Database>, json: bool) -> Result<()> {
    let documents = pipeline.documents()?;
    if json {
        println!("{}", to_json(&documents, "documents")?);
        return Ok(());
    }

    let stats = pipeline.store().stats()?;
    println!(
        "Documents: {} total, {} categorized{}",
        stats.document_count,
        stats.categorized_count,
        if stats.has_catalog { ", catalog defined" } else { "" }
    );
    for document in &documents {
        println!(
            "  {}  {:<30}  {}",
            document.id,
            document.title,
            document.category.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cmd_show(pipeline: &Pipeline<Database>, id: &str) -> Result<()> {
    let document = pipeline.document(id)?;
    println!("{}", to_json(&document, "document")?);
    Ok(())
}

fn cmd_cluster(pipeline: &Pipeline<Database>, ids: &[String], instructions: Option<&str>) -> Result<()> {
    let report = match pipeline.cluster_documents(selection(ids), instructions) {
        Ok(report) => report,
        Err(DocsiftError::Naming(error)) => {
            println!("⚠ Naming stopped: {}", error.source);
            for cluster in &error.clusters {
                println!("  {} ({} documents)", cluster.name, cluster.document_ids.len());
            }
            return Err(DocsiftError::Naming(error));
        }
        Err(e) => return Err(e),
    };

    println!(
        "✓ {} clusters ({} vectors)",
        report.clusters.len(),
        match report.vector_kind {
            docsift::embedding::VectorKind::Semantic => "semantic",
            docsift::embedding::VectorKind::Frequency => "TF-IDF",
        }
    );
    for cluster in &report.clusters {
        println!("  {} ({} documents)", cluster.name, cluster.document_ids.len());
    }
    if !report.named {
        println!("No API key configured; clusters keep placeholder names.");
    }
    Ok(())
}

fn cmd_categories(pipeline: &Pipeline<Database>) -> Result<()> {
    let categories = pipeline.categories()?;
    if categories.is_empty() {
        println!("No categorized documents");
    }
    for (category, documents) in &categories {
        println!("{} ({})", category, documents.len());
        for document in documents {
            println!("  {}  {}", document.id, document.title);
        }
    }
    Ok(())
}

fn cmd_organize(pipeline: &Pipeline<Database>, mut categories: Vec<String>, ids: &[String]) -> Result<()> {
    if categories.is_empty() {
        categories = pipeline.categories()?.keys().cloned().collect();
    }

    let outcomes = pipeline.organize(selection(ids), &categories)?;
    for outcome in &outcomes {
        println!(
            "  {} → {}",
            outcome.document_id,
            outcome.category.as_deref().unwrap_or("(uncategorized)")
        );
    }
    let placed = outcomes.iter().filter(|o| o.category.is_some()).count();
    println!("✓ Organized {}/{} documents", placed, outcomes.len());
    Ok(())
}

fn cmd_fields(
    pipeline: &Pipeline<Database>,
    category: &str,
    count: Option<usize>,
    instructions: Option<&str>,
    apply: bool,
) -> Result<()> {
    let fields = pipeline.generate_fields(category, count, instructions)?;
    println!("{}", to_json(&fields, "fields")?);
    if apply {
        pipeline.apply_fields(category, &fields)?;
        println!("✓ Catalog updated for '{}'", category);
    }
    Ok(())
}

fn cmd_fields_all(
    pipeline: &Pipeline<Database>,
    count: Option<usize>,
    instructions: Option<&str>,
    apply: bool,
) -> Result<()> {
    let report = pipeline.generate_all_fields(count, instructions)?;
    println!("{}", to_json(&report, "field proposals")?);

    if apply {
        let mut catalog = pipeline.catalog()?;
        for (category, result) in &report.results {
            catalog.set_fields(category, &result.fields);
        }
        pipeline.save_catalog(&catalog)?;
    }
    println!(
        "✓ {} categories",
        report.total_categories
    );
    Ok(())
}

fn cmd_catalog(pipeline: &Pipeline<Database>, action: CatalogAction) -> Result<()> {
    match action {
        CatalogAction::Show => {
            println!("{}", to_json(&pipeline.catalog()?, "catalog")?);
        }
        CatalogAction::Import { file } => {
            let catalog: Catalog = serde_json::from_str(&read_file(&file)?).map_err(|e| DocsiftError::Json {
                source: e,
                context: format!("Invalid catalog in {}", file.display()),
            })?;
            pipeline.save_catalog(&catalog)?;
            println!("✓ Imported {} categories", catalog.categories.len());
        }
        CatalogAction::Export { file } => {
            let json = to_json(&pipeline.catalog()?, "catalog")?;
            std::fs::write(&file, json).map_err(|e| DocsiftError::Io {
                source: e,
                context: format!("Failed to write {}", file.display()),
            })?;
            println!("✓ Catalog written to {}", file.display());
        }
    }
    Ok(())
}

fn cmd_extract(
    pipeline: &Pipeline<Database>,
    ids: &[String],
    instructions: Option<&str>,
    descriptions: Option<&Path>,
) -> Result<()> {
    let overrides: FieldDescriptionOverrides = match descriptions {
        Some(path) => serde_json::from_str(&read_file(path)?).map_err(|e| DocsiftError::Json {
            source: e,
            context: format!("Invalid field descriptions in {}", path.display()),
        })?,
        None => FieldDescriptionOverrides::new(),
    };

    let report = pipeline.extract_batch(selection(ids), &overrides, instructions)?;
    println!("{}", to_json(&report.outcomes, "extraction results")?);
    println!(
        "✓ {}/{} documents processed, {} fields",
        report.processed_documents, report.total_documents, report.total_fields_extracted
    );
    Ok(())
}

fn cmd_api_key(pipeline: &Pipeline<Database>, action: ApiKeyAction) -> Result<()> {
    match action {
        ApiKeyAction::Set { key } => {
            pipeline.store_api_key(&key)?;
            println!("✓ API key saved");
        }
        ApiKeyAction::Show => match pipeline.masked_api_key() {
            Some(masked) => println!("{}", masked),
            None => println!("No API key configured"),
        },
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, profile: Option<String>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let rendered = toml::to_string_pretty(&config)?;
            println!("{}", rendered);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DocsiftError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!("Config file not found, using defaults. Run 'docsift config init' to create one.");
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    match profile {
        Some(profile) => Config::load_with_profile(&path, &profile),
        None => Config::load(&path),
    }
}
