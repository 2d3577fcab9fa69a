use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use comfy_table::{Attribute, Cell, Table};
use owo_colors::OwoColorize;
use paper_scout::config::{find_config_file, load_config, load_from_env, Config, MaxResults};
use paper_scout::download::DownloadManager;
use paper_scout::history::{DownloadHistory, SearchHistory};
use paper_scout::models::{parse_iso_date, DownloadOutcome, Paper, SearchRequest};
use paper_scout::search::{read_terms, SearchManager, SmartFilter};
use paper_scout::sources::SourceRegistry;
use paper_scout::translate::TranslationClient;
use paper_scout::ui::{self, Status};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Paper Scout - search arXiv, OpenReview and Google Scholar and download PDFs
#[derive(Parser, Debug)]
#[command(name = "paper-scout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "hongkongkiwi")]
#[command(about = "Search academic papers across several engines and download their PDFs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search one or more sources for papers
    #[command(alias = "s")]
    Search {
        /// Search keywords
        keywords: String,

        /// Earliest publication date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,

        /// Latest publication date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,

        /// Sources to search, in order (arxiv, openreview, google_scholar)
        #[arg(long = "source", short, value_delimiter = ',')]
        sources: Vec<String>,

        /// Drop papers mentioning this term (repeatable)
        #[arg(long, short = 'x')]
        exclude: Vec<String>,

        /// Keep only papers mentioning at least one of these terms (repeatable)
        #[arg(long, short = 'r')]
        require: Vec<String>,

        /// Read more exclude terms from a file, one per line
        #[arg(long)]
        exclude_file: Option<PathBuf>,

        /// Read more require terms from a file, one per line
        #[arg(long)]
        require_file: Option<PathBuf>,

        /// Ignore keyword filters from the command line and the config file
        #[arg(long)]
        no_filter: bool,

        /// Maximum results per source
        #[arg(long, short = 'm')]
        max_results: Option<usize>,

        /// Translate titles and abstracts into Chinese
        #[arg(long, short = 't')]
        translate: bool,

        /// Download the PDFs of all results
        #[arg(long, short = 'd')]
        download: bool,

        /// Directory for downloaded PDFs
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,

        /// Show the Chrome window used for Google Scholar
        #[arg(long)]
        show_browser: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download a single PDF
    #[command(alias = "d")]
    Download {
        /// PDF URL
        #[arg(long)]
        url: String,

        /// Paper title, used for the file name and duplicate detection
        #[arg(long)]
        title: String,

        /// Directory for downloaded PDFs
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,
    },

    /// Show or clear download and search history
    History {
        /// Number of entries to show
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,

        /// Forget all downloads
        #[arg(long)]
        clear_downloads: bool,

        /// Forget all searches
        #[arg(long)]
        clear_searches: bool,
    },

    /// List available sources and their capabilities
    Sources,

    /// Translate text into Chinese
    Translate {
        /// Text to translate
        text: String,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_iso_date(value).ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", value))
}

fn load(cli: &Cli) -> Result<Config> {
    let config = if let Some(config_path) = &cli.config {
        load_config(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else if let Some(config_path) = find_config_file() {
        tracing::info!("Using config file: {}", config_path.display());
        load_config(&config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else {
        load_from_env().context("Failed to read configuration from the environment")?
    };
    Ok(config)
}

fn terms_with_file(mut terms: Vec<String>, file: Option<&Path>) -> Result<Vec<String>> {
    if let Some(path) = file {
        let extra = read_terms(path)
            .with_context(|| format!("Failed to read filter terms from {}", path.display()))?;
        terms.extend(extra);
    }
    Ok(terms)
}

/// Config terms first, then command-line terms and term files
fn search_filter(
    config: &Config,
    no_filter: bool,
    exclude: Vec<String>,
    require: Vec<String>,
    exclude_file: Option<&Path>,
    require_file: Option<&Path>,
) -> Result<SmartFilter> {
    if no_filter {
        return Ok(SmartFilter::disabled());
    }
    Ok(SmartFilter::from_config(&config.filter).with_terms(
        terms_with_file(exclude, exclude_file)?,
        terms_with_file(require, require_file)?,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_scout={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = load(&cli)?;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Search {
            keywords,
            from,
            to,
            sources,
            exclude,
            require,
            exclude_file,
            require_file,
            no_filter,
            max_results,
            translate,
            download,
            output_dir,
            show_browser,
            json,
        } => {
            if show_browser {
                config.scholar.headless = false;
            }
            let max_results = MaxResults::new(max_results.unwrap_or(config.search.max_results));
            let registry = SourceRegistry::new(&config, max_results)?;

            let filter = search_filter(
                &config,
                no_filter,
                exclude,
                require,
                exclude_file.as_deref(),
                require_file.as_deref(),
            )?;
            let manager = SearchManager::new(registry).with_filter_enabled(filter.is_enabled());

            let sources = if sources.is_empty() {
                config.search.sources.clone()
            } else {
                sources
            };
            let request = SearchRequest::new(keywords.trim())
                .dates(from, to)
                .sources(sources)
                .exclude(filter.exclude_terms())
                .require(filter.require_terms());

            let mut history = SearchHistory::open(&config.history.search_history);
            let started = Instant::now();
            let spinner = (!quiet && !json).then(|| ui::Spinner::new("Searching..."));
            let papers = manager.search_and_record(&request, &mut history).await;
            if let Some(spinner) = spinner {
                spinner.finish_with_success(&format!("Found {} papers", papers.len()));
            }

            let translations = if translate || config.translation.auto_translate {
                translate_papers(&config, &papers).await?
            } else {
                Vec::new()
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&papers)?);
            } else if !quiet {
                ui::print_search_header(&request.keywords, papers.len(), started.elapsed());
                for (index, paper) in papers.iter().enumerate() {
                    let translation = translations
                        .get(index)
                        .and_then(|t| t.as_ref())
                        .map(|(title, abstract_text)| (title.as_str(), abstract_text.as_str()));
                    ui::print_paper(index, paper, translation);
                }
            }

            if download && !papers.is_empty() {
                let mut downloader = DownloadManager::from_config(&config)?;
                if let Some(dir) = output_dir {
                    downloader.set_download_dir(dir)?;
                }

                let bar = (!quiet).then(|| ui::DownloadProgress::new(papers.len()));
                let on_item = |index: usize, total: usize| {
                    if let Some(bar) = &bar {
                        bar.start_item(index, total);
                    }
                };
                let report = downloader.download_many(&papers, Some(&on_item)).await;
                if let Some(bar) = &bar {
                    bar.finish();
                }

                if !quiet {
                    ui::print_batch_report(&report);
                }
            }
        }

        Commands::Download {
            url,
            title,
            output_dir,
        } => {
            let mut downloader = DownloadManager::from_config(&config)?;
            if let Some(dir) = output_dir {
                downloader.set_download_dir(dir)?;
            }

            let bar = (!quiet).then(|| ui::DownloadProgress::new(1));
            let on_bytes = |percent: f64| {
                if let Some(bar) = &bar {
                    bar.item_percent(percent);
                }
            };
            let outcome = downloader
                .download_one(Some(url.as_str()), &title, Some(&on_bytes))
                .await;
            if let Some(bar) = &bar {
                bar.finish();
            }

            match &outcome {
                DownloadOutcome::Success { .. } if !quiet => {
                    ui::print_status(Status::Success, &outcome.message())
                }
                DownloadOutcome::Duplicate { .. } if !quiet => {
                    ui::print_status(Status::Skipped, &outcome.message())
                }
                DownloadOutcome::Failed(err) => {
                    anyhow::bail!("Download of \"{}\" failed: {}", title, err)
                }
                _ => {}
            }
        }

        Commands::History {
            limit,
            clear_downloads,
            clear_searches,
        } => {
            let mut downloads = DownloadHistory::open(&config.history.download_history);
            let mut searches = SearchHistory::open(&config.history.search_history);

            if clear_downloads || clear_searches {
                if clear_downloads {
                    downloads.clear();
                }
                if clear_searches {
                    searches.clear();
                }
                if !quiet {
                    ui::print_status(Status::Success, "History cleared");
                }
                return Ok(());
            }

            print_download_history(&downloads, limit);
            print_search_history(&searches, limit);
        }

        Commands::Sources => {
            let registry = SourceRegistry::new(&config, MaxResults::new(config.search.max_results))?;

            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["ID", "Name", "Capabilities", "Default"]);

            for id in registry.ids() {
                let Some(source) = registry.get(id) else {
                    continue;
                };
                let capabilities = source
                    .capabilities()
                    .iter_names()
                    .map(|(name, _)| name.to_lowercase())
                    .collect::<Vec<_>>()
                    .join(", ");
                let default = config.search.sources.iter().any(|s| s == id.id());

                table.add_row(vec![
                    Cell::new(id.id()).add_attribute(Attribute::Bold),
                    Cell::new(format!("{} {}", ui::source_icon(id), source.name())),
                    Cell::new(capabilities),
                    Cell::new(if default { "yes" } else { "" }),
                ]);
            }
            println!("{table}");
        }

        Commands::Translate { text } => {
            let translator = TranslationClient::new(&config.translation)?;
            if !translator.is_configured() {
                anyhow::bail!("No translation API key configured (set QWEN_API_KEY)");
            }
            match translator.translate(&text).await {
                Some(translated) => println!("{}", translated),
                None => anyhow::bail!("Translation failed"),
            }
        }
    }

    Ok(())
}

/// Translate every paper's title and abstract, in result order
async fn translate_papers(
    config: &Config,
    papers: &[Paper],
) -> Result<Vec<Option<(String, String)>>> {
    let translator = TranslationClient::new(&config.translation)?;
    if !translator.is_configured() {
        tracing::warn!("Translation requested but no API key is configured");
        return Ok(Vec::new());
    }

    let mut translations = Vec::with_capacity(papers.len());
    for paper in papers {
        let title = translator.translate(&paper.title).await;
        let abstract_text = translator.translate(&paper.r#abstract).await;
        translations.push(match (title, abstract_text) {
            (None, None) => None,
            (title, abstract_text) => {
                Some((title.unwrap_or_default(), abstract_text.unwrap_or_default()))
            }
        });
    }
    Ok(translations)
}

fn print_download_history(history: &DownloadHistory, limit: usize) {
    ui::print_section(&format!(
        "Downloads ({} total)",
        history.total_downloads()
    ));

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Title", "File", "Date"]);
    for record in history.records().into_iter().take(limit) {
        table.add_row(vec![
            Cell::new(ui::truncate_with_ellipsis(&record.title, 50)).add_attribute(Attribute::Bold),
            Cell::new(ui::truncate_with_ellipsis(&record.file_path, 50)),
            Cell::new(&record.date_only),
        ]);
    }
    println!("{table}");
}

fn print_search_history(history: &SearchHistory, limit: usize) {
    ui::print_section(&format!(
        "Searches ({} total)",
        history.total_searches()
    ));

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Keywords", "Excluded", "Sources", "Results", "Count", "Last searched"]);
    for record in history.recent(limit) {
        let last = record
            .last_search_time
            .get(..16)
            .unwrap_or(&record.last_search_time)
            .replace('T', " ");
        table.add_row(vec![
            Cell::new(&record.keywords).add_attribute(Attribute::Bold),
            Cell::new(ui::truncate_with_ellipsis(&record.exclude_keywords, 30)),
            Cell::new(record.sources.join(", ")),
            Cell::new(record.results_count),
            Cell::new(record.search_count),
            Cell::new(last),
        ]);
    }
    println!("{table}");

    let popular = history.popular_keywords(5);
    if !popular.is_empty() {
        println!("{} {}", "Popular:".bold(), popular.join(" · ").cyan());
    }
}
