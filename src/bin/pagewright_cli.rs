//! Pagewright CLI - render pages offline or run handlers against a local data directory
//!
//! Offline commands: render, lint
//! Handler commands print the response as JSON to stdout
//! Exit code: 0 on success, 2 on client errors and lint errors, 1 otherwise

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pagewright_core::{
    lint,
    page::PageRecord,
    render,
    store::{FsKeyValueStore, FsObjectStore},
    CmsService, Request, Response, ServiceConfig, WidgetLibrary,
};

#[derive(Parser)]
#[command(name = "pagewright-cli", version)]
#[command(about = "Pagewright CLI - Static Page Constructor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root of the local tables/ and buckets/ directories
    #[arg(short, long, default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Log at INFO (otherwise RUST_LOG, default WARN)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a page from local files and print the HTML
    Render(OfflineArgs),

    /// Lint a page from local files and print the report
    Lint(OfflineArgs),

    /// Render a stored page without publishing it
    Preview {
        #[arg(short, long)]
        slug: String,
    },

    /// Render a stored page and write it to the site bucket
    Publish {
        #[arg(short, long)]
        slug: String,
    },

    /// Print a stored page
    GetPage {
        #[arg(short, long)]
        slug: String,
    },

    /// Create or replace a page (JSON, or @file)
    SavePage {
        #[arg(short, long)]
        payload: String,
    },

    /// List stored pages
    ListPages,

    /// Print a stored widget
    GetWidget {
        #[arg(short, long)]
        slug: String,
    },

    /// List stored widgets
    ListWidgets,

    /// Import widget records (JSON array, or @file)
    ImportWidgets {
        #[arg(short, long)]
        payload: String,
    },

    /// Import page template records (JSON array, or @file)
    ImportPageTemplates {
        #[arg(short, long)]
        payload: String,
    },
}

#[derive(clap::Args)]
struct OfflineArgs {
    /// Page JSON (slug, name, configuration, props)
    #[arg(short, long)]
    page: PathBuf,

    /// Page template HTML
    #[arg(short, long)]
    template: PathBuf,

    /// Directory of widget JSON files with inline html
    #[arg(short, long, default_value = "widgets")]
    widgets: PathBuf,
}

struct OfflineInputs {
    page: PageRecord,
    template: String,
    library: WidgetLibrary,
}

fn load_offline(args: &OfflineArgs) -> Result<OfflineInputs, String> {
    let page = fs::read_to_string(&args.page)
        .map_err(|e| format!("Failed to read {}: {}", args.page.display(), e))?;
    let page: PageRecord = serde_json::from_str(&page)
        .map_err(|e| format!("Invalid page {}: {}", args.page.display(), e))?;
    let template = fs::read_to_string(&args.template)
        .map_err(|e| format!("Failed to read {}: {}", args.template.display(), e))?;
    let library = WidgetLibrary::load_from_dir(&args.widgets)
        .map_err(|e| format!("Failed to load widgets: {}", e))?;
    Ok(OfflineInputs { page, template, library })
}

/// Inline JSON, or the contents of a file when prefixed with `@`.
fn read_payload(payload: &str) -> Result<String, String> {
    match payload.strip_prefix('@') {
        Some(path) => fs::read_to_string(Path::new(path))
            .map_err(|e| format!("Failed to read payload {}: {}", path, e)),
        None => Ok(payload.to_string()),
    }
}

/// Print `value` as pretty JSON; false if it could not be serialized.
fn print_json(value: &impl serde::Serialize) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{}", s);
            true
        }
        Err(e) => {
            fail(&format!("Failed to serialize output: {}", e));
            false
        }
    }
}

fn fail(message: &str) -> ExitCode {
    eprintln!("{}", serde_json::json!({ "error": message }));
    ExitCode::FAILURE
}

fn emit(response: &Response) -> ExitCode {
    if !print_json(response) {
        return ExitCode::FAILURE;
    }
    match response.status_code {
        200..=299 => ExitCode::SUCCESS,
        400..=499 => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render(args) => {
            let inputs = match load_offline(&args) {
                Ok(i) => i,
                Err(e) => return fail(&e),
            };
            let OfflineInputs { page, template, library } = inputs;
            match render(&template, &page.props, &page.configuration, &library) {
                Ok(html) => {
                    print!("{}", html);
                    ExitCode::SUCCESS
                }
                Err(e) => fail(&e.to_string()),
            }
        }

        Commands::Lint(args) => {
            let inputs = match load_offline(&args) {
                Ok(i) => i,
                Err(e) => return fail(&e),
            };
            let OfflineInputs { page, template, library } = inputs;
            let report = lint(&template, &page.props, &page.configuration, &library);
            if !print_json(&report) {
                return ExitCode::FAILURE;
            }
            if report.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }

        command => {
            let config = match ServiceConfig::from_env() {
                Ok(c) => c,
                Err(e) => return fail(&format!("Invalid configuration: {}", e)),
            };
            let service = CmsService::new(
                config,
                Arc::new(FsKeyValueStore::new(&cli.data_dir)),
                Arc::new(FsObjectStore::new(&cli.data_dir)),
            );
            run_handler(&service, command)
        }
    }
}

fn run_handler(service: &CmsService, command: Commands) -> ExitCode {
    let with_payload =
        |payload: &str| read_payload(payload).map(|body| Request::new().with_body(body));
    let with_slug = |slug: String| Request::new().with_query("slug", slug);

    match command {
        Commands::Preview { slug } => match service.pipeline().preview(&slug) {
            Ok(page) => {
                print!("{}", page.html);
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e.to_string()),
        },
        Commands::Publish { slug } => {
            match service.try_publish_page(&with_slug(slug)) {
                Ok((_, receipt)) if print_json(&receipt) => ExitCode::SUCCESS,
                Ok(_) => ExitCode::FAILURE,
                Err(e) => emit(&e.into_response()),
            }
        }
        Commands::GetPage { slug } => emit(&service.get_page(&with_slug(slug))),
        Commands::GetWidget { slug } => emit(&service.get_widget(&with_slug(slug))),
        Commands::ListPages => emit(&service.list_pages(&Request::new())),
        Commands::ListWidgets => emit(&service.list_widgets(&Request::new())),
        Commands::SavePage { payload } => match with_payload(&payload) {
            Ok(request) => emit(&service.save_page(&request)),
            Err(e) => fail(&e),
        },
        Commands::ImportWidgets { payload } => match with_payload(&payload) {
            Ok(request) => emit(&service.import_widgets(&request)),
            Err(e) => fail(&e),
        },
        Commands::ImportPageTemplates { payload } => match with_payload(&payload) {
            Ok(request) => emit(&service.import_page_templates(&request)),
            Err(e) => fail(&e),
        },
        Commands::Render(_) | Commands::Lint(_) => {
            fail("offline commands do not use the data directory")
        }
    }
}
