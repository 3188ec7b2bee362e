//! Command-line front end for document extraction, recreation and translation.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docmeta_core::{display_tree, DocumentFormat, TextProcessor, Transform, TreeNode};
use docmeta_translate::{translate_pptx, GoogleTranslator, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Extract, transform, recreate and translate PDF, DOCX and PPTX documents.
#[derive(Parser, Debug)]
#[command(name = "docmeta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract text spans and images from a PDF into a sidecar folder
    ExtractPdf {
        input: PathBuf,
        #[arg(short, long, default_value = "results/pdf_output")]
        output: PathBuf,
    },

    /// Extract paragraphs, tables and images from a DOCX into a sidecar folder
    ExtractDocx {
        input: PathBuf,
        #[arg(short, long, default_value = "results/docx_output")]
        output: PathBuf,
    },

    /// Extract slide text and pictures from a PPTX into a sidecar folder
    ExtractPptx {
        input: PathBuf,
        #[arg(short, long, default_value = "results/pptx_output")]
        output: PathBuf,
    },

    /// Recreate a document from a sidecar folder through a text transform
    Transform {
        /// Sidecar folder holding metadata.json
        folder: PathBuf,
        /// Document type of the sidecar (pdf or docx)
        #[arg(short = 't', long = "type")]
        file_type: String,
        /// identity, uppercase or lowercase
        #[arg(short = 'x', long, default_value = "uppercase")]
        transform: String,
        /// Output file (default: results/<transform>_output.<type>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recreate a document from a sidecar folder with all text uppercased
    Uppercase {
        folder: PathBuf,
        #[arg(short = 't', long = "type")]
        file_type: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recreate a DOCX from a sidecar folder
    RecreateDocx {
        folder: PathBuf,
        #[arg(short, long, default_value = "results/recreated_docx.docx")]
        output: PathBuf,
    },

    /// Recreate a PDF from a sidecar folder
    RecreatePdf {
        folder: PathBuf,
        #[arg(short, long, default_value = "results/recreated_pdf.pdf")]
        output: PathBuf,
    },

    /// Append a machine translation under every run of a presentation
    TranslatePptx {
        input: PathBuf,
        #[arg(short, long, default_value = "results/translated_pptx.pptx")]
        output: PathBuf,
        #[arg(long, default_value = DEFAULT_SOURCE_LANG)]
        from: String,
        #[arg(long, default_value = DEFAULT_TARGET_LANG)]
        to: String,
        /// Translation endpoint (default: Google's public endpoint)
        #[arg(long, env = "DOCMETA_TRANSLATE_URL")]
        base_url: Option<String>,
    },

    /// Print the document tree of a DOCX or PDF
    Tree {
        input: PathBuf,
        /// Where images referenced by the tree are written
        #[arg(long, default_value = "tree_images")]
        img_dir: PathBuf,
        /// Print JSON instead of the indented listing
        #[arg(long)]
        json: bool,
    },

    /// Build the tree of a DOCX or PDF and write it back out as a DOCX
    TreeToDocx {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = "tree_images")]
        img_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    run(cli.command)
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::ExtractPdf { input, output } => {
            let meta = docmeta_pdf::extract_text_images_from_pdf(&input, &output)
                .with_context(|| format!("Failed to extract {}", input.display()))?;
            println!("Extracted {} pages to {}", meta.pages.len(), output.display());
        }
        Command::ExtractDocx { input, output } => {
            let meta = docmeta_docx::extract_text_images_from_docx(&input, &output)
                .with_context(|| format!("Failed to extract {}", input.display()))?;
            println!(
                "Extracted {} paragraphs, {} tables, {} images to {}",
                meta.paragraphs.len(),
                meta.tables.len(),
                meta.images.len(),
                output.display()
            );
        }
        Command::ExtractPptx { input, output } => {
            let meta = docmeta_pptx::extract_text_images_from_pptx(&input, &output)
                .with_context(|| format!("Failed to extract {}", input.display()))?;
            println!("Extracted {} slides to {}", meta.slides.len(), output.display());
        }
        Command::Transform {
            folder,
            file_type,
            transform,
            output,
        } => {
            let transform = Transform::from_str(&transform)?;
            let written = transform_folder(&folder, &file_type, transform, output)?;
            println!("Written to {}", written.display());
        }
        Command::Uppercase {
            folder,
            file_type,
            output,
        } => {
            let written = transform_folder(&folder, &file_type, Transform::Uppercase, output)?;
            println!("Written to {}", written.display());
        }
        Command::RecreateDocx { folder, output } => {
            ensure_parent(&output)?;
            docmeta_docx::recreate_docx(&folder, &output, None)
                .with_context(|| format!("Failed to recreate DOCX from {}", folder.display()))?;
            println!("Written to {}", output.display());
        }
        Command::RecreatePdf { folder, output } => {
            ensure_parent(&output)?;
            docmeta_pdf::recreate_pdf(&folder, &output, None)
                .with_context(|| format!("Failed to recreate PDF from {}", folder.display()))?;
            println!("Written to {}", output.display());
        }
        Command::TranslatePptx {
            input,
            output,
            from,
            to,
            base_url,
        } => {
            ensure_parent(&output)?;
            let translator = match base_url {
                Some(url) => GoogleTranslator::with_base_url(&url),
                None => GoogleTranslator::new(),
            };
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            let count = runtime
                .block_on(translate_pptx(&input, &output, &translator, &from, &to))
                .with_context(|| format!("Failed to translate {}", input.display()))?;
            println!("Translated {} texts, written to {}", count, output.display());
        }
        Command::Tree { input, img_dir, json } => {
            let tree = build_tree(&input, &img_dir)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                print!("{}", display_tree(&tree));
            }
        }
        Command::TreeToDocx {
            input,
            output,
            img_dir,
        } => {
            let tree = build_tree(&input, &img_dir)?;
            ensure_parent(&output)?;
            docmeta_docx::recreate_docx_from_tree(&tree)?.save(&output)?;
            println!("Written to {}", output.display());
        }
    }

    Ok(())
}

/// Recreate the document in `folder` through `transform`; returns the output path.
fn transform_folder(folder: &Path, file_type: &str, transform: Transform, output: Option<PathBuf>) -> Result<PathBuf> {
    let format = DocumentFormat::from_str(file_type)?;
    if format == DocumentFormat::Pptx {
        bail!("Transforms are only supported for pdf and docx sidecars");
    }
    let output = output.unwrap_or_else(|| default_transform_output(transform, format));
    ensure_parent(&output)?;

    let processor: &dyn TextProcessor = &transform;
    match format {
        DocumentFormat::Pdf => docmeta_pdf::recreate_pdf(folder, &output, Some(processor))?,
        _ => docmeta_docx::recreate_docx(folder, &output, Some(processor))?,
    }
    Ok(output)
}

fn default_transform_output(transform: Transform, format: DocumentFormat) -> PathBuf {
    PathBuf::from("results").join(format!("{}_output.{}", transform.name(), format.extension()))
}

fn build_tree(input: &Path, img_dir: &Path) -> Result<TreeNode> {
    let tree = match DocumentFormat::from_path(input) {
        Some(DocumentFormat::Docx) => docmeta_docx::build_docx_tree(input, img_dir)?,
        Some(DocumentFormat::Pdf) => docmeta_pdf::build_pdf_tree(input, img_dir)?,
        _ => bail!("Unsupported file type for tree: {}", input.display()),
    };
    Ok(tree)
}

/// Create the parent directory of an output file.
fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmeta_core::{save_metadata, DocxMetadata, Paragraph, Run};

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["docmeta", "extract-pdf", "in.pdf"]).unwrap();
        match cli.command {
            Command::ExtractPdf { input, output } => {
                assert_eq!(input, PathBuf::from("in.pdf"));
                assert_eq!(output, PathBuf::from("results/pdf_output"));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["docmeta", "-v", "translate-pptx", "deck.pptx", "--to", "fr"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::TranslatePptx { from, to, .. } => {
                assert_eq!(from, "en");
                assert_eq!(to, "fr");
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["docmeta", "transform", "folder"]).is_err());
    }

    #[test]
    fn test_default_transform_output() {
        assert_eq!(
            default_transform_output(Transform::Uppercase, DocumentFormat::Docx),
            PathBuf::from("results/uppercase_output.docx")
        );
        assert_eq!(
            default_transform_output(Transform::Lowercase, DocumentFormat::Pdf),
            PathBuf::from("results/lowercase_output.pdf")
        );
    }

    #[test]
    fn test_transform_folder_docx() {
        let dir = tempfile::tempdir().unwrap();
        let meta = DocxMetadata {
            paragraphs: vec![Paragraph::from_runs(Some(1), vec![Run::new("quiet")])],
            ..DocxMetadata::default()
        };
        save_metadata(&meta, dir.path()).unwrap();

        let output = dir.path().join("out/upper.docx");
        let written = transform_folder(dir.path(), "docx", Transform::Uppercase, Some(output.clone())).unwrap();
        assert_eq!(written, output);

        let extracted = docmeta_docx::extract_text_images_from_docx(&output, &dir.path().join("check")).unwrap();
        assert_eq!(extracted.paragraphs[0].text, "QUIET");
    }

    #[test]
    fn test_transform_rejects_pptx_and_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        assert!(transform_folder(dir.path(), "pptx", Transform::Uppercase, None).is_err());
        assert!(transform_folder(dir.path(), "txt", Transform::Uppercase, None).is_err());
    }
}
