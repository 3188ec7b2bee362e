//! Rebuilding Word documents from a sidecar folder or a document tree.

use crate::writer::{CellContent, DocxBuilder, ParagraphId};
use docmeta_core::color::rgb_from_hex;
use docmeta_core::sidecar::resolve_asset;
use docmeta_core::{
    load_metadata, process_text, DocxMetadata, NodeType, Paragraph, Result, Run, TextProcessor,
    TreeNode,
};
use std::fs;
use std::path::Path;

/// Width given to sidecar images, in points.
const SIDECAR_IMAGE_WIDTH_PT: f64 = 300.0;

/// Baselines closer than this are treated as the same line.
const BASELINE_TOLERANCE: f64 = 1.0;

/// Recreate a DOCX from the `metadata.json` in `folder`, writing it to `output`.
///
/// Body paragraphs come first, then images at a fixed width, then tables.
/// Images that cannot be decoded (EMF, WMF) are skipped with a warning.
/// `processor` is applied to the text of every run, table runs included.
pub fn recreate_docx(
    folder: &Path,
    output: &Path,
    processor: Option<&dyn TextProcessor>,
) -> Result<()> {
    let metadata: DocxMetadata = load_metadata(folder)?;
    let builder = build_from_metadata(folder, &metadata, processor)?;
    builder.save(output)?;
    log::info!("Recreated DOCX {}", output.display());
    Ok(())
}

fn build_from_metadata(
    folder: &Path,
    metadata: &DocxMetadata,
    processor: Option<&dyn TextProcessor>,
) -> Result<DocxBuilder> {
    let mut builder = DocxBuilder::new();

    for paragraph in &metadata.paragraphs {
        builder.add_paragraph_with_runs(processed_runs(paragraph, processor));
    }

    for image in &metadata.images {
        let path = resolve_asset(folder, &image.path)?;
        let data = fs::read(&path)?;
        if let Err(e) = builder.add_picture(data, Some(SIDECAR_IMAGE_WIDTH_PT)) {
            log::warn!("Skipping image {}: {}", path.display(), e);
        }
    }

    for table in &metadata.tables {
        let rows: Vec<Vec<CellContent>> = table
            .rows
            .iter()
            .map(|row| {
                row.cells
                    .iter()
                    .map(|cell| {
                        cell.paragraphs
                            .iter()
                            .map(|p| processed_runs(p, processor))
                            .collect()
                    })
                    .collect()
            })
            .collect();
        builder.add_table(table.column_count(), rows);
    }

    Ok(builder)
}

fn processed_runs(paragraph: &Paragraph, processor: Option<&dyn TextProcessor>) -> Vec<Run> {
    paragraph
        .runs
        .iter()
        .map(|run| Run {
            text: process_text(&run.text, processor),
            ..run.clone()
        })
        .collect()
}

/// Rebuild a document from a tree produced by `build_docx_tree` or `build_pdf_tree`.
///
/// `paragraph` and `page` nodes open a new paragraph for their children;
/// `run` and `text` nodes become runs of the enclosing paragraph and are
/// dropped when there is none; `image` nodes add a picture read from the
/// path in their content.
pub fn recreate_docx_from_tree(root: &TreeNode) -> Result<DocxBuilder> {
    let mut visitor = TreeVisitor {
        builder: DocxBuilder::new(),
        last_baseline: None,
    };
    visitor.visit(root, None)?;
    Ok(visitor.builder)
}

struct TreeVisitor {
    builder: DocxBuilder,
    last_baseline: Option<f64>,
}

impl TreeVisitor {
    fn visit(&mut self, node: &TreeNode, paragraph: Option<ParagraphId>) -> Result<()> {
        let mut current = paragraph;

        match node.node_type {
            NodeType::Paragraph | NodeType::Page => {
                current = Some(self.builder.add_paragraph());
                self.last_baseline = None;
            }
            NodeType::Run | NodeType::Text => {
                if let Some(id) = current {
                    let mut run = run_from_node(node);
                    if node.node_type == NodeType::Text {
                        self.break_on_new_line(node, id, &mut run);
                    }
                    self.builder.add_run(id, run);
                }
            }
            NodeType::Image => self.add_image(node)?,
            NodeType::Document | NodeType::Images => {}
        }

        for child in &node.children {
            self.visit(child, current)?;
        }
        Ok(())
    }

    /// PDF spans carry their baseline; a new baseline starts a new line.
    fn break_on_new_line(&mut self, node: &TreeNode, id: ParagraphId, run: &mut Run) {
        let Some(y) = node.attr_f64("y") else {
            return;
        };
        if let Some(previous) = self.last_baseline {
            if (y - previous).abs() > BASELINE_TOLERANCE && !self.builder.runs(id).is_empty() {
                run.text.insert(0, '\n');
            }
        }
        self.last_baseline = Some(y);
    }

    fn add_image(&mut self, node: &TreeNode) -> Result<()> {
        let Some(path) = node.content.as_deref() else {
            log::warn!("Image node without a path");
            return Ok(());
        };
        let data = fs::read(path)?;
        if let Err(e) = self.builder.add_picture(data, None) {
            log::warn!("Skipping image {}: {}", path, e);
        }
        Ok(())
    }
}

fn run_from_node(node: &TreeNode) -> Run {
    let flag = |key: &str| node.attr_flag(key).then_some(true);
    let color = node
        .attr_str("text_color")
        .or_else(|| node.attr_str("color"))
        .and_then(rgb_from_hex);

    Run {
        text: node.content.clone().unwrap_or_default(),
        bold: flag("bold"),
        italic: flag("italic"),
        underline: flag("underline"),
        font_name: node
            .attr_str("font_name")
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        font_size: node.attr_f64("font_size").filter(|s| *s > 0.0),
        color,
    }
}
