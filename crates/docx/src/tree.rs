//! Document tree construction for Word documents.

use crate::parser::DocxParser;
use docmeta_core::color::ooxml_hex;
use docmeta_core::{ensure_folder, NodeType, Result, Run, TreeNode};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Build a `document` tree from a DOCX file.
///
/// Each body paragraph becomes a `paragraph` node with one `run` node per
/// run. Images are written into `img_dir` as `image{N}.<ext>` and listed
/// under a trailing `images` node, since their position in the flow is not
/// tracked.
pub fn build_docx_tree(path: &Path, img_dir: &Path) -> Result<TreeNode> {
    let document = DocxParser::new().parse(BufReader::new(File::open(path)?))?;
    let mut root = TreeNode::new(NodeType::Document);

    for paragraph in &document.paragraphs {
        let mut node = TreeNode::new(NodeType::Paragraph);
        for run in &paragraph.runs {
            node.add_child(run_node(run));
        }
        root.add_child(node);
    }

    if !document.images.is_empty() {
        ensure_folder(img_dir)?;
    }
    for (i, image) in document.images.iter().enumerate() {
        let image_path = img_dir.join(format!("image{}.{}", i, image.ext));
        fs::write(&image_path, &image.data)?;
        root.child_or_insert(NodeType::Images)
            .add_child(TreeNode::new(NodeType::Image).with_content(image_path.to_string_lossy()));
    }

    Ok(root)
}

fn run_node(run: &Run) -> TreeNode {
    TreeNode::new(NodeType::Run)
        .with_content(run.text.as_str())
        .with_attr("bold", run.bold)
        .with_attr("italic", run.italic)
        .with_attr("underline", run.underline)
        .with_attr("font_name", run.font_name.clone())
        .with_attr("font_size", run.font_size)
        .with_attr("text_color", run.color.map(ooxml_hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recreate::recreate_docx_from_tree;
    use crate::writer::DocxBuilder;
    use crate::test_support::tiny_png;
    use docmeta_core::display_tree;

    fn sample_file(dir: &Path) -> std::path::PathBuf {
        let mut builder = DocxBuilder::new();
        let p = builder.add_paragraph();
        builder.add_run(
            p,
            Run {
                text: "Hi".to_string(),
                bold: Some(true),
                color: Some([0xAB, 0xCD, 0xEF]),
                ..Run::default()
            },
        );
        builder.add_picture(tiny_png(), None).unwrap();

        let path = dir.join("sample.docx");
        builder.save(&path).unwrap();
        path
    }

    #[test]
    fn test_tree_shape() {
        let dir = tempfile::tempdir().unwrap();
        let img_dir = dir.path().join("img");
        let tree = build_docx_tree(&sample_file(dir.path()), &img_dir).unwrap();

        assert_eq!(tree.node_type, NodeType::Document);
        // The picture lives in its own paragraph, so two paragraphs plus images.
        assert_eq!(tree.count(NodeType::Paragraph), 2);
        let run = &tree.children[0].children[0];
        assert_eq!(run.content.as_deref(), Some("Hi"));
        assert!(run.attr_flag("bold"));
        assert_eq!(run.attr_str("text_color"), Some("ABCDEF"));
        assert!(!run.attributes.contains_key("italic"));

        let images = tree.find_child(NodeType::Images).unwrap();
        assert_eq!(images.children.len(), 1);
        assert!(img_dir.join("image0.png").is_file());

        let text = display_tree(&tree);
        assert!(text.starts_with("DOCUMENT:"));
        assert!(text.contains("        RUN: Hi"));
    }

    #[test]
    fn test_tree_roundtrip_through_recreate() {
        let dir = tempfile::tempdir().unwrap();
        let tree = build_docx_tree(&sample_file(dir.path()), &dir.path().join("img")).unwrap();
        let builder = recreate_docx_from_tree(&tree).unwrap();
        assert_eq!(builder.picture_count(), 1);
        // The picture comes back as a picture item, not a paragraph.
        assert_eq!(builder.paragraph_count(), 2);
    }
}
