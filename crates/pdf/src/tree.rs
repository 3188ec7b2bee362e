//! Document tree construction for PDF files.

use crate::extract::{load_document, read_pages};
use docmeta_core::color::hex_from_int;
use docmeta_core::{ensure_folder, NodeType, Result, TextInstance, TreeNode};
use std::fs;
use std::path::Path;

/// Build a `document` tree from a PDF file.
///
/// Pages become `page` nodes numbered from 0, holding one `text` node per
/// span followed by one `image` node per image. Images are written into
/// `img_dir` as `page_{p}_image_{i}.<ext>`, both 0-based.
pub fn build_pdf_tree(path: &Path, img_dir: &Path) -> Result<TreeNode> {
    let doc = load_document(path)?;
    let mut root = TreeNode::new(NodeType::Document);

    for (p, page) in read_pages(&doc).into_iter().enumerate() {
        let mut node = TreeNode::new(NodeType::Page)
            .with_attr("number", p)
            .with_attr("width", page.width)
            .with_attr("height", page.height);

        for span in &page.text_instances {
            node.add_child(text_node(span));
        }

        if !page.images.is_empty() {
            ensure_folder(img_dir)?;
        }
        for (i, image) in page.images.iter().enumerate() {
            let image_path = img_dir.join(format!("page_{}_image_{}.{}", p, i, image.ext));
            fs::write(&image_path, &image.data)?;
            node.add_child(TreeNode::new(NodeType::Image).with_content(image_path.to_string_lossy()));
        }

        root.add_child(node);
    }

    log::debug!("Built PDF tree for {}: {} nodes", path.display(), root.count(NodeType::Text));
    Ok(root)
}

fn text_node(span: &TextInstance) -> TreeNode {
    let y = span.origin.map(|[_, y]| y).unwrap_or(span.bbox[3]);
    TreeNode::new(NodeType::Text)
        .with_content(span.text.as_str())
        .with_attr("font_name", span.font_name.as_str())
        .with_attr("font_size", span.font_size)
        .with_attr("color", hex_from_int(span.font_color))
        .with_attr("bold", span.bold)
        .with_attr("italic", span.italic)
        .with_attr("x", span.bbox[0])
        .with_attr("y", y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_pdf, TestPage};
    use docmeta_core::display_tree;

    #[test]
    fn test_tree_shape() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("in.pdf");
        fs::write(
            &pdf,
            build_pdf(&[
                TestPage {
                    content: b"BT /F1 10 Tf 1 0 0 rg 50 700 Td (Top) Tj 0 -20 Td (Next) Tj ET".to_vec(),
                    with_image: false,
                },
                TestPage {
                    content: Vec::new(),
                    with_image: true,
                },
            ]),
        )
        .unwrap();

        let img_dir = dir.path().join("img");
        let tree = build_pdf_tree(&pdf, &img_dir).unwrap();
        assert_eq!(tree.node_type, NodeType::Document);
        assert_eq!(tree.children.len(), 2);

        let first = &tree.children[0];
        assert_eq!(first.attr_f64("number"), Some(0.0));
        assert_eq!(first.children.len(), 2);
        let top = &first.children[0];
        assert_eq!(top.content.as_deref(), Some("Top"));
        assert_eq!(top.attr_str("font_name"), Some("Helvetica"));
        assert_eq!(top.attr_str("color"), Some("#ff0000"));
        assert_eq!(top.attr_f64("font_size"), Some(10.0));
        assert_eq!(top.attr_f64("y"), Some(92.0));
        assert_eq!(first.children[1].attr_f64("y"), Some(112.0));

        let second = &tree.children[1];
        assert_eq!(second.attr_f64("number"), Some(1.0));
        let image = &second.children[0];
        assert_eq!(image.node_type, NodeType::Image);
        assert!(image.content.as_deref().unwrap().ends_with("page_1_image_0.png"));
        assert!(img_dir.join("page_1_image_0.png").is_file());

        let printed = display_tree(&tree);
        assert!(printed.contains("Top"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(build_pdf_tree(&dir.path().join("none.pdf"), dir.path()).is_err());
    }
}
