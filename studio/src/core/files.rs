//! The persisted tree of generated files.

use serde::{Deserialize, Serialize};

use crate::core::artifact::{Artifact, DEFAULT_LANGUAGE};
use crate::core::templates::TemplateKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

impl FileNode {
    pub fn folder(name: impl Into<String>, children: Vec<FileNode>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Folder,
            language: None,
            content: None,
            is_new: false,
            children: Some(children),
        }
    }

    pub fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            name: artifact.name.clone(),
            kind: NodeKind::File,
            language: Some(artifact.language.clone()),
            content: Some(artifact.content.clone()),
            is_new: artifact.is_new,
            children: None,
        }
    }

    /// View a file node as an artifact. Folders yield `None`.
    pub fn to_artifact(&self) -> Option<Artifact> {
        if self.kind != NodeKind::File {
            return None;
        }
        Some(Artifact {
            name: self.name.clone(),
            language: self
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            content: self.content.clone().unwrap_or_default(),
            is_new: self.is_new,
        })
    }
}

/// Top-level nodes of the file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTree {
    roots: Vec<FileNode>,
}

impl Default for FileTree {
    /// A `src` folder holding the generic placeholder component.
    fn default() -> Self {
        let template = TemplateKind::Generic.template();
        let mut placeholder =
            FileNode::from_artifact(&Artifact::generated(template.filename, template.content));
        placeholder.is_new = false;
        Self {
            roots: vec![FileNode::folder("src", vec![placeholder])],
        }
    }
}

impl FileTree {
    pub fn new(roots: Vec<FileNode>) -> Self {
        Self { roots }
    }

    /// Insert a generated artifact into the first folder, replacing a file of the same name.
    ///
    /// Without any top-level folder the file is placed at the top level.
    pub fn upsert(&mut self, artifact: &Artifact) {
        let node = FileNode::from_artifact(artifact);
        let first_is_folder = self
            .roots
            .first()
            .is_some_and(|root| root.children.is_some());
        let siblings = if first_is_folder {
            self.roots[0].children.get_or_insert_with(Vec::new)
        } else {
            &mut self.roots
        };
        siblings.retain(|f| f.name != node.name);
        siblings.push(node);
    }

    /// Replace the content of every file named `name`. Returns whether any matched.
    pub fn replace_content(&mut self, name: &str, content: &str) -> bool {
        fn walk(nodes: &mut [FileNode], name: &str, content: &str) -> bool {
            let mut matched = false;
            for node in nodes {
                if node.kind == NodeKind::File && node.name == name {
                    node.content = Some(content.to_string());
                    matched = true;
                }
                if let Some(children) = node.children.as_mut() {
                    matched |= walk(children, name, content);
                }
            }
            matched
        }
        walk(&mut self.roots, name, content)
    }

    /// First file named `name`, depth-first.
    pub fn find_file(&self, name: &str) -> Option<&FileNode> {
        fn walk<'a>(nodes: &'a [FileNode], name: &str) -> Option<&'a FileNode> {
            nodes.iter().find_map(|node| {
                if node.kind == NodeKind::File && node.name == name {
                    return Some(node);
                }
                node.children
                    .as_deref()
                    .and_then(|children| walk(children, name))
            })
        }
        walk(&self.roots, name)
    }

    /// Slash-separated paths of every file, depth-first.
    pub fn file_paths(&self) -> Vec<String> {
        fn walk(nodes: &[FileNode], prefix: &str, out: &mut Vec<String>) {
            for node in nodes {
                let path = if prefix.is_empty() {
                    node.name.clone()
                } else {
                    format!("{prefix}/{}", node.name)
                };
                match (&node.kind, &node.children) {
                    (NodeKind::Folder, Some(children)) => walk(children, &path, out),
                    (NodeKind::Folder, None) => {}
                    (NodeKind::File, _) => out.push(path),
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.roots, "", &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tree_holds_placeholder_component() {
        let tree = FileTree::default();
        assert_eq!(tree.file_paths(), vec!["src/Component.tsx".to_string()]);
        let node = tree.find_file("Component.tsx").expect("placeholder");
        assert!(!node.is_new);
    }

    #[test]
    fn upsert_replaces_same_named_file_in_first_folder() {
        let mut tree = FileTree::default();
        tree.upsert(&Artifact::generated("Calculator.tsx", "one"));
        tree.upsert(&Artifact::generated("Calculator.tsx", "two"));
        assert_eq!(
            tree.file_paths(),
            vec![
                "src/Component.tsx".to_string(),
                "src/Calculator.tsx".to_string()
            ]
        );
        let node = tree.find_file("Calculator.tsx").expect("file");
        assert_eq!(node.content.as_deref(), Some("two"));
        assert!(node.is_new);
    }

    #[test]
    fn upsert_without_folder_uses_top_level() {
        let mut tree = FileTree::new(Vec::new());
        tree.upsert(&Artifact::generated("A.tsx", "a"));
        assert_eq!(tree.file_paths(), vec!["A.tsx".to_string()]);
    }

    #[test]
    fn replace_content_reports_misses() {
        let mut tree = FileTree::default();
        assert!(tree.replace_content("Component.tsx", "edited"));
        assert!(!tree.replace_content("Missing.tsx", "edited"));
        let artifact = tree
            .find_file("Component.tsx")
            .and_then(FileNode::to_artifact)
            .expect("artifact");
        assert_eq!(artifact.content, "edited");
    }

    #[test]
    fn tree_serializes_with_type_tags() {
        let json = serde_json::to_value(FileTree::default()).expect("json");
        assert_eq!(json[0]["type"], "folder");
        assert_eq!(json[0]["children"][0]["type"], "file");
        let back: FileTree = serde_json::from_value(json).expect("parse");
        assert_eq!(back, FileTree::default());
    }
}
