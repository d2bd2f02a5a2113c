//! Unified-diff parsing.
//!
//! Converts a unified-diff text block into an ordered list of file
//! operations carrying the reconstructed post-image. The post-image is
//! what the patch-materialization protocol turns into blobs; removed
//! lines and the "no newline at end of file" marker are dropped.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("diff block {0} has no target path")]
    MissingPath(usize),
    #[error("patch contains no diff blocks")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Add,
    Modify,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOperation {
    pub path: String,
    pub action: FileAction,
    /// Reconstructed post-image; `None` for deletes.
    pub content: Option<String>,
}

#[derive(Default)]
struct Block {
    minus_path: Option<String>,
    plus_path: Option<String>,
    is_new: bool,
    is_delete: bool,
    lines: Vec<String>,
}

impl Block {
    fn finish(self, index: usize) -> Result<FileOperation, PatchError> {
        let action = if self.is_new {
            FileAction::Add
        } else if self.is_delete {
            FileAction::Delete
        } else {
            FileAction::Modify
        };

        // Deletes have no `+++` path; recover it from the paired `---`.
        let path = self
            .plus_path
            .or(self.minus_path)
            .ok_or(PatchError::MissingPath(index))?;

        let content = match action {
            FileAction::Delete => None,
            _ => Some(self.lines.join("\n")),
        };

        Ok(FileOperation {
            path,
            action,
            content,
        })
    }
}

/// Strip the `a/` or `b/` prefix from a diff header path; `/dev/null`
/// contributes no path.
fn header_path(raw: &str, prefix: &str) -> Option<String> {
    let raw = raw.trim();
    if raw == "/dev/null" {
        return None;
    }
    Some(
        raw.strip_prefix(prefix)
            .unwrap_or(raw)
            .to_string(),
    )
}

/// Parse a unified diff into ordered file operations.
pub fn parse_patch(patch: &str) -> Result<Vec<FileOperation>, PatchError> {
    let mut operations = Vec::new();
    let mut current: Option<Block> = None;
    let mut in_hunk = false;

    for line in patch.lines() {
        if line.starts_with("diff --git ") {
            if let Some(block) = current.take() {
                operations.push(block.finish(operations.len())?);
            }
            current = Some(Block::default());
            in_hunk = false;
            continue;
        }

        let Some(block) = current.as_mut() else {
            continue;
        };

        if line.starts_with("@@") {
            in_hunk = true;
            continue;
        }

        if in_hunk {
            if let Some(text) = line.strip_prefix('+') {
                block.lines.push(text.to_string());
            } else if let Some(text) = line.strip_prefix(' ') {
                block.lines.push(text.to_string());
            } else if line.starts_with('-') || line.starts_with('\\') {
                // Removed lines and "\ No newline at end of file" are dropped.
            } else if line.is_empty() {
                // Some producers emit bare empty lines for empty context.
                block.lines.push(String::new());
            }
            continue;
        }

        if line.starts_with("new file mode") {
            block.is_new = true;
        } else if line.starts_with("deleted file mode") {
            block.is_delete = true;
        } else if let Some(raw) = line.strip_prefix("--- ") {
            block.minus_path = header_path(raw, "a/");
        } else if let Some(raw) = line.strip_prefix("+++ ") {
            block.plus_path = header_path(raw, "b/");
        }
        // index lines, mode lines, and similarity scores are ignored.
    }

    if let Some(block) = current.take() {
        operations.push(block.finish(operations.len())?);
    }

    if operations.is_empty() {
        return Err(PatchError::Empty);
    }
    Ok(operations)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD_PATCH: &str = "\
diff --git a/a.txt b/a.txt
new file mode 100644
index 0000000..abcdef0
--- /dev/null
+++ b/a.txt
@@ -0,0 +1,2 @@
+x
+y
";

    const DELETE_PATCH: &str = "\
diff --git a/b.txt b/b.txt
deleted file mode 100644
index abcdef0..0000000
--- a/b.txt
+++ /dev/null
@@ -1,2 +0,0 @@
-old
-lines
";

    const MODIFY_PATCH: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
index 1111111..2222222 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,3 @@
 fn main() {
-    println!(\"old\");
+    println!(\"new\");
 }
\\ No newline at end of file
";

    #[test]
    fn add_reconstructs_post_image() {
        let ops = parse_patch(ADD_PATCH).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path, "a.txt");
        assert_eq!(ops[0].action, FileAction::Add);
        assert_eq!(ops[0].content.as_deref(), Some("x\ny"));
    }

    #[test]
    fn delete_recovers_path_from_minus_header() {
        let ops = parse_patch(DELETE_PATCH).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path, "b.txt");
        assert_eq!(ops[0].action, FileAction::Delete);
        assert_eq!(ops[0].content, None);
    }

    #[test]
    fn modify_keeps_context_and_added_lines_in_order() {
        let ops = parse_patch(MODIFY_PATCH).unwrap();
        assert_eq!(ops[0].action, FileAction::Modify);
        assert_eq!(ops[0].path, "src/lib.rs");
        assert_eq!(
            ops[0].content.as_deref(),
            Some("fn main() {\n    println!(\"new\");\n}")
        );
    }

    #[test]
    fn multiple_blocks_stay_in_file_order() {
        let patch = format!("{}{}", ADD_PATCH, DELETE_PATCH);
        let ops = parse_patch(&patch).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].path, "a.txt");
        assert_eq!(ops[1].path, "b.txt");
    }

    #[test]
    fn multi_hunk_content_concatenates() {
        let patch = "\
diff --git a/notes.md b/notes.md
index 1111111..2222222 100644
--- a/notes.md
+++ b/notes.md
@@ -1,2 +1,2 @@
 alpha
+beta
@@ -10,2 +11,2 @@
 gamma
+delta
";
        let ops = parse_patch(patch).unwrap();
        assert_eq!(
            ops[0].content.as_deref(),
            Some("alpha\nbeta\ngamma\ndelta")
        );
    }

    #[test]
    fn empty_patch_is_an_error() {
        assert_eq!(parse_patch(""), Err(PatchError::Empty));
        assert_eq!(parse_patch("not a diff at all"), Err(PatchError::Empty));
    }

    #[test]
    fn block_without_paths_is_an_error() {
        let patch = "diff --git a/x b/x\nnew file mode 100644\n";
        assert_eq!(parse_patch(patch), Err(PatchError::MissingPath(0)));
    }
}
