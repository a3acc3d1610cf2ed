//! Parallel (breadth) extension: one child per essential keyword of the
//! parent, up to a configurable breadth cap.

use crate::error::BuilderResult;
use crate::types::{Branch, Query, TreeNode};

use super::{ExtensionContext, build_extension};

/// Grows sibling breadth extensions from `parent`, one per essential
/// keyword, bounded by `tree_config.breadth_cap_parallel`.
pub struct ParallelExtender<'a> {
    ctx: ExtensionContext<'a>,
}

impl<'a> ParallelExtender<'a> {
    pub fn new(ctx: ExtensionContext<'a>) -> Self {
        Self { ctx }
    }

    /// Build up to the breadth cap's worth of sibling nodes for `parent`.
    /// Keywords that fail their regeneration budget are skipped, not fatal.
    pub async fn extend_all(&self, parent: &Query, ancestors: &[&Query], path: &[&Query]) -> BuilderResult<Vec<TreeNode>> {
        let mut children = Vec::new();
        let mut accepted_keywords: Vec<&str> = Vec::new();

        for keyword in parent.essential_keywords().take(self.ctx.tree_config.breadth_cap_parallel) {
            match build_extension(&self.ctx, Branch::Parallel, parent, &keyword.text, ancestors, path).await {
                Ok(child) => {
                    accepted_keywords.push(&keyword.text);
                    children.push(TreeNode::new_child(child, Branch::Parallel, parent.id.clone()));
                }
                Err(err) => {
                    tracing::debug!(keyword = %keyword.text, "parallel extension skipped: {err}");
                }
            }
        }

        Ok(children)
    }
}
