//! Series (depth) extension: exactly one child per invocation, optionally
//! recursed once more to produce a layer-2 node (cap 2 per layer-1 parent).

use crate::error::BuilderResult;
use crate::types::{Branch, Query, TreeNode};

use super::{ExtensionContext, build_extension};

/// Grows a single depth extension from `parent` using one of its essential
/// keywords.
pub struct SeriesExtender<'a> {
    ctx: ExtensionContext<'a>,
}

impl<'a> SeriesExtender<'a> {
    pub fn new(ctx: ExtensionContext<'a>) -> Self {
        Self { ctx }
    }

    /// Build a single series child node for `target_keyword`.
    pub async fn extend(
        &self,
        parent: &Query,
        target_keyword: &str,
        ancestors: &[&Query],
        path: &[&Query],
    ) -> BuilderResult<TreeNode> {
        let child = build_extension(&self.ctx, Branch::Series, parent, target_keyword, ancestors, path).await?;
        Ok(TreeNode::new_child(child, Branch::Series, parent.id.clone()))
    }
}
