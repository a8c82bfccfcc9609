//! Comment validation and thread assembly.

use std::collections::{HashMap, HashSet};

use civic_common::{AppError, AppResult};
use civic_db::entities::comment;

/// Longest accepted comment, in characters.
pub const MAX_COMMENT_LENGTH: usize = 5000;

/// Lookup result for the comment a new comment replies to.
#[derive(Debug, Clone, Copy)]
pub enum ParentRef<'a> {
    /// Top-level comment.
    None,
    Found(&'a comment::Model),
    /// A parent was named but does not exist.
    Missing,
}

/// Check a new comment and return its trimmed content.
pub fn validate_comment(
    post_id: &str,
    is_locked: bool,
    content: &str,
    parent: ParentRef<'_>,
) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation(
            "Comment content cannot be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(AppError::Validation(format!(
            "Comment is too long (max {MAX_COMMENT_LENGTH} characters)"
        )));
    }

    if is_locked {
        return Err(AppError::Forbidden("Post is locked".to_string()));
    }

    match parent {
        ParentRef::None => {}
        ParentRef::Found(parent) if parent.post_id == post_id => {}
        ParentRef::Found(_) | ParentRef::Missing => {
            return Err(AppError::NotFound("Parent comment not found".to_string()));
        }
    }

    Ok(content.to_string())
}

/// A comment with its replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode<T> {
    pub item: T,
    pub replies: Vec<ThreadNode<T>>,
}

/// Nest a flat comment list under its parents.
///
/// Input order is kept at every level, so an oldest-first list gives an
/// oldest-first tree. Items whose parent is not in the list are treated as
/// top-level.
pub fn build_tree<T, I, P>(items: Vec<T>, id_of: I, parent_of: P) -> Vec<ThreadNode<T>>
where
    I: Fn(&T) -> &str,
    P: Fn(&T) -> Option<&str>,
{
    let known: HashSet<String> = items.iter().map(|item| id_of(item).to_string()).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        match parent_of(item).filter(|parent| known.contains(*parent)) {
            Some(parent) => children.entry(parent.to_string()).or_default().push(index),
            None => roots.push(index),
        }
    }

    let ids: Vec<String> = items.iter().map(|item| id_of(item).to_string()).collect();
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();

    roots
        .into_iter()
        .filter_map(|index| attach(index, &ids, &children, &mut slots))
        .collect()
}

fn attach<T>(
    index: usize,
    ids: &[String],
    children: &HashMap<String, Vec<usize>>,
    slots: &mut [Option<T>],
) -> Option<ThreadNode<T>> {
    // Taking the slot also guards against parent cycles
    let item = slots.get_mut(index)?.take()?;
    let replies = children
        .get(&ids[index])
        .map(|indices| {
            indices
                .iter()
                .filter_map(|child| attach(*child, ids, children, slots))
                .collect()
        })
        .unwrap_or_default();

    Some(ThreadNode { item, replies })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment(id: &str, post_id: &str, parent_id: Option<&str>) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            post_id: post_id.to_string(),
            author_id: "u1".to_string(),
            parent_id: parent_id.map(str::to_string),
            content: format!("comment {id}"),
            upvotes: 0,
            downvotes: 0,
            score: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_comment_trims() {
        let content = validate_comment("p1", false, "  hello  ", ParentRef::None).unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn test_validate_comment_rejections() {
        assert!(matches!(
            validate_comment("p1", false, "   ", ParentRef::None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_comment("p1", true, "hi", ParentRef::None),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            validate_comment("p1", false, "hi", ParentRef::Missing),
            Err(AppError::NotFound(_))
        ));

        let too_long = "a".repeat(MAX_COMMENT_LENGTH + 1);
        assert!(matches!(
            validate_comment("p1", false, &too_long, ParentRef::None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_parent_on_other_post_is_not_found() {
        let parent = comment("c1", "p2", None);
        assert!(matches!(
            validate_comment("p1", false, "hi", ParentRef::Found(&parent)),
            Err(AppError::NotFound(_))
        ));

        let parent = comment("c1", "p1", None);
        assert!(validate_comment("p1", false, "hi", ParentRef::Found(&parent)).is_ok());
    }

    #[test]
    fn test_build_tree_nests_replies_in_order() {
        let comments = vec![
            comment("c1", "p1", None),
            comment("c2", "p1", Some("c1")),
            comment("c3", "p1", None),
            comment("c4", "p1", Some("c2")),
            comment("c5", "p1", Some("c1")),
        ];

        let tree = build_tree(comments, |c| c.id.as_str(), |c| c.parent_id.as_deref());

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].item.id, "c1");
        assert_eq!(tree[1].item.id, "c3");

        let replies: Vec<&str> = tree[0].replies.iter().map(|n| n.item.id.as_str()).collect();
        assert_eq!(replies, vec!["c2", "c5"]);
        assert_eq!(tree[0].replies[0].replies[0].item.id, "c4");
    }

    #[test]
    fn test_build_tree_promotes_orphans() {
        let comments = vec![comment("c1", "p1", Some("gone")), comment("c2", "p1", None)];

        let tree = build_tree(comments, |c| c.id.as_str(), |c| c.parent_id.as_deref());

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].item.id, "c1");
    }
}
