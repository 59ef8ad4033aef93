//! Tests for branch nesting and removal rules

use branch_core::{BranchError, Workspace, MAX_DEPTH};

#[test]
fn depth_grows_by_one_per_hop_and_stops_at_limit() {
    let mut workspace = Workspace::new();
    let mut current = workspace.open_branch("level one");
    assert_eq!(workspace.node(current).unwrap().depth, 1);

    for expected in 2..=MAX_DEPTH {
        current = workspace.open_child_branch(current, "deeper").unwrap();
        assert_eq!(workspace.node(current).unwrap().depth, expected);
    }

    let before = workspace.tree().len();
    let err = workspace.open_child_branch(current, "too deep").unwrap_err();
    assert_eq!(err, BranchError::DepthExceeded { depth: MAX_DEPTH });
    assert_eq!(workspace.tree().len(), before);
    assert!(workspace
        .tree()
        .nodes()
        .iter()
        .all(|node| node.depth <= MAX_DEPTH));
}

#[test]
fn siblings_each_hit_the_cap_independently() {
    let mut workspace = Workspace::new();
    let root = workspace.open_branch("root");
    let a = workspace.open_child_branch(root, "a").unwrap();
    let b = workspace.open_child_branch(root, "b").unwrap();

    let a3 = workspace.open_child_branch(a, "a3").unwrap();
    let b3 = workspace.open_child_branch(b, "b3").unwrap();

    assert!(workspace.open_child_branch(a3, "x").is_err());
    assert!(workspace.open_child_branch(b3, "y").is_err());
    assert_eq!(workspace.tree().child_count(root), 2);
}

#[test]
fn close_with_live_children_fails_until_children_are_gone() {
    let mut workspace = Workspace::new();
    let root = workspace.open_branch("root");
    let child = workspace.open_child_branch(root, "child").unwrap();
    let snapshot = workspace.clone();

    let err = workspace.close_branch(root).unwrap_err();
    assert_eq!(err, BranchError::HasLiveChildren { children: 1 });
    assert_eq!(workspace, snapshot);

    workspace.close_branch(child).unwrap();
    workspace.close_branch(root).unwrap();
    assert!(workspace.tree().is_empty());
}

#[test]
fn merge_with_live_children_fails_and_leaves_tree_unchanged() {
    let mut workspace = Workspace::new();
    let root = workspace.open_branch("root");
    workspace.begin_branch_send(root, "question").unwrap();
    workspace.apply_branch_update(root, "answer");
    workspace.finish_branch_send(root, Ok(()));
    let child = workspace.open_child_branch(root, "child").unwrap();
    let snapshot = workspace.clone();

    let err = workspace.begin_merge(root).unwrap_err();
    assert_eq!(err, BranchError::HasLiveChildren { children: 1 });
    assert_eq!(workspace, snapshot);

    workspace.close_branch(child).unwrap();
    assert!(workspace.begin_merge(root).is_ok());
}

#[test]
fn busy_node_cannot_be_closed_or_sent_to_again() {
    let mut workspace = Workspace::new();
    let id = workspace.open_branch("anchor");
    workspace.begin_branch_send(id, "first").unwrap();

    assert!(matches!(
        workspace.close_branch(id),
        Err(BranchError::Busy(_))
    ));
    assert!(matches!(
        workspace.begin_branch_send(id, "second"),
        Err(BranchError::Busy(_))
    ));
    assert!(matches!(workspace.begin_merge(id), Err(BranchError::Busy(_))));
    assert_eq!(workspace.node(id).unwrap().turns.len(), 2);
}

#[test]
fn blank_send_is_rejected_without_touching_the_node() {
    let mut workspace = Workspace::new();
    let id = workspace.open_branch("anchor");
    let snapshot = workspace.clone();

    assert_eq!(
        workspace.begin_branch_send(id, "   \n\t").unwrap_err(),
        BranchError::EmptyInput
    );
    assert_eq!(workspace, snapshot);
}

#[test]
fn failed_send_marks_error_and_allows_retry() {
    let mut workspace = Workspace::new();
    let id = workspace.open_branch("anchor");
    workspace.begin_branch_send(id, "q").unwrap();
    workspace.apply_branch_update(id, "partial");
    workspace.finish_branch_send(id, Err(BranchError::remote("upstream timed out")));

    let node = workspace.node(id).unwrap();
    assert_eq!(node.status, branch_core::NodeStatus::Error);
    assert_eq!(node.turns.entries()[1].content, "Error: upstream timed out");

    assert!(workspace.begin_branch_send(id, "retry").is_ok());
}
