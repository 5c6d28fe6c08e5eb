//! Tests for the topic tree and its traversal passes

use std::collections::HashMap;
use std::sync::Arc;

use kurbo::Point;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use treenote::application::services::NoteService;
use treenote::config::Settings;
use treenote::domain::{NodeId, Pass, TopicTree};
use treenote::infrastructure::traits::RealFileSystem;

/// Tree with `depth` levels below the root and `branching` children per node.
fn build_tree(depth: usize, branching: usize) -> TopicTree {
    let mut tree = TopicTree::default();
    let mut frontier = vec![tree.root()];
    let mut counter = 0;
    for _ in 0..depth {
        let mut next = Vec::new();
        for parent in frontier {
            for _ in 0..branching {
                counter += 1;
                let id = tree
                    .insert_child(parent, &format!("t{counter}"), Point::new(counter as f64, 0.0))
                    .unwrap();
                next.push(id);
            }
        }
        frontier = next;
    }
    tree
}

#[fixture]
fn wide_tree() -> TopicTree {
    build_tree(3, 3)
}

// ============================================================
// Traversal passes
// ============================================================

#[rstest]
#[case(1, 1)]
#[case(2, 4)]
#[case(4, 2)]
#[case(6, 1)]
fn given_overlapping_roots_in_one_pass_when_traversing_then_each_node_fires_once(
    #[case] depth: usize,
    #[case] branching: usize,
) {
    // Arrange
    let mut tree = build_tree(depth, branching);
    let root = tree.root();
    let all: Vec<NodeId> = tree.iter().map(|(id, _)| id).collect();
    let mut fired: HashMap<NodeId, usize> = HashMap::new();
    let mut pass = Pass::new();

    // Act: every subtree first, then the whole tree, then every subtree again
    for &id in &all {
        tree.apply_to_subtree(&mut pass, id, |id, _| *fired.entry(id).or_default() += 1);
    }
    tree.apply_to_descendants(&mut pass, root, |id, _| *fired.entry(id).or_default() += 1);
    for &id in all.iter().rev() {
        tree.apply_to_subtree(&mut pass, id, |id, _| *fired.entry(id).or_default() += 1);
    }

    // Assert
    assert_eq!(fired.len(), all.len());
    assert!(fired.values().all(|&count| count == 1));
}

#[rstest]
fn given_drag_pass_first_when_sweeping_in_same_pass_then_sweep_skips_dragged_subtree(
    mut wide_tree: TopicTree,
) {
    // Arrange
    let root = wide_tree.root();
    let dragged = wide_tree.children(root)[1];
    let below: Vec<NodeId> = wide_tree.iter_below(dragged).map(|(id, _)| id).collect();
    let mut pass = Pass::new();

    // Act
    wide_tree.apply_to_subtree(&mut pass, dragged, |_, node| node.move_to(Point::new(-1.0, -1.0)));
    wide_tree.apply_to_descendants(&mut pass, root, |_, node| node.move_to(Point::new(9.0, 9.0)));

    // Assert: first caller wins
    assert_eq!(wide_tree.get(dragged).unwrap().desired, Point::new(-1.0, -1.0));
    for id in below {
        assert_eq!(wide_tree.get(id).unwrap().desired, Point::new(-1.0, -1.0));
    }
    let other = wide_tree.children(root)[0];
    assert_eq!(wide_tree.get(other).unwrap().desired, Point::new(9.0, 9.0));
}

#[rstest]
fn given_preorder_iteration_when_listing_then_parents_precede_children(wide_tree: TopicTree) {
    let names: Vec<String> = wide_tree.iter().map(|(_, n)| n.name.clone()).collect();

    assert_eq!(names.len(), 3 + 9 + 27);
    assert_eq!(&names[..5], ["t1", "t4", "t13", "t14", "t15"]);
}

// ============================================================
// Hit testing
// ============================================================

#[test]
fn given_parent_fully_containing_child_when_hit_testing_inside_both_then_parent_returned() {
    // Arrange
    let mut tree = TopicTree::default();
    let root = tree.root();
    let parent = tree.insert_child(root, "parent", Point::new(10.0, 10.0)).unwrap();
    let child = tree.insert_child(parent, "child", Point::new(12.0, 10.0)).unwrap();
    assert!(tree.get(child).unwrap().radius < tree.get(parent).unwrap().radius);

    // Act & Assert
    assert_eq!(tree.hit_test(Point::new(13.0, 10.0)), Some(parent));
}

#[test]
fn given_overlapping_siblings_when_hit_testing_then_first_in_list_order_wins() {
    let mut tree = TopicTree::default();
    let root = tree.root();
    let first = tree.insert_child(root, "first", Point::ORIGIN).unwrap();
    let _second = tree.insert_child(root, "second", Point::new(5.0, 0.0)).unwrap();

    assert_eq!(tree.hit_test(Point::new(3.0, 0.0)), Some(first));
}

#[test]
fn given_boundary_point_when_hit_testing_then_miss() {
    let mut tree = TopicTree::default();
    let root = tree.root();
    tree.insert_child(root, "a", Point::ORIGIN).unwrap();

    assert_eq!(tree.hit_test(Point::new(15.0, 0.0)), None);
}

// ============================================================
// Child creation against real notes
// ============================================================

#[test]
fn given_persisted_notes_when_creating_three_children_then_numeric_suffixes_probed() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let settings = Arc::new(Settings {
        workspace: temp.path().to_path_buf(),
        ..Settings::default()
    });
    let notes = NoteService::new(Arc::new(RealFileSystem), settings);
    let mut tree = TopicTree::default();
    let root = tree.root();
    let x = tree.insert_child(root, "X", Point::ORIGIN).unwrap();

    // Act
    let mut names = Vec::new();
    for _ in 0..3 {
        let id = tree.create_child(x, Point::ORIGIN, notes.exists_fn()).unwrap();
        let name = tree.get(id).unwrap().name.clone();
        notes.ensure_note(&name).unwrap();
        names.push(name);
    }

    // Assert
    assert_eq!(names, ["Xsubtopic", "Xsubtopic1", "Xsubtopic2"]);
    assert_eq!(tree.children(x).len(), 3);
    assert!(tree
        .children(x)
        .iter()
        .all(|&id| (tree.get(id).unwrap().radius - 12.0).abs() < 1e-9));
}

#[test]
fn given_root_children_when_created_then_receive_base_size() {
    let mut tree = TopicTree::default();
    let root = tree.root();

    let id = tree.create_child(root, Point::ORIGIN, |_| false).unwrap();

    assert_eq!(tree.get(id).unwrap().name, "mastersubtopic");
    assert_eq!(tree.get(id).unwrap().radius, 15.0);
}

// ============================================================
// Deletion sweep
// ============================================================

#[rstest]
#[case("delete")]
#[case("Delete")]
#[case("DEL")]
#[case("del")]
fn given_delete_keyword_child_when_sweeping_then_subtree_removed(#[case] keyword: &str) {
    // Arrange
    let mut tree = TopicTree::default();
    let root = tree.root();
    let a = tree.insert_child(root, "a", Point::ORIGIN).unwrap();
    let marked = tree.insert_child(a, keyword, Point::ORIGIN).unwrap();
    let below = tree.insert_child(marked, "below", Point::ORIGIN).unwrap();

    // Act
    let removed = tree.sweep_deletions();

    // Assert
    assert_eq!(removed, [keyword]);
    assert!(!tree.contains(marked));
    assert!(!tree.contains(below));
    assert!(tree.children(a).is_empty());
}

#[test]
fn given_marked_children_under_different_parents_when_sweeping_then_one_each() {
    let mut tree = TopicTree::default();
    let root = tree.root();
    let a = tree.insert_child(root, "a", Point::ORIGIN).unwrap();
    let b = tree.insert_child(root, "b", Point::ORIGIN).unwrap();
    tree.insert_child(a, "del", Point::ORIGIN).unwrap();
    tree.insert_child(b, "delete", Point::ORIGIN).unwrap();

    assert_eq!(tree.sweep_deletions().len(), 2);
    assert_eq!(tree.len(), 2);
}

#[test]
fn given_marked_root_child_when_sweeping_then_removed() {
    let mut tree = TopicTree::default();
    let root = tree.root();
    tree.insert_child(root, "delete", Point::ORIGIN).unwrap();

    assert_eq!(tree.sweep_deletions(), ["delete"]);
    assert!(tree.is_empty());
}
