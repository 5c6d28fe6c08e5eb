//! Session line format.
//!
//! One topic per line, pre-order: `name;x,y;childCount`. The `childCount` lines
//! following a topic (recursively) are its subtrees. The root is not written.

use std::fmt::Write as _;

use kurbo::Point;

use crate::domain::error::DomainError;
use crate::domain::tree::{NodeId, TopicTree, TreeGeometry};

/// Serializes every subtree below the root.
pub fn encode(tree: &TopicTree) -> String {
    let mut out = String::new();
    for (_, node) in tree.iter() {
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{};{},{};{}",
            node.name,
            node.position.x,
            node.position.y,
            node.children.len()
        );
    }
    out
}

/// Rebuilds a tree. Any malformed or missing line fails the whole load.
pub fn decode(text: &str, geometry: TreeGeometry) -> Result<TopicTree, DomainError> {
    let mut tree = TopicTree::new(geometry);
    let root = tree.root();
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();

    // Topics still waiting for child lines, innermost last
    let mut open: Vec<OpenTopic> = Vec::new();
    for &(line_no, text) in &lines {
        let parent = match open.last_mut() {
            Some(topic) => {
                topic.missing -= 1;
                topic.id
            }
            None => root,
        };
        let line = parse_line(line_no, text)?;
        let id = tree.insert_child(parent, &line.name, line.position)?;

        while open.last().is_some_and(|topic| topic.missing == 0) {
            open.pop();
        }
        if line.child_count > 0 {
            open.push(OpenTopic {
                id,
                missing: line.child_count,
            });
        }
    }

    match open.last() {
        Some(topic) => Err(DomainError::TruncatedSession {
            expected: topic.missing,
            line: lines.last().map(|(no, _)| *no).unwrap_or(0),
        }),
        None => Ok(tree),
    }
}

struct OpenTopic {
    id: NodeId,
    missing: usize,
}

/// A parsed session line.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLine {
    pub name: String,
    pub position: Point,
    pub child_count: usize,
}

/// Parses one line. Fields are split from the right, so names may contain `;`.
pub fn parse_line(line_no: usize, text: &str) -> Result<SessionLine, DomainError> {
    let malformed = |reason: &str| DomainError::MalformedSession {
        line: line_no,
        reason: reason.to_string(),
    };

    let mut fields = text.rsplitn(3, ';');
    let (Some(count), Some(position), Some(name)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed("expected `name;x,y;childCount`"));
    };
    if name.is_empty() {
        return Err(malformed("empty topic name"));
    }

    let (x, y) = position
        .split_once(',')
        .ok_or_else(|| malformed("position must be `x,y`"))?;
    let x: f64 = x
        .trim()
        .parse()
        .map_err(|_| malformed(&format!("invalid x coordinate `{x}`")))?;
    let y: f64 = y
        .trim()
        .parse()
        .map_err(|_| malformed(&format!("invalid y coordinate `{y}`")))?;
    let child_count: usize = count
        .trim()
        .parse()
        .map_err(|_| malformed(&format!("invalid child count `{count}`")))?;

    Ok(SessionLine {
        name: name.to_string(),
        position: Point::new(x, y),
        child_count,
    })
}
