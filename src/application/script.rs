//! Pointer scripts for driving the editor without a window
//!
//! One command per line, coordinates in view space:
//!
//! ```text
//! # comment
//! down 0 0         press the primary button
//! ctrl-down 40 0   press with the create-child modifier
//! move 50 0        move, keeping the button state
//! up 50 0          release
//! wait 30          repeat the last input for 30 frames
//! ```

use kurbo::Point;
use tracing::debug;

use crate::application::services::{Editor, FrameReport};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::PointerInput;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptStep {
    Down { at: Point, modifier: bool },
    Move(Point),
    Up(Point),
    Wait(u32),
}

pub fn parse_script(text: &str) -> ApplicationResult<Vec<ScriptStep>> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| parse_step(line_no, line))
        .collect()
}

fn parse_step(line_no: usize, line: &str) -> ApplicationResult<ScriptStep> {
    let invalid = |reason: String| ApplicationError::Script {
        line: line_no,
        reason,
    };
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let point = || -> ApplicationResult<Point> {
        let [x, y] = args.as_slice() else {
            return Err(invalid(format!("`{command}` expects X Y")));
        };
        let x: f64 = x
            .parse()
            .map_err(|_| invalid(format!("invalid coordinate `{x}`")))?;
        let y: f64 = y
            .parse()
            .map_err(|_| invalid(format!("invalid coordinate `{y}`")))?;
        Ok(Point::new(x, y))
    };

    match command {
        "down" => Ok(ScriptStep::Down {
            at: point()?,
            modifier: false,
        }),
        "ctrl-down" => Ok(ScriptStep::Down {
            at: point()?,
            modifier: true,
        }),
        "move" => Ok(ScriptStep::Move(point()?)),
        "up" => Ok(ScriptStep::Up(point()?)),
        "wait" => {
            let [frames] = args.as_slice() else {
                return Err(invalid("`wait` expects a frame count".into()));
            };
            frames
                .parse()
                .map(ScriptStep::Wait)
                .map_err(|_| invalid(format!("invalid frame count `{frames}`")))
        }
        other => Err(invalid(format!("unknown command `{other}`"))),
    }
}

/// Feeds `steps` to the editor, one fixed-step frame per pointer command and
/// `N` frames per `wait N`. Returns the report of every frame.
pub fn replay(editor: &mut Editor, steps: &[ScriptStep]) -> ApplicationResult<Vec<FrameReport>> {
    let mut input = PointerInput::up(Point::ORIGIN);
    let mut reports = Vec::new();

    for step in steps {
        let frames = match *step {
            ScriptStep::Down { at, modifier } => {
                input = PointerInput {
                    primary_down: true,
                    modifier,
                    position: at,
                };
                1
            }
            ScriptStep::Move(at) => {
                input.position = at;
                1
            }
            ScriptStep::Up(at) => {
                input = PointerInput::up(at);
                1
            }
            ScriptStep::Wait(frames) => frames,
        };
        debug!("{step:?}");
        for _ in 0..frames {
            reports.push(editor.tick(input, None)?);
        }
    }
    Ok(reports)
}
