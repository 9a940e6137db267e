//! Path primitives for edge rendering

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::types::Position;

/// One SVG path command
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PathCommand {
    MoveTo { to: Position },
    LineTo { to: Position },
    /// Quadratic curve through `control`
    QuadTo { control: Position, to: Position },
}

impl PathCommand {
    pub fn end(&self) -> Position {
        match self {
            Self::MoveTo { to } | Self::LineTo { to } | Self::QuadTo { to, .. } => *to,
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        let shift = |p: &mut Position| {
            p.x += dx;
            p.y += dy;
        };
        match self {
            Self::MoveTo { to } | Self::LineTo { to } => shift(to),
            Self::QuadTo { control, to } => {
                shift(control);
                shift(to);
            }
        }
    }
}

/// Render commands as an SVG path `d` attribute
pub fn to_svg(commands: &[PathCommand]) -> String {
    let mut out = String::new();
    for (i, command) in commands.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        // Writing into a String cannot fail.
        let _ = match command {
            PathCommand::MoveTo { to } => write!(out, "M{},{}", to.x, to.y),
            PathCommand::LineTo { to } => write!(out, "L{},{}", to.x, to.y),
            PathCommand::QuadTo { control, to } => {
                write!(out, "Q{},{} {},{}", control.x, control.y, to.x, to.y)
            }
        };
    }
    out
}

/// Shift every point of a path
pub fn translate(commands: &mut [PathCommand], dx: f64, dy: f64) {
    for command in commands {
        command.translate(dx, dy);
    }
}

fn distance(a: Position, b: Position) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Point `length` away from `from` towards `to`
fn toward(from: Position, to: Position, length: f64) -> Position {
    let d = distance(from, to);
    if d == 0.0 {
        return from;
    }
    Position::new(from.x + (to.x - from.x) * length / d, from.y + (to.y - from.y) * length / d)
}

/// Polyline through `points` with every corner rounded by up to `radius`
///
/// The bend at a corner never exceeds half of either adjacent segment, so
/// short segments stay connected.
pub fn rounded_polyline(points: &[Position], radius: f64) -> Vec<PathCommand> {
    let mut points: Vec<Position> = points.to_vec();
    points.dedup();
    let Some((&first, rest)) = points.split_first() else {
        return Vec::new();
    };
    let mut commands = vec![PathCommand::MoveTo { to: first }];
    if rest.is_empty() {
        return commands;
    }

    for window in points.windows(3) {
        let (a, b, c) = (window[0], window[1], window[2]);
        let straight = (a.x == b.x && b.x == c.x) || (a.y == b.y && b.y == c.y);
        if straight {
            commands.push(PathCommand::LineTo { to: b });
            continue;
        }
        let bend = (distance(a, b) / 2.0).min(distance(b, c) / 2.0).min(radius);
        commands.push(PathCommand::LineTo {
            to: toward(b, a, bend),
        });
        commands.push(PathCommand::QuadTo {
            control: b,
            to: toward(b, c, bend),
        });
    }
    if let Some(&last) = points.last() {
        commands.push(PathCommand::LineTo { to: last });
    }
    commands
}
