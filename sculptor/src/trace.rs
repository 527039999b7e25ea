use derive_more::Display;
use log::error;

use crate::raster::{ColourKey, Point2i, RasterImage};
use base::defs::{Error, ErrorKind::*, Result};

/// Iteration cap guarding every scanning loop against runaway input.
pub const MAX_ITERATIONS: usize = 10000;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Direction {
    LeftRight,
    RightLeft,
    UpDown,
    DownUp,
}

impl Direction {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftRight | Direction::RightLeft)
    }

    /// Unit step along the direction in a bottom-up raster.
    pub fn step(self) -> (i32, i32) {
        match self {
            Direction::LeftRight => (1, 0),
            Direction::RightLeft => (-1, 0),
            Direction::UpDown => (0, -1),
            Direction::DownUp => (0, 1),
        }
    }

    fn is_forward(self) -> bool {
        matches!(self, Direction::LeftRight | Direction::DownUp)
    }
}

/// Raster traversal convention: pixels are visited along `row`, and rows
/// advance along `column`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanOrder {
    pub row: Direction,
    pub column: Direction,
}

impl ScanOrder {
    pub fn new(row: Direction, column: Direction) -> Result<Self> {
        if row.is_horizontal() == column.is_horizontal() {
            let desc = format!("incompatible scan order {}/{}", row, column);
            return Err(Error::new(MalformedData, desc));
        }
        Ok(Self { row, column })
    }

    /// Tells whether pixel `a` lies further than `b` in traversal order.
    fn is_further(&self, a: Point2i, b: Point2i) -> bool {
        let further = |dir: Direction, a: i32, b: i32| {
            if dir.is_forward() {
                a > b
            } else {
                a < b
            }
        };

        if self.row.is_horizontal() {
            further(self.column, a.y, b.y)
                || (a.y == b.y && further(self.row, a.x, b.x))
        } else {
            further(self.column, a.x, b.x)
                || (a.x == b.x && further(self.row, a.y, b.y))
        }
    }
}

/// Finds the first pixel of `colour` in traversal order. The row holding
/// `start` is scanned from `start` on; later rows begin at the image edge.
pub fn detect_colour_pixel(
    image: &RasterImage,
    colour: ColourKey,
    start: Point2i,
    order: ScanOrder,
) -> Option<Point2i> {
    let span = |dir: Direction, from: i32, len: i32| -> Vec<i32> {
        if dir.is_forward() {
            (from.max(0)..len).collect()
        } else {
            (0..=from.min(len - 1)).rev().collect()
        }
    };
    let edge = |dir: Direction, len: i32| {
        if dir.is_forward() {
            0
        } else {
            len - 1
        }
    };

    let horizontal = order.row.is_horizontal();
    let (row_len, column_len) = if horizontal {
        (image.width(), image.height())
    } else {
        (image.height(), image.width())
    };
    let (row_start, column_start) = if horizontal {
        (start.x, start.y)
    } else {
        (start.y, start.x)
    };

    for (i, c) in span(order.column, column_start, column_len)
        .into_iter()
        .enumerate()
    {
        let from = if i == 0 {
            row_start
        } else {
            edge(order.row, row_len)
        };
        for r in span(order.row, from, row_len) {
            let (x, y) = if horizontal { (r, c) } else { (c, r) };
            if image.has_colour(x, y, colour) {
                return Some(Point2i::new(x, y));
            }
        }
    }

    None
}

/// Moore neighbourhood, anti-clockwise starting below the pixel.
const NEIGHBOURS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Heading {
    Right,
    Up,
    Left,
    Down,
}

impl Heading {
    fn from_row(row: Direction) -> Self {
        match row {
            Direction::LeftRight => Heading::Right,
            Direction::DownUp => Heading::Up,
            Direction::RightLeft => Heading::Left,
            Direction::UpDown => Heading::Down,
        }
    }

    fn after_move(neighbour: usize) -> Self {
        match neighbour {
            0 | 1 => Heading::Right,
            2 | 3 => Heading::Up,
            4 | 5 => Heading::Left,
            _ => Heading::Down,
        }
    }

    /// Index into `NEIGHBOURS` where the search for the next pixel begins.
    fn search_start(self) -> usize {
        match self {
            Heading::Right => 6,
            Heading::Up => 0,
            Heading::Left => 2,
            Heading::Down => 4,
        }
    }
}

/// Outcome of a boundary trace.
#[derive(Debug)]
pub struct Trace {
    /// Boundary pixels relative to the image centre, in visiting order.
    pub ring: Vec<Point2i>,
    /// Pixel where the next raster scan should resume.
    pub resume: Point2i,
}

pub fn trace(
    image: &RasterImage,
    colour: ColourKey,
    start: Point2i,
    order: ScanOrder,
) -> Trace {
    trace_limited(image, colour, start, order, MAX_ITERATIONS)
}

fn trace_limited(
    image: &RasterImage,
    colour: ColourKey,
    start: Point2i,
    order: ScanOrder,
    max_steps: usize,
) -> Trace {
    let mut ring = Vec::new();
    let mut current = start;
    let mut last_most = start;
    let mut heading = Heading::from_row(order.row);
    let mut steps = 0;

    loop {
        steps += 1;
        if steps > max_steps {
            error!(
                "boundary trace from ({}, {}) exceeded {} steps",
                start.x, start.y, max_steps
            );
            ring = dedup_first_occurrence(ring);
            break;
        }

        if current == start && steps > 1 {
            break;
        }
        if !image.has_colour(current.x, current.y, colour) {
            break;
        }

        ring.push(image.centred(current.x, current.y));
        if order.is_further(current, last_most) {
            last_most = current;
        }

        let first = heading.search_start();
        let next = (0..NEIGHBOURS.len())
            .map(|i| (first + i) % NEIGHBOURS.len())
            .find(|&i| {
                let (dx, dy) = NEIGHBOURS[i];
                image.has_colour(current.x + dx, current.y + dy, colour)
            });

        match next {
            Some(i) => {
                let (dx, dy) = NEIGHBOURS[i];
                current = Point2i::new(current.x + dx, current.y + dy);
                heading = Heading::after_move(i);
            }
            None => break,
        }
    }

    let (dx, dy) = order.row.step();
    Trace {
        ring,
        resume: Point2i::new(last_most.x + dx, last_most.y + dy),
    }
}

fn dedup_first_occurrence(points: Vec<Point2i>) -> Vec<Point2i> {
    let mut unique: Vec<Point2i> = Vec::with_capacity(points.len());
    for point in points {
        if !unique.contains(&point) {
            unique.push(point);
        }
    }
    unique
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::raster::test_util::*;
    use Direction::*;

    const RED: ColourKey = ColourKey::new(255, 0, 0);

    fn order(row: Direction, column: Direction) -> ScanOrder {
        ScanOrder::new(row, column).unwrap()
    }

    #[test]
    fn test_scan_order_validation() {
        assert!(ScanOrder::new(LeftRight, RightLeft).is_err());
        assert!(ScanOrder::new(UpDown, DownUp).is_err());
        assert!(ScanOrder::new(UpDown, LeftRight).is_ok());
    }

    #[test]
    fn test_detect_colour_pixel() {
        let image = paint(12, 12, RED, &rect(3, 4, 7, 8));
        let origin = Point2i::new(0, 0);
        let corner = Point2i::new(11, 11);

        let found = detect_colour_pixel(&image, RED, origin, order(LeftRight, DownUp));
        assert_eq!(found, Some(Point2i::new(3, 4)));
        let found = detect_colour_pixel(&image, RED, corner, order(RightLeft, UpDown));
        assert_eq!(found, Some(Point2i::new(7, 8)));
        let found = detect_colour_pixel(&image, RED, origin, order(DownUp, LeftRight));
        assert_eq!(found, Some(Point2i::new(3, 4)));
        let found = detect_colour_pixel(&image, RED, corner, order(UpDown, RightLeft));
        assert_eq!(found, Some(Point2i::new(7, 8)));

        let blue = ColourKey::new(0, 0, 255);
        assert_eq!(
            detect_colour_pixel(&image, blue, origin, order(LeftRight, DownUp)),
            None
        );
    }

    #[test]
    fn test_detect_continues_from_start_only_on_first_row() {
        let image = paint(10, 10, RED, &[(1, 2), (6, 3)]);
        let found = detect_colour_pixel(
            &image,
            RED,
            Point2i::new(2, 2),
            order(LeftRight, DownUp),
        );
        assert_eq!(found, Some(Point2i::new(6, 3)));
    }

    #[test]
    fn test_trace_filled_square() {
        let square = rect(3, 4, 7, 8);
        let image = paint(12, 12, RED, &square);

        let cases = [
            (order(LeftRight, DownUp), Point2i::new(3, 4), Point2i::new(8, 8)),
            (order(DownUp, LeftRight), Point2i::new(3, 4), Point2i::new(7, 9)),
            (order(RightLeft, UpDown), Point2i::new(7, 8), Point2i::new(2, 4)),
            (order(UpDown, RightLeft), Point2i::new(7, 8), Point2i::new(3, 3)),
        ];
        for (order, start, resume) in cases {
            let trace = trace(&image, RED, start, order);
            assert_eq!(trace.ring.len(), 16);
            assert_eq!(trace.resume, resume);
            assert!(!square.contains(&(trace.resume.x, trace.resume.y)));
        }
    }

    #[test]
    fn test_trace_ring_is_centred() {
        let image = paint(12, 12, RED, &rect(3, 4, 7, 8));
        let trace = trace(&image, RED, Point2i::new(3, 4), order(DownUp, LeftRight));
        assert_eq!(trace.ring[0], Point2i::new(-3, -2));
    }

    #[test]
    fn test_trace_hollow_ring() {
        let image = paint(12, 12, RED, &hollow_rect(3, 4, 7, 8));
        let order = order(DownUp, LeftRight);

        let trace = trace(&image, RED, Point2i::new(3, 4), order);
        assert_eq!(trace.ring.len(), 16);
        assert_eq!(trace.resume, Point2i::new(7, 9));
        assert_eq!(detect_colour_pixel(&image, RED, trace.resume, order), None);
    }

    #[test]
    fn test_trace_line_walks_both_sides() {
        let image = paint(16, 10, RED, &rect(2, 5, 11, 5));
        let trace = trace(&image, RED, Point2i::new(2, 5), order(LeftRight, DownUp));
        assert_eq!(trace.ring.len(), 18);
        assert_eq!(trace.ring[0], Point2i::new(-6, 0));
    }

    #[test]
    fn test_runaway_trace_keeps_first_visits() {
        let image = paint(16, 10, RED, &rect(2, 5, 11, 5));
        let start = Point2i::new(2, 5);
        let trace = trace_limited(&image, RED, start, order(LeftRight, DownUp), 15);

        let expected: Vec<Point2i> = (-6..=3).map(|x| Point2i::new(x, 0)).collect();
        assert_eq!(trace.ring, expected);
    }

    #[test]
    fn test_trace_mis_seeded_start() {
        let image = paint(8, 8, RED, &[(4, 4)]);
        let trace = trace(&image, RED, Point2i::new(1, 1), order(LeftRight, DownUp));
        assert!(trace.ring.is_empty());
        assert_eq!(trace.resume, Point2i::new(2, 1));
    }

    #[test]
    fn test_trace_single_pixel() {
        let image = paint(8, 8, RED, &[(4, 4)]);
        let trace = trace(&image, RED, Point2i::new(4, 4), order(LeftRight, DownUp));
        assert_eq!(trace.ring, vec![Point2i::new(0, 0)]);
        assert_eq!(trace.resume, Point2i::new(5, 4));
    }

    #[test]
    fn test_dedup_first_occurrence() {
        let p = |x, y| Point2i::new(x, y);
        let points = vec![p(0, 0), p(1, 0), p(0, 0), p(2, 0), p(1, 0)];
        assert_eq!(
            dedup_first_occurrence(points),
            vec![p(0, 0), p(1, 0), p(2, 0)]
        );
    }
}
