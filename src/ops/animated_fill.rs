// ============================================================================
// ANIMATED FILL — batched traversal emitted as an ordered snapshot stream
// ============================================================================
//
// `FillAnimation` is a finite, non-restartable iterator. Each call to `next()`
// processes one batch and yields a stable copy of the working buffer, so a
// consumer can display the region spreading. The stream always ends with one
// full-state snapshot followed by exactly one `Completed` marker.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use super::color_metric::FillPredicate;
use super::{FillOutcome, Seed, prepare_seed};
use crate::raster::{Color, Connectivity, PixelBuffer, RasterImage};

/// One item of an animated fill stream.
#[derive(Clone, Debug)]
pub enum FillEvent {
    /// Buffer state at a batch boundary.
    Progress(RasterImage),
    /// Terminal marker; nothing follows it.
    Completed(FillOutcome),
}

enum Phase {
    /// Emit `image` as the only snapshot, then complete.
    Immediate(RasterImage, FillOutcome),
    Running,
    Complete(FillOutcome),
    Done,
}

struct Traversal {
    buffer: PixelBuffer,
    predicate: FillPredicate,
    queue: VecDeque<usize>,
    visited: Vec<bool>,
}

pub struct FillAnimation {
    source: RasterImage,
    traversal: Option<Traversal>,
    connectivity: Connectivity,
    batch_limit: usize,
    phase: Phase,
    filled: usize,
    batches: usize,
}

impl FillAnimation {
    /// Prepare an animated fill of `source` from `(x, y)`.
    ///
    /// Never fails: an unusable source or origin produces a stream holding the
    /// unmodified image and a `Completed` marker describing why.
    pub fn new(
        source: &RasterImage,
        x: i64,
        y: i64,
        fill: Color,
        threshold: u8,
        connectivity: Connectivity,
        batch_limit: usize,
    ) -> Self {
        let mut anim = Self {
            source: source.clone(),
            traversal: None,
            connectivity,
            batch_limit: batch_limit.max(1),
            phase: Phase::Done,
            filled: 0,
            batches: 0,
        };

        let buffer = match PixelBuffer::from_image(source) {
            Ok(b) => b,
            Err(e) => {
                anim.phase = Phase::Immediate(source.clone(), FillOutcome::Rejected(e));
                return anim;
            }
        };
        let (seed, predicate) = match prepare_seed(&buffer, x, y, fill, threshold) {
            Ok(Seed::Start { index, predicate }) => (index, predicate),
            Ok(Seed::Skip(reason)) => {
                anim.phase = Phase::Immediate(source.clone(), FillOutcome::Unchanged(reason));
                return anim;
            }
            Err(e) => {
                anim.phase = Phase::Immediate(source.clone(), FillOutcome::Rejected(e));
                return anim;
            }
        };

        let mut visited = vec![false; buffer.len()];
        visited[seed] = true;
        let mut queue = VecDeque::with_capacity(anim.batch_limit);
        queue.push_back(seed);

        anim.traversal = Some(Traversal {
            buffer,
            predicate,
            queue,
            visited,
        });
        anim.phase = Phase::Running;
        anim
    }

    /// Pixels repainted so far.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Batches processed so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    fn run_batch(&mut self) {
        let Some(t) = self.traversal.as_mut() else {
            return;
        };
        let count = self.batch_limit.min(t.queue.len());
        let mut next: VecDeque<usize> = VecDeque::new();

        for _ in 0..count {
            let Some(idx) = t.queue.pop_front() else {
                break;
            };
            match t.buffer.get_index(idx) {
                Some(c) if t.predicate.accepts(c) => {}
                _ => continue,
            }
            t.buffer.set_index(idx, t.predicate.fill());
            self.filled += 1;

            for n in t.buffer.neighbors(idx, self.connectivity) {
                if t.visited[n] {
                    continue;
                }
                let Some(nc) = t.buffer.get_index(n) else {
                    continue;
                };
                if !t.predicate.accepts(nc) {
                    continue;
                }
                t.visited[n] = true;
                // Pixels that still border fillable ground lead the spread
                if has_fillable_neighbor(&t.buffer, &t.predicate, n, self.connectivity) {
                    next.push_front(n);
                } else {
                    next.push_back(n);
                }
            }
        }

        t.queue.extend(next);
        self.batches += 1;
    }

    fn outcome(&self) -> FillOutcome {
        FillOutcome::Filled {
            pixels: self.filled,
        }
    }
}

fn has_fillable_neighbor(
    buffer: &PixelBuffer,
    predicate: &FillPredicate,
    index: usize,
    connectivity: Connectivity,
) -> bool {
    buffer
        .neighbors(index, connectivity)
        .any(|n| buffer.get_index(n).is_some_and(|c| predicate.accepts(c)))
}

impl Iterator for FillAnimation {
    type Item = FillEvent;

    fn next(&mut self) -> Option<FillEvent> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Immediate(image, outcome) => {
                self.phase = Phase::Complete(outcome);
                Some(FillEvent::Progress(image))
            }
            Phase::Running => {
                let queue_empty = self.traversal.as_ref().is_none_or(|t| t.queue.is_empty());
                if queue_empty {
                    // Final full-state snapshot; the buffer is no longer needed
                    let outcome = self.outcome();
                    let image = match self.traversal.take().map(|t| t.buffer.into_image()) {
                        Some(Ok(image)) => image,
                        Some(Err(e)) => {
                            self.phase = Phase::Complete(FillOutcome::Rejected(e));
                            return Some(FillEvent::Progress(self.source.clone()));
                        }
                        None => self.source.clone(),
                    };
                    self.phase = Phase::Complete(outcome);
                    return Some(FillEvent::Progress(image));
                }

                self.run_batch();
                let snapshot = self.traversal.as_ref().map(|t| t.buffer.snapshot());
                match snapshot {
                    Some(Ok(image)) => {
                        self.phase = Phase::Running;
                        Some(FillEvent::Progress(image))
                    }
                    Some(Err(e)) => {
                        self.traversal = None;
                        self.phase = Phase::Complete(FillOutcome::Rejected(e));
                        Some(FillEvent::Progress(self.source.clone()))
                    }
                    None => {
                        self.phase = Phase::Complete(self.outcome());
                        Some(FillEvent::Progress(self.source.clone()))
                    }
                }
            }
            Phase::Complete(outcome) => Some(FillEvent::Completed(outcome)),
            Phase::Done => None,
        }
    }
}

impl FusedIterator for FillAnimation {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::NoOpReason;
    use crate::ops::color_metric::to_threshold;
    use crate::ops::flood_fill::flood_fill;

    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    fn snapshots(events: &[FillEvent]) -> Vec<RasterImage> {
        events
            .iter()
            .filter_map(|e| match e {
                FillEvent::Progress(img) => Some(img.clone()),
                FillEvent::Completed(_) => None,
            })
            .collect()
    }

    fn completion(events: &[FillEvent]) -> FillOutcome {
        match events.last() {
            Some(FillEvent::Completed(o)) => *o,
            other => panic!("stream did not end with completion: {:?}", other),
        }
    }

    #[test]
    fn uniform_image_grows_to_full_fill() {
        let img = RasterImage::new(4, 4, Color::WHITE);
        let events: Vec<FillEvent> =
            FillAnimation::new(&img, 0, 0, RED, 0, Connectivity::Eight, 3).collect();

        let snaps = snapshots(&events);
        assert!(snaps.len() > 2);
        let counts: Vec<usize> = snaps.iter().map(|s| s.count_color(RED)).collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{:?}", counts);
        assert_eq!(*counts.last().unwrap(), 16);
        assert_eq!(completion(&events), FillOutcome::Filled { pixels: 16 });

        // exactly one completion, and it is last
        let completions = events
            .iter()
            .filter(|e| matches!(e, FillEvent::Completed(_)))
            .count();
        assert_eq!(completions, 1);
    }

    #[test]
    fn batches_never_exceed_the_limit() {
        let img = RasterImage::new(10, 10, Color::WHITE);
        let events: Vec<FillEvent> =
            FillAnimation::new(&img, 5, 5, RED, 0, Connectivity::Eight, 7).collect();
        let counts: Vec<usize> = snapshots(&events).iter().map(|s| s.count_color(RED)).collect();
        for w in counts.windows(2) {
            assert!(w[1] - w[0] <= 7);
        }
        // batch snapshots for 100 pixels at <=7 each, plus the final snapshot
        assert!(counts.len() >= 100 / 7 + 1);
    }

    #[test]
    fn final_state_matches_synchronous_fill() {
        let mut src = PixelBuffer::from_image(&RasterImage::new(9, 7, Color::WHITE)).unwrap();
        for i in 0..7 {
            src.set(4, i, Color::BLACK);
        }
        src.set(4, 3, Color::rgb(240, 240, 240));
        src.set(1, 1, Color::rgb(180, 200, 190));
        let image = src.into_image().unwrap();

        for tolerance in [0u8, 10, 40, 100] {
            let threshold = to_threshold(tolerance);
            let mut sync = PixelBuffer::from_image(&image).unwrap();
            let stats = flood_fill(&mut sync, 0, 0, BLUE, threshold, Connectivity::Eight).unwrap();
            let expected = sync.into_image().unwrap();

            let events: Vec<FillEvent> =
                FillAnimation::new(&image, 0, 0, BLUE, threshold, Connectivity::Eight, 5).collect();
            let last = snapshots(&events).pop().unwrap();
            assert!(last.same_pixels(&expected), "tolerance {tolerance}");
            assert_eq!(completion(&events), FillOutcome::Filled { pixels: stats.filled });
        }
    }

    #[test]
    fn blocked_origin_emits_single_snapshot() {
        let img = RasterImage::new(4, 4, RED);
        let events: Vec<FillEvent> =
            FillAnimation::new(&img, 2, 2, RED, 0, Connectivity::Eight, 4).collect();
        assert_eq!(events.len(), 2);
        assert!(snapshots(&events)[0].same_pixels(&img));
        assert_eq!(completion(&events), FillOutcome::Unchanged(NoOpReason::AlreadyFilled));
    }

    #[test]
    fn out_of_bounds_still_completes() {
        let img = RasterImage::new(4, 4, Color::WHITE);
        let events: Vec<FillEvent> =
            FillAnimation::new(&img, 9, 0, RED, 0, Connectivity::Eight, 4).collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            completion(&events),
            FillOutcome::Rejected(crate::error::FillError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn animation_is_not_restartable() {
        let img = RasterImage::new(2, 2, Color::WHITE);
        let mut anim = FillAnimation::new(&img, 0, 0, RED, 0, Connectivity::Eight, 100);
        while anim.next().is_some() {}
        assert!(anim.next().is_none());
        assert_eq!(anim.filled(), 4);
        // seed batch, then its three neighbors
        assert_eq!(anim.batches(), 2);
    }

    #[test]
    fn edge_pixels_block_diagonal_spread() {
        // A closed 8-connected ring: diagonal steps cannot leak through it
        let mut src = PixelBuffer::from_image(&RasterImage::new(5, 5, Color::WHITE)).unwrap();
        for i in 0..5 {
            src.set(i, 0, Color::BLACK);
            src.set(i, 4, Color::BLACK);
            src.set(0, i, Color::BLACK);
            src.set(4, i, Color::BLACK);
        }
        let image = src.into_image().unwrap();
        let events: Vec<FillEvent> =
            FillAnimation::new(&image, 2, 2, BLUE, 255, Connectivity::Eight, 2).collect();
        let last = snapshots(&events).pop().unwrap();
        assert_eq!(last.count_color(BLUE), 9);
        assert_eq!(last.count_color(Color::BLACK), 16);
    }

    #[test]
    fn dark_line_holds_across_every_tolerance() {
        // Graded left half, black column at x = 3, white right half
        let mut src = PixelBuffer::from_image(&RasterImage::new(6, 6, Color::WHITE)).unwrap();
        for y in 0..6 {
            let shade = 255 - 20 * y as u8;
            for x in 0..3 {
                src.set(x, y, Color::rgb(shade, shade, shade));
            }
            src.set(3, y, Color::BLACK);
        }
        let image = src.into_image().unwrap();

        for tolerance in 0..=100u8 {
            let events: Vec<FillEvent> =
                FillAnimation::new(&image, 0, 0, RED, to_threshold(tolerance), Connectivity::Eight, 4)
                    .collect();
            let last = snapshots(&events).pop().unwrap();
            for y in 0..6 {
                assert_eq!(last.pixel(3, y), Some(Color::BLACK), "tolerance {tolerance}");
                for x in 4..6 {
                    assert_eq!(last.pixel(x, y), Some(Color::WHITE), "tolerance {tolerance}");
                }
            }
        }
    }

    #[test]
    fn region_grows_monotonically_with_tolerance() {
        let mut src = PixelBuffer::from_image(&RasterImage::new(8, 1, Color::WHITE)).unwrap();
        for x in 0..8 {
            let v = 255 - 12 * x as u8;
            src.set(x, 0, Color::rgb(v, v, v));
        }
        let image = src.into_image().unwrap();

        let mut previous = 0;
        for tolerance in 0..=100u8 {
            let events: Vec<FillEvent> =
                FillAnimation::new(&image, 0, 0, RED, to_threshold(tolerance), Connectivity::Four, 3)
                    .collect();
            let FillOutcome::Filled { pixels } = completion(&events) else {
                panic!("tolerance {tolerance}: {:?}", completion(&events));
            };
            assert!(pixels >= previous, "tolerance {tolerance}: {pixels} < {previous}");
            assert_eq!(snapshots(&events).pop().unwrap().count_color(RED), pixels);
            previous = pixels;
        }
        assert_eq!(previous, 8);
    }
}
