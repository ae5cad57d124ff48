//! Two-page spread layout for comic reading.
//!
//! Pairing is anchored to the left page of a spread: whether page `i` shares
//! the screen with `i + 1` depends only on those two pages' aspect ratios and
//! the container, never on parity.

use serde::{Deserialize, Serialize};

/// Rounding slack when comparing the scaled spread width with the container
pub const PAIRING_EPSILON: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Single,
    #[default]
    Double,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Single => "single",
            ViewMode::Double => "double",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: f64::from(width),
            height: f64::from(height),
        }
    }

    /// Width after scaling to `height` with the aspect ratio preserved
    fn width_at_height(&self, height: f64) -> Option<f64> {
        (self.height > 0.0).then(|| self.width / self.height * height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: f64::from(width),
            height: f64::from(height),
        }
    }
}

/// Whether `a` and `b`, each scaled to the container height, fit side by side.
pub fn can_pair(a: PageSize, b: PageSize, container: ContainerSize, epsilon: f64) -> bool {
    if container.width <= 0.0 || container.height <= 0.0 {
        return false;
    }
    match (
        a.width_at_height(container.height),
        b.width_at_height(container.height),
    ) {
        (Some(wa), Some(wb)) => wa + wb <= container.width + epsilon,
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct PairingEngine {
    pages: Vec<PageSize>,
    mode: ViewMode,
    container: ContainerSize,
    epsilon: f64,
}

impl PairingEngine {
    pub fn new(pages: Vec<PageSize>, mode: ViewMode, container: ContainerSize) -> Self {
        Self {
            pages,
            mode,
            container,
            epsilon: PAIRING_EPSILON,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn set_container(&mut self, container: ContainerSize) {
        self.container = container;
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    fn last_index(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    /// True when page `index` opens a two-page spread with `index + 1`.
    pub fn pairs_with_next(&self, index: usize) -> bool {
        if self.mode == ViewMode::Single {
            return false;
        }
        match (self.pages.get(index), self.pages.get(index + 1)) {
            (Some(&a), Some(&b)) => can_pair(a, b, self.container, self.epsilon),
            _ => false,
        }
    }

    /// Pages shown when `index` is the current page.
    pub fn visible_indices(&self, index: usize) -> Vec<usize> {
        if index >= self.pages.len() {
            return Vec::new();
        }
        if self.pairs_with_next(index) {
            vec![index, index + 1]
        } else {
            vec![index]
        }
    }

    pub fn jump_to(&self, index: usize) -> usize {
        index.min(self.last_index())
    }

    /// Advance past the current spread, clamped to the last page.
    pub fn next(&self, current: usize) -> usize {
        let current = self.jump_to(current);
        let step = if self.pairs_with_next(current) { 2 } else { 1 };
        (current + step).min(self.last_index())
    }

    /// Step back one spread.
    ///
    /// Goes back two pages only when the page two back opens a spread whose
    /// forward step lands on `current`; otherwise one page. Stepping back over
    /// a spread therefore lands on its left page, never inside it.
    pub fn prev(&self, current: usize) -> usize {
        let current = self.jump_to(current);
        if current == 0 {
            return 0;
        }
        let candidate = current - 1;
        if candidate >= 1 && self.pairs_with_next(candidate - 1) {
            candidate - 1
        } else {
            candidate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTRAIT: PageSize = PageSize {
        width: 700.0,
        height: 1000.0,
    };
    const LANDSCAPE: PageSize = PageSize {
        width: 1400.0,
        height: 1000.0,
    };

    fn container() -> ContainerSize {
        ContainerSize::new(1400, 1000)
    }

    #[test]
    fn two_portraits_fit_one_landscape_does_not() {
        assert!(can_pair(PORTRAIT, PORTRAIT, container(), PAIRING_EPSILON));
        assert!(!can_pair(PORTRAIT, LANDSCAPE, container(), PAIRING_EPSILON));
    }

    #[test]
    fn epsilon_tolerates_rounding() {
        let slightly_wide = PageSize {
            width: 700.5,
            height: 1000.0,
        };
        assert!(can_pair(slightly_wide, slightly_wide, container(), PAIRING_EPSILON));
        assert!(!can_pair(slightly_wide, slightly_wide, container(), 0.0));
    }

    #[test]
    fn zero_sized_container_or_page_never_pairs() {
        assert!(!can_pair(PORTRAIT, PORTRAIT, ContainerSize::new(0, 1000), 1.0));
        assert!(!can_pair(PORTRAIT, PORTRAIT, ContainerSize::new(1400, 0), 1.0));
        assert!(!can_pair(PageSize::new(10, 0), PORTRAIT, container(), 1.0));
    }

    #[test]
    fn pairing_is_decided_per_index() {
        let engine = PairingEngine::new(
            vec![PORTRAIT, PORTRAIT, LANDSCAPE, PORTRAIT, PORTRAIT],
            ViewMode::Double,
            container(),
        );

        assert_eq!(engine.visible_indices(0), vec![0, 1]);
        assert_eq!(engine.visible_indices(1), vec![1]);
        assert_eq!(engine.visible_indices(2), vec![2]);
        assert_eq!(engine.visible_indices(3), vec![3, 4]);
        assert_eq!(engine.visible_indices(4), vec![4]);
        assert!(engine.visible_indices(5).is_empty());
    }

    #[test]
    fn forward_and_backward_agree_on_spreads() {
        let engine = PairingEngine::new(
            vec![PORTRAIT, PORTRAIT, LANDSCAPE, PORTRAIT, PORTRAIT, LANDSCAPE],
            ViewMode::Double,
            container(),
        );

        let mut forward = vec![0];
        let mut current = 0;
        while current < engine.len() - 1 {
            current = engine.next(current);
            forward.push(current);
        }
        assert_eq!(forward, vec![0, 2, 3, 5]);

        let mut backward = vec![current];
        while current > 0 {
            current = engine.prev(current);
            backward.push(current);
        }
        assert_eq!(backward, vec![5, 3, 2, 0]);
    }

    #[test]
    fn single_mode_moves_one_page() {
        let engine = PairingEngine::new(vec![PORTRAIT; 4], ViewMode::Single, container());

        assert_eq!(engine.next(0), 1);
        assert_eq!(engine.prev(2), 1);
        assert_eq!(engine.visible_indices(0), vec![0]);
    }

    #[test]
    fn navigation_clamps_at_edges() {
        let engine = PairingEngine::new(vec![PORTRAIT; 2], ViewMode::Double, container());

        assert_eq!(engine.next(0), 1);
        assert_eq!(engine.next(1), 1);
        assert_eq!(engine.prev(0), 0);
        assert_eq!(engine.jump_to(99), 1);

        let empty = PairingEngine::new(Vec::new(), ViewMode::Double, container());
        assert_eq!(empty.next(0), 0);
        assert_eq!(empty.prev(0), 0);
        assert_eq!(empty.jump_to(3), 0);
    }

    /// Small deterministic generator so the property runs over many shapes
    struct Lcg(u64);

    impl Lcg {
        fn next_u32(&mut self, max: u32) -> u32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 33) as u32) % max
        }
    }

    #[test]
    fn next_then_prev_from_start_never_drifts() {
        let mut rng = Lcg(42);
        for _ in 0..500 {
            let len = 1 + rng.next_u32(12) as usize;
            let pages: Vec<PageSize> = (0..len)
                .map(|_| PageSize::new(1 + rng.next_u32(2000), rng.next_u32(2000)))
                .collect();
            let container = ContainerSize::new(rng.next_u32(3000), rng.next_u32(2000));
            let engine = PairingEngine::new(pages, ViewMode::Double, container);

            assert_eq!(engine.prev(engine.next(0)), 0);
        }
    }

    #[test]
    fn prev_undoes_every_spread_step() {
        let mut rng = Lcg(7);
        for _ in 0..200 {
            let len = 1 + rng.next_u32(15) as usize;
            let pages: Vec<PageSize> = (0..len)
                .map(|_| PageSize::new(200 + rng.next_u32(1600), 500 + rng.next_u32(1000)))
                .collect();
            let engine =
                PairingEngine::new(pages, ViewMode::Double, ContainerSize::new(1600, 1000));

            let mut current = 0;
            loop {
                let next = engine.next(current);
                if next == current {
                    break;
                }
                if next == current + 2 {
                    assert_eq!(engine.prev(next), current);
                }
                current = next;
            }
        }
    }
}
