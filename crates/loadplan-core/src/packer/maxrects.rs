//! Float MaxRects free-list over a container floor. Maintains non-dominated
//! free rectangles; placements split overlapping free rects into residual
//! strips which are then pruned for domination.

/// Axis-aligned floor rectangle. `x` runs along the container width,
/// `y` along the container length; `w`/`h` are the extents on those axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect2D {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub rotated: bool,
}

impl Rect2D {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w,
            h,
            rotated: false,
        }
    }
}

pub struct MaxRects2D {
    eps: f64,
    free: Vec<Rect2D>,
    used: Vec<Rect2D>,
}

impl MaxRects2D {
    /// Free-list over a `width` x `depth` floor.
    pub fn new(width: f64, depth: f64, eps: f64) -> Self {
        Self {
            eps,
            free: vec![Rect2D::new(0.0, 0.0, width, depth)],
            used: Vec::new(),
        }
    }

    pub fn insert(&mut self, w: f64, h: f64, allow_rotation: bool) -> Option<Rect2D> {
        let best = self.find_position(w, h, allow_rotation);
        if let Some(rect) = best {
            self.commit(&rect);
        }
        best
    }

    /// Best free position for a `w` x `h` footprint. Scoring minimizes
    /// wasted area, then short-side leftover, then free-rect area; a placed
    /// rotation carries a tiny penalty so the upright pose wins ties.
    pub fn find_position(&self, w: f64, h: f64, allow_rotation: bool) -> Option<Rect2D> {
        let mut best: Option<Rect2D> = None;
        let mut best_score = (f64::INFINITY, f64::INFINITY, f64::INFINITY);

        for free in &self.free {
            if w <= free.w + self.eps && h <= free.h + self.eps {
                let leftover_h = (free.w - w).abs();
                let leftover_v = (free.h - h).abs();
                let wasted = leftover_h * h + leftover_v * w - leftover_h * leftover_v;
                let score = (wasted, leftover_h.min(leftover_v), free.w * free.h);
                if score < best_score {
                    best_score = score;
                    best = Some(Rect2D::new(free.x, free.y, w, h));
                }
            }

            if allow_rotation && h <= free.w + self.eps && w <= free.h + self.eps {
                let leftover_h = (free.w - h).abs();
                let leftover_v = (free.h - w).abs();
                let wasted = leftover_h * w + leftover_v * h - leftover_h * leftover_v;
                let score = (wasted, leftover_h.min(leftover_v), free.w * free.h + 0.01);
                if score < best_score {
                    best_score = score;
                    best = Some(Rect2D {
                        x: free.x,
                        y: free.y,
                        w: h,
                        h: w,
                        rotated: true,
                    });
                }
            }
        }

        best
    }

    pub fn commit(&mut self, rect: &Rect2D) {
        let mut i = 0;
        while i < self.free.len() {
            let free = self.free[i];
            if self.split_free_rect(free, rect) {
                self.free.remove(i);
            } else {
                i += 1;
            }
        }
        self.prune_free_list();
        self.used.push(*rect);
    }

    pub fn free_rects(&self) -> &[Rect2D] {
        &self.free
    }

    fn split_free_rect(&mut self, free: Rect2D, used: &Rect2D) -> bool {
        if !self.rects_overlap(&free, used) {
            return false;
        }
        // Left strip, full depth.
        if used.x > free.x {
            let w = used.x - free.x;
            if w > self.eps {
                self.free.push(Rect2D::new(free.x, free.y, w, free.h));
            }
        }
        // Right strip, full depth.
        if used.x + used.w < free.x + free.w {
            let w = (free.x + free.w) - (used.x + used.w);
            if w > self.eps {
                self.free
                    .push(Rect2D::new(used.x + used.w, free.y, w, free.h));
            }
        }
        // Near strip, clipped to the used rect's x-range.
        if used.y > free.y {
            let w = (free.x + free.w).min(used.x + used.w) - free.x.max(used.x);
            let h = used.y - free.y;
            if w > self.eps && h > self.eps {
                self.free
                    .push(Rect2D::new(free.x.max(used.x), free.y, w, h));
            }
        }
        // Far strip, clipped to the used rect's x-range.
        if used.y + used.h < free.y + free.h {
            let h = (free.y + free.h) - (used.y + used.h);
            let w = (free.x + free.w).min(used.x + used.w) - free.x.max(used.x);
            if w > self.eps && h > self.eps {
                self.free
                    .push(Rect2D::new(free.x.max(used.x), used.y + used.h, w, h));
            }
        }
        true
    }

    fn prune_free_list(&mut self) {
        let eps = self.eps;
        let rects = self.free.clone();
        self.free = rects
            .iter()
            .enumerate()
            .filter(|(i, rect)| {
                !rects.iter().enumerate().any(|(j, other)| {
                    *i != j
                        && rect.x >= other.x - eps
                        && rect.y >= other.y - eps
                        && rect.x + rect.w <= other.x + other.w + eps
                        && rect.y + rect.h <= other.y + other.h + eps
                })
            })
            .map(|(_, r)| *r)
            .collect();
    }

    fn rects_overlap(&self, a: &Rect2D, b: &Rect2D) -> bool {
        !(a.x + a.w <= b.x + self.eps
            || b.x + b.w <= a.x + self.eps
            || a.y + a.h <= b.y + self.eps
            || b.y + b.h <= a.y + self.eps)
    }
}
