use loadplan_core::packer::maxrects::MaxRects2D;

const EPS: f64 = 1e-5;

fn disjoint(rects: &[(f64, f64, f64, f64)]) -> bool {
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            let (ax, ay, aw, ah) = rects[i];
            let (bx, by, bw, bh) = rects[j];
            let overlap = ax < bx + bw - EPS
                && bx < ax + aw - EPS
                && ay < by + bh - EPS
                && by < ay + ah - EPS;
            if overlap {
                return false;
            }
        }
    }
    true
}

#[test]
fn exact_grid_tiles_fully() {
    let mut packer = MaxRects2D::new(12.0, 8.0, EPS);
    let mut placed = Vec::new();
    for _ in 0..16 {
        let rect = packer
            .insert(3.0, 2.0, false)
            .expect("16 exact tiles must fit a 12x8 floor");
        placed.push((rect.x, rect.y, rect.w, rect.h));
    }
    assert!(disjoint(&placed));
    assert!(packer.insert(3.0, 2.0, false).is_none());

    let area: f64 = placed.iter().map(|(_, _, w, h)| w * h).sum();
    assert!((area - 96.0).abs() < 1e-9);
}

#[test]
fn rotation_used_when_upright_does_not_fit() {
    let mut packer = MaxRects2D::new(4.0, 10.0, EPS);
    // 6x3 cannot stand upright on a 4-wide floor, but fits rotated.
    assert!(packer.find_position(6.0, 3.0, false).is_none());
    let rect = packer.insert(6.0, 3.0, true).expect("rotated fit");
    assert!(rect.rotated);
    assert_eq!((rect.w, rect.h), (3.0, 6.0));
}

#[test]
fn oversized_rect_is_rejected() {
    let mut packer = MaxRects2D::new(5.0, 5.0, EPS);
    assert!(packer.insert(6.0, 1.0, true).is_none());
}

#[test]
fn repeatable_and_disjoint_with_random_input() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);

    let mut sizes: Vec<(f64, f64)> = Vec::new();
    for _ in 0..80 {
        let w = rng.gen_range(4..=64) as f64;
        let h = rng.gen_range(4..=64) as f64;
        sizes.push((w, h));
    }

    let run = |sizes: &[(f64, f64)]| {
        let mut packer = MaxRects2D::new(512.0, 512.0, EPS);
        let mut placed = Vec::new();
        for &(w, h) in sizes {
            if let Some(rect) = packer.insert(w, h, true) {
                placed.push((rect.x, rect.y, rect.w, rect.h));
            }
        }
        placed
    };

    let first = run(&sizes);
    let second = run(&sizes);
    assert_eq!(first, second, "same input must produce the same layout");
    assert!(disjoint(&first));
    assert!(!first.is_empty());
}
