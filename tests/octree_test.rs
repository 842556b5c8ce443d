use color_growth::octree::Octree;
use color_growth::points::{ColorPoint, FrontierPoint, SpacePoint};

const GRID: u32 = 4096;

fn point(x: u32, y: u32, r: u8, g: u8, b: u8) -> FrontierPoint {
    FrontierPoint {
        space: SpacePoint::new(x, y, GRID),
        color: ColorPoint::new(r, g, b),
    }
}

fn brute_force_distance(points: &[FrontierPoint], query: ColorPoint) -> i32 {
    points
        .iter()
        .map(|p| query.distance_to(p.color))
        .min()
        .expect("brute force over an empty list")
}

#[test]
fn add_then_remove_leaves_an_empty_tree() {
    let mut tree = Octree::new();
    assert!(tree.is_empty());

    let p = point(0, 0, 12, 34, 56);
    tree.add(p);
    assert!(!tree.is_empty());
    assert_eq!(tree.open_positions(), 1);
    assert!(tree.has_position(p.space.hash));

    tree.remove(&p).unwrap();
    assert!(tree.is_empty());
    assert_eq!(tree.open_positions(), 0);
    assert!(!tree.has_position(p.space.hash));
}

#[test]
fn seeded_corner_pair_is_found_and_removed() {
    // The two frontier points a corner seed with color 0,0,0 produces.
    let mut tree = Octree::new();
    let right = point(1, 0, 0, 0, 0);
    let down = point(0, 1, 0, 0, 0);
    tree.add(right);
    tree.add(down);
    assert_eq!(tree.open_positions(), 2);

    let found = tree.find_nearest(ColorPoint::new(0, 0, 0)).unwrap();
    assert_eq!(found.color, ColorPoint::new(0, 0, 0));
    assert!(found.space == right.space || found.space == down.space);

    tree.remove(&found).unwrap();
    assert_eq!(tree.open_positions(), 1);

    let rest = tree.find_nearest(ColorPoint::new(0, 0, 0)).unwrap();
    assert!(rest.space != found.space);
}

#[test]
fn insert_remove_round_trip_preserves_queries() {
    let mut tree = Octree::new();
    for i in 0..25u32 {
        let c = (i * 10) as u8;
        tree.add(point(i, 1, c, 255 - c, (i * 7) as u8));
    }

    let probes = [
        ColorPoint::new(0, 0, 0),
        ColorPoint::new(128, 128, 128),
        ColorPoint::new(255, 0, 255),
        ColorPoint::new(40, 200, 17),
    ];
    let before: Vec<FrontierPoint> =
        probes.iter().map(|&q| tree.find_nearest(q).unwrap()).collect();

    let extra = point(100, 100, 123, 45, 67);
    tree.add(extra);
    tree.remove(&extra).unwrap();

    assert_eq!(tree.open_positions(), 25);
    for (&q, &b) in probes.iter().zip(&before) {
        assert_eq!(tree.find_nearest(q).unwrap(), b);
    }
}

#[test]
fn removing_a_position_drops_every_candidate_it_had() {
    // One position collects candidates from several written neighbors;
    // here they route to two different children of the root, two of them
    // sharing a child. One removal must clear all of it without a child
    // being told twice.
    let mut tree = Octree::new();
    let space = SpacePoint::new(5, 5, GRID);
    let low_a = FrontierPoint { space, color: ColorPoint::new(10, 10, 10) };
    let low_b = FrontierPoint { space, color: ColorPoint::new(30, 20, 40) };
    let high = FrontierPoint { space, color: ColorPoint::new(200, 200, 200) };
    tree.add(low_a);
    tree.add(low_b);
    tree.add(high);

    assert_eq!(tree.open_positions(), 1);
    let found = tree.find_nearest(ColorPoint::new(200, 200, 200)).unwrap();
    assert_eq!(found.color, high.color);

    tree.remove(&low_a).unwrap();
    assert!(tree.is_empty());
    assert!(tree.find_nearest(ColorPoint::new(10, 10, 10)).is_err());
}

#[test]
fn repeated_candidates_in_one_octant_are_removed_together() {
    let mut tree = Octree::new();
    let space = SpacePoint::new(9, 9, GRID);
    let first = FrontierPoint { space, color: ColorPoint::new(77, 1, 2) };
    let second = FrontierPoint { space, color: ColorPoint::new(78, 1, 2) };
    tree.add(first);
    tree.add(second);
    assert_eq!(tree.open_positions(), 1);

    tree.remove(&second).unwrap();
    assert!(tree.is_empty());
}

#[test]
fn exact_match_wins() {
    let mut tree = Octree::new();
    for i in 0..20u32 {
        tree.add(point(i, 2, (i * 12) as u8, (i * 5) as u8, 200));
    }
    let target = ColorPoint::new(48, 20, 200); // i == 4
    let found = tree.find_nearest(target).unwrap();
    assert_eq!(found.color, target);
}

#[test]
fn nearest_matches_brute_force_on_random_points() {
    let mut rng = fastrand::Rng::with_seed(0x0051_3dd5);
    let mut tree = Octree::new();
    let mut mirror = Vec::new();

    for i in 0..1000u32 {
        let p = point(i, 0, rng.u8(..), rng.u8(..), rng.u8(..));
        tree.add(p);
        mirror.push(p);
    }

    for _ in 0..100 {
        let query = ColorPoint::new(rng.u8(..), rng.u8(..), rng.u8(..));
        let found = tree.find_nearest(query).unwrap();
        assert_eq!(
            query.distance_to(found.color),
            brute_force_distance(&mirror, query),
            "suboptimal result for query {query}",
        );
    }
}

#[test]
fn crowded_leaf_is_scanned_in_place() {
    // More points than the descent threshold, all inside one deepest
    // sub-cube, so the search has to bottom out and scan there.
    let mut tree = Octree::new();
    let mut mirror = Vec::new();
    for i in 0..80u32 {
        let r = 240 + (i % 16) as u8;
        let g = 240 + ((i / 16) % 16) as u8;
        let p = point(i, 3, r, g, 245);
        tree.add(p);
        mirror.push(p);
    }

    let query = ColorPoint::new(250, 250, 250);
    let found = tree.find_nearest(query).unwrap();
    assert_eq!(query.distance_to(found.color), brute_force_distance(&mirror, query));
}

#[test]
fn nearest_crosses_octant_boundaries() {
    // A crowded low octant forces the descent to stop inside it, but the
    // true nearest sits just across the center of the cube.
    let mut tree = Octree::new();
    for i in 0..70u32 {
        let r = ((i % 8) * 8) as u8;
        let g = (((i / 8) % 8) * 8) as u8;
        let b = 40 + ((i / 64) * 8) as u8;
        tree.add(point(i, 4, r, g, b));
    }
    let across = point(100, 100, 130, 130, 130);
    tree.add(across);

    let found = tree.find_nearest(ColorPoint::new(120, 120, 120)).unwrap();
    assert_eq!(found.color, across.color);
    assert_eq!(found.space, across.space);
}

#[test]
fn nearest_on_an_empty_tree_fails() {
    let tree = Octree::new();
    let err = tree.find_nearest(ColorPoint::new(1, 2, 3)).unwrap_err();
    assert!(err.to_string().contains("empty index"), "{err}");
}

#[test]
fn removing_an_absent_position_fails() {
    let mut tree = Octree::new();
    tree.add(point(1, 1, 50, 60, 70));

    let err = tree.remove(&point(2, 2, 50, 60, 70)).unwrap_err();
    assert!(err.to_string().contains("missing position"), "{err}");

    // The present point is untouched.
    assert_eq!(tree.open_positions(), 1);
}

#[test]
fn bucket_storage_is_recycled_across_churn() {
    // Interleaved add/remove in the shape of the placement loop; the tree
    // must stay consistent through heavy reuse.
    let mut rng = fastrand::Rng::with_seed(0xc0ffee);
    let mut tree = Octree::new();
    let mut live: Vec<FrontierPoint> = Vec::new();

    for i in 0..2000u32 {
        // x/y periods are coprime, so late iterations revisit positions.
        let p = point(i % 97, 5 + i % 13, rng.u8(..), rng.u8(..), rng.u8(..));
        if tree.has_position(p.space.hash) {
            tree.remove(&p).unwrap();
            live.retain(|q| q.space.hash != p.space.hash);
        }
        tree.add(p);
        live.push(p);

        if i % 3 == 0 {
            let victim = live.swap_remove(rng.usize(..live.len()));
            tree.remove(&victim).unwrap();
            live.retain(|q| q.space.hash != victim.space.hash);
        }
    }

    let open: std::collections::HashSet<u32> = live.iter().map(|p| p.space.hash).collect();
    assert_eq!(tree.open_positions(), open.len());

    for _ in 0..20 {
        let query = ColorPoint::new(rng.u8(..), rng.u8(..), rng.u8(..));
        let found = tree.find_nearest(query).unwrap();
        assert_eq!(query.distance_to(found.color), brute_force_distance(&live, query));
    }
}
