//! Cross-backend equivalence and scene graph integration tests.
//!
//! Grid and Quadtree groups must answer every range query with exactly the
//! entities a List group reports once filtered by `rect.contains`.
//!
//! # Usage
//!
//! ```sh
//! cargo test --test spatial_integration
//! ```

use tickscene::components::entity::{Entity, EntityId};
use tickscene::components::geometry::{Rect, Vec2};
use tickscene::scene::{Scene, SceneError};
use tickscene::spatial::{BackendKind, SpatialBackend};

const WORLD: f32 = 1000.0;

fn populate(scene: &mut Scene, points: &[Vec2]) -> Vec<EntityId> {
    let root = scene.root();
    points
        .iter()
        .map(|p| scene.add(root, Entity::new(p.x, p.y)).unwrap())
        .collect()
}

fn random_points(rng: &mut fastrand::Rng, n: usize) -> Vec<Vec2> {
    (0..n)
        .map(|_| Vec2::new(rng.f32() * WORLD, rng.f32() * WORLD))
        .collect()
}

fn random_rect(rng: &mut fastrand::Rng) -> Rect {
    let x = rng.f32() * WORLD * 1.2 - WORLD * 0.1;
    let y = rng.f32() * WORLD * 1.2 - WORLD * 0.1;
    Rect::new(x, y, rng.f32() * WORLD * 0.5, rng.f32() * WORLD * 0.5)
}

/// List answer filtered by containment, sorted.
fn oracle(list: &Scene, rect: &Rect) -> Vec<EntityId> {
    let mut ids: Vec<_> = list
        .children(list.root())
        .into_iter()
        .filter(|id| rect.contains(list.get(*id).unwrap().position()))
        .collect();
    ids.sort();
    ids
}

fn sorted_query(scene: &Scene, rect: &Rect) -> Vec<EntityId> {
    let mut ids = scene.query(scene.root(), rect);
    ids.sort();
    ids
}

// ==================== ORACLE ====================

#[test]
fn test_backends_agree_with_list_oracle() {
    let mut rng = fastrand::Rng::with_seed(0xC0FFEE);
    for population in [0, 1, 17, 250, 1000] {
        let points = random_points(&mut rng, population);
        let mut list = Scene::new(SpatialBackend::list());
        let mut grid = Scene::new(SpatialBackend::grid(37.5));
        let mut quad = Scene::new(SpatialBackend::quadtree(Rect::new(0.0, 0.0, WORLD, WORLD)));
        let a = populate(&mut list, &points);
        let b = populate(&mut grid, &points);
        let c = populate(&mut quad, &points);
        // fresh arenas hand out identical handles
        assert_eq!(a, b);
        assert_eq!(a, c);

        for _ in 0..50 {
            let rect = random_rect(&mut rng);
            let expected = oracle(&list, &rect);
            assert_eq!(sorted_query(&grid, &rect), expected, "grid {:?}", rect);
            assert_eq!(sorted_query(&quad, &rect), expected, "quadtree {:?}", rect);
        }
        let everything = oracle(&list, &Rect::EVERYTHING);
        assert_eq!(everything.len(), population);
        assert_eq!(sorted_query(&grid, &Rect::EVERYTHING), everything);
        assert_eq!(sorted_query(&quad, &Rect::EVERYTHING), everything);
    }
}

#[test]
fn test_quadtree_outside_bounds_still_queried() {
    let mut rng = fastrand::Rng::with_seed(7);
    // points spill well beyond the tree bounds
    let points: Vec<_> = (0..300)
        .map(|_| Vec2::new(rng.f32() * 3.0 * WORLD - WORLD, rng.f32() * 3.0 * WORLD - WORLD))
        .collect();
    let mut list = Scene::new(SpatialBackend::list());
    let mut quad = Scene::new(SpatialBackend::quadtree(Rect::new(0.0, 0.0, WORLD, WORLD)));
    populate(&mut list, &points);
    populate(&mut quad, &points);
    for _ in 0..30 {
        let rect = Rect::new(
            rng.f32() * 3.0 * WORLD - WORLD,
            rng.f32() * 3.0 * WORLD - WORLD,
            rng.f32() * WORLD,
            rng.f32() * WORLD,
        );
        assert_eq!(sorted_query(&quad, &rect), oracle(&list, &rect));
    }
}

#[test]
fn test_unbounded_quadtree_agrees_with_list() {
    let mut rng = fastrand::Rng::with_seed(99);
    let points = random_points(&mut rng, 200);
    let mut list = Scene::new(SpatialBackend::list());
    let mut quad = Scene::new(SpatialBackend::quadtree(Rect::EVERYTHING));
    populate(&mut list, &points);
    populate(&mut quad, &points);
    for _ in 0..30 {
        let rect = random_rect(&mut rng);
        assert_eq!(sorted_query(&quad, &rect), oracle(&list, &rect));
    }
    assert_eq!(sorted_query(&quad, &Rect::new(0.0, 0.0, WORLD, WORLD)).len(), 200);
}

#[test]
fn test_backends_agree_after_prune_and_reindex() {
    let mut rng = fastrand::Rng::with_seed(42);
    let points = random_points(&mut rng, 400);
    let mut list = Scene::new(SpatialBackend::list());
    let mut grid = Scene::new(SpatialBackend::grid(50.0));
    let mut quad = Scene::new(SpatialBackend::quadtree(Rect::new(0.0, 0.0, WORLD, WORLD)));
    let ids = populate(&mut list, &points);
    populate(&mut grid, &points);
    populate(&mut quad, &points);

    let doomed: Vec<_> = ids.iter().copied().filter(|_| rng.bool()).collect();
    let moves: Vec<_> = ids
        .iter()
        .map(|id| (*id, Vec2::new(rng.f32() * WORLD, rng.f32() * WORLD)))
        .collect();
    for scene in [&mut list, &mut grid, &mut quad] {
        for id in &doomed {
            scene.get_mut(*id).unwrap().kill();
        }
        let pruned = scene.prune();
        assert_eq!(pruned, doomed.len());
        for (id, pos) in &moves {
            if let Some(e) = scene.get_mut(*id) {
                e.transform.set_position(*pos);
            }
        }
        let root = scene.root();
        scene.reindex(root).unwrap();
    }

    for _ in 0..40 {
        let rect = random_rect(&mut rng);
        let expected = oracle(&list, &rect);
        assert_eq!(sorted_query(&grid, &rect), expected);
        assert_eq!(sorted_query(&quad, &rect), expected);
    }
}

// ==================== SCENE GRAPH ====================

#[test]
fn test_prune_keeps_sibling_order_in_nested_groups() {
    let mut scene = Scene::new(SpatialBackend::list());
    let root = scene.root();
    let group = scene
        .add_group(root, Entity::new(0.0, 0.0), SpatialBackend::list())
        .unwrap();
    let kids: Vec<_> = (0..10)
        .map(|i| scene.add(group, Entity::new(i as f32, 0.0)).unwrap())
        .collect();
    for i in [0, 3, 4, 9] {
        scene.get_mut(kids[i]).unwrap().kill();
    }
    scene.prune();
    let survivors: Vec<_> = [1, 2, 5, 6, 7, 8].iter().map(|i| kids[*i]).collect();
    assert_eq!(scene.children(group), survivors);
    for (i, id) in [1, 2, 5, 6, 7, 8].iter().zip(&survivors) {
        assert_eq!(scene.get(*id).unwrap().position(), Vec2::new(*i as f32, 0.0));
    }
}

#[test]
fn test_pruning_empty_group_is_noop() {
    let mut scene = Scene::new(SpatialBackend::grid(10.0));
    let root = scene.root();
    let group = scene
        .add_group(root, Entity::new(0.0, 0.0), SpatialBackend::quadtree(Rect::new(0.0, 0.0, 1.0, 1.0)))
        .unwrap();
    assert_eq!(scene.prune(), 0);
    assert!(scene.contains(group));
    assert_eq!(scene.backend_kind(group), Some(BackendKind::Quadtree));
}

#[test]
fn test_tree_stays_acyclic() {
    let mut scene = Scene::new(SpatialBackend::list());
    let root = scene.root();
    let a = scene
        .add_group(root, Entity::new(0.0, 0.0), SpatialBackend::list())
        .unwrap();
    let b = scene
        .add_group(a, Entity::new(0.0, 0.0), SpatialBackend::grid(8.0))
        .unwrap();
    let c = scene
        .add_group(b, Entity::new(0.0, 0.0), SpatialBackend::list())
        .unwrap();
    assert!(matches!(scene.reparent(a, c), Err(SceneError::WouldCycle { .. })));
    assert!(matches!(scene.reparent(b, c), Err(SceneError::WouldCycle { .. })));
    assert_eq!(scene.parent(a), Some(root));

    scene.reparent(c, root).unwrap();
    scene.reparent(a, c).unwrap();
    assert!(scene.is_ancestor(c, b));
    assert_eq!(scene.children(root), vec![c]);
}

#[test]
fn test_removed_handles_are_rejected() {
    let mut scene = Scene::new(SpatialBackend::list());
    let root = scene.root();
    let group = scene
        .add_group(root, Entity::new(0.0, 0.0), SpatialBackend::list())
        .unwrap();
    scene.remove(group).unwrap();
    assert_eq!(
        scene.add(group, Entity::new(0.0, 0.0)),
        Err(SceneError::UnknownEntity(group))
    );
    assert_eq!(scene.len(), 1);
}
