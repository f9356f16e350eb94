//! Front-end inserts, back-end updates and a viewer reads, all on the shared world model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use nalgebra::Vector3;

use slam_kernel::geometry::{Twist3, SE3};
use slam_kernel::optimizer::{collect_graph_layout, GraphLayoutConfig};
use slam_kernel::world_model::{
    Entity, EntityValue, FactorBase, FactorRelativePose3, FactorRelativePose3ConstVel,
    KeyFrameInfo, RelDynPose3KF, WorldModel,
};

const NUM_KEYFRAMES: usize = 200;

fn generation_value(generation: f64) -> EntityValue {
    EntityValue::dynamic(
        SE3::from_euler(generation, 0.0, 0.0, 0.0, 0.0, 0.0),
        Twist3::new(Vector3::new(generation, 0.0, 0.0), Vector3::zeros()),
    )
}

#[test]
fn readers_never_see_torn_dynamic_values() {
    let world = WorldModel::new().into_shared();
    let done = Arc::new(AtomicBool::new(false));

    // Front-end: a chain of dynamic keyframes linked by constant-velocity factors.
    let front_end = {
        let world = Arc::clone(&world);
        thread::spawn(move || {
            let mut prev = None;
            for i in 0..NUM_KEYFRAMES {
                let info = KeyFrameInfo::at(i as u64 * 1_000);
                let kf = RelDynPose3KF::new(info, SE3::identity(), Twist3::zero());
                let mut guard = world.write();
                let id = guard.insert_entity(kf, prev).unwrap();
                if let Some(prev_id) = prev {
                    let factor = FactorRelativePose3ConstVel::new(prev_id, id, SE3::identity());
                    guard.insert_factor(factor).unwrap();
                }
                prev = Some(id);
            }
        })
    };

    // Back-end: collect, "solve" without the lock, apply.
    let back_end = {
        let world = Arc::clone(&world);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut generation = 0.0;
            while !done.load(Ordering::SeqCst) {
                let layout =
                    collect_graph_layout(&world.read(), &GraphLayoutConfig::default()).unwrap();

                generation += 1.0;
                let updates: Vec<_> = layout
                    .variables()
                    .iter()
                    .map(|var| (var.entity_id, generation_value(generation)))
                    .collect();

                layout.apply(&mut world.write(), updates).unwrap();
            }
            generation
        })
    };

    // Viewer: pose and twist must always come from the same update.
    let viewer = {
        let world = Arc::clone(&world);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut checks = 0usize;
            while !done.load(Ordering::SeqCst) {
                let guard = world.read();
                for id in guard.entity_ids() {
                    let value = guard.entity_value(id).unwrap();
                    let twist = value.twist.expect("dynamic keyframe");
                    assert_eq!(value.pose.translation.x, twist.linear.x);
                    checks += 1;
                }
            }
            checks
        })
    };

    front_end.join().unwrap();
    done.store(true, Ordering::SeqCst);
    let generations = back_end.join().unwrap();
    viewer.join().unwrap();

    let guard = world.read();
    assert_eq!(guard.num_entities(), NUM_KEYFRAMES);
    assert_eq!(guard.num_factors(), NUM_KEYFRAMES - 1);
    assert!(generations >= 1.0);

    for (_, factor) in guard.factors() {
        assert_eq!(factor.edge_count(), 2);
        for slot in 0..factor.edge_count() {
            assert!(factor.edge_indices(slot).is_valid());
        }
    }
}

#[test]
fn back_end_update_then_global_pose_is_fresh() {
    let mut world = WorldModel::new();
    let step = SE3::from_euler(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);

    let dyn_kf = |t: u64, pose: SE3| RelDynPose3KF::new(KeyFrameInfo::at(t), pose, Twist3::zero());

    let kf0 = world.insert_entity(dyn_kf(0, SE3::identity()), None).unwrap();
    let kf1 = world.insert_entity(dyn_kf(100, step), Some(kf0)).unwrap();
    let kf2 = world.insert_entity(dyn_kf(200, step), Some(kf1)).unwrap();
    world.insert_factor(FactorRelativePose3::new(kf0, kf1, step)).unwrap();
    world.insert_factor(FactorRelativePose3::new(kf1, kf2, step)).unwrap();

    assert_eq!(world.global_pose(kf2).unwrap().translation.x, 2.0);

    let layout = collect_graph_layout(&world, &GraphLayoutConfig::default()).unwrap();
    let corrected = SE3::from_euler(1.5, 0.0, 0.0, 0.0, 0.0, 0.0);
    layout
        .apply(&mut world, [(kf1, EntityValue::pose(corrected))])
        .unwrap();

    assert_eq!(world.global_pose(kf2).unwrap().translation.x, 2.5);
    assert!(matches!(
        world.entity(kf1),
        Some(Entity::RelDynPose3KF(kf)) if kf.twist_value == Twist3::zero()
    ));
}
