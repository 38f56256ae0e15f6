use std::collections::BTreeMap;

use proptest::prelude::*;
use stealthsim::models::*;
use stealthsim::world::{ObstacleMap, StraightLineMover};

#[derive(Debug, Clone)]
enum GuardOp {
    Tick { visible: bool, dt: f64 },
    Alarm(f64, f64),
    AlertReceived(f64, f64),
    PositionUpdate(f64, f64),
    AlertEnded,
}

fn guard_op() -> impl Strategy<Value = GuardOp> {
    prop_oneof![
        4 => (any::<bool>(), 0.01..0.5f64).prop_map(|(visible, dt)| GuardOp::Tick { visible, dt }),
        1 => (-20.0..20.0f64, -20.0..20.0f64).prop_map(|(x, y)| GuardOp::Alarm(x, y)),
        1 => (-20.0..20.0f64, -20.0..20.0f64).prop_map(|(x, y)| GuardOp::AlertReceived(x, y)),
        1 => (-20.0..20.0f64, -20.0..20.0f64).prop_map(|(x, y)| GuardOp::PositionUpdate(x, y)),
        1 => Just(GuardOp::AlertEnded),
    ]
}

fn new_guard() -> Guard<StraightLineMover> {
    let mut guard = Guard::new(
        "g1".to_string(),
        StraightLineMover::new(Position3D::zero(), 0.0),
        GuardProfile::default(),
        PatrolRoute::new(
            vec![Position3D::new(-10.0, -10.0, 0.0), Position3D::new(10.0, -10.0, 0.0)],
            RouteMode::Loop,
        ),
        3,
    );
    guard.set_target(Some("player".to_string()));
    guard
}

proptest! {
    #[test]
    fn suspicion_stays_in_unit_interval(
        steps in prop::collection::vec((0.0..5.0f64, 0.0..2.0f64, 0usize..3), 1..200)
    ) {
        let mut accumulator = DetectionAccumulator::from_profile(&GuardProfile::default());
        for (signal, dt, mode) in steps {
            let decay = [DecayMode::Hold, DecayMode::Normal, DecayMode::Lingering][mode];
            accumulator.integrate(signal, dt, decay);
            prop_assert!((0.0..=1.0).contains(&accumulator.level()));
        }
    }

    #[test]
    fn registry_has_no_duplicates(
        ops in prop::collection::vec((any::<bool>(), 0usize..5), 0..100)
    ) {
        let mut coordinator = AlertCoordinator::new(AlertConfig::default());
        let mut expected: Vec<String> = Vec::new();

        for (register, index) in ops {
            let id = format!("g{}", index);
            if register {
                coordinator.register(&id);
                if !expected.contains(&id) {
                    expected.push(id);
                }
            } else {
                coordinator.unregister(&id);
                expected.retain(|existing| existing != &id);
            }
            prop_assert_eq!(coordinator.registered_ids(), expected.as_slice());
        }
    }

    #[test]
    fn chasing_only_after_detection_or_alert(ops in prop::collection::vec(guard_op(), 1..150)) {
        let map = ObstacleMap::open(100.0);
        let mut guard = new_guard();

        for op in ops {
            match op {
                GuardOp::Tick { visible, dt } => {
                    let spot = guard.position() + guard.mover.forward() * 4.0;
                    let intruder = Intruder::new(
                        "player".to_string(),
                        spot,
                        StealthProfile::default(),
                        Vec::new(),
                    );
                    let ctx = GuardContext {
                        dt,
                        spatial: &map,
                        target: if visible { Some(&intruder as &dyn IDetectable) } else { None },
                        alert: AlertView::default(),
                    };
                    guard.tick(&ctx);
                    guard.mover.advance(dt);
                }
                GuardOp::Alarm(x, y) => {
                    let before = guard.state();
                    let accepted = guard.respond_to_alarm(Position3D::new(x, y, 0.0));
                    let expected = before.priority() <= GuardState::Investigating.priority();
                    prop_assert_eq!(accepted, expected);
                }
                GuardOp::AlertReceived(x, y) => {
                    let was_chasing = guard.state() == GuardState::Chasing;
                    let known = guard.last_known_target_position();
                    guard.on_alert_received(Position3D::new(x, y, 0.0));
                    prop_assert_eq!(guard.state(), GuardState::Chasing);
                    if was_chasing {
                        prop_assert_eq!(guard.last_known_target_position(), known);
                    }
                    prop_assert_eq!(guard.chase_timer(), guard.profile.chase_duration_s);
                }
                GuardOp::PositionUpdate(x, y) => {
                    guard.on_player_position_updated(Position3D::new(x, y, 0.0));
                }
                GuardOp::AlertEnded => {
                    let was_chasing = guard.state() == GuardState::Chasing;
                    guard.on_alert_ended();
                    if was_chasing {
                        prop_assert_eq!(guard.state(), GuardState::Returning);
                    }
                }
            }

            let chasing = guard.state() == GuardState::Chasing;
            prop_assert_eq!(chasing, guard.chase_reason().is_some());
            if guard.chase_reason() == Some(ChaseReason::Detected) {
                prop_assert!(guard.suspicion() >= 1.0 - 1e-9);
            }
            prop_assert!((0.0..=1.0).contains(&guard.suspicion()));
        }
    }

    #[test]
    fn alert_fan_out_respects_radius(
        positions in prop::collection::vec((-60.0..60.0f64, -60.0..60.0f64), 1..8),
        radius in 1.0..50.0f64,
    ) {
        let mut coordinator = AlertCoordinator::new(AlertConfig {
            alert_radius: radius,
            alert_duration: 10.0,
        });
        let mut guards: BTreeMap<String, Guard<StraightLineMover>> = BTreeMap::new();
        for (index, (x, y)) in positions.iter().enumerate() {
            let id = format!("g{}", index);
            let guard = Guard::new(
                id.clone(),
                StraightLineMover::new(Position3D::new(*x, *y, 0.0), 0.0),
                GuardProfile::default(),
                PatrolRoute::empty(),
                index as u64,
            );
            coordinator.register(&id);
            guards.insert(id, guard);
        }

        coordinator.trigger_alert(Position3D::zero(), Some("g0"), &mut guards);

        for (id, guard) in &guards {
            let within = guard.position().distance_3d(&Position3D::zero()) <= radius;
            let expect_chasing = id != "g0" && within;
            prop_assert_eq!(guard.state() == GuardState::Chasing, expect_chasing);
        }
    }
}
