//! Multi-tick walks through small worlds

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use pathsteer::{
    MovementPlane, MovementSettings, PersistentState, Segment, SteeringMode, TickInput, control,
    control_batch,
};

const DT: f32 = 1.0 / 60.0;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Integrates tick outputs for one agent heading to a single end point
#[derive(Debug, Clone)]
struct Walker {
    position: Vec2,
    rotation: f32,
    speed: f32,
    end: Vec2,
    facing: Option<Vec2>,
    agent_radius: f32,
    state: PersistentState,
}

impl Walker {
    fn new(position: Vec2, rotation: f32, end: Vec2) -> Self {
        Self {
            position,
            rotation,
            speed: 0.0,
            end,
            facing: None,
            agent_radius: 0.5,
            state: PersistentState::new(),
        }
    }

    fn input<'a>(&self, edges: &'a [Segment]) -> TickInput<'a> {
        TickInput {
            position: self.position.extend(0.0),
            speed: self.speed,
            rotation: self.rotation,
            remaining_distance: self.position.distance(self.end),
            next_corner: self.end.extend(0.0),
            end_of_path: self.end.extend(0.0),
            facing_direction_at_end_of_path: self.facing.map(|f| f.extend(0.0)),
            agent_radius: self.agent_radius,
            edges,
            plane: MovementPlane::XY,
            dt: DT,
        }
    }

    fn step(&mut self, settings: &MovementSettings, edges: &[Segment]) -> SteeringMode {
        let (output, next) = control(settings, &self.input(edges), self.state);
        self.apply(output.position_delta, output.rotation_delta);
        self.state = next;
        output.mode
    }

    fn apply(&mut self, delta: Vec2, rotation_delta: f32) {
        self.position += delta;
        self.rotation += rotation_delta;
        self.speed = delta.length() / DT;
    }
}

#[test]
fn test_deceleration_is_monotonic() {
    init_logging();
    let settings = MovementSettings::default();
    let mut walker = Walker::new(Vec2::ZERO, 0.0, Vec2::new(10.0, 0.0));

    let mut peak = 0.0f32;
    let mut braking = false;
    for _ in 0..600 {
        walker.step(&settings, &[]);
        if walker.speed + 1e-5 < peak {
            braking = true;
        }
        if braking {
            assert!(walker.speed <= peak + 1e-5, "speed rose again while braking");
        }
        peak = if braking { walker.speed } else { peak.max(walker.speed) };
        assert!(walker.speed <= settings.speed + 1e-4);
    }
    assert!(braking);
    assert!(walker.position.distance(walker.end) < 1e-3);
    assert!(walker.position.y.abs() < 1e-5);
}

#[test]
fn test_walks_past_a_wall_without_touching_it() {
    init_logging();
    let settings = MovementSettings::default();
    let wall = [Segment::new(Vec2::new(5.0, -0.3), Vec2::new(15.0, -0.3))];
    let mut walker = Walker::new(Vec2::ZERO, 0.0, Vec2::new(20.0, 0.0));
    walker.state.max_desired_wall_distance = settings.desired_wall_distance;

    let mut highest = f32::NEG_INFINITY;
    for _ in 0..1200 {
        walker.step(&settings, &wall);
        if (5.0..=15.0).contains(&walker.position.x) {
            assert!(walker.position.y > -0.3, "crossed the wall at {:?}", walker.position);
            highest = highest.max(walker.position.y);
        }
    }
    assert!(highest > 0.05, "never moved away from the wall: {highest}");
    assert!(walker.position.distance(walker.end) < 0.05);
}

#[test]
fn test_centered_corridor_stays_centered() {
    init_logging();
    let settings = MovementSettings::default();
    let walls = [
        Segment::new(Vec2::new(-1.0, 1.0), Vec2::new(30.0, 1.0)),
        Segment::new(Vec2::new(30.0, -1.0), Vec2::new(-1.0, -1.0)),
    ];
    let mut walker = Walker::new(Vec2::ZERO, 0.0, Vec2::new(25.0, 0.0));

    for _ in 0..900 {
        walker.step(&settings, &walls);
        assert!(walker.position.y.abs() < 0.5, "drifted to {:?}", walker.position);
    }
    assert!(walker.position.distance(walker.end) < 0.05);
}

#[test]
fn test_turns_around_in_place() {
    init_logging();
    let settings = MovementSettings::default();
    let mut walker = Walker::new(Vec2::ZERO, 0.0, Vec2::new(-10.0, 0.0));
    walker.speed = settings.speed;

    let modes: Vec<_> = (0..120).map(|_| walker.step(&settings, &[])).collect();
    assert_eq!(modes[0], SteeringMode::RotatingInPlace);
    assert!(modes.iter().skip(60).all(|m| *m == SteeringMode::Cruising));
    assert!(walker.position.x < -1.0);
}

#[test]
fn test_arrives_facing_the_requested_direction() {
    init_logging();
    let settings = MovementSettings::default();
    let mut walker = Walker::new(Vec2::ZERO, 0.0, Vec2::new(6.0, 4.0));
    walker.facing = Some(Vec2::Y);

    let modes: Vec<_> = (0..900).map(|_| walker.step(&settings, &[])).collect();
    assert!(walker.position.distance(walker.end) < 0.05);
    let facing_error = pathsteer::normalize_angle(walker.rotation - std::f32::consts::FRAC_PI_2);
    assert!(facing_error.abs() < 0.05, "ended facing {}", walker.rotation);

    // Turn on the spot, cruise, then arrive; no flipping back and forth
    let switches = modes.windows(2).filter(|w| w[0] != w[1]).count();
    assert!(switches <= 3, "mode switched {switches} times");
    assert_eq!(modes.last(), Some(&SteeringMode::ArrivalSlowdown));
}

#[test]
fn test_final_approach_on_the_facing_line_keeps_moving() {
    init_logging();
    let settings = MovementSettings::default();
    // Already lined up just short of the destination
    let mut walker = Walker::new(
        Vec2::new(6.0, 3.5),
        std::f32::consts::FRAC_PI_2,
        Vec2::new(6.0, 4.0),
    );
    walker.speed = 1.0;
    walker.facing = Some(Vec2::Y);

    let mut arrived_at = None;
    for tick in 0..300 {
        let before = walker.position.distance(walker.end);
        let mode = walker.step(&settings, &[]);
        assert_ne!(mode, SteeringMode::RotatingInPlace, "spun at tick {tick}");
        assert!(walker.position.distance(walker.end) <= before + 1e-5);
        assert!((walker.position.x - 6.0).abs() < 1e-3, "left the line at {:?}", walker.position);
        if mode == SteeringMode::ArrivalSlowdown && arrived_at.is_none() {
            arrived_at = Some(tick);
        }
    }
    assert!(arrived_at.is_some());
    assert!(walker.position.distance(walker.end) < 0.05);
}

/// Random edge soups and start points; every tick must stay finite and within caps
#[test]
fn test_seeded_random_walks_stay_sane() {
    init_logging();
    let mut rng = Pcg32::seed_from_u64(0x5EED);
    let settings = MovementSettings::default();
    let max_rotation = settings.max_rotation_speed.to_radians() * DT;
    let max_on_spot_rotation = settings.max_on_spot_rotation_speed.to_radians() * DT;

    for _ in 0..20 {
        let edges: Vec<Segment> = (0..rng.random_range(0..30))
            .map(|_| {
                let a = Vec2::new(rng.random_range(-15.0..15.0), rng.random_range(-15.0..15.0));
                let b = a + Vec2::new(rng.random_range(-4.0..4.0), rng.random_range(-4.0..4.0));
                Segment::new(a, b)
            })
            .collect();
        let start = Vec2::new(rng.random_range(-10.0..10.0), rng.random_range(-10.0..10.0));
        let end = Vec2::new(rng.random_range(-10.0..10.0), rng.random_range(-10.0..10.0));
        let mut walker = Walker::new(start, rng.random_range(-3.0..3.0), end);
        if rng.random_bool(0.5) {
            walker.facing = Some(Vec2::from_angle(rng.random_range(-3.0..3.0)));
        }

        for _ in 0..300 {
            let (output, next) = control(&settings, &walker.input(&edges), walker.state);
            assert!(output.position_delta.is_finite());
            assert!(output.rotation_delta.is_finite());
            let cap = if output.mode == SteeringMode::RotatingInPlace {
                max_on_spot_rotation
            } else {
                max_rotation
            };
            assert!(output.rotation_delta.abs() <= cap + 1e-5);
            let remaining = walker.position.distance(walker.end);
            assert!(output.position_delta.length() <= settings.speed_at(remaining) * DT + 1e-4);
            assert!(next.max_desired_wall_distance <= settings.desired_wall_distance + 1e-6);
            walker.apply(output.position_delta, output.rotation_delta);
            walker.state = next;
        }
    }
}

#[test]
fn test_batch_walk_matches_single_walks() {
    init_logging();
    let settings = MovementSettings::default();
    let walls = [Segment::new(Vec2::new(3.0, 0.4), Vec2::new(9.0, 0.4))];
    let mut singles: Vec<Walker> = (0..8)
        .map(|i| Walker::new(Vec2::new(0.0, i as f32 * 0.2), 0.0, Vec2::new(12.0, 0.0)))
        .collect();
    let mut batched = singles.clone();

    for _ in 0..120 {
        for walker in &mut singles {
            walker.step(&settings, &walls);
        }

        let inputs: Vec<_> = batched.iter().map(|w| w.input(&walls)).collect();
        let mut states: Vec<_> = batched.iter().map(|w| w.state).collect();
        let outputs = control_batch(&settings, &inputs, &mut states);
        for ((walker, output), state) in batched.iter_mut().zip(outputs).zip(states) {
            walker.apply(output.position_delta, output.rotation_delta);
            walker.state = state;
        }
    }

    for (single, batch) in singles.iter().zip(&batched) {
        assert_eq!(single.position, batch.position);
        assert_eq!(single.rotation, batch.rotation);
    }
}
