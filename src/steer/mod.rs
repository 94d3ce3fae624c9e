//! Steering pipeline
//!
//! Leaf-first: the geometry kernel, the edge classifier, the direction
//! optimizer, the approach planner and the feedback controller, wired
//! together per tick by `control`.

pub mod approach;
pub mod batch;
pub mod control;
pub mod edges;
pub mod geometry;
pub mod optimize;
pub mod pid;

pub use approach::{ApproachCurve, plan_approach};
pub use batch::control_batch;
pub use control::{TickInput, TickOutput, control};
pub use edges::{EdgeBuckets, Segment, classify_edges};
pub use optimize::optimize_direction;
pub use pid::{SteeringCommand, SteeringMode, SteeringTarget, steer};
