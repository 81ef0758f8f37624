//! CurvedWorld Core - 4D reference frames for a hyperspherical world
//!
//! The viewer lives on the unit 3-sphere embedded in R^4. Its position and
//! facing are an orthonormal frame of four 4-vectors, advanced every render
//! callback by the head motion a tracker measured since the last one:
//! 1. **Plane rotations**: rotate vectors inside one 2-plane by an exact angle
//! 2. **Frame advance**: translation becomes a great-circle step, rotation
//!    re-orients the tangent basis
//! 3. **Frame store**: one frame per window/eye, safe to share across render
//!    threads

pub mod config;
pub mod error;
pub mod frame;
pub mod frame_advance;
pub mod frame_store;
pub mod plane_rotation;

// Re-export key types for convenience
pub use config::{EngineConfig, InitialPose};
pub use error::{ErrorCategory, PlaneAxis, RotationError, RotationResult};
pub use frame::{Eye, FrameSlot, OrthonormalFrame4, ViewpointId};
pub use frame_advance::{advance, TransformDelta};
pub use frame_store::{FrameStore, ViewpointState};
pub use plane_rotation::{move_in_direction, rotate_in_plane, rotate_shortest_arc, RotationPlane};
