//! Asset preparation for a web 3D engine: LOD/collider grouping, rigidbody
//! hierarchy construction, `.hyp` container import and GLB exchange.

pub mod app;
pub mod geometry;
pub mod glb;
pub mod grouping;
pub mod hyp;
pub mod naming;
pub mod properties;
pub mod rename;
pub mod rig;
pub mod rigidbody;
pub mod scene;
pub mod snap;
pub mod ui;

pub use app::{App, Codecs, CommandError, CommandOutcome, SceneCommand};
pub use scene::{ObjectId, SceneState};
