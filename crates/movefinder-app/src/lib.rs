// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod draft;
pub mod estimate;
pub mod ids;
pub mod model;
pub mod ports;
pub mod session;
pub mod state;
pub mod steps;
pub mod tracking;
pub mod validation;

pub use draft::*;
pub use estimate::*;
pub use ids::*;
pub use model::*;
pub use ports::*;
pub use session::*;
pub use state::*;
pub use steps::*;
pub use tracking::*;
pub use validation::*;
