// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mobility services: sensor/driver state shells over the mobility wire
//! formats.

pub mod local_pose;
pub mod velocity_state;
pub mod waypoint_driver;
pub mod waypoint_list_driver;

pub use local_pose::LocalPoseSensorService;
pub use velocity_state::VelocityStateSensorService;
pub use waypoint_driver::LocalWaypointDriverService;
pub use waypoint_list_driver::LocalWaypointListDriverService;
