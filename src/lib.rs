#![allow(non_snake_case)]

pub mod config;
pub mod controller;
pub mod models;
pub mod services;
pub mod state;

pub use controller::{ControllerError, DashboardController};
pub use services::assistant_api::{ApiError, AssistantApi, AssistantClient};
pub use state::{DashboardState, Selection, StagedUpload};
