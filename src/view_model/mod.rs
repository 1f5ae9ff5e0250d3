//! The owner that view-models are built from.

mod view_model;

pub use view_model::ViewModel;
