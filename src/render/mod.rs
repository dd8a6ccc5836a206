pub mod context;
pub mod layout;

pub use context::RenderContext;
pub use layout::{app_layout, centered_rect, centered_rect_fixed, workbench_layout, AppLayout, WorkbenchLayout};
