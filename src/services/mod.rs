pub mod schedule;
pub mod search;
pub mod task_order;

pub use schedule::{DayColumn, WeeklyGrid, project};
pub use search::{Field, SearchHit, SearchIndex, SearchItem};
