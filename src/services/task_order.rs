use crate::models::Task;

/// Incomplete tasks first. The sort is stable, so the store's due-date order
/// survives inside each group.
pub fn order(tasks: &[Task]) -> Vec<Task> {
    let mut ordered = tasks.to_vec();
    ordered.sort_by_key(|task| task.completed);
    ordered
}
