use serde::Serialize;

use crate::models::Lecture;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayColumn {
    pub day: String,
    pub lectures: Vec<Lecture>,
}

/// Lectures bucketed by weekday, columns in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyGrid {
    pub days: Vec<DayColumn>,
}

impl WeeklyGrid {
    pub fn day(&self, label: &str) -> Option<&[Lecture]> {
        self.days
            .iter()
            .find(|column| column.day == label)
            .map(|column| column.lectures.as_slice())
    }

    pub fn lecture_count(&self) -> usize {
        self.days.iter().map(|column| column.lectures.len()).sum()
    }
}

/// Buckets lectures by exact `day` label. Within a day the input (fetch)
/// order is kept; lectures are not re-sorted by time.
pub fn project(lectures: &[Lecture], days: &[&str]) -> WeeklyGrid {
    let days = days
        .iter()
        .map(|day| DayColumn {
            day: (*day).to_string(),
            lectures: lectures
                .iter()
                .filter(|lecture| lecture.day == *day)
                .cloned()
                .collect(),
        })
        .collect();
    WeeklyGrid { days }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WEEKDAYS;
    use uuid::Uuid;

    fn lecture(id: i64, day: &str, time: &str) -> Lecture {
        Lecture {
            id,
            owner_id: Uuid::nil(),
            subject: format!("subject-{}", id),
            day: day.to_string(),
            time: time.to_string(),
            location: None,
        }
    }

    #[test]
    fn empty_input_yields_all_days_empty() {
        let grid = project(&[], &WEEKDAYS);
        assert_eq!(grid.days.len(), 7);
        for (column, label) in grid.days.iter().zip(WEEKDAYS) {
            assert_eq!(column.day, label);
            assert!(column.lectures.is_empty());
        }
    }

    #[test]
    fn partitions_lectures_by_day() {
        let lectures = vec![
            lecture(1, "الأحد", "10:00"),
            lecture(2, "الخميس", "08:00"),
            lecture(3, "الأحد", "09:00"),
            lecture(4, "السبت", "12:00"),
        ];
        let grid = project(&lectures, &WEEKDAYS);

        assert_eq!(grid.lecture_count(), lectures.len());
        let mut seen: Vec<i64> = grid
            .days
            .iter()
            .flat_map(|c| c.lectures.iter().map(|l| l.id))
            .collect();
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[test]
    fn keeps_fetch_order_within_a_day() {
        let lectures = vec![lecture(1, "الأحد", "10:00"), lecture(2, "الأحد", "09:00")];
        let grid = project(&lectures, &WEEKDAYS);
        let sunday: Vec<i64> = grid.day("الأحد").unwrap().iter().map(|l| l.id).collect();
        assert_eq!(sunday, vec![1, 2]);
    }

    #[test]
    fn day_labels_must_match_exactly() {
        let lectures = vec![lecture(1, "الأحد ", "10:00"), lecture(2, "Sunday", "10:00")];
        let grid = project(&lectures, &WEEKDAYS);
        assert_eq!(grid.lecture_count(), 0);
    }
}
