//! Decoding task definitions.
//!
//! A [`DecodingTask`] names a subset of trials (equality conditions on
//! trial-table columns) and the column whose two values are to be told
//! apart.  The three task sets differ only in which contrasts they list.
use crate::trialinfo::{col, TrialInfo};

#[derive(Debug, Clone, PartialEq)]
pub struct DecodingTask {
    pub label: String,
    /// `(column, value)` pairs that must all hold for a trial to enter.
    pub conditions: Vec<(usize, f64)>,
    /// Column holding the class labels.
    pub y_col: usize,
}

impl DecodingTask {
    pub fn new(label: impl Into<String>, conditions: Vec<(usize, f64)>, y_col: usize) -> Self {
        Self { label: label.into(), conditions, y_col }
    }

    pub fn trial_mask(&self, info: &TrialInfo) -> Vec<bool> {
        info.table
            .rows()
            .into_iter()
            .map(|r| self.conditions.iter().all(|&(c, v)| r[c] == v))
            .collect()
    }
}

const STANDARD: (usize, f64) = (col::BONUSTRIAL, 0.0);
const BONUS: (usize, f64) = (col::BONUSTRIAL, 1.0);
const REPEAT: (usize, f64) = (col::TASK_SWITCH, 0.0);
const SWITCH: (usize, f64) = (col::TASK_SWITCH, 1.0);
const COLOR: (usize, f64) = (col::TILT_TASK, 0.0);
const TILT: (usize, f64) = (col::TILT_TASK, 1.0);

/// Families decoded in every cell of a 2 × 2 design, with their label column.
pub const FAMILIES: [(&str, usize); 5] = [
    ("task", col::TILT_TASK),
    ("cue", col::CUE_AX),
    ("response", col::RESPONSE_SIDE),
    ("target", col::POSITION_TARGET),
    ("distractor", col::POSITION_DISTRACTOR),
];

/// Label of one cell of a family: `{family}_in_{a}_in_{b}`.
pub fn cell_label(family: &str, a: &str, b: &str) -> String {
    format!("{family}_in_{a}_in_{b}")
}

fn bonus_and_task() -> Vec<DecodingTask> {
    vec![
        DecodingTask::new("bonus_vs_standard_in_repeat", vec![REPEAT], col::BONUSTRIAL),
        DecodingTask::new("bonus_vs_standard_in_switch", vec![SWITCH], col::BONUSTRIAL),
        DecodingTask::new("task_in_repeat_in_standard", vec![REPEAT, STANDARD], col::TILT_TASK),
        DecodingTask::new("task_in_repeat_in_bonus", vec![REPEAT, BONUS], col::TILT_TASK),
        DecodingTask::new("task_in_switch_in_standard", vec![SWITCH, STANDARD], col::TILT_TASK),
        DecodingTask::new("task_in_switch_in_bonus", vec![SWITCH, BONUS], col::TILT_TASK),
    ]
}

/// Tasks decoded from time-frequency power: reward and task set.
pub fn ersp_tasks() -> Vec<DecodingTask> {
    bonus_and_task()
}

/// Tasks decoded from voltage time-courses: reward and task set, plus cue,
/// response, target and distractor within reward × task cells.
pub fn erp_tasks() -> Vec<DecodingTask> {
    let mut tasks = bonus_and_task();
    for (family, y_col) in FAMILIES.iter().skip(1) {
        for (a_name, a) in [("standard", STANDARD), ("bonus", BONUS)] {
            for (b_name, b) in [("color", COLOR), ("tilt", TILT)] {
                tasks.push(DecodingTask::new(cell_label(family, a_name, b_name), vec![a, b], *y_col));
            }
        }
    }
    tasks
}

/// Every family within reward × switch cells, the layout the across-subject
/// statistics expect.
pub fn factorial_tasks() -> Vec<DecodingTask> {
    let mut tasks = Vec::with_capacity(FAMILIES.len() * 4);
    for (family, y_col) in FAMILIES {
        for (a_name, a) in [("standard", STANDARD), ("bonus", BONUS)] {
            for (b_name, b) in [("repeat", REPEAT), ("switch", SWITCH)] {
                tasks.push(DecodingTask::new(cell_label(family, a_name, b_name), vec![a, b], y_col));
            }
        }
    }
    tasks
}
