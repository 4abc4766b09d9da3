//! Aggregate progress statistics for a project.

use crate::model::{Project, Stats};

/// Recount totals from scratch. `progress` is `round(answered / total * 100)`
/// and `0` for an empty project.
pub fn compute(project: &Project) -> Stats {
    let mut stats = Stats::default();
    for (_, question) in project.questions() {
        stats.total_questions += 1;
        if question.is_answered() {
            stats.answered += 1;
        }
        if question.is_approved() {
            stats.approved += 1;
        }
    }
    stats.progress = progress_pct(stats.answered, stats.total_questions);
    stats
}

/// Whole-number percentage, rounded half away from zero.
pub fn progress_pct(answered: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (answered as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}
