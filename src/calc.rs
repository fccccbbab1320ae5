use serde::Serialize;

use crate::store::{Subject, UserProfile};

/// `attended / total * 100`. A subject with no lectures yet sits at 0, not NaN.
pub fn percentage(attended: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(attended) / f64::from(total) * 100.0
}

/// Largest number of consecutive lectures that can be skipped while the
/// recomputed percentage stays at or above `minimum_pct`. Each hypothetical
/// skip grows the denominator by one with `attended` held fixed.
pub fn safe_bunks(attended: u32, total: u32, minimum_pct: f64) -> u32 {
    if percentage(attended, total) <= minimum_pct {
        return 0;
    }
    if minimum_pct <= 0.0 {
        // No floor to fall under; there is no finite answer.
        return u32::MAX;
    }

    // The trial percentage is strictly decreasing in the trial total, so a
    // positive minimum is always reached and the loop exits.
    let mut bunks: u32 = 0;
    let mut trial_total = total;
    while percentage(attended, trial_total + 1) >= minimum_pct {
        bunks += 1;
        trial_total += 1;
    }
    bunks
}

/// With one skip already applied (`total + 1`, `attended` unchanged), the
/// smallest number of consecutive attended lectures that restores the
/// percentage to `minimum_pct`.
pub fn recovery_classes_needed(attended: u32, total: u32, minimum_pct: f64) -> u32 {
    let bunked_total = total + 1;
    if percentage(attended, bunked_total) >= minimum_pct {
        return 0;
    }
    if minimum_pct >= 100.0 {
        // attended stays strictly behind the denominator from here on.
        return u32::MAX;
    }

    // (attended + m) / (bunked_total + m) climbs toward 100, so any minimum
    // below 100 is eventually met.
    let mut needed: u32 = 0;
    while percentage(attended + needed, bunked_total + needed) < minimum_pct {
        needed += 1;
    }
    needed
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub subject_id: String,
    pub subject_name: String,
    pub can_bunk: bool,
    pub current_attendance: f64,
    pub after_bunk_attendance: f64,
    pub minimum_required: f64,
    pub safe_bunks_remaining: u32,
    pub classes_needed_to_recover: u32,
    pub recommendation: String,
}

/// Verdict on skipping exactly one upcoming lecture of `subject`.
pub fn predict(subject: &Subject) -> Prediction {
    let attended = subject.attended_lectures;
    let total = subject.total_lectures;
    let minimum = subject.minimum_attendance;

    let current = percentage(attended, total);
    let after_bunk = percentage(attended, total + 1);
    let can_bunk = after_bunk >= minimum;
    let safe = safe_bunks(attended, total, minimum);
    let to_recover = if can_bunk {
        0
    } else {
        recovery_classes_needed(attended, total, minimum)
    };

    Prediction {
        subject_id: subject.id.clone(),
        subject_name: subject.name.clone(),
        can_bunk,
        current_attendance: current,
        after_bunk_attendance: after_bunk,
        minimum_required: minimum,
        safe_bunks_remaining: safe,
        classes_needed_to_recover: to_recover,
        recommendation: recommendation(can_bunk, after_bunk, minimum, safe, to_recover),
    }
}

/// Order-preserving batch form of [`predict`]. Each verdict reads only its
/// own subject's counters.
pub fn predict_all(subjects: &[Subject]) -> Vec<Prediction> {
    subjects.iter().map(predict).collect()
}

fn recommendation(
    can_bunk: bool,
    after_bunk: f64,
    minimum: f64,
    safe: u32,
    to_recover: u32,
) -> String {
    if can_bunk {
        if safe == u32::MAX {
            "This subject has no minimum to protect; skip freely.".to_string()
        } else if safe > 1 {
            format!(
                "Safe to skip: you would sit at {after_bunk:.1}% with {safe} safe bunks in hand."
            )
        } else if safe == 1 {
            format!("Safe to skip, but this is your last safe bunk before the {minimum:.0}% line.")
        } else {
            format!("Safe to skip: you would sit at {after_bunk:.1}%.")
        }
    } else if to_recover == u32::MAX {
        format!("Do not skip: {minimum:.0}% would be permanently out of reach afterwards.")
    } else {
        format!(
            "Do not skip: you would fall to {after_bunk:.1}% and need {to_recover} consecutive classes to climb back to {minimum:.0}%."
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub subject_id: String,
    pub bunks: u32,
    pub current_attendance: f64,
    pub projected_attendance: f64,
    pub minimum_required: f64,
    pub stays_above_minimum: bool,
}

/// Projection after `bunks` hypothetical consecutive skips.
pub fn simulate(subject: &Subject, bunks: u32) -> Simulation {
    let current = percentage(subject.attended_lectures, subject.total_lectures);
    let projected = percentage(
        subject.attended_lectures,
        subject.total_lectures.saturating_add(bunks),
    );
    Simulation {
        subject_id: subject.id.clone(),
        bunks,
        current_attendance: current,
        projected_attendance: projected,
        minimum_required: subject.minimum_attendance,
        stays_above_minimum: projected >= subject.minimum_attendance,
    }
}

/// Mean of the per-subject percentages. Subjects with no lectures yet
/// contribute 0 rather than being excluded.
pub fn computed_overall(subjects: &[Subject]) -> f64 {
    if subjects.is_empty() {
        return 0.0;
    }
    let sum: f64 = subjects
        .iter()
        .map(|s| percentage(s.attended_lectures, s.total_lectures))
        .sum();
    sum / subjects.len() as f64
}

/// Overall figure for display: the college-reported override when the
/// profile carries one, otherwise the computed mean. Per-subject prediction
/// never consults the override.
pub fn overall_attendance(profile: &UserProfile, subjects: &[Subject]) -> f64 {
    profile
        .current_overall_attendance
        .unwrap_or_else(|| computed_overall(subjects))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Safe,
    Risk,
    Danger,
}

/// Status chip for an attendance figure: Safe at or above the minimum, Risk
/// within 15 points below it, Danger beyond that.
pub fn status_band(pct: f64, minimum: f64) -> Band {
    if pct >= minimum {
        Band::Safe
    } else if pct >= minimum - 15.0 {
        Band::Risk
    } else {
        Band::Danger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(attended: u32, total: u32, minimum: f64) -> Subject {
        Subject {
            id: "s1".to_string(),
            name: "Signals".to_string(),
            total_lectures: total,
            attended_lectures: attended,
            absent_lectures: None,
            minimum_attendance: minimum,
            color: "#3B82F6".to_string(),
        }
    }

    fn profile(override_pct: Option<f64>) -> UserProfile {
        UserProfile {
            name: "Asha".to_string(),
            email: "asha@example.edu".to_string(),
            college: None,
            semester_start: None,
            semester_end: None,
            current_overall_attendance: override_pct,
            overall_minimum_attendance: 75.0,
        }
    }

    #[test]
    fn percentage_is_exact_and_bounded() {
        assert!((percentage(30, 40) - 75.0).abs() < 1e-9);
        assert!((percentage(1, 3) - 100.0 / 3.0).abs() < 1e-9);
        for attended in 0..=20u32 {
            let p = percentage(attended, 20);
            assert!((0.0..=100.0).contains(&p));
        }
    }

    #[test]
    fn percentage_with_zero_total_is_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn safe_bunks_shrink_as_the_minimum_rises() {
        let mut previous = u32::MAX;
        for minimum in [50.0, 60.0, 75.0, 85.0, 95.0] {
            let bunks = safe_bunks(45, 50, minimum);
            assert!(bunks <= previous, "minimum {minimum} grew the budget");
            previous = bunks;
        }
    }

    #[test]
    fn comfortably_above_minimum_can_bunk() {
        let p = predict(&subject(90, 100, 75.0));
        assert!(p.can_bunk);
        assert!(p.safe_bunks_remaining >= 1);
        // 90 attended stays at 75% up to a denominator of 120.
        assert_eq!(p.safe_bunks_remaining, 20);
        assert_eq!(p.classes_needed_to_recover, 0);
    }

    #[test]
    fn exactly_at_minimum_cannot_bunk() {
        let p = predict(&subject(75, 100, 75.0));
        assert!((p.current_attendance - 75.0).abs() < 1e-9);
        assert!((p.after_bunk_attendance - 7500.0 / 101.0).abs() < 1e-9);
        assert!(!p.can_bunk);
        assert_eq!(p.safe_bunks_remaining, 0);
        assert!(p.classes_needed_to_recover > 0);
        assert_eq!(p.classes_needed_to_recover, 3);
    }

    #[test]
    fn boundary_scenario_thirty_of_forty() {
        let p = predict(&subject(30, 40, 75.0));
        assert!((p.current_attendance - 75.0).abs() < 1e-9);
        assert!((p.after_bunk_attendance - 3000.0 / 41.0).abs() < 1e-9);
        assert!(!p.can_bunk);
        assert_eq!(p.safe_bunks_remaining, 0);
        // (30 + 3) / (41 + 3) is exactly 75%.
        assert_eq!(p.classes_needed_to_recover, 3);
    }

    #[test]
    fn zero_lecture_subject_degenerates_cleanly() {
        let p = predict(&subject(0, 0, 75.0));
        assert_eq!(p.current_attendance, 0.0);
        assert_eq!(p.after_bunk_attendance, 0.0);
        assert!(!p.can_bunk);
        assert_eq!(p.safe_bunks_remaining, 0);

        let lax = predict(&subject(0, 0, 0.0));
        assert!(lax.can_bunk);
    }

    #[test]
    fn zero_minimum_has_no_finite_bunk_budget() {
        assert_eq!(safe_bunks(10, 10, 0.0), u32::MAX);
        assert_eq!(safe_bunks(0, 10, 0.0), 0);
    }

    #[test]
    fn full_minimum_is_unrecoverable_after_a_bunk() {
        assert_eq!(recovery_classes_needed(10, 10, 100.0), u32::MAX);
        assert_eq!(recovery_classes_needed(10, 10, 75.0), 0);
    }

    #[test]
    fn predict_all_preserves_order() {
        let subjects = vec![
            subject(90, 100, 75.0),
            subject(30, 40, 75.0),
            subject(0, 0, 75.0),
        ];
        let all = predict_all(&subjects);
        assert_eq!(all.len(), 3);
        assert!(all[0].can_bunk);
        assert!(!all[1].can_bunk);
        assert_eq!(all[2].current_attendance, 0.0);
    }

    #[test]
    fn simulate_projects_consecutive_bunks() {
        let sim = simulate(&subject(30, 40, 75.0), 2);
        assert!((sim.projected_attendance - 3000.0 / 42.0).abs() < 1e-9);
        assert!(!sim.stays_above_minimum);

        let held = simulate(&subject(90, 100, 75.0), 20);
        assert!((held.projected_attendance - 75.0).abs() < 1e-9);
        assert!(held.stays_above_minimum);
    }

    #[test]
    fn reported_overall_supersedes_the_computed_mean() {
        let subjects = vec![subject(30, 40, 75.0), subject(90, 100, 75.0)];
        let computed = overall_attendance(&profile(None), &subjects);
        assert!((computed - (75.0 + 90.0) / 2.0).abs() < 1e-9);

        let reported = overall_attendance(&profile(Some(88.5)), &subjects);
        assert!((reported - 88.5).abs() < 1e-9);
    }

    #[test]
    fn band_cutoffs_track_the_minimum() {
        assert_eq!(status_band(75.0, 75.0), Band::Safe);
        assert_eq!(status_band(74.9, 75.0), Band::Risk);
        assert_eq!(status_band(60.0, 75.0), Band::Risk);
        assert_eq!(status_band(59.9, 75.0), Band::Danger);
        assert_eq!(status_band(50.0, 60.0), Band::Risk);
    }
}
