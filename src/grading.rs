//! Grading rule tables: score→grade bands, grade→points, aggregate→division
//! bands, and the remark templates. All tables are ordered data scanned by
//! one generic highest-qualifying-threshold lookup so each can be unit
//! tested on its own.

/// Score→grade bands, descending. First threshold at or below the score wins.
pub const GRADE_BANDS: [(f64, &str); 9] = [
    (90.0, "D1"),
    (80.0, "D2"),
    (70.0, "C3"),
    (60.0, "C4"),
    (55.0, "C5"),
    (50.0, "C6"),
    (45.0, "P7"),
    (40.0, "P8"),
    (0.0, "F9"),
];

/// Score→narrative label for the EOT column on printed reports. Independent
/// of the grade bands so schools can tune one without the other.
pub const EOT_REMARK_BANDS: [(f64, &str); 7] = [
    (90.0, "Excellent"),
    (80.0, "Very good"),
    (70.0, "Good"),
    (60.0, "Fairly good"),
    (50.0, "Fair"),
    (40.0, "More effort needed"),
    (0.0, "Serious improvement needed"),
];

pub const GRADE_NA: &str = "N/A";

pub const DIVISION_ONE: &str = "Division One";
pub const DIVISION_TWO: &str = "Division Two";
pub const DIVISION_THREE: &str = "Division Three";
pub const DIVISION_FOUR: &str = "Division Four";
pub const GRADE_U: &str = "Grade U";
/// Sentinel: no core examination sat at all.
pub const DIVISION_X: &str = "Division X";
pub const UNGRADED: &str = "Ungraded";

/// Aggregate→division bands, inclusive on both ends.
pub const DIVISION_BANDS: [(i64, i64, &str); 5] = [
    (4, 12, DIVISION_ONE),
    (13, 23, DIVISION_TWO),
    (24, 29, DIVISION_THREE),
    (30, 34, DIVISION_FOUR),
    (35, 36, GRADE_U),
];

/// Generic descending scan: first entry whose threshold is at or below
/// `value`. Tables must be sorted by descending threshold.
pub fn highest_qualifying(table: &[(f64, &'static str)], value: f64) -> Option<&'static str> {
    table
        .iter()
        .find(|(threshold, _)| value >= *threshold)
        .map(|(_, label)| *label)
}

/// Any absent, non-numeric or out-of-range score grades as N/A rather
/// than erroring.
pub fn grade_for(score: Option<f64>) -> &'static str {
    match score {
        Some(s) if (0.0..=100.0).contains(&s) => {
            highest_qualifying(&GRADE_BANDS, s).unwrap_or(GRADE_NA)
        }
        _ => GRADE_NA,
    }
}

pub fn eot_remark_for(score: Option<f64>) -> &'static str {
    match score {
        Some(s) if (0.0..=100.0).contains(&s) => {
            highest_qualifying(&EOT_REMARK_BANDS, s).unwrap_or(GRADE_NA)
        }
        _ => GRADE_NA,
    }
}

/// Grade→points. Lower totals are better; N/A contributes nothing.
pub fn points_for(grade: &str) -> i64 {
    match grade {
        "D1" => 1,
        "D2" => 2,
        "C3" => 3,
        "C4" => 4,
        "C5" => 5,
        "C6" => 6,
        "P7" => 7,
        "P8" => 8,
        "F9" => 9,
        _ => 0,
    }
}

/// Division for an upper-level aggregate. `any_core_sat` is false only when
/// every core EOT was missing or invalid, which forces the Division X
/// sentinel regardless of the aggregate.
pub fn division_for(aggregate: i64, any_core_sat: bool) -> &'static str {
    if !any_core_sat {
        return DIVISION_X;
    }
    DIVISION_BANDS
        .iter()
        .find(|(lo, hi, _)| aggregate >= *lo && aggregate <= *hi)
        .map(|(_, _, division)| *division)
        .unwrap_or(UNGRADED)
}

const OUTSTANDING_AGGREGATE: i64 = 6;

const UPPER_CLASS_TEACHER_REMARKS: [(&str, &str); 7] = [
    (DIVISION_ONE, "Very good work this term. Aim even higher."),
    (
        DIVISION_TWO,
        "Good performance. With more effort you can reach the top.",
    ),
    (DIVISION_THREE, "A fair performance. Work harder next term."),
    (
        DIVISION_FOUR,
        "Below expectation. Much more effort is needed.",
    ),
    (
        GRADE_U,
        "A very weak performance. Serious attention is required.",
    ),
    (DIVISION_X, "Did not sit the end of term examinations."),
    (
        UNGRADED,
        "Results incomplete; performance could not be graded.",
    ),
];

const UPPER_HEAD_TEACHER_REMARKS: [(&str, &str); 7] = [
    (DIVISION_ONE, "Very good results. Keep up the momentum."),
    (DIVISION_TWO, "Good results. Aim for Division One next term."),
    (
        DIVISION_THREE,
        "Average results. There is room for improvement.",
    ),
    (
        DIVISION_FOUR,
        "Weak results. Please give your studies more attention.",
    ),
    (
        GRADE_U,
        "Poor results. A serious change of attitude is needed.",
    ),
    (DIVISION_X, "No examination results recorded this term."),
    (UNGRADED, "Incomplete results; unable to grade."),
];

const LOWER_CLASS_TEACHER_REMARKS: [(f64, &str); 6] = [
    (90.0, "Excellent work across all areas. Keep it up."),
    (75.0, "Very good progress this term."),
    (60.0, "Good effort. Keep improving."),
    (45.0, "Fair work. More practice is needed."),
    (30.0, "Weak performance. Needs close support."),
    (0.0, "Struggling across subjects. Needs serious attention."),
];

const LOWER_HEAD_TEACHER_REMARKS: [(f64, &str); 6] = [
    (90.0, "An excellent set of results. Well done."),
    (75.0, "Very good results. Keep aiming higher."),
    (60.0, "Good results. Work towards the top of the class."),
    (45.0, "Average results. More effort is needed."),
    (30.0, "Below average results. Extra support is advised."),
    (0.0, "Very weak results. Parents are asked to give close attention."),
];

fn remark_for_division(table: &[(&str, &'static str)], division: &str) -> &'static str {
    table
        .iter()
        .find(|(d, _)| *d == division)
        .map(|(_, remark)| *remark)
        .unwrap_or("")
}

pub fn class_teacher_remark_upper(division: &str, aggregate: i64) -> &'static str {
    if division == DIVISION_ONE && aggregate <= OUTSTANDING_AGGREGATE {
        return "An outstanding set of results. Keep shining.";
    }
    remark_for_division(&UPPER_CLASS_TEACHER_REMARKS, division)
}

pub fn head_teacher_remark_upper(division: &str, aggregate: i64) -> &'static str {
    if division == DIVISION_ONE && aggregate <= OUTSTANDING_AGGREGATE {
        return "Excellent results. The school is proud of you.";
    }
    remark_for_division(&UPPER_HEAD_TEACHER_REMARKS, division)
}

pub fn class_teacher_remark_lower(average: f64) -> &'static str {
    highest_qualifying(&LOWER_CLASS_TEACHER_REMARKS, average).unwrap_or("")
}

pub fn head_teacher_remark_lower(average: f64) -> &'static str {
    highest_qualifying(&LOWER_HEAD_TEACHER_REMARKS, average).unwrap_or("")
}
