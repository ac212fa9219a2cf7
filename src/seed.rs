use chrono::NaiveDate;

use crate::models::{CgpaStudent, Department, MarksStudent};

type CgpaSeed = (
    i64,
    &'static str,
    Department,
    f64,
    u8,
    (i32, u32, u32),
    &'static str,
);

const CGPA_SEED: [CgpaSeed; 10] = [
    (1, "Aarav Sharma", Department::Cse, 9.2, 94, (2003, 3, 14), "aarav.sharma@college.edu"),
    (2, "Diya Patel", Department::Ece, 8.4, 88, (2003, 7, 2), "diya.patel@college.edu"),
    (3, "Rohan Mehta", Department::Mech, 6.9, 72, (2002, 11, 21), "rohan.mehta@college.edu"),
    (4, "Ananya Iyer", Department::It, 8.9, 91, (2003, 1, 9), "ananya.iyer@college.edu"),
    (5, "Kabir Singh", Department::Cse, 7.6, 67, (2002, 9, 30), "kabir.singh@college.edu"),
    (6, "Meera Reddy", Department::Ece, 9.5, 97, (2004, 2, 18), "meera.reddy@college.edu"),
    (7, "Vihaan Gupta", Department::Mech, 7.1, 81, (2003, 5, 27), "vihaan.gupta@college.edu"),
    (8, "Ishita Das", Department::It, 6.4, 59, (2003, 12, 5), "ishita.das@college.edu"),
    (9, "Arjun Nair", Department::Cse, 8.1, 85, (2002, 8, 11), "arjun.nair@college.edu"),
    (10, "Saanvi Joshi", Department::Mech, 8.8, 90, (2004, 4, 3), "saanvi.joshi@college.edu"),
];

const MARKS_SEED: [(i64, &str, Department, u8, u8); 10] = [
    (1, "Aarav Sharma", Department::Cse, 92, 94),
    (2, "Diya Patel", Department::Ece, 84, 88),
    (3, "Rohan Mehta", Department::Mech, 69, 72),
    (4, "Ananya Iyer", Department::It, 89, 91),
    (5, "Kabir Singh", Department::Cse, 76, 67),
    (6, "Meera Reddy", Department::Ece, 95, 97),
    (7, "Vihaan Gupta", Department::Mech, 71, 81),
    (8, "Ishita Das", Department::It, 64, 59),
    (9, "Arjun Nair", Department::Cse, 81, 85),
    (10, "Saanvi Joshi", Department::Mech, 88, 90),
];

/// Roster restored by `reset` in the CGPA deployment.
pub fn cgpa_roster() -> Vec<CgpaStudent> {
    CGPA_SEED
        .iter()
        .filter_map(|&(id, name, department, cgpa, attendance, (y, m, d), email)| {
            Some(CgpaStudent {
                id,
                name: name.to_string(),
                department,
                cgpa,
                attendance,
                date_of_birth: NaiveDate::from_ymd_opt(y, m, d)?,
                email: email.to_string(),
            })
        })
        .collect()
}

/// Roster restored by `reset` in the marks deployment.
pub fn marks_roster() -> Vec<MarksStudent> {
    MARKS_SEED
        .iter()
        .map(|&(id, name, department, marks, attendance)| MarksStudent {
            id,
            name: name.to_string(),
            department,
            marks,
            attendance,
        })
        .collect()
}
