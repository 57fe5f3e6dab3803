//! Class levels, terms and the per-level subject profiles that drive
//! workbook validation and grade computation.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassLevel {
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
    P7,
}

impl ClassLevel {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "P1" => Some(ClassLevel::P1),
            "P2" => Some(ClassLevel::P2),
            "P3" => Some(ClassLevel::P3),
            "P4" => Some(ClassLevel::P4),
            "P5" => Some(ClassLevel::P5),
            "P6" => Some(ClassLevel::P6),
            "P7" => Some(ClassLevel::P7),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ClassLevel::P1 => "P1",
            ClassLevel::P2 => "P2",
            ClassLevel::P3 => "P3",
            ClassLevel::P4 => "P4",
            ClassLevel::P5 => "P5",
            ClassLevel::P6 => "P6",
            ClassLevel::P7 => "P7",
        }
    }

    /// P4-P7 use aggregate/division reporting; P1-P3 use total/average/position.
    pub fn is_upper(&self) -> bool {
        matches!(
            self,
            ClassLevel::P4 | ClassLevel::P5 | ClassLevel::P6 | ClassLevel::P7
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    I,
    II,
    III,
}

impl Term {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "I" | "1" => Some(Term::I),
            "II" | "2" => Some(Term::II),
            "III" | "3" => Some(Term::III),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Term::I => "I",
            Term::II => "II",
            Term::III => "III",
        }
    }
}

/// The four subjects whose end-of-term grades form the upper-level aggregate.
pub const CORE_SUBJECTS: [&str; 4] = ["english", "mtc", "science", "sst"];

const UPPER_REQUIRED: [&str; 4] = ["english", "mtc", "science", "sst"];
const UPPER_OPTIONAL: [&str; 1] = ["kisw"];
const LOWER_REQUIRED: [&str; 7] = ["english", "mtc", "lit1", "lit2", "re", "read", "lug"];
const LOWER_OPTIONAL: [&str; 0] = [];

/// Required and optional subject codes for one class level.
#[derive(Debug, Clone, Copy)]
pub struct SubjectProfile {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl SubjectProfile {
    pub fn for_level(level: ClassLevel) -> Self {
        if level.is_upper() {
            SubjectProfile {
                required: &UPPER_REQUIRED,
                optional: &UPPER_OPTIONAL,
            }
        } else {
            SubjectProfile {
                required: &LOWER_REQUIRED,
                optional: &LOWER_OPTIONAL,
            }
        }
    }

    pub fn is_optional(&self, code: &str) -> bool {
        self.optional.contains(&code)
    }
}

/// Maps a workbook sheet name to an internal subject code. Sheets whose
/// names are not listed here (instructions, cover pages) are ignored.
pub fn subject_code_for_sheet(sheet_name: &str) -> Option<&'static str> {
    let key = sheet_name.trim().to_ascii_lowercase();
    match key.as_str() {
        "english" => Some("english"),
        "mathematics" | "maths" | "mtc" => Some("mtc"),
        "science" => Some("science"),
        "social studies" | "sst" => Some("sst"),
        "kiswahili" => Some("kisw"),
        "literacy i" => Some("lit1"),
        "literacy ii" => Some("lit2"),
        "religious education" | "re" => Some("re"),
        "reading" => Some("read"),
        "luganda" => Some("lug"),
        _ => None,
    }
}

pub fn subject_full_name(code: &str) -> &'static str {
    match code {
        "english" => "English",
        "mtc" => "Mathematics",
        "science" => "Science",
        "sst" => "Social Studies",
        "kisw" => "Kiswahili",
        "lit1" => "Literacy I",
        "lit2" => "Literacy II",
        "re" => "Religious Education",
        "read" => "Reading",
        "lug" => "Luganda",
        _ => "Unknown",
    }
}
