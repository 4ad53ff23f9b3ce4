use serde::{Deserialize, Serialize};

/// Visitor classification. Decides which intake flow runs and which
/// collection the resulting record lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Student,
    External,
    Parent,
    Alumni,
    Teacher,
}

/// Yes/no question asked of some group categories before the strength step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraQuestion {
    SonInClub,
    WasInClub,
}

impl ExtraQuestion {
    pub fn prompt(&self) -> &'static str {
        match self {
            ExtraQuestion::SonInClub => "お子様は将棋部に所属していますか？",
            ExtraQuestion::WasInClub => "在学中は将棋部に所属していましたか？",
        }
    }

    pub fn column_label(&self) -> &'static str {
        match self {
            ExtraQuestion::SonInClub => "子が将棋部員",
            ExtraQuestion::WasInClub => "元将棋部員",
        }
    }
}

impl Category {
    /// Order used on the main screen and in admin summaries.
    pub const ALL: [Category; 5] = [
        Category::External,
        Category::Student,
        Category::Parent,
        Category::Alumni,
        Category::Teacher,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Student => "在校生",
            Category::External => "外部の方",
            Category::Parent => "保護者の方",
            Category::Alumni => "卒業生の方",
            Category::Teacher => "教職員の方",
        }
    }

    /// Key of the local JSON collection holding this category.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Category::Student => "shogi_studentVisitors",
            Category::External => "shogi_externalVisitors",
            Category::Parent => "shogi_parentVisitors",
            Category::Alumni => "shogi_alumniVisitors",
            Category::Teacher => "shogi_teacherVisitors",
        }
    }

    /// Sub-tree name in the realtime database.
    pub fn remote_path(&self) -> &'static str {
        match self {
            Category::Student => "students",
            Category::External => "external_visitors",
            Category::Parent => "parent_visitors",
            Category::Alumni => "alumni_visitors",
            Category::Teacher => "teacher_visitors",
        }
    }

    pub fn export_file_name(&self) -> &'static str {
        match self {
            Category::Student => "在校生来場者.csv",
            Category::External => "外部来場者.csv",
            Category::Parent => "保護者来場者.csv",
            Category::Alumni => "卒業生来場者.csv",
            Category::Teacher => "教職員来場者.csv",
        }
    }

    /// Students fill in one entry per head; every other category answers
    /// once for the whole group.
    pub fn collects_per_person(&self) -> bool {
        matches!(self, Category::Student)
    }

    pub fn extra_question(&self) -> Option<ExtraQuestion> {
        match self {
            Category::Parent => Some(ExtraQuestion::SonInClub),
            Category::Alumni => Some(ExtraQuestion::WasInClub),
            _ => None,
        }
    }

    /// Digit limit for the custom headcount keypad.
    pub fn max_count_digits(&self) -> usize {
        match self {
            Category::Student => 2,
            _ => 3,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentVisitor {
    pub grade: String,
    pub class: String,
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(rename = "shogiStrength")]
    pub shogi_strength: String,
    pub timestamp: String,
}

/// External guests and staff share the plain group shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVisit {
    pub count: u32,
    #[serde(rename = "shogiStrength")]
    pub shogi_strength: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentVisit {
    pub count: u32,
    #[serde(rename = "shogiStrength")]
    pub shogi_strength: String,
    #[serde(rename = "sonInClub")]
    pub son_in_club: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlumniVisit {
    pub count: u32,
    #[serde(rename = "shogiStrength")]
    pub shogi_strength: String,
    #[serde(rename = "wasInClub")]
    pub was_in_club: bool,
    pub timestamp: String,
}

/// One persisted reception entry. Each variant's shape is fixed; the
/// category is implied by the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitorRecord {
    Student(StudentVisitor),
    External(GroupVisit),
    Parent(ParentVisit),
    Alumni(AlumniVisit),
    Teacher(GroupVisit),
}

impl VisitorRecord {
    pub fn category(&self) -> Category {
        match self {
            VisitorRecord::Student(_) => Category::Student,
            VisitorRecord::External(_) => Category::External,
            VisitorRecord::Parent(_) => Category::Parent,
            VisitorRecord::Alumni(_) => Category::Alumni,
            VisitorRecord::Teacher(_) => Category::Teacher,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            VisitorRecord::Student(s) => &s.timestamp,
            VisitorRecord::External(g) | VisitorRecord::Teacher(g) => &g.timestamp,
            VisitorRecord::Parent(p) => &p.timestamp,
            VisitorRecord::Alumni(a) => &a.timestamp,
        }
    }

    pub fn shogi_strength(&self) -> &str {
        match self {
            VisitorRecord::Student(s) => &s.shogi_strength,
            VisitorRecord::External(g) | VisitorRecord::Teacher(g) => &g.shogi_strength,
            VisitorRecord::Parent(p) => &p.shogi_strength,
            VisitorRecord::Alumni(a) => &a.shogi_strength,
        }
    }

    /// Number of people this record stands for.
    pub fn headcount(&self) -> u32 {
        match self {
            VisitorRecord::Student(_) => 1,
            VisitorRecord::External(g) | VisitorRecord::Teacher(g) => g.count,
            VisitorRecord::Parent(p) => p.count,
            VisitorRecord::Alumni(a) => a.count,
        }
    }

    /// Answer to the category's extra question, if it has one.
    pub fn extra_answer(&self) -> Option<bool> {
        match self {
            VisitorRecord::Parent(p) => Some(p.son_in_club),
            VisitorRecord::Alumni(a) => Some(a.was_in_club),
            _ => None,
        }
    }

    /// Short human description used in tables and the confirm screen.
    pub fn describe(&self) -> String {
        match self {
            VisitorRecord::Student(s) => format!("{} {}組 {}番", s.grade, s.class, s.student_id),
            _ => format!("{}名様", self.headcount()),
        }
    }

    /// Read a stored child of `category`'s collection. Fields the record
    /// shape does not know about are ignored.
    pub fn from_json(category: Category, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match category {
            Category::Student => VisitorRecord::Student(serde_json::from_value(value)?),
            Category::External => VisitorRecord::External(serde_json::from_value(value)?),
            Category::Parent => VisitorRecord::Parent(serde_json::from_value(value)?),
            Category::Alumni => VisitorRecord::Alumni(serde_json::from_value(value)?),
            Category::Teacher => VisitorRecord::Teacher(serde_json::from_value(value)?),
        })
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            VisitorRecord::Student(s) => serde_json::to_value(s),
            VisitorRecord::External(g) | VisitorRecord::Teacher(g) => serde_json::to_value(g),
            VisitorRecord::Parent(p) => serde_json::to_value(p),
            VisitorRecord::Alumni(a) => serde_json::to_value(a),
        }
    }
}

/// All visitor collections, one list per category, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorLists {
    pub students: Vec<StudentVisitor>,
    pub external: Vec<GroupVisit>,
    pub parents: Vec<ParentVisit>,
    pub alumni: Vec<AlumniVisit>,
    pub teachers: Vec<GroupVisit>,
}

impl VisitorLists {
    pub fn push(&mut self, record: VisitorRecord) {
        match record {
            VisitorRecord::Student(s) => self.students.push(s),
            VisitorRecord::External(g) => self.external.push(g),
            VisitorRecord::Parent(p) => self.parents.push(p),
            VisitorRecord::Alumni(a) => self.alumni.push(a),
            VisitorRecord::Teacher(g) => self.teachers.push(g),
        }
    }

    /// Remove the first record equal to `record`. Returns whether one was found.
    pub fn remove(&mut self, record: &VisitorRecord) -> bool {
        fn remove_first<T: PartialEq>(list: &mut Vec<T>, item: &T) -> bool {
            match list.iter().position(|x| x == item) {
                Some(pos) => {
                    list.remove(pos);
                    true
                }
                None => false,
            }
        }

        match record {
            VisitorRecord::Student(s) => remove_first(&mut self.students, s),
            VisitorRecord::External(g) => remove_first(&mut self.external, g),
            VisitorRecord::Parent(p) => remove_first(&mut self.parents, p),
            VisitorRecord::Alumni(a) => remove_first(&mut self.alumni, a),
            VisitorRecord::Teacher(g) => remove_first(&mut self.teachers, g),
        }
    }

    pub fn records(&self, category: Category) -> Vec<VisitorRecord> {
        match category {
            Category::Student => self.students.iter().cloned().map(VisitorRecord::Student).collect(),
            Category::External => self.external.iter().cloned().map(VisitorRecord::External).collect(),
            Category::Parent => self.parents.iter().cloned().map(VisitorRecord::Parent).collect(),
            Category::Alumni => self.alumni.iter().cloned().map(VisitorRecord::Alumni).collect(),
            Category::Teacher => self.teachers.iter().cloned().map(VisitorRecord::Teacher).collect(),
        }
    }

    /// Records of one category, newest first.
    pub fn records_newest_first(&self, category: Category) -> Vec<VisitorRecord> {
        let mut records = self.records(category);
        // Equal timestamps keep the latest insertion on top.
        records.reverse();
        records.sort_by(|a, b| b.timestamp().cmp(a.timestamp()));
        records
    }

    pub fn len(&self, category: Category) -> usize {
        match category {
            Category::Student => self.students.len(),
            Category::External => self.external.len(),
            Category::Parent => self.parents.len(),
            Category::Alumni => self.alumni.len(),
            Category::Teacher => self.teachers.len(),
        }
    }

    pub fn headcount(&self, category: Category) -> u32 {
        match category {
            Category::Student => self.students.len() as u32,
            Category::External => self.external.iter().map(|g| g.count).sum(),
            Category::Parent => self.parents.iter().map(|p| p.count).sum(),
            Category::Alumni => self.alumni.iter().map(|a| a.count).sum(),
            Category::Teacher => self.teachers.iter().map(|g| g.count).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.len(*c) == 0)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
