//! Intake wizard: the multi-step form a visitor walks through.
//!
//! The wizard is an explicit state machine. `Step` names where the visitor
//! is, `Action` names what they did, and [`Wizard::apply`] is the single
//! transition function. Every action is applied to a scratch copy of the
//! state and committed only when it succeeds, so a refused action never
//! leaves anything half-changed.
//!
//! Flows per category:
//!
//! - Student: `Count -> Person(0..n) -> Strength -> Confirm`
//! - Parent / Alumni: `Count -> ExtraQuestion -> Strength -> Confirm`
//! - External / Teacher: `Count -> Strength -> Confirm`
//!
//! [`Wizard::submit`] turns a confirmed draft into records and parks the
//! wizard in `Submitted` until the caller reports the write outcome.

pub mod error;
pub mod keypad;

use std::sync::Arc;

use tracing::debug;

pub use error::ValidationError;
pub use keypad::Keypad;

use crate::catalog::Catalog;
use crate::models::{
    AlumniVisit, Category, GroupVisit, ParentVisit, StudentVisitor, VisitorRecord,
};

/// Digit limit for a student's attendance number.
pub const STUDENT_ID_DIGITS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountEntry {
    QuickPick,
    Keypad(Keypad),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthStage {
    Coarse,
    Fine { tier: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Count(CountEntry),
    ExtraQuestion,
    /// Entering person `index`. With `editing` set, finishing returns to Confirm.
    Person { index: usize, editing: bool },
    Strength(StrengthStage),
    Confirm,
    Submitted,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Count(_) => "count",
            Step::ExtraQuestion => "extra_question",
            Step::Person { .. } => "person",
            Step::Strength(_) => "strength",
            Step::Confirm => "confirm",
            Step::Submitted => "submitted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PickCount(u32),
    OpenKeypad,
    Digit(char),
    Backspace,
    Clear,
    ConfirmCount,
    Answer(bool),
    SelectGrade(usize),
    SelectClass(usize),
    NextPerson,
    ChooseTier(usize),
    ChooseRank(usize),
    ToggleConsent,
    Edit(usize),
    Back,
}

/// What a successful action did to the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Input changed inside the current step.
    Stayed,
    /// The wizard moved to another step.
    Moved,
    /// Backed out of the first step; the caller should drop the wizard.
    Exited,
}

/// A completed student entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentEntry {
    pub grade: String,
    pub class: String,
    pub student_id: String,
}

/// Working copy of the person currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonDraft {
    pub grade: Option<String>,
    pub class: Option<String>,
    pub student_id: Keypad,
}

impl Default for PersonDraft {
    fn default() -> Self {
        Self {
            grade: None,
            class: None,
            student_id: Keypad::new(STUDENT_ID_DIGITS),
        }
    }
}

impl PersonDraft {
    fn from_entry(entry: &StudentEntry) -> Self {
        Self {
            grade: Some(entry.grade.clone()),
            class: Some(entry.class.clone()),
            student_id: Keypad::with_value(&entry.student_id, STUDENT_ID_DIGITS),
        }
    }

    /// Check fields in screen order and report the first one missing.
    fn validate(&self) -> Result<StudentEntry, ValidationError> {
        let grade = self.grade.clone().ok_or(ValidationError::MissingGrade)?;
        let class = self.class.clone().ok_or(ValidationError::MissingClass)?;
        if self.student_id.is_empty() {
            return Err(ValidationError::MissingStudentId);
        }
        Ok(StudentEntry {
            grade,
            class,
            student_id: self.student_id.value().to_string(),
        })
    }
}

/// Unsaved input for one reception. Never written to a store directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardDraft {
    pub count: Option<u32>,
    pub people: Vec<Option<StudentEntry>>,
    pub current: PersonDraft,
    pub extra_answer: Option<bool>,
    pub strength: Option<String>,
    pub consent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct State {
    step: Step,
    draft: WizardDraft,
}

pub struct Wizard {
    category: Category,
    catalog: Arc<Catalog>,
    state: State,
}

impl Wizard {
    pub fn new(category: Category, catalog: Arc<Catalog>) -> Self {
        Self {
            category,
            catalog,
            state: State {
                step: Step::Count(CountEntry::QuickPick),
                draft: WizardDraft::default(),
            },
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn step(&self) -> &Step {
        &self.state.step
    }

    pub fn draft(&self) -> &WizardDraft {
        &self.state.draft
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state.step, Step::Submitted)
    }

    /// Submit is enabled only on Confirm with consent given.
    pub fn can_submit(&self) -> bool {
        matches!(self.state.step, Step::Confirm) && self.state.draft.consent
    }

    /// Apply one visitor action. On error the wizard is unchanged.
    pub fn apply(&mut self, action: Action) -> Result<Transition, ValidationError> {
        let mut next = self.state.clone();
        let from = next.step.name();
        let transition = self.transition(&mut next, action)?;
        debug!(
            category = ?self.category,
            from,
            to = next.step.name(),
            ?transition,
            "Wizard transition"
        );
        self.state = next;
        Ok(transition)
    }

    fn transition(&self, state: &mut State, action: Action) -> Result<Transition, ValidationError> {
        let category = self.category;
        let catalog = &self.catalog;

        match (&mut state.step, action) {
            (Step::Submitted, _) => Err(ValidationError::SubmissionInFlight),

            // ----- Count -----
            (Step::Count(CountEntry::QuickPick), Action::PickCount(n)) => {
                if n == 0 {
                    return Err(ValidationError::InvalidCount);
                }
                Self::accept_count(category, state, n);
                Ok(Transition::Moved)
            }
            (Step::Count(CountEntry::QuickPick), Action::OpenKeypad) => {
                state.step = Step::Count(CountEntry::Keypad(Keypad::new(
                    category.max_count_digits(),
                )));
                Ok(Transition::Moved)
            }
            (Step::Count(CountEntry::QuickPick), Action::Back) => Ok(Transition::Exited),
            (Step::Count(CountEntry::Keypad(keypad)), Action::Digit(c)) => {
                keypad.press(c);
                Ok(Transition::Stayed)
            }
            (Step::Count(CountEntry::Keypad(keypad)), Action::Backspace) => {
                keypad.backspace();
                Ok(Transition::Stayed)
            }
            (Step::Count(CountEntry::Keypad(keypad)), Action::Clear) => {
                keypad.clear();
                Ok(Transition::Stayed)
            }
            (Step::Count(CountEntry::Keypad(keypad)), Action::ConfirmCount) => {
                let n = keypad.positive().ok_or(ValidationError::InvalidCount)?;
                Self::accept_count(category, state, n);
                Ok(Transition::Moved)
            }
            (Step::Count(CountEntry::Keypad(_)), Action::Back) => {
                state.step = Step::Count(CountEntry::QuickPick);
                Ok(Transition::Moved)
            }

            // ----- Extra question -----
            (Step::ExtraQuestion, Action::Answer(answer)) => {
                state.draft.extra_answer = Some(answer);
                state.step = Step::Strength(StrengthStage::Coarse);
                Ok(Transition::Moved)
            }
            (Step::ExtraQuestion, Action::Back) => {
                state.step = Step::Count(CountEntry::QuickPick);
                Ok(Transition::Moved)
            }

            // ----- Per-person input -----
            (Step::Person { .. }, Action::SelectGrade(i)) => {
                let grade = catalog.grades.get(i).ok_or(ValidationError::UnknownChoice)?;
                state.draft.current.grade = Some(grade.clone());
                Ok(Transition::Stayed)
            }
            (Step::Person { .. }, Action::SelectClass(i)) => {
                let class = catalog.classes.get(i).ok_or(ValidationError::UnknownChoice)?;
                state.draft.current.class = Some(class.clone());
                Ok(Transition::Stayed)
            }
            (Step::Person { .. }, Action::Digit(c)) => {
                state.draft.current.student_id.press(c);
                Ok(Transition::Stayed)
            }
            (Step::Person { .. }, Action::Backspace) => {
                state.draft.current.student_id.backspace();
                Ok(Transition::Stayed)
            }
            (Step::Person { .. }, Action::Clear) => {
                state.draft.current.student_id.clear();
                Ok(Transition::Stayed)
            }
            (Step::Person { index, editing }, Action::NextPerson) => {
                let (index, editing) = (*index, *editing);
                let entry = state.draft.current.validate()?;
                let slot = state
                    .draft
                    .people
                    .get_mut(index)
                    .ok_or(ValidationError::NotAllowed)?;
                *slot = Some(entry);

                if editing {
                    state.draft.current = PersonDraft::default();
                    state.step = Step::Confirm;
                } else if index + 1 < state.draft.people.len() {
                    Self::enter_person(state, index + 1, false);
                } else {
                    state.draft.current = PersonDraft::default();
                    state.step = Step::Strength(StrengthStage::Coarse);
                }
                Ok(Transition::Moved)
            }
            (Step::Person { editing: true, .. }, Action::Back) => {
                state.draft.current = PersonDraft::default();
                state.step = Step::Confirm;
                Ok(Transition::Moved)
            }
            (Step::Person { index, editing: false }, Action::Back) => {
                let index = *index;
                if index == 0 {
                    state.draft.current = PersonDraft::default();
                    state.step = Step::Count(CountEntry::QuickPick);
                } else {
                    Self::enter_person(state, index - 1, false);
                }
                Ok(Transition::Moved)
            }

            // ----- Strength -----
            (Step::Strength(StrengthStage::Coarse), Action::ChooseTier(i)) => {
                let tier = catalog.tier(i).ok_or(ValidationError::UnknownChoice)?;
                if tier.is_terminal() {
                    state.draft.strength = Some(tier.label.clone());
                    state.step = Step::Confirm;
                } else {
                    state.step = Step::Strength(StrengthStage::Fine { tier: i });
                }
                Ok(Transition::Moved)
            }
            (Step::Strength(StrengthStage::Fine { tier }), Action::ChooseRank(j)) => {
                let rank = catalog
                    .tier(*tier)
                    .and_then(|t| t.ranks.get(j))
                    .ok_or(ValidationError::UnknownChoice)?;
                state.draft.strength = Some(rank.clone());
                state.step = Step::Confirm;
                Ok(Transition::Moved)
            }
            (Step::Strength(StrengthStage::Fine { .. }), Action::Back) => {
                state.step = Step::Strength(StrengthStage::Coarse);
                Ok(Transition::Moved)
            }
            (Step::Strength(StrengthStage::Coarse), Action::Back) => {
                if category.collects_per_person() {
                    let last = state.draft.people.len().saturating_sub(1);
                    Self::enter_person(state, last, false);
                } else if category.extra_question().is_some() {
                    state.step = Step::ExtraQuestion;
                } else {
                    state.step = Step::Count(CountEntry::QuickPick);
                }
                Ok(Transition::Moved)
            }

            // ----- Confirm -----
            (Step::Confirm, Action::ToggleConsent) => {
                state.draft.consent = !state.draft.consent;
                Ok(Transition::Stayed)
            }
            (Step::Confirm, Action::Edit(i)) => {
                if !category.collects_per_person() || i >= state.draft.people.len() {
                    return Err(ValidationError::NotAllowed);
                }
                Self::enter_person(state, i, true);
                Ok(Transition::Moved)
            }
            (Step::Confirm, Action::Back) => {
                state.step = Step::Strength(StrengthStage::Coarse);
                Ok(Transition::Moved)
            }

            _ => Err(ValidationError::NotAllowed),
        }
    }

    fn accept_count(category: Category, state: &mut State, n: u32) {
        state.draft.count = Some(n);
        if category.collects_per_person() {
            state.draft.people.resize(n as usize, None);
            Self::enter_person(state, 0, false);
        } else if category.extra_question().is_some() {
            state.step = Step::ExtraQuestion;
        } else {
            state.step = Step::Strength(StrengthStage::Coarse);
        }
    }

    fn enter_person(state: &mut State, index: usize, editing: bool) {
        state.draft.current = state
            .draft
            .people
            .get(index)
            .and_then(|p| p.as_ref())
            .map(PersonDraft::from_entry)
            .unwrap_or_default();
        state.step = Step::Person { index, editing };
    }

    /// Assemble the records for this reception and enter `Submitted`.
    ///
    /// All records of one submission share `timestamp`. Refused while a
    /// previous submit is still outstanding or consent is missing.
    pub fn submit(&mut self, timestamp: &str) -> Result<Vec<VisitorRecord>, ValidationError> {
        match self.state.step {
            Step::Confirm => {}
            Step::Submitted => return Err(ValidationError::SubmissionInFlight),
            _ => return Err(ValidationError::NotAllowed),
        }
        if !self.state.draft.consent {
            return Err(ValidationError::ConsentRequired);
        }

        let records = self.build_records(timestamp)?;
        self.state.step = Step::Submitted;
        debug!(category = ?self.category, records = records.len(), "Wizard submitted");
        Ok(records)
    }

    /// Return to Confirm after a failed write so the visitor can retry.
    pub fn submission_failed(&mut self) {
        if matches!(self.state.step, Step::Submitted) {
            self.state.step = Step::Confirm;
        }
    }

    fn build_records(&self, timestamp: &str) -> Result<Vec<VisitorRecord>, ValidationError> {
        let draft = &self.state.draft;
        let count = draft.count.filter(|n| *n > 0).ok_or(ValidationError::InvalidCount)?;
        let strength = draft.strength.clone().ok_or(ValidationError::MissingStrength)?;
        let timestamp = timestamp.to_string();

        let records = match self.category {
            Category::Student => {
                if draft.people.len() != count as usize {
                    return Err(ValidationError::IncompleteGroup);
                }
                draft
                    .people
                    .iter()
                    .map(|p| {
                        let entry = p.as_ref().ok_or(ValidationError::IncompleteGroup)?;
                        Ok(VisitorRecord::Student(StudentVisitor {
                            grade: entry.grade.clone(),
                            class: entry.class.clone(),
                            student_id: entry.student_id.clone(),
                            shogi_strength: strength.clone(),
                            timestamp: timestamp.clone(),
                        }))
                    })
                    .collect::<Result<Vec<_>, ValidationError>>()?
            }
            Category::External => vec![VisitorRecord::External(GroupVisit {
                count,
                shogi_strength: strength,
                timestamp,
            })],
            Category::Teacher => vec![VisitorRecord::Teacher(GroupVisit {
                count,
                shogi_strength: strength,
                timestamp,
            })],
            Category::Parent => vec![VisitorRecord::Parent(ParentVisit {
                count,
                shogi_strength: strength,
                son_in_club: draft.extra_answer.ok_or(ValidationError::IncompleteGroup)?,
                timestamp,
            })],
            Category::Alumni => vec![VisitorRecord::Alumni(AlumniVisit {
                count,
                shogi_strength: strength,
                was_in_club: draft.extra_answer.ok_or(ValidationError::IncompleteGroup)?,
                timestamp,
            })],
        };
        Ok(records)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NO_STRENGTH;

    const TS: &str = "2024-11-02T01:23:45.678Z";

    fn wizard(category: Category) -> Wizard {
        Wizard::new(category, Arc::new(Catalog::default()))
    }

    fn fill_person(w: &mut Wizard, grade: usize, class: usize, id: &str) {
        w.apply(Action::SelectGrade(grade)).expect("grade");
        w.apply(Action::SelectClass(class)).expect("class");
        w.apply(Action::Clear).expect("clear");
        for c in id.chars() {
            w.apply(Action::Digit(c)).expect("digit");
        }
        w.apply(Action::NextPerson).expect("next");
    }

    // -------------------------------------------------------------------------
    // Count
    // -------------------------------------------------------------------------

    #[test]
    fn test_quick_pick_moves_group_to_strength() {
        let mut w = wizard(Category::External);
        assert_eq!(w.apply(Action::PickCount(4)), Ok(Transition::Moved));
        assert_eq!(w.step(), &Step::Strength(StrengthStage::Coarse));
        assert_eq!(w.draft().count, Some(4));
    }

    #[test]
    fn test_quick_pick_sizes_student_drafts() {
        let mut w = wizard(Category::Student);
        w.apply(Action::PickCount(3)).expect("pick");
        assert_eq!(w.draft().people.len(), 3);
        assert_eq!(w.step(), &Step::Person { index: 0, editing: false });
    }

    #[test]
    fn test_parent_goes_to_extra_question() {
        let mut w = wizard(Category::Parent);
        w.apply(Action::PickCount(2)).expect("pick");
        assert_eq!(w.step(), &Step::ExtraQuestion);
    }

    #[test]
    fn test_keypad_zero_rejected_and_state_kept() {
        let mut w = wizard(Category::External);
        w.apply(Action::OpenKeypad).expect("keypad");
        w.apply(Action::Digit('0')).expect("digit");
        let before = w.step().clone();
        assert_eq!(w.apply(Action::ConfirmCount), Err(ValidationError::InvalidCount));
        assert_eq!(w.step(), &before);
        assert_eq!(w.draft().count, None);
    }

    #[test]
    fn test_keypad_empty_rejected() {
        let mut w = wizard(Category::Teacher);
        w.apply(Action::OpenKeypad).expect("keypad");
        assert_eq!(w.apply(Action::ConfirmCount), Err(ValidationError::InvalidCount));
    }

    #[test]
    fn test_keypad_digit_limit_per_category() {
        let mut w = wizard(Category::External);
        w.apply(Action::OpenKeypad).expect("keypad");
        for c in "1234".chars() {
            w.apply(Action::Digit(c)).expect("digit");
        }
        assert_eq!(w.step(), &Step::Count(CountEntry::Keypad(Keypad::with_value("123", 3))));

        let mut s = wizard(Category::Student);
        s.apply(Action::OpenKeypad).expect("keypad");
        for c in "123".chars() {
            s.apply(Action::Digit(c)).expect("digit");
        }
        s.apply(Action::ConfirmCount).expect("confirm");
        assert_eq!(s.draft().count, Some(12));
        assert_eq!(s.draft().people.len(), 12);
    }

    #[test]
    fn test_keypad_backspace_clear_then_confirm() {
        let mut w = wizard(Category::External);
        w.apply(Action::OpenKeypad).expect("keypad");
        w.apply(Action::Digit('9')).expect("digit");
        w.apply(Action::Clear).expect("clear");
        w.apply(Action::Digit('1')).expect("digit");
        w.apply(Action::Digit('5')).expect("digit");
        w.apply(Action::Backspace).expect("backspace");
        w.apply(Action::Digit('2')).expect("digit");
        w.apply(Action::ConfirmCount).expect("confirm");
        assert_eq!(w.draft().count, Some(12));
    }

    #[test]
    fn test_back_from_keypad_returns_to_quick_pick() {
        let mut w = wizard(Category::External);
        w.apply(Action::OpenKeypad).expect("keypad");
        assert_eq!(w.apply(Action::Back), Ok(Transition::Moved));
        assert_eq!(w.step(), &Step::Count(CountEntry::QuickPick));
    }

    #[test]
    fn test_back_from_count_exits() {
        let mut w = wizard(Category::Student);
        assert_eq!(w.apply(Action::Back), Ok(Transition::Exited));
    }

    #[test]
    fn test_illegal_action_is_refused() {
        let mut w = wizard(Category::External);
        assert_eq!(w.apply(Action::ToggleConsent), Err(ValidationError::NotAllowed));
        assert_eq!(w.apply(Action::NextPerson), Err(ValidationError::NotAllowed));
        assert_eq!(w.step(), &Step::Count(CountEntry::QuickPick));
    }

    // -------------------------------------------------------------------------
    // Extra question
    // -------------------------------------------------------------------------

    #[test]
    fn test_extra_question_records_answer() {
        let mut w = wizard(Category::Alumni);
        w.apply(Action::PickCount(1)).expect("pick");
        w.apply(Action::Answer(false)).expect("answer");
        assert_eq!(w.draft().extra_answer, Some(false));
        assert_eq!(w.step(), &Step::Strength(StrengthStage::Coarse));
    }

    #[test]
    fn test_back_from_extra_question_to_count() {
        let mut w = wizard(Category::Parent);
        w.apply(Action::PickCount(1)).expect("pick");
        w.apply(Action::Back).expect("back");
        assert_eq!(w.step(), &Step::Count(CountEntry::QuickPick));
    }

    #[test]
    fn test_strength_back_to_extra_question() {
        let mut w = wizard(Category::Parent);
        w.apply(Action::PickCount(1)).expect("pick");
        w.apply(Action::Answer(true)).expect("answer");
        w.apply(Action::Back).expect("back");
        assert_eq!(w.step(), &Step::ExtraQuestion);
    }

    // -------------------------------------------------------------------------
    // Per-person input
    // -------------------------------------------------------------------------

    #[test]
    fn test_first_missing_field_reported() {
        let mut w = wizard(Category::Student);
        w.apply(Action::PickCount(1)).expect("pick");

        // Only the id is filled: grade comes first in order.
        w.apply(Action::Digit('5')).expect("digit");
        assert_eq!(w.apply(Action::NextPerson), Err(ValidationError::MissingGrade));

        w.apply(Action::SelectGrade(0)).expect("grade");
        assert_eq!(w.apply(Action::NextPerson), Err(ValidationError::MissingClass));

        w.apply(Action::SelectClass(0)).expect("class");
        w.apply(Action::Clear).expect("clear");
        assert_eq!(w.apply(Action::NextPerson), Err(ValidationError::MissingStudentId));
        assert_eq!(w.step(), &Step::Person { index: 0, editing: false });
        assert_eq!(w.draft().people[0], None);
    }

    #[test]
    fn test_student_id_max_two_digits() {
        let mut w = wizard(Category::Student);
        w.apply(Action::PickCount(1)).expect("pick");
        for c in "123".chars() {
            w.apply(Action::Digit(c)).expect("digit");
        }
        assert_eq!(w.draft().current.student_id.value(), "12");
    }

    #[test]
    fn test_unknown_grade_index_refused() {
        let mut w = wizard(Category::Student);
        w.apply(Action::PickCount(1)).expect("pick");
        assert_eq!(w.apply(Action::SelectGrade(99)), Err(ValidationError::UnknownChoice));
        assert_eq!(w.draft().current.grade, None);
    }

    #[test]
    fn test_person_sequence_then_strength() {
        let mut w = wizard(Category::Student);
        w.apply(Action::PickCount(2)).expect("pick");
        fill_person(&mut w, 0, 0, "1");
        assert_eq!(w.step(), &Step::Person { index: 1, editing: false });
        assert_eq!(w.draft().current, PersonDraft::default());
        fill_person(&mut w, 1, 1, "2");
        assert_eq!(w.step(), &Step::Strength(StrengthStage::Coarse));
        assert!(w.draft().people.iter().all(Option::is_some));
    }

    #[test]
    fn test_back_restores_previous_person() {
        let mut w = wizard(Category::Student);
        w.apply(Action::PickCount(2)).expect("pick");
        fill_person(&mut w, 2, 3, "17");
        w.apply(Action::Back).expect("back");
        assert_eq!(w.step(), &Step::Person { index: 0, editing: false });
        assert_eq!(w.draft().current.grade.as_deref(), Some("中3"));
        assert_eq!(w.draft().current.class.as_deref(), Some("D"));
        assert_eq!(w.draft().current.student_id.value(), "17");

        w.apply(Action::Back).expect("back");
        assert_eq!(w.step(), &Step::Count(CountEntry::QuickPick));
    }

    #[test]
    fn test_strength_back_to_last_person() {
        let mut w = wizard(Category::Student);
        w.apply(Action::PickCount(2)).expect("pick");
        fill_person(&mut w, 0, 0, "1");
        fill_person(&mut w, 0, 0, "2");
        w.apply(Action::Back).expect("back");
        assert_eq!(w.step(), &Step::Person { index: 1, editing: false });
        assert_eq!(w.draft().current.student_id.value(), "2");
    }

    // -------------------------------------------------------------------------
    // Strength
    // -------------------------------------------------------------------------

    #[test]
    fn test_none_tier_short_circuits_to_confirm() {
        let mut w = wizard(Category::External);
        w.apply(Action::PickCount(1)).expect("pick");
        w.apply(Action::ChooseTier(0)).expect("tier");
        assert_eq!(w.step(), &Step::Confirm);
        assert_eq!(w.draft().strength.as_deref(), Some(NO_STRENGTH));
    }

    #[test]
    fn test_fine_rank_selection() {
        let mut w = wizard(Category::External);
        w.apply(Action::PickCount(1)).expect("pick");
        w.apply(Action::ChooseTier(2)).expect("tier");
        assert_eq!(w.step(), &Step::Strength(StrengthStage::Fine { tier: 2 }));
        w.apply(Action::ChooseRank(1)).expect("rank");
        assert_eq!(w.draft().strength.as_deref(), Some("二段"));
        assert_eq!(w.step(), &Step::Confirm);
    }

    #[test]
    fn test_back_from_fine_returns_to_coarse() {
        let mut w = wizard(Category::Teacher);
        w.apply(Action::PickCount(1)).expect("pick");
        w.apply(Action::ChooseTier(1)).expect("tier");
        w.apply(Action::Back).expect("back");
        assert_eq!(w.step(), &Step::Strength(StrengthStage::Coarse));
        w.apply(Action::Back).expect("back");
        assert_eq!(w.step(), &Step::Count(CountEntry::QuickPick));
    }

    #[test]
    fn test_rank_out_of_range_refused() {
        let mut w = wizard(Category::External);
        w.apply(Action::PickCount(1)).expect("pick");
        w.apply(Action::ChooseTier(1)).expect("tier");
        assert_eq!(w.apply(Action::ChooseRank(42)), Err(ValidationError::UnknownChoice));
        assert_eq!(w.step(), &Step::Strength(StrengthStage::Fine { tier: 1 }));
    }

    // -------------------------------------------------------------------------
    // Confirm / edit / submit
    // -------------------------------------------------------------------------

    fn student_at_confirm(ids: &[&str]) -> Wizard {
        let mut w = wizard(Category::Student);
        w.apply(Action::PickCount(ids.len() as u32)).expect("pick");
        for (i, id) in ids.iter().enumerate() {
            fill_person(&mut w, i % 6, i % 7, id);
        }
        w.apply(Action::ChooseTier(0)).expect("tier");
        w
    }

    #[test]
    fn test_edit_returns_directly_to_confirm() {
        let mut w = student_at_confirm(&["1", "2", "3"]);
        w.apply(Action::Edit(1)).expect("edit");
        assert_eq!(w.step(), &Step::Person { index: 1, editing: true });
        assert_eq!(w.draft().current.student_id.value(), "2");

        w.apply(Action::Clear).expect("clear");
        w.apply(Action::Digit('9')).expect("digit");
        w.apply(Action::NextPerson).expect("next");
        assert_eq!(w.step(), &Step::Confirm);
        assert_eq!(
            w.draft().people[1].as_ref().map(|p| p.student_id.as_str()),
            Some("9")
        );
        assert_eq!(
            w.draft().people[2].as_ref().map(|p| p.student_id.as_str()),
            Some("3")
        );
    }

    #[test]
    fn test_cancelled_edit_keeps_saved_entry() {
        let mut w = student_at_confirm(&["1", "2"]);
        w.apply(Action::Edit(0)).expect("edit");
        w.apply(Action::Clear).expect("clear");
        w.apply(Action::Back).expect("back");
        assert_eq!(w.step(), &Step::Confirm);
        assert_eq!(
            w.draft().people[0].as_ref().map(|p| p.student_id.as_str()),
            Some("1")
        );
    }

    #[test]
    fn test_edit_invalid_for_groups_and_out_of_range() {
        let mut w = student_at_confirm(&["1"]);
        assert_eq!(w.apply(Action::Edit(3)), Err(ValidationError::NotAllowed));

        let mut g = wizard(Category::External);
        g.apply(Action::PickCount(2)).expect("pick");
        g.apply(Action::ChooseTier(0)).expect("tier");
        assert_eq!(g.apply(Action::Edit(0)), Err(ValidationError::NotAllowed));
    }

    #[test]
    fn test_submit_requires_consent() {
        let mut w = student_at_confirm(&["1"]);
        assert!(!w.can_submit());
        assert_eq!(w.submit(TS), Err(ValidationError::ConsentRequired));
        assert_eq!(w.step(), &Step::Confirm);

        w.apply(Action::ToggleConsent).expect("consent");
        assert!(w.can_submit());
        assert!(w.submit(TS).is_ok());
    }

    #[test]
    fn test_double_submit_refused() {
        let mut w = student_at_confirm(&["1"]);
        w.apply(Action::ToggleConsent).expect("consent");
        assert!(w.submit(TS).is_ok());
        assert!(w.is_submitting());
        assert_eq!(w.submit(TS), Err(ValidationError::SubmissionInFlight));
        assert_eq!(w.apply(Action::Back), Err(ValidationError::SubmissionInFlight));
    }

    #[test]
    fn test_failed_submission_allows_retry() {
        let mut w = student_at_confirm(&["1"]);
        w.apply(Action::ToggleConsent).expect("consent");
        w.submit(TS).expect("submit");
        w.submission_failed();
        assert_eq!(w.step(), &Step::Confirm);
        assert!(w.draft().consent);
        assert_eq!(w.submit(TS).map(|r| r.len()), Ok(1));
    }

    #[test]
    fn test_three_students_share_timestamp_and_strength() {
        let mut w = student_at_confirm(&["1", "2", "3"]);
        w.apply(Action::ToggleConsent).expect("consent");
        let records = w.submit(TS).expect("submit");

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.timestamp() == TS));
        assert!(records.iter().all(|r| r.shogi_strength() == NO_STRENGTH));
        assert!(records.iter().all(|r| r.category() == Category::Student));
        let ids: Vec<String> = records
            .iter()
            .filter_map(|r| match r {
                VisitorRecord::Student(s) => Some(s.student_id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_group_submission_is_single_record() {
        let mut w = wizard(Category::Parent);
        w.apply(Action::PickCount(4)).expect("pick");
        w.apply(Action::Answer(true)).expect("answer");
        w.apply(Action::ChooseTier(1)).expect("tier");
        w.apply(Action::ChooseRank(0)).expect("rank");
        w.apply(Action::ToggleConsent).expect("consent");
        let records = w.submit(TS).expect("submit");
        assert_eq!(
            records,
            vec![VisitorRecord::Parent(ParentVisit {
                count: 4,
                shogi_strength: "10級".to_string(),
                son_in_club: true,
                timestamp: TS.to_string(),
            })]
        );
    }

    #[test]
    fn test_confirm_back_keeps_consent_and_returns_to_strength() {
        let mut w = wizard(Category::External);
        w.apply(Action::PickCount(1)).expect("pick");
        w.apply(Action::ChooseTier(0)).expect("tier");
        w.apply(Action::ToggleConsent).expect("consent");
        w.apply(Action::Back).expect("back");
        assert_eq!(w.step(), &Step::Strength(StrengthStage::Coarse));
        assert!(w.draft().consent);
    }

    #[test]
    fn test_recount_preserves_entered_people() {
        let mut w = wizard(Category::Student);
        w.apply(Action::PickCount(2)).expect("pick");
        fill_person(&mut w, 0, 0, "1");
        w.apply(Action::Back).expect("back to person 0");
        w.apply(Action::Back).expect("back to count");
        w.apply(Action::PickCount(3)).expect("pick");
        assert_eq!(w.draft().people.len(), 3);
        assert_eq!(w.draft().current.student_id.value(), "1");
    }
}
