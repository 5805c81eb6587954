use crate::models::{Course, Instructor, Student};

/// The three top-level tabs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Tab {
    Students,
    Instructors,
    Courses,
}

impl Tab {
    pub(crate) const ALL: [Tab; 3] = [Tab::Students, Tab::Instructors, Tab::Courses];

    pub(crate) fn title(self) -> &'static str {
        match self {
            Tab::Students => "Students",
            Tab::Instructors => "Instructors",
            Tab::Courses => "Courses",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Tab::Students => 0,
            Tab::Instructors => 1,
            Tab::Courses => 2,
        }
    }

    pub(crate) fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub(crate) fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Anything that can be listed on a tab and re-selected by id after a reload.
pub(crate) trait Listed {
    fn record_id(&self) -> &str;
}

impl Listed for Student {
    fn record_id(&self) -> &str {
        self.id()
    }
}

impl Listed for Instructor {
    fn record_id(&self) -> &str {
        self.id()
    }
}

impl Listed for Course {
    fn record_id(&self) -> &str {
        self.id()
    }
}

/// Records shown on one tab plus the highlighted row. Filtering happens in
/// the store, so this only ever holds what should be visible.
pub(crate) struct RecordList<T> {
    pub(crate) items: Vec<T>,
    pub(crate) selected: usize,
}

impl<T: Listed> RecordList<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self { items, selected: 0 }
    }

    pub(crate) fn current(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    pub(crate) fn current_id(&self) -> Option<String> {
        self.current().map(|item| item.record_id().to_string())
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Swap in freshly loaded records, keeping the highlight on the same
    /// record when it is still present.
    pub(crate) fn set_items(&mut self, items: Vec<T>) {
        let previous = self.current_id();
        self.items = items;
        match previous {
            Some(id) if self.select_id(&id) => {}
            _ => self.ensure_in_bounds(),
        }
    }

    /// Highlight the record with `id`. Returns false when it is not listed.
    pub(crate) fn select_id(&mut self, id: &str) -> bool {
        match self.items.iter().position(|item| item.record_id() == id) {
            Some(index) => {
                self.selected = index;
                true
            }
            None => false,
        }
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.items.is_empty() {
            return;
        }
        let last = self.items.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        if !self.items.is_empty() {
            self.selected = self.items.len() - 1;
        }
    }

    fn ensure_in_bounds(&mut self) {
        if self.items.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.items.len() {
            self.selected = self.items.len() - 1;
        }
    }
}

/// What happens with the row picked in a [`Picker`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PickAction {
    EnrollInCourse { student_id: String },
    EnrollStudent { course_id: String },
    DropCourse { student_id: String },
    DropStudent { course_id: String },
    AssignInstructor { course_id: String },
}

#[derive(Clone, Debug)]
pub(crate) struct PickOption {
    /// `None` stands for "no record", e.g. clearing the instructor slot.
    pub(crate) value: Option<String>,
    pub(crate) label: String,
}

impl PickOption {
    pub(crate) fn record(id: &str, label: impl Into<String>) -> Self {
        Self {
            value: Some(id.to_string()),
            label: label.into(),
        }
    }
}

/// Modal list used for enrollment and instructor assignment.
#[derive(Clone, Debug)]
pub(crate) struct Picker {
    pub(crate) title: String,
    pub(crate) action: PickAction,
    pub(crate) options: Vec<PickOption>,
    pub(crate) selected: usize,
}

impl Picker {
    pub(crate) fn new(title: impl Into<String>, action: PickAction, options: Vec<PickOption>) -> Self {
        Self {
            title: title.into(),
            action,
            options,
            selected: 0,
        }
    }

    /// Start with the highlight on `value` when present.
    pub(crate) fn preselect(mut self, value: Option<&str>) -> Self {
        if let Some(index) = self
            .options
            .iter()
            .position(|option| option.value.as_deref() == value)
        {
            self.selected = index;
        }
        self
    }

    pub(crate) fn current(&self) -> Option<&PickOption> {
        self.options.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.options.is_empty() {
            return;
        }
        let last = self.options.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.options.len().saturating_sub(1);
    }
}

/// Live search input. `previous` is restored when the search is cancelled.
#[derive(Clone, Debug, Default)]
pub(crate) struct SearchState {
    pub(crate) query: String,
    pub(crate) previous: Option<String>,
}

impl SearchState {
    pub(crate) fn new(previous: Option<String>) -> Self {
        Self {
            query: previous.clone().unwrap_or_default(),
            previous,
        }
    }

    /// The query as a store filter; blank input means no filter.
    pub(crate) fn as_filter(&self) -> Option<String> {
        let trimmed = self.query.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn students(ids: &[&str]) -> Vec<Student> {
        ids.iter()
            .map(|id| Student::new(*id, format!("Name {id}"), 20, "x@example.com"))
            .collect()
    }

    #[test]
    fn tabs_cycle_both_ways() {
        assert_eq!(Tab::Students.next(), Tab::Instructors);
        assert_eq!(Tab::Courses.next(), Tab::Students);
        assert_eq!(Tab::Students.previous(), Tab::Courses);
    }

    #[test]
    fn selection_is_clamped() {
        let mut list = RecordList::new(students(&["S1", "S2", "S3"]));
        list.move_selection(10);
        assert_eq!(list.current_id().as_deref(), Some("S3"));
        list.move_selection(-10);
        assert_eq!(list.selected, 0);
        list.select_last();
        assert_eq!(list.selected, 2);
    }

    #[test]
    fn reload_keeps_highlighted_record() {
        let mut list = RecordList::new(students(&["S1", "S2", "S3"]));
        list.select_id("S2");
        list.set_items(students(&["S0", "S1", "S2", "S3"]));
        assert_eq!(list.current_id().as_deref(), Some("S2"));

        list.select_last();
        list.set_items(students(&["S0"]));
        assert_eq!(list.current_id().as_deref(), Some("S0"));

        list.set_items(Vec::new());
        assert!(list.current().is_none());
        list.move_selection(1);
        assert_eq!(list.selected, 0);
    }

    #[test]
    fn picker_preselects_current_value() {
        let options = vec![
            PickOption {
                value: None,
                label: "(none)".into(),
            },
            PickOption::record("I1", "I1 - Ines"),
            PickOption::record("I2", "I2 - Ivo"),
        ];
        let action = PickAction::AssignInstructor {
            course_id: "C1".into(),
        };
        let picker = Picker::new("Assign", action.clone(), options.clone()).preselect(Some("I2"));
        assert_eq!(picker.selected, 2);

        let picker = Picker::new("Assign", action, options).preselect(None);
        assert_eq!(picker.current().unwrap().label, "(none)");
    }

    #[test]
    fn blank_search_clears_filter() {
        let mut search = SearchState::new(Some("ana".into()));
        assert_eq!(search.as_filter().as_deref(), Some("ana"));
        search.query = "   ".into();
        assert_eq!(search.as_filter(), None);
    }
}
