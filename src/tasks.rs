use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub label: String,
    pub done: bool,
}

/// User-managed task list; the selection is UI state and is not persisted.
#[derive(Clone, Debug, Default)]
pub struct TaskList {
    tasks: Vec<Task>,
    selected: Option<usize>,
}

impl From<Vec<Task>> for TaskList {
    fn from(tasks: Vec<Task>) -> Self {
        let selected = tasks.iter().position(|t| !t.done).or(if tasks.is_empty() { None } else { Some(0) });
        Self { tasks, selected }
    }
}

impl TaskList {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn to_vec(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.selected.and_then(|i| self.tasks.get(i))
    }

    /// Label of the selected task while it is still open.
    pub fn current(&self) -> Option<&str> {
        self.selected_task().filter(|t| !t.done).map(|t| t.label.as_str())
    }

    /// Returns false for blank labels.
    pub fn add(&mut self, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() {
            return false;
        }
        self.tasks.push(Task { label: label.into(), done: false });
        self.selected = Some(self.tasks.len() - 1);
        true
    }

    pub fn edit_selected(&mut self, label: &str) -> bool {
        let label = label.trim();
        match self.selected.and_then(|i| self.tasks.get_mut(i)) {
            Some(task) if !label.is_empty() => {
                task.label = label.into();
                true
            }
            _ => false,
        }
    }

    pub fn toggle_selected(&mut self) -> bool {
        match self.selected.and_then(|i| self.tasks.get_mut(i)) {
            Some(task) => {
                task.done = !task.done;
                true
            }
            None => false,
        }
    }

    pub fn remove_selected(&mut self) -> bool {
        let Some(idx) = self.selected.filter(|&i| i < self.tasks.len()) else {
            return false;
        };
        self.tasks.remove(idx);
        self.selected = if self.tasks.is_empty() {
            None
        } else {
            Some(idx.min(self.tasks.len() - 1))
        };
        true
    }

    pub fn select_next(&mut self) {
        if !self.tasks.is_empty() {
            self.selected = Some(match self.selected {
                Some(idx) => (idx + 1).min(self.tasks.len() - 1),
                None => 0,
            });
        }
    }

    pub fn select_prev(&mut self) {
        if !self.tasks.is_empty() {
            self.selected = Some(match self.selected {
                Some(idx) => idx.saturating_sub(1),
                None => self.tasks.len() - 1,
            });
        }
    }

    /// Selects the task with this label, adding it when absent.
    pub fn focus_label(&mut self, label: &str) -> bool {
        let label = label.trim();
        match self.tasks.iter().position(|t| t.label == label) {
            Some(idx) => {
                self.selected = Some(idx);
                false
            }
            None => self.add(label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(labels: &[(&str, bool)]) -> TaskList {
        TaskList::from(
            labels
                .iter()
                .map(|(l, d)| Task { label: l.to_string(), done: *d })
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn loading_selects_first_open_task() {
        let tasks = list(&[("a", true), ("b", false)]);
        assert_eq!(tasks.current(), Some("b"));
        assert_eq!(TaskList::default().selected(), None);
    }

    #[test]
    fn add_trims_and_rejects_blank() {
        let mut tasks = TaskList::default();
        assert!(!tasks.add("   "));
        assert!(tasks.add("  write report "));
        assert_eq!(tasks.tasks()[0].label, "write report");
        assert_eq!(tasks.current(), Some("write report"));
    }

    #[test]
    fn toggle_marks_done_and_hides_from_current() {
        let mut tasks = list(&[("a", false)]);
        assert!(tasks.toggle_selected());
        assert!(tasks.tasks()[0].done);
        assert_eq!(tasks.current(), None);
    }

    #[test]
    fn remove_keeps_selection_in_bounds() {
        let mut tasks = list(&[("a", false), ("b", false)]);
        tasks.select_next();
        assert!(tasks.remove_selected());
        assert_eq!(tasks.selected(), Some(0));
        assert!(tasks.remove_selected());
        assert_eq!(tasks.selected(), None);
        assert!(!tasks.remove_selected());
    }

    #[test]
    fn navigation_clamps() {
        let mut tasks = list(&[("a", false), ("b", false)]);
        tasks.select_prev();
        assert_eq!(tasks.selected(), Some(0));
        tasks.select_next();
        tasks.select_next();
        assert_eq!(tasks.selected(), Some(1));
    }

    #[test]
    fn edit_replaces_label() {
        let mut tasks = list(&[("a", false)]);
        assert!(tasks.edit_selected("b"));
        assert!(!tasks.edit_selected(""));
        assert_eq!(tasks.tasks()[0].label, "b");
    }

    #[test]
    fn focus_label_selects_or_adds() {
        let mut tasks = list(&[("a", false), ("b", false)]);
        assert!(!tasks.focus_label("b"));
        assert_eq!(tasks.current(), Some("b"));
        assert!(tasks.focus_label("c"));
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks.current(), Some("c"));
    }
}
